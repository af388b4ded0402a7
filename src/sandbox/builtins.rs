//! Function catalog registered into every evaluation context.
//!
//! Sequences arrive as tuples with `()` for missing cells. Numeric functions
//! skip missing cells; paired functions keep only rows complete on both
//! sides. Tests return `(statistic, p_value)` tuples, read with `nth`.

use evalexpr::{ContextWithMutableFunctions, EvalexprError, EvalexprResult, Value};
use std::sync::{Arc, Mutex};

use super::plot::{histogram, BoxSummary, Layer, PlotCanvas};
use super::{datum_to_value, ExprContext, ExprFunction, ExprValue};
use crate::stats::{cleaning, descriptive, hypothesis, StatsError, TestOutcome};
use crate::table::Datum;

type FnResult = EvalexprResult<ExprValue>;

/// A named function plus the documentation shown to the oracle
pub struct Builtin {
    pub name: &'static str,
    pub signature: &'static str,
    pub summary: &'static str,
    function: ExprFunction,
}

fn builtin<F>(name: &'static str, signature: &'static str, summary: &'static str, f: F) -> Builtin
where
    F: Fn(&ExprValue) -> FnResult + Send + Sync + Clone + 'static,
{
    Builtin { name, signature, summary, function: ExprFunction::new(f) }
}

pub fn register(context: &mut ExprContext, builtins: Vec<Builtin>) -> EvalexprResult<()> {
    for b in builtins {
        context.set_function(b.name.to_string(), b.function)?;
    }
    Ok(())
}

/// One line per function, for the dialect guide
pub fn describe(builtins: &[Builtin]) -> String {
    builtins
        .iter()
        .map(|b| format!("- {}: {}", b.signature, b.summary))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── argument helpers ─────────────────────────────────────────────────────────

fn fail<T>(message: impl Into<String>) -> EvalexprResult<T> {
    Err(EvalexprError::CustomMessage(message.into()))
}

fn stats_error(name: &str, e: StatsError) -> EvalexprError {
    EvalexprError::CustomMessage(format!("{}: {}", name, e))
}

fn items(value: &ExprValue) -> Vec<ExprValue> {
    match value {
        Value::Tuple(values) => values.clone(),
        Value::Empty => Vec::new(),
        other => vec![other.clone()],
    }
}

/// `f(seq)` and `f(seq, p1, ...)` both arrive as one value; a leading tuple
/// marks the second form.
fn split_params(value: &ExprValue) -> (ExprValue, Vec<ExprValue>) {
    match value {
        Value::Tuple(values) if matches!(values.first(), Some(Value::Tuple(_))) => {
            (values[0].clone(), values[1..].to_vec())
        }
        other => (other.clone(), Vec::new()),
    }
}

fn two_sequences(name: &str, value: &ExprValue) -> EvalexprResult<(ExprValue, ExprValue)> {
    match value {
        Value::Tuple(values) if values.len() == 2 => Ok((values[0].clone(), values[1].clone())),
        _ => fail(format!("{} expects two sequences", name)),
    }
}

fn scalar(name: &str, value: &ExprValue) -> EvalexprResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(i) => Ok(*i as f64),
        other => fail(format!("{}: expected a number, found {}", name, other)),
    }
}

fn param(name: &str, params: &[ExprValue], idx: usize, default: f64) -> EvalexprResult<f64> {
    params.get(idx).map(|p| scalar(name, p)).unwrap_or(Ok(default))
}

fn optional_numbers(name: &str, value: &ExprValue) -> EvalexprResult<Vec<Option<f64>>> {
    items(value)
        .iter()
        .map(|item| match item {
            Value::Float(f) => Ok(Some(*f)),
            Value::Int(i) => Ok(Some(*i as f64)),
            Value::Boolean(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
            Value::Empty => Ok(None),
            other => fail(format!("{}: expected numbers, found {}", name, other)),
        })
        .collect()
}

fn numbers(name: &str, value: &ExprValue) -> EvalexprResult<Vec<f64>> {
    Ok(optional_numbers(name, value)?.into_iter().flatten().collect())
}

fn label(value: &ExprValue) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Float(f) => Some(f.to_string()),
        Value::Int(i) => Some(i.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn optional_labels(value: &ExprValue) -> Vec<Option<String>> {
    items(value).iter().map(label).collect()
}

fn labels(value: &ExprValue) -> Vec<String> {
    optional_labels(value).into_iter().flatten().collect()
}

fn check_lengths(name: &str, a: usize, b: usize) -> EvalexprResult<()> {
    if a != b {
        return fail(format!("{}: sequences differ in length ({} vs {})", name, a, b));
    }
    Ok(())
}

/// Rows where both numeric cells are present
fn paired_numbers(name: &str, value: &ExprValue) -> EvalexprResult<(Vec<f64>, Vec<f64>)> {
    let (a, b) = two_sequences(name, value)?;
    let (a, b) = (optional_numbers(name, &a)?, optional_numbers(name, &b)?);
    check_lengths(name, a.len(), b.len())?;
    Ok(a.into_iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x?, y?)))
        .unzip())
}

/// Rows where both the value and its group label are present
fn grouped_numbers(name: &str, value: &ExprValue) -> EvalexprResult<Vec<(String, Vec<f64>)>> {
    let (values, groups) = two_sequences(name, value)?;
    let (values, groups) = (optional_numbers(name, &values)?, optional_labels(&groups));
    check_lengths(name, values.len(), groups.len())?;
    let (values, groups): (Vec<f64>, Vec<String>) = values
        .into_iter()
        .zip(groups)
        .filter_map(|(v, g)| Some((v?, g?)))
        .unzip();
    Ok(hypothesis::groups_by_label(&values, &groups))
}

fn paired_labels(name: &str, value: &ExprValue) -> EvalexprResult<(Vec<String>, Vec<String>)> {
    let (a, b) = two_sequences(name, value)?;
    let (a, b) = (optional_labels(&a), optional_labels(&b));
    check_lengths(name, a.len(), b.len())?;
    Ok(a.into_iter()
        .zip(b)
        .filter_map(|(x, y)| Some((x?, y?)))
        .unzip())
}

fn floats(values: &[f64]) -> ExprValue {
    Value::Tuple(values.iter().map(|v| Value::Float(*v)).collect())
}

fn indexes(values: &[usize]) -> ExprValue {
    Value::Tuple(values.iter().map(|v| Value::Int(*v as i64)).collect())
}

fn outcome(o: TestOutcome) -> ExprValue {
    Value::Tuple(vec![Value::Float(o.statistic), Value::Float(o.p_value)])
}

fn counts(table: Vec<(String, usize)>) -> ExprValue {
    Value::Tuple(
        table
            .into_iter()
            .map(|(l, c)| Value::Tuple(vec![Value::String(l), Value::Int(c as i64)]))
            .collect(),
    )
}

/// Numeric statistic over the non-missing cells of one sequence
fn unary(
    name: &'static str,
    signature: &'static str,
    summary: &'static str,
    f: fn(&[f64]) -> Result<f64, StatsError>,
) -> Builtin {
    builtin(name, signature, summary, move |arg| {
        let values = numbers(name, arg)?;
        f(&values).map(Value::Float).map_err(|e| stats_error(name, e))
    })
}

/// Test over two sequences of paired rows
fn paired_test(
    name: &'static str,
    signature: &'static str,
    summary: &'static str,
    f: fn(&[f64], &[f64]) -> Result<TestOutcome, StatsError>,
) -> Builtin {
    builtin(name, signature, summary, move |arg| {
        let (a, b) = paired_numbers(name, arg)?;
        f(&a, &b).map(outcome).map_err(|e| stats_error(name, e))
    })
}

/// Test over two independent samples
fn two_sample_test(
    name: &'static str,
    signature: &'static str,
    summary: &'static str,
    f: fn(&[f64], &[f64]) -> Result<TestOutcome, StatsError>,
) -> Builtin {
    builtin(name, signature, summary, move |arg| {
        let (a, b) = two_sequences(name, arg)?;
        let (a, b) = (numbers(name, &a)?, numbers(name, &b)?);
        f(&a, &b).map(outcome).map_err(|e| stats_error(name, e))
    })
}

fn outlier_detector(
    name: &'static str,
    signature: &'static str,
    summary: &'static str,
    default: f64,
    f: fn(&[Option<f64>], f64) -> Result<Vec<usize>, StatsError>,
) -> Builtin {
    builtin(name, signature, summary, move |arg| {
        let (seq, params) = split_params(arg);
        let values = optional_numbers(name, &seq)?;
        let threshold = param(name, &params, 0, default)?;
        f(&values, threshold).map(|idx| indexes(&idx)).map_err(|e| stats_error(name, e))
    })
}

fn filler(
    name: &'static str,
    signature: &'static str,
    summary: &'static str,
    f: fn(&[Option<f64>]) -> Result<Vec<f64>, StatsError>,
) -> Builtin {
    builtin(name, signature, summary, move |arg| {
        let values = optional_numbers(name, arg)?;
        f(&values).map(|v| floats(&v)).map_err(|e| stats_error(name, e))
    })
}

// ── catalog ──────────────────────────────────────────────────────────────────

/// Statistics, tests and cleaning helpers available in every stage
pub fn catalog() -> Vec<Builtin> {
    vec![
        // utilities
        builtin("count", "count(seq)", "number of non-missing cells", |arg| {
            Ok(Value::Int(items(arg).iter().filter(|v| !matches!(v, Value::Empty)).count() as i64))
        }),
        builtin("count_missing", "count_missing(seq)", "number of missing cells", |arg| {
            Ok(Value::Int(items(arg).iter().filter(|v| matches!(v, Value::Empty)).count() as i64))
        }),
        builtin("is_missing", "is_missing(x)", "true when x is a missing cell", |arg| {
            Ok(Value::Boolean(matches!(arg, Value::Empty)))
        }),
        builtin("dropna", "dropna(seq)", "the sequence without missing cells", |arg| {
            Ok(Value::Tuple(items(arg).into_iter().filter(|v| !matches!(v, Value::Empty)).collect()))
        }),
        builtin("nth", "nth(tuple, i)", "element i (0-based) of a tuple, e.g. nth(shapiro(x), 1) is the p-value", |arg| {
            match arg {
                Value::Tuple(args) if args.len() == 2 => {
                    let idx = scalar("nth", &args[1])?;
                    let values = items(&args[0]);
                    if idx < 0.0 || idx.fract() != 0.0 || idx as usize >= values.len() {
                        return fail(format!("nth: index {} out of range for {} elements", idx, values.len()));
                    }
                    Ok(values[idx as usize].clone())
                }
                _ => fail("nth expects (tuple, index)"),
            }
        }),
        builtin("abs", "abs(x)", "absolute value", |arg| Ok(Value::Float(scalar("abs", arg)?.abs()))),
        builtin("sqrt", "sqrt(x)", "square root", |arg| Ok(Value::Float(scalar("sqrt", arg)?.sqrt()))),
        builtin("round_to", "round_to(x, digits)", "x rounded to the given number of decimals", |arg| {
            match arg {
                Value::Tuple(args) if args.len() == 2 => {
                    let x = scalar("round_to", &args[0])?;
                    let factor = 10f64.powi(scalar("round_to", &args[1])? as i32);
                    Ok(Value::Float((x * factor).round() / factor))
                }
                _ => fail("round_to expects (x, digits)"),
            }
        }),
        builtin("unique", "unique(seq)", "distinct non-missing labels, sorted", |arg| {
            let mut distinct = labels(arg);
            distinct.sort();
            distinct.dedup();
            Ok(Value::Tuple(distinct.into_iter().map(Value::String).collect()))
        }),
        builtin("group", "group(values, labels, label)", "values whose label equals `label`", |arg| match arg {
            Value::Tuple(args) if args.len() == 3 => {
                let wanted = label(&args[2]).unwrap_or_default();
                let groups = grouped_numbers("group", &Value::Tuple(vec![args[0].clone(), args[1].clone()]))?;
                Ok(groups
                    .into_iter()
                    .find(|(l, _)| *l == wanted)
                    .map(|(_, v)| floats(&v))
                    .unwrap_or(Value::Tuple(Vec::new())))
            }
            _ => fail("group expects (values, labels, label)"),
        }),
        // descriptive
        unary("sum", "sum(seq)", "sum of values", |v| Ok(descriptive::sum(v))),
        unary("mean", "mean(seq)", "arithmetic mean", descriptive::mean),
        unary("median", "median(seq)", "median", descriptive::median),
        unary("variance", "variance(seq)", "sample variance (n - 1)", |v| descriptive::variance(v, 1)),
        unary("std", "std(seq)", "sample standard deviation (n - 1)", |v| descriptive::std_dev(v, 1)),
        unary("sem", "sem(seq)", "standard error of the mean", descriptive::sem),
        unary("min", "min(seq)", "smallest value", descriptive::min),
        unary("max", "max(seq)", "largest value", descriptive::max),
        unary("range", "range(seq)", "max - min", descriptive::range),
        unary("iqr", "iqr(seq)", "interquartile range", descriptive::iqr),
        unary("skewness", "skewness(seq)", "sample skewness (Fisher-Pearson)", descriptive::skewness),
        unary("kurtosis", "kurtosis(seq)", "excess kurtosis", descriptive::kurtosis),
        unary("cv", "cv(seq)", "coefficient of variation (std / mean)", descriptive::coefficient_of_variation),
        unary("mad", "mad(seq)", "median absolute deviation", descriptive::mad),
        builtin("quantile", "quantile(seq, q)", "q-th quantile with linear interpolation, 0 <= q <= 1", |arg| {
            let (seq, params) = split_params(arg);
            let q = param("quantile", &params, 0, 0.5)?;
            if !(0.0..=1.0).contains(&q) {
                return fail("quantile: q must lie in [0, 1]");
            }
            descriptive::quantile(&numbers("quantile", &seq)?, q)
                .map(Value::Float)
                .map_err(|e| stats_error("quantile", e))
        }),
        builtin("mode", "mode(seq)", "most frequent value (numbers or labels)", |arg| {
            match descriptive::mode(&labels(arg)) {
                Some(m) => Ok(datum_to_value(&Datum::parse(&m))),
                None => fail("mode: no values"),
            }
        }),
        builtin("n_unique", "n_unique(seq)", "number of distinct non-missing values", |arg| {
            let mut distinct = labels(arg);
            distinct.sort();
            distinct.dedup();
            Ok(Value::Int(distinct.len() as i64))
        }),
        builtin("value_counts", "value_counts(seq)", "((label, count), ...) most frequent first", |arg| {
            Ok(counts(descriptive::value_counts(&labels(arg))))
        }),
        builtin("proportion", "proportion(seq, label)", "share of non-missing cells equal to label", |arg| {
            match arg {
                Value::Tuple(args) if args.len() == 2 => {
                    let all = labels(&args[0]);
                    if all.is_empty() {
                        return fail("proportion: no values");
                    }
                    let wanted = label(&args[1]).unwrap_or_default();
                    let hits = all.iter().filter(|l| **l == wanted).count();
                    Ok(Value::Float(hits as f64 / all.len() as f64))
                }
                _ => fail("proportion expects (seq, label)"),
            }
        }),
        builtin("entropy", "entropy(seq)", "Shannon entropy of the label distribution in bits", |arg| {
            Ok(Value::Float(descriptive::entropy(&labels(arg))))
        }),
        // normality and one-sample tests
        builtin("shapiro", "shapiro(seq)", "Shapiro-Wilk normality test -> (W, p)", |arg| {
            hypothesis::shapiro_wilk(&numbers("shapiro", arg)?)
                .map(outcome)
                .map_err(|e| stats_error("shapiro", e))
        }),
        builtin("jarque_bera", "jarque_bera(seq)", "Jarque-Bera normality test -> (JB, p)", |arg| {
            hypothesis::jarque_bera(&numbers("jarque_bera", arg)?)
                .map(outcome)
                .map_err(|e| stats_error("jarque_bera", e))
        }),
        builtin("ks_normal", "ks_normal(seq)", "Kolmogorov-Smirnov against a fitted normal -> (D, p)", |arg| {
            let values = numbers("ks_normal", arg)?;
            let mu = descriptive::mean(&values).map_err(|e| stats_error("ks_normal", e))?;
            let sigma = descriptive::std_dev(&values, 1).map_err(|e| stats_error("ks_normal", e))?;
            hypothesis::ks_normal(&values, mu, sigma)
                .map(outcome)
                .map_err(|e| stats_error("ks_normal", e))
        }),
        builtin("ttest_1samp", "ttest_1samp(seq, mu)", "one-sample t-test against mu -> (t, p)", |arg| {
            let (seq, params) = split_params(arg);
            let mu = param("ttest_1samp", &params, 0, 0.0)?;
            hypothesis::one_sample_t_test(&numbers("ttest_1samp", &seq)?, mu)
                .map(outcome)
                .map_err(|e| stats_error("ttest_1samp", e))
        }),
        builtin("chi2_gof", "chi2_gof(seq)", "chi-square goodness of fit of label counts to uniform -> (chi2, p)", |arg| {
            let observed: Vec<f64> = descriptive::value_counts(&labels(arg))
                .into_iter()
                .map(|(_, c)| c as f64)
                .collect();
            hypothesis::chi2_goodness_of_fit(&observed, None)
                .map(outcome)
                .map_err(|e| stats_error("chi2_gof", e))
        }),
        builtin("prop_ztest", "prop_ztest(seq, label, p0)", "z-test of the share of `label` against p0 -> (z, p)", |arg| {
            match arg {
                Value::Tuple(args) if args.len() == 3 => {
                    let all = labels(&args[0]);
                    let wanted = label(&args[1]).unwrap_or_default();
                    let hits = all.iter().filter(|l| **l == wanted).count() as f64;
                    let p0 = scalar("prop_ztest", &args[2])?;
                    hypothesis::proportion_z_test(hits, all.len() as f64, p0)
                        .map(outcome)
                        .map_err(|e| stats_error("prop_ztest", e))
                }
                _ => fail("prop_ztest expects (seq, label, p0)"),
            }
        }),
        // two-sample and association tests
        two_sample_test("ttest_ind", "ttest_ind(a, b)", "Welch two-sample t-test -> (t, p)", hypothesis::welch_t_test),
        two_sample_test("ttest_student", "ttest_student(a, b)", "equal-variance two-sample t-test -> (t, p)", hypothesis::student_t_test),
        two_sample_test("mannwhitney", "mannwhitney(a, b)", "Mann-Whitney U test -> (U, p)", hypothesis::mann_whitney_u),
        two_sample_test("ks_2samp", "ks_2samp(a, b)", "two-sample Kolmogorov-Smirnov test -> (D, p)", hypothesis::ks_two_sample),
        paired_test("ttest_paired", "ttest_paired(a, b)", "paired t-test -> (t, p)", hypothesis::paired_t_test),
        paired_test("pearson", "pearson(x, y)", "Pearson correlation -> (r, p)", hypothesis::pearson),
        paired_test("spearman", "spearman(x, y)", "Spearman rank correlation -> (rho, p)", hypothesis::spearman),
        builtin("covariance", "covariance(x, y)", "sample covariance", |arg| {
            let (a, b) = paired_numbers("covariance", arg)?;
            hypothesis::covariance(&a, &b).map(Value::Float).map_err(|e| stats_error("covariance", e))
        }),
        builtin("cohens_d", "cohens_d(a, b)", "Cohen's d effect size with pooled std", |arg| {
            let (a, b) = two_sequences("cohens_d", arg)?;
            hypothesis::cohens_d(&numbers("cohens_d", &a)?, &numbers("cohens_d", &b)?)
                .map(Value::Float)
                .map_err(|e| stats_error("cohens_d", e))
        }),
        builtin("anova", "anova(values, labels)", "one-way ANOVA across label groups -> (F, p, eta_squared)", |arg| {
            let groups: Vec<Vec<f64>> = grouped_numbers("anova", arg)?.into_iter().map(|(_, g)| g).collect();
            let res = hypothesis::one_way_anova(&groups).map_err(|e| stats_error("anova", e))?;
            Ok(floats(&[res.test.statistic, res.test.p_value, res.eta_squared]))
        }),
        builtin("kruskal", "kruskal(values, labels)", "Kruskal-Wallis H test across label groups -> (H, p)", |arg| {
            let groups: Vec<Vec<f64>> = grouped_numbers("kruskal", arg)?.into_iter().map(|(_, g)| g).collect();
            hypothesis::kruskal_wallis(&groups).map(outcome).map_err(|e| stats_error("kruskal", e))
        }),
        builtin("levene", "levene(values, labels)", "Levene (median) test for equal variances -> (W, p)", |arg| {
            let groups: Vec<Vec<f64>> = grouped_numbers("levene", arg)?.into_iter().map(|(_, g)| g).collect();
            hypothesis::levene(&groups).map(outcome).map_err(|e| stats_error("levene", e))
        }),
        builtin("chi2_independence", "chi2_independence(a, b)", "chi-square independence test -> (chi2, p, dof, cramers_v)", |arg| {
            let (a, b) = paired_labels("chi2_independence", arg)?;
            let res = hypothesis::chi2_independence(&a, &b).map_err(|e| stats_error("chi2_independence", e))?;
            Ok(floats(&[res.test.statistic, res.test.p_value, res.dof, res.cramers_v]))
        }),
        // cleaning
        outlier_detector("iqr_outliers", "iqr_outliers(seq[, k])", "row indexes outside the Tukey fences (k defaults to 1.5)", 1.5, cleaning::iqr_outliers),
        outlier_detector("zscore_outliers", "zscore_outliers(seq[, threshold])", "row indexes with |z| above threshold (default 3)", 3.0, cleaning::zscore_outliers),
        outlier_detector(
            "modified_zscore_outliers",
            "modified_zscore_outliers(seq[, threshold])",
            "row indexes with MAD-based |z| above threshold (default 3.5)",
            3.5,
            cleaning::modified_zscore_outliers,
        ),
        filler("fill_mean", "fill_mean(seq)", "missing cells replaced by the mean", |v| {
            cleaning::fill_missing(v, cleaning::FillStrategy::Mean)
        }),
        filler("fill_median", "fill_median(seq)", "missing cells replaced by the median", |v| {
            cleaning::fill_missing(v, cleaning::FillStrategy::Median)
        }),
        filler("ffill", "ffill(seq)", "missing cells take the previous value", cleaning::forward_fill),
        filler("interpolate", "interpolate(seq)", "missing cells linearly interpolated", cleaning::interpolate_linear),
        builtin("fill_constant", "fill_constant(seq, c)", "missing cells replaced by c", |arg| {
            let (seq, params) = split_params(arg);
            let c = param("fill_constant", &params, 0, 0.0)?;
            cleaning::fill_missing(&optional_numbers("fill_constant", &seq)?, cleaning::FillStrategy::Constant(c))
                .map(|v| floats(&v))
                .map_err(|e| stats_error("fill_constant", e))
        }),
        builtin("fill_mode", "fill_mode(seq)", "missing cells replaced by the most frequent value", |arg| {
            cleaning::fill_mode(&optional_labels(arg))
                .map(|filled| Value::Tuple(filled.iter().map(|l| datum_to_value(&Datum::parse(l))).collect()))
                .map_err(|e| stats_error("fill_mode", e))
        }),
    ]
}

// ── plotting ─────────────────────────────────────────────────────────────────

fn with_canvas<T>(canvas: &Mutex<PlotCanvas>, f: impl FnOnce(&mut PlotCanvas) -> T) -> EvalexprResult<T> {
    let mut guard = canvas
        .lock()
        .map_err(|_| EvalexprError::CustomMessage("plot canvas is unavailable".to_string()))?;
    Ok(f(&mut guard))
}

fn text(name: &str, value: &ExprValue) -> EvalexprResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => fail(format!("{}: expected a string, found {}", name, other)),
    }
}

/// Figure-building functions bound to one canvas
pub fn plotting(canvas: Arc<Mutex<PlotCanvas>>) -> Vec<Builtin> {
    let c = canvas;
    vec![
        builtin("histogram", "histogram(seq[, bins])", "histogram layer; bins 0 or omitted picks Sturges' rule", {
            let c = c.clone();
            move |arg| {
                let (seq, params) = split_params(arg);
                let values = numbers("histogram", &seq)?;
                let bins = param("histogram", &params, 0, 0.0)?.max(0.0) as usize;
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Histogram { bins: histogram(&values, bins) }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("boxplot", "boxplot(seq)", "box-and-whisker layer", {
            let c = c.clone();
            move |arg| {
                let values = numbers("boxplot", arg)?;
                let Some(summary) = BoxSummary::from_values(&values) else {
                    return fail("boxplot: no values");
                };
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Box { summary }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("grouped_boxplot", "grouped_boxplot(values, labels)", "one box per label group", {
            let c = c.clone();
            move |arg| {
                let groups = grouped_numbers("grouped_boxplot", arg)?
                    .into_iter()
                    .filter_map(|(l, v)| BoxSummary::from_values(&v).map(|s| (l, s)))
                    .collect();
                with_canvas(&c, |canvas| canvas.add_layer(Layer::GroupedBox { groups }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("bar", "bar(seq)", "bar chart of label counts", {
            let c = c.clone();
            move |arg| {
                let categories = descriptive::value_counts(&labels(arg));
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Bar { categories }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("pie", "pie(seq)", "pie chart of label shares", {
            let c = c.clone();
            move |arg| {
                let categories = descriptive::value_counts(&labels(arg));
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Pie { categories }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("scatter", "scatter(x, y)", "scatter layer over complete rows", {
            let c = c.clone();
            move |arg| {
                let (x, y) = paired_numbers("scatter", arg)?;
                let points = x.into_iter().zip(y).collect();
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Scatter { points }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("line", "line(seq)", "line layer in row order, gaps for missing cells", {
            let c = c.clone();
            move |arg| {
                let values = optional_numbers("line", arg)?;
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Line { values }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("heatmap", "heatmap(a, b)", "contingency-table heatmap of two label sequences", {
            let c = c.clone();
            move |arg| {
                let (a, b) = paired_labels("heatmap", arg)?;
                let mut rows = a.clone();
                rows.sort();
                rows.dedup();
                let mut columns = b.clone();
                columns.sort();
                columns.dedup();
                let mut grid = vec![vec![0usize; columns.len()]; rows.len()];
                for (x, y) in a.iter().zip(&b) {
                    if let (Ok(r), Ok(k)) = (rows.binary_search(x), columns.binary_search(y)) {
                        grid[r][k] += 1;
                    }
                }
                with_canvas(&c, |canvas| canvas.add_layer(Layer::Heatmap { rows, columns, counts: grid }))?;
                Ok(Value::Empty)
            }
        }),
        builtin("title", "title(text)", "figure title", {
            let c = c.clone();
            move |arg| {
                let t = text("title", arg)?;
                with_canvas(&c, |canvas| canvas.set_title(t))?;
                Ok(Value::Empty)
            }
        }),
        builtin("xlabel", "xlabel(text)", "x axis label", {
            let c = c.clone();
            move |arg| {
                let t = text("xlabel", arg)?;
                with_canvas(&c, |canvas| canvas.set_x_label(t))?;
                Ok(Value::Empty)
            }
        }),
        builtin("ylabel", "ylabel(text)", "y axis label", {
            let c = c.clone();
            move |arg| {
                let t = text("ylabel", arg)?;
                with_canvas(&c, |canvas| canvas.set_y_label(t))?;
                Ok(Value::Empty)
            }
        }),
        builtin("save_plot", "save_plot(name)", "write the current figure as <name>.json and start a new one", {
            let c = c.clone();
            move |arg| {
                let name = text("save_plot", arg)?;
                let saved = with_canvas(&c, |canvas| canvas.save(&name))?;
                match saved {
                    Ok(path) => Ok(Value::String(path.display().to_string())),
                    Err(message) => fail(message),
                }
            }
        }),
    ]
}
