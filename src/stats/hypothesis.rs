//! Hypothesis tests and effect sizes.
//!
//! Two-sided p-values throughout. Tests that approximate a sampling
//! distribution (rank tests, Kolmogorov-Smirnov) use the large-sample form.

use std::collections::BTreeMap;

use super::descriptive::{mean, median, ranks, sorted, variance};
use super::distributions::{
    chi2_sf, f_sf, kolmogorov_sf, normal_cdf, normal_ppf, normal_sf, student_t_two_sided,
};
use super::{require, StatsError, StatsResult, TestOutcome};

/// One-way ANOVA result with its effect size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnovaOutcome {
    pub test: TestOutcome,
    pub df_between: f64,
    pub df_within: f64,
    pub eta_squared: f64,
}

/// Chi-square test of independence on a contingency table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContingencyOutcome {
    pub test: TestOutcome,
    pub dof: f64,
    pub cramers_v: f64,
}

fn sum_of_squares(values: &[f64]) -> StatsResult<f64> {
    let m = mean(values)?;
    Ok(values.iter().map(|v| (v - m).powi(2)).sum())
}

pub fn covariance(x: &[f64], y: &[f64]) -> StatsResult<f64> {
    paired("covariance", x, y, 2)?;
    let (mx, my) = (mean(x)?, mean(y)?);
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| (a - mx) * (b - my)).sum();
    Ok(sxy / (x.len() - 1) as f64)
}

fn paired(name: &'static str, x: &[f64], y: &[f64], required: usize) -> StatsResult<()> {
    if x.len() != y.len() {
        return Err(StatsError::Degenerate {
            name,
            reason: format!("samples differ in length ({} vs {})", x.len(), y.len()),
        });
    }
    require(name, x, required)
}

/// Pearson product-moment correlation; the statistic is `r`.
///
/// A perfect linear relationship reports a p-value of exactly 0.
pub fn pearson(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    paired("pearson", x, y, 3)?;
    let (mx, my) = (mean(x)?, mean(y)?);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (a, b) in x.iter().zip(y) {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return Err(StatsError::ZeroVariance("pearson"));
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    if r.abs() >= 1.0 {
        return Ok(TestOutcome::new(r, 0.0));
    }
    let df = (x.len() - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    Ok(TestOutcome::new(r, student_t_two_sided(t, df)))
}

/// Spearman rank correlation; the statistic is `rho`.
pub fn spearman(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    paired("spearman", x, y, 3)?;
    pearson(&ranks(x), &ranks(y))
}

pub fn one_sample_t_test(values: &[f64], population_mean: f64) -> StatsResult<TestOutcome> {
    require("one_sample_t_test", values, 2)?;
    let n = values.len() as f64;
    let se = (variance(values, 1)? / n).sqrt();
    if se == 0.0 {
        return Err(StatsError::ZeroVariance("one_sample_t_test"));
    }
    let t = (mean(values)? - population_mean) / se;
    Ok(TestOutcome::new(t, student_t_two_sided(t, n - 1.0)))
}

pub fn paired_t_test(x: &[f64], y: &[f64]) -> StatsResult<TestOutcome> {
    paired("paired_t_test", x, y, 2)?;
    let differences: Vec<f64> = x.iter().zip(y).map(|(a, b)| a - b).collect();
    one_sample_t_test(&differences, 0.0)
}

/// Welch's unequal-variance t-test
pub fn welch_t_test(a: &[f64], b: &[f64]) -> StatsResult<TestOutcome> {
    require("welch_t_test", a, 2)?;
    require("welch_t_test", b, 2)?;
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let (va, vb) = (variance(a, 1)? / na, variance(b, 1)? / nb);
    let se2 = va + vb;
    if se2 == 0.0 {
        return Err(StatsError::ZeroVariance("welch_t_test"));
    }
    let t = (mean(a)? - mean(b)?) / se2.sqrt();
    let df = se2 * se2 / (va * va / (na - 1.0) + vb * vb / (nb - 1.0));
    Ok(TestOutcome::new(t, student_t_two_sided(t, df)))
}

/// Student's t-test assuming equal variances
pub fn student_t_test(a: &[f64], b: &[f64]) -> StatsResult<TestOutcome> {
    require("student_t_test", a, 2)?;
    require("student_t_test", b, 2)?;
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let df = na + nb - 2.0;
    let pooled = ((na - 1.0) * variance(a, 1)? + (nb - 1.0) * variance(b, 1)?) / df;
    let se = (pooled * (1.0 / na + 1.0 / nb)).sqrt();
    if se == 0.0 {
        return Err(StatsError::ZeroVariance("student_t_test"));
    }
    let t = (mean(a)? - mean(b)?) / se;
    Ok(TestOutcome::new(t, student_t_two_sided(t, df)))
}

/// Cohen's d with the pooled standard deviation
pub fn cohens_d(a: &[f64], b: &[f64]) -> StatsResult<f64> {
    require("cohens_d", a, 2)?;
    require("cohens_d", b, 2)?;
    let (na, nb) = (a.len() as f64, b.len() as f64);
    let pooled = (((na - 1.0) * variance(a, 1)? + (nb - 1.0) * variance(b, 1)?) / (na + nb - 2.0)).sqrt();
    if pooled == 0.0 {
        return Err(StatsError::ZeroVariance("cohens_d"));
    }
    Ok((mean(a)? - mean(b)?) / pooled)
}

pub fn one_way_anova(groups: &[Vec<f64>]) -> StatsResult<AnovaOutcome> {
    if groups.len() < 2 {
        return Err(StatsError::Degenerate {
            name: "one_way_anova",
            reason: format!("needs at least 2 groups, got {}", groups.len()),
        });
    }
    for group in groups {
        require("one_way_anova", group, 1)?;
    }

    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let grand = mean(&all)?;
    let ss_total = sum_of_squares(&all)?;
    let mut ss_between = 0.0;
    for group in groups {
        ss_between += group.len() as f64 * (mean(group)? - grand).powi(2);
    }
    let ss_within = ss_total - ss_between;

    let df_between = (groups.len() - 1) as f64;
    let df_within = (all.len() - groups.len()) as f64;
    if df_within <= 0.0 {
        return Err(StatsError::InsufficientData {
            name: "one_way_anova",
            required: groups.len() + 1,
            actual: all.len(),
        });
    }
    if ss_total == 0.0 {
        return Err(StatsError::ZeroVariance("one_way_anova"));
    }

    let (f, p) = if ss_within <= 0.0 {
        (f64::INFINITY, 0.0)
    } else {
        let f = (ss_between / df_between) / (ss_within / df_within);
        (f, f_sf(f, df_between, df_within))
    };

    Ok(AnovaOutcome {
        test: TestOutcome::new(f, p),
        df_between,
        df_within,
        eta_squared: ss_between / ss_total,
    })
}

/// Brown-Forsythe variant of Levene's test for equal variances
pub fn levene(groups: &[Vec<f64>]) -> StatsResult<TestOutcome> {
    let mut deviations = Vec::with_capacity(groups.len());
    for group in groups {
        let center = median(group)?;
        deviations.push(group.iter().map(|v| (v - center).abs()).collect::<Vec<f64>>());
    }
    one_way_anova(&deviations).map(|outcome| outcome.test)
}

/// Splits `values` by the label at the same position, groups in label order.
pub fn groups_by_label<S: AsRef<str>>(values: &[f64], labels: &[S]) -> Vec<(String, Vec<f64>)> {
    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for (value, label) in values.iter().zip(labels) {
        groups.entry(label.as_ref().to_string()).or_default().push(*value);
    }
    groups.into_iter().collect()
}

/// Chi-square test of independence between two label sequences
pub fn chi2_independence<S: AsRef<str>>(a: &[S], b: &[S]) -> StatsResult<ContingencyOutcome> {
    if a.len() != b.len() {
        return Err(StatsError::Degenerate {
            name: "chi2_independence",
            reason: format!("samples differ in length ({} vs {})", a.len(), b.len()),
        });
    }
    if a.len() < 2 {
        return Err(StatsError::InsufficientData { name: "chi2_independence", required: 2, actual: a.len() });
    }

    let mut table: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    let mut rows: BTreeMap<&str, f64> = BTreeMap::new();
    let mut cols: BTreeMap<&str, f64> = BTreeMap::new();
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (x.as_ref(), y.as_ref());
        *table.entry((x, y)).or_default() += 1.0;
        *rows.entry(x).or_default() += 1.0;
        *cols.entry(y).or_default() += 1.0;
    }
    if rows.len() < 2 || cols.len() < 2 {
        return Err(StatsError::Degenerate {
            name: "chi2_independence",
            reason: "each variable needs at least two categories".to_string(),
        });
    }

    let n = a.len() as f64;
    let mut statistic = 0.0;
    for (row, row_total) in &rows {
        for (col, col_total) in &cols {
            let expected = row_total * col_total / n;
            let observed = table.get(&(*row, *col)).copied().unwrap_or(0.0);
            statistic += (observed - expected).powi(2) / expected;
        }
    }

    let dof = ((rows.len() - 1) * (cols.len() - 1)) as f64;
    let k = rows.len().min(cols.len()) as f64;
    Ok(ContingencyOutcome {
        test: TestOutcome::new(statistic, chi2_sf(statistic, dof)),
        dof,
        cramers_v: (statistic / (n * (k - 1.0))).sqrt().min(1.0),
    })
}

/// Goodness of fit against `expected` counts, or a uniform distribution.
pub fn chi2_goodness_of_fit(observed: &[f64], expected: Option<&[f64]>) -> StatsResult<TestOutcome> {
    require("chi2_goodness_of_fit", observed, 2)?;
    let total: f64 = observed.iter().sum();
    let uniform = vec![total / observed.len() as f64; observed.len()];
    let expected = expected.unwrap_or(&uniform);
    if expected.len() != observed.len() {
        return Err(StatsError::Degenerate {
            name: "chi2_goodness_of_fit",
            reason: "observed and expected differ in length".to_string(),
        });
    }
    if expected.iter().any(|e| *e <= 0.0) {
        return Err(StatsError::Degenerate {
            name: "chi2_goodness_of_fit",
            reason: "expected counts must be positive".to_string(),
        });
    }
    let statistic: f64 = observed.iter().zip(expected).map(|(o, e)| (o - e).powi(2) / e).sum();
    let dof = (observed.len() - 1) as f64;
    Ok(TestOutcome::new(statistic, chi2_sf(statistic, dof)))
}

fn tie_term(values: &[f64]) -> f64 {
    let s = sorted(values);
    let mut total = 0.0;
    let mut i = 0;
    while i < s.len() {
        let mut j = i;
        while j + 1 < s.len() && s[j + 1] == s[i] {
            j += 1;
        }
        let t = (j - i + 1) as f64;
        total += t * t * t - t;
        i = j + 1;
    }
    total
}

/// Mann-Whitney U test, normal approximation with tie and continuity
/// corrections. The statistic is `U` of the first sample.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> StatsResult<TestOutcome> {
    require("mann_whitney_u", a, 1)?;
    require("mann_whitney_u", b, 1)?;
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let combined: Vec<f64> = a.iter().chain(b).copied().collect();
    let r = ranks(&combined);
    let r1: f64 = r[..a.len()].iter().sum();
    let u1 = r1 - n1 * (n1 + 1.0) / 2.0;
    let u2 = n1 * n2 - u1;

    let n = n1 + n2;
    let mu = n1 * n2 / 2.0;
    let sigma = (n1 * n2 / 12.0 * ((n + 1.0) - tie_term(&combined) / (n * (n - 1.0)))).sqrt();
    if sigma == 0.0 {
        return Err(StatsError::ZeroVariance("mann_whitney_u"));
    }
    let z = (u1.max(u2) - mu - 0.5) / sigma;
    Ok(TestOutcome::new(u1, 2.0 * normal_sf(z)))
}

/// Kruskal-Wallis H test with tie correction
pub fn kruskal_wallis(groups: &[Vec<f64>]) -> StatsResult<TestOutcome> {
    if groups.len() < 2 {
        return Err(StatsError::Degenerate {
            name: "kruskal_wallis",
            reason: format!("needs at least 2 groups, got {}", groups.len()),
        });
    }
    for group in groups {
        require("kruskal_wallis", group, 1)?;
    }
    let combined: Vec<f64> = groups.iter().flatten().copied().collect();
    let n = combined.len() as f64;
    let r = ranks(&combined);

    let mut offset = 0;
    let mut h = 0.0;
    for group in groups {
        let rank_sum: f64 = r[offset..offset + group.len()].iter().sum();
        h += rank_sum * rank_sum / group.len() as f64;
        offset += group.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    let correction = 1.0 - tie_term(&combined) / (n * n * n - n);
    if correction <= 0.0 {
        return Err(StatsError::ZeroVariance("kruskal_wallis"));
    }
    h /= correction;
    Ok(TestOutcome::new(h, chi2_sf(h, (groups.len() - 1) as f64)))
}

fn ecdf(sorted_values: &[f64], x: f64) -> f64 {
    sorted_values.partition_point(|v| *v <= x) as f64 / sorted_values.len() as f64
}

/// Two-sample Kolmogorov-Smirnov test; the statistic is `D`.
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> StatsResult<TestOutcome> {
    require("ks_two_sample", a, 1)?;
    require("ks_two_sample", b, 1)?;
    let (sa, sb) = (sorted(a), sorted(b));
    let d = sa
        .iter()
        .chain(&sb)
        .map(|x| (ecdf(&sa, *x) - ecdf(&sb, *x)).abs())
        .fold(0.0, f64::max);

    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let en = (n1 * n2 / (n1 + n2)).sqrt();
    Ok(TestOutcome::new(d, kolmogorov_sf((en + 0.12 + 0.11 / en) * d)))
}

/// One-sample Kolmogorov-Smirnov test against a normal distribution.
pub fn ks_normal(values: &[f64], mu: f64, sigma: f64) -> StatsResult<TestOutcome> {
    require("ks_normal", values, 1)?;
    if sigma <= 0.0 {
        return Err(StatsError::Degenerate { name: "ks_normal", reason: "sigma must be positive".to_string() });
    }
    let s = sorted(values);
    let n = s.len() as f64;
    let mut d: f64 = 0.0;
    for (i, x) in s.iter().enumerate() {
        let cdf = normal_cdf((x - mu) / sigma);
        d = d.max((i as f64 + 1.0) / n - cdf).max(cdf - i as f64 / n);
    }
    let en = n.sqrt();
    Ok(TestOutcome::new(d, kolmogorov_sf((en + 0.12 + 0.11 / en) * d)))
}

/// Jarque-Bera normality test
pub fn jarque_bera(values: &[f64]) -> StatsResult<TestOutcome> {
    let s = super::descriptive::skewness(values)?;
    let k = super::descriptive::kurtosis(values)?;
    let n = values.len() as f64;
    let jb = n / 6.0 * (s * s + k * k / 4.0);
    Ok(TestOutcome::new(jb, chi2_sf(jb, 2.0)))
}

fn poly(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Shapiro-Wilk normality test (Royston's approximation, 3 <= n <= 5000).
pub fn shapiro_wilk(values: &[f64]) -> StatsResult<TestOutcome> {
    const C1: [f64; 6] = [0.0, 0.221_157, -0.147_981, -2.071_190, 4.434_685, -2.706_056];
    const C2: [f64; 6] = [0.0, 0.042_981, -0.293_762, -1.752_461, 5.682_633, -3.582_633];

    require("shapiro_wilk", values, 3)?;
    if values.len() > 5000 {
        return Err(StatsError::Degenerate {
            name: "shapiro_wilk",
            reason: format!("supports at most 5000 values, got {}", values.len()),
        });
    }
    let x = sorted(values);
    let n = x.len();
    let nf = n as f64;
    let half = n / 2;

    if x[n - 1] - x[0] == 0.0 {
        return Err(StatsError::ZeroVariance("shapiro_wilk"));
    }

    let mut a = vec![0.0; half];
    if n == 3 {
        a[0] = 0.5f64.sqrt();
    } else {
        let m: Vec<f64> = (1..=half).map(|i| normal_ppf((i as f64 - 0.375) / (nf + 0.25))).collect();
        let summ2 = 2.0 * m.iter().map(|v| v * v).sum::<f64>();
        let ssumm2 = summ2.sqrt();
        let rsn = 1.0 / nf.sqrt();
        let a1 = poly(&C1, rsn) - m[0] / ssumm2;

        let (first, fac) = if n > 5 {
            let a2 = -m[1] / ssumm2 + poly(&C2, rsn);
            let fac = ((summ2 - 2.0 * m[0] * m[0] - 2.0 * m[1] * m[1]) / (1.0 - 2.0 * a1 * a1 - 2.0 * a2 * a2)).sqrt();
            a[1] = a2;
            (2, fac)
        } else {
            let fac = ((summ2 - 2.0 * m[0] * m[0]) / (1.0 - 2.0 * a1 * a1)).sqrt();
            (1, fac)
        };
        a[0] = a1;
        for i in first..half {
            a[i] = -m[i] / fac;
        }
    }

    let numerator: f64 = (0..half).map(|i| a[i] * (x[n - 1 - i] - x[i])).sum();
    let ss = sum_of_squares(&x)?;
    let w = (numerator * numerator / ss).min(1.0);

    let p = if n == 3 {
        let pi6 = 6.0 / std::f64::consts::PI;
        let stqr = std::f64::consts::PI / 3.0;
        (pi6 * (w.sqrt().asin() - stqr)).max(0.0)
    } else {
        let y = (1.0 - w).ln();
        if n <= 11 {
            let gamma = poly(&[-2.273, 0.459], nf);
            if y >= gamma {
                1e-99
            } else {
                let y = -(gamma - y).ln();
                let m = poly(&[0.544, -0.399_78, 0.025_054, -6.714e-4], nf);
                let s = poly(&[1.3822, -0.778_57, 0.062_767, -0.002_032_2], nf).exp();
                normal_sf((y - m) / s)
            }
        } else {
            let ln_n = nf.ln();
            let m = poly(&[-1.5861, -0.310_82, -0.083_751, 0.003_891_5], ln_n);
            let s = poly(&[-0.4803, -0.082_676, 0.003_030_2], ln_n).exp();
            normal_sf((y - m) / s)
        }
    };
    Ok(TestOutcome::new(w, p))
}

/// One-sample z-test for a proportion against `p0`
pub fn proportion_z_test(successes: f64, trials: f64, p0: f64) -> StatsResult<TestOutcome> {
    if trials <= 0.0 || successes < 0.0 || successes > trials {
        return Err(StatsError::Degenerate {
            name: "proportion_z_test",
            reason: format!("invalid counts {}/{}", successes, trials),
        });
    }
    if p0 <= 0.0 || p0 >= 1.0 {
        return Err(StatsError::Degenerate { name: "proportion_z_test", reason: "p0 must lie in (0, 1)".to_string() });
    }
    let z = (successes / trials - p0) / (p0 * (1.0 - p0) / trials).sqrt();
    Ok(TestOutcome::new(z, 2.0 * normal_sf(z.abs())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_pearson_perfect_and_partial() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0];
        let perfect = pearson(&x, &y).unwrap();
        assert_eq!(perfect.statistic, 1.0);
        assert_eq!(perfect.p_value, 0.0);

        let noisy = pearson(&x, &[2.0, 1.0, 4.0, 3.0, 5.0]).unwrap();
        assert!(close(noisy.statistic, 0.8, 1e-12));
        assert!(close(noisy.p_value, 0.104_088, 1e-5));
        assert_eq!(pearson(&x, &[1.0; 5]), Err(StatsError::ZeroVariance("pearson")));
    }

    #[test]
    fn test_spearman_is_rank_based() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0];
        assert_eq!(spearman(&x, &y).unwrap().statistic, 1.0);
    }

    #[test]
    fn test_welch_t_test() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let b = [3.0, 4.0, 5.0, 6.0, 7.0];
        let outcome = welch_t_test(&a, &b).unwrap();
        assert!(close(outcome.statistic, -2.0, 1e-12));
        assert!(close(outcome.p_value, 0.080_516, 1e-5));
        assert!(close(cohens_d(&a, &b).unwrap(), -2.0 / 2.5f64.sqrt(), 1e-12));
    }

    #[test]
    fn test_anova_with_effect_size() {
        let groups = vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]];
        let outcome = one_way_anova(&groups).unwrap();
        assert!(close(outcome.test.statistic, 27.0, 1e-10));
        assert!(close(outcome.eta_squared, 0.9, 1e-12));
        assert!(outcome.test.p_value < 0.01);
        assert!(one_way_anova(&groups[..1]).is_err());
    }

    #[test]
    fn test_chi2_independence_association() {
        let a = ["x", "x", "x", "x", "y", "y", "y", "y"];
        let b = ["p", "p", "p", "p", "q", "q", "q", "q"];
        let outcome = chi2_independence(&a, &b).unwrap();
        assert!(close(outcome.test.statistic, 8.0, 1e-12));
        assert!(close(outcome.cramers_v, 1.0, 1e-12));
        assert_eq!(outcome.dof, 1.0);
        assert!(chi2_independence(&["x", "x"], &["p", "q"]).is_err());
    }

    #[test]
    fn test_goodness_of_fit_uniform() {
        let outcome = chi2_goodness_of_fit(&[10.0, 10.0, 10.0], None).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert!(close(outcome.p_value, 1.0, 1e-12));
    }

    #[test]
    fn test_rank_tests_detect_shift() {
        let a: Vec<f64> = (0..20).map(f64::from).collect();
        let b: Vec<f64> = (30..50).map(f64::from).collect();
        let mw = mann_whitney_u(&a, &b).unwrap();
        assert_eq!(mw.statistic, 0.0);
        assert!(mw.p_value < 1e-6);

        let kw = kruskal_wallis(&[a.clone(), b.clone()]).unwrap();
        assert!(kw.p_value < 1e-6);

        let same = mann_whitney_u(&a, &a).unwrap();
        assert!(same.p_value > 0.9);
    }

    #[test]
    fn test_ks_two_sample() {
        let a: Vec<f64> = (0..50).map(f64::from).collect();
        let identical = ks_two_sample(&a, &a).unwrap();
        assert_eq!(identical.statistic, 0.0);
        assert_eq!(identical.p_value, 1.0);

        let shifted: Vec<f64> = a.iter().map(|v| v + 100.0).collect();
        let disjoint = ks_two_sample(&a, &shifted).unwrap();
        assert_eq!(disjoint.statistic, 1.0);
        assert!(disjoint.p_value < 1e-6);
    }

    #[test]
    fn test_shapiro_wilk_reference_values() {
        let uniform_small = [1.0, 2.0, 3.0];
        let outcome = shapiro_wilk(&uniform_small).unwrap();
        assert!(close(outcome.statistic, 1.0, 1e-12));

        let normalish: Vec<f64> = (1..=20).map(|i| normal_ppf(i as f64 / 21.0)).collect();
        let outcome = shapiro_wilk(&normalish).unwrap();
        assert!(outcome.statistic > 0.97);
        assert!(outcome.p_value > 0.5);

        let skewed: Vec<f64> = (0..20).map(|i| (i as f64 / 2.0).exp()).collect();
        assert!(shapiro_wilk(&skewed).unwrap().p_value < 0.01);
    }

    #[test]
    fn test_proportion_z_test() {
        let outcome = proportion_z_test(50.0, 100.0, 0.5).unwrap();
        assert_eq!(outcome.statistic, 0.0);
        assert!(close(outcome.p_value, 1.0, 1e-12));
        assert!(proportion_z_test(5.0, 4.0, 0.5).is_err());
    }

    #[test]
    fn test_groups_by_label_orders_labels() {
        let groups = groups_by_label(&[1.0, 2.0, 3.0], &["b", "a", "b"]);
        assert_eq!(groups[0], ("a".to_string(), vec![2.0]));
        assert_eq!(groups[1], ("b".to_string(), vec![1.0, 3.0]));
    }
}
