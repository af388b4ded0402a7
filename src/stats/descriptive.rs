use std::collections::BTreeMap;

use super::{require, StatsError, StatsResult};

pub fn sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

pub fn mean(values: &[f64]) -> StatsResult<f64> {
    require("mean", values, 1)?;
    Ok(sum(values) / values.len() as f64)
}

/// Variance with `ddof` delta degrees of freedom (1 = sample variance).
pub fn variance(values: &[f64], ddof: usize) -> StatsResult<f64> {
    require("variance", values, ddof + 1)?;
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Ok(ss / (values.len() - ddof) as f64)
}

pub fn std_dev(values: &[f64], ddof: usize) -> StatsResult<f64> {
    variance(values, ddof).map(f64::sqrt)
}

/// Standard error of the mean
pub fn sem(values: &[f64]) -> StatsResult<f64> {
    Ok(std_dev(values, 1)? / (values.len() as f64).sqrt())
}

pub fn min(values: &[f64]) -> StatsResult<f64> {
    require("min", values, 1)?;
    Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
}

pub fn max(values: &[f64]) -> StatsResult<f64> {
    require("max", values, 1)?;
    Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Quantile of pre-sorted values with linear interpolation between order
/// statistics (the common "type 7" definition).
///
/// # Panics
///
/// Panics if `sorted_values` is empty.
pub fn quantile_sorted(sorted_values: &[f64], q: f64) -> f64 {
    assert!(!sorted_values.is_empty(), "quantile of empty data");
    let q = q.clamp(0.0, 1.0);
    let position = q * (sorted_values.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * weight
}

pub fn quantile(values: &[f64], q: f64) -> StatsResult<f64> {
    require("quantile", values, 1)?;
    Ok(quantile_sorted(&sorted(values), q))
}

pub fn median(values: &[f64]) -> StatsResult<f64> {
    quantile(values, 0.5)
}

pub fn iqr(values: &[f64]) -> StatsResult<f64> {
    require("iqr", values, 1)?;
    let s = sorted(values);
    Ok(quantile_sorted(&s, 0.75) - quantile_sorted(&s, 0.25))
}

pub fn range(values: &[f64]) -> StatsResult<f64> {
    Ok(max(values)? - min(values)?)
}

fn central_moment(values: &[f64], order: i32) -> StatsResult<f64> {
    let m = mean(values)?;
    Ok(values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64)
}

/// Fisher-Pearson coefficient of skewness (biased estimator)
pub fn skewness(values: &[f64]) -> StatsResult<f64> {
    require("skewness", values, 3)?;
    let m2 = central_moment(values, 2)?;
    if m2 == 0.0 {
        return Err(StatsError::ZeroVariance("skewness"));
    }
    Ok(central_moment(values, 3)? / m2.powf(1.5))
}

/// Excess kurtosis (biased estimator, 0 for a normal distribution)
pub fn kurtosis(values: &[f64]) -> StatsResult<f64> {
    require("kurtosis", values, 4)?;
    let m2 = central_moment(values, 2)?;
    if m2 == 0.0 {
        return Err(StatsError::ZeroVariance("kurtosis"));
    }
    Ok(central_moment(values, 4)? / (m2 * m2) - 3.0)
}

/// Coefficient of variation (sample standard deviation over mean)
pub fn coefficient_of_variation(values: &[f64]) -> StatsResult<f64> {
    let m = mean(values)?;
    if m == 0.0 {
        return Err(StatsError::Degenerate { name: "cv", reason: "mean is zero".to_string() });
    }
    Ok(std_dev(values, 1)? / m)
}

/// Median absolute deviation from the median (unscaled)
pub fn mad(values: &[f64]) -> StatsResult<f64> {
    let med = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Frequency table over labels, most frequent first, ties by label
pub fn value_counts<S: AsRef<str>>(labels: &[S]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label.as_ref()).or_default() += 1;
    }
    let mut table: Vec<(String, usize)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    table.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    table
}

/// Most frequent label; ties resolve to the lexicographically smallest.
pub fn mode<S: AsRef<str>>(labels: &[S]) -> Option<String> {
    value_counts(labels).into_iter().next().map(|(label, _)| label)
}

/// Shannon entropy of the label distribution, in bits
pub fn entropy<S: AsRef<str>>(labels: &[S]) -> f64 {
    let total = labels.len() as f64;
    if total == 0.0 {
        return 0.0;
    }
    value_counts(labels)
        .into_iter()
        .map(|(_, count)| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Ranks starting at 1, ties receive the average of their positions.
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        let average = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = average;
        }
        i = j + 1;
    }
    ranks
}
