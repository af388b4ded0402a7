//! Outlier detection and missing-value imputation.
//!
//! Inputs keep their missing cells (`None`) so that reported outlier indexes
//! and imputed columns line up with the original row positions.

use super::descriptive::{iqr, mean, median, mode, quantile, std_dev};
use super::{StatsError, StatsResult};

/// How `fill_missing` replaces absent numeric cells
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillStrategy {
    Mean,
    Median,
    Constant(f64),
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn flag(values: &[Option<f64>], predicate: impl Fn(f64) -> bool) -> Vec<usize> {
    values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.filter(|x| predicate(*x)).map(|_| idx))
        .collect()
}

/// Tukey fences: values outside `[Q1 - k*IQR, Q3 + k*IQR]`.
pub fn iqr_outliers(values: &[Option<f64>], k: f64) -> StatsResult<Vec<usize>> {
    let data = present(values);
    let q1 = quantile(&data, 0.25)?;
    let q3 = quantile(&data, 0.75)?;
    let spread = iqr(&data)?;
    let (low, high) = (q1 - k * spread, q3 + k * spread);
    Ok(flag(values, |x| x < low || x > high))
}

/// Values whose absolute z-score exceeds `threshold`.
pub fn zscore_outliers(values: &[Option<f64>], threshold: f64) -> StatsResult<Vec<usize>> {
    let data = present(values);
    let m = mean(&data)?;
    let sd = std_dev(&data, 1)?;
    if sd == 0.0 {
        return Ok(Vec::new());
    }
    Ok(flag(values, |x| ((x - m) / sd).abs() > threshold))
}

/// Iglewicz-Hoaglin modified z-score built on the median absolute deviation.
pub fn modified_zscore_outliers(values: &[Option<f64>], threshold: f64) -> StatsResult<Vec<usize>> {
    let data = present(values);
    let med = median(&data)?;
    let mad = super::descriptive::mad(&data)?;
    if mad == 0.0 {
        return Ok(Vec::new());
    }
    Ok(flag(values, |x| (0.6745 * (x - med) / mad).abs() > threshold))
}

pub fn fill_missing(values: &[Option<f64>], strategy: FillStrategy) -> StatsResult<Vec<f64>> {
    let replacement = match strategy {
        FillStrategy::Mean => mean(&present(values))?,
        FillStrategy::Median => median(&present(values))?,
        FillStrategy::Constant(c) => c,
    };
    Ok(values.iter().map(|v| v.unwrap_or(replacement)).collect())
}

/// Carries the last seen value forward; leading gaps take the first value.
pub fn forward_fill(values: &[Option<f64>]) -> StatsResult<Vec<f64>> {
    let first = values.iter().flatten().next().copied().ok_or(StatsError::InsufficientData {
        name: "forward_fill",
        required: 1,
        actual: 0,
    })?;
    let mut last = first;
    Ok(values
        .iter()
        .map(|v| {
            if let Some(x) = v {
                last = *x;
            }
            last
        })
        .collect())
}

/// Linear interpolation between neighbours; edges take the nearest value.
pub fn interpolate_linear(values: &[Option<f64>]) -> StatsResult<Vec<f64>> {
    let known: Vec<(usize, f64)> = values.iter().enumerate().filter_map(|(i, v)| v.map(|x| (i, x))).collect();
    let (Some(&(first_idx, first)), Some(&(last_idx, last))) = (known.first(), known.last()) else {
        return Err(StatsError::InsufficientData { name: "interpolate_linear", required: 1, actual: 0 });
    };

    let mut filled = Vec::with_capacity(values.len());
    let mut segment = 0;
    for (idx, value) in values.iter().enumerate() {
        match value {
            Some(x) => filled.push(*x),
            None if idx < first_idx => filled.push(first),
            None if idx > last_idx => filled.push(last),
            None => {
                while known[segment + 1].0 < idx {
                    segment += 1;
                }
                let (x0, y0) = known[segment];
                let (x1, y1) = known[segment + 1];
                let t = (idx - x0) as f64 / (x1 - x0) as f64;
                filled.push(y0 + (y1 - y0) * t);
            }
        }
    }
    Ok(filled)
}

/// Replaces missing labels with the most frequent one.
pub fn fill_mode(labels: &[Option<String>]) -> StatsResult<Vec<String>> {
    let known: Vec<&String> = labels.iter().flatten().collect();
    let most_common = mode(&known).ok_or(StatsError::InsufficientData { name: "fill_mode", required: 1, actual: 0 })?;
    Ok(labels.iter().map(|l| l.clone().unwrap_or_else(|| most_common.clone())).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|v| Some(*v)).collect()
    }

    #[test]
    fn test_iqr_outliers_keep_original_positions() {
        let mut values = column(&[10.0, 11.0, 12.0, 11.0, 10.0, 12.0, 95.0]);
        values.insert(0, None);
        assert_eq!(iqr_outliers(&values, 1.5).unwrap(), vec![7]);
    }

    #[test]
    fn test_zscore_and_modified_zscore() {
        let mut raw = vec![5.0; 20];
        raw[3] = 6.0;
        raw[10] = 50.0;
        let values = column(&raw);
        assert_eq!(zscore_outliers(&values, 3.0).unwrap(), vec![10]);
        // MAD is zero when most values coincide
        assert!(modified_zscore_outliers(&values, 3.5).unwrap().is_empty());
        assert!(zscore_outliers(&column(&[1.0, 1.0]), 3.0).unwrap().is_empty());
    }

    #[test]
    fn test_fill_strategies() {
        let values = vec![Some(1.0), None, Some(3.0), None];
        assert_eq!(fill_missing(&values, FillStrategy::Mean).unwrap(), vec![1.0, 2.0, 3.0, 2.0]);
        assert_eq!(fill_missing(&values, FillStrategy::Constant(0.0)).unwrap(), vec![1.0, 0.0, 3.0, 0.0]);
        assert_eq!(forward_fill(&values).unwrap(), vec![1.0, 1.0, 3.0, 3.0]);
        assert_eq!(forward_fill(&[None, Some(4.0)]).unwrap(), vec![4.0, 4.0]);
    }

    #[test]
    fn test_interpolate_linear() {
        let values = vec![None, Some(0.0), None, None, Some(3.0), None];
        assert_eq!(interpolate_linear(&values).unwrap(), vec![0.0, 0.0, 1.0, 2.0, 3.0, 3.0]);
        assert!(interpolate_linear(&[None, None]).is_err());
    }

    #[test]
    fn test_fill_mode_for_labels() {
        let labels = vec![Some("a".to_string()), None, Some("b".to_string()), Some("a".to_string())];
        assert_eq!(fill_mode(&labels).unwrap(), vec!["a", "a", "b", "a"]);
    }
}
