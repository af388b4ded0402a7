//! Figure specifications produced by the visualization stage.
//!
//! Nothing is rendered here; a figure is a JSON description of its layers
//! written into the output directory under a plain file name.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::stats::descriptive::{quantile_sorted, sorted};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    /// Tukey box: whiskers reach the furthest values within 1.5 IQR.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let s = sorted(values);
        let q1 = quantile_sorted(&s, 0.25);
        let q3 = quantile_sorted(&s, 0.75);
        let fence = 1.5 * (q3 - q1);
        let (low, high) = (q1 - fence, q3 + fence);
        let inside: Vec<f64> = s.iter().copied().filter(|v| *v >= low && *v <= high).collect();
        Some(Self {
            lower_whisker: inside.first().copied().unwrap_or(q1),
            q1,
            median: quantile_sorted(&s, 0.5),
            q3,
            upper_whisker: inside.last().copied().unwrap_or(q3),
            outliers: s.iter().copied().filter(|v| *v < low || *v > high).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Layer {
    Histogram { bins: Vec<HistogramBin> },
    Box { summary: BoxSummary },
    GroupedBox { groups: BTreeMap<String, BoxSummary> },
    Bar { categories: Vec<(String, usize)> },
    Pie { categories: Vec<(String, usize)> },
    Scatter { points: Vec<(f64, f64)> },
    Line { values: Vec<Option<f64>> },
    Heatmap { rows: Vec<String>, columns: Vec<String>, counts: Vec<Vec<usize>> },
}

/// Equal-width bins; `bins == 0` picks Sturges' rule.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() {
        return Vec::new();
    }
    let bins = if bins == 0 {
        ((values.len() as f64).log2().ceil() as usize + 1).max(1)
    } else {
        bins
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = if max > min { (max - min) / bins as f64 } else { 1.0 };

    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            start: min + i as f64 * width,
            end: min + (i + 1) as f64 * width,
            count,
        })
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FigureSpec {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
    pub layers: Vec<Layer>,
}

/// Mutable drawing surface handed to visualization code
#[derive(Debug)]
pub struct PlotCanvas {
    output_dir: PathBuf,
    current: FigureSpec,
    saved: Vec<PathBuf>,
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl PlotCanvas {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            current: FigureSpec::default(),
            saved: Vec::new(),
        }
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.current.layers.push(layer);
    }

    pub fn set_title(&mut self, title: String) {
        self.current.title = Some(title);
    }

    pub fn set_x_label(&mut self, label: String) {
        self.current.x_label = Some(label);
    }

    pub fn set_y_label(&mut self, label: String) {
        self.current.y_label = Some(label);
    }

    /// Writes the current figure to `<output_dir>/<name>.json` and starts a new one.
    pub fn save(&mut self, name: &str) -> Result<PathBuf, String> {
        let stem = name.trim().trim_end_matches(".json");
        if !is_plain_file_name(stem) {
            return Err(format!("save_plot: '{}' is not a plain file name", name));
        }
        if self.current.layers.is_empty() {
            return Err("save_plot: nothing has been drawn".to_string());
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| format!("save_plot: {}", e))?;
        let path = self.output_dir.join(format!("{}.json", stem));
        let figure = std::mem::take(&mut self.current);
        let content = serde_json::to_string_pretty(&figure).map_err(|e| format!("save_plot: {}", e))?;
        std::fs::write(&path, content).map_err(|e| format!("save_plot: {}", e))?;

        self.saved.push(path.clone());
        Ok(path)
    }

    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_covers_all_values() {
        let values = [1.0, 2.0, 2.0, 3.0, 4.0, 10.0];
        let bins = histogram(&values, 3);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins[2].count, 1);
        assert_eq!(histogram(&[5.0, 5.0], 0).iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_box_summary_flags_outliers() {
        let summary = BoxSummary::from_values(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(summary.median, 3.0);
        assert_eq!(summary.outliers, vec![100.0]);
        assert_eq!(summary.upper_whisker, 4.0);
    }

    #[test]
    fn test_save_rejects_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut canvas = PlotCanvas::new(dir.path());
        canvas.add_layer(Layer::Line { values: vec![Some(1.0)] });
        assert!(canvas.save("../escape").is_err());
        assert!(canvas.save("sub/dir").is_err());

        let path = canvas.save("age_uni_vis1").unwrap();
        assert!(path.ends_with("age_uni_vis1.json"));
        assert!(path.exists());
        assert!(canvas.save("again").is_err(), "figure is reset after saving");
    }
}
