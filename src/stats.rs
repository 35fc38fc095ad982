use serde::Serialize;
use std::cmp::Ordering;

/// Descriptive statistics over one numeric sequence.
///
/// `std_dev` and `variance` are sample statistics (divisor n-1) and are
/// `None` for a single value. Quartiles use linear interpolation on the
/// sorted sequence at position `(n-1) * q`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub mode: f64,
    pub std_dev: Option<f64>,
    pub variance: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
}

pub fn summarize(values: &[f64]) -> Option<DistributionSummary> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));

    let m = mean(values);
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let variance = sample_variance(values);

    Some(DistributionSummary {
        count: values.len(),
        mean: m,
        median: median_sorted(&sorted),
        mode: mode_sorted(&sorted).unwrap_or(m),
        std_dev: variance.map(f64::sqrt),
        variance,
        min,
        max,
        range: max - min,
        q1,
        q3,
        iqr: q3 - q1,
    })
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / (values.len() as f64)
}

pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    median_sorted(&sorted)
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Smallest most-frequent value, or `None` when nothing repeats.
fn mode_sorted(sorted: &[f64]) -> Option<f64> {
    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i + 1;
        while j < sorted.len() && sorted[j] == sorted[i] {
            j += 1;
        }
        let run = j - i;
        if best.map(|(_, n)| run > n).unwrap_or(true) {
            best = Some((sorted[i], run));
        }
        i = j;
    }
    match best {
        Some((v, n)) if n > 1 => Some(v),
        _ => None,
    }
}

/// Sample variance (Bessel's correction). `None` for fewer than two values.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values);
    let ss = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>();
    Some(ss / ((n - 1) as f64))
}

pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = ((n - 1) as f64) * q;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - (lo as f64);
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Direction of a chronological score sequence, classified from the
/// least-squares slope against indexes 0..n-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
    UnableToCalculate,
}

pub fn classify_trend(scores: &[f64]) -> Trend {
    let n = scores.len();
    if n < 2 {
        return Trend::InsufficientData;
    }

    let nf = n as f64;
    let sum_x: f64 = (0..n).map(|i| i as f64).sum();
    let sum_y: f64 = scores.iter().sum();
    let sum_xy: f64 = scores.iter().enumerate().map(|(i, y)| (i as f64) * y).sum();
    let sum_x2: f64 = (0..n).map(|i| (i as f64) * (i as f64)).sum();

    // Zero index variance cannot happen for n >= 2 with unit spacing, but
    // guard the division anyway.
    let denom = nf * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return Trend::UnableToCalculate;
    }
    let slope = (nf * sum_xy - sum_x * sum_y) / denom;

    if slope > 0.5 {
        Trend::Improving
    } else if slope < -0.5 {
        Trend::Declining
    } else {
        Trend::Stable
    }
}
