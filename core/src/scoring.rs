//! Quantile scoring: metrics to 1..=5 ordinal scores per dimension.
//!
//! Every dimension is binned into quintiles over the full population:
//!   - Recency is labeled inversely: the most recent fifth scores 5.
//!   - Frequency and monetary are labeled directly: the top fifth scores 5.
//!
//! RULE: ties are broken by insertion order (a stable sort), never by
//! customer id, so the same snapshot always scores the same way.

use crate::{
    config::{QuantileMethod, ScoringConfig},
    error::{RfmError, RfmResult},
    metrics::DerivedMetrics,
    types::{CustomerId, Dimension, Score, SCORE_BINS},
};
use serde::{Deserialize, Serialize};
use std::fmt;

const BINS: usize = SCORE_BINS as usize;

/// The (recency, monetary) pair a segment is looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub recency:  Score,
    pub monetary: Score,
}

impl fmt::Display for CompositeKey {
    /// Two characters, recency first: (5, 1) → "51".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.recency, self.monetary)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCustomer {
    pub customer_id:     CustomerId,
    pub recency:         i64,
    pub frequency:       u64,
    pub monetary:        f64,
    pub recency_score:   Score,
    pub frequency_score: Score,
    pub monetary_score:  Score,
    pub composite_key:   CompositeKey,
}

impl ScoredCustomer {
    pub fn score(&self, dimension: Dimension) -> Score {
        match dimension {
            Dimension::Recency   => self.recency_score,
            Dimension::Frequency => self.frequency_score,
            Dimension::Monetary  => self.monetary_score,
        }
    }

    pub fn average_order_value(&self) -> f64 {
        self.monetary / self.frequency.max(1) as f64
    }
}

/// Score every customer on all three dimensions.
///
/// Fails with `BinningError` when fewer than five customers are present,
/// or when a `Cut` dimension's quintile edges collapse.
pub fn score_all(
    metrics: &[DerivedMetrics],
    config: &ScoringConfig,
) -> RfmResult<Vec<ScoredCustomer>> {
    if metrics.len() < BINS {
        return Err(RfmError::BinningError {
            dimension: Dimension::Recency,
            reason:    format!("need at least {BINS} customers, got {}", metrics.len()),
        });
    }

    let recency: Vec<f64>   = metrics.iter().map(|m| m.recency as f64).collect();
    let frequency: Vec<f64> = metrics.iter().map(|m| m.frequency as f64).collect();
    let monetary: Vec<f64>  = metrics.iter().map(|m| m.monetary).collect();

    let recency_bins   = bin_indices(&recency, config.recency, Dimension::Recency)?;
    let frequency_bins = bin_indices(&frequency, config.frequency, Dimension::Frequency)?;
    let monetary_bins  = bin_indices(&monetary, config.monetary, Dimension::Monetary)?;

    let scored: Vec<ScoredCustomer> = metrics
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let recency_score = Score::descending(recency_bins[i]);
            let monetary_score = Score::ascending(monetary_bins[i]);
            ScoredCustomer {
                customer_id: m.customer_id.clone(),
                recency: m.recency,
                frequency: m.frequency,
                monetary: m.monetary,
                recency_score,
                frequency_score: Score::ascending(frequency_bins[i]),
                monetary_score,
                composite_key: CompositeKey { recency: recency_score, monetary: monetary_score },
            }
        })
        .collect();

    log::info!(
        "stage=score scored {} customers (recency={:?}, frequency={:?}, monetary={:?})",
        scored.len(),
        config.recency,
        config.frequency,
        config.monetary,
    );
    Ok(scored)
}

/// 0-based ascending bin for each value, in input order.
pub fn bin_indices(
    values: &[f64],
    method: QuantileMethod,
    dimension: Dimension,
) -> RfmResult<Vec<usize>> {
    if values.len() < BINS {
        return Err(RfmError::BinningError {
            dimension,
            reason: format!("need at least {BINS} values, got {}", values.len()),
        });
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(RfmError::BinningError {
            dimension,
            reason: "NaN metric value".into(),
        });
    }

    match method {
        QuantileMethod::Rank => Ok(rank_bins(values)),
        QuantileMethod::Cut  => cut_bins(values, dimension),
    }
}

fn rank_bins(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    // sort_by is stable: equal values keep insertion order.
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut bins = vec![0; n];
    for (rank, &pos) in order.iter().enumerate() {
        bins[pos] = rank * BINS / n;
    }
    bins
}

fn cut_bins(values: &[f64], dimension: Dimension) -> RfmResult<Vec<usize>> {
    let edges = quintile_edges(values);
    if edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(RfmError::BinningError {
            dimension,
            reason: format!("quintile edges collapse: {edges:?}"),
        });
    }

    // Right-closed bins; the lowest bin also takes the minimum.
    Ok(values
        .iter()
        .map(|&v| {
            edges[1..]
                .iter()
                .position(|&edge| v <= edge)
                .unwrap_or(BINS - 1)
        })
        .collect())
}

/// The six edges at quantiles 0, 0.2, .., 1.0 with linear interpolation.
fn quintile_edges(values: &[f64]) -> [f64; BINS + 1] {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = (sorted.len() - 1) as f64;

    let mut edges = [0.0; BINS + 1];
    for (k, edge) in edges.iter_mut().enumerate() {
        let pos = last * k as f64 / BINS as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        *edge = sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64);
    }
    edges
}
