//! Descriptive summaries over a snapshot and its segmentation.
//!
//! All functions are pure reads. Grouped outputs are sorted by key so
//! printed reports are stable between runs.

use crate::{
    customer::CustomerOrderRecord,
    scoring::ScoredCustomer,
    segment::{ClassifiedCustomer, Segment},
    types::{CustomerId, Dimension, SCORE_BINS},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const UNKNOWN_CHANNEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel:            String,
    pub customers:          usize,
    pub mean_online_orders: f64,
    pub mean_online_spend:  f64,
    pub mean_total_orders:  f64,
    pub mean_total_spend:   f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment:        Segment,
    pub customers:      usize,
    pub mean_recency:   f64,
    pub mean_frequency: f64,
    pub mean_monetary:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCustomer {
    pub customer_id: CustomerId,
    pub value:       f64,
}

/// Per order channel: customer count, mean online and total activity.
pub fn channel_summary(records: &[CustomerOrderRecord]) -> Vec<ChannelSummary> {
    #[derive(Default)]
    struct Acc {
        n: usize,
        online_orders: f64,
        online_spend: f64,
        total_orders: f64,
        total_spend: f64,
    }

    let mut groups: BTreeMap<&str, Acc> = BTreeMap::new();
    for r in records {
        let key = r.order_channel.as_deref().unwrap_or(UNKNOWN_CHANNEL);
        let acc = groups.entry(key).or_default();
        acc.n += 1;
        acc.online_orders += r.online_order_count as f64;
        acc.online_spend += r.online_spend;
        acc.total_orders += r.total_orders() as f64;
        acc.total_spend += r.total_spend();
    }

    groups
        .into_iter()
        .map(|(channel, acc)| {
            let n = acc.n as f64;
            ChannelSummary {
                channel:            channel.to_string(),
                customers:          acc.n,
                mean_online_orders: acc.online_orders / n,
                mean_online_spend:  acc.online_spend / n,
                mean_total_orders:  acc.total_orders / n,
                mean_total_spend:   acc.total_spend / n,
            }
        })
        .collect()
}

/// The `n` biggest spenders, highest first. Ties keep input order.
pub fn top_by_spend(records: &[CustomerOrderRecord], n: usize) -> Vec<RankedCustomer> {
    top_by(records, n, CustomerOrderRecord::total_spend)
}

/// The `n` most frequent buyers, highest first. Ties keep input order.
pub fn top_by_orders(records: &[CustomerOrderRecord], n: usize) -> Vec<RankedCustomer> {
    top_by(records, n, |r| r.total_orders() as f64)
}

fn top_by<F>(records: &[CustomerOrderRecord], n: usize, value: F) -> Vec<RankedCustomer>
where
    F: Fn(&CustomerOrderRecord) -> f64,
{
    let mut ranked: Vec<RankedCustomer> = records
        .iter()
        .map(|r| RankedCustomer { customer_id: r.id.clone(), value: value(r) })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(n);
    ranked
}

/// Per segment present: count and mean raw metrics. Segments follow
/// `Segment::ALL` order.
pub fn segment_summary(classified: &[ClassifiedCustomer]) -> Vec<SegmentSummary> {
    let mut groups: BTreeMap<Segment, (usize, f64, f64, f64)> = BTreeMap::new();
    for c in classified {
        let entry = groups.entry(c.segment).or_insert((0, 0.0, 0.0, 0.0));
        entry.0 += 1;
        entry.1 += c.scored.recency as f64;
        entry.2 += c.scored.frequency as f64;
        entry.3 += c.scored.monetary;
    }

    groups
        .into_iter()
        .map(|(segment, (n, recency, frequency, monetary))| {
            let count = n as f64;
            SegmentSummary {
                segment,
                customers:      n,
                mean_recency:   recency / count,
                mean_frequency: frequency / count,
                mean_monetary:  monetary / count,
            }
        })
        .collect()
}

/// Customers per score (index 0 = score 1) for one dimension.
pub fn score_distribution(scored: &[ScoredCustomer], dimension: Dimension) -> [usize; SCORE_BINS as usize] {
    let mut bins = [0; SCORE_BINS as usize];
    for s in scored {
        bins[s.score(dimension).index()] += 1;
    }
    bins
}
