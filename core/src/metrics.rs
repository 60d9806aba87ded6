//! Metric aggregation: order-history records → recency, frequency, monetary.
//!
//! Two pure steps:
//!   1. `consolidate` validates each raw record against the
//!      missing-activity policy and merges duplicate identifiers.
//!   2. `derive` measures each consolidated customer against the
//!      reference date.
//!
//! Neither step touches its input; both return fresh vectors in the
//! order customers first appeared.

use crate::{
    config::MissingActivityPolicy,
    customer::CustomerOrderRecord,
    error::{RfmError, RfmResult},
    types::CustomerId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub customer_id: CustomerId,
    /// Whole days between the reference date and the last order.
    pub recency:     i64,
    pub frequency:   u64,
    pub monetary:    f64,
}

impl DerivedMetrics {
    /// Spend per order. Frequency is never zero for a derived customer.
    pub fn average_order_value(&self) -> f64 {
        self.monetary / self.frequency.max(1) as f64
    }
}

/// Validate and merge raw records into one record per customer.
///
/// Duplicate identifiers are summed on counts and spend, keep the latest
/// last-order date, and union their category tags.
pub fn consolidate(
    records: &[CustomerOrderRecord],
    policy: MissingActivityPolicy,
) -> RfmResult<Vec<CustomerOrderRecord>> {
    let mut merged: Vec<CustomerOrderRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    let mut excluded = 0usize;

    for record in records {
        if let Some(reason) = record.activity_defect() {
            match policy {
                MissingActivityPolicy::Fail => {
                    return Err(RfmError::MissingActivity {
                        customer_id: record.id.clone(),
                        reason:      reason.to_string(),
                    });
                }
                MissingActivityPolicy::Exclude => {
                    log::warn!("stage=aggregate excluded '{}': {reason}", record.id);
                    excluded += 1;
                    continue;
                }
            }
        }

        match index.get(record.id.as_str()) {
            Some(&slot) => {
                let existing = &mut merged[slot];
                existing.online_order_count =
                    merge_count(existing.online_order_count, record.online_order_count, &record.id)?;
                existing.offline_order_count =
                    merge_count(existing.offline_order_count, record.offline_order_count, &record.id)?;
                existing.online_spend        += record.online_spend;
                existing.offline_spend       += record.offline_spend;
                if record.last_order_date > existing.last_order_date {
                    existing.last_order_date = record.last_order_date;
                    existing.last_order_channel = record.last_order_channel.clone();
                }
                existing.first_order_date = match (existing.first_order_date, record.first_order_date) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                existing
                    .category_interest
                    .extend(record.category_interest.iter().cloned());
                log::debug!("stage=aggregate merged duplicate record for '{}'", record.id);
            }
            None => {
                index.insert(record.id.as_str(), merged.len());
                merged.push(record.clone());
            }
        }
    }

    log::info!(
        "stage=aggregate consolidated {} records into {} customers ({excluded} excluded)",
        records.len(),
        merged.len(),
    );
    Ok(merged)
}

fn merge_count(current: u32, extra: u32, customer_id: &str) -> RfmResult<u32> {
    current.checked_add(extra).ok_or_else(|| RfmError::CountOverflow {
        customer_id: customer_id.to_string(),
    })
}

/// Measure consolidated customers against the reference date.
///
/// Fails with `InvalidReference` on the first customer whose last order
/// is later than `reference`.
pub fn derive(
    customers: &[CustomerOrderRecord],
    reference: NaiveDate,
) -> RfmResult<Vec<DerivedMetrics>> {
    let mut out = Vec::with_capacity(customers.len());
    let mut zero_monetary = 0usize;

    for customer in customers {
        let recency = (reference - customer.last_order_date).num_days();
        if recency < 0 {
            return Err(RfmError::InvalidReference {
                customer_id: customer.id.clone(),
                reference,
                last_order:  customer.last_order_date,
            });
        }

        let monetary = customer.total_spend();
        if monetary == 0.0 {
            zero_monetary += 1;
        }

        out.push(DerivedMetrics {
            customer_id: customer.id.clone(),
            recency,
            frequency: customer.total_orders(),
            monetary,
        });
    }

    if zero_monetary > 0 {
        log::warn!(
            "stage=aggregate {zero_monetary} customers have zero monetary value; \
             they will share the lowest monetary bins"
        );
    }
    Ok(out)
}

/// Consolidate then derive in one call.
pub fn aggregate(
    records: &[CustomerOrderRecord],
    reference: NaiveDate,
    policy: MissingActivityPolicy,
) -> RfmResult<Vec<DerivedMetrics>> {
    let customers = consolidate(records, policy)?;
    derive(&customers, reference)
}
