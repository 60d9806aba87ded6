//! The input snapshot: one order-history record per customer.

use crate::types::CustomerId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOrderRecord {
    pub id:                  CustomerId,
    pub online_order_count:  u32,
    pub offline_order_count: u32,
    pub online_spend:        f64,
    pub offline_spend:       f64,
    pub last_order_date:     NaiveDate,
    pub category_interest:   BTreeSet<String>,
    // Informational columns, read by reports only.
    #[serde(default)]
    pub order_channel:       Option<String>,
    #[serde(default)]
    pub last_order_channel:  Option<String>,
    #[serde(default)]
    pub first_order_date:    Option<NaiveDate>,
}

impl CustomerOrderRecord {
    pub fn new(id: impl Into<CustomerId>, last_order_date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            online_order_count: 0,
            offline_order_count: 0,
            online_spend: 0.0,
            offline_spend: 0.0,
            last_order_date,
            category_interest: BTreeSet::new(),
            order_channel: None,
            last_order_channel: None,
            first_order_date: None,
        }
    }

    pub fn with_online(mut self, orders: u32, spend: f64) -> Self {
        self.online_order_count = orders;
        self.online_spend = spend;
        self
    }

    pub fn with_offline(mut self, orders: u32, spend: f64) -> Self {
        self.offline_order_count = orders;
        self.offline_spend = spend;
        self
    }

    pub fn with_categories<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_interest = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.order_channel = Some(channel.into());
        self
    }

    /// Widened so two full `u32` channels cannot overflow.
    pub fn total_orders(&self) -> u64 {
        u64::from(self.online_order_count) + u64::from(self.offline_order_count)
    }

    pub fn total_spend(&self) -> f64 {
        self.online_spend + self.offline_spend
    }

    /// Why this record cannot feed the aggregator, if anything.
    pub fn activity_defect(&self) -> Option<&'static str> {
        if self.total_orders() == 0 {
            Some("no online or offline orders")
        } else if self.online_spend < 0.0 || self.offline_spend < 0.0 {
            Some("negative spend")
        } else if !self.online_spend.is_finite() || !self.offline_spend.is_finite() {
            Some("non-finite spend")
        } else {
            None
        }
    }
}
