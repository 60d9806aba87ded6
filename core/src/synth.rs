//! Synthetic omnichannel snapshots.
//!
//! Generates plausible `CustomerOrderRecord`s for demos and tests: a
//! long-tailed order count per channel, Pareto-shaped basket values,
//! last orders spread over a trailing window, and a few category tags.

use crate::{customer::CustomerOrderRecord, rng::CohortRng};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

const CHANNELS: [&str; 4] = ["Android App", "Ios App", "Desktop", "Mobile"];
const CATEGORIES: [&str; 5] = ["KADIN", "ERKEK", "COCUK", "AKTIFSPOR", "AKTIFCOCUK"];

// Stable stream indices. Never renumber.
const STREAM_ORDERS: u64 = 1;
const STREAM_DATES: u64 = 2;
const STREAM_TAGS: u64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthConfig {
    pub customers:     usize,
    /// No generated last order falls after this date.
    pub latest_order:  NaiveDate,
    /// Width of the window last orders are spread over.
    pub history_days:  i64,
    pub basket_xmin:   f64,
    pub basket_alpha:  f64,
    pub offline_share: f64,
}

impl SynthConfig {
    pub fn new(customers: usize) -> Self {
        Self {
            customers,
            latest_order: NaiveDate::from_ymd_opt(2021, 5, 30).unwrap_or_default(),
            history_days: 365,
            basket_xmin: 40.0,
            basket_alpha: 1.9,
            offline_share: 0.35,
        }
    }
}

pub fn generate(config: &SynthConfig, seed: u64) -> Vec<CustomerOrderRecord> {
    let mut orders_rng = CohortRng::new(seed, STREAM_ORDERS);
    let mut dates_rng = CohortRng::new(seed, STREAM_DATES);
    let mut tags_rng = CohortRng::new(seed, STREAM_TAGS);

    let window = config.history_days.max(1) as u64;
    let mut customers = Vec::with_capacity(config.customers);

    for i in 0..config.customers {
        // Everyone has at least one online order, like the source export.
        let online_orders = orders_rng.pareto(1.0, 1.4).min(200.0) as u32;
        let offline_orders = if orders_rng.chance(config.offline_share) {
            orders_rng.pareto(1.0, 1.6).min(100.0) as u32
        } else {
            0
        };
        let online_spend = basket_total(&mut orders_rng, online_orders, config);
        let offline_spend = basket_total(&mut orders_rng, offline_orders, config);

        let days_back = dates_rng.next_u64_below(window) as i64;
        let last_order_date = config.latest_order - Duration::days(days_back);
        let tenure = dates_rng.next_u64_below(4 * 365) as i64;

        let tag_count = 1 + tags_rng.next_u64_below(3) as usize;
        let tags: Vec<&str> = (0..tag_count).map(|_| *tags_rng.pick(&CATEGORIES)).collect();
        let channel = *tags_rng.pick(&CHANNELS);

        let mut record = CustomerOrderRecord::new(format!("c-{i:06}"), last_order_date)
            .with_online(online_orders, online_spend)
            .with_offline(offline_orders, offline_spend)
            .with_categories(tags)
            .with_channel(channel);
        record.first_order_date = Some(last_order_date - Duration::days(tenure));
        record.last_order_channel = Some(if offline_orders > 0 { "Offline" } else { channel }.to_string());
        customers.push(record);
    }

    log::debug!("synth: generated {} customers from seed {seed}", customers.len());
    customers
}

fn basket_total(rng: &mut CohortRng, orders: u32, config: &SynthConfig) -> f64 {
    let total: f64 = (0..orders)
        .map(|_| rng.pareto(config.basket_xmin, config.basket_alpha).min(5_000.0))
        .sum();
    (total * 100.0).round() / 100.0
}
