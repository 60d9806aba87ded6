//! CSV order-history loader.
//!
//! Parses the omnichannel export into `CustomerOrderRecord`s. Expected
//! CSV columns (extra columns are ignored, optional ones may be blank):
//!   master_id, order_channel, last_order_channel, first_order_date,
//!   last_order_date, last_order_date_online, last_order_date_offline,
//!   order_num_total_ever_online, order_num_total_ever_offline,
//!   customer_value_total_ever_offline, customer_value_total_ever_online,
//!   interested_in_categories_12

use crate::{
    config::MissingActivityPolicy,
    customer::CustomerOrderRecord,
    error::{RfmError, RfmResult},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::{collections::BTreeSet, io::Read, path::Path};

/// One CSV row as exported. Counts arrive as floats ("4.0").
#[derive(Debug, Clone, Deserialize)]
pub struct RawOrderRow {
    pub master_id: String,
    #[serde(default)]
    pub order_channel: Option<String>,
    #[serde(default)]
    pub last_order_channel: Option<String>,
    #[serde(default)]
    pub first_order_date: Option<String>,
    #[serde(default)]
    pub last_order_date: Option<String>,
    #[serde(default)]
    pub last_order_date_online: Option<String>,
    #[serde(default)]
    pub last_order_date_offline: Option<String>,
    #[serde(default)]
    pub order_num_total_ever_online: Option<f64>,
    #[serde(default)]
    pub order_num_total_ever_offline: Option<f64>,
    #[serde(default)]
    pub customer_value_total_ever_offline: Option<f64>,
    #[serde(default)]
    pub customer_value_total_ever_online: Option<f64>,
    #[serde(default)]
    pub interested_in_categories_12: Option<String>,
}

impl RawOrderRow {
    /// Convert to a record, or fail with `MissingActivity` naming the
    /// first unresolvable field.
    pub fn into_record(self) -> RfmResult<CustomerOrderRecord> {
        let missing = |reason: &str| RfmError::MissingActivity {
            customer_id: self.master_id.clone(),
            reason:      reason.to_string(),
        };

        let online_orders = self
            .order_num_total_ever_online
            .ok_or_else(|| missing("online order count is null"))
            .and_then(|v| order_count(v).ok_or_else(|| missing("online order count is not a count")))?;
        let offline_orders = self
            .order_num_total_ever_offline
            .ok_or_else(|| missing("offline order count is null"))
            .and_then(|v| order_count(v).ok_or_else(|| missing("offline order count is not a count")))?;
        let online_spend = self
            .customer_value_total_ever_online
            .ok_or_else(|| missing("online spend is null"))?;
        let offline_spend = self
            .customer_value_total_ever_offline
            .ok_or_else(|| missing("offline spend is null"))?;

        // Fall back to the later of the per-channel dates.
        let last_order_date = parse_date(self.last_order_date.as_deref())
            .or_else(|| {
                let online = parse_date(self.last_order_date_online.as_deref());
                let offline = parse_date(self.last_order_date_offline.as_deref());
                online.max(offline)
            })
            .ok_or_else(|| missing("last order date is not resolvable"))?;

        let category_interest = self
            .interested_in_categories_12
            .as_deref()
            .map(parse_categories)
            .unwrap_or_default();

        let mut record = CustomerOrderRecord::new(self.master_id.clone(), last_order_date)
            .with_online(online_orders, online_spend)
            .with_offline(offline_orders, offline_spend);
        record.category_interest = category_interest;
        record.order_channel = non_blank(self.order_channel.clone());
        record.last_order_channel = non_blank(self.last_order_channel.clone());
        record.first_order_date = parse_date(self.first_order_date.as_deref());
        Ok(record)
    }
}

/// Load records from a CSV reader, applying the missing-activity policy
/// to rows whose required fields are null or unparseable.
pub fn load_records<R: Read>(
    reader: R,
    policy: MissingActivityPolicy,
) -> RfmResult<Vec<CustomerOrderRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for result in csv_reader.deserialize() {
        let row: RawOrderRow = result?;
        match row.into_record() {
            Ok(record) => records.push(record),
            Err(RfmError::MissingActivity { customer_id, reason })
                if policy == MissingActivityPolicy::Exclude =>
            {
                log::warn!("stage=ingest skipped '{customer_id}': {reason}");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    log::info!("stage=ingest loaded {} records ({skipped} skipped)", records.len());
    Ok(records)
}

/// Load records from a CSV file path.
pub fn load_records_file(
    path: impl AsRef<Path>,
    policy: MissingActivityPolicy,
) -> RfmResult<Vec<CustomerOrderRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        RfmError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {e}", path.display()),
        ))
    })?;
    load_records(file, policy)
}

/// Parse a bracketed tag list such as `[AKTIFCOCUK, COCUK]`.
/// Bare comma lists and quoted tags are accepted too.
pub fn parse_categories(text: &str) -> BTreeSet<String> {
    text.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|tag| tag.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time part.
pub fn parse_date(text: Option<&str>) -> Option<NaiveDate> {
    let text = text?.trim();
    let day = text.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn order_count(value: f64) -> Option<u32> {
    let in_range = value.is_finite() && value >= 0.0 && value <= u32::MAX as f64;
    (in_range && value.fract() == 0.0).then_some(value as u32)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
