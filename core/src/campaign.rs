//! Campaign selection: segmented customers to target identifier sets.
//!
//! A campaign profile is a predicate over three things:
//!   1. segment membership,
//!   2. category interest, via the config's tag-equivalence sets,
//!   3. an optional spend threshold with a configurable scope.
//!
//! The selector reads a joined view of records and segments and never
//! modifies either.

use crate::{
    config::{CampaignProfile, RfmConfig, SpendRule, TagMatch, ThresholdScope},
    customer::CustomerOrderRecord,
    error::{RfmError, RfmResult},
    segment::{ClassifiedCustomer, Segment},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One customer as the selector sees it: segment, spend and interests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRow {
    pub customer_id:       CustomerId,
    pub segment:           Segment,
    pub frequency:         u64,
    pub monetary:          f64,
    pub category_interest: BTreeSet<String>,
}

impl TargetingRow {
    pub fn average_order_value(&self) -> f64 {
        self.monetary / self.frequency.max(1) as f64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSelection {
    pub campaign:     String,
    pub customer_ids: BTreeSet<CustomerId>,
}

impl CampaignSelection {
    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }
}

/// Join consolidated records with their classification by customer id.
///
/// Every classified customer must have a record; the reverse is not
/// required.
pub fn join(
    records: &[CustomerOrderRecord],
    classified: &[ClassifiedCustomer],
) -> RfmResult<Vec<TargetingRow>> {
    let by_id: HashMap<&str, &CustomerOrderRecord> =
        records.iter().map(|r| (r.id.as_str(), r)).collect();

    classified
        .iter()
        .map(|c| {
            let record = by_id.get(c.scored.customer_id.as_str()).ok_or_else(|| {
                RfmError::Other(anyhow::anyhow!(
                    "classified customer '{}' has no order record",
                    c.scored.customer_id
                ))
            })?;
            Ok(TargetingRow {
                customer_id:       c.scored.customer_id.clone(),
                segment:           c.segment,
                frequency:         c.scored.frequency,
                monetary:          c.scored.monetary,
                category_interest: record.category_interest.clone(),
            })
        })
        .collect()
}

pub struct CampaignSelector<'a> {
    config: &'a RfmConfig,
}

impl<'a> CampaignSelector<'a> {
    pub fn new(config: &'a RfmConfig) -> Self {
        Self { config }
    }

    /// Select by campaign name.
    pub fn select_named(&self, name: &str, rows: &[TargetingRow]) -> RfmResult<CampaignSelection> {
        let profile = self.config.campaign(name)?;
        Ok(self.select(profile, rows))
    }

    /// Every configured campaign, in config order.
    pub fn select_all(&self, rows: &[TargetingRow]) -> Vec<CampaignSelection> {
        self.config
            .campaigns
            .iter()
            .map(|profile| self.select(profile, rows))
            .collect()
    }

    pub fn select(&self, profile: &CampaignProfile, rows: &[TargetingRow]) -> CampaignSelection {
        let tags = self.equivalent_tags(profile);
        let population_mean = population_mean(rows);

        let customer_ids: BTreeSet<CustomerId> = rows
            .iter()
            .filter(|row| profile.segments.contains(&row.segment))
            .filter(|row| match &tags {
                Some(tags) => interest_matches(row, tags, profile.tag_match),
                None => true,
            })
            .filter(|row| match &profile.spend_rule {
                Some(rule) => spend_passes(rule, row, population_mean),
                None => true,
            })
            .map(|row| row.customer_id.clone())
            .collect();

        if let Some(rule) = &profile.spend_rule {
            if rule.scope == ThresholdScope::PopulationMean {
                log::warn!(
                    "stage=select campaign '{}' compares the population mean spend ({population_mean:.2}) \
                     against {:.2}, not each customer's own spend",
                    profile.name,
                    rule.threshold,
                );
            }
        }

        log::info!(
            "stage=select campaign '{}' selected {} of {} customers",
            profile.name,
            customer_ids.len(),
            rows.len(),
        );

        CampaignSelection {
            campaign: profile.name.clone(),
            customer_ids,
        }
    }

    /// Lowercased union of the equivalence sets of the profile's categories.
    /// `None` when the profile has no category filter.
    fn equivalent_tags(&self, profile: &CampaignProfile) -> Option<Vec<String>> {
        if profile.categories.is_empty() {
            return None;
        }
        let mut tags: Vec<String> = profile
            .categories
            .iter()
            .flat_map(|category| self.config.tags_for(category))
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect();
        tags.sort();
        tags.dedup();
        Some(tags)
    }
}

fn interest_matches(row: &TargetingRow, tags: &[String], mode: TagMatch) -> bool {
    row.category_interest.iter().any(|interest| {
        let interest = interest.trim().to_lowercase();
        match mode {
            TagMatch::Exact    => tags.iter().any(|t| *t == interest),
            TagMatch::Contains => tags.iter().any(|t| interest.contains(t.as_str())),
        }
    })
}

fn spend_passes(rule: &SpendRule, row: &TargetingRow, population_mean: f64) -> bool {
    let spend = match rule.scope {
        ThresholdScope::PopulationMean       => population_mean,
        ThresholdScope::CustomerTotal        => row.monetary,
        ThresholdScope::CustomerOrderAverage => row.average_order_value(),
    };
    spend > rule.threshold
}

fn population_mean(rows: &[TargetingRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter().map(|r| r.monetary).sum::<f64>() / rows.len() as f64
}
