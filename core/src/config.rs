use crate::{
    error::{RfmError, RfmResult},
    segment::Segment,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NEW_BRAND_TARGET: &str = "new-brand-target";
pub const DISCOUNT_TARGET: &str = "discount-target";

/// What the aggregator does with a record that has no resolvable activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingActivityPolicy {
    /// Abort the run with `MissingActivity`.
    #[default]
    Fail,
    /// Drop the record and keep going.
    Exclude,
}

/// How a dimension is cut into quintiles.
///
/// The export's own analysis cuts recency and monetary by value and ranks
/// only frequency. Set `recency` and `monetary` to `Cut` to reproduce its
/// bin edges; `Rank` everywhere keeps every bin populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantileMethod {
    /// Rank first (ties by insertion order), then cut the ranks.
    /// Always yields five balanced bins.
    #[default]
    Rank,
    /// Cut raw values at interpolated quintile edges.
    /// Fails when edges collapse on low-cardinality data.
    Cut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub recency:   QuantileMethod,
    #[serde(default)]
    pub frequency: QuantileMethod,
    #[serde(default)]
    pub monetary:  QuantileMethod,
}

/// Which spend figure a campaign threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdScope {
    /// Mean monetary value of the whole customer base. Passes or fails
    /// for every candidate at once.
    #[default]
    PopulationMean,
    /// The candidate's own monetary value.
    CustomerTotal,
    /// The candidate's monetary value divided by its order count.
    CustomerOrderAverage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpendRule {
    pub threshold: f64,
    #[serde(default)]
    pub scope:     ThresholdScope,
}

/// How a customer's tags are compared with a category's equivalent tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatch {
    /// A tag must equal an equivalent, ignoring case.
    #[default]
    Exact,
    /// A tag must contain an equivalent, ignoring case ("AKTIFCOCUK" matches "COCUK").
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignProfile {
    pub name:       String,
    pub segments:   Vec<Segment>,
    /// Logical category names, resolved through `RfmConfig::category_tags`.
    /// Empty means no category filter.
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub tag_match:  TagMatch,
    #[serde(default)]
    pub spend_rule: Option<SpendRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmConfig {
    /// Analysis date recency is measured from. `None` means today.
    #[serde(default)]
    pub reference_date:   Option<NaiveDate>,
    #[serde(default)]
    pub missing_activity: MissingActivityPolicy,
    #[serde(default)]
    pub scoring:          ScoringConfig,
    /// Logical category → equivalent tag strings, matched case-insensitively.
    pub category_tags:    BTreeMap<String, Vec<String>>,
    pub campaigns:        Vec<CampaignProfile>,
}

impl RfmConfig {
    /// Load from the data/ directory.
    /// In tests, use RfmConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/rfm/rfm_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: RfmConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        log::debug!(
            "config: loaded {} campaigns, {} category groups from {path}",
            config.campaigns.len(),
            config.category_tags.len(),
        );
        Ok(config)
    }

    /// The two source campaigns with the source's tag spellings plus
    /// English equivalents. `AKTIFCOCUK` is listed under children because
    /// the export's substring match on `COCUK` selects it. Reference date pinned to the source analysis
    /// date so tests are reproducible.
    pub fn default_test() -> Self {
        let mut category_tags = BTreeMap::new();
        category_tags.insert("women".to_string(),    vec!["KADIN".to_string(), "women".to_string()]);
        category_tags.insert("men".to_string(),      vec!["ERKEK".to_string(), "men".to_string()]);
        category_tags.insert(
            "children".to_string(),
            vec!["COCUK".to_string(), "AKTIFCOCUK".to_string(), "children".to_string()],
        );

        Self {
            reference_date: NaiveDate::from_ymd_opt(2021, 6, 1),
            missing_activity: MissingActivityPolicy::Fail,
            scoring: ScoringConfig::default(),
            category_tags,
            campaigns: vec![
                CampaignProfile {
                    name:       NEW_BRAND_TARGET.into(),
                    segments:   vec![Segment::Champions, Segment::LoyalCustomers],
                    categories: vec!["women".into()],
                    tag_match:  TagMatch::Exact,
                    spend_rule: Some(SpendRule {
                        threshold: 250.0,
                        scope:     ThresholdScope::PopulationMean,
                    }),
                },
                CampaignProfile {
                    name:       DISCOUNT_TARGET.into(),
                    segments:   vec![Segment::AboutToSleep, Segment::NewCustomers],
                    categories: vec!["men".into(), "children".into()],
                    tag_match:  TagMatch::Exact,
                    spend_rule: None,
                },
            ],
        }
    }

    /// Every campaign must reference known categories and at least one
    /// segment, and names must be unique.
    pub fn validate(&self) -> RfmResult<()> {
        let mut seen = std::collections::BTreeSet::new();
        for campaign in &self.campaigns {
            if !seen.insert(campaign.name.as_str()) {
                return Err(RfmError::Config(format!("duplicate campaign '{}'", campaign.name)));
            }
            if campaign.segments.is_empty() {
                return Err(RfmError::Config(format!(
                    "campaign '{}' targets no segments", campaign.name
                )));
            }
            for category in &campaign.categories {
                if !self.category_tags.contains_key(category) {
                    return Err(RfmError::Config(format!(
                        "campaign '{}' references unknown category '{category}'", campaign.name
                    )));
                }
            }
            if let Some(rule) = &campaign.spend_rule {
                if !rule.threshold.is_finite() {
                    return Err(RfmError::Config(format!(
                        "campaign '{}' has a non-finite spend threshold", campaign.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn campaign(&self, name: &str) -> RfmResult<&CampaignProfile> {
        self.campaigns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| RfmError::Config(format!("unknown campaign '{name}'")))
    }

    /// Tags equivalent to a logical category, or empty if unknown.
    pub fn tags_for(&self, category: &str) -> &[String] {
        self.category_tags
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn resolve_reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Apply the same threshold scope to every campaign that has a spend rule.
    pub fn with_threshold_scope(mut self, scope: ThresholdScope) -> Self {
        for rule in self.campaigns.iter_mut().filter_map(|c| c.spend_rule.as_mut()) {
            rule.scope = scope;
        }
        self
    }
}
