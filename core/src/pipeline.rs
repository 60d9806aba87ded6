//! The segmentation pipeline.
//!
//! EXECUTION ORDER (fixed, never reordered):
//!   1. Consolidate  validate records, merge duplicate ids   (metrics)
//!   2. Derive       recency / frequency / monetary           (metrics)
//!   3. Score        quintile scores + composite key          (scoring)
//!   4. Classify     composite key → segment                  (segment)
//!   5. Select       campaign profiles → identifier sets      (campaign)
//!
//! RULES:
//!   - Each stage reads the previous stage's output and returns a new
//!     vector. Nothing is mutated after it is produced.
//!   - Any stage error aborts the run. There is no partial result.
//!   - Sinks are fed only from a completed `SegmentationRun`.

use crate::{
    campaign::{self, CampaignSelection, CampaignSelector},
    config::RfmConfig,
    customer::CustomerOrderRecord,
    error::RfmResult,
    metrics::{self, DerivedMetrics},
    scoring,
    segment::{self, ClassifiedCustomer, Segment, SegmentTable},
    sink::IdSink,
    types::RunId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationRun {
    pub run_id:         RunId,
    pub reference_date: NaiveDate,
    pub customers:      Vec<CustomerOrderRecord>,
    pub metrics:        Vec<DerivedMetrics>,
    pub classified:     Vec<ClassifiedCustomer>,
    pub selections:     Vec<CampaignSelection>,
}

impl SegmentationRun {
    pub fn selection(&self, campaign: &str) -> Option<&CampaignSelection> {
        self.selections.iter().find(|s| s.campaign == campaign)
    }

    pub fn segment_of(&self, customer_id: &str) -> Option<Segment> {
        self.classified
            .iter()
            .find(|c| c.scored.customer_id == customer_id)
            .map(|c| c.segment)
    }
}

pub struct SegmentationPipeline {
    config: RfmConfig,
    table:  &'static SegmentTable,
}

impl SegmentationPipeline {
    pub fn new(config: RfmConfig) -> RfmResult<Self> {
        config.validate()?;
        Ok(Self { config, table: SegmentTable::standard() })
    }

    /// Build with the test config.
    pub fn build_test() -> RfmResult<Self> {
        Self::new(RfmConfig::default_test())
    }

    pub fn config(&self) -> &RfmConfig {
        &self.config
    }

    /// Run every stage with a fresh run id.
    pub fn run(&self, records: &[CustomerOrderRecord]) -> RfmResult<SegmentationRun> {
        self.run_with_id(format!("run-{}", uuid::Uuid::new_v4()), records)
    }

    pub fn run_with_id(&self, run_id: RunId, records: &[CustomerOrderRecord]) -> RfmResult<SegmentationRun> {
        let reference_date = self.config.resolve_reference_date();
        log::info!(
            "run={run_id} starting: {} records, reference date {reference_date}",
            records.len(),
        );

        let customers = metrics::consolidate(records, self.config.missing_activity)?;
        let derived = metrics::derive(&customers, reference_date)?;
        let scored = scoring::score_all(&derived, &self.config.scoring)?;
        let classified = segment::classify(&scored, self.table);
        let rows = campaign::join(&customers, &classified)?;
        let selections = CampaignSelector::new(&self.config).select_all(&rows);

        log::info!(
            "run={run_id} complete: {} customers, {} campaigns",
            classified.len(),
            selections.len(),
        );

        Ok(SegmentationRun {
            run_id,
            reference_date,
            customers,
            metrics: derived,
            classified,
            selections,
        })
    }

    /// Hand every selection of a completed run to a sink.
    pub fn emit(&self, run: &SegmentationRun, sink: &mut dyn IdSink) -> RfmResult<()> {
        for selection in &run.selections {
            sink.write(selection)?;
        }
        Ok(())
    }
}
