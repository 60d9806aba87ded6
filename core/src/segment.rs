//! Segment classification: composite key to one of ten named segments.
//!
//! The rule list below is the human-readable definition. It is compiled
//! once into a 5×5 grid indexed by (recency, monetary); compilation
//! rejects any rule set that leaves a cell empty or claims a cell twice.
//! Lookups never depend on rule order.

use crate::{
    error::{RfmError, RfmResult},
    scoring::{CompositeKey, ScoredCustomer},
    types::{Score, SCORE_BINS},
};
use serde::{Deserialize, Serialize};
use std::{fmt, ops::RangeInclusive, sync::OnceLock};

const BINS: usize = SCORE_BINS as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Hibernating,
    AtRisk,
    CantLoose,
    AboutToSleep,
    NeedAttention,
    LoyalCustomers,
    Promising,
    NewCustomers,
    PotentialLoyalists,
    Champions,
}

impl Segment {
    pub const ALL: [Segment; 10] = [
        Segment::Hibernating,
        Segment::AtRisk,
        Segment::CantLoose,
        Segment::AboutToSleep,
        Segment::NeedAttention,
        Segment::LoyalCustomers,
        Segment::Promising,
        Segment::NewCustomers,
        Segment::PotentialLoyalists,
        Segment::Champions,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Segment::Hibernating        => "hibernating",
            Segment::AtRisk             => "at_risk",
            Segment::CantLoose          => "cant_loose",
            Segment::AboutToSleep       => "about_to_sleep",
            Segment::NeedAttention      => "need_attention",
            Segment::LoyalCustomers     => "loyal_customers",
            Segment::Promising          => "promising",
            Segment::NewCustomers       => "new_customers",
            Segment::PotentialLoyalists => "potential_loyalists",
            Segment::Champions          => "champions",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        Segment::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One rectangle of the score grid.
#[derive(Debug, Clone)]
pub struct SegmentRule {
    pub recency:  RangeInclusive<u8>,
    pub monetary: RangeInclusive<u8>,
    pub segment:  Segment,
}

const fn rule(recency: RangeInclusive<u8>, monetary: RangeInclusive<u8>, segment: Segment) -> SegmentRule {
    SegmentRule { recency, monetary, segment }
}

/// The standard RFM segment map over (recency_score, monetary_score).
pub const STANDARD_RULES: [SegmentRule; 10] = [
    rule(1..=2, 1..=2, Segment::Hibernating),
    rule(1..=2, 3..=4, Segment::AtRisk),
    rule(1..=2, 5..=5, Segment::CantLoose),
    rule(3..=3, 1..=2, Segment::AboutToSleep),
    rule(3..=3, 3..=3, Segment::NeedAttention),
    rule(3..=4, 4..=5, Segment::LoyalCustomers),
    rule(4..=4, 1..=1, Segment::Promising),
    rule(5..=5, 1..=1, Segment::NewCustomers),
    rule(4..=5, 2..=3, Segment::PotentialLoyalists),
    rule(5..=5, 4..=5, Segment::Champions),
];

/// A total lookup table over [1,5]×[1,5].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTable {
    grid: [[Segment; BINS]; BINS],
}

impl SegmentTable {
    /// Compile a rule list, proving it total and non-overlapping.
    pub fn from_rules(rules: &[SegmentRule]) -> RfmResult<Self> {
        let mut cells: [[Option<Segment>; BINS]; BINS] = [[None; BINS]; BINS];

        for rule in rules {
            for r in rule.recency.clone() {
                for m in rule.monetary.clone() {
                    let (Some(rs), Some(ms)) = (Score::new(r), Score::new(m)) else {
                        return Err(RfmError::UnmappedScore { recency: r, monetary: m });
                    };
                    let cell = &mut cells[rs.index()][ms.index()];
                    if let Some(existing) = *cell {
                        return Err(RfmError::Config(format!(
                            "cell ({r}, {m}) claimed by both {existing} and {}",
                            rule.segment
                        )));
                    }
                    *cell = Some(rule.segment);
                }
            }
        }

        let mut grid = [[Segment::Hibernating; BINS]; BINS];
        for (r, row) in cells.iter().enumerate() {
            for (m, cell) in row.iter().enumerate() {
                grid[r][m] = cell.ok_or_else(|| {
                    RfmError::Config(format!("cell ({}, {}) has no segment", r + 1, m + 1))
                })?;
            }
        }
        Ok(Self { grid })
    }

    /// The standard table, compiled once per process.
    pub fn standard() -> &'static SegmentTable {
        static TABLE: OnceLock<SegmentTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            // STANDARD_RULES is fixed; a failure here is a broken build.
            SegmentTable::from_rules(&STANDARD_RULES)
                .unwrap_or_else(|e| panic!("standard segment rules are not a partition: {e}"))
        })
    }

    pub fn lookup(&self, key: CompositeKey) -> Segment {
        self.grid[key.recency.index()][key.monetary.index()]
    }

    /// Lookup by raw scores. Fails with `UnmappedScore` outside [1,5]×[1,5].
    pub fn lookup_raw(&self, recency: u8, monetary: u8) -> RfmResult<Segment> {
        match (Score::new(recency), Score::new(monetary)) {
            (Some(r), Some(m)) => Ok(self.grid[r.index()][m.index()]),
            _ => Err(RfmError::UnmappedScore { recency, monetary }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedCustomer {
    #[serde(flatten)]
    pub scored:  ScoredCustomer,
    pub segment: Segment,
}

/// Attach a segment to every scored customer.
pub fn classify(scored: &[ScoredCustomer], table: &SegmentTable) -> Vec<ClassifiedCustomer> {
    let classified: Vec<ClassifiedCustomer> = scored
        .iter()
        .map(|s| ClassifiedCustomer {
            segment: table.lookup(s.composite_key),
            scored:  s.clone(),
        })
        .collect();

    log::info!("stage=classify assigned segments to {} customers", classified.len());
    classified
}
