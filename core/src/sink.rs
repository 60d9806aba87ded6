//! Identifier sinks, where campaign selections end up.
//!
//! RULE: sinks are only handed selections after every pipeline stage has
//! succeeded. A failed run writes nothing.

use crate::{
    campaign::CampaignSelection,
    error::RfmResult,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkFormat {
    /// Header `master_id`, then one identifier per line.
    #[default]
    Plain,
    /// Header `,master_id`, then `index,identifier` pairs.
    Indexed,
}

impl std::str::FromStr for SinkFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plain"   => Ok(SinkFormat::Plain),
            "indexed" => Ok(SinkFormat::Indexed),
            other     => Err(format!("unknown sink format '{other}'")),
        }
    }
}

/// Persists one campaign's identifier set.
pub trait IdSink {
    fn write(&mut self, selection: &CampaignSelection) -> RfmResult<()>;
}

/// Writes each campaign to `<dir>/<campaign>_ids.csv`.
pub struct CsvIdSink {
    dir:     PathBuf,
    format:  SinkFormat,
    written: Vec<PathBuf>,
}

impl CsvIdSink {
    pub fn new(dir: impl Into<PathBuf>, format: SinkFormat) -> Self {
        Self { dir: dir.into(), format, written: Vec::new() }
    }

    pub fn path_for(&self, campaign: &str) -> PathBuf {
        self.dir.join(format!("{campaign}_ids.csv"))
    }

    /// Files written so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl IdSink for CsvIdSink {
    fn write(&mut self, selection: &CampaignSelection) -> RfmResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&selection.campaign);
        let file = std::fs::File::create(&path)?;
        write_ids(file, selection, self.format)?;
        log::info!(
            "stage=sink wrote {} ids for '{}' to {}",
            selection.len(),
            selection.campaign,
            path.display(),
        );
        self.written.push(path);
        Ok(())
    }
}

/// Keeps selections in memory, keyed by campaign name.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub selections: BTreeMap<String, CampaignSelection>,
}

impl IdSink for MemorySink {
    fn write(&mut self, selection: &CampaignSelection) -> RfmResult<()> {
        self.selections.insert(selection.campaign.clone(), selection.clone());
        Ok(())
    }
}

/// Serialize one selection. Identifiers come out sorted.
pub fn write_ids<W: Write>(writer: W, selection: &CampaignSelection, format: SinkFormat) -> RfmResult<()> {
    let mut csv_writer = csv::WriterBuilder::new().from_writer(writer);
    match format {
        SinkFormat::Plain => {
            csv_writer.write_record(["master_id"])?;
            for id in &selection.customer_ids {
                csv_writer.write_record([id.as_str()])?;
            }
        }
        SinkFormat::Indexed => {
            csv_writer.write_record(["", "master_id"])?;
            for (index, id) in selection.customer_ids.iter().enumerate() {
                csv_writer.write_record([index.to_string().as_str(), id.as_str()])?;
            }
        }
    }
    csv_writer.flush()?;
    Ok(())
}

/// Read back a file written by `CsvIdSink` in either format.
pub fn read_ids(path: &Path) -> RfmResult<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let mut ids = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(id) = record.iter().last() {
            ids.push(id.to_string());
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> CampaignSelection {
        CampaignSelection {
            campaign:     "discount-target".into(),
            customer_ids: ["b".to_string(), "a".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn plain_format_writes_sorted_ids() {
        let mut buf = Vec::new();
        write_ids(&mut buf, &selection(), SinkFormat::Plain).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "master_id\na\nb\n");
    }

    #[test]
    fn indexed_format_writes_pairs() {
        let mut buf = Vec::new();
        write_ids(&mut buf, &selection(), SinkFormat::Indexed).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), ",master_id\n0,a\n1,b\n");
    }

    #[test]
    fn sink_format_parses_flag_values() {
        assert_eq!("indexed".parse::<SinkFormat>(), Ok(SinkFormat::Indexed));
        assert!("tsv".parse::<SinkFormat>().is_err());
    }
}
