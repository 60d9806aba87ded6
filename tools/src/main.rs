//! rfm-runner: headless segmentation runner.
//!
//! Usage:
//!   rfm-runner --input flo_data_20k.csv --out-dir out
//!   rfm-runner --synthetic 20000 --seed 42 --threshold-scope customer_total
//!   rfm-runner --input data.csv --json > run.json

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rfm_core::{
    config::ThresholdScope,
    ingest,
    report,
    sink::{CsvIdSink, SinkFormat},
    synth::{self, SynthConfig},
    types::Dimension,
    RfmConfig, SegmentationPipeline, SegmentationRun,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let data_dir = flag_value(&args, "--data-dir").unwrap_or("./data");
    let out_dir = flag_value(&args, "--out-dir").unwrap_or("./out");
    let input = flag_value(&args, "--input");
    let synthetic = parse_arg(&args, "--synthetic", 0usize)?;
    let seed = parse_arg(&args, "--seed", 42u64)?;
    let top = parse_arg(&args, "--top", 10usize)?;
    let json = args.iter().any(|a| a == "--json");

    let mut config = RfmConfig::load(data_dir)?;
    if let Some(date) = flag_value(&args, "--reference-date") {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("--reference-date expects YYYY-MM-DD, got '{date}'"))?;
        config.reference_date = Some(parsed);
    }
    if let Some(scope) = flag_value(&args, "--threshold-scope") {
        config = config.with_threshold_scope(parse_scope(scope)?);
    }
    let sink_format: SinkFormat = flag_value(&args, "--sink-format")
        .unwrap_or("plain")
        .parse()
        .map_err(anyhow::Error::msg)?;

    let records = match (input, synthetic) {
        (Some(path), _) => ingest::load_records_file(path, config.missing_activity)?,
        (None, n) if n > 0 => synth::generate(&SynthConfig::new(n), seed),
        _ => bail!("nothing to segment: pass --input <csv> or --synthetic <count>"),
    };
    log::debug!("runner: {} records loaded, sink format {sink_format:?}", records.len());

    if !json {
        println!("rfm-runner: RFM segmentation");
        println!("  data_dir:   {data_dir}");
        println!("  source:     {}", input.map(str::to_string).unwrap_or_else(|| format!("synthetic ({synthetic}, seed {seed})")));
        println!("  records:    {}", records.len());
        println!("  out_dir:    {out_dir}");
        println!();
    }

    let pipeline = SegmentationPipeline::new(config)?;
    let run = pipeline.run(&records)?;

    // Only a completed run reaches the sink.
    let mut sink = CsvIdSink::new(out_dir, sink_format);
    pipeline.emit(&run, &mut sink)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_summary(&run, top);
        println!();
        for path in sink.written() {
            println!("  wrote {}", path.display());
        }
    }
    Ok(())
}

fn print_summary(run: &SegmentationRun, top: usize) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", run.run_id);
    println!("  reference date: {}", run.reference_date);
    println!("  customers:      {}", run.classified.len());

    println!();
    println!("=== CHANNELS ===");
    for c in report::channel_summary(&run.customers) {
        println!(
            "  {:<12} | n={:>6} | orders: {:>6.2} | spend: {:>9.2}",
            c.channel, c.customers, c.mean_total_orders, c.mean_total_spend
        );
    }

    println!();
    println!("=== TOP {top} BY SPEND ===");
    for r in report::top_by_spend(&run.customers, top) {
        println!("  {:<40} {:>10.2}", r.customer_id, r.value);
    }

    println!();
    println!("=== TOP {top} BY ORDERS ===");
    for r in report::top_by_orders(&run.customers, top) {
        println!("  {:<40} {:>10.0}", r.customer_id, r.value);
    }

    println!();
    println!("=== SCORE DISTRIBUTION (scores 1..5) ===");
    let scored: Vec<_> = run.classified.iter().map(|c| c.scored.clone()).collect();
    for dimension in Dimension::ALL {
        println!("  {:<10} {:?}", dimension, report::score_distribution(&scored, dimension));
    }

    println!();
    println!("=== SEGMENTS ===");
    for s in report::segment_summary(&run.classified) {
        println!(
            "  {:<20} | n={:>6} | R: {:>7.1} | F: {:>5.2} | M: {:>9.2}",
            s.segment, s.customers, s.mean_recency, s.mean_frequency, s.mean_monetary
        );
    }

    println!();
    println!("=== CAMPAIGNS ===");
    for selection in &run.selections {
        println!("  {:<20} {} customers", selection.campaign, selection.len());
    }
}

fn parse_scope(value: &str) -> Result<ThresholdScope> {
    Ok(match value {
        "population_mean"        => ThresholdScope::PopulationMean,
        "customer_total"         => ThresholdScope::CustomerTotal,
        "customer_order_average" => ThresholdScope::CustomerOrderAverage,
        other => bail!(
            "unknown --threshold-scope '{other}' \
             (population_mean | customer_total | customer_order_average)"
        ),
    })
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

/// Parse a flag's value, or return `default` when the flag is absent.
fn parse_arg<T>(args: &[String], flag: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match flag_value(args, flag) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{flag} expects a number, got '{value}'")),
        None => Ok(default),
    }
}
