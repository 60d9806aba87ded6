//! End-to-end pipeline tests: records in, segments and id files out.

use chrono::NaiveDate;
use rfm_core::{
    config::{
        MissingActivityPolicy, QuantileMethod, ScoringConfig, ThresholdScope, DISCOUNT_TARGET,
        NEW_BRAND_TARGET,
    },
    customer::CustomerOrderRecord,
    ingest, report,
    segment::Segment,
    sink::{read_ids, CsvIdSink, MemorySink, SinkFormat},
    synth::{self, SynthConfig},
    types::Dimension,
    RfmConfig, RfmError, SegmentationPipeline,
};
use std::collections::BTreeSet;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Five customers, one per bin on both recency and monetary, so every
/// score (and segment) is known in advance. Reference date 2021-06-01.
///
///   id  recency  monetary  R  M  segment
///   a   1        10        5  1  new_customers
///   b   2        500       4  5  loyal_customers
///   c   3        20        3  2  about_to_sleep
///   d   4        300       2  4  at_risk
///   e   5        100       1  3  at_risk
fn five_customers() -> Vec<CustomerOrderRecord> {
    vec![
        CustomerOrderRecord::new("a", date(2021, 5, 31)).with_online(1, 10.0).with_categories(["ERKEK"]),
        CustomerOrderRecord::new("b", date(2021, 5, 30)).with_online(3, 400.0).with_offline(1, 100.0).with_categories(["KADIN"]),
        CustomerOrderRecord::new("c", date(2021, 5, 29)).with_offline(1, 20.0).with_categories(["COCUK"]),
        CustomerOrderRecord::new("d", date(2021, 5, 28)).with_online(2, 300.0).with_categories(["ERKEK"]),
        CustomerOrderRecord::new("e", date(2021, 5, 27)).with_online(1, 100.0).with_categories(["KADIN"]),
    ]
}

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn ids(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Known population → known segments and campaign lists.
#[test]
fn five_customer_run_assigns_expected_segments() {
    init_logging();
    let pipeline = SegmentationPipeline::build_test().unwrap();
    let run = pipeline.run(&five_customers()).unwrap();

    assert_eq!(run.reference_date, date(2021, 6, 1));
    assert_eq!(run.segment_of("a"), Some(Segment::NewCustomers));
    assert_eq!(run.segment_of("b"), Some(Segment::LoyalCustomers));
    assert_eq!(run.segment_of("c"), Some(Segment::AboutToSleep));
    assert_eq!(run.segment_of("d"), Some(Segment::AtRisk));
    assert_eq!(run.segment_of("e"), Some(Segment::AtRisk));

    let discount = run.selection(DISCOUNT_TARGET).unwrap();
    assert_eq!(discount.customer_ids, ids(&["a", "c"]));

    // Base mean is 186, below 250: the population-scoped rule selects no one.
    let brand = run.selection(NEW_BRAND_TARGET).unwrap();
    assert!(brand.is_empty());
}

/// A new customer interested only in active children's wear is a
/// discount target, like a plain `COCUK` customer.
#[test]
fn compound_children_tag_is_a_discount_target() {
    let pipeline = SegmentationPipeline::build_test().unwrap();
    let mut records = five_customers();
    records[0].category_interest = ["AKTIFCOCUK".to_string()].into_iter().collect();

    let run = pipeline.run(&records).unwrap();

    assert_eq!(run.segment_of("a"), Some(Segment::NewCustomers));
    assert_eq!(run.selection(DISCOUNT_TARGET).unwrap().customer_ids, ids(&["a", "c"]));
}

/// The shipped config file selects the same discount list.
#[test]
fn shipped_config_selects_compound_children_tag() {
    let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
    let config = RfmConfig::load(data_dir).unwrap();
    let pipeline = SegmentationPipeline::new(config).unwrap();
    let mut records = five_customers();
    records[0].category_interest = ["AKTIFCOCUK".to_string(), "KADIN".to_string()].into_iter().collect();

    let run = pipeline.run(&records).unwrap();

    assert_eq!(run.reference_date, date(2021, 6, 1));
    assert_eq!(run.selection(DISCOUNT_TARGET).unwrap().customer_ids, ids(&["a", "c"]));
}

/// Value cuts on recency and monetary, ranks on frequency, over a
/// realistic base: every score bin is populated.
#[test]
fn value_cut_scoring_runs_on_synthetic_base() {
    let mut config = RfmConfig::default_test();
    config.scoring = ScoringConfig {
        recency:   QuantileMethod::Cut,
        frequency: QuantileMethod::Rank,
        monetary:  QuantileMethod::Cut,
    };
    let pipeline = SegmentationPipeline::new(config).unwrap();

    let run = pipeline.run(&synth::generate(&SynthConfig::new(2_000), 11)).unwrap();

    let scored: Vec<_> = run.classified.iter().map(|c| c.scored.clone()).collect();
    for dimension in Dimension::ALL {
        let bins = report::score_distribution(&scored, dimension);
        assert!(bins.iter().all(|&n| n > 0), "{dimension} has an empty bin: {bins:?}");
    }
}

/// Switching the threshold scope to the customer's own spend picks up `b`.
#[test]
fn customer_scope_changes_new_brand_list() {
    let config = RfmConfig::default_test().with_threshold_scope(ThresholdScope::CustomerTotal);
    let pipeline = SegmentationPipeline::new(config).unwrap();

    let run = pipeline.run(&five_customers()).unwrap();

    assert_eq!(run.selection(NEW_BRAND_TARGET).unwrap().customer_ids, ids(&["b"]));
}

/// A stage failure aborts the run, so nothing reaches a sink.
#[test]
fn failed_run_emits_nothing() {
    let pipeline = SegmentationPipeline::build_test().unwrap();
    let mut records = five_customers();
    records.push(CustomerOrderRecord::new("future", date(2021, 7, 1)).with_online(1, 10.0));

    let mut sink = MemorySink::default();
    let result = pipeline
        .run(&records)
        .and_then(|run| pipeline.emit(&run, &mut sink));

    assert!(matches!(result, Err(RfmError::InvalidReference { .. })));
    assert!(sink.selections.is_empty());
}

/// Four valid customers plus one excluded record is too few to bin.
#[test]
fn excluded_records_can_leave_too_few_customers() {
    let mut config = RfmConfig::default_test();
    config.missing_activity = MissingActivityPolicy::Exclude;
    let pipeline = SegmentationPipeline::new(config).unwrap();

    let mut records = five_customers();
    records[4] = CustomerOrderRecord::new("e", date(2021, 5, 27));

    let err = pipeline.run(&records).unwrap_err();
    assert!(matches!(err, RfmError::BinningError { .. }), "unexpected: {err:?}");
}

/// Every classified customer appears in a catch-all campaign exactly once.
#[test]
fn synthetic_run_round_trips_every_id() {
    let mut config = RfmConfig::default_test();
    config.campaigns.push(rfm_core::config::CampaignProfile {
        name:       "everyone".into(),
        segments:   Segment::ALL.to_vec(),
        categories: Vec::new(),
        tag_match:  Default::default(),
        spend_rule: None,
    });
    let pipeline = SegmentationPipeline::new(config).unwrap();
    let records = synth::generate(&SynthConfig::new(2_000), 19);

    let run = pipeline.run(&records).unwrap();

    let everyone = run.selection("everyone").unwrap();
    assert_eq!(everyone.len(), 2_000);
    let classified: BTreeSet<String> = run
        .classified
        .iter()
        .map(|c| c.scored.customer_id.clone())
        .collect();
    assert_eq!(everyone.customer_ids, classified);
}

/// Campaign lists only contain customers from their target segments.
#[test]
fn selections_respect_segments() {
    let pipeline = SegmentationPipeline::build_test().unwrap();
    let run = pipeline.run(&synth::generate(&SynthConfig::new(1_500), 5)).unwrap();

    for selection in &run.selections {
        let profile = pipeline.config().campaign(&selection.campaign).unwrap();
        for id in &selection.customer_ids {
            let segment = run.segment_of(id).unwrap();
            assert!(
                profile.segments.contains(&segment),
                "{id} in '{}' has segment {segment}",
                selection.campaign
            );
        }
    }
    assert!(!run.selection(DISCOUNT_TARGET).unwrap().is_empty());
}

/// CSV in, id files out, and the files read back to the selections.
#[test]
fn csv_to_id_files() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("orders.csv");
    std::fs::write(
        &input,
        "\
master_id,order_channel,last_order_date,order_num_total_ever_online,order_num_total_ever_offline,customer_value_total_ever_offline,customer_value_total_ever_online,interested_in_categories_12
a,Mobile,2021-05-31,1.0,0.0,0.0,10.0,[ERKEK]
b,Mobile,2021-05-30,3.0,1.0,100.0,400.0,[KADIN]
c,Desktop,2021-05-29,0.0,1.0,20.0,0.0,[COCUK]
d,Desktop,2021-05-28,2.0,0.0,0.0,300.0,[ERKEK]
e,Ios App,2021-05-27,1.0,0.0,0.0,100.0,[KADIN]
",
    )
    .unwrap();

    let pipeline = SegmentationPipeline::build_test().unwrap();
    let records = ingest::load_records_file(&input, MissingActivityPolicy::Fail).unwrap();
    let run = pipeline.run(&records).unwrap();

    let out = dir.path().join("out");
    let mut sink = CsvIdSink::new(&out, SinkFormat::Indexed);
    pipeline.emit(&run, &mut sink).unwrap();

    assert_eq!(sink.written().len(), 2);
    let discount = read_ids(&sink.path_for(DISCOUNT_TARGET)).unwrap();
    assert_eq!(discount, vec!["a", "c"]);
    let brand = read_ids(&sink.path_for(NEW_BRAND_TARGET)).unwrap();
    assert!(brand.is_empty());
}

/// The run report serializes to JSON with snake_case segment labels.
#[test]
fn run_serializes_to_json() {
    let pipeline = SegmentationPipeline::build_test().unwrap();
    let run = pipeline.run(&five_customers()).unwrap();

    let json = serde_json::to_value(&run).unwrap();

    assert_eq!(json["reference_date"], "2021-06-01");
    assert_eq!(json["classified"][0]["customer_id"], "a");
    assert_eq!(json["classified"][0]["segment"], "new_customers");
    assert_eq!(json["classified"][0]["recency_score"], 5);
}
