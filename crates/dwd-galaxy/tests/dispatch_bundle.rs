use std::path::Path;

use dwd_core::{
    BinaryFractionModel, BinaryRecord, BinaryType, HostParticle, LbandRow, MetallicityGrid,
};
use dwd_galaxy::codec::read_json;
use dwd_galaxy::dispatch::{process_chunk, GalaxyReport, GalaxyRunner, GALAXY_REPORT_FILE};
use dwd_galaxy::filter::{CheckpointStage, FilterConfig};
use dwd_galaxy::plan::GalaxyPlan;
use dwd_galaxy::sampler::{Occupation, OccupationPlan};
use dwd_galaxy::source::{MemoryPopulationSource, PopulationTables};
use dwd_galaxy::store::{bundle_name, ResultBundle};

fn binary(bin_num: u64, sep: f64, tphys: f64) -> BinaryRecord {
    BinaryRecord {
        bin_num,
        mass_1: 0.6,
        mass_2: 0.6,
        kstar_1: 11,
        kstar_2: 11,
        porb: 0.0,
        sep,
        met: 0.0001,
        tphys,
        rad_1: 0.0,
        rad_2: 0.0,
    }
}

fn population() -> Vec<BinaryRecord> {
    vec![
        binary(0, 2.4, 100.0),
        binary(1, 1.0, 100.0),
        binary(2, 5.0, 100.0),
        binary(3, 2.4, 20_000.0),
    ]
}

fn catalog() -> Vec<HostParticle> {
    (0..50)
        .map(|i| HostParticle {
            met: 0.001 + i as f64 * 1e-5,
            x_gx: i as f64 * 0.1,
            y_gx: 8.0,
            z_gx: 0.0,
            kern_len: 0.05,
            age: 10.0,
            fire_index: i,
        })
        .collect()
}

fn source() -> MemoryPopulationSource {
    let source = MemoryPopulationSource::new();
    // 4 systems over a mass total of 11312 M☉ (ratio 0.68) gives N_astro = 2.5.
    source.insert(
        BinaryType::COCO,
        0.0001,
        PopulationTables {
            conv: population(),
            mass_binaries: Some(4.0 * 7_070.0 / (2.5 * 1.68)),
            bpp: Vec::new(),
        },
    )
    .expect("insert");
    source
}

fn plan(output_root: &Path, workers: usize, checkpoints: bool) -> GalaxyPlan {
    let mut plan = GalaxyPlan::template(1234);
    plan.paths.output_root = output_root.to_path_buf();
    plan.binary_types = vec![BinaryType::COCO];
    plan.models = vec![BinaryFractionModel::Variable];
    plan.bins = Some(vec![0]);
    plan.chunk_rows = 16;
    plan.workers = workers;
    plan.interleaved_checkpoints = checkpoints;
    plan
}

fn sorted_rows(mut rows: Vec<LbandRow>) -> Vec<LbandRow> {
    rows.sort_by(|a, b| {
        a.fire_index
            .cmp(&b.fire_index)
            .then(a.x.total_cmp(&b.x))
            .then(a.y.total_cmp(&b.y))
    });
    rows
}

#[test]
fn bin_run_writes_a_consistent_bundle() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = plan(temp.path(), 3, true);
    let source = source();
    let runner = GalaxyRunner::new(&plan, &source, catalog()).expect("runner");
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let report = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect("bin run");

    assert_eq!(report.bundle, "Lband_11_11_0.0001_0.4847");
    assert_eq!(report.hosts, 50);
    assert_eq!(report.occupation.integer, 2);
    assert!(report.failed_chunks.is_empty());
    assert!(report.consistency.ok);
    assert_eq!(report.consistency.expected, 100);
    assert!(report.decimal_consistency.ok);
    assert_eq!(
        report.chunks,
        7 + (report.decimal_consistency.expected as usize + 15) / 16
    );
    assert_eq!(report.rows_written, report.counts.in_band);
    assert!(report.rows_written > 0);

    let bundle = ResultBundle::open(temp.path(), BinaryType::COCO, 0.0001, 0.4847).expect("open");
    assert_eq!(bundle.read_seed().expect("seed"), report.seed);
    assert!((bundle.read_mass_total().expect("mass") - 11_312.0).abs() < 1e-6);
    assert_eq!(bundle.read_report().expect("report"), report);

    let rows = bundle.read_rows().expect("rows");
    assert_eq!(rows.len() as u64, report.rows_written);
    for row in &rows {
        assert_eq!(row.bin_num, 0);
        assert!(row.f_gw >= 1e-4);
        assert!(row.tphys <= row.age * 1_000.0);
        assert!(row.t_delay + row.tphys >= row.age * 1_000.0);
        assert!(row.t_rlof + row.tphys >= row.age * 1_000.0);
        assert!(row.bin_num_lw >= 1 && row.bin_num_lw <= row.bin_num_pw);
        assert!((row.rad_2 - 0.012_778_467).abs() < 1e-8);
    }

    let init = bundle
        .read_checkpoint(CheckpointStage::Init)
        .expect("init checkpoint");
    assert_eq!(init.len() as u64, report.counts.sampled);
    let merged = bundle
        .read_checkpoint(CheckpointStage::Merged)
        .expect("merge checkpoint");
    assert!(merged.iter().all(|id| id.bin_num == 1));
}

#[test]
fn worker_count_does_not_change_the_catalog() {
    let source = source();
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let mut catalogs = Vec::new();
    for workers in [1usize, 4] {
        let temp = tempfile::tempdir().expect("tmp dir");
        let plan = plan(temp.path(), workers, false);
        let runner = GalaxyRunner::new(&plan, &source, catalog()).expect("runner");
        runner
            .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
            .expect("bin run");
        let bundle =
            ResultBundle::open(temp.path(), BinaryType::COCO, 0.0001, 0.4847).expect("open");
        catalogs.push(sorted_rows(bundle.read_rows().expect("rows")));
    }
    assert_eq!(catalogs[0], catalogs[1]);
}

#[test]
fn rerun_replaces_previous_results() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = plan(temp.path(), 2, false);
    let source = source();
    let runner = GalaxyRunner::new(&plan, &source, catalog()).expect("runner");
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let first = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect("first");
    let second = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect("second");
    assert_eq!(first.rows_written, second.rows_written);
    let bundle = ResultBundle::open(temp.path(), BinaryType::COCO, 0.0001, 0.4847).expect("open");
    assert_eq!(
        bundle.read_rows().expect("rows").len() as u64,
        second.rows_written
    );
}

#[test]
fn galaxy_run_reports_every_bin() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let mut plan = plan(temp.path(), 2, false);
    plan.models = vec![BinaryFractionModel::Variable, BinaryFractionModel::Fixed50];
    let source = source();
    let runner = GalaxyRunner::new(&plan, &source, catalog()).expect("runner");
    let report = runner.run().expect("galaxy run");
    assert_eq!(report.bins.len(), 2);
    assert_eq!(report.bins[1].bundle, bundle_name(BinaryType::COCO, 0.0001, 0.5));
    assert_eq!(report.inconsistent_bins().count(), 0);
    assert_eq!(report.provenance.seed, 1234);
    assert_eq!(report.provenance.plan_hash, plan.plan_hash().expect("plan hash"));
    assert_eq!(report.provenance.plan_hash.len(), 64);

    let persisted: GalaxyReport =
        read_json(&temp.path().join(GALAXY_REPORT_FILE)).expect("galaxy report");
    assert_eq!(persisted, report);
}

#[test]
fn bins_without_hosts_write_empty_bundles() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = plan(temp.path(), 1, false);
    let source = source();
    let runner = GalaxyRunner::new(&plan, &source, Vec::new()).expect("runner");
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let report = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect("bin run");
    assert_eq!(report.chunks, 0);
    assert_eq!(report.rows_written, 0);
    assert!(report.consistency.ok);
    let bundle = ResultBundle::open(temp.path(), BinaryType::COCO, 0.0001, 0.4847).expect("open");
    assert!(bundle.read_rows().expect("rows").is_empty());
}

#[test]
fn missing_population_is_reported() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = plan(temp.path(), 1, false);
    let source = MemoryPopulationSource::new();
    let runner = GalaxyRunner::new(&plan, &source, catalog()).expect("runner");
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let err = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect_err("no tables");
    assert!(err.is_missing_dataset());
}

#[test]
fn failed_chunks_are_skipped_and_reported() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let plan = plan(temp.path(), 3, false);
    let source = source();
    let mut hosts = catalog();
    hosts[0].kern_len = f64::NAN;
    let runner = GalaxyRunner::new(&plan, &source, hosts).expect("runner");
    let bin = MetallicityGrid::reference().bin(0).expect("bin");
    let report = runner
        .run_bin(BinaryType::COCO, &bin, BinaryFractionModel::Variable)
        .expect("bin run continues past the broken chunk");

    // Host 0 belongs to integer rows 0..16, the first integer chunk.
    let decimal_chunks = (report.decimal_consistency.expected as usize + 15) / 16;
    let first_integer = decimal_chunks as u64;
    assert!(report
        .failed_chunks
        .iter()
        .any(|failure| failure.index == first_integer && failure.rows == 16));
    assert!(report
        .failed_chunks
        .iter()
        .all(|failure| failure.error.info().code == "host-invalid"));
    assert!(report.failed_chunks.len() <= 2);

    assert!(!report.consistency.ok);
    assert_eq!(report.consistency.expected, 100);
    assert_eq!(report.consistency.sampled, 84);
    let failed_decimal: u64 = report
        .failed_chunks
        .iter()
        .filter(|failure| failure.index < first_integer)
        .map(|failure| failure.rows)
        .sum();
    assert_eq!(
        report.decimal_consistency.sampled,
        report.decimal_consistency.expected - failed_decimal
    );

    assert!(report.rows_written > 0);
    assert_eq!(report.rows_written, report.counts.in_band);
    let bundle = ResultBundle::open(temp.path(), BinaryType::COCO, 0.0001, 0.4847).expect("open");
    let rows = bundle.read_rows().expect("rows");
    assert_eq!(rows.len() as u64, report.rows_written);
    assert!(rows.iter().all(|row| row.fire_index != 0));
    assert_eq!(bundle.read_report().expect("report"), report);
}

#[test]
fn unusable_host_fails_its_chunk() {
    let mut hosts = catalog();
    hosts[3].age = f64::NAN;
    let occupation = Occupation::from_expected(1.0);
    let plan = OccupationPlan::new(occupation, hosts.len(), 5, 10);
    let results: Vec<_> = plan
        .chunks
        .iter()
        .map(|chunk| {
            process_chunk(chunk, &occupation, &population(), &hosts, &FilterConfig::default())
        })
        .collect();
    assert_eq!(results.len(), 5);
    assert_eq!(
        results[0].as_ref().expect_err("host 3").info().code,
        "host-invalid"
    );
    assert!(results[1..].iter().all(|result| result.is_ok()));
}
