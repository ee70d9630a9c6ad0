use std::path::Path;

use dwd_core::constants::Z_SUN;
use dwd_core::{BinaryFractionModel, BinaryRecord, BinaryType, EvolutionEvent, LbandRow};
use dwd_galaxy::codec::read_csv;
use dwd_galaxy::source::{MemoryPopulationSource, PopulationTables};
use dwd_galaxy::store::ResultBundle;
use dwd_post::counts::{metallicity_edges, source_counts, write_source_counts, COUNT_EDGES};
use dwd_post::formeff::{formation_efficiency, write_formation_efficiency, MassSource};
use dwd_post::intersep::{
    intersep_file_name, interaction_separations, join_interactions, InteractionRow, WRITE_BATCH,
};

const BIN0_MET: f64 = 0.0001;
const BIN0_FRACTION: f64 = 0.4847;

fn binary(bin_num: u64) -> BinaryRecord {
    BinaryRecord {
        bin_num,
        mass_1: 0.6,
        mass_2: 0.6,
        kstar_1: 10,
        kstar_2: 10,
        porb: 0.1,
        sep: 1.0,
        met: BIN0_MET,
        tphys: 100.0,
        rad_1: 0.0128,
        rad_2: 0.0128,
    }
}

fn row(bin_num: u64, fire_index: u64, host_met: f64) -> LbandRow {
    LbandRow {
        bin_num,
        mass_1: 0.6,
        mass_2: 0.6,
        kstar_1: 10,
        kstar_2: 10,
        porb: 0.1,
        sep: 2.4,
        met: BIN0_MET,
        tphys: 100.0,
        rad_1: 0.0128,
        rad_2: 0.0128,
        host_met,
        age: 10.0,
        kern_len: 0.05,
        x_gx: 1.0,
        y_gx: 8.0,
        z_gx: 0.0,
        fire_index,
        t_delay: 5000.0,
        t_rlof: 4900.0,
        t_evol: 9900.0,
        sep_f: 2.0,
        porb_f: 0.1,
        f_gw: 2e-4,
        x: 1.0,
        y: 8.0,
        z: 0.0,
        dist_sun: 1.0,
        bin_num_pw: 1,
        bin_num_lw: 1,
    }
}

fn event(bin_num: u64, evol_type: u8, tphys: f64, sep: f64) -> EvolutionEvent {
    EvolutionEvent {
        bin_num,
        tphys,
        evol_type,
        sep,
    }
}

fn source() -> MemoryPopulationSource {
    let source = MemoryPopulationSource::new();
    source.insert(
        BinaryType::HeHe,
        BIN0_MET,
        PopulationTables {
            conv: (0..4).map(binary).collect(),
            mass_binaries: Some(1000.0),
            bpp: vec![
                event(0, 1, 0.0, 50.0),
                event(0, 3, 10.0, 40.0),
                event(0, 7, 12.0, 30.0),
                event(0, 3, 20.0, 2.0),
                event(1, 7, 15.0, 25.0),
                event(2, 3, 11.0, 35.0),
            ],
        },
    )
    .expect("insert");
    source
}

fn write_bundle(root: &Path, rows: &[LbandRow], mass_total: f64) {
    let bundle = ResultBundle::create(root, BinaryType::HeHe, BIN0_MET, BIN0_FRACTION)
        .expect("bundle");
    bundle.append_rows(rows).expect("rows");
    bundle.write_mass_total(mass_total).expect("mass");
}

#[test]
fn efficiency_uses_bundle_or_population_mass() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_bundle(dir.path(), &[row(0, 1, 0.01)], 2000.0);
    let source = source();

    let from_bundle = formation_efficiency(
        &source,
        dir.path(),
        &[BinaryType::HeHe],
        BinaryFractionModel::Variable,
        &[0],
        MassSource::Bundle,
    )
    .expect("efficiency");
    assert!(from_bundle.gaps.is_empty());
    assert_eq!(from_bundle.rows[0].get(BinaryType::HeHe), Some(4.0 / 2000.0));

    let from_population = formation_efficiency(
        &source,
        dir.path(),
        &[BinaryType::HeHe],
        BinaryFractionModel::Variable,
        &[0],
        MassSource::Population,
    )
    .expect("efficiency");
    let eff = from_population.rows[0].he.expect("He cell");
    assert!((eff - 4.0 / 1680.0).abs() < 1e-15);
}

#[test]
fn missing_inputs_become_gaps_not_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = source();
    let table = formation_efficiency(
        &source,
        dir.path(),
        &[BinaryType::HeHe, BinaryType::COCO],
        BinaryFractionModel::Fixed50,
        &[0, 1],
        MassSource::Bundle,
    )
    .expect("efficiency");
    assert_eq!(table.rows.len(), 2);
    assert!(table.rows.iter().all(|row| row.he.is_none() && row.co.is_none()));
    assert_eq!(table.gaps.len(), 4);
    assert!(table
        .gaps
        .iter()
        .any(|gap| gap.binary_type == BinaryType::COCO && gap.bin_index == 1));

    let report = write_formation_efficiency(dir.path(), &table).expect("write");
    assert!(!report.is_complete());
    assert!(report.outputs[0].ends_with("DWDeff_F50.csv"));
    assert!(report.outputs[0].exists());
}

#[test]
fn counts_bin_host_metallicity_and_record_gaps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let edges = metallicity_edges();
    assert_eq!(edges.len(), COUNT_EDGES);
    assert!((edges[0] - 0.00015 * Z_SUN).abs() < 1e-18);
    assert!((edges[COUNT_EDGES - 1] - 13.346 * Z_SUN).abs() < 1e-15);

    write_bundle(
        dir.path(),
        &[row(0, 1, 0.01), row(0, 2, 0.01), row(1, 3, 1.0), row(2, 4, 50.0)],
        2000.0,
    );
    let counts = source_counts(
        dir.path(),
        &[BinaryType::HeHe, BinaryType::COHe],
        BinaryFractionModel::Variable,
        &[0],
    )
    .expect("counts");
    let he = counts.counts(BinaryType::HeHe);
    assert_eq!(he.len(), COUNT_EDGES - 1);
    assert_eq!(he.iter().sum::<u64>(), 3, "host above the catalog range is dropped");
    assert_eq!(counts.counts(BinaryType::COHe).iter().sum::<u64>(), 0);
    assert_eq!(counts.counts(BinaryType::ONeX), vec![0; COUNT_EDGES - 1]);
    assert_eq!(counts.gaps.len(), 1);
    assert_eq!(counts.gaps[0].binary_type, BinaryType::COHe);

    let report = write_source_counts(dir.path(), &counts).expect("write");
    assert!(report.outputs[0].ends_with("numLISA_30bins_FZ.csv"));
}

#[test]
fn first_episodes_join_survivors() {
    let source = source();
    let history = dwd_galaxy::PopulationSource::evolution_history(&source, BinaryType::HeHe, BIN0_MET)
        .expect("bpp");
    let joined = join_interactions(&[row(2, 9, 0.01), row(0, 1, 0.01), row(3, 2, 0.01)], &history);
    let bin_nums: Vec<u64> = joined.iter().map(|row| row.bin_num).collect();
    assert_eq!(bin_nums, vec![0, 2, 3]);

    assert_eq!(joined[0].rlof_sep, Some(40.0));
    assert_eq!(joined[0].rlof_time, Some(10.0));
    assert_eq!(joined[0].ce_sep, Some(30.0));
    assert_eq!(joined[0].ce_time, Some(12.0));
    assert_eq!(joined[1].rlof_sep, Some(35.0));
    assert_eq!(joined[1].ce_sep, None);
    assert_eq!(joined[2].rlof_sep, None);
    assert_eq!(joined[2].ce_time, None);
}

#[test]
fn interaction_table_is_rewritten_per_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("post");
    write_bundle(dir.path(), &[row(1, 7, 0.01), row(0, 3, 0.01)], 2000.0);
    let source = source();

    for _ in 0..2 {
        let summary = interaction_separations(
            &source,
            dir.path(),
            &out,
            BinaryType::HeHe,
            BinaryFractionModel::Variable,
            &[0, 1],
        )
        .expect("intersep");
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.gaps.len(), 1, "bin 1 has no bundle");
        assert_eq!(summary.gaps[0].bin_index, 1);
    }

    let path = out.join(intersep_file_name(BinaryType::HeHe, BinaryFractionModel::Variable));
    assert!(path.ends_with("10_10_intersep_FZ.csv"));
    let rows: Vec<InteractionRow> = read_csv(&path).expect("table");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].bin_num, 0);
    assert_eq!(rows[1].ce_sep, Some(25.0));
    assert_eq!(rows[1].rlof_sep, None);
    assert!(WRITE_BATCH >= rows.len());
}
