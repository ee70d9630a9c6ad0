use dwd_core::{BinaryFractionModel, BinaryType, LbandRow};
use dwd_galaxy::store::ResultBundle;
use dwd_post::resolved::{
    fit_confusion, resolve_model, resolve_sources, write_resolved, ConfusionFit,
    ObservationConfig, PowerSpectrum, StrainModel, StrainSource,
};
use dwd_post::stat::LinearGrid;
use dwd_post::survivors::{BundleRows, SurvivorSet};

/// Strain falls with distance; SNR ignores the foreground so selections are exact.
struct ScaledStrain;

impl StrainModel for ScaledStrain {
    fn h_0(&self, source: &StrainSource) -> f64 {
        1e-21 * (source.f_orb / 5e-4).powf(2.0 / 3.0) * (10.0 / source.dist_kpc)
    }

    fn snr(&self, source: &StrainSource, _t_obs_s: f64, _confusion: &ConfusionFit) -> f64 {
        70.0 / source.dist_kpc
    }
}

fn config() -> ObservationConfig {
    ObservationConfig {
        t_obs_s: 1e5,
        f_min_hz: 1e-4,
        f_max_hz: 3e-3,
        window: 5,
        fit_f_max_hz: 1.2e-3,
        snr_threshold: 7.0,
    }
}

fn row(bin_num: u64, f_gw: f64, dist_sun: f64) -> LbandRow {
    LbandRow {
        bin_num,
        mass_1: 0.6,
        mass_2: 0.6,
        kstar_1: 10,
        kstar_2: 10,
        porb: 0.1,
        sep: 2.4,
        met: 0.0001,
        tphys: 100.0,
        rad_1: 0.0128,
        rad_2: 0.0128,
        host_met: 0.01,
        age: 10.0,
        kern_len: 0.05,
        x_gx: 1.0,
        y_gx: 8.0,
        z_gx: 0.0,
        fire_index: bin_num,
        t_delay: 5000.0,
        t_rlof: 4900.0,
        t_evol: 9900.0,
        sep_f: 2.0,
        porb_f: 2.0 / f_gw / 86_400.0,
        f_gw,
        x: 1.0,
        y: 8.0,
        z: 0.0,
        dist_sun,
        bin_num_pw: 1,
        bin_num_lw: 1,
    }
}

/// One source per frequency bin; even sources near, odd sources far.
fn survivors() -> SurvivorSet {
    let rows = (0..250u64)
        .map(|k| {
            let f_gw = 1.05e-4 + k as f64 * 1e-5;
            let dist = if k % 2 == 0 { 5.0 } else { 20.0 };
            row(k, f_gw, dist)
        })
        .chain(std::iter::once(row(999, 1e-2, 5.0)))
        .collect();
    SurvivorSet {
        bundles: vec![BundleRows {
            binary_type: BinaryType::COHe,
            bin_index: 0,
            rows,
        }],
        gaps: Vec::new(),
    }
}

#[test]
fn spectrum_sums_power_per_bin() {
    let grid = LinearGrid::new(0.0, 1.0, 0.25);
    let spectrum = PowerSpectrum::from_sources(
        grid,
        [(0.1, 1.0), (0.2, 2.0), (0.3, 4.0), (-1.0, 8.0), (0.9, 16.0)],
    );
    assert_eq!(spectrum.power, vec![8.0, 3.0, 4.0, 0.0]);
    assert_eq!(spectrum.out_of_range, 1);
    assert_eq!(spectrum.total(), 15.0);
    let nonzero: Vec<f64> = spectrum.nonzero().map(|bin| bin.f_gw).collect();
    assert_eq!(nonzero, vec![0.0, 0.25, 0.5]);
}

#[test]
fn selection_keeps_loud_sources_and_flags_chirps() {
    let config = config();
    let set = survivors();
    let result = resolve_sources(&set, &ScaledStrain, &config).expect("resolved");

    assert_eq!(result.candidates, 251);
    assert_eq!(result.spectrum.out_of_range, 1);
    let expected_power: f64 = set
        .rows()
        .filter(|(_, row)| row.f_gw < 3e-3)
        .map(|(_, row)| ScaledStrain.h_0(&StrainSource::from_row(row)).powi(2))
        .sum();
    assert!((result.spectrum.total() - expected_power).abs() <= 1e-9 * expected_power);

    assert_eq!(result.resolved.len(), 126);
    assert!(result.resolved.iter().all(|source| source.snr > 7.0));
    assert!(result.resolved.iter().all(|source| source.label == BinaryType::COHe));
    for source in &result.resolved {
        assert_eq!(source.resolved_chirp, source.chirp > 1.0 / (config.t_obs_s * config.t_obs_s));
    }
}

#[test]
fn confusion_fit_follows_the_smoothed_foreground() {
    let config = config();
    let set = survivors();
    let result = resolve_sources(&set, &ScaledStrain, &config).expect("resolved");
    assert_eq!(result.fit.coefficients.len(), 5);
    assert!(result.fit.coefficients.iter().all(|c| c.is_finite()));
    // Medians of alternating near/far bins alternate too; the fit runs between them.
    let log_power = |dist: f64| {
        ScaledStrain
            .h_0(&StrainSource::from_row(&row(0, 6e-4, dist)))
            .powi(2)
            .log10()
    };
    let expected = 0.5 * (log_power(5.0) + log_power(20.0));
    let fitted = result.fit.log_power(6e-4);
    assert!((fitted - expected).abs() < 0.15, "fitted {fitted} expected {expected}");
}

#[test]
fn sparse_spectrum_cannot_be_fitted() {
    let config = config();
    let grid = config.frequency_grid();
    let spectrum = PowerSpectrum::from_sources(grid, [(2e-4, 1e-40)]);
    let err = fit_confusion(&spectrum, &config).expect_err("too few bins");
    assert_eq!(err.info().code, "fit-underdetermined");
}

#[test]
fn resolved_outputs_land_in_the_model_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle = ResultBundle::create(dir.path(), BinaryType::COHe, 0.0001, 0.5).expect("bundle");
    let mut set = survivors();
    let rows: Vec<LbandRow> = set.bundles.remove(0).rows;
    bundle.append_rows(&rows).expect("rows");

    let (result, mut report) = resolve_model(
        dir.path(),
        &[BinaryType::COHe, BinaryType::HeHe],
        BinaryFractionModel::Fixed50,
        &[0],
        &ScaledStrain,
        &config(),
    )
    .expect("resolved");
    assert_eq!(result.candidates, 251);
    assert_eq!(report.gaps.len(), 1);
    assert_eq!(report.gaps[0].binary_type, BinaryType::HeHe);

    write_resolved(dir.path(), BinaryFractionModel::Fixed50, &result, &mut report).expect("write");
    assert_eq!(report.outputs.len(), 3);
    assert!(report.outputs.iter().all(|path| path.exists()));
    assert!(report.outputs[0].starts_with(dir.path().join("resolved_DWDs_F50")));
}
