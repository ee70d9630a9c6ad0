//! Unresolved foreground and individually resolvable sources.
//!
//! Strain and SNR come from an external [`StrainModel`]. The summed strain
//! power of every band survivor is binned at the frequency resolution of the
//! observation, smoothed with a trailing median and fitted with a quartic in
//! log-log space. That fit is the confusion noise handed back to the strain
//! model when computing each source's SNR.

use std::path::Path;

use dwd_core::constants::SECONDS_PER_YEAR;
use dwd_core::errors::DwdError;
use dwd_core::{BinaryFractionModel, BinaryType, LbandRow};
use dwd_galaxy::codec::{append_csv, truncate, write_json};
use dwd_orbit::{chirp_fdot, is_chirping};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::report::AggregateReport;
use crate::stat::{polyfit, polyval, rolling_median, LinearGrid};
use crate::survivors::{collect_survivors, SurvivorSet};

/// Observation and smoothing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Mission duration in seconds; frequency bins are `1 / t_obs_s` wide.
    pub t_obs_s: f64,
    /// First frequency bin edge in Hz.
    pub f_min_hz: f64,
    /// Frequency bins stop below this value.
    pub f_max_hz: f64,
    /// Rolling-median window in bins.
    pub window: usize,
    /// Only smoothed bins at or below this frequency enter the fit.
    pub fit_f_max_hz: f64,
    /// Sources need an SNR strictly above this value.
    pub snr_threshold: f64,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            t_obs_s: 4.0 * SECONDS_PER_YEAR,
            f_min_hz: 1e-9,
            f_max_hz: 0.1,
            window: 1000,
            fit_f_max_hz: 1.2e-3,
            snr_threshold: 7.0,
        }
    }
}

impl ObservationConfig {
    /// Frequency grid of the foreground spectrum.
    pub fn frequency_grid(&self) -> LinearGrid {
        LinearGrid::new(self.f_min_hz, self.f_max_hz, 1.0 / self.t_obs_s)
    }
}

/// Inputs of a strain computation for one circular binary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainSource {
    /// Primary mass in M☉.
    pub mass_1: f64,
    /// Secondary mass in M☉.
    pub mass_2: f64,
    /// Eccentricity.
    pub ecc: f64,
    /// Distance from the Sun in kpc.
    pub dist_kpc: f64,
    /// Orbital frequency in Hz.
    pub f_orb: f64,
}

impl StrainSource {
    /// Source built from a band survivor.
    pub fn from_row(row: &LbandRow) -> Self {
        Self {
            mass_1: row.mass_1,
            mass_2: row.mass_2,
            ecc: 0.0,
            dist_kpc: row.dist_sun,
            f_orb: row.f_gw / 2.0,
        }
    }
}

/// Detector response supplied by the caller.
pub trait StrainModel: Send + Sync {
    /// Strain amplitude of the second harmonic.
    fn h_0(&self, source: &StrainSource) -> f64;

    /// SNR over `t_obs_s` with `confusion` added to the instrument noise.
    fn snr(&self, source: &StrainSource, t_obs_s: f64, confusion: &ConfusionFit) -> f64;
}

/// Quartic in log10 f describing the smoothed foreground power.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionFit {
    /// Coefficients in ascending powers of log10 f.
    pub coefficients: Vec<f64>,
}

impl ConfusionFit {
    /// log10 of the foreground power at `f_hz`.
    pub fn log_power(&self, f_hz: f64) -> f64 {
        polyval(&self.coefficients, f_hz.log10())
    }

    /// Foreground strain power at `f_hz`.
    pub fn power(&self, f_hz: f64) -> f64 {
        10f64.powf(self.log_power(f_hz))
    }

    /// Foreground noise spectral density in Hz⁻¹.
    pub fn noise_psd(&self, f_hz: f64, t_obs_s: f64) -> f64 {
        self.power(f_hz) * t_obs_s
    }
}

/// Strain power summed per frequency bin.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    /// Bin labels; bin `i` holds sources with `grid.at(i - 1) <= f_gw < grid.at(i)`.
    pub grid: LinearGrid,
    /// Summed `h_0²` per bin.
    pub power: Vec<f64>,
    /// Sources at or above the last grid point.
    pub out_of_range: usize,
}

/// One nonzero bin of the spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerBin {
    /// Bin label in Hz.
    pub f_gw: f64,
    /// Summed strain power.
    pub strain_2: f64,
}

impl PowerSpectrum {
    /// Bins `(f_gw, power)` pairs.
    pub fn from_sources(
        grid: LinearGrid,
        sources: impl IntoIterator<Item = (f64, f64)>,
    ) -> Self {
        let mut power = vec![0.0; grid.len];
        let mut out_of_range = 0;
        for (f_gw, strain_2) in sources {
            let digit = grid.digitize(f_gw);
            match power.get_mut(digit) {
                Some(slot) => *slot += strain_2,
                None => out_of_range += 1,
            }
        }
        Self {
            grid,
            power,
            out_of_range,
        }
    }

    /// Bins holding power.
    pub fn nonzero(&self) -> impl Iterator<Item = PowerBin> + '_ {
        self.power
            .iter()
            .enumerate()
            .filter(|(_, power)| **power > 0.0)
            .map(|(idx, power)| PowerBin {
                f_gw: self.grid.at(idx),
                strain_2: *power,
            })
    }

    /// Total power.
    pub fn total(&self) -> f64 {
        self.power.iter().sum()
    }
}

/// Fits the confusion foreground to the median-smoothed spectrum.
///
/// The first `window` smoothed entries are discarded; the rest enter the fit
/// when their power is positive and their frequency at most `fit_f_max_hz`.
pub fn fit_confusion(
    spectrum: &PowerSpectrum,
    config: &ObservationConfig,
) -> Result<ConfusionFit, DwdError> {
    let window = config.window.max(1);
    let medians = rolling_median(&spectrum.power, window);
    let centre = (window - 1) as f64 / 2.0;
    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    for (offset, median) in medians.iter().enumerate().skip(1) {
        let idx = offset + window - 1;
        let f_gw = spectrum.grid.start + (idx as f64 - centre) * spectrum.grid.step;
        if *median > 0.0 && f_gw <= config.fit_f_max_hz {
            xs.push(f_gw.log10());
            ys.push(median.log10());
        }
    }
    let coefficients = polyfit(&xs, &ys, 4)?;
    Ok(ConfusionFit { coefficients })
}

/// A source above the SNR threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSource {
    /// Binary type label.
    pub label: BinaryType,
    /// Population-table identifier.
    pub bin_num: u64,
    /// Host particle.
    #[serde(rename = "FIRE_index")]
    pub fire_index: u64,
    /// Primary mass in M☉.
    pub mass_1: f64,
    /// Secondary mass in M☉.
    pub mass_2: f64,
    /// Host metallicity in Z☉.
    pub host_met: f64,
    /// Gravitational-wave frequency in Hz.
    pub f_gw: f64,
    /// Distance from the Sun in kpc.
    pub dist_sun: f64,
    /// Strain amplitude.
    pub h_0: f64,
    /// Signal-to-noise ratio with the confusion foreground.
    pub snr: f64,
    /// Frequency drift in Hz s⁻¹.
    pub chirp: f64,
    /// Whether the drift is measurable within the observation.
    pub resolved_chirp: bool,
}

/// Result of the resolved-source selection for one model.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSources {
    /// Sources above the SNR threshold, in input order.
    pub resolved: Vec<ResolvedSource>,
    /// Foreground spectrum of every input source.
    pub spectrum: PowerSpectrum,
    /// Confusion fit used for the SNR.
    pub fit: ConfusionFit,
    /// Number of input sources.
    pub candidates: usize,
}

/// Selects the sources of `survivors` resolvable on top of their own foreground.
pub fn resolve_sources(
    survivors: &SurvivorSet,
    strain: &dyn StrainModel,
    config: &ObservationConfig,
) -> Result<ResolvedSources, DwdError> {
    let candidates: Vec<(BinaryType, &LbandRow, StrainSource, f64)> = survivors
        .rows()
        .map(|(binary_type, row)| {
            let source = StrainSource::from_row(row);
            let h_0 = strain.h_0(&source);
            (binary_type, row, source, h_0)
        })
        .collect();
    let spectrum = PowerSpectrum::from_sources(
        config.frequency_grid(),
        candidates.iter().map(|(_, row, _, h_0)| (row.f_gw, h_0 * h_0)),
    );
    if spectrum.out_of_range > 0 {
        warn!(sources = spectrum.out_of_range, "sources above the frequency grid left out of the foreground");
    }
    let fit = fit_confusion(&spectrum, config)?;

    let resolved: Vec<ResolvedSource> = candidates
        .iter()
        .filter_map(|(binary_type, row, source, h_0)| {
            let snr = strain.snr(source, config.t_obs_s, &fit);
            if snr <= config.snr_threshold || snr.is_nan() {
                return None;
            }
            let chirp = chirp_fdot(source.mass_1, source.mass_2, source.f_orb);
            Some(ResolvedSource {
                label: *binary_type,
                bin_num: row.bin_num,
                fire_index: row.fire_index,
                mass_1: row.mass_1,
                mass_2: row.mass_2,
                host_met: row.host_met,
                f_gw: row.f_gw,
                dist_sun: row.dist_sun,
                h_0: *h_0,
                snr,
                chirp,
                resolved_chirp: is_chirping(chirp, config.t_obs_s),
            })
        })
        .collect();
    info!(
        candidates = candidates.len(),
        resolved = resolved.len(),
        chirping = resolved.iter().filter(|source| source.resolved_chirp).count(),
        "resolved sources"
    );
    Ok(ResolvedSources {
        resolved,
        spectrum,
        fit,
        candidates: candidates.len(),
    })
}

/// Reads the bundles of `model` and selects its resolved sources.
pub fn resolve_model(
    bundle_root: &Path,
    binary_types: &[BinaryType],
    model: BinaryFractionModel,
    bins: &[usize],
    strain: &dyn StrainModel,
    config: &ObservationConfig,
) -> Result<(ResolvedSources, AggregateReport), DwdError> {
    let survivors = collect_survivors(bundle_root, binary_types, model, bins)?;
    let resolved = resolve_sources(&survivors, strain, config)?;
    let mut report = AggregateReport::new("resolved", model);
    report.gaps = survivors.gaps;
    Ok((resolved, report))
}

/// Writes `resolved_DWDs_{model}/` with the resolved table, the nonzero
/// spectrum bins and the fit coefficients.
pub fn write_resolved(
    dir: &Path,
    model: BinaryFractionModel,
    sources: &ResolvedSources,
    report: &mut AggregateReport,
) -> Result<(), DwdError> {
    let out = dir.join(format!("resolved_DWDs_{}", model.label()));
    let resolved_path = out.join("resolved.csv");
    truncate(&resolved_path)?;
    append_csv(&resolved_path, &sources.resolved)?;

    let power_path = out.join("total_power.csv");
    truncate(&power_path)?;
    let bins: Vec<PowerBin> = sources.spectrum.nonzero().collect();
    append_csv(&power_path, &bins)?;

    let fit_path = out.join("conf_fit.json");
    write_json(&fit_path, &sources.fit)?;

    report
        .outputs
        .extend([resolved_path, power_path, fit_path]);
    Ok(())
}
