//! Ordered cuts applied to one chunk of sampled systems.
//!
//! Stages run strictly in order on the rows left live by the previous stage:
//! age cut, merger cut, Roche cut, evolution, placement, weighting, band
//! selection, re-weighting. Discarded rows are dropped for good; when
//! checkpoints are requested only their identifiers are kept.

use std::collections::HashMap;

use dwd_core::errors::DwdError;
use dwd_core::{SampledSystem, SystemId};
use dwd_orbit::{evolve, place, sample_unit_sphere_offsets, time_to_merger, time_to_roche_contact};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Settings of the filter pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Lower edge of the detector band in Hz (inclusive).
    pub band_floor_hz: f64,
    /// Collect identifier checkpoints after every stage.
    pub record_checkpoints: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            band_floor_hz: dwd_core::constants::BAND_FLOOR_HZ,
            record_checkpoints: false,
        }
    }
}

/// Identifier checkpoints written in interleaved mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CheckpointStage {
    /// Every sampled row.
    Init,
    /// Rows that have formed by the present.
    Age,
    /// Rows that merged before the present.
    Merged,
    /// Rows that survive the merger cut.
    NotMerged,
    /// Rows whose secondary overflowed before the present.
    Overflowed,
    /// Rows that survive the Roche cut.
    NotOverflowed,
    /// Rows after evolution and placement.
    Final,
}

impl CheckpointStage {
    /// Every stage in pipeline order.
    pub const ALL: [CheckpointStage; 7] = [
        CheckpointStage::Init,
        CheckpointStage::Age,
        CheckpointStage::Merged,
        CheckpointStage::NotMerged,
        CheckpointStage::Overflowed,
        CheckpointStage::NotOverflowed,
        CheckpointStage::Final,
    ];

    /// File stem inside the bundle's `inter/` directory.
    pub fn file_stem(&self) -> &'static str {
        match self {
            CheckpointStage::Init => "pop_init",
            CheckpointStage::Age => "pop_age",
            CheckpointStage::Merged => "pop_merge",
            CheckpointStage::NotMerged => "pop_nm",
            CheckpointStage::Overflowed => "pop_RLOF",
            CheckpointStage::NotOverflowed => "pop_nRLOF",
            CheckpointStage::Final => "pop_f",
        }
    }
}

/// Identifier sets collected during one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Checkpoints {
    entries: Vec<(CheckpointStage, Vec<SystemId>)>,
}

impl Checkpoints {
    fn record(&mut self, stage: CheckpointStage, systems: &[SampledSystem]) {
        self.entries
            .push((stage, systems.iter().map(SampledSystem::id).collect()));
    }

    /// Identifiers recorded for `stage`.
    pub fn get(&self, stage: CheckpointStage) -> &[SystemId] {
        self.entries
            .iter()
            .find(|(recorded, _)| *recorded == stage)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    /// Recorded stages in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (CheckpointStage, &[SystemId])> {
        self.entries.iter().map(|(stage, ids)| (*stage, ids.as_slice()))
    }
}

/// Row counts after each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    /// Rows entering the pipeline.
    pub sampled: u64,
    /// Rows formed by the present.
    pub formed: u64,
    /// Rows merged before the present.
    pub merged: u64,
    /// Rows whose secondary overflowed before the present.
    pub overflowed: u64,
    /// Rows evolved and placed.
    pub evolved: u64,
    /// Rows in the detector band.
    pub in_band: u64,
}

impl StageCounts {
    /// Adds another chunk's counts.
    pub fn absorb(&mut self, other: &StageCounts) {
        self.sampled += other.sampled;
        self.formed += other.formed;
        self.merged += other.merged;
        self.overflowed += other.overflowed;
        self.evolved += other.evolved;
        self.in_band += other.in_band;
    }
}

/// Band membership of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// At least one row is in the band.
    Survivors(Vec<SampledSystem>),
    /// No row reached the band; not an error.
    Empty,
}

impl FilterOutcome {
    /// Band survivors, empty for [`FilterOutcome::Empty`].
    pub fn into_survivors(self) -> Vec<SampledSystem> {
        match self {
            FilterOutcome::Survivors(rows) => rows,
            FilterOutcome::Empty => Vec::new(),
        }
    }

    /// Whether no row survived.
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterOutcome::Empty)
    }
}

/// Result of running the pipeline over a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterReport {
    /// Band survivors.
    pub outcome: FilterOutcome,
    /// Per-stage counts.
    pub counts: StageCounts,
    /// Identifier checkpoints, when requested.
    pub checkpoints: Option<Checkpoints>,
}

/// Drops systems that have not formed by the present (`tphys > age`).
pub fn age_cut(systems: Vec<SampledSystem>) -> Vec<SampledSystem> {
    systems
        .into_iter()
        .filter(|system| system.binary.tphys <= system.host_age_myr())
        .collect()
}

/// Splits systems into merger survivors and systems merged before the present.
///
/// Populates `t_delay` on every system.
pub fn merger_cut(systems: Vec<SampledSystem>) -> (Vec<SampledSystem>, Vec<SampledSystem>) {
    systems
        .into_iter()
        .map(|mut system| {
            system.t_delay = Some(time_to_merger(&system.binary));
            system
        })
        .partition(|system| {
            system.t_delay.unwrap_or(f64::NEG_INFINITY) + system.binary.tphys
                >= system.host_age_myr()
        })
}

/// Splits systems into Roche survivors and systems that overflowed before the present.
///
/// Populates `t_rlof` on every system.
pub fn roche_cut(
    systems: Vec<SampledSystem>,
) -> Result<(Vec<SampledSystem>, Vec<SampledSystem>), DwdError> {
    let mut survivors = Vec::with_capacity(systems.len());
    let mut overflowed = Vec::new();
    for mut system in systems {
        let t_rlof = time_to_roche_contact(&system.binary)?;
        system.t_rlof = Some(t_rlof);
        if t_rlof + system.binary.tphys >= system.host_age_myr() {
            survivors.push(system);
        } else {
            overflowed.push(system);
        }
    }
    Ok((survivors, overflowed))
}

/// Evolves every system to the present day.
pub fn evolve_systems(systems: &mut [SampledSystem]) {
    for system in systems {
        let t_evol = system.host_age_myr() - system.binary.tphys;
        system.evolution = Some(evolve(&system.binary, t_evol));
    }
}

/// Jitters every unplaced system inside its host's smoothing kernel.
///
/// Rows that already carry a placement keep it and draw no offset.
pub fn place_systems<R: Rng + ?Sized>(systems: &mut [SampledSystem], rng: &mut R) {
    let unplaced = systems.iter().filter(|system| system.placement.is_none()).count();
    let mut offsets = sample_unit_sphere_offsets(rng, unplaced).into_iter();
    for system in systems.iter_mut().filter(|system| system.placement.is_none()) {
        if let Some(offset) = offsets.next() {
            system.placement = Some(place(&system.host, offset));
        }
    }
}

fn occurrences(systems: &[SampledSystem]) -> HashMap<u64, u32> {
    let mut counts = HashMap::new();
    for system in systems {
        *counts.entry(system.binary.bin_num).or_insert(0u32) += 1;
    }
    counts
}

/// Sets a missing `bin_num_pw` to the occurrences of each `bin_num` among `systems`.
///
/// The weight belongs to the sampled population, so rows weighted by an
/// earlier pass keep it.
pub fn assign_sampling_weights(systems: &mut [SampledSystem]) {
    let counts = occurrences(systems);
    for system in systems.iter_mut().filter(|system| system.bin_num_pw.is_none()) {
        system.bin_num_pw = counts.get(&system.binary.bin_num).copied();
    }
}

/// Sets `bin_num_lw` to the occurrences of each `bin_num` among `systems`.
pub fn assign_band_weights(systems: &mut [SampledSystem]) {
    let counts = occurrences(systems);
    for system in systems.iter_mut() {
        system.bin_num_lw = counts.get(&system.binary.bin_num).copied();
    }
}

/// Keeps systems with `f_gw >= floor_hz`.
pub fn select_band(systems: Vec<SampledSystem>, floor_hz: f64) -> FilterOutcome {
    let survivors: Vec<SampledSystem> = systems
        .into_iter()
        .filter(|system| {
            system
                .evolution
                .map(|evolution| evolution.f_gw >= floor_hz)
                .unwrap_or(false)
        })
        .collect();
    if survivors.is_empty() {
        FilterOutcome::Empty
    } else {
        FilterOutcome::Survivors(survivors)
    }
}

/// Runs every stage over one chunk.
pub fn filter_population<R: Rng + ?Sized>(
    systems: Vec<SampledSystem>,
    rng: &mut R,
    config: &FilterConfig,
) -> Result<FilterReport, DwdError> {
    let mut checkpoints = config.record_checkpoints.then(Checkpoints::default);
    let mut counts = StageCounts {
        sampled: systems.len() as u64,
        ..StageCounts::default()
    };
    let mut mark = |stage: CheckpointStage, rows: &[SampledSystem]| {
        if let Some(checkpoints) = checkpoints.as_mut() {
            checkpoints.record(stage, rows);
        }
    };

    mark(CheckpointStage::Init, &systems);
    let formed = age_cut(systems);
    counts.formed = formed.len() as u64;
    mark(CheckpointStage::Age, &formed);

    let (not_merged, merged) = merger_cut(formed);
    counts.merged = merged.len() as u64;
    mark(CheckpointStage::Merged, &merged);
    mark(CheckpointStage::NotMerged, &not_merged);
    drop(merged);

    let (mut live, overflowed) = roche_cut(not_merged)?;
    counts.overflowed = overflowed.len() as u64;
    mark(CheckpointStage::Overflowed, &overflowed);
    mark(CheckpointStage::NotOverflowed, &live);
    drop(overflowed);

    evolve_systems(&mut live);
    place_systems(&mut live, rng);
    counts.evolved = live.len() as u64;
    mark(CheckpointStage::Final, &live);

    assign_sampling_weights(&mut live);
    let outcome = match select_band(live, config.band_floor_hz) {
        FilterOutcome::Survivors(mut survivors) => {
            assign_band_weights(&mut survivors);
            counts.in_band = survivors.len() as u64;
            FilterOutcome::Survivors(survivors)
        }
        FilterOutcome::Empty => FilterOutcome::Empty,
    };

    Ok(FilterReport {
        outcome,
        counts,
        checkpoints,
    })
}
