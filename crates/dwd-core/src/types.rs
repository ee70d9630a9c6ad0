use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::MYR_PER_GYR;

/// Double white dwarf family, identified by the stellar types of its components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BinaryType {
    /// Helium + helium white dwarfs (kstar 10 + 10).
    #[serde(rename = "10_10")]
    HeHe,
    /// Carbon-oxygen + helium white dwarfs (kstar 11 + 10).
    #[serde(rename = "11_10")]
    COHe,
    /// Carbon-oxygen + carbon-oxygen white dwarfs (kstar 11 + 11).
    #[serde(rename = "11_11")]
    COCO,
    /// Oxygen-neon primary with any white dwarf companion (kstar 12 + 10..12).
    #[serde(rename = "12")]
    ONeX,
}

impl BinaryType {
    /// All binary types in canonical order.
    pub const ALL: [BinaryType; 4] = [
        BinaryType::HeHe,
        BinaryType::COHe,
        BinaryType::COCO,
        BinaryType::ONeX,
    ];

    /// Label used when naming population tables and result bundles.
    pub fn label(&self) -> &'static str {
        match self {
            BinaryType::HeHe => "10_10",
            BinaryType::COHe => "11_10",
            BinaryType::COCO => "11_11",
            BinaryType::ONeX => "12",
        }
    }

    /// Column name used in aggregate tables.
    pub fn column(&self) -> &'static str {
        match self {
            BinaryType::HeHe => "He",
            BinaryType::COHe => "COHe",
            BinaryType::COCO => "CO",
            BinaryType::ONeX => "ONe",
        }
    }

    /// Stellar type code of the primary.
    pub fn kstar_1(&self) -> u8 {
        match self {
            BinaryType::HeHe => 10,
            BinaryType::COHe | BinaryType::COCO => 11,
            BinaryType::ONeX => 12,
        }
    }

    /// Accepted stellar type codes of the secondary.
    pub fn kstar_2(&self) -> &'static [u8] {
        match self {
            BinaryType::HeHe | BinaryType::COHe => &[10],
            BinaryType::COCO => &[11],
            BinaryType::ONeX => &[10, 11, 12],
        }
    }
}

impl fmt::Display for BinaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn de_kstar<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || !(0.0..=u8::MAX as f64).contains(&value) {
        return Err(serde::de::Error::custom(format!(
            "invalid stellar type code {value}"
        )));
    }
    Ok(value as u8)
}

/// One evolved binary from a population-synthesis table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinaryRecord {
    /// Identifier of the binary within its population table.
    pub bin_num: u64,
    /// Primary mass in solar masses.
    pub mass_1: f64,
    /// Secondary mass in solar masses.
    pub mass_2: f64,
    /// Primary stellar type code.
    #[serde(deserialize_with = "de_kstar")]
    pub kstar_1: u8,
    /// Secondary stellar type code.
    #[serde(deserialize_with = "de_kstar")]
    pub kstar_2: u8,
    /// Orbital period at DWD formation in days.
    pub porb: f64,
    /// Separation at DWD formation in solar radii.
    pub sep: f64,
    /// Absolute metallicity of the progenitor population.
    pub met: f64,
    /// DWD formation time in Myr since the start of the simulation.
    pub tphys: f64,
    /// Primary radius in solar radii.
    pub rad_1: f64,
    /// Secondary radius in solar radii.
    pub rad_2: f64,
}

/// One star particle of the host galaxy simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostParticle {
    /// Metallicity in units of solar metallicity.
    pub met: f64,
    /// Galactocentric x coordinate in kpc.
    #[serde(rename = "xGx")]
    pub x_gx: f64,
    /// Galactocentric y coordinate in kpc.
    #[serde(rename = "yGx")]
    pub y_gx: f64,
    /// Galactocentric z coordinate in kpc.
    #[serde(rename = "zGx")]
    pub z_gx: f64,
    /// Smoothing length in kpc.
    pub kern_len: f64,
    /// Age of the particle in Gyr.
    pub age: f64,
    /// Row of the particle in the catalog as loaded.
    #[serde(rename = "FIRE_index", default)]
    pub fire_index: u64,
}

impl HostParticle {
    /// Age of the particle in Myr.
    pub fn age_myr(&self) -> f64 {
        self.age * MYR_PER_GYR
    }
}

/// One row of a binary's evolution history (`bpp` table).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvolutionEvent {
    /// Identifier of the binary the event belongs to.
    pub bin_num: u64,
    /// Time of the event in Myr.
    pub tphys: f64,
    /// Event code; 3 marks Roche-lobe overflow onset, 7 a common envelope.
    #[serde(deserialize_with = "de_kstar")]
    pub evol_type: u8,
    /// Separation at the event in R☉.
    pub sep: f64,
}

impl EvolutionEvent {
    /// Event code of Roche-lobe overflow onset.
    pub const RLOF: u8 = 3;
    /// Event code of a common-envelope episode.
    pub const COMMON_ENVELOPE: u8 = 7;
}

/// Present-day orbit of a surviving system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evolution {
    /// Time elapsed since DWD formation in Myr.
    pub t_evol: f64,
    /// Present-day separation in solar radii.
    pub sep_f: f64,
    /// Present-day orbital period in days.
    pub porb_f: f64,
    /// Present-day gravitational-wave frequency in Hz.
    pub f_gw: f64,
}

/// Galactic position assigned to a system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Galactocentric x coordinate in kpc.
    pub x: f64,
    /// Galactocentric y coordinate in kpc.
    pub y: f64,
    /// Galactocentric z coordinate in kpc.
    pub z: f64,
    /// Heliocentric distance in kpc.
    pub dist_sun: f64,
}

/// Identifier pair recorded in stage checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemId {
    /// Population-table identifier of the binary.
    pub bin_num: u64,
    /// Catalog row of the host particle.
    #[serde(rename = "FIRE_index")]
    pub fire_index: u64,
}

/// A binary paired with its host particle, enriched stage by stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledSystem {
    /// Binary drawn from the population table.
    pub binary: BinaryRecord,
    /// Host particle the binary was assigned to.
    pub host: HostParticle,
    /// Peters merger time from DWD formation in Myr.
    pub t_delay: Option<f64>,
    /// Time from DWD formation to Roche-lobe contact in Myr.
    pub t_rlof: Option<f64>,
    /// Present-day orbit.
    pub evolution: Option<Evolution>,
    /// Jittered galactic position.
    pub placement: Option<Placement>,
    /// Occurrences of `bin_num` among rows live after placement.
    pub bin_num_pw: Option<u32>,
    /// Occurrences of `bin_num` among band survivors.
    pub bin_num_lw: Option<u32>,
}

impl SampledSystem {
    /// Pairs a binary with its host; no derived field is populated yet.
    pub fn new(binary: BinaryRecord, host: HostParticle) -> Self {
        Self {
            binary,
            host,
            t_delay: None,
            t_rlof: None,
            evolution: None,
            placement: None,
            bin_num_pw: None,
            bin_num_lw: None,
        }
    }

    /// Host age in Myr.
    pub fn host_age_myr(&self) -> f64 {
        self.host.age_myr()
    }

    /// Identifier pair of the system.
    pub fn id(&self) -> SystemId {
        SystemId {
            bin_num: self.binary.bin_num,
            fire_index: self.host.fire_index,
        }
    }

    /// Flattens a fully processed system into its persisted row.
    ///
    /// Returns `None` while any derived field is still missing.
    pub fn to_row(&self) -> Option<LbandRow> {
        let evolution = self.evolution?;
        let placement = self.placement?;
        let b = &self.binary;
        let h = &self.host;
        Some(LbandRow {
            bin_num: b.bin_num,
            mass_1: b.mass_1,
            mass_2: b.mass_2,
            kstar_1: b.kstar_1,
            kstar_2: b.kstar_2,
            porb: b.porb,
            sep: b.sep,
            met: b.met,
            tphys: b.tphys,
            rad_1: b.rad_1,
            rad_2: b.rad_2,
            host_met: h.met,
            age: h.age,
            kern_len: h.kern_len,
            x_gx: h.x_gx,
            y_gx: h.y_gx,
            z_gx: h.z_gx,
            fire_index: h.fire_index,
            t_delay: self.t_delay?,
            t_rlof: self.t_rlof?,
            t_evol: evolution.t_evol,
            sep_f: evolution.sep_f,
            porb_f: evolution.porb_f,
            f_gw: evolution.f_gw,
            x: placement.x,
            y: placement.y,
            z: placement.z,
            dist_sun: placement.dist_sun,
            bin_num_pw: self.bin_num_pw?,
            bin_num_lw: self.bin_num_lw?,
        })
    }
}

/// Persisted form of a gravitational-wave band survivor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LbandRow {
    /// Population-table identifier of the binary.
    pub bin_num: u64,
    /// Primary mass in solar masses.
    pub mass_1: f64,
    /// Secondary mass in solar masses.
    pub mass_2: f64,
    /// Primary stellar type code.
    pub kstar_1: u8,
    /// Secondary stellar type code.
    pub kstar_2: u8,
    /// Orbital period at DWD formation in days.
    pub porb: f64,
    /// Separation at DWD formation in solar radii.
    pub sep: f64,
    /// Absolute progenitor metallicity.
    pub met: f64,
    /// DWD formation time in Myr.
    pub tphys: f64,
    /// Primary radius in solar radii.
    pub rad_1: f64,
    /// Secondary radius in solar radii.
    pub rad_2: f64,
    /// Host metallicity in solar units.
    pub host_met: f64,
    /// Host age in Gyr.
    pub age: f64,
    /// Host smoothing length in kpc.
    pub kern_len: f64,
    /// Host galactocentric x in kpc.
    #[serde(rename = "xGx")]
    pub x_gx: f64,
    /// Host galactocentric y in kpc.
    #[serde(rename = "yGx")]
    pub y_gx: f64,
    /// Host galactocentric z in kpc.
    #[serde(rename = "zGx")]
    pub z_gx: f64,
    /// Catalog row of the host particle.
    #[serde(rename = "FIRE_index")]
    pub fire_index: u64,
    /// Peters merger time from DWD formation in Myr.
    pub t_delay: f64,
    /// Time from DWD formation to Roche-lobe contact in Myr.
    #[serde(rename = "t_RLOF")]
    pub t_rlof: f64,
    /// Time elapsed since DWD formation in Myr.
    pub t_evol: f64,
    /// Present-day separation in solar radii.
    pub sep_f: f64,
    /// Present-day orbital period in days.
    pub porb_f: f64,
    /// Present-day gravitational-wave frequency in Hz.
    pub f_gw: f64,
    /// Galactocentric x of the system in kpc.
    #[serde(rename = "X")]
    pub x: f64,
    /// Galactocentric y of the system in kpc.
    #[serde(rename = "Y")]
    pub y: f64,
    /// Galactocentric z of the system in kpc.
    #[serde(rename = "Z")]
    pub z: f64,
    /// Heliocentric distance in kpc.
    pub dist_sun: f64,
    /// Occurrences of `bin_num` among rows live after placement.
    pub bin_num_pw: u32,
    /// Occurrences of `bin_num` among band survivors.
    #[serde(rename = "bin_num_Lw")]
    pub bin_num_lw: u32,
}

impl LbandRow {
    /// Rebuilds the in-memory system from a persisted row.
    pub fn to_system(&self) -> SampledSystem {
        SampledSystem {
            binary: self.binary(),
            host: HostParticle {
                met: self.host_met,
                x_gx: self.x_gx,
                y_gx: self.y_gx,
                z_gx: self.z_gx,
                kern_len: self.kern_len,
                age: self.age,
                fire_index: self.fire_index,
            },
            t_delay: Some(self.t_delay),
            t_rlof: Some(self.t_rlof),
            evolution: Some(Evolution {
                t_evol: self.t_evol,
                sep_f: self.sep_f,
                porb_f: self.porb_f,
                f_gw: self.f_gw,
            }),
            placement: Some(Placement {
                x: self.x,
                y: self.y,
                z: self.z,
                dist_sun: self.dist_sun,
            }),
            bin_num_pw: Some(self.bin_num_pw),
            bin_num_lw: Some(self.bin_num_lw),
        }
    }

    /// Binary part of the row.
    pub fn binary(&self) -> BinaryRecord {
        BinaryRecord {
            bin_num: self.bin_num,
            mass_1: self.mass_1,
            mass_2: self.mass_2,
            kstar_1: self.kstar_1,
            kstar_2: self.kstar_2,
            porb: self.porb,
            sep: self.sep,
            met: self.met,
            tphys: self.tphys,
            rad_1: self.rad_1,
            rad_2: self.rad_2,
        }
    }
}
