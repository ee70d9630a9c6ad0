//! Occupation sampling of host star particles.
//!
//! A bin expects `N_astro = k + f` binaries per star particle. Every host
//! receives `k` binaries (the integer sub-population) and, with probability
//! `f`, one more (the decimal sub-population). The integer rows are never
//! materialised up front: row `r` of the integer sub-population belongs to
//! host `r / k`, so a chunk only needs its row range.

use dwd_core::errors::{DwdError, ErrorInfo};
use dwd_core::{derive_substream_seed, BinaryRecord, HostParticle, RngHandle, SampledSystem};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Substream of the bin seed used for the per-host Bernoulli draws.
pub const DECIMAL_STREAM: u64 = u64::MAX;

/// Expected occupation of one star particle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Occupation {
    /// Expected binaries per star particle.
    pub n_astro: f64,
    /// Integer part `k`.
    pub integer: u64,
    /// Fractional remainder `f` in `[0, 1)`.
    pub fraction: f64,
}

impl Occupation {
    /// Splits an expected count into its integer part and remainder.
    pub fn from_expected(n_astro: f64) -> Self {
        let integer = n_astro.floor();
        Self {
            n_astro,
            integer: integer as u64,
            fraction: n_astro - integer,
        }
    }

    /// Rows of the integer sub-population for `hosts` particles.
    pub fn integer_rows(&self, hosts: usize) -> u64 {
        self.integer * hosts as u64
    }
}

/// Total stellar mass represented by a population table.
pub fn mass_total(mass_binaries: f64, mass_ratio: f64) -> f64 {
    mass_binaries * (1.0 + mass_ratio)
}

/// Expected binaries per star particle: systems per unit mass times particle mass.
pub fn n_astro(
    population_len: usize,
    mass_total: f64,
    star_particle_mass: f64,
) -> Result<Occupation, DwdError> {
    if mass_total.is_nan() || mass_total <= 0.0 {
        return Err(DwdError::Sampling(
            ErrorInfo::new("mass-total", "mass normalisation must be positive")
                .with_context("mass_total", mass_total.to_string())
                .with_context("systems", population_len.to_string()),
        ));
    }
    Ok(Occupation::from_expected(
        population_len as f64 / mass_total * star_particle_mass,
    ))
}

/// Bernoulli draw per host; returns the hosts that receive one extra binary.
pub fn draw_decimal_hosts<R: Rng + ?Sized>(rng: &mut R, hosts: usize, fraction: f64) -> Vec<usize> {
    (0..hosts)
        .filter(|_| rng.gen::<f64>() < fraction)
        .collect()
}

/// Rows covered by one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ChunkKind {
    /// Hosts of the decimal sub-population, one binary each.
    Decimal {
        /// Indices into the bin's host slice.
        hosts: Vec<usize>,
    },
    /// Half-open row range of the integer sub-population.
    Integer {
        /// First row.
        start: u64,
        /// One past the last row.
        end: u64,
    },
}

/// Self-contained description of a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    /// Position of the chunk within the bin; also its RNG substream.
    pub index: u64,
    /// Seed of the chunk's RNG substream.
    pub seed: u64,
    /// Rows covered.
    pub kind: ChunkKind,
}

impl ChunkDescriptor {
    /// Number of sampled systems the chunk materialises.
    pub fn rows(&self) -> u64 {
        match &self.kind {
            ChunkKind::Decimal { hosts } => hosts.len() as u64,
            ChunkKind::Integer { start, end } => end - start,
        }
    }

    /// Whether the chunk belongs to the integer sub-population.
    pub fn is_integer(&self) -> bool {
        matches!(self.kind, ChunkKind::Integer { .. })
    }
}

/// Sampling plan of one metallicity bin.
#[derive(Debug, Clone, PartialEq)]
pub struct OccupationPlan {
    /// Expected occupation.
    pub occupation: Occupation,
    /// Number of hosts in the bin.
    pub hosts: usize,
    /// Hosts that won the Bernoulli draw.
    pub decimal_hosts: Vec<usize>,
    /// Chunk descriptors, decimal chunks first.
    pub chunks: Vec<ChunkDescriptor>,
}

impl OccupationPlan {
    /// Draws the decimal sub-population and splits both sub-populations into chunks.
    ///
    /// A sub-population of at most `chunk_rows` rows is a single chunk.
    pub fn new(occupation: Occupation, hosts: usize, bin_seed: u64, chunk_rows: u64) -> Self {
        let chunk_rows = chunk_rows.max(1);
        let mut decimal_rng = RngHandle::substream(bin_seed, DECIMAL_STREAM);
        let decimal_hosts = draw_decimal_hosts(&mut decimal_rng, hosts, occupation.fraction);

        let mut chunks = Vec::new();
        for group in decimal_hosts.chunks(chunk_rows as usize) {
            let index = chunks.len() as u64;
            chunks.push(ChunkDescriptor {
                index,
                seed: derive_substream_seed(bin_seed, index),
                kind: ChunkKind::Decimal {
                    hosts: group.to_vec(),
                },
            });
        }

        let total = occupation.integer_rows(hosts);
        let mut start = 0u64;
        while start < total {
            let end = (start + chunk_rows).min(total);
            let index = chunks.len() as u64;
            chunks.push(ChunkDescriptor {
                index,
                seed: derive_substream_seed(bin_seed, index),
                kind: ChunkKind::Integer { start, end },
            });
            start = end;
        }

        Self {
            occupation,
            hosts,
            decimal_hosts,
            chunks,
        }
    }

    /// Expected rows of the integer sub-population, `k × P`.
    pub fn expected_integer_rows(&self) -> u64 {
        self.occupation.integer_rows(self.hosts)
    }
}

/// Rejects a star particle whose coordinates, kernel or age cannot be used.
fn check_host(host: &HostParticle) -> Result<(), DwdError> {
    let finite = [host.met, host.x_gx, host.y_gx, host.z_gx, host.kern_len, host.age]
        .iter()
        .all(|value| value.is_finite());
    if finite && host.kern_len >= 0.0 && host.age >= 0.0 {
        return Ok(());
    }
    Err(DwdError::Sampling(
        ErrorInfo::new("host-invalid", "star particle has unusable fields")
            .with_context("fire_index", host.fire_index.to_string())
            .with_context("kern_len", host.kern_len.to_string())
            .with_context("age", host.age.to_string()),
    ))
}

/// Draws the chunk's binaries and pairs them row for row with their hosts.
///
/// Binaries are drawn with replacement from `population` using the chunk's
/// own substream, so the result depends only on the descriptor.
pub fn materialize_chunk(
    chunk: &ChunkDescriptor,
    occupation: &Occupation,
    population: &[BinaryRecord],
    hosts: &[HostParticle],
) -> Result<Vec<SampledSystem>, DwdError> {
    if population.is_empty() && chunk.rows() > 0 {
        return Err(DwdError::Sampling(
            ErrorInfo::new("empty-population", "cannot draw from an empty population table")
                .with_context("chunk", chunk.index.to_string()),
        ));
    }
    let mut rng = RngHandle::from_seed(chunk.seed);
    let mut draw = |host: &HostParticle| {
        let binary = population[rng.gen_range(0..population.len())];
        SampledSystem::new(binary, *host)
    };
    let host_at = |index: usize| {
        let host = hosts.get(index).ok_or_else(|| {
            DwdError::Sampling(
                ErrorInfo::new("host-range", "host index outside the bin")
                    .with_context("index", index.to_string())
                    .with_context("hosts", hosts.len().to_string()),
            )
        })?;
        check_host(host)?;
        Ok(host)
    };

    match &chunk.kind {
        ChunkKind::Decimal { hosts: indices } => indices
            .iter()
            .map(|&index| host_at(index).map(&mut draw))
            .collect(),
        ChunkKind::Integer { start, end } => {
            let k = occupation.integer.max(1);
            (*start..*end)
                .map(|row| host_at((row / k) as usize).map(&mut draw))
                .collect()
        }
    }
}
