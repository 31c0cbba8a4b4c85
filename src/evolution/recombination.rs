//! Recombination models and the recombinant-genome assembly walk.
//!
//! A model produces an ordered, strictly increasing sequence of crossover
//! positions terminated by [`BREAKPOINT_SENTINEL`]; the sentinel is larger
//! than any legal genomic position and signals "no more breakpoints, the
//! rest of the genome comes from the currently active strand". An empty
//! sequence means the offspring genome is a verbatim copy of parent one's
//! strand.

use crate::base::{DiscreteSampler, SimRng};
use crate::errors::ConfigError;
use crate::genome::Mutation;

use super::mutation::Region;

/// Terminator appended to every non-empty breakpoint sequence.
///
/// Guaranteed larger than any legal genomic position, so the assembly walk
/// always drains the active strand on its final segment.
pub const BREAKPOINT_SENTINEL: f64 = f64::MAX;

/// A policy that draws crossover breakpoints for one meiosis.
pub trait RecombinationModel {
    /// An ordered, strictly increasing breakpoint sequence.
    ///
    /// Non-empty sequences end with [`BREAKPOINT_SENTINEL`]; an empty
    /// sequence means no crossover occurred.
    fn breakpoints(&self, rng: &mut SimRng) -> Vec<f64>;
}

/// Sort, deduplicate, and sentinel-terminate raw crossover positions.
fn finish_breakpoints(mut positions: Vec<f64>) -> Vec<f64> {
    if positions.is_empty() {
        return positions;
    }
    positions.sort_by(f64::total_cmp);
    positions.dedup();
    positions.push(BREAKPOINT_SENTINEL);
    positions
}

/// Uniform crossovers at a Poisson-distributed rate over one interval.
#[derive(Debug, Clone)]
pub struct PoissonCrossover {
    rate: f64,
    interval: Region,
}

impl PoissonCrossover {
    /// # Errors
    /// Rejects a negative or non-finite rate and an empty interval.
    pub fn new(rate: f64, interval: Region) -> Result<Self, ConfigError> {
        if !(rate >= 0.0) || !rate.is_finite() {
            return Err(ConfigError::InvalidRate("recombination rate", rate));
        }
        if !(interval.end > interval.start) {
            return Err(ConfigError::InvalidRate("interval length", interval.end - interval.start));
        }
        Ok(Self { rate, interval })
    }

    /// Crossovers on the unit interval.
    pub fn unit(rate: f64) -> Result<Self, ConfigError> {
        Self::new(rate, Region::new(0.0, 1.0))
    }
}

impl RecombinationModel for PoissonCrossover {
    fn breakpoints(&self, rng: &mut SimRng) -> Vec<f64> {
        let n = rng.poisson(self.rate);
        if n == 0 {
            return Vec::new();
        }
        let positions = (0..n)
            .map(|_| rng.uniform_in(self.interval.start, self.interval.end))
            .collect();
        finish_breakpoints(positions)
    }
}

/// Region-weighted crossovers: each breakpoint picks a region by weight,
/// then a uniform position within it.
pub struct DiscreteRecModel {
    rate: f64,
    regions: Vec<Region>,
    sampler: DiscreteSampler,
}

impl DiscreteRecModel {
    /// # Errors
    /// Region/weight arity mismatch, empty region list, invalid weights, or
    /// an invalid rate.
    pub fn new(rate: f64, regions: Vec<Region>, weights: Vec<f64>) -> Result<Self, ConfigError> {
        if !(rate >= 0.0) || !rate.is_finite() {
            return Err(ConfigError::InvalidRate("recombination rate", rate));
        }
        if regions.is_empty() {
            return Err(ConfigError::Empty("recombination regions"));
        }
        if regions.len() != weights.len() {
            return Err(ConfigError::ArityMismatch {
                what: "recombination region weights",
                expected: regions.len(),
                found: weights.len(),
            });
        }
        for region in &regions {
            if !(region.end > region.start) {
                return Err(ConfigError::InvalidRate(
                    "region length",
                    region.end - region.start,
                ));
            }
        }
        let sampler = DiscreteSampler::new(&weights)?;
        Ok(Self {
            rate,
            regions,
            sampler,
        })
    }
}

impl RecombinationModel for DiscreteRecModel {
    fn breakpoints(&self, rng: &mut SimRng) -> Vec<f64> {
        let n = rng.poisson(self.rate);
        if n == 0 {
            return Vec::new();
        }
        let positions = (0..n)
            .map(|_| {
                let region = self.regions[self.sampler.sample(rng)];
                rng.uniform_in(region.start, region.end)
            })
            .collect();
        finish_breakpoints(positions)
    }
}

/// Merge two parental mutation-key lists through a breakpoint sequence.
///
/// Both input lists are sorted by position. The walk starts on the first
/// parent's strand, emits every key whose position lies before the next
/// breakpoint, advances the inactive strand past that breakpoint, and then
/// switches strands. Because non-empty sequences end with the sentinel, the
/// final segment always drains whichever strand is active.
///
/// Called once for the neutral list pair and once for the selected list
/// pair of a meiosis, with the same breakpoint sequence.
pub fn recombine_lists(
    breakpoints: &[f64],
    first: &[usize],
    second: &[usize],
    mutations: &[Mutation],
) -> Vec<usize> {
    if breakpoints.is_empty() {
        return first.to_vec();
    }
    let mut offspring = Vec::with_capacity(first.len());
    let mut i = 0;
    let mut j = 0;
    let mut on_first = true;
    for &b in breakpoints {
        if on_first {
            while i < first.len() && mutations[first[i]].pos < b {
                offspring.push(first[i]);
                i += 1;
            }
            while j < second.len() && mutations[second[j]].pos < b {
                j += 1;
            }
        } else {
            while j < second.len() && mutations[second[j]].pos < b {
                offspring.push(second[j]);
                j += 1;
            }
            while i < first.len() && mutations[first[i]].pos < b {
                i += 1;
            }
        }
        on_first = !on_first;
    }
    offspring
}
