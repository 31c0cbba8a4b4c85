//! Diploid genotypes: pairs of gamete references plus optional phenotype.

use serde::{Deserialize, Serialize};

/// A diploid genotype as seen by the generational driver.
///
/// Implementations carry two gamete indices and whatever extra phenotype the
/// simulation needs. The driver constructs offspring through this trait and
/// lets the parent-sampling rules fill in the extras via their offspring
/// hook.
pub trait DiploidGenotype: Clone {
    /// A genotype referencing the given gametes, extras defaulted.
    fn from_gametes(first: usize, second: usize) -> Self;

    /// Index of the first gamete.
    fn first(&self) -> usize;

    /// Index of the second gamete.
    fn second(&self) -> usize;
}

/// The plain two-gamete genotype used by most simulations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diploid {
    pub first: usize,
    pub second: usize,
}

impl Diploid {
    pub fn new(first: usize, second: usize) -> Self {
        Self { first, second }
    }
}

impl DiploidGenotype for Diploid {
    fn from_gametes(first: usize, second: usize) -> Self {
        Self { first, second }
    }

    fn first(&self) -> usize {
        self.first
    }

    fn second(&self) -> usize {
        self.second
    }
}

/// A diploid with a sex phenotype, for sex-structured sampling.
///
/// Newly constructed offspring default to male; the sex-structured rules
/// assign the final sex in their offspring hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SexedDiploid {
    pub first: usize,
    pub second: usize,
    pub female: bool,
}

impl SexedDiploid {
    pub fn new(first: usize, second: usize, female: bool) -> Self {
        Self {
            first,
            second,
            female,
        }
    }
}

impl DiploidGenotype for SexedDiploid {
    fn from_gametes(first: usize, second: usize) -> Self {
        Self {
            first,
            second,
            female: false,
        }
    }

    fn first(&self) -> usize {
        self.first
    }

    fn second(&self) -> usize {
        self.second
    }
}

/// Access to the sex phenotype, required by the sex-structured rules.
pub trait SexedGenotype: DiploidGenotype {
    fn is_female(&self) -> bool;
    fn set_female(&mut self, female: bool);
}

impl SexedGenotype for SexedDiploid {
    fn is_female(&self) -> bool {
        self.female
    }

    fn set_female(&mut self, female: bool) {
        self.female = female;
    }
}
