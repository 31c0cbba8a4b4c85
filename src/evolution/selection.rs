//! Fitness computation and fitness-proportional parent sampling.
//!
//! The selection engine recomputes per-individual fitness once per
//! generation, tracks the population mean w̄, and preprocesses a discrete
//! sampler over diploid indices so parents can be drawn with replacement in
//! O(log N). Parent choice policy (selfing, sex structure, offspring
//! phenotype assignment) lives behind [`ParentSamplingRules`] so the
//! generational driver stays agnostic of it.

use rayon::prelude::*;

use crate::base::{DiscreteSampler, SimRng};
use crate::genome::{Diploid, Gamete, Mutation, MutationPayload, SexedDiploid, SexedGenotype};

/// Fitness of one diploid genotype given the population's genetic state.
///
/// Implementations must be pure: the engine evaluates individuals in
/// parallel and in no guaranteed order.
pub trait FitnessFunction<D>: Sync {
    fn fitness(&self, diploid: &D, gametes: &[Gamete], mutations: &[Mutation]) -> f64;
}

/// Any sync closure over the same data is a fitness function.
impl<D, F> FitnessFunction<D> for F
where
    F: Fn(&D, &[Gamete], &[Mutation]) -> f64 + Sync,
{
    fn fitness(&self, diploid: &D, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        self(diploid, gametes, mutations)
    }
}

/// Walk the selected mutations of a gamete pair, classifying each site as
/// heterozygous or homozygous. Both lists are sorted by position and keys are
/// unique, so a single merge pass suffices.
fn for_each_selected_site(
    g1: &Gamete,
    g2: &Gamete,
    mutations: &[Mutation],
    mut het: impl FnMut(&Mutation),
    mut hom: impl FnMut(&Mutation),
) {
    let a = &g1.selected;
    let b = &g2.selected;
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            hom(&mutations[a[i]]);
            i += 1;
            j += 1;
        } else if mutations[a[i]].pos < mutations[b[j]].pos {
            het(&mutations[a[i]]);
            i += 1;
        } else {
            het(&mutations[b[j]]);
            j += 1;
        }
    }
    for &k in &a[i..] {
        het(&mutations[k]);
    }
    for &k in &b[j..] {
        het(&mutations[k]);
    }
}

/// Multiplicative site-based fitness: heterozygous sites contribute
/// `1 + h·s`, homozygous sites `1 + scaling·s`.
#[derive(Debug, Clone, Copy)]
pub struct MultiplicativeFitness {
    pub scaling: f64,
}

impl MultiplicativeFitness {
    pub fn new(scaling: f64) -> Self {
        Self { scaling }
    }

    fn genotype_fitness(&self, first: usize, second: usize, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        let w = std::cell::Cell::new(1.0);
        for_each_selected_site(
            &gametes[first],
            &gametes[second],
            mutations,
            |m| w.set(w.get() * (1.0 + m.h * m.s)),
            |m| w.set(w.get() * (1.0 + self.scaling * m.s)),
        );
        w.get().max(0.0)
    }
}

impl Default for MultiplicativeFitness {
    fn default() -> Self {
        Self { scaling: 2.0 }
    }
}

impl FitnessFunction<Diploid> for MultiplicativeFitness {
    fn fitness(&self, diploid: &Diploid, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        self.genotype_fitness(diploid.first, diploid.second, gametes, mutations)
    }
}

impl FitnessFunction<SexedDiploid> for MultiplicativeFitness {
    fn fitness(&self, diploid: &SexedDiploid, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        self.genotype_fitness(diploid.first, diploid.second, gametes, mutations)
    }
}

/// Multi-locus genotypes multiply their per-locus fitnesses.
impl FitnessFunction<Vec<Diploid>> for MultiplicativeFitness {
    fn fitness(&self, loci: &Vec<Diploid>, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        loci.iter()
            .map(|d| self.genotype_fitness(d.first, d.second, gametes, mutations))
            .product()
    }
}

/// Additive site-based fitness: `max(0, 1 + Σ effects)` with heterozygous
/// sites contributing `h·s` and homozygous sites `scaling·s`.
#[derive(Debug, Clone, Copy)]
pub struct AdditiveFitness {
    pub scaling: f64,
}

impl AdditiveFitness {
    pub fn new(scaling: f64) -> Self {
        Self { scaling }
    }

    fn genotype_sum(&self, first: usize, second: usize, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        let sum = std::cell::Cell::new(0.0);
        for_each_selected_site(
            &gametes[first],
            &gametes[second],
            mutations,
            |m| sum.set(sum.get() + m.h * m.s),
            |m| sum.set(sum.get() + self.scaling * m.s),
        );
        sum.get()
    }
}

impl Default for AdditiveFitness {
    fn default() -> Self {
        Self { scaling: 2.0 }
    }
}

impl FitnessFunction<Diploid> for AdditiveFitness {
    fn fitness(&self, diploid: &Diploid, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        (1.0 + self.genotype_sum(diploid.first, diploid.second, gametes, mutations)).max(0.0)
    }
}

impl FitnessFunction<SexedDiploid> for AdditiveFitness {
    fn fitness(&self, diploid: &SexedDiploid, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        (1.0 + self.genotype_sum(diploid.first, diploid.second, gametes, mutations)).max(0.0)
    }
}

/// Gaussian stabilizing selection on a sex-limited additive trait.
///
/// The trait value of an individual is the sum of effect sizes of the
/// selected mutations it carries whose sex tag matches its own sex;
/// mutations limited to the other sex are silent. Fitness is
/// `exp(-z² / 2)`, the house-of-cards optimum at zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SexLimitedTraitFitness;

impl FitnessFunction<SexedDiploid> for SexLimitedTraitFitness {
    fn fitness(&self, diploid: &SexedDiploid, gametes: &[Gamete], mutations: &[Mutation]) -> f64 {
        let expressed = |key: &usize| -> f64 {
            let m = &mutations[*key];
            match m.payload {
                MutationPayload::SexLimited { female } if female == diploid.female => m.s,
                MutationPayload::SexLimited { .. } => 0.0,
                _ => m.s,
            }
        };
        let z: f64 = gametes[diploid.first]
            .selected
            .iter()
            .map(expressed)
            .chain(gametes[diploid.second].selected.iter().map(expressed))
            .sum();
        (-z * z / 2.0).exp()
    }
}

/// Fitness-proportional Wright-Fisher parent sampler.
///
/// `update_weights` must run once per generation, against the generation
/// about to reproduce, before any parent is drawn. The preprocessed sampler
/// is an owned resource: the previous table is released before a replacement
/// is installed. When every weight is zero (or the population is empty of
/// signal) sampling degrades to uniform.
#[derive(Debug, Default)]
pub struct SelectionEngine {
    fitnesses: Vec<f64>,
    wbar: f64,
    sampler: Option<DiscreteSampler>,
    n: usize,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute fitnesses and rebuild the sampler. Returns w̄.
    pub fn update_weights<D: Sync>(
        &mut self,
        diploids: &[D],
        gametes: &[Gamete],
        mutations: &[Mutation],
        fitness: &dyn FitnessFunction<D>,
    ) -> f64 {
        self.fitnesses = diploids
            .par_iter()
            .map(|d| fitness.fitness(d, gametes, mutations))
            .collect();
        self.n = diploids.len();
        self.wbar = if self.n == 0 {
            0.0
        } else {
            self.fitnesses.iter().sum::<f64>() / self.n as f64
        };
        self.sampler = None;
        self.sampler = DiscreteSampler::new(&self.fitnesses).ok();
        self.wbar
    }

    /// Mean fitness of the generation last weighed.
    pub fn mean_fitness(&self) -> f64 {
        self.wbar
    }

    /// Raw fitnesses of the generation last weighed.
    pub fn fitnesses(&self) -> &[f64] {
        &self.fitnesses
    }

    /// Draw a parent index with replacement, proportional to fitness.
    pub fn pick_parent(&self, rng: &mut SimRng) -> usize {
        match &self.sampler {
            Some(sampler) => sampler.sample(rng),
            None => (rng.uniform() * self.n as f64) as usize % self.n.max(1),
        }
    }

    /// Draw the second parent given the first.
    ///
    /// With probability `selfing` the first parent mates with itself;
    /// otherwise the draw is repeated until a distinct index comes up, so a
    /// selfing rate of zero forbids `p2 == p1` outright. A population of one
    /// degenerates to selfing.
    pub fn pick_second_parent(&self, rng: &mut SimRng, first: usize, selfing: f64) -> usize {
        if selfing > 0.0 && rng.uniform() < selfing {
            return first;
        }
        if self.n < 2 {
            return first;
        }
        loop {
            let second = self.pick_parent(rng);
            if second != first {
                return second;
            }
        }
    }
}

/// Parent-choice policy consumed by the generational driver.
pub trait ParentSamplingRules<D> {
    /// Weigh the reproducing generation. Returns w̄.
    fn update_weights(
        &mut self,
        diploids: &[D],
        gametes: &[Gamete],
        mutations: &[Mutation],
        fitness: &dyn FitnessFunction<D>,
    ) -> f64;

    /// Draw the first parent of an offspring.
    fn pick_first(&self, rng: &mut SimRng) -> usize;

    /// Draw the second parent, given the first and the selfing rate.
    fn pick_second(&self, rng: &mut SimRng, first: usize, selfing: f64) -> usize;

    /// Assign offspring-specific state once both gametes are in place.
    fn on_offspring(&self, _rng: &mut SimRng, _offspring: &mut D, _p1: &D, _p2: &D) {}
}

/// The standard Wright-Fisher rules: both parents from the whole population,
/// selfing honored, no offspring extras.
#[derive(Debug, Default)]
pub struct WrightFisherRules {
    engine: SelectionEngine,
}

impl WrightFisherRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> &SelectionEngine {
        &self.engine
    }
}

impl<D: Sync> ParentSamplingRules<D> for WrightFisherRules {
    fn update_weights(
        &mut self,
        diploids: &[D],
        gametes: &[Gamete],
        mutations: &[Mutation],
        fitness: &dyn FitnessFunction<D>,
    ) -> f64 {
        self.engine.update_weights(diploids, gametes, mutations, fitness)
    }

    fn pick_first(&self, rng: &mut SimRng) -> usize {
        self.engine.pick_parent(rng)
    }

    fn pick_second(&self, rng: &mut SimRng, first: usize, selfing: f64) -> usize {
        self.engine.pick_second_parent(rng, first, selfing)
    }
}

/// Sex-structured sampling: parent 1 from the male pool, parent 2 from the
/// female pool, each drawn proportional to raw fitness over the *global*
/// mean.
///
/// Normalizing both pools by the global w̄ (rather than each pool's own
/// mean) keeps the chance that any given individual is chosen proportional
/// to `w / w̄` conditional on its sex; per-pool normalization would instead
/// equalize the pools' contributions and distort selection between the
/// sexes. The selfing rate is accepted for interface uniformity and ignored:
/// parents always come from opposite pools.
#[derive(Debug, Default)]
pub struct SexStructuredRules {
    wbar: f64,
    male_wbar: f64,
    female_wbar: f64,
    male_indexes: Vec<usize>,
    female_indexes: Vec<usize>,
    male_sampler: Option<DiscreteSampler>,
    female_sampler: Option<DiscreteSampler>,
}

impl SexStructuredRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mean_fitness(&self) -> f64 {
        self.wbar
    }

    pub fn male_mean_fitness(&self) -> f64 {
        self.male_wbar
    }

    pub fn female_mean_fitness(&self) -> f64 {
        self.female_wbar
    }

    pub fn male_indexes(&self) -> &[usize] {
        &self.male_indexes
    }

    pub fn female_indexes(&self) -> &[usize] {
        &self.female_indexes
    }

    /// Draw a parent index from the male pool.
    pub fn pick_male(&self, rng: &mut SimRng) -> usize {
        Self::pick_from_pool(rng, &self.male_indexes, &self.male_sampler)
    }

    /// Draw a parent index from the female pool.
    pub fn pick_female(&self, rng: &mut SimRng) -> usize {
        Self::pick_from_pool(rng, &self.female_indexes, &self.female_sampler)
    }

    fn pick_from_pool(
        rng: &mut SimRng,
        indexes: &[usize],
        sampler: &Option<DiscreteSampler>,
    ) -> usize {
        assert!(!indexes.is_empty(), "parent pool is empty; population has lost one sex");
        match sampler {
            Some(sampler) => indexes[sampler.sample(rng)],
            None => indexes[(rng.uniform() * indexes.len() as f64) as usize % indexes.len()],
        }
    }
}

impl<D: SexedGenotype + Sync> ParentSamplingRules<D> for SexStructuredRules {
    fn update_weights(
        &mut self,
        diploids: &[D],
        gametes: &[Gamete],
        mutations: &[Mutation],
        fitness: &dyn FitnessFunction<D>,
    ) -> f64 {
        let raw: Vec<f64> = diploids
            .par_iter()
            .map(|d| fitness.fitness(d, gametes, mutations))
            .collect();

        self.male_indexes.clear();
        self.female_indexes.clear();
        let mut male_fitnesses = Vec::new();
        let mut female_fitnesses = Vec::new();
        let mut male_total = 0.0;
        let mut female_total = 0.0;
        for (i, (d, &w)) in diploids.iter().zip(raw.iter()).enumerate() {
            if d.is_female() {
                self.female_indexes.push(i);
                female_fitnesses.push(w);
                female_total += w;
            } else {
                self.male_indexes.push(i);
                male_fitnesses.push(w);
                male_total += w;
            }
        }

        let n = diploids.len();
        self.wbar = if n == 0 {
            0.0
        } else {
            (male_total + female_total) / n as f64
        };
        self.male_wbar = if self.male_indexes.is_empty() {
            0.0
        } else {
            male_total / self.male_indexes.len() as f64
        };
        self.female_wbar = if self.female_indexes.is_empty() {
            0.0
        } else {
            female_total / self.female_indexes.len() as f64
        };

        // Weights are raw fitness over the global mean, not the pool mean.
        if self.wbar > 0.0 {
            for w in male_fitnesses.iter_mut().chain(female_fitnesses.iter_mut()) {
                *w /= self.wbar;
            }
        }
        self.male_sampler = None;
        self.male_sampler = DiscreteSampler::new(&male_fitnesses).ok();
        self.female_sampler = None;
        self.female_sampler = DiscreteSampler::new(&female_fitnesses).ok();
        self.wbar
    }

    fn pick_first(&self, rng: &mut SimRng) -> usize {
        self.pick_male(rng)
    }

    fn pick_second(&self, rng: &mut SimRng, _first: usize, _selfing: f64) -> usize {
        self.pick_female(rng)
    }

    fn on_offspring(&self, rng: &mut SimRng, offspring: &mut D, _p1: &D, _p2: &D) {
        offspring.set_female(rng.coin());
    }
}
