//! Population containers for the three supported topologies.
//!
//! All topologies share a [`GenePool`]: the flat mutation and gamete
//! collections, the derived copy-count vector, the infinite-sites position
//! registry, accumulated fixations, and the two recycling bins. What differs
//! is only the shape of the diploid collection — a single vector, a vector of
//! per-locus genotype vectors, or one vector per deme. Topology is fixed for
//! the lifetime of a population, so each shape is its own concrete type
//! rather than a runtime-polymorphic one.

use serde::{Deserialize, Serialize};

use crate::base::RecyclingBin;
use crate::genome::{
    update_mutation_counts, Diploid, DiploidGenotype, Gamete, Mutation, PositionLookup,
    SexedDiploid,
};

/// Shared genetic state: every mutation and gamete ever live, plus the
/// bookkeeping derived from them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenePool {
    /// Flat mutation storage; retired slots are reused, never removed.
    pub mutations: Vec<Mutation>,
    /// Per-mutation copy counts, index-aligned with `mutations`. Derived.
    pub mcounts: Vec<u32>,
    /// Flat gamete storage; slots at reference count zero are reusable.
    pub gametes: Vec<Gamete>,
    /// Live genomic positions. Derived; doubles as the live-slot registry.
    pub lookup: PositionLookup,
    /// Mutations that reached fixation, in discovery order.
    pub fixations: Vec<Mutation>,
    /// Generation at which each fixation was recorded; non-decreasing.
    pub fixation_generations: Vec<u32>,
    /// Free mutation slots.
    pub mutation_bin: RecyclingBin,
    /// Free gamete slots.
    pub gamete_bin: RecyclingBin,
}

impl GenePool {
    /// A pool holding one mutation-free gamete referenced `count` times.
    pub fn with_initial_gamete(count: u32) -> Self {
        Self {
            gametes: vec![Gamete::blank(count)],
            ..Self::default()
        }
    }

    /// Recount `mcounts` from the live gametes.
    pub fn update_mutation_counts(&mut self) {
        update_mutation_counts(&self.gametes, self.mutations.len(), &mut self.mcounts);
    }

    /// Rebuild every derived structure from the primary collections:
    /// copy counts, the position registry, and both recycling bins.
    ///
    /// Used after decoding a serialized population, which persists only the
    /// primary data.
    pub fn rebuild_derived(&mut self) {
        self.update_mutation_counts();
        self.lookup.clear();
        for (mutation, &count) in self.mutations.iter().zip(self.mcounts.iter()) {
            if count > 0 {
                self.lookup.insert(mutation.pos);
            }
        }
        self.mutation_bin = RecyclingBin::from_counts(&self.mcounts);
        let gamete_counts: Vec<u32> = self.gametes.iter().map(|g| g.count).collect();
        self.gamete_bin = RecyclingBin::from_counts(&gamete_counts);
    }

    /// Drop one reference to a gamete, recycling the slot at zero.
    pub fn release_gamete(&mut self, index: usize) {
        let gamete = &mut self.gametes[index];
        debug_assert!(gamete.count > 0, "releasing a dead gamete");
        gamete.count -= 1;
        if gamete.count == 0 {
            gamete.neutral.clear();
            gamete.selected.clear();
            self.gamete_bin.release(index);
        }
    }

    /// Number of live (segregating) mutations.
    pub fn live_mutations(&self) -> usize {
        self.lookup.len()
    }

    /// Sum of gamete reference counts; equals twice the number of occupied
    /// chromosome slots.
    pub fn total_gamete_refs(&self) -> u64 {
        self.gametes.iter().map(|g| u64::from(g.count)).sum()
    }
}

/// Allocator bins are scratch state; two pools are equal when their genetic
/// content and derived bookkeeping agree.
impl PartialEq for GenePool {
    fn eq(&self, other: &Self) -> bool {
        self.mutations == other.mutations
            && self.mcounts == other.mcounts
            && self.gametes == other.gametes
            && self.lookup == other.lookup
            && self.fixations == other.fixations
            && self.fixation_generations == other.fixation_generations
    }
}

/// A single panmictic deme of `n` diploids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population<D = Diploid> {
    pub pool: GenePool,
    pub diploids: Vec<D>,
    /// Census size.
    pub n: u32,
    pub generation: u32,
}

impl<D: DiploidGenotype> Population<D> {
    /// A mutation-free population: every chromosome slot references one
    /// shared blank gamete.
    pub fn new(n: u32) -> Self {
        Self {
            pool: GenePool::with_initial_gamete(2 * n),
            diploids: vec![D::from_gametes(0, 0); n as usize],
            n,
            generation: 0,
        }
    }

    /// The fixation threshold: twice the census size.
    pub fn two_n(&self) -> u32 {
        2 * self.n
    }

    /// Retire lost and fixed mutations for the current generation.
    pub fn sweep_fixed_lost(&mut self) {
        let two_n = self.two_n();
        let generation = self.generation;
        super::sweep::sweep_fixed_lost(&mut self.pool, two_n, generation);
    }
}

/// A population with sexed individuals.
pub type SexedPopulation = Population<SexedDiploid>;

impl SexedPopulation {
    /// Assign every individual's sex by a fair coin flip.
    pub fn randomize_sexes(&mut self, rng: &mut crate::base::SimRng) {
        for diploid in &mut self.diploids {
            diploid.female = rng.coin();
        }
    }
}

/// `n` diploids, each an ordered sequence of per-locus genotype pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLocusPopulation {
    pub pool: GenePool,
    /// `diploids[individual][locus]`.
    pub diploids: Vec<Vec<Diploid>>,
    /// Half-open genomic interval per locus; may be empty when the caller
    /// does not track physical coordinates.
    pub locus_boundaries: Vec<(f64, f64)>,
    pub n: u32,
    pub nloci: u32,
    pub generation: u32,
}

impl MultiLocusPopulation {
    pub fn new(n: u32, nloci: u32) -> Self {
        Self {
            pool: GenePool::with_initial_gamete(2 * n * nloci),
            diploids: vec![vec![Diploid::new(0, 0); nloci as usize]; n as usize],
            locus_boundaries: Vec::new(),
            n,
            nloci,
            generation: 0,
        }
    }

    /// Construct with explicit per-locus boundary intervals.
    pub fn with_boundaries(n: u32, boundaries: Vec<(f64, f64)>) -> Self {
        let nloci = boundaries.len() as u32;
        Self {
            locus_boundaries: boundaries,
            ..Self::new(n, nloci)
        }
    }

    pub fn two_n(&self) -> u32 {
        2 * self.n
    }

    pub fn sweep_fixed_lost(&mut self) {
        let two_n = self.two_n();
        let generation = self.generation;
        super::sweep::sweep_fixed_lost(&mut self.pool, two_n, generation);
    }
}

/// Several demes over one shared gene pool, each with its own census size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaPopulation {
    pub pool: GenePool,
    /// `demes[deme][individual]`.
    pub demes: Vec<Vec<Diploid>>,
    pub deme_sizes: Vec<u32>,
    pub generation: u32,
}

impl MetaPopulation {
    pub fn new(deme_sizes: &[u32]) -> Self {
        let total: u32 = deme_sizes.iter().sum();
        Self {
            pool: GenePool::with_initial_gamete(2 * total),
            demes: deme_sizes
                .iter()
                .map(|&s| vec![Diploid::new(0, 0); s as usize])
                .collect(),
            deme_sizes: deme_sizes.to_vec(),
            generation: 0,
        }
    }

    pub fn total_census(&self) -> u32 {
        self.deme_sizes.iter().sum()
    }

    /// Fixation means presence in every chromosome slot of every deme.
    pub fn sweep_fixed_lost(&mut self) {
        let threshold = 2 * self.total_census();
        super::sweep::sweep_fixed_lost(&mut self.pool, threshold, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_population_shape() {
        let pop: Population = Population::new(10);
        assert_eq!(pop.diploids.len(), 10);
        assert_eq!(pop.pool.gametes.len(), 1);
        assert_eq!(pop.pool.gametes[0].count, 20);
        assert_eq!(pop.pool.total_gamete_refs(), 20);
        assert_eq!(pop.generation, 0);
    }

    #[test]
    fn test_release_gamete_recycles_at_zero() {
        let mut pool = GenePool::with_initial_gamete(2);
        pool.release_gamete(0);
        assert!(pool.gamete_bin.is_empty());
        pool.release_gamete(0);
        assert_eq!(pool.gamete_bin.acquire(), Some(0));
    }

    #[test]
    fn test_rebuild_derived_matches_native_bookkeeping() {
        let mut pool = GenePool::with_initial_gamete(4);
        pool.mutations.push(Mutation::neutral_at(0.5, 0));
        pool.mutations.push(Mutation::neutral_at(0.9, 0));
        pool.gametes.push(Gamete::new(2, vec![0], vec![]));
        pool.gametes.push(Gamete::new(0, vec![], vec![]));
        pool.rebuild_derived();
        assert_eq!(pool.mcounts, vec![2, 0]);
        assert!(pool.lookup.contains(0.5));
        assert!(!pool.lookup.contains(0.9));
        assert_eq!(pool.mutation_bin.acquire(), Some(1));
        assert_eq!(pool.gamete_bin.acquire(), Some(2));
    }

    #[test]
    fn test_multilocus_population_shape() {
        let pop = MultiLocusPopulation::new(5, 3);
        assert_eq!(pop.diploids.len(), 5);
        assert_eq!(pop.diploids[0].len(), 3);
        assert_eq!(pop.pool.total_gamete_refs(), 2 * 5 * 3);
    }

    #[test]
    fn test_multilocus_with_boundaries() {
        let pop = MultiLocusPopulation::with_boundaries(4, vec![(0.0, 1.0), (1.0, 2.0)]);
        assert_eq!(pop.nloci, 2);
        assert_eq!(pop.locus_boundaries.len(), 2);
    }

    #[test]
    fn test_metapopulation_shape() {
        let pop = MetaPopulation::new(&[6, 4]);
        assert_eq!(pop.demes.len(), 2);
        assert_eq!(pop.demes[0].len(), 6);
        assert_eq!(pop.demes[1].len(), 4);
        assert_eq!(pop.total_census(), 10);
        assert_eq!(pop.pool.total_gamete_refs(), 20);
    }

    #[test]
    fn test_gene_pool_equality_ignores_bins() {
        let a = GenePool::with_initial_gamete(2);
        let mut b = GenePool::with_initial_gamete(2);
        b.mutation_bin.release(5);
        assert_eq!(a, b);
    }
}
