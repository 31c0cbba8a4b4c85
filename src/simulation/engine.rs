//! Generational update drivers.
//!
//! One call advances a population by exactly one generation: weigh the
//! current diploids, fill every offspring slot in a fixed order (so a run is
//! reproducible from its seed), release the outgoing generation's genome
//! references, and recount mutation copies. Lost/fixed-mutation retirement
//! is a separate pass ([`super::sweep`]) the caller runs after each update,
//! mirroring how results are usually inspected between the two.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use rayon::prelude::*;

use crate::base::SimRng;
use crate::errors::ConfigError;
use crate::evolution::mutation::{MutationModel, MutationStore};
use crate::evolution::recombination::{recombine_lists, RecombinationModel};
use crate::evolution::selection::{FitnessFunction, ParentSamplingRules, SelectionEngine};
use crate::genome::{Diploid, DiploidGenotype, Gamete};
use crate::simulation::population::{GenePool, MetaPopulation, MultiLocusPopulation, Population};

/// Per-generation parameters of the single-locus drivers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Expected new mutations per gamete per generation (Poisson mean).
    pub mutation_rate: f64,
    /// Probability that an offspring is produced by self-fertilization.
    pub selfing: f64,
}

impl GenerationParams {
    /// # Errors
    /// Rejects a negative or non-finite mutation rate and a selfing
    /// probability outside `[0, 1]`.
    pub fn new(mutation_rate: f64, selfing: f64) -> Result<Self, ConfigError> {
        if !(mutation_rate >= 0.0) || !mutation_rate.is_finite() {
            return Err(ConfigError::InvalidRate("mutation_rate", mutation_rate));
        }
        if !(0.0..=1.0).contains(&selfing) {
            return Err(ConfigError::InvalidRate("selfing", selfing));
        }
        Ok(Self {
            mutation_rate,
            selfing,
        })
    }

    /// Random mating, no selfing.
    pub fn outcrossing(mutation_rate: f64) -> Result<Self, ConfigError> {
        Self::new(mutation_rate, 0.0)
    }
}

/// Parameters of the multi-locus driver.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiLocusParams {
    /// Per-locus Poisson means for new mutations.
    pub mutation_rates: Vec<f64>,
    /// Probability of a strand switch between adjacent loci; length is one
    /// less than the locus count.
    pub interlocus_recombination: Vec<f64>,
    pub selfing: f64,
}

impl MultiLocusParams {
    /// # Errors
    /// Vector lengths must match the locus count (`nloci` and `nloci - 1`),
    /// every rate must be a finite non-negative number, and every interlocus
    /// probability must lie in `[0, 1]`.
    pub fn new(
        nloci: u32,
        mutation_rates: Vec<f64>,
        interlocus_recombination: Vec<f64>,
        selfing: f64,
    ) -> Result<Self, ConfigError> {
        if mutation_rates.len() != nloci as usize {
            return Err(ConfigError::ArityMismatch {
                what: "per-locus mutation rates",
                expected: nloci as usize,
                found: mutation_rates.len(),
            });
        }
        let expected_links = (nloci as usize).saturating_sub(1);
        if interlocus_recombination.len() != expected_links {
            return Err(ConfigError::ArityMismatch {
                what: "interlocus recombination probabilities",
                expected: expected_links,
                found: interlocus_recombination.len(),
            });
        }
        for &rate in &mutation_rates {
            if !(rate >= 0.0) || !rate.is_finite() {
                return Err(ConfigError::InvalidRate("mutation_rate", rate));
            }
        }
        for &p in &interlocus_recombination {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::InvalidRate("interlocus_recombination", p));
            }
        }
        if !(0.0..=1.0).contains(&selfing) {
            return Err(ConfigError::InvalidRate("selfing", selfing));
        }
        Ok(Self {
            mutation_rates,
            interlocus_recombination,
            selfing,
        })
    }
}

/// Content-addressed index of the live gametes, used to deduplicate
/// assembled genomes against slots that already hold identical content.
type GameteIndex = HashMap<(Vec<usize>, Vec<usize>), usize>;

fn live_gamete_index(gametes: &[Gamete]) -> GameteIndex {
    gametes
        .iter()
        .enumerate()
        .filter(|(_, g)| g.count > 0)
        .map(|(i, g)| ((g.neutral.clone(), g.selected.clone()), i))
        .collect()
}

/// Store an assembled genome, preferring (in order) an existing identical
/// gamete, a recycled slot, and finally a fresh slot. Returns the index;
/// the caller owns the reference-count increment.
fn register_gamete(
    pool: &mut GenePool,
    index: &mut GameteIndex,
    neutral: Vec<usize>,
    selected: Vec<usize>,
) -> usize {
    match index.entry((neutral, selected)) {
        Entry::Occupied(entry) => *entry.get(),
        Entry::Vacant(entry) => {
            let (neutral, selected) = entry.key().clone();
            let gamete = Gamete::new(0, neutral, selected);
            let slot = match pool.gamete_bin.acquire() {
                Some(slot) => {
                    pool.gametes[slot] = gamete;
                    slot
                }
                None => {
                    pool.gametes.push(gamete);
                    pool.gametes.len() - 1
                }
            };
            entry.insert(slot);
            slot
        }
    }
}

/// Order a parent's two gamete indices by a Mendelian coin flip: the first
/// of the pair is the strand the recombination walk starts on, and the
/// transmitted strand when no crossover occurs.
fn transmitted_strands<D: DiploidGenotype>(rng: &mut SimRng, parent: &D) -> (usize, usize) {
    if rng.coin() {
        (parent.first(), parent.second())
    } else {
        (parent.second(), parent.first())
    }
}

/// Build one offspring gamete from an ordered pair of parental strands.
///
/// Fast path: no breakpoints and no new mutations transmit the leading
/// strand unchanged (its slot is simply referenced once more). Otherwise the
/// recombinant mutation lists are assembled, new mutations are inserted in
/// position order, and the result is registered in the pool.
#[allow(clippy::too_many_arguments)]
fn produce_offspring_gamete(
    rng: &mut SimRng,
    pool: &mut GenePool,
    index: &mut GameteIndex,
    strand1: usize,
    strand2: usize,
    mutation_rate: f64,
    mmodel: &dyn MutationModel,
    recmodel: &dyn RecombinationModel,
    generation: u32,
) -> usize {
    let breakpoints = recmodel.breakpoints(rng);
    let n_new = rng.poisson(mutation_rate);
    if breakpoints.is_empty() && n_new == 0 {
        return strand1;
    }

    let (mut neutral, mut selected) = {
        let g1 = &pool.gametes[strand1];
        if breakpoints.is_empty() {
            (g1.neutral.clone(), g1.selected.clone())
        } else {
            let g2 = &pool.gametes[strand2];
            (
                recombine_lists(&breakpoints, &g1.neutral, &g2.neutral, &pool.mutations),
                recombine_lists(&breakpoints, &g1.selected, &g2.selected, &pool.mutations),
            )
        }
    };

    for _ in 0..n_new {
        let key = {
            let mut store = MutationStore {
                mutations: &mut pool.mutations,
                lookup: &mut pool.lookup,
                bin: &mut pool.mutation_bin,
            };
            mmodel.make_mutation(rng, &mut store, generation)
        };
        let mutation = &pool.mutations[key];
        let list = if mutation.neutral {
            &mut neutral
        } else {
            &mut selected
        };
        let at = list.partition_point(|&k| pool.mutations[k].pos < mutation.pos);
        list.insert(at, key);
    }

    register_gamete(pool, index, neutral, selected)
}

/// Advance a single-deme population by one generation under the given
/// parent-sampling rules. Returns the mean fitness w̄ of the generation
/// that just reproduced.
pub fn evolve_generation<D, R>(
    rng: &mut SimRng,
    pop: &mut Population<D>,
    params: &GenerationParams,
    mmodel: &dyn MutationModel,
    recmodel: &dyn RecombinationModel,
    fitness: &dyn FitnessFunction<D>,
    rules: &mut R,
) -> f64
where
    D: DiploidGenotype + Sync,
    R: ParentSamplingRules<D> + ?Sized,
{
    let wbar = rules.update_weights(
        &pop.diploids,
        &pop.pool.gametes,
        &pop.pool.mutations,
        fitness,
    );
    let offspring_generation = pop.generation + 1;
    let parents = std::mem::take(&mut pop.diploids);
    let mut index = live_gamete_index(&pop.pool.gametes);

    let mut offspring = Vec::with_capacity(pop.n as usize);
    for _ in 0..pop.n {
        let p1 = rules.pick_first(rng);
        let p2 = rules.pick_second(rng, p1, params.selfing);
        let (p1a, p1b) = transmitted_strands(rng, &parents[p1]);
        let (p2a, p2b) = transmitted_strands(rng, &parents[p2]);

        let first = produce_offspring_gamete(
            rng,
            &mut pop.pool,
            &mut index,
            p1a,
            p1b,
            params.mutation_rate,
            mmodel,
            recmodel,
            offspring_generation,
        );
        pop.pool.gametes[first].count += 1;
        let second = produce_offspring_gamete(
            rng,
            &mut pop.pool,
            &mut index,
            p2a,
            p2b,
            params.mutation_rate,
            mmodel,
            recmodel,
            offspring_generation,
        );
        pop.pool.gametes[second].count += 1;

        let mut child = D::from_gametes(first, second);
        rules.on_offspring(rng, &mut child, &parents[p1], &parents[p2]);
        offspring.push(child);
    }

    for parent in &parents {
        pop.pool.release_gamete(parent.first());
        pop.pool.release_gamete(parent.second());
    }
    pop.diploids = offspring;
    pop.generation = offspring_generation;
    pop.pool.update_mutation_counts();
    wbar
}

/// Advance a multi-locus population by one generation.
///
/// Each locus has its own mutation model, recombination model, and mutation
/// rate; between adjacent loci the transmitted strand switches with the
/// configured interlocus probability, carrying linkage across locus
/// boundaries. The model slices must match the locus count, which
/// [`MultiLocusParams::new`] has already established for the rates.
pub fn evolve_multilocus_generation(
    rng: &mut SimRng,
    pop: &mut MultiLocusPopulation,
    params: &MultiLocusParams,
    mmodels: &[&dyn MutationModel],
    recmodels: &[&dyn RecombinationModel],
    fitness: &dyn FitnessFunction<Vec<Diploid>>,
    engine: &mut SelectionEngine,
) -> f64 {
    let nloci = pop.nloci as usize;
    assert_eq!(mmodels.len(), nloci, "one mutation model per locus");
    assert_eq!(recmodels.len(), nloci, "one recombination model per locus");

    let wbar = engine.update_weights(
        &pop.diploids,
        &pop.pool.gametes,
        &pop.pool.mutations,
        fitness,
    );
    let offspring_generation = pop.generation + 1;
    let parents = std::mem::take(&mut pop.diploids);
    let mut index = live_gamete_index(&pop.pool.gametes);

    let mut offspring = Vec::with_capacity(pop.n as usize);
    for _ in 0..pop.n {
        let p1 = engine.pick_parent(rng);
        let p2 = engine.pick_second_parent(rng, p1, params.selfing);
        let mut swap1 = rng.coin();
        let mut swap2 = rng.coin();
        let mut child = Vec::with_capacity(nloci);
        for locus in 0..nloci {
            if locus > 0 {
                let link = params.interlocus_recombination[locus - 1];
                if rng.uniform() < link {
                    swap1 = !swap1;
                }
                if rng.uniform() < link {
                    swap2 = !swap2;
                }
            }
            let locus1 = &parents[p1][locus];
            let locus2 = &parents[p2][locus];
            let (p1a, p1b) = if swap1 {
                (locus1.second, locus1.first)
            } else {
                (locus1.first, locus1.second)
            };
            let (p2a, p2b) = if swap2 {
                (locus2.second, locus2.first)
            } else {
                (locus2.first, locus2.second)
            };

            let first = produce_offspring_gamete(
                rng,
                &mut pop.pool,
                &mut index,
                p1a,
                p1b,
                params.mutation_rates[locus],
                mmodels[locus],
                recmodels[locus],
                offspring_generation,
            );
            pop.pool.gametes[first].count += 1;
            let second = produce_offspring_gamete(
                rng,
                &mut pop.pool,
                &mut index,
                p2a,
                p2b,
                params.mutation_rates[locus],
                mmodels[locus],
                recmodels[locus],
                offspring_generation,
            );
            pop.pool.gametes[second].count += 1;
            child.push(Diploid::new(first, second));
        }
        offspring.push(child);
    }

    for parent in &parents {
        for locus in parent {
            pop.pool.release_gamete(locus.first);
            pop.pool.release_gamete(locus.second);
        }
    }
    pop.diploids = offspring;
    pop.generation = offspring_generation;
    pop.pool.update_mutation_counts();
    wbar
}

/// Advance every deme of a metapopulation by one generation.
///
/// Demes reproduce independently (no migration) against the shared gene
/// pool: parents for a deme's offspring come from that deme only. Returns
/// the per-deme mean fitnesses, in deme order.
pub fn evolve_metapopulation_generation(
    rng: &mut SimRng,
    pop: &mut MetaPopulation,
    params: &GenerationParams,
    mmodel: &dyn MutationModel,
    recmodel: &dyn RecombinationModel,
    fitness: &dyn FitnessFunction<Diploid>,
    engine: &mut SelectionEngine,
) -> Vec<f64> {
    let offspring_generation = pop.generation + 1;
    let old_demes = std::mem::take(&mut pop.demes);
    let mut index = live_gamete_index(&pop.pool.gametes);

    let mut wbars = Vec::with_capacity(old_demes.len());
    let mut new_demes = Vec::with_capacity(old_demes.len());
    for (d, deme) in old_demes.iter().enumerate() {
        let wbar = engine.update_weights(deme, &pop.pool.gametes, &pop.pool.mutations, fitness);
        wbars.push(wbar);

        let size = pop.deme_sizes[d];
        let mut offspring = Vec::with_capacity(size as usize);
        for _ in 0..size {
            let p1 = engine.pick_parent(rng);
            let p2 = engine.pick_second_parent(rng, p1, params.selfing);
            let (p1a, p1b) = transmitted_strands(rng, &deme[p1]);
            let (p2a, p2b) = transmitted_strands(rng, &deme[p2]);

            let first = produce_offspring_gamete(
                rng,
                &mut pop.pool,
                &mut index,
                p1a,
                p1b,
                params.mutation_rate,
                mmodel,
                recmodel,
                offspring_generation,
            );
            pop.pool.gametes[first].count += 1;
            let second = produce_offspring_gamete(
                rng,
                &mut pop.pool,
                &mut index,
                p2a,
                p2b,
                params.mutation_rate,
                mmodel,
                recmodel,
                offspring_generation,
            );
            pop.pool.gametes[second].count += 1;
            offspring.push(Diploid::new(first, second));
        }
        new_demes.push(offspring);
    }

    for deme in &old_demes {
        for parent in deme {
            pop.pool.release_gamete(parent.first);
            pop.pool.release_gamete(parent.second);
        }
    }
    pop.demes = new_demes;
    pop.generation = offspring_generation;
    pop.pool.update_mutation_counts();
    wbars
}

/// Run independent replicate simulations in parallel.
///
/// Each replicate owns its population and its own deterministically derived
/// RNG stream; nothing is shared between replicates, so the batch scales to
/// the available cores without any locking.
pub fn run_replicates<T, F>(n_replicates: usize, base_seed: u64, replicate: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, SimRng) -> T + Sync,
{
    (0..n_replicates)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add((i as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            replicate(i, SimRng::seed_from_u64(seed))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evolution::{
        InfSitesMutationModel, MultiplicativeFitness, PoissonCrossover, WrightFisherRules,
    };

    fn neutral_setup() -> (
        GenerationParams,
        InfSitesMutationModel,
        PoissonCrossover,
        MultiplicativeFitness,
    ) {
        (
            GenerationParams::outcrossing(0.5).unwrap(),
            InfSitesMutationModel::neutral(0.5).unwrap(),
            PoissonCrossover::unit(0.5).unwrap(),
            MultiplicativeFitness::default(),
        )
    }

    fn assert_pool_invariants(pop: &Population) {
        // Gamete reference counts must cover every chromosome slot.
        assert_eq!(pop.pool.total_gamete_refs(), u64::from(2 * pop.n));
        // Recounting from scratch must agree with the stored copy counts.
        let mut recount = Vec::new();
        crate::genome::update_mutation_counts(
            &pop.pool.gametes,
            pop.pool.mutations.len(),
            &mut recount,
        );
        assert_eq!(recount, pop.pool.mcounts);
        // No diploid may reference a dead gamete.
        for d in &pop.diploids {
            assert!(pop.pool.gametes[d.first].count > 0);
            assert!(pop.pool.gametes[d.second].count > 0);
        }
    }

    #[test]
    fn test_single_generation_bookkeeping() {
        let (params, mmodel, recmodel, fitness) = neutral_setup();
        let mut rng = SimRng::seed_from_u64(42);
        let mut pop: Population = Population::new(20);
        let mut rules = WrightFisherRules::new();
        let wbar = evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        assert_eq!(pop.generation, 1);
        assert_eq!(pop.diploids.len(), 20);
        assert!((wbar - 1.0).abs() < 1e-12);
        assert_pool_invariants(&pop);
    }

    #[test]
    fn test_many_generations_with_sweep() {
        let (params, mmodel, recmodel, fitness) = neutral_setup();
        let mut rng = SimRng::seed_from_u64(7);
        let mut pop: Population = Population::new(10);
        let mut rules = WrightFisherRules::new();
        for _ in 0..50 {
            evolve_generation(
                &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
            );
            pop.sweep_fixed_lost();
            assert_pool_invariants(&pop);
        }
        assert_eq!(pop.generation, 50);
        // Positions must stay pairwise distinct among live mutations.
        let mut seen = std::collections::HashSet::new();
        for (m, &count) in pop.pool.mutations.iter().zip(pop.pool.mcounts.iter()) {
            if count > 0 {
                assert!(seen.insert(m.pos.to_bits()));
                assert!(pop.pool.lookup.contains(m.pos));
            }
        }
    }

    #[test]
    fn test_zero_mutation_rate_is_legal() {
        let params = GenerationParams::outcrossing(0.0).unwrap();
        let mmodel = InfSitesMutationModel::neutral(0.0).unwrap();
        let recmodel = PoissonCrossover::unit(0.0).unwrap();
        let fitness = MultiplicativeFitness::default();
        let mut rng = SimRng::seed_from_u64(3);
        let mut pop: Population = Population::new(8);
        let mut rules = WrightFisherRules::new();
        for _ in 0..5 {
            evolve_generation(
                &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
            );
            pop.sweep_fixed_lost();
        }
        assert!(pop.pool.mutations.is_empty());
        // With no mutation and no crossover everyone still shares the
        // original blank gamete.
        assert_eq!(pop.pool.total_gamete_refs(), 16);
        assert_pool_invariants(&pop);
    }

    #[test]
    fn test_determinism_same_seed_same_population() {
        let (params, mmodel, recmodel, fitness) = neutral_setup();
        let run = |seed: u64| {
            let mut rng = SimRng::seed_from_u64(seed);
            let mut pop: Population = Population::new(12);
            let mut rules = WrightFisherRules::new();
            for _ in 0..10 {
                evolve_generation(
                    &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
                );
                pop.sweep_fixed_lost();
            }
            pop
        };
        let a = run(1234);
        let b = run(1234);
        assert_eq!(a, b);
        let c = run(4321);
        // Same shape, almost surely different history.
        assert_eq!(c.generation, a.generation);
    }

    #[test]
    fn test_generation_params_validation() {
        assert!(GenerationParams::new(-0.1, 0.0).is_err());
        assert!(GenerationParams::new(0.1, 1.5).is_err());
        assert!(GenerationParams::new(0.1, 0.5).is_ok());
    }

    #[test]
    fn test_multilocus_params_validation() {
        assert!(MultiLocusParams::new(2, vec![0.1], vec![0.5], 0.0).is_err());
        assert!(MultiLocusParams::new(2, vec![0.1, 0.1], vec![0.5, 0.5], 0.0).is_err());
        assert!(MultiLocusParams::new(2, vec![0.1, 0.1], vec![1.5], 0.0).is_err());
        assert!(MultiLocusParams::new(2, vec![0.1, 0.1], vec![0.5], 0.0).is_ok());
    }

    #[test]
    fn test_multilocus_generation_bookkeeping() {
        let mut rng = SimRng::seed_from_u64(99);
        let mut pop = MultiLocusPopulation::new(8, 3);
        let params = MultiLocusParams::new(3, vec![0.2; 3], vec![0.5, 0.5], 0.0).unwrap();
        let mmodel = InfSitesMutationModel::neutral(0.2).unwrap();
        let recmodel = PoissonCrossover::unit(0.2).unwrap();
        let mmodels: Vec<&dyn MutationModel> = vec![&mmodel; 3];
        let recmodels: Vec<&dyn RecombinationModel> = vec![&recmodel; 3];
        let fitness = MultiplicativeFitness::default();
        let mut engine = SelectionEngine::new();
        for _ in 0..10 {
            evolve_multilocus_generation(
                &mut rng, &mut pop, &params, &mmodels, &recmodels, &fitness, &mut engine,
            );
            pop.sweep_fixed_lost();
        }
        assert_eq!(pop.generation, 10);
        // 2 slots per locus per diploid.
        assert_eq!(pop.pool.total_gamete_refs(), 2 * 8 * 3);
        let mut recount = Vec::new();
        crate::genome::update_mutation_counts(
            &pop.pool.gametes,
            pop.pool.mutations.len(),
            &mut recount,
        );
        assert_eq!(recount, pop.pool.mcounts);
    }

    #[test]
    fn test_metapopulation_generation_bookkeeping() {
        let mut rng = SimRng::seed_from_u64(5);
        let mut pop = MetaPopulation::new(&[6, 10]);
        let (params, mmodel, recmodel, fitness) = neutral_setup();
        let mut engine = SelectionEngine::new();
        for _ in 0..10 {
            let wbars = evolve_metapopulation_generation(
                &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut engine,
            );
            assert_eq!(wbars.len(), 2);
            pop.sweep_fixed_lost();
        }
        assert_eq!(pop.demes[0].len(), 6);
        assert_eq!(pop.demes[1].len(), 10);
        assert_eq!(pop.pool.total_gamete_refs(), 32);
        let mut recount = Vec::new();
        crate::genome::update_mutation_counts(
            &pop.pool.gametes,
            pop.pool.mutations.len(),
            &mut recount,
        );
        assert_eq!(recount, pop.pool.mcounts);
    }

    #[test]
    fn test_run_replicates_deterministic_per_index() {
        let results = run_replicates(4, 11, |i, mut rng| (i, rng.uniform()));
        let again = run_replicates(4, 11, |i, mut rng| (i, rng.uniform()));
        assert_eq!(results, again);
        // Streams differ between replicates.
        assert_ne!(results[0].1.to_bits(), results[1].1.to_bits());
    }
}
