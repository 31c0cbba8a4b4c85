//! Whole-engine integration tests: population-genetic invariants must hold
//! across many generations of mutation, recombination, selection, and
//! sweeping, for every topology and for the sex-structured variant.

use fwdpop::prelude::*;

/// Recount mutation copies from scratch and compare with the stored vector.
fn assert_copy_counts_consistent(pool: &fwdpop::simulation::GenePool) {
    let mut recount = vec![0u32; pool.mutations.len()];
    for gamete in pool.gametes.iter().filter(|g| g.count > 0) {
        for &key in gamete.neutral.iter().chain(gamete.selected.iter()) {
            recount[key] += gamete.count;
        }
    }
    assert_eq!(recount, pool.mcounts);
}

/// Live positions must be pairwise distinct and registered in the lookup.
fn assert_positions_unique(pool: &fwdpop::simulation::GenePool) {
    let mut seen = std::collections::HashSet::new();
    for (mutation, &count) in pool.mutations.iter().zip(pool.mcounts.iter()) {
        if count > 0 {
            assert!(
                seen.insert(mutation.pos.to_bits()),
                "duplicate live position {}",
                mutation.pos
            );
            assert!(pool.lookup.contains(mutation.pos));
        }
    }
}

#[test]
fn test_single_deme_invariants_over_generations() {
    let mut rng = SimRng::seed_from_u64(2024);
    let mut pop: Population = Population::new(50);
    let params = GenerationParams::outcrossing(2.0).unwrap();
    let mmodel = InfSitesMutationModel::new(
        1.5,
        0.5,
        Box::new(|rng| rng.uniform()),
        Box::new(|rng| -0.05 * rng.uniform()),
        Box::new(|_| 0.5),
    )
    .unwrap();
    let recmodel = PoissonCrossover::unit(1.0).unwrap();
    let fitness = MultiplicativeFitness::default();
    let mut rules = WrightFisherRules::new();

    for generation in 1..=100u32 {
        let wbar = evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        assert!(wbar > 0.0);
        pop.sweep_fixed_lost();

        assert_eq!(pop.generation, generation);
        assert_eq!(pop.diploids.len(), 50);
        assert_eq!(pop.pool.total_gamete_refs(), 100);
        assert_copy_counts_consistent(&pop.pool);
        assert_positions_unique(&pop.pool);

        // After a sweep no live mutation sits at 0 or 2N copies.
        for &count in &pop.pool.mcounts {
            assert!(count < pop.two_n());
        }
    }

    // Fixation generations accumulate in non-decreasing order.
    for pair in pop.pool.fixation_generations.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
}

#[test]
fn test_recycling_keeps_storage_bounded() {
    // With mutation but a small population, loss is constant; recycled slots
    // must keep the mutation vector from growing without bound.
    let mut rng = SimRng::seed_from_u64(9);
    let mut pop: Population = Population::new(10);
    let params = GenerationParams::outcrossing(1.0).unwrap();
    let mmodel = InfSitesMutationModel::neutral(1.0).unwrap();
    let recmodel = PoissonCrossover::unit(0.5).unwrap();
    let fitness = MultiplicativeFitness::default();
    let mut rules = WrightFisherRules::new();

    let mut peak_mutations = 0;
    let mut peak_gametes = 0;
    for _ in 0..300 {
        evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        pop.sweep_fixed_lost();
        peak_mutations = peak_mutations.max(pop.pool.mutations.len());
        peak_gametes = peak_gametes.max(pop.pool.gametes.len());
    }
    // Loose bounds: without recycling 300 generations at rate 1 would mint
    // thousands of mutation slots and far more gametes than 2N.
    assert!(peak_mutations < 600, "mutation arena grew to {peak_mutations}");
    assert!(peak_gametes < 200, "gamete arena grew to {peak_gametes}");
}

#[test]
fn test_fixation_has_full_copy_count_at_recorded_generation() {
    // Full selfing in a population of one fixes every new mutation in a
    // single generation, making fixation bookkeeping easy to audit.
    let mut rng = SimRng::seed_from_u64(5);
    let mut pop: Population = Population::new(1);
    let params = GenerationParams::new(0.8, 1.0).unwrap();
    let mmodel = InfSitesMutationModel::neutral(0.8).unwrap();
    let recmodel = PoissonCrossover::unit(0.0).unwrap();
    let fitness = MultiplicativeFitness::default();
    let mut rules = WrightFisherRules::new();

    for _ in 0..50 {
        evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        pop.sweep_fixed_lost();
    }
    assert!(!pop.pool.fixations.is_empty());
    assert_eq!(
        pop.pool.fixations.len(),
        pop.pool.fixation_generations.len()
    );
    for pair in pop.pool.fixation_generations.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    // Fixed mutations are gone from the live collection.
    for (mutation, &count) in pop.pool.mutations.iter().zip(pop.pool.mcounts.iter()) {
        if count > 0 {
            assert!(!pop
                .pool
                .fixations
                .iter()
                .any(|f| f.pos.to_bits() == mutation.pos.to_bits()));
        }
    }
}

#[test]
fn test_sexed_population_end_to_end() {
    let mut rng = SimRng::seed_from_u64(77);
    let mut pop: SexedPopulation = Population::new(40);
    pop.randomize_sexes(&mut rng);
    let mmodel = SexLimitedMutationModel::new(0.5, 0.25, 0.25, 0.1).unwrap();
    let params = GenerationParams::outcrossing(mmodel.total_rate()).unwrap();
    let recmodel = PoissonCrossover::unit(0.5).unwrap();
    let fitness = SexLimitedTraitFitness;
    let mut rules = SexStructuredRules::new();

    for _ in 0..30 {
        let wbar = evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        assert!(wbar > 0.0 && wbar <= 1.0);
        pop.sweep_fixed_lost();
        assert_copy_counts_consistent(&pop.pool);
        assert_eq!(pop.pool.total_gamete_refs(), 80);
    }

    // Both sexes persist under the coin-flip offspring hook.
    let females = pop.diploids.iter().filter(|d| d.female).count();
    assert!(females > 0 && females < 40);
}

#[test]
fn test_multilocus_invariants_over_generations() {
    let mut rng = SimRng::seed_from_u64(31);
    let mut pop =
        MultiLocusPopulation::with_boundaries(16, vec![(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]);
    let params = MultiLocusParams::new(3, vec![0.3, 0.3, 0.3], vec![0.5, 0.5], 0.0).unwrap();
    let m0 = InfSitesMutationModel::new(
        0.3,
        0.0,
        Box::new(|rng| rng.uniform_in(0.0, 1.0)),
        Box::new(|_| 0.0),
        Box::new(|_| 0.0),
    )
    .unwrap();
    let m1 = InfSitesMutationModel::new(
        0.3,
        0.0,
        Box::new(|rng| rng.uniform_in(1.0, 2.0)),
        Box::new(|_| 0.0),
        Box::new(|_| 0.0),
    )
    .unwrap();
    let m2 = InfSitesMutationModel::new(
        0.3,
        0.0,
        Box::new(|rng| rng.uniform_in(2.0, 3.0)),
        Box::new(|_| 0.0),
        Box::new(|_| 0.0),
    )
    .unwrap();
    let mmodels: Vec<&dyn MutationModel> = vec![&m0, &m1, &m2];
    let r0 = PoissonCrossover::new(0.2, Region::new(0.0, 1.0)).unwrap();
    let r1 = PoissonCrossover::new(0.2, Region::new(1.0, 2.0)).unwrap();
    let r2 = PoissonCrossover::new(0.2, Region::new(2.0, 3.0)).unwrap();
    let recmodels: Vec<&dyn RecombinationModel> = vec![&r0, &r1, &r2];
    let fitness = MultiplicativeFitness::default();
    let mut engine = SelectionEngine::new();

    for _ in 0..40 {
        evolve_multilocus_generation(
            &mut rng, &mut pop, &params, &mmodels, &recmodels, &fitness, &mut engine,
        );
        pop.sweep_fixed_lost();
        // 2 slots per locus per diploid.
        assert_eq!(pop.pool.total_gamete_refs(), 2 * 3 * 16);
        assert_copy_counts_consistent(&pop.pool);
        assert_positions_unique(&pop.pool);
    }
}

#[test]
fn test_metapopulation_invariants_over_generations() {
    let mut rng = SimRng::seed_from_u64(404);
    let mut pop = MetaPopulation::new(&[20, 12, 8]);
    let params = GenerationParams::outcrossing(0.5).unwrap();
    let mmodel = InfSitesMutationModel::neutral(0.5).unwrap();
    let recmodel = PoissonCrossover::unit(0.3).unwrap();
    let fitness = MultiplicativeFitness::default();
    let mut engine = SelectionEngine::new();

    for _ in 0..40 {
        let wbars = evolve_metapopulation_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut engine,
        );
        assert_eq!(wbars.len(), 3);
        pop.sweep_fixed_lost();
        assert_eq!(pop.pool.total_gamete_refs(), 2 * 40);
        assert_copy_counts_consistent(&pop.pool);
        // Fixation in a metapopulation means every slot of every deme.
        for &count in &pop.pool.mcounts {
            assert!(count < 2 * pop.total_census());
        }
    }
    for (deme, &size) in pop.demes.iter().zip(pop.deme_sizes.iter()) {
        assert_eq!(deme.len(), size as usize);
    }
}

#[test]
fn test_replicates_are_independent_and_reproducible() {
    let run = || {
        run_replicates(4, 1000, |_, mut rng| {
            let mut pop: Population = Population::new(20);
            let params = GenerationParams::outcrossing(0.5).unwrap();
            let mmodel = InfSitesMutationModel::neutral(0.5).unwrap();
            let recmodel = PoissonCrossover::unit(0.2).unwrap();
            let fitness = MultiplicativeFitness::default();
            let mut rules = WrightFisherRules::new();
            for _ in 0..20 {
                evolve_generation(
                    &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
                );
                pop.sweep_fixed_lost();
            }
            pop
        })
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
    // Different replicate seeds explore different histories.
    assert!(first
        .windows(2)
        .any(|pair| pair[0].pool.mutations != pair[1].pool.mutations));
}

#[test]
fn test_region_model_arity_validation_matches_contract() {
    // Mismatched weight vector length fails at construction.
    assert!(DiscreteMutationModel::new(
        0.001,
        0.0,
        vec![Region::new(0.0, 1.0), Region::new(1.0, 2.0)],
        vec![1.0, 0.5, 2.0],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .is_err());
    // Matched lengths succeed.
    assert!(DiscreteMutationModel::new(
        0.001,
        0.0,
        vec![Region::new(0.0, 1.0), Region::new(1.0, 2.0)],
        vec![1.0, 0.5],
        vec![],
        vec![],
        vec![],
        vec![],
    )
    .is_ok());
    // Recombination model: one interval against two weights fails.
    assert!(DiscreteRecModel::new(1e-3, vec![Region::new(0.0, 1.0)], vec![1.0, 2.0]).is_err());
    // A valid model at a large rate always ends with the sentinel.
    let model =
        DiscreteRecModel::new(50.0, vec![Region::new(0.0, 1.0), Region::new(1.0, 2.0)], vec![
            1.0, 2.0,
        ])
        .unwrap();
    let mut rng = SimRng::seed_from_u64(1);
    for _ in 0..20 {
        let breaks = model.breakpoints(&mut rng);
        assert!(!breaks.is_empty());
        assert_eq!(*breaks.last().unwrap(), BREAKPOINT_SENTINEL);
    }
}

#[test]
fn test_driver_with_region_models() {
    // The region-structured mutation and recombination models plug straight
    // into the generational driver.
    let mut rng = SimRng::seed_from_u64(60);
    let mut pop: Population = Population::new(25);
    let mmodel = DiscreteMutationModel::new(
        0.5,
        0.25,
        vec![Region::new(0.0, 1.0), Region::new(1.0, 2.0)],
        vec![1.0, 0.5],
        vec![Region::new(2.0, 3.0)],
        vec![1.0],
        vec![Box::new(|rng: &mut SimRng| -0.02 * rng.uniform())],
        vec![Box::new(|_: &mut SimRng| 0.5)],
    )
    .unwrap();
    let params = GenerationParams::outcrossing(mmodel.total_rate()).unwrap();
    let recmodel =
        DiscreteRecModel::new(0.5, vec![Region::new(0.0, 3.0)], vec![1.0]).unwrap();
    let fitness = MultiplicativeFitness::default();
    let mut rules = WrightFisherRules::new();

    for _ in 0..30 {
        evolve_generation(
            &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
        );
        pop.sweep_fixed_lost();
        assert_copy_counts_consistent(&pop.pool);
    }
    // Selected mutations only ever arise in the selected region.
    for (mutation, &count) in pop.pool.mutations.iter().zip(pop.pool.mcounts.iter()) {
        if count > 0 && !mutation.neutral {
            assert!((2.0..3.0).contains(&mutation.pos));
        }
    }
}
