//! Population containers and the generational update machinery.

pub mod engine;
pub mod population;
pub mod sweep;

pub use engine::{
    evolve_generation, evolve_metapopulation_generation, evolve_multilocus_generation,
    run_replicates, GenerationParams, MultiLocusParams,
};
pub use population::{GenePool, MetaPopulation, MultiLocusPopulation, Population, SexedPopulation};
pub use sweep::sweep_fixed_lost;
