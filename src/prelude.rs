//! Commonly used imports for convenience.
//!
//! ```
//! use fwdpop::prelude::*;
//!
//! let pop: Population = Population::new(50);
//! assert_eq!(pop.pool.total_gamete_refs(), 100);
//! ```

pub use crate::base::{DiscreteSampler, RecyclingBin, SimRng};
pub use crate::errors::ConfigError;
pub use crate::evolution::{
    AdditiveFitness, DiscreteMutationModel, DiscreteRecModel, FitnessFunction,
    InfSitesMutationModel, MultiplicativeFitness, MutationModel, ParentSamplingRules,
    PoissonCrossover, RecombinationModel, Region, SelectionEngine, SexLimitedMutationModel,
    SexLimitedTraitFitness, SexStructuredRules, WrightFisherRules, BREAKPOINT_SENTINEL,
};
pub use crate::genome::{
    Diploid, DiploidGenotype, Gamete, Mutation, MutationPayload, PositionLookup, SexedDiploid,
    SexedGenotype,
};
pub use crate::simulation::{
    evolve_generation, evolve_metapopulation_generation, evolve_multilocus_generation,
    run_replicates, GenerationParams, MetaPopulation, MultiLocusParams, MultiLocusPopulation,
    Population, SexedPopulation,
};
pub use crate::storage::{
    deserialize_metapopulation, deserialize_multilocus, deserialize_population,
    serialize_metapopulation, serialize_multilocus, serialize_population, CodecRegistry,
    MutationCodec, SerializeError,
};
