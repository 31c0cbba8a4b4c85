//! Evolutionary operators: mutation, recombination, and selection.
//!
//! Each operator is a policy behind a narrow trait so simulations can inject
//! their own models without the generational driver changing:
//! - **Mutation**: infinite-sites record creation ([`MutationModel`])
//! - **Recombination**: breakpoint sequences and recombinant assembly
//!   ([`RecombinationModel`])
//! - **Selection**: fitness policies and fitness-proportional parent
//!   sampling ([`FitnessFunction`], [`ParentSamplingRules`])

pub mod mutation;
pub mod recombination;
pub mod selection;

pub use mutation::{
    DeviateFn, DiscreteMutationModel, InfSitesMutationModel, MutationModel, MutationStore,
    Region, SexLimitedMutationModel,
};
pub use recombination::{
    recombine_lists, DiscreteRecModel, PoissonCrossover, RecombinationModel,
    BREAKPOINT_SENTINEL,
};
pub use selection::{
    AdditiveFitness, FitnessFunction, MultiplicativeFitness, ParentSamplingRules,
    SelectionEngine, SexLimitedTraitFitness, SexStructuredRules, WrightFisherRules,
};
