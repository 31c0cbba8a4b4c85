//! Genetic data model: mutations, gametes, and diploid genotypes.

mod diploid;
mod gamete;
mod mutation;

pub use diploid::{Diploid, DiploidGenotype, SexedDiploid, SexedGenotype};
pub use gamete::{update_mutation_counts, Gamete};
pub use mutation::{Mutation, MutationPayload, PositionLookup};
