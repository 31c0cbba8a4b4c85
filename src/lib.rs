//! # fwdpop
//!
//! A forward-time, discrete-generation simulation engine for evolutionary
//! genetics. Populations of diploid individuals evolve under mutation,
//! recombination, and fitness-proportional (Wright-Fisher) selection, with
//! infinite-sites mutation bookkeeping, slot recycling to keep memory
//! bounded over long runs, and canonical binary snapshots for reproducible
//! research.
//!
//! The engine is policy-parameterized: mutation models, recombination
//! models, fitness functions, and parent-sampling rules are narrow traits a
//! simulation injects, while the generational driver owns the invariants —
//! copy-count bookkeeping, genome reference counting, and deterministic
//! offspring-slot ordering for a fixed random seed.
//!
//! ```
//! use fwdpop::prelude::*;
//!
//! let mut rng = SimRng::seed_from_u64(42);
//! let mut pop: Population = Population::new(100);
//! let params = GenerationParams::outcrossing(0.1).unwrap();
//! let mmodel = InfSitesMutationModel::neutral(0.1).unwrap();
//! let recmodel = PoissonCrossover::unit(0.05).unwrap();
//! let fitness = MultiplicativeFitness::default();
//! let mut rules = WrightFisherRules::new();
//!
//! for _ in 0..10 {
//!     evolve_generation(
//!         &mut rng, &mut pop, &params, &mmodel, &recmodel, &fitness, &mut rules,
//!     );
//!     pop.sweep_fixed_lost();
//! }
//! assert_eq!(pop.generation, 10);
//! ```

pub mod base;
pub mod errors;
pub mod evolution;
pub mod genome;
pub mod prelude;
pub mod simulation;
pub mod storage;

pub use base::{RecyclingBin, SimRng};
pub use simulation::{MetaPopulation, MultiLocusPopulation, Population, SexedPopulation};
