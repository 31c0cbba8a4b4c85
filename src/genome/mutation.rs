//! Mutation records and the infinite-sites position registry.
//!
//! Every mutation occupies a slot in a flat vector owned by the population.
//! Records are immutable once created; retirement is handled by marking the
//! slot free and reusing it, never by physically removing it. Positions are
//! real-valued and pairwise distinct across all live mutations (the
//! infinite-sites assumption), enforced by [`PositionLookup`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Model-specific data carried by a mutation beyond the shared fields.
///
/// The engine does not interpret payloads; they exist so a simulation can
/// attach extra state (which sex a trait effect applies to, a whole vector of
/// effect/dominance tuples) without the core bookkeeping caring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MutationPayload {
    /// Plain point mutation: the shared fields say everything.
    None,
    /// The selection coefficient applies only to carriers of this sex.
    SexLimited { female: bool },
    /// Per-trait (selection, dominance) tuples for pleiotropic models.
    EffectVector(Vec<(f64, f64)>),
}

/// A single mutation under the infinite-sites model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Genomic position; globally unique among live mutations.
    pub pos: f64,
    /// Selection coefficient. Zero for neutral mutations.
    pub s: f64,
    /// Dominance of the heterozygote. Zero for neutral mutations.
    pub h: f64,
    /// Generation in which the mutation arose.
    pub origin: u32,
    /// Whether the mutation is invisible to selection.
    pub neutral: bool,
    /// Model-specific extension data.
    pub payload: MutationPayload,
}

impl Mutation {
    /// A neutral mutation at `pos`, stamped with its origin generation.
    pub fn neutral_at(pos: f64, origin: u32) -> Self {
        Self {
            pos,
            s: 0.0,
            h: 0.0,
            origin,
            neutral: true,
            payload: MutationPayload::None,
        }
    }

    /// A selected mutation with coefficient `s` and dominance `h`.
    pub fn selected(pos: f64, s: f64, h: f64, origin: u32) -> Self {
        Self {
            pos,
            s,
            h,
            origin,
            neutral: false,
            payload: MutationPayload::None,
        }
    }

    /// Attach a payload, consuming the record.
    pub fn with_payload(mut self, payload: MutationPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Registry of the genomic positions currently occupied by live mutations.
///
/// Positions are compared by exact bit pattern: they are produced by the
/// random source and only ever tested for identity, never arithmetic
/// closeness. Membership here is also the engine's definition of a live
/// mutation slot — the fixation/loss sweep only retires a slot whose position
/// it successfully removes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionLookup {
    positions: HashSet<u64>,
}

impl PositionLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, pos: f64) -> bool {
        self.positions.contains(&pos.to_bits())
    }

    /// Register a position. Returns `false` if it was already present.
    pub fn insert(&mut self, pos: f64) -> bool {
        self.positions.insert(pos.to_bits())
    }

    /// Remove a position. Returns `false` if it was not present.
    pub fn remove(&mut self, pos: f64) -> bool {
        self.positions.remove(&pos.to_bits())
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }
}
