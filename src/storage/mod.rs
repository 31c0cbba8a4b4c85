//! Canonical binary serialization of population state.
//!
//! Snapshots are bit-exact round trips for all three topologies: encode a
//! population, decode the bytes, and the result compares equal to the
//! original — including the derived copy-count vector and position registry,
//! which are never persisted but reconstructed from the decoded gametes.

mod codec;
mod error;
mod scalar;
mod serialize;

pub use codec::{
    CodecRegistry, EffectVectorCodec, MutationCodec, PointMutationCodec, SexLimitedCodec,
    TAG_EFFECT_VECTOR, TAG_POINT, TAG_SEX_LIMITED,
};
pub use error::SerializeError;
pub use scalar::ByteReader;
pub use serialize::{
    deserialize_metapopulation, deserialize_multilocus, deserialize_population,
    serialize_metapopulation, serialize_multilocus, serialize_population,
};
