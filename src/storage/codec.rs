//! Pluggable per-mutation-payload codecs.
//!
//! A mutation record on the wire is a one-byte payload tag followed by the
//! bytes of the codec registered for that tag. The registry is explicit:
//! encoding a mutation whose payload has no registered codec is a hard
//! error, as is decoding an unknown tag — there is no silent skip path,
//! because a snapshot that drops records is worse than no snapshot.

use std::collections::HashMap;

use crate::genome::{Mutation, MutationPayload};

use super::scalar::{self, ByteReader};
use super::SerializeError;

/// Wire tags, one per payload shape.
pub const TAG_POINT: u8 = 0;
pub const TAG_SEX_LIMITED: u8 = 1;
pub const TAG_EFFECT_VECTOR: u8 = 2;

/// Encoder/decoder for one mutation payload shape.
pub trait MutationCodec {
    /// The wire tag this codec claims.
    fn tag(&self) -> u8;

    /// Append the record body (everything after the tag byte).
    fn encode(&self, mutation: &Mutation, buf: &mut Vec<u8>) -> Result<(), SerializeError>;

    /// Read one record body.
    fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError>;
}

fn write_common(mutation: &Mutation, buf: &mut Vec<u8>) {
    scalar::write_f64(buf, mutation.pos);
    scalar::write_f64(buf, mutation.s);
    scalar::write_f64(buf, mutation.h);
    scalar::write_u32(buf, mutation.origin);
    scalar::write_bool(buf, mutation.neutral);
}

fn read_common(reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError> {
    let pos = reader.read_f64()?;
    let s = reader.read_f64()?;
    let h = reader.read_f64()?;
    let origin = reader.read_u32()?;
    let neutral = reader.read_bool()?;
    Ok(Mutation {
        pos,
        s,
        h,
        origin,
        neutral,
        payload: MutationPayload::None,
    })
}

/// Codec for plain point mutations.
#[derive(Debug, Default)]
pub struct PointMutationCodec;

impl MutationCodec for PointMutationCodec {
    fn tag(&self) -> u8 {
        TAG_POINT
    }

    fn encode(&self, mutation: &Mutation, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        write_common(mutation, buf);
        Ok(())
    }

    fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError> {
        read_common(reader)
    }
}

/// Codec for sex-limited mutations: common fields plus the sex flag.
#[derive(Debug, Default)]
pub struct SexLimitedCodec;

impl MutationCodec for SexLimitedCodec {
    fn tag(&self) -> u8 {
        TAG_SEX_LIMITED
    }

    fn encode(&self, mutation: &Mutation, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        let female = match mutation.payload {
            MutationPayload::SexLimited { female } => female,
            _ => {
                return Err(SerializeError::Malformed(
                    "sex-limited codec applied to a different payload".into(),
                ))
            }
        };
        write_common(mutation, buf);
        scalar::write_bool(buf, female);
        Ok(())
    }

    fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError> {
        let mut mutation = read_common(reader)?;
        let female = reader.read_bool()?;
        mutation.payload = MutationPayload::SexLimited { female };
        Ok(mutation)
    }
}

/// Codec for effect-vector mutations: common fields plus a count-prefixed
/// list of (selection, dominance) tuples.
#[derive(Debug, Default)]
pub struct EffectVectorCodec;

impl MutationCodec for EffectVectorCodec {
    fn tag(&self) -> u8 {
        TAG_EFFECT_VECTOR
    }

    fn encode(&self, mutation: &Mutation, buf: &mut Vec<u8>) -> Result<(), SerializeError> {
        let effects = match &mutation.payload {
            MutationPayload::EffectVector(effects) => effects,
            _ => {
                return Err(SerializeError::Malformed(
                    "effect-vector codec applied to a different payload".into(),
                ))
            }
        };
        write_common(mutation, buf);
        scalar::write_u64(buf, effects.len() as u64);
        for &(s, h) in effects {
            scalar::write_f64(buf, s);
            scalar::write_f64(buf, h);
        }
        Ok(())
    }

    fn decode(&self, reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError> {
        let mut mutation = read_common(reader)?;
        let count = reader.read_count(16)?;
        let mut effects = Vec::with_capacity(count);
        for _ in 0..count {
            let s = reader.read_f64()?;
            let h = reader.read_f64()?;
            effects.push((s, h));
        }
        mutation.payload = MutationPayload::EffectVector(effects);
        Ok(mutation)
    }
}

/// Tag-indexed codec collection.
pub struct CodecRegistry {
    codecs: HashMap<u8, Box<dyn MutationCodec>>,
}

impl CodecRegistry {
    /// An empty registry; every encode or decode fails until codecs are
    /// registered.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// A registry with all built-in codecs.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PointMutationCodec));
        registry.register(Box::new(SexLimitedCodec));
        registry.register(Box::new(EffectVectorCodec));
        registry
    }

    /// Install a codec, replacing any previous claim on its tag.
    pub fn register(&mut self, codec: Box<dyn MutationCodec>) {
        self.codecs.insert(codec.tag(), codec);
    }

    /// Wire tag for a payload shape.
    pub fn tag_for(payload: &MutationPayload) -> u8 {
        match payload {
            MutationPayload::None => TAG_POINT,
            MutationPayload::SexLimited { .. } => TAG_SEX_LIMITED,
            MutationPayload::EffectVector(_) => TAG_EFFECT_VECTOR,
        }
    }

    /// Encode one mutation: tag byte, then the codec body.
    pub fn encode_mutation(
        &self,
        mutation: &Mutation,
        buf: &mut Vec<u8>,
    ) -> Result<(), SerializeError> {
        let tag = Self::tag_for(&mutation.payload);
        let codec = self
            .codecs
            .get(&tag)
            .ok_or(SerializeError::UnregisteredCodec(tag))?;
        scalar::write_u8(buf, tag);
        codec.encode(mutation, buf)
    }

    /// Decode one mutation: tag byte, then the codec body.
    pub fn decode_mutation(&self, reader: &mut ByteReader<'_>) -> Result<Mutation, SerializeError> {
        let tag = reader.read_u8()?;
        let codec = self
            .codecs
            .get(&tag)
            .ok_or(SerializeError::UnregisteredCodec(tag))?;
        codec.decode(reader)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
