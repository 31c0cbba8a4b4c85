//! Canonical binary snapshots of whole populations.
//!
//! The format persists only primary data — mutations (via the codec
//! registry), gametes with their reference counts, diploid genome-index
//! pairs, fixations, and topology-specific trailers. The copy-count vector,
//! the position registry, and the recycling bins are reconstructed on every
//! decode by re-scanning the decoded gametes, so a loaded population is
//! internally consistent no matter how the bytes were produced.

use crate::genome::{Diploid, Gamete, Mutation};
use crate::simulation::{GenePool, MetaPopulation, MultiLocusPopulation, Population};

use super::codec::CodecRegistry;
use super::scalar::{self, ByteReader};
use super::SerializeError;

// Narrowest possible encodings, used to sanity-check count prefixes.
const MIN_MUTATION_BYTES: usize = 30; // tag + 3 f64 + u32 + bool
const MIN_GAMETE_BYTES: usize = 20; // count + two empty index lists
const MIN_DIPLOID_BYTES: usize = 16; // two u64 indices

fn write_mutations(
    buf: &mut Vec<u8>,
    mutations: &[Mutation],
    registry: &CodecRegistry,
) -> Result<(), SerializeError> {
    scalar::write_u64(buf, mutations.len() as u64);
    for mutation in mutations {
        registry.encode_mutation(mutation, buf)?;
    }
    Ok(())
}

fn read_mutations(
    reader: &mut ByteReader<'_>,
    registry: &CodecRegistry,
) -> Result<Vec<Mutation>, SerializeError> {
    let count = reader.read_count(MIN_MUTATION_BYTES)?;
    let mut mutations = Vec::with_capacity(count);
    for _ in 0..count {
        mutations.push(registry.decode_mutation(reader)?);
    }
    Ok(mutations)
}

fn write_index_list(buf: &mut Vec<u8>, keys: &[usize]) {
    scalar::write_u64(buf, keys.len() as u64);
    for &key in keys {
        scalar::write_u64(buf, key as u64);
    }
}

fn read_index_list(
    reader: &mut ByteReader<'_>,
    n_mutations: usize,
) -> Result<Vec<usize>, SerializeError> {
    let count = reader.read_count(8)?;
    let mut keys = Vec::with_capacity(count);
    for _ in 0..count {
        let key = reader.read_u64()? as usize;
        if key >= n_mutations {
            return Err(SerializeError::Malformed(format!(
                "mutation index {key} out of range ({n_mutations} records)"
            )));
        }
        keys.push(key);
    }
    Ok(keys)
}

fn write_gametes(buf: &mut Vec<u8>, gametes: &[Gamete]) {
    scalar::write_u64(buf, gametes.len() as u64);
    for gamete in gametes {
        scalar::write_u32(buf, gamete.count);
        write_index_list(buf, &gamete.neutral);
        write_index_list(buf, &gamete.selected);
    }
}

fn read_gametes(
    reader: &mut ByteReader<'_>,
    n_mutations: usize,
) -> Result<Vec<Gamete>, SerializeError> {
    let count = reader.read_count(MIN_GAMETE_BYTES)?;
    let mut gametes = Vec::with_capacity(count);
    for _ in 0..count {
        let refs = reader.read_u32()?;
        let neutral = read_index_list(reader, n_mutations)?;
        let selected = read_index_list(reader, n_mutations)?;
        gametes.push(Gamete::new(refs, neutral, selected));
    }
    Ok(gametes)
}

fn write_diploids(buf: &mut Vec<u8>, diploids: &[Diploid]) {
    scalar::write_u64(buf, diploids.len() as u64);
    for diploid in diploids {
        scalar::write_u64(buf, diploid.first as u64);
        scalar::write_u64(buf, diploid.second as u64);
    }
}

fn read_diploids(
    reader: &mut ByteReader<'_>,
    n_gametes: usize,
) -> Result<Vec<Diploid>, SerializeError> {
    let count = reader.read_count(MIN_DIPLOID_BYTES)?;
    let mut diploids = Vec::with_capacity(count);
    for _ in 0..count {
        diploids.push(read_diploid(reader, n_gametes)?);
    }
    Ok(diploids)
}

fn read_diploid(
    reader: &mut ByteReader<'_>,
    n_gametes: usize,
) -> Result<Diploid, SerializeError> {
    let first = reader.read_u64()? as usize;
    let second = reader.read_u64()? as usize;
    if first >= n_gametes || second >= n_gametes {
        return Err(SerializeError::Malformed(format!(
            "gamete index pair ({first}, {second}) out of range ({n_gametes} records)"
        )));
    }
    Ok(Diploid::new(first, second))
}

fn write_fixations(
    buf: &mut Vec<u8>,
    pool: &GenePool,
    registry: &CodecRegistry,
) -> Result<(), SerializeError> {
    write_mutations(buf, &pool.fixations, registry)?;
    for &generation in &pool.fixation_generations {
        scalar::write_u32(buf, generation);
    }
    Ok(())
}

fn read_fixations(
    reader: &mut ByteReader<'_>,
    pool: &mut GenePool,
    registry: &CodecRegistry,
) -> Result<(), SerializeError> {
    pool.fixations = read_mutations(reader, registry)?;
    pool.fixation_generations = Vec::with_capacity(pool.fixations.len());
    for _ in 0..pool.fixations.len() {
        pool.fixation_generations.push(reader.read_u32()?);
    }
    Ok(())
}

/// Encode a single-deme population.
///
/// Layout: census, generation, mutations, gametes, diploids, fixations,
/// fixation generations.
pub fn serialize_population(
    pop: &Population,
    registry: &CodecRegistry,
) -> Result<Vec<u8>, SerializeError> {
    let mut buf = Vec::new();
    scalar::write_u32(&mut buf, pop.n);
    scalar::write_u32(&mut buf, pop.generation);
    write_mutations(&mut buf, &pop.pool.mutations, registry)?;
    write_gametes(&mut buf, &pop.pool.gametes);
    write_diploids(&mut buf, &pop.diploids);
    write_fixations(&mut buf, &pop.pool, registry)?;
    Ok(buf)
}

/// Decode a single-deme population, rebuilding all derived structures.
pub fn deserialize_population(
    bytes: &[u8],
    registry: &CodecRegistry,
) -> Result<Population, SerializeError> {
    let mut reader = ByteReader::new(bytes);
    let n = reader.read_u32()?;
    let generation = reader.read_u32()?;
    let mut pool = GenePool::default();
    pool.mutations = read_mutations(&mut reader, registry)?;
    pool.gametes = read_gametes(&mut reader, pool.mutations.len())?;
    let diploids = read_diploids(&mut reader, pool.gametes.len())?;
    read_fixations(&mut reader, &mut pool, registry)?;
    pool.rebuild_derived();
    Ok(Population {
        pool,
        diploids,
        n,
        generation,
    })
}

/// Encode a multi-locus population.
///
/// Layout: census, locus count, generation, mutations, gametes, diploid
/// count then per-diploid per-locus genotype pairs, fixations, fixation
/// generations, and the locus-boundary trailer.
pub fn serialize_multilocus(
    pop: &MultiLocusPopulation,
    registry: &CodecRegistry,
) -> Result<Vec<u8>, SerializeError> {
    let mut buf = Vec::new();
    scalar::write_u32(&mut buf, pop.n);
    scalar::write_u32(&mut buf, pop.nloci);
    scalar::write_u32(&mut buf, pop.generation);
    write_mutations(&mut buf, &pop.pool.mutations, registry)?;
    write_gametes(&mut buf, &pop.pool.gametes);
    scalar::write_u64(&mut buf, pop.diploids.len() as u64);
    for diploid in &pop.diploids {
        for genotype in diploid {
            scalar::write_u64(&mut buf, genotype.first as u64);
            scalar::write_u64(&mut buf, genotype.second as u64);
        }
    }
    write_fixations(&mut buf, &pop.pool, registry)?;
    scalar::write_u64(&mut buf, pop.locus_boundaries.len() as u64);
    for &(start, end) in &pop.locus_boundaries {
        scalar::write_f64(&mut buf, start);
        scalar::write_f64(&mut buf, end);
    }
    Ok(buf)
}

/// Decode a multi-locus population.
pub fn deserialize_multilocus(
    bytes: &[u8],
    registry: &CodecRegistry,
) -> Result<MultiLocusPopulation, SerializeError> {
    let mut reader = ByteReader::new(bytes);
    let n = reader.read_u32()?;
    let nloci = reader.read_u32()?;
    let generation = reader.read_u32()?;
    let mut pool = GenePool::default();
    pool.mutations = read_mutations(&mut reader, registry)?;
    pool.gametes = read_gametes(&mut reader, pool.mutations.len())?;
    let n_diploids = reader.read_count((MIN_DIPLOID_BYTES * nloci as usize).max(1))?;
    let mut diploids = Vec::with_capacity(n_diploids);
    for _ in 0..n_diploids {
        let mut loci = Vec::with_capacity(nloci as usize);
        for _ in 0..nloci {
            loci.push(read_diploid(&mut reader, pool.gametes.len())?);
        }
        diploids.push(loci);
    }
    read_fixations(&mut reader, &mut pool, registry)?;
    let n_boundaries = reader.read_count(16)?;
    let mut locus_boundaries = Vec::with_capacity(n_boundaries);
    for _ in 0..n_boundaries {
        let start = reader.read_f64()?;
        let end = reader.read_f64()?;
        locus_boundaries.push((start, end));
    }
    pool.rebuild_derived();
    Ok(MultiLocusPopulation {
        pool,
        diploids,
        locus_boundaries,
        n,
        nloci,
        generation,
    })
}

/// Encode a metapopulation.
///
/// Layout: deme count, per-deme census sizes, generation, mutations,
/// gametes, per-deme count-prefixed diploids, fixations, fixation
/// generations.
pub fn serialize_metapopulation(
    pop: &MetaPopulation,
    registry: &CodecRegistry,
) -> Result<Vec<u8>, SerializeError> {
    let mut buf = Vec::new();
    scalar::write_u64(&mut buf, pop.deme_sizes.len() as u64);
    for &size in &pop.deme_sizes {
        scalar::write_u32(&mut buf, size);
    }
    scalar::write_u32(&mut buf, pop.generation);
    write_mutations(&mut buf, &pop.pool.mutations, registry)?;
    write_gametes(&mut buf, &pop.pool.gametes);
    for deme in &pop.demes {
        write_diploids(&mut buf, deme);
    }
    write_fixations(&mut buf, &pop.pool, registry)?;
    Ok(buf)
}

/// Decode a metapopulation.
pub fn deserialize_metapopulation(
    bytes: &[u8],
    registry: &CodecRegistry,
) -> Result<MetaPopulation, SerializeError> {
    let mut reader = ByteReader::new(bytes);
    let n_demes = reader.read_count(4)?;
    let mut deme_sizes = Vec::with_capacity(n_demes);
    for _ in 0..n_demes {
        deme_sizes.push(reader.read_u32()?);
    }
    let generation = reader.read_u32()?;
    let mut pool = GenePool::default();
    pool.mutations = read_mutations(&mut reader, registry)?;
    pool.gametes = read_gametes(&mut reader, pool.mutations.len())?;
    let mut demes = Vec::with_capacity(n_demes);
    for _ in 0..n_demes {
        demes.push(read_diploids(&mut reader, pool.gametes.len())?);
    }
    read_fixations(&mut reader, &mut pool, registry)?;
    pool.rebuild_derived();
    Ok(MetaPopulation {
        pool,
        demes,
        deme_sizes,
        generation,
    })
}
