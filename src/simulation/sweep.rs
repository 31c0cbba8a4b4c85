//! Post-generation retirement of lost and fixed mutations.
//!
//! This sweep is what keeps the active mutation collection bounded over
//! unbounded generations: every mutation eventually drifts to copy count
//! zero (loss) or to the fixation threshold, and either way its slot goes
//! back to the allocator.

use super::population::GenePool;

/// Scan the copy-count vector and retire finished mutations.
///
/// * count `0` — the mutation was lost: erase its position and free its slot.
/// * count `== fixation_count` — the mutation is carried by every chromosome
///   slot: record it (with the current generation) in the fixations, strip
///   its key from every live gamete, then erase and free exactly like a
///   loss.
///
/// Successful removal from the position registry is what authorizes freeing
/// a slot; an already-retired slot whose count is still zero fails that test
/// and is skipped, so repeated sweeps never double-free. Because the sweep
/// runs once per generation, fixations accumulate in non-decreasing
/// generation order.
pub fn sweep_fixed_lost(pool: &mut GenePool, fixation_count: u32, generation: u32) {
    let mut fixed: Vec<usize> = Vec::new();
    for key in 0..pool.mcounts.len() {
        let count = pool.mcounts[key];
        if count == 0 {
            if pool.lookup.remove(pool.mutations[key].pos) {
                pool.mutation_bin.release(key);
            }
        } else if count == fixation_count && pool.lookup.remove(pool.mutations[key].pos) {
            pool.fixations.push(pool.mutations[key].clone());
            pool.fixation_generations.push(generation);
            pool.mcounts[key] = 0;
            pool.mutation_bin.release(key);
            fixed.push(key);
        }
    }
    if fixed.is_empty() {
        return;
    }
    // Fixed keys were collected in ascending order.
    for gamete in pool.gametes.iter_mut().filter(|g| g.count > 0) {
        gamete.neutral.retain(|k| fixed.binary_search(k).is_err());
        gamete.selected.retain(|k| fixed.binary_search(k).is_err());
    }
}
