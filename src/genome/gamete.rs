//! Haploid genomes ("gametes") as ordered sets of mutation references.

use serde::{Deserialize, Serialize};

use super::Mutation;

/// One haploid complement of mutation references.
///
/// Mutation keys are split into neutral and selected lists so fitness
/// computation only ever walks the selected subset. Both lists are kept
/// sorted by genomic position, which the recombination walk and the fitness
/// policies rely on. `count` is the number of diploid chromosome slots
/// currently pointing at this gamete; a gamete at count zero is recyclable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Gamete {
    /// Number of chromosome slots referencing this gamete.
    pub count: u32,
    /// Keys of neutral mutations, sorted by position.
    pub neutral: Vec<usize>,
    /// Keys of selected mutations, sorted by position.
    pub selected: Vec<usize>,
}

impl Gamete {
    /// A mutation-free gamete referenced by `count` chromosome slots.
    pub fn blank(count: u32) -> Self {
        Self {
            count,
            neutral: Vec::new(),
            selected: Vec::new(),
        }
    }

    pub fn new(count: u32, neutral: Vec<usize>, selected: Vec<usize>) -> Self {
        Self {
            count,
            neutral,
            selected,
        }
    }

    /// Total number of mutations carried.
    pub fn mutation_count(&self) -> usize {
        self.neutral.len() + self.selected.len()
    }

    /// Insert a mutation key, keeping the affected list sorted by position.
    ///
    /// The mutation record decides which list receives the key.
    pub fn add_mutation(&mut self, key: usize, mutations: &[Mutation]) {
        let pos = mutations[key].pos;
        let list = if mutations[key].neutral {
            &mut self.neutral
        } else {
            &mut self.selected
        };
        let at = list.partition_point(|&k| mutations[k].pos < pos);
        list.insert(at, key);
    }
}

/// Recompute the per-mutation copy-count vector from the live gametes.
///
/// `mcounts[i]` ends up equal to the number of chromosome-slot occurrences of
/// mutation `i` across all diploids, because each live gamete contributes its
/// own reference count for every mutation it carries. This is also how
/// deserialization reconstructs the vector, so a decoded population and a
/// natively built one agree by construction.
pub fn update_mutation_counts(gametes: &[Gamete], n_mutations: usize, mcounts: &mut Vec<u32>) {
    mcounts.clear();
    mcounts.resize(n_mutations, 0);
    for gamete in gametes.iter().filter(|g| g.count > 0) {
        for &key in gamete.neutral.iter().chain(gamete.selected.iter()) {
            mcounts[key] += gamete.count;
        }
    }
}
