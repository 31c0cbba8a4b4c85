//! Mutation models: policies that mint new mutation records.
//!
//! A model is invoked once per actually-occurring mutation event; the event
//! count itself is drawn upstream by the generational driver (Poisson with
//! the configured total rate). Models draw a candidate position, redraw while
//! it collides with a live position (the infinite-sites resampling loop — a
//! collision is expected behavior, not an error), register the position, and
//! deposit a fully formed, generation-stamped record into a recycled or fresh
//! slot.

use crate::base::{DiscreteSampler, RecyclingBin, SimRng};
use crate::errors::ConfigError;
use crate::genome::{Mutation, MutationPayload, PositionLookup};

/// Mutable view over the population state a mutation model may touch.
///
/// Borrowing these three pieces together keeps the driver's other borrows
/// (gametes, diploids) disjoint while a model runs.
pub struct MutationStore<'a> {
    pub mutations: &'a mut Vec<Mutation>,
    pub lookup: &'a mut PositionLookup,
    pub bin: &'a mut RecyclingBin,
}

impl MutationStore<'_> {
    /// Deposit a record, preferring a recycled slot, and return its key.
    pub fn deposit(&mut self, mutation: Mutation) -> usize {
        match self.bin.acquire() {
            Some(key) => {
                self.mutations[key] = mutation;
                key
            }
            None => {
                self.mutations.push(mutation);
                self.mutations.len() - 1
            }
        }
    }

    /// Draw a position with `posmaker`, redrawing until it is unique, then
    /// register it.
    pub fn unique_position(
        &mut self,
        rng: &mut SimRng,
        mut posmaker: impl FnMut(&mut SimRng) -> f64,
    ) -> f64 {
        let mut pos = posmaker(rng);
        while self.lookup.contains(pos) {
            pos = posmaker(rng);
        }
        self.lookup.insert(pos);
        pos
    }
}

/// A policy that creates one new mutation per call.
pub trait MutationModel {
    /// Mint a mutation stamped with `generation` and return its slot key.
    fn make_mutation(&self, rng: &mut SimRng, store: &mut MutationStore<'_>, generation: u32)
        -> usize;
}

/// Generator callable for positions, effect sizes, and dominance values.
pub type DeviateFn = Box<dyn Fn(&mut SimRng) -> f64>;

/// The classic infinite-sites model.
///
/// One categorical draw weighted by the selected/total rate ratio decides
/// whether the mutation is selected; selected mutations get an effect size
/// and dominance from the supplied generators, neutral ones get zeros.
pub struct InfSitesMutationModel {
    neutral_rate: f64,
    selected_rate: f64,
    position: DeviateFn,
    effect: DeviateFn,
    dominance: DeviateFn,
}

impl InfSitesMutationModel {
    /// # Errors
    /// Rejects negative or non-finite rates.
    pub fn new(
        neutral_rate: f64,
        selected_rate: f64,
        position: DeviateFn,
        effect: DeviateFn,
        dominance: DeviateFn,
    ) -> Result<Self, ConfigError> {
        if !(neutral_rate >= 0.0) || !neutral_rate.is_finite() {
            return Err(ConfigError::InvalidRate("neutral_rate", neutral_rate));
        }
        if !(selected_rate >= 0.0) || !selected_rate.is_finite() {
            return Err(ConfigError::InvalidRate("selected_rate", selected_rate));
        }
        Ok(Self {
            neutral_rate,
            selected_rate,
            position,
            effect,
            dominance,
        })
    }

    /// Total mutation rate, the Poisson mean the driver should use.
    pub fn total_rate(&self) -> f64 {
        self.neutral_rate + self.selected_rate
    }

    /// Purely neutral variant with uniform positions on `[0, 1)`.
    pub fn neutral(rate: f64) -> Result<Self, ConfigError> {
        Self::new(
            rate,
            0.0,
            Box::new(|rng| rng.uniform()),
            Box::new(|_| 0.0),
            Box::new(|_| 0.0),
        )
    }
}

impl MutationModel for InfSitesMutationModel {
    fn make_mutation(
        &self,
        rng: &mut SimRng,
        store: &mut MutationStore<'_>,
        generation: u32,
    ) -> usize {
        let pos = store.unique_position(rng, &self.position);
        let total = self.neutral_rate + self.selected_rate;
        let mutation = if total > 0.0 && rng.uniform() <= self.selected_rate / total {
            Mutation::selected(pos, (self.effect)(rng), (self.dominance)(rng), generation)
        } else {
            Mutation::neutral_at(pos, generation)
        };
        store.deposit(mutation)
    }
}

/// Sex-limited trait mutations: effects expressed in one sex only.
///
/// Three-way categorical split between male-limited, female-limited, and
/// neutral mutations; effect sizes are Gaussian with the configured scale.
/// Neutral mutations are tagged male-limited, which is harmless because they
/// never enter a fitness computation.
pub struct SexLimitedMutationModel {
    mu_neutral: f64,
    mu_male: f64,
    mu_female: f64,
    sigma: f64,
}

impl SexLimitedMutationModel {
    /// # Errors
    /// Rejects negative rates and a non-positive effect scale.
    pub fn new(
        mu_neutral: f64,
        mu_male: f64,
        mu_female: f64,
        sigma: f64,
    ) -> Result<Self, ConfigError> {
        for (name, rate) in [
            ("mu_neutral", mu_neutral),
            ("mu_male", mu_male),
            ("mu_female", mu_female),
        ] {
            if !(rate >= 0.0) || !rate.is_finite() {
                return Err(ConfigError::InvalidRate(name, rate));
            }
        }
        if !(sigma > 0.0) {
            return Err(ConfigError::InvalidRate("sigma", sigma));
        }
        Ok(Self {
            mu_neutral,
            mu_male,
            mu_female,
            sigma,
        })
    }

    pub fn total_rate(&self) -> f64 {
        self.mu_neutral + self.mu_male + self.mu_female
    }
}

impl MutationModel for SexLimitedMutationModel {
    fn make_mutation(
        &self,
        rng: &mut SimRng,
        store: &mut MutationStore<'_>,
        generation: u32,
    ) -> usize {
        let pos = store.unique_position(rng, |rng| rng.uniform());
        let total = self.total_rate();
        let u = rng.uniform();
        let mutation = if total > 0.0 && u <= self.mu_male / total {
            Mutation::selected(pos, rng.gaussian(self.sigma), 1.0, generation)
                .with_payload(MutationPayload::SexLimited { female: false })
        } else if total > 0.0 && u <= (self.mu_male + self.mu_female) / total {
            Mutation::selected(pos, rng.gaussian(self.sigma), 1.0, generation)
                .with_payload(MutationPayload::SexLimited { female: true })
        } else {
            Mutation::neutral_at(pos, generation)
                .with_payload(MutationPayload::SexLimited { female: false })
        };
        store.deposit(mutation)
    }
}

/// A half-open genomic interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: f64,
    pub end: f64,
}

impl Region {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Region-structured mutation model.
///
/// Neutral and selected mutations each land in one of a set of weighted
/// half-open intervals; every selected region supplies its own effect-size
/// and dominance generators. All arity requirements are checked here, at
/// construction, so a misconfigured replicate fails before its first
/// generation.
pub struct DiscreteMutationModel {
    neutral_rate: f64,
    selected_rate: f64,
    neutral_regions: Vec<Region>,
    neutral_sampler: Option<DiscreteSampler>,
    selected_regions: Vec<Region>,
    selected_sampler: Option<DiscreteSampler>,
    effect_models: Vec<DeviateFn>,
    dominance_models: Vec<DeviateFn>,
}

impl DiscreteMutationModel {
    /// # Errors
    /// Any interval/weight/generator arity mismatch, a selected region
    /// without effect and dominance models, or an invalid weight vector.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        neutral_rate: f64,
        selected_rate: f64,
        neutral_regions: Vec<Region>,
        neutral_weights: Vec<f64>,
        selected_regions: Vec<Region>,
        selected_weights: Vec<f64>,
        effect_models: Vec<DeviateFn>,
        dominance_models: Vec<DeviateFn>,
    ) -> Result<Self, ConfigError> {
        if neutral_regions.len() != neutral_weights.len() {
            return Err(ConfigError::ArityMismatch {
                what: "neutral region weights",
                expected: neutral_regions.len(),
                found: neutral_weights.len(),
            });
        }
        if selected_regions.len() != selected_weights.len() {
            return Err(ConfigError::ArityMismatch {
                what: "selected region weights",
                expected: selected_regions.len(),
                found: selected_weights.len(),
            });
        }
        if !selected_regions.is_empty() && (effect_models.is_empty() || dominance_models.is_empty())
        {
            return Err(ConfigError::MissingEffectModel {
                region: effect_models.len().min(dominance_models.len()),
            });
        }
        if effect_models.len() != selected_regions.len() {
            return Err(ConfigError::ArityMismatch {
                what: "selected region effect models",
                expected: selected_regions.len(),
                found: effect_models.len(),
            });
        }
        if dominance_models.len() != selected_regions.len() {
            return Err(ConfigError::ArityMismatch {
                what: "selected region dominance models",
                expected: selected_regions.len(),
                found: dominance_models.len(),
            });
        }
        for region in neutral_regions.iter().chain(selected_regions.iter()) {
            if !(region.end > region.start) {
                return Err(ConfigError::InvalidRate(
                    "region length",
                    region.end - region.start,
                ));
            }
        }
        let neutral_sampler = if neutral_regions.is_empty() {
            None
        } else {
            Some(DiscreteSampler::new(&neutral_weights)?)
        };
        let selected_sampler = if selected_regions.is_empty() {
            None
        } else {
            Some(DiscreteSampler::new(&selected_weights)?)
        };
        Ok(Self {
            neutral_rate,
            selected_rate,
            neutral_regions,
            neutral_sampler,
            selected_regions,
            selected_sampler,
            effect_models,
            dominance_models,
        })
    }

    pub fn total_rate(&self) -> f64 {
        self.neutral_rate + self.selected_rate
    }

    /// Pick a region, then a position inside it; redraw both on collision.
    fn unique_region_position(
        rng: &mut SimRng,
        store: &mut MutationStore<'_>,
        regions: &[Region],
        sampler: &DiscreteSampler,
    ) -> (usize, f64) {
        loop {
            let r = sampler.sample(rng);
            let region = regions[r];
            let pos = rng.uniform_in(region.start, region.end);
            if !store.lookup.contains(pos) {
                store.lookup.insert(pos);
                return (r, pos);
            }
        }
    }
}

impl MutationModel for DiscreteMutationModel {
    fn make_mutation(
        &self,
        rng: &mut SimRng,
        store: &mut MutationStore<'_>,
        generation: u32,
    ) -> usize {
        let total = self.neutral_rate + self.selected_rate;
        let selected = total > 0.0
            && rng.uniform() <= self.selected_rate / total
            && self.selected_sampler.is_some();
        let mutation = if selected {
            let sampler = self.selected_sampler.as_ref().unwrap(); // checked above
            let (r, pos) =
                Self::unique_region_position(rng, store, &self.selected_regions, sampler);
            Mutation::selected(
                pos,
                (self.effect_models[r])(rng),
                (self.dominance_models[r])(rng),
                generation,
            )
        } else {
            // Fall back to the unit interval when no neutral regions are declared.
            match &self.neutral_sampler {
                Some(sampler) => {
                    let (_, pos) =
                        Self::unique_region_position(rng, store, &self.neutral_regions, sampler);
                    Mutation::neutral_at(pos, generation)
                }
                None => {
                    let pos = store.unique_position(rng, |rng| rng.uniform());
                    Mutation::neutral_at(pos, generation)
                }
            }
        };
        store.deposit(mutation)
    }
}
