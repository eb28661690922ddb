//! Seed derivation and per-request generation contexts.
//!
//! Child seeds are a pure function of (master seed, component label), so a
//! bootstrap replayed with the same world seed hands every generator the
//! same RNG stream regardless of process or machine.

use std::collections::HashMap;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, Result};
use crate::pcg::{ContentType, GenerationParams};

/// Derives and memoizes per-component child seeds from a master seed.
pub struct SeedManager {
    master_seed: i64,
    derived: Mutex<HashMap<String, i64>>,
}

impl SeedManager {
    pub fn new(master_seed: i64) -> Self {
        Self {
            master_seed,
            derived: Mutex::new(HashMap::new()),
        }
    }

    pub fn master_seed(&self) -> i64 {
        self.master_seed
    }

    /// Child seed for a component label. Idempotent per (master, label).
    pub fn child_seed(&self, label: &str) -> i64 {
        let mut derived = self.derived.lock();
        if let Some(seed) = derived.get(label) {
            return *seed;
        }
        let seed = Self::derive(self.master_seed, label);
        derived.insert(label.to_string(), seed);
        seed
    }

    /// Pure derivation: mix the label hash into the master seed.
    ///
    /// A zero result is nudged to keep the non-zero seed contract intact.
    pub fn derive(master: i64, label: &str) -> i64 {
        let mixed = splitmix64((master as u64) ^ fnv1a(label.as_bytes()));
        let seed = mixed as i64;
        if seed == 0 {
            1
        } else {
            seed
        }
    }

    pub fn derived_count(&self) -> usize {
        self.derived.lock().len()
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Everything a generator needs for one request: an exclusively owned RNG,
/// the request parameters, and a cancellation handle to honor at loop
/// boundaries.
pub struct GenerationContext {
    rng: StdRng,
    content_type: ContentType,
    component: String,
    params: GenerationParams,
    cancel: CancellationToken,
}

impl GenerationContext {
    pub fn new(
        content_type: ContentType,
        component: impl Into<String>,
        child_seed: i64,
        params: GenerationParams,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rng: StdRng::seed_from_u64(child_seed as u64),
            content_type,
            component: component.into(),
            params,
            cancel,
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cooperative cancellation check; call between independent RNG draws.
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled(format!(
                "generation of {} cancelled",
                self.component
            )));
        }
        Ok(())
    }

    /// Deterministic id: a UUID built from the request RNG, never the
    /// global one.
    pub fn next_id(&mut self, prefix: &str) -> String {
        let mut bytes = [0u8; 16];
        self.rng.fill_bytes(&mut bytes);
        let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
        format!("{prefix}_{uuid}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn child_seed_is_idempotent_per_label() {
        let seeds = SeedManager::new(12345);
        let a1 = seeds.child_seed("pcg.items");
        let a2 = seeds.child_seed("pcg.items");
        assert_eq!(a1, a2);
        assert_eq!(seeds.derived_count(), 1);
    }

    #[test]
    fn derivation_is_pure_and_label_sensitive() {
        let a = SeedManager::derive(12345, "pcg.items");
        let b = SeedManager::derive(12345, "pcg.items");
        let c = SeedManager::derive(12345, "pcg.quests");
        let d = SeedManager::derive(54321, "pcg.items");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_ne!(a, 0);
    }

    #[test]
    fn distinct_labels_yield_uncorrelated_streams() {
        let a = SeedManager::derive(99, "component.a");
        let b = SeedManager::derive(99, "component.b");
        let mut rng_a = StdRng::seed_from_u64(a as u64);
        let mut rng_b = StdRng::seed_from_u64(b as u64);

        let mut matches = 0;
        for _ in 0..256 {
            if rng_a.random_range(0..100u32) == rng_b.random_range(0..100u32) {
                matches += 1;
            }
        }
        // ~1% expected by chance; anything near lockstep means correlation
        assert!(matches < 32, "streams correlated: {matches}/256 matches");
    }

    #[test]
    fn context_ids_are_deterministic_per_seed() {
        let params = GenerationParams::new(7);
        let mut ctx1 = GenerationContext::new(
            ContentType::Items,
            "pcg.items",
            42,
            params.clone(),
            CancellationToken::new(),
        );
        let mut ctx2 = GenerationContext::new(
            ContentType::Items,
            "pcg.items",
            42,
            params,
            CancellationToken::new(),
        );
        assert_eq!(ctx1.next_id("item"), ctx2.next_id("item"));
        assert_eq!(ctx1.next_id("item"), ctx2.next_id("item"));
    }

    #[test]
    fn cancelled_context_reports_cancellation() {
        let token = CancellationToken::new();
        let ctx = GenerationContext::new(
            ContentType::Quests,
            "pcg.quests",
            42,
            GenerationParams::new(7),
            token.clone(),
        );
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(
            ctx.check_cancelled(),
            Err(EngineError::Cancelled(_))
        ));
    }
}
