//! Labelled, independent random streams.
//!
//! Every probabilistic decision draws from a stream named by a string label
//! (usually the aura or spell making the decision). Streams are derived by
//! hashing the simulation's master seed, the trial seed and the label, so:
//!
//! - the same master and trial seeds replay every stream bit-for-bit, and
//! - draws made under one label never shift the sequence of another label.
//!
//! The second property is what keeps an unrelated rotation change from
//! altering DoT tick damage somewhere else in the same trial.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use crate::config::RngLabelPolicy;
use crate::error::{KernelError, SimResult};

/// PCG-XSH-RR generator: 64-bit state, 32-bit output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RngStream {
    state: u64,
    draws: u64,
}

impl RngStream {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    /// 2^-53, maps a 53-bit integer onto [0, 1).
    const F64_SCALE: f64 = 1.0 / (1u64 << 53) as f64;

    pub fn from_seed(seed: u64) -> Self {
        let mut stream = Self { state: 0, draws: 0 };
        stream.step();
        stream.state = stream.state.wrapping_add(seed);
        stream.step();
        stream
    }

    #[inline]
    fn step(&mut self) {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
    }

    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }

    pub fn next_u32(&mut self) -> u32 {
        let old = self.state;
        self.step();
        Self::output(old)
    }

    /// Uniform float in `[0, 1)` built from 53 random bits.
    pub fn roll_float(&mut self) -> f64 {
        self.draws += 1;
        let hi = (self.next_u32() >> 5) as u64;
        let lo = (self.next_u32() >> 6) as u64;
        ((hi << 26) | lo) as f64 * Self::F64_SCALE
    }

    /// Uniform float in `[min, max)`. Returns `min` when the range is empty.
    pub fn roll_uniform(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        min + (max - min) * self.roll_float()
    }

    /// Number of rolls taken from this stream since it was derived.
    pub fn draws(&self) -> u64 {
        self.draws
    }
}

/// Derive a per-label stream seed from the master and trial seeds.
pub fn derive_stream_seed(master_seed: u64, trial_seed: u64, label: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_le_bytes());
    hasher.update(trial_seed.to_le_bytes());
    hasher.update(label.as_bytes());
    let digest = hasher.finalize();

    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed)
}

/// Maps labels to lazily derived [`RngStream`]s.
#[derive(Clone, Debug)]
pub struct RngRegistry {
    master_seed: u64,
    trial_seed: u64,
    policy: RngLabelPolicy,
    declared: BTreeSet<String>,
    streams: BTreeMap<String, RngStream>,
}

impl RngRegistry {
    pub fn new(master_seed: u64, policy: RngLabelPolicy) -> Self {
        Self {
            master_seed,
            trial_seed: 0,
            policy,
            declared: BTreeSet::new(),
            streams: BTreeMap::new(),
        }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    pub fn trial_seed(&self) -> u64 {
        self.trial_seed
    }

    /// Declare a label ahead of use. Required under [`RngLabelPolicy::Declared`].
    pub fn declare(&mut self, label: impl Into<String>) {
        self.declared.insert(label.into());
    }

    pub fn is_declared(&self, label: &str) -> bool {
        self.declared.contains(label)
    }

    /// Drop every derived stream and derive the next ones from `trial_seed`.
    ///
    /// The master seed and declarations survive; they describe the
    /// simulation, not trial state.
    pub fn reseed(&mut self, trial_seed: u64) {
        self.trial_seed = trial_seed;
        self.streams.clear();
    }

    /// Resolve the stream for `label`, deriving it on first access.
    pub fn stream_for(&mut self, label: &str) -> SimResult<&mut RngStream> {
        if self.policy == RngLabelPolicy::Declared && !self.declared.contains(label) {
            return Err(KernelError::UnknownRngLabel(label.to_owned()));
        }

        if !self.streams.contains_key(label) {
            let seed = derive_stream_seed(self.master_seed, self.trial_seed, label);
            self.streams
                .insert(label.to_owned(), RngStream::from_seed(seed));
        }

        self.streams
            .get_mut(label)
            .ok_or_else(|| KernelError::UnknownRngLabel(label.to_owned()))
    }

    pub fn roll_float(&mut self, label: &str) -> SimResult<f64> {
        Ok(self.stream_for(label)?.roll_float())
    }

    pub fn roll_uniform(&mut self, label: &str, min: f64, max: f64) -> SimResult<f64> {
        Ok(self.stream_for(label)?.roll_uniform(min, max))
    }

    /// Rolls taken per label in the current trial, in label order.
    pub fn draw_counts(&self) -> BTreeMap<String, u64> {
        self.streams
            .iter()
            .map(|(label, stream)| (label.clone(), stream.draws()))
            .collect()
    }
}
