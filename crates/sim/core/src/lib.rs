//! Aura and effect kernel for continuous-time combat simulation.
//!
//! `sim-core` owns the timeline of a simulated fight: a priority-ordered event
//! clock, labelled RNG streams, cooldown timers, a reversible stat dependency
//! graph, aura lifecycles with exclusive categories, periodic actions with
//! snapshotting damage-over-time effects, and an outcome resolver that turns
//! spell hits into procs. All state lives in [`Simulation`]; content code
//! registers auras and hooks against it during the build phase and the kernel
//! drives them trial after trial.
//!
//! The kernel is single-threaded and deterministic: the same master seed and
//! the same content produce bit-identical trials.

pub mod aura;
pub mod clock;
pub mod config;
pub mod dot;
pub mod error;
pub mod outcome;
pub mod periodic;
pub mod rng;
pub mod sim;
pub mod stats;
pub mod time;
pub mod timer;
pub mod unit;

pub use aura::{
    Aura, AuraArray, AuraCallbacks, AuraConfig, AuraHooks, AuraId, AuraMetrics, ExclusiveCallback,
    ExclusiveCategory, ExclusiveCategoryId, ExclusiveEffect, ExclusiveEffectId, NoHooks,
};
pub use clock::{EventHandle, EventPriority};
pub use config::{RngLabelPolicy, SimConfig};
pub use dot::{Dot, DotConfig, DotId, SnapshotReason};
pub use error::{ErrorSeverity, KernelError, SimError, SimResult};
pub use outcome::{HitOutcome, ProcConfig, ProcEffect, ProcMask, ProcSide, SpellHit};
pub use periodic::{PeriodicConfig, PeriodicId, PeriodicStatus};
pub use rng::{RngRegistry, RngStream};
pub use sim::{AuraSummary, Simulation, TrialSummary, UnitSummary};
pub use stats::{
    DependencyId, DependencyOp, PseudoStats, SchoolMultipliers, SpellSchool, Stat, StatDependency,
    StatGraph, Stats,
};
pub use time::{AuraDuration, SimTime};
pub use timer::{Cooldown, Timer, TimerId};
pub use unit::{Unit, UnitId, UnitMetrics};
