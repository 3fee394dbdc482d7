//! Error infrastructure for the kernel.
//!
//! Every surfaced error is a programmer error in content code or a misuse of
//! the kernel's phases. Numeric edge cases (stack clamping, negative stats)
//! and scheduling races (events for cancelled actions) are recovered locally
//! and never reach this type.
//!
//! # Design Principles
//!
//! - **Fail fast**: configuration mistakes are reported at registration or
//!   activation time, before they can corrupt derived stats
//! - **Rich context**: variants carry the unit, label or handle involved
//! - **Severity classification**: callers decide whether a run can continue

use crate::aura::AuraId;
use crate::stats::{DependencyId, Stat};
use crate::time::SimTime;
use crate::unit::UnitId;

/// Result alias used across the kernel and by lifecycle hooks.
pub type SimResult<T> = Result<T, KernelError>;

/// Severity level of an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Invalid content configuration; the run must be rebuilt.
    ///
    /// Examples: duplicate aura label, dependency cycle, zero multiplier
    Validation,

    /// Kernel used out of order.
    ///
    /// Examples: running a trial before finalize, scheduling into the past
    Internal,

    /// A handle does not resolve; state is inconsistent and cannot continue.
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }
}

/// Common trait for kernel errors.
pub trait SimError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Static identifier for this error variant (metrics, tests).
    fn error_code(&self) -> &'static str;
}

/// Errors surfaced by the aura and effect kernel.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum KernelError {
    #[error("unit {unit} already has an aura labelled '{label}'")]
    DuplicateAuraLabel { unit: UnitId, label: String },

    #[error("aura labels must not be empty (unit {unit})")]
    EmptyAuraLabel { unit: UnitId },

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),

    #[error("unknown aura {0}")]
    UnknownAura(AuraId),

    #[error("unknown stat dependency {dependency} on unit {unit}")]
    UnknownDependency { unit: UnitId, dependency: DependencyId },

    #[error("unknown {kind} handle {index}")]
    UnknownHandle { kind: &'static str, index: u32 },

    #[error("stat dependency {dependency} on unit {unit} is already enabled")]
    DependencyAlreadyEnabled { unit: UnitId, dependency: DependencyId },

    #[error("stat dependency {dependency} on unit {unit} is not enabled")]
    DependencyNotEnabled { unit: UnitId, dependency: DependencyId },

    #[error("stat dependency on unit {unit} would create a cycle through {stat}")]
    DependencyCycle { unit: UnitId, stat: Stat },

    #[error("multiplier {factor} on {stat} cannot be reversed")]
    NonInvertibleMultiplier { stat: Stat, factor: f64 },

    #[error("RNG label '{0}' was not declared during the build phase")]
    UnknownRngLabel(String),

    #[error("cannot schedule an event at {at}, current time is {now}")]
    ScheduledInPast { at: SimTime, now: SimTime },

    #[error("periodic action period must be greater than zero")]
    ZeroPeriod,

    #[error("fixed uptime must be within (0, 1], got {0}")]
    InvalidUptime(f64),

    #[error("{0} seconds is not a representable simulation time")]
    InvalidTime(f64),

    #[error("operation requires the build phase but the simulation is finalized")]
    AlreadyFinalized,

    #[error("operation requires a finalized simulation")]
    NotFinalized,
}

impl SimError for KernelError {
    fn severity(&self) -> ErrorSeverity {
        use KernelError::*;
        match self {
            DuplicateAuraLabel { .. }
            | EmptyAuraLabel { .. }
            | DependencyAlreadyEnabled { .. }
            | DependencyNotEnabled { .. }
            | DependencyCycle { .. }
            | NonInvertibleMultiplier { .. }
            | UnknownRngLabel(_)
            | ZeroPeriod
            | InvalidUptime(_)
            | InvalidTime(_) => ErrorSeverity::Validation,

            ScheduledInPast { .. } | AlreadyFinalized | NotFinalized => ErrorSeverity::Internal,

            UnknownUnit(_) | UnknownAura(_) | UnknownDependency { .. } | UnknownHandle { .. } => {
                ErrorSeverity::Fatal
            }
        }
    }

    fn error_code(&self) -> &'static str {
        use KernelError::*;
        match self {
            DuplicateAuraLabel { .. } => "DUPLICATE_AURA_LABEL",
            EmptyAuraLabel { .. } => "EMPTY_AURA_LABEL",
            UnknownUnit(_) => "UNKNOWN_UNIT",
            UnknownAura(_) => "UNKNOWN_AURA",
            UnknownDependency { .. } => "UNKNOWN_DEPENDENCY",
            UnknownHandle { .. } => "UNKNOWN_HANDLE",
            DependencyAlreadyEnabled { .. } => "DEPENDENCY_ALREADY_ENABLED",
            DependencyNotEnabled { .. } => "DEPENDENCY_NOT_ENABLED",
            DependencyCycle { .. } => "DEPENDENCY_CYCLE",
            NonInvertibleMultiplier { .. } => "NON_INVERTIBLE_MULTIPLIER",
            UnknownRngLabel(_) => "UNKNOWN_RNG_LABEL",
            ScheduledInPast { .. } => "SCHEDULED_IN_PAST",
            ZeroPeriod => "ZERO_PERIOD",
            InvalidUptime(_) => "INVALID_UPTIME",
            InvalidTime(_) => "INVALID_TIME",
            AlreadyFinalized => "ALREADY_FINALIZED",
            NotFinalized => "NOT_FINALIZED",
        }
    }
}
