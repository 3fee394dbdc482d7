//! Stat system.
//!
//! ```text
//! [ base Stats ] ──▶ [ enabled StatDependency edges ] ──▶ [ derived Stats ]
//!                                                              +
//!                                                        [ PseudoStats ]
//! ```
//!
//! Content never writes the derived vector. It changes the base vector or
//! toggles dependencies through [`crate::Simulation`], which keeps every
//! change reversible and notifies stat listeners.

pub mod dependency;
pub mod pseudo;
pub mod stat;

pub use dependency::{DependencyId, DependencyOp, GraphSnapshot, StatDependency, StatGraph};
pub use pseudo::{PseudoStats, SchoolMultipliers, SpellSchool};
pub use stat::{Stat, Stats};
