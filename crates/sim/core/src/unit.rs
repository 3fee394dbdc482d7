//! Simulated combatants.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::aura::AuraId;
use crate::error::SimResult;
use crate::sim::Simulation;
use crate::stats::{GraphSnapshot, PseudoStats, StatGraph, Stats};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

/// Called after a dynamic stat change with the derived-stat delta.
pub type StatListener = Rc<dyn Fn(&mut Simulation, UnitId, &Stats) -> SimResult<()>>;

/// Damage and mana bookkeeping for the current trial.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitMetrics {
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub hits_dealt: u64,
    /// Mana restored to this unit by external sources.
    pub mana_restored: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct UnitSnapshot {
    pub stats: GraphSnapshot,
    pub pseudo: PseudoStats,
}

pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) label: String,
    pub(crate) stats: StatGraph,
    pub(crate) pseudo: PseudoStats,
    pub(crate) auras: Vec<AuraId>,
    pub(crate) aura_labels: BTreeMap<String, AuraId>,
    pub(crate) listeners: Vec<StatListener>,
    pub(crate) metrics: UnitMetrics,
    pub(crate) initial: Option<UnitSnapshot>,
}

impl Unit {
    pub(crate) fn new(id: UnitId, label: String, base: Stats) -> Self {
        Self {
            id,
            label,
            stats: StatGraph::new(id, base),
            pseudo: PseudoStats::new(),
            auras: Vec::new(),
            aura_labels: BTreeMap::new(),
            listeners: Vec::new(),
            metrics: UnitMetrics::default(),
            initial: None,
        }
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Derived stat vector.
    pub fn stats(&self) -> &Stats {
        self.stats.derived()
    }

    /// Stat vector before dependencies.
    pub fn base_stats(&self) -> &Stats {
        self.stats.base()
    }

    pub fn stat_graph(&self) -> &StatGraph {
        &self.stats
    }

    pub fn pseudo_stats(&self) -> &PseudoStats {
        &self.pseudo
    }

    /// Auras in registration order.
    pub fn auras(&self) -> &[AuraId] {
        &self.auras
    }

    pub fn aura_by_label(&self, label: &str) -> Option<AuraId> {
        self.aura_labels.get(label).copied()
    }

    pub fn metrics(&self) -> &UnitMetrics {
        &self.metrics
    }

    pub(crate) fn capture_initial(&mut self) {
        self.initial = Some(UnitSnapshot {
            stats: self.stats.snapshot(),
            pseudo: self.pseudo.clone(),
        });
    }

    /// Return to the finalize-time state without notifying listeners.
    pub(crate) fn restore_initial(&mut self) {
        if let Some(initial) = &self.initial {
            self.stats.restore(&initial.stats);
            self.pseudo = initial.pseudo.clone();
        }
        self.metrics = UnitMetrics::default();
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("stats", self.stats.derived())
            .field("auras", &self.auras.len())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
