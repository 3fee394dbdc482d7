//! Toggleable stat dependencies and the per-unit graph that evaluates them.
//!
//! The derived vector is never patched in place. Every enable or disable
//! re-evaluates it from the base vector and the currently enabled edges:
//!
//! ```text
//! derived[s] = (base[s] + Σ add(s) + Σ derived[src] × ratio) × Π multiply(s)
//! ```
//!
//! Stats are visited in topological order of the conversion edges, so a
//! conversion always reads its source's final value. Multipliers on one stat
//! apply in the order they were enabled. Because nothing is accumulated,
//! disabling an edge restores the previous derived vector bit-for-bit no
//! matter which order edges are toggled in.

use std::collections::BTreeSet;
use std::fmt;

use strum::{EnumCount, IntoEnumIterator};

use super::stat::{Stat, Stats};
use crate::error::{KernelError, SimResult};
use crate::unit::UnitId;

/// Handle to a dependency registered on one unit's graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DependencyId(pub u32);

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dep#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DependencyOp {
    /// Flat amount added to the target.
    Add(f64),

    /// Factor the target is multiplied by, after every additive contribution.
    Multiply(f64),

    /// `ratio` of the source's derived value added to the target.
    Convert { source: Stat, ratio: f64 },
}

/// An edge contributing to one derived stat.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatDependency {
    pub target: Stat,
    pub op: DependencyOp,
}

impl StatDependency {
    pub const fn add(target: Stat, amount: f64) -> Self {
        Self {
            target,
            op: DependencyOp::Add(amount),
        }
    }

    pub const fn multiply(target: Stat, factor: f64) -> Self {
        Self {
            target,
            op: DependencyOp::Multiply(factor),
        }
    }

    pub const fn convert(source: Stat, target: Stat, ratio: f64) -> Self {
        Self {
            target,
            op: DependencyOp::Convert { source, ratio },
        }
    }

    /// Stat read by this edge. Flat and multiplicative edges read their target.
    pub fn source(&self) -> Stat {
        match self.op {
            DependencyOp::Convert { source, .. } => source,
            DependencyOp::Add(_) | DependencyOp::Multiply(_) => self.target,
        }
    }
}

#[derive(Clone, Debug)]
struct Edge {
    dependency: StatDependency,
    /// Enable sequence number; `None` while disabled.
    enabled_at: Option<u64>,
}

/// Base vector plus enabled edges captured for later restoration.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphSnapshot {
    base: Stats,
    enabled: Vec<Option<u64>>,
    next_stamp: u64,
}

/// Base stats, dependency edges, and the derived vector they produce.
#[derive(Clone, Debug)]
pub struct StatGraph {
    unit: UnitId,
    base: Stats,
    derived: Stats,
    edges: Vec<Edge>,
    order: Vec<Stat>,
    next_stamp: u64,
}

impl StatGraph {
    pub fn new(unit: UnitId, base: Stats) -> Self {
        Self {
            unit,
            base,
            derived: base,
            edges: Vec::new(),
            order: Stat::iter().collect(),
            next_stamp: 0,
        }
    }

    pub fn base(&self) -> &Stats {
        &self.base
    }

    pub fn derived(&self) -> &Stats {
        &self.derived
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn register(&mut self, dependency: StatDependency) -> SimResult<DependencyId> {
        match dependency.op {
            DependencyOp::Multiply(factor) if factor == 0.0 || !factor.is_finite() => {
                return Err(KernelError::NonInvertibleMultiplier {
                    stat: dependency.target,
                    factor,
                });
            }
            DependencyOp::Convert { source, .. } => {
                if source == dependency.target {
                    return Err(KernelError::DependencyCycle {
                        unit: self.unit,
                        stat: source,
                    });
                }
            }
            _ => {}
        }

        let id = DependencyId(self.edges.len() as u32);
        self.edges.push(Edge {
            dependency,
            enabled_at: None,
        });

        if matches!(dependency.op, DependencyOp::Convert { .. }) {
            match self.topological_order() {
                Some(order) => self.order = order,
                None => {
                    self.edges.pop();
                    return Err(KernelError::DependencyCycle {
                        unit: self.unit,
                        stat: dependency.target,
                    });
                }
            }
        }

        Ok(id)
    }

    pub fn dependency(&self, id: DependencyId) -> SimResult<&StatDependency> {
        self.edge(id).map(|edge| &edge.dependency)
    }

    pub fn is_enabled(&self, id: DependencyId) -> SimResult<bool> {
        self.edge(id).map(|edge| edge.enabled_at.is_some())
    }

    pub fn enable(&mut self, id: DependencyId) -> SimResult<()> {
        let stamp = self.next_stamp;
        let unit = self.unit;
        let edge = self.edge_mut(id)?;
        if edge.enabled_at.is_some() {
            return Err(KernelError::DependencyAlreadyEnabled {
                unit,
                dependency: id,
            });
        }
        edge.enabled_at = Some(stamp);
        self.next_stamp += 1;
        self.recompute();
        Ok(())
    }

    pub fn disable(&mut self, id: DependencyId) -> SimResult<()> {
        let unit = self.unit;
        let edge = self.edge_mut(id)?;
        if edge.enabled_at.is_none() {
            return Err(KernelError::DependencyNotEnabled {
                unit,
                dependency: id,
            });
        }
        edge.enabled_at = None;
        self.recompute();
        Ok(())
    }

    /// Add `delta` to the base vector.
    pub fn add_base(&mut self, delta: &Stats) {
        self.base += *delta;
        self.recompute();
    }

    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            base: self.base,
            enabled: self.edges.iter().map(|edge| edge.enabled_at).collect(),
            next_stamp: self.next_stamp,
        }
    }

    /// Restore a snapshot. Edges registered after it was taken end up disabled.
    pub fn restore(&mut self, snapshot: &GraphSnapshot) {
        self.base = snapshot.base;
        for (index, edge) in self.edges.iter_mut().enumerate() {
            edge.enabled_at = snapshot.enabled.get(index).copied().flatten();
        }
        self.next_stamp = snapshot.next_stamp;
        self.recompute();
    }

    fn edge(&self, id: DependencyId) -> SimResult<&Edge> {
        self.edges
            .get(id.0 as usize)
            .ok_or(KernelError::UnknownDependency {
                unit: self.unit,
                dependency: id,
            })
    }

    fn edge_mut(&mut self, id: DependencyId) -> SimResult<&mut Edge> {
        let unit = self.unit;
        self.edges
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownDependency {
                unit,
                dependency: id,
            })
    }

    fn recompute(&mut self) {
        let mut derived = self.base;
        let mut multipliers: Vec<(u64, f64)> = Vec::new();

        for &stat in &self.order {
            let mut value = self.base[stat];
            multipliers.clear();

            for edge in &self.edges {
                let Some(stamp) = edge.enabled_at else {
                    continue;
                };
                if edge.dependency.target != stat {
                    continue;
                }
                match edge.dependency.op {
                    DependencyOp::Add(amount) => value += amount,
                    DependencyOp::Convert { source, ratio } => value += derived[source] * ratio,
                    DependencyOp::Multiply(factor) => multipliers.push((stamp, factor)),
                }
            }

            multipliers.sort_by_key(|(stamp, _)| *stamp);
            for (_, factor) in &multipliers {
                value *= factor;
            }
            derived[stat] = value;
        }

        tracing::trace!(unit = %self.unit, "recomputed derived stats");
        self.derived = derived;
    }

    /// Kahn's algorithm over conversion edges, lowest stat first among ready
    /// nodes. `None` when the edges contain a cycle.
    fn topological_order(&self) -> Option<Vec<Stat>> {
        let mut in_degree = [0usize; Stat::COUNT];
        let mut outgoing: Vec<Vec<Stat>> = vec![Vec::new(); Stat::COUNT];

        for edge in &self.edges {
            if let DependencyOp::Convert { source, .. } = edge.dependency.op {
                outgoing[source.index()].push(edge.dependency.target);
                in_degree[edge.dependency.target.index()] += 1;
            }
        }

        let mut ready: BTreeSet<Stat> = Stat::iter()
            .filter(|stat| in_degree[stat.index()] == 0)
            .collect();
        let mut order = Vec::with_capacity(Stat::COUNT);

        while let Some(stat) = ready.pop_first() {
            order.push(stat);
            for &target in &outgoing[stat.index()] {
                in_degree[target.index()] -= 1;
                if in_degree[target.index()] == 0 {
                    ready.insert(target);
                }
            }
        }

        (order.len() == Stat::COUNT).then_some(order)
    }
}
