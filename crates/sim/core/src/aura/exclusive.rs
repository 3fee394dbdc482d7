//! Exclusive effect categories.
//!
//! Auras in the same category on the same unit never stack their bonuses:
//! only the highest-priority active member is applied. Ties go to the member
//! registered first. When the winner changes, the old winner's effect is
//! withdrawn before the new winner's effect is applied.

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::AuraId;
use crate::error::{KernelError, SimResult};
use crate::sim::Simulation;
use crate::unit::UnitId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExclusiveCategoryId(pub u32);

impl fmt::Display for ExclusiveCategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "category#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExclusiveEffectId(pub u32);

impl fmt::Display for ExclusiveEffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

pub type ExclusiveCallback = Rc<dyn Fn(&mut Simulation, ExclusiveEffectId) -> SimResult<()>>;

#[derive(Debug)]
pub struct ExclusiveCategory {
    pub(crate) unit: UnitId,
    pub(crate) key: String,
    pub(crate) members: Vec<ExclusiveEffectId>,
    pub(crate) applied: Option<ExclusiveEffectId>,
}

impl ExclusiveCategory {
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Members in registration order.
    pub fn members(&self) -> &[ExclusiveEffectId] {
        &self.members
    }

    pub fn applied(&self) -> Option<ExclusiveEffectId> {
        self.applied
    }
}

/// One aura's membership in a category.
pub struct ExclusiveEffect {
    pub(crate) aura: AuraId,
    pub(crate) category: ExclusiveCategoryId,
    pub(crate) priority: f64,
    pub(crate) active: bool,
    pub(crate) applied: bool,
    pub(crate) on_gain: Option<ExclusiveCallback>,
    pub(crate) on_expire: Option<ExclusiveCallback>,
}

impl ExclusiveEffect {
    pub fn aura(&self) -> AuraId {
        self.aura
    }

    pub fn category(&self) -> ExclusiveCategoryId {
        self.category
    }

    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// The owning aura is active.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// This member's bonus is the one currently live.
    pub fn is_applied(&self) -> bool {
        self.applied
    }
}

impl fmt::Debug for ExclusiveEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveEffect")
            .field("aura", &self.aura)
            .field("category", &self.category)
            .field("priority", &self.priority)
            .field("active", &self.active)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Look up or create the category named `key` on `unit`.
    pub fn exclusive_category(&mut self, unit: UnitId, key: &str) -> SimResult<ExclusiveCategoryId> {
        self.unit(unit)?;
        if let Some(id) = self.category_index.get(&(unit, key.to_owned())) {
            return Ok(*id);
        }

        let id = ExclusiveCategoryId(self.categories.len() as u32);
        self.categories.push(ExclusiveCategory {
            unit,
            key: key.to_owned(),
            members: Vec::new(),
            applied: None,
        });
        self.category_index.insert((unit, key.to_owned()), id);
        Ok(id)
    }

    /// Make `aura` a member of the category `key` on the aura's unit.
    ///
    /// `on_gain` runs when this member becomes the applied one and `on_expire`
    /// when it stops being applied.
    pub fn register_exclusive_effect<G, E>(
        &mut self,
        aura: AuraId,
        key: &str,
        priority: f64,
        on_gain: G,
        on_expire: E,
    ) -> SimResult<ExclusiveEffectId>
    where
        G: Fn(&mut Simulation, ExclusiveEffectId) -> SimResult<()> + 'static,
        E: Fn(&mut Simulation, ExclusiveEffectId) -> SimResult<()> + 'static,
    {
        let owner = self.aura(aura)?;
        let unit = owner.unit;
        let active = owner.active;
        let category = self.exclusive_category(unit, key)?;

        let id = ExclusiveEffectId(self.effects.len() as u32);
        self.effects.push(ExclusiveEffect {
            aura,
            category,
            priority,
            active,
            applied: false,
            on_gain: Some(Rc::new(on_gain)),
            on_expire: Some(Rc::new(on_expire)),
        });
        self.category_mut(category)?.members.push(id);
        self.aura_mut(aura)?.exclusive.push(id);

        if active {
            self.arbitrate(category)?;
        }
        Ok(id)
    }

    pub fn category(&self, id: ExclusiveCategoryId) -> SimResult<&ExclusiveCategory> {
        self.categories
            .get(id.0 as usize)
            .ok_or(KernelError::UnknownHandle {
                kind: "exclusive category",
                index: id.0,
            })
    }

    fn category_mut(&mut self, id: ExclusiveCategoryId) -> SimResult<&mut ExclusiveCategory> {
        self.categories
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownHandle {
                kind: "exclusive category",
                index: id.0,
            })
    }

    pub fn exclusive_effect(&self, id: ExclusiveEffectId) -> SimResult<&ExclusiveEffect> {
        self.effects
            .get(id.0 as usize)
            .ok_or(KernelError::UnknownHandle {
                kind: "exclusive effect",
                index: id.0,
            })
    }

    fn exclusive_effect_mut(&mut self, id: ExclusiveEffectId) -> SimResult<&mut ExclusiveEffect> {
        self.effects
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownHandle {
                kind: "exclusive effect",
                index: id.0,
            })
    }

    /// The member whose effect is currently live.
    pub fn applied_effect(&self, id: ExclusiveCategoryId) -> SimResult<Option<ExclusiveEffectId>> {
        Ok(self.category(id)?.applied)
    }

    /// Whether any member's aura is active.
    pub fn category_any_active(&self, id: ExclusiveCategoryId) -> SimResult<bool> {
        let category = self.category(id)?;
        Ok(category
            .members
            .iter()
            .any(|member| self.effects.get(member.0 as usize).is_some_and(|e| e.active)))
    }

    /// Change a member's priority and re-run arbitration.
    pub fn set_exclusive_priority(&mut self, id: ExclusiveEffectId, priority: f64) -> SimResult<()> {
        let effect = self.exclusive_effect_mut(id)?;
        effect.priority = priority;
        let category = effect.category;
        self.arbitrate(category)
    }

    pub(crate) fn set_exclusive_member_active(
        &mut self,
        id: ExclusiveEffectId,
        active: bool,
    ) -> SimResult<()> {
        let effect = self.exclusive_effect_mut(id)?;
        effect.active = active;
        let category = effect.category;
        self.arbitrate(category)
    }

    fn arbitrate(&mut self, id: ExclusiveCategoryId) -> SimResult<()> {
        let category = self.category(id)?;
        let mut winner: Option<(ExclusiveEffectId, f64)> = None;
        for &member in &category.members {
            let effect = self.exclusive_effect(member)?;
            if !effect.active {
                continue;
            }
            match winner {
                Some((_, best)) if effect.priority.total_cmp(&best).is_le() => {}
                _ => winner = Some((member, effect.priority)),
            }
        }

        let winner = winner.map(|(member, _)| member);
        let previous = category.applied;
        if winner == previous {
            return Ok(());
        }

        debug!(
            unit = %category.unit,
            category = %category.key,
            from = ?previous,
            to = ?winner,
            at = %self.now(),
            "exclusive winner changed"
        );
        self.category_mut(id)?.applied = winner;

        if let Some(previous) = previous {
            let effect = self.exclusive_effect_mut(previous)?;
            effect.applied = false;
            if let Some(on_expire) = effect.on_expire.clone() {
                on_expire(self, previous)?;
            }
        }
        if let Some(next) = winner {
            let effect = self.exclusive_effect_mut(next)?;
            effect.applied = true;
            if let Some(on_gain) = effect.on_gain.clone() {
                on_gain(self, next)?;
            }
        }
        Ok(())
    }

    /// Forget which member is applied without running any callback.
    pub(crate) fn reset_exclusive_effects(&mut self) {
        for category in &mut self.categories {
            category.applied = None;
        }
        for effect in &mut self.effects {
            effect.active = false;
            effect.applied = false;
        }
    }
}
