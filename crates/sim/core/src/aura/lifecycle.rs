//! Aura state transitions.
//!
//! ```text
//!            activate                 deactivate / expiry / stacks → 0
//! Inactive ────────────▶ Active ─────────────────────────────────────▶ Inactive
//!                        │    ▲
//!                        └────┘ refresh / activate / stack changes
//! ```
//!
//! Hooks are cloned out of the arena before they run so they can call back
//! into the simulation, including on the aura that is invoking them.

use tracing::{debug, trace};

use super::{Aura, AuraConfig, AuraId};
use crate::clock::{EventKind, EventPriority};
use crate::error::{KernelError, SimResult};
use crate::sim::Simulation;
use crate::time::{AuraDuration, SimTime};
use crate::unit::UnitId;

impl Simulation {
    /// Register a new aura on `unit`. Labels are unique per unit.
    pub fn register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        if config.label.is_empty() {
            return Err(KernelError::EmptyAuraLabel { unit });
        }

        let id = AuraId(self.auras.len() as u32);
        let owner = self.unit_mut(unit)?;
        if owner.aura_labels.contains_key(&config.label) {
            return Err(KernelError::DuplicateAuraLabel {
                unit,
                label: config.label,
            });
        }
        owner.aura_labels.insert(config.label.clone(), id);
        owner.auras.push(id);

        trace!(unit = %unit, aura = %id, label = %config.label, "aura registered");
        let hooks = config.hooks.clone();
        self.auras.push(Aura::new(id, unit, config));

        // Auras created mid-combat still get their one-time initialisation.
        if self.finalized {
            hooks.on_init(self, id)?;
        }
        Ok(id)
    }

    /// Return the aura already registered under `config.label`, or register it.
    pub fn get_or_register_aura(&mut self, unit: UnitId, config: AuraConfig) -> SimResult<AuraId> {
        match self.unit(unit)?.aura_by_label(&config.label) {
            Some(existing) => Ok(existing),
            None => self.register_aura(unit, config),
        }
    }

    pub fn aura(&self, id: AuraId) -> SimResult<&Aura> {
        self.auras
            .get(id.0 as usize)
            .ok_or(KernelError::UnknownAura(id))
    }

    pub(crate) fn aura_mut(&mut self, id: AuraId) -> SimResult<&mut Aura> {
        self.auras
            .get_mut(id.0 as usize)
            .ok_or(KernelError::UnknownAura(id))
    }

    pub fn find_aura(&self, unit: UnitId, label: &str) -> Option<AuraId> {
        self.unit(unit).ok()?.aura_by_label(label)
    }

    /// `false` for unknown handles.
    pub fn is_active(&self, id: AuraId) -> bool {
        self.aura(id).is_ok_and(Aura::is_active)
    }

    /// `0` for unknown handles.
    pub fn stacks(&self, id: AuraId) -> u32 {
        self.aura(id).map_or(0, Aura::stacks)
    }

    /// Time left on the current activation. Zero when inactive.
    pub fn remaining_duration(&self, id: AuraId) -> SimResult<AuraDuration> {
        let aura = self.aura(id)?;
        if !aura.active {
            return Ok(AuraDuration::Finite(std::time::Duration::ZERO));
        }
        if aura.expires_at.is_never() {
            return Ok(AuraDuration::Never);
        }
        Ok(AuraDuration::Finite(self.now().until(aura.expires_at)))
    }

    pub fn has_active_aura_with_tag(&self, unit: UnitId, tag: &str) -> bool {
        !self.active_auras_with_tag(unit, tag).is_empty()
    }

    /// Active auras on `unit` carrying `tag`, in registration order.
    pub fn active_auras_with_tag(&self, unit: UnitId, tag: &str) -> Vec<AuraId> {
        let Ok(owner) = self.unit(unit) else {
            return Vec::new();
        };
        owner
            .auras
            .iter()
            .copied()
            .filter(|id| {
                self.aura(*id)
                    .is_ok_and(|aura| aura.active && aura.tag() == Some(tag))
            })
            .collect()
    }

    /// Activate an inactive aura. On an active aura this is a refresh.
    pub fn activate_aura(&mut self, id: AuraId) -> SimResult<()> {
        self.activate_with_stacks(id, 1)
    }

    /// Stacking auras still at zero stacks after `on_gain` start at
    /// `initial_stacks`.
    fn activate_with_stacks(&mut self, id: AuraId, initial_stacks: u32) -> SimResult<()> {
        let now = self.now();
        let aura = self.aura_mut(id)?;
        if aura.active {
            return self.refresh_aura(id);
        }

        aura.active = true;
        aura.activation_serial += 1;
        aura.expiry_serial += 1;
        aura.started_at = now;
        aura.expires_at = aura.duration.expires_from(now);
        aura.metrics.activations += 1;

        let hooks = aura.hooks.clone();
        let exclusive = aura.exclusive.clone();
        let stacking = aura.is_stacking();
        debug!(
            unit = %aura.unit,
            aura = %id,
            label = %aura.label,
            at = %now,
            expires_at = %aura.expires_at,
            "aura gained"
        );

        self.schedule_expiry(id)?;
        for effect in exclusive {
            self.set_exclusive_member_active(effect, true)?;
        }
        hooks.on_gain(self, id)?;

        if stacking && initial_stacks > 0 && self.is_active(id) && self.stacks(id) == 0 {
            self.set_stacks(id, initial_stacks)?;
        }
        Ok(())
    }

    /// Reset the remaining duration of an active aura. No-op when inactive.
    pub fn refresh_aura(&mut self, id: AuraId) -> SimResult<()> {
        let now = self.now();
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }

        aura.expiry_serial += 1;
        aura.expires_at = aura.duration.expires_from(now);
        aura.metrics.refreshes += 1;
        let hooks = aura.hooks.clone();
        debug!(
            unit = %aura.unit,
            aura = %id,
            label = %aura.label,
            at = %now,
            expires_at = %aura.expires_at,
            "aura refreshed"
        );

        self.schedule_expiry(id)?;
        hooks.on_refresh(self, id)
    }

    /// Deactivate an active aura. No-op when inactive.
    pub fn deactivate_aura(&mut self, id: AuraId) -> SimResult<()> {
        let now = self.now();
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }

        aura.active = false;
        aura.metrics.uptime += now - aura.started_at;
        aura.expiry_serial += 1;
        aura.expires_at = now;
        let old_stacks = std::mem::take(&mut aura.stacks);

        let hooks = aura.hooks.clone();
        let exclusive = aura.exclusive.clone();
        debug!(
            unit = %aura.unit,
            aura = %id,
            label = %aura.label,
            at = %now,
            "aura expired"
        );

        if old_stacks > 0 {
            hooks.on_stacks_change(self, id, old_stacks, 0)?;
        }
        for effect in exclusive {
            self.set_exclusive_member_active(effect, false)?;
        }
        hooks.on_expire(self, id)
    }

    /// Set the stack count, clamped to the aura's maximum.
    ///
    /// A positive count on an inactive aura activates it first; zero
    /// deactivates. Non-stacking auras treat any positive count as activate.
    pub fn set_stacks(&mut self, id: AuraId, stacks: u32) -> SimResult<()> {
        let aura = self.aura(id)?;
        if !aura.is_stacking() {
            return if stacks > 0 {
                self.activate_aura(id)
            } else {
                self.deactivate_aura(id)
            };
        }

        let stacks = stacks.min(aura.max_stacks);
        if !aura.active {
            if stacks == 0 {
                return Ok(());
            }
            self.activate_with_stacks(id, stacks)?;
        }

        let aura = self.aura_mut(id)?;
        if !aura.active || aura.stacks == stacks {
            return Ok(());
        }
        if stacks == 0 {
            return self.deactivate_aura(id);
        }

        let old = aura.stacks;
        aura.stacks = stacks;
        let hooks = aura.hooks.clone();
        trace!(
            unit = %aura.unit,
            aura = %id,
            label = %aura.label,
            old,
            new = stacks,
            "aura stacks changed"
        );
        hooks.on_stacks_change(self, id, old, stacks)
    }

    /// Add one stack. Does not refresh the duration; at the cap nothing changes.
    pub fn add_stack(&mut self, id: AuraId) -> SimResult<()> {
        let aura = self.aura(id)?;
        if !aura.active {
            return self.set_stacks(id, 1);
        }
        let next = aura.stacks.saturating_add(1);
        self.set_stacks(id, next)
    }

    pub fn remove_stack(&mut self, id: AuraId) -> SimResult<()> {
        let aura = self.aura(id)?;
        if !aura.active {
            return Ok(());
        }
        let next = aura.stacks.saturating_sub(1);
        self.set_stacks(id, next)
    }

    /// Move the expiry of an active aura to `at` without firing any hook.
    pub fn set_expires_at(&mut self, id: AuraId, at: SimTime) -> SimResult<()> {
        let now = self.now();
        if at < now {
            return Err(KernelError::ScheduledInPast { at, now });
        }
        let aura = self.aura_mut(id)?;
        if !aura.active {
            return Ok(());
        }
        aura.expiry_serial += 1;
        aura.expires_at = at;
        self.schedule_expiry(id)
    }

    /// Expiry event handler. Stale serials are ignored.
    pub(crate) fn expire_aura(&mut self, id: AuraId, serial: u64) -> SimResult<()> {
        let aura = self.aura(id)?;
        if !aura.active || aura.expiry_serial != serial {
            return Ok(());
        }
        self.deactivate_aura(id)
    }

    fn schedule_expiry(&mut self, id: AuraId) -> SimResult<()> {
        let aura = self.aura(id)?;
        if aura.expires_at.is_never() {
            return Ok(());
        }
        let at = aura.expires_at;
        let serial = aura.expiry_serial;
        self.clock.schedule(
            at,
            EventPriority::Default,
            EventKind::AuraExpiry { aura: id, serial },
        )
    }
}
