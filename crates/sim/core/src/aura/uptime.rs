use std::time::Duration;

use super::AuraId;
use crate::error::{KernelError, SimResult};
use crate::periodic::PeriodicConfig;
use crate::sim::Simulation;
use crate::time::{AuraDuration, SimTime};

impl Simulation {
    /// Approximate an externally maintained buff that is up `uptime` of the time.
    ///
    /// Every `tick_length` the aura is (re)activated with the per-tick chance
    /// that yields the requested uptime over one aura duration:
    /// `1 - (1 - uptime)^(tick_length / duration)`. At `start_time` a single
    /// opening roll against `uptime` activates the aura for a random partial
    /// duration, so the first seconds of a trial are not always uncovered.
    pub fn apply_fixed_uptime_aura(
        &mut self,
        aura: AuraId,
        uptime: f64,
        tick_length: Duration,
        start_time: SimTime,
    ) -> SimResult<()> {
        if !(uptime > 0.0 && uptime <= 1.0) {
            return Err(KernelError::InvalidUptime(uptime));
        }
        if tick_length.is_zero() {
            return Err(KernelError::ZeroPeriod);
        }

        let target = self.aura(aura)?;
        let aura_duration = match target.duration {
            AuraDuration::Finite(span) => span,
            AuraDuration::Never => tick_length,
        };
        let ticks_per_aura = aura_duration.as_secs_f64() / tick_length.as_secs_f64();
        let chance_per_tick = if uptime >= 1.0 {
            1.0
        } else {
            1.0 - (1.0 - uptime).powf(1.0 / ticks_per_aura)
        };
        let label = format!("{} Uptime", target.label);

        self.register_reset_effect(move |sim| {
            let tick_label = label.clone();
            sim.start_periodic(PeriodicConfig::new(tick_length, move |sim, _| {
                if sim.roll_float(&tick_label)? < chance_per_tick {
                    sim.activate_aura(aura)?;
                }
                Ok(())
            }))?;

            let opening_label = label.clone();
            sim.start_periodic(
                PeriodicConfig::new(tick_length, move |sim, _| {
                    if sim.roll_float(&opening_label)? >= uptime {
                        return Ok(());
                    }
                    let spare = aura_duration.saturating_sub(tick_length);
                    let partial =
                        tick_length + spare.mul_f64(sim.roll_float(&opening_label)?);
                    sim.activate_aura(aura)?;
                    let expires_at = sim.now() + partial;
                    sim.set_expires_at(aura, expires_at)
                })
                .with_ticks(1)
                .starting_at(start_time),
            )?;
            Ok(())
        });
        Ok(())
    }
}
