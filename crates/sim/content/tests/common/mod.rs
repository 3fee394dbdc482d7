#![allow(dead_code)]

use std::time::Duration;

use sim_core::{PeriodicConfig, ProcMask, Simulation, SpellHit, UnitId};

/// Route kernel logs through the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Land an auto attack from `attacker` on `target` every `speed`, for every trial.
pub fn auto_attacks(
    sim: &mut Simulation,
    attacker: UnitId,
    target: UnitId,
    mask: ProcMask,
    speed: Duration,
    damage: f64,
) {
    sim.register_reset_effect(move |sim| {
        let swing = SpellHit::new(attacker, target, "Melee", mask).with_damage(damage);
        sim.start_periodic(PeriodicConfig::new(speed, move |sim, _| sim.resolve_outcome(&swing)))?;
        Ok(())
    });
}
