//! Seeded damage generator and timed repair jobs.

use crate::protocol::CommandStatus;
use crate::subsystems::{CompartmentId, LoopSide, MAX_COMPARTMENTS};
use heapless::Vec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use tracing::{error, info, warn};

/// One breach per compartment plus a leak on each hydraulic and coolant loop.
const MAX_ACTIVE_DAMAGE: usize = MAX_COMPARTMENTS + 4;
const_assert!(MAX_ACTIVE_DAMAGE <= u8::MAX as usize);
pub const MAX_DAMAGE_PER_TICK: usize = 4;
/// Keeps the damage stream independent of the fire-spread stream.
const DAMAGE_RNG_STREAM: u64 = 1;
const SECONDS_PER_HOUR: f64 = 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Damage {
    HullBreach { compartment: CompartmentId, area_m2: f64 },
    HydraulicLeak { side: LoopSide, rate_l_s: f64 },
    CoolantLeak { side: LoopSide, rate_kg_s: f64 },
    ElectricalFire { compartment: CompartmentId },
}

impl Damage {
    /// What a repair crew would fix; fires are fought, not repaired.
    pub fn repair_target(&self) -> Option<RepairTarget> {
        match *self {
            Damage::HullBreach { compartment, .. } => Some(RepairTarget::HullBreach(compartment)),
            Damage::HydraulicLeak { side, .. } => Some(RepairTarget::HydraulicLeak(side)),
            Damage::CoolantLeak { side, .. } => Some(RepairTarget::CoolantLeak(side)),
            Damage::ElectricalFire { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairTarget {
    HullBreach(CompartmentId),
    HydraulicLeak(LoopSide),
    CoolantLeak(LoopSide),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveDamage {
    pub target: RepairTarget,
    pub injected_at_tick: u64,
    /// Ticks left on a running repair, `None` when nobody is working on it.
    pub repair_remaining_ticks: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FaultInjectionStats {
    pub total_damage_injected: u32,
    pub breaches_injected: u32,
    pub hydraulic_leaks_injected: u32,
    pub coolant_leaks_injected: u32,
    pub electrical_fires_injected: u32,
    pub repairs_completed: u32,
    pub repairs_aborted: u32,
    pub current_active_damage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultInjectionConfig {
    pub enabled: bool,
    pub breach_rate_per_hour: f64,
    pub hydraulic_leak_rate_per_hour: f64,
    pub coolant_leak_rate_per_hour: f64,
    pub electrical_fire_rate_per_hour: f64,
    pub min_breach_area_m2: f64,
    pub max_breach_area_m2: f64,
    pub hydraulic_leak_l_s: f64,
    pub coolant_leak_kg_s: f64,
    pub repair_time_s: f64,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            breach_rate_per_hour: 0.5,
            hydraulic_leak_rate_per_hour: 1.0,
            coolant_leak_rate_per_hour: 1.0,
            electrical_fire_rate_per_hour: 0.5,
            min_breach_area_m2: 0.0005,
            max_breach_area_m2: 0.005,
            hydraulic_leak_l_s: 0.05,
            coolant_leak_kg_s: 0.05,
            repair_time_s: 30.0,
        }
    }
}

#[derive(Debug)]
pub struct FaultInjector {
    config: FaultInjectionConfig,
    rng: ChaCha8Rng,
    active: Vec<ActiveDamage, MAX_ACTIVE_DAMAGE>,
    stats: FaultInjectionStats,
}

impl FaultInjector {
    pub fn new(config: FaultInjectionConfig, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_stream(DAMAGE_RNG_STREAM);
        Self {
            config,
            rng,
            active: Vec::new(),
            stats: FaultInjectionStats::default(),
        }
    }

    /// Rolls for new damage. Each kind fires with probability
    /// `rate_per_hour * dt / 3600` per tick.
    pub fn roll(&mut self, dt_s: f64, compartments: usize) -> Vec<Damage, MAX_DAMAGE_PER_TICK> {
        let mut rolled = Vec::new();
        if !self.config.enabled || compartments == 0 {
            return rolled;
        }
        let chance = |rate_per_hour: f64| (rate_per_hour * dt_s / SECONDS_PER_HOUR).clamp(0.0, 1.0);

        if self.rng.gen_bool(chance(self.config.breach_rate_per_hour)) {
            let compartment = CompartmentId(self.rng.gen_range(0..compartments) as u16);
            let (lo, hi) = (self.config.min_breach_area_m2, self.config.max_breach_area_m2);
            let area_m2 = if hi > lo { self.rng.gen_range(lo..hi) } else { lo };
            let _ = rolled.push(Damage::HullBreach { compartment, area_m2 });
        }
        if self.rng.gen_bool(chance(self.config.hydraulic_leak_rate_per_hour)) {
            let side = self.random_side();
            let _ = rolled.push(Damage::HydraulicLeak { side, rate_l_s: self.config.hydraulic_leak_l_s });
        }
        if self.rng.gen_bool(chance(self.config.coolant_leak_rate_per_hour)) {
            let side = self.random_side();
            let _ = rolled.push(Damage::CoolantLeak { side, rate_kg_s: self.config.coolant_leak_kg_s });
        }
        if self.rng.gen_bool(chance(self.config.electrical_fire_rate_per_hour)) {
            let compartment = CompartmentId(self.rng.gen_range(0..compartments) as u16);
            let _ = rolled.push(Damage::ElectricalFire { compartment });
        }
        rolled
    }

    fn random_side(&mut self) -> LoopSide {
        if self.rng.gen_bool(0.5) {
            LoopSide::A
        } else {
            LoopSide::B
        }
    }

    /// Whether recording `damage` keeps it repairable. Callers check this
    /// before applying the damage.
    pub fn can_track(&self, damage: &Damage) -> bool {
        match damage.repair_target() {
            Some(target) => !self.active.is_full() || self.active.iter().any(|d| d.target == target),
            None => true,
        }
    }

    /// Tracks applied damage so it can be repaired later.
    pub fn record(&mut self, damage: &Damage, tick: u64) {
        self.stats.total_damage_injected += 1;
        match damage {
            Damage::HullBreach { .. } => self.stats.breaches_injected += 1,
            Damage::HydraulicLeak { .. } => self.stats.hydraulic_leaks_injected += 1,
            Damage::CoolantLeak { .. } => self.stats.coolant_leaks_injected += 1,
            Damage::ElectricalFire { .. } => self.stats.electrical_fires_injected += 1,
        }
        warn!(?damage, tick, "damage injected");

        if let Some(target) = damage.repair_target() {
            if self.active.iter().any(|d| d.target == target) {
                return;
            }
            let record = ActiveDamage {
                target,
                injected_at_tick: tick,
                repair_remaining_ticks: None,
            };
            if self.active.push(record).is_err() {
                error!(?target, "damage table full, damage cannot be repaired");
            }
        }
        self.stats.current_active_damage = self.active.len() as u8;
    }

    pub fn start_repair(&mut self, target: RepairTarget, ticks: u64) -> CommandStatus {
        match self.active.iter_mut().find(|d| d.target == target) {
            Some(d) if d.repair_remaining_ticks.is_some() => CommandStatus::Ignored("repair already in progress"),
            Some(d) => {
                d.repair_remaining_ticks = Some(ticks.max(1));
                info!(?target, ticks, "repair started");
                CommandStatus::Accepted
            }
            None => CommandStatus::Ignored("no damage to repair"),
        }
    }

    /// Stops the crew. Progress is lost; the damage stays.
    pub fn abort_repair(&mut self, target: RepairTarget) -> CommandStatus {
        match self.active.iter_mut().find(|d| d.target == target) {
            Some(d) if d.repair_remaining_ticks.is_some() => {
                d.repair_remaining_ticks = None;
                self.stats.repairs_aborted += 1;
                info!(?target, "repair aborted");
                CommandStatus::Accepted
            }
            _ => CommandStatus::Ignored("no repair in progress"),
        }
    }

    /// Counts running repairs down one tick and returns the finished ones.
    pub fn advance_repairs(&mut self) -> Vec<RepairTarget, MAX_ACTIVE_DAMAGE> {
        let mut finished = Vec::new();
        for damage in self.active.iter_mut() {
            if let Some(remaining) = damage.repair_remaining_ticks.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    let _ = finished.push(damage.target);
                }
            }
        }
        self.active.retain(|d| d.repair_remaining_ticks != Some(0));
        for target in &finished {
            info!(?target, "repair completed");
        }
        self.stats.repairs_completed += finished.len() as u32;
        self.stats.current_active_damage = self.active.len() as u8;
        finished
    }

    pub fn repair_time_s(&self) -> f64 {
        self.config.repair_time_s
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn get_stats(&self) -> &FaultInjectionStats {
        &self.stats
    }

    pub fn get_config(&self) -> &FaultInjectionConfig {
        &self.config
    }

    pub fn get_active_damage(&self) -> &[ActiveDamage] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled_config() -> FaultInjectionConfig {
        FaultInjectionConfig {
            enabled: true,
            breach_rate_per_hour: 3600.0,
            hydraulic_leak_rate_per_hour: 0.0,
            coolant_leak_rate_per_hour: 0.0,
            electrical_fire_rate_per_hour: 0.0,
            ..FaultInjectionConfig::default()
        }
    }

    #[test]
    fn test_disabled_injects_nothing() {
        let mut injector = FaultInjector::new(FaultInjectionConfig::default(), 42);
        for _ in 0..1000 {
            assert!(injector.roll(1.0, 4).is_empty());
        }
    }

    #[test]
    fn test_certain_rate_always_fires() {
        let mut injector = FaultInjector::new(enabled_config(), 42);
        let rolled = injector.roll(1.0, 4);
        assert_eq!(rolled.len(), 1);
        match rolled[0] {
            Damage::HullBreach { compartment, area_m2 } => {
                assert!(compartment.index() < 4);
                assert!(area_m2 >= 0.0005 && area_m2 < 0.005);
            }
            other => panic!("unexpected damage {:?}", other),
        }
    }

    #[test]
    fn test_same_seed_same_damage() {
        let mut config = enabled_config();
        config.breach_rate_per_hour = 360.0;
        config.coolant_leak_rate_per_hour = 360.0;
        let mut a = FaultInjector::new(config.clone(), 7);
        let mut b = FaultInjector::new(config, 7);
        for _ in 0..500 {
            assert_eq!(a.roll(0.5, 4), b.roll(0.5, 4));
        }
    }

    #[test]
    fn test_repair_counts_down_and_clears() {
        let mut injector = FaultInjector::new(FaultInjectionConfig::default(), 1);
        let damage = Damage::HydraulicLeak { side: LoopSide::B, rate_l_s: 0.1 };
        injector.record(&damage, 5);
        let target = RepairTarget::HydraulicLeak(LoopSide::B);
        assert_eq!(injector.start_repair(target, 3), CommandStatus::Accepted);
        assert_eq!(injector.start_repair(target, 3), CommandStatus::Ignored("repair already in progress"));
        assert!(injector.advance_repairs().is_empty());
        assert!(injector.advance_repairs().is_empty());
        assert_eq!(injector.advance_repairs().as_slice(), &[target]);
        assert!(injector.get_active_damage().is_empty());
        assert_eq!(injector.get_stats().repairs_completed, 1);
    }

    #[test]
    fn test_abort_resets_progress() {
        let mut injector = FaultInjector::new(FaultInjectionConfig::default(), 1);
        let compartment = CompartmentId(2);
        injector.record(&Damage::HullBreach { compartment, area_m2: 0.01 }, 0);
        let target = RepairTarget::HullBreach(compartment);
        injector.start_repair(target, 2);
        injector.advance_repairs();
        assert_eq!(injector.abort_repair(target), CommandStatus::Accepted);
        assert_eq!(injector.get_active_damage()[0].repair_remaining_ticks, None);
        assert_eq!(injector.abort_repair(target), CommandStatus::Ignored("no repair in progress"));
    }

    #[test]
    fn test_every_repair_target_fits() {
        let mut injector = FaultInjector::new(FaultInjectionConfig::default(), 1);
        let mut damage: std::vec::Vec<Damage> = (0..MAX_COMPARTMENTS)
            .map(|i| Damage::HullBreach { compartment: CompartmentId(i as u16), area_m2: 0.001 })
            .collect();
        for side in [LoopSide::A, LoopSide::B] {
            damage.push(Damage::HydraulicLeak { side, rate_l_s: 0.1 });
            damage.push(Damage::CoolantLeak { side, rate_kg_s: 0.1 });
        }
        for (tick, d) in damage.iter().enumerate() {
            assert!(injector.can_track(d));
            injector.record(d, tick as u64);
        }
        assert_eq!(injector.get_active_damage().len(), MAX_ACTIVE_DAMAGE);
        assert_eq!(injector.get_stats().current_active_damage as usize, MAX_ACTIVE_DAMAGE);
        // Repeat damage reuses its entry.
        assert!(injector.can_track(&damage[0]));
        assert_eq!(
            injector.start_repair(RepairTarget::CoolantLeak(LoopSide::B), 1),
            CommandStatus::Accepted
        );
        assert_eq!(injector.advance_repairs().as_slice(), &[RepairTarget::CoolantLeak(LoopSide::B)]);
    }

    #[test]
    fn test_fire_is_not_repairable() {
        let mut injector = FaultInjector::new(FaultInjectionConfig::default(), 1);
        injector.record(&Damage::ElectricalFire { compartment: CompartmentId(0) }, 0);
        assert!(injector.get_active_damage().is_empty());
        assert_eq!(
            injector.start_repair(RepairTarget::HullBreach(CompartmentId(0)), 1),
            CommandStatus::Ignored("no damage to repair")
        );
    }
}
