//! Master alarm derived from telemetry and the tick's events.

use crate::events::{Event, EventRecord};
use crate::subsystems::life_support::UnitStatus;
use crate::subsystems::{CompartmentId, LoopSide, ReactorStatus};
use crate::telemetry::TelemetrySnapshot;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const MAX_ALARM_HISTORY: usize = 32;
const MAX_ACTIVE_ALARMS: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SafetyLevel {
    Normal,
    Caution,
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alarm {
    BatteryLow,
    Blackout,
    ReactorOvertemp,
    ReactorScrammed,
    BreakerTripped,
    FuelPressureLow,
    HydraulicPressureLow(LoopSide),
    CoolantBoiling(LoopSide),
    CoolantDepleted(LoopSide),
    BottleRuptured,
    EngineFlameout,
    NozzleDegraded,
    LifeSupportInactive,
    Fire(CompartmentId),
    Hypoxia(CompartmentId),
    Co2High(CompartmentId),
    Depressurized(CompartmentId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub alarm: Alarm,
    pub raised_at_tick: u64,
    pub level: SafetyLevel,
    pub cleared: bool,
    pub acknowledged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyState {
    pub level: SafetyLevel,
    pub active_alarms: u8,
    /// Master alarm lit: some alarm has been raised and not yet acknowledged.
    pub unacknowledged: bool,
    pub alarms_raised: u32,
}

impl Default for SafetyState {
    fn default() -> Self {
        Self {
            level: SafetyLevel::Normal,
            active_alarms: 0,
            unacknowledged: false,
            alarms_raised: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SafetyThresholds {
    pub battery_caution_percent: f64,
    pub battery_warning_percent: f64,
    pub reactor_caution_temp_k: f64,
    pub hydraulic_min_bar: [f64; 2],
    pub o2_caution_kpa: f64,
    pub o2_warning_kpa: f64,
    pub o2_emergency_kpa: f64,
    pub co2_caution_percent: f64,
    pub co2_warning_percent: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            battery_caution_percent: 20.0,
            battery_warning_percent: 5.0,
            reactor_caution_temp_k: 765.0,
            hydraulic_min_bar: [150.0, 150.0],
            o2_caution_kpa: 19.0,
            o2_warning_kpa: 16.0,
            o2_emergency_kpa: 10.0,
            co2_caution_percent: 0.5,
            co2_warning_percent: 1.0,
        }
    }
}

#[derive(Debug)]
pub struct SafetyMonitor {
    thresholds: SafetyThresholds,
    state: SafetyState,
    active: Vec<(Alarm, SafetyLevel), MAX_ACTIVE_ALARMS>,
    history: Vec<AlarmRecord, MAX_ALARM_HISTORY>,
}

impl SafetyMonitor {
    pub fn new(thresholds: SafetyThresholds) -> Self {
        Self {
            thresholds,
            state: SafetyState::default(),
            active: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn update(&mut self, tick: u64, snapshot: &TelemetrySnapshot, events: &[EventRecord]) -> &SafetyState {
        let mut current: Vec<(Alarm, SafetyLevel), MAX_ACTIVE_ALARMS> = Vec::new();
        let mut raise = |alarm: Alarm, level: SafetyLevel| {
            if current.iter().any(|(a, _)| *a == alarm) {
                return;
            }
            if current.push((alarm, level)).is_err() {
                warn!(?alarm, "active alarm table full");
            }
        };

        self.check_power(snapshot, &mut raise);
        self.check_fluids(snapshot, &mut raise);
        self.check_atmosphere(snapshot, &mut raise);
        check_events(events, &mut raise);

        for record in self.history.iter_mut().filter(|r| !r.cleared) {
            if !current.iter().any(|(a, _)| *a == record.alarm) {
                record.cleared = true;
                info!(alarm = ?record.alarm, "alarm cleared");
            }
        }
        for &(alarm, level) in &current {
            let was_active = self.active.iter().any(|(a, _)| *a == alarm);
            if was_active {
                if let Some(record) = self.history.iter_mut().rev().find(|r| r.alarm == alarm && !r.cleared) {
                    record.level = level;
                }
            } else {
                self.record(alarm, level, tick);
            }
        }

        self.state.level = current.iter().map(|(_, l)| *l).max().unwrap_or(SafetyLevel::Normal);
        self.state.active_alarms = current.len() as u8;
        self.state.unacknowledged = self.history.iter().any(|r| !r.acknowledged);
        self.active = current;
        &self.state
    }

    fn record(&mut self, alarm: Alarm, level: SafetyLevel, tick: u64) {
        if level >= SafetyLevel::Warning {
            warn!(?alarm, ?level, tick, "alarm raised");
        } else {
            info!(?alarm, ?level, tick, "alarm raised");
        }
        if self.history.is_full() {
            self.history.remove(0);
        }
        let _ = self.history.push(AlarmRecord {
            alarm,
            raised_at_tick: tick,
            level,
            cleared: false,
            acknowledged: false,
        });
        self.state.alarms_raised += 1;
    }

    fn check_power(&self, snapshot: &TelemetrySnapshot, raise: &mut impl FnMut(Alarm, SafetyLevel)) {
        let power = &snapshot.power;
        if power.blackout {
            raise(Alarm::Blackout, SafetyLevel::Critical);
        }
        let battery = power.storage.battery_percent;
        if battery < self.thresholds.battery_warning_percent {
            raise(Alarm::BatteryLow, SafetyLevel::Warning);
        } else if battery < self.thresholds.battery_caution_percent {
            raise(Alarm::BatteryLow, SafetyLevel::Caution);
        }
        if power.reactor.status == ReactorStatus::Scrammed {
            raise(Alarm::ReactorScrammed, SafetyLevel::Warning);
        } else if power.reactor.temperature_k >= self.thresholds.reactor_caution_temp_k {
            raise(Alarm::ReactorOvertemp, SafetyLevel::Caution);
        }
        if power.breakers.iter().any(|b| b.tripped) {
            raise(Alarm::BreakerTripped, SafetyLevel::Caution);
        }
    }

    fn check_fluids(&self, snapshot: &TelemetrySnapshot, raise: &mut impl FnMut(Alarm, SafetyLevel)) {
        for hydraulic in &snapshot.hydraulics {
            if hydraulic.pressure_bar < self.thresholds.hydraulic_min_bar[hydraulic.side.index()] {
                raise(Alarm::HydraulicPressureLow(hydraulic.side), SafetyLevel::Caution);
            }
        }
        for coolant in &snapshot.coolant {
            if coolant.mass_kg <= 0.0 {
                raise(Alarm::CoolantDepleted(coolant.side), SafetyLevel::Warning);
            } else if coolant.boiling {
                raise(Alarm::CoolantBoiling(coolant.side), SafetyLevel::Warning);
            }
        }
        if snapshot.gas.iter().any(|b| b.ruptured) {
            raise(Alarm::BottleRuptured, SafetyLevel::Warning);
        }
        if snapshot.engine.nozzle_efficiency < 1.0 {
            raise(Alarm::NozzleDegraded, SafetyLevel::Caution);
        }
    }

    fn check_atmosphere(&self, snapshot: &TelemetrySnapshot, raise: &mut impl FnMut(Alarm, SafetyLevel)) {
        for fire in &snapshot.fires {
            raise(Alarm::Fire(fire.compartment), SafetyLevel::Critical);
        }
        for (index, compartment) in snapshot.compartments.iter().enumerate() {
            let id = CompartmentId(index as u16);
            let crewed = compartment.crew > 0;
            if compartment.depressurized {
                let level = if crewed { SafetyLevel::Emergency } else { SafetyLevel::Warning };
                raise(Alarm::Depressurized(id), level);
                continue;
            }
            if !crewed {
                continue;
            }
            let o2_kpa = compartment.pressure_kpa * compartment.o2_percent / 100.0;
            if o2_kpa < self.thresholds.o2_emergency_kpa {
                raise(Alarm::Hypoxia(id), SafetyLevel::Emergency);
            } else if o2_kpa < self.thresholds.o2_warning_kpa {
                raise(Alarm::Hypoxia(id), SafetyLevel::Warning);
            } else if o2_kpa < self.thresholds.o2_caution_kpa {
                raise(Alarm::Hypoxia(id), SafetyLevel::Caution);
            }
            if compartment.co2_percent >= self.thresholds.co2_warning_percent {
                raise(Alarm::Co2High(id), SafetyLevel::Warning);
            } else if compartment.co2_percent >= self.thresholds.co2_caution_percent {
                raise(Alarm::Co2High(id), SafetyLevel::Caution);
            }
        }
        let ls = &snapshot.life_support;
        if [ls.oxygen_generator, ls.co2_scrubber, ls.water_recycler].contains(&UnitStatus::Inactive) {
            raise(Alarm::LifeSupportInactive, SafetyLevel::Warning);
        }
    }

    /// Silences the master alarm. Levels are unaffected.
    pub fn acknowledge(&mut self) {
        for record in self.history.iter_mut() {
            record.acknowledged = true;
        }
        self.state.unacknowledged = false;
    }

    pub fn get_state(&self) -> &SafetyState {
        &self.state
    }

    pub fn get_alarm_history(&self) -> &[AlarmRecord] {
        &self.history
    }

    pub fn active_alarms(&self) -> impl Iterator<Item = &(Alarm, SafetyLevel)> {
        self.active.iter()
    }

    pub fn clear_cleared_alarms(&mut self) {
        self.history.retain(|r| !r.cleared);
    }
}

/// Alarms that only exist as a transition during the tick.
fn check_events(events: &[EventRecord], raise: &mut impl FnMut(Alarm, SafetyLevel)) {
    for record in events {
        match record.event {
            Event::FuelPressureLow { .. } => raise(Alarm::FuelPressureLow, SafetyLevel::Caution),
            Event::EngineFlameout { .. } => raise(Alarm::EngineFlameout, SafetyLevel::Caution),
            Event::GasBottleRuptured { .. } => raise(Alarm::BottleRuptured, SafetyLevel::Warning),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::vessel::Vessel;

    fn nominal_snapshot() -> TelemetrySnapshot {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.step();
        vessel.telemetry().clone()
    }

    #[test]
    fn test_nominal_vessel_is_normal() {
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        let state = monitor.update(1, &nominal_snapshot(), &[]);
        assert_eq!(state.level, SafetyLevel::Normal);
        assert!(!state.unacknowledged);
    }

    #[test]
    fn test_level_is_highest_active_alarm() {
        let mut snapshot = nominal_snapshot();
        snapshot.power.storage.battery_percent = 10.0;
        snapshot.compartments[0].depressurized = true;
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        let state = monitor.update(1, &snapshot, &[]);
        assert_eq!(state.level, SafetyLevel::Emergency);
        assert_eq!(state.active_alarms, 2);
    }

    #[test]
    fn test_alarm_recorded_once_and_cleared() {
        let mut snapshot = nominal_snapshot();
        snapshot.power.blackout = true;
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        monitor.update(1, &snapshot, &[]);
        monitor.update(2, &snapshot, &[]);
        assert_eq!(monitor.get_alarm_history().len(), 1);

        snapshot.power.blackout = false;
        monitor.update(3, &snapshot, &[]);
        assert!(monitor.get_alarm_history()[0].cleared);
        assert_eq!(monitor.get_state().level, SafetyLevel::Normal);
        // cleared but never acknowledged
        assert!(monitor.get_state().unacknowledged);
        monitor.acknowledge();
        assert!(!monitor.get_state().unacknowledged);
    }

    #[test]
    fn test_acknowledge_keeps_level() {
        let mut snapshot = nominal_snapshot();
        snapshot.power.blackout = true;
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        monitor.update(1, &snapshot, &[]);
        monitor.acknowledge();
        let state = monitor.update(2, &snapshot, &[]);
        assert_eq!(state.level, SafetyLevel::Critical);
        assert!(!state.unacknowledged);
    }

    #[test]
    fn test_event_alarms_are_transient() {
        let snapshot = nominal_snapshot();
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        let flameout = EventRecord {
            tick: 1,
            sequence: 0,
            event: Event::EngineFlameout { reason: crate::events::FlameoutReason::FuelDepleted },
        };
        assert_eq!(monitor.update(1, &snapshot, &[flameout]).level, SafetyLevel::Caution);
        assert_eq!(monitor.update(2, &snapshot, &[]).level, SafetyLevel::Normal);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut snapshot = nominal_snapshot();
        let mut monitor = SafetyMonitor::new(SafetyThresholds::default());
        for tick in 0..(MAX_ALARM_HISTORY as u64 + 5) {
            snapshot.power.blackout = tick % 2 == 0;
            monitor.update(tick, &snapshot, &[]);
        }
        assert_eq!(monitor.get_alarm_history().len(), MAX_ALARM_HISTORY);
    }
}
