//! Read-only snapshot of every subsystem, produced once per tick.

use crate::safety::{SafetyLevel, SafetyState};
use crate::subsystems::atmosphere::{CompartmentState, DoorState};
use crate::subsystems::coolant::CoolantLoopState;
use crate::subsystems::engine::EngineState;
use crate::subsystems::fire::{FireState, SuppressionAgent};
use crate::subsystems::fuel::TankState;
use crate::subsystems::gas::BottleState;
use crate::subsystems::hydraulic::HydraulicLoopState;
use crate::subsystems::life_support::LifeSupportState;
use crate::subsystems::power::PowerState;
use crate::subsystems::rcs::ThrusterState;
use crate::subsystems::thermal::ComponentThermalState;
use core::fmt::Write;
use glam::DVec3;
use heapless::Deque;
use serde::{Deserialize, Serialize};

const TELEMETRY_HISTORY_SIZE: usize = 16;
pub const CSV_LINE_CAPACITY: usize = 512;

/// Net propulsive output of the main engine and RCS for the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PropulsionOutput {
    pub force_n: DVec3,
    pub torque_nm: DVec3,
    /// Venting, breach and rupture momentum delivered during the tick.
    pub impulse_ns: DVec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub tick: u64,
    pub time_s: f64,
    pub thermal: Vec<ComponentThermalState>,
    pub power: PowerState,
    pub fuel: Vec<TankState>,
    pub hydraulics: Vec<HydraulicLoopState>,
    pub coolant: Vec<CoolantLoopState>,
    pub gas: Vec<BottleState>,
    pub engine: EngineState,
    pub rcs: Vec<ThrusterState>,
    pub propulsion: PropulsionOutput,
    pub compartments: Vec<CompartmentState>,
    pub doors: Vec<DoorState>,
    pub fires: Vec<FireState>,
    pub suppression: Vec<(SuppressionAgent, u32)>,
    pub life_support: LifeSupportState,
    pub safety: SafetyState,
}

impl TelemetrySnapshot {
    pub fn component(&self, name: &str) -> Option<&ComponentThermalState> {
        self.thermal.iter().find(|c| c.name.as_str() == name)
    }

    pub fn compartment(&self, name: &str) -> Option<&CompartmentState> {
        self.compartments.iter().find(|c| c.name.as_str() == name)
    }

    pub fn tank(&self, name: &str) -> Option<&TankState> {
        self.fuel.iter().find(|t| t.name.as_str() == name)
    }

    /// Lowest O2 partial pressure across crewed compartments.
    pub fn min_crew_o2_kpa(&self) -> Option<f64> {
        self.compartments
            .iter()
            .filter(|c| c.crew > 0)
            .map(|c| c.pressure_kpa * c.o2_percent / 100.0)
            .reduce(f64::min)
    }

    pub fn max_co2_percent(&self) -> f64 {
        self.compartments.iter().map(|c| c.co2_percent).fold(0.0, f64::max)
    }
}

pub fn csv_headers() -> &'static str {
    "tick,time_s,reactor_status,reactor_kw,reactor_temp_k,battery_pct,load_kw,blackout,\
     fuel_kg,engine_thrust_n,nozzle_eff,hyd_a_bar,hyd_b_bar,coolant_a_k,coolant_b_k,\
     min_o2_kpa,max_co2_pct,fires,alarm_level"
}

pub fn export_snapshot_csv(
    snapshot: &TelemetrySnapshot,
) -> Result<heapless::String<CSV_LINE_CAPACITY>, core::fmt::Error> {
    let mut line = heapless::String::new();
    let loop_value = |values: &[f64], index: usize| values.get(index).copied().unwrap_or(0.0);
    let hydraulic: Vec<f64> = snapshot.hydraulics.iter().map(|l| l.pressure_bar).collect();
    let coolant: Vec<f64> = snapshot.coolant.iter().map(|l| l.temperature_k).collect();
    let fuel_kg: f64 = snapshot.fuel.iter().map(|t| t.fuel_kg).sum();

    write!(
        line,
        "{},{:.2},{:?},{:.1},{:.1},{:.1},{:.2},{},{:.2},{:.1},{:.3},{:.1},{:.1},{:.1},{:.1},{:.2},{:.3},{},{:?}",
        snapshot.tick,
        snapshot.time_s,
        snapshot.power.reactor.status,
        snapshot.power.reactor.output_kw,
        snapshot.power.reactor.temperature_k,
        snapshot.power.storage.battery_percent,
        snapshot.power.total_load_kw,
        snapshot.power.blackout,
        fuel_kg,
        snapshot.engine.thrust_n,
        snapshot.engine.nozzle_efficiency,
        loop_value(&hydraulic, 0),
        loop_value(&hydraulic, 1),
        loop_value(&coolant, 0),
        loop_value(&coolant, 1),
        snapshot.min_crew_o2_kpa().unwrap_or(0.0),
        snapshot.max_co2_percent(),
        snapshot.fires.len(),
        snapshot.safety.level,
    )?;
    Ok(line)
}

/// Keeps the most recent snapshots, emitting one every `every_ticks` ticks.
#[derive(Debug)]
pub struct TelemetryCollector {
    every_ticks: u64,
    history: Deque<TelemetrySnapshot, TELEMETRY_HISTORY_SIZE>,
    snapshots_taken: u64,
}

impl TelemetryCollector {
    pub fn new(every_ticks: u64) -> Self {
        Self {
            every_ticks: every_ticks.max(1),
            history: Deque::new(),
            snapshots_taken: 0,
        }
    }

    pub fn should_collect(&self, tick: u64) -> bool {
        tick % self.every_ticks == 0
    }

    pub fn record(&mut self, snapshot: TelemetrySnapshot) {
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(snapshot);
        self.snapshots_taken += 1;
    }

    pub fn latest(&self) -> Option<&TelemetrySnapshot> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &TelemetrySnapshot> {
        self.history.iter()
    }

    pub fn snapshots_taken(&self) -> u64 {
        self.snapshots_taken
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn alarm_level(&self) -> SafetyLevel {
        self.latest().map_or(SafetyLevel::Normal, |s| s.safety.level)
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::vessel::Vessel;

    fn snapshot() -> TelemetrySnapshot {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.step();
        vessel.telemetry().clone()
    }

    #[test]
    fn test_snapshot_lookups() {
        let snapshot = snapshot();
        assert!(snapshot.compartment("habitat").is_some());
        assert!(snapshot.tank("main").is_some());
        assert!(snapshot.component("reactor").is_some());
        let o2 = snapshot.min_crew_o2_kpa().unwrap();
        assert!(o2 > 19.0 && o2 < 23.0, "o2 partial pressure {}", o2);
    }

    #[test]
    fn test_csv_line_matches_headers() {
        let snapshot = snapshot();
        let line = export_snapshot_csv(&snapshot).unwrap();
        assert_eq!(line.split(',').count(), csv_headers().split(',').count());
        assert!(line.starts_with("1,"));
    }

    #[test]
    fn test_collector_history_is_bounded() {
        let snapshot = snapshot();
        let mut collector = TelemetryCollector::new(5);
        assert!(collector.should_collect(10));
        assert!(!collector.should_collect(11));
        for _ in 0..TELEMETRY_HISTORY_SIZE + 4 {
            collector.record(snapshot.clone());
        }
        assert_eq!(collector.history().count(), TELEMETRY_HISTORY_SIZE);
        assert_eq!(collector.snapshots_taken(), TELEMETRY_HISTORY_SIZE as u64 + 4);
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let json = serde_json::to_string(&snapshot()).unwrap();
        assert!(json.contains("\"compartments\""));
        assert!(json.contains("\"propulsion\""));
    }
}
