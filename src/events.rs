//! Typed simulation events and the per-tick queue that carries them.
//!
//! Subsystems append to the queue during their update; the vessel drains it
//! once the tick is complete. Delivery order is emission order.

use crate::fault_injection::{Damage, RepairTarget};
use crate::physics::Gas;
use crate::subsystems::{BottleId, BreakerId, BusSide, CompartmentId, LoopSide, TankId, ThrusterId};
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const MAX_EVENTS_PER_TICK: usize = 256;
const MAX_EVENT_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlameoutReason {
    FuelDepleted,
    FuelPressureLow,
}

impl FlameoutReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            FlameoutReason::FuelDepleted => "fuel_depleted",
            FlameoutReason::FuelPressureLow => "fuel_pressure_low",
        }
    }
}

impl core::fmt::Display for FlameoutReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeSupportUnit {
    OxygenGenerator,
    Co2Scrubber,
    WaterRecycler,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReactorStartupBegun,
    ReactorOnline,
    ReactorStartupAborted { temperature_k: f64 },
    ReactorScram { temperature_k: f64, manual: bool },
    ReactorReset,
    ReactorFuelDepleted,
    BreakerTripped { breaker: BreakerId, current_a: f64 },
    BusOverload { bus: BusSide, load_kw: f64 },
    Blackout,
    PowerRestored,
    FuelPressureLow { tank: TankId, pressure_bar: f64 },
    HydraulicPressureLow { side: LoopSide, pressure_bar: f64 },
    CoolantBoiling { side: LoopSide },
    CoolantDepleted { side: LoopSide },
    GasBottleOverpressure { bottle: BottleId, pressure_bar: f64 },
    GasBottleRuptured { bottle: BottleId, gas: Gas },
    EngineIgnited,
    EngineShutdown,
    EngineFlameout { reason: FlameoutReason },
    EngineOverheat { chamber_temp_k: f64, nozzle_efficiency: f64 },
    ThrusterOverheat { thruster: ThrusterId },
    ThrusterFuelStarved { thruster: ThrusterId },
    FireStarted { compartment: CompartmentId, spread_from: Option<CompartmentId> },
    FireExtinguished { compartment: CompartmentId },
    HullBreach { compartment: CompartmentId, area_m2: f64 },
    CompartmentDepressurized { compartment: CompartmentId },
    CompartmentRepressurized { compartment: CompartmentId },
    LifeSupportInactive { unit: LifeSupportUnit },
    DamageInjected { damage: Damage },
    RepairCompleted { target: RepairTarget },
}

impl Event {
    /// Events that end a component's usefulness for the rest of the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::GasBottleRuptured { .. } | Event::EngineOverheat { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub tick: u64,
    pub sequence: u32,
    pub event: Event,
}

/// Ordered, bounded queue of events for one tick.
#[derive(Debug)]
pub struct EventQueue {
    tick: u64,
    next_sequence: u32,
    records: Vec<EventRecord, MAX_EVENTS_PER_TICK>,
    dropped: u32,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            tick: 0,
            next_sequence: 0,
            records: Vec::new(),
            dropped: 0,
        }
    }

    /// Stamps subsequent events with `tick`. Events raised by commands between
    /// ticks stay queued and are delivered with the next drain.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    pub fn push(&mut self, event: Event) {
        let record = EventRecord {
            tick: self.tick,
            sequence: self.next_sequence,
            event,
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        if self.records.push(record).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            warn!(tick = self.tick, "event queue full, dropping {:?}", event);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.records.iter().map(|r| &r.event)
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn drain(&mut self) -> alloc::vec::Vec<EventRecord> {
        let drained = self.records.iter().copied().collect();
        self.records.clear();
        self.next_sequence = 0;
        drained
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling history of the most recent events across ticks.
#[derive(Debug, Default)]
pub struct EventHistory {
    records: Vec<EventRecord, MAX_EVENT_HISTORY>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self { records: Vec::new() }
    }

    pub fn record(&mut self, record: EventRecord) {
        if self.records.is_full() {
            self.records.remove(0);
        }
        let _ = self.records.push(record);
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
