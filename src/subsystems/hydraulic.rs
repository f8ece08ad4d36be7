use super::{BreakerId, LoopSide, PowerNetwork};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::protocol::CommandStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Below this fraction of its reservoir a pump cavitates and delivers nothing.
const PUMP_CAVITATION_FRACTION: f64 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraulicLoopConfig {
    pub max_volume_l: f64,
    pub fluid_volume_l: f64,
    pub accumulator_l: f64,
    pub target_pressure_bar: f64,
    pub min_pressure_bar: f64,
    pub initial_pressure_bar: f64,
    pub pump_flow_l_s: f64,
    pub pump_power_w: f64,
    pub pump_on: bool,
    pub pump_breaker: String,
    /// Continuous draw of servos holding position.
    pub idle_draw_l_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraulicConfig {
    pub loops: [HydraulicLoopConfig; 2],
    pub cross_connect_open: bool,
}

#[derive(Debug, Clone)]
struct HydraulicLoop {
    fluid_volume_l: f64,
    max_volume_l: f64,
    accumulator_l: f64,
    pressure_bar: f64,
    target_pressure_bar: f64,
    min_pressure_bar: f64,
    pump_on: bool,
    pump_running: bool,
    pump_flow_l_s: f64,
    pump_power_w: f64,
    breaker: BreakerId,
    idle_draw_l_s: f64,
    leak_rate_l_s: f64,
    pending_draw_l: f64,
    pressure_low: bool,
}

impl HydraulicLoop {
    fn from_config(config: &HydraulicLoopConfig, resolver: &Resolver, side: LoopSide) -> Result<Self, ConfigError> {
        if config.max_volume_l <= 0.0 || config.target_pressure_bar <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: format!("hydraulics.loops[{}]", side.index()),
                reason: "volume and target pressure must be positive",
            });
        }
        Ok(Self {
            fluid_volume_l: config.fluid_volume_l.clamp(0.0, config.max_volume_l),
            max_volume_l: config.max_volume_l,
            accumulator_l: config.accumulator_l.max(0.0),
            pressure_bar: config.initial_pressure_bar.clamp(0.0, config.target_pressure_bar),
            target_pressure_bar: config.target_pressure_bar,
            min_pressure_bar: config.min_pressure_bar,
            pump_on: config.pump_on,
            pump_running: false,
            pump_flow_l_s: config.pump_flow_l_s,
            pump_power_w: config.pump_power_w,
            breaker: resolver.breaker(&config.pump_breaker, "hydraulic pump")?,
            idle_draw_l_s: config.idle_draw_l_s,
            leak_rate_l_s: 0.0,
            pending_draw_l: 0.0,
            pressure_low: false,
        })
    }

    /// Pressure change per litre moved into or out of the accumulator.
    fn stiffness_bar_per_l(&self) -> f64 {
        self.target_pressure_bar / (self.max_volume_l + self.accumulator_l)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraulicLoopState {
    pub side: LoopSide,
    pub pressure_bar: f64,
    pub fluid_volume_l: f64,
    pub pump_on: bool,
    pub pump_running: bool,
    pub leak_rate_l_s: f64,
}

/// Twin hydraulic loops with an optional cross-connect.
#[derive(Debug, Clone)]
pub struct HydraulicSystem {
    loops: [HydraulicLoop; 2],
    cross_connect_open: bool,
}

impl HydraulicSystem {
    pub fn new(config: &HydraulicConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let mut system = Self {
            loops: [
                HydraulicLoop::from_config(&config.loops[0], resolver, LoopSide::A)?,
                HydraulicLoop::from_config(&config.loops[1], resolver, LoopSide::B)?,
            ],
            cross_connect_open: false,
        };
        if config.cross_connect_open {
            system.set_cross_connect(true);
        }
        Ok(system)
    }

    pub fn update(&mut self, dt_s: f64, power: &PowerNetwork, events: &mut EventQueue) {
        for side in LoopSide::BOTH {
            let lp = &mut self.loops[side.index()];
            let availability = power.availability(lp.breaker);
            lp.pump_running = lp.pump_on
                && availability > 0.0
                && lp.fluid_volume_l >= PUMP_CAVITATION_FRACTION * lp.max_volume_l;

            let leaked = (lp.leak_rate_l_s * dt_s).min(lp.fluid_volume_l);
            lp.fluid_volume_l -= leaked;

            let stiffness = lp.stiffness_bar_per_l();
            let rise = if lp.pump_running {
                lp.pump_flow_l_s * availability * dt_s * stiffness
            } else {
                0.0
            };
            let drop = (lp.idle_draw_l_s * dt_s + lp.pending_draw_l + leaked) * stiffness;
            lp.pending_draw_l = 0.0;

            lp.pressure_bar = if lp.fluid_volume_l <= 0.0 {
                0.0
            } else {
                (lp.pressure_bar + rise - drop).clamp(0.0, lp.target_pressure_bar)
            };

            let low = lp.pressure_bar < lp.min_pressure_bar;
            if low && !lp.pressure_low {
                warn!(%side, pressure_bar = lp.pressure_bar, "hydraulic pressure low");
                events.push(Event::HydraulicPressureLow {
                    side,
                    pressure_bar: lp.pressure_bar,
                });
            }
            lp.pressure_low = low;
        }

        if self.cross_connect_open {
            self.equalize();
        }
    }

    fn equalize(&mut self) {
        let [a, b] = &mut self.loops;
        let volume = (a.fluid_volume_l + b.fluid_volume_l) / 2.0;
        let pressure = (a.pressure_bar + b.pressure_bar) / 2.0;
        for lp in [a, b] {
            lp.fluid_volume_l = volume.min(lp.max_volume_l);
            lp.pressure_bar = pressure;
        }
    }

    /// Pump demand in watts per loop, for the power network.
    pub fn power_demands(&self) -> [(BreakerId, f64); 2] {
        let demand = |lp: &HydraulicLoop| (lp.breaker, if lp.pump_on { lp.pump_power_w } else { 0.0 });
        [demand(&self.loops[0]), demand(&self.loops[1])]
    }

    pub fn can_actuate(&self, side: LoopSide) -> bool {
        let lp = &self.loops[side.index()];
        lp.pressure_bar >= lp.min_pressure_bar
    }

    /// Reserves `volume_l` of fluid for an actuator stroke. The pressure drop
    /// lands on the next update.
    pub fn request_actuation(&mut self, side: LoopSide, volume_l: f64) -> bool {
        if !self.can_actuate(side) || !(volume_l >= 0.0) {
            debug!(%side, volume_l, "actuation refused");
            return false;
        }
        self.loops[side.index()].pending_draw_l += volume_l;
        true
    }

    pub fn set_pump(&mut self, side: LoopSide, on: bool) -> CommandStatus {
        self.loops[side.index()].pump_on = on;
        CommandStatus::Accepted
    }

    /// Opening the cross-connect averages both loops immediately.
    pub fn set_cross_connect(&mut self, open: bool) -> CommandStatus {
        if open && !self.cross_connect_open {
            self.equalize();
        }
        self.cross_connect_open = open;
        CommandStatus::Accepted
    }

    pub fn set_leak(&mut self, side: LoopSide, rate_l_s: f64) {
        self.loops[side.index()].leak_rate_l_s = rate_l_s.max(0.0);
    }

    pub fn pressure_bar(&self, side: LoopSide) -> f64 {
        self.loops[side.index()].pressure_bar
    }

    pub fn fluid_volume_l(&self, side: LoopSide) -> f64 {
        self.loops[side.index()].fluid_volume_l
    }

    pub fn min_pressure_bar(&self, side: LoopSide) -> f64 {
        self.loops[side.index()].min_pressure_bar
    }

    pub fn cross_connect_open(&self) -> bool {
        self.cross_connect_open
    }

    pub fn get_state(&self) -> Vec<HydraulicLoopState> {
        LoopSide::BOTH
            .iter()
            .map(|&side| {
                let lp = &self.loops[side.index()];
                HydraulicLoopState {
                    side,
                    pressure_bar: lp.pressure_bar,
                    fluid_volume_l: lp.fluid_volume_l,
                    pump_on: lp.pump_on,
                    pump_running: lp.pump_running,
                    leak_rate_l_s: lp.leak_rate_l_s,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::subsystems::ThermalLedger;

    fn setup(config: &VesselConfig) -> (HydraulicSystem, PowerNetwork, ThermalLedger) {
        let resolver = Resolver::new(config).unwrap();
        let thermal =
            ThermalLedger::new(&config.thermal, &config.atmosphere.thermal_nodes(), &resolver).unwrap();
        let power = PowerNetwork::new(&config.power, &resolver).unwrap();
        (HydraulicSystem::new(&config.hydraulics, &resolver).unwrap(), power, thermal)
    }

    #[test]
    fn test_cross_connect_averages_immediately() {
        let mut config = VesselConfig::default();
        config.hydraulics.loops[0].initial_pressure_bar = 200.0;
        config.hydraulics.loops[0].fluid_volume_l = 40.0;
        config.hydraulics.loops[1].initial_pressure_bar = 0.0;
        config.hydraulics.loops[1].fluid_volume_l = 20.0;
        let (mut hydraulics, _, _) = setup(&config);
        hydraulics.set_cross_connect(true);
        assert!((hydraulics.pressure_bar(LoopSide::A) - 100.0).abs() < 1e-9);
        assert!((hydraulics.pressure_bar(LoopSide::B) - 100.0).abs() < 1e-9);
        assert!((hydraulics.fluid_volume_l(LoopSide::A) - 30.0).abs() < 1e-9);
        assert!((hydraulics.fluid_volume_l(LoopSide::B) - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_actuation_refused_below_minimum() {
        let mut config = VesselConfig::default();
        config.hydraulics.loops[1].initial_pressure_bar = 0.0;
        let (mut hydraulics, _, _) = setup(&config);
        assert!(!hydraulics.can_actuate(LoopSide::B));
        assert!(!hydraulics.request_actuation(LoopSide::B, 0.1));
        assert!(hydraulics.request_actuation(LoopSide::A, 0.1));
    }

    #[test]
    fn test_leak_drains_fluid_and_pressure() {
        let config = VesselConfig::default();
        let (mut hydraulics, power, _) = setup(&config);
        let mut events = EventQueue::new();
        hydraulics.set_pump(LoopSide::A, false);
        hydraulics.set_leak(LoopSide::A, 1.0);
        let volume = hydraulics.fluid_volume_l(LoopSide::A);
        for _ in 0..600 {
            hydraulics.update(0.1, &power, &mut events);
        }
        assert!(hydraulics.fluid_volume_l(LoopSide::A) < volume);
        assert!(!hydraulics.can_actuate(LoopSide::A));
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::HydraulicPressureLow { side: LoopSide::A, .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_pump_requires_power() {
        let mut config = VesselConfig::default();
        config.hydraulics.loops[0].initial_pressure_bar = 50.0;
        let (mut hydraulics, mut power, _) = setup(&config);
        let mut events = EventQueue::new();
        let breaker = hydraulics.power_demands()[0].0;
        power.set_breaker(breaker, false);
        hydraulics.update(1.0, &power, &mut events);
        assert!(hydraulics.pressure_bar(LoopSide::A) <= 50.0);
    }
}
