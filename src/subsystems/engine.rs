use super::{BreakerId, ComponentId, FuelSystem, HeatSink, HydraulicSystem, LoopSide, PowerNetwork, ThermalLedger};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue, FlameoutReason};
use crate::protocol::CommandStatus;
use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_thrust_n: f64,
    /// Propellant mass flow at full throttle.
    pub max_flow_kg_s: f64,
    pub min_feed_pressure_bar: f64,
    pub idle_chamber_temp_k: f64,
    pub max_chamber_temp_k: f64,
    /// Chamber temperature above which the nozzle erodes.
    pub nozzle_limit_temp_k: f64,
    pub max_chamber_pressure_bar: f64,
    pub nozzle_erosion_per_s: f64,
    pub min_nozzle_efficiency: f64,
    pub gimbal_limit_deg: f64,
    pub gimbal_l_per_deg: f64,
    pub gimbal_loop: LoopSide,
    pub igniter_breaker: String,
    pub bell_heat_kw: f64,
    pub component: String,
    pub thrust_axis: DVec3,
    pub mount_position: DVec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub ignited: bool,
    pub throttle: f64,
    pub gimbal_deg: [f64; 2],
    pub chamber_temp_k: f64,
    pub chamber_pressure_bar: f64,
    pub nozzle_efficiency: f64,
    pub thrust_n: f64,
    pub thrust_vector_n: DVec3,
}

/// Main engine: ignition, throttle, gimballing and nozzle wear.
#[derive(Debug, Clone)]
pub struct MainEngine {
    config: EngineConfig,
    axis: DVec3,
    igniter: BreakerId,
    component: ComponentId,
    ignited: bool,
    throttle: f64,
    gimbal_deg: [f64; 2],
    chamber_temp_k: f64,
    chamber_pressure_bar: f64,
    nozzle_efficiency: f64,
    overheating: bool,
    thrust_vector_n: DVec3,
}

impl MainEngine {
    pub fn new(config: &EngineConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let Some(axis) = config.thrust_axis.try_normalize() else {
            return Err(ConfigError::InvalidValue {
                field: "engine.thrust_axis".to_string(),
                reason: "must be a non-zero vector",
            });
        };
        if config.max_chamber_temp_k < config.idle_chamber_temp_k {
            return Err(ConfigError::InvalidValue {
                field: "engine.max_chamber_temp_k".to_string(),
                reason: "must not be below idle_chamber_temp_k",
            });
        }
        Ok(Self {
            axis,
            igniter: resolver.breaker(&config.igniter_breaker, "main engine igniter")?,
            component: resolver.component(&config.component, "main engine")?,
            ignited: false,
            throttle: 0.0,
            gimbal_deg: [0.0; 2],
            chamber_temp_k: config.idle_chamber_temp_k,
            chamber_pressure_bar: 0.0,
            nozzle_efficiency: 1.0,
            overheating: false,
            thrust_vector_n: DVec3::ZERO,
            config: config.clone(),
        })
    }

    /// Ignition depends on feed pressure and a powered igniter; the thermal
    /// state of the engine plays no part.
    pub fn ignite(&mut self, fuel: &FuelSystem, power: &PowerNetwork, events: &mut EventQueue) -> CommandStatus {
        if self.ignited {
            return CommandStatus::Ignored("engine already ignited");
        }
        let line_pressure = fuel.engine_line_pressure_bar();
        if line_pressure < self.config.min_feed_pressure_bar {
            warn!(line_pressure_bar = line_pressure, "ignition refused: feed pressure low");
            return CommandStatus::Ignored("fuel line pressure below ignition minimum");
        }
        if !power.is_powered(self.igniter) {
            return CommandStatus::Ignored("igniter unpowered");
        }
        self.ignited = true;
        info!(line_pressure_bar = line_pressure, "main engine ignited");
        events.push(Event::EngineIgnited);
        CommandStatus::Accepted
    }

    pub fn shutdown(&mut self, events: &mut EventQueue) -> CommandStatus {
        if !self.ignited {
            return CommandStatus::Ignored("engine not ignited");
        }
        self.extinguish();
        info!("main engine shutdown");
        events.push(Event::EngineShutdown);
        CommandStatus::Accepted
    }

    pub fn set_throttle(&mut self, throttle: f64) -> CommandStatus {
        if !throttle.is_finite() {
            return CommandStatus::Ignored("throttle not finite");
        }
        self.throttle = throttle.clamp(0.0, 1.0);
        CommandStatus::Accepted
    }

    /// Moves the nozzle, spending hydraulic fluid in proportion to travel.
    /// The gimbal holds its position when the loop cannot actuate.
    pub fn set_gimbal(&mut self, x_deg: f64, y_deg: f64, hydraulics: &mut HydraulicSystem) -> CommandStatus {
        if !x_deg.is_finite() || !y_deg.is_finite() {
            return CommandStatus::Ignored("gimbal angle not finite");
        }
        let limit = self.config.gimbal_limit_deg;
        let target = [x_deg.clamp(-limit, limit), y_deg.clamp(-limit, limit)];
        let travel = (target[0] - self.gimbal_deg[0]).abs() + (target[1] - self.gimbal_deg[1]).abs();
        if !hydraulics.request_actuation(self.config.gimbal_loop, travel * self.config.gimbal_l_per_deg) {
            return CommandStatus::Ignored("hydraulic pressure too low to gimbal");
        }
        self.gimbal_deg = target;
        CommandStatus::Accepted
    }

    pub fn update(&mut self, dt_s: f64, fuel: &mut FuelSystem, thermal: &mut ThermalLedger, events: &mut EventQueue) {
        if !self.ignited {
            self.chamber_temp_k = self.config.idle_chamber_temp_k;
            self.chamber_pressure_bar = 0.0;
            self.thrust_vector_n = DVec3::ZERO;
            return;
        }

        if fuel.engine_line_pressure_bar() < self.config.min_feed_pressure_bar {
            self.flameout(FlameoutReason::FuelPressureLow, events);
            return;
        }
        let burn_kg = self.config.max_flow_kg_s * self.throttle * dt_s;
        if !fuel.draw_for_engine(burn_kg) {
            self.flameout(FlameoutReason::FuelDepleted, events);
            return;
        }

        let c = &self.config;
        self.chamber_temp_k = c.idle_chamber_temp_k + (c.max_chamber_temp_k - c.idle_chamber_temp_k) * self.throttle;
        self.chamber_pressure_bar = c.max_chamber_pressure_bar * self.throttle;

        if self.chamber_temp_k > c.nozzle_limit_temp_k {
            self.nozzle_efficiency = (self.nozzle_efficiency - c.nozzle_erosion_per_s * dt_s).max(c.min_nozzle_efficiency);
            if !self.overheating {
                warn!(chamber_temp_k = self.chamber_temp_k, "nozzle eroding");
                events.push(Event::EngineOverheat {
                    chamber_temp_k: self.chamber_temp_k,
                    nozzle_efficiency: self.nozzle_efficiency,
                });
            }
            self.overheating = true;
        } else {
            self.overheating = false;
        }

        let thrust_n = c.max_thrust_n * self.throttle * self.nozzle_efficiency;
        self.thrust_vector_n = self.thrust_direction() * thrust_n;
        thermal.add_heat(HeatSink::Component(self.component), c.bell_heat_kw * 1000.0 * self.throttle * dt_s);
    }

    fn thrust_direction(&self) -> DVec3 {
        let rotation = DQuat::from_rotation_y(self.gimbal_deg[0].to_radians())
            * DQuat::from_rotation_x(self.gimbal_deg[1].to_radians());
        rotation * self.axis
    }

    fn flameout(&mut self, reason: FlameoutReason, events: &mut EventQueue) {
        self.extinguish();
        error!(%reason, "main engine flameout");
        events.push(Event::EngineFlameout { reason });
    }

    fn extinguish(&mut self) {
        self.ignited = false;
        self.chamber_temp_k = self.config.idle_chamber_temp_k;
        self.chamber_pressure_bar = 0.0;
        self.thrust_vector_n = DVec3::ZERO;
        self.overheating = false;
    }

    pub fn is_ignited(&self) -> bool {
        self.ignited
    }

    pub fn nozzle_efficiency(&self) -> f64 {
        self.nozzle_efficiency
    }

    pub fn thrust_vector_n(&self) -> DVec3 {
        self.thrust_vector_n
    }

    /// Torque of the current thrust about the body origin.
    pub fn torque_nm(&self) -> DVec3 {
        self.config.mount_position.cross(self.thrust_vector_n)
    }

    pub fn gimbal_deg(&self) -> [f64; 2] {
        self.gimbal_deg
    }

    pub fn igniter_breaker(&self) -> BreakerId {
        self.igniter
    }

    pub fn get_state(&self) -> EngineState {
        EngineState {
            ignited: self.ignited,
            throttle: self.throttle,
            gimbal_deg: self.gimbal_deg,
            chamber_temp_k: self.chamber_temp_k,
            chamber_pressure_bar: self.chamber_pressure_bar,
            nozzle_efficiency: self.nozzle_efficiency,
            thrust_n: self.thrust_vector_n.length(),
            thrust_vector_n: self.thrust_vector_n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::subsystems::TankId;

    struct Rig {
        engine: MainEngine,
        fuel: FuelSystem,
        power: PowerNetwork,
        hydraulics: HydraulicSystem,
        thermal: ThermalLedger,
    }

    fn build_rig(config: &VesselConfig) -> Rig {
        let resolver = Resolver::new(config).unwrap();
        let thermal =
            ThermalLedger::new(&config.thermal, &config.atmosphere.thermal_nodes(), &resolver).unwrap();
        Rig {
            engine: MainEngine::new(&config.engine, &resolver).unwrap(),
            fuel: FuelSystem::new(&config.fuel, &thermal, &resolver).unwrap(),
            power: PowerNetwork::new(&config.power, &resolver).unwrap(),
            hydraulics: HydraulicSystem::new(&config.hydraulics, &resolver).unwrap(),
            thermal,
        }
    }

    #[test]
    fn test_ignition_refused_on_low_feed_pressure() {
        let mut config = VesselConfig::default();
        for tank in &mut config.fuel.tanks {
            tank.pressurant_kg = 0.0;
        }
        let mut rig = build_rig(&config);
        let mut events = EventQueue::new();
        assert_eq!(
            rig.engine.ignite(&rig.fuel, &rig.power, &mut events),
            CommandStatus::Ignored("fuel line pressure below ignition minimum")
        );
        assert!(!rig.engine.is_ignited());
        assert!(events.is_empty());
    }

    #[test]
    fn test_burn_consumes_fuel_and_produces_thrust() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        let mut events = EventQueue::new();
        assert_eq!(rig.engine.ignite(&rig.fuel, &rig.power, &mut events), CommandStatus::Accepted);
        rig.engine.set_throttle(0.5);
        let before = rig.fuel.total_fuel_kg();
        rig.engine.update(1.0, &mut rig.fuel, &mut rig.thermal, &mut events);
        let burned = before - rig.fuel.total_fuel_kg();
        assert!((burned - config.engine.max_flow_kg_s * 0.5).abs() < 1e-9);
        let thrust = rig.engine.thrust_vector_n();
        assert!((thrust.length() - config.engine.max_thrust_n * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_tank_flames_out_as_depleted() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        let mut events = EventQueue::new();
        rig.engine.ignite(&rig.fuel, &rig.power, &mut events);
        rig.engine.set_throttle(1.0);
        let main = rig.fuel.fuel_kg(TankId(0));
        assert!(rig.fuel.consume_fuel(TankId(0), main));
        rig.engine.update(0.1, &mut rig.fuel, &mut rig.thermal, &mut events);
        assert!(!rig.engine.is_ignited());
        assert!(events
            .iter()
            .any(|e| *e == Event::EngineFlameout { reason: FlameoutReason::FuelDepleted }));
    }

    #[test]
    fn test_overheat_erodes_nozzle_monotonically() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        let mut events = EventQueue::new();
        rig.engine.ignite(&rig.fuel, &rig.power, &mut events);
        rig.engine.set_throttle(1.0);
        let mut last = rig.engine.nozzle_efficiency();
        for _ in 0..50 {
            rig.engine.update(0.1, &mut rig.fuel, &mut rig.thermal, &mut events);
            let now = rig.engine.nozzle_efficiency();
            assert!(now <= last);
            last = now;
        }
        assert!(last < 1.0);
        assert!(last >= config.engine.min_nozzle_efficiency);
        rig.engine.set_throttle(0.2);
        rig.engine.update(0.1, &mut rig.fuel, &mut rig.thermal, &mut events);
        assert_eq!(rig.engine.nozzle_efficiency(), last);
    }

    #[test]
    fn test_gimbal_holds_without_hydraulics() {
        let mut config = VesselConfig::default();
        for lp in &mut config.hydraulics.loops {
            lp.initial_pressure_bar = 0.0;
        }
        let mut rig = build_rig(&config);
        assert!(matches!(rig.engine.set_gimbal(2.0, 1.0, &mut rig.hydraulics), CommandStatus::Ignored(_)));
        assert_eq!(rig.engine.gimbal_deg(), [0.0, 0.0]);

        let mut rig = build_rig(&VesselConfig::default());
        assert_eq!(rig.engine.set_gimbal(2.0, 100.0, &mut rig.hydraulics), CommandStatus::Accepted);
        assert_eq!(rig.engine.gimbal_deg(), [2.0, config.engine.gimbal_limit_deg]);
    }
}
