//! Vessel configuration and the name resolver built from it.
//!
//! [`VesselConfig::default`] describes the standard vessel used by the CLI and
//! the tests; any part of it can be overridden from JSON.

use crate::error::ConfigError;
use crate::fault_injection::FaultInjectionConfig;
use crate::physics::Gas;
use crate::scheduler::TickDivisors;
use crate::subsystems::atmosphere::{AtmosphereConfig, CompartmentConfig, CrewMetabolism, DoorConfig};
use crate::subsystems::coolant::{CoolantConfig, CoolantLoopConfig, HeatExchangerConfig, RadiatorConfig};
use crate::subsystems::engine::EngineConfig;
use crate::subsystems::fire::FireConfig;
use crate::subsystems::fuel::{FuelConfig, TankConfig};
use crate::subsystems::gas::{BottleConfig, GasConfig, RegulatorConfig};
use crate::subsystems::hydraulic::{HydraulicConfig, HydraulicLoopConfig};
use crate::subsystems::life_support::{LifeSupportConfig, UnitConfig};
use crate::subsystems::power::{BatteryConfig, BreakerConfig, BusConfig, CapacitorConfig, PowerConfig, ReactorConfig};
use crate::subsystems::rcs::{RcsConfig, ThrusterConfig};
use crate::subsystems::thermal::{CompartmentLinkConfig, ComponentConfig, ThermalConfig};
use crate::subsystems::{
    make_name, BottleId, BreakerId, BusSide, CompartmentId, ComponentId, LoopSide, Name, NameTable, TankId,
    ThrusterId, MAX_BREAKERS, MAX_COMPARTMENTS,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};

const STANDARD_TEMP_K: f64 = 293.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VesselConfig {
    pub tick_dt_s: f64,
    pub seed: u64,
    pub divisors: TickDivisors,
    pub thermal: ThermalConfig,
    pub power: PowerConfig,
    pub fuel: FuelConfig,
    pub hydraulics: HydraulicConfig,
    pub coolant: CoolantConfig,
    pub gas: GasConfig,
    pub engine: EngineConfig,
    pub rcs: RcsConfig,
    pub atmosphere: AtmosphereConfig,
    pub fault_injection: FaultInjectionConfig,
}

impl VesselConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks scalar limits and that every name reference resolves.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_dt_s > 0.0) || !self.tick_dt_s.is_finite() {
            return Err(ConfigError::InvalidValue {
                field: "tick_dt_s".to_string(),
                reason: "must be a positive finite number",
            });
        }
        self.divisors.validate()?;
        if self.power.breakers.len() > MAX_BREAKERS {
            return Err(ConfigError::TooMany {
                kind: "breakers",
                count: self.power.breakers.len(),
                limit: MAX_BREAKERS,
            });
        }
        if self.atmosphere.compartments.len() > MAX_COMPARTMENTS {
            return Err(ConfigError::TooMany {
                kind: "compartments",
                count: self.atmosphere.compartments.len(),
                limit: MAX_COMPARTMENTS,
            });
        }
        Resolver::new(self).map(|_| ())
    }
}

/// Name to index tables for every named entity kind.
#[derive(Debug, Clone)]
pub struct Resolver {
    components: NameTable,
    compartments: NameTable,
    breakers: NameTable,
    tanks: NameTable,
    bottles: NameTable,
    thrusters: NameTable,
}

fn table<'a>(kind: &'static str, names: impl Iterator<Item = &'a String>) -> Result<NameTable, ConfigError> {
    let names = names.map(|n| make_name(n)).collect::<Result<Vec<Name>, _>>()?;
    NameTable::build(kind, names.iter())
}

fn resolve(table: &NameTable, kind: &'static str, name: &str, referrer: &str) -> Result<u16, ConfigError> {
    table.lookup(name).ok_or_else(|| ConfigError::UnknownReference {
        kind,
        name: name.to_string(),
        referrer: referrer.to_string(),
    })
}

impl Resolver {
    pub fn new(config: &VesselConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            components: table("component", config.thermal.components.iter().map(|c| &c.name))?,
            compartments: table("compartment", config.atmosphere.compartments.iter().map(|c| &c.name))?,
            breakers: table("breaker", config.power.breakers.iter().map(|b| &b.name))?,
            tanks: table("tank", config.fuel.tanks.iter().map(|t| &t.name))?,
            bottles: table("bottle", config.gas.bottles.iter().map(|b| &b.name))?,
            thrusters: table("thruster", config.rcs.thrusters.iter().map(|t| &t.name))?,
        })
    }

    pub fn component(&self, name: &str, referrer: &str) -> Result<ComponentId, ConfigError> {
        resolve(&self.components, "component", name, referrer).map(ComponentId)
    }

    pub fn compartment(&self, name: &str, referrer: &str) -> Result<CompartmentId, ConfigError> {
        resolve(&self.compartments, "compartment", name, referrer).map(CompartmentId)
    }

    pub fn breaker(&self, name: &str, referrer: &str) -> Result<BreakerId, ConfigError> {
        resolve(&self.breakers, "breaker", name, referrer).map(BreakerId)
    }

    pub fn tank(&self, name: &str, referrer: &str) -> Result<TankId, ConfigError> {
        resolve(&self.tanks, "tank", name, referrer).map(TankId)
    }

    pub fn bottle(&self, name: &str, referrer: &str) -> Result<BottleId, ConfigError> {
        resolve(&self.bottles, "bottle", name, referrer).map(BottleId)
    }

    pub fn thruster(&self, name: &str, referrer: &str) -> Result<ThrusterId, ConfigError> {
        resolve(&self.thrusters, "thruster", name, referrer).map(ThrusterId)
    }

    pub fn find_breaker(&self, name: &str) -> Option<BreakerId> {
        self.breakers.lookup(name).map(BreakerId)
    }

    pub fn find_tank(&self, name: &str) -> Option<TankId> {
        self.tanks.lookup(name).map(TankId)
    }

    pub fn find_bottle(&self, name: &str) -> Option<BottleId> {
        self.bottles.lookup(name).map(BottleId)
    }

    pub fn find_compartment(&self, name: &str) -> Option<CompartmentId> {
        self.compartments.lookup(name).map(CompartmentId)
    }

    pub fn find_thruster(&self, name: &str) -> Option<ThrusterId> {
        self.thrusters.lookup(name).map(ThrusterId)
    }
}

fn component(name: &str, mass_kg: f64, specific_heat: f64, compartment: Option<&str>, link: f64) -> ComponentConfig {
    ComponentConfig {
        name: name.to_string(),
        mass_kg,
        specific_heat_j_per_kg_k: specific_heat,
        initial_temp_k: STANDARD_TEMP_K,
        compartment: compartment.map(str::to_string),
        link_conductance_w_per_k: link,
    }
}

fn breaker(name: &str, bus: BusSide, load_w: f64, essential: bool, heat: Option<&str>) -> BreakerConfig {
    BreakerConfig {
        name: name.to_string(),
        bus,
        load_w,
        essential,
        trip_threshold_a: 60.0,
        on: true,
        heat_component: heat.map(str::to_string),
    }
}

/// Sea-level air at 293 K scaled to `volume_m3`.
fn compartment(name: &str, volume_m3: f64, position: DVec3, heat_capacity: f64, crew: u32) -> CompartmentConfig {
    let scale = volume_m3 / 40.0;
    CompartmentConfig {
        name: name.to_string(),
        volume_m3,
        position,
        heat_capacity_j_per_k: heat_capacity,
        initial_temp_k: STANDARD_TEMP_K,
        o2_kg: 11.18 * scale,
        co2_kg: 0.029 * scale,
        n2_kg: 36.36 * scale,
        h2o_kg: 0.30 * scale,
        he_kg: 0.0,
        crew,
        vent_area_m2: 0.0,
        vent_direction: DVec3::ZERO,
    }
}

fn door(a: &str, b: &str, area_m2: f64, open: bool, hydraulic: Option<LoopSide>) -> DoorConfig {
    DoorConfig {
        a: a.to_string(),
        b: b.to_string(),
        area_m2,
        open,
        hydraulic,
    }
}

fn tank(name: &str, volume_m3: f64, capacity_kg: f64, fuel_kg: f64, pressurant_kg: f64, component: &str) -> TankConfig {
    TankConfig {
        name: name.to_string(),
        volume_m3,
        fuel_density_kg_m3: 1100.0,
        capacity_kg,
        fuel_kg,
        pressurant: Gas::He,
        pressurant_kg,
        min_pressure_bar: 5.0,
        component: component.to_string(),
        feed_to_engine: false,
        feed_to_rcs: false,
        crossfeed_to: None,
    }
}

fn hydraulic_loop(breaker: &str) -> HydraulicLoopConfig {
    HydraulicLoopConfig {
        max_volume_l: 50.0,
        fluid_volume_l: 45.0,
        accumulator_l: 10.0,
        target_pressure_bar: 210.0,
        min_pressure_bar: 150.0,
        initial_pressure_bar: 200.0,
        pump_flow_l_s: 0.5,
        pump_power_w: 3000.0,
        pump_on: true,
        pump_breaker: breaker.to_string(),
        idle_draw_l_s: 0.05,
    }
}

fn coolant_loop(breaker: &str, exchangers: &[(&str, f64)]) -> CoolantLoopConfig {
    CoolantLoopConfig {
        fluid_mass_kg: 120.0,
        nominal_mass_kg: 120.0,
        specific_heat_j_per_kg_k: 3500.0,
        initial_temp_k: STANDARD_TEMP_K,
        nominal_pressure_bar: 4.0,
        pump_on: true,
        pump_power_w: 2000.0,
        pump_breaker: breaker.to_string(),
        exchangers: exchangers
            .iter()
            .map(|(component, efficiency)| HeatExchangerConfig {
                component: component.to_string(),
                efficiency: *efficiency,
            })
            .collect(),
        radiators: vec![
            RadiatorConfig { area_m2: 40.0, emissivity: 0.9 },
            RadiatorConfig { area_m2: 40.0, emissivity: 0.9 },
        ],
        radiators_deployed: true,
    }
}

fn thruster(name: &str, position: [f64; 3], direction: [f64; 3]) -> ThrusterConfig {
    ThrusterConfig {
        name: name.to_string(),
        position: DVec3::from_array(position),
        direction: DVec3::from_array(direction),
        max_thrust_n: 450.0,
    }
}

fn unit(breaker: &str, rate_kg_s: f64, power_w: f64) -> UnitConfig {
    UnitConfig {
        breaker: breaker.to_string(),
        compartment: "habitat".to_string(),
        rate_kg_s,
        power_w,
        enabled: true,
    }
}

impl Default for VesselConfig {
    fn default() -> Self {
        let mut main = tank("main", 2.0, 1800.0, 1500.0, 3.0, "main_tank");
        main.feed_to_engine = true;
        let aux = tank("aux", 1.0, 900.0, 600.0, 1.5, "aux_tank");
        let mut rcs_tank = tank("rcs", 0.2, 150.0, 120.0, 0.3, "rcs_tank");
        rcs_tank.feed_to_rcs = true;

        let mut airlock = compartment("airlock", 8.0, DVec3::new(2.5, 0.0, 2.0), 5.0e4, 0);
        airlock.vent_area_m2 = 0.02;
        airlock.vent_direction = DVec3::X;

        Self {
            tick_dt_s: 0.1,
            seed: 42,
            divisors: TickDivisors::default(),
            thermal: ThermalConfig {
                components: vec![
                    component("reactor", 400.0, 500.0, Some("engineering"), 50.0),
                    component("avionics_bay", 150.0, 900.0, Some("command"), 30.0),
                    component("battery", 300.0, 1000.0, Some("engineering"), 20.0),
                    component("main_engine", 800.0, 500.0, None, 0.0),
                    component("main_tank", 200.0, 900.0, Some("engineering"), 10.0),
                    component("aux_tank", 150.0, 900.0, Some("engineering"), 10.0),
                    component("rcs_tank", 50.0, 900.0, Some("engineering"), 10.0),
                ],
                links: vec![
                    CompartmentLinkConfig { a: "command".into(), b: "habitat".into(), conductance_w_per_k: 200.0 },
                    CompartmentLinkConfig { a: "habitat".into(), b: "engineering".into(), conductance_w_per_k: 150.0 },
                    CompartmentLinkConfig { a: "habitat".into(), b: "airlock".into(), conductance_w_per_k: 50.0 },
                ],
            },
            power: PowerConfig {
                reactor: ReactorConfig {
                    max_output_kw: 800.0,
                    efficiency: 0.25,
                    scram_temp_k: 850.0,
                    reset_temp_k: 600.0,
                    startup_s: 5.0,
                    startup_heat_kw: 200.0,
                    fuel_fraction: 1.0,
                    burnup_per_kwh: 1.0e-6,
                    component: "reactor".into(),
                },
                buses: [
                    BusConfig { nominal_voltage_v: 120.0, capacity_kw: 40.0, crosstie_enabled: false },
                    BusConfig { nominal_voltage_v: 120.0, capacity_kw: 40.0, crosstie_enabled: false },
                ],
                breakers: vec![
                    breaker("avionics", BusSide::A, 1500.0, true, Some("avionics_bay")),
                    breaker("o2_generator", BusSide::A, 1200.0, true, None),
                    breaker("co2_scrubber", BusSide::B, 400.0, false, None),
                    breaker("water_recycler", BusSide::B, 300.0, false, None),
                    breaker("hydraulic_pump_a", BusSide::A, 3000.0, false, None),
                    breaker("hydraulic_pump_b", BusSide::B, 3000.0, false, None),
                    breaker("coolant_pump_a", BusSide::A, 2000.0, false, None),
                    breaker("coolant_pump_b", BusSide::B, 2000.0, false, None),
                    breaker("engine_igniter", BusSide::A, 500.0, false, Some("main_engine")),
                    breaker("rcs_drivers", BusSide::B, 800.0, false, None),
                    breaker("lighting", BusSide::B, 600.0, false, None),
                ],
                battery: BatteryConfig {
                    capacity_kwh: 50.0,
                    charge_kwh: 40.0,
                    max_charge_kw: 20.0,
                    max_discharge_kw: 30.0,
                    efficiency: 0.95,
                    component: Some("battery".into()),
                },
                capacitor: CapacitorConfig {
                    capacity_kj: 500.0,
                    charge_kj: 250.0,
                    max_rate_kw: 50.0,
                },
            },
            fuel: FuelConfig {
                tanks: vec![main, aux, rcs_tank],
                crossfeed_rate_kg_s: 5.0,
                vent_rate_kg_s: 0.01,
            },
            hydraulics: HydraulicConfig {
                loops: [hydraulic_loop("hydraulic_pump_a"), hydraulic_loop("hydraulic_pump_b")],
                cross_connect_open: false,
            },
            coolant: CoolantConfig {
                loops: [
                    coolant_loop("coolant_pump_a", &[("reactor", 0.5), ("battery", 0.5), ("avionics_bay", 0.5)]),
                    coolant_loop("coolant_pump_b", &[("reactor", 0.4), ("main_engine", 0.6)]),
                ],
                cross_connect_open: false,
                boil_temp_k: 390.0,
                boil_pressure_bar: 2.0,
                boil_off_kg_s: 0.5,
            },
            gas: GasConfig {
                bottles: vec![
                    BottleConfig {
                        name: "o2_reserve".into(),
                        gas: Gas::O2,
                        volume_m3: 0.05,
                        mass_kg: 12.0,
                        max_pressure_bar: 250.0,
                        compartment: "engineering".into(),
                        regulator: Some(RegulatorConfig { setpoint_kpa: 95.0, flow_kg_s: 0.01, open: false }),
                    },
                    BottleConfig {
                        name: "n2_reserve".into(),
                        gas: Gas::N2,
                        volume_m3: 0.05,
                        mass_kg: 10.0,
                        max_pressure_bar: 250.0,
                        compartment: "engineering".into(),
                        regulator: Some(RegulatorConfig { setpoint_kpa: 95.0, flow_kg_s: 0.02, open: false }),
                    },
                    BottleConfig {
                        name: "he_pressurant".into(),
                        gas: Gas::He,
                        volume_m3: 0.03,
                        mass_kg: 1.0,
                        max_pressure_bar: 300.0,
                        compartment: "engineering".into(),
                        regulator: None,
                    },
                ],
                warning_fraction: 0.95,
            },
            engine: EngineConfig {
                max_thrust_n: 40_000.0,
                max_flow_kg_s: 13.0,
                min_feed_pressure_bar: 5.0,
                idle_chamber_temp_k: 300.0,
                max_chamber_temp_k: 3600.0,
                nozzle_limit_temp_k: 3400.0,
                max_chamber_pressure_bar: 20.0,
                nozzle_erosion_per_s: 0.002,
                min_nozzle_efficiency: 0.6,
                gimbal_limit_deg: 6.0,
                gimbal_l_per_deg: 0.05,
                gimbal_loop: LoopSide::A,
                igniter_breaker: "engine_igniter".into(),
                bell_heat_kw: 50.0,
                component: "main_engine".into(),
                thrust_axis: DVec3::Z,
                mount_position: DVec3::new(0.0, 0.0, -6.0),
            },
            rcs: RcsConfig {
                driver_breaker: "rcs_drivers".into(),
                flow_kg_s: 0.05,
                heating_k_s: 2.0,
                cooling_per_s: 0.05,
                ambient_temp_k: 290.0,
                overtemp_k: 600.0,
                health_decay_per_s: 0.0005,
                thrusters: vec![
                    thruster("nose_port", [-1.2, 0.0, 5.5], [1.0, 0.0, 0.0]),
                    thruster("nose_stbd", [1.2, 0.0, 5.5], [-1.0, 0.0, 0.0]),
                    thruster("nose_dorsal", [0.0, 1.2, 5.5], [0.0, -1.0, 0.0]),
                    thruster("nose_ventral", [0.0, -1.2, 5.5], [0.0, 1.0, 0.0]),
                    thruster("tail_port", [-1.2, 0.0, -5.5], [1.0, 0.0, 0.0]),
                    thruster("tail_stbd", [1.2, 0.0, -5.5], [-1.0, 0.0, 0.0]),
                    thruster("tail_dorsal", [0.0, 1.2, -5.5], [0.0, -1.0, 0.0]),
                    thruster("tail_ventral", [0.0, -1.2, -5.5], [0.0, 1.0, 0.0]),
                ],
            },
            atmosphere: AtmosphereConfig {
                compartments: vec![
                    compartment("command", 40.0, DVec3::new(0.0, 0.0, 6.0), 2.0e5, 2),
                    compartment("habitat", 60.0, DVec3::new(0.0, 0.0, 2.0), 3.0e5, 2),
                    compartment("engineering", 50.0, DVec3::new(0.0, 0.0, -3.0), 2.5e5, 0),
                    airlock,
                ],
                doors: vec![
                    door("command", "habitat", 1.2, true, None),
                    door("habitat", "engineering", 1.0, true, Some(LoopSide::B)),
                    door("habitat", "airlock", 0.8, false, Some(LoopSide::A)),
                ],
                discharge_coefficient: 0.6,
                mixing_cap_fraction: 0.1,
                vent_cap_fraction: 0.25,
                exhaust_velocity_m_s: 300.0,
                depressurized_mass_kg: 0.1,
                repressurized_kpa: 50.0,
                door_actuation_l: 0.2,
                crew: CrewMetabolism {
                    o2_kg_s: 9.7e-6,
                    co2_kg_s: 1.16e-5,
                    h2o_kg_s: 2.3e-5,
                    heat_w: 100.0,
                },
                life_support: LifeSupportConfig {
                    water_kg: 50.0,
                    water_per_kg_o2: 1.125,
                    scrubber_capacity_kg: 20.0,
                    recycler_recovery: 0.9,
                    oxygen_generator: unit("o2_generator", 4.0e-5, 1200.0),
                    co2_scrubber: unit("co2_scrubber", 5.0e-5, 400.0),
                    water_recycler: unit("water_recycler", 5.0e-5, 300.0),
                },
                fire: FireConfig {
                    ignition_o2_fraction: 0.16,
                    sustain_o2_fraction: 0.14,
                    initial_intensity: 0.05,
                    extinguish_intensity: 0.02,
                    growth_per_s: 0.05,
                    decay_per_s: 0.1,
                    o2_burn_kg_s: 0.01,
                    heat_w: 60_000.0,
                    spread_temp_k: 313.0,
                    spread_chance_per_s: 0.05,
                    autoignition_temp_k: 573.0,
                    halon_charges: 3,
                    water_charges: 5,
                    co2_charges: 2,
                    water_steam_kg: 2.0,
                },
            },
            fault_injection: FaultInjectionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = VesselConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rcs.thrusters.len(), 8);
        assert_eq!(config.atmosphere.compartments.len(), 4);
    }

    #[test]
    fn test_json_round_trip_preserves_vessel() {
        let config = VesselConfig::default();
        let json = config.to_json_pretty().unwrap();
        let parsed = VesselConfig::from_json(&json).unwrap();
        assert_eq!(parsed.power.breakers.len(), config.power.breakers.len());
        assert_eq!(parsed.engine.thrust_axis, DVec3::Z);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let parsed = VesselConfig::from_json(r#"{ "seed": 7, "tick_dt_s": 0.05 }"#).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.fuel.tanks.len(), 3);
    }

    #[test]
    fn test_unknown_reference_is_reported() {
        let mut config = VesselConfig::default();
        config.fuel.tanks[0].component = "nowhere".into();
        let err = FuelSystemHarness::build(&config).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownReference { kind: "component", .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = VesselConfig::default();
        config.power.breakers[1].name = "avionics".into();
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateName { kind: "breaker", .. })));
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = VesselConfig::default();
        config.tick_dt_s = 0.0;
        assert!(config.validate().is_err());
    }

    struct FuelSystemHarness;

    impl FuelSystemHarness {
        fn build(config: &VesselConfig) -> Result<(), ConfigError> {
            let resolver = Resolver::new(config)?;
            resolver.component(&config.fuel.tanks[0].component, &config.fuel.tanks[0].name)?;
            Ok(())
        }
    }
}
