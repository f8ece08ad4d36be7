use super::{make_name, BreakerId, FuelSystem, Name, PowerNetwork, ThrusterId};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::protocol::CommandStatus;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrusterConfig {
    pub name: String,
    pub position: DVec3,
    /// Direction of the force on the vessel.
    pub direction: DVec3,
    pub max_thrust_n: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RcsConfig {
    pub driver_breaker: String,
    pub flow_kg_s: f64,
    pub heating_k_s: f64,
    /// Fraction of the excess over ambient shed per second while idle.
    pub cooling_per_s: f64,
    pub ambient_temp_k: f64,
    pub overtemp_k: f64,
    pub health_decay_per_s: f64,
    pub thrusters: Vec<ThrusterConfig>,
}

#[derive(Debug, Clone)]
struct Thruster {
    name: Name,
    position: DVec3,
    direction: DVec3,
    max_thrust_n: f64,
    active: bool,
    temperature_k: f64,
    health: f64,
    overheating: bool,
    starved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrusterState {
    pub name: Name,
    pub active: bool,
    pub temperature_k: f64,
    pub health: f64,
}

/// Reaction-control thrusters sharing one driver breaker and the RCS feed.
#[derive(Debug, Clone)]
pub struct RcsArray {
    thrusters: Vec<Thruster>,
    driver: BreakerId,
    flow_kg_s: f64,
    heating_k_s: f64,
    cooling_per_s: f64,
    ambient_temp_k: f64,
    overtemp_k: f64,
    health_decay_per_s: f64,
    net_force_n: DVec3,
    net_torque_nm: DVec3,
}

impl RcsArray {
    pub fn new(config: &RcsConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let mut thrusters = Vec::with_capacity(config.thrusters.len());
        for t in &config.thrusters {
            let Some(direction) = t.direction.try_normalize() else {
                return Err(ConfigError::InvalidValue {
                    field: format!("rcs.thrusters.{}.direction", t.name),
                    reason: "must be a non-zero vector",
                });
            };
            thrusters.push(Thruster {
                name: make_name(&t.name)?,
                position: t.position,
                direction,
                max_thrust_n: t.max_thrust_n,
                active: false,
                temperature_k: config.ambient_temp_k,
                health: 1.0,
                overheating: false,
                starved: false,
            });
        }
        Ok(Self {
            thrusters,
            driver: resolver.breaker(&config.driver_breaker, "rcs")?,
            flow_kg_s: config.flow_kg_s,
            heating_k_s: config.heating_k_s,
            cooling_per_s: config.cooling_per_s,
            ambient_temp_k: config.ambient_temp_k,
            overtemp_k: config.overtemp_k,
            health_decay_per_s: config.health_decay_per_s,
            net_force_n: DVec3::ZERO,
            net_torque_nm: DVec3::ZERO,
        })
    }

    pub fn update(&mut self, dt_s: f64, fuel: &mut FuelSystem, power: &PowerNetwork, events: &mut EventQueue) {
        let powered = power.is_powered(self.driver);
        let mut force = DVec3::ZERO;
        let mut torque = DVec3::ZERO;

        for (index, thruster) in self.thrusters.iter_mut().enumerate() {
            let id = ThrusterId(index as u16);
            let mut firing = false;
            if thruster.active && powered {
                if fuel.draw_for_rcs(self.flow_kg_s * dt_s) {
                    firing = true;
                    thruster.starved = false;
                } else if !thruster.starved {
                    thruster.starved = true;
                    warn!(thruster = %thruster.name, "thruster fuel starved");
                    events.push(Event::ThrusterFuelStarved { thruster: id });
                }
            }

            if firing {
                // a dead thruster still burns propellant but pushes nothing
                let f = thruster.direction * thruster.max_thrust_n * thruster.health;
                force += f;
                torque += thruster.position.cross(f);
                thruster.temperature_k += self.heating_k_s * dt_s;
            } else {
                let excess = thruster.temperature_k - self.ambient_temp_k;
                thruster.temperature_k -= excess * (self.cooling_per_s * dt_s).min(1.0);
            }

            let hot = thruster.temperature_k > self.overtemp_k;
            if hot {
                thruster.health = (thruster.health - self.health_decay_per_s * dt_s).max(0.0);
                if !thruster.overheating {
                    warn!(thruster = %thruster.name, temperature_k = thruster.temperature_k, "thruster overheat");
                    events.push(Event::ThrusterOverheat { thruster: id });
                }
            }
            thruster.overheating = hot;
        }

        self.net_force_n = force;
        self.net_torque_nm = torque;
    }

    pub fn fire(&mut self, thruster: ThrusterId, active: bool) -> CommandStatus {
        match self.thrusters.get_mut(thruster.index()) {
            Some(t) => {
                t.active = active;
                CommandStatus::Accepted
            }
            None => CommandStatus::Ignored("unknown thruster"),
        }
    }

    pub fn net_force_n(&self) -> DVec3 {
        self.net_force_n
    }

    pub fn net_torque_nm(&self) -> DVec3 {
        self.net_torque_nm
    }

    pub fn health(&self, thruster: ThrusterId) -> f64 {
        self.thrusters.get(thruster.index()).map_or(0.0, |t| t.health)
    }

    pub fn temperature_k(&self, thruster: ThrusterId) -> f64 {
        self.thrusters.get(thruster.index()).map_or(0.0, |t| t.temperature_k)
    }

    pub fn thruster_count(&self) -> usize {
        self.thrusters.len()
    }

    pub fn get_state(&self) -> Vec<ThrusterState> {
        self.thrusters
            .iter()
            .map(|t| ThrusterState {
                name: t.name,
                active: t.active,
                temperature_k: t.temperature_k,
                health: t.health,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::subsystems::ThermalLedger;

    fn build(config: &VesselConfig) -> (RcsArray, FuelSystem, PowerNetwork) {
        let resolver = Resolver::new(config).unwrap();
        let thermal =
            ThermalLedger::new(&config.thermal, &config.atmosphere.thermal_nodes(), &resolver).unwrap();
        (
            RcsArray::new(&config.rcs, &resolver).unwrap(),
            FuelSystem::new(&config.fuel, &thermal, &resolver).unwrap(),
            PowerNetwork::new(&config.power, &resolver).unwrap(),
        )
    }

    #[test]
    fn test_firing_produces_force_and_torque() {
        let config = VesselConfig::default();
        let (mut rcs, mut fuel, power) = build(&config);
        let mut events = EventQueue::new();
        rcs.fire(ThrusterId(0), true);
        let before = fuel.total_fuel_kg();
        rcs.update(0.1, &mut fuel, &power, &mut events);
        let t = &config.rcs.thrusters[0];
        let expected = t.direction.normalize() * t.max_thrust_n;
        assert!((rcs.net_force_n() - expected).length() < 1e-9);
        assert!((rcs.net_torque_nm() - t.position.cross(expected)).length() < 1e-9);
        assert!(fuel.total_fuel_kg() < before);
    }

    #[test]
    fn test_sustained_firing_degrades_health() {
        let config = VesselConfig::default();
        let (mut rcs, mut fuel, power) = build(&config);
        let mut events = EventQueue::new();
        rcs.fire(ThrusterId(0), true);
        for _ in 0..600 {
            rcs.update(1.0, &mut fuel, &power, &mut events);
        }
        assert!(rcs.temperature_k(ThrusterId(0)) > config.rcs.overtemp_k);
        assert!(rcs.health(ThrusterId(0)) < 1.0);
        assert_eq!(
            events.iter().filter(|e| **e == Event::ThrusterOverheat { thruster: ThrusterId(0) }).count(),
            1
        );
    }

    #[test]
    fn test_dead_thruster_burns_fuel_without_force() {
        let mut config = VesselConfig::default();
        config.rcs.health_decay_per_s = 1.0;
        config.rcs.heating_k_s = 1000.0;
        let (mut rcs, mut fuel, power) = build(&config);
        let mut events = EventQueue::new();
        rcs.fire(ThrusterId(0), true);
        for _ in 0..5 {
            rcs.update(1.0, &mut fuel, &power, &mut events);
        }
        assert_eq!(rcs.health(ThrusterId(0)), 0.0);
        let before = fuel.total_fuel_kg();
        rcs.update(1.0, &mut fuel, &power, &mut events);
        assert_eq!(rcs.net_force_n(), DVec3::ZERO);
        assert!(fuel.total_fuel_kg() < before);
    }

    #[test]
    fn test_idle_thruster_cools_toward_ambient() {
        let config = VesselConfig::default();
        let (mut rcs, mut fuel, power) = build(&config);
        let mut events = EventQueue::new();
        rcs.fire(ThrusterId(0), true);
        for _ in 0..10 {
            rcs.update(1.0, &mut fuel, &power, &mut events);
        }
        let hot = rcs.temperature_k(ThrusterId(0));
        rcs.fire(ThrusterId(0), false);
        rcs.update(1.0, &mut fuel, &power, &mut events);
        assert!(rcs.temperature_k(ThrusterId(0)) < hot);
        assert!(rcs.temperature_k(ThrusterId(0)) >= config.rcs.ambient_temp_k);
    }
}
