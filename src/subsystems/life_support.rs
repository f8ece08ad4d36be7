use super::atmosphere::Compartment;
use super::{BreakerId, CompartmentId, PowerNetwork};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue, LifeSupportUnit};
use crate::physics::Gas;
use crate::protocol::CommandStatus;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub breaker: String,
    pub compartment: String,
    /// Output (O2 made, CO2 scrubbed or water condensed) at full power.
    pub rate_kg_s: f64,
    pub power_w: f64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeSupportConfig {
    pub water_kg: f64,
    /// Electrolysis feed water per kilogram of O2.
    pub water_per_kg_o2: f64,
    /// CO2 the scrubber media can still absorb.
    pub scrubber_capacity_kg: f64,
    pub recycler_recovery: f64,
    pub oxygen_generator: UnitConfig,
    pub co2_scrubber: UnitConfig,
    pub water_recycler: UnitConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Standby,
    Unpowered,
    /// Consumable exhausted; stays down until resupplied.
    Inactive,
}

#[derive(Debug, Clone)]
struct Unit {
    breaker: BreakerId,
    compartment: CompartmentId,
    rate_kg_s: f64,
    power_w: f64,
    enabled: bool,
    status: UnitStatus,
}

impl Unit {
    fn from_config(config: &UnitConfig, resolver: &Resolver, referrer: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            breaker: resolver.breaker(&config.breaker, referrer)?,
            compartment: resolver.compartment(&config.compartment, referrer)?,
            rate_kg_s: config.rate_kg_s,
            power_w: config.power_w,
            enabled: config.enabled,
            status: if config.enabled { UnitStatus::Active } else { UnitStatus::Standby },
        })
    }

    /// Throughput available this tick, with status updated from power.
    fn budget_kg(&mut self, dt_s: f64, power: &PowerNetwork) -> f64 {
        if self.status == UnitStatus::Inactive {
            return 0.0;
        }
        if !self.enabled {
            self.status = UnitStatus::Standby;
            return 0.0;
        }
        let availability = power.availability(self.breaker);
        if availability <= 0.0 {
            self.status = UnitStatus::Unpowered;
            return 0.0;
        }
        self.status = UnitStatus::Active;
        self.rate_kg_s * availability * dt_s
    }

    fn exhaust(&mut self, unit: LifeSupportUnit, events: &mut EventQueue) {
        self.status = UnitStatus::Inactive;
        self.enabled = false;
        warn!(?unit, "life support unit inactive: consumable exhausted");
        events.push(Event::LifeSupportInactive { unit });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifeSupportState {
    pub water_kg: f64,
    pub scrubber_capacity_kg: f64,
    pub oxygen_generator: UnitStatus,
    pub co2_scrubber: UnitStatus,
    pub water_recycler: UnitStatus,
}

/// Oxygen generation, CO2 scrubbing and water recovery.
#[derive(Debug, Clone)]
pub struct LifeSupport {
    water_kg: f64,
    water_per_kg_o2: f64,
    scrubber_capacity_kg: f64,
    recycler_recovery: f64,
    generator: Unit,
    scrubber: Unit,
    recycler: Unit,
}

impl LifeSupport {
    pub fn new(config: &LifeSupportConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let mut ls = Self {
            water_kg: config.water_kg.max(0.0),
            water_per_kg_o2: config.water_per_kg_o2,
            scrubber_capacity_kg: config.scrubber_capacity_kg.max(0.0),
            recycler_recovery: config.recycler_recovery.clamp(0.0, 1.0),
            generator: Unit::from_config(&config.oxygen_generator, resolver, "oxygen generator")?,
            scrubber: Unit::from_config(&config.co2_scrubber, resolver, "co2 scrubber")?,
            recycler: Unit::from_config(&config.water_recycler, resolver, "water recycler")?,
        };
        if ls.water_kg <= 0.0 {
            ls.generator.status = UnitStatus::Inactive;
            ls.generator.enabled = false;
        }
        if ls.scrubber_capacity_kg <= 0.0 {
            ls.scrubber.status = UnitStatus::Inactive;
            ls.scrubber.enabled = false;
        }
        Ok(ls)
    }

    pub fn update(
        &mut self,
        dt_s: f64,
        compartments: &mut [Compartment],
        power: &PowerNetwork,
        events: &mut EventQueue,
    ) {
        let budget = self.generator.budget_kg(dt_s, power);
        if let Some(c) = compartments.get_mut(self.generator.compartment.index()) {
            if budget > 0.0 {
                let o2 = budget.min(self.water_kg / self.water_per_kg_o2);
                self.water_kg = (self.water_kg - o2 * self.water_per_kg_o2).max(0.0);
                c.add_gas(Gas::O2, o2);
                if self.water_kg <= 0.0 {
                    self.generator.exhaust(LifeSupportUnit::OxygenGenerator, events);
                }
            }
        }

        let budget = self.scrubber.budget_kg(dt_s, power);
        if let Some(c) = compartments.get_mut(self.scrubber.compartment.index()) {
            if budget > 0.0 {
                let scrubbed = c.remove_gas(Gas::Co2, budget.min(self.scrubber_capacity_kg));
                self.scrubber_capacity_kg = (self.scrubber_capacity_kg - scrubbed).max(0.0);
                if self.scrubber_capacity_kg <= 0.0 {
                    self.scrubber.exhaust(LifeSupportUnit::Co2Scrubber, events);
                }
            }
        }

        let budget = self.recycler.budget_kg(dt_s, power);
        if let Some(c) = compartments.get_mut(self.recycler.compartment.index()) {
            if budget > 0.0 {
                let condensed = c.remove_gas(Gas::H2o, budget);
                self.water_kg += condensed * self.recycler_recovery;
            }
        }
    }

    /// Re-enabling an inactive unit only succeeds once its consumable has
    /// been replenished (recovered water for the generator).
    pub fn set_enabled(&mut self, unit: LifeSupportUnit, enabled: bool) -> CommandStatus {
        let exhausted = match unit {
            LifeSupportUnit::OxygenGenerator => self.water_kg <= 0.0,
            LifeSupportUnit::Co2Scrubber => self.scrubber_capacity_kg <= 0.0,
            LifeSupportUnit::WaterRecycler => false,
        };
        if enabled && exhausted {
            return CommandStatus::Ignored("consumable exhausted");
        }
        let u = self.unit_mut(unit);
        u.enabled = enabled;
        u.status = if enabled { UnitStatus::Active } else { UnitStatus::Standby };
        CommandStatus::Accepted
    }

    fn unit_mut(&mut self, unit: LifeSupportUnit) -> &mut Unit {
        match unit {
            LifeSupportUnit::OxygenGenerator => &mut self.generator,
            LifeSupportUnit::Co2Scrubber => &mut self.scrubber,
            LifeSupportUnit::WaterRecycler => &mut self.recycler,
        }
    }

    pub fn power_demands(&self) -> impl Iterator<Item = (BreakerId, f64)> + '_ {
        [&self.generator, &self.scrubber, &self.recycler]
            .into_iter()
            .map(|u| (u.breaker, if u.enabled { u.power_w } else { 0.0 }))
    }

    pub fn water_kg(&self) -> f64 {
        self.water_kg
    }

    pub fn get_state(&self) -> LifeSupportState {
        LifeSupportState {
            water_kg: self.water_kg,
            scrubber_capacity_kg: self.scrubber_capacity_kg,
            oxygen_generator: self.generator.status,
            co2_scrubber: self.scrubber.status,
            water_recycler: self.recycler.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use crate::subsystems::AtmosphereSystem;

    fn build(config: &VesselConfig) -> (LifeSupport, AtmosphereSystem, PowerNetwork) {
        let resolver = Resolver::new(config).unwrap();
        (
            LifeSupport::new(&config.atmosphere.life_support, &resolver).unwrap(),
            AtmosphereSystem::new(&config.atmosphere, &resolver).unwrap(),
            PowerNetwork::new(&config.power, &resolver).unwrap(),
        )
    }

    #[test]
    fn test_generator_converts_water_to_oxygen() {
        let config = VesselConfig::default();
        let (mut ls, atmosphere, power) = build(&config);
        let mut compartments = atmosphere.compartments().to_vec();
        let target = ls.generator.compartment.index();
        let o2_before = compartments[target].mass_kg(Gas::O2);
        let water_before = ls.water_kg();
        let mut events = EventQueue::new();
        ls.set_enabled(LifeSupportUnit::Co2Scrubber, false);
        ls.set_enabled(LifeSupportUnit::WaterRecycler, false);
        ls.update(10.0, &mut compartments, &power, &mut events);
        let made = compartments[target].mass_kg(Gas::O2) - o2_before;
        assert!(made > 0.0);
        let used = water_before - ls.water_kg();
        assert!((used - made * config.atmosphere.life_support.water_per_kg_o2).abs() < 1e-12);
    }

    #[test]
    fn test_exhausted_water_forces_generator_inactive() {
        let mut config = VesselConfig::default();
        config.atmosphere.life_support.water_kg = 0.001;
        let (mut ls, atmosphere, power) = build(&config);
        let mut compartments = atmosphere.compartments().to_vec();
        ls.set_enabled(LifeSupportUnit::WaterRecycler, false);
        let mut events = EventQueue::new();
        for _ in 0..1000 {
            ls.update(1.0, &mut compartments, &power, &mut events);
        }
        assert_eq!(ls.get_state().oxygen_generator, UnitStatus::Inactive);
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == Event::LifeSupportInactive { unit: LifeSupportUnit::OxygenGenerator })
                .count(),
            1
        );
        assert_eq!(
            ls.set_enabled(LifeSupportUnit::OxygenGenerator, true),
            CommandStatus::Ignored("consumable exhausted")
        );
    }

    #[test]
    fn test_unpowered_unit_does_nothing() {
        let config = VesselConfig::default();
        let (mut ls, atmosphere, mut power) = build(&config);
        let mut compartments = atmosphere.compartments().to_vec();
        power.set_breaker(ls.scrubber.breaker, false);
        let target = ls.scrubber.compartment.index();
        let co2 = compartments[target].mass_kg(Gas::Co2);
        let mut events = EventQueue::new();
        ls.update(1.0, &mut compartments, &power, &mut events);
        assert_eq!(ls.get_state().co2_scrubber, UnitStatus::Unpowered);
        assert_eq!(compartments[target].mass_kg(Gas::Co2), co2);
    }
}
