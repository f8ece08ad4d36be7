use super::{make_name, ComponentId, Name, TankId, ThermalLedger};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::physics::{ideal_gas_pressure_pa, moles, Gas, PA_PER_BAR};
use crate::protocol::CommandStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Smallest ullage used in the pressure calculation of a brim-full tank.
const MIN_ULLAGE_M3: f64 = 1e-3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankConfig {
    pub name: String,
    pub volume_m3: f64,
    pub fuel_density_kg_m3: f64,
    pub capacity_kg: f64,
    pub fuel_kg: f64,
    pub pressurant: Gas,
    pub pressurant_kg: f64,
    pub min_pressure_bar: f64,
    pub component: String,
    pub feed_to_engine: bool,
    pub feed_to_rcs: bool,
    pub crossfeed_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuelConfig {
    pub tanks: Vec<TankConfig>,
    pub crossfeed_rate_kg_s: f64,
    pub vent_rate_kg_s: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valve {
    FeedToEngine,
    FeedToRcs,
    Vent,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TankValves {
    pub feed_to_engine: bool,
    pub feed_to_rcs: bool,
    pub vent: bool,
    pub crossfeed_to: Option<TankId>,
}

#[derive(Debug, Clone)]
struct FuelTank {
    name: Name,
    fuel_kg: f64,
    capacity_kg: f64,
    volume_m3: f64,
    fuel_density_kg_m3: f64,
    pressurant: Gas,
    pressurant_kg: f64,
    temperature_k: f64,
    pressure_bar: f64,
    min_pressure_bar: f64,
    component: ComponentId,
    valves: TankValves,
    pressure_low: bool,
}

impl FuelTank {
    fn ullage_m3(&self) -> f64 {
        (self.volume_m3 - self.fuel_kg / self.fuel_density_kg_m3).max(MIN_ULLAGE_M3)
    }

    fn derive_pressure(&mut self) {
        let n = moles(self.pressurant, self.pressurant_kg);
        self.pressure_bar =
            ideal_gas_pressure_pa(n, self.temperature_k, self.ullage_m3()) / PA_PER_BAR;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TankState {
    pub name: Name,
    pub fuel_kg: f64,
    pub capacity_kg: f64,
    pub fuel_percent: f64,
    pub pressure_bar: f64,
    pub pressurant_kg: f64,
    pub temperature_k: f64,
    pub valves: TankValves,
}

/// Propellant tanks, their valves and the crossfeed plumbing between them.
#[derive(Debug, Clone)]
pub struct FuelSystem {
    tanks: Vec<FuelTank>,
    crossfeed_rate_kg_s: f64,
    vent_rate_kg_s: f64,
}

impl FuelSystem {
    pub fn new(
        config: &FuelConfig,
        thermal: &ThermalLedger,
        resolver: &Resolver,
    ) -> Result<Self, ConfigError> {
        let mut tanks = Vec::with_capacity(config.tanks.len());
        for t in &config.tanks {
            if t.volume_m3 <= 0.0 || t.fuel_density_kg_m3 <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("fuel.tanks.{}", t.name),
                    reason: "volume and density must be positive",
                });
            }
            if t.capacity_kg / t.fuel_density_kg_m3 > t.volume_m3 {
                return Err(ConfigError::InvalidValue {
                    field: format!("fuel.tanks.{}.capacity_kg", t.name),
                    reason: "capacity does not fit in tank volume",
                });
            }
            let component = resolver.component(&t.component, &t.name)?;
            let crossfeed_to = match &t.crossfeed_to {
                Some(target) => Some(resolver.tank(target, &t.name)?),
                None => None,
            };
            let mut tank = FuelTank {
                name: make_name(&t.name)?,
                fuel_kg: t.fuel_kg.clamp(0.0, t.capacity_kg),
                capacity_kg: t.capacity_kg,
                volume_m3: t.volume_m3,
                fuel_density_kg_m3: t.fuel_density_kg_m3,
                pressurant: t.pressurant,
                pressurant_kg: t.pressurant_kg.max(0.0),
                temperature_k: thermal.component_temperature(component),
                pressure_bar: 0.0,
                min_pressure_bar: t.min_pressure_bar,
                component,
                valves: TankValves {
                    feed_to_engine: t.feed_to_engine,
                    feed_to_rcs: t.feed_to_rcs,
                    vent: false,
                    crossfeed_to,
                },
                pressure_low: false,
            };
            tank.derive_pressure();
            tanks.push(tank);
        }
        Ok(Self {
            tanks,
            crossfeed_rate_kg_s: config.crossfeed_rate_kg_s,
            vent_rate_kg_s: config.vent_rate_kg_s,
        })
    }

    pub fn update(&mut self, dt_s: f64, thermal: &ThermalLedger, events: &mut EventQueue) {
        for tank in &mut self.tanks {
            tank.temperature_k = thermal.component_temperature(tank.component);
            if tank.valves.vent {
                let vented = (self.vent_rate_kg_s * dt_s).min(tank.pressurant_kg);
                tank.pressurant_kg -= vented;
            }
        }

        for source in 0..self.tanks.len() {
            let Some(target) = self.tanks[source].valves.crossfeed_to else {
                continue;
            };
            let target = target.index();
            if target == source || target >= self.tanks.len() {
                continue;
            }
            let room = self.tanks[target].capacity_kg - self.tanks[target].fuel_kg;
            let moved = (self.crossfeed_rate_kg_s * dt_s)
                .min(self.tanks[source].fuel_kg)
                .min(room)
                .max(0.0);
            self.tanks[source].fuel_kg -= moved;
            self.tanks[target].fuel_kg += moved;
        }

        for (index, tank) in self.tanks.iter_mut().enumerate() {
            tank.derive_pressure();
            let low = tank.pressure_bar < tank.min_pressure_bar;
            if low && !tank.pressure_low {
                warn!(tank = %tank.name, pressure_bar = tank.pressure_bar, "fuel pressure low");
                events.push(Event::FuelPressureLow {
                    tank: TankId(index as u16),
                    pressure_bar: tank.pressure_bar,
                });
            }
            tank.pressure_low = low;
            debug_assert!(
                (0.0..=tank.capacity_kg).contains(&tank.fuel_kg),
                "tank {} fuel {} outside [0, {}]",
                tank.name,
                tank.fuel_kg,
                tank.capacity_kg
            );
        }
    }

    /// Removes `mass_kg` from a tank. Fails without mutation when the tank
    /// holds less than requested; zero is a successful no-op.
    pub fn consume_fuel(&mut self, tank: TankId, mass_kg: f64) -> bool {
        let Some(t) = self.tanks.get_mut(tank.index()) else {
            return false;
        };
        if !(mass_kg >= 0.0) || !mass_kg.is_finite() {
            return false;
        }
        if mass_kg == 0.0 {
            return true;
        }
        if t.fuel_kg < mass_kg {
            debug!(tank = %t.name, requested = mass_kg, available = t.fuel_kg, "fuel draw refused");
            return false;
        }
        t.fuel_kg -= mass_kg;
        t.derive_pressure();
        true
    }

    /// Highest pressure among tanks feeding the main engine, 0 with no feed.
    pub fn engine_line_pressure_bar(&self) -> f64 {
        self.line_pressure(|v| v.feed_to_engine)
    }

    pub fn rcs_line_pressure_bar(&self) -> f64 {
        self.line_pressure(|v| v.feed_to_rcs)
    }

    fn line_pressure(&self, feeds: impl Fn(&TankValves) -> bool) -> f64 {
        self.tanks
            .iter()
            .filter(|t| feeds(&t.valves))
            .map(|t| t.pressure_bar)
            .fold(0.0, f64::max)
    }

    pub fn draw_for_engine(&mut self, mass_kg: f64) -> bool {
        self.draw_from_feed(mass_kg, |v| v.feed_to_engine)
    }

    pub fn draw_for_rcs(&mut self, mass_kg: f64) -> bool {
        self.draw_from_feed(mass_kg, |v| v.feed_to_rcs)
    }

    /// Draws the whole amount from the highest-pressure feeding tank able to
    /// supply it.
    fn draw_from_feed(&mut self, mass_kg: f64, feeds: impl Fn(&TankValves) -> bool) -> bool {
        if mass_kg == 0.0 {
            return true;
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, tank) in self.tanks.iter().enumerate() {
            if !feeds(&tank.valves) || tank.fuel_kg < mass_kg {
                continue;
            }
            if best.map_or(true, |(_, p)| tank.pressure_bar > p) {
                best = Some((index, tank.pressure_bar));
            }
        }
        match best {
            Some((index, _)) => self.consume_fuel(TankId(index as u16), mass_kg),
            None => false,
        }
    }

    pub fn set_valve(&mut self, tank: TankId, valve: Valve, open: bool) -> CommandStatus {
        let Some(t) = self.tanks.get_mut(tank.index()) else {
            return CommandStatus::Ignored("unknown tank");
        };
        match valve {
            Valve::FeedToEngine => t.valves.feed_to_engine = open,
            Valve::FeedToRcs => t.valves.feed_to_rcs = open,
            Valve::Vent => t.valves.vent = open,
        }
        CommandStatus::Accepted
    }

    pub fn set_crossfeed(&mut self, tank: TankId, target: Option<TankId>) -> CommandStatus {
        if target == Some(tank) {
            return CommandStatus::Ignored("tank cannot crossfeed to itself");
        }
        if let Some(t) = target {
            if t.index() >= self.tanks.len() {
                return CommandStatus::Ignored("unknown tank");
            }
        }
        let Some(t) = self.tanks.get_mut(tank.index()) else {
            return CommandStatus::Ignored("unknown tank");
        };
        t.valves.crossfeed_to = target;
        CommandStatus::Accepted
    }

    pub fn fuel_kg(&self, tank: TankId) -> f64 {
        self.tanks.get(tank.index()).map_or(0.0, |t| t.fuel_kg)
    }

    pub fn pressure_bar(&self, tank: TankId) -> f64 {
        self.tanks.get(tank.index()).map_or(0.0, |t| t.pressure_bar)
    }

    pub fn pressurant_kg(&self, tank: TankId) -> f64 {
        self.tanks.get(tank.index()).map_or(0.0, |t| t.pressurant_kg)
    }

    pub fn total_fuel_kg(&self) -> f64 {
        self.tanks.iter().map(|t| t.fuel_kg).sum()
    }

    pub fn tank_count(&self) -> usize {
        self.tanks.len()
    }

    pub fn get_state(&self) -> Vec<TankState> {
        self.tanks
            .iter()
            .map(|t| TankState {
                name: t.name,
                fuel_kg: t.fuel_kg,
                capacity_kg: t.capacity_kg,
                fuel_percent: if t.capacity_kg > 0.0 { t.fuel_kg / t.capacity_kg * 100.0 } else { 0.0 },
                pressure_bar: t.pressure_bar,
                pressurant_kg: t.pressurant_kg,
                temperature_k: t.temperature_k,
                valves: t.valves,
            })
            .collect()
    }
}
