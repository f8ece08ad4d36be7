use super::{make_name, AppliedImpulse, AtmosphereSystem, BottleId, CompartmentId, ImpulseSource, Name, ThermalLedger};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::physics::{ideal_gas_pressure_pa, moles, Gas, PA_PER_BAR};
use crate::protocol::CommandStatus;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegulatorConfig {
    pub setpoint_kpa: f64,
    pub flow_kg_s: f64,
    pub open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleConfig {
    pub name: String,
    pub gas: Gas,
    pub volume_m3: f64,
    pub mass_kg: f64,
    pub max_pressure_bar: f64,
    /// Compartment the bottle sits in and bleeds into.
    pub compartment: String,
    pub regulator: Option<RegulatorConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasConfig {
    pub bottles: Vec<BottleConfig>,
    /// Fraction of rated pressure that raises the overpressure warning.
    pub warning_fraction: f64,
}

#[derive(Debug, Clone, Copy)]
struct Regulator {
    setpoint_pa: f64,
    flow_kg_s: f64,
    open: bool,
}

#[derive(Debug, Clone)]
struct GasBottle {
    name: Name,
    gas: Gas,
    volume_m3: f64,
    mass_kg: f64,
    max_pressure_bar: f64,
    pressure_bar: f64,
    temperature_k: f64,
    compartment: CompartmentId,
    regulator: Option<Regulator>,
    warned: bool,
    ruptured: bool,
}

impl GasBottle {
    fn derive_pressure(&mut self) {
        let n = moles(self.gas, self.mass_kg);
        self.pressure_bar = ideal_gas_pressure_pa(n, self.temperature_k, self.volume_m3) / PA_PER_BAR;
    }
}

/// Gas that left a bottle this tick and must be added to a compartment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasRelease {
    pub compartment: CompartmentId,
    pub gas: Gas,
    pub mass_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BottleState {
    pub name: Name,
    pub gas: Gas,
    pub mass_kg: f64,
    pub pressure_bar: f64,
    pub max_pressure_bar: f64,
    pub regulator_open: Option<bool>,
    pub ruptured: bool,
}

#[derive(Debug, Clone)]
pub struct GasSystem {
    bottles: Vec<GasBottle>,
    warning_fraction: f64,
}

impl GasSystem {
    pub fn new(config: &GasConfig, thermal: &ThermalLedger, resolver: &Resolver) -> Result<Self, ConfigError> {
        let mut bottles = Vec::with_capacity(config.bottles.len());
        for b in &config.bottles {
            if b.volume_m3 <= 0.0 || b.max_pressure_bar <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("gas.bottles.{}", b.name),
                    reason: "volume and rated pressure must be positive",
                });
            }
            let compartment = resolver.compartment(&b.compartment, &b.name)?;
            let mut bottle = GasBottle {
                name: make_name(&b.name)?,
                gas: b.gas,
                volume_m3: b.volume_m3,
                mass_kg: b.mass_kg.max(0.0),
                max_pressure_bar: b.max_pressure_bar,
                pressure_bar: 0.0,
                temperature_k: thermal.compartment_temperature(compartment),
                compartment,
                regulator: b.regulator.as_ref().map(|r| Regulator {
                    setpoint_pa: r.setpoint_kpa * 1000.0,
                    flow_kg_s: r.flow_kg_s,
                    open: r.open,
                }),
                warned: false,
                ruptured: false,
            };
            bottle.derive_pressure();
            bottles.push(bottle);
        }
        Ok(Self {
            bottles,
            warning_fraction: config.warning_fraction,
        })
    }

    /// Tracks bottle temperature from its compartment, runs regulators and
    /// ruptures anything past its rating. Released gas and rupture impulses
    /// are handed back to the caller.
    pub fn update(
        &mut self,
        dt_s: f64,
        thermal: &ThermalLedger,
        atmosphere: &AtmosphereSystem,
        releases: &mut Vec<GasRelease>,
        impulses: &mut Vec<AppliedImpulse>,
        events: &mut EventQueue,
    ) {
        for (index, bottle) in self.bottles.iter_mut().enumerate() {
            if bottle.ruptured {
                continue;
            }
            let id = BottleId(index as u16);
            bottle.temperature_k = thermal.compartment_temperature(bottle.compartment);

            if let Some(regulator) = bottle.regulator {
                if regulator.open && atmosphere.pressure_pa(bottle.compartment) < regulator.setpoint_pa {
                    let bled = (regulator.flow_kg_s * dt_s).min(bottle.mass_kg);
                    if bled > 0.0 {
                        bottle.mass_kg -= bled;
                        releases.push(GasRelease {
                            compartment: bottle.compartment,
                            gas: bottle.gas,
                            mass_kg: bled,
                        });
                    }
                }
            }
            bottle.derive_pressure();

            if bottle.pressure_bar > bottle.max_pressure_bar {
                let position = atmosphere.position(bottle.compartment);
                let stored_j = bottle.pressure_bar * PA_PER_BAR * bottle.volume_m3;
                let magnitude = (2.0 * bottle.mass_kg * stored_j).sqrt();
                let direction = position.try_normalize().unwrap_or(DVec3::X);
                error!(bottle = %bottle.name, pressure_bar = bottle.pressure_bar, "gas bottle ruptured");
                releases.push(GasRelease {
                    compartment: bottle.compartment,
                    gas: bottle.gas,
                    mass_kg: bottle.mass_kg,
                });
                impulses.push(AppliedImpulse {
                    source: ImpulseSource::BottleRupture(id),
                    position,
                    impulse_ns: direction * magnitude,
                });
                events.push(Event::GasBottleRuptured { bottle: id, gas: bottle.gas });
                bottle.mass_kg = 0.0;
                bottle.pressure_bar = 0.0;
                bottle.ruptured = true;
                continue;
            }

            let warning = bottle.pressure_bar > self.warning_fraction * bottle.max_pressure_bar;
            if warning && !bottle.warned {
                warn!(bottle = %bottle.name, pressure_bar = bottle.pressure_bar, "gas bottle overpressure");
                events.push(Event::GasBottleOverpressure {
                    bottle: id,
                    pressure_bar: bottle.pressure_bar,
                });
            }
            bottle.warned = warning;
        }
    }

    pub fn set_regulator(&mut self, bottle: BottleId, open: bool) -> CommandStatus {
        let Some(b) = self.bottles.get_mut(bottle.index()) else {
            return CommandStatus::Ignored("unknown bottle");
        };
        if b.ruptured {
            return CommandStatus::Ignored("bottle ruptured");
        }
        match b.regulator.as_mut() {
            Some(regulator) => {
                regulator.open = open;
                CommandStatus::Accepted
            }
            None => CommandStatus::Ignored("bottle has no regulator"),
        }
    }

    pub fn pressure_bar(&self, bottle: BottleId) -> f64 {
        self.bottles.get(bottle.index()).map_or(0.0, |b| b.pressure_bar)
    }

    pub fn mass_kg(&self, bottle: BottleId) -> f64 {
        self.bottles.get(bottle.index()).map_or(0.0, |b| b.mass_kg)
    }

    pub fn is_ruptured(&self, bottle: BottleId) -> bool {
        self.bottles.get(bottle.index()).is_some_and(|b| b.ruptured)
    }

    pub fn bottle_count(&self) -> usize {
        self.bottles.len()
    }

    pub fn get_state(&self) -> Vec<BottleState> {
        self.bottles
            .iter()
            .map(|b| BottleState {
                name: b.name,
                gas: b.gas,
                mass_kg: b.mass_kg,
                pressure_bar: b.pressure_bar,
                max_pressure_bar: b.max_pressure_bar,
                regulator_open: b.regulator.map(|r| r.open),
                ruptured: b.ruptured,
            })
            .collect()
    }
}
