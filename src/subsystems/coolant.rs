use super::{BreakerId, ComponentId, HeatSink, LoopSide, PowerNetwork, ThermalLedger};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::physics::{radiated_power_w, T_SPACE_K};
use crate::protocol::CommandStatus;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatExchangerConfig {
    pub component: String,
    /// Fraction of the component's waste heat carried off while flowing.
    pub efficiency: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadiatorConfig {
    pub area_m2: f64,
    pub emissivity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantLoopConfig {
    pub fluid_mass_kg: f64,
    pub nominal_mass_kg: f64,
    pub specific_heat_j_per_kg_k: f64,
    pub initial_temp_k: f64,
    pub nominal_pressure_bar: f64,
    pub pump_on: bool,
    pub pump_power_w: f64,
    pub pump_breaker: String,
    pub exchangers: Vec<HeatExchangerConfig>,
    pub radiators: Vec<RadiatorConfig>,
    pub radiators_deployed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantConfig {
    pub loops: [CoolantLoopConfig; 2],
    pub cross_connect_open: bool,
    pub boil_temp_k: f64,
    /// Boiling only sets in once loop pressure falls below this.
    pub boil_pressure_bar: f64,
    pub boil_off_kg_s: f64,
}

#[derive(Debug, Clone, Copy)]
struct HeatExchanger {
    component: ComponentId,
    efficiency: f64,
}

#[derive(Debug, Clone)]
struct CoolantLoop {
    mass_kg: f64,
    nominal_mass_kg: f64,
    specific_heat_j_per_kg_k: f64,
    temperature_k: f64,
    pressure_bar: f64,
    nominal_pressure_bar: f64,
    pump_on: bool,
    flowing: bool,
    pump_power_w: f64,
    breaker: BreakerId,
    exchangers: Vec<HeatExchanger>,
    radiators: Vec<RadiatorConfig>,
    radiators_deployed: bool,
    leak_rate_kg_s: f64,
    boiling: bool,
    depleted: bool,
    heat_absorbed_w: f64,
    heat_rejected_w: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoolantLoopState {
    pub side: LoopSide,
    pub mass_kg: f64,
    pub temperature_k: f64,
    pub pressure_bar: f64,
    pub pump_on: bool,
    pub flowing: bool,
    pub radiators_deployed: bool,
    pub heat_absorbed_w: f64,
    pub heat_rejected_w: f64,
    pub boiling: bool,
}

/// Twin coolant loops carrying component waste heat to the radiators.
#[derive(Debug, Clone)]
pub struct CoolantSystem {
    loops: [CoolantLoop; 2],
    cross_connect_open: bool,
    boil_temp_k: f64,
    boil_pressure_bar: f64,
    boil_off_kg_s: f64,
}

impl CoolantSystem {
    pub fn new(config: &CoolantConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let build = |c: &CoolantLoopConfig, side: LoopSide| -> Result<CoolantLoop, ConfigError> {
            if c.nominal_mass_kg <= 0.0 || c.specific_heat_j_per_kg_k <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("coolant.loops[{}]", side.index()),
                    reason: "nominal mass and specific heat must be positive",
                });
            }
            let mut exchangers = Vec::with_capacity(c.exchangers.len());
            for hx in &c.exchangers {
                exchangers.push(HeatExchanger {
                    component: resolver.component(&hx.component, "coolant heat exchanger")?,
                    efficiency: hx.efficiency.clamp(0.0, 1.0),
                });
            }
            let mass = c.fluid_mass_kg.max(0.0);
            Ok(CoolantLoop {
                mass_kg: mass,
                nominal_mass_kg: c.nominal_mass_kg,
                specific_heat_j_per_kg_k: c.specific_heat_j_per_kg_k,
                temperature_k: c.initial_temp_k,
                pressure_bar: c.nominal_pressure_bar * mass / c.nominal_mass_kg,
                nominal_pressure_bar: c.nominal_pressure_bar,
                pump_on: c.pump_on,
                flowing: false,
                pump_power_w: c.pump_power_w,
                breaker: resolver.breaker(&c.pump_breaker, "coolant pump")?,
                exchangers,
                radiators: c.radiators.clone(),
                radiators_deployed: c.radiators_deployed,
                leak_rate_kg_s: 0.0,
                boiling: false,
                depleted: mass <= 0.0,
                heat_absorbed_w: 0.0,
                heat_rejected_w: 0.0,
            })
        };
        Ok(Self {
            loops: [build(&config.loops[0], LoopSide::A)?, build(&config.loops[1], LoopSide::B)?],
            cross_connect_open: config.cross_connect_open,
            boil_temp_k: config.boil_temp_k,
            boil_pressure_bar: config.boil_pressure_bar,
            boil_off_kg_s: config.boil_off_kg_s,
        })
    }

    pub fn update(
        &mut self,
        dt_s: f64,
        power: &PowerNetwork,
        thermal: &mut ThermalLedger,
        events: &mut EventQueue,
    ) {
        for side in LoopSide::BOTH {
            let lp = &mut self.loops[side.index()];

            let leaked = (lp.leak_rate_kg_s * dt_s).min(lp.mass_kg);
            lp.mass_kg -= leaked;

            let availability = power.availability(lp.breaker);
            lp.flowing = lp.pump_on && availability > 0.0 && lp.mass_kg > 0.0;

            let mut absorbed_w = 0.0;
            if lp.flowing {
                for hx in &lp.exchangers {
                    let carried_w = thermal.waste_heat_w(hx.component) * hx.efficiency * availability;
                    thermal.add_heat(HeatSink::Component(hx.component), -carried_w * dt_s);
                    absorbed_w += carried_w;
                }
            }
            let rejected_w = if lp.radiators_deployed && lp.mass_kg > 0.0 {
                lp.radiators
                    .iter()
                    .map(|r| radiated_power_w(r.emissivity, r.area_m2, lp.temperature_k))
                    .sum()
            } else {
                0.0
            };
            lp.heat_absorbed_w = absorbed_w;
            lp.heat_rejected_w = rejected_w;

            if lp.mass_kg > 0.0 {
                let capacity = lp.mass_kg * lp.specific_heat_j_per_kg_k;
                lp.temperature_k =
                    (lp.temperature_k + (absorbed_w - rejected_w) * dt_s / capacity).max(T_SPACE_K);
            }
            lp.pressure_bar = lp.nominal_pressure_bar * lp.mass_kg / lp.nominal_mass_kg;

            let boiling = lp.mass_kg > 0.0
                && lp.temperature_k > self.boil_temp_k
                && lp.pressure_bar < self.boil_pressure_bar;
            if boiling {
                lp.mass_kg -= (self.boil_off_kg_s * dt_s).min(lp.mass_kg);
                lp.pressure_bar = lp.nominal_pressure_bar * lp.mass_kg / lp.nominal_mass_kg;
                if !lp.boiling {
                    warn!(%side, temperature_k = lp.temperature_k, "coolant boiling");
                    events.push(Event::CoolantBoiling { side });
                }
            }
            lp.boiling = boiling;

            if lp.mass_kg <= 0.0 {
                lp.mass_kg = 0.0;
                lp.pressure_bar = 0.0;
                lp.flowing = false;
                if !lp.depleted {
                    lp.depleted = true;
                    warn!(%side, "coolant loop depleted");
                    events.push(Event::CoolantDepleted { side });
                }
            }
        }

        if self.cross_connect_open {
            self.equalize();
        }
    }

    /// Shares inventory between the loops; temperature mixes by mass.
    fn equalize(&mut self) {
        let [a, b] = &mut self.loops;
        let total = a.mass_kg + b.mass_kg;
        let temperature = if total > 0.0 {
            (a.temperature_k * a.mass_kg + b.temperature_k * b.mass_kg) / total
        } else {
            (a.temperature_k + b.temperature_k) / 2.0
        };
        for lp in [a, b] {
            lp.mass_kg = total / 2.0;
            lp.temperature_k = temperature;
            lp.pressure_bar = lp.nominal_pressure_bar * lp.mass_kg / lp.nominal_mass_kg;
            if lp.mass_kg > 0.0 {
                lp.depleted = false;
            }
        }
    }

    pub fn power_demands(&self) -> [(BreakerId, f64); 2] {
        let demand = |lp: &CoolantLoop| (lp.breaker, if lp.pump_on { lp.pump_power_w } else { 0.0 });
        [demand(&self.loops[0]), demand(&self.loops[1])]
    }

    pub fn set_pump(&mut self, side: LoopSide, on: bool) -> CommandStatus {
        self.loops[side.index()].pump_on = on;
        CommandStatus::Accepted
    }

    pub fn set_cross_connect(&mut self, open: bool) -> CommandStatus {
        if open && !self.cross_connect_open {
            self.equalize();
        }
        self.cross_connect_open = open;
        CommandStatus::Accepted
    }

    pub fn set_radiators(&mut self, side: LoopSide, deployed: bool) -> CommandStatus {
        self.loops[side.index()].radiators_deployed = deployed;
        CommandStatus::Accepted
    }

    pub fn set_leak(&mut self, side: LoopSide, rate_kg_s: f64) {
        self.loops[side.index()].leak_rate_kg_s = rate_kg_s.max(0.0);
    }

    pub fn temperature_k(&self, side: LoopSide) -> f64 {
        self.loops[side.index()].temperature_k
    }

    pub fn mass_kg(&self, side: LoopSide) -> f64 {
        self.loops[side.index()].mass_kg
    }

    pub fn is_flowing(&self, side: LoopSide) -> bool {
        self.loops[side.index()].flowing
    }

    pub fn get_state(&self) -> Vec<CoolantLoopState> {
        LoopSide::BOTH
            .iter()
            .map(|&side| {
                let lp = &self.loops[side.index()];
                CoolantLoopState {
                    side,
                    mass_kg: lp.mass_kg,
                    temperature_k: lp.temperature_k,
                    pressure_bar: lp.pressure_bar,
                    pump_on: lp.pump_on,
                    flowing: lp.flowing,
                    radiators_deployed: lp.radiators_deployed,
                    heat_absorbed_w: lp.heat_absorbed_w,
                    heat_rejected_w: lp.heat_rejected_w,
                    boiling: lp.boiling,
                }
            })
            .collect()
    }
}
