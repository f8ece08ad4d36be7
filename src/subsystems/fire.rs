use super::atmosphere::{Compartment, Door};
use super::{CompartmentId, HeatSink, ThermalLedger};
use crate::events::{Event, EventQueue};
use crate::physics::Gas;
use crate::protocol::CommandStatus;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Mass of CO2 produced per kilogram of O2 burned.
const CO2_PER_O2: f64 = 44.01 / 31.998;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireKind {
    Electrical,
    Fuel,
    Materials,
}

impl FireKind {
    fn growth_factor(self) -> f64 {
        match self {
            FireKind::Electrical => 0.8,
            FireKind::Fuel => 2.0,
            FireKind::Materials => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionAgent {
    Halon,
    Water,
    Co2Flood,
}

impl SuppressionAgent {
    const ALL: [SuppressionAgent; 3] = [SuppressionAgent::Halon, SuppressionAgent::Water, SuppressionAgent::Co2Flood];

    fn index(self) -> usize {
        match self {
            SuppressionAgent::Halon => 0,
            SuppressionAgent::Water => 1,
            SuppressionAgent::Co2Flood => 2,
        }
    }

    /// `(intensity multiplier, fraction of O2 displaced)`.
    fn effect(self) -> (f64, f64) {
        match self {
            SuppressionAgent::Halon => (0.2, 0.3),
            SuppressionAgent::Water => (0.3, 0.1),
            SuppressionAgent::Co2Flood => (0.25, 0.4),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireConfig {
    /// O2 mole fraction needed for a new fire.
    pub ignition_o2_fraction: f64,
    /// Below this O2 fraction a fire only decays.
    pub sustain_o2_fraction: f64,
    pub initial_intensity: f64,
    pub extinguish_intensity: f64,
    pub growth_per_s: f64,
    pub decay_per_s: f64,
    /// O2 consumed per second at full intensity.
    pub o2_burn_kg_s: f64,
    pub heat_w: f64,
    pub spread_temp_k: f64,
    pub spread_chance_per_s: f64,
    pub autoignition_temp_k: f64,
    pub halon_charges: u32,
    pub water_charges: u32,
    pub co2_charges: u32,
    pub water_steam_kg: f64,
}

#[derive(Debug, Clone, Copy)]
struct Fire {
    kind: FireKind,
    intensity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireState {
    pub compartment: CompartmentId,
    pub kind: FireKind,
    pub intensity: f64,
}

/// Fires burning in compartments and the suppression charges left.
#[derive(Debug, Clone)]
pub struct FireSystem {
    config: FireConfig,
    fires: Vec<Option<Fire>>,
    charges: [u32; 3],
}

impl FireSystem {
    pub fn new(config: &FireConfig, compartments: usize) -> Self {
        Self {
            fires: vec![None; compartments],
            charges: [config.halon_charges, config.water_charges, config.co2_charges],
            config: config.clone(),
        }
    }

    /// Lights a fire if the compartment has none and enough oxygen.
    pub fn ignite(
        &mut self,
        id: CompartmentId,
        compartment: &Compartment,
        kind: FireKind,
        spread_from: Option<CompartmentId>,
        events: &mut EventQueue,
    ) -> bool {
        let Some(slot) = self.fires.get_mut(id.index()) else {
            return false;
        };
        if slot.is_some() || compartment.fraction(Gas::O2) < self.config.ignition_o2_fraction {
            return false;
        }
        *slot = Some(Fire {
            kind,
            intensity: self.config.initial_intensity,
        });
        warn!(compartment = compartment.name(), ?kind, ?spread_from, "fire started");
        events.push(Event::FireStarted { compartment: id, spread_from });
        true
    }

    pub fn update(
        &mut self,
        dt_s: f64,
        compartments: &mut [Compartment],
        doors: &[Door],
        thermal: &mut ThermalLedger,
        rng: &mut ChaCha8Rng,
        events: &mut EventQueue,
    ) {
        for (index, c) in compartments.iter().enumerate() {
            if c.temperature_k() >= self.config.autoignition_temp_k {
                self.ignite(CompartmentId(index as u16), c, FireKind::Materials, None, events);
            }
        }

        let cfg = &self.config;
        for (index, slot) in self.fires.iter_mut().enumerate() {
            let Some(fire) = slot.as_mut() else {
                continue;
            };
            let Some(c) = compartments.get_mut(index) else {
                continue;
            };
            let id = CompartmentId(index as u16);
            let o2 = c.fraction(Gas::O2);
            if o2 >= cfg.sustain_o2_fraction {
                let richness = ((o2 - cfg.sustain_o2_fraction) / cfg.sustain_o2_fraction).min(1.0);
                let growth = cfg.growth_per_s * fire.kind.growth_factor() * richness * (1.0 - fire.intensity);
                fire.intensity = (fire.intensity + growth * dt_s).min(1.0);
            } else {
                let starvation = 1.0 + 4.0 * (cfg.sustain_o2_fraction - o2) / cfg.sustain_o2_fraction;
                fire.intensity = (fire.intensity - cfg.decay_per_s * starvation * dt_s).max(0.0);
            }

            let burned = c.remove_gas(Gas::O2, cfg.o2_burn_kg_s * fire.intensity * dt_s);
            c.add_gas(Gas::Co2, burned * CO2_PER_O2);
            thermal.add_heat(HeatSink::Compartment(id), cfg.heat_w * fire.intensity * dt_s);

            if fire.intensity < cfg.extinguish_intensity {
                *slot = None;
                info!(compartment = c.name(), "fire burned out");
                events.push(Event::FireExtinguished { compartment: id });
            }
        }

        self.spread(dt_s, compartments, doors, rng, events);
    }

    /// Each open door next to a fire gives the far side a chance to catch,
    /// scaled by intensity, once it is hot enough. Doors are visited in
    /// configuration order so a seeded run repeats exactly.
    fn spread(
        &mut self,
        dt_s: f64,
        compartments: &[Compartment],
        doors: &[Door],
        rng: &mut ChaCha8Rng,
        events: &mut EventQueue,
    ) {
        for door in doors.iter().filter(|d| d.open) {
            for (from, to) in [(door.a, door.b), (door.b, door.a)] {
                let Some(Some(fire)) = self.fires.get(from.index()).copied() else {
                    continue;
                };
                if self.fires.get(to.index()).map_or(true, Option::is_some) {
                    continue;
                }
                let Some(target) = compartments.get(to.index()) else {
                    continue;
                };
                if target.temperature_k() < self.config.spread_temp_k
                    || target.fraction(Gas::O2) < self.config.ignition_o2_fraction
                {
                    continue;
                }
                let chance = (self.config.spread_chance_per_s * fire.intensity * dt_s).min(1.0);
                if rng.gen::<f64>() < chance {
                    self.ignite(to, target, fire.kind, Some(from), events);
                }
            }
        }
    }

    /// Spends one charge of `agent` on a compartment. Suppressing an empty
    /// compartment still displaces its oxygen.
    pub fn suppress(
        &mut self,
        id: CompartmentId,
        compartment: &mut Compartment,
        agent: SuppressionAgent,
        events: &mut EventQueue,
    ) -> CommandStatus {
        let charges = &mut self.charges[agent.index()];
        if *charges == 0 {
            return CommandStatus::Ignored("no suppression charges left");
        }
        *charges -= 1;

        let (knockdown, displaced) = agent.effect();
        let o2 = compartment.mass_kg(Gas::O2);
        let removed = compartment.remove_gas(Gas::O2, o2 * displaced);
        let removed_mol = removed / Gas::O2.molar_mass();
        match agent {
            // inert flood approximated as nitrogen, mole for mole
            SuppressionAgent::Halon => compartment.add_gas(Gas::N2, removed_mol * Gas::N2.molar_mass()),
            SuppressionAgent::Water => compartment.add_gas(Gas::H2o, self.config.water_steam_kg),
            SuppressionAgent::Co2Flood => compartment.add_gas(Gas::Co2, removed_mol * Gas::Co2.molar_mass()),
        }

        if let Some(slot) = self.fires.get_mut(id.index()) {
            if let Some(fire) = slot.as_mut() {
                fire.intensity *= knockdown;
                if fire.intensity < self.config.extinguish_intensity {
                    *slot = None;
                    info!(compartment = compartment.name(), ?agent, "fire extinguished");
                    events.push(Event::FireExtinguished { compartment: id });
                }
            }
        }
        CommandStatus::Accepted
    }

    pub fn intensity(&self, id: CompartmentId) -> f64 {
        self.fires
            .get(id.index())
            .copied()
            .flatten()
            .map_or(0.0, |f| f.intensity)
    }

    pub fn charges(&self, agent: SuppressionAgent) -> u32 {
        self.charges[agent.index()]
    }

    pub fn remaining_charges(&self) -> [(SuppressionAgent, u32); 3] {
        SuppressionAgent::ALL.map(|a| (a, self.charges(a)))
    }

    pub fn get_state(&self) -> Vec<FireState> {
        self.fires
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.map(|f| FireState {
                    compartment: CompartmentId(index as u16),
                    kind: f.kind,
                    intensity: f.intensity,
                })
            })
            .collect()
    }
}
