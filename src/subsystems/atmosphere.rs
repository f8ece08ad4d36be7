use super::fire::{FireConfig, FireKind, FireState, FireSystem, SuppressionAgent};
use super::life_support::{LifeSupport, LifeSupportConfig, LifeSupportState};
use super::{
    make_name, AppliedImpulse, CompartmentId, HeatSink, HydraulicSystem, ImpulseSource, LoopSide, Name,
    PowerNetwork, ThermalLedger, MAX_COMPARTMENTS,
};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue, LifeSupportUnit};
use crate::physics::{ideal_gas_pressure_pa, moles, Gas, GAS_CONSTANT};
use crate::protocol::CommandStatus;
use glam::DVec3;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const GAS_SLOTS: usize = Gas::ATMOSPHERIC.len();
/// Below this the remaining gas is dumped in one step.
const RESIDUAL_MASS_KG: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompartmentConfig {
    pub name: String,
    pub volume_m3: f64,
    pub position: DVec3,
    /// Air plus fittings; the thermal node behind the compartment.
    pub heat_capacity_j_per_k: f64,
    pub initial_temp_k: f64,
    pub o2_kg: f64,
    pub co2_kg: f64,
    pub n2_kg: f64,
    pub h2o_kg: f64,
    #[serde(default)]
    pub he_kg: f64,
    pub crew: u32,
    pub vent_area_m2: f64,
    /// Outward direction of gas leaving through the vent or a breach.
    pub vent_direction: DVec3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorConfig {
    pub a: String,
    pub b: String,
    pub area_m2: f64,
    pub open: bool,
    /// Loop driving the door actuator, if it is powered.
    pub hydraulic: Option<LoopSide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewMetabolism {
    pub o2_kg_s: f64,
    pub co2_kg_s: f64,
    pub h2o_kg_s: f64,
    pub heat_w: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtmosphereConfig {
    pub compartments: Vec<CompartmentConfig>,
    pub doors: Vec<DoorConfig>,
    pub discharge_coefficient: f64,
    /// Largest fraction of a compartment's gas that may cross one door per tick.
    pub mixing_cap_fraction: f64,
    /// Largest fraction of a compartment's gas that may leave overboard per tick.
    pub vent_cap_fraction: f64,
    pub exhaust_velocity_m_s: f64,
    pub depressurized_mass_kg: f64,
    pub repressurized_kpa: f64,
    pub door_actuation_l: f64,
    pub crew: CrewMetabolism,
    pub life_support: LifeSupportConfig,
    pub fire: FireConfig,
}

impl AtmosphereConfig {
    /// `(heat capacity, initial temperature)` of each compartment, in order.
    pub fn thermal_nodes(&self) -> Vec<(f64, f64)> {
        self.compartments
            .iter()
            .map(|c| (c.heat_capacity_j_per_k, c.initial_temp_k))
            .collect()
    }
}

/// One pressurized volume and its gas inventory.
#[derive(Debug, Clone)]
pub struct Compartment {
    name: Name,
    volume_m3: f64,
    position: DVec3,
    gas_kg: [f64; GAS_SLOTS],
    temperature_k: f64,
    crew: u32,
    vent_area_m2: f64,
    vent_direction: DVec3,
    vent_open: bool,
    breach_area_m2: f64,
    depressurized: bool,
}

impl Compartment {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn volume_m3(&self) -> f64 {
        self.volume_m3
    }

    pub fn temperature_k(&self) -> f64 {
        self.temperature_k
    }

    pub fn crew(&self) -> u32 {
        self.crew
    }

    pub(crate) fn set_temperature_k(&mut self, temperature_k: f64) {
        self.temperature_k = temperature_k;
    }

    pub fn mass_kg(&self, gas: Gas) -> f64 {
        self.gas_kg[gas.index()]
    }

    pub fn total_mass_kg(&self) -> f64 {
        self.gas_kg.iter().sum()
    }

    pub fn total_moles(&self) -> f64 {
        Gas::ATMOSPHERIC
            .iter()
            .zip(self.gas_kg.iter())
            .map(|(gas, kg)| moles(*gas, *kg))
            .sum()
    }

    pub fn pressure_pa(&self) -> f64 {
        ideal_gas_pressure_pa(self.total_moles(), self.temperature_k, self.volume_m3)
    }

    /// Mole fraction of `gas`, 0 in vacuum.
    pub fn fraction(&self, gas: Gas) -> f64 {
        let total = self.total_moles();
        if total <= 0.0 {
            return 0.0;
        }
        moles(gas, self.mass_kg(gas)) / total
    }

    pub fn add_gas(&mut self, gas: Gas, mass_kg: f64) {
        if mass_kg.is_finite() && mass_kg > 0.0 {
            self.gas_kg[gas.index()] += mass_kg;
        }
    }

    /// Removes up to `mass_kg` of `gas`, returning what was actually taken.
    pub fn remove_gas(&mut self, gas: Gas, mass_kg: f64) -> f64 {
        let i = gas.index();
        let taken = mass_kg.clamp(0.0, self.gas_kg[i]);
        self.gas_kg[i] -= taken;
        taken
    }

    /// Removes the same fraction of every species.
    fn remove_fraction(&mut self, fraction: f64) -> [f64; GAS_SLOTS] {
        let f = fraction.clamp(0.0, 1.0);
        let mut removed = [0.0; GAS_SLOTS];
        for (out, kg) in removed.iter_mut().zip(self.gas_kg.iter_mut()) {
            *out = *kg * f;
            *kg -= *out;
        }
        removed
    }

    fn add_masses(&mut self, masses: &[f64; GAS_SLOTS]) {
        for (kg, add) in self.gas_kg.iter_mut().zip(masses.iter()) {
            *kg += add;
        }
    }

    fn density_kg_m3(&self) -> f64 {
        self.total_mass_kg() / self.volume_m3
    }

    fn opening_m2(&self) -> f64 {
        self.breach_area_m2 + if self.vent_open { self.vent_area_m2 } else { 0.0 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Door {
    pub a: CompartmentId,
    pub b: CompartmentId,
    pub area_m2: f64,
    pub open: bool,
    pub hydraulic: Option<LoopSide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompartmentState {
    pub name: Name,
    pub pressure_kpa: f64,
    pub temperature_k: f64,
    pub o2_percent: f64,
    pub co2_percent: f64,
    pub total_mass_kg: f64,
    pub crew: u32,
    pub vent_open: bool,
    pub breach_area_m2: f64,
    pub depressurized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorState {
    pub a: CompartmentId,
    pub b: CompartmentId,
    pub open: bool,
}

/// Compartment atmospheres, the doors between them, crew, life support and
/// fire.
#[derive(Debug, Clone)]
pub struct AtmosphereSystem {
    compartments: Vec<Compartment>,
    doors: Vec<Door>,
    life_support: LifeSupport,
    fire: FireSystem,
    discharge_coefficient: f64,
    mixing_cap_fraction: f64,
    vent_cap_fraction: f64,
    exhaust_velocity_m_s: f64,
    depressurized_mass_kg: f64,
    repressurized_pa: f64,
    door_actuation_l: f64,
    crew: CrewMetabolism,
}

impl AtmosphereSystem {
    pub fn new(config: &AtmosphereConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        if config.compartments.len() > MAX_COMPARTMENTS {
            return Err(ConfigError::TooMany {
                kind: "compartments",
                count: config.compartments.len(),
                limit: MAX_COMPARTMENTS,
            });
        }
        let mut compartments = Vec::with_capacity(config.compartments.len());
        for c in &config.compartments {
            if c.volume_m3 <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("atmosphere.compartments.{}.volume_m3", c.name),
                    reason: "must be positive",
                });
            }
            let gas = [c.o2_kg, c.co2_kg, c.n2_kg, c.h2o_kg, c.he_kg];
            if gas.iter().any(|kg| !(*kg >= 0.0)) {
                return Err(ConfigError::InvalidValue {
                    field: format!("atmosphere.compartments.{}", c.name),
                    reason: "gas masses must be non-negative",
                });
            }
            compartments.push(Compartment {
                name: make_name(&c.name)?,
                volume_m3: c.volume_m3,
                position: c.position,
                gas_kg: gas,
                temperature_k: c.initial_temp_k,
                crew: c.crew,
                vent_area_m2: c.vent_area_m2,
                vent_direction: c.vent_direction.try_normalize().unwrap_or(DVec3::ZERO),
                vent_open: false,
                breach_area_m2: 0.0,
                depressurized: false,
            });
        }

        let mut doors = Vec::with_capacity(config.doors.len());
        for d in &config.doors {
            let referrer = format!("door {}-{}", d.a, d.b);
            let (a, b) = (resolver.compartment(&d.a, &referrer)?, resolver.compartment(&d.b, &referrer)?);
            if a == b {
                return Err(ConfigError::InvalidValue {
                    field: referrer,
                    reason: "door must join two different compartments",
                });
            }
            doors.push(Door {
                a,
                b,
                area_m2: d.area_m2,
                open: d.open,
                hydraulic: d.hydraulic,
            });
        }

        let mut system = Self {
            life_support: LifeSupport::new(&config.life_support, resolver)?,
            fire: FireSystem::new(&config.fire, compartments.len()),
            compartments,
            doors,
            discharge_coefficient: config.discharge_coefficient,
            mixing_cap_fraction: config.mixing_cap_fraction,
            vent_cap_fraction: config.vent_cap_fraction,
            exhaust_velocity_m_s: config.exhaust_velocity_m_s,
            depressurized_mass_kg: config.depressurized_mass_kg,
            repressurized_pa: config.repressurized_kpa * 1000.0,
            door_actuation_l: config.door_actuation_l,
            crew: config.crew.clone(),
        };
        for c in &mut system.compartments {
            c.depressurized = c.total_mass_kg() < system.depressurized_mass_kg;
        }
        Ok(system)
    }

    pub fn update(
        &mut self,
        dt_s: f64,
        thermal: &mut ThermalLedger,
        power: &PowerNetwork,
        rng: &mut ChaCha8Rng,
        impulses: &mut Vec<AppliedImpulse>,
        events: &mut EventQueue,
    ) {
        for (index, c) in self.compartments.iter_mut().enumerate() {
            c.set_temperature_k(thermal.compartment_temperature(CompartmentId(index as u16)));
        }

        self.breathe(dt_s, thermal);
        self.life_support.update(dt_s, &mut self.compartments, power, events);
        self.fire.update(dt_s, &mut self.compartments, &self.doors, thermal, rng, events);
        self.mix_through_doors(dt_s);
        self.vent_overboard(dt_s, impulses);
        self.track_depressurization(events);
    }

    fn breathe(&mut self, dt_s: f64, thermal: &mut ThermalLedger) {
        for (index, c) in self.compartments.iter_mut().enumerate() {
            if c.crew == 0 {
                continue;
            }
            let crew = f64::from(c.crew);
            let wanted = self.crew.o2_kg_s * crew * dt_s;
            let inhaled = c.remove_gas(Gas::O2, wanted);
            let share = if wanted > 0.0 { inhaled / wanted } else { 0.0 };
            c.add_gas(Gas::Co2, self.crew.co2_kg_s * crew * dt_s * share);
            c.add_gas(Gas::H2o, self.crew.h2o_kg_s * crew * dt_s * share);
            thermal.add_heat(
                HeatSink::Compartment(CompartmentId(index as u16)),
                self.crew.heat_w * crew * dt_s,
            );
        }
    }

    /// Moves gas from the higher to the lower pressure side of each open door,
    /// never past pressure equality and never more than the per-tick cap.
    fn mix_through_doors(&mut self, dt_s: f64) {
        for door in &self.doors {
            if !door.open {
                continue;
            }
            let (a, b) = (door.a.index(), door.b.index());
            let (pa, pb) = (self.compartments[a].pressure_pa(), self.compartments[b].pressure_pa());
            let (src, dst) = if pa > pb { (a, b) } else { (b, a) };
            let dp = (pa - pb).abs();
            let source = &self.compartments[src];
            let dest = &self.compartments[dst];
            let n_src = source.total_moles();
            if dp <= 0.0 || n_src <= 0.0 {
                continue;
            }

            let flow_kg_s =
                self.discharge_coefficient * door.area_m2 * (2.0 * source.density_kg_m3() * dp).sqrt();
            let by_flow = flow_kg_s * dt_s / source.total_mass_kg();
            let equalizing_moles = dp
                / (GAS_CONSTANT * source.temperature_k / source.volume_m3
                    + GAS_CONSTANT * dest.temperature_k / dest.volume_m3);
            let by_equality = equalizing_moles / n_src;
            let fraction = by_flow.min(by_equality).min(self.mixing_cap_fraction);

            let moved = self.compartments[src].remove_fraction(fraction);
            self.compartments[dst].add_masses(&moved);
        }
    }

    fn vent_overboard(&mut self, dt_s: f64, impulses: &mut Vec<AppliedImpulse>) {
        for (index, c) in self.compartments.iter_mut().enumerate() {
            let opening = c.opening_m2();
            let mass = c.total_mass_kg();
            if opening <= 0.0 || mass <= 0.0 {
                continue;
            }
            let fraction = if mass < RESIDUAL_MASS_KG {
                1.0
            } else {
                let flow_kg_s =
                    self.discharge_coefficient * opening * (2.0 * c.density_kg_m3() * c.pressure_pa()).sqrt();
                (flow_kg_s * dt_s / mass).min(self.vent_cap_fraction)
            };
            let lost: f64 = c.remove_fraction(fraction).iter().sum();

            let id = CompartmentId(index as u16);
            let source = if c.vent_open { ImpulseSource::Vent(id) } else { ImpulseSource::HullBreach(id) };
            impulses.push(AppliedImpulse {
                source,
                position: c.position,
                impulse_ns: -c.vent_direction * lost * self.exhaust_velocity_m_s,
            });
        }
    }

    fn track_depressurization(&mut self, events: &mut EventQueue) {
        for (index, c) in self.compartments.iter_mut().enumerate() {
            let compartment = CompartmentId(index as u16);
            if !c.depressurized && c.total_mass_kg() < self.depressurized_mass_kg {
                c.depressurized = true;
                warn!(compartment = %c.name, "compartment depressurized");
                events.push(Event::CompartmentDepressurized { compartment });
            } else if c.depressurized && c.pressure_pa() >= self.repressurized_pa {
                c.depressurized = false;
                info!(compartment = %c.name, "compartment repressurized");
                events.push(Event::CompartmentRepressurized { compartment });
            }
        }
    }

    fn door_index(&self, a: CompartmentId, b: CompartmentId) -> Option<usize> {
        self.doors
            .iter()
            .position(|d| (d.a == a && d.b == b) || (d.a == b && d.b == a))
    }

    pub fn set_door(
        &mut self,
        a: CompartmentId,
        b: CompartmentId,
        open: bool,
        hydraulics: &mut HydraulicSystem,
    ) -> CommandStatus {
        let Some(index) = self.door_index(a, b) else {
            return CommandStatus::Ignored("no door between compartments");
        };
        let door = &mut self.doors[index];
        if door.open == open {
            return CommandStatus::Accepted;
        }
        if let Some(side) = door.hydraulic {
            if !hydraulics.request_actuation(side, self.door_actuation_l) {
                return CommandStatus::Ignored("hydraulic pressure too low to move door");
            }
        }
        door.open = open;
        CommandStatus::Accepted
    }

    pub fn toggle_door(&mut self, a: CompartmentId, b: CompartmentId, hydraulics: &mut HydraulicSystem) -> CommandStatus {
        match self.door_index(a, b) {
            Some(index) => {
                let open = !self.doors[index].open;
                self.set_door(a, b, open, hydraulics)
            }
            None => CommandStatus::Ignored("no door between compartments"),
        }
    }

    pub fn set_vent(&mut self, compartment: CompartmentId, open: bool) -> CommandStatus {
        match self.compartments.get_mut(compartment.index()) {
            Some(c) if c.vent_area_m2 > 0.0 => {
                if open && !c.vent_open {
                    warn!(compartment = %c.name, "emergency vent opened");
                }
                c.vent_open = open;
                CommandStatus::Accepted
            }
            Some(_) => CommandStatus::Ignored("compartment has no vent"),
            None => CommandStatus::Ignored("unknown compartment"),
        }
    }

    pub fn breach(&mut self, compartment: CompartmentId, area_m2: f64, events: &mut EventQueue) {
        if let Some(c) = self.compartments.get_mut(compartment.index()) {
            if area_m2 > 0.0 && area_m2.is_finite() {
                c.breach_area_m2 += area_m2;
                warn!(compartment = %c.name, area_m2, "hull breach");
                events.push(Event::HullBreach { compartment, area_m2 });
            }
        }
    }

    pub fn seal_breach(&mut self, compartment: CompartmentId) {
        if let Some(c) = self.compartments.get_mut(compartment.index()) {
            c.breach_area_m2 = 0.0;
        }
    }

    pub fn add_gas(&mut self, compartment: CompartmentId, gas: Gas, mass_kg: f64) {
        if let Some(c) = self.compartments.get_mut(compartment.index()) {
            c.add_gas(gas, mass_kg);
        }
    }

    pub fn suppress_fire(
        &mut self,
        compartment: CompartmentId,
        agent: SuppressionAgent,
        events: &mut EventQueue,
    ) -> CommandStatus {
        match self.compartments.get_mut(compartment.index()) {
            Some(c) => self.fire.suppress(compartment, c, agent, events),
            None => CommandStatus::Ignored("unknown compartment"),
        }
    }

    pub fn start_fire(&mut self, compartment: CompartmentId, kind: FireKind, events: &mut EventQueue) -> bool {
        match self.compartments.get(compartment.index()) {
            Some(c) => self.fire.ignite(compartment, c, kind, None, events),
            None => false,
        }
    }

    pub fn set_life_support(&mut self, unit: LifeSupportUnit, enabled: bool) -> CommandStatus {
        self.life_support.set_enabled(unit, enabled)
    }

    pub fn life_support_demands(&self) -> impl Iterator<Item = (super::BreakerId, f64)> + '_ {
        self.life_support.power_demands()
    }

    pub fn compartment(&self, id: CompartmentId) -> Option<&Compartment> {
        self.compartments.get(id.index())
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    pub fn suppression_charges(&self) -> [(SuppressionAgent, u32); 3] {
        self.fire.remaining_charges()
    }

    pub fn compartment_count(&self) -> usize {
        self.compartments.len()
    }

    pub fn pressure_pa(&self, id: CompartmentId) -> f64 {
        self.compartment(id).map_or(0.0, Compartment::pressure_pa)
    }

    pub fn position(&self, id: CompartmentId) -> DVec3 {
        self.compartment(id).map_or(DVec3::ZERO, |c| c.position)
    }

    pub fn total_mass_kg(&self) -> f64 {
        self.compartments.iter().map(Compartment::total_mass_kg).sum()
    }

    pub fn fire_intensity(&self, id: CompartmentId) -> f64 {
        self.fire.intensity(id)
    }

    pub fn is_depressurized(&self, id: CompartmentId) -> bool {
        self.compartment(id).is_some_and(|c| c.depressurized)
    }

    pub fn get_state(&self) -> Vec<CompartmentState> {
        self.compartments
            .iter()
            .map(|c| CompartmentState {
                name: c.name,
                pressure_kpa: c.pressure_pa() / 1000.0,
                temperature_k: c.temperature_k,
                o2_percent: c.fraction(Gas::O2) * 100.0,
                co2_percent: c.fraction(Gas::Co2) * 100.0,
                total_mass_kg: c.total_mass_kg(),
                crew: c.crew,
                vent_open: c.vent_open,
                breach_area_m2: c.breach_area_m2,
                depressurized: c.depressurized,
            })
            .collect()
    }

    pub fn door_states(&self) -> Vec<DoorState> {
        self.doors
            .iter()
            .map(|d| DoorState { a: d.a, b: d.b, open: d.open })
            .collect()
    }

    pub fn fire_state(&self) -> Vec<FireState> {
        self.fire.get_state()
    }

    pub fn life_support_state(&self) -> LifeSupportState {
        self.life_support.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VesselConfig;
    use rand::SeedableRng;

    struct Rig {
        atmosphere: AtmosphereSystem,
        thermal: ThermalLedger,
        power: PowerNetwork,
        hydraulics: HydraulicSystem,
        rng: ChaCha8Rng,
    }

    fn build_rig(config: &VesselConfig) -> Rig {
        let resolver = Resolver::new(config).unwrap();
        Rig {
            atmosphere: AtmosphereSystem::new(&config.atmosphere, &resolver).unwrap(),
            thermal: ThermalLedger::new(&config.thermal, &config.atmosphere.thermal_nodes(), &resolver).unwrap(),
            power: PowerNetwork::new(&config.power, &resolver).unwrap(),
            hydraulics: HydraulicSystem::new(&config.hydraulics, &resolver).unwrap(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
        }
    }

    fn step(rig: &mut Rig, dt_s: f64, impulses: &mut Vec<AppliedImpulse>, events: &mut EventQueue) {
        rig.thermal.update(dt_s);
        rig.atmosphere.update(dt_s, &mut rig.thermal, &rig.power, &mut rig.rng, impulses, events);
    }

    #[test]
    fn test_open_door_equalizes_without_overshoot() {
        let mut config = VesselConfig::default();
        for door in &mut config.atmosphere.doors {
            door.open = false;
        }
        config.atmosphere.compartments[1].o2_kg *= 0.5;
        config.atmosphere.compartments[1].n2_kg *= 0.5;
        let mut rig = build_rig(&config);
        let (a, b) = (CompartmentId(0), CompartmentId(1));
        let total = rig.atmosphere.total_mass_kg();
        assert_eq!(rig.atmosphere.set_door(a, b, true, &mut rig.hydraulics), CommandStatus::Accepted);

        let mut events = EventQueue::new();
        let mut impulses = Vec::new();
        let mut gap = rig.atmosphere.pressure_pa(a) - rig.atmosphere.pressure_pa(b);
        assert!(gap > 0.0);
        for _ in 0..200 {
            step(&mut rig, 0.1, &mut impulses, &mut events);
            let now = rig.atmosphere.pressure_pa(a) - rig.atmosphere.pressure_pa(b);
            assert!(now >= -1.0, "overshoot: {}", now);
            assert!(now <= gap + 1.0);
            gap = now;
        }
        assert!(gap.abs() < 500.0);
        // crew breathing shifts species, not total mass
        let drift = (rig.atmosphere.total_mass_kg() - total).abs();
        assert!(drift < 0.1, "mass drift {}", drift);
    }

    #[test]
    fn test_vent_strictly_drains_and_pushes_back() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        let airlock = rig
            .atmosphere
            .compartments
            .iter()
            .position(|c| c.vent_area_m2 > 0.0)
            .map(|i| CompartmentId(i as u16))
            .unwrap();
        for door in &mut rig.atmosphere.doors {
            door.open = false;
        }
        assert_eq!(rig.atmosphere.set_vent(airlock, true), CommandStatus::Accepted);
        let mut events = EventQueue::new();
        let mut impulses = Vec::new();
        let mut last = rig.atmosphere.compartment(airlock).unwrap().total_mass_kg();
        for _ in 0..5 {
            step(&mut rig, 0.1, &mut impulses, &mut events);
            let now = rig.atmosphere.compartment(airlock).unwrap().total_mass_kg();
            assert!(now < last);
            last = now;
        }
        assert_eq!(impulses.len(), 5);
        let direction = config.atmosphere.compartments[airlock.index()].vent_direction;
        assert!(impulses[0].impulse_ns.dot(direction) < 0.0);
    }

    #[test]
    fn test_breach_depressurizes_once() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        for door in &mut rig.atmosphere.doors {
            door.open = false;
        }
        let mut events = EventQueue::new();
        let mut impulses = Vec::new();
        rig.atmosphere.breach(CompartmentId(0), 0.05, &mut events);
        for _ in 0..600 {
            step(&mut rig, 0.1, &mut impulses, &mut events);
        }
        assert!(rig.atmosphere.is_depressurized(CompartmentId(0)));
        let count = events
            .iter()
            .filter(|e| **e == Event::CompartmentDepressurized { compartment: CompartmentId(0) })
            .count();
        assert_eq!(count, 1);
        assert!(matches!(impulses[0].source, ImpulseSource::HullBreach(_)));
    }

    #[test]
    fn test_hydraulic_door_needs_pressure() {
        let mut config = VesselConfig::default();
        for lp in &mut config.hydraulics.loops {
            lp.initial_pressure_bar = 0.0;
        }
        let mut rig = build_rig(&config);
        let door = config
            .atmosphere
            .doors
            .iter()
            .position(|d| d.hydraulic.is_some())
            .unwrap();
        let (a, b) = (rig.atmosphere.doors[door].a, rig.atmosphere.doors[door].b);
        let before = rig.atmosphere.doors[door].open;
        assert!(matches!(rig.atmosphere.toggle_door(a, b, &mut rig.hydraulics), CommandStatus::Ignored(_)));
        assert_eq!(rig.atmosphere.doors[door].open, before);
    }

    #[test]
    fn test_unknown_door_ignored() {
        let config = VesselConfig::default();
        let mut rig = build_rig(&config);
        assert!(matches!(
            rig.atmosphere.toggle_door(CompartmentId(0), CompartmentId(0), &mut rig.hydraulics),
            CommandStatus::Ignored(_)
        ));
    }
}
