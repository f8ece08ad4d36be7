//! The vessel: owns every subsystem and advances them in dependency order.
//!
//! Each tick runs Thermal, Power, Fluids, Propulsion and Atmosphere, then
//! damage and repairs, then telemetry and the safety monitor. Every subsystem
//! reads the state its upstream neighbours left at the end of the previous
//! step, so coupling lags by one tick.

use crate::config::{Resolver, VesselConfig};
use crate::error::ConfigError;
use crate::events::{Event, EventHistory, EventQueue, EventRecord};
use crate::fault_injection::{Damage, FaultInjector, RepairTarget};
use crate::protocol::{Command, CommandEnvelope, CommandStatus, DamageRequest, RepairRequest, ResponseStatus};
use crate::safety::{SafetyMonitor, SafetyThresholds};
use crate::scheduler::{is_due, CommandScheduler, TickDivisors};
use crate::subsystems::fire::FireKind;
use crate::subsystems::gas::GasRelease;
use crate::subsystems::{
    AppliedImpulse, AtmosphereSystem, BottleId, BreakerId, CompartmentId, CoolantSystem, FuelSystem, GasSystem,
    HydraulicSystem, MainEngine, PowerNetwork, RcsArray, TankId, ThermalLedger, ThrusterId,
};
use crate::telemetry::{PropulsionOutput, TelemetrySnapshot};
use glam::DVec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What happened during one call to [`Vessel::step`].
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub time_s: f64,
    pub events: Vec<EventRecord>,
    pub impulses: Vec<AppliedImpulse>,
    pub events_dropped: u32,
}

pub struct Vessel {
    resolver: Resolver,
    dt_s: f64,
    divisors: TickDivisors,
    tick: u64,

    thermal: ThermalLedger,
    power: PowerNetwork,
    fuel: FuelSystem,
    hydraulics: HydraulicSystem,
    coolant: CoolantSystem,
    gas: GasSystem,
    engine: MainEngine,
    rcs: RcsArray,
    atmosphere: AtmosphereSystem,

    events: EventQueue,
    history: EventHistory,
    rng: ChaCha8Rng,
    impulses: Vec<AppliedImpulse>,
    gas_releases: Vec<GasRelease>,

    scheduler: CommandScheduler,
    faults: FaultInjector,
    safety: SafetyMonitor,
    telemetry: TelemetrySnapshot,
}

impl Vessel {
    pub fn new(config: VesselConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = Resolver::new(&config)?;

        let thermal = ThermalLedger::new(&config.thermal, &config.atmosphere.thermal_nodes(), &resolver)?;
        let power = PowerNetwork::new(&config.power, &resolver)?;
        let fuel = FuelSystem::new(&config.fuel, &thermal, &resolver)?;
        let hydraulics = HydraulicSystem::new(&config.hydraulics, &resolver)?;
        let coolant = CoolantSystem::new(&config.coolant, &resolver)?;
        let gas = GasSystem::new(&config.gas, &thermal, &resolver)?;
        let engine = MainEngine::new(&config.engine, &resolver)?;
        let rcs = RcsArray::new(&config.rcs, &resolver)?;
        let atmosphere = AtmosphereSystem::new(&config.atmosphere, &resolver)?;

        let thresholds = SafetyThresholds {
            reactor_caution_temp_k: 0.9 * config.power.reactor.scram_temp_k,
            hydraulic_min_bar: [
                config.hydraulics.loops[0].min_pressure_bar,
                config.hydraulics.loops[1].min_pressure_bar,
            ],
            ..SafetyThresholds::default()
        };

        info!(
            seed = config.seed,
            dt_s = config.tick_dt_s,
            compartments = atmosphere.compartment_count(),
            breakers = power.breaker_count(),
            "vessel initialized"
        );

        let mut vessel = Self {
            resolver,
            dt_s: config.tick_dt_s,
            divisors: config.divisors,
            tick: 0,
            thermal,
            power,
            fuel,
            hydraulics,
            coolant,
            gas,
            engine,
            rcs,
            atmosphere,
            events: EventQueue::new(),
            history: EventHistory::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            impulses: Vec::new(),
            gas_releases: Vec::new(),
            scheduler: CommandScheduler::new(),
            faults: FaultInjector::new(config.fault_injection.clone(), config.seed),
            safety: SafetyMonitor::new(thresholds),
            telemetry: placeholder_snapshot(),
        };
        vessel.telemetry = vessel.snapshot();
        Ok(vessel)
    }

    /// Advances the simulation by one fixed step.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;
        self.events.begin_tick(tick);
        self.impulses.clear();

        for command in self.scheduler.take_ready(tick) {
            let status = self.execute(&command);
            debug!(tick, ?command, ?status, "scheduled command applied");
        }
        self.scheduler.cleanup_expired(tick);

        let divisors = self.divisors;
        if is_due(tick, divisors.power) {
            self.power.heat_reactor(self.dt_s * f64::from(divisors.power), &mut self.thermal);
        }
        if is_due(tick, divisors.thermal) {
            self.thermal.update(self.dt_s * f64::from(divisors.thermal));
        }
        if is_due(tick, divisors.power) {
            self.report_power_demands();
            self.power.update(self.dt_s * f64::from(divisors.power), &mut self.thermal, &mut self.events);
        }
        if is_due(tick, divisors.fluids) {
            self.update_fluids(self.dt_s * f64::from(divisors.fluids));
        }
        if is_due(tick, divisors.propulsion) {
            let dt = self.dt_s * f64::from(divisors.propulsion);
            self.engine.update(dt, &mut self.fuel, &mut self.thermal, &mut self.events);
            self.rcs.update(dt, &mut self.fuel, &self.power, &mut self.events);
        }
        if is_due(tick, divisors.atmosphere) {
            self.atmosphere.update(
                self.dt_s * f64::from(divisors.atmosphere),
                &mut self.thermal,
                &self.power,
                &mut self.rng,
                &mut self.impulses,
                &mut self.events,
            );
        }
        self.resolve_damage();

        let events_dropped = self.events.dropped();
        let records = self.events.drain();
        for record in &records {
            self.history.record(*record);
        }
        let mut snapshot = self.snapshot();
        snapshot.safety = self.safety.update(tick, &snapshot, &records).clone();
        self.telemetry = snapshot;

        TickReport {
            tick,
            time_s: self.time_s(),
            events: records,
            impulses: self.impulses.clone(),
            events_dropped,
        }
    }

    /// Runs `ticks` steps and returns every event produced on the way.
    pub fn run_for(&mut self, ticks: u64) -> Vec<EventRecord> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            events.extend(self.step().events);
        }
        events
    }

    fn report_power_demands(&mut self) {
        for (breaker, watts) in self.hydraulics.power_demands() {
            self.power.report_demand(breaker, watts);
        }
        for (breaker, watts) in self.coolant.power_demands() {
            self.power.report_demand(breaker, watts);
        }
        for (breaker, watts) in self.atmosphere.life_support_demands() {
            self.power.report_demand(breaker, watts);
        }
    }

    fn update_fluids(&mut self, dt: f64) {
        self.fuel.update(dt, &self.thermal, &mut self.events);
        self.hydraulics.update(dt, &self.power, &mut self.events);
        self.coolant.update(dt, &self.power, &mut self.thermal, &mut self.events);
        self.gas.update(
            dt,
            &self.thermal,
            &self.atmosphere,
            &mut self.gas_releases,
            &mut self.impulses,
            &mut self.events,
        );
        for release in self.gas_releases.drain(..) {
            self.atmosphere.add_gas(release.compartment, release.gas, release.mass_kg);
        }
    }

    fn resolve_damage(&mut self) {
        let rolled = self.faults.roll(self.dt_s, self.atmosphere.compartment_count());
        for damage in rolled {
            self.apply_damage(damage);
        }
        for target in self.faults.advance_repairs() {
            self.clear_damage(target);
            self.events.push(Event::RepairCompleted { target });
        }
    }

    fn apply_damage(&mut self, damage: Damage) -> CommandStatus {
        if !self.faults.can_track(&damage) {
            warn!(?damage, "damage table full");
            return CommandStatus::Ignored("damage table full");
        }
        match damage {
            Damage::HullBreach { compartment, area_m2 } => {
                if area_m2 <= 0.0 {
                    return CommandStatus::Ignored("breach area must be positive");
                }
                self.atmosphere.breach(compartment, area_m2, &mut self.events);
            }
            Damage::HydraulicLeak { side, rate_l_s } => self.hydraulics.set_leak(side, rate_l_s.max(0.0)),
            Damage::CoolantLeak { side, rate_kg_s } => self.coolant.set_leak(side, rate_kg_s.max(0.0)),
            Damage::ElectricalFire { compartment } => {
                if !self.atmosphere.start_fire(compartment, FireKind::Electrical, &mut self.events) {
                    return CommandStatus::Ignored("fire could not start");
                }
            }
        }
        self.faults.record(&damage, self.tick);
        self.events.push(Event::DamageInjected { damage });
        CommandStatus::Accepted
    }

    fn clear_damage(&mut self, target: RepairTarget) {
        match target {
            RepairTarget::HullBreach(compartment) => self.atmosphere.seal_breach(compartment),
            RepairTarget::HydraulicLeak(side) => self.hydraulics.set_leak(side, 0.0),
            RepairTarget::CoolantLeak(side) => self.coolant.set_leak(side, 0.0),
        }
    }

    fn snapshot(&self) -> TelemetrySnapshot {
        let impulse_ns = self.impulses.iter().fold(DVec3::ZERO, |sum, i| sum + i.impulse_ns);
        TelemetrySnapshot {
            tick: self.tick,
            time_s: self.time_s(),
            thermal: self.thermal.component_states(),
            power: self.power.get_state(&self.thermal),
            fuel: self.fuel.get_state(),
            hydraulics: self.hydraulics.get_state(),
            coolant: self.coolant.get_state(),
            gas: self.gas.get_state(),
            engine: self.engine.get_state(),
            rcs: self.rcs.get_state(),
            propulsion: PropulsionOutput {
                force_n: self.engine.thrust_vector_n() + self.rcs.net_force_n(),
                torque_nm: self.engine.torque_nm() + self.rcs.net_torque_nm(),
                impulse_ns,
            },
            compartments: self.atmosphere.get_state(),
            doors: self.atmosphere.door_states(),
            fires: self.atmosphere.fire_state(),
            suppression: self.atmosphere.suppression_charges().to_vec(),
            life_support: self.atmosphere.life_support_state(),
            safety: self.safety.get_state().clone(),
        }
    }

    /// Applies a command now. Unknown names and failed preconditions are
    /// reported as ignored and leave all state untouched.
    pub fn execute(&mut self, command: &Command) -> CommandStatus {
        if command.validate().is_err() {
            return CommandStatus::Ignored("non-finite argument");
        }
        match command {
            Command::SetBreaker { breaker, on } => match self.breaker(breaker) {
                Some(id) => self.power.set_breaker(id, *on),
                None => CommandStatus::Ignored("unknown breaker"),
            },
            Command::ToggleBreaker { breaker } => match self.breaker(breaker) {
                Some(id) => self.power.toggle_breaker(id),
                None => CommandStatus::Ignored("unknown breaker"),
            },
            Command::ResetBreaker { breaker } => match self.breaker(breaker) {
                Some(id) => self.power.reset_breaker(id),
                None => CommandStatus::Ignored("unknown breaker"),
            },
            Command::SetCrosstie { bus, enabled } => self.power.set_crosstie(*bus, *enabled),
            Command::StartReactor => self.power.start_reactor(&mut self.events),
            Command::SetReactorThrottle { throttle } => self.power.set_reactor_throttle(*throttle),
            Command::ScramReactor => self.power.scram_reactor(&mut self.events),
            Command::ResetReactor => self.power.reset_reactor(&self.thermal, &mut self.events),
            Command::ShutdownReactor => self.power.shutdown_reactor(),
            Command::SetValve { tank, valve, open } => match self.tank(tank) {
                Some(id) => self.fuel.set_valve(id, *valve, *open),
                None => CommandStatus::Ignored("unknown tank"),
            },
            Command::SetCrossfeed { tank, target } => {
                let Some(id) = self.tank(tank) else {
                    return CommandStatus::Ignored("unknown tank");
                };
                match target.as_deref().map(|name| self.tank(name)) {
                    None => self.fuel.set_crossfeed(id, None),
                    Some(Some(target)) => self.fuel.set_crossfeed(id, Some(target)),
                    Some(None) => CommandStatus::Ignored("unknown tank"),
                }
            }
            Command::SetHydraulicPump { side, on } => self.hydraulics.set_pump(*side, *on),
            Command::SetHydraulicCrossConnect { open } => self.hydraulics.set_cross_connect(*open),
            Command::SetCoolantPump { side, on } => self.coolant.set_pump(*side, *on),
            Command::SetCoolantCrossConnect { open } => self.coolant.set_cross_connect(*open),
            Command::SetRadiators { side, deployed } => self.coolant.set_radiators(*side, *deployed),
            Command::SetRegulator { bottle, open } => match self.bottle(bottle) {
                Some(id) => self.gas.set_regulator(id, *open),
                None => CommandStatus::Ignored("unknown bottle"),
            },
            Command::IgniteEngine => self.engine.ignite(&self.fuel, &self.power, &mut self.events),
            Command::ShutdownEngine => self.engine.shutdown(&mut self.events),
            Command::SetEngineThrottle { throttle } => self.engine.set_throttle(*throttle),
            Command::SetGimbal { x_deg, y_deg } => self.engine.set_gimbal(*x_deg, *y_deg, &mut self.hydraulics),
            Command::FireThruster { thruster, active } => match self.thruster(thruster) {
                Some(id) => self.rcs.fire(id, *active),
                None => CommandStatus::Ignored("unknown thruster"),
            },
            Command::SetDoor { a, b, open } => match (self.compartment(a), self.compartment(b)) {
                (Some(a), Some(b)) => self.atmosphere.set_door(a, b, *open, &mut self.hydraulics),
                _ => CommandStatus::Ignored("unknown compartment"),
            },
            Command::ToggleDoor { a, b } => match (self.compartment(a), self.compartment(b)) {
                (Some(a), Some(b)) => self.atmosphere.toggle_door(a, b, &mut self.hydraulics),
                _ => CommandStatus::Ignored("unknown compartment"),
            },
            Command::SuppressFire { compartment, agent } => match self.compartment(compartment) {
                Some(id) => self.atmosphere.suppress_fire(id, *agent, &mut self.events),
                None => CommandStatus::Ignored("unknown compartment"),
            },
            Command::SetVent { compartment, open } => match self.compartment(compartment) {
                Some(id) => self.atmosphere.set_vent(id, *open),
                None => CommandStatus::Ignored("unknown compartment"),
            },
            Command::SetLifeSupport { unit, enabled } => self.atmosphere.set_life_support(*unit, *enabled),
            Command::InjectDamage { damage } => match self.resolve_damage_request(damage) {
                Some(damage) => self.apply_damage(damage),
                None => CommandStatus::Ignored("unknown compartment"),
            },
            Command::StartRepair { target } => match self.resolve_repair_request(target) {
                Some(target) => {
                    let ticks = (self.faults.repair_time_s() / self.dt_s).ceil().max(1.0) as u64;
                    self.faults.start_repair(target, ticks)
                }
                None => CommandStatus::Ignored("unknown compartment"),
            },
            Command::AbortRepair { target } => match self.resolve_repair_request(target) {
                Some(target) => self.faults.abort_repair(target),
                None => CommandStatus::Ignored("unknown compartment"),
            },
            Command::SetFaultInjection { enabled } => {
                self.faults.set_enabled(*enabled);
                CommandStatus::Accepted
            }
            Command::AcknowledgeAlarms => {
                self.safety.acknowledge();
                self.telemetry.safety = self.safety.get_state().clone();
                CommandStatus::Accepted
            }
        }
    }

    /// Applies or queues an enveloped command depending on its execution tick.
    pub fn submit(&mut self, envelope: CommandEnvelope) -> ResponseStatus {
        match envelope.execute_at_tick {
            Some(at) if at > self.tick => match self.schedule(envelope.command, at) {
                Ok(()) => ResponseStatus::Scheduled,
                Err(reason) => ResponseStatus::NegativeAck(reason),
            },
            _ => self.execute(&envelope.command).into(),
        }
    }

    /// Queues `command` to run at the start of tick `at_tick`.
    pub fn schedule(&mut self, command: Command, at_tick: u64) -> Result<(), &'static str> {
        self.scheduler
            .schedule_command(command, at_tick, self.tick + 1)
            .map_err(|e| e.as_str())
    }

    fn resolve_damage_request(&self, request: &DamageRequest) -> Option<Damage> {
        Some(match request {
            DamageRequest::HullBreach { compartment, area_m2 } => Damage::HullBreach {
                compartment: self.compartment(compartment)?,
                area_m2: *area_m2,
            },
            DamageRequest::HydraulicLeak { side, rate_l_s } => Damage::HydraulicLeak {
                side: *side,
                rate_l_s: *rate_l_s,
            },
            DamageRequest::CoolantLeak { side, rate_kg_s } => Damage::CoolantLeak {
                side: *side,
                rate_kg_s: *rate_kg_s,
            },
            DamageRequest::ElectricalFire { compartment } => Damage::ElectricalFire {
                compartment: self.compartment(compartment)?,
            },
        })
    }

    fn resolve_repair_request(&self, request: &RepairRequest) -> Option<RepairTarget> {
        Some(match request {
            RepairRequest::HullBreach { compartment } => RepairTarget::HullBreach(self.compartment(compartment)?),
            RepairRequest::HydraulicLeak { side } => RepairTarget::HydraulicLeak(*side),
            RepairRequest::CoolantLeak { side } => RepairTarget::CoolantLeak(*side),
        })
    }

    fn breaker(&self, name: &str) -> Option<BreakerId> {
        self.resolver.find_breaker(name)
    }

    fn tank(&self, name: &str) -> Option<TankId> {
        self.resolver.find_tank(name)
    }

    fn bottle(&self, name: &str) -> Option<BottleId> {
        self.resolver.find_bottle(name)
    }

    fn thruster(&self, name: &str) -> Option<ThrusterId> {
        self.resolver.find_thruster(name)
    }

    fn compartment(&self, name: &str) -> Option<CompartmentId> {
        self.resolver.find_compartment(name)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn time_s(&self) -> f64 {
        self.tick as f64 * self.dt_s
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    /// Snapshot produced at the end of the last tick.
    pub fn telemetry(&self) -> &TelemetrySnapshot {
        &self.telemetry
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn thermal(&self) -> &ThermalLedger {
        &self.thermal
    }

    pub fn power(&self) -> &PowerNetwork {
        &self.power
    }

    pub fn fuel(&self) -> &FuelSystem {
        &self.fuel
    }

    pub fn hydraulics(&self) -> &HydraulicSystem {
        &self.hydraulics
    }

    pub fn coolant(&self) -> &CoolantSystem {
        &self.coolant
    }

    pub fn gas(&self) -> &GasSystem {
        &self.gas
    }

    pub fn engine(&self) -> &MainEngine {
        &self.engine
    }

    pub fn rcs(&self) -> &RcsArray {
        &self.rcs
    }

    pub fn atmosphere(&self) -> &AtmosphereSystem {
        &self.atmosphere
    }

    pub fn event_history(&self) -> &[EventRecord] {
        self.history.records()
    }

    pub fn safety(&self) -> &SafetyMonitor {
        &self.safety
    }

    pub fn scheduler(&self) -> &CommandScheduler {
        &self.scheduler
    }

    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }
}

fn placeholder_snapshot() -> TelemetrySnapshot {
    use crate::safety::SafetyState;
    use crate::subsystems::engine::EngineState;
    use crate::subsystems::life_support::{LifeSupportState, UnitStatus};
    use crate::subsystems::power::{PowerState, ReactorState, StorageState};
    use crate::subsystems::ReactorStatus;

    TelemetrySnapshot {
        tick: 0,
        time_s: 0.0,
        thermal: Vec::new(),
        power: PowerState {
            reactor: ReactorState {
                status: ReactorStatus::Offline,
                throttle: 0.0,
                output_kw: 0.0,
                temperature_k: 0.0,
                fuel_percent: 0.0,
                startup_remaining_s: 0.0,
            },
            buses: Vec::new(),
            breakers: Vec::new(),
            storage: StorageState {
                battery_kwh: 0.0,
                battery_capacity_kwh: 0.0,
                battery_percent: 0.0,
                capacitor_kj: 0.0,
                capacitor_capacity_kj: 0.0,
            },
            generation_kw: 0.0,
            total_load_kw: 0.0,
            net_kw: 0.0,
            supply_ratio: 1.0,
            blackout: false,
        },
        fuel: Vec::new(),
        hydraulics: Vec::new(),
        coolant: Vec::new(),
        gas: Vec::new(),
        engine: EngineState {
            ignited: false,
            throttle: 0.0,
            gimbal_deg: [0.0; 2],
            chamber_temp_k: 0.0,
            chamber_pressure_bar: 0.0,
            nozzle_efficiency: 1.0,
            thrust_n: 0.0,
            thrust_vector_n: DVec3::ZERO,
        },
        rcs: Vec::new(),
        propulsion: PropulsionOutput::default(),
        compartments: Vec::new(),
        doors: Vec::new(),
        fires: Vec::new(),
        suppression: Vec::new(),
        life_support: LifeSupportState {
            water_kg: 0.0,
            scrubber_capacity_kg: 0.0,
            oxygen_generator: UnitStatus::Standby,
            co2_scrubber: UnitStatus::Standby,
            water_recycler: UnitStatus::Standby,
        },
        safety: SafetyState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::subsystems::ReactorStatus;

    fn vessel() -> Vessel {
        Vessel::new(VesselConfig::default()).unwrap()
    }

    #[test]
    fn test_step_advances_time() {
        let mut vessel = vessel();
        let report = vessel.step();
        assert_eq!(report.tick, 1);
        assert!((report.time_s - 0.1).abs() < 1e-12);
        assert_eq!(vessel.telemetry().tick, 1);
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let mut vessel = vessel();
        let status = vessel.execute(&Command::SetBreaker { breaker: "nope".into(), on: false });
        assert_eq!(status, CommandStatus::Ignored("unknown breaker"));
        let status = vessel.execute(&Command::SetDoor { a: "habitat".into(), b: "mars".into(), open: true });
        assert_eq!(status, CommandStatus::Ignored("unknown compartment"));
    }

    #[test]
    fn test_reactor_reaches_online_through_commands() {
        let mut vessel = vessel();
        assert!(vessel.execute(&Command::StartReactor).is_accepted());
        vessel.run_for(60);
        assert_eq!(vessel.power().reactor_status(), ReactorStatus::Online);
    }

    #[test]
    fn test_scheduled_command_runs_on_its_tick() {
        let mut vessel = vessel();
        vessel.schedule(Command::StartReactor, 3).unwrap();
        vessel.step();
        vessel.step();
        assert_eq!(vessel.power().reactor_status(), ReactorStatus::Offline);
        let report = vessel.step();
        assert_eq!(vessel.power().reactor_status(), ReactorStatus::Starting);
        assert!(report.events.iter().any(|r| r.event == Event::ReactorStartupBegun));
    }

    #[test]
    fn test_submit_distinguishes_now_and_later() {
        let mut vessel = vessel();
        let now = CommandEnvelope { id: 1, execute_at_tick: None, command: Command::StartReactor };
        assert_eq!(vessel.submit(now), ResponseStatus::Acknowledged);
        let later = CommandEnvelope { id: 2, execute_at_tick: Some(50), command: Command::ScramReactor };
        assert_eq!(vessel.submit(later), ResponseStatus::Scheduled);
        assert_eq!(vessel.scheduler().get_scheduled_commands().len(), 1);
    }

    #[test]
    fn test_breach_repair_cycle() {
        let mut vessel = vessel();
        let breach = Command::InjectDamage {
            damage: DamageRequest::HullBreach { compartment: "engineering".into(), area_m2: 0.001 },
        };
        assert!(vessel.execute(&breach).is_accepted());
        let repair = Command::StartRepair { target: RepairRequest::HullBreach { compartment: "engineering".into() } };
        assert!(vessel.execute(&repair).is_accepted());

        let ticks = (vessel.faults().repair_time_s() / vessel.dt_s()).ceil() as u64;
        let events = vessel.run_for(ticks);
        assert!(events.iter().any(|r| matches!(r.event, Event::RepairCompleted { .. })));
        let engineering = vessel.telemetry().compartment("engineering").unwrap();
        assert_eq!(engineering.breach_area_m2, 0.0);
    }

    #[test]
    fn test_same_seed_reproduces_run() {
        let mut config = VesselConfig::default();
        config.fault_injection.enabled = true;
        config.fault_injection.breach_rate_per_hour = 200.0;
        config.fault_injection.electrical_fire_rate_per_hour = 200.0;
        let mut a = Vessel::new(config.clone()).unwrap();
        let mut b = Vessel::new(config).unwrap();
        for _ in 0..300 {
            let ra = a.step();
            let rb = b.step();
            assert_eq!(ra.events, rb.events);
        }
        assert_eq!(a.atmosphere().total_mass_kg(), b.atmosphere().total_mass_kg());
    }

    #[test]
    fn test_acknowledge_updates_published_state() {
        let mut vessel = vessel();
        vessel.execute(&Command::InjectDamage {
            damage: DamageRequest::ElectricalFire { compartment: "habitat".into() },
        });
        vessel.step();
        assert!(vessel.telemetry().safety.unacknowledged);
        vessel.execute(&Command::AcknowledgeAlarms);
        assert!(!vessel.telemetry().safety.unacknowledged);
    }
}
