use super::{make_name, BreakerId, BusSide, ComponentId, HeatSink, Name, ThermalLedger};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::events::{Event, EventQueue};
use crate::protocol::CommandStatus;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const EMPTY_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorConfig {
    pub max_output_kw: f64,
    /// Electrical output divided by thermal power.
    pub efficiency: f64,
    pub scram_temp_k: f64,
    /// SCRAM reset is refused at or above this temperature.
    pub reset_temp_k: f64,
    pub startup_s: f64,
    pub startup_heat_kw: f64,
    pub fuel_fraction: f64,
    /// Fuel fraction burned per kWh of electrical output.
    pub burnup_per_kwh: f64,
    pub component: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    pub nominal_voltage_v: f64,
    pub capacity_kw: f64,
    pub crosstie_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub name: String,
    pub bus: BusSide,
    pub load_w: f64,
    pub essential: bool,
    pub trip_threshold_a: f64,
    pub on: bool,
    /// Component that receives the consumer's dissipation.
    pub heat_component: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatteryConfig {
    pub capacity_kwh: f64,
    pub charge_kwh: f64,
    pub max_charge_kw: f64,
    pub max_discharge_kw: f64,
    pub efficiency: f64,
    pub component: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacitorConfig {
    pub capacity_kj: f64,
    pub charge_kj: f64,
    pub max_rate_kw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerConfig {
    pub reactor: ReactorConfig,
    pub buses: [BusConfig; 2],
    pub breakers: Vec<BreakerConfig>,
    pub battery: BatteryConfig,
    pub capacitor: CapacitorConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactorStatus {
    Offline,
    Starting,
    Online,
    Scrammed,
}

#[derive(Debug, Clone)]
struct Reactor {
    throttle: f64,
    output_kw: f64,
    status: ReactorStatus,
    startup_remaining_s: f64,
    fuel_fraction: f64,
    max_output_kw: f64,
    efficiency: f64,
    scram_temp_k: f64,
    reset_temp_k: f64,
    startup_s: f64,
    startup_heat_kw: f64,
    burnup_per_kwh: f64,
    component: ComponentId,
}

#[derive(Debug, Clone)]
struct Bus {
    nominal_voltage_v: f64,
    voltage_v: f64,
    capacity_kw: f64,
    load_kw: f64,
    crosstie_enabled: bool,
    overloaded: bool,
}

#[derive(Debug, Clone)]
struct Breaker {
    name: Name,
    bus: BusSide,
    on: bool,
    tripped: bool,
    load_w: f64,
    essential: bool,
    trip_threshold_a: f64,
    heat_component: Option<ComponentId>,
}

#[derive(Debug, Clone)]
struct Battery {
    charge_kwh: f64,
    capacity_kwh: f64,
    max_charge_kw: f64,
    max_discharge_kw: f64,
    efficiency: f64,
    component: Option<ComponentId>,
}

#[derive(Debug, Clone)]
struct CapacitorBank {
    charge_kj: f64,
    capacity_kj: f64,
    max_rate_kw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorState {
    pub status: ReactorStatus,
    pub throttle: f64,
    pub output_kw: f64,
    pub temperature_k: f64,
    pub fuel_percent: f64,
    pub startup_remaining_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusState {
    pub side: BusSide,
    pub voltage_v: f64,
    pub capacity_kw: f64,
    pub load_kw: f64,
    pub load_percent: f64,
    pub crosstie_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerState {
    pub name: Name,
    pub bus: BusSide,
    pub on: bool,
    pub tripped: bool,
    pub load_w: f64,
    pub essential: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageState {
    pub battery_kwh: f64,
    pub battery_capacity_kwh: f64,
    pub battery_percent: f64,
    pub capacitor_kj: f64,
    pub capacitor_capacity_kj: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerState {
    pub reactor: ReactorState,
    pub buses: Vec<BusState>,
    pub breakers: Vec<BreakerState>,
    pub storage: StorageState,
    pub generation_kw: f64,
    pub total_load_kw: f64,
    pub net_kw: f64,
    pub supply_ratio: f64,
    pub blackout: bool,
}

/// Reactor, storage and the two distribution buses with their breakers.
#[derive(Debug, Clone)]
pub struct PowerNetwork {
    reactor: Reactor,
    buses: [Bus; 2],
    breakers: Vec<Breaker>,
    battery: Battery,
    capacitor: CapacitorBank,
    generation_kw: f64,
    total_load_kw: f64,
    net_kw: f64,
    supply_ratio: f64,
    blacked_out: bool,
    reactor_temp_k: f64,
}

impl PowerNetwork {
    pub fn new(config: &PowerConfig, resolver: &Resolver) -> Result<Self, ConfigError> {
        let r = &config.reactor;
        if r.efficiency <= 0.0 || r.efficiency > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "power.reactor.efficiency".to_string(),
                reason: "must be in (0, 1]",
            });
        }
        if r.reset_temp_k >= r.scram_temp_k {
            return Err(ConfigError::InvalidValue {
                field: "power.reactor.reset_temp_k".to_string(),
                reason: "must be below scram_temp_k",
            });
        }
        let reactor = Reactor {
            throttle: 0.0,
            output_kw: 0.0,
            status: ReactorStatus::Offline,
            startup_remaining_s: 0.0,
            fuel_fraction: r.fuel_fraction.clamp(0.0, 1.0),
            max_output_kw: r.max_output_kw,
            efficiency: r.efficiency,
            scram_temp_k: r.scram_temp_k,
            reset_temp_k: r.reset_temp_k,
            startup_s: r.startup_s,
            startup_heat_kw: r.startup_heat_kw,
            burnup_per_kwh: r.burnup_per_kwh,
            component: resolver.component(&r.component, "reactor")?,
        };

        let buses = [
            Self::bus_from(&config.buses[0], "power.buses[0]")?,
            Self::bus_from(&config.buses[1], "power.buses[1]")?,
        ];

        let mut breakers = Vec::with_capacity(config.breakers.len());
        for b in &config.breakers {
            if b.trip_threshold_a <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("power.breakers.{}.trip_threshold_a", b.name),
                    reason: "must be positive",
                });
            }
            let heat_component = match &b.heat_component {
                Some(name) => Some(resolver.component(name, &b.name)?),
                None => None,
            };
            breakers.push(Breaker {
                name: make_name(&b.name)?,
                bus: b.bus,
                on: b.on,
                tripped: false,
                load_w: b.load_w.max(0.0),
                essential: b.essential,
                trip_threshold_a: b.trip_threshold_a,
                heat_component,
            });
        }

        let bat = &config.battery;
        let battery = Battery {
            charge_kwh: bat.charge_kwh.clamp(0.0, bat.capacity_kwh),
            capacity_kwh: bat.capacity_kwh,
            max_charge_kw: bat.max_charge_kw,
            max_discharge_kw: bat.max_discharge_kw,
            efficiency: bat.efficiency.clamp(0.0, 1.0),
            component: match &bat.component {
                Some(name) => Some(resolver.component(name, "battery")?),
                None => None,
            },
        };
        let cap = &config.capacitor;
        let capacitor = CapacitorBank {
            charge_kj: cap.charge_kj.clamp(0.0, cap.capacity_kj),
            capacity_kj: cap.capacity_kj,
            max_rate_kw: cap.max_rate_kw,
        };

        Ok(Self {
            reactor,
            buses,
            breakers,
            battery,
            capacitor,
            generation_kw: 0.0,
            total_load_kw: 0.0,
            net_kw: 0.0,
            supply_ratio: 1.0,
            blacked_out: false,
            reactor_temp_k: 0.0,
        })
    }

    fn bus_from(config: &BusConfig, field: &str) -> Result<Bus, ConfigError> {
        if config.nominal_voltage_v <= 0.0 || config.capacity_kw <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "voltage and capacity must be positive",
            });
        }
        Ok(Bus {
            nominal_voltage_v: config.nominal_voltage_v,
            voltage_v: config.nominal_voltage_v,
            capacity_kw: config.capacity_kw,
            load_kw: 0.0,
            crosstie_enabled: config.crosstie_enabled,
            overloaded: false,
        })
    }

    /// Queues the core's heat for the coming tick. Runs before
    /// [`ThermalLedger::update`] so the core warms in the same tick that
    /// [`update`](Self::update) checks it against the SCRAM limit.
    pub fn heat_reactor(&self, dt_s: f64, thermal: &mut ThermalLedger) {
        let reactor = &self.reactor;
        let heat_kw = match reactor.status {
            ReactorStatus::Starting => reactor.startup_heat_kw,
            ReactorStatus::Online if reactor.fuel_fraction > 0.0 => {
                reactor.max_output_kw * reactor.throttle * (1.0 / reactor.efficiency - 1.0)
            }
            _ => 0.0,
        };
        thermal.add_heat(HeatSink::Component(reactor.component), heat_kw * 1000.0 * dt_s);
    }

    pub fn update(&mut self, dt_s: f64, thermal: &mut ThermalLedger, events: &mut EventQueue) {
        self.reactor_temp_k = thermal.component_temperature(self.reactor.component);
        self.update_reactor(dt_s, events);
        self.trip_overcurrent(events);
        self.recompute_bus_loads(events);
        self.balance_storage(dt_s, thermal, events);
        self.dissipate_consumer_heat(dt_s, thermal);
    }

    fn update_reactor(&mut self, dt_s: f64, events: &mut EventQueue) {
        let temperature = self.reactor_temp_k;
        let reactor = &mut self.reactor;
        match reactor.status {
            ReactorStatus::Offline | ReactorStatus::Scrammed => {
                reactor.output_kw = 0.0;
            }
            ReactorStatus::Starting => {
                reactor.output_kw = 0.0;
                if temperature >= reactor.scram_temp_k {
                    reactor.status = ReactorStatus::Offline;
                    reactor.startup_remaining_s = 0.0;
                    warn!(temperature_k = temperature, "reactor startup aborted on overtemperature");
                    events.push(Event::ReactorStartupAborted { temperature_k: temperature });
                    return;
                }
                reactor.startup_remaining_s -= dt_s;
                if reactor.startup_remaining_s <= EMPTY_EPSILON {
                    reactor.startup_remaining_s = 0.0;
                    reactor.status = ReactorStatus::Online;
                    info!("reactor online");
                    events.push(Event::ReactorOnline);
                }
            }
            ReactorStatus::Online => {
                if temperature >= reactor.scram_temp_k {
                    Self::scram(reactor, temperature, false, events);
                    return;
                }
                if reactor.fuel_fraction <= 0.0 {
                    reactor.status = ReactorStatus::Offline;
                    reactor.output_kw = 0.0;
                    reactor.throttle = 0.0;
                    warn!("reactor fuel depleted");
                    events.push(Event::ReactorFuelDepleted);
                    return;
                }
                reactor.output_kw = reactor.max_output_kw * reactor.throttle;
                let burned = reactor.burnup_per_kwh * reactor.output_kw * dt_s / 3600.0;
                reactor.fuel_fraction = (reactor.fuel_fraction - burned).max(0.0);
            }
        }
    }

    fn scram(reactor: &mut Reactor, temperature_k: f64, manual: bool, events: &mut EventQueue) {
        reactor.status = ReactorStatus::Scrammed;
        reactor.throttle = 0.0;
        reactor.output_kw = 0.0;
        warn!(temperature_k, manual, "reactor SCRAM");
        events.push(Event::ReactorScram { temperature_k, manual });
    }

    fn trip_overcurrent(&mut self, events: &mut EventQueue) {
        for (index, breaker) in self.breakers.iter_mut().enumerate() {
            if !breaker.on {
                continue;
            }
            let bus = &self.buses[breaker.bus.index()];
            let current_a = implied_current_a(breaker.load_w, bus.voltage_v, bus.nominal_voltage_v);
            if current_a > breaker.trip_threshold_a {
                breaker.on = false;
                breaker.tripped = true;
                warn!(breaker = %breaker.name, current_a, "breaker tripped");
                events.push(Event::BreakerTripped {
                    breaker: BreakerId(index as u16),
                    current_a,
                });
            }
        }
    }

    fn recompute_bus_loads(&mut self, events: &mut EventQueue) {
        let mut loads = [0.0_f64; 2];
        for breaker in self.breakers.iter().filter(|b| b.on) {
            loads[breaker.bus.index()] += breaker.load_w / 1000.0;
        }
        if self.buses[0].crosstie_enabled && self.buses[1].crosstie_enabled {
            let shared = (loads[0] + loads[1]) / 2.0;
            loads = [shared, shared];
        }
        for (index, bus) in self.buses.iter_mut().enumerate() {
            bus.load_kw = loads[index];
            let overloaded = bus.load_kw > bus.capacity_kw;
            bus.voltage_v = if overloaded {
                bus.nominal_voltage_v * bus.capacity_kw / bus.load_kw
            } else {
                bus.nominal_voltage_v
            };
            if overloaded && !bus.overloaded {
                let side = if index == 0 { BusSide::A } else { BusSide::B };
                warn!(?side, load_kw = bus.load_kw, "bus overload");
                events.push(Event::BusOverload { bus: side, load_kw: bus.load_kw });
            }
            bus.overloaded = overloaded;
        }
        self.total_load_kw = loads[0] + loads[1];
    }

    fn balance_storage(&mut self, dt_s: f64, thermal: &mut ThermalLedger, events: &mut EventQueue) {
        self.generation_kw = self.reactor.output_kw;
        self.net_kw = self.generation_kw - self.total_load_kw;
        if dt_s <= 0.0 {
            return;
        }

        if self.net_kw < 0.0 {
            let mut unmet_kw = -self.net_kw;

            let cap = &mut self.capacitor;
            let from_cap = unmet_kw.min(cap.max_rate_kw).min(cap.charge_kj / dt_s);
            cap.charge_kj = (cap.charge_kj - from_cap * dt_s).max(0.0);
            unmet_kw -= from_cap;

            let bat = &mut self.battery;
            let from_bat = unmet_kw
                .min(bat.max_discharge_kw)
                .min(bat.charge_kwh * 3600.0 / dt_s);
            bat.charge_kwh = (bat.charge_kwh - from_bat * dt_s / 3600.0).max(0.0);
            unmet_kw -= from_bat;
            if let Some(component) = bat.component {
                thermal.add_heat(
                    HeatSink::Component(component),
                    from_bat * (1.0 - bat.efficiency) * 1000.0 * dt_s,
                );
            }

            self.supply_ratio = if self.total_load_kw > 0.0 {
                ((self.total_load_kw - unmet_kw) / self.total_load_kw).clamp(0.0, 1.0)
            } else {
                1.0
            };

            if self.battery.charge_kwh <= EMPTY_EPSILON && !self.blacked_out {
                self.enter_blackout(events);
            }
        } else {
            let mut surplus_kw = self.net_kw;

            let cap = &mut self.capacitor;
            let into_cap = surplus_kw
                .min(cap.max_rate_kw)
                .min((cap.capacity_kj - cap.charge_kj) / dt_s);
            cap.charge_kj = (cap.charge_kj + into_cap * dt_s).min(cap.capacity_kj);
            surplus_kw -= into_cap;

            let bat = &mut self.battery;
            let room_kw = (bat.capacity_kwh - bat.charge_kwh) * 3600.0 / dt_s;
            let into_bat = surplus_kw.min(bat.max_charge_kw).min(room_kw / bat.efficiency.max(EMPTY_EPSILON));
            bat.charge_kwh =
                (bat.charge_kwh + into_bat * bat.efficiency * dt_s / 3600.0).min(bat.capacity_kwh);
            if let Some(component) = bat.component {
                thermal.add_heat(
                    HeatSink::Component(component),
                    into_bat * (1.0 - bat.efficiency) * 1000.0 * dt_s,
                );
            }

            self.supply_ratio = 1.0;
            if self.blacked_out && self.battery.charge_kwh > EMPTY_EPSILON {
                self.blacked_out = false;
                info!("power restored");
                events.push(Event::PowerRestored);
            }
        }

        debug_assert!(
            (0.0..=self.battery.capacity_kwh).contains(&self.battery.charge_kwh),
            "battery charge {} outside [0, {}]",
            self.battery.charge_kwh,
            self.battery.capacity_kwh
        );
        debug_assert!(
            (0.0..=self.capacitor.capacity_kj).contains(&self.capacitor.charge_kj),
            "capacitor charge {} outside [0, {}]",
            self.capacitor.charge_kj,
            self.capacitor.capacity_kj
        );
    }

    fn enter_blackout(&mut self, events: &mut EventQueue) {
        self.blacked_out = true;
        let mut shed = 0;
        for breaker in self.breakers.iter_mut().filter(|b| b.on && !b.essential) {
            breaker.on = false;
            shed += 1;
        }
        warn!(shed, "blackout: non-essential breakers opened");
        events.push(Event::Blackout);
    }

    fn dissipate_consumer_heat(&self, dt_s: f64, thermal: &mut ThermalLedger) {
        for breaker in self.breakers.iter().filter(|b| b.on) {
            if let Some(component) = breaker.heat_component {
                thermal.add_heat(
                    HeatSink::Component(component),
                    breaker.load_w * self.supply_ratio * dt_s,
                );
            }
        }
    }

    /// Fraction of its demand a consumer on `breaker` receives this tick.
    pub fn availability(&self, breaker: BreakerId) -> f64 {
        match self.breakers.get(breaker.index()) {
            Some(b) if b.on => self.supply_ratio,
            _ => 0.0,
        }
    }

    pub fn is_powered(&self, breaker: BreakerId) -> bool {
        self.availability(breaker) > 0.0
    }

    /// Updates a consumer's demand; counted against its bus on the next update.
    pub fn report_demand(&mut self, breaker: BreakerId, watts: f64) {
        if let Some(b) = self.breakers.get_mut(breaker.index()) {
            if watts.is_finite() {
                b.load_w = watts.max(0.0);
            }
        }
    }

    pub fn toggle_breaker(&mut self, breaker: BreakerId) -> CommandStatus {
        let Some(b) = self.breakers.get(breaker.index()) else {
            return CommandStatus::Ignored("unknown breaker");
        };
        let target = !b.on;
        self.set_breaker(breaker, target)
    }

    pub fn set_breaker(&mut self, breaker: BreakerId, on: bool) -> CommandStatus {
        let Some(b) = self.breakers.get_mut(breaker.index()) else {
            return CommandStatus::Ignored("unknown breaker");
        };
        if !on && b.essential {
            return CommandStatus::Ignored("essential breaker cannot be opened");
        }
        b.on = on;
        if on {
            b.tripped = false;
        }
        CommandStatus::Accepted
    }

    /// Recloses a breaker that tripped on overcurrent.
    pub fn reset_breaker(&mut self, breaker: BreakerId) -> CommandStatus {
        match self.breakers.get(breaker.index()) {
            Some(b) if b.tripped => self.set_breaker(breaker, true),
            Some(_) => CommandStatus::Ignored("breaker not tripped"),
            None => CommandStatus::Ignored("unknown breaker"),
        }
    }

    pub fn set_crosstie(&mut self, bus: BusSide, enabled: bool) -> CommandStatus {
        self.buses[bus.index()].crosstie_enabled = enabled;
        CommandStatus::Accepted
    }

    pub fn start_reactor(&mut self, events: &mut EventQueue) -> CommandStatus {
        if self.reactor.status != ReactorStatus::Offline {
            return CommandStatus::Ignored("reactor not offline");
        }
        if self.reactor.fuel_fraction <= 0.0 {
            return CommandStatus::Ignored("reactor fuel depleted");
        }
        self.reactor.status = ReactorStatus::Starting;
        self.reactor.startup_remaining_s = self.reactor.startup_s;
        info!(startup_s = self.reactor.startup_s, "reactor startup begun");
        events.push(Event::ReactorStartupBegun);
        CommandStatus::Accepted
    }

    pub fn set_reactor_throttle(&mut self, throttle: f64) -> CommandStatus {
        if !throttle.is_finite() {
            return CommandStatus::Ignored("throttle not finite");
        }
        if self.reactor.status == ReactorStatus::Scrammed {
            return CommandStatus::Ignored("reactor scrammed");
        }
        self.reactor.throttle = throttle.clamp(0.0, 1.0);
        CommandStatus::Accepted
    }

    pub fn scram_reactor(&mut self, events: &mut EventQueue) -> CommandStatus {
        if self.reactor.status != ReactorStatus::Online {
            return CommandStatus::Ignored("reactor not online");
        }
        let temperature = self.reactor_temp_k;
        Self::scram(&mut self.reactor, temperature, true, events);
        CommandStatus::Accepted
    }

    /// Clears a SCRAM once the core has cooled. Returns to online at zero throttle.
    pub fn reset_reactor(&mut self, thermal: &ThermalLedger, events: &mut EventQueue) -> CommandStatus {
        if self.reactor.status != ReactorStatus::Scrammed {
            return CommandStatus::Ignored("reactor not scrammed");
        }
        let temperature = thermal.component_temperature(self.reactor.component);
        if temperature >= self.reactor.reset_temp_k {
            return CommandStatus::Ignored("reactor too hot to reset");
        }
        self.reactor.status = ReactorStatus::Online;
        self.reactor.throttle = 0.0;
        info!(temperature_k = temperature, "reactor reset");
        events.push(Event::ReactorReset);
        CommandStatus::Accepted
    }

    /// Orderly shutdown; also aborts a startup in progress.
    pub fn shutdown_reactor(&mut self) -> CommandStatus {
        match self.reactor.status {
            ReactorStatus::Online | ReactorStatus::Starting => {
                self.reactor.status = ReactorStatus::Offline;
                self.reactor.startup_remaining_s = 0.0;
                self.reactor.throttle = 0.0;
                self.reactor.output_kw = 0.0;
                CommandStatus::Accepted
            }
            _ => CommandStatus::Ignored("reactor not running"),
        }
    }

    pub fn reactor_status(&self) -> ReactorStatus {
        self.reactor.status
    }

    pub fn reactor_output_kw(&self) -> f64 {
        self.reactor.output_kw
    }

    pub fn reactor_component(&self) -> ComponentId {
        self.reactor.component
    }

    pub fn reactor_scram_temp_k(&self) -> f64 {
        self.reactor.scram_temp_k
    }

    pub fn battery_charge_kwh(&self) -> f64 {
        self.battery.charge_kwh
    }

    pub fn battery_fraction(&self) -> f64 {
        if self.battery.capacity_kwh > 0.0 {
            self.battery.charge_kwh / self.battery.capacity_kwh
        } else {
            0.0
        }
    }

    pub fn supply_ratio(&self) -> f64 {
        self.supply_ratio
    }

    pub fn breaker_on(&self, breaker: BreakerId) -> bool {
        self.breakers.get(breaker.index()).is_some_and(|b| b.on)
    }

    pub fn breaker_count(&self) -> usize {
        self.breakers.len()
    }

    pub fn get_state(&self, thermal: &ThermalLedger) -> PowerState {
        let reactor = &self.reactor;
        PowerState {
            reactor: ReactorState {
                status: reactor.status,
                throttle: reactor.throttle,
                output_kw: reactor.output_kw,
                temperature_k: thermal.component_temperature(reactor.component),
                fuel_percent: reactor.fuel_fraction * 100.0,
                startup_remaining_s: reactor.startup_remaining_s,
            },
            buses: [BusSide::A, BusSide::B]
                .iter()
                .map(|&side| {
                    let bus = &self.buses[side.index()];
                    BusState {
                        side,
                        voltage_v: bus.voltage_v,
                        capacity_kw: bus.capacity_kw,
                        load_kw: bus.load_kw,
                        load_percent: bus.load_kw / bus.capacity_kw * 100.0,
                        crosstie_enabled: bus.crosstie_enabled,
                    }
                })
                .collect(),
            breakers: self
                .breakers
                .iter()
                .map(|b| BreakerState {
                    name: b.name,
                    bus: b.bus,
                    on: b.on,
                    tripped: b.tripped,
                    load_w: b.load_w,
                    essential: b.essential,
                })
                .collect(),
            storage: StorageState {
                battery_kwh: self.battery.charge_kwh,
                battery_capacity_kwh: self.battery.capacity_kwh,
                battery_percent: self.battery_fraction() * 100.0,
                capacitor_kj: self.capacitor.charge_kj,
                capacitor_capacity_kj: self.capacitor.capacity_kj,
            },
            generation_kw: self.generation_kw,
            total_load_kw: self.total_load_kw,
            net_kw: self.net_kw,
            supply_ratio: self.supply_ratio,
            blackout: self.blacked_out,
        }
    }
}

/// Current drawn by a load at the bus voltage, falling back to nominal when
/// the bus has collapsed.
pub fn implied_current_a(load_w: f64, voltage_v: f64, nominal_voltage_v: f64) -> f64 {
    let voltage = if voltage_v > 0.0 { voltage_v } else { nominal_voltage_v };
    load_w / voltage
}
