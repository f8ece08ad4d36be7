//! Wire form of operator commands and their acknowledgements.
//!
//! Commands address entities by name. The vessel resolves names once per
//! command and answers with a [`CommandStatus`]; a rejected command leaves all
//! state untouched.

use crate::config::Resolver;
use crate::error::ProtocolError;
use crate::events::LifeSupportUnit;
use crate::subsystems::fire::SuppressionAgent;
use crate::subsystems::fuel::Valve;
use crate::subsystems::{BusSide, LoopSide};
use arrayvec::ArrayString;
use serde::{Deserialize, Serialize};

pub const MAX_COMMAND_SIZE: usize = 1024;

pub type CommandBuffer = ArrayString<MAX_COMMAND_SIZE>;

/// Outcome of applying one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum CommandStatus {
    Accepted,
    /// Precondition failed; nothing changed.
    Ignored(&'static str),
}

impl CommandStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DamageRequest {
    HullBreach { compartment: String, area_m2: f64 },
    HydraulicLeak { side: LoopSide, rate_l_s: f64 },
    CoolantLeak { side: LoopSide, rate_kg_s: f64 },
    ElectricalFire { compartment: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepairRequest {
    HullBreach { compartment: String },
    HydraulicLeak { side: LoopSide },
    CoolantLeak { side: LoopSide },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SetBreaker { breaker: String, on: bool },
    ToggleBreaker { breaker: String },
    ResetBreaker { breaker: String },
    SetCrosstie { bus: BusSide, enabled: bool },
    StartReactor,
    SetReactorThrottle { throttle: f64 },
    ScramReactor,
    ResetReactor,
    ShutdownReactor,
    SetValve { tank: String, valve: Valve, open: bool },
    SetCrossfeed { tank: String, target: Option<String> },
    SetHydraulicPump { side: LoopSide, on: bool },
    SetHydraulicCrossConnect { open: bool },
    SetCoolantPump { side: LoopSide, on: bool },
    SetCoolantCrossConnect { open: bool },
    SetRadiators { side: LoopSide, deployed: bool },
    SetRegulator { bottle: String, open: bool },
    IgniteEngine,
    ShutdownEngine,
    SetEngineThrottle { throttle: f64 },
    SetGimbal { x_deg: f64, y_deg: f64 },
    FireThruster { thruster: String, active: bool },
    SetDoor { a: String, b: String, open: bool },
    ToggleDoor { a: String, b: String },
    SuppressFire { compartment: String, agent: SuppressionAgent },
    SetVent { compartment: String, open: bool },
    SetLifeSupport { unit: LifeSupportUnit, enabled: bool },
    InjectDamage { damage: DamageRequest },
    StartRepair { target: RepairRequest },
    AbortRepair { target: RepairRequest },
    SetFaultInjection { enabled: bool },
    AcknowledgeAlarms,
}

/// A command plus its operator-assigned id and optional execution tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: u32,
    #[serde(default)]
    pub execute_at_tick: Option<u64>,
    #[serde(flatten)]
    pub command: Command,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub id: u32,
    pub tick: u64,
    #[serde(flatten)]
    pub status: ResponseStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "ack", content = "reason", rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Applied on receipt.
    Acknowledged,
    /// Queued for a later tick.
    Scheduled,
    NegativeAck(&'static str),
}

impl From<CommandStatus> for ResponseStatus {
    fn from(status: CommandStatus) -> Self {
        match status {
            CommandStatus::Accepted => ResponseStatus::Acknowledged,
            CommandStatus::Ignored(reason) => ResponseStatus::NegativeAck(reason),
        }
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ProtocolError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ProtocolError::InvalidValue { field })
    }
}

impl Command {
    /// Rejects numeric arguments no subsystem could clamp into range.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Command::SetReactorThrottle { throttle } | Command::SetEngineThrottle { throttle } => {
                finite("throttle", *throttle)
            }
            Command::SetGimbal { x_deg, y_deg } => {
                finite("x_deg", *x_deg)?;
                finite("y_deg", *y_deg)
            }
            Command::InjectDamage { damage } => match damage {
                DamageRequest::HullBreach { area_m2, .. } => finite("area_m2", *area_m2),
                DamageRequest::HydraulicLeak { rate_l_s, .. } => finite("rate_l_s", *rate_l_s),
                DamageRequest::CoolantLeak { rate_kg_s, .. } => finite("rate_kg_s", *rate_kg_s),
                DamageRequest::ElectricalFire { .. } => Ok(()),
            },
            _ => Ok(()),
        }
    }

    /// Checks every entity the command names against a vessel's tables, so a
    /// script can be rejected before any of it runs.
    pub fn check_names(&self, resolver: &Resolver) -> Result<(), ProtocolError> {
        fn known<T>(kind: &'static str, name: &str, found: Option<T>) -> Result<(), ProtocolError> {
            match found {
                Some(_) => Ok(()),
                None => Err(ProtocolError::UnknownName { kind, name: name.to_string() }),
            }
        }
        let compartment = |name: &str| known("compartment", name, resolver.find_compartment(name));
        match self {
            Command::SetBreaker { breaker, .. }
            | Command::ToggleBreaker { breaker }
            | Command::ResetBreaker { breaker } => known("breaker", breaker, resolver.find_breaker(breaker)),
            Command::SetValve { tank, .. } => known("tank", tank, resolver.find_tank(tank)),
            Command::SetCrossfeed { tank, target } => {
                known("tank", tank, resolver.find_tank(tank))?;
                match target {
                    Some(target) => known("tank", target, resolver.find_tank(target)),
                    None => Ok(()),
                }
            }
            Command::SetRegulator { bottle, .. } => known("bottle", bottle, resolver.find_bottle(bottle)),
            Command::FireThruster { thruster, .. } => {
                known("thruster", thruster, resolver.find_thruster(thruster))
            }
            Command::SetDoor { a, b, .. } | Command::ToggleDoor { a, b } => {
                compartment(a)?;
                compartment(b)
            }
            Command::SuppressFire { compartment: name, .. } | Command::SetVent { compartment: name, .. } => {
                compartment(name)
            }
            Command::InjectDamage { damage } => match damage {
                DamageRequest::HullBreach { compartment: name, .. }
                | DamageRequest::ElectricalFire { compartment: name } => compartment(name),
                DamageRequest::HydraulicLeak { .. } | DamageRequest::CoolantLeak { .. } => Ok(()),
            },
            Command::StartRepair { target } | Command::AbortRepair { target } => match target {
                RepairRequest::HullBreach { compartment: name } => compartment(name),
                RepairRequest::HydraulicLeak { .. } | RepairRequest::CoolantLeak { .. } => Ok(()),
            },
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ProtocolHandler {
    command_buffer: CommandBuffer,
    commands_received: u32,
}

impl ProtocolHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse_command(&mut self, json_str: &str) -> Result<CommandEnvelope, ProtocolError> {
        self.command_buffer.clear();
        if json_str.len() > MAX_COMMAND_SIZE {
            return Err(ProtocolError::TooLarge {
                size: json_str.len(),
                limit: MAX_COMMAND_SIZE,
            });
        }
        self.command_buffer.push_str(json_str);
        let envelope: CommandEnvelope = serde_json::from_str(&self.command_buffer)?;
        envelope.command.validate()?;
        self.commands_received = self.commands_received.wrapping_add(1);
        Ok(envelope)
    }

    /// Parses a newline-separated command script, skipping blank lines and
    /// `#` comments.
    pub fn parse_script(&mut self, script: &str) -> Result<Vec<CommandEnvelope>, ProtocolError> {
        script
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| self.parse_command(line))
            .collect()
    }

    pub fn create_response(&self, id: u32, tick: u64, status: ResponseStatus) -> CommandResponse {
        CommandResponse { id, tick, status }
    }

    pub fn serialize_response(&self, response: &CommandResponse) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(response)?)
    }

    pub fn commands_received(&self) -> u32 {
        self.commands_received
    }
}
