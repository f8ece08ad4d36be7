//! Tick cadence and time-tagged command queue.

use crate::error::ConfigError;
use crate::protocol::Command;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_SCHEDULED_COMMANDS: usize = 32;
const MAX_READY_PER_TICK: usize = 8;
/// Entries older than this many ticks past their due tick are dropped.
const DEFAULT_EXPIRY_TICKS: u64 = 36_000;

/// Runs each subsystem group once every `n` ticks with an `n`-scaled step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickDivisors {
    pub thermal: u32,
    pub power: u32,
    pub fluids: u32,
    pub propulsion: u32,
    pub atmosphere: u32,
}

impl Default for TickDivisors {
    fn default() -> Self {
        Self {
            thermal: 1,
            power: 1,
            fluids: 1,
            propulsion: 1,
            atmosphere: 1,
        }
    }
}

impl TickDivisors {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("divisors.thermal", self.thermal),
            ("divisors.power", self.power),
            ("divisors.fluids", self.fluids),
            ("divisors.propulsion", self.propulsion),
            ("divisors.atmosphere", self.atmosphere),
        ];
        for (field, value) in fields {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    reason: "tick divisor must be at least 1",
                });
            }
        }
        Ok(())
    }
}

/// Whether a group with `divisor` runs on `tick`.
pub fn is_due(tick: u64, divisor: u32) -> bool {
    divisor <= 1 || tick % u64::from(divisor) == 0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledCommand {
    pub command: Command,
    pub execute_at_tick: u64,
    pub scheduled_at_tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SchedulerStats {
    pub total_scheduled: u32,
    pub total_executed: u32,
    pub total_expired: u32,
    pub currently_scheduled: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    InPast,
    QueueFull,
}

impl ScheduleError {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScheduleError::InPast => "execution tick already passed",
            ScheduleError::QueueFull => "scheduler queue full",
        }
    }
}

#[derive(Debug)]
pub struct CommandScheduler {
    scheduled_commands: Vec<ScheduledCommand, MAX_SCHEDULED_COMMANDS>,
    stats: SchedulerStats,
    expiry_ticks: u64,
}

impl CommandScheduler {
    pub fn new() -> Self {
        Self {
            scheduled_commands: Vec::new(),
            stats: SchedulerStats::default(),
            expiry_ticks: DEFAULT_EXPIRY_TICKS,
        }
    }

    /// Queues `command` to be applied at the start of `execute_at_tick`.
    pub fn schedule_command(
        &mut self,
        command: Command,
        execute_at_tick: u64,
        current_tick: u64,
    ) -> Result<(), ScheduleError> {
        if execute_at_tick < current_tick {
            return Err(ScheduleError::InPast);
        }
        if self.scheduled_commands.is_full() {
            warn!(execute_at_tick, "scheduler queue full");
            return Err(ScheduleError::QueueFull);
        }

        let _ = self.scheduled_commands.push(ScheduledCommand {
            command,
            execute_at_tick,
            scheduled_at_tick: current_tick,
        });
        // stable sort keeps submission order among commands due on the same tick
        self.scheduled_commands.sort_by_key(|cmd| cmd.execute_at_tick);

        self.stats.total_scheduled += 1;
        self.stats.currently_scheduled = self.scheduled_commands.len() as u8;
        debug!(execute_at_tick, "command scheduled");
        Ok(())
    }

    /// Removes and returns up to eight commands due at or before `current_tick`,
    /// oldest due tick first. The rest stay queued for the next tick.
    pub fn take_ready(&mut self, current_tick: u64) -> Vec<Command, MAX_READY_PER_TICK> {
        let mut ready: Vec<Command, MAX_READY_PER_TICK> = Vec::new();
        while let Some(first) = self.scheduled_commands.first() {
            if first.execute_at_tick > current_tick || ready.is_full() {
                break;
            }
            let scheduled = self.scheduled_commands.remove(0);
            let _ = ready.push(scheduled.command);
            self.stats.total_executed += 1;
        }
        self.stats.currently_scheduled = self.scheduled_commands.len() as u8;
        ready
    }

    /// Drops commands whose due tick lies more than the expiry window behind.
    pub fn cleanup_expired(&mut self, current_tick: u64) {
        let threshold = current_tick.saturating_sub(self.expiry_ticks);
        let initial_count = self.scheduled_commands.len();
        self.scheduled_commands.retain(|cmd| cmd.execute_at_tick >= threshold);
        let expired = initial_count - self.scheduled_commands.len();
        if expired > 0 {
            warn!(expired, "scheduled commands expired");
        }
        self.stats.total_expired += expired as u32;
        self.stats.currently_scheduled = self.scheduled_commands.len() as u8;
    }

    pub fn get_stats(&self) -> &SchedulerStats {
        &self.stats
    }

    pub fn get_scheduled_commands(&self) -> &[ScheduledCommand] {
        &self.scheduled_commands
    }

    pub fn set_expiry_ticks(&mut self, ticks: u64) {
        self.expiry_ticks = ticks;
    }
}

impl Default for CommandScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle(value: f64) -> Command {
        Command::SetReactorThrottle { throttle: value }
    }

    fn throttle_of(command: &Command) -> f64 {
        match command {
            Command::SetReactorThrottle { throttle } => *throttle,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_immediate_command() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(throttle(0.5), 10, 10).unwrap();
        let ready = scheduler.take_ready(10);
        assert_eq!(ready.len(), 1);
        assert_eq!(scheduler.get_stats().total_executed, 1);
    }

    #[test]
    fn test_future_command_waits_for_its_tick() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(throttle(0.5), 50, 10).unwrap();
        assert!(scheduler.take_ready(49).is_empty());
        assert_eq!(scheduler.take_ready(50).len(), 1);
    }

    #[test]
    fn test_commands_release_in_tick_order() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(throttle(0.3), 30, 0).unwrap();
        scheduler.schedule_command(throttle(0.1), 10, 0).unwrap();
        scheduler.schedule_command(throttle(0.2), 20, 0).unwrap();

        assert_eq!(throttle_of(&scheduler.take_ready(10)[0]), 0.1);
        assert_eq!(throttle_of(&scheduler.take_ready(20)[0]), 0.2);
        assert_eq!(throttle_of(&scheduler.take_ready(30)[0]), 0.3);
    }

    #[test]
    fn test_same_tick_keeps_submission_order() {
        let mut scheduler = CommandScheduler::new();
        scheduler.schedule_command(throttle(0.1), 5, 0).unwrap();
        scheduler.schedule_command(throttle(0.2), 5, 0).unwrap();
        let ready = scheduler.take_ready(5);
        assert_eq!(throttle_of(&ready[0]), 0.1);
        assert_eq!(throttle_of(&ready[1]), 0.2);
    }

    #[test]
    fn test_past_tick_rejected() {
        let mut scheduler = CommandScheduler::new();
        assert_eq!(scheduler.schedule_command(throttle(0.5), 5, 10), Err(ScheduleError::InPast));
    }

    #[test]
    fn test_queue_capacity() {
        let mut scheduler = CommandScheduler::new();
        for _ in 0..MAX_SCHEDULED_COMMANDS {
            scheduler.schedule_command(throttle(0.5), 100, 0).unwrap();
        }
        assert_eq!(scheduler.schedule_command(throttle(0.5), 100, 0), Err(ScheduleError::QueueFull));
        assert_eq!(scheduler.take_ready(100).len(), MAX_READY_PER_TICK);
        assert_eq!(scheduler.get_scheduled_commands().len(), MAX_SCHEDULED_COMMANDS - MAX_READY_PER_TICK);
    }

    #[test]
    fn test_stale_commands_expire() {
        let mut scheduler = CommandScheduler::new();
        scheduler.set_expiry_ticks(5);
        scheduler.schedule_command(throttle(0.5), 10, 0).unwrap();
        scheduler.cleanup_expired(100);
        assert!(scheduler.get_scheduled_commands().is_empty());
        assert_eq!(scheduler.get_stats().total_expired, 1);
    }

    #[test]
    fn test_divisors() {
        assert!(is_due(7, 1));
        assert!(is_due(10, 5));
        assert!(!is_due(11, 5));
        let bad = TickDivisors { fluids: 0, ..TickDivisors::default() };
        assert!(bad.validate().is_err());
    }
}
