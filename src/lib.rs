//! # Vessel Simulator
//!
//! A deterministic, fixed-step simulation kernel for a spacecraft's coupled
//! physical subsystems: thermal, electrical power, fluids, propulsion,
//! atmosphere, life support and fire.
//!
//! ## Features
//!
//! - **Coupled subsystems**: every subsystem reads its neighbours' state from
//!   the previous tick and reports heat into a shared thermal ledger
//! - **Command processing**: JSON commands with accept/ignore semantics
//! - **Command scheduling**: tick-tagged command execution
//! - **Safety monitoring**: alarm levels derived from telemetry and events
//! - **Damage and repair**: seeded random faults with timed crew repairs
//! - **Reproducible**: same configuration and seed give the same run
//!
//! ## Quick Start
//!
//! ```rust
//! use vesselsim::{Command, Vessel, VesselConfig};
//!
//! let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
//! vessel.execute(&Command::StartReactor);
//!
//! for _ in 0..10 {
//!     let report = vessel.step();
//!     for record in &report.events {
//!         println!("{}: {:?}", record.tick, record.event);
//!     }
//! }
//! println!("battery {:.1}%", vessel.telemetry().power.storage.battery_percent);
//! ```
//!
//! ## Architecture
//!
//! - [`vessel`] - Owns the subsystems and runs the tick pipeline
//! - [`subsystems`] - Thermal, power, fluid, propulsion and atmosphere models
//! - [`config`] - Vessel description and name resolution
//! - [`protocol`] - Command wire format and acknowledgements
//! - [`scheduler`] - Tick-tagged command queue and update cadence
//! - [`safety`] - Alarm evaluation
//! - [`scenarios`] - Built-in acceptance scenarios
//! - [`fault_injection`] - Random damage and repairs
//! - [`telemetry`] - Per-tick snapshot and CSV export

#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod events;
pub mod fault_injection;
pub mod physics;
pub mod protocol;
pub mod safety;
pub mod scenarios;
pub mod scheduler;
pub mod subsystems;
pub mod telemetry;
pub mod vessel;

pub use config::{Resolver, VesselConfig};
pub use error::{ConfigError, ProtocolError};
pub use events::{Event, EventRecord};
pub use protocol::{Command, CommandEnvelope, CommandStatus, ProtocolHandler, ResponseStatus};
pub use safety::{SafetyLevel, SafetyState};
pub use telemetry::TelemetrySnapshot;
pub use vessel::{TickReport, Vessel};
