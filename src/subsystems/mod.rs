pub mod thermal;
pub mod power;
pub mod fuel;
pub mod hydraulic;
pub mod coolant;
pub mod gas;
pub mod engine;
pub mod rcs;
pub mod atmosphere;
pub mod life_support;
pub mod fire;

pub use thermal::{ThermalLedger, HeatSink};
pub use power::{PowerNetwork, ReactorStatus};
pub use fuel::FuelSystem;
pub use hydraulic::HydraulicSystem;
pub use coolant::CoolantSystem;
pub use gas::GasSystem;
pub use engine::MainEngine;
pub use rcs::RcsArray;
pub use atmosphere::AtmosphereSystem;

use arrayvec::ArrayString;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert;

use crate::error::ConfigError;

pub const MAX_NAME_LEN: usize = 32;
pub const MAX_COMPARTMENTS: usize = 32;
pub const MAX_BREAKERS: usize = 64;

const_assert!(MAX_COMPARTMENTS <= u16::MAX as usize);
const_assert!(MAX_BREAKERS <= u16::MAX as usize);

/// Fixed-capacity entity name.
pub type Name = ArrayString<MAX_NAME_LEN>;

pub fn make_name(name: &str) -> Result<Name, ConfigError> {
    ArrayString::from(name).map_err(|_| ConfigError::NameTooLong(name.to_string()))
}

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u16);

        impl $name {
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

index_id!(
    /// Index of a breaker in the power network.
    BreakerId
);
index_id!(
    /// Index of a fuel tank.
    TankId
);
index_id!(
    /// Index of a compressed-gas bottle.
    BottleId
);
index_id!(
    /// Index of a thermal component in the ledger.
    ComponentId
);
index_id!(
    /// Index of a pressurized compartment.
    CompartmentId
);
index_id!(
    /// Index of an RCS thruster.
    ThrusterId
);

/// One of the two distribution buses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusSide {
    A,
    B,
}

impl BusSide {
    pub const fn index(self) -> usize {
        match self {
            BusSide::A => 0,
            BusSide::B => 1,
        }
    }

    pub const fn other(self) -> Self {
        match self {
            BusSide::A => BusSide::B,
            BusSide::B => BusSide::A,
        }
    }
}

/// One of the two redundant fluid loops (hydraulic or coolant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoopSide {
    A,
    B,
}

impl LoopSide {
    pub const BOTH: [LoopSide; 2] = [LoopSide::A, LoopSide::B];

    pub const fn index(self) -> usize {
        match self {
            LoopSide::A => 0,
            LoopSide::B => 1,
        }
    }
}

impl core::fmt::Display for LoopSide {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoopSide::A => f.write_str("A"),
            LoopSide::B => f.write_str("B"),
        }
    }
}

/// What produced an external impulse on the hull.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpulseSource {
    BottleRupture(BottleId),
    Vent(CompartmentId),
    HullBreach(CompartmentId),
}

/// Momentum delivered to the vessel body during one tick, in N·s, applied at
/// `position` in body coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedImpulse {
    pub source: ImpulseSource,
    pub position: DVec3,
    pub impulse_ns: DVec3,
}

/// Name to index lookup, built once and searched by bisection.
#[derive(Debug, Clone, Default)]
pub struct NameTable {
    entries: Vec<(Name, u16)>,
}

impl NameTable {
    /// Builds the table, rejecting duplicate names within one entity kind.
    pub fn build<'a, I>(kind: &'static str, names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = &'a Name>,
    {
        let mut entries: Vec<(Name, u16)> = names
            .into_iter()
            .enumerate()
            .map(|(index, name)| (*name, index as u16))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for pair in entries.windows(2) {
            if pair[0].0 == pair[1].0 {
                return Err(ConfigError::DuplicateName {
                    kind,
                    name: pair[0].0.to_string(),
                });
            }
        }
        Ok(Self { entries })
    }

    pub fn lookup(&self, name: &str) -> Option<u16> {
        self.entries
            .binary_search_by(|(candidate, _)| candidate.as_str().cmp(name))
            .ok()
            .map(|position| self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_table_lookup() {
        let names = [make_name("pump_b").unwrap(), make_name("avionics").unwrap()];
        let table = NameTable::build("breaker", names.iter()).unwrap();
        assert_eq!(table.lookup("pump_b"), Some(0));
        assert_eq!(table.lookup("avionics"), Some(1));
        assert_eq!(table.lookup("missing"), None);
    }

    #[test]
    fn test_name_table_rejects_duplicates() {
        let names = [make_name("tank").unwrap(), make_name("tank").unwrap()];
        assert!(NameTable::build("tank", names.iter()).is_err());
    }

    #[test]
    fn test_name_too_long() {
        assert!(make_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }
}
