//! Shared physical constants and lumped-parameter helpers.

use serde::{Deserialize, Serialize};

/// Universal gas constant, J/(mol·K).
pub const GAS_CONSTANT: f64 = 8.314_462_618;
/// Stefan-Boltzmann constant, W/(m²·K⁴).
pub const STEFAN_BOLTZMANN: f64 = 5.670_374_419e-8;
/// Cosmic background temperature used as the radiative sink.
pub const T_SPACE_K: f64 = 2.7;
pub const PA_PER_BAR: f64 = 100_000.0;

/// Gas species tracked in compartments and bottles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Gas {
    O2,
    Co2,
    N2,
    H2o,
    He,
}

impl Gas {
    /// Species carried in compartment atmospheres, in storage order.
    /// Helium only arrives from pressurant bottles.
    pub const ATMOSPHERIC: [Gas; 5] = [Gas::O2, Gas::Co2, Gas::N2, Gas::H2o, Gas::He];

    /// Position in [`Gas::ATMOSPHERIC`].
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Molar mass in kg/mol.
    pub const fn molar_mass(self) -> f64 {
        match self {
            Gas::O2 => 0.031_998,
            Gas::Co2 => 0.044_01,
            Gas::N2 => 0.028_014,
            Gas::H2o => 0.018_015,
            Gas::He => 0.004_002_6,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Gas::O2 => "O2",
            Gas::Co2 => "CO2",
            Gas::N2 => "N2",
            Gas::H2o => "H2O",
            Gas::He => "He",
        }
    }
}

impl core::fmt::Display for Gas {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Moles of `gas` in `mass_kg`.
pub fn moles(gas: Gas, mass_kg: f64) -> f64 {
    mass_kg / gas.molar_mass()
}

/// Ideal-gas pressure in pascals: `P = nRT / V`.
///
/// A non-positive volume yields zero rather than infinity; callers clamp their
/// own ullage volumes.
pub fn ideal_gas_pressure_pa(total_moles: f64, temperature_k: f64, volume_m3: f64) -> f64 {
    if volume_m3 <= 0.0 {
        return 0.0;
    }
    total_moles * GAS_CONSTANT * temperature_k / volume_m3
}

/// Net radiated power to space for a grey body: `εσA(T⁴ − T_space⁴)`.
pub fn radiated_power_w(emissivity: f64, area_m2: f64, temperature_k: f64) -> f64 {
    emissivity * STEFAN_BOLTZMANN * area_m2 * (temperature_k.powi(4) - T_SPACE_K.powi(4))
}

/// Energy that, once moved from the hotter to the colder body, leaves both at
/// the same temperature.
pub fn equalizing_energy_j(t_hot: f64, c_hot: f64, t_cold: f64, c_cold: f64) -> f64 {
    if c_hot <= 0.0 || c_cold <= 0.0 {
        return 0.0;
    }
    (t_hot - t_cold) * c_hot * c_cold / (c_hot + c_cold)
}

/// Conductive exchange over `dt_s` from body 1 to body 2, clamped so it never
/// overshoots equilibrium.
pub fn conductive_transfer_j(
    conductance_w_per_k: f64,
    t1: f64,
    c1: f64,
    t2: f64,
    c2: f64,
    dt_s: f64,
) -> f64 {
    let raw = conductance_w_per_k * (t1 - t2) * dt_s;
    let limit = equalizing_energy_j(t1, c1, t2, c2);
    if limit >= 0.0 {
        raw.clamp(0.0, limit)
    } else {
        raw.clamp(limit, 0.0)
    }
}
