use super::{make_name, CompartmentId, ComponentId, Name};
use crate::config::Resolver;
use crate::error::ConfigError;
use crate::physics::{conductive_transfer_j, T_SPACE_K};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    pub mass_kg: f64,
    pub specific_heat_j_per_kg_k: f64,
    pub initial_temp_k: f64,
    /// Compartment the component sheds heat into.
    pub compartment: Option<String>,
    pub link_conductance_w_per_k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompartmentLinkConfig {
    pub a: String,
    pub b: String,
    pub conductance_w_per_k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ThermalConfig {
    pub components: Vec<ComponentConfig>,
    pub links: Vec<CompartmentLinkConfig>,
}

/// Where injected energy lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeatSink {
    Component(ComponentId),
    Compartment(CompartmentId),
}

#[derive(Debug, Clone, Copy)]
struct ThermalNode {
    heat_capacity_j_per_k: f64,
    temperature_k: f64,
    pending_j: f64,
    injected_j: f64,
    waste_heat_w: f64,
}

impl ThermalNode {
    fn new(heat_capacity_j_per_k: f64, temperature_k: f64) -> Self {
        Self {
            heat_capacity_j_per_k,
            temperature_k,
            pending_j: 0.0,
            injected_j: 0.0,
            waste_heat_w: 0.0,
        }
    }

    fn apply_pending(&mut self, dt_s: f64) {
        self.temperature_k =
            (self.temperature_k + self.pending_j / self.heat_capacity_j_per_k).max(T_SPACE_K);
        self.waste_heat_w = if dt_s > 0.0 { self.injected_j / dt_s } else { 0.0 };
        self.pending_j = 0.0;
        self.injected_j = 0.0;
    }

    fn shift(&mut self, joules: f64) {
        self.temperature_k =
            (self.temperature_k + joules / self.heat_capacity_j_per_k).max(T_SPACE_K);
    }
}

#[derive(Debug, Clone)]
struct ThermalComponent {
    name: Name,
    node: ThermalNode,
    compartment: Option<CompartmentId>,
    link_conductance_w_per_k: f64,
}

#[derive(Debug, Clone, Copy)]
struct CompartmentLink {
    a: CompartmentId,
    b: CompartmentId,
    conductance_w_per_k: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentThermalState {
    pub name: Name,
    pub temperature_k: f64,
    pub waste_heat_w: f64,
}

/// Owns every component and compartment temperature on the vessel.
///
/// Other subsystems only ever hand it energy through [`ThermalLedger::add_heat`];
/// temperatures change when [`ThermalLedger::update`] applies that energy.
#[derive(Debug, Clone)]
pub struct ThermalLedger {
    components: Vec<ThermalComponent>,
    compartments: Vec<ThermalNode>,
    links: Vec<CompartmentLink>,
}

impl ThermalLedger {
    pub fn new(
        config: &ThermalConfig,
        compartment_nodes: &[(f64, f64)],
        resolver: &Resolver,
    ) -> Result<Self, ConfigError> {
        let mut components = Vec::with_capacity(config.components.len());
        for c in &config.components {
            let heat_capacity = c.mass_kg * c.specific_heat_j_per_kg_k;
            if heat_capacity <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("thermal.components.{}", c.name),
                    reason: "heat capacity must be positive",
                });
            }
            let compartment = match &c.compartment {
                Some(name) => Some(resolver.compartment(name, &c.name)?),
                None => None,
            };
            components.push(ThermalComponent {
                name: make_name(&c.name)?,
                node: ThermalNode::new(heat_capacity, c.initial_temp_k),
                compartment,
                link_conductance_w_per_k: c.link_conductance_w_per_k,
            });
        }

        let mut compartments = Vec::with_capacity(compartment_nodes.len());
        for &(heat_capacity, temperature) in compartment_nodes {
            if heat_capacity <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: "atmosphere.compartments.heat_capacity_j_per_k".to_string(),
                    reason: "heat capacity must be positive",
                });
            }
            compartments.push(ThermalNode::new(heat_capacity, temperature));
        }

        let mut links = Vec::with_capacity(config.links.len());
        for link in &config.links {
            let referrer = format!("thermal link {}-{}", link.a, link.b);
            links.push(CompartmentLink {
                a: resolver.compartment(&link.a, &referrer)?,
                b: resolver.compartment(&link.b, &referrer)?,
                conductance_w_per_k: link.conductance_w_per_k,
            });
        }

        Ok(Self { components, compartments, links })
    }

    /// Queues `joules` for the sink. Applied on the next [`update`](Self::update).
    ///
    /// Negative energy is allowed (heat exchangers extract it); zero and
    /// non-finite values are ignored.
    pub fn add_heat(&mut self, sink: HeatSink, joules: f64) {
        if joules == 0.0 || !joules.is_finite() {
            return;
        }
        let node = match sink {
            HeatSink::Component(id) => match self.components.get_mut(id.index()) {
                Some(c) => &mut c.node,
                None => return,
            },
            HeatSink::Compartment(id) => match self.compartments.get_mut(id.index()) {
                Some(n) => n,
                None => return,
            },
        };
        node.pending_j += joules;
        if joules > 0.0 {
            node.injected_j += joules;
        }
    }

    pub fn update(&mut self, dt_s: f64) {
        for component in &mut self.components {
            component.node.apply_pending(dt_s);
        }
        for node in &mut self.compartments {
            node.apply_pending(dt_s);
        }

        for component in &mut self.components {
            let Some(compartment) = component.compartment else {
                continue;
            };
            let Some(room) = self.compartments.get_mut(compartment.index()) else {
                continue;
            };
            let q = conductive_transfer_j(
                component.link_conductance_w_per_k,
                component.node.temperature_k,
                component.node.heat_capacity_j_per_k,
                room.temperature_k,
                room.heat_capacity_j_per_k,
                dt_s,
            );
            component.node.shift(-q);
            room.shift(q);
        }

        for link in &self.links {
            let (a, b) = (link.a.index(), link.b.index());
            if a == b || a >= self.compartments.len() || b >= self.compartments.len() {
                continue;
            }
            let (na, nb) = (self.compartments[a], self.compartments[b]);
            let q = conductive_transfer_j(
                link.conductance_w_per_k,
                na.temperature_k,
                na.heat_capacity_j_per_k,
                nb.temperature_k,
                nb.heat_capacity_j_per_k,
                dt_s,
            );
            self.compartments[a].shift(-q);
            self.compartments[b].shift(q);
        }

        debug_assert!(
            self.components.iter().all(|c| c.node.temperature_k >= T_SPACE_K),
            "component temperature below background"
        );
    }

    pub fn temperature(&self, sink: HeatSink) -> f64 {
        match sink {
            HeatSink::Component(id) => self.component_temperature(id),
            HeatSink::Compartment(id) => self.compartment_temperature(id),
        }
    }

    pub fn component_temperature(&self, id: ComponentId) -> f64 {
        self.components
            .get(id.index())
            .map_or(T_SPACE_K, |c| c.node.temperature_k)
    }

    pub fn compartment_temperature(&self, id: CompartmentId) -> f64 {
        self.compartments
            .get(id.index())
            .map_or(T_SPACE_K, |n| n.temperature_k)
    }

    /// Positive heat injected into the component during the last applied tick.
    pub fn waste_heat_w(&self, id: ComponentId) -> f64 {
        self.components
            .get(id.index())
            .map_or(0.0, |c| c.node.waste_heat_w)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn component_states(&self) -> Vec<ComponentThermalState> {
        self.components
            .iter()
            .map(|c| ComponentThermalState {
                name: c.name,
                temperature_k: c.node.temperature_k,
                waste_heat_w: c.node.waste_heat_w,
            })
            .collect()
    }

    /// Total stored thermal energy above absolute zero, for conservation checks.
    pub fn total_energy_j(&self) -> f64 {
        self.components
            .iter()
            .map(|c| c.node.temperature_k * c.node.heat_capacity_j_per_k)
            .chain(
                self.compartments
                    .iter()
                    .map(|n| n.temperature_k * n.heat_capacity_j_per_k),
            )
            .sum()
    }
}
