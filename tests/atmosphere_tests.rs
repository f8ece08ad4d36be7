use vesselsim::events::{Event, LifeSupportUnit};
use vesselsim::physics::Gas;
use vesselsim::protocol::{DamageRequest, RepairRequest};
use vesselsim::subsystems::fire::SuppressionAgent;
use vesselsim::subsystems::life_support::UnitStatus;
use vesselsim::subsystems::{CompartmentId, ImpulseSource, LoopSide};
use vesselsim::*;

fn compartment_id(vessel: &Vessel, name: &str) -> CompartmentId {
    vessel.resolver().find_compartment(name).unwrap()
}

fn count(records: &[EventRecord], wanted: impl Fn(&Event) -> bool) -> usize {
    records.iter().filter(|r| wanted(&r.event)).count()
}

#[cfg(test)]
mod door_tests {
    use super::*;

    #[test]
    fn test_door_lookup() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        assert_eq!(
            vessel.execute(&Command::SetDoor { a: "command".into(), b: "engineering".into(), open: true }),
            CommandStatus::Ignored("no door between compartments")
        );
        assert_eq!(
            vessel.execute(&Command::ToggleDoor { a: "command".into(), b: "bridge".into() }),
            CommandStatus::Ignored("unknown compartment")
        );

        // Either order names the same door.
        assert!(vessel
            .execute(&Command::SetDoor { a: "airlock".into(), b: "habitat".into(), open: true })
            .is_accepted());
        vessel.step();
        let habitat = compartment_id(&vessel, "habitat");
        let airlock = compartment_id(&vessel, "airlock");
        let door = vessel
            .telemetry()
            .doors
            .iter()
            .find(|d| d.a == habitat && d.b == airlock)
            .unwrap();
        assert!(door.open);
    }

    #[test]
    fn test_hydraulic_door_needs_pressure() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetHydraulicPump { side: LoopSide::A, on: false });
        vessel.execute(&Command::InjectDamage {
            damage: DamageRequest::HydraulicLeak { side: LoopSide::A, rate_l_s: 2.0 },
        });
        vessel.run_for(200);
        assert_eq!(
            vessel.execute(&Command::ToggleDoor { a: "habitat".into(), b: "airlock".into() }),
            CommandStatus::Ignored("hydraulic pressure too low to move door")
        );
        // Manual door still works.
        assert!(vessel
            .execute(&Command::ToggleDoor { a: "command".into(), b: "habitat".into() })
            .is_accepted());
    }
}

#[cfg(test)]
mod venting_tests {
    use super::*;

    #[test]
    fn test_vent_requires_vent_hardware() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        assert_eq!(
            vessel.execute(&Command::SetVent { compartment: "habitat".into(), open: true }),
            CommandStatus::Ignored("compartment has no vent")
        );
        assert_eq!(
            vessel.execute(&Command::SetVent { compartment: "hangar".into(), open: true }),
            CommandStatus::Ignored("unknown compartment")
        );
    }

    #[test]
    fn test_airlock_cycle() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        let airlock = compartment_id(&vessel, "airlock");
        let start = vessel.atmosphere().compartment(airlock).unwrap().total_mass_kg();

        assert!(vessel
            .execute(&Command::SetVent { compartment: "airlock".into(), open: true })
            .is_accepted());
        let report = vessel.step();
        let vent = report
            .impulses
            .iter()
            .find(|i| i.source == ImpulseSource::Vent(airlock))
            .unwrap();
        // Gas leaves along +X, so the push is along -X.
        assert!(vent.impulse_ns.x < 0.0);
        assert!(vessel.telemetry().propulsion.impulse_ns.x < 0.0);
        assert!(vessel.atmosphere().compartment(airlock).unwrap().total_mass_kg() < start);

        let events = vessel.run_for(200);
        assert_eq!(
            count(&events, |e| *e == Event::CompartmentDepressurized { compartment: airlock }),
            1
        );
        assert!(vessel.atmosphere().is_depressurized(airlock));

        vessel.execute(&Command::SetVent { compartment: "airlock".into(), open: false });
        vessel.execute(&Command::SetDoor { a: "habitat".into(), b: "airlock".into(), open: true });
        let events = vessel.run_for(50);
        assert_eq!(
            count(&events, |e| *e == Event::CompartmentRepressurized { compartment: airlock }),
            1
        );
        assert!(!vessel.telemetry().compartment("airlock").unwrap().depressurized);
    }
}

#[cfg(test)]
mod breach_tests {
    use super::*;

    #[test]
    fn test_breach_vents_until_repaired() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        let command = compartment_id(&vessel, "command");
        assert_eq!(
            vessel.execute(&Command::InjectDamage {
                damage: DamageRequest::HullBreach { compartment: "command".into(), area_m2: 0.0 },
            }),
            CommandStatus::Ignored("breach area must be positive")
        );
        assert!(vessel
            .execute(&Command::InjectDamage {
                damage: DamageRequest::HullBreach { compartment: "command".into(), area_m2: 0.0005 },
            })
            .is_accepted());

        let start = vessel.atmosphere().total_mass_kg();
        let report = vessel.step();
        assert!(report
            .events
            .iter()
            .any(|r| matches!(r.event, Event::HullBreach { compartment, .. } if compartment == command)));
        assert!(report.impulses.iter().any(|i| i.source == ImpulseSource::HullBreach(command)));
        assert!(vessel.atmosphere().total_mass_kg() < start);

        assert!(vessel
            .execute(&Command::StartRepair { target: RepairRequest::HullBreach { compartment: "command".into() } })
            .is_accepted());
        let events = vessel.run_for(310);
        assert!(events.iter().any(|r| matches!(r.event, Event::RepairCompleted { .. })));
        assert_eq!(vessel.telemetry().compartment("command").unwrap().breach_area_m2, 0.0);

        // Only life support and crew move mass once sealed.
        let sealed = vessel.atmosphere().total_mass_kg();
        vessel.run_for(10);
        assert!((vessel.atmosphere().total_mass_kg() - sealed).abs() < 1e-3);
    }
}

#[cfg(test)]
mod fire_tests {
    use super::*;

    #[test]
    fn test_electrical_fire_and_halon() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        let habitat = compartment_id(&vessel, "habitat");
        let fire = Command::InjectDamage {
            damage: DamageRequest::ElectricalFire { compartment: "habitat".into() },
        };
        assert!(vessel.execute(&fire).is_accepted());
        assert_eq!(vessel.execute(&fire), CommandStatus::Ignored("fire could not start"));

        let events = vessel.run_for(5);
        assert_eq!(count(&events, |e| matches!(e, Event::FireStarted { .. })), 1);
        assert_eq!(vessel.telemetry().fires.len(), 1);
        assert!(vessel.atmosphere().fire_intensity(habitat) > 0.05);

        let before = vessel.atmosphere().compartment(habitat).unwrap().clone();
        let suppress = Command::SuppressFire { compartment: "habitat".into(), agent: SuppressionAgent::Halon };
        assert!(vessel.execute(&suppress).is_accepted());
        let after = vessel.atmosphere().compartment(habitat).unwrap();
        assert!((after.mass_kg(Gas::O2) - before.mass_kg(Gas::O2) * 0.7).abs() < 1e-9);
        assert!((after.pressure_pa() - before.pressure_pa()).abs() / before.pressure_pa() < 1e-9);
        assert_eq!(vessel.atmosphere().fire_intensity(habitat), 0.0);

        let events = vessel.run_for(1);
        assert!(events.iter().any(|r| r.event == Event::FireExtinguished { compartment: habitat }));
        assert!(vessel.telemetry().fires.is_empty());
    }

    #[test]
    fn test_suppression_charges_run_out() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        let flood = Command::SuppressFire { compartment: "engineering".into(), agent: SuppressionAgent::Co2Flood };
        assert!(vessel.execute(&flood).is_accepted());
        assert!(vessel.execute(&flood).is_accepted());
        assert_eq!(vessel.execute(&flood), CommandStatus::Ignored("no suppression charges left"));

        vessel.step();
        let left = vessel
            .telemetry()
            .suppression
            .iter()
            .find(|(agent, _)| *agent == SuppressionAgent::Co2Flood)
            .map(|(_, n)| *n);
        assert_eq!(left, Some(0));
    }

    #[test]
    fn test_fire_needs_oxygen() {
        let mut config = VesselConfig::default();
        let airlock = config.atmosphere.compartments.iter_mut().find(|c| c.name == "airlock").unwrap();
        airlock.o2_kg = 0.0;
        let mut vessel = Vessel::new(config).unwrap();
        assert_eq!(
            vessel.execute(&Command::InjectDamage {
                damage: DamageRequest::ElectricalFire { compartment: "airlock".into() },
            }),
            CommandStatus::Ignored("fire could not start")
        );
    }
}

#[cfg(test)]
mod life_support_tests {
    use super::*;

    fn habitat_after(ticks: u64, setup: impl Fn(&mut Vessel)) -> (f64, f64) {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        setup(&mut vessel);
        vessel.run_for(ticks);
        let habitat = vessel.atmosphere().compartment(compartment_id(&vessel, "habitat")).unwrap();
        (habitat.mass_kg(Gas::O2), habitat.mass_kg(Gas::Co2))
    }

    #[test]
    fn test_units_change_cabin_air() {
        let (o2_on, co2_on) = habitat_after(100, |_| {});
        let (o2_off, co2_off) = habitat_after(100, |v| {
            v.execute(&Command::SetLifeSupport { unit: LifeSupportUnit::OxygenGenerator, enabled: false });
            v.execute(&Command::SetLifeSupport { unit: LifeSupportUnit::Co2Scrubber, enabled: false });
        });
        assert!(o2_on > o2_off);
        assert!(co2_on < co2_off);
    }

    #[test]
    fn test_unit_status_tracks_power_and_switch() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetLifeSupport { unit: LifeSupportUnit::WaterRecycler, enabled: false });
        vessel.execute(&Command::SetBreaker { breaker: "co2_scrubber".into(), on: false });
        vessel.step();
        let state = &vessel.telemetry().life_support;
        assert_eq!(state.water_recycler, UnitStatus::Standby);
        assert_eq!(state.co2_scrubber, UnitStatus::Unpowered);
        assert_eq!(state.oxygen_generator, UnitStatus::Active);
    }

    #[test]
    fn test_exhausted_generator_stays_down() {
        let mut config = VesselConfig::default();
        config.atmosphere.life_support.water_kg = 0.0;
        let mut vessel = Vessel::new(config).unwrap();
        assert_eq!(
            vessel.execute(&Command::SetLifeSupport { unit: LifeSupportUnit::OxygenGenerator, enabled: true }),
            CommandStatus::Ignored("consumable exhausted")
        );
        vessel.step();
        assert_eq!(vessel.telemetry().life_support.oxygen_generator, UnitStatus::Inactive);
    }
}
