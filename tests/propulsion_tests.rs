use glam::DVec3;
use vesselsim::events::Event;
use vesselsim::protocol::DamageRequest;
use vesselsim::subsystems::fuel::Valve;
use vesselsim::subsystems::LoopSide;
use vesselsim::*;

const EPS: f64 = 1e-6;

fn lit_vessel(throttle: f64) -> Vessel {
    let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
    assert!(vessel.execute(&Command::IgniteEngine).is_accepted());
    assert!(vessel.execute(&Command::SetEngineThrottle { throttle }).is_accepted());
    vessel
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn test_ignition_refused_without_feed_pressure() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetValve { tank: "main".into(), valve: Valve::FeedToEngine, open: false });
        assert_eq!(vessel.fuel().engine_line_pressure_bar(), 0.0);
        assert_eq!(
            vessel.execute(&Command::IgniteEngine),
            CommandStatus::Ignored("fuel line pressure below ignition minimum")
        );
        assert!(!vessel.engine().is_ignited());
    }

    #[test]
    fn test_ignition_refused_with_igniter_unpowered() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetBreaker { breaker: "engine_igniter".into(), on: false });
        assert_eq!(vessel.execute(&Command::IgniteEngine), CommandStatus::Ignored("igniter unpowered"));
    }

    #[test]
    fn test_burn_produces_thrust_and_consumes_fuel() {
        let mut vessel = lit_vessel(0.5);
        let before = vessel.fuel().total_fuel_kg();
        let events = vessel.run_for(10);
        assert!(events.iter().any(|r| r.event == Event::EngineIgnited));

        let telemetry = vessel.telemetry();
        assert!((telemetry.engine.thrust_n - 20_000.0).abs() < EPS);
        assert!((telemetry.propulsion.force_n - DVec3::new(0.0, 0.0, 20_000.0)).length() < EPS);
        assert!(telemetry.propulsion.torque_nm.length() < EPS);
        assert!((before - vessel.fuel().total_fuel_kg() - 6.5).abs() < 1e-6);
    }

    #[test]
    fn test_full_throttle_erodes_nozzle_permanently() {
        let mut vessel = lit_vessel(1.0);
        let events = vessel.run_for(50);
        let overheats = events.iter().filter(|r| matches!(r.event, Event::EngineOverheat { .. })).count();
        assert_eq!(overheats, 1);
        let eroded = vessel.engine().nozzle_efficiency();
        assert!(eroded < 1.0);

        vessel.execute(&Command::SetEngineThrottle { throttle: 0.3 });
        vessel.run_for(50);
        assert_eq!(vessel.engine().nozzle_efficiency(), eroded);
    }

    #[test]
    fn test_gimbal_tilts_thrust_and_costs_hydraulics() {
        let mut vessel = lit_vessel(0.5);
        vessel.run_for(2);
        assert!(vessel.execute(&Command::SetGimbal { x_deg: 3.0, y_deg: 0.0 }).is_accepted());
        vessel.step();
        let force = vessel.telemetry().propulsion.force_n;
        assert!((force.x - 20_000.0 * 3.0_f64.to_radians().sin()).abs() < 1e-3);
        assert!(vessel.telemetry().propulsion.torque_nm.length() > 0.0);

        vessel.execute(&Command::SetGimbal { x_deg: 40.0, y_deg: -40.0 });
        assert_eq!(vessel.engine().gimbal_deg(), [6.0, -6.0]);
    }

    #[test]
    fn test_gimbal_holds_without_hydraulic_pressure() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetHydraulicPump { side: LoopSide::A, on: false });
        vessel.execute(&Command::InjectDamage {
            damage: DamageRequest::HydraulicLeak { side: LoopSide::A, rate_l_s: 2.0 },
        });
        vessel.run_for(200);
        assert_eq!(
            vessel.execute(&Command::SetGimbal { x_deg: 2.0, y_deg: 0.0 }),
            CommandStatus::Ignored("hydraulic pressure too low to gimbal")
        );
        assert_eq!(vessel.engine().gimbal_deg(), [0.0, 0.0]);
    }

    #[test]
    fn test_shutdown() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        assert_eq!(vessel.execute(&Command::ShutdownEngine), CommandStatus::Ignored("engine not ignited"));
        vessel.execute(&Command::IgniteEngine);
        assert!(vessel.execute(&Command::ShutdownEngine).is_accepted());
        let events = vessel.run_for(1);
        assert!(events.iter().any(|r| r.event == Event::EngineShutdown));
        assert_eq!(vessel.telemetry().engine.thrust_n, 0.0);
    }

    #[test]
    fn test_feed_pressure_loss_flames_out() {
        let mut vessel = lit_vessel(0.2);
        vessel.run_for(5);
        vessel.execute(&Command::SetValve { tank: "main".into(), valve: Valve::FeedToEngine, open: false });
        let events = vessel.run_for(1);
        assert!(events.iter().any(|r| r.event
            == Event::EngineFlameout { reason: vesselsim::events::FlameoutReason::FuelPressureLow }));
        assert!(!vessel.engine().is_ignited());
    }
}

#[cfg(test)]
mod rcs_tests {
    use super::*;

    #[test]
    fn test_single_thruster_force_and_torque() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        let rcs = vessel.resolver().find_tank("rcs").unwrap();
        let before = vessel.fuel().fuel_kg(rcs);
        assert!(vessel.execute(&Command::FireThruster { thruster: "nose_port".into(), active: true }).is_accepted());
        vessel.run_for(10);

        let propulsion = vessel.telemetry().propulsion;
        assert!((propulsion.force_n - DVec3::new(450.0, 0.0, 0.0)).length() < EPS);
        assert!((propulsion.torque_nm - DVec3::new(0.0, 2475.0, 0.0)).length() < EPS);
        assert!((before - vessel.fuel().fuel_kg(rcs) - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_translation_pair_cancels_torque() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::FireThruster { thruster: "nose_port".into(), active: true });
        vessel.execute(&Command::FireThruster { thruster: "tail_port".into(), active: true });
        vessel.step();
        let propulsion = vessel.telemetry().propulsion;
        assert!((propulsion.force_n.x - 900.0).abs() < EPS);
        assert!(propulsion.torque_nm.length() < EPS);

        vessel.execute(&Command::FireThruster { thruster: "nose_port".into(), active: false });
        vessel.execute(&Command::FireThruster { thruster: "tail_port".into(), active: false });
        vessel.step();
        assert_eq!(vessel.telemetry().propulsion.force_n, DVec3::ZERO);
    }

    #[test]
    fn test_unpowered_drivers_produce_nothing() {
        let mut vessel = Vessel::new(VesselConfig::default()).unwrap();
        vessel.execute(&Command::SetBreaker { breaker: "rcs_drivers".into(), on: false });
        vessel.execute(&Command::FireThruster { thruster: "tail_dorsal".into(), active: true });
        vessel.run_for(5);
        assert_eq!(vessel.telemetry().propulsion.force_n, DVec3::ZERO);
        assert_eq!(
            vessel.execute(&Command::FireThruster { thruster: "warp".into(), active: true }),
            CommandStatus::Ignored("unknown thruster")
        );
    }

    #[test]
    fn test_starved_thruster_reports_once() {
        let mut config = VesselConfig::default();
        config.fuel.tanks.iter_mut().find(|t| t.name == "rcs").unwrap().fuel_kg = 0.0;
        let mut vessel = Vessel::new(config).unwrap();
        vessel.execute(&Command::FireThruster { thruster: "nose_dorsal".into(), active: true });
        let events = vessel.run_for(10);
        let starved = events
            .iter()
            .filter(|r| matches!(r.event, Event::ThrusterFuelStarved { .. }))
            .count();
        assert_eq!(starved, 1);
        assert_eq!(vessel.telemetry().propulsion.force_n, DVec3::ZERO);
    }
}
