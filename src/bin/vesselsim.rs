use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use colored::*;
use std::fs;
use tracing_subscriber::EnvFilter;
use vesselsim::events::EventRecord;
use vesselsim::scenarios::{Scenario, ScenarioOutcome};
use vesselsim::telemetry::{csv_headers, export_snapshot_csv, TelemetryCollector};
use vesselsim::{ProtocolHandler, ResponseStatus, SafetyLevel, TelemetrySnapshot, Vessel, VesselConfig};

const DEFAULT_TICKS: &str = "600";
const DEFAULT_CSV_EVERY: &str = "10";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("vesselsim")
        .version("0.1.0")
        .author("Space Systems Engineering Team")
        .about("🚀 Vessel Simulator - coupled spacecraft subsystem simulation")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .help("Increase log verbosity (-v info, -vv debug)")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("▶️  Run the simulation headless")
                .long_about("Steps a vessel for a fixed number of ticks, applying an optional command script")
                .arg(
                    Arg::with_name("config")
                        .short("c")
                        .long("config")
                        .value_name("FILE")
                        .help("Vessel configuration JSON (defaults to the standard vessel)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("script")
                        .short("s")
                        .long("script")
                        .value_name("FILE")
                        .help("Newline-separated JSON commands")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("ticks")
                        .short("t")
                        .long("ticks")
                        .value_name("N")
                        .help("Number of ticks to run")
                        .takes_value(true)
                        .default_value(DEFAULT_TICKS)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(_) => Ok(()),
                            Err(_) => Err("Tick count must be a valid number".into()),
                        }),
                )
                .arg(
                    Arg::with_name("csv")
                        .long("csv")
                        .help("Print telemetry as CSV instead of the summary table"),
                )
                .arg(
                    Arg::with_name("every")
                        .long("every")
                        .value_name("N")
                        .help("Telemetry sampling interval in ticks")
                        .takes_value(true)
                        .default_value(DEFAULT_CSV_EVERY)
                        .validator(|v| match v.parse::<u64>() {
                            Ok(n) if n > 0 => Ok(()),
                            _ => Err("Interval must be a positive number".into()),
                        }),
                ),
        )
        .subcommand(
            SubCommand::with_name("scenario")
                .about("🧪 Run a built-in acceptance scenario")
                .arg(
                    Arg::with_name("name")
                        .help("Scenario letter or name (a, b, c, d or all)")
                        .default_value("all"),
                )
                .arg(
                    Arg::with_name("json")
                        .long("json")
                        .help("Print outcomes as JSON"),
                ),
        )
        .subcommand(
            SubCommand::with_name("config")
                .about("📄 Print the default vessel configuration as JSON"),
        )
        .get_matches();

    init_tracing(matches.occurrences_of("verbose"));

    match matches.subcommand() {
        ("run", Some(sub)) => handle_run(sub),
        ("scenario", Some(sub)) => handle_scenario(sub),
        ("config", Some(_)) => {
            println!("{}", VesselConfig::default().to_json_pretty()?);
            Ok(())
        }
        _ => {
            println!("{}", "No command specified. Use --help for usage information.".yellow());
            Ok(())
        }
    }
}

fn init_tracing(verbosity: u64) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_run(matches: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match matches.value_of("config") {
        Some(path) => VesselConfig::from_json(&fs::read_to_string(path)?)?,
        None => VesselConfig::default(),
    };
    let ticks: u64 = matches.value_of("ticks").unwrap_or(DEFAULT_TICKS).parse()?;
    let every: u64 = matches.value_of("every").unwrap_or(DEFAULT_CSV_EVERY).parse()?;
    let csv = matches.is_present("csv");

    let mut vessel = Vessel::new(config)?;
    let mut protocol = ProtocolHandler::new();

    if let Some(path) = matches.value_of("script") {
        let script = fs::read_to_string(path)?;
        let envelopes = protocol.parse_script(&script)?;
        for envelope in &envelopes {
            envelope.command.check_names(vessel.resolver())?;
        }
        for envelope in envelopes {
            let id = envelope.id;
            let status = vessel.submit(envelope);
            let response = protocol.create_response(id, vessel.tick(), status);
            if !csv {
                print_response(id, status, &protocol.serialize_response(&response)?);
            }
        }
    }

    let mut collector = TelemetryCollector::new(every);
    let mut events: Vec<EventRecord> = Vec::new();
    if csv {
        println!("{}", csv_headers());
    }
    for _ in 0..ticks {
        let report = vessel.step();
        if !csv {
            for record in &report.events {
                print_event(record);
            }
        }
        events.extend(report.events);
        if collector.should_collect(report.tick) {
            let snapshot = vessel.telemetry().clone();
            if csv {
                println!("{}", export_snapshot_csv(&snapshot)?);
            }
            collector.record(snapshot);
        }
    }

    if !csv {
        print_summary(vessel.telemetry(), events.len());
    }
    Ok(())
}

fn print_response(id: u32, status: ResponseStatus, json: &str) {
    match status {
        ResponseStatus::Acknowledged => println!("{} {} {}", "ACK".bright_green(), id, json.dimmed()),
        ResponseStatus::Scheduled => println!("{} {} {}", "SCHED".bright_cyan(), id, json.dimmed()),
        ResponseStatus::NegativeAck(reason) => println!("{} {} {}", "NACK".bright_red(), id, reason),
    }
}

fn print_event(record: &EventRecord) {
    let line = format!("[{:>6}] {:?}", record.tick, record.event);
    if record.event.is_terminal() {
        println!("{}", line.bright_red());
    } else {
        println!("{}", line.yellow());
    }
}

fn level_label(level: SafetyLevel) -> ColoredString {
    let label = format!("{:?}", level);
    match level {
        SafetyLevel::Normal => label.bright_green(),
        SafetyLevel::Caution => label.yellow(),
        SafetyLevel::Warning => label.bright_yellow(),
        SafetyLevel::Critical | SafetyLevel::Emergency => label.bright_red().bold(),
    }
}

fn print_summary(snapshot: &TelemetrySnapshot, event_count: usize) {
    println!();
    println!("{}", "📊 Vessel Status".bright_blue().bold());
    println!("{} {} ({:.1} s)", "Tick:".bright_white(), snapshot.tick, snapshot.time_s);
    println!("{} {}", "Alarm level:".bright_white(), level_label(snapshot.safety.level));
    println!("{} {}", "Events:".bright_white(), event_count);

    let power = &snapshot.power;
    println!("{}", "⚡ Power".bright_blue());
    println!(
        "  reactor {:?} {:.1} kW at {:.1} K, battery {:.1}%, load {:.2} kW{}",
        power.reactor.status,
        power.reactor.output_kw,
        power.reactor.temperature_k,
        power.storage.battery_percent,
        power.total_load_kw,
        if power.blackout { " BLACKOUT".bright_red().to_string() } else { String::new() },
    );

    println!("{}", "🛢️  Fluids".bright_blue());
    for tank in &snapshot.fuel {
        println!("  tank {:<12} {:>8.1} kg {:>6.2} bar", tank.name.as_str(), tank.fuel_kg, tank.pressure_bar);
    }
    for lp in &snapshot.hydraulics {
        println!("  hydraulic {:?} {:>6.1} bar {:>6.2} L", lp.side, lp.pressure_bar, lp.fluid_volume_l);
    }
    for lp in &snapshot.coolant {
        println!("  coolant {:?} {:>6.1} K {:>6.1} kg", lp.side, lp.temperature_k, lp.mass_kg);
    }

    println!("{}", "🔥 Propulsion".bright_blue());
    println!(
        "  engine {} thrust {:.1} N nozzle {:.3}",
        if snapshot.engine.ignited { "lit".bright_green() } else { "off".dimmed() },
        snapshot.engine.thrust_n,
        snapshot.engine.nozzle_efficiency,
    );

    println!("{}", "🌬️  Atmosphere".bright_blue());
    for c in &snapshot.compartments {
        let line = format!(
            "  {:<12} {:>7.2} kPa O2 {:>5.2}% CO2 {:>5.3}% {:>6.1} K",
            c.name.as_str(),
            c.pressure_kpa,
            c.o2_percent,
            c.co2_percent,
            c.temperature_k,
        );
        if c.depressurized {
            println!("{}", line.bright_red());
        } else {
            println!("{}", line);
        }
    }
    for fire in &snapshot.fires {
        println!("  {} compartment {} intensity {:.2}", "FIRE".bright_red().bold(), fire.compartment.0, fire.intensity);
    }
}

fn handle_scenario(matches: &ArgMatches<'_>) -> Result<(), Box<dyn std::error::Error>> {
    let name = matches.value_of("name").unwrap_or("all");
    let scenarios: Vec<Scenario> = if name.eq_ignore_ascii_case("all") {
        Scenario::ALL.to_vec()
    } else {
        match Scenario::from_name(name) {
            Some(scenario) => vec![scenario],
            None => return Err(format!("unknown scenario '{}'", name).into()),
        }
    };

    let mut outcomes = Vec::new();
    for scenario in scenarios {
        outcomes.push(scenario.run()?);
    }

    if matches.is_present("json") {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
    }

    if outcomes.iter().all(ScenarioOutcome::passed) {
        Ok(())
    } else {
        Err("one or more scenario checks failed".into())
    }
}

fn print_outcome(outcome: &ScenarioOutcome) {
    let scenario = outcome.scenario;
    let verdict = if outcome.passed() { "PASS".bright_green().bold() } else { "FAIL".bright_red().bold() };
    println!(
        "{} Scenario {}: {} ({} ticks, {:.1} s)",
        verdict,
        scenario.letter(),
        scenario.description(),
        outcome.ticks_run,
        outcome.time_s,
    );
    for check in &outcome.checks {
        let mark = if check.passed { "✅" } else { "❌" };
        println!("   {} {:<30} {}", mark, check.name, check.detail.dimmed());
    }
}
