//! tello-link CLI - keyboard flight over the raw UDP link.

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::Instant;
use tracing::warn;

use tello_link::cli::*;
use tello_link::config::{init_logging, Config};
use tello_link::control::{FlightAction, Pilot};
use tello_link::error::{Error, Result};
use tello_link::protocol::Stick;
use tello_link::session::{Session, SessionReport};
use tello_link::VERSION;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config if specified
    let config = if let Some(ref path) = cli.config {
        Config::load(path)?
    } else if Config::default_path().exists() {
        Config::load(Config::default_path())?
    } else {
        Config::default()
    };

    // Initialize logging
    let logging = cli.logging(&config.logging);
    init_logging(&logging)?;
    if !logging.color {
        colored::control::set_override(false);
    }

    // Dispatch command
    match cli.command {
        Commands::Fly(args) => run_fly(args, config).await,
        Commands::Config(args) => run_config(&args),
    }
}

/// Fly from stdin until the operator quits or Ctrl-C.
async fn run_fly(args: FlyArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);

    println!(
        "{}",
        "╔══════════════════════════════════════════╗".bright_cyan()
    );
    println!(
        "{}",
        "║     TELLO LINK                           ║".bright_cyan()
    );
    println!(
        "{}",
        format!("║     Version {:<29}║", VERSION).bright_cyan()
    );
    println!(
        "{}",
        "╚══════════════════════════════════════════╝".bright_cyan()
    );
    println!();

    println!("{}", "Endpoints:".bright_white());
    println!("  {} drone   {}", "→".cyan(), config.drone.command_addr);
    if config.video.enabled {
        println!("  {} video   {}", "←".cyan(), config.video.listen_addr);
        println!("  {} relay   {}", "→".cyan(), config.video.relay_addr);
    } else {
        println!("  {} video   {}", "✗".yellow(), "disabled".dimmed());
    }
    println!();

    let session = Session::start(&config).await?;
    println!(
        "{} Linked. Keys: W/S A/D I/K J/L, space to take off or land, enter to quit",
        "✓".green()
    );
    println!();

    let pilot = session.pilot();
    drive(&pilot, args.hold).await?;

    let report = session.shutdown().await?;
    print_report(&report);
    Ok(())
}

/// Input loop. Returns once stop has been requested.
async fn drive(pilot: &Pilot, hold: Duration) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let revert = tokio::time::sleep(hold);
    tokio::pin!(revert);
    let mut holding = false;

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            () = pilot.state().stopped() => break,

            _ = &mut ctrl_c => {
                println!();
                println!("{} Interrupted", "⚠".yellow());
                land_and_stop(pilot).await;
                break;
            }

            () = &mut revert, if holding => {
                holding = false;
                pilot.set_stick(Stick::Hover);
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    // stdin closed; nothing more can be commanded.
                    land_and_stop(pilot).await;
                    break;
                };

                match Intent::from_line(&line) {
                    Intent::Stick(stick) => {
                        pilot.set_stick(stick);
                        holding = stick != Stick::Hover;
                        if holding {
                            revert.as_mut().reset(Instant::now() + hold);
                        }
                    }
                    Intent::TakeOffOrLand => {
                        holding = false;
                        match pilot.request_takeoff_or_land().await {
                            Ok(FlightAction::TakeOff) => println!("{} Taking off", "↑".green()),
                            Ok(FlightAction::Land) => println!("{} Landing", "↓".green()),
                            Err(e) => println!("{} {}", "✗".red(), e),
                        }
                    }
                    Intent::Quit if pilot.state().is_in_flight() => {
                        println!("{} Land first (space), then quit", "⚠".yellow());
                    }
                    Intent::Quit => pilot.request_stop(),
                }
            }
        }
    }

    Ok(())
}

async fn land_and_stop(pilot: &Pilot) {
    if pilot.state().is_in_flight() {
        if let Err(e) = pilot.request_takeoff_or_land().await {
            warn!(error = %e, "Land command failed");
        }
    }
    pilot.request_stop();
}

fn print_report(report: &SessionReport) {
    println!();
    println!("{}", "Session summary:".bright_white().bold());
    println!("{}", "─".repeat(44));
    println!(
        "  heartbeat  {:>8} sent  {:>6} failed",
        report.heartbeat.ticks, report.heartbeat.failures
    );
    println!(
        "  keyframe   {:>8} sent  {:>6} failed",
        report.keyframe.ticks, report.keyframe.failures
    );
    if let Some(relay) = report.relay {
        println!(
            "  video      {:>8} fwd   {:>6} dropped  ({} bytes)",
            relay.forwarded, relay.dropped, relay.bytes_forwarded
        );
    }
    if let Some(ref e) = report.relay_error {
        println!("  {} video relay failed: {}", "✗".red(), e);
    }
    println!("{}", "─".repeat(44));
}

/// Print example configuration
fn run_config(args: &ConfigArgs) -> Result<()> {
    if args.path {
        println!("{}", Config::default_path().display());
        return Ok(());
    }

    let output = toml::to_string_pretty(&Config::example())
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    if let Some(ref path) = args.output {
        std::fs::write(path, &output)?;
        println!(
            "{} Configuration written to {}",
            "✓".green(),
            path.display()
        );
    } else {
        println!("{output}");
    }

    Ok(())
}
