// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Headless front end: load one session (or schedule) through the tiers and
//! print it.

use std::process::ExitCode;

use clap::Parser;
use f1_dash::{DashConfig, DataCoordinator, EventRef, SessionKey, SessionType};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Formula 1 session data through a cache, SQLite and the OpenF1 API", long_about = None)]
struct Cli {
    /// Championship year
    #[arg(long, default_value_t = 2024)]
    season: i32,

    /// Round number or event name ("14", "Monza", "Italian Grand Prix")
    #[arg(long, value_parser = parse_event)]
    event: Option<EventRef>,

    /// FP1, FP2, FP3, SQ, S, Q or R
    #[arg(long, default_value = "R")]
    session: SessionType,

    /// Print a telemetry summary for this driver (code or car number)
    #[arg(long)]
    driver: Option<String>,

    /// Bypass cache and database and fetch from the API
    #[arg(long)]
    refresh: bool,

    /// Print the season schedule instead of a session
    #[arg(long)]
    schedule: bool,
}

fn parse_event(s: &str) -> Result<EventRef, String> {
    s.parse().map_err(|e: f1_dash::KeyParseError| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("f1_dash=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = DashConfig::from_env()?;
    let coordinator = DataCoordinator::from_config(&config).await?;

    if cli.schedule {
        let schedule = coordinator.get_schedule(cli.season).await?;
        println!("{} season, {} events", schedule.season, schedule.events.len());
        for event in &schedule.events {
            println!(
                "{:>3}  {:<28} {:<16} {}  {}",
                event.round,
                event.name,
                event.country,
                event.date.format("%Y-%m-%d"),
                event.status.as_str()
            );
        }
        return Ok(());
    }

    // Without --event, show the current weekend or the latest one
    let event = match cli.event {
        Some(event) => event,
        None => {
            let schedule = coordinator.get_schedule(cli.season).await?;
            let latest = schedule
                .latest_event(chrono::Utc::now())
                .ok_or_else(|| format!("No events published for {}", cli.season))?;
            EventRef::Round(latest.round)
        }
    };

    let key = SessionKey::new(cli.season, event, cli.session);
    let record = if cli.refresh {
        coordinator.refresh(&key).await?
    } else {
        coordinator.get_session(&key).await?
    };

    println!("{} ({})", key, record.session_name);
    if record.is_empty() {
        println!("No data available for this session");
    } else {
        println!("{}", record.columns.join("  "));
        for row in record.table() {
            println!("{}", row.join("  "));
        }
    }

    if let Some(driver) = cli.driver {
        let telemetry = if cli.refresh {
            coordinator.refresh_telemetry(&key, &driver).await?
        } else {
            coordinator.get_telemetry(&key, &driver).await?
        };
        match telemetry.summary() {
            Some(s) => println!(
                "{}: max {:.0} km/h, avg {:.0} km/h, throttle {:.0}%, brake {:.0}%, {:.0} m over {} samples",
                telemetry.driver, s.max_speed, s.avg_speed, s.max_throttle, s.max_brake, s.distance, s.samples
            ),
            None => println!("{}: no telemetry", telemetry.driver),
        }
    }

    let health = coordinator.health_check().await;
    tracing::debug!(?health, "Backend health");
    Ok(())
}
