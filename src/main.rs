mod config;
mod error;
mod event;
mod export;
mod gcal;
mod ics;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use google_calendar::types::OrderBy;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gcal2ics")]
#[command(about = "Export upcoming Google Calendar events to an .ics file for your desktop calendar")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with Google Calendar
    Auth,
    /// List calendars available on the authenticated account
    Calendars,
    /// Fetch upcoming events, write the .ics file and hand it to the importer
    Export {
        /// Calendar ID to export from (defaults to "primary")
        #[arg(short, long)]
        calendar: Option<String>,

        /// Only include events starting at or after this RFC 3339 timestamp
        /// (defaults to now)
        #[arg(long)]
        time_min: Option<String>,

        /// Event ordering: "startTime" or "updated"
        #[arg(long)]
        order_by: Option<String>,

        /// Output path for the .ics file (defaults to the configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the file but skip the desktop importer handoff
        #[arg(long)]
        no_import: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth => cmd_auth().await,
        Commands::Calendars => cmd_calendars().await,
        Commands::Export {
            calendar,
            time_min,
            order_by,
            output,
            no_import,
        } => cmd_export(calendar, time_min, order_by, output, no_import).await,
    }
}

async fn cmd_auth() -> Result<()> {
    let cfg = config::load_config()?;

    println!("Authenticating with Google Calendar...");

    let tokens = gcal::authenticate(&cfg.gcal).await?;
    config::save_tokens(&tokens)?;

    println!("\nTokens stored. Run `gcal2ics export` to export your calendar.");

    Ok(())
}

async fn cmd_calendars() -> Result<()> {
    let cfg = config::load_config()?;
    let tokens = load_account_tokens(&cfg).await?;

    let calendars = gcal::fetch_calendars(&cfg.gcal, &tokens).await?;

    for cal in &calendars {
        if cal.primary {
            println!("{}  (primary)  [{}]", cal.name, cal.id);
        } else {
            println!("{}  [{}]", cal.name, cal.id);
        }
    }

    Ok(())
}

async fn cmd_export(
    calendar: Option<String>,
    time_min: Option<String>,
    order_by: Option<String>,
    output: Option<PathBuf>,
    no_import: bool,
) -> Result<()> {
    let cfg = config::load_config()?;
    let tokens = load_account_tokens(&cfg).await?;

    let params = build_fetch_params(calendar, time_min.as_deref(), order_by.as_deref())?;

    println!("📅 Exporting: {}", params.calendar_id);

    let events = gcal::fetch_events(&cfg.gcal, &tokens, &params).await?;
    println!("  Fetched {} events", events.len());

    let document = ics::build_calendar(&events);
    let blob = ics::render(&document);

    let path = output.unwrap_or_else(|| PathBuf::from(&cfg.output));
    let bytes = export::write_ics(&blob, &path)?;

    println!(
        "  Wrote {} events to {} ({} bytes)",
        events.len(),
        path.display(),
        bytes
    );

    if !no_import {
        if let Err(err) = export::hand_off(&path, cfg.importer.as_deref()).await {
            eprintln!("Could not hand the file to a calendar application: {:#}", err);
            eprintln!("Import {} manually.", path.display());
        }
    }

    Ok(())
}

/// Load stored tokens, refreshing them if expired
async fn load_account_tokens(cfg: &config::Config) -> Result<config::AccountTokens> {
    let tokens = config::load_tokens()?
        .ok_or_else(|| anyhow::anyhow!("Not authenticated yet. Run `gcal2ics auth` first."))?;

    gcal::ensure_valid_tokens(&cfg.gcal, tokens).await
}

/// Translate CLI flags into fetch parameters
fn build_fetch_params(
    calendar: Option<String>,
    time_min: Option<&str>,
    order_by: Option<&str>,
) -> Result<gcal::FetchParams> {
    let mut params = gcal::FetchParams::default();

    if let Some(calendar_id) = calendar {
        params.calendar_id = calendar_id;
    }

    if let Some(raw) = time_min {
        params.time_min = DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid --time-min '{}': expected RFC 3339", raw))?;
    }

    params.order_by = match order_by {
        None | Some("startTime") => OrderBy::StartTime,
        Some("updated") => OrderBy::Updated,
        Some(other) => {
            anyhow::bail!("Unknown --order-by '{}': use \"startTime\" or \"updated\"", other)
        }
    };

    Ok(params)
}
