//! oscrelay CLI - OSC-over-UDP monitor, relay and proxy.

use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use oscrelay::cli::{Cli, Commands, RunArgs, SendArgs};
use oscrelay::codec::{self, OscType};
use oscrelay::config::{init_logging, LoggingConfig, Settings, SharedSettings};
use oscrelay::connection::{ConnectionEvent, ConnectionRegistry, MessageEvent};
use oscrelay::error::{Error, Result};
use oscrelay::types::SlotId;
use oscrelay::util;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    init_logging(&LoggingConfig {
        level: cli.log_level.clone(),
        color: !cli.no_color,
        ..Default::default()
    })?;

    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(Settings::default_path);

    match cli.command {
        Commands::Run(args) => run(args, settings_path).await,
        Commands::Send(args) => send(args, settings_path).await,
        Commands::Networks => {
            for network in util::valid_networks() {
                println!("{network}");
            }
            Ok(())
        }
        Commands::Config => {
            let text = toml::to_string_pretty(&Settings::example())
                .map_err(|e| Error::Config(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
    }
}

/// Open every active connection and print traffic until interrupted.
async fn run(args: RunArgs, settings_path: std::path::PathBuf) -> Result<()> {
    let settings = Settings::load_or_default(&settings_path)?;
    let show_date = settings.file().show_date_info;
    let show_each = settings.file().show_each_message && !args.quiet;

    let settings: SharedSettings = Arc::new(Mutex::new(settings));

    // Registry before event wiring; shell subscribes before the first
    // reconcile so open markers are not missed.
    let mut registry = ConnectionRegistry::new()
        .with_settings(Arc::clone(&settings) as Arc<dyn oscrelay::connection::SettingsSink>);
    let mut events = registry.subscribe();

    let configs = settings.lock().connections().to_vec();
    registry.reconcile_all(&configs).await;

    let active = registry.active_slots();
    if active.is_empty() {
        warn!("no active connections; edit {}", settings_path.display());
    } else {
        info!(
            "{} connection(s) open: {}",
            active.len(),
            active
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, show_each, show_date, args.frequency),
                Err(RecvError::Lagged(missed)) => {
                    warn!("display fell behind; {missed} event(s) dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    registry.shutdown().await;
    info!("all connections closed");
    Ok(())
}

/// Send a one-shot message through a slot's configured connection.
async fn send(args: SendArgs, settings_path: std::path::PathBuf) -> Result<()> {
    let slot = SlotId::new(args.slot)?;

    let settings = Settings::load_or_default(&settings_path)?;
    let config = settings.connection(slot).clone();
    if !config.active {
        return Err(Error::Config(format!("slot {slot} is not active")));
    }

    let mut registry = ConnectionRegistry::new();
    if !registry.reconcile(slot, &config).await {
        return Err(Error::Config(format!("slot {slot} failed to open")));
    }

    let packet = codec::message(args.address, args.args.iter().map(|a| parse_arg(a)).collect());

    let delivered = registry.send(slot, &packet).await;
    registry.shutdown().await;

    if delivered {
        println!("{} sent via slot {slot}", "✓".green());
        Ok(())
    } else {
        Err(Error::Config(format!(
            "send failed; does slot {slot} have an outbound port?"
        )))
    }
}

/// Detect the OSC type of a command-line argument.
fn parse_arg(text: &str) -> OscType {
    if let Ok(v) = text.parse::<i32>() {
        return OscType::Int(v);
    }
    if let Ok(v) = text.parse::<f32>() {
        return OscType::Float(v);
    }
    match text {
        "true" => OscType::Bool(true),
        "false" => OscType::Bool(false),
        _ => OscType::String(text.to_string()),
    }
}

fn print_event(event: &ConnectionEvent, show_each: bool, show_date: bool, show_frequency: bool) {
    match event {
        ConnectionEvent::Message(msg) => {
            if show_each {
                print_message(msg, show_date);
            }
        }
        ConnectionEvent::Frequency { slot, name, report } => {
            if show_frequency {
                println!(
                    "{} {name}: {:.1} msg/s, silent {} ms{}",
                    format!("[{slot}]").dimmed(),
                    report.rate,
                    report.silence_ms,
                    if report.ever_worked { "" } else { " (never worked)" },
                );
            }
        }
        ConnectionEvent::Error { slot, name, detail } => {
            eprintln!(
                "{} {name}: {}",
                format!("[{slot}]").dimmed(),
                detail.red()
            );
        }
        ConnectionEvent::Log { slot, name, detail } => {
            println!(
                "{} {name}: {}",
                format!("[{slot}]").dimmed(),
                detail.dimmed()
            );
        }
    }
}

fn print_message(msg: &MessageEvent, show_date: bool) {
    let direction = if msg.send_out {
        "→".green()
    } else if msg.proxy_in {
        "⇒".magenta()
    } else {
        "←".cyan()
    };

    let date = if show_date {
        format!("{} ", humantime::format_rfc3339_millis(msg.at)).dimmed()
    } else {
        String::new().dimmed()
    };

    let body = match &msg.packet {
        Some(packet) => codec::packet_summary(packet),
        None => "listening".dimmed().to_string(),
    };

    println!(
        "{date}{} {direction} {}: {body}",
        format!("[{}]", msg.slot).dimmed(),
        msg.name.bold(),
    );
}
