//! DreamControl surface controller
//!
//! Bridges the control surface hardware ports with the DAW and the monitor plugin.

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use std::path::Path;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dreamcontrol_surface::cli::{self, PanelCommand};
use dreamcontrol_surface::input::{INTERRUPT_LINES, POLLED_FIRST_LINE};
use dreamcontrol_surface::midi::{format_hex, MidiMessage, Port};
use dreamcontrol_surface::transport::{discovery, MidiEvent, MidiTransport};
use dreamcontrol_surface::{AppConfig, ControllerSession, Effect};

/// Polled bank with every line released (active-low)
const POLLED_IDLE: u16 = 0b11_1111;

/// DreamControl - studio monitor controller surface
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "dreamcontrol.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Write the default configuration to --config and exit
    #[arg(long)]
    write_config: bool,

    /// Interactive panel simulating the surface buttons and encoder
    #[arg(long)]
    panel: bool,

    /// Print every message in and out
    #[arg(long)]
    sniff: bool,

    /// Run without opening MIDI ports (panel only)
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting DreamControl v{}...", env!("CARGO_PKG_VERSION"));

    if args.write_config {
        AppConfig::default().save(&args.config).await?;
        info!("Default configuration written to {}", args.config);
        return Ok(());
    }

    let config = if Path::new(&args.config).exists() {
        info!("Configuration file: {}", args.config);
        AppConfig::load(&args.config).await?
    } else {
        warn!("{} not found, using defaults", args.config);
        AppConfig::default()
    };

    if args.list_ports {
        discovery::print_ports(&config.midi);
        return Ok(());
    }

    run_app(config, &args).await?;

    info!("DreamControl shutdown complete");
    Ok(())
}

/// Session state that lives only in the binary
struct App {
    session: ControllerSession,
    transport: MidiTransport,
    started: Instant,
    polled: u16,
    sniff: bool,
}

impl App {
    fn now_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn emit(&self, effects: Vec<Effect>) {
        if effects.is_empty() {
            return;
        }
        if self.sniff {
            for effect in &effects {
                print_effect(effect);
            }
        }
        for effect in &effects {
            if let Effect::Led { led, on } = effect {
                debug!("{} -> {}", led, on);
            }
        }
        self.transport.apply(&effects);
    }

    fn set_line(&mut self, line: u8, pressed: bool) {
        let now = self.now_ms();
        let effects = if line < INTERRUPT_LINES {
            // active-low: pressed pulls the line down
            self.session.pin_changed(line, !pressed, now)
        } else {
            let bit = 1 << (line - POLLED_FIRST_LINE);
            if pressed {
                self.polled &= !bit;
            } else {
                self.polled |= bit;
            }
            self.session.tick(self.polled, now)
        };
        self.emit(effects);
    }

    fn on_midi(&mut self, event: MidiEvent) {
        if self.sniff {
            print_inbound(event.port, &event.data);
        }
        let effects = self.session.midi_received(event.port, &event.data);
        self.emit(effects);
    }

    /// Returns false when the panel asked to quit
    fn on_panel(&mut self, command: PanelCommand) -> bool {
        match command {
            PanelCommand::Press(line) => self.set_line(line, true),
            PanelCommand::Release(line) => self.set_line(line, false),
            PanelCommand::Tap(line) => {
                self.set_line(line, true);
                self.set_line(line, false);
            }
            PanelCommand::Encoder(steps) => {
                let effects = self.session.encoder_moved(steps);
                self.emit(effects);
            }
            PanelCommand::Midi { port, data } => self.on_midi(MidiEvent { port, data }),
            PanelCommand::Leds => {
                let lit: Vec<String> = self
                    .session
                    .leds()
                    .lit()
                    .map(|led| led.0.to_string())
                    .collect();
                println!("lit: [{}]", lit.join(", "));
            }
            PanelCommand::Status => self.print_status(),
            PanelCommand::Help => println!("{}", cli::HELP),
            PanelCommand::Quit => return false,
        }
        true
    }

    fn print_status(&self) {
        let surface = self.session.handler();
        println!("shift:  {}", self.session.shift_active());
        println!("meters: {}", surface.settings());
        println!(
            "knob:   {} ({} dB), ring override {:?}",
            surface.knobs().current(),
            surface.knobs().level_db(),
            surface.knobs().hue_override()
        );
        if let Some(bars) = surface.led_bars() {
            let full: Vec<String> = bars.iter().map(|bar| bar.full().to_string()).collect();
            println!("bars:   {} of 15 lit", full.join(" / "));
        }
        match surface.lcd_lines() {
            Some(lines) => {
                for line in lines {
                    println!("lcd:    |{}|", line);
                }
            }
            None => println!("lcd:    no meter data yet"),
        }
    }
}

async fn run_app(config: AppConfig, args: &Args) -> Result<()> {
    let mut transport = MidiTransport::new();
    let mut midi_rx = transport
        .take_event_receiver()
        .context("MIDI event receiver already taken")?;

    if args.offline {
        info!("Offline mode: no MIDI ports opened");
    } else {
        transport
            .connect(&config.midi)
            .context("Failed to open MIDI ports (try --list-ports)")?;
    }

    let mut app = App {
        session: ControllerSession::with_surface(&config),
        transport,
        started: Instant::now(),
        polled: POLLED_IDLE,
        sniff: args.sniff,
    };

    let effects = app.session.startup();
    app.emit(effects);

    let (panel_tx, mut panel_rx) = mpsc::channel::<PanelCommand>(64);
    if args.panel {
        cli::spawn_panel(panel_tx)?;
    } else {
        drop(panel_tx);
    }

    let mut tick = tokio::time::interval(std::time::Duration::from_millis(config.buttons.tick_ms));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("Ready to process MIDI events!");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let now = app.now_ms();
                let effects = app.session.tick(app.polled, now);
                app.emit(effects);
            }

            Some(event) = midi_rx.recv() => {
                app.on_midi(event);
            }

            Some(command) = panel_rx.recv() => {
                if !app.on_panel(command) {
                    info!("Panel closed");
                    break;
                }
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    app.transport.disconnect();
    Ok(())
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

fn print_inbound(port: Port, data: &[u8]) {
    let hex = format_hex(data);
    let hex = match MidiMessage::parse(data) {
        Some(MidiMessage::NoteOn { .. }) | Some(MidiMessage::NoteOff { .. }) => hex.bright_green(),
        Some(MidiMessage::ControlChange { .. }) => hex.bright_yellow(),
        Some(MidiMessage::SysEx { .. }) => hex.bright_magenta(),
        _ => hex.bright_black(),
    };
    println!(
        "[{}] {} {:12} | {}",
        timestamp().dimmed(),
        "IN ".green(),
        port.to_string().white(),
        hex
    );
}

fn print_effect(effect: &Effect) {
    let (direction, text) = match effect {
        Effect::Led { .. } => ("LED".yellow(), effect.to_string().normal()),
        Effect::Raw { .. } => ("RAW".cyan(), effect.to_string().normal()),
        Effect::Midi(outbound) => (
            "OUT".red(),
            format!("{} [{}]", outbound, format_hex(&outbound.message.encode())).bright_blue(),
        ),
    };
    println!("[{}] {} {}", timestamp().dimmed(), direction, text);
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
}
