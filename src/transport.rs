//! MIDI transport
//!
//! Connects each logical port to a system MIDI port pair through midir. Input
//! callbacks run on midir's threads and only forward raw bytes into a tokio
//! channel; the session task consumes them one at a time.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};
use parking_lot::Mutex;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::MidiConfig;
use crate::midi::{format_hex, Outbound, Port};
use crate::session::Effect;

const CLIENT_NAME: &str = "DreamControl";

/// Raw MIDI received on a logical port
#[derive(Debug, Clone)]
pub struct MidiEvent {
    pub port: Port,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MIDI backend unavailable: {0}")]
    Init(String),

    #[error("no {direction} port matching '{pattern}' for {port}")]
    PortNotFound {
        port: Port,
        direction: &'static str,
        pattern: String,
    },

    #[error("failed to connect {port} port '{name}': {reason}")]
    Connect {
        port: Port,
        name: String,
        reason: String,
    },

    #[error("{0} port is not connected")]
    NotConnected(Port),

    #[error("failed to send to {port}: {reason}")]
    Send { port: Port, reason: String },
}

/// Case-insensitive substring match used for every port lookup
pub fn matches_pattern(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

fn find_input_port(midi_in: &MidiInput, pattern: &str) -> Option<(MidiInputPort, String)> {
    midi_in.ports().into_iter().find_map(|port| {
        let name = midi_in.port_name(&port).ok()?;
        matches_pattern(&name, pattern).then(|| {
            debug!("Found input '{}' matching pattern '{}'", name, pattern);
            (port, name)
        })
    })
}

fn find_output_port(midi_out: &MidiOutput, pattern: &str) -> Option<(MidiOutputPort, String)> {
    midi_out.ports().into_iter().find_map(|port| {
        let name = midi_out.port_name(&port).ok()?;
        matches_pattern(&name, pattern).then(|| {
            debug!("Found output '{}' matching pattern '{}'", name, pattern);
            (port, name)
        })
    })
}

/// Open connections for every configured logical port
pub struct MidiTransport {
    inputs: Vec<MidiInputConnection<()>>,
    outputs: HashMap<Port, Mutex<MidiOutputConnection>>,
    event_tx: mpsc::Sender<MidiEvent>,
    event_rx: Option<mpsc::Receiver<MidiEvent>>,
}

impl MidiTransport {
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(1000);
        Self {
            inputs: Vec::new(),
            outputs: HashMap::new(),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Connect input and output for each configured port
    pub fn connect(&mut self, config: &MidiConfig) -> Result<(), TransportError> {
        self.disconnect();

        let mut ports = vec![
            (Port::Daw, config.daw_port.as_str()),
            (Port::Plugin, config.plugin_port.as_str()),
            (Port::Fader, config.fader_port.as_str()),
        ];
        if let Some(pattern) = &config.calibration_port {
            ports.push((Port::Calibration, pattern.as_str()));
        }

        for (port, pattern) in ports {
            self.connect_input(port, pattern)?;
            self.connect_output(port, pattern)?;
        }

        info!("MIDI transport connected ({} ports)", self.outputs.len());
        Ok(())
    }

    fn connect_input(&mut self, port: Port, pattern: &str) -> Result<(), TransportError> {
        let mut midi_in = MidiInput::new(&format!("{}-{}-in", CLIENT_NAME, port))
            .map_err(|e| TransportError::Init(e.to_string()))?;
        // SysEx carries the meter data
        midi_in.ignore(Ignore::None);

        let (in_port, name) =
            find_input_port(&midi_in, pattern).ok_or_else(|| TransportError::PortNotFound {
                port,
                direction: "input",
                pattern: pattern.to_string(),
            })?;

        info!("Connecting {} input: {}", port, name);
        let event_tx = self.event_tx.clone();
        let connection = midi_in
            .connect(
                &in_port,
                CLIENT_NAME,
                move |_timestamp, data, _| {
                    let event = MidiEvent {
                        port,
                        data: data.to_vec(),
                    };
                    // Never block the driver thread
                    if event_tx.try_send(event).is_err() {
                        warn!("MIDI event queue full, dropping {} bytes from {}", data.len(), port);
                    }
                },
                (),
            )
            .map_err(|e| TransportError::Connect {
                port,
                name: name.clone(),
                reason: e.to_string(),
            })?;

        self.inputs.push(connection);
        Ok(())
    }

    fn connect_output(&mut self, port: Port, pattern: &str) -> Result<(), TransportError> {
        let midi_out = MidiOutput::new(&format!("{}-{}-out", CLIENT_NAME, port))
            .map_err(|e| TransportError::Init(e.to_string()))?;

        let (out_port, name) =
            find_output_port(&midi_out, pattern).ok_or_else(|| TransportError::PortNotFound {
                port,
                direction: "output",
                pattern: pattern.to_string(),
            })?;

        info!("Connecting {} output: {}", port, name);
        let connection = midi_out
            .connect(&out_port, CLIENT_NAME)
            .map_err(|e| TransportError::Connect {
                port,
                name: name.clone(),
                reason: e.to_string(),
            })?;

        self.outputs.insert(port, Mutex::new(connection));
        Ok(())
    }

    pub fn disconnect(&mut self) {
        if !self.inputs.is_empty() || !self.outputs.is_empty() {
            info!("MIDI transport disconnected");
        }
        self.inputs.clear();
        self.outputs.clear();
    }

    pub fn is_connected(&self, port: Port) -> bool {
        self.outputs.contains_key(&port)
    }

    /// Take the event receiver (for the session loop to consume)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<MidiEvent>> {
        self.event_rx.take()
    }

    /// Send raw bytes on a port
    pub fn send_raw(&self, port: Port, data: &[u8]) -> Result<(), TransportError> {
        let output = self
            .outputs
            .get(&port)
            .ok_or(TransportError::NotConnected(port))?;

        output.lock().send(data).map_err(|e| TransportError::Send {
            port,
            reason: e.to_string(),
        })?;

        debug!("Sent to {}: {}", port, format_hex(data));
        Ok(())
    }

    pub fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        self.send_raw(outbound.port, &outbound.message.encode())
    }

    /// Send every MIDI effect; LED effects are left to the caller
    pub fn apply(&self, effects: &[Effect]) {
        for effect in effects {
            let result = match effect {
                Effect::Midi(outbound) => self.send(outbound),
                Effect::Raw { port, bytes } => self.send_raw(*port, bytes),
                Effect::Led { .. } => Ok(()),
            };
            if let Err(e) = result {
                warn!("{}", e);
            }
        }
    }
}

impl Default for MidiTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Port discovery utilities
pub mod discovery {
    use super::*;
    use colored::*;

    /// Information about a MIDI port
    #[derive(Debug, Clone)]
    pub struct PortInfo {
        pub index: usize,
        pub name: String,
        pub is_virtual: bool,
    }

    fn is_virtual(name: &str) -> bool {
        name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC")
    }

    pub fn discover_input_ports() -> Result<Vec<PortInfo>, TransportError> {
        let midi_in = MidiInput::new(&format!("{}-Discovery", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;

        Ok(midi_in
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_in.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    pub fn discover_output_ports() -> Result<Vec<PortInfo>, TransportError> {
        let midi_out = MidiOutput::new(&format!("{}-Discovery", CLIENT_NAME))
            .map_err(|e| TransportError::Init(e.to_string()))?;

        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .filter_map(|(index, port)| {
                let name = midi_out.port_name(port).ok()?;
                Some(PortInfo {
                    index,
                    is_virtual: is_virtual(&name),
                    name,
                })
            })
            .collect())
    }

    fn print_section(title: &str, ports: Result<Vec<PortInfo>, TransportError>, config: &MidiConfig) {
        println!("\n{}", title.bold());
        let ports = match ports {
            Ok(ports) => ports,
            Err(e) => {
                println!("  {}", e.to_string().red());
                return;
            }
        };
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for port in ports {
            let marker = if port.is_virtual {
                "[VIRTUAL] ".yellow()
            } else {
                "[PHYSICAL]".green()
            };
            let role = Port::ALL
                .into_iter()
                .find(|role| {
                    pattern_for(config, *role)
                        .map(|pattern| matches_pattern(&port.name, pattern))
                        .unwrap_or(false)
                })
                .map(|role| format!(" <- {}", role).cyan().to_string())
                .unwrap_or_default();
            println!("  {:>2}: {} {}{}", port.index, marker, port.name, role);
        }
    }

    fn pattern_for(config: &MidiConfig, port: Port) -> Option<&str> {
        match port {
            Port::Daw => Some(config.daw_port.as_str()),
            Port::Plugin => Some(config.plugin_port.as_str()),
            Port::Fader => Some(config.fader_port.as_str()),
            Port::Calibration => config.calibration_port.as_deref(),
        }
    }

    /// Print every port, marking the ones the configuration would pick
    pub fn print_ports(config: &MidiConfig) {
        println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
        print_section("Input Ports:", discover_input_ports(), config);
        print_section("Output Ports:", discover_output_ports(), config);
        println!();
    }
}
