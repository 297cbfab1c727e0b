//! Interactive control panel
//!
//! A rustyline prompt that stands in for the physical surface: it injects
//! button edges, encoder movement and raw MIDI into the running session.

use anyhow::{anyhow, bail, Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;

use crate::midi::Port;
use crate::routing::LINE_COUNT;

pub const HELP: &str = "\
commands:
  press <line>            hold a button line down (0-37, 32 is shift)
  release <line>          let a button line go
  tap <line>              press and release
  enc <steps>             turn the encoder (negative turns down)
  midi <port> <hex...>    inject bytes as if received on daw|plugin|fader|calibration
  leds                    show lit LEDs
  status                  show surface state
  help                    this text
  quit                    stop the controller";

/// One panel action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelCommand {
    Press(u8),
    Release(u8),
    Tap(u8),
    Encoder(i32),
    Midi { port: Port, data: Vec<u8> },
    Leds,
    Status,
    Help,
    Quit,
}

fn parse_line(arg: Option<&str>) -> Result<u8> {
    let arg = arg.ok_or_else(|| anyhow!("missing line number"))?;
    let line: u8 = arg
        .parse()
        .with_context(|| format!("invalid line number '{}'", arg))?;
    if line >= LINE_COUNT {
        bail!("line {} out of range (0-{})", line, LINE_COUNT - 1);
    }
    Ok(line)
}

fn parse_port(arg: Option<&str>) -> Result<Port> {
    match arg.map(str::to_lowercase).as_deref() {
        Some("daw") => Ok(Port::Daw),
        Some("plugin") => Ok(Port::Plugin),
        Some("fader") => Ok(Port::Fader),
        Some("calibration") | Some("cal") => Ok(Port::Calibration),
        Some(other) => bail!("unknown port '{}'", other),
        None => bail!("missing port"),
    }
}

impl PanelCommand {
    pub fn parse(input: &str) -> Result<Self> {
        let mut words = input.split_whitespace();
        let command = words.next().ok_or_else(|| anyhow!("empty command"))?;

        let parsed = match command.to_lowercase().as_str() {
            "press" | "p" => PanelCommand::Press(parse_line(words.next())?),
            "release" | "r" => PanelCommand::Release(parse_line(words.next())?),
            "tap" | "t" => PanelCommand::Tap(parse_line(words.next())?),
            "enc" | "e" => {
                let arg = words.next().ok_or_else(|| anyhow!("missing step count"))?;
                let steps = arg
                    .parse()
                    .with_context(|| format!("invalid step count '{}'", arg))?;
                PanelCommand::Encoder(steps)
            }
            "midi" | "m" => {
                let port = parse_port(words.next())?;
                let data = words
                    .by_ref()
                    .map(|word| {
                        u8::from_str_radix(word.trim_start_matches("0x"), 16)
                            .with_context(|| format!("invalid hex byte '{}'", word))
                    })
                    .collect::<Result<Vec<u8>>>()?;
                if data.is_empty() {
                    bail!("no bytes given");
                }
                PanelCommand::Midi { port, data }
            }
            "leds" | "l" => PanelCommand::Leds,
            "status" | "s" => PanelCommand::Status,
            "help" | "h" | "?" => PanelCommand::Help,
            "quit" | "exit" | "q" => PanelCommand::Quit,
            other => bail!("unknown command '{}' (try 'help')", other),
        };

        if let Some(extra) = words.next() {
            bail!("unexpected argument '{}'", extra);
        }
        Ok(parsed)
    }
}

/// Run the prompt on its own thread, forwarding parsed commands.
/// The thread ends on quit, EOF/Ctrl-C, or when the receiver is dropped.
pub fn spawn_panel(tx: mpsc::Sender<PanelCommand>) -> Result<std::thread::JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("panel".to_string())
        .spawn(move || {
            if let Err(e) = run_panel(&tx) {
                println!("panel error: {:#}", e);
                let _ = tx.blocking_send(PanelCommand::Quit);
            }
        })
        .context("Failed to spawn panel thread")?;

    Ok(handle)
}

fn run_panel(tx: &mpsc::Sender<PanelCommand>) -> Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to start the panel prompt")?;
    println!("{}", HELP);

    loop {
        let command = match editor.readline("dreamcontrol> ") {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                match PanelCommand::parse(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => PanelCommand::Quit,
            Err(e) => return Err(e).context("Failed to read panel input"),
        };

        if command == PanelCommand::Help {
            println!("{}", HELP);
            continue;
        }
        let quit = command == PanelCommand::Quit;
        if tx.blocking_send(command).is_err() || quit {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_commands() {
        assert_eq!(PanelCommand::parse("press 3").unwrap(), PanelCommand::Press(3));
        assert_eq!(PanelCommand::parse("R 37").unwrap(), PanelCommand::Release(37));
        assert_eq!(PanelCommand::parse("  tap 0 ").unwrap(), PanelCommand::Tap(0));
        assert!(PanelCommand::parse("press 38").is_err());
        assert!(PanelCommand::parse("press").is_err());
        assert!(PanelCommand::parse("press x").is_err());
    }

    #[test]
    fn test_encoder_command() {
        assert_eq!(PanelCommand::parse("enc -4").unwrap(), PanelCommand::Encoder(-4));
        assert!(PanelCommand::parse("enc").is_err());
    }

    #[test]
    fn test_midi_command() {
        assert_eq!(
            PanelCommand::parse("midi plugin 90 13 7F").unwrap(),
            PanelCommand::Midi {
                port: Port::Plugin,
                data: vec![0x90, 0x13, 0x7F],
            }
        );
        assert_eq!(
            PanelCommand::parse("m daw 0xB0 0x07 0x40").unwrap(),
            PanelCommand::Midi {
                port: Port::Daw,
                data: vec![0xB0, 0x07, 0x40],
            }
        );
        assert!(PanelCommand::parse("midi usb 90").is_err());
        assert!(PanelCommand::parse("midi daw").is_err());
        assert!(PanelCommand::parse("midi daw GG").is_err());
    }

    #[test]
    fn test_misc_commands() {
        assert_eq!(PanelCommand::parse("leds").unwrap(), PanelCommand::Leds);
        assert_eq!(PanelCommand::parse("exit").unwrap(), PanelCommand::Quit);
        assert!(PanelCommand::parse("").is_err());
        assert!(PanelCommand::parse("dance").is_err());
        assert!(PanelCommand::parse("leds now").is_err());
    }
}
