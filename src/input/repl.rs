//! Interactive key source
//!
//! Stands in for a hardware knob box: each line typed at the prompt becomes
//! one or more key transitions.
//!
//! ```text
//! cat> tap left ctrl+left alt+page up     # press in order, release in reverse
//! cat> down F16
//! cat> up F16
//! ```

use anyhow::Result;
use async_trait::async_trait;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{KeyEvent, KeySource};

const HELP: &str = "\
Commands:
  down <KEY>            press a key (e.g. down LEFT CTRL)
  up <KEY>              release a key
  tap <KEY>[+<KEY>...]  press keys in order, then release in reverse
  help                  show this help
  quit | exit           stop";

/// Parsed REPL line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Events(Vec<KeyEvent>),
    Help,
    Quit,
    Empty,
}

/// Parse one REPL line
pub fn parse_line(line: &str) -> std::result::Result<ReplCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ReplCommand::Empty);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    match verb.to_ascii_lowercase().as_str() {
        "quit" | "exit" => Ok(ReplCommand::Quit),
        "help" | "?" => Ok(ReplCommand::Help),
        "down" | "up" | "tap" if rest.is_empty() => Err(format!("'{}' needs a key name", verb)),
        "down" => Ok(ReplCommand::Events(vec![KeyEvent::down(rest)])),
        "up" => Ok(ReplCommand::Events(vec![KeyEvent::up(rest)])),
        "tap" => {
            let keys: Vec<&str> = rest.split('+').map(str::trim).collect();
            if keys.iter().any(|k| k.is_empty()) {
                return Err(format!("invalid key combination '{}'", rest));
            }
            let mut events: Vec<KeyEvent> = keys.iter().map(|k| KeyEvent::down(*k)).collect();
            events.extend(keys.iter().rev().map(|k| KeyEvent::up(*k)));
            Ok(ReplCommand::Events(events))
        }
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

/// Key source reading commands from the terminal
#[derive(Debug)]
pub struct ReplKeySource {
    prompt: String,
}

impl ReplKeySource {
    pub fn new() -> Self {
        Self {
            prompt: "cat> ".to_string(),
        }
    }
}

impl Default for ReplKeySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySource for ReplKeySource {
    fn name(&self) -> &str {
        "repl"
    }

    async fn run(self: Box<Self>, tx: mpsc::UnboundedSender<KeyEvent>) -> Result<()> {
        let prompt = self.prompt.clone();

        // rustyline blocks on the terminal
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut rl = DefaultEditor::new()?;
            println!("{}", HELP);

            loop {
                let line = match rl.readline(&prompt) {
                    Ok(line) => line,
                    Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                    Err(e) => return Err(e.into()),
                };

                match parse_line(&line) {
                    Ok(ReplCommand::Quit) => break,
                    Ok(ReplCommand::Help) => println!("{}", HELP),
                    Ok(ReplCommand::Empty) => {}
                    Ok(ReplCommand::Events(events)) => {
                        let _ = rl.add_history_entry(line.as_str());
                        for event in events {
                            debug!("Key event: {}", event);
                            if tx.send(event).is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }

            Ok(())
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_down_up() {
        assert_eq!(
            parse_line("down PAGE UP"),
            Ok(ReplCommand::Events(vec![KeyEvent::down("PAGE UP")]))
        );
        assert_eq!(
            parse_line("  UP   f16 "),
            Ok(ReplCommand::Events(vec![KeyEvent::up("f16")]))
        );
    }

    #[test]
    fn test_parse_tap_releases_in_reverse() {
        let parsed = parse_line("tap LEFT CTRL + LEFT ALT + HOME").unwrap();
        assert_eq!(
            parsed,
            ReplCommand::Events(vec![
                KeyEvent::down("LEFT CTRL"),
                KeyEvent::down("LEFT ALT"),
                KeyEvent::down("HOME"),
                KeyEvent::up("HOME"),
                KeyEvent::up("LEFT ALT"),
                KeyEvent::up("LEFT CTRL"),
            ])
        );
    }

    #[test]
    fn test_parse_control_words() {
        assert_eq!(parse_line("quit"), Ok(ReplCommand::Quit));
        assert_eq!(parse_line("EXIT"), Ok(ReplCommand::Quit));
        assert_eq!(parse_line("help"), Ok(ReplCommand::Help));
        assert_eq!(parse_line("   "), Ok(ReplCommand::Empty));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_line("down").is_err());
        assert!(parse_line("tap F1++F2").is_err());
        assert!(parse_line("press F1").is_err());
    }
}
