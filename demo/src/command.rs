//! Line commands typed into either role.

use std::io::BufRead;

use crossbeam_channel::Receiver;
use log::warn;

/// One line of player input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Begin(String),
    End(String),
    Press(String),
    Quit,
}

impl Command {
    /// Parses `+Action`, `-Action`, `Action` or `quit`. Blank lines are
    /// `None`.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.eq_ignore_ascii_case("quit") {
            return Some(Self::Quit);
        }
        if let Some(action) = line.strip_prefix('+') {
            return Some(Self::Begin(action.trim().to_owned()));
        }
        if let Some(action) = line.strip_prefix('-') {
            return Some(Self::End(action.trim().to_owned()));
        }
        Some(Self::Press(line.to_owned()))
    }
}

/// Reads stdin on its own thread and hands parsed commands to the
/// simulation loop. The channel disconnects at end of input.
pub fn spawn_stdin_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = std::thread::Builder::new()
        .name("mpnet-stdin".to_owned())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if tx.send(command).is_err() {
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        warn!("stdin reader not started: {err}");
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_commands() {
        assert_eq!(Command::parse("+MoveUp"), Some(Command::Begin("MoveUp".into())));
        assert_eq!(Command::parse(" -MoveUp \n"), Some(Command::End("MoveUp".into())));
        assert_eq!(Command::parse("Shoot"), Some(Command::Press("Shoot".into())));
        assert_eq!(Command::parse("QUIT"), Some(Command::Quit));
        assert_eq!(Command::parse("   "), None);
    }

    #[test]
    fn multibyte_lines_do_not_panic() {
        assert_eq!(Command::parse("é"), Some(Command::Press("é".into())));
        assert_eq!(Command::parse("+ü"), Some(Command::Begin("ü".into())));
    }
}
