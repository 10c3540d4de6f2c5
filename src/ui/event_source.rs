use std::{
    io::{self, BufRead},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::Duration,
};

use anyhow::Result;

use crate::{domain::events::AppEvent, usecases::contracts::AppEventSource};

use super::commands::parse_line;

const EVENT_POLL_TIMEOUT: Duration = Duration::from_millis(100);
const STDIN_READ_FAILED: &str = "STDIN_READ_FAILED";

/// Reads console lines on a background thread. Waiting longer than the poll
/// timeout yields a tick; end of input yields a quit.
pub struct StdinEventSource {
    lines: Receiver<String>,
}

impl StdinEventSource {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            return;
                        }
                    }
                    Err(error) => {
                        tracing::warn!(code = STDIN_READ_FAILED, error = %error, "stdin read failed");
                        return;
                    }
                }
            }
        });

        Self::from_receiver(rx)
    }

    fn from_receiver(lines: Receiver<String>) -> Self {
        Self { lines }
    }
}

impl AppEventSource for StdinEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        match self.lines.recv_timeout(EVENT_POLL_TIMEOUT) {
            Ok(line) => Ok(parse_line(&line)),
            Err(RecvTimeoutError::Timeout) => Ok(Some(AppEvent::Tick)),
            Err(RecvTimeoutError::Disconnected) => Ok(Some(AppEvent::QuitRequested)),
        }
    }
}

#[cfg(test)]
pub struct MockEventSource {
    queue: std::collections::VecDeque<AppEvent>,
}

#[cfg(test)]
impl MockEventSource {
    pub fn from(events: Vec<AppEvent>) -> Self {
        Self {
            queue: events.into(),
        }
    }
}

#[cfg(test)]
impl AppEventSource for MockEventSource {
    fn next_event(&mut self) -> Result<Option<AppEvent>> {
        Ok(self.queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::ShellCommand;

    #[test]
    fn lines_become_commands_and_silence_becomes_tick() {
        let (tx, rx) = mpsc::channel();
        let mut source = StdinEventSource::from_receiver(rx);
        tx.send("hi".to_owned()).expect("line should queue");

        assert_eq!(
            source.next_event().expect("event should read"),
            Some(AppEvent::Command(ShellCommand::Send("hi".to_owned())))
        );
        assert_eq!(source.next_event().expect("event should read"), Some(AppEvent::Tick));

        drop(tx);
        assert_eq!(
            source.next_event().expect("event should read"),
            Some(AppEvent::QuitRequested)
        );
    }
}
