use std::io::{self, Write};

use anyhow::Result;
use chrono::Utc;

use crate::usecases::{
    context::AppContext,
    contracts::{AppEventSource, ShellOrchestrator},
};

use super::view;

pub fn start(
    context: &AppContext,
    event_source: &mut dyn AppEventSource,
    orchestrator: &mut dyn ShellOrchestrator,
) -> Result<()> {
    tracing::info!(
        log_level = %context.config.logging.level,
        identity = %context.config.identity.user_id,
        realtime = context.config.realtime.enabled,
        "starting console shell"
    );

    let stdout = io::stdout();
    run_loop(&mut stdout.lock(), event_source, orchestrator)
}

/// Draws a frame whenever the orchestrator reports changes, then feeds it
/// the next event until it stops.
fn run_loop(
    out: &mut dyn Write,
    event_source: &mut dyn AppEventSource,
    orchestrator: &mut dyn ShellOrchestrator,
) -> Result<()> {
    while orchestrator.state().is_running() {
        if orchestrator.state_mut().take_redraw() {
            draw(out, orchestrator)?;
        }

        if let Some(event) = event_source.next_event()? {
            orchestrator.handle_event(event)?;
        }
    }

    Ok(())
}

fn draw(out: &mut dyn Write, orchestrator: &mut dyn ShellOrchestrator) -> Result<()> {
    let notices = orchestrator.state_mut().take_notices();
    let frame = view::render(orchestrator.store(), orchestrator.state(), Utc::now());

    writeln!(out)?;
    for line in frame {
        writeln!(out, "{line}")?;
    }
    for notice in notices {
        writeln!(out, "» {notice}")?;
    }
    write!(out, "> ")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{
            channel::fixtures::group,
            chat_store::ChatStore,
            events::{AppEvent, ShellCommand},
            user::User,
        },
        infra::stubs::StubChatBackend,
        ui::event_source::MockEventSource,
        usecases::{contracts::SystemClock, shell::DefaultShellOrchestrator},
    };

    fn orchestrator() -> DefaultShellOrchestrator<StubChatBackend, SystemClock> {
        let mut backend = StubChatBackend::with_directory(
            vec![group("c1", "Physics", &["alice"])],
            vec![User::new("alice", "Alice")],
        );
        backend.identity = Some(User::new("alice", "Alice"));
        let mut orchestrator =
            DefaultShellOrchestrator::new(ChatStore::default(), backend, SystemClock, false);
        orchestrator.start().expect("session should start");
        orchestrator
    }

    #[test]
    fn mock_source_produces_quit_event() {
        let mut source = MockEventSource::from(vec![AppEvent::QuitRequested]);
        let event = source.next_event().expect("must read mock event");

        assert_eq!(event, Some(AppEvent::QuitRequested));
    }

    #[test]
    fn loop_draws_frames_and_stops_on_quit() {
        let mut source = MockEventSource::from(vec![
            AppEvent::Command(ShellCommand::Open("physics".to_owned())),
            AppEvent::Command(ShellCommand::Unknown("/dance".to_owned())),
            AppEvent::QuitRequested,
        ]);
        let mut orchestrator = orchestrator();
        let mut out = Vec::new();

        run_loop(&mut out, &mut source, &mut orchestrator).expect("loop should finish");

        let printed = String::from_utf8(out).expect("output should be utf-8");
        assert!(printed.contains("# Physics"));
        assert!(printed.contains("» Unknown command: /dance. Type /help for the list."));
        assert!(!orchestrator.state().is_running());
    }
}
