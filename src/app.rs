use anyhow::Result;

use crate::{
    cli::{Cli, Command},
    infra::error::AppError,
    ui,
    usecases::bootstrap,
};

const SESSION_START_FAILED: &str = "CHAT_SESSION_START_FAILED";

pub fn run(cli: Cli) -> Result<()> {
    match cli.command_or_default() {
        Command::Run => {
            let (context, _log_guard) = bootstrap::bootstrap(cli.config.as_deref())?;

            let mut shell = match bootstrap::compose_shell(&context) {
                Ok(shell) => shell,
                Err(error @ AppError::SessionStart(_)) => {
                    tracing::error!(code = SESSION_START_FAILED, error = %error, "chat session did not start");
                    for line in session_start_failure_lines(&context.config.identity.user_id, &error) {
                        eprintln!("{line}");
                    }
                    return Err(error.into());
                }
                Err(error) => return Err(error.into()),
            };

            ui::shell::start(
                &context,
                shell.event_source.as_mut(),
                shell.orchestrator.as_mut(),
            )?;
        }
    }

    Ok(())
}

fn session_start_failure_lines(user_id: &str, error: &AppError) -> [String; 3] {
    [
        format!("{SESSION_START_FAILED}: {error}"),
        format!("Signed-in identity was \"{user_id}\"."),
        "Set [identity] user_id in the config file to a known member and restart.".to_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ChatError;

    #[test]
    fn session_failure_lines_name_identity_and_fix() {
        let error = AppError::SessionStart(ChatError::NotAuthenticated);

        let lines = session_start_failure_lines("mallory", &error);

        assert!(lines[0].starts_with(SESSION_START_FAILED));
        assert!(lines[0].contains("no authenticated user"));
        assert!(lines[1].contains("mallory"));
        assert!(lines[2].contains("[identity] user_id"));
    }
}
