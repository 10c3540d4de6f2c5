use std::path::Path;

use chrono::Utc;
use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    domain::chat_store::ChatStore,
    infra::{
        self, config::FileConfigAdapter, contracts::ConfigAdapter, error::AppError,
        memory_backend::MemoryBackend,
    },
    ui::event_source::StdinEventSource,
    usecases::{
        context::AppContext,
        contracts::{AppEventSource, ShellOrchestrator, SystemClock},
        shell::DefaultShellOrchestrator,
    },
};

pub struct ShellComposition {
    pub event_source: Box<dyn AppEventSource>,
    pub orchestrator: Box<dyn ShellOrchestrator>,
}

/// Loads config and installs file logging. Keep the guard alive until exit.
pub fn bootstrap(config_path: Option<&Path>) -> Result<(AppContext, WorkerGuard), AppError> {
    let context = build_context(config_path)?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok((context, guard))
}

/// Seeds the in-process backend, signs in as the configured identity and
/// wires the console event source to the orchestrator.
pub fn compose_shell(context: &AppContext) -> Result<ShellComposition, AppError> {
    let config = &context.config;
    let backend = MemoryBackend::demo(
        config.identity.user_id.clone(),
        config.realtime.feed_capacity,
        Utc::now(),
    )?;
    let store = ChatStore::new(config.chat.store_settings());

    let mut orchestrator =
        DefaultShellOrchestrator::new(store, backend, SystemClock, config.realtime.enabled);
    orchestrator.start().map_err(AppError::SessionStart)?;

    Ok(ShellComposition {
        event_source: Box::new(StdinEventSource::spawn()),
        orchestrator: Box::new(orchestrator),
    })
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    build_context_from(&FileConfigAdapter::new(config_path))
}

fn build_context_from(config_adapter: &dyn ConfigAdapter) -> Result<AppContext, AppError> {
    let config = config_adapter.load().map_err(AppError::Other)?;

    Ok(AppContext::new(config))
}
