use std::sync::Arc;
use std::time::Duration;

use taskrelay_core::config::{AppConfig, ConfigError};
use taskrelay_core::coordinator::{Coordinator, CoordinatorSettings};
use taskrelay_core::tracker::TrackerError;
use taskrelay_telegram::api::BotApiTransport;
use taskrelay_telegram::events::conversation_dispatcher;
use taskrelay_telegram::polling::{PollPolicy, PollingRunner, TransportError};
use taskrelay_tracker::JiraClient;
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub coordinator: Arc<Coordinator>,
    pub runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("tracker client setup failed: {0}")]
    Tracker(#[source] TrackerError),
    #[error("telegram transport setup failed: {0}")]
    Transport(#[source] TransportError),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    config.validate()?;

    let tracker = JiraClient::from_config(&config.tracker).map_err(BootstrapError::Tracker)?;
    let coordinator =
        Arc::new(Coordinator::new(Arc::new(tracker), CoordinatorSettings::from_config(&config)));
    info!(
        event_name = "system.bootstrap.coordinator_ready",
        correlation_id = "bootstrap",
        project_key = %config.tracker.project_key,
        authorized_users = config.access.authorized_user_ids.len(),
        "conversation coordinator ready"
    );

    let transport =
        BotApiTransport::from_config(&config.telegram).map_err(BootstrapError::Transport)?;
    let policy = PollPolicy {
        max_consecutive_failures: config.telegram.max_consecutive_failures,
        lane_idle: Duration::from_secs(config.telegram.lane_idle_secs),
        ..PollPolicy::default()
    };
    let runner =
        PollingRunner::new(Arc::new(transport), conversation_dispatcher(coordinator.clone()), policy);

    Ok(Application { config, coordinator, runner })
}
