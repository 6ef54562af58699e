use std::sync::atomic::{AtomicBool, Ordering};
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::events::{EventDispatcher, UpdateEnvelope};
use crate::keyboards::OutgoingMessage;
use crate::lanes::LaneSet;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("fetching updates failed: {0}")]
    Receive(String),
    #[error("sending message failed: {0}")]
    Send(String),
    #[error("answering callback query failed: {0}")]
    Acknowledge(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("update polling gave up after {failures} consecutive failures: {last}")]
    RetriesExhausted { failures: u32, last: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// `None` keeps polling forever.
    pub max_consecutive_failures: Option<u32>,
    pub lane_idle: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            max_consecutive_failures: None,
            lane_idle: Duration::from_secs(300),
        }
    }
}

impl PollPolicy {
    fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Source of updates plus the reply channel back to the platform.
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    /// Next batch at or after `offset`; `None` means the source is closed.
    async fn fetch_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<Option<Vec<UpdateEnvelope>>, TransportError>;
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), TransportError>;
    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError>;
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
    policy: PollPolicy,
    healthy: Arc<AtomicBool>,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        policy: PollPolicy,
    ) -> Self {
        Self {
            transport,
            dispatcher: Arc::new(dispatcher),
            policy,
            healthy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares a flag that is true while the last `getUpdates` call succeeded
    /// and false after a failed poll or once the runner has stopped.
    pub fn with_health_flag(mut self, healthy: Arc<AtomicBool>) -> Self {
        self.healthy = healthy;
        self
    }

    pub fn health_flag(&self) -> Arc<AtomicBool> {
        self.healthy.clone()
    }

    /// Polls until the source closes. Updates are fanned out to per-user
    /// lanes, so one slow conversation never holds up another.
    pub async fn start(&self) -> Result<(), RunnerError> {
        let mut lanes =
            LaneSet::new(self.transport.clone(), self.dispatcher.clone(), self.policy.lane_idle);
        self.healthy.store(true, Ordering::Relaxed);
        let outcome = self.pump(&mut lanes).await;
        self.healthy.store(false, Ordering::Relaxed);
        lanes.shutdown().await;
        outcome
    }

    async fn pump(&self, lanes: &mut LaneSet) -> Result<(), RunnerError> {
        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;
        info!(event_name = "ingress.telegram.polling_started", "telegram update polling started");

        loop {
            match self.transport.fetch_updates(offset).await {
                Ok(Some(batch)) => {
                    if failures > 0 {
                        info!(
                            event_name = "ingress.telegram.polling_recovered",
                            failures,
                            "update polling recovered"
                        );
                    }
                    failures = 0;
                    self.healthy.store(true, Ordering::Relaxed);

                    for envelope in batch {
                        offset = Some(offset.map_or(envelope.update_id + 1, |current| {
                            current.max(envelope.update_id + 1)
                        }));
                        debug!(
                            event_name = "ingress.telegram.update_received",
                            update_id = envelope.update_id,
                            event_type = ?envelope.event.event_type(),
                            correlation_id = %format!("update-{}", envelope.update_id),
                            "received telegram update"
                        );
                        lanes.submit(envelope);
                    }
                }
                Ok(None) => {
                    info!(
                        event_name = "ingress.telegram.polling_stopped",
                        "telegram update source closed"
                    );
                    return Ok(());
                }
                Err(error) => {
                    failures = failures.saturating_add(1);
                    self.healthy.store(false, Ordering::Relaxed);
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        failures,
                        max_consecutive_failures = ?self.policy.max_consecutive_failures,
                        error = %error,
                        "update polling failed"
                    );

                    if self.policy.max_consecutive_failures.is_some_and(|max| failures >= max) {
                        return Err(RunnerError::RetriesExhausted { failures, last: error });
                    }

                    let delay = self.policy.backoff(failures);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
