use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use taskrelay_core::domain::chat::UserId;

use crate::events::{EventContext, EventDispatcher, HandlerResult, TelegramEvent, UpdateEnvelope};
use crate::keyboards::render_reply;
use crate::polling::UpdateTransport;

/// `None` collects updates that carry no sender.
type LaneKey = Option<UserId>;

struct Lane {
    sender: UnboundedSender<UpdateEnvelope>,
    worker: JoinHandle<()>,
}

struct LaneContext {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<EventDispatcher>,
    idle: Duration,
}

/// One worker task per active user. Updates for a user are handled strictly
/// in arrival order; different users run concurrently. A lane retires after
/// `idle` without traffic and is respawned on the next update.
pub(crate) struct LaneSet {
    lanes: HashMap<LaneKey, Lane>,
    context: Arc<LaneContext>,
}

impl LaneSet {
    pub(crate) fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: Arc<EventDispatcher>,
        idle: Duration,
    ) -> Self {
        Self {
            lanes: HashMap::new(),
            context: Arc::new(LaneContext { transport, dispatcher, idle }),
        }
    }

    pub(crate) fn submit(&mut self, envelope: UpdateEnvelope) {
        let key = envelope.sender();
        let envelope = match self.lanes.get(&key) {
            Some(lane) => match lane.sender.send(envelope) {
                Ok(()) => return,
                Err(mpsc::error::SendError(envelope)) => envelope,
            },
            None => envelope,
        };

        // The previous worker may still be draining; the new one waits for it.
        let previous = self.lanes.remove(&key).map(|lane| lane.worker);
        let (sender, receiver) = mpsc::unbounded_channel();
        if sender.send(envelope).is_err() {
            return;
        }
        let worker = tokio::spawn(run_lane(key, receiver, previous, self.context.clone()));
        debug!(
            event_name = "ingress.telegram.lane_opened",
            user_id = key.map(|user| user.0),
            active_lanes = self.lanes.len() + 1,
            "opened update lane"
        );
        self.lanes.insert(key, Lane { sender, worker });
        self.prune();
    }

    fn prune(&mut self) {
        self.lanes.retain(|_, lane| !(lane.sender.is_closed() && lane.worker.is_finished()));
    }

    /// Closes every lane and waits until queued updates are processed.
    pub(crate) async fn shutdown(self) {
        let workers: Vec<JoinHandle<()>> = self
            .lanes
            .into_values()
            .map(|Lane { sender, worker }| {
                drop(sender);
                worker
            })
            .collect();

        for worker in workers {
            if let Err(error) = worker.await {
                warn!(
                    event_name = "ingress.telegram.lane_panicked",
                    error = %error,
                    "update lane ended abnormally"
                );
            }
        }
    }
}

async fn run_lane(
    key: LaneKey,
    mut receiver: UnboundedReceiver<UpdateEnvelope>,
    previous: Option<JoinHandle<()>>,
    context: Arc<LaneContext>,
) {
    if let Some(previous) = previous {
        let _ = previous.await;
    }

    loop {
        match tokio::time::timeout(context.idle, receiver.recv()).await {
            Ok(Some(envelope)) => process(&context, envelope).await,
            Ok(None) => break,
            Err(_) => {
                receiver.close();
                while let Ok(envelope) = receiver.try_recv() {
                    process(&context, envelope).await;
                }
                debug!(
                    event_name = "ingress.telegram.lane_retired",
                    user_id = key.map(|user| user.0),
                    "retired idle update lane"
                );
                break;
            }
        }
    }
}

async fn process(context: &LaneContext, envelope: UpdateEnvelope) {
    let correlation = EventContext::for_update(envelope.update_id);

    if let TelegramEvent::CallbackQuery(query) = &envelope.event {
        if let Err(error) = context.transport.answer_callback(&query.callback_id).await {
            warn!(
                event_name = "ingress.telegram.callback_ack_failed",
                update_id = envelope.update_id,
                correlation_id = %correlation.correlation_id,
                error = %error,
                "failed to answer callback query"
            );
        }
    }

    match context.dispatcher.dispatch(&envelope, &correlation).await {
        Ok(HandlerResult::Responded(reply)) => {
            let message = render_reply(&reply);
            match context.transport.send_message(&message).await {
                Ok(()) => debug!(
                    event_name = "egress.telegram.message_sent",
                    update_id = envelope.update_id,
                    chat_id = message.chat_id,
                    correlation_id = %correlation.correlation_id,
                    "sent reply"
                ),
                Err(error) => warn!(
                    event_name = "egress.telegram.message_failed",
                    update_id = envelope.update_id,
                    chat_id = message.chat_id,
                    correlation_id = %correlation.correlation_id,
                    error = %error,
                    "failed to send reply"
                ),
            }
        }
        Ok(HandlerResult::Ignored) => debug!(
            event_name = "ingress.telegram.update_ignored",
            update_id = envelope.update_id,
            event_type = ?envelope.event.event_type(),
            correlation_id = %correlation.correlation_id,
            "ignored update"
        ),
        Err(error) => warn!(
            event_name = "ingress.telegram.dispatch_failed",
            update_id = envelope.update_id,
            correlation_id = %correlation.correlation_id,
            error = %error,
            "update dispatch failed; continuing"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::LaneSet;
    use crate::events::test_support::coordinator;
    use crate::events::{conversation_dispatcher, MessageEvent, TelegramEvent, UpdateEnvelope};
    use crate::polling::test_support::ScriptedTransport;

    fn text(update_id: i64, user_id: i64, text: &str) -> UpdateEnvelope {
        UpdateEnvelope {
            update_id,
            event: TelegramEvent::Message(MessageEvent {
                chat_id: user_id,
                user_id: Some(user_id),
                text: text.to_owned(),
            }),
        }
    }

    #[tokio::test]
    async fn idle_lane_is_respawned_and_keeps_order() {
        let transport = Arc::new(ScriptedTransport::default());
        let dispatcher = Arc::new(conversation_dispatcher(coordinator(Arc::default(), &[42])));
        let mut lanes = LaneSet::new(transport.clone(), dispatcher, Duration::from_millis(20));

        lanes.submit(text(1, 42, "/start"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        lanes.submit(text(2, 42, "Fix login bug"));
        lanes.submit(text(3, 42, "Button disabled on Safari"));
        lanes.shutdown().await;

        let texts: Vec<String> = transport.sent().await.into_iter().map(|m| m.text).collect();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("summary"));
        assert!(texts[1].contains("description"));
        assert!(texts[2].contains("assigned"));
    }

    #[tokio::test]
    async fn updates_without_sender_do_not_stop_the_lane() {
        let transport = Arc::new(ScriptedTransport::default());
        let dispatcher = Arc::new(conversation_dispatcher(coordinator(Arc::default(), &[42])));
        let mut lanes = LaneSet::new(transport.clone(), dispatcher, Duration::from_secs(5));

        lanes.submit(UpdateEnvelope {
            update_id: 1,
            event: TelegramEvent::Message(MessageEvent {
                chat_id: -100,
                user_id: None,
                text: "channel post".to_owned(),
            }),
        });
        lanes.submit(UpdateEnvelope {
            update_id: 2,
            event: TelegramEvent::Unsupported { kind: "edited_message".to_owned() },
        });
        lanes.submit(text(3, 7, "/start"));
        lanes.shutdown().await;

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Sorry, you are not authorized to use this bot.");
    }
}
