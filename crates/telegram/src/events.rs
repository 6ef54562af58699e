use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use taskrelay_core::coordinator::Coordinator;
use taskrelay_core::domain::chat::{ChatId, UserId};
use taskrelay_core::inbound::InboundEvent;
use taskrelay_core::reply::Reply;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdateEnvelope {
    pub update_id: i64,
    pub event: TelegramEvent,
}

impl UpdateEnvelope {
    /// Lane key; updates without a known sender share one lane.
    pub fn sender(&self) -> Option<UserId> {
        match &self.event {
            TelegramEvent::Message(event) => event.user_id.map(UserId),
            TelegramEvent::CallbackQuery(event) => Some(UserId(event.user_id)),
            TelegramEvent::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    Message(MessageEvent),
    CallbackQuery(CallbackQueryEvent),
    Unsupported { kind: String },
}

impl TelegramEvent {
    pub fn event_type(&self) -> TelegramEventType {
        match self {
            Self::Message(_) => TelegramEventType::Message,
            Self::CallbackQuery(_) => TelegramEventType::CallbackQuery,
            Self::Unsupported { .. } => TelegramEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TelegramEventType {
    Message,
    CallbackQuery,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub chat_id: i64,
    /// Absent for channel posts and anonymous group admins.
    pub user_id: Option<i64>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackQueryEvent {
    pub callback_id: String,
    pub chat_id: i64,
    pub user_id: i64,
    pub data: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn for_update(update_id: i64) -> Self {
        Self { correlation_id: format!("update-{update_id}") }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Reply),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("message in chat {chat_id} has no sender")]
    MissingSender { chat_id: i64 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> TelegramEventType;
    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<TelegramEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &UpdateEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Routes text messages and button presses into the coordinator.
pub fn conversation_dispatcher(coordinator: Arc<Coordinator>) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(coordinator.clone()));
    dispatcher.register(CallbackQueryHandler::new(coordinator));
    dispatcher
}

pub struct MessageHandler {
    coordinator: Arc<Coordinator>,
}

impl MessageHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl EventHandler for MessageHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::Message
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        let Some(user_id) = event.user_id else {
            return Err(EventHandlerError::MissingSender { chat_id: event.chat_id });
        };

        let inbound = InboundEvent::from_text(UserId(user_id), ChatId(event.chat_id), &event.text);
        Ok(HandlerResult::Responded(self.coordinator.handle(&inbound).await))
    }
}

pub struct CallbackQueryHandler {
    coordinator: Arc<Coordinator>,
}

impl CallbackQueryHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl EventHandler for CallbackQueryHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::CallbackQuery
    }

    async fn handle(
        &self,
        envelope: &UpdateEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::CallbackQuery(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let inbound =
            InboundEvent::from_callback(UserId(event.user_id), ChatId(event.chat_id), &event.data);
        Ok(HandlerResult::Responded(self.coordinator.handle(&inbound).await))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use taskrelay_core::coordinator::{Coordinator, CoordinatorSettings};
    use taskrelay_core::domain::assignee::{Assignee, AssigneeDirectory};
    use taskrelay_core::domain::issue::{CreatedIssue, Epic, EpicCatalog, IssueRequest};
    use taskrelay_core::tracker::{IssueTracker, TrackerError};
    use taskrelay_core::AccessPolicy;
    use taskrelay_core::UserId;
    use tokio::sync::Notify;

    /// Tracker double with a fixed epic list; `list_epics` can be held on a
    /// gate until the test releases it.
    #[derive(Default)]
    pub struct FixedTracker {
        pub created: Mutex<Vec<IssueRequest>>,
        pub gate: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl IssueTracker for FixedTracker {
        async fn list_epics(&self) -> Result<EpicCatalog, TrackerError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(EpicCatalog::from_epics([Epic::new("10", "Q3 Platform")]))
        }

        async fn create_issue(&self, request: &IssueRequest) -> Result<CreatedIssue, TrackerError> {
            self.created.lock().expect("created lock").push(request.clone());
            Ok(CreatedIssue { key: "PROJ-7".to_owned() })
        }
    }

    pub fn coordinator(tracker: Arc<FixedTracker>, users: &[i64]) -> Arc<Coordinator> {
        let settings = CoordinatorSettings {
            access: AccessPolicy::new(users.iter().copied().map(UserId)),
            assignees: AssigneeDirectory::new(
                Assignee { account_id: "acc-me".to_owned(), label: "Me".to_owned() },
                Assignee { account_id: "acc-dana".to_owned(), label: "Dana".to_owned() },
            ),
            web_base_url: "https://acme.atlassian.net".to_owned(),
        };
        Arc::new(Coordinator::new(tracker, settings))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::test_support::{coordinator, FixedTracker};
    use super::{
        conversation_dispatcher, CallbackQueryEvent, DispatchError, EventContext,
        EventDispatcher, EventHandlerError, HandlerResult, MessageEvent, TelegramEvent,
        UpdateEnvelope,
    };

    fn message(update_id: i64, user_id: Option<i64>, text: &str) -> UpdateEnvelope {
        UpdateEnvelope {
            update_id,
            event: TelegramEvent::Message(MessageEvent {
                chat_id: 500,
                user_id,
                text: text.to_owned(),
            }),
        }
    }

    #[tokio::test]
    async fn unsupported_updates_are_ignored() {
        let dispatcher = conversation_dispatcher(coordinator(Arc::default(), &[42]));
        let envelope = UpdateEnvelope {
            update_id: 1,
            event: TelegramEvent::Unsupported { kind: "edited_message".to_owned() },
        };

        let result = dispatcher.dispatch(&envelope, &EventContext::for_update(1)).await;

        assert_eq!(result, Ok(HandlerResult::Ignored));
        assert_eq!(dispatcher.handler_count(), 2);
    }

    #[tokio::test]
    async fn empty_dispatcher_ignores_everything() {
        let dispatcher = EventDispatcher::default();
        let result =
            dispatcher.dispatch(&message(1, Some(42), "/start"), &EventContext::for_update(1)).await;
        assert_eq!(result, Ok(HandlerResult::Ignored));
    }

    #[tokio::test]
    async fn text_messages_reach_the_coordinator() {
        let dispatcher = conversation_dispatcher(coordinator(Arc::default(), &[42]));

        let result = dispatcher
            .dispatch(&message(1, Some(42), "/start"), &EventContext::for_update(1))
            .await
            .expect("dispatch");

        let HandlerResult::Responded(reply) = result else {
            panic!("expected a reply");
        };
        assert_eq!(reply.chat_id.0, 500);
        assert!(reply.text.contains("summary"));
    }

    #[tokio::test]
    async fn message_without_sender_is_rejected() {
        let dispatcher = conversation_dispatcher(coordinator(Arc::default(), &[42]));

        let result =
            dispatcher.dispatch(&message(3, None, "hello"), &EventContext::for_update(3)).await;

        assert_eq!(
            result,
            Err(DispatchError::Handler(EventHandlerError::MissingSender { chat_id: 500 }))
        );
    }

    #[tokio::test]
    async fn button_presses_reach_the_coordinator() {
        let tracker = Arc::new(FixedTracker::default());
        let dispatcher = conversation_dispatcher(coordinator(tracker, &[42]));

        let envelope = UpdateEnvelope {
            update_id: 9,
            event: TelegramEvent::CallbackQuery(CallbackQueryEvent {
                callback_id: "cb-1".to_owned(),
                chat_id: 500,
                user_id: 42,
                data: "cancel".to_owned(),
            }),
        };
        let result = dispatcher.dispatch(&envelope, &EventContext::for_update(9)).await;

        let Ok(HandlerResult::Responded(reply)) = result else {
            panic!("expected a reply");
        };
        assert_eq!(reply.text, "There is nothing to cancel.");
    }
}
