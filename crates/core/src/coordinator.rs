//! Per-user issue intake conversation.
//!
//! Every inbound event passes the access gate first, then is mapped to a
//! [`FlowEvent`] and applied to the user's current [`FlowState`]. The engine
//! answers with the target state and the actions to run; the coordinator runs
//! them against a working copy of the session and commits the result to the
//! [`SessionStore`] only when the whole turn succeeded.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::access::AccessPolicy;
use crate::config::AppConfig;
use crate::domain::assignee::{AssigneeChoice, AssigneeDirectory};
use crate::domain::chat::{ChatId, UserId};
use crate::domain::issue::EpicId;
use crate::domain::session::Session;
use crate::errors::{ApplicationError, DomainError};
use crate::flows::{FlowAction, FlowEngine, FlowEvent, FlowState, IssueIntakeFlow};
use crate::inbound::{BotCommand, CallbackAction, InboundEvent, InboundKind};
use crate::reply::{self, Reply};
use crate::store::SessionStore;
use crate::tracker::IssueTracker;

#[derive(Clone, Debug)]
pub struct CoordinatorSettings {
    pub access: AccessPolicy,
    pub assignees: AssigneeDirectory,
    pub web_base_url: String,
}

impl CoordinatorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            access: AccessPolicy::from_config(&config.access),
            assignees: AssigneeDirectory::from_config(&config.assignees),
            web_base_url: config.tracker.web_base_url.clone(),
        }
    }
}

pub struct Coordinator {
    engine: FlowEngine<IssueIntakeFlow>,
    sessions: SessionStore,
    tracker: Arc<dyn IssueTracker>,
    settings: CoordinatorSettings,
}

/// Working state of one event turn.
struct Turn {
    user_id: UserId,
    chat_id: ChatId,
    session: Option<Session>,
    discarded: bool,
    reply: Option<Reply>,
}

impl Turn {
    fn session_mut(&mut self) -> Result<&mut Session, DomainError> {
        self.session.as_mut().ok_or_else(|| {
            DomainError::InvariantViolation("flow action requires an open session".to_owned())
        })
    }
}

impl Coordinator {
    pub fn new(tracker: Arc<dyn IssueTracker>, settings: CoordinatorSettings) -> Self {
        Self { engine: FlowEngine::default(), sessions: SessionStore::new(), tracker, settings }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn session(&self, user_id: UserId) -> Option<Session> {
        self.sessions.get(user_id)
    }

    /// Handles one inbound event and returns the reply for its chat. Failures
    /// never escape: they become a user-facing message.
    pub async fn handle(&self, event: &InboundEvent) -> Reply {
        if !self.settings.access.is_authorized(event.sender) {
            warn!(
                event_name = "conversation.access_denied",
                user_id = %event.sender,
                chat_id = %event.chat,
                input = event.label(),
                "rejected event from unauthorized sender"
            );
            return reply::unauthorized(event.chat);
        }

        let _turn_guard = self.sessions.lock_user(event.sender).await;
        match self.run_turn(event).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(
                    event_name = "conversation.turn_failed",
                    user_id = %event.sender,
                    chat_id = %event.chat,
                    input = event.label(),
                    error = %error,
                    "conversation turn failed"
                );
                reply::error(event.chat, &error)
            }
        }
    }

    async fn run_turn(&self, event: &InboundEvent) -> Result<Reply, ApplicationError> {
        let current = self.sessions.get(event.sender);
        let from = current
            .as_ref()
            .map(|session| session.state().clone())
            .unwrap_or_else(|| self.engine.initial_state());

        let flow_event = match &event.kind {
            InboundKind::Command(BotCommand::Help) => return Ok(reply::help(event.chat)),
            InboundKind::Command(BotCommand::Start) => FlowEvent::StartRequested,
            InboundKind::Command(BotCommand::Cancel) => FlowEvent::CancelRequested,
            InboundKind::Callback(CallbackAction::Cancel) => FlowEvent::CancelRequested,
            InboundKind::Text(_) => FlowEvent::TextReceived,
            InboundKind::Callback(CallbackAction::Assignee(_)) => FlowEvent::AssigneeSelected,
            InboundKind::Callback(CallbackAction::Epic(epic_id)) => {
                let stale = current
                    .as_ref()
                    .and_then(Session::epic_candidates)
                    .map_or(true, |candidates| !candidates.contains(epic_id));
                if stale {
                    return Err(ApplicationError::InvalidSelection(
                        CallbackAction::Epic(epic_id.clone()).data(),
                    ));
                }
                FlowEvent::EpicSelected
            }
            InboundKind::Callback(CallbackAction::Unknown(data)) => {
                return Err(ApplicationError::InvalidSelection(data.clone()));
            }
        };

        let outcome = self.engine.apply(&from, &flow_event).map_err(DomainError::from)?;
        let mut to = outcome.to;
        let mut pending = VecDeque::from(outcome.actions);
        let mut turn = Turn {
            user_id: event.sender,
            chat_id: event.chat,
            session: current,
            discarded: false,
            reply: None,
        };

        while let Some(action) = pending.pop_front() {
            if let Some(follow_up) = self.execute(&action, event, &mut turn).await? {
                let next = self.engine.apply(&to, &follow_up).map_err(DomainError::from)?;
                debug!(
                    event_name = "flow.follow_up_applied",
                    user_id = %event.sender,
                    from = ?next.from,
                    follow_up = ?next.event,
                    to = ?next.to,
                    "flow redirected by action result"
                );
                to = next.to;
                pending = VecDeque::from(next.actions);
            }
        }

        info!(
            event_name = "flow.transition_applied",
            user_id = %event.sender,
            chat_id = %event.chat,
            input = event.label(),
            from = ?from,
            to = ?to,
            "conversation advanced"
        );

        let reply = turn.reply.take().ok_or_else(|| {
            DomainError::InvariantViolation(format!("transition to {to:?} produced no reply"))
        })?;
        self.commit(turn, to);
        Ok(reply)
    }

    /// Runs one flow action. Returns a follow-up event when the action's
    /// result changes the course of the flow.
    async fn execute(
        &self,
        action: &FlowAction,
        event: &InboundEvent,
        turn: &mut Turn,
    ) -> Result<Option<FlowEvent>, ApplicationError> {
        match action {
            FlowAction::OpenSession => {
                turn.session = Some(Session::new(turn.user_id, turn.chat_id));
            }
            FlowAction::DiscardSession => {
                turn.session = None;
                turn.discarded = true;
            }
            FlowAction::PromptForSummary => {
                turn.reply = Some(reply::prompt_summary(turn.chat_id));
            }
            FlowAction::RecordSummary => {
                let text = event_text(event)?;
                turn.session_mut()?.record_summary(text)?;
            }
            FlowAction::PromptForDescription => {
                turn.reply = Some(reply::prompt_description(turn.chat_id));
            }
            FlowAction::RecordDescription => {
                let text = event_text(event)?;
                turn.session_mut()?.record_description(text)?;
            }
            FlowAction::PromptForAssignee => {
                turn.reply = Some(reply::prompt_assignee(turn.chat_id, &self.settings.assignees));
            }
            FlowAction::RecordAssignee => {
                let choice = event_assignee(event)?;
                let assignee = self.settings.assignees.resolve(choice);
                turn.session_mut()?.record_assignee(assignee.account_id.clone())?;
            }
            FlowAction::FetchEpics => match self.tracker.list_epics().await {
                Ok(catalog) if !catalog.is_empty() => {
                    debug!(
                        event_name = "tracker.epics_loaded",
                        user_id = %turn.user_id,
                        epic_count = catalog.len(),
                        "epic candidates attached to session"
                    );
                    turn.session_mut()?.attach_epics(catalog)?;
                }
                Ok(_) => {
                    warn!(
                        event_name = "tracker.epics_empty",
                        user_id = %turn.user_id,
                        "tracker returned no epics; abandoning session"
                    );
                    return Ok(Some(FlowEvent::EpicsUnavailable));
                }
                Err(error) => {
                    warn!(
                        event_name = "tracker.epics_failed",
                        user_id = %turn.user_id,
                        error = %error,
                        "epic lookup failed; abandoning session"
                    );
                    return Ok(Some(FlowEvent::EpicsUnavailable));
                }
            },
            FlowAction::PromptForEpic => {
                let candidates =
                    turn.session.as_ref().and_then(Session::epic_candidates).ok_or_else(|| {
                        DomainError::InvariantViolation("epic prompt without candidates".to_owned())
                    })?;
                let prompt = reply::prompt_epic(turn.chat_id, candidates);
                turn.reply = Some(prompt);
            }
            FlowAction::ReportTrackerUnavailable => {
                turn.reply = Some(reply::epics_unavailable(turn.chat_id));
            }
            FlowAction::SubmitIssue => {
                let epic_id = event_epic(event)?;
                let session = turn.session_mut()?;
                let origin_chat = session.chat_id();
                let request = session.issue_request(epic_id)?;
                turn.reply = Some(match self.tracker.create_issue(&request).await {
                    Ok(created) => {
                        info!(
                            event_name = "tracker.issue_created",
                            user_id = %turn.user_id,
                            chat_id = %origin_chat,
                            issue_key = %created.key,
                            epic_id = %request.epic_id,
                            "issue created"
                        );
                        reply::issue_created(
                            turn.chat_id,
                            &created.browse_url(&self.settings.web_base_url),
                        )
                    }
                    Err(error) => {
                        warn!(
                            event_name = "tracker.issue_failed",
                            user_id = %turn.user_id,
                            chat_id = %origin_chat,
                            epic_id = %request.epic_id,
                            error = %error,
                            "issue creation failed"
                        );
                        reply::issue_creation_failed(turn.chat_id)
                    }
                });
            }
            FlowAction::ConfirmCancellation => {
                turn.reply = Some(reply::cancelled(turn.chat_id));
            }
            FlowAction::ReportNothingToCancel => {
                turn.reply = Some(reply::nothing_to_cancel(turn.chat_id));
            }
        }

        Ok(None)
    }

    fn commit(&self, turn: Turn, to: FlowState) {
        match turn.session {
            Some(mut session) => {
                session.advance(to);
                self.sessions.insert(session);
            }
            None if turn.discarded => {
                self.sessions.remove(turn.user_id);
            }
            None => {}
        }
    }
}

fn event_text(event: &InboundEvent) -> Result<&str, DomainError> {
    match &event.kind {
        InboundKind::Text(text) => Ok(text),
        _ => Err(DomainError::InvariantViolation("expected a text message".to_owned())),
    }
}

fn event_assignee(event: &InboundEvent) -> Result<AssigneeChoice, DomainError> {
    match &event.kind {
        InboundKind::Callback(CallbackAction::Assignee(choice)) => Ok(*choice),
        _ => Err(DomainError::InvariantViolation("expected an assignee selection".to_owned())),
    }
}

fn event_epic(event: &InboundEvent) -> Result<&EpicId, DomainError> {
    match &event.kind {
        InboundKind::Callback(CallbackAction::Epic(epic_id)) => Ok(epic_id),
        _ => Err(DomainError::InvariantViolation("expected an epic selection".to_owned())),
    }
}
