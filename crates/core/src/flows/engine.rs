use thiserror::Error;

use crate::flows::states::{FlowAction, FlowEvent, FlowState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> FlowState;
    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Summary, description, assignee, epic, submit.
#[derive(Clone, Debug, Default)]
pub struct IssueIntakeFlow;

impl FlowDefinition for IssueIntakeFlow {
    fn initial_state(&self) -> FlowState {
        FlowState::Idle
    }

    fn transition(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_issue_intake(current, event)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &FlowState,
        event: &FlowEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }
}

impl Default for FlowEngine<IssueIntakeFlow> {
    fn default() -> Self {
        Self::new(IssueIntakeFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

fn transition_issue_intake(
    current: &FlowState,
    event: &FlowEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        ConfirmCancellation, DiscardSession, FetchEpics, OpenSession, PromptForAssignee,
        PromptForDescription, PromptForEpic, PromptForSummary, RecordAssignee, RecordDescription,
        RecordSummary, ReportNothingToCancel, ReportTrackerUnavailable, SubmitIssue,
    };
    use FlowEvent::{
        AssigneeSelected, CancelRequested, EpicSelected, EpicsUnavailable, StartRequested,
        TextReceived,
    };
    use FlowState::{
        AwaitingAssignee, AwaitingDescription, AwaitingEpic, AwaitingSummary, Cancelled, Idle,
        Rejected, Submitted,
    };

    let (to, actions) = match (current, event) {
        (Idle, StartRequested) | (Idle, TextReceived) => {
            (AwaitingSummary, vec![OpenSession, PromptForSummary])
        }
        (state, StartRequested) if !state.is_terminal() => {
            (AwaitingSummary, vec![DiscardSession, OpenSession, PromptForSummary])
        }
        (AwaitingSummary, TextReceived) => {
            (AwaitingDescription, vec![RecordSummary, PromptForDescription])
        }
        (AwaitingDescription, TextReceived) => {
            (AwaitingAssignee, vec![RecordDescription, PromptForAssignee])
        }
        (AwaitingAssignee, AssigneeSelected) => {
            (AwaitingEpic, vec![RecordAssignee, FetchEpics, PromptForEpic])
        }
        (AwaitingEpic, EpicsUnavailable) => (Rejected, vec![DiscardSession, ReportTrackerUnavailable]),
        (AwaitingEpic, EpicSelected) => (Submitted, vec![SubmitIssue, DiscardSession]),
        (Idle, CancelRequested) => (Idle, vec![ReportNothingToCancel]),
        (state, CancelRequested) if !state.is_terminal() => {
            (Cancelled, vec![DiscardSession, ConfirmCancellation])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}
