use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowState {
    Idle,
    AwaitingSummary,
    AwaitingDescription,
    AwaitingAssignee,
    AwaitingEpic,
    Submitted,
    Cancelled,
    Rejected,
}

impl FlowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Cancelled | Self::Rejected)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    StartRequested,
    TextReceived,
    AssigneeSelected,
    EpicsUnavailable,
    EpicSelected,
    CancelRequested,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    OpenSession,
    DiscardSession,
    PromptForSummary,
    RecordSummary,
    PromptForDescription,
    RecordDescription,
    PromptForAssignee,
    RecordAssignee,
    FetchEpics,
    PromptForEpic,
    ReportTrackerUnavailable,
    SubmitIssue,
    ConfirmCancellation,
    ReportNothingToCancel,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
}
