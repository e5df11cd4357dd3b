use std::sync::Arc;

use async_trait::async_trait;
use signoff_core::{ApprovalRequest, Decision, DecisionPayload};
use tracing::info;

use crate::{
    api::SlackApi,
    blocks::{
        approval_notification_message, decision_recorded_message, requester_outcome_message,
        APPROVAL_REQUEST_CALLBACK_ID, APPROVER_SELECT_ACTION_ID, APPROVER_SELECT_BLOCK_ID,
        APPROVE_ACTION_ID, REJECT_ACTION_ID, REQUEST_TEXT_ACTION_ID, REQUEST_TEXT_BLOCK_ID,
    },
    events::{
        BlockActionEvent, EventContext, EventHandler, EventHandlerError, HandlerResult, RouteKey,
        SlackEnvelope, SlackEvent, ViewSubmissionEvent,
    },
};

/// The two buttons on an approval notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApprovalAction {
    Approve,
    Reject,
}

impl ApprovalAction {
    pub const ALL: [Self; 2] = [Self::Approve, Self::Reject];

    pub fn from_action_id(action_id: &str) -> Option<Self> {
        match action_id {
            APPROVE_ACTION_ID => Some(Self::Approve),
            REJECT_ACTION_ID => Some(Self::Reject),
            _ => None,
        }
    }

    pub fn action_id(self) -> &'static str {
        match self {
            Self::Approve => APPROVE_ACTION_ID,
            Self::Reject => REJECT_ACTION_ID,
        }
    }

    pub fn decision(self) -> Decision {
        match self {
            Self::Approve => Decision::Approved,
            Self::Reject => Decision::Rejected,
        }
    }
}

/// Reads the approver and request text out of a submitted approval form.
/// A blank text field is accepted as an empty request.
pub fn approval_request_from_submission(
    submission: &ViewSubmissionEvent,
) -> Result<ApprovalRequest, EventHandlerError> {
    let approver_id = submission
        .selected_value(APPROVER_SELECT_BLOCK_ID, APPROVER_SELECT_ACTION_ID)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| EventHandlerError::MalformedSubmission("no approver selected".to_owned()))?;
    let request_text =
        submission.input_value(REQUEST_TEXT_BLOCK_ID, REQUEST_TEXT_ACTION_ID).unwrap_or_default();

    Ok(ApprovalRequest {
        requester_id: submission.user_id.clone(),
        approver_id: approver_id.to_owned(),
        request_text: request_text.to_owned(),
    })
}

/// Step two: deliver the submitted request to the approver as a direct message.
pub struct SubmissionHandler {
    api: Arc<dyn SlackApi>,
}

impl SubmissionHandler {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }

    async fn notify_approver(
        &self,
        submission: &ViewSubmissionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let request = approval_request_from_submission(submission)?;
        let decision_value = request.decision_payload().encode()?;
        let message = approval_notification_message(&request, &decision_value);

        let posted = self
            .api
            .post_message(&request.approver_id, &message)
            .await
            .map_err(EventHandlerError::Delivery)?;

        info!(
            event_name = "workflow.approval.request_sent",
            correlation_id = %ctx.correlation_id,
            requester_id = %request.requester_id,
            approver_id = %request.approver_id,
            message_ts = %posted.ts,
            "approval request delivered to approver"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl EventHandler for SubmissionHandler {
    fn routes(&self) -> Vec<RouteKey> {
        vec![RouteKey::View(APPROVAL_REQUEST_CALLBACK_ID.to_owned())]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ViewSubmission(submission) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.notify_approver(submission, ctx).await
    }
}

/// Step three: tell the requester the outcome and rewrite the approver's message.
pub struct DecisionHandler {
    api: Arc<dyn SlackApi>,
}

impl DecisionHandler {
    pub fn new(api: Arc<dyn SlackApi>) -> Self {
        Self { api }
    }

    async fn record_decision(
        &self,
        click: &BlockActionEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let action = ApprovalAction::from_action_id(&click.action_id)
            .ok_or_else(|| EventHandlerError::UnknownAction(click.action_id.clone()))?;
        let raw = click.value.as_deref().ok_or_else(|| EventHandlerError::MissingActionValue {
            action_id: click.action_id.clone(),
        })?;
        let payload = DecisionPayload::decode(raw)?;
        let (Some(channel), Some(ts)) = (click.channel_id.as_deref(), click.message_ts.as_deref())
        else {
            return Err(EventHandlerError::MissingMessageReference {
                action_id: click.action_id.clone(),
            });
        };
        let decision = action.decision();

        self.api
            .post_message(
                &payload.requester_id,
                &requester_outcome_message(&payload.request_text, decision),
            )
            .await
            .map_err(EventHandlerError::Delivery)?;
        self.api
            .update_message(channel, ts, &decision_recorded_message(decision, &click.user_id))
            .await
            .map_err(EventHandlerError::Update)?;

        info!(
            event_name = "workflow.approval.decision_recorded",
            correlation_id = %ctx.correlation_id,
            requester_id = %payload.requester_id,
            approver_id = %click.user_id,
            decision = %decision,
            "approval decision recorded"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl EventHandler for DecisionHandler {
    fn routes(&self) -> Vec<RouteKey> {
        ApprovalAction::ALL
            .iter()
            .map(|action| RouteKey::Action(action.action_id().to_owned()))
            .collect()
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(click) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.record_decision(click, ctx).await
    }
}
