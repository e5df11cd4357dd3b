use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use signoff_core::approver_options;
use tracing::{info, warn};

use crate::{
    api::SlackApi,
    blocks::{approval_request_modal, MAX_SELECT_OPTIONS},
    events::{
        EventContext, EventHandler, EventHandlerError, HandlerResult, RouteKey, SlackEnvelope,
        SlackEvent,
    },
};

/// Fields of a slash command invocation, as sent over Socket Mode or the
/// form-encoded HTTP endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SlashCommandPayload {
    pub command: String,
    #[serde(default)]
    pub text: String,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: String,
    pub trigger_id: String,
}

/// Step one: list the directory and open the approval form for the invoker.
pub struct ApprovalCommandHandler {
    api: Arc<dyn SlackApi>,
    command: String,
}

impl ApprovalCommandHandler {
    pub fn new(api: Arc<dyn SlackApi>, command: &str) -> Self {
        Self { api, command: command.to_owned() }
    }

    async fn open_approval_form(
        &self,
        payload: &SlashCommandPayload,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let directory = self.api.list_users().await.map_err(EventHandlerError::Directory)?;
        let options = approver_options(&directory, &payload.user_id);

        if options.is_empty() {
            return Err(EventHandlerError::NoEligibleApprovers {
                requester_id: payload.user_id.clone(),
            });
        }
        if options.len() > MAX_SELECT_OPTIONS {
            warn!(
                event_name = "workflow.approval.approvers_truncated",
                correlation_id = %ctx.correlation_id,
                eligible = options.len(),
                shown = MAX_SELECT_OPTIONS,
                "approver list exceeds select limit"
            );
        }

        let view = approval_request_modal(&options);
        self.api.open_view(&payload.trigger_id, &view).await.map_err(EventHandlerError::OpenView)?;

        info!(
            event_name = "workflow.approval.form_opened",
            correlation_id = %ctx.correlation_id,
            requester_id = %payload.user_id,
            approver_choices = options.len().min(MAX_SELECT_OPTIONS),
            "approval form opened"
        );
        Ok(HandlerResult::Processed)
    }
}

#[async_trait]
impl EventHandler for ApprovalCommandHandler {
    fn routes(&self) -> Vec<RouteKey> {
        vec![RouteKey::command(&self.command)]
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        self.open_approval_form(payload, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{ApprovalCommandHandler, SlashCommandPayload};
    use crate::{
        blocks::{Block, InputElement, APPROVAL_REQUEST_CALLBACK_ID, MAX_SELECT_OPTIONS},
        events::{EventContext, EventHandler, EventHandlerError, HandlerResult, SlackEnvelope, SlackEvent},
        testing::{entry, scenario_directory, ApiCall, RecordingSlackApi},
    };

    fn command_envelope(user_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: "env-cmd".to_owned(),
            event: SlackEvent::SlashCommand(SlashCommandPayload {
                command: "/approval-test".to_owned(),
                text: String::new(),
                user_id: user_id.to_owned(),
                channel_id: "C1".to_owned(),
                trigger_id: "trigger-1".to_owned(),
            }),
        }
    }

    fn select_options(call: &ApiCall) -> Vec<(String, String)> {
        let ApiCall::OpenView { view, .. } = call else {
            panic!("expected views.open, got {call:?}");
        };
        view.blocks
            .iter()
            .find_map(|block| match block {
                Block::Input { element: InputElement::StaticSelect { options, .. }, .. } => Some(
                    options
                        .iter()
                        .map(|option| (option.text.text().to_owned(), option.value.clone()))
                        .collect(),
                ),
                _ => None,
            })
            .expect("static select present")
    }

    #[tokio::test]
    async fn opens_form_listing_everyone_but_bots_and_the_requester() {
        let api = Arc::new(RecordingSlackApi::with_directory(scenario_directory()));
        let handler = ApprovalCommandHandler::new(api.clone(), "/approval-test");

        let result = handler
            .handle(&command_envelope("U1"), &EventContext::default())
            .await
            .expect("handled");

        assert_eq!(result, HandlerResult::Processed);
        let calls = api.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], ApiCall::ListUsers);
        let ApiCall::OpenView { trigger_id, view } = &calls[1] else {
            panic!("expected views.open");
        };
        assert_eq!(trigger_id, "trigger-1");
        assert_eq!(view.callback_id, APPROVAL_REQUEST_CALLBACK_ID);
        assert_eq!(select_options(&calls[1]), vec![("Bob".to_owned(), "U2".to_owned())]);
    }

    #[tokio::test]
    async fn no_eligible_approvers_skips_the_form() {
        let api = Arc::new(RecordingSlackApi::with_directory(vec![
            entry("U1", "alice", Some("Alice"), false),
            entry("B1", "bot", None, true),
        ]));
        let handler = ApprovalCommandHandler::new(api.clone(), "/approval-test");

        let error = handler
            .handle(&command_envelope("U1"), &EventContext::default())
            .await
            .expect_err("nobody to ask");

        assert_eq!(error, EventHandlerError::NoEligibleApprovers { requester_id: "U1".to_owned() });
        assert_eq!(api.calls().await, vec![ApiCall::ListUsers]);
    }

    #[tokio::test]
    async fn large_directories_are_cut_to_the_select_limit() {
        let directory = (0..150)
            .map(|index| entry(&format!("U{index:03}"), &format!("user{index}"), None, false))
            .collect();
        let api = Arc::new(RecordingSlackApi::with_directory(directory));
        let handler = ApprovalCommandHandler::new(api.clone(), "/approval-test");

        handler.handle(&command_envelope("UX"), &EventContext::default()).await.expect("handled");

        let calls = api.calls().await;
        let options = select_options(&calls[1]);
        assert_eq!(options.len(), MAX_SELECT_OPTIONS);
        assert_eq!(options[0].1, "U000");
    }

    #[tokio::test]
    async fn directory_failure_is_reported_without_opening_a_form() {
        let api = Arc::new(
            RecordingSlackApi::with_directory(scenario_directory()).failing_on("users.list"),
        );
        let handler = ApprovalCommandHandler::new(api.clone(), "/approval-test");

        let error = handler
            .handle(&command_envelope("U1"), &EventContext::default())
            .await
            .expect_err("directory down");

        assert!(matches!(error, EventHandlerError::Directory(_)));
        assert_eq!(api.calls().await, vec![ApiCall::ListUsers]);
    }

    #[tokio::test]
    async fn open_view_failure_surfaces_as_open_view_error() {
        let api = Arc::new(
            RecordingSlackApi::with_directory(scenario_directory()).failing_on("views.open"),
        );
        let handler = ApprovalCommandHandler::new(api, "/approval-test");

        let error = handler
            .handle(&command_envelope("U1"), &EventContext::default())
            .await
            .expect_err("expired trigger");

        assert!(matches!(error, EventHandlerError::OpenView(_)));
    }
}
