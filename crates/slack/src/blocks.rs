use serde::Serialize;
use signoff_core::{ApprovalRequest, ApproverOption, Decision};

pub const APPROVAL_REQUEST_CALLBACK_ID: &str = "approval_request";
pub const APPROVER_SELECT_BLOCK_ID: &str = "approver_select";
pub const APPROVER_SELECT_ACTION_ID: &str = "approver_select_action";
pub const REQUEST_TEXT_BLOCK_ID: &str = "request_text";
pub const REQUEST_TEXT_ACTION_ID: &str = "request_text_action";
pub const APPROVE_ACTION_ID: &str = "approve_action";
pub const REJECT_ACTION_ID: &str = "reject_action";

/// Slack refuses static selects with more options than this.
pub const MAX_SELECT_OPTIONS: usize = 100;
pub const MAX_REQUEST_TEXT_CHARS: u32 = 1_500;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Plain { text } | Self::Mrkdwn { text } => text,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Primary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "button")]
pub struct ButtonElement {
    pub action_id: String,
    pub text: TextObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<ButtonStyle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ButtonElement {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            text: TextObject::plain(label),
            style: None,
            value: None,
        }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionObject {
    pub text: TextObject,
    pub value: String,
}

impl From<&ApproverOption> for OptionObject {
    fn from(option: &ApproverOption) -> Self {
        Self { text: TextObject::plain(option.text.clone()), value: option.value.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputElement {
    StaticSelect {
        action_id: String,
        placeholder: TextObject,
        options: Vec<OptionObject>,
    },
    PlainTextInput {
        action_id: String,
        multiline: bool,
        placeholder: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_length: Option<u32>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section { block_id: String, text: TextObject },
    Actions { block_id: String, elements: Vec<ButtonElement> },
    Input { block_id: String, label: TextObject, element: InputElement },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl MessageTemplate {
    /// Every piece of text a reader would see, fallback included.
    pub fn rendered_text(&self) -> String {
        let mut rendered = vec![self.fallback_text.clone()];
        for block in &self.blocks {
            match block {
                Block::Section { text, .. } => rendered.push(text.text().to_owned()),
                Block::Actions { elements, .. } => {
                    rendered.extend(elements.iter().map(|button| button.text.text().to_owned()))
                }
                Block::Input { label, .. } => rendered.push(label.text().to_owned()),
            }
        }
        rendered.join("\n")
    }

    pub fn buttons(&self) -> impl Iterator<Item = &ButtonElement> {
        self.blocks.iter().flat_map(|block| {
            let elements: &[ButtonElement] = match block {
                Block::Actions { elements, .. } => elements,
                _ => &[],
            };
            elements
        })
    }
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Section { block_id: block_id.into(), text: builder.build() });
        self
    }

    pub fn actions<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ActionsBuilder),
    {
        let mut builder = ActionsBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Actions { block_id: block_id.into(), elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
}

impl SectionBuilder {
    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> TextObject {
        self.text.unwrap_or_else(|| TextObject::plain(""))
    }
}

#[derive(Default)]
pub struct ActionsBuilder {
    elements: Vec<ButtonElement>,
}

impl ActionsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.elements.push(button);
        self
    }

    fn build(self) -> Vec<ButtonElement> {
        self.elements
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename = "modal")]
pub struct ModalView {
    pub callback_id: String,
    pub title: TextObject,
    pub submit: TextObject,
    pub close: TextObject,
    pub blocks: Vec<Block>,
}

pub struct ModalBuilder {
    view: ModalView,
}

impl ModalBuilder {
    pub fn new(callback_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            view: ModalView {
                callback_id: callback_id.into(),
                title: TextObject::plain(title),
                submit: TextObject::plain("Submit"),
                close: TextObject::plain("Cancel"),
                blocks: Vec::new(),
            },
        }
    }

    pub fn input(
        mut self,
        block_id: impl Into<String>,
        label: impl Into<String>,
        element: InputElement,
    ) -> Self {
        self.view.blocks.push(Block::Input {
            block_id: block_id.into(),
            label: TextObject::plain(label),
            element,
        });
        self
    }

    pub fn build(self) -> ModalView {
        self.view
    }
}

/// The form a requester fills in. Options beyond Slack's select limit are cut.
pub fn approval_request_modal(options: &[ApproverOption]) -> ModalView {
    let options = options.iter().take(MAX_SELECT_OPTIONS).map(OptionObject::from).collect();

    ModalBuilder::new(APPROVAL_REQUEST_CALLBACK_ID, "Approval Request")
        .input(
            APPROVER_SELECT_BLOCK_ID,
            "Select Approver",
            InputElement::StaticSelect {
                action_id: APPROVER_SELECT_ACTION_ID.to_owned(),
                placeholder: TextObject::plain("Select a person"),
                options,
            },
        )
        .input(
            REQUEST_TEXT_BLOCK_ID,
            "Approval Request",
            InputElement::PlainTextInput {
                action_id: REQUEST_TEXT_ACTION_ID.to_owned(),
                multiline: true,
                placeholder: TextObject::plain("Enter your request here..."),
                max_length: Some(MAX_REQUEST_TEXT_CHARS),
            },
        )
        .build()
}

pub fn approval_notification_message(
    request: &ApprovalRequest,
    decision_value: &str,
) -> MessageTemplate {
    let requester = format!("<@{}>", request.requester_id);

    MessageBuilder::new(format!("Approval request from {requester}"))
        .section("approval.request.summary.v1", |section| {
            section.mrkdwn(format!(
                "Approval request from {requester}:\n\n{}",
                request.request_text
            ));
        })
        .actions("approval.request.actions.v1", |actions| {
            actions
                .button(
                    ButtonElement::new(APPROVE_ACTION_ID, "Approve")
                        .style(ButtonStyle::Primary)
                        .value(decision_value),
                )
                .button(
                    ButtonElement::new(REJECT_ACTION_ID, "Reject")
                        .style(ButtonStyle::Danger)
                        .value(decision_value),
                );
        })
        .build()
}

pub fn requester_outcome_message(request_text: &str, decision: Decision) -> MessageTemplate {
    MessageBuilder::new(format!(
        "Your approval request:\n\"{request_text}\" has been {decision} by the approver."
    ))
    .build()
}

pub fn decision_recorded_message(decision: Decision, decided_by: &str) -> MessageTemplate {
    MessageBuilder::new(format!("Approval request has been {decision}."))
        .section("approval.decision.summary.v1", |section| {
            section.mrkdwn(format!("Request {decision} by <@{decided_by}>"));
        })
        .build()
}
