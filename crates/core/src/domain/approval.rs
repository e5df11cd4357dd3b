use serde::{Deserialize, Serialize};

use crate::errors::PayloadError;

/// Slack rejects button values longer than this many characters.
pub const MAX_BUTTON_VALUE_CHARS: usize = 2_000;

/// A request travelling from the submitted form to the approver. Never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalRequest {
    pub requester_id: String,
    pub approver_id: String,
    pub request_text: String,
}

impl ApprovalRequest {
    pub fn decision_payload(&self) -> DecisionPayload {
        DecisionPayload {
            requester_id: self.requester_id.clone(),
            request_text: self.request_text.clone(),
        }
    }
}

/// State carried on the Approve/Reject buttons and handed back on click.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DecisionPayload {
    pub requester_id: String,
    pub request_text: String,
}

impl DecisionPayload {
    pub fn encode(&self) -> Result<String, PayloadError> {
        let encoded =
            serde_json::to_string(self).map_err(|error| PayloadError::Encode(error.to_string()))?;

        let len = encoded.chars().count();
        if len > MAX_BUTTON_VALUE_CHARS {
            return Err(PayloadError::TooLong { len, max: MAX_BUTTON_VALUE_CHARS });
        }

        Ok(encoded)
    }

    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let payload: Self =
            serde_json::from_str(raw).map_err(|error| PayloadError::Decode(error.to_string()))?;

        if payload.requester_id.trim().is_empty() {
            return Err(PayloadError::Decode("requesterId must not be empty".to_owned()));
        }

        Ok(payload)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{ApprovalRequest, Decision, DecisionPayload, MAX_BUTTON_VALUE_CHARS};
    use crate::errors::PayloadError;

    fn payload(requester_id: &str, request_text: &str) -> DecisionPayload {
        DecisionPayload {
            requester_id: requester_id.to_owned(),
            request_text: request_text.to_owned(),
        }
    }

    #[test]
    fn payload_round_trips_text_that_needs_escaping() {
        let texts = [
            "Need sign-off",
            "",
            "quote \" and backslash \\ and\nnewline\ttab",
            "{\"requesterId\":\"U9\"}",
            "emoji ✅ and accents é ü",
            "<@U3> mention & <html>",
        ];

        for text in texts {
            let original = payload("U1", text);
            let encoded = original.encode().expect("encode");
            let decoded = DecisionPayload::decode(&encoded).expect("decode");
            assert_eq!(decoded, original, "round trip failed for {text:?}");
        }
    }

    #[test]
    fn payload_uses_camel_case_wire_keys() {
        let encoded = payload("U1", "Need sign-off").encode().expect("encode");

        assert_eq!(encoded, r#"{"requesterId":"U1","requestText":"Need sign-off"}"#);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let error = DecisionPayload::decode("not json").expect_err("should fail");
        assert!(matches!(error, PayloadError::Decode(_)));
    }

    #[test]
    fn decode_rejects_missing_fields_and_empty_requester() {
        assert!(matches!(
            DecisionPayload::decode(r#"{"requesterId":"U1"}"#),
            Err(PayloadError::Decode(_))
        ));
        assert!(matches!(
            DecisionPayload::decode(r#"{"requesterId":"  ","requestText":"x"}"#),
            Err(PayloadError::Decode(_))
        ));
    }

    #[test]
    fn encode_refuses_values_over_the_button_limit() {
        let long_text = "x".repeat(MAX_BUTTON_VALUE_CHARS);
        let error = payload("U1", &long_text).encode().expect_err("should be too long");

        assert!(matches!(error, PayloadError::TooLong { max, .. } if max == MAX_BUTTON_VALUE_CHARS));
    }

    #[test]
    fn request_projects_into_decision_payload_without_approver() {
        let request = ApprovalRequest {
            requester_id: "U1".to_owned(),
            approver_id: "U2".to_owned(),
            request_text: "Need sign-off".to_owned(),
        };

        assert_eq!(request.decision_payload(), payload("U1", "Need sign-off"));
    }

    #[test]
    fn decision_labels_match_outcome_wording() {
        assert_eq!(Decision::Approved.label(), "approved");
        assert_eq!(Decision::Rejected.to_string(), "rejected");
    }

    fn request_text() -> impl Strategy<Value = String> {
        prop_oneof![any::<String>(), ".{0,2100}"]
    }

    proptest! {
        #[test]
        fn payload_round_trips_or_reports_its_length(
            requester_id in "\\S{1,16}",
            text in request_text(),
        ) {
            let original = payload(&requester_id, &text);

            match original.encode() {
                Ok(encoded) => {
                    prop_assert!(encoded.chars().count() <= MAX_BUTTON_VALUE_CHARS);
                    prop_assert_eq!(DecisionPayload::decode(&encoded), Ok(original));
                }
                Err(PayloadError::TooLong { len, max }) => {
                    prop_assert_eq!(max, MAX_BUTTON_VALUE_CHARS);
                    prop_assert!(len > max);
                }
                Err(other) => prop_assert!(false, "unexpected encode failure: {other}"),
            }
        }
    }
}

