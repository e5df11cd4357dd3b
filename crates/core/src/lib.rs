pub mod approvals;
pub mod config;
pub mod domain;
pub mod errors;

pub use approvals::{approver_options, ApproverOption};
pub use domain::approval::{ApprovalRequest, Decision, DecisionPayload, MAX_BUTTON_VALUE_CHARS};
pub use domain::directory::DirectoryEntry;
pub use errors::{InterfaceError, PayloadError};
