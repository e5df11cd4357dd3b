use serde::{Deserialize, Serialize};

use crate::domain::directory::DirectoryEntry;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverOption {
    pub text: String,
    pub value: String,
}

/// Builds the approver picker for `requester_id`.
///
/// Bots and the requester are dropped; everyone else keeps the order the
/// directory returned them in.
pub fn approver_options(entries: &[DirectoryEntry], requester_id: &str) -> Vec<ApproverOption> {
    entries
        .iter()
        .filter(|entry| is_eligible_approver(entry, requester_id))
        .map(|entry| ApproverOption {
            text: entry.display_name().to_owned(),
            value: entry.id.clone(),
        })
        .collect()
}

fn is_eligible_approver(entry: &DirectoryEntry, requester_id: &str) -> bool {
    !entry.is_bot && entry.id != requester_id
}
