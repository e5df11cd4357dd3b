use serde::{Deserialize, Serialize};

/// One account from the workspace user directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub is_bot: bool,
}

impl DirectoryEntry {
    /// Real name when present and non-blank, otherwise the username.
    pub fn display_name(&self) -> &str {
        self.real_name.as_deref().filter(|name| !name.trim().is_empty()).unwrap_or(&self.name)
    }
}
