//! Workflow state carried in every chat control value.
//!
//! The token is the only state a release workflow has. It is serialized into
//! the `value` of each button or select option and comes back unmodified with
//! the next interaction, so the server keeps no session between requests.

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

/// Slack caps an action value at 2000 characters.
pub const MAX_ENCODED_LEN: usize = 2000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowToken {
    pub branch: String,
    pub version: String,
    pub build_number: String,
    pub current_version: String,
    pub current_build_number: String,
    pub next_patch: String,
    pub next_minor: String,
    pub next_major: String,
    pub next_build_number: String,
    /// Locator of the manifest snapshot, never the manifest bytes.
    pub manifest_ref: String,
}

impl WorkflowToken {
    /// A token for a workflow that has not chosen a branch yet.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// True once step 1 has completed.
    pub fn is_resumed(&self) -> bool {
        !self.branch.is_empty()
    }

    pub fn with_version(&self, version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..self.clone()
        }
    }

    pub fn with_build_number(&self, build_number: impl Into<String>) -> Self {
        Self {
            build_number: build_number.into(),
            ..self.clone()
        }
    }

    /// `1.2.3 (40)` for the snapshot the workflow started from.
    pub fn current_label(&self) -> String {
        format!("{} ({})", self.current_version, self.current_build_number)
    }

    /// `1.3.0 (43)` for the chosen release.
    pub fn next_label(&self) -> String {
        format!("{} ({})", self.version, self.build_number)
    }

    /// Compact JSON in declaration order.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Fails when the encoded token is too long to be carried in a control
    /// value.
    pub fn ensure_encodable(&self) -> Result<(), WorkflowError> {
        let len = self.encode().len();
        if len > MAX_ENCODED_LEN {
            return Err(WorkflowError::invalid_transition(format!(
                "branch `{}` is too long to carry through the release prompts ({len} > {MAX_ENCODED_LEN} characters)",
                self.branch
            )));
        }
        Ok(())
    }

    /// Permissive inverse of [`encode`](Self::encode).
    ///
    /// Anything that does not parse yields a fresh token, so a corrupted or
    /// truncated value reads as "no workflow in progress" instead of an error.
    pub fn decode(value: &str) -> Self {
        match serde_json::from_str(value) {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(error = %e, "Undecodable workflow token, treating as fresh");
                Self::fresh()
            }
        }
    }
}
