//! `[deploy]` section configuration.
//!
//! The build tree is committed to an orphan branch and pushed to the
//! configured remote (GitHub Pages style).
//!
//! # Example
//!
//! ```toml
//! [deploy]
//! remote = "git@github.com:user/user.github.io.git"
//! branch = "gh-pages"
//! force = false
//! ```

use serde::{Deserialize, Serialize};

/// Deployment settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Git remote URL (HTTPS or SSH format).
    pub remote: String,

    /// Target branch for deployment.
    pub branch: String,

    /// Force push (overwrites remote history).
    pub force: bool,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: String::new(),
            branch: "gh-pages".to_string(),
            force: false,
        }
    }
}

impl DeployConfig {
    /// Validate deploy configuration (only checked for the deploy command).
    pub fn validate(&self, errors: &mut Vec<String>) {
        if self.remote.is_empty() {
            errors.push("deploy.remote: no git remote configured".to_string());
        }
        if self.branch.is_empty() {
            errors.push("deploy.branch: branch name cannot be empty".to_string());
        }
    }
}
