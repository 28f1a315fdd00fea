//! Backend configuration.
//!
//! Deserialised from the `[backend]` table of the climux config file.
//! Every field has a default, so an absent table is valid.

use serde::{Deserialize, Serialize};

/// Default docker binary.
pub const DEFAULT_DOCKER: &str = "docker";

/// Default name of the jumpbox container.
pub const DEFAULT_JUMPBOX_NAME: &str = "climux-jumpbox";

/// Default jumpbox image. Must provide tmux and a docker client.
pub const DEFAULT_JUMPBOX_IMAGE: &str = "climux/jumpbox";

/// Default tmux binary inside the jumpbox.
pub const DEFAULT_TMUX: &str = "tmux";

/// Settings for the docker + tmux backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Docker binary on the host
    pub docker: String,
    /// Container name of the jumpbox
    pub jumpbox_name: String,
    /// Image the jumpbox is started from
    pub jumpbox_image: String,
    /// tmux binary inside the jumpbox
    pub tmux: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            docker: DEFAULT_DOCKER.to_string(),
            jumpbox_name: DEFAULT_JUMPBOX_NAME.to_string(),
            jumpbox_image: DEFAULT_JUMPBOX_IMAGE.to_string(),
            tmux: DEFAULT_TMUX.to_string(),
        }
    }
}
