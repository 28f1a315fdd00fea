//! Configuration file loading.
//!
//! Looks for `$CLIMUX_CONFIG`, then `<config_dir>/climux/config.toml`. A
//! missing file means built-in defaults; a present but unreadable or
//! invalid file is an error.
//!
//! ```toml
//! pattern = 'enter the code ([A-Z0-9]+)'
//! scanner_path = "/usr/local/bin/climux-scan"
//!
//! [backend]
//! jumpbox_name = "my-jumpbox"
//!
//! [[profiles]]
//! command_id = "gcloud.openTerminal"
//! terminal_name = "Google Cloud"
//! docker_image = "google/cloud-sdk"
//! login_command = "gcloud auth login --no-launch-browser"
//! ```

use std::path::{Path, PathBuf};

use climux_tmux::BackendConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CLIMUX_CONFIG";

/// Default auth-code pattern; group 1 is the code.
pub const DEFAULT_PATTERN: &str = r"To sign in, use a web browser to open the page \S+ and enter the code ([A-Z0-9]+) to authenticate";

/// Name of the scanner executable.
pub const SCANNER_BIN: &str = "climux-scan";

/// A kind of CLI session the user can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Stable identifier, accepted by `climux open`
    pub command_id: String,
    /// Session name prefix
    pub terminal_name: String,
    /// Worker image the session runs
    pub docker_image: String,
    /// Typed into the session once it is shown
    pub login_command: String,
}

impl Profile {
    pub fn new(
        command_id: impl Into<String>,
        terminal_name: impl Into<String>,
        docker_image: impl Into<String>,
        login_command: impl Into<String>,
    ) -> Self {
        Self {
            command_id: command_id.into(),
            terminal_name: terminal_name.into(),
            docker_image: docker_image.into(),
            login_command: login_command.into(),
        }
    }

    /// Shell command the backend session runs.
    ///
    /// Mounts the session's working directory at `/code` in a throwaway
    /// worker container.
    pub fn worker_command(&self) -> String {
        format!(
            r#"docker run -it --rm -v "$PWD":/code -w /code {}"#,
            self.docker_image
        )
    }
}

/// Built-in profiles.
pub fn default_profiles() -> Vec<Profile> {
    vec![
        Profile::new(
            "azure-cli.openTerminal",
            "Azure CLI",
            "microsoft/azure-cli",
            "azure login",
        ),
        Profile::new(
            "azure-cli.openTerminal20",
            "Azure CLI 2.0",
            "azuresdk/azure-cli-python",
            "az login",
        ),
        Profile::new(
            "azure-cli.openTerminalPowershell",
            "Azure Powershell",
            "lukaszkaluzny/powershell-azure",
            "Login-AzureRmAccount",
        ),
    ]
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub pattern: String,
    pub scanner_path: Option<PathBuf>,
    pub profiles: Vec<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            pattern: DEFAULT_PATTERN.to_string(),
            scanner_path: None,
            profiles: default_profiles(),
        }
    }
}

impl Config {
    /// Loads the config from the default location.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a config file exists but cannot be read or
    /// parsed.
    pub fn load() -> Result<Self, ConfigError> {
        match default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Loads the config from `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` on I/O failure and `ConfigError::Parse`
    /// on invalid TOML.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Finds a profile by command id or terminal name.
    pub fn profile(&self, key: &str) -> Option<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.command_id == key)
            .or_else(|| self.profiles.iter().find(|p| p.terminal_name == key))
    }

    /// Path of the scanner executable.
    ///
    /// Falls back to `climux-scan` next to the running executable, then to
    /// a `PATH` lookup.
    pub fn scanner_path(&self) -> PathBuf {
        if let Some(path) = &self.scanner_path {
            return path.clone();
        }

        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(SCANNER_BIN)))
            .filter(|path| path.exists())
            .unwrap_or_else(|| PathBuf::from(SCANNER_BIN))
    }
}

/// Config file location: `$CLIMUX_CONFIG`, else the platform config dir.
pub fn default_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("climux").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.profiles.len(), 3);
        assert_eq!(config.pattern, DEFAULT_PATTERN);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\njumpbox_name = \"box\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.backend.jumpbox_name, "box");
        assert_eq!(config.backend.docker, "docker");
        assert_eq!(config.pattern, DEFAULT_PATTERN);
        assert_eq!(config.profiles, default_profiles());
    }

    #[test]
    fn test_profiles_replace_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
pattern = 'code ([0-9]+)'

[[profiles]]
command_id = "gcloud"
terminal_name = "Google Cloud"
docker_image = "google/cloud-sdk"
login_command = "gcloud auth login"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.pattern, "code ([0-9]+)");
        assert_eq!(config.profiles.len(), 1);
        assert_eq!(config.profiles[0].terminal_name, "Google Cloud");
    }

    #[test]
    fn test_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pattern = [unterminated").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_profile_lookup_by_id_or_name() {
        let config = Config::default();
        assert_eq!(
            config.profile("azure-cli.openTerminal20").map(|p| p.login_command.as_str()),
            Some("az login")
        );
        assert_eq!(
            config.profile("Azure Powershell").map(|p| p.command_id.as_str()),
            Some("azure-cli.openTerminalPowershell")
        );
        assert!(config.profile("missing").is_none());
    }

    #[test]
    fn test_worker_command() {
        let profile = Profile::new("id", "Name", "microsoft/azure-cli", "azure login");
        assert_eq!(
            profile.worker_command(),
            r#"docker run -it --rm -v "$PWD":/code -w /code microsoft/azure-cli"#
        );
    }

    #[test]
    fn test_explicit_scanner_path_wins() {
        let config = Config {
            scanner_path: Some(PathBuf::from("/opt/climux-scan")),
            ..Config::default()
        };
        assert_eq!(config.scanner_path(), PathBuf::from("/opt/climux-scan"));
    }
}
