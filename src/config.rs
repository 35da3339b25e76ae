//! Configuration file parsing for testverse
//!
//! Parses `testverse.toml` configuration files using serde. Every field has
//! a default, so an empty file (or no file at all) yields a working setup.

use crate::error::{Error, Result};
use crate::tools::DEFAULT_TOOLS;
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};

/// Load configuration from a file
pub fn load(path: &Path) -> Result<UniverseConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: UniverseConfig = toml::from_str(&content)?;
    config.validate()?;

    Ok(config)
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    /// External tool requirements
    pub tools: ToolsConfig,

    /// Temporary workspace placement
    pub workspace: WorkspaceConfig,

    /// Virtual switch process
    pub switch: SwitchConfig,

    /// Address and port allocation
    pub network: NetworkConfig,
}

impl UniverseConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.switch.program.trim().is_empty() {
            return Err(Error::ConfigValidation(
                "switch.program must not be empty".into(),
            ));
        }

        if u32::from_str_radix(&self.switch.socket_mode, 8).is_err() {
            return Err(Error::ConfigValidation(format!(
                "switch.socket_mode '{}' is not an octal permission mode",
                self.switch.socket_mode
            )));
        }

        if self.network.port_base == 0 {
            return Err(Error::ConfigValidation(
                "network.port_base must be greater than zero".into(),
            ));
        }

        let prefix = &self.workspace.prefix;
        if prefix.is_empty() || prefix.contains('/') {
            return Err(Error::ConfigValidation(format!(
                "workspace.prefix '{}' must be a non-empty file name",
                prefix
            )));
        }

        Ok(())
    }
}

/// Tools verified before a universe is created
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Executable names (or paths) that must resolve
    pub required: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            required: DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Where the universe's temporary workspace lives
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory (defaults to the platform temp dir)
    pub root: Option<PathBuf>,
    /// Name prefix of the workspace directory
    pub prefix: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "testverse".to_string(),
        }
    }
}

/// Virtual switch command line
///
/// Arguments support variable substitution:
/// - ${sock} - Control socket path
/// - ${mode} - Socket permission mode
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Switch executable
    pub program: String,
    /// Argument template
    pub args: Vec<String>,
    /// Octal permission mode of the control socket
    pub socket_mode: String,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            program: "vde_switch".to_string(),
            args: vec![
                "--sock".to_string(),
                "${sock}".to_string(),
                "-m".to_string(),
                "${mode}".to_string(),
            ],
            socket_mode: "0600".to_string(),
        }
    }
}

/// Address cursor seeds and the first port handed out
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ipv4_start: Ipv4Addr,
    pub ipv6_start: Ipv6Addr,
    pub port_base: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ipv4_start: Ipv4Addr::new(172, 20, 0, 1),
            ipv6_start: Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1),
            port_base: 50000,
        }
    }
}
