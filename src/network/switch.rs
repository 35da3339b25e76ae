//! Virtual switch process
//!
//! Builds the switch command line from the configured template and spawns
//! it. The returned child is killed when its handle is dropped, so a
//! supervisor that stops holding it can never leak the process.

use crate::config::SwitchConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::info;

/// File name of the control socket inside the workspace
pub const SOCKET_NAME: &str = "switch";

/// A resolved switch command line
#[derive(Debug, Clone)]
pub struct SwitchCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl SwitchCommand {
    /// Resolve the argument template for a given control socket
    pub fn new(config: &SwitchConfig, sock: &Path) -> Self {
        let sock = sock.display().to_string();
        let args = config
            .args
            .iter()
            .map(|a| {
                a.replace("${sock}", &sock)
                    .replace("${mode}", &config.socket_mode)
            })
            .collect();

        Self {
            program: config.program.clone(),
            args,
        }
    }

    /// Spawn the switch
    pub fn spawn(&self) -> Result<Child> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ProcessSpawn {
                program: self.program.clone(),
                source: e,
            })?;

        info!(
            program = %self.program,
            pid = child.id(),
            "virtual switch started"
        );
        Ok(child)
    }
}

/// Path of the control socket for a workspace
pub fn socket_path(workspace: &Path) -> PathBuf {
    workspace.join(SOCKET_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_line() {
        let cmd = SwitchCommand::new(&SwitchConfig::default(), Path::new("/tmp/u1/switch"));
        assert_eq!(cmd.program, "vde_switch");
        assert_eq!(cmd.args, vec!["--sock", "/tmp/u1/switch", "-m", "0600"]);
    }

    #[test]
    fn test_socket_path() {
        assert_eq!(
            socket_path(Path::new("/tmp/u1")),
            PathBuf::from("/tmp/u1/switch")
        );
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let config = SwitchConfig {
            program: "/nonexistent/testverse/vde_switch".into(),
            ..Default::default()
        };
        let cmd = SwitchCommand::new(&config, Path::new("/tmp/u1/switch"));
        let err = cmd.spawn().unwrap_err();
        assert!(matches!(err, Error::ProcessSpawn { .. }));
    }

    #[tokio::test]
    async fn test_spawn_and_exit() {
        let config = SwitchConfig {
            program: "sh".into(),
            args: vec!["-c".into(), "test \"$1\" = 0600".into(), "sh".into(), "${mode}".into()],
            ..Default::default()
        };
        let mut child = SwitchCommand::new(&config, Path::new("/tmp/u1/switch"))
            .spawn()
            .unwrap();
        let status = child.wait().await.unwrap();
        assert!(status.success());
    }
}
