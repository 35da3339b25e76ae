//! The Universe - an isolated virtual test network
//!
//! A universe owns a temporary workspace, a virtual switch process, address
//! and port allocators and a registry of named VMs. It is destroyed exactly
//! once, by whichever of these happens first:
//! - an explicit `close()`
//! - cancellation of the parent token
//! - the virtual switch exiting on its own

use std::any::Any;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UniverseConfig;
use crate::error::{Error, Result};
use crate::network::{AddressCursors, PortStream, SwitchCommand, port_stream, switch};
use crate::tools::check_tools;

/// Opaque handle of a VM registered in a universe
pub type VmHandle = Arc<dyn Any + Send + Sync>;

/// Outcome of the first teardown, replayed to every later caller
type CloseOutcome = std::result::Result<(), Arc<io::Error>>;

/// A virtual test network and its associated resources
///
/// Cloning is cheap; all clones refer to the same universe.
#[derive(Debug, Clone)]
pub struct Universe {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    /// Exclusively owned temp directory
    workspace: PathBuf,
    /// Cancelled when the universe is destroyed
    lifetime: CancellationToken,
    /// Port numbers handed out to VMs
    ports: PortStream,
    /// Next IPv4/IPv6 addresses
    addresses: Mutex<AddressCursors>,
    /// VMs by hostname
    vms: RwLock<HashMap<String, VmHandle>>,
    /// Switch control socket
    switch_sock: PathBuf,
    /// Switch process ID (once spawned)
    switch_pid: OnceLock<u32>,
    /// Set by the first teardown
    close: Mutex<Option<CloseOutcome>>,
}

impl Universe {
    /// Create a universe with the default configuration
    ///
    /// Cancelling `parent` destroys the universe.
    pub async fn new(parent: &CancellationToken) -> Result<Self> {
        Self::with_config(parent, UniverseConfig::default()).await
    }

    /// Create a universe
    ///
    /// Required tools are checked before anything is created. If the switch
    /// fails to start, the partially built universe is torn down before the
    /// error is returned.
    pub async fn with_config(parent: &CancellationToken, config: UniverseConfig) -> Result<Self> {
        config.validate()?;
        check_tools(&config.tools.required)?;

        let workspace = create_workspace(&config)?;
        let lifetime = parent.child_token();
        let switch_sock = switch::socket_path(&workspace);
        let (ports, producer) = port_stream(config.network.port_base, lifetime.clone());

        let universe = Universe {
            inner: Arc::new(Inner {
                workspace,
                lifetime,
                ports,
                addresses: Mutex::new(AddressCursors::new(
                    config.network.ipv4_start,
                    config.network.ipv6_start,
                )),
                vms: RwLock::new(HashMap::new()),
                switch_sock,
                switch_pid: OnceLock::new(),
                close: Mutex::new(None),
            }),
        };

        let command = SwitchCommand::new(&config.switch, &universe.inner.switch_sock);
        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                if let Err(close_err) = universe.close() {
                    warn!(error = %close_err, "cleanup after failed switch start");
                }
                return Err(e);
            }
        };
        if let Some(pid) = child.id() {
            let _ = universe.inner.switch_pid.set(pid);
        }

        tokio::spawn(supervise_switch(universe.clone(), child));
        tokio::spawn(close_on_cancel(universe.clone()));
        tokio::spawn(producer.run());

        info!(
            workspace = %universe.inner.workspace.display(),
            "universe created"
        );
        Ok(universe)
    }

    /// Create a temporary directory inside the universe
    ///
    /// Returns its absolute path. The directory disappears when the
    /// universe is destroyed.
    pub fn allocate_temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        if prefix.contains('/') {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("temp dir prefix '{}' must not contain a path separator", prefix),
            )));
        }
        // Held until the directory exists so teardown cannot remove the
        // workspace underneath us
        let state = self.close_state();
        if state.is_some() {
            return Err(Error::Closed);
        }

        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(&self.inner.workspace)?
            .keep();
        drop(state);
        debug!(path = %dir.display(), "allocated temp dir");
        Ok(dir)
    }

    /// Hand out the next IPv4 address
    pub fn allocate_ipv4(&self) -> Result<Ipv4Addr> {
        let addr = self.addresses().v4.allocate()?;
        debug!(%addr, "allocated IPv4 address");
        Ok(addr)
    }

    /// Hand out the next IPv6 address
    pub fn allocate_ipv6(&self) -> Result<Ipv6Addr> {
        let addr = self.addresses().v6.allocate()?;
        debug!(%addr, "allocated IPv6 address");
        Ok(addr)
    }

    /// Hand out the next port number
    ///
    /// Returns `None` once the universe is gone.
    pub async fn allocate_port(&self) -> Option<u16> {
        let port = self.inner.ports.next().await;
        if let Some(port) = port {
            debug!(port, "allocated port");
        }
        port
    }

    /// Path of the virtual switch control socket
    pub fn switch_socket_path(&self) -> &Path {
        &self.inner.switch_sock
    }

    /// Process ID of the virtual switch
    pub fn switch_pid(&self) -> Option<u32> {
        self.inner.switch_pid.get().copied()
    }

    /// Root of the universe's temporary workspace
    pub fn workspace_root(&self) -> &Path {
        &self.inner.workspace
    }

    /// Register a VM under its hostname
    pub fn register_vm(&self, hostname: impl Into<String>, vm: VmHandle) -> Result<()> {
        let hostname = hostname.into();
        let mut vms = self.inner.vms.write().unwrap_or_else(PoisonError::into_inner);
        match vms.entry(hostname) {
            Entry::Occupied(e) => Err(Error::VmAlreadyRegistered(e.key().clone())),
            Entry::Vacant(e) => {
                debug!(hostname = %e.key(), "registered VM");
                e.insert(vm);
                Ok(())
            }
        }
    }

    /// Look up a VM by hostname
    pub fn lookup_vm(&self, hostname: &str) -> Option<VmHandle> {
        self.inner
            .vms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hostname)
            .cloned()
    }

    /// Look up a VM and downcast it to its concrete type
    pub fn lookup_vm_as<T: Any + Send + Sync>(&self, hostname: &str) -> Option<Arc<T>> {
        self.lookup_vm(hostname)?.downcast::<T>().ok()
    }

    /// Hostnames of all registered VMs, sorted
    pub fn vm_hostnames(&self) -> Vec<String> {
        let vms = self.inner.vms.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = vms.keys().cloned().collect();
        names.sort();
        names
    }

    /// A token that is cancelled when the universe is destroyed
    ///
    /// Cancelling the returned token does not affect the universe.
    pub fn lifetime(&self) -> CancellationToken {
        self.inner.lifetime.child_token()
    }

    /// Whether teardown has run
    pub fn is_closed(&self) -> bool {
        self.close_state().is_some()
    }

    /// Destroy the universe, freeing up processes and temporary files
    ///
    /// Only the first call does any work; every call returns its outcome.
    pub fn close(&self) -> Result<()> {
        let mut state = self.close_state();

        if state.is_none() {
            self.inner.lifetime.cancel();

            let outcome = match fs::remove_dir_all(&self.inner.workspace) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Arc::new(e)),
            };
            match &outcome {
                Ok(()) => info!(
                    workspace = %self.inner.workspace.display(),
                    "universe closed"
                ),
                Err(e) => warn!(
                    workspace = %self.inner.workspace.display(),
                    error = %e,
                    "universe closed, workspace removal failed"
                ),
            }
            *state = Some(outcome);
        }

        match state.as_ref() {
            Some(Err(source)) => Err(Error::Teardown {
                path: self.inner.workspace.clone(),
                source: source.clone(),
            }),
            _ => Ok(()),
        }
    }

    /// Wait for the universe to end
    ///
    /// Returns `Error::Timeout` if `cancel` fires first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            _ = self.inner.lifetime.cancelled() => Ok(()),
            _ = cancel.cancelled() => Err(Error::Timeout),
        }
    }

    /// Wait for the universe to end, giving up after `timeout`
    pub async fn wait_for(&self, timeout: Duration) -> Result<()> {
        tokio::time::timeout(timeout, self.inner.lifetime.cancelled())
            .await
            .map_err(|_| Error::Timeout)
    }

    fn close_state(&self) -> MutexGuard<'_, Option<CloseOutcome>> {
        self.inner
            .close
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn addresses(&self) -> MutexGuard<'_, AddressCursors> {
        self.inner
            .addresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn create_workspace(config: &UniverseConfig) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(&config.workspace.prefix);

    let dir = match &config.workspace.root {
        Some(root) => builder.tempdir_in(std::path::absolute(root)?)?,
        None => builder.tempdir()?,
    };
    Ok(dir.keep())
}

/// Destroy the universe when the switch exits, and stop the switch when
/// the universe is destroyed
async fn supervise_switch(universe: Universe, mut child: Child) {
    let lifetime = universe.inner.lifetime.clone();

    let exited = tokio::select! {
        status = child.wait() => {
            match status {
                Ok(status) => warn!(%status, "virtual switch exited, destroying universe"),
                Err(e) => warn!(error = %e, "lost track of virtual switch, destroying universe"),
            }
            true
        }
        _ = lifetime.cancelled() => false,
    };

    if !exited {
        if let Err(e) = child.start_kill() {
            debug!(error = %e, "virtual switch already gone");
        }
        // Reap
        let _ = child.wait().await;
        debug!("virtual switch stopped");
    }

    close_off_runtime(universe).await;
}

/// Destroy the universe when its lifetime (or the parent's) is cancelled
async fn close_on_cancel(universe: Universe) {
    universe.inner.lifetime.cancelled().await;
    close_off_runtime(universe).await;
}

/// Run teardown on the blocking pool; removing a large workspace must not
/// stall a runtime worker
async fn close_off_runtime(universe: Universe) {
    if let Err(e) = tokio::task::spawn_blocking(move || universe.close()).await {
        warn!(error = %e, "universe teardown task failed");
    }
}
