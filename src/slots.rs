//! Node slots
//!
//! A slot bundles everything a VM needs from its universe before it can
//! boot: a scratch directory, one address of each family and a forwarded
//! port. Slots are registered in the universe under their hostname.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::universe::Universe;

/// Resources reserved for one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeSlot {
    pub hostname: String,
    pub scratch_dir: PathBuf,
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
    pub port: u16,
}

impl NodeSlot {
    /// Reserve a slot and register it under `hostname`
    pub async fn reserve(universe: &Universe, hostname: &str) -> Result<Arc<Self>> {
        if universe.lookup_vm(hostname).is_some() {
            return Err(Error::VmAlreadyRegistered(hostname.to_string()));
        }

        let scratch_dir = universe.allocate_temp_dir(hostname)?;
        let ipv4 = universe.allocate_ipv4()?;
        let ipv6 = universe.allocate_ipv6()?;
        let port = universe.allocate_port().await.ok_or(Error::Closed)?;

        let slot = Arc::new(Self {
            hostname: hostname.to_string(),
            scratch_dir,
            ipv4,
            ipv6,
            port,
        });
        universe.register_vm(hostname, slot.clone())?;
        Ok(slot)
    }
}

/// Reserve `count` slots named `node1`, `node2`, ...
pub async fn reserve_nodes(universe: &Universe, count: usize) -> Result<Vec<Arc<NodeSlot>>> {
    let mut slots = Vec::with_capacity(count);
    for i in 1..=count {
        slots.push(NodeSlot::reserve(universe, &format!("node{}", i)).await?);
    }
    Ok(slots)
}

/// Render slots as a table
pub fn format_table(slots: &[Arc<NodeSlot>]) -> String {
    let mut out = format!(
        "{:<12} {:<15} {:<24} {:<6} {}\n",
        "HOSTNAME", "IPV4", "IPV6", "PORT", "SCRATCH"
    );
    out.push_str(&"-".repeat(80));
    out.push('\n');
    for slot in slots {
        out.push_str(&format!(
            "{:<12} {:<15} {:<24} {:<6} {}\n",
            slot.hostname,
            slot.ipv4,
            slot.ipv6,
            slot.port,
            slot.scratch_dir.display()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UniverseConfig;
    use tokio_util::sync::CancellationToken;

    async fn test_universe(root: &std::path::Path) -> Universe {
        let mut config = UniverseConfig::default();
        config.tools.required = vec!["sh".into()];
        config.workspace.root = Some(root.to_path_buf());
        config.switch.program = "sh".into();
        config.switch.args = vec!["-c".into(), "exec sleep 600".into()];
        Universe::with_config(&CancellationToken::new(), config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_nodes() {
        let root = tempfile::tempdir().unwrap();
        let universe = test_universe(root.path()).await;

        let slots = reserve_nodes(&universe, 3).await.unwrap();
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].hostname, "node1");
        assert_eq!(slots[0].ipv4, Ipv4Addr::new(172, 20, 0, 1));
        assert_eq!(slots[2].ipv4, Ipv4Addr::new(172, 20, 0, 3));
        assert_eq!(slots[1].ipv6.to_string(), "fd00::2");
        assert_eq!(
            slots.iter().map(|s| s.port).collect::<Vec<_>>(),
            vec![50000, 50001, 50002]
        );
        for slot in &slots {
            assert!(slot.scratch_dir.starts_with(universe.workspace_root()));
        }

        let found = universe.lookup_vm_as::<NodeSlot>("node2").unwrap();
        assert_eq!(found.ipv4, slots[1].ipv4);

        universe.close().unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_hostname_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let universe = test_universe(root.path()).await;

        NodeSlot::reserve(&universe, "controller").await.unwrap();
        let err = NodeSlot::reserve(&universe, "controller").await.unwrap_err();
        assert!(matches!(err, Error::VmAlreadyRegistered(_)));
        // Nothing was allocated for the rejected slot
        assert_eq!(universe.allocate_ipv4().unwrap(), Ipv4Addr::new(172, 20, 0, 2));

        universe.close().unwrap();
    }

    #[tokio::test]
    async fn test_reserve_after_close() {
        let root = tempfile::tempdir().unwrap();
        let universe = test_universe(root.path()).await;
        universe.close().unwrap();

        let err = NodeSlot::reserve(&universe, "node1").await.unwrap_err();
        assert!(matches!(err, Error::Closed));
    }

    #[test]
    fn test_format_table() {
        let slot = Arc::new(NodeSlot {
            hostname: "node1".into(),
            scratch_dir: PathBuf::from("/tmp/u/node1abc"),
            ipv4: Ipv4Addr::new(172, 20, 0, 1),
            ipv6: "fd00::1".parse().unwrap(),
            port: 50000,
        });
        let table = format_table(&[slot]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("HOSTNAME"));
        assert!(lines[2].contains("172.20.0.1"));
        assert!(lines[2].contains("50000"));
    }
}
