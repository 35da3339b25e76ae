//! testverse - bring up an isolated virtual test network
//!
//! Creates a universe, reserves node slots in it and keeps it alive until
//! interrupted, then tears everything down.

mod cli;
mod logging;

use cli::{Cli, Commands};
use std::time::Duration;
use testverse::config::{self, UniverseConfig};
use testverse::error::{Error, Result};
use testverse::{Universe, slots, tools};
use tokio_util::sync::CancellationToken;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse_args();
    logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load(path)?,
        None => UniverseConfig::default(),
    };

    match cli.command {
        Commands::Check => {
            tools::check_tools(&config.tools.required)?;
            println!("All required tools found: {}", config.tools.required.join(", "));
            Ok(())
        }
        Commands::Completion { shell } => {
            Cli::generate_completion(shell);
            Ok(())
        }
        Commands::Up {
            nodes,
            json,
            timeout,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(up(config, nodes, json, timeout.map(Duration::from_secs)))
        }
    }
}

async fn up(config: UniverseConfig, nodes: usize, json: bool, timeout: Option<Duration>) -> Result<()> {
    let root = CancellationToken::new();

    // Ctrl+C cancels the root token, which destroys everything in the universe
    let interrupt = root.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => interrupt.cancel(),
            _ = interrupt.cancelled() => {}
        }
    });

    eprintln!("Creating universe...");
    let universe = Universe::with_config(&root, config).await?;

    let result = serve(&universe, nodes, json, timeout).await;
    let closed = universe.close();
    root.cancel();

    result?;
    closed?;
    eprintln!("Universe destroyed");
    Ok(())
}

async fn serve(universe: &Universe, nodes: usize, json: bool, timeout: Option<Duration>) -> Result<()> {
    let slots = slots::reserve_nodes(universe, nodes).await?;

    if json {
        let plan = serde_json::json!({
            "workspace": universe.workspace_root(),
            "switch_socket": universe.switch_socket_path(),
            "nodes": slots.iter().map(|s| s.as_ref()).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&plan).map_err(|e| Error::Io(e.into()))?
        );
    } else {
        println!("Workspace: {}", universe.workspace_root().display());
        println!("Switch:    {}\n", universe.switch_socket_path().display());
        print!("{}", slots::format_table(&slots));
    }

    eprintln!("Universe is up. Press Ctrl+C to stop.");
    match timeout {
        Some(limit) => match universe.wait_for(limit).await {
            // Running out the clock is the requested way to end
            Ok(()) | Err(Error::Timeout) => Ok(()),
            Err(e) => Err(e),
        },
        None => universe.wait(&CancellationToken::new()).await,
    }
}
