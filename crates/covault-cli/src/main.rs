// CLI for driving an in-process threshold access session

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use covault_agent::{ActionOutcome, AgentHandle, ParticipantAgent};
use covault_core::{ParticipantId, SessionConfig};
use covault_shares::{derive_key, BlinkSample, ShareResolver, UnavailableShareStore};
use covault_sync::MemoryHub;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "covault")]
#[command(about = "Covault - Threshold-Gated Document Access", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted t-of-n access session over the in-memory channel
    Simulate {
        /// Number of participants
        #[arg(short = 'n', long, default_value = "3")]
        participants: u16,

        /// Threshold (t in t-of-n)
        #[arg(short = 't', long, default_value = "2")]
        threshold: u16,
    },

    /// Derive a key from a blink-sample file and print its shape
    DeriveKey {
        /// JSON file holding an array of blink samples; a built-in demo
        /// sequence is used when omitted
        #[arg(short, long)]
        samples: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match cli.command {
        Commands::Simulate {
            participants,
            threshold,
        } => simulate(threshold, participants).await,
        Commands::DeriveKey { samples } => derive_key_command(samples.as_deref()),
    }
}

async fn simulate(threshold: u16, participants: u16) -> Result<()> {
    let config = SessionConfig::new(threshold, participants);
    config
        .validate()
        .context("rejected session configuration")?;

    info!(threshold, participants, "starting in-process session");
    let hub = MemoryHub::new();
    let mut agents: Vec<AgentHandle> = Vec::new();
    for slot in 1..=participants {
        let id = ParticipantId::new(slot);
        let endpoint = hub.attach(id).await;
        let resolver = Arc::new(ShareResolver::new(UnavailableShareStore));
        let (handle, _task) =
            ParticipantAgent::spawn(id, config.clone(), resolver, Box::new(endpoint))
                .context("failed to spawn agent")?;
        agents.push(handle);
    }

    let requester = &agents[0];
    step(requester, requester.request().await, "request").await;

    // Grants from the next t-1 participants; the requester counts itself.
    for grantor in agents.iter().take(usize::from(threshold)).skip(1) {
        step(grantor, grantor.grant().await, "grant").await;
    }

    // A participant that was never granted access probes the document.
    if let Some(prober) = agents.last().filter(|p| p.id() != requester.id()) {
        step(prober, prober.open().await, "open (unauthorized probe)").await;
    }

    step(requester, requester.open().await, "open").await;
    report(&agents).await?;

    step(requester, requester.reset().await, "reset").await;
    report(&agents).await?;
    Ok(())
}

async fn step(
    agent: &AgentHandle,
    outcome: std::result::Result<ActionOutcome, covault_agent::AgentError>,
    action: &str,
) {
    match outcome {
        Ok(ActionOutcome::Accepted) => info!(agent = %agent.id(), action, "accepted"),
        Ok(ActionOutcome::NoOp) => info!(agent = %agent.id(), action, "no-op"),
        Ok(ActionOutcome::Rejected(error)) => {
            info!(agent = %agent.id(), action, %error, "rejected");
        }
        Err(error) => info!(agent = %agent.id(), action, %error, "agent unavailable"),
    }
    // Let the broadcast fan out before the next scripted step.
    tokio::time::sleep(Duration::from_millis(20)).await;
}

async fn report(agents: &[AgentHandle]) -> Result<()> {
    for agent in agents {
        let snapshot = agent
            .snapshot()
            .await
            .context("agent terminated mid-simulation")?;
        let grantors: Vec<String> = snapshot
            .session
            .grantors()
            .map(|p| p.to_string())
            .collect();
        info!(
            agent = %agent.id(),
            phase = ?snapshot.session.phase(),
            epoch = %snapshot.session.epoch(),
            grantors = grantors.join(", "),
            unauthorized = snapshot.unauthorized_attempts,
            "replica state"
        );
    }
    Ok(())
}

fn derive_key_command(samples_path: Option<&std::path::Path>) -> Result<()> {
    let samples: Vec<BlinkSample> = match samples_path {
        Some(path) => {
            let raw = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_slice(&raw).context("malformed blink-sample file")?
        }
        None => demo_samples(),
    };

    let key = derive_key(&samples).context("key derivation failed")?;
    println!("derived key: {} bytes from {} blinks", key.len(), samples.len());
    println!("key digest:  {}…", &key.to_hex()[..16]);
    Ok(())
}

fn demo_samples() -> Vec<BlinkSample> {
    vec![
        BlinkSample {
            timestamp_ms: 1_000,
            duration_ms: 140,
            intensity: 0.7,
            eye_open_interval_ms: 860,
        },
        BlinkSample {
            timestamp_ms: 2_150,
            duration_ms: 95,
            intensity: 0.4,
            eye_open_interval_ms: 1_150,
        },
        BlinkSample {
            timestamp_ms: 3_900,
            duration_ms: 210,
            intensity: 0.9,
            eye_open_interval_ms: 1_750,
        },
    ]
}
