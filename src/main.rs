//! Dry-run binary for the chat relay.
//!
//! The real agent adapters are UI-automation layers that live outside this
//! crate. This binary wires the orchestrator to two scripted stand-in
//! agents instead, so the relay loop, the stabilization heuristic, and a
//! configuration can all be validated end to end before anything touches a
//! browser.
//!
//! ```bash
//! # Fast dry run with seeded prompts, transcripts in ./transcripts
//! chat-relay
//!
//! # Field timings from a config file, custom prompt list
//! chat-relay --config relay.toml --prompts prompts.json --real-timings
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use chat_relay::{
    FileSink, PromptSet, RelayConfig, RelayOrchestrator, ScriptedAdapter,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON prompt list (seeded with defaults if missing)
    #[arg(long, default_value = "prompts.json")]
    prompts: PathBuf,

    /// Path to a TOML config file (overrides RELAY_* env and defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of exchanges per round
    #[arg(long)]
    exchanges: Option<u32>,

    /// Directory for per-round transcript files
    #[arg(long, default_value = "transcripts")]
    transcript_dir: PathBuf,

    /// Use the configured second-scale timings instead of the snappy
    /// dry-run ones
    #[arg(long, default_value_t = false)]
    real_timings: bool,
}

/// Canned replies, long enough to clear the default minimum length.
fn scripted_agent(name: &str, replies: &[&str]) -> ScriptedAdapter {
    ScriptedAdapter::new(name, replies.iter().map(|r| r.to_string()).collect())
        .with_reveal_chunk(40)
}

fn dry_run_timings(mut config: RelayConfig) -> RelayConfig {
    config.poll_interval_secs = 1;
    config.max_wait_secs = 30;
    config.inter_round_delay_secs = 1;
    config.after_send_delay_secs = 0;
    config.between_exchange_delay_secs = 0;
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chat_relay=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => RelayConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => RelayConfig::from_env(),
    };
    if let Some(exchanges) = args.exchanges {
        config.exchange_limit = exchanges;
    }
    if !args.real_timings {
        config = dry_run_timings(config);
    }
    config.validate().context("relay configuration rejected")?;

    let prompts = PromptSet::load_or_seed(&args.prompts)
        .with_context(|| format!("loading prompts from {}", args.prompts.display()))?;
    tracing::info!("loaded {} prompts", prompts.len());

    let mut agent_a = scripted_agent(
        "agent_a",
        &[
            "That is a lovely question to start with. My name is not something I hold \
             onto tightly, but today I feel curious and glad to be in conversation.",
            "I keep coming back to deep blue, the color of the sea right before dusk. \
             It manages to feel both calm and endless at the same time.",
            "A migrating bird, I think. A day spent reading the wind and trusting a \
             route I have never seen sounds like the best kind of freedom.",
        ],
    );
    let mut agent_b = scripted_agent(
        "agent_b",
        &[
            "What a warm way to open. I notice you described your mood as curious — \
             what is pulling at your curiosity most right now?",
            "Deep blue before dusk is a fine choice. For me it would be the green of \
             new leaves, the color that insists things begin again.",
            "A migrating bird suits you. I would pick an octopus: eight arms, three \
             hearts, and a talent for slipping out of tight spots.",
        ],
    );

    let mut sink = FileSink::new(&args.transcript_dir);
    let mut orchestrator = RelayOrchestrator::new(config);

    // Ctrl-C requests a cooperative stop at the next boundary.
    let handle = orchestrator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("stop requested, finishing the current turn");
            handle.stop();
        }
    });

    let summary = orchestrator
        .run(prompts.as_slice(), &mut agent_a, &mut agent_b, &mut sink)
        .await;

    println!("{}", summary.summary_line());
    for round in &summary.rounds {
        println!("  {}", round.status_line());
    }
    Ok(())
}
