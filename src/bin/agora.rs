//! Agora CLI: replay chat transcripts through the scoring pipeline.
//!
//! Usage:
//!   agora replay <transcript.yaml> [--config path] [--llm-command CMD] [-v]
//!   agora config [--config path]
//!   agora fingerprint <sentence>...

use agora::collab::{
    CommandCompletionClient, Collaborators, Embedder, Identity, LlmArgumentExtractor,
    StaticIdentityResolver,
};
use agora::pipeline::fingerprint;
use agora::{GenerationController, IncomingMessage, NullSink, ScoringConfig, SessionId};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agora",
    version,
    about = "Incremental argumentation scoreboard for chat sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a transcript into one session and print the final outcome
    Replay {
        /// YAML transcript: session, optional topic, messages of {user, content}
        transcript: PathBuf,
        /// Scoring config file (defaults to <config dir>/agora/config.yaml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Command that reads a prompt on stdin and writes a completion to stdout
        #[arg(long, default_value = "ollama run llama3.1")]
        llm_command: String,
        /// Log pipeline progress at debug level
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the effective scoring configuration
    Config {
        /// Scoring config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the cluster fingerprint of a list of sentences
    Fingerprint {
        #[arg(required = true)]
        sentences: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct Transcript {
    session: String,
    #[serde(default)]
    topic: Option<String>,
    messages: Vec<TranscriptMessage>,
}

#[derive(Debug, Deserialize)]
struct TranscriptMessage {
    user: String,
    content: String,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "agora=debug" } else { "agora=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

/// Explicit path, else the default location if it exists, else defaults.
fn load_config(path: Option<PathBuf>) -> Result<ScoringConfig, String> {
    let path = match path {
        Some(path) => path,
        None => match ScoringConfig::default_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => return Ok(ScoringConfig::default()),
        },
    };
    ScoringConfig::from_yaml_file(&path).map_err(|e| e.to_string())
}

fn load_transcript(path: &Path) -> Result<Transcript, String> {
    let yaml = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_yaml::from_str(&yaml).map_err(|e| format!("failed to parse transcript: {}", e))
}

#[cfg(feature = "embeddings")]
fn build_embedder() -> Result<Arc<dyn Embedder>, String> {
    agora::collab::FastEmbedEmbedder::default_model()
        .map(|e| Arc::new(e) as Arc<dyn Embedder>)
        .map_err(|e| e.to_string())
}

#[cfg(not(feature = "embeddings"))]
fn build_embedder() -> Result<Arc<dyn Embedder>, String> {
    Ok(Arc::new(agora::collab::TokenHashEmbedder::default()))
}

fn token_for(user: &str) -> String {
    format!("replay-{}", user)
}

fn cmd_replay(transcript: &Path, config: Option<PathBuf>, llm_command: &str) -> i32 {
    let config = match load_config(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let transcript = match load_transcript(transcript) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let Some(client) = CommandCompletionClient::from_command_line(llm_command) else {
        eprintln!("Error: --llm-command is empty");
        return 1;
    };
    let embedder = match build_embedder() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: failed to load embedding model: {}", e);
            return 1;
        }
    };

    let identity = StaticIdentityResolver::new();
    for message in &transcript.messages {
        identity.issue(
            token_for(&message.user),
            Identity::new(message.user.as_str(), transcript.session.as_str()),
        );
    }
    let collaborators = Collaborators::new(
        Arc::new(identity),
        embedder,
        Arc::new(LlmArgumentExtractor::new(Arc::new(client))),
    );

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to create tokio runtime: {}", e);
            return 1;
        }
    };

    rt.block_on(async {
        let controller = match GenerationController::start(collaborators, config, Arc::new(NullSink)) {
            Ok(controller) => controller,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        };
        let session_id = SessionId::from(transcript.session.as_str());

        for (i, message) in transcript.messages.iter().enumerate() {
            let mut incoming = IncomingMessage::new(message.content.as_str());
            if i == 0 {
                if let Some(topic) = &transcript.topic {
                    incoming = incoming.with_topic(topic.as_str());
                }
            }
            if let Err(e) = controller.submit(&token_for(&message.user), incoming) {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
        controller.wait_idle(&session_id).await;
        controller.shutdown().await;

        let Some(snapshot) = controller.snapshot(&session_id) else {
            eprintln!("Error: transcript has no messages");
            return 1;
        };
        if let Some(entry) = snapshot.generation_log.last() {
            if let agora::session::GenerationOutcome::Failed { reason } = &entry.outcome {
                eprintln!("Error: generation failed: {}", reason);
                return 1;
            }
        }
        match serde_json::to_string_pretty(&snapshot.last_outcome) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        }
    })
}

fn cmd_config(config: Option<PathBuf>) -> i32 {
    let yaml = load_config(config).and_then(|c| c.to_yaml().map_err(|e| e.to_string()));
    match yaml {
        Ok(yaml) => {
            print!("{}", yaml);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Replay {
            transcript,
            config,
            llm_command,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_replay(&transcript, config, &llm_command)
        }
        Commands::Config { config } => cmd_config(config),
        Commands::Fingerprint { sentences } => {
            println!("{}", fingerprint(&sentences));
            0
        }
    };
    std::process::exit(code);
}
