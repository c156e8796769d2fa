//! dupradar-cli: operator tooling for the DupRadar webhook server
//!
//! # Subcommands
//! - `sign <file>`: print the `X-Hub-Signature-256` value for a payload
//! - `replay <file> [--event <kind>]`: POST a signed delivery to a running server
//! - `status`: show server health

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dupradar_core::SignatureVerifier;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8080";
const DEFAULT_PATH: &str = "/webhook";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "dupradar-cli",
    version,
    about = "Sign, replay and inspect GitHub webhook deliveries for DupRadar"
)]
struct Cli {
    /// DupRadar server URL (overrides DUPRADAR_URL env var)
    #[arg(long, env = "DUPRADAR_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the signature header value for a payload file
    Sign {
        /// JSON payload file
        file: PathBuf,

        /// Shared webhook secret
        #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Sign a payload file and POST it to the webhook endpoint
    Replay {
        /// JSON payload file
        file: PathBuf,

        /// X-GitHub-Event value
        #[arg(long, default_value = "issues")]
        event: String,

        /// Webhook path on the server
        #[arg(long, default_value = DEFAULT_PATH)]
        path: String,

        /// X-GitHub-Delivery value (random when omitted)
        #[arg(long)]
        delivery: Option<String>,

        /// Shared webhook secret
        #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
        secret: String,
    },

    /// Show DupRadar server status
    Status,
}

// ============================================================================
// Delivery construction
// ============================================================================

/// A signed webhook delivery ready to send.
#[derive(Debug)]
pub struct Delivery {
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

pub fn build_delivery(
    verifier: &SignatureVerifier,
    body: Vec<u8>,
    event: &str,
    delivery_id: &str,
) -> Delivery {
    Delivery {
        headers: vec![
            ("X-Hub-Signature-256", verifier.sign(&body)),
            ("X-GitHub-Event", event.to_string()),
            ("X-GitHub-Delivery", delivery_id.to_string()),
            ("Content-Type", "application/json".to_string()),
        ],
        body,
    }
}

fn read_payload(file: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(file).with_context(|| format!("cannot read payload {}", file.display()))
}

fn verifier(secret: &str) -> anyhow::Result<SignatureVerifier> {
    SignatureVerifier::new(secret).context("webhook secret must not be empty")
}

// ============================================================================
// Commands
// ============================================================================

fn do_sign(file: &Path, secret: &str) -> anyhow::Result<()> {
    let body = read_payload(file)?;
    println!("{}", verifier(secret)?.sign(&body));
    Ok(())
}

fn do_replay(
    server: &str,
    file: &Path,
    event: &str,
    path: &str,
    delivery: Option<String>,
    secret: &str,
) -> anyhow::Result<()> {
    let body = read_payload(file)?;
    let delivery_id = delivery.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let delivery = build_delivery(&verifier(secret)?, body, event, &delivery_id);

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let url = format!("{}{}", server, path);
    let mut request = client.post(&url);
    for (name, value) in &delivery.headers {
        request = request.header(*name, value);
    }

    let resp = match request.body(delivery.body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("dupradar-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let text = resp.text().unwrap_or_default();
    println!("{} {} (delivery {})", status.as_u16(), text, delivery_id);
    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Human-readable summary of a `/health` body.
pub fn format_health(body: &serde_json::Value) -> String {
    format!(
        "DupRadar server: {}\nVersion:         {}\nPostgreSQL:      {}\npgvector:        {}",
        body["status"].as_str().unwrap_or("unknown"),
        body["version"].as_str().unwrap_or("?"),
        body["postgresql"].as_str().unwrap_or("?"),
        body["pgvector"].as_str().unwrap_or("?"),
    )
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    let resp = client.get(&url).send();

    match resp {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("{}", format_health(&body));
        }
        Ok(r) => {
            let status = r.status();
            eprintln!("dupradar-cli: server unhealthy (HTTP {})", status);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("dupradar-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Sign { file, secret } => do_sign(&file, &secret),
        Commands::Replay {
            file,
            event,
            path,
            delivery,
            secret,
        } => do_replay(&server, &file, &event, &path, delivery, &secret),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("dupradar-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
