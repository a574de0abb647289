//! Authentimed CLI: validator keys, registration, scans and ledger queries.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use authentimed_crypto::{derive_address, generate_keypair, keypair_from_private};
use authentimed_node::{init_logging, LedgerNode, NodeConfig, ShutdownController};
use authentimed_registry::ValidatorApproval;
use authentimed_store_lmdb::{check_integrity, LmdbEnvironment};
use authentimed_types::{CodeFormat, Factor, PrivateKey, ProductId, ScannerRole, StripCode};
use authentimed_verification::{ScanInput, VerificationError};

#[derive(Parser)]
#[command(name = "authentimed", about = "Authentimed product ledger")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "AUTHENTIMED_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for ledger storage.
    #[arg(long, env = "AUTHENTIMED_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Validator addresses (comma-separated). Only needed on the first open
    /// of a data directory.
    #[arg(long, env = "AUTHENTIMED_VALIDATORS", value_delimiter = ',')]
    validators: Vec<String>,

    /// Approvals needed to register a product (defaults to a majority).
    #[arg(long, env = "AUTHENTIMED_QUORUM")]
    quorum: Option<usize>,

    /// Accepted code syntax: "permissive" or "pan".
    #[arg(long, env = "AUTHENTIMED_CODE_FORMAT")]
    code_format: Option<CodeFormat>,

    /// Log format: "human" or "json".
    #[arg(long, env = "AUTHENTIMED_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "AUTHENTIMED_LOG_LEVEL")]
    log_level: Option<String>,

    /// Collect Prometheus metrics.
    #[arg(long, env = "AUTHENTIMED_ENABLE_METRICS")]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Generate a validator key pair.
    Keygen,

    /// Sign a registration approval with a validator key.
    Approve {
        /// Hex-encoded 32-byte private key.
        #[arg(long, env = "AUTHENTIMED_PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
        product_id: String,
        strip_code: String,
    },

    /// Register a product once enough validators have approved it.
    Register {
        product_id: String,
        strip_code: String,
        /// Approval tokens (`address:signature`), one per validator.
        #[arg(long = "approval", required = true)]
        approvals: Vec<String>,
    },

    /// Draw a fresh, unused product id and strip code.
    Generate,

    /// Evaluate one scan and record it.
    Verify {
        code: String,
        #[arg(long, default_value = "qr")]
        factor: Factor,
        /// Packaging classifier verdict.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        ai_match: bool,
        #[arg(long)]
        confidence: Option<f32>,
        #[arg(long, default_value = "unspecified")]
        role: ScannerRole,
    },

    /// Report what a scan would show, without recording it.
    Status {
        code: String,
        #[arg(long, default_value = "qr")]
        factor: Factor,
    },

    /// Print every audit entry for a product.
    History { product_id: String },

    /// Print audit entries in commit order.
    Audit {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Check the ledger's databases for corruption.
    Check,

    /// Evaluate JSON scan inputs read line by line from stdin.
    ScanBatch {
        /// Write Prometheus metrics here when the batch ends.
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let base = match &cli.config {
        Some(path) => {
            let path = path.to_string_lossy();
            NodeConfig::from_toml_file(&path).with_context(|| format!("loading {path}"))?
        }
        None => NodeConfig::default(),
    };

    let config = NodeConfig {
        data_dir: cli.data_dir.clone().unwrap_or(base.data_dir.clone()),
        validators: if cli.validators.is_empty() {
            base.validators.clone()
        } else {
            cli.validators.clone()
        },
        quorum: cli.quorum.or(base.quorum),
        code_format: cli.code_format.unwrap_or(base.code_format),
        log_format: cli.log_format.clone().unwrap_or(base.log_format.clone()),
        log_level: cli.log_level.clone().unwrap_or(base.log_level.clone()),
        enable_metrics: cli.metrics || base.enable_metrics,
        ..base
    };
    config.validate()?;
    Ok(config)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(config.log_format()?, &config.log_level);

    match cli.command {
        Command::Keygen => {
            let keypair = generate_keypair().context("system randomness unavailable")?;
            print_json(&json!({
                "private_key": hex::encode(keypair.private.0),
                "public_key": hex::encode(keypair.public.as_bytes()),
                "address": derive_address(&keypair.public).as_str(),
            }))?;
        }

        Command::Approve {
            private_key,
            product_id,
            strip_code,
        } => {
            let bytes = hex::decode(private_key.trim()).context("private key is not hex")?;
            let Ok(seed) = <[u8; 32]>::try_from(bytes.as_slice()) else {
                bail!("private key must be 32 bytes, got {}", bytes.len());
            };
            let keypair = keypair_from_private(PrivateKey(seed));
            let product_id = ProductId::parse(&product_id, config.code_format)?;
            let strip_code = StripCode::parse(&strip_code, config.code_format)?;
            let approval = ValidatorApproval::sign(&product_id, &strip_code, &keypair);
            println!("{}", approval.to_token());
        }

        Command::Register {
            product_id,
            strip_code,
            approvals,
        } => {
            let approvals = approvals
                .iter()
                .map(|t| ValidatorApproval::from_token(t))
                .collect::<Result<Vec<_>, _>>()?;
            let node = LedgerNode::open(config)?;
            let product = node.register(&product_id, &strip_code, &approvals)?;
            node.sync()?;
            print_json(&product)?;
        }

        Command::Generate => {
            let node = LedgerNode::open(config)?;
            let (product_id, strip_code) = node.generate_pair()?;
            print_json(&json!({
                "product_id": product_id.as_str(),
                "strip_code": strip_code.as_str(),
            }))?;
        }

        Command::Verify {
            code,
            factor,
            ai_match,
            confidence,
            role,
        } => {
            let mut input = ScanInput::new(code, factor, ai_match).with_role(role);
            if let Some(confidence) = confidence {
                input = input.with_confidence(confidence);
            }
            let node = LedgerNode::open(config)?;
            let result = node.verify(input).await?;
            node.sync()?;
            print_json(&result.to_report())?;
        }

        Command::Status { code, factor } => {
            let node = LedgerNode::open(config)?;
            print_json(&node.status(&code, factor)?.to_report())?;
        }

        Command::History { product_id } => {
            let product_id = ProductId::parse(&product_id, config.code_format)?;
            let node = LedgerNode::open(config)?;
            print_json(&node.history(&product_id)?)?;
        }

        Command::Audit { from, limit } => {
            let node = LedgerNode::open(config)?;
            print_json(&node.audit_entries(from, limit)?)?;
        }

        Command::Check => {
            let env = LmdbEnvironment::open(&config.data_dir, config.map_size_bytes())?;
            let report = check_integrity(&env)?;
            print_json(&json!({
                "healthy": report.is_healthy(),
                "databases_checked": report.databases_checked,
                "total_entries": report.total_entries,
                "errors": report.errors,
            }))?;
            if !report.is_healthy() {
                bail!("ledger failed integrity check");
            }
        }

        Command::ScanBatch { metrics_out } => {
            let node = LedgerNode::open(config)?;
            let scanned = scan_batch(&node).await?;
            node.sync()?;
            tracing::info!(scanned, "scan batch finished");

            if let (Some(path), Some(metrics)) = (metrics_out, node.metrics()) {
                std::fs::write(&path, metrics.encode_text()?)
                    .with_context(|| format!("writing metrics to {}", path.display()))?;
            }
        }
    }

    Ok(())
}

/// Evaluate stdin until EOF or a shutdown signal. One JSON report (or error)
/// is printed per input line.
async fn scan_batch(node: &LedgerNode) -> anyhow::Result<u64> {
    let shutdown = Arc::new(ShutdownController::new());
    let mut stop = shutdown.subscribe();
    let signals = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { shutdown.wait_for_signal().await })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut scanned = 0u64;
    loop {
        let line = tokio::select! {
            _ = stop.recv() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let output = match serde_json::from_str::<ScanInput>(&line) {
            Ok(input) => match node.verify(input).await {
                Ok(result) => serde_json::to_value(result.to_report())?,
                Err(e) => error_json(&e),
            },
            Err(e) => json!({ "error": format!("bad scan input: {e}"), "kind": "client_input" }),
        };
        println!("{output}");
        scanned += 1;
    }

    signals.abort();
    Ok(scanned)
}

fn error_json(e: &VerificationError) -> serde_json::Value {
    json!({
        "error": e.to_string(),
        "kind": e.kind().as_str(),
        "retryable": e.is_retryable(),
    })
}
