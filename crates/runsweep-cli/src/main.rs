//! runsweep CLI - reaper and result extractor for workflow runs.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use runsweep_client::{ClientError, KubeClient, KubeConfig, LabelSelector, RunStore};
use runsweep_controller::{Config, ControllerError, Extractor, Reaper};
use runsweep_core::TTL_LABEL;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,runsweep=info";

/// runsweep - TTL reaper and job-activity result extractor
#[derive(Parser, Debug)]
#[command(name = "runsweep")]
#[command(about = "Reconciliation passes over Tekton PipelineRuns", long_about = None)]
struct Cli {
    /// API server URL (defaults to in-cluster discovery)
    #[arg(long, global = true, env = "RUNSWEEP_API_SERVER")]
    api_server: Option<String>,

    /// File holding the bearer token
    #[arg(long, global = true, env = "RUNSWEEP_TOKEN_FILE")]
    token_file: Option<PathBuf>,

    /// PEM file with the CA bundle for the API server
    #[arg(long, global = true, env = "RUNSWEEP_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Skip verification of the API server certificate
    #[arg(long, global = true)]
    insecure_skip_tls_verify: bool,

    /// Label carrying the TTL in seconds
    #[arg(long, global = true, env = "RUNSWEEP_TTL_LABEL", default_value = TTL_LABEL)]
    ttl_label: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete finished runs whose TTL has elapsed
    Reap {
        /// Namespace to sweep (empty for all namespaces)
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Log expired runs without deleting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Report job-activity tasks of a run that have not succeeded
    #[command(group(ArgGroup::new("target").required(true).args(["name", "selector"])))]
    Extract {
        /// Namespace of the run (empty to search all namespaces)
        #[arg(short, long, default_value = "")]
        namespace: String,

        /// Name of the run
        #[arg(long)]
        name: Option<String>,

        /// Report every run matching this label selector instead
        #[arg(short = 'l', long)]
        selector: Option<LabelSelector>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// Failures that end the process with a non-zero exit code.
#[derive(Debug, Error)]
enum CliError {
    #[error("failed to build cluster client: {0}")]
    Setup(#[from] ClientError),

    #[error(transparent)]
    Pass(#[from] ControllerError),

    #[error("failed to write report: {0}")]
    Output(#[from] io::Error),

    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Pass failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let store: Arc<dyn RunStore> = Arc::new(KubeClient::new(kube_config(&cli)?)?);
    let mut config = Config {
        ttl_label: cli.ttl_label,
        ..Config::default()
    };

    match cli.command {
        Commands::Reap { namespace, dry_run } => {
            config.dry_run = dry_run;
            reap(store, config, &namespace).await
        }
        Commands::Extract {
            namespace,
            name,
            selector,
        } => extract(store, config, &namespace, name, selector).await,
    }
}

fn kube_config(cli: &Cli) -> Result<KubeConfig, ClientError> {
    let mut config = match &cli.api_server {
        Some(server) => KubeConfig::default().with_server(server.as_str()),
        None => KubeConfig::in_cluster()?,
    };
    if let Some(path) = &cli.token_file {
        config = config.with_token_file(path)?;
    }
    if let Some(path) = &cli.ca_file {
        config = config.with_ca_file(path)?;
    }
    config.insecure_skip_tls_verify = cli.insecure_skip_tls_verify;
    Ok(config)
}

async fn reap(store: Arc<dyn RunStore>, config: Config, namespace: &str) -> Result<(), CliError> {
    let report = Reaper::new(store, config).run(namespace).await?;
    let summary = report.summary();

    info!(
        total = summary.total(),
        deleted = summary.deleted,
        would_delete = summary.would_delete,
        already_gone = summary.already_gone,
        retained = summary.retained,
        active = summary.active,
        skipped = summary.skipped,
        failed = summary.failed,
        "Reap pass complete"
    );

    Ok(())
}

async fn extract(
    store: Arc<dyn RunStore>,
    config: Config,
    namespace: &str,
    name: Option<String>,
    selector: Option<LabelSelector>,
) -> Result<(), CliError> {
    let extractor = Extractor::new(store, config);
    // clap guarantees exactly one of the two.
    let reports = match selector {
        Some(selector) => extractor.extract_matching(namespace, &selector).await?,
        None => {
            extractor
                .extract(namespace, name.as_deref().unwrap_or_default())
                .await?
        }
    };

    // One JSON document per line on stdout; diagnostics stay on stderr.
    let mut out = io::stdout().lock();
    for report in &reports {
        serde_json::to_writer(&mut out, report)?;
        writeln!(out)?;
    }
    out.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reap() {
        let cli = Cli::parse_from(["runsweep", "reap", "--namespace", "ci", "--dry-run"]);
        assert_eq!(cli.ttl_label, TTL_LABEL);
        assert!(matches!(
            cli.command,
            Commands::Reap { ref namespace, dry_run: true } if namespace == "ci"
        ));
    }

    #[test]
    fn test_reap_defaults_to_all_namespaces() {
        let cli = Cli::parse_from(["runsweep", "reap"]);
        assert!(matches!(
            cli.command,
            Commands::Reap { ref namespace, dry_run: false } if namespace.is_empty()
        ));
    }

    #[test]
    fn test_extract_requires_name() {
        assert!(Cli::try_parse_from(["runsweep", "extract", "--namespace", "ci"]).is_err());

        let cli = Cli::parse_from(["runsweep", "extract", "--name", "build-42", "-n", "ci"]);
        match cli.command {
            Commands::Extract {
                namespace,
                name,
                selector,
            } => {
                assert_eq!(namespace, "ci");
                assert_eq!(name.as_deref(), Some("build-42"));
                assert!(selector.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_extract_by_selector() {
        let cli = Cli::parse_from(["runsweep", "extract", "-l", "tekton.dev/ttl,team!=infra"]);
        match cli.command {
            Commands::Extract { name, selector, .. } => {
                assert!(name.is_none());
                let expected: LabelSelector = "tekton.dev/ttl,team!=infra".parse().unwrap();
                assert_eq!(selector, Some(expected));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_extract_rejects_name_with_selector() {
        let both = ["runsweep", "extract", "--name", "d", "--selector", "tekton.dev/ttl"];
        assert!(Cli::try_parse_from(both).is_err());
        assert!(Cli::try_parse_from(["runsweep", "extract", "--selector", "a,,b"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::parse_from([
            "runsweep",
            "reap",
            "--api-server",
            "https://127.0.0.1:6443",
            "--ttl-label",
            "example.com/ttl",
            "--log-format",
            "json",
        ]);
        assert_eq!(cli.api_server.as_deref(), Some("https://127.0.0.1:6443"));
        assert_eq!(cli.ttl_label, "example.com/ttl");
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn test_explicit_server_skips_discovery() {
        let cli = Cli::parse_from(["runsweep", "--api-server", "https://10.0.0.1:6443", "reap"]);
        let config = kube_config(&cli).unwrap();
        assert_eq!(config.server, "https://10.0.0.1:6443");
        assert!(config.token.is_none());
    }
}
