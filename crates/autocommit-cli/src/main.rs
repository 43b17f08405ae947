//! autocommit - watches a git work tree and commits changes on its own
//!
//! By default the watch/schedule loop runs until interrupted. `--once` runs a
//! single attempt and reports through the exit code:
//!
//! - `0`: a commit was made
//! - `1`: nothing was committed (skipped, blocked or failed)
//! - `2`: invalid configuration

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};

use autocommit_core::{
    service, telemetry, AutoCommitError, ChangeSource, CommitOrchestrator, Config, GitCli,
    Trigger, Vcs, DEFAULT_CONFIG_PATH,
};
use autocommit_plugins::{available_plugins, build_pipeline};

#[derive(Parser, Debug)]
#[command(name = "autocommit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automatically commit and push changes in a git repository", long_about = None)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single commit attempt and exit
    #[arg(long)]
    once: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli.config)?;
    config
        .validate(&available_plugins())
        .context("invalid configuration")?;

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        telemetry::parse_level(&config.logging.level)
    };
    telemetry::init_tracing(cli.json || config.logging.json, level);

    let git = GitCli::open(&config.repository.path).context("failed to open repository")?;
    let root = git.root().to_path_buf();
    let vcs: Arc<dyn Vcs> = Arc::new(git);

    let hooks = build_pipeline(&config).context("failed to load plugins")?;
    info!(plugins = ?hooks.names(), repo = %root.display(), "autocommit ready");
    let orchestrator = CommitOrchestrator::from_config(&config, vcs, hooks)?;

    if cli.once {
        let result = orchestrator.attempt(&Trigger::manual()).await;
        info!(outcome = result.outcome.as_str(), reason = %result.reason, "single attempt finished");
        return Ok(if result.committed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        });
    }

    let source = ChangeSource::start(&config, &root).context("failed to start change sources")?;
    let stats = service::run(
        Arc::new(orchestrator),
        source,
        service::shutdown_on_ctrl_c(),
    )
    .await;
    info!(attempts = stats.attempts, committed = stats.committed, "exiting");
    Ok(ExitCode::SUCCESS)
}

/// Load `path`. The default file may be absent, in which case every
/// setting takes its default; an explicit path must exist.
fn load_config(path: &Path) -> Result<Config> {
    if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AutoCommitError>() {
        Some(e) if e.is_fatal() => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["autocommit"]).unwrap();
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(!cli.once);
        assert!(!cli.verbose);
        assert!(!cli.json);
    }

    #[test]
    fn flags_parse() {
        let cli = Cli::try_parse_from([
            "autocommit",
            "--config",
            "/etc/autocommit.yaml",
            "--once",
            "-v",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/autocommit.yaml"));
        assert!(cli.once && cli.verbose && cli.json);
    }

    #[test]
    fn explicit_missing_config_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.yaml")).unwrap_err();
        assert_eq!(exit_status(&err), 2);
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("autocommit.yaml");
        std::fs::write(&path, "logging:\n  level: warn\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn runtime_errors_exit_with_one() {
        let err = anyhow::Error::new(AutoCommitError::vcs("push", "rejected"));
        assert_eq!(exit_status(&err), 1);
    }
}
