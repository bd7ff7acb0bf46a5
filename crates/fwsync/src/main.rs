// # fwsync - Cloud Firewall Console CLI
//
// This binary is a THIN shell over fwsync-core:
// - Parse the command line and environment (clap)
// - Initialize logging and the tokio runtime
// - Wire the REST store, the builtin catalog and the confirmation prompt
//   into the managers
// - Print results
//
// All normalization, validation and lifecycle logic lives in fwsync-core.
//
// ## Configuration
//
// - `FWSYNC_API_URL`: Console API base URL (default http://127.0.0.1:8080/api/v1)
// - `FWSYNC_TIMEOUT_SECS`: Request timeout in seconds (default 30)
// - `FWSYNC_LOG_LEVEL`: trace, debug, info, warn, error (default warn)
// - `FWSYNC_SECRET_KEY`: Access key secret for `configs add/edit`
//
// ## Example
//
// ```bash
// export FWSYNC_API_URL=http://console.local:8080/api/v1
//
// fwsync configs add --provider TencentCloud --region ap-guangzhou \
//     --instance lhins-abc --secret-id AKID... --type 1
// fwsync rules preview --config 1 --port 80,443
// fwsync rules add --config 1 --port 80,443 --remark web
// fwsync rules execute 7
// ```

mod cli;
mod commands;
mod prompt;

use anyhow::Result;
use clap::Parser;
use fwsync_core::config::{ApiConfig, ClientConfig};
use fwsync_core::traits::{Confirm, StaticConfirm};
use fwsync_core::Catalog;
use fwsync_store_http::HttpStore;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error};
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, GlobalOpts};
use commands::Context;
use prompt::TerminalConfirm;

/// Exit codes for different termination scenarios
///
/// - 0: Command succeeded
/// - 1: Configuration or startup error
/// - 2: Command failed
#[derive(Debug, Clone, Copy)]
enum FwsyncExitCode {
    /// Command succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// The command itself failed
    CommandError = 2,
}

impl From<FwsyncExitCode> for ExitCode {
    fn from(code: FwsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Build and validate the client configuration from the global options
fn client_config(global: &GlobalOpts) -> Result<ClientConfig> {
    let config = ClientConfig {
        api: ApiConfig::new(global.api_url.clone()).with_timeout_secs(global.timeout),
        ..ClientConfig::default()
    };
    config.validate()?;

    if !(1..=300).contains(&global.timeout) {
        anyhow::bail!(
            "FWSYNC_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
            global.timeout
        );
    }

    Ok(config)
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!(
            "FWSYNC_LOG_LEVEL '{}' is not valid. \
            Valid levels: trace, debug, info, warn, error",
            raw
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match client_config(&cli.global) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    let log_level = match parse_log_level(&cli.global.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    // Logs go to stderr so command output stays pipeable
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FwsyncExitCode::ConfigError.into();
    }

    debug!("Using console API at {}", config.api.base_url);

    let store = match HttpStore::new(&config.api) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    let confirm: Arc<dyn Confirm> = if cli.global.yes {
        Arc::new(StaticConfirm(true))
    } else {
        Arc::new(TerminalConfirm)
    };

    let ctx = Context {
        store,
        confirm,
        catalog: Arc::new(Catalog::builtin()),
        manager: config.manager,
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FwsyncExitCode::ConfigError.into();
        }
    };

    let result = rt.block_on(async {
        match commands::run(cli.command, &ctx).await {
            Ok(()) => FwsyncExitCode::Success,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                FwsyncExitCode::CommandError
            }
        }
    });

    result.into()
}
