//! # TS Sampler CLI
//!
//! 命令行接口入口点。
//!
//! 子命令：
//! - `run`：加载配置，打开 timeslice 源，服务请求直到 EOF、STOP 或信号
//! - `validate`：检查配置并列出警告
//! - `info`：展示解析后的目标、通道与直方图布局

mod cli;
mod commands;
mod error;
mod pipeline;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{error, info};

use cli::{Cli, Commands};
use commands::{run_info, run_server, run_validate};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli)?;

    info!(version = env!("CARGO_PKG_VERSION"), "TS Sampler starting");

    let result = match &cli.command {
        Commands::Run(args) => run_server(args).await,
        Commands::Validate(args) => run_validate(args),
        Commands::Info(args) => run_info(args),
    };

    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }

    result
}

/// `RUST_LOG` wins over `-v` unless `-q` is given.
fn init_logging(cli: &Cli) -> Result<()> {
    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: None,
        default_log_level: level.to_string(),
        env_filter: !cli.quiet,
    })
}
