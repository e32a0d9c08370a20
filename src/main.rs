use anyhow::{Context, Result};
use async_trait::async_trait;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio::time::sleep;

use encodebot::cli::{Cli, Commands};
use encodebot::core::{config, init_logger, log_startup_configuration, AppResult};
use encodebot::encode::{EncodeJob, EncodePipeline, FfmpegRunner};
use encodebot::messages;
use encodebot::progress::StatusSink;
use encodebot::storage::create_pool;
use encodebot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};
use encodebot::transfer::TransferTracker;
use encodebot::workflow::{EncodeService, Workspace};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before any config is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Encode { input, output }) => run_cli_encode(input, output).await,
        Some(Commands::Check) => run_check().await,
    }
}

/// Starts long polling and keeps the dispatcher alive across panics.
async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    log_startup_configuration();

    let runner = FfmpegRunner::from_config();
    if !runner.check_available().await {
        log::warn!("{} did not answer -version; encodes will fail until it is installed", runner.binary());
    }

    let db_pool = Arc::new(create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?);

    let tracker = Arc::new(TransferTracker::with_defaults());
    let sweeper = Arc::clone(&tracker).spawn_sweeper(config::transfer::sweep_interval());

    let service = Arc::new(EncodeService::new(
        tracker,
        EncodePipeline::new(runner),
        Workspace::from_config(),
    ));
    let deps = HandlerDeps::new(db_pool, service);

    let bot = create_bot()?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    let mut retry_count = 0;

    loop {
        let bot_clone = bot.clone();
        let handler = schema(deps.clone());

        let handle = tokio::spawn(async move {
            let listener = Polling::builder(bot_clone.clone()).build();

            Dispatcher::builder(bot_clone, handler)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    sweeper.abort();
    Ok(())
}

/// Prints status updates to stdout for the `encode` subcommand.
struct ConsoleStatus;

#[async_trait]
impl StatusSink for ConsoleStatus {
    async fn render(&self, text: String) -> AppResult<()> {
        println!("{}\n", text);
        Ok(())
    }

    async fn remove(&self) -> AppResult<()> {
        Ok(())
    }
}

/// Encodes a local file; the input is left in place.
async fn run_cli_encode(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let file_name = input
        .file_name()
        .and_then(|n| n.to_str())
        .context("Input path has no file name")?
        .to_string();
    let default_job = Workspace::from_config().job_for(&file_name);
    let job = EncodeJob::new(input, output.unwrap_or(default_job.output));

    println!("🎬 Encoding {} -> {}", job.input.display(), job.output.display());

    let pipeline = EncodePipeline::new(FfmpegRunner::from_config());
    match pipeline.encode_narrated(&job, &ConsoleStatus).await {
        Ok(report) => {
            println!("{}", messages::encode_summary(&report));
            println!("Attempts: {}", report.attempts);
            Ok(())
        }
        Err(failure) => {
            println!("{}", messages::encode_failed(&failure.error_tail()));
            Err(anyhow::anyhow!("Encoding failed: {}", failure))
        }
    }
}

/// Verifies the encoder binary and the working directories.
async fn run_check() -> Result<()> {
    log_startup_configuration();

    let runner = FfmpegRunner::from_config();
    if !runner.check_available().await {
        return Err(anyhow::anyhow!("{} is not runnable", runner.binary()));
    }
    println!("✅ {} is available", runner.binary());

    for dir in [&*config::DOWNLOADS_DIR, &*config::ENCODED_DIR] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Cannot create {}", dir.display()))?;
        println!("✅ {} is writable", dir.display());
    }

    create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    println!("✅ Database {} is ready", config::DATABASE_PATH.as_str());
    Ok(())
}
