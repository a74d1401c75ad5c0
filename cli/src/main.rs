use clap::Parser;
mod commands;
mod dry_run;
mod status;
use commands::cli;
use dry_run::{parse_target, DryRunOperations};
use status::{StatusDisplay, StderrInformUser};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use wpm_core::error;
use wpm_core::packages::{self, PackageOperation, PackageOperations, PackageVersion};
use wpm_core::{BlockReport, BlockingController};

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, error::CliError> {
    let args = cli::Args::parse();
    let cfg = wpm_core::config::load_default().map_err(|e| error::CliError::Config(e.to_string()))?;
    init_tracing(&cfg.logging).map_err(error::CliError::Command)?;

    let display = StatusDisplay::new(!args.plain && atty::is(atty::Stream::Stderr));
    let sink = display.clone();
    let mut controller = BlockingController::new(
        move |hint: &str| sink.show_hint(hint),
        StderrInformUser::new(display.clone()),
    )
    .with_config(&cfg);
    if let Some(monitor) = controller.monitor() {
        let d = display.clone();
        monitor.set_title_sink(move |title| d.show_title(title));
    }

    let ops: Arc<dyn PackageOperations> = Arc::new(DryRunOperations::new(
        Duration::from_millis(args.step_ms),
        args.fail.clone(),
    ));

    let report = dispatch(args.command, &mut controller, ops).await?;
    display.finish(&report.state.title, report.succeeded());
    tracing::info!(
        run_id = %report.run_id.short(),
        elapsed_ms = report.state.elapsed.as_millis() as u64,
        failed = report.failed,
        "operation finished"
    );

    Ok(if report.failed { 1 } else { 0 })
}

fn exit_code_for_error(e: &error::CliError) -> i32 {
    // 0: success
    // 1: the operation itself failed (reported to the user, not an error here)
    // 11: config error
    // 20: runner start / usage error
    match e {
        error::CliError::Config(_) => 11,
        error::CliError::Runner(re) => match re {
            error::RunnerError::Config(_) => 11,
            error::RunnerError::Spawn(_) => 20,
        },
        error::CliError::Command(_) => 20,
    }
}

async fn dispatch(
    cmd: cli::Commands,
    controller: &mut BlockingController,
    ops: Arc<dyn PackageOperations>,
) -> Result<BlockReport, error::CliError> {
    let report = match cmd {
        cli::Commands::Install(p) => {
            let target = parse_target(&p.package, false);
            let title = format!("Installing {}", target);
            controller
                .block(&title, packages::install_task(ops, target))
                .await?
        }
        cli::Commands::Uninstall(p) => {
            let target = parse_target(&p.package, true);
            let title = format!("Uninstalling {}", target);
            controller
                .block(&title, packages::uninstall_task(ops, target))
                .await?
        }
        cli::Commands::Process(p) => {
            let batch: Vec<PackageOperation> = p
                .uninstall
                .iter()
                .map(|s| PackageOperation::uninstall(parse_target(s, true)))
                .chain(
                    p.install
                        .iter()
                        .map(|s| PackageOperation::install(parse_target(s, false))),
                )
                .collect();
            if batch.is_empty() {
                return Err(error::CliError::Command(
                    "nothing to do: pass --install or --uninstall".to_string(),
                ));
            }
            controller
                .block("Processing packages", packages::process_task(ops, batch))
                .await?
        }
        cli::Commands::Reload => {
            let loaded: Arc<Mutex<Vec<PackageVersion>>> = Arc::default();
            let slot = Arc::clone(&loaded);
            let task = packages::reload_task(ops, controller.control(), move |versions| {
                *slot.lock().unwrap_or_else(|p| p.into_inner()) = versions;
            });
            let report = controller.block("Reloading repositories", task).await?;

            let versions = loaded.lock().unwrap_or_else(|p| p.into_inner());
            for pv in versions.iter() {
                let mark = if pv.installed { "I" } else { " " };
                println!("{} {}", mark, pv);
            }
            report
        }
    };
    Ok(report)
}

fn init_tracing(logging: &wpm_core::config::LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = log_dir(logging);
        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        // one file per day; runs are told apart by thread name and run id
        let appender = tracing_appender::rolling::daily(dir, "wpm.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
            .with_thread_names(true)
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
            .with_thread_names(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Configured directory, else `~/.wpm/logs`, else the OS temp dir.
fn log_dir(logging: &wpm_core::config::LoggingConfig) -> std::path::PathBuf {
    match logging
        .directory
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        Some(d) => std::path::PathBuf::from(d),
        None => wpm_core::config::get_wpm_data_dir()
            .map(|d| d.join("logs"))
            .unwrap_or_else(|_| std::env::temp_dir().join("wpm")),
    }
}
