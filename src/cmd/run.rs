//! Supervised session: `devrunner run`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use super::super::Cli;
use super::{EXIT_FORCED, EXIT_INTERRUPTED, EXIT_OK};

/// How long the router gets to flush the final status lines.
const ROUTER_DRAIN: Duration = Duration::from_secs(1);

/// Pause before exiting on SIGINT while the shell thread still holds a sender.
const INTERRUPT_DRAIN: Duration = Duration::from_millis(200);

pub async fn cmd_run(cli: &Cli, rebuild: bool, filter: &[String]) -> Result<u8> {
    use devrunner::config::{ConfigOverrides, RunnerConfig};
    use devrunner::logging;
    use devrunner::router::{Console, LineFormatter, LogRouter};
    use devrunner::shell::{Command, Shell, default_reader};
    use devrunner::supervisor::{ShutdownReport, Supervisor};

    let overrides = ConfigOverrides {
        log_dir: cli.log_dir.clone(),
        filter: (!filter.is_empty()).then(|| filter.to_vec()),
    };
    let config = RunnerConfig::load(&cli.config, &overrides)
        .with_context(|| format!("Invalid configuration in {}", cli.config.display()))?;

    let guard = logging::init(&config.log_dir, cli.verbose)?;
    tracing::info!(
        config = %cli.config.display(),
        services = config.services.len(),
        rebuild,
        "starting session"
    );

    let names = config.service_names();
    let console = Arc::new(Console::stdout());
    let router = Arc::new(LogRouter::from_config(
        &config,
        console,
        LineFormatter::for_terminal(&names),
    ));
    let (log_tx, log_rx) = LogRouter::channel();
    let router_task = router.spawn(log_rx);
    let supervisor = Arc::new(Supervisor::new(&config, Arc::clone(&router), log_tx));
    let shell = Shell::new(Arc::clone(&supervisor));

    if !config.filter.is_empty() {
        shell.execute(Command::Filter(config.filter.clone())).await;
    }

    let exit_code = |report: &ShutdownReport| {
        if report.is_clean() { EXIT_OK } else { EXIT_FORCED }
    };

    let monitor = supervisor.spawn_monitor();
    let startup = tokio::select! {
        report = supervisor.start_all(rebuild) => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted during start-up");
            supervisor.shutdown().await;
            drop(guard);
            std::process::exit(EXIT_INTERRUPTED.into());
        }
    };
    shell.print_startup(&startup);

    let reader = default_reader(names);

    let code = tokio::select! {
        report = shell.run(reader) => exit_code(&report),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            supervisor.shutdown().await;
            tokio::time::sleep(INTERRUPT_DRAIN).await;
            drop(guard);
            // The shell thread may still be blocked on stdin, and the runtime
            // would wait for it forever on drop.
            std::process::exit(EXIT_INTERRUPTED.into());
        }
    };

    monitor.abort();
    drop(supervisor);
    if tokio::time::timeout(ROUTER_DRAIN, router_task).await.is_err() {
        tracing::debug!("router still draining at exit");
    }
    tracing::info!(code, "session ended");
    drop(guard);
    Ok(code)
}
