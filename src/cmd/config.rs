//! Configuration view, validation and scaffolding: `devrunner config`.

use anyhow::{Context, Result};

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => show(cli),
        Some(ConfigCommands::Validate) => validate(cli),
        Some(ConfigCommands::Init { force }) => init(cli, force),
    }
}

fn show(cli: &Cli) -> Result<()> {
    use devrunner::config::{ConfigOverrides, ReadinessPolicy, RunnerConfig};

    let path = &cli.config;
    if !path.exists() {
        println!("No config file found at {}", path.display());
        println!();
        println!("Run 'devrunner config init' to create one.");
        return Ok(());
    }

    let overrides = ConfigOverrides {
        log_dir: cli.log_dir.clone(),
        filter: None,
    };
    let config = RunnerConfig::load(path, &overrides)?;

    println!();
    println!("devrunner configuration");
    println!("=======================");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("[runner]");
    println!("  log_dir = \"{}\"", config.log_dir.display());
    println!(
        "  monitor_interval_ms = {}",
        config.monitor_interval.as_millis()
    );
    println!("  stop_grace_secs = {}", config.stop_grace.as_secs());
    println!("  ring_capacity = {}", config.ring_capacity);
    if !config.filter.is_empty() {
        println!("  filter = {:?}", config.filter);
    }
    println!();

    for service in &config.services {
        println!("[[service]] {}", service.name);
        println!("  working_dir = \"{}\"", service.working_dir.display());
        println!("  start_command = \"{}\"", service.start_command);
        if let Some(cmd) = &service.rebuild_command {
            println!("  rebuild_command = \"{}\"", cmd);
        }
        if !service.depends_on.is_empty() {
            println!("  depends_on = {:?}", service.depends_on);
        }
        if let Some(cmd) = &service.frontend_command {
            println!("  frontend_command = \"{}\"", cmd);
        }
        println!("  log_path = \"{}\"", service.log_path.display());
        let readiness = match &service.readiness {
            ReadinessPolicy::Grace(grace) => format!("grace {}ms", grace.as_millis()),
            ReadinessPolicy::Command {
                command, timeout, ..
            } => format!("command \"{}\" within {}s", command, timeout.as_secs()),
            ReadinessPolicy::Tcp {
                host,
                port,
                timeout,
            } => format!("tcp {}:{} within {}s", host, port, timeout.as_secs()),
        };
        println!("  readiness = {}", readiness);
        println!();
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<()> {
    use devrunner::config::RunnerToml;

    let path = &cli.config;
    println!();
    println!("Validating {}...", path.display());
    println!();

    let mut toml = RunnerToml::load(path)?;
    toml.apply_env(|key| std::env::var(key).ok())?;
    let graph = toml.check()?;

    let config_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
    let warnings = toml.validate(config_dir);

    if warnings.is_empty() {
        println!("Configuration is valid ({} services).", graph.len());
    } else {
        println!("Configuration is valid, with warnings:");
        for warning in warnings {
            println!("  - {}", warning);
        }
    }
    println!();
    Ok(())
}

fn init(cli: &Cli, force: bool) -> Result<()> {
    use devrunner::config::EXAMPLE_CONFIG;

    let path = &cli.config;
    if path.exists() && !force {
        println!("{} already exists.", path.display());
        println!("Use --force to overwrite it.");
        anyhow::bail!("Refusing to overwrite {}", path.display());
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!();
    println!("Edit the [[service]] entries to match your checkouts, then run 'devrunner run'.");
    Ok(())
}
