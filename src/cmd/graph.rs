//! Start-up wave preview: `devrunner graph`.

use anyhow::{Context, Result};

use super::super::Cli;

pub fn cmd_graph(cli: &Cli) -> Result<()> {
    use devrunner::config::RunnerToml;
    use devrunner::ui::icons::WAVE;

    let toml = RunnerToml::load(&cli.config)?;
    let graph = toml
        .check()
        .with_context(|| format!("Invalid dependency graph in {}", cli.config.display()))?;

    println!();
    for (i, wave) in graph.compute_waves().iter().enumerate() {
        let names: Vec<&str> = wave.iter().filter_map(|&idx| graph.name(idx)).collect();
        println!("{}Wave {}: {}", WAVE, i + 1, names.join(", "));
    }
    println!();
    for index in graph.topological_order() {
        let deps: Vec<&str> = graph
            .dependencies(*index)
            .iter()
            .filter_map(|&d| graph.name(d))
            .collect();
        if let Some(name) = graph.name(*index)
            && !deps.is_empty()
        {
            println!("  {} <- {}", name, deps.join(", "));
        }
    }
    Ok(())
}
