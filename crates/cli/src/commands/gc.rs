//! `foreman gc` — memory analysis and retention trimming.

use foreman_agent::gc::{run_gc, run_gc_all, GcReport};
use foreman_config::Config;
use foreman_core::{Error, Result};
use std::sync::Arc;

pub async fn run(agent_name: Option<&str>, all: bool, preview: bool) -> Result<()> {
    let config = Arc::new(Config::load()?);
    let resolver = super::resolver(config.clone());

    if all {
        let outcomes = run_gc_all(&config, resolver.as_ref(), preview).await;
        let mut failures = 0usize;
        for (name, result) in &outcomes {
            match result {
                Ok(report) => print_report(report, preview),
                Err(e) => {
                    eprintln!("{name}: GC failed: {e}");
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            return Err(Error::Internal(format!(
                "GC failed for {failures} of {} agent(s)",
                outcomes.len()
            )));
        }
        return Ok(());
    }

    let name = agent_name.ok_or_else(|| Error::Config {
        message: "Specify an agent name or --all".into(),
    })?;
    let agent = config.agent(name)?;
    if !agent.memory.enabled {
        return Err(Error::Config {
            message: format!("Agent '{name}' does not have memory enabled"),
        });
    }

    let report = run_gc(&config, resolver.as_ref(), agent, preview).await?;
    print_report(&report, preview);
    Ok(())
}

fn print_report(report: &GcReport, preview: bool) {
    if report.entries == 0 {
        println!("{}: memory log is empty, nothing to do", report.agent);
        return;
    }

    if let Some(analysis) = &report.analysis {
        println!("=== {} ({} entries) ===", report.agent, report.entries);
        println!("{analysis}");
        println!();
    }

    match (report.target, report.trimmed) {
        (None, _) => println!("{}: no retention target set, analysis only", report.agent),
        (Some(target), None) if preview => {
            println!("{}: preview mode, would trim to last {target}", report.agent)
        }
        (Some(_), Some(outcome)) if outcome.removed > 0 => println!(
            "{}: removed {} entr{}, kept {}",
            report.agent,
            outcome.removed,
            if outcome.removed == 1 { "y" } else { "ies" },
            outcome.kept
        ),
        (Some(target), _) => {
            println!("{}: within limit ({target}), nothing removed", report.agent)
        }
    }
}
