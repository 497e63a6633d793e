//! `foreman agents` — list configured agents.

use foreman_config::Config;
use foreman_core::Result;

pub fn run() -> Result<()> {
    let config = Config::load()?;

    if config.agents.is_empty() {
        println!("No agents configured.");
        return Ok(());
    }

    for agent in config.agents.values() {
        let model = agent
            .model_ref(&config.defaults)
            .map(|r| r.to_string())
            .unwrap_or_else(|_| "<invalid model>".into());

        println!("{}  ({model})", agent.name);

        let first_line = agent.prompt.lines().next().unwrap_or("");
        if !first_line.is_empty() {
            println!("    {first_line}");
        }
        if agent.can_delegate() {
            println!(
                "    delegates to: {} (max_depth {}, {:?}, {}s timeout)",
                agent.agents.join(", "),
                agent.delegation.max_depth,
                agent.delegation.mode,
                agent.delegation.timeout_secs
            );
        }
        if agent.memory.enabled {
            println!(
                "    memory: {} (preload last {})",
                config.memory_path(agent).display(),
                agent.memory.preload_last_n
            );
        }
    }

    Ok(())
}
