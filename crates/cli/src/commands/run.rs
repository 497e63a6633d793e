//! `foreman run` — one top-level agent invocation.

use foreman_agent::{assemble_system_prompt, Engine};
use foreman_config::Config;
use foreman_core::error::ProviderError;
use foreman_core::{Error, Result};
use foreman_memory::MemoryLog;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// The instruction used when neither an argument nor piped input exists.
const DEFAULT_TASK: &str = "Perform your configured role.";

pub async fn run(
    agent_name: &str,
    message: Option<String>,
    json: bool,
    dry_run: bool,
    timeout_secs: Option<u64>,
) -> Result<()> {
    let config = Arc::new(Config::load()?);
    let agent = config.agent(agent_name)?.clone();

    let user_message = resolve_message(message);
    let context = assemble_system_prompt(&config, &agent)?;

    if agent.memory.enabled
        && agent.memory.max_entries > 0
        && context.memory_entries > agent.memory.max_entries
    {
        warn!(
            agent = %agent.name,
            entries = context.memory_entries,
            max_entries = agent.memory.max_entries,
            "Memory log exceeds the soft limit; consider running `foreman gc`"
        );
    }

    if dry_run {
        print_dry_run(&config, &agent, &context.prompt, &context.memory_tail, &user_message);
        return Ok(());
    }

    let engine = Engine::new(config.clone(), super::resolver(config.clone()));
    let run_future = engine.run(&agent, context.prompt, user_message.clone(), 0);

    let outcome = match timeout_secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), run_future)
            .await
            .map_err(|_| {
                Error::Provider(ProviderError::Timeout(format!(
                    "invocation exceeded {secs}s"
                )))
            })??,
        None => run_future.await?,
    };

    // Best-effort: a failed append never fails the run.
    if agent.memory.enabled {
        let log = MemoryLog::new(config.memory_path(&agent));
        if let Err(e) = log.append(&user_message, &outcome.text) {
            warn!(agent = %agent.name, error = %e, "Failed to append memory entry");
        }
    }

    if json {
        let record = serde_json::json!({
            "agent": agent.name,
            "model": outcome.model,
            "text": outcome.text,
            "input_tokens": outcome.usage.input_tokens,
            "output_tokens": outcome.usage.output_tokens,
            "stop_reason": outcome.stop_reason.to_string(),
            "turns": outcome.turns,
            "delegation_calls": outcome.delegation_calls,
            "duration_ms": outcome.duration.as_millis() as u64,
        });
        println!("{record}");
    } else {
        println!("{}", outcome.text);
    }

    Ok(())
}

/// Message resolution: explicit argument, then piped stdin, then the
/// fixed default instruction.
fn resolve_message(message: Option<String>) -> String {
    if let Some(m) = message {
        return m;
    }
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut piped = String::new();
        if stdin.lock().read_to_string(&mut piped).is_ok() {
            let trimmed = piped.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    DEFAULT_TASK.to_string()
}

fn print_dry_run(
    config: &Config,
    agent: &foreman_config::AgentDef,
    prompt: &str,
    memory_tail: &str,
    user_message: &str,
) {
    println!("agent: {}", agent.name);
    println!(
        "model: {}",
        agent
            .model_ref(&config.defaults)
            .map(|r| r.to_string())
            .unwrap_or_default()
    );
    println!(
        "delegation: targets={:?} max_depth={} mode={:?} timeout={}s",
        agent.agents,
        agent.delegation.max_depth,
        agent.delegation.mode,
        agent.delegation.timeout_secs
    );
    println!();
    println!("--- system prompt ---");
    println!("{prompt}");
    println!("--- memory tail ({} chars) ---", memory_tail.len());
    if !memory_tail.is_empty() {
        println!("{memory_tail}");
    }
    println!("--- user message ---");
    println!("{user_message}");
}
