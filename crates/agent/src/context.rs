//! Invocation context assembly: the system prompt an agent actually sees.

use foreman_config::{AgentDef, Config};
use foreman_core::Result;
use foreman_memory::MemoryLog;
use tracing::warn;

/// The assembled context for one agent invocation.
#[derive(Debug, Clone)]
pub struct SystemContext {
    /// Full system prompt: configured prompt plus any memory section
    pub prompt: String,

    /// The preloaded memory tail, verbatim (empty if none)
    pub memory_tail: String,

    /// Current entry count in the agent's memory log
    pub memory_entries: usize,
}

/// Build the system prompt for an agent: its configured prompt, plus a
/// `## Memory` section holding the last `preload_last_n` entries when the
/// memory policy is enabled.
///
/// Memory read failures at run time are best-effort: the run proceeds with
/// an empty tail and a warning.
pub fn assemble_system_prompt(config: &Config, agent: &AgentDef) -> Result<SystemContext> {
    if !agent.memory.enabled {
        return Ok(SystemContext {
            prompt: agent.prompt.clone(),
            memory_tail: String::new(),
            memory_entries: 0,
        });
    }

    let log = MemoryLog::new(config.memory_path(agent));
    let (tail, entries) = match (log.load_tail(agent.memory.preload_last_n), log.count()) {
        (Ok(tail), Ok(entries)) => (tail, entries),
        (Err(e), _) | (_, Err(e)) => {
            warn!(agent = %agent.name, error = %e, "Memory preload failed, continuing without it");
            (String::new(), 0)
        }
    };

    let prompt = if tail.is_empty() {
        agent.prompt.clone()
    } else {
        format!(
            "{}\n\n## Memory\n\nRecent outcomes from earlier runs:\n\n{}",
            agent.prompt, tail
        )
    };

    Ok(SystemContext {
        prompt,
        memory_tail: tail,
        memory_entries: entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::config_from;
    use tempfile::TempDir;

    #[test]
    fn no_memory_means_bare_prompt() {
        let config = config_from(
            r#"
            [agents.scribe]
            prompt = "You take notes."
            "#,
        );
        let ctx = assemble_system_prompt(&config, config.agent("scribe").unwrap()).unwrap();
        assert_eq!(ctx.prompt, "You take notes.");
        assert!(ctx.memory_tail.is_empty());
        assert_eq!(ctx.memory_entries, 0);
    }

    #[test]
    fn memory_tail_is_appended_as_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scribe.md");
        let config = config_from(&format!(
            r#"
            [agents.scribe]
            prompt = "You take notes."
            memory = {{ enabled = true, path = "{}", preload_last_n = 2 }}
            "#,
            path.display()
        ));
        let agent = config.agent("scribe").unwrap();

        let log = MemoryLog::new(&path);
        log.append("first", "one").unwrap();
        log.append("second", "two").unwrap();
        log.append("third", "three").unwrap();

        let ctx = assemble_system_prompt(&config, agent).unwrap();
        assert!(ctx.prompt.starts_with("You take notes."));
        assert!(ctx.prompt.contains("## Memory"));
        assert!(!ctx.prompt.contains("**Task:** first"));
        assert!(ctx.prompt.contains("**Task:** second"));
        assert!(ctx.prompt.contains("**Task:** third"));
        assert_eq!(ctx.memory_entries, 3);
    }

    #[test]
    fn empty_log_omits_memory_section() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fresh.md");
        let config = config_from(&format!(
            r#"
            [agents.fresh]
            prompt = "Start clean."
            memory = {{ enabled = true, path = "{}" }}
            "#,
            path.display()
        ));
        let ctx = assemble_system_prompt(&config, config.agent("fresh").unwrap()).unwrap();
        assert_eq!(ctx.prompt, "Start clean.");
    }
}
