//! Memory retention flow: analyze an agent's full memory, then trim.
//!
//! Independent of the conversation engine. Unlike run-time appends, memory
//! failures here are hard errors — trimming correctness is the entire
//! point of this flow.

use crate::engine::ProviderResolver;
use foreman_config::{AgentDef, Config};
use foreman_core::provider::ProviderRequest;
use foreman_core::{Error, Result};
use foreman_memory::{MemoryLog, TrimOutcome};
use tracing::{info, warn};

/// The fixed analysis instruction. Not configurable.
const ANALYSIS_PROMPT: &str = "You are reviewing an agent's memory log of past task outcomes. \
Analyze the full log and respond with exactly three labeled sections:\n\
\n\
Patterns found: recurring themes, task types, or behaviors across entries.\n\
Repeated work: tasks that were performed more than once, or near-duplicates.\n\
Recommendations: how the agent's prompt or delegation setup could improve.";

const ANALYSIS_TEMPERATURE: f32 = 0.3;
const ANALYSIS_MAX_TOKENS: u32 = 2000;

/// Result of one agent's GC pass.
#[derive(Debug, Clone)]
pub struct GcReport {
    pub agent: String,

    /// Entries present before any trimming
    pub entries: usize,

    /// The model's analysis; `None` when the log was empty
    pub analysis: Option<String>,

    /// Resolved trim target (`last_n`, else `max_entries`, else none)
    pub target: Option<usize>,

    /// Trim result; `None` when no target was set or preview was requested
    pub trimmed: Option<TrimOutcome>,
}

/// Run the retention flow for one agent.
///
/// Loads the full memory, asks the model to summarize patterns, and —
/// unless `preview` is set — trims the log to the retention target.
/// GC never appends a memory entry.
pub async fn run_gc(
    config: &Config,
    resolver: &dyn ProviderResolver,
    agent: &AgentDef,
    preview: bool,
) -> Result<GcReport> {
    let log = MemoryLog::new(config.memory_path(agent));
    let memory = log.load_tail(0).map_err(Error::Memory)?;
    let entries = log.count().map_err(Error::Memory)?;

    if memory.trim().is_empty() {
        info!(agent = %agent.name, "Memory log is empty, nothing to analyze");
        return Ok(GcReport {
            agent: agent.name.clone(),
            entries: 0,
            analysis: None,
            target: None,
            trimmed: None,
        });
    }

    let model_ref = agent.model_ref(&config.defaults)?;
    let provider = resolver.resolve(&model_ref)?;

    let request = ProviderRequest {
        model: model_ref.model.clone(),
        system: ANALYSIS_PROMPT.into(),
        messages: vec![foreman_core::Message::user(memory)],
        temperature: ANALYSIS_TEMPERATURE,
        max_tokens: Some(ANALYSIS_MAX_TOKENS),
        tools: Vec::new(),
    };

    // On provider failure we stop here: the file is untouched.
    let response = provider.complete(request).await?;

    let target = if agent.memory.last_n > 0 {
        Some(agent.memory.last_n)
    } else if agent.memory.max_entries > 0 {
        Some(agent.memory.max_entries)
    } else {
        None
    };

    let trimmed = match target {
        Some(keep) if !preview => Some(log.trim(keep).map_err(Error::Memory)?),
        _ => None,
    };

    if let Some(outcome) = trimmed {
        info!(
            agent = %agent.name,
            removed = outcome.removed,
            kept = outcome.kept,
            "Memory trimmed"
        );
    }

    Ok(GcReport {
        agent: agent.name.clone(),
        entries,
        analysis: Some(response.text),
        target,
        trimmed,
    })
}

/// Run GC for every memory-enabled agent, sequentially.
///
/// Continues past per-agent failures and returns each agent's outcome so
/// the caller can report an aggregate failure.
pub async fn run_gc_all(
    config: &Config,
    resolver: &dyn ProviderResolver,
    preview: bool,
) -> Vec<(String, Result<GcReport>)> {
    let mut outcomes = Vec::new();
    for agent in config.memory_enabled_agents() {
        let result = run_gc(config, resolver, agent, preview).await;
        if let Err(e) = &result {
            warn!(agent = %agent.name, error = %e, "GC failed for agent");
        }
        outcomes.push((agent.name.clone(), result));
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use tempfile::TempDir;

    fn gc_config(dir: &TempDir, extra: &str) -> Config {
        config_from(&format!(
            r#"
            [agents.keeper]
            prompt = "Keep."
            model = "mock/m1"
            memory = {{ enabled = true, path = "{}"{extra} }}
            "#,
            dir.path().join("keeper.md").display()
        ))
    }

    fn fill(config: &Config, n: usize) -> MemoryLog {
        let log = MemoryLog::new(config.memory_path(config.agent("keeper").unwrap()));
        for i in 1..=n {
            log.append(&format!("task {i}"), "done").unwrap();
        }
        log
    }

    #[tokio::test]
    async fn empty_log_skips_provider_entirely() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, ", last_n = 3");
        let provider = ScriptedProvider::new(vec![]);
        let resolver = RoutingResolver::new().catch_all(provider.clone());

        let report = run_gc(&config, &resolver, config.agent("keeper").unwrap(), false)
            .await
            .unwrap();

        assert_eq!(report.entries, 0);
        assert!(report.analysis.is_none());
        assert!(report.trimmed.is_none());
        assert_eq!(provider.request_count(), 0);
    }

    #[tokio::test]
    async fn analysis_then_trim_to_last_n() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, ", last_n = 3");
        let log = fill(&config, 10);
        let provider = ScriptedProvider::new(vec![text_response("Patterns found: ...")]);
        let resolver = RoutingResolver::new().catch_all(provider.clone());

        let report = run_gc(&config, &resolver, config.agent("keeper").unwrap(), false)
            .await
            .unwrap();

        assert_eq!(report.entries, 10);
        assert_eq!(report.analysis.as_deref(), Some("Patterns found: ..."));
        assert_eq!(report.target, Some(3));
        assert_eq!(report.trimmed.unwrap().removed, 7);
        assert_eq!(log.count().unwrap(), 3);

        // GC itself never appends; the fixed sampling parameters are used.
        let req = &provider.requests()[0];
        assert!((req.temperature - ANALYSIS_TEMPERATURE).abs() < f32::EPSILON);
        assert!(req.tools.is_empty());
        assert!(req.system.contains("Patterns found"));
    }

    #[tokio::test]
    async fn max_entries_is_fallback_target() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, ", max_entries = 4");
        let log = fill(&config, 6);
        let resolver =
            RoutingResolver::new().catch_all(ScriptedProvider::new(vec![text_response("ok")]));

        let report = run_gc(&config, &resolver, config.agent("keeper").unwrap(), false)
            .await
            .unwrap();

        assert_eq!(report.target, Some(4));
        assert_eq!(log.count().unwrap(), 4);
    }

    #[tokio::test]
    async fn no_target_means_analysis_only() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, "");
        let log = fill(&config, 10);
        let resolver =
            RoutingResolver::new().catch_all(ScriptedProvider::new(vec![text_response("ok")]));

        let report = run_gc(&config, &resolver, config.agent("keeper").unwrap(), false)
            .await
            .unwrap();

        assert!(report.analysis.is_some());
        assert!(report.target.is_none());
        assert!(report.trimmed.is_none());
        assert_eq!(log.count().unwrap(), 10);
    }

    #[tokio::test]
    async fn preview_never_trims() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, ", last_n = 2");
        let log = fill(&config, 8);
        let resolver =
            RoutingResolver::new().catch_all(ScriptedProvider::new(vec![text_response("ok")]));

        let report = run_gc(&config, &resolver, config.agent("keeper").unwrap(), true)
            .await
            .unwrap();

        assert_eq!(report.target, Some(2));
        assert!(report.trimmed.is_none());
        assert_eq!(log.count().unwrap(), 8);
    }

    #[tokio::test]
    async fn provider_failure_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let config = gc_config(&dir, ", last_n = 2");
        let log = fill(&config, 5);
        let before = std::fs::read_to_string(log.path()).unwrap();
        let resolver = RoutingResolver::new().catch_all(ScriptedProvider::failing());

        let err = run_gc(&config, &resolver, config.agent("keeper").unwrap(), false)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider(_)));
        assert_eq!(std::fs::read_to_string(log.path()).unwrap(), before);
    }

    #[tokio::test]
    async fn bulk_mode_continues_past_failures() {
        let dir = TempDir::new().unwrap();
        let a_path = dir.path().join("a.md");
        let b_path = dir.path().join("b.md");
        let config = config_from(&format!(
            r#"
            [agents.a]
            prompt = "A."
            model = "fail/m1"
            memory = {{ enabled = true, path = "{}", last_n = 1 }}

            [agents.b]
            prompt = "B."
            model = "mock/m1"
            memory = {{ enabled = true, path = "{}", last_n = 1 }}
            "#,
            a_path.display(),
            b_path.display()
        ));
        MemoryLog::new(&a_path).append("t", "r").unwrap();
        let b_log = MemoryLog::new(&b_path);
        b_log.append("t1", "r1").unwrap();
        b_log.append("t2", "r2").unwrap();

        let resolver = RoutingResolver::new()
            .with("fail", ScriptedProvider::failing())
            .with("mock", ScriptedProvider::new(vec![text_response("ok")]));

        let outcomes = run_gc_all(&config, &resolver, false).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].1.is_err(), "agent a should fail");
        assert!(outcomes[1].1.is_ok(), "agent b should still run");
        assert_eq!(b_log.count().unwrap(), 1);
    }
}
