//! The sub-agent dispatcher.
//!
//! Takes the delegation requests from one conversation turn and turns each
//! into a protocol-level result. Sub-agent failures of any kind — unknown
//! target, timeout, provider outage — degrade into error-flagged results
//! the parent model can read; they never abort the parent conversation.

use crate::context::assemble_system_prompt;
use crate::engine::{Engine, DELEGATE_TOOL};
use foreman_config::{AgentDef, ExecutionMode};
use foreman_core::{ToolCall, ToolResultBlock};
use std::time::Duration;
use tracing::{debug, warn};

/// A parsed delegation request.
struct DelegationRequest {
    agent: String,
    task: String,
}

impl DelegationRequest {
    fn parse(call: &ToolCall) -> Result<Self, String> {
        if call.name != DELEGATE_TOOL {
            return Err(format!("Unknown tool '{}'", call.name));
        }
        let agent = call.arguments.get("agent").and_then(|v| v.as_str());
        let task = call.arguments.get("task").and_then(|v| v.as_str());
        match (agent, task) {
            (Some(agent), Some(task)) if !agent.is_empty() && !task.is_empty() => {
                Ok(Self {
                    agent: agent.to_string(),
                    task: task.to_string(),
                })
            }
            _ => Err("Delegation requires string 'agent' and 'task' arguments".into()),
        }
    }
}

/// Execute every delegation request from one turn and return results in
/// invocation order, regardless of completion order.
pub(crate) async fn dispatch(
    engine: &Engine,
    parent: &AgentDef,
    calls: &[ToolCall],
    depth: u32,
) -> Vec<ToolResultBlock> {
    let sequential =
        parent.delegation.mode == ExecutionMode::Sequential || calls.len() == 1;

    debug!(
        parent = %parent.name,
        requests = calls.len(),
        depth,
        sequential,
        "Dispatching delegations"
    );

    if sequential {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(execute_one(engine, parent, call, depth).await);
        }
        results
    } else {
        // join_all polls all sub-conversations concurrently and yields
        // results in input order — the join barrier and the ordered
        // reassembly in one step.
        futures::future::join_all(
            calls
                .iter()
                .map(|call| execute_one(engine, parent, call, depth)),
        )
        .await
    }
}

/// Run a single delegation request to a protocol-level result.
async fn execute_one(
    engine: &Engine,
    parent: &AgentDef,
    call: &ToolCall,
    depth: u32,
) -> ToolResultBlock {
    let request = match DelegationRequest::parse(call) {
        Ok(r) => r,
        Err(msg) => return ToolResultBlock::error(&call.id, msg),
    };

    // Membership and depth fail closed, without any network call.
    if !parent.agents.contains(&request.agent) {
        return ToolResultBlock::error(
            &call.id,
            format!(
                "Agent '{}' is not in the delegation list of '{}'",
                request.agent, parent.name
            ),
        );
    }
    if depth >= parent.delegation.max_depth {
        return ToolResultBlock::error(
            &call.id,
            format!("Delegation depth limit ({}) reached", parent.delegation.max_depth),
        );
    }

    let target = match engine.config().agent(&request.agent) {
        Ok(t) => t,
        Err(e) => return ToolResultBlock::error(&call.id, e.to_string()),
    };

    // The sub-agent gets its own complete invocation context, including its
    // own memory preload. It never appends memory; only a successful
    // top-level run does.
    let context = match assemble_system_prompt(engine.config(), target) {
        Ok(c) => c,
        Err(e) => return ToolResultBlock::error(&call.id, e.to_string()),
    };

    let timeout = Duration::from_secs(parent.delegation.timeout_secs);
    match tokio::time::timeout(
        timeout,
        engine.run(target, context.prompt, request.task, depth + 1),
    )
    .await
    {
        Ok(Ok(outcome)) => {
            debug!(
                sub_agent = %target.name,
                turns = outcome.turns,
                "Sub-agent completed"
            );
            ToolResultBlock::ok(&call.id, outcome.text)
        }
        Ok(Err(e)) => {
            warn!(sub_agent = %target.name, error = %e, "Sub-agent failed");
            ToolResultBlock::error(&call.id, format!("Sub-agent '{}' failed: {e}", target.name))
        }
        Err(_) => {
            warn!(sub_agent = %target.name, timeout_secs = parent.delegation.timeout_secs, "Sub-agent timed out");
            ToolResultBlock::error(
                &call.id,
                format!(
                    "Sub-agent '{}' timed out after {}s",
                    target.name, parent.delegation.timeout_secs
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::test_support::*;
    use foreman_config::Config;
    use std::sync::Arc;

    fn crew_config() -> Arc<Config> {
        Arc::new(config_from(
            r#"
            [agents.boss]
            prompt = "Lead."
            model = "mock/m1"
            agents = ["alpha", "beta"]

            [agents.alpha]
            prompt = "A."
            model = "slow/m1"

            [agents.beta]
            prompt = "B."
            model = "fast/m1"
            "#,
        ))
    }

    fn delegate_call(agent: &str, id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: DELEGATE_TOOL.into(),
            arguments: serde_json::json!({"agent": agent, "task": "do it"}),
        }
    }

    #[tokio::test]
    async fn disallowed_target_fails_closed_without_network() {
        let parent_provider = ScriptedProvider::new(vec![]);
        let sub_provider = ScriptedProvider::new(vec![text_response("never")]);
        let resolver = RoutingResolver::new()
            .with("mock", parent_provider)
            .catch_all(sub_provider.clone());
        let config = crew_config();
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let results = dispatch(&engine, parent, &[delegate_call("outsider", "c1")], 0).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_error);
        assert!(results[0].content.contains("not in the delegation list"));
        assert_eq!(sub_provider.request_count(), 0);
    }

    #[tokio::test]
    async fn malformed_arguments_fail_closed() {
        let resolver = RoutingResolver::new().catch_all(ScriptedProvider::new(vec![]));
        let config = crew_config();
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let bad = ToolCall {
            id: "c1".into(),
            name: DELEGATE_TOOL.into(),
            arguments: serde_json::json!({"agent": "alpha"}),
        };
        let results = dispatch(&engine, parent, &[bad], 0).await;
        assert!(results[0].is_error);
        assert!(results[0].content.contains("'agent' and 'task'"));
    }

    #[tokio::test]
    async fn unknown_tool_name_fails_closed() {
        let resolver = RoutingResolver::new().catch_all(ScriptedProvider::new(vec![]));
        let config = crew_config();
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let bad = ToolCall {
            id: "c1".into(),
            name: "file_write".into(),
            arguments: serde_json::json!({}),
        };
        let results = dispatch(&engine, parent, &[bad], 0).await;
        assert!(results[0].is_error);
        assert!(results[0].content.contains("Unknown tool"));
    }

    #[tokio::test]
    async fn parallel_results_keep_invocation_order() {
        // alpha answers slowly, beta instantly; results must still come
        // back as [alpha, beta].
        let slow = ScriptedProvider::with_delay(
            vec![text_response("from alpha")],
            std::time::Duration::from_millis(80),
        );
        let fast = ScriptedProvider::new(vec![text_response("from beta")]);
        let resolver = RoutingResolver::new()
            .with("slow", slow)
            .with("fast", fast.clone());
        let config = crew_config();
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let calls = vec![delegate_call("alpha", "c1"), delegate_call("beta", "c2")];
        let results = dispatch(&engine, parent, &calls, 0).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call_id, "c1");
        assert_eq!(results[0].content, "from alpha");
        assert_eq!(results[1].call_id, "c2");
        assert_eq!(results[1].content, "from beta");
    }

    #[tokio::test]
    async fn sequential_mode_runs_in_order() {
        let config = Arc::new(config_from(
            r#"
            [agents.boss]
            prompt = "Lead."
            model = "mock/m1"
            agents = ["alpha"]
            delegation = { mode = "sequential" }

            [agents.alpha]
            prompt = "A."
            model = "sub/m1"
            "#,
        ));
        let sub = ScriptedProvider::new(vec![text_response("one"), text_response("two")]);
        let resolver = RoutingResolver::new().with("sub", sub);
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let calls = vec![delegate_call("alpha", "c1"), delegate_call("alpha", "c2")];
        let results = dispatch(&engine, parent, &calls, 0).await;
        assert_eq!(results[0].content, "one");
        assert_eq!(results[1].content, "two");
    }

    #[tokio::test]
    async fn timeout_becomes_error_result() {
        let config = Arc::new(config_from(
            r#"
            [agents.boss]
            prompt = "Lead."
            model = "mock/m1"
            agents = ["alpha"]
            delegation = { timeout_secs = 1 }

            [agents.alpha]
            prompt = "A."
            model = "sub/m1"
            "#,
        ));
        let sub = ScriptedProvider::with_delay(
            vec![text_response("too late")],
            std::time::Duration::from_secs(5),
        );
        let resolver = RoutingResolver::new().with("sub", sub);
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        tokio::time::pause();
        let results = dispatch(&engine, parent, &[delegate_call("alpha", "c1")], 0).await;

        assert!(results[0].is_error);
        assert!(results[0].content.contains("timed out after 1s"));
    }

    #[tokio::test]
    async fn depth_at_limit_fails_closed() {
        let resolver = RoutingResolver::new().catch_all(ScriptedProvider::new(vec![]));
        let config = crew_config();
        let engine = Engine::new(config.clone(), Arc::new(resolver));
        let parent = config.agent("boss").unwrap();

        let results = dispatch(&engine, parent, &[delegate_call("alpha", "c1")], 3).await;
        assert!(results[0].is_error);
        assert!(results[0].content.contains("depth limit"));
    }
}
