//! Flow graph interpreter (§4.4, component C4): drives a session between
//! `START` / `PROMPT` / `TASK_EXECUTION` / `END` nodes.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thunder_executor::{ExecutorContext, ExecutorRegistry};
use thunder_model::{
    ExecutorStatus, FailureReason, FlowDefinition, FlowSession, FlowStep, InputDecl, Node, Prompt,
    Suspension, SuspensionKind, ThunderError, ThunderResult, Value,
};
use uuid::Uuid;

use crate::session_store::InMemorySessionStore;
use crate::validation::validate_flow_definition;

pub struct FlowEngine {
    definitions: HashMap<String, FlowDefinition>,
    executors: Arc<ExecutorRegistry>,
    store: Arc<InMemorySessionStore>,
}

impl FlowEngine {
    /// Validates every definition (§4.4 "Graph validation runs at definition
    /// load") before the engine becomes servable.
    pub fn new(
        definitions: Vec<FlowDefinition>,
        executors: Arc<ExecutorRegistry>,
        store: Arc<InMemorySessionStore>,
    ) -> ThunderResult<Self> {
        let mut map = HashMap::new();
        for definition in definitions {
            validate_flow_definition(&definition)?;
            map.insert(definition.handle.clone(), definition);
        }
        Ok(Self {
            definitions: map,
            executors,
            store,
        })
    }

    pub async fn start(
        &self,
        flow_handle: &str,
        application_id: &str,
        organization_unit_id: Option<String>,
        initial_inputs: BTreeMap<String, Value>,
    ) -> ThunderResult<FlowStep> {
        let definition = self
            .definitions
            .get(flow_handle)
            .ok_or_else(|| ThunderError::resource_not_found(format!("no flow definition named {flow_handle}")))?;
        let start_id = definition
            .start_node_id()
            .ok_or_else(|| ThunderError::internal("validated flow has no START node"))?
            .clone();

        let mut session = FlowSession::new(
            flow_handle,
            definition.flow_type,
            start_id,
            application_id,
            organization_unit_id,
        );
        session.merge_context(initial_inputs, &[]);

        let flow_id = self.store.create(session);
        let mut guard = self.store.acquire(flow_id).await?;
        self.advance(&mut guard, None).await
    }

    pub async fn continue_flow(
        &self,
        flow_id: Uuid,
        inputs: BTreeMap<String, Value>,
        action_ref: Option<String>,
    ) -> ThunderResult<FlowStep> {
        let mut guard = self.store.acquire(flow_id).await?;

        let now = chrono::Utc::now();
        if guard.is_expired(now) {
            drop(guard);
            self.store.delete(flow_id);
            return Err(ThunderError::flow_expired(flow_id));
        }
        guard.touch(now);

        let sensitive = self.sensitive_prompt_inputs(&guard, &inputs);
        guard.merge_context(inputs, &sensitive);
        guard.suspension = None;

        self.advance(&mut guard, action_ref.as_deref()).await
    }

    /// The main state-machine loop (§4.4 state table). Runs until the
    /// session suspends (awaiting prompt input, a redirect) or terminates
    /// (`END`, or `FAILED` with no `on_failure`).
    async fn advance(&self, session: &mut FlowSession, action_ref: Option<&str>) -> ThunderResult<FlowStep> {
        let mut action_ref = action_ref.map(str::to_string);
        loop {
            let node_id = session.current_node_id.clone();
            let visits = session.record_visit(&node_id);
            if visits > thunder_model::MAX_NODE_VISITS {
                return Err(ThunderError::flow_loop_detected(node_id));
            }

            let definition = self
                .definitions
                .get(&session.flow_handle)
                .ok_or_else(|| ThunderError::resource_not_found(format!("no flow definition named {}", session.flow_handle)))?;
            let node = definition
                .node(&node_id)
                .ok_or_else(|| ThunderError::internal(format!("node {node_id} missing from flow {}", session.flow_handle)))?
                .clone();

            match node {
                Node::Start { on_success } => {
                    session.current_node_id = on_success;
                }
                Node::Prompt { prompts } => {
                    let Some(prompt) = select_prompt(&prompts, action_ref.as_deref()) else {
                        return Err(ThunderError::invalid_request("unknown action_ref for prompt node"));
                    };
                    let missing = missing_inputs(prompt, &session.context);
                    if !missing.is_empty() {
                        session.suspension = Some(Suspension {
                            kind: SuspensionKind::Prompt,
                            data: serde_json::Value::Null,
                        });
                        return Ok(FlowStep::incomplete(session.flow_id, missing));
                    }

                    let action = match action_ref.as_deref() {
                        Some(action_ref) => prompt
                            .find_action(action_ref)
                            .ok_or_else(|| ThunderError::invalid_request("unknown action_ref"))?,
                        None if prompt.actions.len() == 1 => &prompt.actions[0],
                        None => return Err(ThunderError::invalid_request("action_ref required to disambiguate prompt actions")),
                    };
                    session.current_node_id = action.next_node.clone();
                    session.suspension = None;
                }
                Node::TaskExecution {
                    executor,
                    properties,
                    on_success,
                    on_incomplete,
                    on_failure,
                } => {
                    let executor_impl = self.executors.get(&executor.name)?;
                    let ctx = ExecutorContext::new(
                        executor.mode.clone(),
                        session.context.clone(),
                        &properties,
                        node_id.clone(),
                        session.application_id.clone(),
                        session.organization_unit_id.clone(),
                    );
                    let result = executor_impl.execute(ctx).await?;

                    match result.status.unwrap_or(ExecutorStatus::Complete) {
                        ExecutorStatus::Complete => {
                            session.merge_context(result.outputs, &result.sensitive_outputs);
                            session.erase_sensitive();
                            session.current_node_id = on_success;
                            session.suspension = None;
                        }
                        ExecutorStatus::Incomplete => {
                            session.merge_context(result.outputs, &result.sensitive_outputs);
                            session.current_node_id = on_incomplete.unwrap_or_else(|| node_id.clone());
                            session.suspension = Some(Suspension {
                                kind: SuspensionKind::Prompt,
                                data: serde_json::Value::Null,
                            });
                            return Ok(FlowStep::incomplete(session.flow_id, result.next_inputs.unwrap_or_default()));
                        }
                        ExecutorStatus::Redirect => {
                            session.merge_context(result.outputs, &result.sensitive_outputs);
                            session.suspension = Some(Suspension {
                                kind: SuspensionKind::Redirect,
                                data: serde_json::Value::Null,
                            });
                            return Ok(FlowStep::redirection(session.flow_id, result.redirect_url.unwrap_or_default()));
                        }
                        ExecutorStatus::Failed => {
                            session.merge_context(result.outputs, &result.sensitive_outputs);
                            if let Some(on_failure) = on_failure {
                                session.current_node_id = on_failure;
                                session.suspension = None;
                            } else {
                                let reason = result.failure.unwrap_or(FailureReason {
                                    code: "InternalError".to_string(),
                                    description: "executor failed without a reason".to_string(),
                                });
                                return Ok(FlowStep::failed(session.flow_id, reason));
                            }
                        }
                    }
                }
                Node::End => {
                    let assertion = session.context.get("assertion").and_then(Value::as_str).map(str::to_string);
                    return Ok(FlowStep::complete(session.flow_id, assertion));
                }
            }

            // action_ref only disambiguates the first prompt encountered on
            // resume; subsequent loop iterations re-enter fresh nodes.
            action_ref = None;
        }
    }

    fn sensitive_prompt_inputs(&self, session: &FlowSession, inputs: &BTreeMap<String, Value>) -> Vec<String> {
        let Some(definition) = self.definitions.get(&session.flow_handle) else {
            return Vec::new();
        };
        let Some(Node::Prompt { prompts }) = definition.node(&session.current_node_id) else {
            return Vec::new();
        };
        prompts
            .iter()
            .flat_map(|p| &p.inputs)
            .filter(|decl| decl.r#type.is_sensitive() && inputs.contains_key(&decl.identifier))
            .map(|decl| decl.identifier.clone())
            .collect()
    }
}

fn select_prompt<'a>(prompts: &'a [Prompt], action_ref: Option<&str>) -> Option<&'a Prompt> {
    match action_ref {
        Some(action_ref) => prompts
            .iter()
            .find(|p| p.find_action(action_ref).is_some())
            .or_else(|| prompts.first()),
        None => prompts.first(),
    }
}

fn missing_inputs(prompt: &Prompt, context: &BTreeMap<String, Value>) -> Vec<InputDecl> {
    prompt
        .inputs
        .iter()
        .filter(|decl| decl.required && !context.contains_key(&decl.identifier))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use thunder_executor::Executor;
    use thunder_model::{ExecutorRef, ExecutorResult, FlowStatus, FlowType, InputType, PromptAction};

    /// Stands in for the Credentials executor (§4.3): succeeds for any
    /// non-empty username/password pair and writes `userId`.
    struct FakeCredentials;

    #[async_trait]
    impl Executor for FakeCredentials {
        fn name(&self) -> &str {
            "Credentials"
        }

        async fn execute(&self, ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
            match (ctx.context.get_str("username"), ctx.context.get_str("password")) {
                (Some(_), Some(_)) => {
                    let mut outputs = BTreeMap::new();
                    outputs.insert("userId".to_string(), Value::String("U".to_string()));
                    Ok(ExecutorResult::complete(outputs))
                }
                _ => Ok(ExecutorResult::failed("EmptyAttributesOrCredentials", "missing credentials")),
            }
        }
    }

    /// Stands in for AuthAssert (§4.3): writes a dummy assertion string
    /// rather than a real signed JWT, to keep these tests crypto-free.
    struct FakeAuthAssert;

    #[async_trait]
    impl Executor for FakeAuthAssert {
        fn name(&self) -> &str {
            "AuthAssert"
        }

        async fn execute(&self, ctx: ExecutorContext) -> ThunderResult<ExecutorResult> {
            let user_id = ctx.context.get_str("userId").unwrap_or_default();
            let mut outputs = BTreeMap::new();
            outputs.insert(
                "assertion".to_string(),
                Value::String(format!("assertion-for-{user_id}-aud-{}", ctx.application_id)),
            );
            Ok(ExecutorResult::complete(outputs))
        }
    }

    fn credentials_flow() -> FlowDefinition {
        let mut nodes = BTreeMap::new();
        nodes.insert("start".to_string(), Node::Start { on_success: "prompt".to_string() });
        nodes.insert(
            "prompt".to_string(),
            Node::Prompt {
                prompts: vec![Prompt {
                    inputs: vec![
                        InputDecl {
                            r#ref: "username".into(),
                            identifier: "username".into(),
                            r#type: InputType::TextInput,
                            required: true,
                            options: None,
                        },
                        InputDecl {
                            r#ref: "password".into(),
                            identifier: "password".into(),
                            r#type: InputType::PasswordInput,
                            required: true,
                            options: None,
                        },
                    ],
                    actions: vec![PromptAction { r#ref: "submit".into(), next_node: "credentials".into() }],
                    meta_components: None,
                }],
            },
        );
        nodes.insert(
            "credentials".to_string(),
            Node::TaskExecution {
                executor: ExecutorRef { name: "Credentials".into(), mode: None },
                properties: BTreeMap::new(),
                on_success: "assert".to_string(),
                on_incomplete: None,
                on_failure: None,
            },
        );
        nodes.insert(
            "assert".to_string(),
            Node::TaskExecution {
                executor: ExecutorRef { name: "AuthAssert".into(), mode: None },
                properties: BTreeMap::new(),
                on_success: "end".to_string(),
                on_incomplete: None,
                on_failure: None,
            },
        );
        nodes.insert("end".to_string(), Node::End);

        FlowDefinition {
            handle: "login".to_string(),
            flow_type: FlowType::Authentication,
            nodes,
        }
    }

    /// Same as `credentials_flow` but with a second PROMPT(username,
    /// password) re-inserted between Credentials and AuthAssert, matching
    /// the sensitive-input-cleanup scenario (§8 S2).
    fn credentials_flow_with_reprompt() -> FlowDefinition {
        let mut def = credentials_flow();
        def.nodes.insert(
            "credentials".to_string(),
            Node::TaskExecution {
                executor: ExecutorRef { name: "Credentials".into(), mode: None },
                properties: BTreeMap::new(),
                on_success: "reprompt".to_string(),
                on_incomplete: None,
                on_failure: None,
            },
        );
        def.nodes.insert(
            "reprompt".to_string(),
            Node::Prompt {
                prompts: vec![Prompt {
                    inputs: vec![
                        InputDecl {
                            r#ref: "username".into(),
                            identifier: "username".into(),
                            r#type: InputType::TextInput,
                            required: true,
                            options: None,
                        },
                        InputDecl {
                            r#ref: "password".into(),
                            identifier: "password".into(),
                            r#type: InputType::PasswordInput,
                            required: true,
                            options: None,
                        },
                    ],
                    actions: vec![PromptAction { r#ref: "submit".into(), next_node: "assert".into() }],
                    meta_components: None,
                }],
            },
        );
        def
    }

    fn build_engine(definition: FlowDefinition) -> FlowEngine {
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(FakeCredentials));
        registry.register(Arc::new(FakeAuthAssert));
        FlowEngine::new(vec![definition], Arc::new(registry), Arc::new(InMemorySessionStore::new())).unwrap()
    }

    #[tokio::test]
    async fn s1_credentials_happy_path() {
        let engine = build_engine(credentials_flow());

        let first = engine.start("login", "app-1", None, BTreeMap::new()).await.unwrap();
        assert_eq!(first.flow_status, FlowStatus::Incomplete);
        assert_eq!(first.data.inputs.unwrap().len(), 2);

        let mut inputs = BTreeMap::new();
        inputs.insert("username".to_string(), Value::String("u1".into()));
        inputs.insert("password".to_string(), Value::String("p1".into()));
        let final_step = engine
            .continue_flow(first.flow_id, inputs, Some("submit".to_string()))
            .await
            .unwrap();

        assert_eq!(final_step.flow_status, FlowStatus::Complete);
        let assertion = final_step.assertion.unwrap();
        assert!(assertion.contains("U"));
        assert!(assertion.contains("app-1"));
    }

    #[tokio::test]
    async fn s2_sensitive_input_cleanup() {
        let engine = build_engine(credentials_flow_with_reprompt());

        let first = engine.start("login", "app-1", None, BTreeMap::new()).await.unwrap();
        let mut inputs = BTreeMap::new();
        inputs.insert("username".to_string(), Value::String("u1".into()));
        inputs.insert("password".to_string(), Value::String("p1".into()));
        let second = engine
            .continue_flow(first.flow_id, inputs, Some("submit".to_string()))
            .await
            .unwrap();

        assert_eq!(second.flow_status, FlowStatus::Incomplete);
        let missing: Vec<String> = second.data.inputs.unwrap().into_iter().map(|d| d.identifier).collect();
        assert!(missing.contains(&"password".to_string()));
        assert!(!missing.contains(&"username".to_string()));
    }

    #[tokio::test]
    async fn unknown_action_ref_is_invalid_request() {
        let engine = build_engine(credentials_flow());
        let first = engine.start("login", "app-1", None, BTreeMap::new()).await.unwrap();

        let mut inputs = BTreeMap::new();
        inputs.insert("username".to_string(), Value::String("u1".into()));
        inputs.insert("password".to_string(), Value::String("p1".into()));
        let result = engine.continue_flow(first.flow_id, inputs, Some("bogus".to_string())).await;
        assert!(result.is_err());
    }
}
