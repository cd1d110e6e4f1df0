// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step runner: executes one module step end-to-end
//!
//! Loads agent config and prompt, resolves engine and model, opens the
//! monitor entry and log, drives the engine adapter, captures the trailing
//! directive, and translates failures into monitor state. Also owns the
//! sub-agent entry used by triggered and fallback agents.

use crate::directive_eval::read_directive;
use crate::emitter::Emitter;
use crate::error::StepError;
use crate::monitor::{AgentMonitor, RegisterAgent};
use crate::placeholder::PlaceholderProcessor;
use cm_adapters::{
    env::imports_dir, AbortSignal, EngineAdapter, EngineOutput, EngineRegistry, RunCallbacks,
    RunRequest,
};
use cm_core::{unique_agent_id, AgentStatus, Directive, MonitoringId, SessionId, Telemetry};
use cm_manifest::{AgentDefinition, ModuleStep, PromptPath};
use cm_storage::{AgentLogger, StepIndexManager};
use std::path::PathBuf;
use std::sync::Arc;

/// Fallback steering prompt for a resume round with no user text.
const CONTINUE_PROMPT: &str = "Continue from where you left off.";

/// Result of one step run (or resume round).
#[derive(Debug)]
pub struct StepOutcome {
    pub output: String,
    pub monitoring_id: MonitoringId,
    pub session_id: Option<SessionId>,
    pub directive: Option<Directive>,
}

/// Result of a triggered or fallback sub-agent run.
#[derive(Debug)]
pub struct SubAgentOutcome {
    pub output: String,
    pub monitoring_id: MonitoringId,
}

/// Executes module steps and sub-agents.
pub struct StepRunner {
    registry: Arc<EngineRegistry>,
    monitor: Arc<AgentMonitor>,
    logger: Arc<AgentLogger>,
    placeholders: Arc<PlaceholderProcessor>,
    step_index: Arc<StepIndexManager>,
    emitter: Emitter,
    working_dir: PathBuf,
}

impl StepRunner {
    pub fn new(
        registry: Arc<EngineRegistry>,
        monitor: Arc<AgentMonitor>,
        logger: Arc<AgentLogger>,
        placeholders: Arc<PlaceholderProcessor>,
        step_index: Arc<StepIndexManager>,
        emitter: Emitter,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            monitor,
            logger,
            placeholders,
            step_index,
            emitter,
            working_dir,
        }
    }

    /// Run one module step from the top.
    pub async fn run_step(
        &self,
        step_index: usize,
        module: &ModuleStep,
        agent: &AgentDefinition,
        abort: AbortSignal,
    ) -> Result<StepOutcome, StepError> {
        let unique_id = unique_agent_id(&agent.id, step_index);
        self.step_index.step_started(step_index)?;

        let engine = self.resolve_engine(module, agent)?;
        let model = self.resolve_model(module, agent, engine.as_ref());

        let prompt_path = module.prompt_path.as_ref().unwrap_or(&agent.prompt_path);
        let prompt = self.load_prompt(prompt_path).await?;
        let prompt = self.placeholders.process(&prompt).await?;

        let monitoring_id = self.monitor.register(RegisterAgent {
            name: agent.name.clone(),
            prompt: prompt.clone(),
            parent: None,
            engine: engine.metadata().id.clone(),
            model: model.clone(),
        });
        // Propagate the id immediately so log streaming can start.
        self.emitter.monitor_register(monitoring_id, &unique_id);
        self.emitter.agent_added(
            monitoring_id,
            &agent.name,
            None,
            &engine.metadata().id,
            &model,
        );

        let log_path = self.logger.open(monitoring_id, &agent.name)?;
        self.monitor.set_log_path(monitoring_id, log_path);
        self.logger.store_full_prompt(monitoring_id, &prompt)?;

        let mut request = RunRequest::new(prompt, &self.working_dir);
        request.model = model;
        request.reasoning_effort = agent
            .model_reasoning_effort
            .or(engine.metadata().default_reasoning_effort);
        request.abort = abort;

        let output = self
            .drive_engine(engine, monitoring_id, request, Some(step_index))
            .await?;

        let directive = read_directive(&self.working_dir, &output.final_text);
        Ok(StepOutcome {
            output: output.final_text,
            monitoring_id,
            session_id: output.session_id,
            directive,
        })
    }

    /// Resume a step's session with a new user turn.
    pub async fn resume_step(
        &self,
        step_index: usize,
        module: &ModuleStep,
        agent: &AgentDefinition,
        monitoring_id: MonitoringId,
        session_id: SessionId,
        user_prompt: &str,
        abort: AbortSignal,
    ) -> Result<StepOutcome, StepError> {
        let engine = self.resolve_engine(module, agent)?;
        let model = self.resolve_model(module, agent, engine.as_ref());

        let steering = if user_prompt.trim().is_empty() {
            CONTINUE_PROMPT.to_string()
        } else {
            user_prompt.to_string()
        };
        let steering = self.placeholders.process(&steering).await?;

        self.monitor.mark_running(monitoring_id);
        self.emitter
            .agent_status(monitoring_id, AgentStatus::Running);
        self.logger
            .write(monitoring_id, &format!("=== user ===\n{steering}"))?;

        let mut request = RunRequest::new(steering, &self.working_dir);
        request.model = model;
        request.reasoning_effort = agent
            .model_reasoning_effort
            .or(engine.metadata().default_reasoning_effort);
        request.resume_session = Some(session_id.clone());
        request.abort = abort;

        let output = self
            .drive_engine(engine, monitoring_id, request, Some(step_index))
            .await?;

        // Some engines mint a fresh session id on resume; keep tracking in
        // step with whatever the stream reported last.
        let session_id = output.session_id.clone().or(Some(session_id));
        if let Some(session) = &session_id {
            self.step_index
                .update_step_session(step_index, session, monitoring_id)?;
        }

        let directive = read_directive(&self.working_dir, &output.final_text);
        Ok(StepOutcome {
            output: output.final_text,
            monitoring_id,
            session_id,
            directive,
        })
    }

    /// Run a triggered or fallback agent as a child of `parent`.
    ///
    /// Follows the same rules as a step run but under a parent monitoring
    /// id and without ever touching `template.json`.
    pub async fn execute_sub_agent(
        &self,
        parent: Option<MonitoringId>,
        agent: &AgentDefinition,
        triggered: bool,
        abort: AbortSignal,
    ) -> Result<SubAgentOutcome, StepError> {
        let engine = self.registry.resolve(agent.engine.as_ref())?;
        let model = agent
            .model
            .clone()
            .unwrap_or_else(|| engine.metadata().default_model.to_string());

        let prompt = self.load_prompt(&agent.prompt_path).await?;
        let prompt = self.placeholders.process(&prompt).await?;

        let monitoring_id = self.monitor.register(RegisterAgent {
            name: agent.name.clone(),
            prompt: prompt.clone(),
            parent,
            engine: engine.metadata().id.clone(),
            model: model.clone(),
        });
        match parent {
            Some(parent) if triggered => {
                self.emitter.triggered_added(monitoring_id, parent, &agent.id)
            }
            Some(parent) => self.emitter.subagent_added(monitoring_id, parent),
            None => {}
        }

        let log_path = self.logger.open(monitoring_id, &agent.name)?;
        self.monitor.set_log_path(monitoring_id, log_path);
        self.logger.store_full_prompt(monitoring_id, &prompt)?;

        let mut request = RunRequest::new(prompt, &self.working_dir);
        request.model = model;
        request.reasoning_effort = agent
            .model_reasoning_effort
            .or(engine.metadata().default_reasoning_effort);
        request.abort = abort;

        let output = self.drive_engine(engine, monitoring_id, request, None).await?;
        Ok(SubAgentOutcome {
            output: output.final_text,
            monitoring_id,
        })
    }

    /// Wire callbacks, run the engine, and translate the outcome into
    /// monitor state. Never marks the record complete on a throw.
    async fn drive_engine(
        &self,
        engine: Arc<dyn EngineAdapter>,
        monitoring_id: MonitoringId,
        request: RunRequest,
        persist_session_for_step: Option<usize>,
    ) -> Result<EngineOutput, StepError> {
        let logger = Arc::clone(&self.logger);
        let monitor = Arc::clone(&self.monitor);
        let step_index = Arc::clone(&self.step_index);
        let emitter = self.emitter.clone();
        let emitter_telemetry = self.emitter.clone();
        let emitter_session = self.emitter.clone();
        let logger_err = Arc::clone(&self.logger);
        let monitor_telemetry = Arc::clone(&self.monitor);
        let monitor_session = Arc::clone(&self.monitor);

        let mut on_line = move |line: &str| {
            if let Err(error) = logger.write(monitoring_id, line) {
                tracing::warn!(%monitoring_id, %error, "agent log write failed");
            }
            emitter.message_log(monitoring_id, line);
        };
        let mut on_error_line = move |line: &str| {
            let _ = logger_err.write(monitoring_id, line);
        };
        let mut on_telemetry = move |telemetry: &Telemetry| {
            monitor_telemetry.update_telemetry(monitoring_id, telemetry);
            emitter_telemetry.agent_telemetry(monitoring_id, telemetry);
        };
        let mut on_session_id = move |session: &SessionId| {
            monitor_session.set_session_id(monitoring_id, session);
            if let Some(step) = persist_session_for_step {
                if let Err(error) = step_index.step_session_initialized(step, session, monitoring_id)
                {
                    tracing::warn!(%error, "failed to persist step session");
                }
            }
            emitter_session.agent_session(monitoring_id, session);
        };
        let mut callbacks = RunCallbacks {
            on_line: &mut on_line,
            on_error_line: &mut on_error_line,
            on_telemetry: &mut on_telemetry,
            on_session_id: &mut on_session_id,
        };

        match engine.run(request, &mut callbacks).await {
            Ok(output) => {
                self.monitor
                    .complete(monitoring_id, Some(&output.telemetry));
                self.emitter
                    .agent_status(monitoring_id, AgentStatus::Completed);
                Ok(output)
            }
            Err(error) => {
                // Pause when the session can be reopened later, else fail.
                if self.monitor.mark_paused(monitoring_id) {
                    self.emitter
                        .agent_status(monitoring_id, AgentStatus::Paused);
                } else {
                    self.monitor
                        .fail(monitoring_id, &error.to_string(), error.is_abort());
                    self.emitter
                        .agent_status(monitoring_id, AgentStatus::Failed);
                }
                Err(error.into())
            }
        }
    }

    fn resolve_engine(
        &self,
        module: &ModuleStep,
        agent: &AgentDefinition,
    ) -> Result<Arc<dyn EngineAdapter>, StepError> {
        let id = module.engine.as_ref().or(agent.engine.as_ref());
        Ok(self.registry.resolve(id)?)
    }

    fn resolve_model(
        &self,
        module: &ModuleStep,
        agent: &AgentDefinition,
        engine: &dyn EngineAdapter,
    ) -> String {
        module
            .model
            .clone()
            .or_else(|| agent.model.clone())
            .unwrap_or_else(|| engine.metadata().default_model.to_string())
    }

    /// Load and join the agent's prompt files with two blank lines.
    /// Paths resolve against the imports dir first, then the working dir.
    pub(crate) async fn load_prompt(&self, prompt_path: &PromptPath) -> Result<String, StepError> {
        let mut parts = Vec::new();
        for path in prompt_path.paths() {
            let resolved = if path.is_absolute() {
                path.clone()
            } else {
                let imported = imports_dir().map(|dir| dir.join(path));
                match imported {
                    Some(candidate) if candidate.exists() => candidate,
                    _ => self.working_dir.join(path),
                }
            };
            if !resolved.exists() {
                return Err(StepError::PromptNotFound(resolved));
            }
            parts.push(tokio::fs::read_to_string(&resolved).await?);
        }
        Ok(parts
            .iter()
            .map(|part| part.trim_end())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    /// Load one chained prompt's content, placeholder-processed.
    pub async fn load_chained_prompt(&self, path: &std::path::Path) -> Result<String, StepError> {
        let prompt = self
            .load_prompt(&PromptPath::Single(path.to_path_buf()))
            .await?;
        Ok(self.placeholders.process(&prompt).await?)
    }
}

#[cfg(test)]
#[path = "step_runner_tests.rs"]
mod tests;
