// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller-agent input provider
//!
//! In autonomous mode the controller agent produces the next instruction
//! instead of the user: its session is resumed with the last step's output
//! and its reply (minus any trailing directive block) becomes the input.

use super::{InputContext, InputError, InputProvider, InputResult, InputSource};
use crate::directive_eval::{strip_trailing_block, trailing_directive};
use crate::emitter::Emitter;
use crate::error::StepError;
use crate::monitor::{AgentMonitor, RegisterAgent};
use cm_adapters::{AbortHandle, AbortSignal, EngineRegistry, RunCallbacks, RunRequest};
use cm_core::{AgentStatus, Directive, MonitoringId, SessionId, Telemetry};
use cm_manifest::{AgentDefinition, ControllerOptions};
use cm_storage::{AgentLogger, ControllerConfig, StepIndexManager};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;

/// The controller's conversation: one monitor entry, one engine session,
/// resumed turn by turn. Shared by the controller view and the controller
/// input provider.
pub struct ControllerSession {
    registry: Arc<EngineRegistry>,
    monitor: Arc<AgentMonitor>,
    logger: Arc<AgentLogger>,
    step_index: Arc<StepIndexManager>,
    emitter: Emitter,
    agent: AgentDefinition,
    options: ControllerOptions,
    working_dir: PathBuf,
}

impl ControllerSession {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<EngineRegistry>,
        monitor: Arc<AgentMonitor>,
        logger: Arc<AgentLogger>,
        step_index: Arc<StepIndexManager>,
        emitter: Emitter,
        agent: AgentDefinition,
        options: ControllerOptions,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            registry,
            monitor,
            logger,
            step_index,
            emitter,
            agent,
            options,
            working_dir,
        }
    }

    pub fn agent(&self) -> &AgentDefinition {
        &self.agent
    }

    fn persisted(&self) -> Option<ControllerConfig> {
        self.step_index.controller_config()
    }

    /// Whether a controller session already exists on disk.
    pub fn is_initialized(&self) -> bool {
        self.persisted()
            .is_some_and(|config| !config.session_id.is_empty())
    }

    /// Run one controller turn: open the session on the first call, resume
    /// it afterwards. Returns the controller's reply text.
    pub async fn send(&self, prompt: &str, abort: AbortSignal) -> Result<String, StepError> {
        let engine_id = self
            .options
            .engine
            .clone()
            .or_else(|| self.agent.engine.clone());
        let engine = self.registry.resolve(engine_id.as_ref())?;
        let model = self
            .options
            .model
            .clone()
            .or_else(|| self.agent.model.clone())
            .unwrap_or_else(|| engine.metadata().default_model.to_string());

        let persisted = self.persisted();
        let (monitoring_id, resume_session) = match &persisted {
            Some(config) if !config.session_id.is_empty() => {
                let id = MonitoringId(config.monitoring_id);
                self.monitor.mark_running(id);
                (id, Some(SessionId::new(config.session_id.clone())))
            }
            _ => {
                let id = self.monitor.register(RegisterAgent {
                    name: self.agent.name.clone(),
                    prompt: prompt.to_string(),
                    parent: None,
                    engine: engine.metadata().id.clone(),
                    model: model.clone(),
                });
                let log_path = self.logger.open(id, &self.agent.name)?;
                self.monitor.set_log_path(id, log_path.clone());
                tracing::debug!(%id, log = %log_path.display(), "controller session opened");
                self.logger.store_full_prompt(id, prompt)?;
                (id, None)
            }
        };
        self.emitter.controller_status(AgentStatus::Running);

        let mut request = RunRequest::new(prompt, &self.working_dir);
        request.model = model;
        request.reasoning_effort = self.agent.model_reasoning_effort;
        request.resume_session = resume_session;
        request.abort = abort;

        let logger = Arc::clone(&self.logger);
        let monitor = Arc::clone(&self.monitor);
        let emitter = self.emitter.clone();
        let step_index = Arc::clone(&self.step_index);
        let agent_id = self.agent.id.clone();

        let mut on_line = |line: &str| {
            let _ = logger.write(monitoring_id, line);
            emitter.message_log(monitoring_id, line);
        };
        let mut on_error_line = |line: &str| {
            let _ = logger.write(monitoring_id, line);
        };
        let mut on_telemetry = |telemetry: &Telemetry| {
            monitor.update_telemetry(monitoring_id, telemetry);
            emitter.agent_telemetry(monitoring_id, telemetry);
        };
        let mut on_session_id = |session: &SessionId| {
            monitor.set_session_id(monitoring_id, session);
            let _ = step_index.set_controller_config(ControllerConfig {
                agent_id: agent_id.clone(),
                session_id: session.to_string(),
                monitoring_id: monitoring_id.as_u64(),
            });
            emitter.controller_info(&agent_id, Some(session));
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
                self.emitter.controller_status(AgentStatus::Completed);
                Ok(output.final_text)
            }
            Err(error) => {
                if self.monitor.mark_paused(monitoring_id) {
                    self.emitter.controller_status(AgentStatus::Paused);
                } else {
                    self.monitor
                        .fail(monitoring_id, &error.to_string(), error.is_abort());
                    self.emitter.controller_status(AgentStatus::Failed);
                }
                Err(error.into())
            }
        }
    }
}

/// [`InputProvider`] backed by the controller session.
pub struct ControllerInputProvider {
    session: Arc<ControllerSession>,
    pending: Mutex<Option<AbortHandle>>,
}

impl ControllerInputProvider {
    pub fn new(session: Arc<ControllerSession>) -> Self {
        Self {
            session,
            pending: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl InputProvider for ControllerInputProvider {
    fn id(&self) -> &str {
        "controller"
    }

    async fn get_input(&self, ctx: InputContext<'_>) -> Result<InputResult, InputError> {
        let handle = AbortHandle::new();
        let signal = handle.signal();
        *self.pending.lock() = Some(handle);

        let turn = match ctx.step_output {
            Some(output) if !output.trim().is_empty() => format!(
                "The step `{}` finished with this output:\n\n{}\n\n\
                 Reply with the next instruction for the workflow, or an empty reply to advance.",
                ctx.unique_agent_id, output
            ),
            _ => format!(
                "Step `{}` finished. Reply with the next instruction for the workflow, \
                 or an empty reply to advance.",
                ctx.unique_agent_id
            ),
        };

        let reply = self
            .session
            .send(&turn, signal)
            .await
            .map_err(|e| match e {
                StepError::Engine(ref engine) if engine.is_abort() => InputError::Aborted,
                other => InputError::Controller(other.to_string()),
            })?;

        *self.pending.lock() = None;

        // The controller steers through the same directive grammar.
        match trailing_directive(&reply) {
            Some(Directive::Stop { .. }) | Some(Directive::Error { .. }) => {
                return Ok(InputResult::Stop)
            }
            Some(Directive::Pause { .. }) => return Ok(InputResult::Skip),
            _ => {}
        }

        Ok(InputResult::Input {
            value: strip_trailing_block(&reply).trim().to_string(),
            resume_monitoring_id: None,
            source: InputSource::Controller,
        })
    }

    fn abort(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }
}
