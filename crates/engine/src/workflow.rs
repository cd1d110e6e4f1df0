// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow engine: the top-level loop over steps
//!
//! Applies the resume decision, executes steps through the step runner,
//! drives the chained-prompt input loop, dispatches directives, manages
//! loop counters and skip lists, runs the controller view, and emits
//! lifecycle events. All waiting happens in three places: inside
//! `engine.run`, inside the active input provider, and inside the
//! checkpoint await.

use crate::bus::EventBus;
use crate::control::{CheckpointDecision, ControlChannel, ControlMessage};
use crate::emitter::Emitter;
use crate::error::{StepError, WorkflowError};
use crate::input::{
    ControllerInputProvider, ControllerSession, InputContext, InputError, InputProvider,
    InputResult, UserInputProvider, SWITCH_TO_AUTO,
};
use crate::mode::ModeManager;
use crate::monitor::AgentMonitor;
use crate::placeholder::PlaceholderProcessor;
use crate::signal::SignalManager;
use crate::step_runner::{StepOutcome, StepRunner};
use cm_adapters::{AbortSignal, EngineRegistry};
use cm_core::{
    AgentId, AutonomousMode, Directive, EventKind, MonitoringId, ViewName, WorkflowStatus,
};
use cm_manifest::{
    AgentDefinition, Manifest, ModuleStep, StepBehavior, WorkflowStep, WorkflowTemplate,
};
use cm_storage::{AgentLogger, ResumeDecision, ResumeInfo, StepIndexManager};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Completed,
    Stopped { reason: Option<String> },
    /// Exited early with resumable state on disk.
    Paused,
    Error { reason: String },
}

/// Everything the engine needs, built once at startup and passed
/// explicitly — no global mutable state.
pub struct EngineDeps {
    pub manifest: Arc<Manifest>,
    pub registry: Arc<EngineRegistry>,
    pub monitor: Arc<AgentMonitor>,
    pub logger: Arc<AgentLogger>,
    pub placeholders: Arc<PlaceholderProcessor>,
    pub step_index: Arc<StepIndexManager>,
    pub bus: Arc<EventBus>,
    pub control: ControlChannel,
    pub working_dir: PathBuf,
}

/// The record of an in-flight loop rewind.
struct ActiveLoop {
    source_agent: AgentId,
    source_step: usize,
    skip_list: Vec<AgentId>,
}

/// What the post-execution phase decided.
enum PostStep {
    Advance,
    /// Advance, skipping any remaining chained prompts (checkpoint).
    AdvanceSkipChains,
    Rewind(usize),
    Pause,
    Stop(Option<String>),
    Fail(String),
}

/// Top-level workflow execution.
pub struct WorkflowEngine {
    manifest: Arc<Manifest>,
    template: WorkflowTemplate,
    registry: Arc<EngineRegistry>,
    monitor: Arc<AgentMonitor>,
    logger: Arc<AgentLogger>,
    step_index: Arc<StepIndexManager>,
    emitter: Emitter,
    mode: Arc<ModeManager>,
    signals: Arc<SignalManager>,
    control: ControlChannel,
    runner: StepRunner,
    controller: Option<Arc<ControllerSession>>,
    working_dir: PathBuf,
}

impl WorkflowEngine {
    pub fn new(deps: EngineDeps, template: WorkflowTemplate) -> Arc<Self> {
        let emitter = Emitter::new(Arc::clone(&deps.bus));

        let controller = template.controller.as_ref().and_then(|decl| {
            let agent = deps.manifest.get_agent(&decl.agent_id)?.clone();
            Some(Arc::new(ControllerSession::new(
                Arc::clone(&deps.registry),
                Arc::clone(&deps.monitor),
                Arc::clone(&deps.logger),
                Arc::clone(&deps.step_index),
                emitter.clone(),
                agent,
                decl.options.clone(),
                deps.working_dir.clone(),
            )))
        });

        let user: Arc<dyn InputProvider> = Arc::new(UserInputProvider::new(
            deps.control.clone(),
            emitter.clone(),
        ));
        let controller_provider: Arc<dyn InputProvider> = match &controller {
            Some(session) => Arc::new(ControllerInputProvider::new(Arc::clone(session))),
            // Without a controller declaration auto mode degenerates to the
            // user provider.
            None => Arc::clone(&user),
        };

        let persisted_mode = deps.step_index.autonomous_mode();
        let initial_mode = match persisted_mode {
            AutonomousMode::False => template.autonomous_mode.unwrap_or(persisted_mode),
            _ => persisted_mode,
        };
        let mode = Arc::new(ModeManager::new(
            user,
            controller_provider,
            emitter.clone(),
            initial_mode.starts_auto(),
        ));

        let signals = Arc::new(SignalManager::new(
            Arc::clone(&mode),
            Arc::clone(&deps.monitor),
            emitter.clone(),
        ));
        signals.spawn_dispatcher(&deps.control);
        // The runner announces each new monitoring id on the bus; the
        // signal manager needs it to pause the right agent.
        {
            let signals = Arc::clone(&signals);
            deps.bus.on(EventKind::MonitorRegister, move |event| {
                if let cm_core::Event::MonitorRegister { id, .. } = event {
                    signals.set_active_monitoring(*id);
                }
            });
        }

        let runner = StepRunner::new(
            Arc::clone(&deps.registry),
            Arc::clone(&deps.monitor),
            Arc::clone(&deps.logger),
            Arc::clone(&deps.placeholders),
            Arc::clone(&deps.step_index),
            emitter.clone(),
            deps.working_dir.clone(),
        );

        Arc::new(Self {
            manifest: deps.manifest,
            template,
            registry: deps.registry,
            monitor: deps.monitor,
            logger: deps.logger,
            step_index: deps.step_index,
            emitter,
            mode,
            signals,
            control: deps.control,
            runner,
            controller,
            working_dir: deps.working_dir,
        })
    }

    pub fn signals(&self) -> &Arc<SignalManager> {
        &self.signals
    }

    pub fn mode(&self) -> &Arc<ModeManager> {
        &self.mode
    }

    /// Run the workflow to an outcome.
    pub async fn run(&self) -> Result<WorkflowOutcome, WorkflowError> {
        let configured_engines = self.setup_mcp();

        self.emitter.workflow_started(&self.template.name);
        self.emitter.workflow_status(WorkflowStatus::Running);

        if let Some(controller) = &self.controller {
            if !controller.is_initialized() {
                if let Err(error) = self.run_controller_view(Arc::clone(controller)).await {
                    tracing::warn!(%error, "controller view failed, continuing without it");
                }
            }
        }

        let outcome = self.run_steps().await;

        self.cleanup_mcp(&configured_engines);

        let outcome = outcome?;
        let status = match &outcome {
            WorkflowOutcome::Completed => WorkflowStatus::Completed,
            WorkflowOutcome::Stopped { .. } | WorkflowOutcome::Paused => WorkflowStatus::Stopped,
            WorkflowOutcome::Error { .. } => WorkflowStatus::Error,
        };
        self.emitter.workflow_status(status);
        Ok(outcome)
    }

    async fn run_steps(&self) -> Result<WorkflowOutcome, WorkflowError> {
        let steps = &self.template.steps;
        let resume = self.step_index.get_resume_info();
        let mut index = resume.start_index.min(steps.len());
        let mut pending_resume = match resume.decision {
            ResumeDecision::ResumeFromChain | ResumeDecision::ResumeFromCrash => Some(resume),
            _ => None,
        };
        let mut active_loop: Option<ActiveLoop> = None;
        let mut loop_counters: HashMap<String, u32> = HashMap::new();

        while index < steps.len() {
            let module = match &steps[index] {
                WorkflowStep::Ui(ui) => {
                    self.emitter.ui_element(index, &ui.label);
                    index += 1;
                    continue;
                }
                WorkflowStep::Module(module) => module,
            };
            let Some(agent) = self.manifest.get_agent(&module.agent) else {
                let reason = format!("step {index} references unknown agent '{}'", module.agent);
                self.emitter.workflow_error(&reason);
                return Ok(WorkflowOutcome::Error { reason });
            };

            // Loop skip list: bypass named agents during re-traversal.
            if let Some(active) = &active_loop {
                if active.skip_list.contains(&module.agent) {
                    self.emitter.step_skipped(index, &module.agent);
                    index += 1;
                    continue;
                }
            }

            // Completed execute-once steps never re-run.
            if module.execute_once && self.step_index.is_step_completed(index) {
                self.emitter.step_skipped(index, &module.agent);
                index += 1;
                continue;
            }

            // Fallback pre-pass for steps that started and never finished.
            if self.step_index.get_not_completed_steps().contains(&index) {
                let fallback_id = module
                    .not_completed_fallback
                    .as_ref()
                    .or(agent.not_completed_fallback.as_ref());
                if let Some(fallback_id) = fallback_id {
                    self.run_fallback(index, fallback_id).await;
                }
            }

            self.emitter.step_started(index, &module.agent);
            let abort = self
                .signals
                .begin_step(index, module.agent.clone(), &agent.name);

            let resume_for_step = pending_resume.take();
            let executed = self
                .execute_step(index, module, agent, resume_for_step, abort)
                .await;
            self.signals.end_step();

            let (outcome, mut queue_index) = match executed {
                Ok(value) => value,
                Err(error) if error.is_abort() => {
                    if self.signals.stop_requested() {
                        return Ok(WorkflowOutcome::Stopped {
                            reason: Some("stopped by user".to_string()),
                        });
                    }
                    if self.mode.is_paused() {
                        return Ok(WorkflowOutcome::Paused);
                    }
                    // Skip: move on without completing the step.
                    self.emitter.step_skipped(index, &module.agent);
                    index += 1;
                    continue;
                }
                Err(error) => {
                    let reason = error.to_string();
                    self.emitter.workflow_error(&reason);
                    return Ok(WorkflowOutcome::Error { reason });
                }
            };

            let queue = self.load_queue(agent).await?;
            let decision = self
                .post_execution(index, module, &outcome, &mut active_loop, &mut loop_counters)
                .await?;

            let decision = match decision {
                PostStep::Advance if !queue.is_empty() || queue_index > 0 => {
                    self.chained_input_loop(
                        index,
                        module,
                        agent,
                        &outcome,
                        &queue,
                        &mut queue_index,
                        &mut active_loop,
                        &mut loop_counters,
                    )
                    .await?
                }
                other => other,
            };

            match decision {
                PostStep::Advance | PostStep::AdvanceSkipChains => {
                    self.step_index.step_completed(index)?;
                    self.emitter.step_completed(index);
                    index += 1;
                }
                PostStep::Rewind(target) => {
                    index = target;
                }
                PostStep::Pause => return Ok(WorkflowOutcome::Paused),
                PostStep::Stop(reason) => {
                    self.emitter.workflow_stopped(reason.as_deref());
                    return Ok(WorkflowOutcome::Stopped { reason });
                }
                PostStep::Fail(reason) => {
                    return Ok(WorkflowOutcome::Error { reason });
                }
            }
        }

        Ok(WorkflowOutcome::Completed)
    }

    /// Run (or resume) the step itself. Returns the outcome plus the
    /// initial chain queue index.
    async fn execute_step(
        &self,
        index: usize,
        module: &ModuleStep,
        agent: &AgentDefinition,
        resume: Option<ResumeInfo>,
        abort: AbortSignal,
    ) -> Result<(StepOutcome, usize), StepError> {
        if let Some(resume) = resume {
            if resume.start_index == index {
                match (resume.decision, resume.session_id, resume.monitoring_id) {
                    (ResumeDecision::ResumeFromChain, Some(session), Some(monitoring_id)) => {
                        let chain_index = resume.chain_index.unwrap_or(0);
                        let queue = self.load_queue(agent).await?;
                        if let Some(prompt) = queue.get(chain_index) {
                            self.monitor_reattach(monitoring_id, agent);
                            let outcome = self
                                .runner
                                .resume_step(
                                    index,
                                    module,
                                    agent,
                                    monitoring_id,
                                    session,
                                    prompt,
                                    abort,
                                )
                                .await?;
                            self.step_index.chain_completed(index, chain_index)?;
                            return Ok((outcome, chain_index + 1));
                        }
                        // Saved chain index beyond the queue: fall through
                        // to a fresh run.
                    }
                    (ResumeDecision::ResumeFromCrash, Some(session), Some(monitoring_id)) => {
                        self.monitor_reattach(monitoring_id, agent);
                        let outcome = self
                            .runner
                            .resume_step(index, module, agent, monitoring_id, session, "", abort)
                            .await?;
                        return Ok((outcome, 0));
                    }
                    _ => {}
                }
            }
        }
        let outcome = self.runner.run_step(index, module, agent, abort).await?;
        Ok((outcome, 0))
    }

    /// After a crash the monitor is empty; recreate the record under its
    /// persisted id so resume rounds have something to transition, and
    /// open a fresh log segment for it.
    fn monitor_reattach(&self, monitoring_id: MonitoringId, agent: &AgentDefinition) {
        if self.monitor.get_agent(monitoring_id).is_some() {
            return;
        }
        self.monitor.reattach(
            monitoring_id,
            crate::monitor::RegisterAgent {
                name: agent.name.clone(),
                prompt: String::new(),
                parent: None,
                engine: agent
                    .engine
                    .clone()
                    .unwrap_or_else(|| self.registry.default_id().clone()),
                model: agent.model.clone().unwrap_or_default(),
            },
        );
        match self.logger.open(monitoring_id, &agent.name) {
            Ok(path) => self.monitor.set_log_path(monitoring_id, path),
            Err(error) => {
                tracing::warn!(%monitoring_id, %error, "could not reopen agent log after restart")
            }
        }
        tracing::debug!(%monitoring_id, "recreated monitor record after restart");
    }

    /// Post-execution order per step: error → trigger → bookkeeping →
    /// checkpoint → loop.
    async fn post_execution(
        &self,
        index: usize,
        module: &ModuleStep,
        outcome: &StepOutcome,
        active_loop: &mut Option<ActiveLoop>,
        loop_counters: &mut HashMap<String, u32>,
    ) -> Result<PostStep, WorkflowError> {
        let directive = outcome.directive.clone().unwrap_or(Directive::Continue);

        if let Directive::Error { reason } = &directive {
            self.emitter.workflow_error(reason);
            return Ok(PostStep::Fail(reason.clone()));
        }
        if let Directive::Stop { reason } = &directive {
            return Ok(PostStep::Stop(reason.clone()));
        }

        // Trigger runs as a child of the current step's agent and never
        // changes the main step's advancement.
        if let Directive::Trigger {
            trigger_agent_id,
            reason,
        } = &directive
        {
            self.run_triggered(outcome.monitoring_id, trigger_agent_id, reason.as_deref())
                .await;
        }

        // The step finished; it is no longer crash-recovery state.
        self.step_index.remove_from_not_completed(index)?;

        // A loop clears only when its own source step runs without
        // re-emitting loop.
        let re_looped = matches!(directive, Directive::Loop(_));
        if let Some(active) = active_loop.as_ref() {
            if active.source_step == index && !re_looped {
                tracing::debug!(agent = %active.source_agent, "loop converged");
                *active_loop = None;
                self.emitter.loop_cleared();
            }
        }

        if let Directive::Checkpoint { reason } = &directive {
            return self.await_checkpoint(index, reason.as_deref()).await;
        }

        if let Directive::Loop(request) = &directive {
            return Ok(self.apply_loop(index, module, request, active_loop, loop_counters));
        }

        if let Directive::Pause { reason } = &directive {
            tracing::info!(step = index, ?reason, "agent requested pause");
            if !self.monitor.mark_paused(outcome.monitoring_id) {
                self.monitor.fail(
                    outcome.monitoring_id,
                    "pause requested without a resumable session",
                    false,
                );
            }
            // Keep the step in crash-recovery state so the next invocation
            // resumes it.
            self.step_index.step_started(index)?;
            return Ok(PostStep::Pause);
        }

        Ok(PostStep::Advance)
    }

    async fn run_triggered(
        &self,
        parent: MonitoringId,
        trigger_agent_id: &AgentId,
        reason: Option<&str>,
    ) {
        let Some(agent) = self.manifest.get_agent(trigger_agent_id) else {
            tracing::warn!(agent = %trigger_agent_id, "trigger names an unknown agent, ignoring");
            return;
        };
        tracing::info!(agent = %trigger_agent_id, ?reason, "running triggered agent");
        let abort = self.signals.begin_step(usize::MAX, agent.id.clone(), &agent.name);
        let result = self
            .runner
            .execute_sub_agent(Some(parent), agent, true, abort)
            .await;
        self.signals.end_step();
        match result {
            Ok(_) => {}
            Err(error) if error.is_abort() => {
                tracing::info!(agent = %trigger_agent_id, "triggered agent skipped");
            }
            Err(error) => {
                tracing::warn!(agent = %trigger_agent_id, %error, "triggered agent failed");
            }
        }
    }

    async fn run_fallback(&self, index: usize, fallback_id: &AgentId) {
        let Some(agent) = self.manifest.get_agent(fallback_id) else {
            tracing::warn!(agent = %fallback_id, "fallback names an unknown agent, ignoring");
            return;
        };
        tracing::info!(step = index, agent = %fallback_id, "running not-completed fallback");
        let parent = self
            .step_index
            .get_step_data(index)
            .map(|data| data.monitoring())
            .filter(|id| id.as_u64() != 0);
        let abort = self.signals.begin_step(index, agent.id.clone(), &agent.name);
        let result = self.runner.execute_sub_agent(parent, agent, false, abort).await;
        self.signals.end_step();
        match result {
            Ok(_) => {
                if let Err(error) = self.step_index.remove_from_not_completed(index) {
                    tracing::warn!(%error, "failed to clear fallback step state");
                }
            }
            Err(error) => {
                tracing::warn!(step = index, %error, "fallback agent failed, running step anyway");
            }
        }
    }

    /// Wait for the single external continue/quit resolution. Unbounded by
    /// design.
    async fn await_checkpoint(
        &self,
        index: usize,
        reason: Option<&str>,
    ) -> Result<PostStep, WorkflowError> {
        // Subscribe before announcing the checkpoint so a prompt resolution
        // can never slip between the two.
        let mut rx = self.control.subscribe();
        self.emitter.checkpoint_state(index, reason);
        loop {
            match rx.recv().await {
                Ok(ControlMessage::CheckpointResolution { decision }) => {
                    self.emitter.checkpoint_cleared();
                    return Ok(match decision {
                        CheckpointDecision::Continue => PostStep::AdvanceSkipChains,
                        CheckpointDecision::Quit => {
                            PostStep::Stop(Some("stopped at checkpoint".to_string()))
                        }
                    });
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return Err(WorkflowError::InputClosed),
            }
        }
    }

    fn apply_loop(
        &self,
        index: usize,
        module: &ModuleStep,
        request: &cm_core::LoopDirective,
        active_loop: &mut Option<ActiveLoop>,
        loop_counters: &mut HashMap<String, u32>,
    ) -> PostStep {
        let counter_key = format!("{}:{}", module.agent, index);
        let iteration = {
            let counter = loop_counters.entry(counter_key).or_insert(0);
            *counter += 1;
            *counter
        };

        // The step's declared behavior caps iterations; the directive's
        // own cap applies only when the behavior gives none.
        let max_iterations = match module.behavior {
            Some(StepBehavior::Loop { max_iterations, .. }) => Some(max_iterations),
            _ => request.max_iterations,
        };
        if let Some(max) = max_iterations {
            if iteration > max {
                tracing::info!(step = index, iteration, max, "loop budget exhausted, advancing");
                *active_loop = None;
                self.emitter.loop_cleared();
                return PostStep::Advance;
            }
        }

        let target = index.saturating_sub(request.steps_back);
        *active_loop = Some(ActiveLoop {
            source_agent: module.agent.clone(),
            source_step: index,
            skip_list: request.skip_list.clone(),
        });
        self.emitter.loop_state(
            &module.agent,
            iteration,
            max_iterations,
            request.steps_back,
            request.reason.as_deref(),
        );

        // Wipe stale sub-agents of every step about to re-execute.
        for step in target..=index {
            if let Some(data) = self.step_index.get_step_data(step) {
                let monitoring = data.monitoring();
                if monitoring.as_u64() != 0 {
                    let cleared = self.monitor.clear_descendants(monitoring);
                    if cleared > 0 {
                        self.emitter.subagents_cleared(monitoring);
                    }
                    self.emitter.agent_reset(monitoring);
                }
            }
        }

        PostStep::Rewind(target)
    }

    /// The chained-prompt input loop of one step.
    #[allow(clippy::too_many_arguments)]
    async fn chained_input_loop(
        &self,
        index: usize,
        module: &ModuleStep,
        agent: &AgentDefinition,
        first_outcome: &StepOutcome,
        queue: &[String],
        queue_index: &mut usize,
        active_loop: &mut Option<ActiveLoop>,
        loop_counters: &mut HashMap<String, u32>,
    ) -> Result<PostStep, WorkflowError> {
        let unique_id = cm_core::unique_agent_id(&agent.id, index);
        let mut last_output = first_outcome.output.clone();
        let mut session_id = first_outcome.session_id.clone();
        let mut monitoring_id = first_outcome.monitoring_id;

        loop {
            let provider = self.mode.active_provider();
            let ctx = InputContext {
                step_index: index,
                unique_agent_id: &unique_id,
                step_output: Some(&last_output),
                queue,
                queue_index: *queue_index,
                working_dir: &self.working_dir,
            };
            let input = match provider.get_input(ctx).await {
                Ok(input) => input,
                Err(InputError::Aborted) => {
                    if self.signals.stop_requested() {
                        return Ok(PostStep::Stop(Some("stopped by user".to_string())));
                    }
                    // Mode changed or paused: re-select the provider and
                    // keep waiting.
                    continue;
                }
                Err(InputError::ChannelClosed) => return Err(WorkflowError::InputClosed),
                Err(InputError::Controller(message)) => {
                    tracing::warn!(%message, "controller input failed, falling back to user");
                    self.mode.set_auto_mode(false);
                    continue;
                }
            };

            let (value, from_queue) = match input {
                InputResult::Skip => return Ok(PostStep::Advance),
                InputResult::Stop => {
                    return Ok(PostStep::Stop(Some("stopped by user".to_string())))
                }
                InputResult::Input { value, source, .. } => {
                    if value == SWITCH_TO_AUTO {
                        self.mode.set_auto_mode(true);
                        continue;
                    }
                    if value.is_empty() {
                        if *queue_index >= queue.len() {
                            // Empty input with no queue left: the step is
                            // done.
                            return Ok(PostStep::Advance);
                        }
                        // Defensive: providers consume the queue
                        // themselves, but an empty value with queue left
                        // still advances the chain.
                        (queue[*queue_index].clone(), true)
                    } else {
                        (value, source == crate::input::InputSource::Queue)
                    }
                }
            };

            let Some(session) = session_id.clone() else {
                tracing::warn!(step = index, "no session to resume, step cannot take input");
                return Ok(PostStep::Advance);
            };

            let abort = self
                .signals
                .begin_step(index, module.agent.clone(), &agent.name);
            let resumed = self
                .runner
                .resume_step(index, module, agent, monitoring_id, session, &value, abort)
                .await;
            self.signals.end_step();

            let outcome = match resumed {
                Ok(outcome) => outcome,
                Err(error) if error.is_abort() => {
                    if self.signals.stop_requested() {
                        return Ok(PostStep::Stop(Some("stopped by user".to_string())));
                    }
                    if self.mode.is_paused() {
                        continue;
                    }
                    return Ok(PostStep::Advance);
                }
                Err(error) => {
                    let reason = error.to_string();
                    self.emitter.workflow_error(&reason);
                    return Ok(PostStep::Fail(reason));
                }
            };

            if from_queue {
                self.step_index.chain_completed(index, *queue_index)?;
                *queue_index += 1;
            }

            last_output = outcome.output.clone();
            session_id = outcome.session_id.clone().or(session_id);
            monitoring_id = outcome.monitoring_id;

            match self
                .post_execution(index, module, &outcome, active_loop, loop_counters)
                .await?
            {
                PostStep::Advance => continue,
                other => return Ok(other),
            }
        }
    }

    async fn load_queue(&self, agent: &AgentDefinition) -> Result<Vec<String>, StepError> {
        let mut queue = Vec::new();
        for path in &agent.chained_prompts {
            queue.push(self.runner.load_chained_prompt(path).await?);
        }
        Ok(queue)
    }

    /// Run the controller conversation once, before the pipeline starts.
    async fn run_controller_view(
        &self,
        session: Arc<ControllerSession>,
    ) -> Result<(), WorkflowError> {
        self.step_index
            .set_autonomous_mode(AutonomousMode::Never)?;
        self.emitter.view_changed(ViewName::Controller);

        let prompt = self
            .runner
            .load_prompt(&session.agent().prompt_path)
            .await
            .map_err(WorkflowError::Step)?;
        if let Err(error) = session.send(&prompt, AbortSignal::never()).await {
            self.step_index.set_autonomous_mode(AutonomousMode::True)?;
            self.emitter.view_changed(ViewName::Executing);
            return Err(WorkflowError::Step(error));
        }

        let mut rx = self.control.subscribe();
        loop {
            self.emitter.input_waiting();
            let message = loop {
                match rx.recv().await {
                    Ok(ControlMessage::Input { prompt, skip }) => break Some((prompt, skip)),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break None,
                }
            };
            match message {
                // A continue signal or empty input ends the conversation.
                None | Some((None, _)) | Some((_, true)) => break,
                Some((Some(prompt), _)) if prompt.is_empty() => break,
                Some((Some(prompt), _)) => {
                    if let Err(error) = session.send(&prompt, AbortSignal::never()).await {
                        tracing::warn!(%error, "controller turn failed, leaving controller view");
                        break;
                    }
                }
            }
        }

        self.step_index.set_autonomous_mode(AutonomousMode::True)?;
        self.mode.set_auto_mode(true);
        self.emitter.view_changed(ViewName::Executing);
        Ok(())
    }

    /// Configure MCP for every engine the template references; returns the
    /// ids that were configured so cleanup can mirror it.
    fn setup_mcp(&self) -> Vec<cm_core::EngineId> {
        let mut configured = Vec::new();
        let engines = self
            .manifest
            .referenced_engines(&self.template, self.registry.default_id());
        for engine_id in engines {
            let Some(engine) = self.registry.get(&engine_id) else {
                continue;
            };
            let Some(mcp) = engine.mcp() else {
                continue;
            };
            if !mcp.supported() {
                continue;
            }
            match mcp.configure(&self.working_dir) {
                Ok(()) => {
                    tracing::debug!(engine = %engine_id, "mcp configured");
                    configured.push(engine_id);
                }
                Err(error) => {
                    tracing::warn!(engine = %engine_id, %error, "mcp configuration failed");
                }
            }
        }
        configured
    }

    fn cleanup_mcp(&self, configured: &[cm_core::EngineId]) {
        for engine_id in configured {
            let Some(engine) = self.registry.get(engine_id) else {
                continue;
            };
            if let Some(mcp) = engine.mcp() {
                if let Err(error) = mcp.cleanup(&self.working_dir) {
                    tracing::warn!(engine = %engine_id, %error, "mcp cleanup failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
