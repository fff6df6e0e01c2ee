//! The session controller — the single owner of [`DigestState`].
//!
//! Runs as one async task and multiplexes three inputs with
//! `tokio::select!`:
//!
//! * pipeline events (transcript chunks, level, lifecycle, fatal),
//! * user commands (pause / resume / stop / quick actions / context),
//! * finished LLM task results.
//!
//! LLM calls are spawned as tasks that receive **snapshots** and send their
//! outcome back over a channel; all state mutation happens here.  Digests
//! and quick-action queries are mutually exclusive: while either is in
//! flight, launching either kind is a silent no-op.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::config::DigestConfig;
use crate::display::DisplaySink;
use crate::llm::{prompt, ChatMessage, ChatResponse, LlmClient, LlmError};
use crate::persist::{format_transcript_line, PersistenceSink};
use crate::pipeline::{AudioStatus, PipelineControl, PipelineEvent};
use crate::template::SessionTemplate;

use super::events::{SessionCommand, SessionEvent, SessionStatus};
use super::state::{compact_messages, should_trigger_digest, DigestState};

/// Transcript lines bound into quick-action prompts.
const RECENT_LINES: usize = 50;

// ---------------------------------------------------------------------------
// Task outcomes
// ---------------------------------------------------------------------------

enum TaskOutcome {
    Digest {
        user_message: String,
        /// The buffer snapshot this call was launched with, for splice-back
        /// on failure.
        snapshot: Vec<String>,
        result: Result<ChatResponse, LlmError>,
    },
    Query {
        label: String,
        result: Result<String, LlmError>,
    },
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Owns the digest loop for one recording session.
pub struct SessionController {
    config: DigestConfig,
    compact_threshold: u64,
    query_model: String,
    template: SessionTemplate,
    llm: Arc<dyn LlmClient>,
    persistence: Arc<dyn PersistenceSink>,
    display: Arc<dyn DisplaySink>,
    control: Arc<PipelineControl>,

    state: DigestState,
    status: SessionStatus,
    user_context: String,
    digest_running: bool,
    query_running: bool,
    stopping: bool,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: DigestConfig,
        compact_threshold: u64,
        query_model: String,
        template: SessionTemplate,
        llm: Arc<dyn LlmClient>,
        persistence: Arc<dyn PersistenceSink>,
        display: Arc<dyn DisplaySink>,
        control: Arc<PipelineControl>,
    ) -> Self {
        let state = DigestState::new(&template.system_prompt);
        Self {
            config,
            compact_threshold,
            query_model,
            template,
            llm,
            persistence,
            display,
            control,
            state,
            status: SessionStatus::Idle,
            user_context: String::new(),
            digest_running: false,
            query_running: false,
            stopping: false,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until the pipeline reports `Stopped` (after a stop command or a
    /// fatal capture failure), then produce the forced final digest.
    pub async fn run(
        mut self,
        mut pipeline_rx: mpsc::Receiver<PipelineEvent>,
        mut command_rx: mpsc::Receiver<SessionCommand>,
    ) {
        let (task_tx, mut task_rx) = mpsc::channel::<TaskOutcome>(8);

        loop {
            tokio::select! {
                event = pipeline_rx.recv() => {
                    match event {
                        Some(event) => {
                            if self.on_pipeline_event(event, &task_tx) {
                                break;
                            }
                        }
                        None => break, // pipeline thread is gone
                    }
                }
                Some(command) = command_rx.recv() => {
                    self.on_command(command, &task_tx);
                }
                Some(outcome) = task_rx.recv() => {
                    self.on_task_outcome(outcome);
                }
            }
        }

        // Late non-final results are discarded by dropping task_rx.
        drop(task_rx);

        self.final_digest().await;
        self.publish(SessionEvent::Status(SessionStatus::Stopped));
        log::info!(
            "session finished: {} lines, {} digests",
            self.state.all_lines.len(),
            self.state.digest_count
        );
    }

    // -----------------------------------------------------------------------
    // Pipeline events
    // -----------------------------------------------------------------------

    /// Returns true when the run loop should exit.
    fn on_pipeline_event(
        &mut self,
        event: PipelineEvent,
        task_tx: &mpsc::Sender<TaskOutcome>,
    ) -> bool {
        match event {
            PipelineEvent::Status(AudioStatus::Started) => {
                self.status = SessionStatus::Recording;
                self.publish(SessionEvent::Status(SessionStatus::Recording));
            }
            PipelineEvent::Status(AudioStatus::Paused) => {
                self.status = SessionStatus::Paused;
                self.publish(SessionEvent::Status(SessionStatus::Paused));
            }
            PipelineEvent::Status(AudioStatus::Resumed) => {
                self.status = SessionStatus::Recording;
                self.publish(SessionEvent::Status(SessionStatus::Recording));
            }
            PipelineEvent::Status(AudioStatus::Stopped) => {
                return true;
            }
            PipelineEvent::TranscriptChunk(segments) => {
                let lines: Vec<String> =
                    segments.iter().map(format_transcript_line).collect();
                self.state.append_lines(&lines);
                self.persistence.append_transcript_lines(&lines);
                self.publish(SessionEvent::Transcript(lines));
                self.maybe_launch_digest(task_tx);
            }
            PipelineEvent::Level { rms } => {
                self.publish(SessionEvent::Level { rms });
            }
            PipelineEvent::Fatal(message) => {
                log::error!("capture failure: {message}");
                self.publish(SessionEvent::Fatal(message));
                // The pipeline emits Stopped next; treat this as a stop so
                // the final digest still runs over what was captured.
                self.stopping = true;
                self.control.request_shutdown();
            }
        }
        false
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_command(&mut self, command: SessionCommand, task_tx: &mpsc::Sender<TaskOutcome>) {
        match command {
            SessionCommand::Pause => self.control.pause(),
            SessionCommand::Resume => self.control.resume(),
            SessionCommand::Stop => {
                self.stopping = true;
                self.control.request_shutdown();
            }
            SessionCommand::QuickAction(number) => self.launch_query(number, task_tx),
            SessionCommand::SetContext(context) => {
                log::info!("session context updated ({} chars)", context.len());
                self.user_context = context;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Digest launch / merge
    // -----------------------------------------------------------------------

    fn maybe_launch_digest(&mut self, task_tx: &mpsc::Sender<TaskOutcome>) {
        if self.stopping || !should_trigger_digest(&self.state, &self.config, Instant::now()) {
            return;
        }
        if self.digest_running || self.query_running {
            // Either worker in flight blocks both kinds; the trigger will
            // re-fire on a later chunk.
            log::debug!("digest trigger skipped, worker busy");
            return;
        }

        let snapshot = self.state.take_buffer();
        let user_message = prompt::build_digest_prompt(
            &self.template.digest_user_template,
            &snapshot,
            &self.user_context,
        );

        let mut messages = self.state.messages.clone();
        messages.push(ChatMessage::user(user_message.clone()));

        self.digest_running = true;
        self.publish(SessionEvent::DigestStarted);
        log::info!("digest #{} launched ({} lines)", self.state.digest_count + 1, snapshot.len());

        let llm = Arc::clone(&self.llm);
        let model = self.config.model.clone();
        let task_tx = task_tx.clone();
        tokio::spawn(async move {
            let result = llm.chat(&model, &messages).await;
            let _ = task_tx
                .send(TaskOutcome::Digest {
                    user_message,
                    snapshot,
                    result,
                })
                .await;
        });
    }

    fn on_task_outcome(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Digest {
                user_message,
                snapshot,
                result,
            } => {
                self.digest_running = false;
                match result {
                    Ok(response) => {
                        self.state.record_success(user_message, &response);
                        if self.state.needs_compaction(self.compact_threshold) {
                            log::info!(
                                "compacting history at {} prompt tokens",
                                self.state.prompt_tokens
                            );
                            compact_messages(&mut self.state);
                        }
                        let number = self.state.digest_count;
                        self.persistence.save_digest(&response.content);
                        self.persistence.save_history(&response.content, number, false);
                        self.publish(SessionEvent::DigestReady {
                            number,
                            markdown: response.content,
                        });
                    }
                    Err(error) => {
                        // The previous digest stays intact; the lines go back
                        // in front so nothing is lost.
                        self.state.restore_buffer(snapshot);
                        self.state.record_failure();
                        log::warn!(
                            "digest failed ({} consecutive): {error}",
                            self.state.consecutive_failures
                        );
                        self.publish(SessionEvent::DigestFailed {
                            consecutive_failures: self.state.consecutive_failures,
                            error: error.to_string(),
                        });
                    }
                }
            }
            TaskOutcome::Query { label, result } => {
                self.query_running = false;
                match result {
                    Ok(content) => self.publish(SessionEvent::QueryResult { label, content }),
                    Err(error) => self.publish(SessionEvent::QueryFailed {
                        label,
                        error: error.to_string(),
                    }),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Quick actions
    // -----------------------------------------------------------------------

    fn launch_query(&mut self, number: usize, task_tx: &mpsc::Sender<TaskOutcome>) {
        let Some(action) = self.template.quick_action(number) else {
            self.publish(SessionEvent::QueryFailed {
                label: format!("action {number}"),
                error: "no such quick action".into(),
            });
            return;
        };
        if self.digest_running || self.query_running {
            log::info!("quick action {:?} ignored, another request is in flight", action.label);
            return;
        }

        let digest_markdown = self.state.latest_digest().unwrap_or("(no digest yet)");
        let query = prompt::build_quick_action_prompt(
            &action.prompt_template,
            digest_markdown,
            self.state.recent_lines(RECENT_LINES),
            &self.user_context,
        );
        let label = action.label.clone();

        self.query_running = true;
        self.publish(SessionEvent::QueryStarted {
            label: label.clone(),
        });

        let llm = Arc::clone(&self.llm);
        let model = self.query_model.clone();
        let task_tx = task_tx.clone();
        tokio::spawn(async move {
            let result = llm.chat_single(&model, &query).await;
            let _ = task_tx.send(TaskOutcome::Query { label, result }).await;
        });
    }

    // -----------------------------------------------------------------------
    // Final digest
    // -----------------------------------------------------------------------

    /// One forced digest over the full transcript, run after capture stops.
    async fn final_digest(&mut self) {
        if self.state.all_lines.is_empty() {
            log::info!("nothing transcribed, skipping final digest");
            return;
        }

        let remaining = self.state.take_buffer();
        let user_message = prompt::build_final_prompt(
            &self.template.final_user_template,
            &remaining,
            &self.state.all_lines,
            &self.user_context,
        );

        let mut messages = self.state.messages.clone();
        messages.push(ChatMessage::user(user_message.clone()));

        self.publish(SessionEvent::DigestStarted);
        log::info!("final digest launched ({} total lines)", self.state.all_lines.len());

        match self.llm.chat(&self.config.model, &messages).await {
            Ok(response) => {
                self.state.record_success(user_message, &response);
                let number = self.state.digest_count;
                self.persistence.save_digest(&response.content);
                self.persistence.save_history(&response.content, number, true);
                self.publish(SessionEvent::DigestReady {
                    number,
                    markdown: response.content,
                });
            }
            Err(error) => {
                self.state.record_failure();
                log::warn!("final digest failed: {error}");
                self.publish(SessionEvent::DigestFailed {
                    consecutive_failures: self.state.consecutive_failures,
                    error: error.to_string(),
                });
            }
        }
    }

    fn publish(&self, event: SessionEvent) {
        self.display.publish(&event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
