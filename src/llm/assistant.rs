use super::{AssistantApi, LlmError, Run, RunStatus, ASSISTANT_ID};
use std::sync::Arc;
use std::time::Duration;

/// How often and how long the bridge polls a run before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(2),
            max_attempts: 4,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssistantReply {
    Text(String),
    /// The run completed without an assistant message carrying text.
    NoContent,
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("run {run_id} ended with status {status}: {reason}")]
    RunFailed {
        run_id: String,
        status: RunStatus,
        reason: String,
    },
    #[error("run {run_id} requires action, which this relay cannot provide")]
    RunRequiresAction { run_id: String },
    #[error("run {run_id} did not finish after {attempts} status checks")]
    PollExhausted { run_id: String, attempts: u32 },
}

/// Turns a single user message into an assistant reply by driving one remote run.
#[derive(Clone)]
pub struct ChatBridge {
    api: Arc<dyn AssistantApi>,
    policy: PollPolicy,
}

impl ChatBridge {
    pub fn new(api: Arc<dyn AssistantApi>, policy: PollPolicy) -> Self {
        ChatBridge { api, policy }
    }

    pub async fn send(&self, message: &str) -> Result<AssistantReply, ChatError> {
        let assistant = self.api.retrieve_assistant(ASSISTANT_ID).await?;
        let thread = self.api.create_thread().await?;
        self.api.add_user_message(&thread.id, message).await?;
        let run = self.api.create_run(&thread.id, &assistant.id).await?;
        tracing::info!(thread = %thread.id, run = %run.id, "assistant run started");

        self.wait_for_completion(&thread.id, &run.id).await?;
        self.latest_reply(&thread.id).await
    }

    async fn wait_for_completion(&self, thread_id: &str, run_id: &str) -> Result<(), ChatError> {
        for attempt in 1..=self.policy.max_attempts {
            let run = self.api.retrieve_run(thread_id, run_id).await?;
            tracing::debug!(run = %run.id, status = %run.status, attempt, "polled run");

            if classify(run)? {
                return Ok(());
            }
            if attempt < self.policy.max_attempts {
                tokio::time::sleep(self.policy.interval).await;
            }
        }

        tracing::warn!(run = %run_id, attempts = self.policy.max_attempts, "gave up polling run");
        Err(ChatError::PollExhausted {
            run_id: run_id.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<AssistantReply, ChatError> {
        let messages = self.api.list_messages(thread_id).await?;
        let reply = messages
            .iter()
            .filter(|m| m.role == "assistant")
            .find_map(|m| m.first_text())
            .map(|text| AssistantReply::Text(text.to_string()))
            .unwrap_or(AssistantReply::NoContent);

        if reply == AssistantReply::NoContent {
            tracing::warn!(thread = %thread_id, "run completed without assistant text");
        }
        Ok(reply)
    }
}

/// `Ok(true)` once the run completed, `Ok(false)` while it may still progress.
fn classify(run: Run) -> Result<bool, ChatError> {
    match run.status {
        RunStatus::Completed => Ok(true),
        RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => Ok(false),
        RunStatus::RequiresAction => Err(ChatError::RunRequiresAction { run_id: run.id }),
        RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete => {
            let reason = run
                .last_error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "no error details".to_string());
            Err(ChatError::RunFailed {
                run_id: run.id,
                status: run.status,
                reason,
            })
        }
        RunStatus::Other(status) => {
            tracing::debug!(run = %run.id, %status, "unrecognised run status, still waiting");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{Assistant, RemoteThread, RunError, ThreadMessage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted sequence of run statuses; the last one repeats.
    struct ScriptedApi {
        statuses: Mutex<VecDeque<RunStatus>>,
        messages: Vec<ThreadMessage>,
        polls: Mutex<u32>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedApi {
        fn new(statuses: Vec<RunStatus>, messages: Vec<ThreadMessage>) -> Arc<Self> {
            Arc::new(ScriptedApi {
                statuses: Mutex::new(statuses.into()),
                messages,
                polls: Mutex::new(0),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn polls(&self) -> u32 {
            *self.polls.lock().unwrap()
        }
    }

    #[async_trait]
    impl AssistantApi for ScriptedApi {
        async fn retrieve_assistant(&self, assistant_id: &str) -> Result<Assistant, LlmError> {
            Ok(Assistant {
                id: assistant_id.to_string(),
            })
        }

        async fn create_thread(&self) -> Result<RemoteThread, LlmError> {
            Ok(RemoteThread {
                id: "thread_1".into(),
            })
        }

        async fn add_user_message(&self, _thread_id: &str, content: &str) -> Result<(), LlmError> {
            self.sent.lock().unwrap().push(content.to_string());
            Ok(())
        }

        async fn create_run(&self, _thread_id: &str, _assistant_id: &str) -> Result<Run, LlmError> {
            Ok(Run {
                id: "run_1".into(),
                status: RunStatus::Queued,
                last_error: None,
            })
        }

        async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, LlmError> {
            *self.polls.lock().unwrap() += 1;
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                statuses.front().cloned().unwrap()
            };
            let last_error = (status == RunStatus::Failed).then(|| RunError {
                message: Some("model overloaded".into()),
            });
            Ok(Run {
                id: run_id.to_string(),
                status,
                last_error,
            })
        }

        async fn list_messages(&self, _thread_id: &str) -> Result<Vec<ThreadMessage>, LlmError> {
            Ok(self.messages.clone())
        }
    }

    fn bridge(api: Arc<ScriptedApi>) -> ChatBridge {
        ChatBridge::new(api, PollPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn completed_run_returns_latest_assistant_text() {
        let api = ScriptedApi::new(
            vec![RunStatus::Queued, RunStatus::InProgress, RunStatus::Completed],
            vec![
                ThreadMessage::assistant_text("newest"),
                ThreadMessage::assistant_text("older"),
            ],
        );
        let reply = bridge(api.clone()).send("ping").await.unwrap();

        assert_eq!(reply, AssistantReply::Text("newest".into()));
        assert_eq!(api.polls(), 3);
        assert_eq!(*api.sent.lock().unwrap(), vec!["ping".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn user_and_empty_messages_are_skipped() {
        let user = ThreadMessage {
            role: "user".into(),
            ..ThreadMessage::assistant_text("ping")
        };
        let api = ScriptedApi::new(
            vec![RunStatus::Completed],
            vec![user, ThreadMessage::assistant_text(""), ThreadMessage::assistant_text("pong")],
        );

        let reply = bridge(api).send("ping").await.unwrap();
        assert_eq!(reply, AssistantReply::Text("pong".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn completed_run_without_text_is_no_content() {
        let api = ScriptedApi::new(vec![RunStatus::Completed], Vec::new());
        let reply = bridge(api).send("ping").await.unwrap();
        assert_eq!(reply, AssistantReply::NoContent);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_run_surfaces_immediately() {
        let api = ScriptedApi::new(vec![RunStatus::InProgress, RunStatus::Failed], Vec::new());
        let err = bridge(api.clone()).send("ping").await.unwrap_err();

        match err {
            ChatError::RunFailed { status, reason, .. } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(reason, "model overloaded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(api.polls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn every_terminal_failure_status_is_an_error() {
        for status in [RunStatus::Cancelled, RunStatus::Expired, RunStatus::Incomplete] {
            let api = ScriptedApi::new(vec![status.clone()], Vec::new());
            let err = bridge(api).send("ping").await.unwrap_err();
            assert!(
                matches!(&err, ChatError::RunFailed { status: s, .. } if *s == status),
                "{status}: {err:?}"
            );
        }

        let api = ScriptedApi::new(vec![RunStatus::RequiresAction], Vec::new());
        let err = bridge(api).send("ping").await.unwrap_err();
        assert!(matches!(err, ChatError::RunRequiresAction { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn polling_stops_after_max_attempts() {
        let api = ScriptedApi::new(vec![RunStatus::InProgress], Vec::new());
        let started = tokio::time::Instant::now();
        let err = bridge(api.clone()).send("ping").await.unwrap_err();

        assert!(matches!(err, ChatError::PollExhausted { attempts: 4, .. }));
        assert_eq!(api.polls(), 4);
        // Three sleeps between four polls.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_status_keeps_polling() {
        let api = ScriptedApi::new(
            vec![RunStatus::Other("warming_up".into()), RunStatus::Completed],
            vec![ThreadMessage::assistant_text("ready")],
        );
        let reply = bridge(api.clone()).send("ping").await.unwrap();
        assert_eq!(reply, AssistantReply::Text("ready".into()));
        assert_eq!(api.polls(), 2);
    }
}
