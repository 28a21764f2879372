//! SurveyManager: routes incoming messages through the state machine and
//! carries out the effects (replies, sheet append, admin notification).

use std::sync::Arc;
use std::time::Duration;

use crate::channels::{IncomingMessage, MessageChannel, OutgoingMessage, ReplyMarkup, Update};
use crate::config::RetryPolicy;
use crate::error::{ChannelError, Error, SinkError};
use crate::retry::with_retry;
use crate::sink::RecordSink;

use super::model::Record;
use super::notify::format_notification;
use super::questions::{SUBMIT_FAILED, SUBMITTED};
use super::session::SessionStore;
use super::state::{Effect, Input, Session, transition};

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// What handling one message amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The update carried no message.
    Ignored,
    /// The user got a prompt or hint; nothing was written.
    Replied,
    /// A record was appended and the session reset.
    Submitted,
    /// The append failed; the session still waits for the drive link.
    SubmitFailed,
}

/// Coordinates the survey for every user.
pub struct SurveyManager {
    channel: Arc<dyn MessageChannel>,
    sink: Arc<dyn RecordSink>,
    sessions: Arc<SessionStore>,
    admin_chat_id: Option<i64>,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl SurveyManager {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        sink: Arc<dyn RecordSink>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            channel,
            sink,
            sessions,
            admin_chat_id: None,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Chat that gets a summary of every submitted project.
    pub fn with_admin_chat(mut self, chat_id: Option<i64>) -> Self {
        self.admin_chat_id = chat_id;
        self
    }

    /// Bound on each sheet append attempt.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Retry policy for sheet appends.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle `update` on its own task so a panic in one user's dispatch is
    /// contained. Awaiting the task keeps updates in arrival order.
    pub async fn dispatch(self: &Arc<Self>, update: Update) -> Result<DispatchOutcome, Error> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.handle_update(&update).await })
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?
    }

    /// Handle a raw Telegram update.
    pub async fn handle_update(&self, update: &Update) -> Result<DispatchOutcome, Error> {
        match update.incoming() {
            Some(message) => self.handle(message).await,
            None => {
                tracing::debug!(update_id = update.update_id, "Update has no message, ignoring");
                Ok(DispatchOutcome::Ignored)
            }
        }
    }

    /// Handle one message from a user.
    ///
    /// The user's session stays locked for the whole call, so a second
    /// message from the same user waits until this one is fully handled.
    pub async fn handle(&self, message: IncomingMessage) -> Result<DispatchOutcome, Error> {
        let input = Input::from_text(message.text.as_deref());
        let slot = self.sessions.slot(message.user_id).await;
        let mut slot = slot.lock().await;

        let today = chrono::Local::now().date_naive();
        let outcome = transition(&slot.session, input, today);
        tracing::debug!(
            user_id = message.user_id,
            from = %slot.session.state,
            to = %outcome.session.state,
            "Survey transition"
        );

        let Some(record) = outcome.submission().cloned() else {
            slot.commit(outcome.session);
            for effect in outcome.effects {
                if let Effect::Reply(reply) = effect {
                    self.send(message.chat_id, &reply).await?;
                }
            }
            return Ok(DispatchOutcome::Replied);
        };

        match self.append(&record).await {
            Ok(()) => {
                slot.commit(Session::default());
                tracing::info!(
                    user_id = message.user_id,
                    user = message.user_name.as_deref().unwrap_or("unknown"),
                    client = %record.client_name,
                    "Project submitted"
                );
                self.send(
                    message.chat_id,
                    &OutgoingMessage::new(SUBMITTED).with_markup(ReplyMarkup::RemoveKeyboard),
                )
                .await?;
                self.notify_admin(&record).await;
                Ok(DispatchOutcome::Submitted)
            }
            Err(e) => {
                // Keep the answers so resending the link retries the submit.
                let unchanged = slot.session.clone();
                slot.commit(unchanged);
                tracing::error!(
                    user_id = message.user_id,
                    error = %e,
                    "Failed to save project"
                );
                self.send(message.chat_id, &OutgoingMessage::new(SUBMIT_FAILED))
                    .await?;
                Ok(DispatchOutcome::SubmitFailed)
            }
        }
    }

    async fn append(&self, record: &Record) -> Result<(), SinkError> {
        let timeout = self.call_timeout;
        with_retry(
            self.retry,
            timeout,
            "sheet append",
            || self.sink.append(record),
            || SinkError::Timeout { timeout },
        )
        .await
    }

    /// Channels bound and retry their own calls, chunk by chunk.
    async fn send(&self, chat_id: i64, message: &OutgoingMessage) -> Result<(), ChannelError> {
        self.channel.send(chat_id, message).await
    }

    /// Best effort: a failed notification never undoes a submission.
    async fn notify_admin(&self, record: &Record) {
        let Some(admin) = self.admin_chat_id else {
            return;
        };
        // Answers are user text; Markdown would eat paired `_` and `*`.
        let message = OutgoingMessage::plain(format_notification(record));
        if let Err(e) = self.send(admin, &message).await {
            tracing::warn!(admin_chat_id = admin, error = %e, "Failed to notify admin");
        }
    }
}
