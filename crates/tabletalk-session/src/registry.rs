// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory session registry.
//!
//! One live entry per `session_id`, created with compare-and-set semantics so
//! concurrent connects join the same entry. The registry also owns the
//! per-user greeting rate limiter and the idle-eviction sweeper.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tabletalk_core::types::{SessionStatus, UserInfo};
use tabletalk_core::{StorageAdapter, TableTalkError};

use crate::cursor::IntentCursor;

/// Per-session conversation lifecycle.
///
/// `Connecting -> Authenticated -> AwaitingAgent -> InIntent -> Completed`,
/// with `Abandoned` reachable from anywhere via idle eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Connecting,
    Authenticated,
    AwaitingAgent,
    InIntent,
    Completed,
    Abandoned,
}

impl Lifecycle {
    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Connecting, Authenticated)
                | (Authenticated, AwaitingAgent)
                | (AwaitingAgent, InIntent)
                | (InIntent, InIntent)
                | (InIntent, Completed)
                | (_, Abandoned)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Lifecycle::Completed | Lifecycle::Abandoned)
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifecycle::Connecting => "connecting",
            Lifecycle::Authenticated => "authenticated",
            Lifecycle::AwaitingAgent => "awaiting-agent",
            Lifecycle::InIntent => "in-intent",
            Lifecycle::Completed => "completed",
            Lifecycle::Abandoned => "abandoned",
        };
        write!(f, "{name}")
    }
}

/// Mutable per-session processing state, serialized by the entry mutex.
#[derive(Debug)]
pub struct SessionState {
    pub lifecycle: Lifecycle,
    pub agent_id: Option<String>,
    pub cursor: IntentCursor,
    pub last_activity: Instant,
    pub is_processing: bool,
    /// Recent-activity snapshot computed at connect time.
    pub snapshot: Option<UserInfo>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            lifecycle: Lifecycle::Connecting,
            agent_id: None,
            cursor: IntentCursor::new(),
            last_activity: Instant::now(),
            is_processing: false,
            snapshot: None,
        }
    }

    /// Validated lifecycle transition.
    pub fn advance_to(&mut self, next: Lifecycle) -> Result<(), TableTalkError> {
        if self.lifecycle == next {
            return Ok(());
        }
        if !self.lifecycle.can_advance_to(next) {
            return Err(TableTalkError::Session(format!(
                "illegal lifecycle transition {} -> {next}",
                self.lifecycle
            )));
        }
        self.lifecycle = next;
        Ok(())
    }
}

/// One live session. Handlers that mutate the state lock the mutex, which
/// serializes processing per session while distinct sessions run freely in
/// parallel.
pub struct SessionEntry {
    pub session_id: String,
    pub user_id: String,
    pub user_email: String,
    /// Cancelled on eviction or disconnect; background tasks observe it.
    pub cancel: CancellationToken,
    state: Mutex<SessionState>,
}

impl SessionEntry {
    pub fn state(&self) -> &Mutex<SessionState> {
        &self.state
    }

    pub async fn touch(&self) {
        self.state.lock().await.last_activity = Instant::now();
    }
}

/// In-memory map of live sessions plus shared rate-limit state.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionEntry>>,
    /// Per-user last greeting request, shared across that user's sessions.
    greetings: DashMap<String, Instant>,
    idle_timeout: Duration,
    greeting_interval: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration, greeting_interval: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            greetings: DashMap::new(),
            idle_timeout,
            greeting_interval,
        }
    }

    /// Join or create the entry for `session_id`.
    ///
    /// Compare-and-set: under concurrent connects exactly one entry is
    /// created and the late arriver joins it. Returns `(entry, created)`.
    pub fn attach(
        &self,
        session_id: &str,
        user_id: &str,
        user_email: &str,
    ) -> (Arc<SessionEntry>, bool) {
        let mut created = false;
        let entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(SessionEntry {
                    session_id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    user_email: user_email.to_string(),
                    cancel: CancellationToken::new(),
                    state: Mutex::new(SessionState::new()),
                })
            })
            .clone();
        (entry, created)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        self.sessions.get(session_id).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop the entry and cancel its background tasks.
    pub fn remove(&self, session_id: &str) -> Option<Arc<SessionEntry>> {
        let (_, entry) = self.sessions.remove(session_id)?;
        entry.cancel.cancel();
        Some(entry)
    }

    /// Greeting rate limit: at most one greeting per user per interval.
    /// Returns the remaining wait on rejection.
    pub fn check_greeting(&self, user_email: &str) -> Result<(), Duration> {
        use dashmap::mapref::entry::Entry;

        let now = Instant::now();
        match self.greetings.entry(user_email.to_lowercase()) {
            Entry::Vacant(slot) => {
                slot.insert(now);
                Ok(())
            }
            Entry::Occupied(mut slot) => {
                let elapsed = now.duration_since(*slot.get());
                if elapsed < self.greeting_interval {
                    return Err(self.greeting_interval - elapsed);
                }
                slot.insert(now);
                Ok(())
            }
        }
    }

    /// Collect and evict sessions idle longer than the timeout. Evicted
    /// entries have their lifecycle set to `Abandoned` and their
    /// cancellation token fired; the caller persists the status change.
    pub async fn sweep_idle(&self) -> Vec<Arc<SessionEntry>> {
        // Snapshot entries first; map guards must not be held across await.
        let candidates: Vec<Arc<SessionEntry>> =
            self.sessions.iter().map(|e| e.value().clone()).collect();

        let mut expired = Vec::new();
        for entry in candidates {
            let idle = entry.state().lock().await.last_activity.elapsed();
            if idle > self.idle_timeout {
                expired.push(entry.session_id.clone());
            }
        }

        let mut evicted = Vec::new();
        for session_id in expired {
            if let Some((_, entry)) = self.sessions.remove(&session_id) {
                {
                    let mut state = entry.state().lock().await;
                    let _ = state.advance_to(Lifecycle::Abandoned);
                }
                entry.cancel.cancel();
                evicted.push(entry);
            }
        }
        evicted
    }

    /// Background sweeper: every `interval`, evict idle sessions and mark
    /// their persisted rows completed.
    pub fn spawn_sweeper(
        self: Arc<Self>,
        storage: Arc<dyn StorageAdapter + Send + Sync>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        for entry in registry.sweep_idle().await {
                            info!(session_id = %entry.session_id, "evicting idle session");
                            if let Err(e) = storage
                                .update_session_status(&entry.session_id, SessionStatus::Completed)
                                .await
                            {
                                warn!(session_id = %entry.session_id, error = %e, "failed to mark evicted session completed");
                            }
                        }
                    }
                }
            }
        })
    }
}
