use std::{collections::VecDeque, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::{task::JoinHandle, time::Instant};
use tracing::debug;

use crate::core::{env::app_env::FloodConfig, types::errors::chat_error::ChatError};

/// Sliding-window message limiter keyed by `(room_id, user_id)`.
///
/// Each key keeps the send instants still inside the window. The check and the
/// record happen under the key's shard lock, so parallel sends by one user can
/// never both take the last slot. Keys whose window has fully elapsed are
/// dropped by [`FloodGuard::sweep`].
#[derive(Debug, Clone)]
pub struct FloodGuard {
    max_messages: usize,
    window: Duration,
    history: Arc<DashMap<(i32, i32), VecDeque<Instant>>>,
}

impl FloodGuard {
    pub fn new(config: &FloodConfig) -> Self {
        Self {
            max_messages: config.max_messages.max(1),
            window: Duration::from_secs(config.window_seconds.max(1)),
            history: Arc::new(DashMap::new()),
        }
    }

    pub fn check_and_record(&self, room_id: i32, user_id: i32) -> Result<(), ChatError> {
        let now = Instant::now();
        let mut sent = self.history.entry((room_id, user_id)).or_default();

        while sent
            .front()
            .is_some_and(|at| now.duration_since(*at) >= self.window)
        {
            sent.pop_front();
        }

        if sent.len() >= self.max_messages {
            let retry_after = sent
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);

            return Err(ChatError::RateLimited {
                max_messages: self.max_messages,
                window_seconds: self.window.as_secs(),
                retry_after_seconds: retry_after.as_secs().max(1),
            });
        }

        sent.push_back(now);
        Ok(())
    }

    pub fn forget_room(&self, room_id: i32) {
        self.history.retain(|(room, _), _| *room != room_id);
    }

    /// Drops every key with no send left inside the window.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.history.len();

        self.history.retain(|_, sent| {
            sent.back()
                .is_some_and(|last| now.duration_since(*last) < self.window)
        });

        before.saturating_sub(self.history.len())
    }

    /// Sweeps once per window for as long as the process runs.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let guard = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(guard.window);
            loop {
                ticker.tick().await;
                let dropped = guard.sweep();
                if dropped > 0 {
                    debug!("flood guard dropped {} idle windows", dropped);
                }
            }
        })
    }

    pub fn tracked_keys(&self) -> usize {
        self.history.len()
    }
}
