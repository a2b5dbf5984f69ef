use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{ChatAction, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between any two Bot API calls.
    pub global_min_interval: Duration,
    /// Minimum spacing between calls into the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Option<Instant>,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    /// Reserve the next slot and return how long the caller must wait for it.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = match self.next {
            Some(next) if next > now => next,
            _ => now,
        };
        self.next = Some(start + self.interval);
        start.saturating_duration_since(now)
    }
}

/// Limiter count that triggers dropping idle chats.
const CHAT_SWEEP_AT: usize = 256;

/// Per-chat limiters. A limiter whose slot is already in the past behaves like a
/// fresh one, so those are dropped once the map grows past [`CHAT_SWEEP_AT`].
#[derive(Debug)]
struct ChatLimiters {
    interval: Duration,
    by_chat: HashMap<i64, IntervalLimiter>,
    next_sweep_at: usize,
}

impl ChatLimiters {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            by_chat: HashMap::new(),
            next_sweep_at: CHAT_SWEEP_AT,
        }
    }

    fn reserve_at(&mut self, chat_id: i64, now: Instant) -> Duration {
        if self.by_chat.len() >= self.next_sweep_at {
            self.by_chat.retain(|_, l| l.next.is_some_and(|next| next > now));
            self.next_sweep_at = (self.by_chat.len() * 2).max(CHAT_SWEEP_AT);
        }
        let interval = self.interval;
        self.by_chat
            .entry(chat_id)
            .or_insert_with(|| IntervalLimiter::new(interval))
            .reserve_at(now)
    }
}

/// `MessagingPort` decorator that spaces out outbound calls.
///
/// A keyword burst in a busy group turns into one owner message plus one group
/// reply per hit, which is exactly the pattern Telegram answers with 429s.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<ChatLimiters>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(ChatLimiters::new(cfg.per_chat_min_interval)),
        }
    }

    async fn throttle_chat(&self, chat_id: ChatId) {
        let now = Instant::now();
        let global_wait = self.global.lock().await.reserve_at(now);
        let chat_wait = self.per_chat.lock().await.reserve_at(chat_id.0, now);

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            tracing::debug!(chat_id = chat_id.0, wait_ms = wait.as_millis() as u64, "throttling");
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.throttle_chat(chat_id).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn reply_html(&self, to: MessageRef, html: &str) -> Result<MessageRef> {
        self.throttle_chat(to.chat_id).await;
        self.inner.reply_html(to, html).await
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        // Typing indicators are cosmetic; they must not delay real messages.
        self.inner.send_chat_action(chat_id, action).await
    }
}
