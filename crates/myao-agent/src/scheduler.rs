//! Debounce scheduler: at most one pending reply per bot.
//!
//! Scheduling a new reply cancels the previous one, whether it is still
//! waiting out its delay or already talking to the backend.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long to wait before replying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayPolicy {
    /// Upper bound (exclusive) of the random delay for unaddressed messages
    pub max_delay: Duration,
    /// Delay for messages that mention the bot
    pub mention_delay: Duration,
}

impl Default for DelayPolicy {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(600),
            mention_delay: Duration::ZERO,
        }
    }
}

impl DelayPolicy {
    /// Addressed messages get the fixed mention delay; others a uniform
    /// random delay in `[0, max_delay)` at millisecond resolution.
    pub fn delay_for(&self, addressed: bool) -> Duration {
        if addressed {
            return self.mention_delay;
        }
        let max_ms = self.max_delay.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
    }
}

/// How a scheduled reply ended its wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Fired,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    Open,
    Claimed,
    Superseded,
}

/// Cancellation for one reply plus a one-shot decision on who owns its
/// message: the reply itself (`claim`) or the newer reply that supersedes
/// it (`supersede`). Whichever runs first wins; the loser sees `false`.
#[derive(Debug, Clone)]
pub struct ReplyToken {
    cancel: CancellationToken,
    settlement: Arc<Mutex<Settlement>>,
}

impl Default for ReplyToken {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyToken {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            settlement: Arc::new(Mutex::new(Settlement::Open)),
        }
    }

    /// Run `commit` and settle the reply as claimed, unless it was
    /// superseded first. `commit` runs under the settlement lock.
    pub fn claim_with<R>(&self, commit: impl FnOnce() -> R) -> Option<R> {
        let mut settlement = self.settlement.lock();
        match *settlement {
            Settlement::Open => {
                let out = commit();
                *settlement = Settlement::Claimed;
                Some(out)
            }
            Settlement::Claimed => Some(commit()),
            Settlement::Superseded => None,
        }
    }

    /// Settle the reply without writing anything
    pub fn claim(&self) -> bool {
        self.claim_with(|| ()).is_some()
    }

    /// Cancel the reply. Returns true when it had not been claimed yet, in
    /// which case the caller takes over its message.
    pub fn supersede(&self) -> bool {
        let mut settlement = self.settlement.lock();
        self.cancel.cancel();
        match *settlement {
            Settlement::Open => {
                *settlement = Settlement::Superseded;
                true
            }
            Settlement::Claimed | Settlement::Superseded => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the reply is superseded
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

struct PendingReply<T> {
    id: Uuid,
    token: ReplyToken,
    payload: T,
}

/// Holds the single live pending reply and the message it answers.
/// Cloning is cheap.
pub struct ReplyScheduler<T> {
    pending: Arc<Mutex<Option<PendingReply<T>>>>,
}

impl<T> Clone for ReplyScheduler<T> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<T> Default for ReplyScheduler<T> {
    fn default() -> Self {
        Self {
            pending: Arc::new(Mutex::new(None)),
        }
    }
}

impl<T: Clone> ReplyScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the live reply, if any, and install a new one for `payload`.
    ///
    /// Also returns the superseded payload when its reply never claimed it,
    /// so the caller can keep the message before the new reply runs.
    pub fn schedule(&self, delay: Duration, payload: T) -> (ScheduledReply<T>, Option<T>) {
        let id = Uuid::new_v4();
        let token = ReplyToken::new();

        let mut slot = self.pending.lock();
        let superseded = slot.take().and_then(|previous| {
            tracing::debug!(cancelled = %previous.id, "superseded pending reply");
            previous.token.supersede().then_some(previous.payload)
        });
        *slot = Some(PendingReply {
            id,
            token: token.clone(),
            payload: payload.clone(),
        });
        tracing::debug!(%id, delay_ms = delay.as_millis() as u64, "scheduled reply");

        let scheduled = ScheduledReply {
            id,
            token,
            payload,
            fires_at: Instant::now() + delay,
            slot: Arc::clone(&self.pending),
        };
        (scheduled, superseded)
    }

    /// Cancel the live reply. Returns false when idle.
    pub fn cancel(&self) -> bool {
        match self.pending.lock().take() {
            Some(previous) => {
                previous.token.supersede();
                true
            }
            None => false,
        }
    }

    /// Id of the live reply, if any
    pub fn pending_id(&self) -> Option<Uuid> {
        self.pending.lock().as_ref().map(|p| p.id)
    }

    pub fn is_idle(&self) -> bool {
        self.pending.lock().is_none()
    }
}

/// Handle to one scheduled reply, owned by the task that runs it.
///
/// Dropping the handle frees the scheduler slot if this reply still owns it.
pub struct ScheduledReply<T> {
    id: Uuid,
    token: ReplyToken,
    payload: T,
    fires_at: Instant,
    slot: Arc<Mutex<Option<PendingReply<T>>>>,
}

impl<T> ScheduledReply<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Token that trips when a newer reply supersedes this one
    pub fn token(&self) -> &ReplyToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait out the delay unless superseded first
    pub async fn wait(&self) -> WaitOutcome {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => WaitOutcome::Cancelled,
            _ = tokio::time::sleep_until(self.fires_at) => WaitOutcome::Fired,
        }
    }
}

impl<T> Drop for ScheduledReply<T> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|p| p.id == self.id) {
            *slot = None;
        }
    }
}
