use crate::domain::countdown::{Countdown, countdown_at};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// One ticking task shared by every visible countdown.
///
/// The clock publishes "now" once per tick; each [`CountdownSubscription`]
/// formats its own deadline against that value. Dropping the clock stops the
/// task and ends every subscription's `changed` stream.
pub struct SharedClock {
    receiver: watch::Receiver<DateTime<Utc>>,
    task: JoinHandle<()>,
}

impl SharedClock {
    pub fn start(tick: Duration) -> Self {
        Self::with_now_provider(tick, Arc::new(Utc::now))
    }

    pub fn with_now_provider(tick: Duration, now_provider: NowProvider) -> Self {
        let (sender, receiver) = watch::channel(now_provider());
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately and the initial value is
            // already published.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if sender.send(now_provider()).is_err() {
                    break;
                }
            }
        });
        Self { receiver, task }
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.receiver.borrow()
    }

    pub fn subscribe(&self, deadline: DateTime<Utc>) -> CountdownSubscription {
        CountdownSubscription {
            deadline,
            receiver: self.receiver.clone(),
        }
    }
}

impl Drop for SharedClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A single row's view of the shared clock.
pub struct CountdownSubscription {
    deadline: DateTime<Utc>,
    receiver: watch::Receiver<DateTime<Utc>>,
}

impl CountdownSubscription {
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    pub fn current(&self) -> Countdown {
        countdown_at(self.deadline, *self.receiver.borrow())
    }

    /// Waits for the next tick. Returns `None` once the clock is gone.
    pub async fn changed(&mut self) -> Option<Countdown> {
        self.receiver.changed().await.ok()?;
        let now = *self.receiver.borrow_and_update();
        Some(countdown_at(self.deadline, now))
    }
}
