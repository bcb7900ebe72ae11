//! Named one-shot timers for the coordinator.

use crate::machine::TimerId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Called when a timer elapses, with the generation it was started under.
pub type FireFn = Arc<dyn Fn(TimerId, u64) + Send + Sync>;

struct LiveTimer {
    generation: u64,
    task: JoinHandle<()>,
}

/// At most one live timer per [`TimerId`].
///
/// Every start gets a fresh generation. A fire is only honoured by
/// [`TimerSet::complete`] when its generation is still current, so a timer
/// that was replaced or cancelled after its task already fired cannot act.
pub struct TimerSet {
    on_fire: FireFn,
    live: HashMap<TimerId, LiveTimer>,
    next_generation: u64,
}

impl TimerSet {
    pub fn new(on_fire: FireFn) -> Self {
        Self {
            on_fire,
            live: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Start (or restart) a timer. Must be called from within a tokio runtime.
    pub fn start(&mut self, id: TimerId, duration: Duration) -> u64 {
        self.cancel(id);
        self.next_generation += 1;
        let generation = self.next_generation;

        let on_fire = self.on_fire.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_fire(id, generation);
        });
        self.live.insert(id, LiveTimer { generation, task });
        generation
    }

    pub fn cancel(&mut self, id: TimerId) {
        if let Some(timer) = self.live.remove(&id) {
            timer.task.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.live.drain() {
            timer.task.abort();
        }
    }

    /// Consume a fire. False when the timer was cancelled or replaced since.
    pub fn complete(&mut self, id: TimerId, generation: u64) -> bool {
        match self.live.get(&id) {
            Some(timer) if timer.generation == generation => {
                self.live.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.live.contains_key(&id)
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn timer_set() -> (TimerSet, mpsc::UnboundedReceiver<(TimerId, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timers = TimerSet::new(Arc::new(move |id, generation| {
            let _ = tx.send((id, generation));
        }));
        (timers, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once() {
        let (mut timers, mut rx) = timer_set();
        let generation = timers.start(TimerId::StartDebounce, Duration::from_secs(5));
        assert!(timers.is_live(TimerId::StartDebounce));

        let (id, fired) = rx.recv().await.unwrap();
        assert_eq!(id, TimerId::StartDebounce);
        assert_eq!(fired, generation);
        assert!(timers.complete(id, fired));
        assert!(!timers.is_live(TimerId::StartDebounce));
        assert!(!timers.complete(id, fired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_supersedes_previous() {
        let (mut timers, mut rx) = timer_set();
        let first = timers.start(TimerId::StopGrace, Duration::from_secs(15));
        tokio::time::sleep(Duration::from_secs(10)).await;
        let second = timers.start(TimerId::StopGrace, Duration::from_secs(15));
        assert_ne!(first, second);

        let (_, fired) = rx.recv().await.unwrap();
        assert_eq!(fired, second);
        assert!(!timers.complete(TimerId::StopGrace, first));
        assert!(timers.complete(TimerId::StopGrace, second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut timers, mut rx) = timer_set();
        timers.start(TimerId::StartDebounce, Duration::from_secs(5));
        timers.cancel(TimerId::StartDebounce);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_is_rejected() {
        let (mut timers, _rx) = timer_set();
        let generation = timers.start(TimerId::StartDebounce, Duration::from_secs(5));
        timers.cancel(TimerId::StartDebounce);
        assert!(!timers.complete(TimerId::StartDebounce, generation));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_are_independent() {
        let (mut timers, mut rx) = timer_set();
        timers.start(TimerId::StartDebounce, Duration::from_secs(5));
        timers.start(TimerId::StopGrace, Duration::from_secs(15));
        timers.cancel(TimerId::StopGrace);

        let (id, _) = rx.recv().await.unwrap();
        assert_eq!(id, TimerId::StartDebounce);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
