use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    Tick { remaining: Duration },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Running,
    Paused,
    Cancelled,
}

/// One-second countdown running as its own task.
///
/// Pausing stops the clock; resuming starts a fresh one-second tick, so a
/// partially elapsed second is not counted. The task is aborted when the
/// countdown is dropped.
#[derive(Debug)]
pub struct Countdown {
    control: watch::Sender<Control>,
    events: mpsc::UnboundedReceiver<CountdownEvent>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn start(total: Duration) -> Self {
        let (control, control_rx) = watch::channel(Control::Running);
        let (events_tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(total, control_rx, events_tx));
        Self {
            control,
            events,
            task,
        }
    }

    pub fn pause(&self) {
        self.set(Control::Paused);
    }

    pub fn resume(&self) {
        self.set(Control::Running);
    }

    pub fn cancel(&self) {
        self.set(Control::Cancelled);
    }

    fn set(&self, next: Control) {
        self.control.send_if_modified(|current| {
            if *current == Control::Cancelled || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.control.borrow() == Control::Paused
    }

    /// Next tick or the final `Finished`; `None` once the task has stopped.
    pub async fn next_event(&mut self) -> Option<CountdownEvent> {
        self.events.recv().await
    }

    /// Wait until the countdown reaches zero.
    ///
    /// Returns `false` if it was cancelled first.
    pub async fn finished(&mut self) -> bool {
        while let Some(event) = self.events.recv().await {
            if event == CountdownEvent::Finished {
                return true;
            }
        }
        false
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    total: Duration,
    mut control: watch::Receiver<Control>,
    events: mpsc::UnboundedSender<CountdownEvent>,
) {
    let mut remaining = total;
    if remaining.is_zero() {
        let _ = events.send(CountdownEvent::Finished);
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let state = *control.borrow_and_update();
        match state {
            Control::Cancelled => {
                debug!(?remaining, "countdown cancelled");
                return;
            }
            Control::Paused => {
                if control.changed().await.is_err() {
                    return;
                }
                ticker.reset();
                continue;
            }
            Control::Running => {}
        }

        tokio::select! {
            changed = control.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            _ = ticker.tick() => {
                remaining = remaining.saturating_sub(TICK);
                if remaining.is_zero() {
                    let _ = events.send(CountdownEvent::Finished);
                    return;
                }
                if events.send(CountdownEvent::Tick { remaining }).is_err() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_down_to_finished() {
        let mut countdown = Countdown::start(Duration::from_secs(3));
        assert_eq!(
            countdown.next_event().await,
            Some(CountdownEvent::Tick {
                remaining: Duration::from_secs(2)
            })
        );
        assert_eq!(
            countdown.next_event().await,
            Some(CountdownEvent::Tick {
                remaining: Duration::from_secs(1)
            })
        );
        assert_eq!(countdown.next_event().await, Some(CountdownEvent::Finished));
        assert_eq!(countdown.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_freezes_remaining_time() {
        let started = Instant::now();
        let mut countdown = Countdown::start(Duration::from_secs(2));
        assert!(matches!(
            countdown.next_event().await,
            Some(CountdownEvent::Tick { .. })
        ));

        countdown.pause();
        assert!(countdown.is_paused());
        tokio::time::sleep(Duration::from_secs(30)).await;
        countdown.resume();

        assert!(countdown.finished().await);
        assert!(started.elapsed() >= Duration::from_secs(32));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_without_finishing() {
        let mut countdown = Countdown::start(Duration::from_secs(10));
        countdown.cancel();
        assert!(!countdown.finished().await);
    }
}
