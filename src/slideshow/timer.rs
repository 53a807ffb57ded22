//! Auto-advance timer.
//!
//! A recurring tokio task that sends ticks into the session loop while the
//! slideshow is playing. The task is torn down and recreated whenever the
//! play flag or interval changes, and aborted unconditionally on drop; a
//! live timer ticking into a disposed session is a leak and a bug.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

/// A single auto-advance tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick;

pub struct AdvanceTimer {
    task: Option<tokio::task::JoinHandle<()>>,
    /// (playing, interval) the current task was built for.
    current: Option<(bool, Duration)>,
}

impl AdvanceTimer {
    pub fn new() -> Self {
        Self {
            task: None,
            current: None,
        }
    }

    /// Bring the timer in line with the playback state. Tears down and
    /// recreates the task only when the play flag or interval changed.
    pub fn reconfigure(
        &mut self,
        playing: bool,
        interval: Duration,
        tx: mpsc::UnboundedSender<Tick>,
    ) {
        if self.current == Some((playing, interval)) {
            return;
        }
        self.cancel();
        self.current = Some((playing, interval));

        if !playing {
            return;
        }

        debug!(?interval, "Auto-advance timer started");
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of tokio's interval fires immediately; skip it
            // so the first advance happens one full interval after play.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(Tick).is_err() {
                    break; // Session gone.
                }
            }
        }));
    }

    /// Stop the timer task if one is running.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.current = None;
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Default for AdvanceTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AdvanceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ticks_arrive_while_playing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = AdvanceTimer::new();
        timer.reconfigure(true, Duration::from_millis(10), tx);

        let tick = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert_eq!(tick.expect("timed out"), Some(Tick));
    }

    #[tokio::test]
    async fn test_paused_timer_does_not_tick() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = AdvanceTimer::new();
        timer.reconfigure(false, Duration::from_millis(10), tx);
        assert!(!timer.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconfigure_same_settings_keeps_task() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut timer = AdvanceTimer::new();
        timer.reconfigure(true, Duration::from_secs(5), tx.clone());
        assert!(timer.is_running());
        timer.reconfigure(true, Duration::from_secs(5), tx);
        assert!(timer.is_running());
    }

    #[tokio::test]
    async fn test_drop_aborts_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut timer = AdvanceTimer::new();
            timer.reconfigure(true, Duration::from_millis(10), tx);
        }
        // Give an aborted task a chance to (incorrectly) tick.
        tokio::time::sleep(Duration::from_millis(50)).await;
        while rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(rx.try_recv().is_err());
    }
}
