//! Synthetic progress for the extraction wait.
//!
//! The remote call gives no progress signal, so the percentage shown while a
//! task runs is a pure function of elapsed ticks: fast up to 40%, slower up
//! to 85%, then a crawl that never passes 98%. Only a successful task reaches
//! 100, and the orchestrator sets that value itself.
//!
//! [`ProgressSimulator::start`] drives two independent timers (percent and
//! phase label) on one Tokio task. Both stop together when the returned
//! [`SimulatorHandle`] is stopped or dropped.
//!
//! ```rust
//! use edgequake_pdf2office::progress::{progress_at, PROGRESS_CEILING};
//!
//! assert_eq!(progress_at(0), 0.0);
//! assert_eq!(progress_at(20), 40.0);
//! assert_eq!(progress_at(110), 85.0);
//! assert_eq!(progress_at(100_000), PROGRESS_CEILING);
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Highest percentage the simulator will ever report.
pub const PROGRESS_CEILING: f32 = 98.0;

/// Phase labels, shown in order and then repeated.
pub const PHASE_LABELS: [&str; 5] = [
    "Ignition sequence started",
    "Scanning document topography",
    "Mapping data tracks",
    "Assembling output modules",
    "Calibrating cell alignment",
];

const FAST_UNTIL_TICK: u64 = 20;
const SLOW_UNTIL_TICK: u64 = 110;

/// Simulated percent after `ticks` progress ticks.
///
/// Non-decreasing in `ticks` and bounded by [`PROGRESS_CEILING`].
pub fn progress_at(ticks: u64) -> f32 {
    let pct = if ticks <= FAST_UNTIL_TICK {
        2.0 * ticks as f64
    } else if ticks <= SLOW_UNTIL_TICK {
        40.0 + 0.5 * (ticks - FAST_UNTIL_TICK) as f64
    } else {
        85.0 + 0.05 * (ticks - SLOW_UNTIL_TICK) as f64
    };
    (pct as f32).min(PROGRESS_CEILING)
}

/// Label shown after `rotations` phase ticks.
pub fn phase_at(rotations: u64) -> &'static str {
    PHASE_LABELS[(rotations % PHASE_LABELS.len() as u64) as usize]
}

/// One simulator output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    Percent(f32),
    Phase(&'static str),
}

/// Receiver of simulator events. Called from the simulator's task.
pub type ProgressSink = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Tick driver for [`progress_at`] and [`phase_at`].
pub struct ProgressSimulator;

impl ProgressSimulator {
    /// Start both timers. The first events arrive one interval after the
    /// call; the caller is expected to publish the initial state itself.
    pub fn start(progress_tick: Duration, phase_tick: Duration, sink: ProgressSink) -> SimulatorHandle {
        let token = CancellationToken::new();
        let cancel = token.clone();

        let join = tokio::spawn(async move {
            let now = Instant::now();
            let mut progress = interval_at(now + progress_tick, progress_tick);
            let mut phase = interval_at(now + phase_tick, phase_tick);
            progress.set_missed_tick_behavior(MissedTickBehavior::Delay);
            phase.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut ticks: u64 = 0;
            let mut rotations: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = progress.tick() => {
                        ticks += 1;
                        sink(ProgressEvent::Percent(progress_at(ticks)));
                    }
                    _ = phase.tick() => {
                        rotations += 1;
                        sink(ProgressEvent::Phase(phase_at(rotations)));
                    }
                }
            }
            trace!("Progress simulator stopped after {} ticks", ticks);
        });

        SimulatorHandle {
            token,
            join: Some(join),
        }
    }
}

/// Owner of a running simulator. Dropping it stops the timers.
pub struct SimulatorHandle {
    token: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl SimulatorHandle {
    /// Stop both timers. No event is delivered after the returned future
    /// completes.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }

    /// Request a stop without waiting for the timer task to exit.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for SimulatorHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn pace_breakpoints() {
        assert_eq!(progress_at(0), 0.0);
        assert_eq!(progress_at(10), 20.0);
        assert_eq!(progress_at(20), 40.0);
        assert_eq!(progress_at(110), 85.0);
        assert_eq!(progress_at(370), 98.0);
        assert_eq!(progress_at(u64::MAX / 2), PROGRESS_CEILING);
    }

    #[test]
    fn pace_is_monotone_and_capped() {
        let mut prev = 0.0;
        for t in 0..2_000 {
            let p = progress_at(t);
            assert!(p >= prev, "tick {t}: {p} < {prev}");
            assert!(p <= PROGRESS_CEILING);
            prev = p;
        }
    }

    #[test]
    fn pace_slows_down() {
        let fast = progress_at(10) - progress_at(0);
        let slow = progress_at(60) - progress_at(50);
        let crawl = progress_at(210) - progress_at(200);
        assert!(fast > slow && slow > crawl);
    }

    #[test]
    fn phases_rotate_cyclically() {
        assert_eq!(phase_at(0), PHASE_LABELS[0]);
        assert_eq!(phase_at(4), PHASE_LABELS[4]);
        assert_eq!(phase_at(5), PHASE_LABELS[0]);
        assert_eq!(phase_at(12), PHASE_LABELS[2]);
    }

    fn recording_sink() -> (ProgressSink, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let sink: ProgressSink = Arc::new(move |e| captured.lock().unwrap().push(e));
        (sink, events)
    }

    #[tokio::test(start_paused = true)]
    async fn simulator_emits_on_both_timers() {
        let (sink, events) = recording_sink();
        let handle = ProgressSimulator::start(
            Duration::from_millis(100),
            Duration::from_millis(1500),
            sink,
        );

        tokio::time::sleep(Duration::from_millis(1550)).await;
        handle.stop().await;

        let events = events.lock().unwrap();
        let percents: Vec<f32> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Percent(p) => Some(*p),
                _ => None,
            })
            .collect();
        let phases: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Phase(l) => Some(*l),
                _ => None,
            })
            .collect();

        assert_eq!(percents.len(), 15);
        assert_eq!(percents[0], 2.0);
        assert!(percents.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(phases, vec![PHASE_LABELS[1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_silences_both_timers() {
        let (sink, events) = recording_sink();
        let handle = ProgressSimulator::start(
            Duration::from_millis(100),
            Duration::from_millis(150),
            sink,
        );
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop().await;
        let seen = events.lock().unwrap().len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(events.lock().unwrap().len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_simulator() {
        let (sink, events) = recording_sink();
        let handle = ProgressSimulator::start(
            Duration::from_millis(100),
            Duration::from_millis(1500),
            sink,
        );
        assert!(!handle.is_stopped());
        drop(handle);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(events.lock().unwrap().is_empty());
    }
}
