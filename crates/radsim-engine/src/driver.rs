//! Wall-clock driver for a served engine.
//!
//! The engine only knows a virtual clock. The server runs [`run_clock`] in a
//! background task to feed it real elapsed time and publish whatever ticks,
//! timeouts and restores that produced.

use std::time::Duration;

use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::api::AppState;

/// Default period of the clock driver.
pub const DEFAULT_CLOCK_PERIOD: Duration = Duration::from_millis(100);

/// Advances the engine by `elapsed` and publishes the resulting events.
pub async fn step(state: &AppState, elapsed: Duration) {
    let mut engine = state.engine.lock().await;
    if let Err(e) = engine.advance(elapsed) {
        warn!(error = %e, "Clock step failed");
    }
    let events = engine.drain_events();
    drop(engine);

    if !events.is_empty() {
        state.publish(events);
    }
}

/// Feeds wall-clock time to the engine every `period` until the task is
/// dropped.
pub async fn run_clock(state: AppState, period: Duration) {
    debug!(period_ms = period.as_millis(), "Clock driver started");

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        step(&state, now.duration_since(last)).await;
        last = now;
    }
}
