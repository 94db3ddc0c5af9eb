//! Per-exercise countdown.
//!
//! The timer counts whole seconds. It only decrements after an explicit
//! [`CountdownTimer::start`], holds while paused, never goes below zero and
//! stays frozen once stopped.

use serde::{Deserialize, Serialize};

/// Run state of the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// Armed but not yet started.
    #[default]
    Armed,
    /// Decrementing once per tick.
    Running,
    /// Held by a confirmation dialog.
    Paused,
    /// Frozen for the rest of the attempt.
    Stopped,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    /// The timer is not running; nothing changed.
    Idle,
    /// One second was taken off; the value is the new remainder.
    Decremented(u32),
    /// The remainder just reached zero.
    Expired,
}

/// Countdown for one exercise attempt.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    budget: u32,
    remaining: u32,
    state: TimerState,
}

impl CountdownTimer {
    /// Creates an armed timer with `budget` seconds.
    #[must_use]
    pub const fn new(budget: u32) -> Self {
        Self {
            budget,
            remaining: budget,
            state: TimerState::Armed,
        }
    }

    /// Seconds left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Budget the timer was last reset to.
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    /// Current run state.
    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Returns `true` while the timer decrements on tick.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Seconds consumed since the last reset.
    #[must_use]
    pub const fn elapsed_secs(&self) -> u32 {
        self.budget.saturating_sub(self.remaining)
    }

    /// Begins counting down. Only an armed timer can start.
    pub fn start(&mut self) -> bool {
        if self.state == TimerState::Armed && self.remaining > 0 {
            self.state = TimerState::Running;
            true
        } else {
            false
        }
    }

    /// Holds a running timer.
    pub fn pause(&mut self) -> bool {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
            true
        } else {
            false
        }
    }

    /// Releases a paused timer.
    pub fn resume(&mut self) -> bool {
        if self.state == TimerState::Paused {
            self.state = TimerState::Running;
            true
        } else {
            false
        }
    }

    /// Freezes the timer for the rest of the attempt.
    pub fn stop(&mut self) {
        self.state = TimerState::Stopped;
    }

    /// Re-arms the timer with a fresh budget.
    pub fn reset(&mut self, budget: u32) {
        self.budget = budget;
        self.remaining = budget;
        self.state = TimerState::Armed;
    }

    /// Advances the countdown by one second.
    pub fn tick(&mut self) -> TimerTick {
        if self.state != TimerState::Running || self.remaining == 0 {
            return TimerTick::Idle;
        }
        self.remaining -= 1;
        if self.remaining == 0 {
            self.state = TimerState::Stopped;
            TimerTick::Expired
        } else {
            TimerTick::Decremented(self.remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_armed_timer_does_not_tick() {
        let mut timer = CountdownTimer::new(60);
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.remaining(), 60);
    }

    #[test]
    fn test_running_timer_decrements_by_one() {
        let mut timer = CountdownTimer::new(60);
        assert!(timer.start());
        assert_eq!(timer.tick(), TimerTick::Decremented(59));
        assert_eq!(timer.tick(), TimerTick::Decremented(58));
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn test_timer_expires_at_zero_and_stays_there() {
        let mut timer = CountdownTimer::new(2);
        timer.start();
        assert_eq!(timer.tick(), TimerTick::Decremented(1));
        assert_eq!(timer.tick(), TimerTick::Expired);
        assert_eq!(timer.remaining(), 0);
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.remaining(), 0);
        assert_eq!(timer.elapsed_secs(), 2);
    }

    #[test]
    fn test_pause_and_resume() {
        let mut timer = CountdownTimer::new(10);
        timer.start();
        assert!(timer.pause());
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.remaining(), 10);
        assert!(timer.resume());
        assert_eq!(timer.tick(), TimerTick::Decremented(9));
    }

    #[test]
    fn test_pause_requires_running() {
        let mut timer = CountdownTimer::new(10);
        assert!(!timer.pause());
        assert!(!timer.resume());
    }

    #[test]
    fn test_stopped_timer_is_frozen() {
        let mut timer = CountdownTimer::new(10);
        timer.start();
        timer.tick();
        timer.stop();
        assert_eq!(timer.tick(), TimerTick::Idle);
        assert_eq!(timer.remaining(), 9);
        assert!(!timer.start());
        assert!(!timer.resume());
    }

    #[test]
    fn test_reset_rearms() {
        let mut timer = CountdownTimer::new(10);
        timer.start();
        timer.tick();
        timer.stop();
        timer.reset(60);
        assert_eq!(timer.state(), TimerState::Armed);
        assert_eq!(timer.remaining(), 60);
        assert_eq!(timer.elapsed_secs(), 0);
        assert!(timer.start());
    }
}
