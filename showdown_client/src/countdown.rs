//! Round countdown.
//!
//! Each client times its own round; nothing here is synchronized with the
//! server or other clients.

/// Countdown decremented by real elapsed time while running.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTimer {
    length_secs: f32,
    remaining_secs: f32,
    running: bool,
}

impl RoundTimer {
    pub fn new(length_secs: f32) -> Self {
        Self {
            length_secs,
            remaining_secs: length_secs,
            running: false,
        }
    }

    /// Restarts from the full length.
    pub fn start(&mut self) {
        self.remaining_secs = self.length_secs;
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Stops and refills the timer.
    pub fn reset(&mut self) {
        self.remaining_secs = self.length_secs;
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> f32 {
        self.remaining_secs
    }

    /// Whole seconds to show, never negative.
    pub fn display_secs(&self) -> u32 {
        self.remaining_secs.max(0.0).round() as u32
    }

    /// Advances by `dt_sec`. Returns `true` on the frame the timer runs out,
    /// after which it stops.
    pub fn advance(&mut self, dt_sec: f32) -> bool {
        if !self.running {
            return false;
        }
        self.remaining_secs -= dt_sec;
        if self.remaining_secs <= 0.0 {
            self.running = false;
            return true;
        }
        false
    }
}
