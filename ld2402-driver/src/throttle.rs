//! Distance notification debounce.
//!
//! The module reports distance several times per second; hosts rarely
//! want every repeat. The throttle suppresses notifications inside a time
//! window unless the value moves by a minimum delta — a changed value
//! always gets through, a repeat does not.

/// Default suppression window
pub const DEFAULT_WINDOW_MS: u32 = 2_000;

/// Default minimum change that overrides the window (1 cm)
pub const DEFAULT_MIN_DELTA_M: f32 = 0.01;

/// Debounce state for the distance observer
#[derive(Debug, Clone, Copy)]
pub struct DistanceThrottle {
    window_ms: u32,
    min_delta_m: f32,
    last: Option<(u64, f32)>,
}

impl Default for DistanceThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS)
    }
}

impl DistanceThrottle {
    /// Create a throttle with the given window
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            min_delta_m: DEFAULT_MIN_DELTA_M,
            last: None,
        }
    }

    /// Change the suppression window
    pub fn set_window(&mut self, window_ms: u32) {
        self.window_ms = window_ms;
    }

    /// Change the minimum delta that overrides the window
    pub fn set_min_delta(&mut self, meters: f32) {
        self.min_delta_m = meters;
    }

    /// Decide whether a reading should be delivered now.
    ///
    /// The last-delivered timestamp only advances on delivery, so a long
    /// run of identical readings stays suppressed until the window
    /// elapses.
    pub fn admit(&mut self, value_m: f32, now_ms: u64) -> bool {
        if let Some((delivered_at, delivered)) = self.last {
            let inside_window = now_ms.saturating_sub(delivered_at) < u64::from(self.window_ms);
            let unchanged = (value_m - delivered).abs() < self.min_delta_m;
            if inside_window && unchanged {
                return false;
            }
        }
        self.last = Some((now_ms, value_m));
        true
    }
}
