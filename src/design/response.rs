//! Finite impulse response (FIR) basis.
//!
//! No response shape is assumed. Each FIR tap `d` produces one regressor per
//! condition: the condition's event boxcars, averaged over the one-frame
//! interval that ends `d` frames before the sample time.
//!
//! ```text
//! x_d[t] = Σ_events amplitude · |[t - d - 1, t - d] ∩ [onset, onset + duration]|
//! ```

use crate::paradigm::Event;

/// FIR basis with a set of tap delays (in frames).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirBasis {
    delays: Vec<usize>,
}

impl Default for FirBasis {
    fn default() -> Self {
        Self { delays: vec![0] }
    }
}

impl FirBasis {
    /// Create a basis with the given tap delays.
    pub fn new(delays: Vec<usize>) -> Self {
        Self { delays }
    }

    /// Tap delays in frames.
    pub fn delays(&self) -> &[usize] {
        &self.delays
    }

    /// Sample one tap's regressor for a set of events at the given frame times.
    pub fn regressor(&self, events: &[Event], delay: usize, frame_times: &[f64]) -> Vec<f64> {
        let shift = delay as f64;
        frame_times
            .iter()
            .map(|&t| {
                let window_end = t - shift;
                let window_start = window_end - 1.0;
                events
                    .iter()
                    .map(|ev| ev.amplitude * overlap(window_start, window_end, ev.onset, ev.end()))
                    .sum::<f64>()
            })
            .collect()
    }
}

/// Length of the intersection of two closed intervals.
fn overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(n: usize) -> Vec<f64> {
        (0..n).map(|t| t as f64).collect()
    }

    #[test]
    fn test_boxcar_lags_one_frame() {
        let events = [Event {
            condition: 0,
            onset: 5.0,
            duration: 2.0,
            amplitude: 1.0,
        }];
        let x = FirBasis::default().regressor(&events, 0, &frames(10));
        assert_eq!(x, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_delay_shifts_regressor() {
        let events = [Event {
            condition: 0,
            onset: 2.0,
            duration: 1.0,
            amplitude: 0.5,
        }];
        let x = FirBasis::new(vec![0, 2]).regressor(&events, 2, &frames(8));
        assert_eq!(x, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_fractional_onset_gives_partial_frames() {
        let events = [Event {
            condition: 0,
            onset: 1.5,
            duration: 1.0,
            amplitude: 2.0,
        }];
        let x = FirBasis::default().regressor(&events, 0, &frames(5));
        assert_eq!(x, vec![0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_overlapping_events_add() {
        let events = [
            Event {
                condition: 0,
                onset: 0.0,
                duration: 4.0,
                amplitude: 1.0,
            },
            Event {
                condition: 0,
                onset: 2.0,
                duration: 1.0,
                amplitude: 0.5,
            },
        ];
        let x = FirBasis::default().regressor(&events, 0, &frames(5));
        assert_eq!(x, vec![0.0, 1.0, 1.0, 1.5, 1.0]);
    }
}
