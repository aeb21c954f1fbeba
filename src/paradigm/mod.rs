//! Experimental paradigms: the stimulus events of each test.
//!
//! A [`Paradigm`] is an ordered list of [`Event`]s. Each event belongs to a
//! condition, starts at a frame onset, lasts a number of frames, and carries
//! an amplitude. The five tests of the protocol are described as data in
//! [`catalog`]; [`TestDefinition::paradigm`] turns a definition plus the
//! acquisition constants into a validated paradigm.

pub mod catalog;

pub use catalog::{
    ContrastDefinition, EventGenerator, RowSelectors, TestCatalog, TestDefinition,
};

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

/// A single stimulus block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Condition identifier; one design regressor per distinct id.
    pub condition: u32,
    /// Onset in frames from the start of the concatenated series.
    pub onset: f64,
    /// Duration in frames.
    pub duration: f64,
    /// Non-negative amplitude.
    pub amplitude: f64,
}

impl Event {
    /// Frame at which the event ends.
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

/// Validated stimulus events of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paradigm {
    events: Vec<Event>,
    n_frames: usize,
}

impl Paradigm {
    /// Build a paradigm, checking every event against the frame count.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when an event is negative, non-finite,
    /// or runs past `n_frames`.
    pub fn new(events: Vec<Event>, n_frames: usize) -> Result<Self> {
        if events.is_empty() {
            return Err(AnalysisError::config("paradigm has no events"));
        }
        for (i, ev) in events.iter().enumerate() {
            let finite = ev.onset.is_finite() && ev.duration.is_finite() && ev.amplitude.is_finite();
            if !finite || ev.onset < 0.0 || ev.duration < 0.0 {
                return Err(AnalysisError::config(format!(
                    "event {i} has invalid timing (onset {}, duration {})",
                    ev.onset, ev.duration
                )));
            }
            if ev.amplitude < 0.0 {
                return Err(AnalysisError::config(format!(
                    "event {i} has negative amplitude {}",
                    ev.amplitude
                )));
            }
            if ev.end() > n_frames as f64 {
                return Err(AnalysisError::config(format!(
                    "event {i} ends at frame {} but only {n_frames} frames are available",
                    ev.end()
                )));
            }
        }
        Ok(Self { events, n_frames })
    }

    /// Events in the order they were generated.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Length of the time series the paradigm describes.
    pub fn n_frames(&self) -> usize {
        self.n_frames
    }

    /// Distinct condition ids in ascending order.
    pub fn conditions(&self) -> Vec<u32> {
        self.events
            .iter()
            .map(|e| e.condition)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Events of one condition.
    pub fn condition_events(&self, condition: u32) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.condition == condition)
    }

    /// Condition ids, one per event.
    pub fn condition_ids(&self) -> Vec<u32> {
        self.events.iter().map(|e| e.condition).collect()
    }

    /// Onsets, one per event.
    pub fn onsets(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.onset).collect()
    }

    /// Durations, one per event.
    pub fn durations(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.duration).collect()
    }

    /// Amplitudes, one per event.
    pub fn amplitudes(&self) -> Vec<f64> {
        self.events.iter().map(|e| e.amplitude).collect()
    }
}

/// Compress concentrations spanning several orders of magnitude.
///
/// ```text
/// a' = max(0, 1 + 0.1 * log10(a))
/// ```
///
/// Total over all inputs: zero, negative, and NaN amplitudes map to 0.
pub fn normalize_amplitude(amplitude: f64) -> f64 {
    let value = 1.0 + 0.1 * amplitude.log10();
    // f64::max ignores NaN, so log10 of a negative input also lands on 0.
    value.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(condition: u32, onset: f64, duration: f64) -> Event {
        Event {
            condition,
            onset,
            duration,
            amplitude: 1.0,
        }
    }

    #[test]
    fn test_normalize_amplitude_reference_values() {
        assert!((normalize_amplitude(0.01) - 0.8).abs() < 1e-12);
        assert!((normalize_amplitude(1.0) - 1.0).abs() < 1e-12);
        assert!((normalize_amplitude(1e-6) - 0.4).abs() < 1e-12);
        assert_eq!(normalize_amplitude(1e-12), 0.0);
    }

    #[test]
    fn test_normalize_amplitude_degenerate_inputs() {
        assert_eq!(normalize_amplitude(0.0), 0.0);
        assert_eq!(normalize_amplitude(-1.0), 0.0);
        assert_eq!(normalize_amplitude(f64::NAN), 0.0);
    }

    #[test]
    fn test_rejects_event_past_end() {
        let err = Paradigm::new(vec![event(0, 15.0, 6.0)], 20).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_event_ending_on_last_frame_is_valid() {
        let p = Paradigm::new(vec![event(0, 15.0, 5.0)], 20).unwrap();
        assert_eq!(p.n_frames(), 20);
    }

    #[test]
    fn test_conditions_sorted_and_unique() {
        let p = Paradigm::new(
            vec![event(2, 0.0, 1.0), event(0, 1.0, 1.0), event(2, 3.0, 1.0)],
            10,
        )
        .unwrap();
        assert_eq!(p.conditions(), vec![0, 2]);
        assert_eq!(p.condition_events(2).count(), 2);
    }

    #[test]
    fn test_rejects_empty_paradigm() {
        assert!(Paradigm::new(Vec::new(), 10).is_err());
    }
}
