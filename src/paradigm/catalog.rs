//! The five tests of the protocol, described as data.
//!
//! | Test | Question | Runs | Drift | Contrast |
//! |------|----------|------|-------|----------|
//! | 1 | odor vs. no odor, asleep | 1 | polynomial | +odor |
//! | 2 | odor vs. no odor, awake | 1 | polynomial | +odor |
//! | 3 | concentration, asleep | 4 | none | +odor (parametric) |
//! | 4 | concentration, awake | 4 | none | +odor (parametric) |
//! | 5 | asleep vs. awake | 2 | none | +asleep −awake |
//!
//! Row selectors index the acquisition table: the frames of wavelength 1
//! are divided by those of wavelength 2 by the (external) ratio step.

use serde::{Deserialize, Serialize};

use super::{normalize_amplitude, Event, Paradigm};
use crate::config::Acquisition;
use crate::error::{AnalysisError, Result};

/// Rows of the acquisition table holding each wavelength's frames, one per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSelectors {
    /// Rows of the first wavelength (numerator of the ratio).
    pub lambda1: Vec<usize>,
    /// Rows of the second wavelength (denominator of the ratio).
    pub lambda2: Vec<usize>,
}

/// How a test's events are laid out over its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventGenerator {
    /// One run, two odor presentations at full concentration.
    SingleRun,
    /// One run per concentration: two odor presentations carrying the
    /// normalized concentration plus a whole-run baseline per run.
    GradedConcentration,
    /// Two runs (asleep, awake): two odor presentations each plus a
    /// whole-run baseline per state.
    SleepWake,
}

/// Which regressors a test's contrast weighs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContrastDefinition {
    /// +1 on the condition's first regressor.
    Condition(u32),
    /// +1 on the first condition, −1 on the second.
    Difference(u32, u32),
}

/// One row of the test table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Test index, 1-based.
    pub id: u8,
    /// Human-readable question the test answers.
    pub description: String,
    /// Acquisition-table rows feeding the ratio volume.
    pub rows: RowSelectors,
    /// Event layout.
    pub generator: EventGenerator,
    /// Whether a polynomial drift basis is appended to the design.
    pub polynomial_drift: bool,
    /// Contrast to test.
    pub contrast: ContrastDefinition,
}

impl TestDefinition {
    /// Number of runs concatenated in this test.
    pub fn n_runs(&self) -> usize {
        self.rows.lambda1.len()
    }

    /// Length of the concatenated time series.
    pub fn n_frames(&self, acq: &Acquisition) -> usize {
        self.n_runs() * acq.images_per_run
    }

    /// Generate and validate the test's events.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the row selectors disagree, the
    /// number of concentrations does not match the number of graded runs,
    /// or an event runs past the end of the series.
    pub fn paradigm(&self, acq: &Acquisition) -> Result<Paradigm> {
        if self.rows.lambda1.len() != self.rows.lambda2.len() || self.rows.lambda1.is_empty() {
            return Err(AnalysisError::config(format!(
                "test {}: wavelength row selectors must be non-empty and of equal length",
                self.id
            )));
        }
        if acq.onsets.len() != acq.durations.len() {
            return Err(AnalysisError::config("onset and duration lists differ in length"));
        }

        let per_run = acq.images_per_run as f64;
        let odor_events = |offset: f64, amplitude: f64| {
            acq.onsets
                .iter()
                .zip(&acq.durations)
                .map(move |(&onset, &duration)| Event {
                    condition: 0,
                    onset: offset + onset,
                    duration,
                    amplitude,
                })
        };
        let baseline = |condition: u32, offset: f64| Event {
            condition,
            onset: offset,
            duration: per_run,
            amplitude: 1.0,
        };

        let events: Vec<Event> = match self.generator {
            EventGenerator::SingleRun => odor_events(0.0, 1.0).collect(),
            EventGenerator::GradedConcentration => {
                if acq.amplitudes.len() != self.n_runs() {
                    return Err(AnalysisError::config(format!(
                        "test {}: {} concentrations for {} runs",
                        self.id,
                        acq.amplitudes.len(),
                        self.n_runs()
                    )));
                }
                let mut events = Vec::with_capacity(3 * self.n_runs());
                for (run, &concentration) in acq.amplitudes.iter().enumerate() {
                    let offset = run as f64 * per_run;
                    events.extend(odor_events(offset, normalize_amplitude(concentration)));
                    events.push(baseline(run as u32 + 1, offset));
                }
                events
            }
            EventGenerator::SleepWake => {
                let mut events = Vec::with_capacity(3 * self.n_runs());
                for state in 0..self.n_runs() {
                    let offset = state as f64 * per_run;
                    events.extend(odor_events(offset, 1.0));
                    events.push(baseline(state as u32 + 1, offset));
                }
                events
            }
        };

        Paradigm::new(events, self.n_frames(acq))
    }
}

/// Ordered collection of test definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCatalog {
    tests: Vec<TestDefinition>,
}

impl Default for TestCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl TestCatalog {
    /// The five tests of the sleep/odor protocol.
    pub fn standard() -> Self {
        let rows = |lambda1: &[usize], lambda2: &[usize]| RowSelectors {
            lambda1: lambda1.to_vec(),
            lambda2: lambda2.to_vec(),
        };
        Self {
            tests: vec![
                TestDefinition {
                    id: 1,
                    description: "Odor vs. no odor: asleep (max. concentration)".to_string(),
                    rows: rows(&[9], &[10]),
                    generator: EventGenerator::SingleRun,
                    polynomial_drift: true,
                    contrast: ContrastDefinition::Condition(0),
                },
                TestDefinition {
                    id: 2,
                    description: "Odor vs. no odor: awake (max. concentration)".to_string(),
                    rows: rows(&[19], &[20]),
                    generator: EventGenerator::SingleRun,
                    polynomial_drift: true,
                    contrast: ContrastDefinition::Condition(0),
                },
                TestDefinition {
                    id: 3,
                    description: "Effect of odor concentration: asleep".to_string(),
                    rows: rows(&[3, 5, 7, 9], &[4, 6, 8, 10]),
                    generator: EventGenerator::GradedConcentration,
                    polynomial_drift: false,
                    contrast: ContrastDefinition::Condition(0),
                },
                TestDefinition {
                    id: 4,
                    description: "Effect of odor concentration: awake".to_string(),
                    rows: rows(&[13, 15, 17, 19], &[14, 16, 18, 20]),
                    generator: EventGenerator::GradedConcentration,
                    polynomial_drift: false,
                    contrast: ContrastDefinition::Condition(0),
                },
                TestDefinition {
                    id: 5,
                    description: "Asleep vs. awake (max. concentration)".to_string(),
                    rows: rows(&[9, 19], &[10, 20]),
                    generator: EventGenerator::SleepWake,
                    polynomial_drift: false,
                    contrast: ContrastDefinition::Difference(1, 2),
                },
            ],
        }
    }

    /// Build a catalog from custom definitions.
    pub fn new(tests: Vec<TestDefinition>) -> Self {
        Self { tests }
    }

    /// Look up a test by its 1-based index.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unknown index.
    pub fn get(&self, id: u8) -> Result<&TestDefinition> {
        self.tests
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| AnalysisError::config(format!("unknown test index {id}")))
    }

    /// All definitions in table order.
    pub fn iter(&self) -> impl Iterator<Item = &TestDefinition> {
        self.tests.iter()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether the catalog has no definitions.
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }
}
