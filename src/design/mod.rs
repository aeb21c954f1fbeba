//! Design-matrix construction.
//!
//! The design matrix has one row per frame and one column per regressor.
//! Condition regressors come first, ordered by condition id and then by FIR
//! delay; drift terms (if any) come last. Contrast weights index into this
//! column order, so it never changes for a given paradigm and builder.

mod drift;
mod response;

pub use drift::DriftModel;
pub use response::FirBasis;

use nalgebra::DMatrix;

use crate::error::{AnalysisError, Result};
use crate::paradigm::{Event, Paradigm};

/// What a design column models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regressor {
    /// FIR tap of a condition.
    Condition {
        /// Condition id
        id: u32,
        /// FIR delay in frames
        delay: usize,
    },
    /// Polynomial drift term of the given power.
    Drift(usize),
    /// Constant term of the drift basis.
    Constant,
}

/// Regressors sampled at every frame, plus their names.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    matrix: DMatrix<f64>,
    names: Vec<String>,
    regressors: Vec<Regressor>,
}

impl DesignMatrix {
    /// Assemble a design from explicit columns.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the matrix has no rows or columns,
    /// or when the number of names differs from the number of columns.
    pub fn from_parts(
        matrix: DMatrix<f64>,
        names: Vec<String>,
        regressors: Vec<Regressor>,
    ) -> Result<Self> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(AnalysisError::config("design matrix must be non-empty"));
        }
        if names.len() != matrix.ncols() || regressors.len() != matrix.ncols() {
            return Err(AnalysisError::config(format!(
                "{} names and {} regressors for {} design columns",
                names.len(),
                regressors.len(),
                matrix.ncols()
            )));
        }
        Ok(Self {
            matrix,
            names,
            regressors,
        })
    }

    /// The T × R matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Column names, in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Column descriptions, in column order.
    pub fn regressors(&self) -> &[Regressor] {
        &self.regressors
    }

    /// Number of frames (rows).
    pub fn n_frames(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of regressors (columns).
    pub fn n_regressors(&self) -> usize {
        self.matrix.ncols()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Index of a condition's first (lowest-delay) regressor.
    pub fn condition_column(&self, id: u32) -> Option<usize> {
        self.regressors
            .iter()
            .position(|r| matches!(r, Regressor::Condition { id: c, .. } if *c == id))
    }

    /// Row-major copy of the matrix, for export.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.matrix
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}

/// Builds a [`DesignMatrix`] from a paradigm.
#[derive(Debug, Clone, Default)]
pub struct DesignMatrixBuilder {
    response: FirBasis,
    drift: DriftModel,
}

impl DesignMatrixBuilder {
    /// Builder with a single zero-delay FIR tap and no drift.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the FIR tap delays.
    pub fn fir_delays(mut self, delays: Vec<usize>) -> Self {
        self.response = FirBasis::new(delays);
        self
    }

    /// Set the drift model.
    pub fn drift(mut self, drift: DriftModel) -> Self {
        self.drift = drift;
        self
    }

    /// Sample the paradigm's regressors at frame times `0..T-1`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the paradigm has no frames or the
    /// FIR basis has no taps.
    pub fn build(&self, paradigm: &Paradigm) -> Result<DesignMatrix> {
        let n_frames = paradigm.n_frames();
        if n_frames == 0 {
            return Err(AnalysisError::config("paradigm spans zero frames"));
        }
        if self.response.delays().is_empty() {
            return Err(AnalysisError::config("FIR basis has no delays"));
        }

        let frame_times: Vec<f64> = (0..n_frames).map(|t| t as f64).collect();
        let conditions = paradigm.conditions();
        let n_cols = conditions.len() * self.response.delays().len() + self.drift.n_columns();

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(n_cols);
        let mut names = Vec::with_capacity(n_cols);
        let mut regressors = Vec::with_capacity(n_cols);

        for &id in &conditions {
            let events: Vec<Event> = paradigm.condition_events(id).copied().collect();
            for &delay in self.response.delays() {
                columns.push(self.response.regressor(&events, delay, &frame_times));
                names.push(format!("c{id}_delay_{delay}"));
                regressors.push(Regressor::Condition { id, delay });
            }
        }

        for drift in self.drift.columns(&frame_times) {
            columns.push(drift.values);
            names.push(drift.name);
            regressors.push(drift.regressor);
        }

        let matrix = DMatrix::from_fn(n_frames, columns.len(), |t, c| columns[c][t]);
        DesignMatrix::from_parts(matrix, names, regressors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Acquisition;
    use crate::paradigm::TestCatalog;

    fn two_condition_paradigm() -> Paradigm {
        Paradigm::new(
            vec![
                Event {
                    condition: 0,
                    onset: 5.0,
                    duration: 2.0,
                    amplitude: 1.0,
                },
                Event {
                    condition: 1,
                    onset: 15.0,
                    duration: 2.0,
                    amplitude: 1.0,
                },
            ],
            20,
        )
        .unwrap()
    }

    #[test]
    fn test_conditions_then_drift() {
        let design = DesignMatrixBuilder::new()
            .drift(DriftModel::Polynomial { order: 2 })
            .build(&two_condition_paradigm())
            .unwrap();
        assert_eq!(design.n_frames(), 20);
        assert_eq!(
            design.names(),
            &["c0_delay_0", "c1_delay_0", "drift_1", "drift_2", "constant"]
        );
        assert_eq!(design.regressors()[2], Regressor::Drift(1));
        assert_eq!(design.regressors()[4], Regressor::Constant);
        assert_eq!(design.condition_column(1), Some(1));
        assert_eq!(design.column_index("constant"), Some(4));
    }

    #[test]
    fn test_multiple_delays_are_condition_major() {
        let design = DesignMatrixBuilder::new()
            .fir_delays(vec![0, 1])
            .build(&two_condition_paradigm())
            .unwrap();
        assert_eq!(
            design.names(),
            &["c0_delay_0", "c0_delay_1", "c1_delay_0", "c1_delay_1"]
        );
        assert_eq!(design.condition_column(1), Some(2));
        assert_eq!(design.matrix()[(6, 0)], 1.0);
        assert_eq!(design.matrix()[(8, 1)], 1.0);
    }

    #[test]
    fn test_row_count_matches_every_catalog_test() {
        let acq = Acquisition::default();
        for def in TestCatalog::standard().iter() {
            let paradigm = def.paradigm(&acq).unwrap();
            let design = DesignMatrixBuilder::new().build(&paradigm).unwrap();
            assert_eq!(design.n_frames(), def.n_runs() * acq.images_per_run);
        }
    }

    #[test]
    fn test_empty_delays_rejected() {
        let err = DesignMatrixBuilder::new()
            .fir_delays(Vec::new())
            .build(&two_condition_paradigm())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_rows_export_is_row_major() {
        let design = DesignMatrixBuilder::new()
            .build(&two_condition_paradigm())
            .unwrap();
        let rows = design.rows();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows[16], vec![0.0, 1.0]);
    }
}
