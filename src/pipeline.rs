//! Main `Pipeline` entry point and builder.
//!
//! One test runs through these stages, in order:
//!
//! ```text
//! Preprocess → BuildParadigm → BuildDesignMatrix → LoadVolume → ComputeMask
//!            → ScaleData → FitGlm → ComputeContrast → Export
//! ```
//!
//! Preprocessing runs only when enabled. A failure stops that test and is
//! reported with its stage; other tests are unaffected. An empty mask is
//! logged and reported as a skip rather than a failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::{NoiseModel, PipelineConfig};
use crate::constants::VOLUME_EXT;
use crate::design::{DesignMatrix, DesignMatrixBuilder, DriftModel};
use crate::error::{AnalysisError, Result, Stage, StageContext, StageError};
use crate::glm::{compute_contrast, Contrast, ContrastMaps, GeneralLinearModel, GlmFit};
use crate::output::{
    design_to_json, should_draw_overlay, OverlayRequest, PngVisualizer, Visualizer,
};
use crate::paradigm::{Paradigm, TestCatalog, TestDefinition};
use crate::preprocess::{FslPreprocessor, PreprocessPaths, Preprocessor};
use crate::result::{ContrastSummary, FailureInfo, Metadata, Outcome, RunReport, TestReport};
use crate::statistics::{scale_to_percent_signal, ScaledData};
use crate::thread_pool::WorkerPool;
use crate::types::Volume4;
use crate::volume::{read_volume, write_map, Mask};

/// Files read and written for one test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestPaths {
    /// Ratio volume handed to preprocessing.
    pub ratio: PathBuf,
    /// Motion-corrected intermediate.
    pub moco: PathBuf,
    /// Preprocessed volume read by the analysis.
    pub smooth: PathBuf,
    /// z-score map.
    pub zmap: PathBuf,
    /// Effect map.
    pub effect: PathBuf,
    /// Design matrix as JSON.
    pub design_json: PathBuf,
    /// Design matrix figure.
    pub design_png: PathBuf,
    /// Contrast figure.
    pub contrast_png: PathBuf,
}

impl TestPaths {
    /// Paths for test `test` with file-name prefix `prefix`.
    pub fn new(input_dir: &Path, output_dir: &Path, prefix: &str, test: u8) -> Self {
        let input = |stem: &str| input_dir.join(format!("{prefix}{stem}_test{test}{VOLUME_EXT}"));
        let output = |stem: &str, ext: &str| output_dir.join(format!("{prefix}{stem}_test{test}{ext}"));
        Self {
            ratio: input("ratio"),
            moco: input("moco"),
            smooth: input("smooth"),
            zmap: output("zmap", VOLUME_EXT),
            effect: output("effect", VOLUME_EXT),
            design_json: output("design_matrix", ".json"),
            design_png: output("design_matrix", ".png"),
            contrast_png: output("contrast", ".png"),
        }
    }

    fn preprocess(&self) -> PreprocessPaths {
        PreprocessPaths {
            ratio: self.ratio.clone(),
            moco: self.moco.clone(),
            smooth: self.smooth.clone(),
        }
    }

    /// The preprocessed volume, falling back to an uncompressed `.nii`.
    fn existing_smooth(&self) -> PathBuf {
        if self.smooth.exists() {
            return self.smooth.clone();
        }
        let plain = self
            .smooth
            .to_string_lossy()
            .strip_suffix(VOLUME_EXT)
            .map(|stem| PathBuf::from(format!("{stem}.nii")));
        match plain {
            Some(p) if p.exists() => p,
            _ => self.smooth.clone(),
        }
    }
}

/// Everything the core stages computed for one test.
#[derive(Debug, Clone)]
pub struct TestAnalysis {
    /// Stimulus events.
    pub paradigm: Paradigm,
    /// Design matrix built from the paradigm.
    pub design: DesignMatrix,
    /// Voxels included in the fit.
    pub mask: Mask,
    /// Percent-signal-change data and mean image.
    pub scaled: ScaledData,
    /// Per-voxel GLM fit.
    pub fit: GlmFit,
    /// Contrast weights.
    pub contrast: Contrast,
    /// Effect, variance, and z maps.
    pub maps: ContrastMaps,
}

impl TestAnalysis {
    /// Summary statistics for reporting.
    pub fn summary(&self, z_threshold: f64, overlay_drawn: bool) -> ContrastSummary {
        let groups = self.fit.groups();
        let n_voxels = self.fit.n_voxels().max(1) as f64;
        let mean_ar1 = groups.iter().map(|g| g.rho * g.n_voxels as f64).sum::<f64>() / n_voxels;

        ContrastSummary {
            n_frames: self.design.n_frames(),
            n_regressors: self.design.n_regressors(),
            masked_voxels: self.mask.count(),
            total_voxels: self.mask.total_voxels(),
            dof: self.fit.dof(),
            n_ar1_bins: groups.len(),
            mean_ar1,
            max_z: self.maps.masked_max_z(),
            min_z: self.maps.masked_min_z(),
            max_effect: self.maps.masked_max_effect(),
            z_threshold,
            voxels_above_threshold: self.maps.count_above(z_threshold),
            voxels_below_threshold: self.maps.count_below(z_threshold),
            degenerate_voxels: self.maps.degenerate_voxels,
            overlay_drawn,
        }
    }
}

/// Result of a successful test run.
#[derive(Debug, Clone)]
pub struct TestArtifacts {
    /// Test index.
    pub test: u8,
    /// Core results (absent when analysis is disabled).
    pub analysis: Option<TestAnalysis>,
    /// Files written.
    pub outputs: Vec<PathBuf>,
    /// Whether an overlay was requested from the visualizer.
    pub overlay_drawn: bool,
}

/// Main entry point for the per-test analysis.
///
/// # Example
///
/// ```ignore
/// use calcium_glm::{Pipeline, PipelineConfig};
///
/// let report = Pipeline::new(PipelineConfig::default())
///     .label("bee3")
///     .tests(vec![1, 2])
///     .run_all(input_dir, output_dir)?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    catalog: TestCatalog,
    visualizer: Arc<dyn Visualizer>,
    preprocessor: Arc<dyn Preprocessor>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    /// Create with a configuration, the standard test table, PNG figures
    /// and FSL preprocessing.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            catalog: TestCatalog::standard(),
            visualizer: Arc::new(PngVisualizer::default()),
            preprocessor: Arc::new(FslPreprocessor::default()),
        }
    }

    /// Create with figures disabled, for tests and quick checks.
    pub fn quick() -> Self {
        Self::new(PipelineConfig::quick())
    }

    /// Replace the test table.
    pub fn catalog(mut self, catalog: TestCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the figure renderer.
    pub fn visualizer(mut self, visualizer: impl Visualizer + 'static) -> Self {
        self.visualizer = Arc::new(visualizer);
        self
    }

    /// Replace the preprocessing tools.
    pub fn preprocessor(mut self, preprocessor: impl Preprocessor + 'static) -> Self {
        self.preprocessor = Arc::new(preprocessor);
        self
    }

    /// Select which tests `run_all` runs.
    pub fn tests(mut self, tests: Vec<u8>) -> Self {
        self.config.tests = tests;
        self
    }

    /// Set the output file label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = Some(label.into());
        self
    }

    /// Run tests concurrently.
    pub fn parallel_tests(mut self, parallel: bool) -> Self {
        self.config.parallel_tests = parallel;
        self
    }

    /// Use a dedicated pool of `n` threads for test-level parallelism.
    pub fn threads(mut self, n: usize) -> Self {
        self.config.threads = Some(n);
        self
    }

    /// Set the noise model.
    pub fn noise_model(mut self, model: NoiseModel) -> Self {
        self.config.glm.noise_model = model;
        self
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Get the test table.
    pub fn test_catalog(&self) -> &TestCatalog {
        &self.catalog
    }

    /// File paths of a test under this pipeline's label.
    pub fn paths(&self, test: u8, input_dir: &Path, output_dir: &Path) -> TestPaths {
        TestPaths::new(input_dir, output_dir, &self.config.file_prefix(), test)
    }

    /// Design matrix of a test: its paradigm's FIR regressors, plus
    /// polynomial drift when the test models drift.
    pub fn design_for(&self, def: &TestDefinition, paradigm: &Paradigm) -> Result<DesignMatrix> {
        let drift = if def.polynomial_drift {
            DriftModel::Polynomial {
                order: self.config.glm.drift_order,
            }
        } else {
            DriftModel::None
        };
        DesignMatrixBuilder::new()
            .fir_delays(self.config.glm.fir_delays.clone())
            .drift(drift)
            .build(paradigm)
    }

    /// Run the core stages of a test on an in-memory volume.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] naming the first stage that failed.
    pub fn analyze(&self, def: &TestDefinition, volume: &Volume4) -> std::result::Result<TestAnalysis, StageError> {
        let id = def.id;

        let paradigm = stage(id, Stage::BuildParadigm, || def.paradigm(&self.config.acquisition))?;
        tracing::debug!(
            events = paradigm.events().len(),
            conditions = ?paradigm.condition_ids(),
            "paradigm"
        );

        let design = stage(id, Stage::BuildDesignMatrix, || self.design_for(def, &paradigm))?;
        tracing::debug!(columns = ?design.names(), "design matrix");

        stage(id, Stage::LoadVolume, || {
            let frames = volume.dim().3;
            if frames == design.n_frames() {
                Ok(())
            } else {
                Err(AnalysisError::config(format!(
                    "volume has {frames} frames but the paradigm spans {}",
                    design.n_frames()
                )))
            }
        })?;

        let mask = stage(id, Stage::ComputeMask, || Ok(Mask::from_volume(volume)))?;
        tracing::info!(voxels = mask.count(), of = mask.total_voxels(), "mask");

        let scaled = stage(id, Stage::ScaleData, || {
            scale_to_percent_signal(&mask.extract(volume), &mask)
        })?;

        let fit = stage(id, Stage::FitGlm, || {
            GeneralLinearModel::new(&design, self.config.glm.clone())?.fit(&scaled.data)
        })?;
        tracing::info!(bins = fit.groups().len(), dof = fit.dof(), "fit");

        let (contrast, maps) = stage(id, Stage::ComputeContrast, || {
            let contrast = Contrast::from_definition(&design, &def.contrast)?;
            let maps = compute_contrast(&fit, &contrast, &mask)?;
            Ok((contrast, maps))
        })?;
        tracing::info!(
            max_z = maps.masked_max_z(),
            above = maps.count_above(self.config.thresholds.z_threshold),
            "contrast"
        );

        Ok(TestAnalysis {
            paradigm,
            design,
            mask,
            scaled,
            fit,
            contrast,
            maps,
        })
    }

    /// Run one test end to end: preprocessing (if enabled), analysis (if
    /// enabled), and export of maps and figures.
    ///
    /// # Errors
    ///
    /// Returns a [`StageError`] naming the first stage that failed. An empty
    /// mask surfaces here as an error; `run_all` reports it as a skip.
    pub fn run_test(&self, id: u8, input_dir: &Path, output_dir: &Path) -> std::result::Result<TestArtifacts, StageError> {
        let span = tracing::info_span!("test", test = id);
        let _guard = span.enter();

        let def = self.catalog.get(id).at_stage(id, Stage::BuildParadigm)?;
        tracing::info!(description = %def.description, "starting");
        let paths = self.paths(id, input_dir, output_dir);

        // Step 1: Preprocess
        if self.config.run_preprocessing {
            stage(id, Stage::Preprocess, || {
                self.preprocessor
                    .preprocess(&paths.preprocess(), self.config.smooth_sigma)
            })?;
        }

        if !self.config.run_analysis {
            return Ok(TestArtifacts {
                test: id,
                analysis: None,
                outputs: Vec::new(),
                overlay_drawn: false,
            });
        }

        // Step 2: Load the preprocessed volume
        let volume = stage(id, Stage::LoadVolume, || read_volume(&paths.existing_smooth()))?;

        // Step 3: Core stages
        let analysis = self.analyze(def, &volume)?;

        // Step 4: Export
        let (outputs, overlay_drawn) =
            stage(id, Stage::Export, || self.export(def, &analysis, &paths, output_dir))?;

        Ok(TestArtifacts {
            test: id,
            analysis: Some(analysis),
            outputs,
            overlay_drawn,
        })
    }

    fn export(
        &self,
        def: &TestDefinition,
        analysis: &TestAnalysis,
        paths: &TestPaths,
        output_dir: &Path,
    ) -> Result<(Vec<PathBuf>, bool)> {
        std::fs::create_dir_all(output_dir).map_err(|e| AnalysisError::io(output_dir, e))?;
        let mut outputs = Vec::new();

        write_map(&paths.zmap, &analysis.maps.z)?;
        outputs.push(paths.zmap.clone());

        if self.config.write_effect_map {
            write_map(&paths.effect, &analysis.maps.effect)?;
            outputs.push(paths.effect.clone());
        }

        if self.config.export_design_matrix {
            let json = design_to_json(&analysis.design)
                .map_err(|e| AnalysisError::config(format!("cannot serialize design: {e}")))?;
            std::fs::write(&paths.design_json, json)
                .map_err(|e| AnalysisError::io(&paths.design_json, e))?;
            outputs.push(paths.design_json.clone());
        }

        if self.config.plot_design_matrix {
            self.visualizer
                .render_design_matrix(&paths.design_png, &analysis.design)?;
            outputs.push(paths.design_png.clone());
        }

        let maps = &analysis.maps;
        let draw_overlay =
            should_draw_overlay(maps.max_z(), maps.max_effect(), &self.config.thresholds);
        if self.config.plot_contrast {
            if draw_overlay {
                tracing::info!("plotting overlays");
            }
            let request = OverlayRequest {
                title: &def.description,
                background: &analysis.scaled.mean_image,
                effect: &maps.effect,
                z: &maps.z,
                threshold: self.config.thresholds.z_threshold,
                draw_overlay,
            };
            self.visualizer
                .render_contrast(&paths.contrast_png, &request)?;
            outputs.push(paths.contrast_png.clone());
        }

        Ok((outputs, self.config.plot_contrast && draw_overlay))
    }

    /// Run every configured test and collect their reports.
    ///
    /// Tests run in order, or concurrently when `parallel_tests` is set.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration is invalid or the
    /// worker pool cannot be built. Per-test failures are reported inside
    /// the [`RunReport`], not as an error.
    pub fn run_all(&self, input_dir: &Path, output_dir: &Path) -> Result<RunReport> {
        self.config.validate()?;
        let start = Instant::now();
        let ids = self.config.tests.clone();
        let report_for = |id: &u8| self.report_for(*id, input_dir, output_dir);

        let tests: Vec<TestReport> = if self.config.parallel_tests {
            let pool = WorkerPool::new(self.config.threads)?;

            #[cfg(feature = "parallel")]
            let tests: Vec<TestReport> = pool.install(|| ids.par_iter().map(report_for).collect());

            #[cfg(not(feature = "parallel"))]
            let tests: Vec<TestReport> = pool.install(|| ids.iter().map(report_for).collect());

            tests
        } else {
            ids.iter().map(report_for).collect()
        };

        Ok(RunReport {
            label: self.config.label.clone(),
            tests,
            runtime_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn report_for(&self, id: u8, input_dir: &Path, output_dir: &Path) -> TestReport {
        let start = Instant::now();
        let result = self.run_test(id, input_dir, output_dir);
        let metadata = Metadata {
            noise_model: self.config.glm.noise_model,
            runtime_secs: start.elapsed().as_secs_f64(),
        };
        let description = self
            .catalog
            .get(id)
            .map(|d| d.description.clone())
            .unwrap_or_default();

        match result {
            Ok(artifacts) => TestReport {
                test: id,
                description,
                outcome: Outcome::Completed,
                summary: artifacts.analysis.as_ref().map(|a| {
                    a.summary(self.config.thresholds.z_threshold, artifacts.overlay_drawn)
                }),
                failure: None,
                outputs: artifacts.outputs,
                metadata,
            },
            Err(err) => {
                let outcome = if err.is_empty_mask() {
                    tracing::warn!(test = id, "{err}; skipping remaining stages");
                    Outcome::SkippedEmptyMask
                } else {
                    tracing::error!(test = id, stage = %err.stage, "{err}");
                    Outcome::Failed
                };
                TestReport {
                    test: id,
                    description,
                    outcome,
                    summary: None,
                    failure: Some(FailureInfo::from(&err)),
                    outputs: Vec::new(),
                    metadata,
                }
            }
        }
    }
}

/// Run one stage inside its own span and tag any error with the stage.
fn stage<T>(test: u8, stage: Stage, f: impl FnOnce() -> Result<T>) -> std::result::Result<T, StageError> {
    let span = tracing::debug_span!("stage", %stage);
    let _guard = span.enter();
    f().at_stage(test, stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::SyntheticVolume;
    use crate::output::NoopVisualizer;

    #[test]
    fn test_paths_follow_naming_scheme() {
        let p = TestPaths::new(Path::new("in"), Path::new("out"), "bee_", 3);
        assert_eq!(p.smooth, Path::new("in/bee_smooth_test3.nii.gz"));
        assert_eq!(p.zmap, Path::new("out/bee_zmap_test3.nii.gz"));
        assert_eq!(p.design_png, Path::new("out/bee_design_matrix_test3.png"));
        assert_eq!(p.contrast_png, Path::new("out/bee_contrast_test3.png"));
    }

    #[test]
    fn test_design_for_uses_drift_flag() {
        let pipeline = Pipeline::quick();
        let acq = &pipeline.config().acquisition;
        let t1 = pipeline.test_catalog().get(1).unwrap();
        let t3 = pipeline.test_catalog().get(3).unwrap();

        let d1 = pipeline.design_for(t1, &t1.paradigm(acq).unwrap()).unwrap();
        assert_eq!(d1.names().last().map(String::as_str), Some("constant"));

        let d3 = pipeline.design_for(t3, &t3.paradigm(acq).unwrap()).unwrap();
        assert!(d3.column_index("constant").is_none());
        assert_eq!(d3.n_frames(), 4 * acq.images_per_run);
    }

    #[test]
    fn test_frame_mismatch_fails_at_load() {
        let pipeline = Pipeline::quick().visualizer(NoopVisualizer);
        let def = pipeline.test_catalog().get(1).unwrap().clone();
        let volume = SyntheticVolume::new((2, 2, 1), 10).build();
        let err = pipeline.analyze(&def, &volume).unwrap_err();
        assert_eq!(err.stage, Stage::LoadVolume);
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn test_unknown_test_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Pipeline::quick()
            .run_test(9, dir.path(), dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
        assert_eq!(err.test, 9);
    }

    #[test]
    fn test_missing_volume_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let report = Pipeline::quick()
            .tests(vec![2])
            .run_all(dir.path(), dir.path())
            .unwrap();
        let test = report.test(2).unwrap();
        assert_eq!(test.outcome, Outcome::Failed);
        let failure = test.failure.as_ref().unwrap();
        assert_eq!(failure.stage, Stage::LoadVolume);
        assert_eq!(failure.kind, crate::error::ErrorKind::Io);
        assert!(!report.all_succeeded());
    }
}
