//! Motion correction and smoothing through external tools.
//!
//! The ratio volume of each test is motion-corrected and then smoothed
//! with a Gaussian kernel. Both steps are delegated to FSL:
//!
//! ```text
//! mcflirt -in {ratio} -out {moco}
//! fslmaths {moco} -s {sigma} {smooth}
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{AnalysisError, Result};

/// Files touched by one preprocessing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessPaths {
    /// Input ratio volume.
    pub ratio: PathBuf,
    /// Motion-corrected intermediate.
    pub moco: PathBuf,
    /// Smoothed output read by the analysis.
    pub smooth: PathBuf,
}

/// Produces the smoothed volume a test's analysis reads.
pub trait Preprocessor: Send + Sync {
    /// Run preprocessing, returning the path of the smoothed volume.
    fn preprocess(&self, paths: &PreprocessPaths, smooth_sigma: f64) -> Result<PathBuf>;
}

/// Runs FSL's `mcflirt` and `fslmaths`.
#[derive(Debug, Clone)]
pub struct FslPreprocessor {
    /// Motion-correction program (default: `mcflirt`).
    pub mcflirt: PathBuf,
    /// Image-math program (default: `fslmaths`).
    pub fslmaths: PathBuf,
}

impl Default for FslPreprocessor {
    fn default() -> Self {
        Self {
            mcflirt: PathBuf::from("mcflirt"),
            fslmaths: PathBuf::from("fslmaths"),
        }
    }
}

impl FslPreprocessor {
    /// Arguments of the motion-correction call.
    pub fn motion_args(paths: &PreprocessPaths) -> Vec<OsString> {
        vec![
            "-in".into(),
            paths.ratio.clone().into(),
            "-out".into(),
            paths.moco.clone().into(),
        ]
    }

    /// Arguments of the smoothing call.
    pub fn smooth_args(paths: &PreprocessPaths, sigma: f64) -> Vec<OsString> {
        vec![
            paths.moco.clone().into(),
            "-s".into(),
            sigma.to_string().into(),
            paths.smooth.clone().into(),
        ]
    }
}

impl Preprocessor for FslPreprocessor {
    fn preprocess(&self, paths: &PreprocessPaths, smooth_sigma: f64) -> Result<PathBuf> {
        if !paths.ratio.exists() {
            return Err(AnalysisError::io(
                &paths.ratio,
                std::io::Error::new(std::io::ErrorKind::NotFound, "ratio volume not found"),
            ));
        }

        tracing::info!(input = %paths.ratio.display(), "correcting motion");
        run(&self.mcflirt, &Self::motion_args(paths))?;

        tracing::info!(sigma = smooth_sigma, "smoothing");
        run(&self.fslmaths, &Self::smooth_args(paths, smooth_sigma))?;

        Ok(paths.smooth.clone())
    }
}

fn run(program: &Path, args: &[OsString]) -> Result<()> {
    tracing::debug!(program = %program.display(), ?args, "running");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|e| AnalysisError::ExternalTool {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(AnalysisError::ExternalTool {
            program: program.display().to_string(),
            reason: status.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(dir: &Path) -> PreprocessPaths {
        PreprocessPaths {
            ratio: dir.join("ratio_test1.nii.gz"),
            moco: dir.join("moco_test1.nii.gz"),
            smooth: dir.join("smooth_test1.nii.gz"),
        }
    }

    #[test]
    fn test_command_arguments() {
        let p = paths(Path::new("/data"));
        let motion = FslPreprocessor::motion_args(&p);
        assert_eq!(motion[0], "-in");
        assert_eq!(motion[1], "/data/ratio_test1.nii.gz");
        assert_eq!(motion[3], "/data/moco_test1.nii.gz");

        let smooth = FslPreprocessor::smooth_args(&p, 3.0);
        assert_eq!(smooth[1], "-s");
        assert_eq!(smooth[2], "3");
        assert_eq!(smooth[3], "/data/smooth_test1.nii.gz");
    }

    #[test]
    fn test_missing_ratio_volume_is_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = FslPreprocessor::default()
            .preprocess(&paths(dir.path()), 3.0)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_missing_program_is_external_tool_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = paths(dir.path());
        std::fs::write(&p.ratio, b"").unwrap();
        let fsl = FslPreprocessor {
            mcflirt: PathBuf::from("/nonexistent/mcflirt"),
            fslmaths: PathBuf::from("/nonexistent/fslmaths"),
        };
        let err = fsl.preprocess(&p, 3.0).unwrap_err();
        assert!(matches!(err, AnalysisError::ExternalTool { .. }));
    }
}
