//! NIfTI-1 reading and writing.
//!
//! Inputs are 4D (x, y, z, t) volumes; a 3D file is read as a single-frame
//! series. Maps are written as 3D float32 volumes. Gzip compression follows
//! the file extension (`.nii.gz` compressed, `.nii` plain).

use std::path::Path;

use ndarray::{ArrayD, Axis, Ix4};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};

use crate::error::{AnalysisError, Result};
use crate::types::{Map3, Volume4};

/// Read a 3D or 4D NIfTI file as an (x, y, z, t) volume of `f64`.
///
/// # Errors
///
/// Returns a volume error if the file cannot be parsed, and a
/// configuration error for volumes that are not 3D or 4D.
pub fn read_volume(path: &Path) -> Result<Volume4> {
    let obj = ReaderOptions::new()
        .read_file(path)
        .map_err(|source| AnalysisError::Volume {
            path: path.to_path_buf(),
            source,
        })?;

    let array: ArrayD<f64> =
        obj.into_volume()
            .into_ndarray::<f64>()
            .map_err(|source| AnalysisError::Volume {
                path: path.to_path_buf(),
                source,
            })?;

    let array = match array.ndim() {
        3 => array.insert_axis(Axis(3)),
        4 => array,
        n => {
            return Err(AnalysisError::config(format!(
                "{}: expected a 3D or 4D volume, found {n}D",
                path.display()
            )))
        }
    };

    array.into_dimensionality::<Ix4>().map_err(|e| {
        AnalysisError::config(format!("{}: unexpected volume shape: {e}", path.display()))
    })
}

/// Write a 3D map as a float32 NIfTI file.
pub fn write_map(path: &Path, map: &Map3) -> Result<()> {
    let data = map.mapv(|v| v as f32);
    WriterOptions::new(path)
        .write_nifti(&data)
        .map_err(|source| AnalysisError::Volume {
            path: path.to_path_buf(),
            source,
        })
}

/// Write a 4D volume as a float32 NIfTI file.
pub fn write_volume(path: &Path, volume: &Volume4) -> Result<()> {
    let data = volume.mapv(|v| v as f32);
    WriterOptions::new(path)
        .write_nifti(&data)
        .map_err(|source| AnalysisError::Volume {
            path: path.to_path_buf(),
            source,
        })
}
