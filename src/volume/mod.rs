//! Imaging volumes: masking and file I/O.

mod mask;
mod nifti_io;

pub use mask::Mask;
pub use nifti_io::{read_volume, write_map, write_volume};
