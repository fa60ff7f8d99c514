//! # e2c-io
//!
//! Read raw E3SM model variables from NetCDF output files. Each variable
//! comes back as a [`RawVariable`] carrying its dimension names, units, and
//! an `ndarray` data block with fill values replaced by NaN.
//!
//! The [`SourceFile`] / [`SourceReader`] traits are the seam the conversion
//! pipeline depends on; [`NetcdfReader`] is the production implementation and
//! [`MemoryReader`] serves tests and dry runs.

mod error;
mod netcdf_read;
mod raw;
mod source;
mod time;

pub use error::IoError;
pub use netcdf_read::{NetcdfReader, NetcdfSource};
pub use raw::{Dimension, RawVariable};
pub use source::{MemoryReader, MemorySource, SourceFile, SourceReader};
pub use time::TimeUnits;
