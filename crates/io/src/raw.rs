//! Model-native variables as read from a source file.

use ndarray::{ArrayD, IxDyn};

use crate::error::IoError;

/// One named dimension of a [`RawVariable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    name: String,
    len: usize,
}

impl Dimension {
    /// Create a dimension descriptor.
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }

    /// Dimension name as stored in the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of entries along this dimension.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` for a zero-length dimension.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A named physical field read from a model output file.
///
/// `data` is shaped by `dims` in file order. Fill and missing values are
/// stored as NaN.
#[derive(Debug, Clone)]
pub struct RawVariable {
    name: String,
    units: Option<String>,
    dims: Vec<Dimension>,
    data: ArrayD<f64>,
}

impl RawVariable {
    /// Build a variable from flat row-major `values`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if `values.len()` is not the
    /// product of the dimension lengths.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<Dimension>,
        values: Vec<f64>,
    ) -> Result<Self, IoError> {
        let name = name.into();
        let shape: Vec<usize> = dims.iter().map(Dimension::len).collect();
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(IoError::DimensionMismatch {
                name,
                expected,
                got: values.len(),
            });
        }
        let data = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| {
            IoError::DimensionMismatch {
                name: format!("{name} ({e})"),
                expected,
                got: expected,
            }
        })?;
        Ok(Self {
            name,
            units: None,
            dims,
            data,
        })
    }

    /// Attach a units string.
    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units attribute, if the file provided one.
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Dimensions in file order.
    pub fn dims(&self) -> &[Dimension] {
        &self.dims
    }

    /// The full data array.
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Position of the dimension called `name`, or `None` if absent.
    pub fn dim_index(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d.name == name)
    }

    /// Position of the first dimension matching any of `aliases`.
    pub fn dim_index_any(&self, aliases: &[&str]) -> Option<usize> {
        aliases.iter().find_map(|alias| self.dim_index(alias))
    }

    /// Flattened values in row-major order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Interpret a `(n, 2)` variable as a list of cell bounds.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::DimensionMismatch`] if the variable is not 2-D with a
    /// trailing dimension of length 2.
    pub fn to_bounds(&self) -> Result<Vec<[f64; 2]>, IoError> {
        if self.dims.len() != 2 {
            return Err(IoError::DimensionMismatch {
                name: format!("{} dimensions", self.name),
                expected: 2,
                got: self.dims.len(),
            });
        }
        if self.dims[1].len != 2 {
            return Err(IoError::DimensionMismatch {
                name: self.dims[1].name.clone(),
                expected: 2,
                got: self.dims[1].len,
            });
        }
        Ok(self
            .values()
            .chunks_exact(2)
            .map(|pair| [pair[0], pair[1]])
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(spec: &[(&str, usize)]) -> Vec<Dimension> {
        spec.iter().map(|&(n, l)| Dimension::new(n, l)).collect()
    }

    #[test]
    fn new_checks_length() {
        let err = RawVariable::new("TS", dims(&[("time", 2), ("lat", 3)]), vec![0.0; 5])
            .unwrap_err();
        assert!(matches!(
            err,
            IoError::DimensionMismatch {
                expected: 6,
                got: 5,
                ..
            }
        ));
    }

    #[test]
    fn dim_lookup_returns_none_when_absent() {
        let v = RawVariable::new("TS", dims(&[("time", 1), ("lat", 2)]), vec![0.0; 2]).unwrap();
        assert_eq!(v.dim_index("lat"), Some(1));
        assert_eq!(v.dim_index("levgrnd"), None);
        assert_eq!(v.dim_index_any(&["latitude", "lat"]), Some(1));
    }

    #[test]
    fn bounds_from_two_column_variable() {
        let v = RawVariable::new(
            "lat_bnds",
            dims(&[("lat", 2), ("nbnd", 2)]),
            vec![-90.0, 0.0, 0.0, 90.0],
        )
        .unwrap();
        assert_eq!(v.to_bounds().unwrap(), vec![[-90.0, 0.0], [0.0, 90.0]]);
    }

    #[test]
    fn bounds_reject_wrong_width() {
        let v = RawVariable::new("lat_bnds", dims(&[("lat", 1), ("nv", 3)]), vec![0.0; 3]).unwrap();
        assert!(v.to_bounds().is_err());
    }

    #[test]
    fn units_builder() {
        let v = RawVariable::new("TS", dims(&[("time", 1)]), vec![280.0])
            .unwrap()
            .with_units("K");
        assert_eq!(v.units(), Some("K"));
        assert_eq!(v.values(), vec![280.0]);
    }
}
