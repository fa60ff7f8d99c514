//! Axis and variable declarations handed to an [`Engine`](crate::Engine).

use std::fmt;

/// Identifier returned by [`Engine::axis`](crate::Engine::axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AxisId(pub usize);

/// Identifier returned by [`Engine::variable`](crate::Engine::variable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

/// Metadata describing one coordinate axis.
///
/// The time axis carries only `units`: its values and bounds arrive with each
/// write. Spatial axes carry values and, for latitude and longitude, bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisDescriptor {
    /// CMIP6 coordinate table entry (`time`, `latitude`, `sdepth`, ...).
    pub table_entry: String,
    /// Units of the coordinate values.
    pub units: String,
    /// Coordinate values, absent for the time axis.
    pub coord_vals: Option<Vec<f64>>,
    /// Cell bounds, one `[lower, upper]` pair per coordinate value.
    pub cell_bounds: Option<Vec<[f64; 2]>>,
}

impl AxisDescriptor {
    /// Time axis: units only.
    pub fn time(units: impl Into<String>) -> Self {
        Self {
            table_entry: "time".to_string(),
            units: units.into(),
            coord_vals: None,
            cell_bounds: None,
        }
    }

    /// A spatial axis with values and optional bounds.
    pub fn spatial(
        table_entry: impl Into<String>,
        units: impl Into<String>,
        coord_vals: Vec<f64>,
        cell_bounds: Option<Vec<[f64; 2]>>,
    ) -> Self {
        Self {
            table_entry: table_entry.into(),
            units: units.into(),
            coord_vals: Some(coord_vals),
            cell_bounds,
        }
    }

    /// Returns `true` for the time axis.
    pub fn is_time(&self) -> bool {
        self.table_entry == "time"
    }

    /// Number of coordinate values; `None` for the time axis.
    pub fn len(&self) -> Option<usize> {
        self.coord_vals.as_ref().map(Vec::len)
    }

    /// Name of the axis in the written file.
    ///
    /// Follows the `out_name` convention of the CMIP6 coordinate table.
    pub fn out_name(&self) -> &str {
        match self.table_entry.as_str() {
            "latitude" => "lat",
            "longitude" => "lon",
            "sdepth" => "depth",
            other => other,
        }
    }
}

/// Physical sign convention of a flux variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positive {
    /// Positive upward.
    Up,
    /// Positive downward.
    Down,
}

impl Positive {
    /// The value used in table entries and file attributes.
    pub fn as_str(self) -> &'static str {
        match self {
            Positive::Up => "up",
            Positive::Down => "down",
        }
    }
}

impl fmt::Display for Positive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CMIP variable declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    /// CMIP variable name, which must be listed in the loaded table.
    pub name: String,
    /// Units of the data that will be written.
    pub units: String,
    /// Axes in write order: time first, then latitude, longitude, extras.
    pub axes: Vec<AxisId>,
    /// Sign convention, for flux variables.
    pub positive: Option<Positive>,
}
