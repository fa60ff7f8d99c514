//! Axis descriptors and slice layouts for one handler invocation.
//!
//! The primary raw variable (the first one a handler names) defines the output
//! grid. Its file supplies the coordinate variables, the lat/lon cell bounds,
//! the time coordinate with its units, and the time bounds. Every input gets
//! a [`SliceLayout`] that cuts one time step out of it and permutes the result
//! into canonical order `[lat, lon, extra..., reduction]`.

use e2c_cmor::AxisDescriptor;
use e2c_io::{IoError, RawVariable, SourceFile, TimeUnits};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use tracing::debug;

use crate::error::HandlerError;
use crate::spec::HandlerSpec;

/// Accepted names of the time dimension.
pub const TIME_NAMES: &[&str] = &["time"];
/// Accepted names of the latitude dimension.
pub const LAT_NAMES: &[&str] = &["lat", "latitude"];
/// Accepted names of the longitude dimension.
pub const LON_NAMES: &[&str] = &["lon", "longitude"];

/// Time coordinate of the primary input.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    /// Parsed units of the time coordinate.
    pub units: TimeUnits,
    /// One value per time step.
    pub values: Vec<f64>,
    /// One `[lower, upper]` pair per time step.
    pub bounds: Vec<[f64; 2]>,
}

impl TimeAxis {
    /// Number of time steps.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no time steps.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Where one input's time axis sits and how to reorder the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceLayout {
    time_axis: usize,
    order: Vec<usize>,
}

impl SliceLayout {
    /// Layout with the time dimension at `time_axis` and the remaining
    /// dimensions taken in `order`.
    pub fn new(time_axis: usize, order: Vec<usize>) -> Self {
        Self { time_axis, order }
    }

    /// Position of the time dimension in source order.
    pub fn time_axis(&self) -> usize {
        self.time_axis
    }

    /// Permutation from the time-less source order to canonical order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// View of time step `step` of `data` in canonical order.
    ///
    /// `step` must be below the length of the time axis; [`build_axes`]
    /// checks that every input agrees with the primary's time length.
    pub fn slice<'a>(&self, data: &'a ArrayD<f64>, step: usize) -> ArrayViewD<'a, f64> {
        data.index_axis(Axis(self.time_axis), step)
            .permuted_axes(IxDyn(&self.order))
    }
}

/// Everything the engine and the sequencer need about the output axes.
#[derive(Debug, Clone)]
pub struct AxisPlan {
    /// Descriptors in declaration order `[time, latitude, longitude, extra...]`.
    pub descriptors: Vec<AxisDescriptor>,
    /// Time coordinate values and bounds.
    pub time: TimeAxis,
    /// One layout per input, in the handler's raw-variable order.
    pub layouts: Vec<SliceLayout>,
}

impl AxisPlan {
    /// Shape of one derived output slice (time excluded).
    pub fn slice_shape(&self) -> Vec<usize> {
        self.descriptors.iter().filter_map(AxisDescriptor::len).collect()
    }
}

/// Source dimensions in canonical order, each with the length the output
/// grid expects. Shared by every input.
struct CanonicalDims<'a> {
    placed: Vec<(&'a str, usize)>,
}

/// Build the axis plan for `inputs`, whose first element is the primary.
///
/// `source` is the file the primary was read from.
///
/// # Errors
///
/// - [`HandlerError::MissingAxis`] if time, latitude, longitude, an extra
///   axis, or the reduction axis is not a dimension of an input.
/// - [`HandlerError::MissingCoordinateData`] if a coordinate variable, lat/lon
///   bounds, time units, or time bounds are absent or malformed.
/// - [`HandlerError::UnexpectedDimension`] if an input has a dimension the
///   handler does not place.
/// - [`HandlerError::Io`] if an input's time length, or the length of a
///   placed dimension, disagrees with the primary's grid.
pub fn build_axes(
    inputs: &[RawVariable],
    source: &dyn SourceFile,
    spec: &HandlerSpec,
) -> Result<AxisPlan, HandlerError> {
    let Some(primary) = inputs.first() else {
        return Err(HandlerError::UnknownVariable {
            name: spec.name().to_string(),
        });
    };

    let lat = dim_name(primary, LAT_NAMES, "lat")?;
    let lon = dim_name(primary, LON_NAMES, "lon")?;
    let time_dim = dim_name(primary, TIME_NAMES, "time")?;

    let mut descriptors = Vec::with_capacity(3 + spec.extra_axes().len());
    let time = read_time(primary, source, spec, time_dim)?;
    descriptors.push(AxisDescriptor::time(time.units.as_str()));
    let mut placed = Vec::with_capacity(3 + spec.extra_axes().len());
    for (dim, entry, units) in [
        (lat, "latitude", "degrees_north"),
        (lon, "longitude", "degrees_east"),
    ] {
        let axis = horizontal_axis(source, dim, entry, units)?;
        placed.push((dim, axis.len().unwrap_or_default()));
        descriptors.push(axis);
    }

    for extra in spec.extra_axes() {
        if primary.dim_index(&extra.source).is_none() {
            return Err(HandlerError::MissingAxis {
                variable: primary.name().to_string(),
                axis: extra.source.clone(),
            });
        }
        let values = read_coordinate(source, &extra.source)?.values();
        let bounds_name = format!("{}_bnds", extra.source);
        let bounds = if source.has_variable(&bounds_name) {
            Some(read_bounds(source, &bounds_name, values.len())?)
        } else {
            None
        };
        placed.push((extra.source.as_str(), values.len()));
        descriptors.push(AxisDescriptor::spatial(
            extra.table_entry.as_str(),
            extra.units.as_str(),
            values,
            bounds,
        ));
    }

    if let Some(reduction) = spec.derivation().reduction_axis() {
        let Some(i) = primary.dim_index(reduction) else {
            return Err(HandlerError::MissingAxis {
                variable: primary.name().to_string(),
                axis: reduction.to_string(),
            });
        };
        placed.push((reduction, primary.dims()[i].len()));
    }

    let dims = CanonicalDims { placed };
    let layouts = inputs
        .iter()
        .map(|input| layout_for(input, &dims, time.len()))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        variable = spec.name(),
        n_time = time.len(),
        n_axes = descriptors.len(),
        "built axis plan"
    );

    Ok(AxisPlan {
        descriptors,
        time,
        layouts,
    })
}

/// Name of the first dimension of `var` matching `aliases`.
fn dim_name<'v>(var: &'v RawVariable, aliases: &[&str], axis: &str) -> Result<&'v str, HandlerError> {
    var.dim_index_any(aliases)
        .map(|i| var.dims()[i].name())
        .ok_or_else(|| HandlerError::MissingAxis {
            variable: var.name().to_string(),
            axis: axis.to_string(),
        })
}

fn missing(source: &dyn SourceFile, name: &str, reason: impl Into<String>) -> HandlerError {
    HandlerError::MissingCoordinateData {
        name: name.to_string(),
        path: source.path().to_path_buf(),
        reason: reason.into(),
    }
}

fn read_coordinate(source: &dyn SourceFile, name: &str) -> Result<RawVariable, HandlerError> {
    source
        .read_variable(name)
        .map_err(|e| missing(source, name, e.to_string()))
}

fn read_bounds(
    source: &dyn SourceFile,
    name: &str,
    expected: usize,
) -> Result<Vec<[f64; 2]>, HandlerError> {
    checked_bounds(source, &read_coordinate(source, name)?, expected)
}

fn checked_bounds(
    source: &dyn SourceFile,
    raw: &RawVariable,
    expected: usize,
) -> Result<Vec<[f64; 2]>, HandlerError> {
    let name = raw.name();
    let bounds = raw
        .to_bounds()
        .map_err(|e| missing(source, name, e.to_string()))?;
    if bounds.len() != expected {
        return Err(missing(
            source,
            name,
            format!("{} bounds for {} values", bounds.len(), expected),
        ));
    }
    Ok(bounds)
}

fn horizontal_axis(
    source: &dyn SourceFile,
    dim: &str,
    table_entry: &str,
    default_units: &str,
) -> Result<AxisDescriptor, HandlerError> {
    let coord = read_coordinate(source, dim)?;
    let values = coord.values();
    let bounds = read_bounds(source, &format!("{dim}_bnds"), values.len())?;
    Ok(AxisDescriptor::spatial(
        table_entry,
        coord.units().unwrap_or(default_units),
        values,
        Some(bounds),
    ))
}

fn read_time(
    primary: &RawVariable,
    source: &dyn SourceFile,
    spec: &HandlerSpec,
    dim: &str,
) -> Result<TimeAxis, HandlerError> {
    let coord = read_coordinate(source, dim)?;
    let units = coord
        .units()
        .ok_or_else(|| missing(source, dim, "time coordinate has no units"))?;
    let units = TimeUnits::parse(units).map_err(|e| missing(source, dim, e.to_string()))?;

    let values = coord.values();
    let n_time = primary
        .dim_index(dim)
        .map(|i| primary.dims()[i].len())
        .unwrap_or_default();
    if values.len() != n_time {
        return Err(missing(
            source,
            dim,
            format!("{} time values for {} steps", values.len(), n_time),
        ));
    }

    let names: Vec<&str> = spec.time_bounds().iter().map(String::as_str).collect();
    let raw_bounds = source.read_first_of(&names).map_err(|e| {
        missing(
            source,
            names.first().copied().unwrap_or("time_bnds"),
            e.to_string(),
        )
    })?;
    let bounds = checked_bounds(source, &raw_bounds, n_time)?;

    Ok(TimeAxis {
        units,
        values,
        bounds,
    })
}

fn layout_for(
    var: &RawVariable,
    dims: &CanonicalDims<'_>,
    n_time: usize,
) -> Result<SliceLayout, HandlerError> {
    let time_axis = var
        .dim_index_any(TIME_NAMES)
        .ok_or_else(|| HandlerError::MissingAxis {
            variable: var.name().to_string(),
            axis: "time".to_string(),
        })?;
    let got = var.dims()[time_axis].len();
    if got != n_time {
        return Err(IoError::DimensionMismatch {
            name: format!("{} time", var.name()),
            expected: n_time,
            got,
        }
        .into());
    }

    let mut source_order = Vec::with_capacity(dims.placed.len());
    for &(name, expected) in &dims.placed {
        let i = var.dim_index(name).ok_or_else(|| HandlerError::MissingAxis {
            variable: var.name().to_string(),
            axis: name.to_string(),
        })?;
        let got = var.dims()[i].len();
        if got != expected {
            return Err(IoError::DimensionMismatch {
                name: format!("{} {name}", var.name()),
                expected,
                got,
            }
            .into());
        }
        source_order.push(i);
    }

    for (i, dim) in var.dims().iter().enumerate() {
        if i != time_axis && !source_order.contains(&i) {
            return Err(HandlerError::UnexpectedDimension {
                variable: var.name().to_string(),
                dimension: dim.name().to_string(),
            });
        }
    }

    let order = source_order
        .into_iter()
        .map(|i| if i > time_axis { i - 1 } else { i })
        .collect();
    Ok(SliceLayout { time_axis, order })
}
