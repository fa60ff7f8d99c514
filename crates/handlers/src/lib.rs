//! # e2c-handlers
//!
//! The variable-transformation pipeline: turn raw E3SM variables into one
//! CMIP6 variable per handler invocation.
//!
//! ## Pipeline
//!
//! ```mermaid
//! graph LR
//!     A["Dispatcher::dispatch(name, inputs)"] -->|"registry lookup"| B["HandlerSpec"]
//!     B -->|"locate raw variables"| C["HandlerInputs"]
//!     C -->|"build_axes()"| D["AxisPlan"]
//!     D -->|"setup, dataset_json, load_table, axis*, variable"| E["OutputVariable"]
//!     E -->|"WriteSequencer::run()"| F["derive + write per time step"]
//!     F -->|"close once"| G["HandlerOutcome"]
//! ```
//!
//! Every handler is a [`HandlerSpec`]: raw inputs, a [`Derivation`], the
//! CMIP6 table, units, sign convention, extra axes, and a
//! [`FailurePolicy`]. One generic [`handle`] runs them all.
//!
//! ## Quick Start
//!
//! ```ignore
//! use e2c_cmor::NetcdfEngine;
//! use e2c_handlers::{Dispatcher, RunContext, builtin_registry};
//! use e2c_io::NetcdfReader;
//!
//! let dispatcher = Dispatcher::new(builtin_registry(), Box::new(NetcdfReader));
//! let ctx = RunContext::new("cmip6-cmor-tables/Tables", "user_input.json");
//! let mut engine = NetcdfEngine::new();
//! let summary = dispatcher.dispatch_all(&["mrfso", "tauv"], &inputs, &ctx, &mut engine);
//! ```

mod axis;
mod builtin;
mod context;
mod derive;
mod error;
mod handler;
mod registry;
mod sequencer;
mod spec;

pub use axis::{AxisPlan, LAT_NAMES, LON_NAMES, SliceLayout, TIME_NAMES, TimeAxis, build_axes};
pub use builtin::{AMON, LMON, builtin_registry, builtin_specs};
pub use context::{CancelFlag, RunContext};
pub use derive::Derivation;
pub use error::{DeriveError, HandlerError};
pub use handler::{HandlerInputs, HandlerOutcome, handle};
pub use registry::{ALL, Dispatcher, HandlerRegistry, RunSummary};
pub use sequencer::{SequenceReport, SequencerState, TimeStep, WriteSequencer};
pub use spec::{DEFAULT_TIME_BOUNDS, ExtraAxis, FailurePolicy, HandlerSpec};
