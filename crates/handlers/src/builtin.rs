//! Handlers known to this project.

use e2c_cmor::Positive;

use crate::derive::Derivation;
use crate::registry::HandlerRegistry;
use crate::spec::{ExtraAxis, FailurePolicy, HandlerSpec};

/// Atmosphere monthly table.
pub const AMON: &str = "CMIP6_Amon.json";
/// Land monthly table.
pub const LMON: &str = "CMIP6_Lmon.json";

/// Precipitation rate conversion, m s-1 of water to kg m-2 s-1.
const WATER_DENSITY: f64 = 1000.0;

/// Cloud fraction conversion, 1 to %.
const PERCENT: f64 = 100.0;

/// Cap on the soil-ice column total, kg m-2.
const SOIL_ICE_CAP: f64 = 5000.0;

const ATM_TIME_BOUNDS: &[&str] = &["time_bnds", "time_bounds"];
const LND_TIME_BOUNDS: &[&str] = &["time_bounds", "time_bnds"];

fn atm(name: &str, units: &str, raw: &[&str]) -> HandlerSpec {
    HandlerSpec::new(name, units, AMON)
        .with_raw(raw)
        .with_time_bounds(ATM_TIME_BOUNDS)
}

fn lnd(name: &str, units: &str, raw: &[&str]) -> HandlerSpec {
    HandlerSpec::new(name, units, LMON)
        .with_raw(raw)
        .with_time_bounds(LND_TIME_BOUNDS)
}

/// Every built-in handler spec.
pub fn builtin_specs() -> Vec<HandlerSpec> {
    vec![
        atm("clt", "%", &["CLDTOT"])
            .with_derivation(Derivation::LinearSum { scale: PERCENT })
            .with_failure_policy(FailurePolicy::Abort),
        atm("tauu", "Pa", &["TAUX"])
            .with_derivation(Derivation::Signed)
            .with_positive(Positive::Down),
        atm("tauv", "Pa", &["TAUY"])
            .with_derivation(Derivation::Signed)
            .with_positive(Positive::Down),
        atm("ts", "K", &["TS"]),
        atm("ps", "Pa", &["PS"]),
        atm("psl", "Pa", &["PSL"]),
        atm("hfls", "W m-2", &["LHFLX"])
            .with_derivation(Derivation::Signed)
            .with_positive(Positive::Up),
        atm("hfss", "W m-2", &["SHFLX"])
            .with_derivation(Derivation::Signed)
            .with_positive(Positive::Up),
        atm("rlut", "W m-2", &["FLUT"])
            .with_derivation(Derivation::Signed)
            .with_positive(Positive::Up),
        atm("pr", "kg m-2 s-1", &["PRECC", "PRECL"]).with_derivation(Derivation::LinearSum {
            scale: WATER_DENSITY,
        }),
        atm("prc", "kg m-2 s-1", &["PRECC"]).with_derivation(Derivation::LinearSum {
            scale: WATER_DENSITY,
        }),
        lnd("mrfso", "kg m-2", &["SOILICE"]).with_derivation(Derivation::VerticalSumCapped {
            axis: "levgrnd".to_string(),
            threshold: SOIL_ICE_CAP,
        }),
        lnd("tsl", "K", &["TSOI"]).with_extra_axis(ExtraAxis::new("levgrnd", "sdepth", "m")),
    ]
}

/// A registry holding every built-in handler.
pub fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    for spec in builtin_specs() {
        registry.register(spec);
    }
    registry
}
