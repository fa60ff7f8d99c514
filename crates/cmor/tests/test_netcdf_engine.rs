//! Integration tests for `NetcdfEngine`: table validation, file layout, and
//! per-slice writes.

use std::path::{Path, PathBuf};

use e2c_cmor::{
    AxisDescriptor, Engine, EngineError, FileAction, NetcdfEngine, OutputVariable, Positive,
    Session, TimeSlice, VariableDecl,
};
use ndarray::{ArrayD, IxDyn};
use tempfile::tempdir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const AMON: &str = r#"{
    "Header": {"table_id": "Table Amon", "missing_value": "1e20"},
    "variable_entry": {
        "clt": {"units": "%", "positive": "", "dimensions": "longitude latitude time",
                "standard_name": "cloud_area_fraction"},
        "tauv": {"units": "Pa", "positive": "down", "dimensions": "longitude latitude time"}
    }
}"#;

/// Lay out `tables/CMIP6_Amon.json` and `user_input.json` under `dir`.
fn write_inputs(dir: &Path) -> (PathBuf, PathBuf) {
    let tables = dir.join("tables");
    std::fs::create_dir_all(&tables).unwrap();
    std::fs::write(tables.join("CMIP6_Amon.json"), AMON).unwrap();

    let user_input = dir.join("user_input.json");
    let outpath = dir.join("out");
    std::fs::write(
        &user_input,
        format!(
            r#"{{"experiment_id": "historical", "source_id": "E3SM-1-0",
                 "institution_id": "E3SM-Project", "outpath": {:?},
                 "activity_id": "CMIP"}}"#,
            outpath.display().to_string()
        ),
    )
    .unwrap();
    (tables, user_input)
}

fn start(engine: &mut NetcdfEngine, dir: &Path, action: FileAction) {
    let (tables, user_input) = write_inputs(dir);
    engine
        .setup(&Session {
            tables_path: tables,
            file_action: action,
            logfile: Some(dir.join("logs").join("clt.log")),
        })
        .unwrap();
    engine.dataset_json(&user_input).unwrap();
    engine.load_table("CMIP6_Amon.json").unwrap();
}

fn grid_decl(engine: &mut NetcdfEngine, name: &str, positive: Option<Positive>) -> VariableDecl {
    let t = engine
        .axis(&AxisDescriptor::time("days since 0001-01-01 00:00:00"))
        .unwrap();
    let lat = engine
        .axis(&AxisDescriptor::spatial(
            "latitude",
            "degrees_north",
            vec![-45.0, 45.0],
            Some(vec![[-90.0, 0.0], [0.0, 90.0]]),
        ))
        .unwrap();
    let lon = engine
        .axis(&AxisDescriptor::spatial(
            "longitude",
            "degrees_east",
            vec![90.0, 270.0],
            Some(vec![[0.0, 180.0], [180.0, 360.0]]),
        ))
        .unwrap();
    VariableDecl {
        name: name.to_string(),
        units: if name == "clt" { "%" } else { "Pa" }.to_string(),
        axes: vec![t, lat, lon],
        positive,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn writes_slices_and_coordinates() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "clt", None);

    let mut var = OutputVariable::declare(&mut engine, &decl).unwrap();
    let id = var.id();
    for step in 0..3 {
        let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![step as f64, 1.0, 2.0, f64::NAN])
            .unwrap();
        var.write(&TimeSlice {
            data: data.view(),
            time: 15.5 + 30.0 * step as f64,
            bounds: [30.0 * step as f64, 30.0 * (step + 1) as f64],
        })
        .unwrap();
    }
    var.close().unwrap();

    let path = engine.output_path(id).unwrap().to_path_buf();
    assert!(path.ends_with("clt_Amon_E3SM-1-0_historical_r1i1p1f1_gr.nc"));

    let file = netcdf::open(&path).unwrap();
    let time = file.variable("time").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(time, vec![15.5, 45.5, 75.5]);
    let lat_bnds = file
        .variable("lat_bnds")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(lat_bnds, vec![-90.0, 0.0, 0.0, 90.0]);
    let clt = file.variable("clt").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(clt.len(), 12);
    assert_eq!(clt[4], 1.0);
    assert_eq!(clt[3], 1.0e20, "NaN is written as the table missing value");

    let log = std::fs::read_to_string(dir.path().join("logs").join("clt.log")).unwrap();
    assert!(log.contains("close clt slices=3"));
}

#[test]
fn variable_not_in_table_is_rejected() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "mrfso", None);
    let err = engine.variable(&decl).unwrap_err();
    assert!(matches!(err, EngineError::UnknownTableEntry { .. }));
}

#[test]
fn positive_required_by_table() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);

    let decl = grid_decl(&mut engine, "tauv", None);
    assert!(matches!(
        engine.variable(&decl),
        Err(EngineError::PositiveMismatch { .. })
    ));

    let decl = VariableDecl {
        positive: Some(Positive::Down),
        ..decl
    };
    assert!(engine.variable(&decl).is_ok());
}

#[test]
fn missing_table_fails_loudly() {
    let dir = tempdir().unwrap();
    let (tables, _) = write_inputs(dir.path());
    let mut engine = NetcdfEngine::new();
    engine
        .setup(&Session {
            tables_path: tables,
            file_action: FileAction::Replace,
            logfile: None,
        })
        .unwrap();
    let err = engine.load_table("CMIP6_Lmon.json").unwrap_err();
    assert!(matches!(err, EngineError::TableLoad { .. }));
}

#[test]
fn preserve_refuses_existing_output() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "clt", None);
    OutputVariable::declare(&mut engine, &decl)
        .unwrap()
        .close()
        .unwrap();

    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Preserve);
    let decl = grid_decl(&mut engine, "clt", None);
    assert!(matches!(
        engine.variable(&decl),
        Err(EngineError::OutputExists { .. })
    ));
}

#[test]
fn write_after_close_is_rejected() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "clt", None);
    let id = engine.variable(&decl).unwrap();
    engine.close(id).unwrap();

    let data = ArrayD::<f64>::zeros(IxDyn(&[2, 2]));
    let err = engine
        .write(
            id,
            &TimeSlice {
                data: data.view(),
                time: 0.0,
                bounds: [0.0, 1.0],
            },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyClosed { .. }));
}

fn write_steps(engine: &mut NetcdfEngine, decl: &VariableDecl, steps: std::ops::Range<usize>) {
    let mut var = OutputVariable::declare(engine, decl).unwrap();
    for step in steps {
        let data = ArrayD::from_elem(IxDyn(&[2, 2]), step as f64);
        var.write(&TimeSlice {
            data: data.view(),
            time: 15.5 + 30.0 * step as f64,
            bounds: [30.0 * step as f64, 30.0 * (step + 1) as f64],
        })
        .unwrap();
    }
    var.close().unwrap();
}

#[test]
fn append_continues_after_existing_slices() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "clt", None);
    write_steps(&mut engine, &decl, 0..2);

    start(&mut engine, dir.path(), FileAction::Append);
    let decl = grid_decl(&mut engine, "clt", None);
    write_steps(&mut engine, &decl, 2..3);

    let path = dir
        .path()
        .join("out")
        .join("clt_Amon_E3SM-1-0_historical_r1i1p1f1_gr.nc");
    let file = netcdf::open(&path).unwrap();
    let time = file.variable("time").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(time, vec![15.5, 45.5, 75.5]);
    let time_bnds = file
        .variable("time_bnds")
        .unwrap()
        .get_values::<f64, _>(..)
        .unwrap();
    assert_eq!(&time_bnds[4..], &[60.0, 90.0]);
    let clt = file.variable("clt").unwrap().get_values::<f64, _>(..).unwrap();
    assert_eq!(clt.len(), 12);
    assert_eq!(&clt[8..], &[2.0; 4]);
}

#[test]
fn new_session_forgets_closed_outputs() {
    let dir = tempdir().unwrap();
    let mut engine = NetcdfEngine::new();
    start(&mut engine, dir.path(), FileAction::Replace);
    let decl = grid_decl(&mut engine, "clt", None);
    let first = engine.variable(&decl).unwrap();
    engine.close(first).unwrap();
    assert!(engine.output_path(first).is_some());

    start(&mut engine, dir.path(), FileAction::Replace);
    assert!(engine.output_path(first).is_none());

    let decl = grid_decl(&mut engine, "tauv", Some(Positive::Down));
    let second = engine.variable(&decl).unwrap();
    assert_ne!(second, first);
    assert!(engine.output_path(second).is_some());
}
