//! End-to-end integration tests: CSV -> data spec -> JSON -> encoded dataset.

use std::path::{Path, PathBuf};

use canopy_io::{
    ColumnData, ColumnEncoder, ColumnKind, ColumnStats, DataSpec, InferenceOptions,
    SchemaInference, Value, read_header,
};

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn weather_schema() {
    let spec = SchemaInference::default()
        .infer(&fixture_path("weather.csv"))
        .expect("fixture should infer");

    assert_eq!(spec.num_rows(), 14);
    let kinds: Vec<ColumnKind> = spec.columns().iter().map(|c| c.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ColumnKind::Numerical,
            ColumnKind::Categorical,
            ColumnKind::Boolean,
            ColumnKind::Numerical,
            ColumnKind::Categorical,
        ]
    );

    // Dictionary codes follow first appearance.
    let outlook = spec.columns()[1].dictionary().unwrap();
    assert_eq!(
        outlook.iter().collect::<Vec<_>>(),
        vec![(1, "sunny"), (2, "overcast"), (3, "rain")]
    );
    let play = spec.columns()[4].dictionary().unwrap();
    assert_eq!(play.most_frequent(), Some("yes"));

    let ColumnStats::Boolean(windy) = spec.columns()[2].stats() else {
        panic!("windy should be boolean");
    };
    assert_eq!(windy.count_true, 6);
    assert_eq!(windy.count_false, 8);

    let humidity = &spec.columns()[3];
    assert_eq!(humidity.num_missing(), 2);
    let stats = humidity.numerical().unwrap();
    assert!((stats.min - 65.0).abs() < f64::EPSILON);
    assert!((stats.max - 96.0).abs() < f64::EPSILON);
}

#[test]
fn data_spec_survives_json() {
    let spec = SchemaInference::default()
        .infer(&fixture_path("weather.csv"))
        .unwrap();
    let json = serde_json::to_string_pretty(&spec).unwrap();
    let back: DataSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
}

#[test]
fn weather_encodes_with_sentinels() {
    let path = fixture_path("weather.csv");
    let spec = SchemaInference::default().infer(&path).unwrap();
    let ds = ColumnEncoder::new(&spec).encode(&path).unwrap();

    assert_eq!(ds.n_rows(), 14);
    assert_eq!(ds.n_columns(), 5);
    assert_eq!(ds.column(3).value(2), Value::Missing);
    assert_eq!(ds.column(3).value(7), Value::Missing);
    assert_eq!(ds.column(2).value(9), Value::Boolean(false));
    assert_eq!(ds.column(2).value(10), Value::Boolean(true));
    assert_eq!(ds.column(1).value(2), Value::Categorical(2));

    let ColumnData::Numerical(humidity) = ds.column(3) else {
        panic!("humidity should be numerical");
    };
    assert_eq!(humidity.iter().filter(|v| v.is_nan()).count(), 2);
}

#[test]
fn forced_kinds_override_guessing() {
    let path = fixture_path("weather.csv");
    let options = InferenceOptions::new()
        .with_column_kind("humidity", ColumnKind::Categorical)
        .with_max_num_values(Some(1));
    let spec = SchemaInference::new(options).infer(&path).unwrap();

    let humidity = &spec.columns()[3];
    assert_eq!(humidity.kind(), ColumnKind::Categorical);
    // Only the first value fits under the cap.
    assert_eq!(humidity.dictionary().unwrap().len(), 2);
    // The cap applies to every categorical column.
    assert_eq!(spec.columns()[1].dictionary().unwrap().len(), 2);
}

#[test]
fn header_matches_spec_order() {
    let path = fixture_path("weather.csv");
    let header = read_header(&path).unwrap();
    let spec = SchemaInference::default().infer(&path).unwrap();
    let names: Vec<&str> = spec.columns().iter().map(|c| c.name()).collect();
    assert_eq!(header, names);
    assert_eq!(spec.column_index("windy"), Some(2));
}
