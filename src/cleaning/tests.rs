#![expect(clippy::unwrap_used, clippy::panic)]
use super::*;
use crate::error::Result;
use polars::prelude::*;

const CLEANING: &str = r#"
rename_cols:
  dep_time: departure_time
  from: source_city
concat_cols:
  flight:
    col1: ch_code
    col2: num_code
    col_type: str
bucket_time_cols:
  departure: dep_time
bucket_hours:
  late_night: {min: 0, max: 4}
  early_morning: {min: 4, max: 8}
  morning: {min: 8, max: 12}
  afternoon: {min: 12, max: 16}
  evening: {min: 16, max: 20}
  night: {min: 20, max: 24}
time_to_hours:
  duration: time_taken
stops_cols:
  stops: stop
get_stops:
  pattern: 'non-stop|1-stop|2\+-stop'
  stop_dict: {non-stop: 0, 1-stop: 1, 2+-stop: 2}
price_cols:
  price: {pattern: ',', replacement: ''}
selected_features: [airline, flight, source_city, departure, duration, stops, price]
"#;

fn config() -> CleaningConfig {
    serde_yaml::from_str(CLEANING).unwrap()
}

fn raw() -> Result<DataFrame> {
    let columns = vec![
        Series::new("airline".into(), vec!["SpiceJet", "Air India", "Vistara"]),
        Series::new("ch_code".into(), vec!["SG", "AI", "UK"]),
        Series::new("num_code".into(), vec![8709i64, 868, 995]),
        Series::new("dep_time".into(), vec!["18:55", "00:15", "09:30"]),
        Series::new("from".into(), vec!["Delhi", "Delhi", "Mumbai"]),
        Series::new("time_taken".into(), vec!["02h 10m", "10.30h m", "1h 45m"]),
        Series::new(
            "stop".into(),
            vec!["non-stop ", "1-stop\n\t\t\t\tVia IXU", "2+-stop"],
        ),
        Series::new("price".into(), vec!["5,953", "25,612", "7,000"]),
    ];
    Ok(DataFrame::new(columns.into_iter().map(Column::from).collect())?)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|n| n.to_string()).collect()
}

#[test]
fn test_clean_data_produces_selected_features() -> Result<()> {
    let raw = raw()?;
    let clean = clean_data(&raw, &config())?;

    assert_eq!(
        column_names(&clean),
        vec![
            "airline",
            "flight",
            "source_city",
            "departure",
            "duration",
            "stops",
            "price"
        ]
    );
    assert_eq!(clean.height(), raw.height());

    let flight = clean.column("flight")?.as_materialized_series().str()?.clone();
    assert_eq!(flight.get(0), Some("SG-8709"));

    let departure = clean.column("departure")?.as_materialized_series().str()?.clone();
    assert_eq!(departure.get(0), Some("evening"));
    assert_eq!(departure.get(1), Some("late_night"));
    assert_eq!(departure.get(2), Some("morning"));

    let duration = clean.column("duration")?.as_materialized_series().f64()?.clone();
    assert_eq!(duration.get(0), Some(2.17));
    assert_eq!(duration.get(1), Some(10.3));
    assert_eq!(duration.get(2), Some(1.75));

    let stops = clean.column("stops")?.as_materialized_series().i64()?.clone();
    assert_eq!(stops.get(0), Some(0));
    assert_eq!(stops.get(1), Some(1));
    assert_eq!(stops.get(2), Some(2));

    let price = clean.column("price")?.as_materialized_series().i64()?.clone();
    assert_eq!(price.get(1), Some(25612));
    Ok(())
}

#[test]
fn test_raw_table_is_not_mutated() -> Result<()> {
    let raw = raw()?;
    let before = raw.clone();
    let first = clean_data(&raw, &config())?;
    let second = clean_data(&raw, &config())?;

    assert!(raw.equals_missing(&before));
    assert!(first.equals_missing(&second));
    Ok(())
}

#[test]
fn test_unmatched_stop_text_is_null() -> Result<()> {
    let mut raw = raw()?;
    raw.with_column(Series::new(
        "stop".into(),
        vec!["non-stop", "unknown", "2+-stop"],
    ))?;
    let clean = clean_data(&raw, &config())?;
    let stops = clean.column("stops")?.as_materialized_series().i64()?.clone();
    assert_eq!(stops.get(1), None);
    assert_eq!(stops.null_count(), 1);
    Ok(())
}

#[test]
fn test_non_numeric_price_fails() -> Result<()> {
    let mut raw = raw()?;
    raw.with_column(Series::new("price".into(), vec!["5,953", "n/a", "7,000"]))?;
    let err = clean_data(&raw, &config()).unwrap_err();
    assert!(matches!(err, AirfareError::Parse { what: "integer", .. }));
    assert!(err.to_string().contains("\"n/a\""), "{err}");
    Ok(())
}

#[test]
fn test_missing_source_column_names_step() -> Result<()> {
    let raw = raw()?.drop("time_taken")?;
    let err = clean_data(&raw, &config()).unwrap_err();
    match err {
        AirfareError::MissingColumn { stage, column } => {
            assert_eq!(stage, "time_to_hours");
            assert_eq!(column, "time_taken");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_selected_feature_missing_after_rename() -> Result<()> {
    let mut config = config();
    config.selected_features.push("dep_time".to_owned());
    let err = clean_data(&raw()?, &config).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Schema error in selected_features: column 'dep_time' does not exist"
    );
    Ok(())
}

#[test]
fn test_empty_table_rejected() -> Result<()> {
    let raw = raw()?.head(Some(0));
    let err = clean_data(&raw, &config()).unwrap_err();
    assert!(matches!(err, AirfareError::EmptyTable { .. }));
    Ok(())
}

#[test]
fn test_unbucketed_hour_fails() -> Result<()> {
    let mut config = config();
    config.bucket_hours.shift_remove("night");
    let err = clean_data(&raw()?, &config);
    // 18:55 still lands in "evening"; no row falls in the removed bucket
    assert!(err.is_ok());

    let mut raw = raw()?;
    raw.with_column(Series::new(
        "dep_time".into(),
        vec!["18:55", "22:10", "09:30"],
    ))?;
    let err = clean_data(&raw, &config).unwrap_err();
    assert!(err.to_string().contains("row 1"), "{err}");
    Ok(())
}
