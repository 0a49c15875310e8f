mod common;

use chrono::NaiveDate;
use common::{Sheet, write_workbook};
use millwear::WearError;
use millwear::graph::{LineColor, LineDash, Y_RANGE, build_chart};
use tempfile::tempdir;

#[test]
fn test_one_series_per_sheet() {
    let dir = tempdir().unwrap();
    let path = write_workbook(
        dir.path(),
        "FE.xlsx",
        &[
            Sheet::sensor(
                "Sensor1",
                &[
                    ("2025-05-10 08:00:00", 12337.0, 0.0),
                    ("2025-05-11 08:00:00", 300.0, 299.0),
                    ("2025-05-12 08:00:00", 300.0, 297.0),
                ],
            ),
            Sheet::sensor("Sensor2", &[("2025-05-10 08:00:00", 12337.0, 0.0)]),
        ],
    );

    let chart = build_chart(&path).unwrap();
    assert_eq!(chart.series.len(), 2);

    let first = &chart.series[0];
    assert_eq!(first.name, "Sensor1");
    assert_eq!(first.mode, "lines+markers");
    assert_eq!(first.points.len(), 2);
    assert_eq!(
        first.points[0].time,
        NaiveDate::from_ymd_opt(2025, 5, 11).unwrap().and_hms_opt(8, 0, 0).unwrap()
    );
    assert_eq!(first.points[1].length, Some(297.0));

    assert_eq!(chart.series[1].name, "Sensor2");
    assert!(chart.series[1].points.is_empty());
}

#[test]
fn test_chart_layout() {
    let dir = tempdir().unwrap();
    let path = write_workbook(dir.path(), "FE.xlsx", &[Sheet::sensor("Sensor1", &[])]);
    let chart = build_chart(&path).unwrap();

    let limits: Vec<_> = chart
        .thresholds
        .iter()
        .map(|t| (t.value, t.label.as_str(), t.color, t.dash))
        .collect();
    assert_eq!(
        limits,
        [
            (150.0, "Lifter Reline Limit 150mm", LineColor::Orange, LineDash::Dash),
            (120.0, "Lifter Failure Limit 120mm", LineColor::Red, LineDash::Solid),
            (40.0, "Plate Reline Limit 40mm", LineColor::Orange, LineDash::Dash),
            (30.0, "Plate Failure Limit 30mm", LineColor::Red, LineDash::Solid),
        ]
    );
    assert_eq!(chart.y_range, Y_RANGE);
    assert_eq!(chart.x_title, "Date and Time");
    assert_eq!(chart.y_title, "Sensor Length - mm");

    let json = serde_json::to_value(&chart).unwrap();
    assert_eq!(json["legend"]["orientation"], "h");
    assert_eq!(json["legend"]["y"], 0.9);
}

#[test]
fn test_missing_nominal_column_is_fatal() {
    let dir = tempdir().unwrap();
    let mut broken = Sheet::sensor("Sensor2", &[("2025-05-10 08:00:00", 300.0, 299.0)]);
    broken.headers[1] = "other";
    let path = write_workbook(
        dir.path(),
        "FE.xlsx",
        &[Sheet::sensor("Sensor1", &[("2025-05-10 08:00:00", 300.0, 299.0)]), broken],
    );

    match build_chart(&path) {
        Err(WearError::MissingColumn { sheet, column }) => {
            assert_eq!(sheet, "Sensor2");
            assert_eq!(column, common::TOTAL);
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.series.len())),
    }
}
