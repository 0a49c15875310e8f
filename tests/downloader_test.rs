mod common;

use calamine::{Data, Reader, Xlsx, open_workbook};
use common::{Sheet, write_workbook};
use millwear::WearError;
use millwear::downloader::{EXPORT_COLUMNS, export_workbook};
use tempfile::tempdir;

#[test]
fn test_export_renames_columns_and_keeps_rows() {
    let dir = tempdir().unwrap();
    let source = write_workbook(
        dir.path(),
        "FE2025May_Database_update.xlsx",
        &[
            Sheet::wide(
                "Sensor1",
                9,
                &[("2025-05-10 08:00:00", 12337.0, 0.0), ("2025-05-11 08:00:00", 300.0, 299.0)],
            ),
            Sheet::wide("Sensor2", 9, &[("2025-05-12 08:00:00", 310.0, 305.5)]),
        ],
    );

    let bytes = export_workbook(&source).unwrap();
    let out = dir.path().join("export.xlsx");
    std::fs::write(&out, &bytes).unwrap();

    let mut exported: Xlsx<_> = open_workbook(&out).unwrap();
    assert_eq!(exported.sheet_names(), ["Sensor1", "Sensor2"]);

    let range = exported.worksheet_range("Sensor1").unwrap();
    let headers: Vec<String> = range.rows().next().unwrap().iter().map(|c| c.to_string()).collect();
    assert_eq!(headers, EXPORT_COLUMNS);
    // sentinel rows are exported as they are
    assert_eq!(range.height(), 3);
    assert_eq!(range.get((1, 0)), Some(&Data::String("2025-05-10 08:00:00".into())));
    assert_eq!(range.get((2, 2)), Some(&Data::Float(299.0)));

    let range = exported.worksheet_range("Sensor2").unwrap();
    assert_eq!(range.height(), 2);
    assert_eq!(range.get((1, 1)), Some(&Data::Float(310.0)));
}

#[test]
fn test_column_count_mismatch_names_sheet() {
    let dir = tempdir().unwrap();
    let source = write_workbook(
        dir.path(),
        "MID.xlsx",
        &[
            Sheet::wide("Sensor1", 9, &[("2025-05-10 08:00:00", 300.0, 299.0)]),
            Sheet::wide("Sensor2", 8, &[("2025-05-10 08:00:00", 300.0, 299.0)]),
        ],
    );

    match export_workbook(&source) {
        Err(WearError::SchemaMismatch { sheet, expected, actual }) => {
            assert_eq!(sheet, "Sensor2");
            assert_eq!(expected, 9);
            assert_eq!(actual, 8);
        }
        other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
    }
}

#[test]
fn test_export_missing_file() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        export_workbook(dir.path().join("DE.xlsx")),
        Err(WearError::FileNotFound(_))
    ));
}
