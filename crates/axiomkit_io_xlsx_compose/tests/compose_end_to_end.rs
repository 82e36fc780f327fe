use std::io::Cursor;

use axiomkit_io_xlsx_compose::{
    SpecComposeOptions, SpecWorkbookLayout, WorkbookWriter, XlsxWorkbookWriter, compose_book,
    derive_workbook_data_from_json_str, export_xlsx_to_dir,
};
use calamine::{Data, Reader, Xlsx, open_workbook, open_workbook_from_rs};
use tempfile::tempdir;

const C_PNG_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn derive_orders_layout() -> SpecWorkbookLayout {
    let c_json = r##"{
        "workbook": {"creator": "ops", "created": "2024-05-01T09:30:00.000Z"},
        "01": {
            "workSheet": {"name": "Orders", "sheetProtection": {"sheet": true, "sort": true}},
            "colLayouts": [
                {"number": 1, "width": 12},
                {"number": 2, "width": 8},
                {"number": 5, "width": 20, "hidden": true}
            ],
            "cellDatas": [
                {"row": 1, "col": 1, "value": "Item", "style": {"font": {"bold": true}}},
                {"row": 1, "col": 2, "value": "Qty", "style": {"font": {"bold": true}}},
                {"row": 1, "col": 3, "value": "Price", "style": {"font": {"bold": true}}},
                {"row": 1, "col": 4, "value": "Amount", "style": {"font": {"bold": true}}},
                {"row": 1, "col": 5, "value": "Memo"},
                {"row": 2, "col": 1, "style": {"border": {"bottom": {"style": "thin"}}}},
                {"row": 2, "col": 2, "style": {
                    "border": {"bottom": {"style": "thin", "color": {"argb": "FF808080"}}},
                    "protection": {"locked": false}
                }},
                {"row": 2, "col": 3, "style": {"numFmt": "0.00"}},
                {"row": 2, "col": 4, "style": {"numFmt": "0.00"}}
            ],
            "colValidations": {
                "2": {"dataValidation": {"type": "whole", "operator": "greaterThan", "formulae": [0]}}
            }
        },
        "02": {
            "workSheet": {"name": "Notes"},
            "cellDatas": [
                {"row": 1, "col": 1, "value": "hello", "note": "greeting"},
                {"row": 5, "col": 1, "value": {"richText": [
                    {"text": "Hi "}, {"text": "there", "font": {"bold": true}}
                ]}, "style": {"alignment": {"vertical": "middle"}}}
            ],
            "images": [{"range": "B2:C3", "imageUrl": "__PNG__"}]
        }
    }"##;
    SpecWorkbookLayout::from_json_str(&c_json.replace("__PNG__", C_PNG_URI)).unwrap()
}

fn derive_orders_data() -> axiomkit_io_xlsx_compose::SpecWorkbookData {
    derive_workbook_data_from_json_str(
        r#"{"01": {
            "startRowNum": 2,
            "newRows": [["pen", "P1", 3, 1.5], ["ink", "I1", 5, 2]],
            "insertColNum": 2,
            "newCols": [{"rowNum": 1, "value": "Code"}],
            "customFormulas": [{"startAddress": "D2", "refAddress": "B2", "formula": "={ref}*D{row}"}],
            "removeColumns": [{"startColNum": 5, "removeColCount": 1}]
        }}"#,
    )
    .unwrap()
}

#[test]
fn test_export_writes_readable_workbook() {
    let tmp = tempdir().unwrap();
    let options = SpecComposeOptions {
        sheet_password: Some("s3cret".to_string()),
        ..Default::default()
    };

    let report = export_xlsx_to_dir(
        &derive_orders_layout(),
        &derive_orders_data(),
        "orders",
        tmp.path(),
        &options,
    )
    .unwrap();

    assert!(report.if_saved, "warnings: {:?}", report.warnings);
    assert_eq!(report.sheet_names, vec!["Orders".to_string(), "Notes".to_string()]);
    let path_file = tmp.path().join("orders.xlsx");
    assert!(report.n_bytes > 0);

    let mut workbook: Xlsx<_> = open_workbook(&path_file).unwrap();
    assert_eq!(
        workbook.sheet_names(),
        vec!["Orders".to_string(), "Notes".to_string()]
    );

    let range = workbook.worksheet_range("Orders").unwrap();
    let l_header: Vec<Option<&Data>> = (0..6).map(|col| range.get_value((0, col))).collect();
    assert_eq!(
        l_header,
        vec![
            Some(&Data::String("Item".to_string())),
            Some(&Data::String("Code".to_string())),
            Some(&Data::String("Qty".to_string())),
            Some(&Data::String("Price".to_string())),
            Some(&Data::String("Amount".to_string())),
            None,
        ]
    );
    assert_eq!(range.get_value((2, 0)), Some(&Data::String("pen".to_string())));
    assert_eq!(range.get_value((2, 1)), Some(&Data::String("P1".to_string())));
    assert_eq!(range.get_value((2, 2)), Some(&Data::Float(3.0)));
    assert_eq!(range.get_value((3, 3)), Some(&Data::Float(2.0)));

    let formulas = workbook.worksheet_formula("Orders").unwrap();
    assert_eq!(formulas.get_value((1, 4)).map(String::as_str), Some("C2*D2"));
    assert_eq!(formulas.get_value((3, 4)).map(String::as_str), Some("C4*D4"));

    let notes = workbook.worksheet_range("Notes").unwrap();
    assert_eq!(notes.get_value((0, 0)), Some(&Data::String("hello".to_string())));
    assert_eq!(notes.get_value((4, 0)), Some(&Data::String("Hi there".to_string())));
}

#[test]
fn test_tables_are_written_from_table_infos() {
    let layout = SpecWorkbookLayout::from_json_str(
        r#"{"1": {
            "workSheet": {"name": "Summary"},
            "tableInfos": [{
                "name": "Totals",
                "ref": "B2",
                "totalsRow": true,
                "style": {"theme": "TableStyleMedium2", "showRowStripes": true},
                "columns": [
                    {"name": "Name", "totalsRowLabel": "Total"},
                    {"name": "Qty", "totalsRowFunction": "sum"}
                ],
                "rows": [["a", 1], ["b", 2]]
            }]
        }}"#,
    )
    .unwrap();

    let book = compose_book(
        &layout,
        &Default::default(),
        &SpecComposeOptions::default(),
    )
    .unwrap();
    let v_bytes = XlsxWorkbookWriter::new().write_buffer(&book).unwrap();

    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(v_bytes)).unwrap();
    let range = workbook.worksheet_range("Summary").unwrap();
    assert_eq!(range.get_value((1, 1)), Some(&Data::String("Name".to_string())));
    assert_eq!(range.get_value((1, 2)), Some(&Data::String("Qty".to_string())));
    assert_eq!(range.get_value((2, 1)), Some(&Data::String("a".to_string())));
    assert_eq!(range.get_value((3, 2)), Some(&Data::Float(2.0)));
    assert_eq!(range.get_value((4, 1)), Some(&Data::String("Total".to_string())));
}

#[test]
fn test_protection_without_password_writes_nothing() {
    let tmp = tempdir().unwrap();

    let err = export_xlsx_to_dir(
        &derive_orders_layout(),
        &derive_orders_data(),
        "orders",
        tmp.path(),
        &SpecComposeOptions::default(),
    )
    .unwrap_err();

    assert!(err.to_string().contains("\"01\""));
    assert!(!tmp.path().join("orders.xlsx").exists());
}
