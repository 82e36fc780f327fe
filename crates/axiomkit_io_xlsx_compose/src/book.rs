//! Book composer and export entry points.

use std::path::PathBuf;

use crate::compose::compose_sheet;
use crate::conf::C_SHEET_ID_WORKBOOK;
use crate::model::BookModel;
use crate::sink::{FileSink, FsFileSink};
use crate::spec::{
    ComposeError, SpecComposeOptions, SpecExportReport, SpecSheetData, SpecSheetLayout,
    SpecWorkbookData, SpecWorkbookLayout,
};
use crate::util::sort_sheet_ids;
use crate::writer::{WorkbookWriter, XlsxWorkbookWriter};

/// Compose every sheet into one workbook model.
///
/// Sheet identifiers are visited in natural order. The first failing sheet
/// aborts the whole book.
pub fn compose_book(
    layout: &SpecWorkbookLayout,
    data: &SpecWorkbookData,
    options: &SpecComposeOptions,
) -> Result<BookModel, ComposeError> {
    let mut book = BookModel::new();
    let data_empty = SpecSheetData::default();

    if !layout.is_empty() {
        if let Some(props) = &layout.workbook {
            book.set_properties(props.clone());
        }
        for sheet_id in sort_sheet_ids(layout.sheets.keys()) {
            let sheet_data = data.get(sheet_id).unwrap_or(&data_empty);
            compose_and_push(&mut book, sheet_id, &layout.sheets[sheet_id], sheet_data, options)?;
        }
        for sheet_id in data.keys().filter(|id| !layout.sheets.contains_key(*id)) {
            log::warn!("Data for sheet {sheet_id:?} has no layout entry; ignored");
        }
    } else {
        for sheet_id in sort_sheet_ids(data.keys()) {
            if sheet_id == C_SHEET_ID_WORKBOOK {
                log::warn!("Reserved key {C_SHEET_ID_WORKBOOK:?} in data payload; ignored");
                continue;
            }
            let layout_bare = SpecSheetLayout::from_name(sheet_id);
            compose_and_push(&mut book, sheet_id, &layout_bare, &data[sheet_id], options)?;
        }
    }

    log::debug!("Composed workbook with {} sheet(s)", book.sheets().len());
    Ok(book)
}

fn compose_and_push(
    book: &mut BookModel,
    sheet_id: &str,
    layout: &SpecSheetLayout,
    data: &SpecSheetData,
    options: &SpecComposeOptions,
) -> Result<(), ComposeError> {
    compose_sheet(book, sheet_id, layout, data, options)
        .and_then(|sheet| book.push_worksheet(sheet))
        .map_err(|err| ComposeError::Sheet {
            sheet_id: sheet_id.to_string(),
            source: Box::new(err),
        })
}

/// Compose, serialize and hand the workbook to `sink`.
///
/// Composition failures are returned as errors. Writer/sink failures are
/// logged and reported through [`SpecExportReport`] with `if_saved = false`.
pub fn handle_file_export<W, S>(
    layout: &SpecWorkbookLayout,
    data: &SpecWorkbookData,
    file_name: &str,
    options: &SpecComposeOptions,
    writer: &W,
    sink: &S,
) -> Result<SpecExportReport, ComposeError>
where
    W: WorkbookWriter + ?Sized,
    S: FileSink + ?Sized,
{
    let book = compose_book(layout, data, options)?;
    let mut report = SpecExportReport {
        sheet_names: book.sheet_names(),
        file_name: format!("{file_name}{}", options.file_extension),
        ..Default::default()
    };

    let v_buffer = match writer.write_buffer(&book) {
        Ok(v_buffer) => v_buffer,
        Err(err) => {
            log::error!("Failed to serialize {:?}: {err}", report.file_name);
            report.warn(format!("serialization failed: {err}"));
            return Ok(report);
        }
    };
    report.n_bytes = v_buffer.len();

    match sink.save(&v_buffer, &options.file_type, &report.file_name) {
        Ok(()) => report.if_saved = true,
        Err(err) => {
            log::error!("Failed to save {:?}: {err}", report.file_name);
            report.warn(format!("save failed: {err}"));
        }
    }
    Ok(report)
}

/// Export an `.xlsx` file into `dir_out` using the default writer and sink.
pub fn export_xlsx_to_dir(
    layout: &SpecWorkbookLayout,
    data: &SpecWorkbookData,
    file_name: &str,
    dir_out: impl Into<PathBuf>,
    options: &SpecComposeOptions,
) -> Result<SpecExportReport, ComposeError> {
    handle_file_export(
        layout,
        data,
        file_name,
        options,
        &XlsxWorkbookWriter::new(),
        &FsFileSink::new(dir_out),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::spec::{EnumCellValue, ExportError, SpecSheetProtection, SpecWorksheetProps};

    struct MockWriter {
        if_fail: bool,
    }

    impl WorkbookWriter for MockWriter {
        fn write_buffer(&self, book: &BookModel) -> Result<Vec<u8>, ExportError> {
            if self.if_fail {
                return Err(ExportError::InvalidValidation("boom".to_string()));
            }
            Ok(book.sheet_names().join(",").into_bytes())
        }
    }

    #[derive(Default)]
    struct MockSink {
        saved: RefCell<Vec<(Vec<u8>, String, String)>>,
    }

    impl FileSink for MockSink {
        fn save(&self, buffer: &[u8], file_type: &str, file_name: &str) -> Result<(), ExportError> {
            self.saved
                .borrow_mut()
                .push((buffer.to_vec(), file_type.to_string(), file_name.to_string()));
            Ok(())
        }
    }

    fn derive_layout(json: &str) -> SpecWorkbookLayout {
        SpecWorkbookLayout::from_json_str(json).unwrap()
    }

    #[test]
    fn test_sheets_are_composed_in_natural_order() {
        let layout = derive_layout(
            r#"{
                "10": {"workSheet": {"name": "Ten"}},
                "2": {"workSheet": {"name": "Two"}},
                "workbook": {"creator": "ops", "views": [{"activeTab": 1}]}
            }"#,
        );

        let book = compose_book(&layout, &SpecWorkbookData::new(), &SpecComposeOptions::default())
            .unwrap();

        assert_eq!(book.sheet_names(), vec!["Two".to_string(), "Ten".to_string()]);
        assert_eq!(book.properties().unwrap().creator.as_deref(), Some("ops"));
    }

    #[test]
    fn test_data_without_layout_synthesizes_sheets() {
        let mut data = SpecWorkbookData::new();
        data.insert(
            "Orders".to_string(),
            SpecSheetData {
                start_row_num: Some(1),
                new_rows: vec![vec![EnumCellValue::from("a"), EnumCellValue::from(1i64)]],
                ..Default::default()
            },
        );

        let book =
            compose_book(&SpecWorkbookLayout::default(), &data, &SpecComposeOptions::default())
                .unwrap();

        let sheet = book.sheet("Orders").unwrap();
        assert_eq!(sheet.cell(2, 1).unwrap().value, EnumCellValue::from("a"));
        assert_eq!(sheet.cell(2, 2).unwrap().value, EnumCellValue::Number(1.0));
    }

    #[test]
    fn test_first_sheet_failure_aborts_with_sheet_id() {
        let mut layout = derive_layout(r#"{"1": {"workSheet": {"name": "Ok"}}}"#);
        let mut locked = SpecSheetLayout::from_name("Locked");
        locked.work_sheet = SpecWorksheetProps {
            name: "Locked".to_string(),
            sheet_protection: Some(SpecSheetProtection {
                sheet: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        layout.sheets.insert("2".to_string(), locked);
        let sink = MockSink::default();

        let err = handle_file_export(
            &layout,
            &SpecWorkbookData::new(),
            "out",
            &SpecComposeOptions::default(),
            &MockWriter { if_fail: false },
            &sink,
        )
        .unwrap_err();

        match err {
            ComposeError::Sheet { sheet_id, source } => {
                assert_eq!(sheet_id, "2");
                assert!(matches!(*source, ComposeError::MissingSheetPassword(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sink.saved.borrow().is_empty());
    }

    #[test]
    fn test_duplicate_sheet_names_abort() {
        let layout = derive_layout(
            r#"{"1": {"workSheet": {"name": "Data"}}, "2": {"workSheet": {"name": "data"}}}"#,
        );
        let err = compose_book(&layout, &SpecWorkbookData::new(), &SpecComposeOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::Sheet { ref sheet_id, ref source }
                if sheet_id == "2" && matches!(**source, ComposeError::DuplicateSheetName(_))
        ));
    }

    #[test]
    fn test_export_hands_buffer_to_sink() {
        let layout = derive_layout(r#"{"1": {"workSheet": {"name": "A"}}, "2": {}}"#);
        let sink = MockSink::default();

        let report = handle_file_export(
            &layout,
            &SpecWorkbookData::new(),
            "monthly",
            &SpecComposeOptions::default(),
            &MockWriter { if_fail: false },
            &sink,
        )
        .unwrap();

        assert!(report.if_saved);
        assert_eq!(report.file_name, "monthly.xlsx");
        assert_eq!(report.sheet_names, vec!["A".to_string(), "2".to_string()]);
        assert_eq!(report.n_bytes, 3);
        let saved = sink.saved.borrow();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, b"A,2".to_vec());
        assert!(saved[0].1.starts_with("application/vnd.openxmlformats"));
        assert_eq!(saved[0].2, "monthly.xlsx");
    }

    #[test]
    fn test_writer_failure_is_reported_not_raised() {
        let layout = derive_layout(r#"{"1": {}}"#);
        let sink = MockSink::default();

        let report = handle_file_export(
            &layout,
            &SpecWorkbookData::new(),
            "broken",
            &SpecComposeOptions::default(),
            &MockWriter { if_fail: true },
            &sink,
        )
        .unwrap();

        assert!(!report.if_saved);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("boom"));
        assert!(sink.saved.borrow().is_empty());
    }
}
