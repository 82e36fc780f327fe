//! `axiomkit_io_xlsx_compose` v1:
//! Layout + data composition kernel for XLSX exports.
//!
//! Module map:
//! - `conf`    : constants and default presets
//! - `spec`    : payload specs, options, reports and errors
//! - `util`    : pure helpers (column remap, A1 addressing, sheet ordering)
//! - `model`   : in-memory worksheet/workbook store
//! - `compose` : per-sheet composition pipeline
//! - `book`    : book composer and export entry points
//! - `writer`  : `rust_xlsxwriter` serialization kernel
//! - `sink`    : file sinks
//! - `frame`   : DataFrame sources for new rows
pub mod book;
pub mod compose;
pub mod conf;
pub mod frame;
pub mod model;
pub mod sink;
pub mod spec;
pub mod util;
pub mod writer;

pub use book::{compose_book, export_xlsx_to_dir, handle_file_export};
pub use compose::{SpecSheetPlan, compose_sheet};
pub use conf::{
    C_SHEET_ID_WORKBOOK, C_XLSX_FILE_EXTENSION, C_XLSX_FILE_TYPE, N_COL_WIDTH_DEFAULT,
    N_COL_WIDTH_ERROR_MARGIN, derive_default_compose_options,
};
pub use frame::{derive_new_rows_from_dataframe, derive_new_rows_from_ipc_bytes};
pub use model::{BookModel, SheetModel};
pub use sink::{FileSink, FsFileSink};
pub use spec::{
    ComposeError, EnumCellValue, EnumUnderline, ExportError, SpecBorderSide, SpecCellStyle,
    SpecComposeOptions, SpecExportReport, SpecRichTextRun, SpecSheetData, SpecSheetLayout, SpecWorkbookData, SpecWorkbookLayout,
    derive_workbook_data_from_json_str,
};
pub use util::{remap_column_number, sanitize_sheet_name, sort_sheet_ids};
pub use writer::{WorkbookWriter, XlsxWorkbookWriter};
