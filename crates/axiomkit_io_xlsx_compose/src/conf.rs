//! XLSX composition constants and default preset factories.

use crate::spec::SpecComposeOptions;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: u32 = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: u32 = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// MIME type handed to the file sink together with the workbook buffer.
pub const C_XLSX_FILE_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet;charset=UTF-8";
/// Extension appended to the requested file name.
pub const C_XLSX_FILE_EXTENSION: &str = ".xlsx";

/// Column width used when neither the column nor the sheet declares one.
pub const N_COL_WIDTH_DEFAULT: f64 = 9.0;
/// Visual correction factor applied to every layout column width.
///
/// The captured template widths render narrower than authored once written
/// back, so widths are widened by this factor. Override through
/// [`SpecComposeOptions::col_width_error_margin`].
pub const N_COL_WIDTH_ERROR_MARGIN: f64 = 1.3;

/// Pixel width of a column without explicit width (Excel's 8.43 chars).
pub const N_COL_WIDTH_PX_DEFAULT: f64 = 64.0;
/// Row height in points when neither row nor sheet sets one.
pub const N_ROW_HEIGHT_PT_DEFAULT: f64 = 15.0;

/// Reserved layout key carrying workbook-level metadata instead of a sheet.
pub const C_SHEET_ID_WORKBOOK: &str = "workbook";

/// Build default composition options (no sheet password configured).
pub fn derive_default_compose_options() -> SpecComposeOptions {
    SpecComposeOptions::default()
}
