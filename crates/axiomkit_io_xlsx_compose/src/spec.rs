//! Layout/data payload models, composition options, reports and errors.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::conf::{
    C_SHEET_ID_WORKBOOK, C_XLSX_FILE_EXTENSION, C_XLSX_FILE_TYPE, N_COL_WIDTH_DEFAULT,
    N_COL_WIDTH_ERROR_MARGIN,
};
use crate::util::derive_hex_color_from_argb;

////////////////////////////////////////////////////////////////////////////////
// #region CellStyleSpecification

/// Underline kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumUnderline {
    Single,
    Double,
    SingleAccounting,
    DoubleAccounting,
}

/// One border edge: line style name (`thin`, `dashed`, ...) and `#RRGGBB` color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBorderSide {
    pub style: String,
    pub color: Option<String>,
}

/// Cell style captured from the layout template.
///
/// Deserialized from the ExcelJS style shape (`font`, `fill`, `border`,
/// `alignment`, `numFmt`, `protection`) and flattened for the writer.
/// Styles are plain values: every place that reuses a style takes its own
/// clone, so mutating one cell never leaks into another.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "SpecExcelStyle")]
pub struct SpecCellStyle {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    pub underline: Option<EnumUnderline>,
    pub strikethrough: Option<bool>,
    /// Font color as `#RRGGBB`.
    pub font_color: Option<String>,

    /// Horizontal alignment (ExcelJS `alignment.horizontal`).
    pub align: Option<String>,
    /// Vertical alignment (ExcelJS `alignment.vertical`).
    pub valign: Option<String>,
    /// Text wrap.
    pub text_wrap: Option<bool>,

    pub top: Option<SpecBorderSide>,
    pub bottom: Option<SpecBorderSide>,
    pub left: Option<SpecBorderSide>,
    pub right: Option<SpecBorderSide>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Solid fill color as `#RRGGBB`.
    pub bg_color: Option<String>,

    /// Cell lock flag, effective once the sheet is protected.
    pub locked: Option<bool>,
    /// Hide formulas once the sheet is protected.
    pub hidden: Option<bool>,
}

impl SpecCellStyle {
    /// Style carrying only font properties (rich text runs).
    pub fn from_font(font: &SpecExcelFont) -> Self {
        Self {
            font_name: font.name.clone(),
            font_size: font.size,
            bold: font.bold,
            italic: font.italic,
            underline: font.underline.as_ref().and_then(EnumUnderlineFlag::to_underline),
            strikethrough: font.strike,
            font_color: font.color.as_ref().and_then(SpecArgbColor::to_hex),
            ..Default::default()
        }
    }
}

/// ExcelJS `font` object.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecExcelFont {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<EnumUnderlineFlag>,
    pub strike: Option<bool>,
    pub color: Option<SpecArgbColor>,
}

/// ExcelJS underline: `true` or a kind name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnumUnderlineFlag {
    Flag(bool),
    Kind(String),
}

impl EnumUnderlineFlag {
    fn to_underline(&self) -> Option<EnumUnderline> {
        match self {
            Self::Flag(true) => Some(EnumUnderline::Single),
            Self::Flag(false) => None,
            Self::Kind(kind) => match kind.as_str() {
                "single" => Some(EnumUnderline::Single),
                "double" => Some(EnumUnderline::Double),
                "singleAccounting" => Some(EnumUnderline::SingleAccounting),
                "doubleAccounting" => Some(EnumUnderline::DoubleAccounting),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecExcelFill {
    pattern: Option<String>,
    fg_color: Option<SpecArgbColor>,
    bg_color: Option<SpecArgbColor>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecExcelBorderSide {
    style: Option<String>,
    color: Option<SpecArgbColor>,
}

impl SpecExcelBorderSide {
    fn to_side(&self) -> Option<SpecBorderSide> {
        let style = self.style.clone()?;
        Some(SpecBorderSide {
            style,
            color: self.color.as_ref().and_then(SpecArgbColor::to_hex),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecExcelBorder {
    top: Option<SpecExcelBorderSide>,
    bottom: Option<SpecExcelBorderSide>,
    left: Option<SpecExcelBorderSide>,
    right: Option<SpecExcelBorderSide>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecExcelAlignment {
    horizontal: Option<String>,
    vertical: Option<String>,
    wrap_text: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SpecExcelProtection {
    locked: Option<bool>,
    hidden: Option<bool>,
}

/// ExcelJS style object as captured from the template.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecExcelStyle {
    num_fmt: Option<String>,
    font: Option<SpecExcelFont>,
    fill: Option<SpecExcelFill>,
    border: Option<SpecExcelBorder>,
    alignment: Option<SpecExcelAlignment>,
    protection: Option<SpecExcelProtection>,
}

impl From<SpecExcelStyle> for SpecCellStyle {
    fn from(raw: SpecExcelStyle) -> Self {
        let mut style = raw
            .font
            .as_ref()
            .map(SpecCellStyle::from_font)
            .unwrap_or_default();
        style.num_format = raw.num_fmt;

        if let Some(fill) = &raw.fill
            && fill.pattern.as_deref() != Some("none")
        {
            style.bg_color = fill
                .fg_color
                .as_ref()
                .or(fill.bg_color.as_ref())
                .and_then(SpecArgbColor::to_hex);
        }
        if let Some(border) = &raw.border {
            style.top = border.top.as_ref().and_then(SpecExcelBorderSide::to_side);
            style.bottom = border.bottom.as_ref().and_then(SpecExcelBorderSide::to_side);
            style.left = border.left.as_ref().and_then(SpecExcelBorderSide::to_side);
            style.right = border.right.as_ref().and_then(SpecExcelBorderSide::to_side);
        }
        if let Some(alignment) = raw.alignment {
            style.align = alignment.horizontal;
            style.valign = alignment.vertical;
            style.text_wrap = alignment.wrap_text;
        }
        if let Some(protection) = raw.protection {
            style.locked = protection.locked;
            style.hidden = protection.hidden;
        }
        style
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CellValueSpecification

/// Cell value carried by layouts, overlays and the composed model.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(untagged)]
pub enum EnumCellValue {
    /// Missing/blank value.
    #[default]
    None,
    /// Boolean value.
    Boolean(bool),
    /// Numeric value.
    Number(f64),
    /// Text value.
    String(String),
    /// Formula (written verbatim, never evaluated).
    Formula {
        /// Formula text, with or without the leading `=`.
        formula: String,
    },
    /// Rich text runs (ExcelJS `{"richText": [...]}`).
    RichText {
        #[serde(rename = "richText")]
        rich_text: Vec<SpecRichTextRun>,
    },
    /// Hyperlink with display text (ExcelJS `{"text", "hyperlink"}`).
    Hyperlink {
        #[serde(default)]
        text: String,
        hyperlink: String,
    },
}

/// One rich text run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecRichTextRun {
    pub text: String,
    #[serde(default)]
    pub font: Option<SpecExcelFont>,
}

impl EnumCellValue {
    /// Build a formula value.
    pub fn formula(text: impl Into<String>) -> Self {
        Self::Formula {
            formula: text.into(),
        }
    }

    /// Whether the value is blank.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for EnumCellValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for EnumCellValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataValidationSpecification

/// Data validation rule kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnumValidationType {
    /// Any value; only prompt/error messages apply.
    #[default]
    Any,
    /// Value from a list (`"a,b,c"` literal or a range formula).
    List,
    /// Whole number.
    Whole,
    /// Decimal number.
    Decimal,
    /// Text length.
    TextLength,
    /// Custom formula.
    Custom,
}

/// Comparison operator for numeric/length validations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnumValidationOperator {
    /// `formulae[0] <= x <= formulae[1]`.
    #[default]
    Between,
    /// Outside `formulae[0]..=formulae[1]`.
    NotBetween,
    /// Equal to `formulae[0]`.
    Equal,
    /// Not equal to `formulae[0]`.
    NotEqual,
    /// Greater than `formulae[0]`.
    GreaterThan,
    /// Less than `formulae[0]`.
    LessThan,
    /// Greater than or equal to `formulae[0]`.
    GreaterThanOrEqual,
    /// Less than or equal to `formulae[0]`.
    LessThanOrEqual,
}

/// Alert style shown on invalid input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumValidationErrorStyle {
    /// Reject the value.
    #[default]
    Stop,
    /// Warn, allow override.
    Warning,
    /// Inform only.
    Information,
}

/// One validation operand, either literal number or text/formula.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnumValidationTerm {
    /// Numeric operand.
    Number(f64),
    /// Text operand (list literal or formula).
    Text(String),
}

impl EnumValidationTerm {
    /// Operand as text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Data validation rule attached to cells.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecDataValidation {
    /// Rule kind.
    #[serde(rename = "type")]
    pub rule_type: EnumValidationType,
    /// Comparison operator.
    pub operator: EnumValidationOperator,
    /// Rule operands.
    pub formulae: Vec<EnumValidationTerm>,
    /// Accept blank cells.
    pub allow_blank: Option<bool>,
    /// Show the input prompt.
    pub show_input_message: Option<bool>,
    /// Input prompt title.
    pub prompt_title: Option<String>,
    /// Input prompt body.
    pub prompt: Option<String>,
    /// Show the error alert.
    pub show_error_message: Option<bool>,
    /// Error alert style.
    pub error_style: Option<EnumValidationErrorStyle>,
    /// Error alert title.
    pub error_title: Option<String>,
    /// Error alert body.
    pub error: Option<String>,
}

/// Column-level validation entry (`colValidations[col]`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecColumnValidation {
    /// Validation rule replicated onto data-region cells of the column.
    pub data_validation: SpecDataValidation,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetLayoutSpecification

/// ARGB color wrapper (`{"argb": "FFFF0000"}`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecArgbColor {
    /// `AARRGGBB` or `RRGGBB` hex string.
    pub argb: String,
}

impl SpecArgbColor {
    /// `#RRGGBB`, or `None` for theme/indexed colors.
    pub fn to_hex(&self) -> Option<String> {
        derive_hex_color_from_argb(&self.argb)
    }
}

/// Worksheet-wide display properties.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecSheetProperties {
    /// Fallback width for layout columns without explicit width.
    pub default_col_width: Option<f64>,
    /// Default row height in points.
    pub default_row_height: Option<f64>,
    /// Sheet tab color.
    pub tab_color: Option<SpecArgbColor>,
}

/// Sheet protection request; `sheet` toggles protection, the rest are allowances.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecSheetProtection {
    /// Protect the sheet.
    pub sheet: bool,
    pub select_locked_cells: Option<bool>,
    pub select_unlocked_cells: Option<bool>,
    pub format_cells: Option<bool>,
    pub format_columns: Option<bool>,
    pub format_rows: Option<bool>,
    pub insert_columns: Option<bool>,
    pub insert_rows: Option<bool>,
    pub insert_hyperlinks: Option<bool>,
    pub delete_columns: Option<bool>,
    pub delete_rows: Option<bool>,
    pub sort: Option<bool>,
    pub auto_filter: Option<bool>,
    pub pivot_tables: Option<bool>,
    pub objects: Option<bool>,
    pub scenarios: Option<bool>,
}

/// Worksheet view entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecSheetView {
    /// `"frozen"` enables `x_split`/`y_split` as frozen panes.
    pub state: Option<String>,
    /// Frozen column count.
    pub x_split: Option<u32>,
    /// Frozen row count.
    pub y_split: Option<u32>,
    /// Grid line visibility.
    pub show_grid_lines: Option<bool>,
}

impl SpecSheetView {
    /// `(rows, cols)` to freeze when the view is frozen.
    pub fn frozen_panes(&self) -> Option<(u32, u32)> {
        if self.state.as_deref() != Some("frozen") {
            return None;
        }
        let n_rows = self.y_split.unwrap_or(0);
        let n_cols = self.x_split.unwrap_or(0);
        if n_rows == 0 && n_cols == 0 {
            return None;
        }
        Some((n_rows, n_cols))
    }
}

/// Worksheet-level properties (`workSheet`).
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecWorksheetProps {
    /// Sheet name.
    pub name: String,
    /// Display properties.
    pub properties: SpecSheetProperties,
    /// Optional protection request.
    pub sheet_protection: Option<SpecSheetProtection>,
    /// Sheet views.
    pub views: Vec<SpecSheetView>,
}

/// Row layout captured from the template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecRowLayout {
    /// 1-based row number.
    pub number: u32,
    /// Row-level style.
    pub style: Option<SpecCellStyle>,
    /// Row height in points.
    pub height: Option<f64>,
}

/// Column layout captured from the template.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecColumnLayout {
    /// 1-based column number.
    pub number: u32,
    /// Authored width (character units).
    pub width: Option<f64>,
    /// Column-level style.
    pub style: Option<SpecCellStyle>,
    /// Hidden column.
    #[serde(default)]
    pub hidden: bool,
}

/// One captured layout cell.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecCellData {
    /// 1-based row number.
    pub row: u32,
    /// 1-based column number (original layout coordinates).
    pub col: u32,
    /// Captured style.
    #[serde(default)]
    pub style: SpecCellStyle,
    /// Captured value.
    #[serde(default)]
    pub value: EnumCellValue,
    /// Cell note.
    pub note: Option<String>,
}

/// Image placement request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecImage {
    /// Final-coordinate A1 range covered by the image (`"B2:D6"` or `"B2"`).
    pub range: String,
    /// `data:image/<ext>;base64,...` payload; entries without one are skipped.
    pub image_url: Option<String>,
}

/// Table style options.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecTableStyle {
    /// Named theme such as `TableStyleMedium9`.
    pub theme: Option<String>,
    pub show_first_column: Option<bool>,
    pub show_last_column: Option<bool>,
    pub show_row_stripes: Option<bool>,
    pub show_column_stripes: Option<bool>,
}

/// Table column definition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecTableColumn {
    /// Header text.
    pub name: String,
    /// Totals-row function (`sum`, `average`, `count`, ...).
    pub totals_row_function: Option<String>,
    /// Totals-row label (used when no function is set).
    pub totals_row_label: Option<String>,
}

fn derive_true() -> bool {
    true
}

/// Table definition written as-is; its presence bypasses manual styling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecTableInfo {
    /// Table name.
    pub name: String,
    /// Top-left cell of the table.
    #[serde(rename = "ref")]
    pub ref_address: String,
    /// Emit a header row.
    #[serde(default = "derive_true")]
    pub header_row: bool,
    /// Emit a totals row.
    #[serde(default)]
    pub totals_row: bool,
    /// Style options.
    #[serde(default)]
    pub style: SpecTableStyle,
    /// Column definitions.
    #[serde(default)]
    pub columns: Vec<SpecTableColumn>,
    /// Body rows.
    #[serde(default)]
    pub rows: Vec<Vec<EnumCellValue>>,
}

/// Static layout for one worksheet.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecSheetLayout {
    /// Worksheet properties.
    pub work_sheet: SpecWorksheetProps,
    /// Row styles/heights.
    pub row_layouts: Vec<SpecRowLayout>,
    /// Column widths/formats.
    pub col_layouts: Vec<SpecColumnLayout>,
    /// Captured cells.
    pub cell_datas: Vec<SpecCellData>,
    /// Images.
    pub images: Vec<SpecImage>,
    /// Tables.
    pub table_infos: Vec<SpecTableInfo>,
    /// Layout-level column validations, keyed by original column number.
    pub col_validations: BTreeMap<u32, SpecColumnValidation>,
}

impl SpecSheetLayout {
    /// Minimal layout carrying only a sheet name.
    pub fn from_name(name: &str) -> Self {
        Self {
            work_sheet: SpecWorksheetProps {
                name: name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Workbook view entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecWorkbookView {
    /// Zero-based index of the active sheet.
    pub active_tab: Option<usize>,
}

/// Workbook calculation properties.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct SpecWorkbookProperties {
    /// 1904 date system flag.
    #[serde(rename = "date1904")]
    pub date1904: bool,
}

/// Workbook metadata (`layout.workbook`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecWorkbookProps {
    pub creator: Option<String>,
    pub last_modified_by: Option<String>,
    /// ISO-8601 creation timestamp.
    pub created: Option<String>,
    /// ISO-8601 modification timestamp.
    pub modified: Option<String>,
    pub views: Vec<SpecWorkbookView>,
    pub properties: SpecWorkbookProperties,
}

/// Whole-workbook layout: sheet id → sheet layout, plus optional metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecWorkbookLayout {
    /// Reserved `workbook` entry.
    pub workbook: Option<SpecWorkbookProps>,
    /// Sheet layouts by identifier.
    pub sheets: BTreeMap<String, SpecSheetLayout>,
}

// Sheets are decoded through `serde_json::Value`; numeric keys in
// `colValidations` do not survive `#[serde(flatten)]`.
impl<'de> Deserialize<'de> for SpecWorkbookLayout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut dict_raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;
        let workbook = match dict_raw.remove(C_SHEET_ID_WORKBOOK) {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(serde_json::from_value(value).map_err(D::Error::custom)?),
        };
        let mut sheets = BTreeMap::new();
        for (sheet_id, value) in dict_raw {
            let sheet: SpecSheetLayout = serde_json::from_value(value)
                .map_err(|err| D::Error::custom(format!("sheet {sheet_id:?}: {err}")))?;
            sheets.insert(sheet_id, sheet);
        }
        Ok(Self { workbook, sheets })
    }
}

impl SpecWorkbookLayout {
    /// Parse a JSON layout payload.
    pub fn from_json_str(text: &str) -> Result<Self, ComposeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Whether neither sheets nor workbook metadata are supplied.
    pub fn is_empty(&self) -> bool {
        self.workbook.is_none() && self.sheets.is_empty()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetDataSpecification

/// Column inserted at `insertColNum + index`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecNewColumn {
    /// Row receiving the label.
    pub row_num: u32,
    /// Label value.
    pub value: EnumCellValue,
}

/// Explicit value/note override.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecCustomValue {
    /// A1 address in original layout coordinates.
    pub address: String,
    /// Value to write.
    #[serde(default)]
    pub value: EnumCellValue,
    /// Optional note.
    pub note: Option<String>,
}

/// Row-replicated formula template.
///
/// `formula` placeholders: `{ref}` (reference address at the row offset),
/// `{row}` (its row number), `{col}` (its column letters).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecCustomFormula {
    /// First formula cell, original layout coordinates.
    pub start_address: String,
    /// First reference cell, original layout coordinates.
    pub ref_address: String,
    /// Formula template.
    pub formula: String,
}

/// Column range removal, in original layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRemoveColumns {
    /// First column to remove.
    pub start_col_num: u32,
    /// Number of columns to remove.
    pub remove_col_count: u32,
}

/// Per-request overlay for one worksheet.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecSheetData {
    /// First row of the data region (template row).
    pub start_row_num: Option<u32>,
    /// Literal rows appended after the template row.
    pub new_rows: Vec<Vec<EnumCellValue>>,
    /// Value/note overrides.
    pub custom_values: Vec<SpecCustomValue>,
    /// Column before which new columns are spliced in.
    pub insert_col_num: Option<u32>,
    /// New columns.
    pub new_cols: Vec<SpecNewColumn>,
    /// Formula templates.
    pub custom_formulas: Vec<SpecCustomFormula>,
    /// Tables.
    pub table_infos: Vec<SpecTableInfo>,
    /// Column removals.
    pub remove_columns: Vec<SpecRemoveColumns>,
    /// Request-level column validations (win over layout-level ones).
    pub col_validations: BTreeMap<u32, SpecColumnValidation>,
}

/// Data overlays by sheet identifier.
pub type SpecWorkbookData = BTreeMap<String, SpecSheetData>;

/// Parse a JSON data-overlay payload.
pub fn derive_workbook_data_from_json_str(text: &str) -> Result<SpecWorkbookData, ComposeError> {
    Ok(serde_json::from_str(text)?)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ComposeOptions

/// Composition/export options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecComposeOptions {
    /// Factor applied to every layout column width.
    pub col_width_error_margin: f64,
    /// Width used when neither column nor sheet declares one.
    pub col_width_default: f64,
    /// Password for sheets requesting protection. Required when any sheet does.
    pub sheet_password: Option<String>,
    /// Leave protected sheets unprotected (dry runs that never write a file).
    pub if_skip_protection: bool,
    /// MIME type passed to the file sink.
    pub file_type: String,
    /// Extension appended to the output file name.
    pub file_extension: String,
}

impl Default for SpecComposeOptions {
    fn default() -> Self {
        Self {
            col_width_error_margin: N_COL_WIDTH_ERROR_MARGIN,
            col_width_default: N_COL_WIDTH_DEFAULT,
            sheet_password: None,
            if_skip_protection: false,
            file_type: C_XLSX_FILE_TYPE.to_string(),
            file_extension: C_XLSX_FILE_EXTENSION.to_string(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-export report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecExportReport {
    /// Composed sheet names, in workbook order.
    pub sheet_names: Vec<String>,
    /// Output file name including extension.
    pub file_name: String,
    /// Serialized workbook size.
    pub n_bytes: usize,
    /// Whether the sink accepted the buffer.
    pub if_saved: bool,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecExportReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Composition failure; aborts the whole workbook.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Malformed A1 cell address.
    #[error("Invalid cell address: {0:?}")]
    InvalidAddress(String),
    /// Malformed A1 range.
    #[error("Invalid cell range: {0:?}")]
    InvalidRange(String),
    /// Coordinate outside the worksheet grid.
    #[error("Cell out of worksheet bounds: row={row}, col={col}")]
    OutOfBounds {
        /// 1-based row.
        row: u32,
        /// 1-based column.
        col: u32,
    },
    /// Two sheets resolve to the same name.
    #[error("Duplicate worksheet name: {0:?}")]
    DuplicateSheetName(String),
    /// Protection requested without configured password.
    #[error("Sheet {0:?} requests protection but no sheet password is configured")]
    MissingSheetPassword(String),
    /// Undecodable image data URI.
    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
    /// Undecodable JSON payload.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    /// DataFrame conversion failure.
    #[error("Failed to read DataFrame: {0}")]
    DataFrame(String),
    /// Failure while composing one sheet.
    #[error("Failed to compose sheet {sheet_id:?}: {source}")]
    Sheet {
        /// Sheet identifier from the layout/data keys.
        sheet_id: String,
        /// Underlying failure.
        #[source]
        source: Box<ComposeError>,
    },
}

/// Serialization or sink failure.
#[derive(Debug, Error)]
pub enum ExportError {
    /// `rust_xlsxwriter` rejected the model.
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    /// Validation rule not expressible in the output format.
    #[error("Invalid data validation: {0}")]
    InvalidValidation(String),
    /// Coordinate overflow while converting to writer indices.
    #[error("Cell index overflow: {0}")]
    IndexOverflow(String),
    /// Image id without registered media.
    #[error("Unknown image id: {0}")]
    UnknownImage(usize),
    /// Sink IO failure.
    #[error("Failed to save file: {0}")]
    Io(#[from] std::io::Error),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
