//! XLSX writer kernel that serializes a composed [`BookModel`] with `rust_xlsxwriter`.

use std::collections::BTreeMap;

use rust_xlsxwriter::{
    DataValidation, DataValidationErrorStyle, DataValidationRule, DocProperties, ExcelDateTime,
    Format, FormatAlign, FormatBorder, FormatUnderline, Formula, Image, Note, ProtectionOptions,
    Table, TableColumn, TableFunction, TableStyle, Url, Workbook, Worksheet,
};

use crate::conf::{N_COL_WIDTH_PX_DEFAULT, N_ROW_HEIGHT_PT_DEFAULT};
use crate::model::{BookModel, SheetModel, SpecImageAnchor, SpecTablePlacement};
use crate::spec::{
    EnumCellValue, EnumUnderline, EnumValidationErrorStyle, EnumValidationOperator,
    EnumValidationTerm, EnumValidationType, ExportError, SpecBorderSide, SpecCellStyle,
    SpecDataValidation, SpecRichTextRun, SpecSheetProtection, SpecTableColumn, SpecWorkbookProps,
};
use crate::util::derive_contiguous_ranges;

/// Serializes a composed workbook into a byte buffer.
pub trait WorkbookWriter {
    fn write_buffer(&self, book: &BookModel) -> Result<Vec<u8>, ExportError>;
}

/// [`WorkbookWriter`] producing `.xlsx` bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxWorkbookWriter;

impl XlsxWorkbookWriter {
    pub fn new() -> Self {
        Self
    }
}

impl WorkbookWriter for XlsxWorkbookWriter {
    fn write_buffer(&self, book: &BookModel) -> Result<Vec<u8>, ExportError> {
        let mut workbook = Workbook::new();

        let mut n_idx_active = None;
        if let Some(props) = book.properties() {
            workbook.set_properties(&derive_doc_properties(props));
            n_idx_active = props.views.first().and_then(|view| view.active_tab);
            if props.properties.date1904 {
                log::warn!("1904 date system requested but not supported by the writer; ignoring");
            }
        }

        for (idx_sheet, sheet) in book.sheets().iter().enumerate() {
            let mut worksheet = Worksheet::new();
            write_worksheet(&mut worksheet, sheet, book)?;
            if n_idx_active == Some(idx_sheet) {
                worksheet.set_active(true);
            }
            workbook.push_worksheet(worksheet);
        }

        Ok(workbook.save_to_buffer()?)
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region WorksheetWriting

fn write_worksheet(
    worksheet: &mut Worksheet,
    sheet: &SheetModel,
    book: &BookModel,
) -> Result<(), ExportError> {
    worksheet.set_name(sheet.name())?;

    let settings = sheet.settings();
    if let Some(color) = &settings.tab_color {
        worksheet.set_tab_color(color.as_str());
    }
    if let Some(height) = settings.default_row_height {
        worksheet.set_default_row_height(height);
    }
    if let Some((n_rows, n_cols)) = settings.frozen_panes {
        worksheet.set_freeze_panes(n_rows, cast_count_col(n_rows, n_cols)?)?;
    }
    if let Some(if_show) = settings.show_grid_lines {
        worksheet.set_screen_gridlines(if_show);
    }

    for column in sheet.columns() {
        let n_col = cast_col_num(column.number)?;
        worksheet.set_column_width(n_col, column.width)?;
        if let Some(style) = &column.style {
            worksheet.set_column_format(n_col, &derive_rust_xlsx_format(style))?;
        }
        if column.hidden {
            worksheet.set_column_hidden(n_col)?;
        }
    }

    for (row_num, row) in sheet.rows() {
        let n_row = cast_row_num(*row_num)?;
        if let Some(height) = row.height {
            worksheet.set_row_height(n_row, height)?;
        }
        if let Some(style) = &row.style {
            worksheet.set_row_format(n_row, &derive_rust_xlsx_format(style))?;
        }
    }

    for ((row_num, col_num), cell) in sheet.cells() {
        let (n_row, n_col) = (cast_row_num(*row_num)?, cast_col_num(*col_num)?);
        let format = derive_rust_xlsx_format(&cell.style);
        write_cell_with_format(worksheet, n_row, n_col, &cell.value, &format)?;
        if let Some(note) = &cell.note {
            worksheet.insert_note(n_row, n_col, &Note::new(note.as_str()))?;
        }
    }

    let l_runs = derive_validation_runs(sheet);
    for (col_num, row_first, row_last, spec) in &l_runs {
        let validation = derive_data_validation(spec)?;
        let n_col = cast_col_num(*col_num)?;
        worksheet.add_data_validation(
            cast_row_num(*row_first)?,
            n_col,
            cast_row_num(*row_last)?,
            n_col,
            &validation,
        )?;
    }

    for placement in sheet.tables() {
        write_table(worksheet, placement)?;
    }

    for anchor in sheet.images() {
        write_image(worksheet, sheet, book, anchor)?;
    }

    if let Some(protection) = sheet.protection() {
        worksheet.protect_with_password(&protection.password);
        worksheet.protect_with_options(&derive_protection_options(&protection.options));
    }

    log::debug!(
        "Wrote sheet {:?}: cells={}, validation_runs={}, tables={}, images={}",
        sheet.name(),
        sheet.cells().count(),
        l_runs.len(),
        sheet.tables().len(),
        sheet.images().len()
    );
    Ok(())
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    value: &EnumCellValue,
    format: &Format,
) -> Result<(), ExportError> {
    match value {
        EnumCellValue::None => {
            worksheet.write_blank(n_row, n_col, format)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet.write_boolean_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::Number(val) => {
            worksheet.write_number_with_format(n_row, n_col, *val, format)?;
        }
        EnumCellValue::String(val) => {
            worksheet.write_string_with_format(n_row, n_col, val, format)?;
        }
        EnumCellValue::Formula { formula } => {
            worksheet.write_formula_with_format(n_row, n_col, formula.as_str(), format)?;
        }
        EnumCellValue::RichText { rich_text } => {
            write_rich_text(worksheet, n_row, n_col, rich_text, format)?;
        }
        EnumCellValue::Hyperlink { text, hyperlink } => {
            let mut url = Url::new(hyperlink.as_str());
            if !text.is_empty() {
                url = url.set_text(text.as_str());
            }
            worksheet.write_url_with_format(n_row, n_col, url, format)?;
        }
    }
    Ok(())
}

fn write_rich_text(
    worksheet: &mut Worksheet,
    n_row: u32,
    n_col: u16,
    runs: &[SpecRichTextRun],
    format: &Format,
) -> Result<(), ExportError> {
    // Empty segments are rejected by the writer.
    let l_runs: Vec<(Format, &str)> = runs
        .iter()
        .filter(|run| !run.text.is_empty())
        .map(|run| {
            let style = run
                .font
                .as_ref()
                .map(SpecCellStyle::from_font)
                .unwrap_or_default();
            (derive_rust_xlsx_format(&style), run.text.as_str())
        })
        .collect();
    if l_runs.is_empty() {
        worksheet.write_blank(n_row, n_col, format)?;
        return Ok(());
    }
    let l_segments: Vec<(&Format, &str)> = l_runs.iter().map(|(fmt, text)| (fmt, *text)).collect();
    worksheet.write_rich_string_with_format(n_row, n_col, &l_segments, format)?;
    Ok(())
}

fn derive_doc_properties(props: &SpecWorkbookProps) -> DocProperties {
    let mut properties = DocProperties::new();
    if let Some(author) = &props.creator {
        properties = properties.set_author(author.as_str());
    }
    if let Some(created) = &props.created {
        let c_datetime = created.get(..19).unwrap_or(created);
        match ExcelDateTime::parse_from_str(c_datetime) {
            Ok(datetime) => properties = properties.set_creation_datetime(&datetime),
            Err(err) => log::warn!("Ignoring workbook creation time {created:?}: {err}"),
        }
    }
    properties
}

fn derive_protection_options(spec: &SpecSheetProtection) -> ProtectionOptions {
    let mut options = ProtectionOptions::new();
    let l_flags: [(Option<bool>, &mut bool); 15] = [
        (spec.select_locked_cells, &mut options.select_locked_cells),
        (spec.select_unlocked_cells, &mut options.select_unlocked_cells),
        (spec.format_cells, &mut options.format_cells),
        (spec.format_columns, &mut options.format_columns),
        (spec.format_rows, &mut options.format_rows),
        (spec.insert_columns, &mut options.insert_columns),
        (spec.insert_rows, &mut options.insert_rows),
        (spec.insert_hyperlinks, &mut options.insert_links),
        (spec.delete_columns, &mut options.delete_columns),
        (spec.delete_rows, &mut options.delete_rows),
        (spec.sort, &mut options.sort),
        (spec.auto_filter, &mut options.use_autofilter),
        (spec.pivot_tables, &mut options.use_pivot_tables),
        (spec.objects, &mut options.edit_objects),
        (spec.scenarios, &mut options.edit_scenarios),
    ];
    for (flag, target) in l_flags {
        if let Some(val) = flag {
            *target = val;
        }
    }
    options
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region DataValidation

/// Coalesce per-cell validations into `(col, first_row, last_row, rule)` runs
/// of identical rules over contiguous rows.
fn derive_validation_runs(sheet: &SheetModel) -> Vec<(u32, u32, u32, &SpecDataValidation)> {
    let mut dict_rows_by_col: BTreeMap<u32, Vec<(&SpecDataValidation, Vec<u32>)>> =
        BTreeMap::new();
    for ((row_num, col_num), cell) in sheet.cells() {
        let Some(spec) = &cell.validation else {
            continue;
        };
        let l_groups = dict_rows_by_col.entry(*col_num).or_default();
        match l_groups.iter_mut().find(|(existing, _)| *existing == spec) {
            Some((_, l_rows)) => l_rows.push(*row_num),
            None => l_groups.push((spec, vec![*row_num])),
        }
    }

    let mut l_runs = Vec::new();
    for (col_num, l_groups) in dict_rows_by_col {
        for (spec, l_rows) in l_groups {
            for (row_first, row_last) in derive_contiguous_ranges(&l_rows) {
                l_runs.push((col_num, row_first, row_last, spec));
            }
        }
    }
    l_runs
}

macro_rules! derive_validation_rule {
    ($operator:expr, $first:expr, $second:expr) => {
        match $operator {
            EnumValidationOperator::Between => DataValidationRule::Between($first, $second?),
            EnumValidationOperator::NotBetween => DataValidationRule::NotBetween($first, $second?),
            EnumValidationOperator::Equal => DataValidationRule::EqualTo($first),
            EnumValidationOperator::NotEqual => DataValidationRule::NotEqualTo($first),
            EnumValidationOperator::GreaterThan => DataValidationRule::GreaterThan($first),
            EnumValidationOperator::LessThan => DataValidationRule::LessThan($first),
            EnumValidationOperator::GreaterThanOrEqual => {
                DataValidationRule::GreaterThanOrEqualTo($first)
            }
            EnumValidationOperator::LessThanOrEqual => {
                DataValidationRule::LessThanOrEqualTo($first)
            }
        }
    };
}

fn derive_data_validation(spec: &SpecDataValidation) -> Result<DataValidation, ExportError> {
    let mut validation = DataValidation::new();

    match spec.rule_type {
        EnumValidationType::Any => {}
        EnumValidationType::List => {
            let c_source = derive_validation_term(spec, 0)?.to_text();
            let c_source = c_source.trim();
            if c_source.len() >= 2 && c_source.starts_with('"') && c_source.ends_with('"') {
                let l_items: Vec<&str> = c_source[1..c_source.len() - 1]
                    .split(',')
                    .map(str::trim)
                    .collect();
                validation = validation.allow_list_strings(&l_items)?;
            } else {
                validation = validation.allow_list_formula(Formula::new(c_source));
            }
        }
        EnumValidationType::Whole => {
            let n_first = derive_validation_i32(derive_validation_term(spec, 0)?)?;
            let n_second = derive_validation_term(spec, 1).and_then(derive_validation_i32);
            validation = validation.allow_whole_number(derive_validation_rule!(
                spec.operator,
                n_first,
                n_second
            ));
        }
        EnumValidationType::Decimal => {
            let n_first = derive_validation_f64(derive_validation_term(spec, 0)?)?;
            let n_second = derive_validation_term(spec, 1).and_then(derive_validation_f64);
            validation = validation.allow_decimal_number(derive_validation_rule!(
                spec.operator,
                n_first,
                n_second
            ));
        }
        EnumValidationType::TextLength => {
            let n_first = derive_validation_u32(derive_validation_term(spec, 0)?)?;
            let n_second = derive_validation_term(spec, 1).and_then(derive_validation_u32);
            validation = validation.allow_text_length(derive_validation_rule!(
                spec.operator,
                n_first,
                n_second
            ));
        }
        EnumValidationType::Custom => {
            let c_formula = derive_validation_term(spec, 0)?.to_text();
            validation = validation.allow_custom(Formula::new(c_formula.trim()));
        }
    }

    if let Some(if_allow_blank) = spec.allow_blank {
        validation = validation.ignore_blank(if_allow_blank);
    }
    if let Some(if_show) = spec.show_input_message {
        validation = validation.show_input_message(if_show);
    }
    if let Some(title) = &spec.prompt_title {
        validation = validation.set_input_title(title.as_str())?;
    }
    if let Some(message) = &spec.prompt {
        validation = validation.set_input_message(message.as_str())?;
    }
    if let Some(if_show) = spec.show_error_message {
        validation = validation.show_error_message(if_show);
    }
    if let Some(style) = spec.error_style {
        validation = validation.set_error_style(match style {
            EnumValidationErrorStyle::Stop => DataValidationErrorStyle::Stop,
            EnumValidationErrorStyle::Warning => DataValidationErrorStyle::Warning,
            EnumValidationErrorStyle::Information => DataValidationErrorStyle::Information,
        });
    }
    if let Some(title) = &spec.error_title {
        validation = validation.set_error_title(title.as_str())?;
    }
    if let Some(message) = &spec.error {
        validation = validation.set_error_message(message.as_str())?;
    }

    Ok(validation)
}

fn derive_validation_term(
    spec: &SpecDataValidation,
    idx: usize,
) -> Result<&EnumValidationTerm, ExportError> {
    spec.formulae.get(idx).ok_or_else(|| {
        ExportError::InvalidValidation(format!(
            "{:?} validation needs operand #{}",
            spec.rule_type,
            idx + 1
        ))
    })
}

fn derive_validation_f64(term: &EnumValidationTerm) -> Result<f64, ExportError> {
    match term {
        EnumValidationTerm::Number(val) => Ok(*val),
        EnumValidationTerm::Text(val) => val
            .trim()
            .trim_start_matches('=')
            .parse::<f64>()
            .map_err(|_| ExportError::InvalidValidation(format!("not a number: {val:?}"))),
    }
}

fn derive_validation_i32(term: &EnumValidationTerm) -> Result<i32, ExportError> {
    let val = derive_validation_f64(term)?;
    if val.fract() != 0.0 || val < i32::MIN as f64 || val > i32::MAX as f64 {
        return Err(ExportError::InvalidValidation(format!("not a whole number: {val}")));
    }
    Ok(val as i32)
}

fn derive_validation_u32(term: &EnumValidationTerm) -> Result<u32, ExportError> {
    let val = derive_validation_f64(term)?;
    if val.fract() != 0.0 || val < 0.0 || val > u32::MAX as f64 {
        return Err(ExportError::InvalidValidation(format!("not a text length: {val}")));
    }
    Ok(val as u32)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TablesAndImages

fn write_table(worksheet: &mut Worksheet, placement: &SpecTablePlacement) -> Result<(), ExportError> {
    let info = &placement.info;
    let n_cols = info
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(info.columns.len()))
        .max()
        .unwrap_or(0)
        .max(1);
    let n_rows_header = u32::from(info.header_row);
    let n_rows_body = info.rows.len().max(1) as u32;
    let n_rows_total = u32::from(info.totals_row);

    let n_row_first = cast_row_num(placement.first_row)?;
    let n_col_first = cast_col_num(placement.first_col)?;
    let n_row_last = n_row_first + n_rows_header + n_rows_body + n_rows_total - 1;
    let n_col_last = u16::try_from(n_cols - 1)
        .ok()
        .and_then(|n_offset| n_col_first.checked_add(n_offset))
        .ok_or_else(|| ExportError::IndexOverflow(format!("table {:?} is too wide", info.name)))?;

    let l_columns: Vec<TableColumn> = (0..n_cols)
        .map(|idx| derive_table_column(info.columns.get(idx), idx))
        .collect();

    let mut table = Table::new()
        .set_header_row(info.header_row)
        .set_total_row(info.totals_row)
        .set_columns(&l_columns);
    if !info.name.trim().is_empty() {
        table = table.set_name(info.name.as_str());
    }
    if let Some(theme) = &info.style.theme {
        match derive_table_style(theme) {
            Some(style) => table = table.set_style(style),
            None => log::warn!("Unknown table theme {theme:?}; using default"),
        }
    }
    if let Some(val) = info.style.show_row_stripes {
        table = table.set_banded_rows(val);
    }
    if let Some(val) = info.style.show_column_stripes {
        table = table.set_banded_columns(val);
    }
    if let Some(val) = info.style.show_first_column {
        table = table.set_first_column(val);
    }
    if let Some(val) = info.style.show_last_column {
        table = table.set_last_column(val);
    }

    worksheet.add_table(n_row_first, n_col_first, n_row_last, n_col_last, &table)?;

    let format = Format::new();
    let n_row_body_first = n_row_first + n_rows_header;
    for (idx_row, row) in info.rows.iter().enumerate() {
        for (idx_col, value) in row.iter().enumerate() {
            if value.is_none() {
                continue;
            }
            write_cell_with_format(
                worksheet,
                n_row_body_first + idx_row as u32,
                n_col_first + idx_col as u16,
                value,
                &format,
            )?;
        }
    }
    Ok(())
}

fn derive_table_column(spec: Option<&SpecTableColumn>, idx: usize) -> TableColumn {
    let Some(spec) = spec else {
        return TableColumn::new().set_header(format!("Column{}", idx + 1));
    };
    let mut column = TableColumn::new().set_header(spec.name.as_str());
    if let Some(function) = spec.totals_row_function.as_deref().and_then(derive_table_function) {
        column = column.set_total_function(function);
    } else if let Some(label) = &spec.totals_row_label {
        column = column.set_total_label(label.as_str());
    }
    column
}

fn derive_table_function(name: &str) -> Option<TableFunction> {
    match name.trim() {
        "sum" => Some(TableFunction::Sum),
        "average" => Some(TableFunction::Average),
        "count" => Some(TableFunction::Count),
        "countNums" => Some(TableFunction::CountNumbers),
        "max" => Some(TableFunction::Max),
        "min" => Some(TableFunction::Min),
        "stdDev" => Some(TableFunction::StdDev),
        "var" => Some(TableFunction::Var),
        _ => None,
    }
}

fn derive_table_style(theme: &str) -> Option<TableStyle> {
    let c_token = theme.trim();
    match c_token.strip_prefix("TableStyle").unwrap_or(c_token) {
        "None" => Some(TableStyle::None),
        "Light1" => Some(TableStyle::Light1),
        "Light2" => Some(TableStyle::Light2),
        "Light3" => Some(TableStyle::Light3),
        "Light4" => Some(TableStyle::Light4),
        "Light5" => Some(TableStyle::Light5),
        "Light6" => Some(TableStyle::Light6),
        "Light7" => Some(TableStyle::Light7),
        "Light8" => Some(TableStyle::Light8),
        "Light9" => Some(TableStyle::Light9),
        "Light10" => Some(TableStyle::Light10),
        "Light11" => Some(TableStyle::Light11),
        "Light12" => Some(TableStyle::Light12),
        "Light13" => Some(TableStyle::Light13),
        "Light14" => Some(TableStyle::Light14),
        "Light15" => Some(TableStyle::Light15),
        "Light16" => Some(TableStyle::Light16),
        "Light17" => Some(TableStyle::Light17),
        "Light18" => Some(TableStyle::Light18),
        "Light19" => Some(TableStyle::Light19),
        "Light20" => Some(TableStyle::Light20),
        "Light21" => Some(TableStyle::Light21),
        "Medium1" => Some(TableStyle::Medium1),
        "Medium2" => Some(TableStyle::Medium2),
        "Medium3" => Some(TableStyle::Medium3),
        "Medium4" => Some(TableStyle::Medium4),
        "Medium5" => Some(TableStyle::Medium5),
        "Medium6" => Some(TableStyle::Medium6),
        "Medium7" => Some(TableStyle::Medium7),
        "Medium8" => Some(TableStyle::Medium8),
        "Medium9" => Some(TableStyle::Medium9),
        "Medium10" => Some(TableStyle::Medium10),
        "Medium11" => Some(TableStyle::Medium11),
        "Medium12" => Some(TableStyle::Medium12),
        "Medium13" => Some(TableStyle::Medium13),
        "Medium14" => Some(TableStyle::Medium14),
        "Medium15" => Some(TableStyle::Medium15),
        "Medium16" => Some(TableStyle::Medium16),
        "Medium17" => Some(TableStyle::Medium17),
        "Medium18" => Some(TableStyle::Medium18),
        "Medium19" => Some(TableStyle::Medium19),
        "Medium20" => Some(TableStyle::Medium20),
        "Medium21" => Some(TableStyle::Medium21),
        "Medium22" => Some(TableStyle::Medium22),
        "Medium23" => Some(TableStyle::Medium23),
        "Medium24" => Some(TableStyle::Medium24),
        "Medium25" => Some(TableStyle::Medium25),
        "Medium26" => Some(TableStyle::Medium26),
        "Medium27" => Some(TableStyle::Medium27),
        "Medium28" => Some(TableStyle::Medium28),
        "Dark1" => Some(TableStyle::Dark1),
        "Dark2" => Some(TableStyle::Dark2),
        "Dark3" => Some(TableStyle::Dark3),
        "Dark4" => Some(TableStyle::Dark4),
        "Dark5" => Some(TableStyle::Dark5),
        "Dark6" => Some(TableStyle::Dark6),
        "Dark7" => Some(TableStyle::Dark7),
        "Dark8" => Some(TableStyle::Dark8),
        "Dark9" => Some(TableStyle::Dark9),
        "Dark10" => Some(TableStyle::Dark10),
        "Dark11" => Some(TableStyle::Dark11),
        _ => None,
    }
}

fn write_image(
    worksheet: &mut Worksheet,
    sheet: &SheetModel,
    book: &BookModel,
    anchor: &SpecImageAnchor,
) -> Result<(), ExportError> {
    let media = book
        .image(anchor.image_id)
        .ok_or(ExportError::UnknownImage(anchor.image_id))?;
    let (n_width_px, n_height_px) = derive_anchor_size_px(sheet, anchor);
    let image = Image::new_from_buffer(&media.bytes)?.set_scale_to_size(n_width_px, n_height_px, false);
    worksheet.insert_image(
        cast_row_num(anchor.first_row)?,
        cast_col_num(anchor.first_col)?,
        &image,
    )?;
    Ok(())
}

/// Pixel size covered by an image anchor, from column widths and row heights.
fn derive_anchor_size_px(sheet: &SheetModel, anchor: &SpecImageAnchor) -> (f64, f64) {
    let n_width_px: f64 = (anchor.first_col..=anchor.last_col)
        .map(|col_num| {
            sheet
                .columns()
                .iter()
                .find(|column| column.number == col_num)
                .map(|column| (column.width * 7.0 + 5.0).trunc())
                .unwrap_or(N_COL_WIDTH_PX_DEFAULT)
        })
        .sum();

    let n_height_default = sheet
        .settings()
        .default_row_height
        .unwrap_or(N_ROW_HEIGHT_PT_DEFAULT);
    let dict_heights: BTreeMap<u32, f64> = sheet
        .rows()
        .filter_map(|(row_num, row)| row.height.map(|height| (*row_num, height)))
        .collect();
    let n_height_px: f64 = (anchor.first_row..=anchor.last_row)
        .map(|row_num| dict_heights.get(&row_num).copied().unwrap_or(n_height_default) * 4.0 / 3.0)
        .sum();

    (n_width_px, n_height_px)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatMapping

fn derive_rust_xlsx_format(spec: &SpecCellStyle) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if let Some(val) = spec.underline {
        format = format.set_underline(derive_format_underline(val));
    }
    if spec.strikethrough.unwrap_or(false) {
        format = format.set_font_strikethrough();
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_valign(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }

    if let Some(side) = &spec.top {
        format = format.set_border_top(derive_format_border(side));
        if let Some(color) = &side.color {
            format = format.set_border_top_color(color.as_str());
        }
    }
    if let Some(side) = &spec.bottom {
        format = format.set_border_bottom(derive_format_border(side));
        if let Some(color) = &side.color {
            format = format.set_border_bottom_color(color.as_str());
        }
    }
    if let Some(side) = &spec.left {
        format = format.set_border_left(derive_format_border(side));
        if let Some(color) = &side.color {
            format = format.set_border_left_color(color.as_str());
        }
    }
    if let Some(side) = &spec.right {
        format = format.set_border_right(derive_format_border(side));
        if let Some(color) = &side.color {
            format = format.set_border_right_color(color.as_str());
        }
    }

    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }
    if spec.locked == Some(false) {
        format = format.set_unlocked();
    }
    if spec.hidden.unwrap_or(false) {
        format = format.set_hidden();
    }

    format
}

fn derive_format_underline(underline: EnumUnderline) -> FormatUnderline {
    match underline {
        EnumUnderline::Single => FormatUnderline::Single,
        EnumUnderline::Double => FormatUnderline::Double,
        EnumUnderline::SingleAccounting => FormatUnderline::SingleAccounting,
        EnumUnderline::DoubleAccounting => FormatUnderline::DoubleAccounting,
    }
}

fn derive_format_border(side: &SpecBorderSide) -> FormatBorder {
    match side.style.as_str() {
        "thin" => FormatBorder::Thin,
        "medium" => FormatBorder::Medium,
        "dashed" => FormatBorder::Dashed,
        "dotted" => FormatBorder::Dotted,
        "thick" => FormatBorder::Thick,
        "double" => FormatBorder::Double,
        "hair" => FormatBorder::Hair,
        "mediumDashed" => FormatBorder::MediumDashed,
        "dashDot" => FormatBorder::DashDot,
        "mediumDashDot" => FormatBorder::MediumDashDot,
        "dashDotDot" => FormatBorder::DashDotDot,
        "mediumDashDotDot" => FormatBorder::MediumDashDotDot,
        "slantDashDot" => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

/// Horizontal alignment from ExcelJS `alignment.horizontal`.
fn derive_format_align(align: &str) -> Option<FormatAlign> {
    match align.trim() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "centerContinuous" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        _ => None,
    }
}

/// Vertical alignment from ExcelJS `alignment.vertical`.
fn derive_format_valign(valign: &str) -> Option<FormatAlign> {
    match valign.trim() {
        "top" => Some(FormatAlign::Top),
        "middle" | "center" => Some(FormatAlign::VerticalCenter),
        "bottom" => Some(FormatAlign::Bottom),
        "justify" => Some(FormatAlign::VerticalJustify),
        "distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

/// 1-based model row → 0-based writer row.
fn cast_row_num(value: u32) -> Result<u32, ExportError> {
    value
        .checked_sub(1)
        .ok_or_else(|| ExportError::IndexOverflow(format!("row number {value}")))
}

/// 1-based model column → 0-based writer column.
fn cast_col_num(value: u32) -> Result<u16, ExportError> {
    value
        .checked_sub(1)
        .and_then(|val| u16::try_from(val).ok())
        .ok_or_else(|| ExportError::IndexOverflow(format!("column number {value}")))
}

fn cast_count_col(n_rows: u32, n_cols: u32) -> Result<u16, ExportError> {
    u16::try_from(n_cols)
        .map_err(|_| ExportError::IndexOverflow(format!("frozen panes ({n_rows}, {n_cols})")))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SpecColumnState, SpecSheetSettings};

    fn derive_named_sheet(name: &str) -> SheetModel {
        SheetModel::new(SpecSheetSettings {
            name: name.to_string(),
            ..Default::default()
        })
    }

    fn derive_list(items: &str) -> SpecDataValidation {
        SpecDataValidation {
            rule_type: EnumValidationType::List,
            formulae: vec![EnumValidationTerm::Text(format!("\"{items}\""))],
            ..Default::default()
        }
    }

    #[test]
    fn test_cast_num_converts_to_zero_based() {
        assert_eq!(cast_row_num(1).unwrap(), 0);
        assert_eq!(cast_col_num(16_384).unwrap(), 16_383);
        assert!(cast_row_num(0).is_err());
        assert!(cast_col_num(70_000).is_err());
    }

    #[test]
    fn test_validation_runs_split_on_gaps_and_rule_changes() {
        let mut sheet = derive_named_sheet("S");
        for row in [2, 3, 4, 6] {
            sheet.set_validation(row, 1, derive_list("a,b")).unwrap();
        }
        sheet.set_validation(5, 1, derive_list("c")).unwrap();
        sheet.set_validation(2, 3, derive_list("a,b")).unwrap();

        let l_runs: Vec<(u32, u32, u32, String)> = derive_validation_runs(&sheet)
            .into_iter()
            .map(|(col, r1, r2, spec)| (col, r1, r2, spec.formulae[0].to_text()))
            .collect();

        assert_eq!(
            l_runs,
            vec![
                (1, 2, 4, "\"a,b\"".to_string()),
                (1, 6, 6, "\"a,b\"".to_string()),
                (1, 5, 5, "\"c\"".to_string()),
                (3, 2, 2, "\"a,b\"".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_validation_requires_operands() {
        let spec = SpecDataValidation {
            rule_type: EnumValidationType::Whole,
            operator: EnumValidationOperator::Between,
            formulae: vec![EnumValidationTerm::Number(1.0)],
            ..Default::default()
        };
        assert!(matches!(
            derive_data_validation(&spec),
            Err(ExportError::InvalidValidation(_))
        ));

        let spec_ok = SpecDataValidation {
            formulae: vec![EnumValidationTerm::Number(1.0), EnumValidationTerm::Text("10".into())],
            ..spec
        };
        assert!(derive_data_validation(&spec_ok).is_ok());

        let spec_fraction = SpecDataValidation {
            rule_type: EnumValidationType::Whole,
            operator: EnumValidationOperator::GreaterThan,
            formulae: vec![EnumValidationTerm::Number(1.5)],
            ..Default::default()
        };
        assert!(derive_data_validation(&spec_fraction).is_err());
    }

    #[test]
    fn test_table_style_and_function_names() {
        assert!(matches!(derive_table_style("TableStyleMedium9"), Some(TableStyle::Medium9)));
        assert!(matches!(derive_table_style("Light21"), Some(TableStyle::Light21)));
        assert!(derive_table_style("TableStyleMedium99").is_none());
        assert!(matches!(derive_table_function("countNums"), Some(TableFunction::CountNumbers)));
        assert!(derive_table_function("custom").is_none());
    }

    #[test]
    fn test_anchor_size_uses_column_widths_and_row_heights() {
        let mut sheet = derive_named_sheet("S");
        sheet.set_columns(vec![SpecColumnState {
            number: 2,
            width: 10.0,
            style: None,
            hidden: false,
        }]);
        sheet.row_mut(3).unwrap().height = Some(30.0);
        let anchor = SpecImageAnchor {
            image_id: 0,
            first_row: 2,
            first_col: 2,
            last_row: 3,
            last_col: 3,
        };

        let (n_width, n_height) = derive_anchor_size_px(&sheet, &anchor);

        assert_eq!(n_width, 75.0 + N_COL_WIDTH_PX_DEFAULT);
        assert_eq!(n_height, 20.0 + 40.0);
    }

    #[test]
    fn test_write_buffer_produces_zip_container() {
        let mut sheet = derive_named_sheet("Data");
        sheet.set_value(1, 1, EnumCellValue::from("name")).unwrap();
        sheet.set_value(2, 1, EnumCellValue::Number(3.5)).unwrap();
        sheet.set_value(2, 2, EnumCellValue::formula("=A2*2")).unwrap();
        sheet.set_note(1, 1, "header").unwrap();
        sheet.set_validation(2, 1, derive_list("1,2")).unwrap();
        let mut book = BookModel::new();
        book.push_worksheet(sheet).unwrap();

        let v_bytes = XlsxWorkbookWriter::new().write_buffer(&book).unwrap();

        assert_eq!(&v_bytes[..2], b"PK");
    }

    #[test]
    fn test_vertical_alignment_never_maps_to_horizontal() {
        assert!(matches!(derive_format_valign("center"), Some(FormatAlign::VerticalCenter)));
        assert!(matches!(derive_format_valign("justify"), Some(FormatAlign::VerticalJustify)));
        assert!(matches!(
            derive_format_valign("distributed"),
            Some(FormatAlign::VerticalDistributed)
        ));
        assert!(derive_format_valign("left").is_none());
        assert!(matches!(derive_format_align("justify"), Some(FormatAlign::Justify)));
        assert!(derive_format_align("middle").is_none());
    }

    #[test]
    fn test_rich_text_and_hyperlink_cells_are_written() {
        let l_values: Vec<EnumCellValue> = serde_json::from_str(
            r#"[
                {"richText": [{"text": "Total "}, {"text": ""}, {"text": "due", "font": {"bold": true}}]},
                {"richText": [{"text": ""}]},
                {"text": "Docs", "hyperlink": "https://example.com/docs"}
            ]"#,
        )
        .unwrap();
        let mut sheet = derive_named_sheet("Links");
        for (idx, value) in l_values.into_iter().enumerate() {
            sheet.set_value(1, idx as u32 + 1, value).unwrap();
        }
        let mut book = BookModel::new();
        book.push_worksheet(sheet).unwrap();

        let v_bytes = XlsxWorkbookWriter::new().write_buffer(&book).unwrap();

        assert_eq!(&v_bytes[..2], b"PK");
    }

    #[test]
    fn test_unknown_image_id_is_an_error() {
        let mut sheet = derive_named_sheet("Pictures");
        sheet.add_image(SpecImageAnchor {
            image_id: 7,
            first_row: 1,
            first_col: 1,
            last_row: 1,
            last_col: 1,
        });
        let mut book = BookModel::new();
        book.push_worksheet(sheet).unwrap();

        let err = XlsxWorkbookWriter::new().write_buffer(&book).unwrap_err();
        assert!(matches!(err, ExportError::UnknownImage(7)));
    }
}
