//! Sheet composer: merges one sheet layout with its data overlay.
//!
//! The pipeline runs in a fixed order (properties, tables or manual styling,
//! images, protection). Every layout-originated column goes through
//! [`SpecSheetPlan::remap`] exactly once.

use std::collections::BTreeMap;

use crate::conf::N_NCOLS_EXCEL_MAX;
use crate::model::{
    BookModel, SheetModel, SpecColumnState, SpecImageAnchor, SpecImageMedia, SpecSheetSettings,
    SpecTablePlacement,
};
use crate::spec::{
    ComposeError, EnumCellValue, SpecCellData, SpecCellStyle, SpecComposeOptions,
    SpecCustomFormula, SpecCustomValue, SpecDataValidation, SpecSheetData, SpecSheetLayout,
    SpecTableInfo,
};
use crate::util::{
    derive_hex_color_from_argb, merge_column_ranges, parse_cell_address, parse_cell_range,
    parse_image_data_uri, remap_column_number, render_formula_template, sanitize_sheet_name,
    shift_column_for_removals, validate_cell_bounds,
};

////////////////////////////////////////////////////////////////////////////////
// #region SheetPlan

/// Coordinate partition of one sheet request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecSheetPlan {
    /// Template row; `None` means every row belongs to the layout region.
    pub start_row_num: Option<u32>,
    /// Number of appended rows (`N`).
    pub n_new_rows: u32,
    /// Column before which new columns are inserted.
    pub insert_col_num: Option<u32>,
    /// Number of inserted columns (0 without `insert_col_num`).
    pub n_cols_inserted: u32,
}

impl SpecSheetPlan {
    pub fn from_request(data: &SpecSheetData) -> Self {
        let n_cols_inserted = match data.insert_col_num {
            Some(_) => data.new_cols.len() as u32,
            None => 0,
        };
        Self {
            start_row_num: data.start_row_num,
            n_new_rows: data.new_rows.len() as u32,
            insert_col_num: data.insert_col_num,
            n_cols_inserted,
        }
    }

    /// Original column → final column.
    pub fn remap(&self, col_num: u32) -> u32 {
        match self.insert_col_num {
            Some(n_insert) => remap_column_number(col_num, n_insert, self.n_cols_inserted),
            None => col_num,
        }
    }

    pub fn if_add_rows(&self) -> bool {
        self.n_new_rows > 0
    }

    /// Rows populated directly from the layout.
    pub fn is_layout_row(&self, row: u32) -> bool {
        !self.if_add_rows() || self.start_row_num.is_none_or(|n_start| row < n_start)
    }

    /// Rows eligible for column validations; none unless rows are appended.
    pub fn is_data_row(&self, row: u32) -> bool {
        self.if_add_rows() && self.start_row_num.is_some_and(|n_start| row >= n_start)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Resolver

/// Effective validation for an original column: request-level entry wins over
/// the layout-level one.
pub fn resolve_column_validation<'a>(
    layout: &'a SpecSheetLayout,
    data: &'a SpecSheetData,
    col_num: u32,
) -> Option<&'a SpecDataValidation> {
    data.col_validations
        .get(&col_num)
        .or_else(|| layout.col_validations.get(&col_num))
        .map(|entry| &entry.data_validation)
}

/// Effective `(style, validation)` for a captured cell at original coordinates.
pub fn resolve_cell_format<'a>(
    layout: &'a SpecSheetLayout,
    data: &'a SpecSheetData,
    plan: &SpecSheetPlan,
    cell: &'a SpecCellData,
) -> (&'a SpecCellStyle, Option<&'a SpecDataValidation>) {
    let validation = if plan.is_data_row(cell.row) {
        resolve_column_validation(layout, data, cell.col)
    } else {
        None
    };
    (&cell.style, validation)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetComposer

/// Compose one worksheet. Image media is registered into `book`; the sheet
/// itself is returned and only pushed by the caller once complete.
pub fn compose_sheet(
    book: &mut BookModel,
    sheet_id: &str,
    layout: &SpecSheetLayout,
    data: &SpecSheetData,
    options: &SpecComposeOptions,
) -> Result<SheetModel, ComposeError> {
    let mut sheet = SheetModel::new(derive_sheet_settings(sheet_id, layout));

    let l_tables: Vec<&SpecTableInfo> = layout
        .table_infos
        .iter()
        .chain(data.table_infos.iter())
        .collect();

    let mut l_removed_ranges: Vec<(u32, u32)> = Vec::new();
    if !l_tables.is_empty() {
        if has_manual_effects(layout, data) {
            log::warn!(
                "Sheet {sheet_id:?}: {} table(s) present, manual styling/values are skipped",
                l_tables.len()
            );
        }
        apply_tables(&mut sheet, &l_tables)?;
    } else {
        let plan = SpecSheetPlan::from_request(data);
        log::debug!(
            "Sheet {sheet_id:?}: start_row_num={:?}, new_rows={}, insert_col_num={:?}, new_cols={}",
            plan.start_row_num,
            plan.n_new_rows,
            plan.insert_col_num,
            plan.n_cols_inserted
        );
        if data.insert_col_num.is_none() && !data.new_cols.is_empty() {
            log::warn!(
                "Sheet {sheet_id:?}: {} new column(s) ignored without insertColNum",
                data.new_cols.len()
            );
        }
        if plan.if_add_rows() && plan.start_row_num.is_none() {
            log::warn!("Sheet {sheet_id:?}: newRows without startRowNum are appended unstyled");
        }

        apply_row_layouts(&mut sheet, layout, &plan)?;
        let l_default_cells = apply_default_cells(&mut sheet, layout, data, &plan)?;
        apply_column_insertion(&mut sheet, data, &plan, &l_default_cells)?;
        sheet.set_columns(derive_final_columns(layout, &plan, options));
        apply_new_rows(&mut sheet, layout, data, &plan)?;
        apply_custom_values(&mut sheet, &plan, &data.custom_values)?;
        apply_custom_formulas(&mut sheet, &plan, &data.custom_formulas)?;
        l_removed_ranges = apply_column_removals(&mut sheet, data, &plan)?;
    }

    apply_images(book, &mut sheet, layout, &l_removed_ranges)?;
    apply_protection(&mut sheet, layout, options)?;

    Ok(sheet)
}

fn derive_sheet_settings(sheet_id: &str, layout: &SpecSheetLayout) -> SpecSheetSettings {
    let props = &layout.work_sheet;
    let c_name_raw = if props.name.trim().is_empty() {
        sheet_id
    } else {
        props.name.as_str()
    };
    let c_name = sanitize_sheet_name(c_name_raw, "_");
    if c_name != c_name_raw {
        log::warn!("Sheet name {c_name_raw:?} sanitized to {c_name:?}");
    }

    let tab_color = props.properties.tab_color.as_ref().and_then(|color| {
        let c_hex = derive_hex_color_from_argb(&color.argb);
        if c_hex.is_none() {
            log::warn!("Sheet {c_name:?}: ignoring invalid tab color {:?}", color.argb);
        }
        c_hex
    });
    let view = props.views.first();

    SpecSheetSettings {
        name: c_name,
        tab_color,
        default_row_height: props.properties.default_row_height,
        frozen_panes: view.and_then(|v| v.frozen_panes()),
        show_grid_lines: view.and_then(|v| v.show_grid_lines),
    }
}

fn has_manual_effects(layout: &SpecSheetLayout, data: &SpecSheetData) -> bool {
    !layout.cell_datas.is_empty()
        || !layout.row_layouts.is_empty()
        || !data.new_rows.is_empty()
        || !data.new_cols.is_empty()
        || !data.custom_values.is_empty()
        || !data.custom_formulas.is_empty()
        || !data.remove_columns.is_empty()
}

fn apply_tables(sheet: &mut SheetModel, tables: &[&SpecTableInfo]) -> Result<(), ComposeError> {
    for info in tables {
        let (first_row, first_col) = parse_cell_address(&info.ref_address)?;
        sheet.add_table(SpecTablePlacement {
            first_row,
            first_col,
            info: (*info).clone(),
        });
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region LayoutRegion

fn apply_row_layouts(
    sheet: &mut SheetModel,
    layout: &SpecSheetLayout,
    plan: &SpecSheetPlan,
) -> Result<(), ComposeError> {
    for row_layout in &layout.row_layouts {
        if !plan.is_layout_row(row_layout.number) {
            continue;
        }
        let row = sheet.row_mut(row_layout.number)?;
        row.style = row_layout.style.clone();
        row.height = row_layout.height;
    }
    Ok(())
}

/// Populate layout cells; returns the populated subset keyed by original
/// `(row, col)` for anchor lookups.
fn apply_default_cells<'a>(
    sheet: &mut SheetModel,
    layout: &'a SpecSheetLayout,
    data: &SpecSheetData,
    plan: &SpecSheetPlan,
) -> Result<BTreeMap<(u32, u32), &'a SpecCellData>, ComposeError> {
    let mut dict_default_cells = BTreeMap::new();
    for cell_data in &layout.cell_datas {
        if !plan.is_layout_row(cell_data.row) {
            continue;
        }
        let n_col = plan.remap(cell_data.col);
        let (style, validation) = resolve_cell_format(layout, data, plan, cell_data);

        let cell = sheet.cell_mut(cell_data.row, n_col)?;
        cell.value = cell_data.value.clone();
        cell.style = style.clone();
        if let Some(note) = &cell_data.note {
            cell.note = Some(note.clone());
        }
        if let Some(validation) = validation {
            cell.validation = Some(validation.clone());
        }
        dict_default_cells.insert((cell_data.row, cell_data.col), cell_data);
    }
    log::debug!("Populated {} layout cell(s)", dict_default_cells.len());
    Ok(dict_default_cells)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnInsertion

fn apply_column_insertion(
    sheet: &mut SheetModel,
    data: &SpecSheetData,
    plan: &SpecSheetPlan,
    default_cells: &BTreeMap<(u32, u32), &SpecCellData>,
) -> Result<(), ComposeError> {
    let Some(n_insert) = plan.insert_col_num else {
        return Ok(());
    };
    if data.new_cols.is_empty() {
        return Ok(());
    }

    let l_rows = sheet.row_numbers();
    for entry in &data.new_cols {
        if !l_rows.contains(&entry.row_num) {
            log::warn!(
                "New column label {:?} targets row {} which has no layout content; ignored",
                entry.value,
                entry.row_num
            );
        }
    }

    for (idx, entry) in data.new_cols.iter().enumerate() {
        let n_col = n_insert.saturating_add(idx as u32);
        for &row in &l_rows {
            let anchor_style = default_cells
                .get(&(row, n_insert))
                .map(|cell_data| cell_data.style.clone())
                .unwrap_or_default();
            let cell = sheet.cell_mut(row, n_col)?;
            cell.style = anchor_style;
            if entry.row_num == row {
                cell.value = entry.value.clone();
            }
        }
    }
    log::debug!(
        "Inserted {} column(s) at {n_insert} across {} row(s)",
        data.new_cols.len(),
        l_rows.len()
    );
    Ok(())
}

/// Final column list: widths corrected by the margin, columns at/after the
/// insertion point shifted, the insertion column cloned per new column.
fn derive_final_columns(
    layout: &SpecSheetLayout,
    plan: &SpecSheetPlan,
    options: &SpecComposeOptions,
) -> Vec<SpecColumnState> {
    let n_width_fallback = layout
        .work_sheet
        .properties
        .default_col_width
        .unwrap_or(options.col_width_default);

    let mut l_columns = Vec::with_capacity(layout.col_layouts.len() + plan.n_cols_inserted as usize);
    for col_layout in &layout.col_layouts {
        let n_width = col_layout
            .width
            .filter(|width| *width > 0.0)
            .unwrap_or(n_width_fallback)
            * options.col_width_error_margin;
        let column = SpecColumnState {
            number: col_layout.number,
            width: n_width,
            style: col_layout.style.clone(),
            hidden: col_layout.hidden,
        };

        if let Some(n_insert) = plan.insert_col_num
            && col_layout.number == n_insert
        {
            for idx in 0..plan.n_cols_inserted {
                l_columns.push(SpecColumnState {
                    number: n_insert.saturating_add(idx),
                    ..column.clone()
                });
            }
        }
        l_columns.push(SpecColumnState {
            number: plan.remap(col_layout.number),
            ..column
        });
    }
    l_columns
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowTemplating

fn apply_new_rows(
    sheet: &mut SheetModel,
    layout: &SpecSheetLayout,
    data: &SpecSheetData,
    plan: &SpecSheetPlan,
) -> Result<(), ComposeError> {
    if !plan.if_add_rows() {
        return Ok(());
    }
    if let Some(n_start) = plan.start_row_num {
        sheet.touch_row(n_start)?;
    }
    for row_values in &data.new_rows {
        sheet.add_row(row_values)?;
    }

    let Some(n_start) = plan.start_row_num else {
        return Ok(());
    };
    let l_template_cells: Vec<&SpecCellData> = layout
        .cell_datas
        .iter()
        .filter(|cell_data| cell_data.row == n_start)
        .collect();

    for cell_data in &l_template_cells {
        let n_col = plan.remap(cell_data.col);
        let (style, validation) = resolve_cell_format(layout, data, plan, cell_data);
        let if_anchor = plan.insert_col_num == Some(cell_data.col);

        for idx_row in 0..=plan.n_new_rows {
            let n_row = n_start.saturating_add(idx_row);
            let cell = sheet.cell_mut(n_row, n_col)?;
            cell.style = style.clone();
            if let Some(validation) = validation {
                cell.validation = Some(validation.clone());
            }

            if if_anchor && let Some(n_insert) = plan.insert_col_num {
                for idx_col in 0..plan.n_cols_inserted {
                    sheet.set_style(n_row, n_insert.saturating_add(idx_col), style.clone())?;
                }
            }
        }
    }
    log::debug!(
        "Templated {} column(s) over {} row(s) from row {n_start}",
        l_template_cells.len(),
        plan.n_new_rows + 1
    );
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CustomOverrides

/// Overwrite values/notes at remapped addresses. Idempotent.
pub fn apply_custom_values(
    sheet: &mut SheetModel,
    plan: &SpecSheetPlan,
    custom_values: &[SpecCustomValue],
) -> Result<(), ComposeError> {
    for custom in custom_values {
        let (n_row, n_col_orig) = parse_cell_address(&custom.address)?;
        let n_col = plan.remap(n_col_orig);
        sheet.set_value(n_row, n_col, custom.value.clone())?;
        if let Some(note) = &custom.note {
            sheet.set_note(n_row, n_col, note)?;
        }
    }
    Ok(())
}

/// Write formula templates for the template row and every appended row.
pub fn apply_custom_formulas(
    sheet: &mut SheetModel,
    plan: &SpecSheetPlan,
    custom_formulas: &[SpecCustomFormula],
) -> Result<(), ComposeError> {
    for custom in custom_formulas {
        let (n_row_start, n_col_start) = parse_cell_address(&custom.start_address)?;
        let (n_row_ref, n_col_ref) = parse_cell_address(&custom.ref_address)?;
        let n_col_target = plan.remap(n_col_start);
        let n_col_ref_target = plan.remap(n_col_ref);

        for idx_row in 0..=plan.n_new_rows {
            let c_formula = render_formula_template(
                &custom.formula,
                n_row_ref.saturating_add(idx_row),
                n_col_ref_target,
            );
            sheet.set_value(
                n_row_start.saturating_add(idx_row),
                n_col_target,
                EnumCellValue::formula(c_formula),
            )?;
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnRemoval

/// Remove column ranges; returns the merged ranges in final coordinates
/// (ascending) for translating later coordinates.
///
/// Ranges must start inside the grid; counts are clipped at its last column.
fn apply_column_removals(
    sheet: &mut SheetModel,
    data: &SpecSheetData,
    plan: &SpecSheetPlan,
) -> Result<Vec<(u32, u32)>, ComposeError> {
    let mut l_ranges: Vec<(u32, u32)> = Vec::with_capacity(data.remove_columns.len());
    for entry in &data.remove_columns {
        let n_start = plan.remap(entry.start_col_num);
        validate_cell_bounds(1, n_start)?;
        let n_count = u32::min(entry.remove_col_count, N_NCOLS_EXCEL_MAX - n_start + 1);
        l_ranges.push((n_start, n_count));
    }
    let l_merged = merge_column_ranges(&l_ranges);

    for (n_start, n_count) in l_merged.iter().rev() {
        sheet.splice_columns(*n_start, *n_count);
    }
    if !l_merged.is_empty() {
        log::debug!("Removed column ranges {l_merged:?}");
    }
    Ok(l_merged)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ImagesAndProtection

fn apply_images(
    book: &mut BookModel,
    sheet: &mut SheetModel,
    layout: &SpecSheetLayout,
    removed_ranges: &[(u32, u32)],
) -> Result<(), ComposeError> {
    for image in &layout.images {
        let Some(image_url) = image.image_url.as_deref() else {
            continue;
        };
        let (first_row, first_col, last_row, last_col) = parse_cell_range(&image.range)?;
        let (extension, bytes) = parse_image_data_uri(image_url)?;

        let image_id = book.add_image(SpecImageMedia { extension, bytes });
        sheet.add_image(SpecImageAnchor {
            image_id,
            first_row,
            first_col: shift_column_for_removals(first_col, removed_ranges),
            last_row,
            last_col: shift_column_for_removals(last_col, removed_ranges),
        });
    }
    Ok(())
}

fn apply_protection(
    sheet: &mut SheetModel,
    layout: &SpecSheetLayout,
    options: &SpecComposeOptions,
) -> Result<(), ComposeError> {
    let Some(protection) = &layout.work_sheet.sheet_protection else {
        return Ok(());
    };
    if !protection.sheet {
        return Ok(());
    }
    if options.if_skip_protection {
        log::debug!("Sheet {:?}: protection skipped", sheet.name());
        return Ok(());
    }
    let password = options
        .sheet_password
        .as_deref()
        .ok_or_else(|| ComposeError::MissingSheetPassword(sheet.name().to_string()))?;
    sheet.protect(password, protection.clone());
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
