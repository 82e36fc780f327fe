//! In-memory worksheet/workbook store the composer writes into and reads back.

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::{
    ComposeError, EnumCellValue, SpecCellStyle, SpecDataValidation, SpecSheetProtection,
    SpecTableInfo, SpecWorkbookProps,
};
use crate::util::validate_cell_bounds;

////////////////////////////////////////////////////////////////////////////////
// #region StateRecords

/// Composed state of one cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellState {
    pub value: EnumCellValue,
    pub style: SpecCellStyle,
    pub note: Option<String>,
    pub validation: Option<SpecDataValidation>,
}

/// Composed state of one row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecRowState {
    /// Height in points.
    pub height: Option<f64>,
    /// Row-level style.
    pub style: Option<SpecCellStyle>,
}

/// Final column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnState {
    /// 1-based column number.
    pub number: u32,
    /// Width in character units (margin already applied).
    pub width: f64,
    /// Column-level style.
    pub style: Option<SpecCellStyle>,
    /// Hidden column.
    pub hidden: bool,
}

/// Worksheet-wide settings resolved from `workSheet`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecSheetSettings {
    /// Sanitized sheet name.
    pub name: String,
    /// `#RRGGBB` tab color.
    pub tab_color: Option<String>,
    /// Default row height in points.
    pub default_row_height: Option<f64>,
    /// Frozen `(rows, cols)`.
    pub frozen_panes: Option<(u32, u32)>,
    /// Grid line visibility.
    pub show_grid_lines: Option<bool>,
}

/// Table with its resolved top-left anchor (1-based).
#[derive(Debug, Clone, PartialEq)]
pub struct SpecTablePlacement {
    pub first_row: u32,
    pub first_col: u32,
    pub info: SpecTableInfo,
}

/// Image placed over an inclusive 1-based cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecImageAnchor {
    /// Media id registered in [`BookModel`].
    pub image_id: usize,
    pub first_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    pub last_col: u32,
}

/// Decoded image media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecImageMedia {
    /// File extension from the data URI MIME subtype (`png`, `jpeg`, ...).
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// Protection applied to a worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecProtectionState {
    pub password: String,
    pub options: SpecSheetProtection,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetModel

/// One composed worksheet.
///
/// Coordinates are 1-based and bounded by the Excel grid. Rows "exist" once
/// they carry a cell or a row record, mirroring how a worksheet store
/// enumerates populated rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetModel {
    settings: SpecSheetSettings,
    cells: BTreeMap<(u32, u32), SpecCellState>,
    rows: BTreeMap<u32, SpecRowState>,
    columns: Vec<SpecColumnState>,
    tables: Vec<SpecTablePlacement>,
    images: Vec<SpecImageAnchor>,
    protection: Option<SpecProtectionState>,
}

impl SheetModel {
    pub fn new(settings: SpecSheetSettings) -> Self {
        Self {
            settings,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn settings(&self) -> &SpecSheetSettings {
        &self.settings
    }

    /// Read a cell, if populated.
    pub fn cell(&self, row: u32, col: u32) -> Option<&SpecCellState> {
        self.cells.get(&(row, col))
    }

    /// Get or create a cell.
    pub fn cell_mut(&mut self, row: u32, col: u32) -> Result<&mut SpecCellState, ComposeError> {
        validate_cell_bounds(row, col)?;
        Ok(self.cells.entry((row, col)).or_default())
    }

    pub fn set_value(&mut self, row: u32, col: u32, value: EnumCellValue) -> Result<(), ComposeError> {
        self.cell_mut(row, col)?.value = value;
        Ok(())
    }

    pub fn set_style(&mut self, row: u32, col: u32, style: SpecCellStyle) -> Result<(), ComposeError> {
        self.cell_mut(row, col)?.style = style;
        Ok(())
    }

    pub fn set_note(&mut self, row: u32, col: u32, note: &str) -> Result<(), ComposeError> {
        self.cell_mut(row, col)?.note = Some(note.to_string());
        Ok(())
    }

    pub fn set_validation(
        &mut self,
        row: u32,
        col: u32,
        validation: SpecDataValidation,
    ) -> Result<(), ComposeError> {
        self.cell_mut(row, col)?.validation = Some(validation);
        Ok(())
    }

    /// Iterate populated cells in `(row, col)` order.
    pub fn cells(&self) -> impl Iterator<Item = (&(u32, u32), &SpecCellState)> {
        self.cells.iter()
    }

    /// Get or create a row record.
    pub fn row_mut(&mut self, row: u32) -> Result<&mut SpecRowState, ComposeError> {
        validate_cell_bounds(row, 1)?;
        Ok(self.rows.entry(row).or_default())
    }

    /// Make sure `row` exists without changing it.
    pub fn touch_row(&mut self, row: u32) -> Result<(), ComposeError> {
        self.row_mut(row).map(|_| ())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&u32, &SpecRowState)> {
        self.rows.iter()
    }

    /// Last existing row number, `0` for an empty sheet.
    pub fn last_row(&self) -> u32 {
        let n_last_row_record = self.rows.keys().next_back().copied().unwrap_or(0);
        let n_last_row_cell = self.cells.keys().map(|(row, _)| *row).max().unwrap_or(0);
        u32::max(n_last_row_record, n_last_row_cell)
    }

    /// All existing row numbers, ascending.
    pub fn row_numbers(&self) -> BTreeSet<u32> {
        self.rows
            .keys()
            .copied()
            .chain(self.cells.keys().map(|(row, _)| *row))
            .collect()
    }

    /// Append a literal row after the last existing row; returns its number.
    ///
    /// Blank values leave the cell unpopulated.
    pub fn add_row(&mut self, values: &[EnumCellValue]) -> Result<u32, ComposeError> {
        let n_row = self.last_row() + 1;
        self.touch_row(n_row)?;
        for (idx_col, value) in values.iter().enumerate() {
            if value.is_none() {
                continue;
            }
            let n_col = u32::try_from(idx_col + 1).map_err(|_| ComposeError::OutOfBounds {
                row: n_row,
                col: u32::MAX,
            })?;
            self.set_value(n_row, n_col, value.clone())?;
        }
        Ok(n_row)
    }

    pub fn set_columns(&mut self, columns: Vec<SpecColumnState>) {
        self.columns = columns;
    }

    pub fn columns(&self) -> &[SpecColumnState] {
        &self.columns
    }

    /// Delete `n_count` columns starting at `start_col`, shifting later columns left.
    pub fn splice_columns(&mut self, start_col: u32, n_count: u32) {
        if n_count == 0 {
            return;
        }
        let n_end = start_col.saturating_add(n_count);
        let shift = |col: u32| -> Option<u32> {
            if col < start_col {
                Some(col)
            } else if col < n_end {
                None
            } else {
                Some(col - n_count)
            }
        };

        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((row, col), state)| shift(col).map(|col_new| ((row, col_new), state)))
            .collect();

        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .filter_map(|mut column| {
                shift(column.number).map(|col_new| {
                    column.number = col_new;
                    column
                })
            })
            .collect();
    }

    pub fn add_table(&mut self, placement: SpecTablePlacement) {
        self.tables.push(placement);
    }

    pub fn tables(&self) -> &[SpecTablePlacement] {
        &self.tables
    }

    pub fn add_image(&mut self, anchor: SpecImageAnchor) {
        self.images.push(anchor);
    }

    pub fn images(&self) -> &[SpecImageAnchor] {
        &self.images
    }

    pub fn protect(&mut self, password: &str, options: SpecSheetProtection) {
        self.protection = Some(SpecProtectionState {
            password: password.to_string(),
            options,
        });
    }

    pub fn protection(&self) -> Option<&SpecProtectionState> {
        self.protection.as_ref()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region BookModel

/// Composed workbook: ordered worksheets, shared image media, metadata.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookModel {
    sheets: Vec<SheetModel>,
    media: Vec<SpecImageMedia>,
    properties: Option<SpecWorkbookProps>,
}

impl BookModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fully composed worksheet. Names are unique case-insensitively.
    pub fn push_worksheet(&mut self, sheet: SheetModel) -> Result<(), ComposeError> {
        let c_name_lower = sheet.name().to_lowercase();
        if self
            .sheets
            .iter()
            .any(|existing| existing.name().to_lowercase() == c_name_lower)
        {
            return Err(ComposeError::DuplicateSheetName(sheet.name().to_string()));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    /// Register image media; returns its id.
    pub fn add_image(&mut self, media: SpecImageMedia) -> usize {
        self.media.push(media);
        self.media.len() - 1
    }

    pub fn image(&self, image_id: usize) -> Option<&SpecImageMedia> {
        self.media.get(image_id)
    }

    pub fn set_properties(&mut self, properties: SpecWorkbookProps) {
        self.properties = Some(properties);
    }

    pub fn properties(&self) -> Option<&SpecWorkbookProps> {
        self.properties.as_ref()
    }

    pub fn sheets(&self) -> &[SheetModel] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetModel> {
        self.sheets.iter().find(|sheet| sheet.name() == name)
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|sheet| sheet.name().to_string()).collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    fn derive_named_sheet(name: &str) -> SheetModel {
        SheetModel::new(SpecSheetSettings {
            name: name.to_string(),
            ..Default::default()
        })
    }

    #[test]
    fn test_add_row_appends_after_last_existing_row() {
        let mut sheet = derive_named_sheet("S");
        sheet.set_value(2, 1, EnumCellValue::from("header")).unwrap();
        sheet.touch_row(5).unwrap();

        let n_row = sheet
            .add_row(&[EnumCellValue::from(1i64), EnumCellValue::None, EnumCellValue::from(3i64)])
            .unwrap();

        assert_eq!(n_row, 6);
        assert_eq!(sheet.cell(6, 1).unwrap().value, EnumCellValue::Number(1.0));
        assert!(sheet.cell(6, 2).is_none());
        assert_eq!(sheet.cell(6, 3).unwrap().value, EnumCellValue::Number(3.0));
        assert_eq!(sheet.row_numbers().into_iter().collect::<Vec<_>>(), vec![2, 5, 6]);
    }

    #[test]
    fn test_cell_mut_rejects_out_of_bounds() {
        let mut sheet = derive_named_sheet("S");
        assert!(matches!(
            sheet.cell_mut(0, 1),
            Err(ComposeError::OutOfBounds { row: 0, col: 1 })
        ));
        assert!(sheet.cell_mut(1, 16_385).is_err());
    }

    #[test]
    fn test_splice_columns_shifts_cells_and_columns() {
        let mut sheet = derive_named_sheet("S");
        for col in 1..=5 {
            sheet.set_value(1, col, EnumCellValue::from(col as i64)).unwrap();
        }
        sheet.set_columns(
            (1..=5)
                .map(|number| SpecColumnState {
                    number,
                    width: number as f64,
                    style: None,
                    hidden: false,
                })
                .collect(),
        );

        sheet.splice_columns(2, 2);

        let l_values: Vec<_> = sheet.cells().map(|(key, state)| (*key, state.value.clone())).collect();
        assert_eq!(
            l_values,
            vec![
                ((1, 1), EnumCellValue::Number(1.0)),
                ((1, 2), EnumCellValue::Number(4.0)),
                ((1, 3), EnumCellValue::Number(5.0)),
            ]
        );
        let l_widths: Vec<_> = sheet.columns().iter().map(|c| (c.number, c.width)).collect();
        assert_eq!(l_widths, vec![(1, 1.0), (2, 4.0), (3, 5.0)]);
    }

    #[test]
    fn test_push_worksheet_rejects_duplicate_names() {
        let mut book = BookModel::new();
        book.push_worksheet(derive_named_sheet("Data")).unwrap();
        let err = book.push_worksheet(derive_named_sheet("DATA")).unwrap_err();
        assert!(matches!(err, ComposeError::DuplicateSheetName(name) if name == "DATA"));
        assert_eq!(book.sheet_names(), vec!["Data".to_string()]);
    }

    #[test]
    fn test_image_registry_ids_are_sequential() {
        let mut book = BookModel::new();
        let media = SpecImageMedia {
            extension: "png".to_string(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(book.add_image(media.clone()), 0);
        assert_eq!(book.add_image(media), 1);
        assert_eq!(book.image(1).unwrap().extension, "png");
        assert!(book.image(2).is_none());
    }
}
