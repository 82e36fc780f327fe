//! DataFrame sources for `newRows` records.

use std::io::Cursor;

use polars::prelude::{AnyValue, DataFrame, IpcReader, SerReader};

use crate::spec::{ComposeError, EnumCellValue};

/// Convert every DataFrame row into a literal row record (headers excluded).
pub fn derive_new_rows_from_dataframe(
    df: &DataFrame,
) -> Result<Vec<Vec<EnumCellValue>>, ComposeError> {
    let n_height = df.height();
    let l_cols = df.get_columns();

    let mut l_rows = Vec::with_capacity(n_height);
    for idx_row in 0..n_height {
        let mut l_values = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            let value = col
                .get(idx_row)
                .map_err(|err| ComposeError::DataFrame(format!("row {idx_row}: {err}")))?;
            l_values.push(derive_cell_value_from_any_value(value));
        }
        l_rows.push(l_values);
    }
    Ok(l_rows)
}

/// Decode Polars IPC bytes and convert them into row records.
pub fn derive_new_rows_from_ipc_bytes(
    v_ipc_df: &[u8],
) -> Result<Vec<Vec<EnumCellValue>>, ComposeError> {
    let df = derive_dataframe_from_ipc_bytes(v_ipc_df)?;
    derive_new_rows_from_dataframe(&df)
}

fn derive_dataframe_from_ipc_bytes(v_ipc_df: &[u8]) -> Result<DataFrame, ComposeError> {
    IpcReader::new(Cursor::new(v_ipc_df))
        .finish()
        .map_err(|err| ComposeError::DataFrame(format!("Failed to read IPC bytes: {err}")))
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::None,
        AnyValue::Boolean(val) => EnumCellValue::Boolean(val),
        AnyValue::String(val) => EnumCellValue::String(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::String(val.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int128(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::String(value.to_string()),
    }
}
