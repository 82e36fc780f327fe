use std::collections::HashMap;

use axiomkit_io_xlsx_compose::{
    SpecComposeOptions, SpecExportReport, SpecWorkbookData, SpecWorkbookLayout, compose_book,
    derive_new_rows_from_ipc_bytes, derive_workbook_data_from_json_str, export_xlsx_to_dir,
};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "axiomkit.xlsx.compose.v1";

fn parse_payloads(
    layout_json: Option<&str>,
    data_json: Option<&str>,
    rows_ipc: Option<HashMap<String, Vec<u8>>>,
) -> PyResult<(SpecWorkbookLayout, SpecWorkbookData)> {
    let layout = match layout_json {
        Some(text) => SpecWorkbookLayout::from_json_str(text)
            .map_err(|err| PyValueError::new_err(format!("layout: {err}")))?,
        None => SpecWorkbookLayout::default(),
    };
    let mut data = match data_json {
        Some(text) => derive_workbook_data_from_json_str(text)
            .map_err(|err| PyValueError::new_err(format!("data: {err}")))?,
        None => SpecWorkbookData::new(),
    };

    for (sheet_id, v_ipc) in rows_ipc.unwrap_or_default() {
        let l_rows = derive_new_rows_from_ipc_bytes(&v_ipc)
            .map_err(|err| PyValueError::new_err(format!("rows_ipc[{sheet_id:?}]: {err}")))?;
        data.entry(sheet_id).or_default().new_rows.extend(l_rows);
    }

    Ok((layout, data))
}

fn derive_report_dict<'py>(
    py: Python<'py>,
    report: &SpecExportReport,
) -> PyResult<Bound<'py, PyDict>> {
    let dict_report = PyDict::new(py);
    dict_report.set_item("sheet_names", report.sheet_names.clone())?;
    dict_report.set_item("file_name", report.file_name.as_str())?;
    dict_report.set_item("n_bytes", report.n_bytes)?;
    dict_report.set_item("if_saved", report.if_saved)?;
    dict_report.set_item("warnings", report.warnings.clone())?;
    Ok(dict_report)
}

/// Compose layout + data JSON into `<dir_out>/<file_name>.xlsx`.
///
/// `rows_ipc` maps sheet ids to Polars IPC payloads appended as `newRows`.
#[pyfunction]
#[pyo3(signature = (
    file_name,
    dir_out,
    layout_json = None,
    data_json = None,
    sheet_password = None,
    rows_ipc = None
))]
fn export_xlsx<'py>(
    py: Python<'py>,
    file_name: &str,
    dir_out: &str,
    layout_json: Option<&str>,
    data_json: Option<&str>,
    sheet_password: Option<String>,
    rows_ipc: Option<HashMap<String, Vec<u8>>>,
) -> PyResult<Bound<'py, PyDict>> {
    let (layout, data) = parse_payloads(layout_json, data_json, rows_ipc)?;
    let options = SpecComposeOptions {
        sheet_password,
        ..Default::default()
    };
    let report = export_xlsx_to_dir(&layout, &data, file_name, dir_out, &options)
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
    derive_report_dict(py, &report)
}

/// Compose without writing and return the resulting sheet names.
#[pyfunction]
#[pyo3(signature = (layout_json = None, data_json = None))]
fn compose_sheet_names(
    layout_json: Option<&str>,
    data_json: Option<&str>,
) -> PyResult<Vec<String>> {
    let (layout, data) = parse_payloads(layout_json, data_json, None)?;
    let options = SpecComposeOptions {
        if_skip_protection: true,
        ..Default::default()
    };
    let book = compose_book(&layout, &data, &options)
        .map_err(|err| PyRuntimeError::new_err(err.to_string()))?;
    Ok(book.sheet_names())
}

#[pymodule]
fn _axiomkit_io_xlsx_compose_rs(_py: Python<'_>, module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(export_xlsx, module)?)?;
    module.add_function(wrap_pyfunction!(compose_sheet_names, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    Ok(())
}
