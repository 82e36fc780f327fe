//! Stateless helper utilities shared by the composer and the writer.

use std::cmp::Ordering;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;

use crate::conf::{
    N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::ComposeError;

////////////////////////////////////////////////////////////////////////////////
// #region ColumnRemap

/// Translate an original column number to its final position after
/// `n_cols_inserted` columns were spliced in before `insert_col_num`.
pub fn remap_column_number(col_num: u32, insert_col_num: u32, n_cols_inserted: u32) -> u32 {
    if col_num >= insert_col_num {
        col_num.saturating_add(n_cols_inserted)
    } else {
        col_num
    }
}

/// Normalize `(start, count)` column removals: drop empty ranges, sort, and
/// merge overlapping/adjacent ranges.
pub fn merge_column_ranges(ranges: &[(u32, u32)]) -> Vec<(u32, u32)> {
    let mut l_ranges: Vec<(u32, u32)> = ranges
        .iter()
        .copied()
        .filter(|(_, n_count)| *n_count > 0)
        .collect();
    l_ranges.sort_unstable();

    let mut l_merged: Vec<(u32, u32)> = Vec::with_capacity(l_ranges.len());
    for (n_start, n_count) in l_ranges {
        let n_end = n_start.saturating_add(n_count);
        if let Some((n_start_prev, n_count_prev)) = l_merged.last_mut() {
            let n_end_prev = n_start_prev.saturating_add(*n_count_prev);
            if n_start <= n_end_prev {
                *n_count_prev = u32::max(n_end_prev, n_end) - *n_start_prev;
                continue;
            }
        }
        l_merged.push((n_start, n_count));
    }
    l_merged
}

/// Translate a column through already-applied removals (merged, ascending).
///
/// Columns inside a removed range collapse onto the range start.
pub fn shift_column_for_removals(col_num: u32, removed_ranges: &[(u32, u32)]) -> u32 {
    let mut n_shift = 0;
    for (n_start, n_count) in removed_ranges {
        if col_num >= n_start.saturating_add(*n_count) {
            n_shift += n_count;
        } else if col_num >= *n_start {
            n_shift += col_num - n_start;
        }
    }
    u32::max(1, col_num.saturating_sub(n_shift))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region A1Addressing

/// Validate 1-based coordinates against Excel grid limits.
pub fn validate_cell_bounds(row: u32, col: u32) -> Result<(), ComposeError> {
    if row == 0 || col == 0 || row > N_NROWS_EXCEL_MAX || col > N_NCOLS_EXCEL_MAX {
        return Err(ComposeError::OutOfBounds { row, col });
    }
    Ok(())
}

/// Convert a 1-based column number to letters (`1 -> A`, `28 -> AB`).
pub fn derive_column_letters(col_num: u32) -> String {
    let mut n_col = col_num;
    let mut l_chars = Vec::new();
    while n_col > 0 {
        let n_rem = (n_col - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_col = (n_col - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

/// Format 1-based coordinates as an A1 address.
pub fn format_cell_address(row: u32, col: u32) -> String {
    format!("{}{row}", derive_column_letters(col))
}

/// Parse an A1 address (`$` anchors allowed) into 1-based `(row, col)`.
pub fn parse_cell_address(address: &str) -> Result<(u32, u32), ComposeError> {
    let c_clean = address.trim().replace('$', "");
    let n_idx_digits = c_clean
        .find(|chr: char| chr.is_ascii_digit())
        .ok_or_else(|| ComposeError::InvalidAddress(address.to_string()))?;
    let (c_letters, c_digits) = c_clean.split_at(n_idx_digits);

    if c_letters.is_empty() || !c_letters.chars().all(|chr| chr.is_ascii_alphabetic()) {
        return Err(ComposeError::InvalidAddress(address.to_string()));
    }

    let mut n_col: u32 = 0;
    for chr in c_letters.chars() {
        let n_digit = (chr.to_ascii_uppercase() as u8 - b'A' + 1) as u32;
        n_col = n_col
            .checked_mul(26)
            .and_then(|val| val.checked_add(n_digit))
            .ok_or_else(|| ComposeError::InvalidAddress(address.to_string()))?;
    }
    let n_row: u32 = c_digits
        .parse()
        .map_err(|_| ComposeError::InvalidAddress(address.to_string()))?;

    validate_cell_bounds(n_row, n_col)?;
    Ok((n_row, n_col))
}

/// Parse `"B2:D6"` (or a single cell) into `(first_row, first_col, last_row, last_col)`.
pub fn parse_cell_range(range: &str) -> Result<(u32, u32, u32, u32), ComposeError> {
    let mut it_parts = range.split(':');
    let c_first = it_parts.next().unwrap_or_default();
    let c_last = it_parts.next().unwrap_or(c_first);
    if it_parts.next().is_some() {
        return Err(ComposeError::InvalidRange(range.to_string()));
    }

    let (r1, c1) =
        parse_cell_address(c_first).map_err(|_| ComposeError::InvalidRange(range.to_string()))?;
    let (r2, c2) =
        parse_cell_address(c_last).map_err(|_| ComposeError::InvalidRange(range.to_string()))?;

    Ok((
        u32::min(r1, r2),
        u32::min(c1, c2),
        u32::max(r1, r2),
        u32::max(c1, c2),
    ))
}

/// Fill a formula template for one reference cell.
///
/// Placeholders: `{ref}` address, `{row}` row number, `{col}` column letters.
pub fn render_formula_template(template: &str, ref_row: u32, ref_col: u32) -> String {
    template
        .replace("{ref}", &format_cell_address(ref_row, ref_col))
        .replace("{row}", &ref_row.to_string())
        .replace("{col}", &derive_column_letters(ref_col))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetOrdering

/// Natural ordering for sheet identifiers: digit runs compare numerically,
/// so `"2" < "10"` and `"sheet9" < "sheet10"`.
pub fn compare_sheet_ids(left: &str, right: &str) -> Ordering {
    let l_left = split_natural_chunks(left);
    let l_right = split_natural_chunks(right);

    for (c_left, c_right) in l_left.iter().zip(l_right.iter()) {
        let ord = match (is_digit_chunk(c_left), is_digit_chunk(c_right)) {
            (true, true) => {
                let c_left_trim = c_left.trim_start_matches('0');
                let c_right_trim = c_right.trim_start_matches('0');
                c_left_trim
                    .len()
                    .cmp(&c_right_trim.len())
                    .then_with(|| c_left_trim.cmp(c_right_trim))
            }
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => c_left.cmp(c_right),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    l_left
        .len()
        .cmp(&l_right.len())
        .then_with(|| left.cmp(right))
}

/// Sort identifiers with [`compare_sheet_ids`].
pub fn sort_sheet_ids<'a>(ids: impl IntoIterator<Item = &'a String>) -> Vec<&'a String> {
    let mut l_ids: Vec<&String> = ids.into_iter().collect();
    l_ids.sort_by(|a, b| compare_sheet_ids(a, b));
    l_ids
}

fn split_natural_chunks(text: &str) -> Vec<&str> {
    let mut l_chunks = Vec::new();
    let mut n_idx_start = 0;
    let mut if_prev_digit: Option<bool> = None;

    for (n_idx, chr) in text.char_indices() {
        let if_digit = chr.is_ascii_digit();
        if let Some(prev) = if_prev_digit
            && prev != if_digit
        {
            l_chunks.push(&text[n_idx_start..n_idx]);
            n_idx_start = n_idx;
        }
        if_prev_digit = Some(if_digit);
    }
    if n_idx_start < text.len() {
        l_chunks.push(&text[n_idx_start..]);
    }
    l_chunks
}

fn is_digit_chunk(chunk: &str) -> bool {
    chunk.chars().next().is_some_and(|chr| chr.is_ascii_digit())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Convert `AARRGGBB`/`RRGGBB` into `#RRGGBB`.
pub fn derive_hex_color_from_argb(argb: &str) -> Option<String> {
    let c_hex = argb.trim().trim_start_matches('#');
    if !c_hex.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return None;
    }
    match c_hex.len() {
        6 => Some(format!("#{}", c_hex.to_ascii_uppercase())),
        8 => Some(format!("#{}", c_hex[2..].to_ascii_uppercase())),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Images

/// Decode a `data:image/<ext>;base64,<payload>` URI into `(extension, bytes)`.
pub fn parse_image_data_uri(image_url: &str) -> Result<(String, Vec<u8>), ComposeError> {
    let (c_header, c_payload) = image_url
        .split_once(',')
        .ok_or_else(|| ComposeError::InvalidImage("missing ',' separator".to_string()))?;

    let c_mime = c_header.split(';').next().unwrap_or_default();
    let c_extension = c_mime
        .split('/')
        .nth(1)
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| ComposeError::InvalidImage(format!("missing MIME subtype in {c_header:?}")))?
        .to_ascii_lowercase();

    let v_bytes = BASE64_STANDARD
        .decode(c_payload.trim())
        .map_err(|err| ComposeError::InvalidImage(format!("base64 decode failed: {err}")))?;
    if v_bytes.is_empty() {
        return Err(ComposeError::InvalidImage("empty image payload".to_string()));
    }

    Ok((c_extension, v_bytes))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RangeUtils

/// Convert sorted indices to contiguous inclusive ranges.
pub fn derive_contiguous_ranges(sorted_indices: &[u32]) -> Vec<(u32, u32)> {
    if sorted_indices.is_empty() {
        return vec![];
    }

    let mut l_contiguous_ranges = Vec::new();
    let mut n_idx_start = sorted_indices[0];
    let mut n_idx_end = sorted_indices[0];

    for idx in &sorted_indices[1..] {
        if *idx == n_idx_end + 1 {
            n_idx_end = *idx;
        } else {
            l_contiguous_ranges.push((n_idx_start, n_idx_end));
            n_idx_start = *idx;
            n_idx_end = *idx;
        }
    }

    l_contiguous_ranges.push((n_idx_start, n_idx_end));
    l_contiguous_ranges
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_remap_is_monotone(
            col_a in 1u32..20_000,
            col_b in 1u32..20_000,
            insert in 1u32..20_000,
            n_inserted in 0u32..64,
        ) {
            let (lo, hi) = if col_a <= col_b { (col_a, col_b) } else { (col_b, col_a) };
            prop_assert!(
                remap_column_number(lo, insert, n_inserted)
                    <= remap_column_number(hi, insert, n_inserted)
            );
        }

        #[test]
        fn test_remap_without_insertion_is_identity(col in 1u32..20_000, insert in 1u32..20_000) {
            prop_assert_eq!(remap_column_number(col, insert, 0), col);
        }
    }

    #[test]
    fn test_remap_shifts_only_at_or_after_insert() {
        assert_eq!(remap_column_number(2, 3, 2), 2);
        assert_eq!(remap_column_number(3, 3, 2), 5);
        assert_eq!(remap_column_number(7, 3, 2), 9);
    }

    #[test]
    fn test_cell_address_round_trip_edges() {
        assert_eq!(parse_cell_address("A1").unwrap(), (1, 1));
        assert_eq!(parse_cell_address("$AB$12").unwrap(), (12, 28));
        assert_eq!(format_cell_address(12, 28), "AB12");
        assert_eq!(derive_column_letters(702), "ZZ");
        assert_eq!(derive_column_letters(703), "AAA");
        assert!(parse_cell_address("12").is_err());
        assert!(parse_cell_address("A0").is_err());
        assert!(parse_cell_address("A1B").is_err());
    }

    #[test]
    fn test_parse_cell_range_normalizes_corners() {
        assert_eq!(parse_cell_range("D6:B2").unwrap(), (2, 2, 6, 4));
        assert_eq!(parse_cell_range("C3").unwrap(), (3, 3, 3, 3));
        assert!(parse_cell_range("A1:B2:C3").is_err());
    }

    #[test]
    fn test_render_formula_template_placeholders() {
        assert_eq!(render_formula_template("=B{row}*{ref}", 7, 3), "=B7*C7");
        assert_eq!(render_formula_template("=SUM({col}1:{ref})", 4, 27), "=SUM(AA1:AA4)");
        assert_eq!(render_formula_template("='Rates'!A1", 4, 2), "='Rates'!A1");
    }

    #[test]
    fn test_sheet_ids_sort_naturally() {
        let ids: Vec<String> = ["10", "2", "1", "workbook", "sheet10", "sheet9", "02"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let l_sorted: Vec<&str> = sort_sheet_ids(&ids).into_iter().map(String::as_str).collect();
        assert_eq!(
            l_sorted,
            vec!["1", "02", "2", "10", "sheet9", "sheet10", "workbook"]
        );
    }

    #[test]
    fn test_merge_column_ranges_merges_overlaps() {
        assert_eq!(
            merge_column_ranges(&[(6, 2), (2, 1), (3, 0), (7, 3), (3, 1)]),
            vec![(2, 2), (6, 4)]
        );
    }

    #[test]
    fn test_column_arithmetic_saturates_on_huge_counts() {
        assert_eq!(remap_column_number(u32::MAX - 1, 1, 5), u32::MAX);
        assert_eq!(
            merge_column_ranges(&[(2, u32::MAX), (5, 3)]),
            vec![(2, u32::MAX - 2)]
        );
        assert_eq!(shift_column_for_removals(9, &[(2, u32::MAX)]), 2);
    }

    #[test]
    fn test_shift_column_for_removals() {
        let removed = [(2, 2), (8, 1)];
        assert_eq!(shift_column_for_removals(1, &removed), 1);
        assert_eq!(shift_column_for_removals(3, &removed), 2);
        assert_eq!(shift_column_for_removals(4, &removed), 2);
        assert_eq!(shift_column_for_removals(10, &removed), 7);
    }

    #[test]
    fn test_parse_image_data_uri() {
        let (ext, bytes) = parse_image_data_uri("data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(ext, "png");
        assert_eq!(&bytes[1..4], b"PNG");
        assert!(parse_image_data_uri("data:image/png;base64").is_err());
        assert!(parse_image_data_uri("data:;base64,AAAA").is_err());
        assert!(parse_image_data_uri("data:image/png;base64,@@@").is_err());
    }

    #[test]
    fn test_sanitize_and_colors() {
        assert_eq!(sanitize_sheet_name("Q1/Q2 [draft]", "_"), "Q1_Q2 _draft_");
        assert_eq!(sanitize_sheet_name("   ", "_"), "Sheet");
        assert_eq!(derive_hex_color_from_argb("FFff0000").as_deref(), Some("#FF0000"));
        assert_eq!(derive_hex_color_from_argb("00FF00").as_deref(), Some("#00FF00"));
        assert_eq!(derive_hex_color_from_argb("red"), None);
    }

    #[test]
    fn test_derive_contiguous_ranges() {
        assert_eq!(
            derive_contiguous_ranges(&[5, 6, 7, 9, 11, 12]),
            vec![(5, 7), (9, 9), (11, 12)]
        );
        assert!(derive_contiguous_ranges(&[]).is_empty());
    }
}
