use regex::Regex;

use crate::errors::{AuditError, Result};

/// Projects a base range like `Sheet!M2:P` onto the row at `index`,
/// preserving the original column letters.
///
/// With `whole_row` the result spans both columns of that row
/// (`Sheet!M4:P4`); otherwise the single trailing column is addressed
/// (`Sheet!P4`), falling back to the leading column when the range has only
/// one. Handles ranges with or without a sheet prefix and with or without a
/// second column or end row.
pub fn project_row(range: &str, index: usize, whole_row: bool) -> Result<String> {
    let finder = Regex::new(r"^(.*!)?([A-Z]+)(\d+):?([A-Z]+)?")
        .expect("static cell range pattern");
    let captures = finder
        .captures(range)
        .ok_or_else(|| AuditError::AnnotatorWrite(format!("unparsable range `{range}`")))?;

    let sheet = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    let column = &captures[2];
    let start: usize = captures[3]
        .parse()
        .map_err(|_| AuditError::AnnotatorWrite(format!("unparsable range `{range}`")))?;
    let trailing_column = captures.get(4).map(|m| m.as_str());
    let row = start + index;

    Ok(match (whole_row, trailing_column) {
        (true, Some(end)) => format!("{sheet}{column}{row}:{end}{row}"),
        (false, Some(end)) => format!("{sheet}{end}{row}"),
        (_, None) => format!("{sheet}{column}{row}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_whole_rows() {
        assert_eq!(project_row("A1:B", 1, true).unwrap(), "A2:B2");
        assert_eq!(project_row("A2", 2, true).unwrap(), "A4");
        assert_eq!(project_row("A1:B100", 2, true).unwrap(), "A3:B3");
    }

    #[test]
    fn projects_single_cells() {
        assert_eq!(project_row("A1", 1, false).unwrap(), "A2");
        assert_eq!(project_row("Tab!A2:B", 0, false).unwrap(), "Tab!B2");
    }

    #[test]
    fn preserves_sheet_names_with_spaces() {
        assert_eq!(
            project_row("Big Bills!M2:P", 2, false).unwrap(),
            "Big Bills!P4"
        );
    }

    #[test]
    fn rejects_garbage_ranges() {
        assert!(project_row("not a range", 0, false).is_err());
    }
}
