use crate::error::CliError;

/// One input row: `(column, raw)` pairs in file order.
pub type Row = Vec<(String, String)>;

/// Split `column=value` lines into rows.
///
/// A blank line ends a row, `#` starts a comment line. The value keeps
/// everything after the first `=` verbatim; the column is trimmed.
pub fn parse_rows(content: &str) -> Result<Vec<Row>, CliError> {
    let mut rows = Vec::new();
    let mut current = Row::new();

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                rows.push(std::mem::take(&mut current));
            }
            continue;
        }
        if line.trim_start().starts_with('#') {
            continue;
        }
        let Some((column, raw)) = line.split_once('=') else {
            return Err(CliError::Parse {
                line: index + 1,
                detail: "expected column=value".to_string(),
            });
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(CliError::Parse {
                line: index + 1,
                detail: "empty column name".to_string(),
            });
        }
        current.push((column.to_string(), raw.to_string()));
    }
    if !current.is_empty() {
        rows.push(current);
    }
    Ok(rows)
}
