use crate::data::{Dataset, DatasetKind, Record};
use crate::error::{LoadError, LoadResult};

/// Parse header-first CSV text into a dataset.
///
/// Cells map to header columns by position. Quoted fields may contain commas,
/// newlines and `""` escapes. Blank lines are skipped; short rows leave the
/// trailing columns absent and extra cells are dropped.
pub fn parse_csv(kind: DatasetKind, text: &str) -> LoadResult<Dataset> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rows = split_rows(text).map_err(|message| LoadError::Parse {
        dataset: kind.to_string(),
        message,
    })?;

    let mut rows = rows.into_iter();
    let header = rows.next().ok_or_else(|| LoadError::Parse {
        dataset: kind.to_string(),
        message: "missing header row".to_string(),
    })?;
    let columns: Vec<String> = header.into_iter().map(|c| c.trim().to_string()).collect();

    let records = rows
        .map(|cells| {
            let fields = columns
                .iter()
                .zip(cells.into_iter().map(|c| c.trim().to_string()))
                .map(|(col, cell)| (col.clone(), cell))
                .collect();
            Record::new(fields)
        })
        .collect();

    Ok(Dataset {
        kind,
        columns,
        records,
    })
}

fn split_rows(text: &str) -> Result<Vec<Vec<String>>, String> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut quoted_from_line = 0usize;
    let mut line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    cell.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    cell.push(c);
                }
                _ => cell.push(c),
            }
            continue;
        }
        match c {
            '"' if cell.trim().is_empty() => {
                cell.clear();
                in_quotes = true;
                quoted_from_line = line;
            }
            ',' => row.push(std::mem::take(&mut cell)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                line += 1;
                row.push(std::mem::take(&mut cell));
                push_row(&mut rows, std::mem::take(&mut row));
            }
            _ => cell.push(c),
        }
    }

    if in_quotes {
        return Err(format!(
            "unterminated quoted field starting on line {}",
            quoted_from_line
        ));
    }
    if !cell.is_empty() || !row.is_empty() {
        row.push(cell);
        push_row(&mut rows, row);
    }
    Ok(rows)
}

fn push_row(rows: &mut Vec<Vec<String>>, row: Vec<String>) {
    let blank = row.len() == 1 && row[0].trim().is_empty();
    if !blank {
        rows.push(row);
    }
}
