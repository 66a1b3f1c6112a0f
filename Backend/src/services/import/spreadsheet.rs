use calamine::{Data, Reader, open_workbook_auto_from_rs};
use std::io::Cursor;

use super::RawTable;
use crate::error::ImportError;

/// Lit la première feuille (xlsx ou xls). La première ligne utilisée = en-têtes,
/// les lignes entièrement vides sont ignorées.
pub fn read_spreadsheet(bytes: &[u8]) -> Result<RawTable, ImportError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::Unreadable("workbook has no worksheet".to_string()))?
        .map_err(|e| ImportError::Unreadable(e.to_string()))?;

    // position absolue de la première cellule utilisée (0-based)
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows = range.rows().enumerate().map(|(offset, cells)| {
        let values: Vec<String> = cells.iter().map(cell_to_string).collect();
        (first_row + offset + 1, values)
    });

    let (header_row, headers) = rows.next().ok_or(ImportError::EmptyFile)?;

    let rows = rows
        .filter(|(_, cells)| cells.iter().any(|c| !c.is_empty()))
        .collect();

    Ok(RawTable {
        header_row,
        headers,
        rows,
        warnings: Vec::new(),
    })
}

/// Valeur de cellule en texte : entiers sans ".0", dates en AAAA-MM-JJ
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(value) => value.date().format("%Y-%m-%d").to_string(),
            None => format_float(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
