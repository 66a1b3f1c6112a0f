use tracing::warn;

use super::RawTable;
use crate::error::ImportError;

pub const NOT_UTF8_WARNING: &str =
    "File is not valid UTF-8 (save it as CSV UTF-8); unreadable characters were replaced with '\u{FFFD}'";

/// Découpe une ligne CSV sur les virgules, sauf entre guillemets.
/// `""` à l'intérieur d'un champ entre guillemets donne un guillemet littéral.
/// Les guillemets d'encadrement disparaissent, chaque champ est trimé.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(clean_field(&std::mem::take(&mut current))),
            _ => current.push(c),
        }
    }
    fields.push(clean_field(&current));

    fields
}

fn clean_field(raw: &str) -> String {
    raw.trim().to_string()
}

/// Première ligne non vide = en-têtes. Les lignes vides sont ignorées
/// mais les numéros de ligne restent ceux du fichier.
pub fn read_csv(bytes: &[u8]) -> Result<RawTable, ImportError> {
    let mut warnings = Vec::new();
    if std::str::from_utf8(bytes).is_err() {
        warn!("⚠️  CSV upload is not valid UTF-8, invalid bytes replaced");
        warnings.push(NOT_UTF8_WARNING.to_string());
    }

    let text = String::from_utf8_lossy(bytes);
    let text = text.trim_start_matches('\u{feff}');

    let mut lines = text
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());

    let (header_row, header_line) = lines.next().ok_or(ImportError::EmptyFile)?;

    Ok(RawTable {
        header_row,
        headers: split_csv_line(header_line),
        rows: lines.map(|(number, line)| (number, split_csv_line(line))).collect(),
        warnings,
    })
}
