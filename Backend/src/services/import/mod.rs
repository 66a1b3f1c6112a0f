/*
services/import/
├─ mod.rs           ← FileFormat, FieldSpec, ParsedRow, parse_table()
├─ headers.rs       ← résolution des colonnes (exact → compact → partiel)
├─ csv.rs           ← découpage des lignes CSV (guillemets)
├─ spreadsheet.rs   ← lecture xlsx / xls (calamine)
└─ values.rs        ← montants, booléens, dates, noms, téléphones

Aucun accès BD ici : bytes → lignes normalisées.
*/
pub mod csv;
pub mod headers;
pub mod spreadsheet;
pub mod values;

use std::collections::HashMap;

use crate::error::ImportError;
use crate::models::dto::RowIssue;

pub use headers::FieldSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Csv,
    Spreadsheet,
}

impl FileFormat {
    /// Format explicite (?format=), sinon Content-Type, sinon extension du nom de fichier,
    /// sinon signature des premiers octets
    pub fn detect(
        format: Option<&str>,
        content_type: Option<&str>,
        filename: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, ImportError> {
        if let Some(format) = format.map(|f| f.trim().to_lowercase()).filter(|f| !f.is_empty()) {
            return Self::from_name(&format).ok_or(ImportError::UnsupportedFormat(format));
        }

        if let Some(content_type) = content_type.map(str::to_lowercase) {
            if content_type.contains("csv") {
                return Ok(FileFormat::Csv);
            }
            if content_type.contains("spreadsheetml") || content_type.contains("ms-excel") {
                return Ok(FileFormat::Spreadsheet);
            }
        }

        if let Some(filename) = filename {
            let extension = filename.rsplit('.').next().unwrap_or_default().to_lowercase();
            return Self::from_name(&extension).ok_or(ImportError::UnsupportedFormat(extension));
        }

        // xlsx = archive zip, xls = conteneur OLE
        if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(&[0xD0, 0xCF, 0x11, 0xE0]) {
            Ok(FileFormat::Spreadsheet)
        } else {
            Ok(FileFormat::Csv)
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "csv" | "txt" => Some(FileFormat::Csv),
            "xlsx" | "xls" | "xlsm" | "excel" => Some(FileFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// En-têtes + lignes brutes (numéro de ligne 1-based dans le fichier)
#[derive(Debug, Default)]
pub struct RawTable {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
    /// Problèmes de lecture du fichier (encodage…)
    pub warnings: Vec<String>,
}

/// Ligne normalisée : champ logique → valeur non vide
#[derive(Debug, Clone, Default)]
pub struct ParsedRow {
    pub row_number: usize,
    values: HashMap<&'static str, String>,
}

impl ParsedRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            values: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &'static str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &'static str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.values.insert(key, value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

#[derive(Debug, Default)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<ParsedRow>,
    /// Correspondances de colonnes ambiguës (ligne d'en-tête)
    pub warnings: Vec<RowIssue>,
}

pub fn read_table(bytes: &[u8], format: FileFormat) -> Result<RawTable, ImportError> {
    if bytes.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    match format {
        FileFormat::Csv => csv::read_csv(bytes),
        FileFormat::Spreadsheet => spreadsheet::read_spreadsheet(bytes),
    }
}

/// Lecture + résolution des colonnes + extraction des lignes.
/// Une colonne obligatoire manquante rejette le fichier entier.
pub fn parse_table(bytes: &[u8], format: FileFormat, specs: &[FieldSpec]) -> Result<ParsedTable, ImportError> {
    let raw = read_table(bytes, format)?;
    extract_rows(raw, specs)
}

pub fn extract_rows(raw: RawTable, specs: &[FieldSpec]) -> Result<ParsedTable, ImportError> {
    let resolution = headers::resolve_columns(&raw.headers, specs)?;

    let warnings = raw
        .warnings
        .into_iter()
        .chain(resolution.warnings)
        .map(|message| RowIssue::new(raw.header_row, message))
        .collect();

    let rows = raw
        .rows
        .into_iter()
        .map(|(row_number, cells)| {
            let mut row = ParsedRow::new(row_number);
            for (key, index) in &resolution.columns {
                if let Some(cell) = cells.get(*index) {
                    row.set(*key, cell);
                }
            }
            row
        })
        .collect();

    Ok(ParsedTable {
        headers: raw.headers,
        rows,
        warnings,
    })
}
