use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::users::PhoneType;

/// "$1,250.00" → 1250.00
pub fn parse_decimal(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "yes" | "true" | "1" | "y" => Some(true),
        "no" | "false" | "0" | "n" => Some(false),
        _ => None,
    }
}

const DATE_FORMATS: [&str; 7] = [
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%m-%d-%y",
    "%d-%b-%Y",
    "%b %d, %Y",
];

// `%Y` accepte "24" → an 0024 : on laisse la main à `%y`
fn plausible(date: NaiveDate, format: &str) -> bool {
    !format.contains("%Y") || date.year() >= 1000
}

/// Dates texte usuelles, ou numéro de série Excel (jours depuis 1899-12-30)
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            if plausible(date, format) {
                return Some(date);
            }
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            if plausible(datetime.date(), format) {
                return Some(datetime.date());
            }
        }
    }

    let serial = value.parse::<f64>().ok()?;
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// "Last, First" | "First Last..." | "First"
pub fn parse_full_name(value: &str) -> (String, String) {
    let value = value.trim();

    if let Some((last, first)) = value.split_once(',') {
        return (first.trim().to_string(), last.trim().to_string());
    }

    let mut tokens = value.split_whitespace();
    let first = tokens.next().unwrap_or_default().to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Valeurs multiples séparées par `;`
pub fn split_multi(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Associe deux listes par index ; la plus courte répète son dernier élément
pub fn zip_repeat_last(left: &[String], right: &[String]) -> Vec<(Option<String>, Option<String>)> {
    let count = left.len().max(right.len());
    (0..count)
        .map(|i| {
            (
                left.get(i).or(left.last()).cloned(),
                right.get(i).or(right.last()).cloned(),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhoneEntry {
    pub number: String,
    pub phone_type: PhoneType,
}

const PHONE_MARKERS: [(char, PhoneType); 3] = [('C', PhoneType::Cell), ('H', PhoneType::Home), ('W', PhoneType::Work)];

/// "(814) 310-1159 {C}; (814) 839-0135 {H}" → [(…, Cell), (…, Home)]
/// Marqueurs {C}/{H}/{W} ou (C)/(H)/(W), Cell par défaut.
pub fn parse_phone_list(value: &str) -> Vec<PhoneEntry> {
    value
        .split(';')
        .filter_map(|part| {
            let mut number = part.trim().to_string();
            let mut phone_type = PhoneType::Cell;

            // ASCII uniquement : les positions restent valides dans `number`
            let upper = number.to_ascii_uppercase();
            'markers: for (letter, kind) in PHONE_MARKERS {
                for marker in [format!("{{{}}}", letter), format!("({})", letter)] {
                    if let Some(pos) = upper.find(&marker) {
                        number.replace_range(pos..pos + marker.len(), "");
                        phone_type = kind;
                        break 'markers;
                    }
                }
            }

            let number = number.trim().to_string();
            (!number.is_empty()).then_some(PhoneEntry { number, phone_type })
        })
        .collect()
}
