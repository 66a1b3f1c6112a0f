use crate::error::ImportError;

/// Champ logique attendu dans le fichier, avec les noms de colonne acceptés
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    pub required: bool,
    /// Autorise la correspondance partielle (dernière étape)
    pub fuzzy: bool,
}

impl FieldSpec {
    pub const fn required(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            key,
            aliases,
            required: true,
            fuzzy: true,
        }
    }

    pub const fn optional(key: &'static str, aliases: &'static [&'static str]) -> Self {
        Self {
            key,
            aliases,
            required: false,
            fuzzy: true,
        }
    }

    pub const fn exact_only(self) -> Self {
        Self { fuzzy: false, ..self }
    }
}

#[derive(Debug, Default)]
pub struct ColumnResolution {
    pub columns: Vec<(&'static str, usize)>,
    pub warnings: Vec<String>,
}

impl ColumnResolution {
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.columns.iter().find(|(k, _)| *k == key).map(|(_, i)| *i)
    }
}

// En dessous, une correspondance partielle ("id", "st") n'a pas de sens
const MIN_PARTIAL_LEN: usize = 3;

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .collect()
}

/// Résout chaque champ vers une colonne, en trois passes déterministes :
///   1. nom exact (minuscules, trim)
///   2. nom sans espaces / tirets / underscores
///   3. correspondance partielle dans les deux sens, sur les colonnes pas encore prises,
///      le plus long recouvrement gagne, puis la colonne la plus à gauche
///
/// Chaque colonne ne sert qu'à un seul champ. Plusieurs candidats en passe 3 = warning.
pub fn resolve_columns(headers: &[String], specs: &[FieldSpec]) -> Result<ColumnResolution, ImportError> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let compacted: Vec<String> = normalized.iter().map(|h| compact(h)).collect();

    // les en-têtes vides ne sont jamais candidats
    let mut claimed: Vec<bool> = normalized.iter().map(|h| h.is_empty()).collect();
    let mut resolved: Vec<Option<usize>> = vec![None; specs.len()];
    let mut warnings = Vec::new();

    // 1. exact
    for (s, spec) in specs.iter().enumerate() {
        let found = spec.aliases.iter().find_map(|alias| {
            (0..normalized.len()).find(|&i| !claimed[i] && normalized[i] == *alias)
        });
        if let Some(i) = found {
            claimed[i] = true;
            resolved[s] = Some(i);
        }
    }

    // 2. compact
    for (s, spec) in specs.iter().enumerate() {
        if resolved[s].is_some() {
            continue;
        }
        let found = spec.aliases.iter().find_map(|alias| {
            let alias = compact(alias);
            (0..compacted.len()).find(|&i| !claimed[i] && compacted[i] == alias)
        });
        if let Some(i) = found {
            claimed[i] = true;
            resolved[s] = Some(i);
        }
    }

    // 3. partiel
    for (s, spec) in specs.iter().enumerate() {
        if resolved[s].is_some() || !spec.fuzzy {
            continue;
        }

        let candidates: Vec<(usize, usize)> = (0..compacted.len())
            .filter(|&i| !claimed[i])
            .filter_map(|i| partial_score(&compacted[i], spec.aliases).map(|score| (i, score)))
            .collect();

        // plus long recouvrement, puis colonne la plus à gauche
        let best = candidates
            .iter()
            .copied()
            .max_by(|(ia, sa), (ib, sb)| sa.cmp(sb).then(ib.cmp(ia)));

        if let Some((i, _)) = best {
            if candidates.len() > 1 {
                let others: Vec<String> = candidates
                    .iter()
                    .filter(|(j, _)| *j != i)
                    .map(|(j, _)| format!("'{}'", headers[*j].trim()))
                    .collect();
                warnings.push(format!(
                    "Column '{}' was matched to field '{}' by partial name; other candidates: {}",
                    headers[i].trim(),
                    spec.key,
                    others.join(", ")
                ));
            }
            claimed[i] = true;
            resolved[s] = Some(i);
        }
    }

    let missing: Vec<String> = specs
        .iter()
        .zip(&resolved)
        .filter(|(spec, index)| spec.required && index.is_none())
        .map(|(spec, _)| spec.key.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ImportError::MissingColumns {
            missing,
            found: normalized.into_iter().filter(|h| !h.is_empty()).collect(),
        });
    }

    let columns = specs
        .iter()
        .zip(resolved)
        .filter_map(|(spec, index)| index.map(|i| (spec.key, i)))
        .collect();

    Ok(ColumnResolution { columns, warnings })
}

fn partial_score(header: &str, aliases: &[&str]) -> Option<usize> {
    aliases
        .iter()
        .map(|alias| compact(alias))
        .filter_map(|alias| {
            let overlap = alias.len().min(header.len());
            let matches = header.contains(alias.as_str()) || alias.contains(header);
            (matches && overlap >= MIN_PARTIAL_LEN).then_some(overlap)
        })
        .max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    const EMAIL: FieldSpec = FieldSpec::required("email", &["email", "e-mail", "emailaddress"]);
    const PHONE: FieldSpec = FieldSpec::optional("phone", &["phone", "phonenumber", "phone number", "telephone"]);
    const PHONE2: FieldSpec = FieldSpec::optional("phone2", &["phone2", "phone 2", "second phone", "secondphone"]);

    #[test]
    fn test_e_mail_header_resolves_to_email() {
        let resolution = resolve_columns(&headers(&["Name", "E-Mail"]), &[EMAIL]).unwrap();
        assert_eq!(resolution.index_of("email"), Some(1));
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_compact_match() {
        let resolution = resolve_columns(&headers(&["Email_Address"]), &[EMAIL]).unwrap();
        assert_eq!(resolution.index_of("email"), Some(0));
    }

    #[test]
    fn test_exact_match_wins_over_earlier_partial_match() {
        let resolution = resolve_columns(&headers(&["Primary Email", "email"]), &[EMAIL]).unwrap();
        assert_eq!(resolution.index_of("email"), Some(1));
    }

    #[test]
    fn test_claimed_columns_are_not_reused() {
        let resolution = resolve_columns(&headers(&["Phone 2", "Phone"]), &[PHONE, PHONE2]).unwrap();
        assert_eq!(resolution.index_of("phone"), Some(1));
        assert_eq!(resolution.index_of("phone2"), Some(0));

        // "Phone 2" est pris par phone2, phone ne doit pas se rabattre dessus
        let resolution = resolve_columns(&headers(&["Phone 2"]), &[PHONE, PHONE2]).unwrap();
        assert_eq!(resolution.index_of("phone"), None);
        assert_eq!(resolution.index_of("phone2"), Some(0));
    }

    #[test]
    fn test_partial_match_prefers_longest_overlap() {
        let resolution = resolve_columns(&headers(&["Cell Phone", "Home Phone Number"]), &[PHONE]).unwrap();
        assert_eq!(resolution.index_of("phone"), Some(1));
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.warnings[0].contains("'Cell Phone'"));
    }

    #[test]
    fn test_partial_tie_goes_to_leftmost_column() {
        let resolution = resolve_columns(&headers(&["Work Phone", "Cell Phone"]), &[PHONE]).unwrap();
        assert_eq!(resolution.index_of("phone"), Some(0));
        assert_eq!(resolution.warnings.len(), 1);
    }

    #[test]
    fn test_exact_only_fields_skip_partial_match() {
        let resolution = resolve_columns(&headers(&["Cell Phone"]), &[PHONE.exact_only()]).unwrap();
        assert_eq!(resolution.index_of("phone"), None);
    }

    #[test]
    fn test_short_headers_are_not_partial_candidates() {
        let resolution = resolve_columns(&headers(&["", "ph"]), &[PHONE]).unwrap();
        assert_eq!(resolution.index_of("phone"), None);
    }
}
