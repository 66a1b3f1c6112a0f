use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::models::{divisions, user_divisions};

pub const STORAGE: &str = "Storage";
pub const CONTRACTING: &str = "Contracting";
pub const REAL_ESTATE: &str = "Real Estate";

const DEFAULT_DIVISIONS: [(&str, &str); 3] = [
    (STORAGE, "Storage unit rentals"),
    (CONTRACTING, "Contracting and construction services"),
    (REAL_ESTATE, "Real estate and property management"),
];

/// Résultat du parsing d'une cellule "division" (ex: "Storage; Real Estate")
#[derive(Debug, Default, PartialEq)]
pub struct ParsedDivisions {
    pub names: Vec<&'static str>,
    pub unknown: Vec<String>,
}

pub struct DivisionService;

impl DivisionService {
    /// Crée les divisions par défaut manquantes, retourne nom en minuscules → division
    pub async fn ensure_default_divisions<C: ConnectionTrait>(
        db: &C,
    ) -> Result<HashMap<String, divisions::Model>, DbErr> {
        let mut by_name: HashMap<String, divisions::Model> = divisions::Entity::find()
            .all(db)
            .await?
            .into_iter()
            .map(|d| (d.name.to_lowercase(), d))
            .collect();

        for (name, description) in DEFAULT_DIVISIONS {
            if by_name.contains_key(&name.to_lowercase()) {
                continue;
            }
            let created = divisions::ActiveModel {
                name: Set(name.to_string()),
                description: Set(Some(description.to_string())),
                is_active: Set(true),
                ..Default::default()
            }
            .insert(db)
            .await?;
            info!("🏷️  Division created: {}", name);
            by_name.insert(name.to_lowercase(), created);
        }

        Ok(by_name)
    }

    /// Rattache le user à la division si ce n'est pas déjà fait
    pub async fn assign<C: ConnectionTrait>(db: &C, user_id: i32, division_id: i32) -> Result<bool, DbErr> {
        let existing = user_divisions::Entity::find()
            .filter(user_divisions::Column::UserId.eq(user_id))
            .filter(user_divisions::Column::DivisionId.eq(division_id))
            .one(db)
            .await?;

        if existing.is_some() {
            return Ok(false);
        }

        user_divisions::ActiveModel {
            user_id: Set(user_id),
            division_id: Set(division_id),
            contracted_at: Set(Utc::now()),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(true)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FilterOperator {
    And,
    #[default]
    Or,
}

impl FilterOperator {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "AND" => Some(FilterOperator::And),
            "OR" => Some(FilterOperator::Or),
            _ => None,
        }
    }
}

/// Filtre de la liste admin : aucune division sélectionnée = pas de filtre
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DivisionFilter {
    pub division_ids: Vec<i32>,
    pub operator: FilterOperator,
}

impl DivisionFilter {
    /// "1,3" + "AND" ; None si un id ou l'opérateur est invalide
    pub fn parse(ids: Option<&str>, operator: Option<&str>) -> Option<Self> {
        let operator = match operator.map(str::trim).filter(|o| !o.is_empty()) {
            Some(raw) => FilterOperator::parse(raw)?,
            None => FilterOperator::default(),
        };

        let mut division_ids = Vec::new();
        for token in ids.unwrap_or_default().split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let id = token.parse::<i32>().ok()?;
            if !division_ids.contains(&id) {
                division_ids.push(id);
            }
        }

        Some(DivisionFilter { division_ids, operator })
    }

    /// `active` = divisions actives du user
    pub fn matches(&self, active: &HashSet<i32>) -> bool {
        if self.division_ids.is_empty() {
            return true;
        }
        match self.operator {
            FilterOperator::And => self.division_ids.iter().all(|id| active.contains(id)),
            FilterOperator::Or => self.division_ids.iter().any(|id| active.contains(id)),
        }
    }
}

/// Découpe sur `, ; | /` et associe chaque morceau à une division connue
pub fn parse_division_list(text: &str) -> ParsedDivisions {
    let mut parsed = ParsedDivisions::default();

    for token in text.split([',', ';', '|', '/']) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match match_division(token) {
            Some(name) => {
                if !parsed.names.contains(&name) {
                    parsed.names.push(name);
                }
            }
            None => parsed.unknown.push(token.to_string()),
        }
    }

    parsed
}

fn match_division(token: &str) -> Option<&'static str> {
    let lower = token.to_lowercase();

    // nom exact d'abord
    if let Some((name, _)) = DEFAULT_DIVISIONS.iter().find(|(name, _)| name.to_lowercase() == lower) {
        return Some(*name);
    }

    // variations courantes
    if lower.contains("storage") {
        Some(STORAGE)
    } else if lower.contains("contract") || lower.contains("construction") {
        Some(CONTRACTING)
    } else if lower.contains("real") || lower.contains("estate") || lower.contains("property") {
        Some(REAL_ESTATE)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn test_parse_division_list() {
        let parsed = parse_division_list("Storage; real estate | Construction / Plumbing");
        assert_eq!(parsed.names, vec![STORAGE, REAL_ESTATE, CONTRACTING]);
        assert_eq!(parsed.unknown, vec!["Plumbing".to_string()]);
    }

    #[test]
    fn test_parse_division_list_deduplicates() {
        let parsed = parse_division_list("storage units, Storage,,");
        assert_eq!(parsed.names, vec![STORAGE]);
        assert!(parsed.unknown.is_empty());
    }

    #[test]
    fn test_division_filter() {
        let filter = DivisionFilter::parse(Some("1, 3,1"), Some("and")).unwrap();
        assert_eq!(filter.division_ids, vec![1, 3]);
        assert_eq!(filter.operator, FilterOperator::And);

        let both: HashSet<i32> = [1, 3].into_iter().collect();
        let one: HashSet<i32> = [3].into_iter().collect();
        assert!(filter.matches(&both));
        assert!(!filter.matches(&one));

        let any = DivisionFilter::parse(Some("1,3"), None).unwrap();
        assert!(any.matches(&one));
        assert!(!any.matches(&HashSet::new()));

        assert!(DivisionFilter::default().matches(&HashSet::new()));
        assert!(DivisionFilter::parse(Some("1,x"), None).is_none());
        assert!(DivisionFilter::parse(None, Some("XOR")).is_none());
    }

    #[tokio::test]
    async fn test_ensure_default_divisions_is_idempotent() {
        let db = test_connection().await;
        let first = DivisionService::ensure_default_divisions(&db).await.unwrap();
        let second = DivisionService::ensure_default_divisions(&db).await.unwrap();

        assert_eq!(first.len(), 3);
        assert_eq!(first["storage"].id, second["storage"].id);
        assert!(second.contains_key("real estate"));
    }
}
