//! Built-in symptom catalog and user-defined symptoms

use crate::error::{Error, Result};
use crate::models::CustomSymptom;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// Maximum custom symptom name length
pub const MAX_SYMPTOM_NAME_LENGTH: usize = 40;

/// Maximum custom symptom short-name length
pub const MAX_SYMPTOM_SHORT_NAME_LENGTH: usize = 16;

/// Id prefix for user-defined symptoms
pub const CUSTOM_SYMPTOM_PREFIX: &str = "custom-";

/// Symptom grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SymptomCategory {
    /// Mental health
    MentalHealth,
    /// Neurological
    Neurological,
    /// Musculoskeletal
    Musculoskeletal,
    /// Respiratory
    Respiratory,
    /// Gastrointestinal
    Gastrointestinal,
    /// Everything else, including custom symptoms
    General,
}

impl SymptomCategory {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SymptomCategory::MentalHealth => "Mental Health",
            SymptomCategory::Neurological => "Neurological",
            SymptomCategory::Musculoskeletal => "Musculoskeletal",
            SymptomCategory::Respiratory => "Respiratory",
            SymptomCategory::Gastrointestinal => "Gastrointestinal",
            SymptomCategory::General => "General",
        }
    }
}

/// Symptom a log can refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symptom {
    /// Stable id stored in logs
    pub id: String,
    /// Display name
    pub name: String,
    /// Short label for buttons
    pub short_name: String,
    /// Emoji icon
    pub icon: String,
    /// Hex color
    pub color: String,
    /// Category
    pub category: SymptomCategory,
}

impl From<&CustomSymptom> for Symptom {
    fn from(custom: &CustomSymptom) -> Self {
        Self {
            id: custom.id.clone(),
            name: custom.name.clone(),
            short_name: custom.short_name.clone(),
            icon: custom.icon.clone(),
            color: custom.color.clone(),
            category: SymptomCategory::General,
        }
    }
}

type CatalogRow = (
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    &'static str,
    SymptomCategory,
);

const CATALOG: [CatalogRow; 16] = [
    ("ptsd", "PTSD Episode", "PTSD", "🧠", "#5B4FCF", SymptomCategory::MentalHealth),
    ("migraine", "Migraine", "Migraine", "⚡", "#CF4F4F", SymptomCategory::Neurological),
    ("hip-pain", "Hip Pain", "Hip Pain", "🦴", "#CF8F4F", SymptomCategory::Musculoskeletal),
    ("sinus", "Sinus Infection", "Sinus", "🤧", "#4FA0CF", SymptomCategory::Respiratory),
    ("back-pain", "Back Pain", "Back", "💪", "#8B6F47", SymptomCategory::Musculoskeletal),
    ("knee-pain", "Knee Pain", "Knee", "🦵", "#A0522D", SymptomCategory::Musculoskeletal),
    ("tinnitus", "Tinnitus", "Tinnitus", "👂", "#708090", SymptomCategory::Neurological),
    ("anxiety", "Anxiety", "Anxiety", "😰", "#6A5ACD", SymptomCategory::MentalHealth),
    ("depression", "Depression", "Depression", "🌧️", "#4169E1", SymptomCategory::MentalHealth),
    ("insomnia", "Insomnia", "Insomnia", "🌙", "#2F4F4F", SymptomCategory::MentalHealth),
    ("gi-issues", "GI Issues", "Stomach", "🫃", "#6B8E23", SymptomCategory::Gastrointestinal),
    ("shoulder", "Shoulder Pain", "Shoulder", "🤷", "#B8860B", SymptomCategory::Musculoskeletal),
    ("neck-pain", "Neck Pain", "Neck", "🔝", "#CD853F", SymptomCategory::Musculoskeletal),
    ("fatigue", "Fatigue", "Fatigue", "😴", "#696969", SymptomCategory::General),
    ("dizziness", "Dizziness", "Dizzy", "💫", "#9370DB", SymptomCategory::Neurological),
    ("headache", "Headache", "Headache", "🤕", "#DC143C", SymptomCategory::Neurological),
];

fn from_row(row: &CatalogRow) -> Symptom {
    let (id, name, short_name, icon, color, category) = *row;
    Symptom {
        id: id.to_string(),
        name: name.to_string(),
        short_name: short_name.to_string(),
        icon: icon.to_string(),
        color: color.to_string(),
        category,
    }
}

/// Built-in symptoms in display order
pub fn catalog() -> Vec<Symptom> {
    CATALOG.iter().map(from_row).collect()
}

/// Look up a built-in symptom
pub fn symptom_by_id(id: &str) -> Option<Symptom> {
    CATALOG.iter().find(|row| row.0 == id).map(from_row)
}

/// Look up a symptom in the catalog, then among `customs`
pub fn find_symptom(id: &str, customs: &[CustomSymptom]) -> Option<Symptom> {
    symptom_by_id(id).or_else(|| customs.iter().find(|c| c.id == id).map(Symptom::from))
}

/// Custom symptom storage
pub struct CustomSymptomStorage;

impl CustomSymptomStorage {
    /// Insert a new custom symptom; the id is assigned here.
    pub fn add(
        conn: &Connection,
        name: &str,
        short_name: &str,
        icon: &str,
        color: &str,
    ) -> Result<CustomSymptom> {
        let name = name.trim();
        let short_name = short_name.trim();
        if name.is_empty() || short_name.is_empty() {
            return Err(Error::Validation("Symptom name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_SYMPTOM_NAME_LENGTH {
            return Err(Error::Validation(format!(
                "Symptom name too long (max {})",
                MAX_SYMPTOM_NAME_LENGTH
            )));
        }
        if short_name.chars().count() > MAX_SYMPTOM_SHORT_NAME_LENGTH {
            return Err(Error::Validation(format!(
                "Short name too long (max {})",
                MAX_SYMPTOM_SHORT_NAME_LENGTH
            )));
        }
        if !is_hex_color(color) {
            return Err(Error::Validation(format!("Invalid color: {}", color)));
        }

        let symptom = CustomSymptom {
            id: format!("{}{}", CUSTOM_SYMPTOM_PREFIX, uuid::Uuid::new_v4()),
            name: name.to_string(),
            short_name: short_name.to_string(),
            icon: icon.to_string(),
            color: color.to_string(),
        };

        conn.execute(
            r#"
            INSERT INTO custom_symptoms (id, name, short_name, icon, color, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                symptom.id,
                symptom.name,
                symptom.short_name,
                symptom.icon,
                symptom.color,
                chrono::Utc::now().timestamp_millis(),
            ],
        )?;

        tracing::info!("Added custom symptom {}", symptom.id);
        Ok(symptom)
    }

    /// All custom symptoms, oldest first
    pub fn list(conn: &Connection) -> Result<Vec<CustomSymptom>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, short_name, icon, color FROM custom_symptoms ORDER BY created_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CustomSymptom {
                id: row.get(0)?,
                name: row.get(1)?,
                short_name: row.get(2)?,
                icon: row.get(3)?,
                color: row.get(4)?,
            })
        })?;

        let mut symptoms = Vec::new();
        for row in rows {
            symptoms.push(row?);
        }
        Ok(symptoms)
    }

    /// Delete a custom symptom. Existing logs keep its id.
    pub fn remove(conn: &Connection, id: &str) -> Result<()> {
        let rows = conn.execute("DELETE FROM custom_symptoms WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("Custom symptom {}", id)));
        }
        Ok(())
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_ACTIVE_SYMPTOM_IDS;
    use crate::Database;

    #[test]
    fn test_catalog_has_sixteen_unique_entries() {
        let all = catalog();
        assert_eq!(all.len(), 16);
        let mut ids: Vec<_> = all.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 16);
    }

    #[test]
    fn test_defaults_are_in_catalog() {
        for id in DEFAULT_ACTIVE_SYMPTOM_IDS {
            assert!(symptom_by_id(id).is_some(), "{} missing", id);
        }
    }

    #[test]
    fn test_symptom_by_id() {
        let ptsd = symptom_by_id("ptsd").unwrap();
        assert_eq!(ptsd.name, "PTSD Episode");
        assert_eq!(ptsd.category, SymptomCategory::MentalHealth);
        assert!(symptom_by_id("nonexistent").is_none());
    }

    #[test]
    fn test_find_symptom_falls_back_to_customs() {
        let customs = vec![CustomSymptom {
            id: "custom-1".to_string(),
            name: "Custom Ache".to_string(),
            short_name: "Custom".to_string(),
            icon: "🩹".to_string(),
            color: "#FF0000".to_string(),
        }];
        assert_eq!(find_symptom("migraine", &[]).unwrap().name, "Migraine");

        let custom = find_symptom("custom-1", &customs).unwrap();
        assert_eq!(custom.name, "Custom Ache");
        assert_eq!(custom.category, SymptomCategory::General);

        assert!(find_symptom("nonexistent", &customs).is_none());
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&SymptomCategory::MentalHealth).unwrap();
        assert_eq!(json, "\"mental-health\"");
    }

    #[test]
    fn test_custom_symptom_crud() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();

        let added = CustomSymptomStorage::add(conn, "Jaw Pain", "Jaw", "🦷", "#AA3300").unwrap();
        assert!(added.id.starts_with(CUSTOM_SYMPTOM_PREFIX));

        let list = CustomSymptomStorage::list(conn).unwrap();
        assert_eq!(list, vec![added.clone()]);

        CustomSymptomStorage::remove(conn, &added.id).unwrap();
        assert!(CustomSymptomStorage::list(conn).unwrap().is_empty());
        assert!(matches!(
            CustomSymptomStorage::remove(conn, &added.id),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_custom_symptom_validation() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn();
        assert!(CustomSymptomStorage::add(conn, "  ", "X", "x", "#000000").is_err());
        assert!(CustomSymptomStorage::add(conn, "Ok", "Ok", "x", "red").is_err());
        let long = "a".repeat(MAX_SYMPTOM_NAME_LENGTH + 1);
        assert!(CustomSymptomStorage::add(conn, &long, "Ok", "x", "#000000").is_err());
    }
}
