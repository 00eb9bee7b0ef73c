use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use lessonforge_core::CurriculumMetadata;

/// One persisted lesson-plan record: the extracted metadata plus the
/// generated (and possibly later edited) plan text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRecord {
    pub id: String,
    pub grade: String,
    pub topic: String,
    pub metadata: CurriculumMetadata,
    pub lesson_plan: Option<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        store.init()?;
        Ok(store)
    }

    // One short-lived connection per operation, never pooled.
    fn connection(&self) -> Result<Connection> {
        Connection::open(&self.path).context("record store unreachable")
    }

    fn init(&self) -> Result<()> {
        let conn = self.connection()?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            CREATE TABLE IF NOT EXISTS plans (
                id TEXT PRIMARY KEY,
                grade TEXT NOT NULL,
                topic TEXT NOT NULL,
                metadata TEXT NOT NULL,
                lesson_plan TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    pub fn insert(
        &self,
        grade: &str,
        topic: &str,
        metadata: &CurriculumMetadata,
    ) -> Result<String> {
        let id = generate_record_id();
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO plans (id, grade, topic, metadata, lesson_plan, created_at) VALUES (?1, ?2, ?3, ?4, NULL, ?5)",
            params![
                id,
                grade,
                topic,
                serde_json::to_string(metadata)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        info!(record_id = %id, "inserted plan record");
        Ok(id)
    }

    /// Overwrites the stored plan text. A missing id is a logged no-op; the
    /// modified count is returned so callers can distinguish it.
    pub fn update_plan(&self, id: &str, lesson_plan: &str) -> Result<usize> {
        let conn = self.connection()?;
        let modified = conn.execute(
            "UPDATE plans SET lesson_plan = ?2 WHERE id = ?1",
            params![id, lesson_plan],
        )?;
        if modified == 0 {
            warn!(record_id = %id, "no plan record found to update");
        }
        Ok(modified)
    }

    pub fn fetch(&self, id: &str) -> Result<Option<PlanRecord>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, grade, topic, metadata, lesson_plan, created_at FROM plans WHERE id = ?1",
        )?;
        let row = stmt
            .query_row([id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .optional()?;
        match row {
            Some((id, grade, topic, metadata_json, lesson_plan, created_at)) => {
                let metadata: CurriculumMetadata = serde_json::from_str(&metadata_json)?;
                Ok(Some(PlanRecord {
                    id,
                    grade,
                    topic,
                    metadata,
                    lesson_plan,
                    created_at,
                }))
            }
            None => Ok(None),
        }
    }
}

fn generate_record_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_metadata() -> CurriculumMetadata {
        serde_json::from_value(json!({
            "title": "Fractions Unit",
            "duration": "2 days",
            "learningObjectives": ["Compare fractions"],
            "keyConcepts": ["Numerator"],
            "standards": [],
            "assessments": [],
            "materials": [],
            "tools": []
        }))
        .unwrap()
    }

    #[test]
    fn insert_then_fetch_roundtrips() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("plans.sqlite")).unwrap();
        let id = store.insert("Grade 5", "Fractions", &sample_metadata()).unwrap();
        let record = store.fetch(&id).unwrap().expect("record");
        assert_eq!(record.grade, "Grade 5");
        assert_eq!(record.metadata.title, "Fractions Unit");
        assert!(record.lesson_plan.is_none());
    }

    #[test]
    fn update_overwrites_plan_text() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("plans.sqlite")).unwrap();
        let id = store.insert("Grade 5", "Fractions", &sample_metadata()).unwrap();
        assert_eq!(store.update_plan(&id, "Day 1 outline").unwrap(), 1);
        let record = store.fetch(&id).unwrap().unwrap();
        assert_eq!(record.lesson_plan.as_deref(), Some("Day 1 outline"));
    }

    #[test]
    fn update_of_missing_id_is_a_no_op_not_an_error() {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(dir.path().join("plans.sqlite")).unwrap();
        assert_eq!(store.update_plan("does-not-exist", "text").unwrap(), 0);
    }

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(generate_record_id(), generate_record_id());
    }
}
