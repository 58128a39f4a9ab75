use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

/// A note row. Serializes in the camelCase shape the client consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[sqlx(rename = "userId")]
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub color: String,
    pub time: i64,
}

pub fn new_note_id() -> String {
    format!("note_{}", Uuid::new_v4())
}

/// Milliseconds since epoch; `time` records the last-touched instant.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

impl Note {
    pub async fn create(
        db: &SqlitePool,
        owner_id: &str,
        title: &str,
        content: &str,
        color: &str,
    ) -> anyhow::Result<Note> {
        let note = Note {
            id: new_note_id(),
            user_id: owner_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            color: color.to_string(),
            time: now_millis(),
        };
        sqlx::query(
            r#"
            INSERT INTO notes (id, userId, title, content, color, time)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&note.id)
        .bind(&note.user_id)
        .bind(&note.title)
        .bind(&note.content)
        .bind(&note.color)
        .bind(note.time)
        .execute(db)
        .await?;
        Ok(note)
    }

    /// Update carrying the ownership predicate in the statement itself.
    /// `None` when the note is missing or owned by someone else; the two are
    /// indistinguishable on purpose.
    pub async fn update_owned(
        db: &SqlitePool,
        id: &str,
        owner_id: &str,
        title: &str,
        content: &str,
        color: &str,
    ) -> anyhow::Result<Option<Note>> {
        let note = sqlx::query_as::<_, Note>(
            r#"
            UPDATE notes
            SET title = ?, content = ?, color = ?, time = ?
            WHERE id = ? AND userId = ?
            RETURNING id, userId, title, content, color, time
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(color)
        .bind(now_millis())
        .bind(id)
        .bind(owner_id)
        .fetch_optional(db)
        .await?;
        Ok(note)
    }

    /// Ownership-predicated delete; `false` when nothing was removed.
    pub async fn delete_owned(db: &SqlitePool, id: &str, owner_id: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND userId = ?")
            .bind(id)
            .bind(owner_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// All of the owner's notes, most recently touched first.
    pub async fn list_for_owner(db: &SqlitePool, owner_id: &str) -> anyhow::Result<Vec<Note>> {
        let rows = sqlx::query_as::<_, Note>(
            r#"
            SELECT id, userId, title, content, color, time
            FROM notes
            WHERE userId = ?
            ORDER BY time DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
