use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::db::JournalStore;
use crate::error::{AppError, AppResult};
use crate::models::entry::{
    EntryRecord, EntryRow, ExerciseLog, NewEntry, NewTag, Response, Tag,
};
use crate::models::template::{Template, TemplateDefinition, TemplateRow};
use crate::models::user::User;
use crate::services::tags::DEFAULT_TAG_COLOR;

const TEMPLATE_COLUMNS: &str = "id, user_id, name, description, questions";

#[derive(Debug, FromRow)]
struct EntryTagRow {
    entry_id: Uuid,
    #[sqlx(flatten)]
    tag: Tag,
}

const UNIQUE_VIOLATION: &str = "23505";

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

#[derive(Clone)]
pub struct PgJournalStore {
    pool: PgPool,
}

impl PgJournalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach responses and tags to a page of entry rows, keeping row order.
    async fn load_records(&self, rows: Vec<EntryRow>) -> AppResult<Vec<EntryRecord>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let responses = sqlx::query_as::<_, Response>(
            "SELECT * FROM responses WHERE entry_id = ANY($1) ORDER BY position ASC",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let tag_rows = sqlx::query_as::<_, EntryTagRow>(
            r#"
            SELECT et.entry_id, t.*
            FROM entry_tags et
            JOIN tags t ON t.id = et.tag_id
            WHERE et.entry_id = ANY($1)
            ORDER BY lower(t.name) ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut responses_by_entry: HashMap<Uuid, Vec<Response>> = HashMap::new();
        for response in responses {
            responses_by_entry
                .entry(response.entry_id)
                .or_default()
                .push(response);
        }
        let mut tags_by_entry: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags_by_entry.entry(row.entry_id).or_default().push(row.tag);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id;
                EntryRecord {
                    entry: row.into(),
                    responses: responses_by_entry.remove(&id).unwrap_or_default(),
                    tags: tags_by_entry.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }
}

async fn find_or_create_tag_on(
    conn: &mut PgConnection,
    user_id: Uuid,
    tag: &NewTag,
) -> Result<Tag, sqlx::Error> {
    let inserted = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (id, user_id, name, color)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, lower(name)) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(tag.name.trim())
    .bind(tag.color.as_deref().unwrap_or(DEFAULT_TAG_COLOR))
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(tag) = inserted {
        return Ok(tag);
    }

    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE user_id = $1 AND lower(name) = lower($2)")
        .bind(user_id)
        .bind(tag.name.trim())
        .fetch_one(&mut *conn)
        .await
}

async fn upsert_exercise_on(
    conn: &mut PgConnection,
    user_id: Uuid,
    date: NaiveDate,
    has_exercised: bool,
) -> Result<ExerciseLog, sqlx::Error> {
    sqlx::query_as::<_, ExerciseLog>(
        r#"
        INSERT INTO exercise_logs (id, user_id, log_date, has_exercised)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, log_date) DO UPDATE SET
            has_exercised = EXCLUDED.has_exercised,
            updated_at = NOW()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(date)
    .bind(has_exercised)
    .fetch_one(&mut *conn)
    .await
}

#[async_trait]
impl JournalStore for PgJournalStore {
    async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn create_user(
        &self,
        email: &str,
        password_hash: &str,
        name: &str,
        timezone: &str,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name, timezone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .bind(timezone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Email already registered".into())
            } else {
                AppError::Database(e)
            }
        })?;
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        id: Uuid,
        name: Option<&str>,
        timezone: Option<&str>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                timezone = COALESCE($3, timezone),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(timezone)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    async fn list_templates(&self, user_id: Uuid) -> AppResult<Vec<Template>> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            SELECT {} FROM templates
            WHERE user_id IS NULL OR user_id = $1
            ORDER BY (user_id IS NOT NULL) ASC, id ASC
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn find_template(&self, id: i64) -> AppResult<Option<Template>> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {} FROM templates WHERE id = $1",
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Template::from))
    }

    async fn insert_template(
        &self,
        user_id: Uuid,
        definition: &TemplateDefinition,
    ) -> AppResult<Template> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            INSERT INTO templates (user_id, name, description, questions)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(user_id)
        .bind(definition.name.trim())
        .bind(&definition.description)
        .bind(Json(&definition.questions))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_template(
        &self,
        id: i64,
        definition: &TemplateDefinition,
    ) -> AppResult<Template> {
        sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            UPDATE templates SET
                name = $2,
                description = $3,
                questions = $4,
                updated_at = NOW()
            WHERE id = $1 AND user_id IS NOT NULL
            RETURNING {}
            "#,
            TEMPLATE_COLUMNS
        ))
        .bind(id)
        .bind(definition.name.trim())
        .bind(&definition.description)
        .bind(Json(&definition.questions))
        .fetch_optional(&self.pool)
        .await?
        .map(Template::from)
        .ok_or_else(|| AppError::NotFound("Template not found".into()))
    }

    async fn delete_template(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1 AND user_id IS NOT NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn referenced_question_ids(&self, template_id: i64) -> AppResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT r.question_id
            FROM responses r
            JOIN entries e ON e.id = r.entry_id
            WHERE e.template_id = $1
            "#,
        )
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn latest_entry_at(&self, user_id: Uuid) -> AppResult<Option<DateTime<Utc>>> {
        let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(created_at) FROM entries WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(latest)
    }

    async fn exercise_status(&self, user_id: Uuid, date: NaiveDate) -> AppResult<Option<bool>> {
        let status = sqlx::query_scalar::<_, bool>(
            "SELECT has_exercised FROM exercise_logs WHERE user_id = $1 AND log_date = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(status)
    }

    async fn upsert_exercise_log(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        has_exercised: bool,
    ) -> AppResult<ExerciseLog> {
        let mut conn = self.pool.acquire().await?;
        let log = upsert_exercise_on(&mut conn, user_id, date, has_exercised).await?;
        Ok(log)
    }

    async fn has_answer_between(
        &self,
        user_id: Uuid,
        question_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM responses r
                JOIN entries e ON e.id = r.entry_id
                WHERE e.user_id = $1
                  AND r.question_id = $2
                  AND btrim(r.answer) <> ''
                  AND e.created_at >= $3
                  AND e.created_at < $4
            )
            "#,
        )
        .bind(user_id)
        .bind(question_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_entry(&self, new: NewEntry) -> AppResult<EntryRecord> {
        // Dropping `tx` on any early return rolls the whole submission back.
        let mut tx = self.pool.begin().await?;

        let mut tag_ids = new.tag_ids.clone();
        tag_ids.sort();
        tag_ids.dedup();
        let mut tags = if tag_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = ANY($1)")
                .bind(&tag_ids)
                .fetch_all(&mut *tx)
                .await?
        };
        if tags.len() != tag_ids.len() || tags.iter().any(|t| t.user_id != new.user_id) {
            return Err(AppError::Forbidden);
        }

        let location = new.location.clone().unwrap_or_default();
        let weather = new.weather.clone().unwrap_or_default();
        let entry_row = sqlx::query_as::<_, EntryRow>(
            r#"
            INSERT INTO entries (
                id, user_id, entry_type, content, template_id,
                location_city, location_state, latitude, longitude,
                weather_temperature, weather_condition, weather_humidity,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.user_id)
        .bind(new.entry_type)
        .bind(&new.content)
        .bind(new.template_id)
        .bind(&location.city)
        .bind(&location.state)
        .bind(location.latitude)
        .bind(location.longitude)
        .bind(weather.temperature)
        .bind(&weather.condition)
        .bind(weather.humidity)
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await?;
        let entry_id = entry_row.id;

        let mut responses = Vec::with_capacity(new.responses.len());
        for r in &new.responses {
            let response = sqlx::query_as::<_, Response>(
                r#"
                INSERT INTO responses (id, entry_id, question_id, question_text, question_type, answer, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(entry_id)
            .bind(&r.question_id)
            .bind(&r.question_text)
            .bind(r.question_type)
            .bind(&r.answer)
            .bind(r.position)
            .fetch_one(&mut *tx)
            .await?;
            responses.push(response);
        }

        for new_tag in &new.new_tags {
            let tag = find_or_create_tag_on(&mut tx, new.user_id, new_tag).await?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }

        for tag in &tags {
            sqlx::query(
                "INSERT INTO entry_tags (entry_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(entry_id)
            .bind(tag.id)
            .execute(&mut *tx)
            .await?;
        }

        if let Some((date, has_exercised)) = new.exercise {
            upsert_exercise_on(&mut tx, new.user_id, date, has_exercised).await?;
        }

        tx.commit().await?;

        Ok(EntryRecord {
            entry: entry_row.into(),
            responses,
            tags,
        })
    }

    async fn find_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<Option<EntryRecord>> {
        let row = sqlx::query_as::<_, EntryRow>(
            "SELECT * FROM entries WHERE id = $1 AND user_id = $2",
        )
        .bind(entry_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.load_records(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_entries(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<EntryRecord>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT * FROM entries
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        self.load_records(rows).await
    }

    async fn delete_entry(&self, user_id: Uuid, entry_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tags(&self, user_id: Uuid) -> AppResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT * FROM tags WHERE user_id = $1 ORDER BY lower(name) ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn find_tag(&self, tag_id: Uuid) -> AppResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id = $1")
            .bind(tag_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn find_or_create_tag(&self, user_id: Uuid, tag: &NewTag) -> AppResult<Tag> {
        let mut conn = self.pool.acquire().await?;
        let tag = find_or_create_tag_on(&mut conn, user_id, tag).await?;
        Ok(tag)
    }

    async fn delete_tag(&self, tag_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
