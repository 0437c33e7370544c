use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use thiserror::Error;
use tokio::sync::Mutex;
use tourney_core::{StoredTournament, TournamentRecord};
use tracing::info;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Persistence keyed by `source_link`: first sight inserts, later sights overwrite.
#[async_trait]
pub trait TournamentStore: Send + Sync {
    async fn upsert_by_identity(
        &self,
        record: &TournamentRecord,
    ) -> Result<StoredTournament, PersistenceError>;

    /// Ordered by start date, then end date (nulls last), then name.
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<StoredTournament>, PersistenceError>;
}

const RECORD_COLUMNS: [&str; 30] = [
    "name",
    "grade",
    "category",
    "gender",
    "surface",
    "year",
    "start_date",
    "end_date",
    "qualifying_start",
    "qualifying_end",
    "entry_deadline",
    "withdrawal_deadline",
    "sign_in_main",
    "sign_in_qualifying",
    "first_qualifying_day",
    "first_main_day",
    "city",
    "country_code",
    "country",
    "venue_name",
    "venue_address",
    "venue_website",
    "latitude",
    "longitude",
    "tournament_director_name",
    "tournament_director_email",
    "official_ball",
    "tournament_key",
    "source_link",
    "notes",
];

fn upsert_sql() -> String {
    let columns = RECORD_COLUMNS.join(", ");
    let placeholders = (1..=RECORD_COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let updates = RECORD_COLUMNS
        .iter()
        .filter(|c| **c != "source_link")
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO tournaments ({columns}) VALUES ({placeholders}) \
         ON CONFLICT (source_link) DO UPDATE SET {updates}, updated_at = now() \
         RETURNING id, {columns}"
    )
}

fn list_sql() -> String {
    format!(
        "SELECT id, {} FROM tournaments \
         ORDER BY start_date ASC NULLS LAST, end_date ASC NULLS LAST, name ASC \
         LIMIT $1 OFFSET $2",
        RECORD_COLUMNS.join(", ")
    )
}

#[derive(Debug, Clone)]
pub struct PgTournamentStore {
    pool: PgPool,
}

impl PgTournamentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("tournament migrations applied");
        Ok(())
    }
}

fn stored_from_row(row: &PgRow) -> Result<StoredTournament, sqlx::Error> {
    Ok(StoredTournament {
        id: row.try_get("id")?,
        record: TournamentRecord {
            name: row.try_get("name")?,
            grade: row.try_get("grade")?,
            category: row.try_get("category")?,
            gender: row.try_get("gender")?,
            surface: row.try_get("surface")?,
            year: row.try_get("year")?,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            qualifying_start: row.try_get("qualifying_start")?,
            qualifying_end: row.try_get("qualifying_end")?,
            entry_deadline: row.try_get("entry_deadline")?,
            withdrawal_deadline: row.try_get("withdrawal_deadline")?,
            sign_in_main: row.try_get("sign_in_main")?,
            sign_in_qualifying: row.try_get("sign_in_qualifying")?,
            first_qualifying_day: row.try_get("first_qualifying_day")?,
            first_main_day: row.try_get("first_main_day")?,
            city: row.try_get("city")?,
            country_code: row.try_get("country_code")?,
            country: row.try_get("country")?,
            venue_name: row.try_get("venue_name")?,
            venue_address: row.try_get("venue_address")?,
            venue_website: row.try_get("venue_website")?,
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
            tournament_director_name: row.try_get("tournament_director_name")?,
            tournament_director_email: row.try_get("tournament_director_email")?,
            official_ball: row.try_get("official_ball")?,
            tournament_key: row.try_get("tournament_key")?,
            source_link: row.try_get("source_link")?,
            notes: row.try_get("notes")?,
        },
    })
}

#[async_trait]
impl TournamentStore for PgTournamentStore {
    async fn upsert_by_identity(
        &self,
        record: &TournamentRecord,
    ) -> Result<StoredTournament, PersistenceError> {
        // ON CONFLICT makes concurrent first inserts of one URL collapse into an update.
        let row = sqlx::query(&upsert_sql())
            .bind(&record.name)
            .bind(&record.grade)
            .bind(&record.category)
            .bind(&record.gender)
            .bind(&record.surface)
            .bind(record.year)
            .bind(record.start_date)
            .bind(record.end_date)
            .bind(record.qualifying_start)
            .bind(record.qualifying_end)
            .bind(&record.entry_deadline)
            .bind(&record.withdrawal_deadline)
            .bind(&record.sign_in_main)
            .bind(&record.sign_in_qualifying)
            .bind(&record.first_qualifying_day)
            .bind(&record.first_main_day)
            .bind(&record.city)
            .bind(&record.country_code)
            .bind(&record.country)
            .bind(&record.venue_name)
            .bind(&record.venue_address)
            .bind(&record.venue_website)
            .bind(record.latitude)
            .bind(record.longitude)
            .bind(&record.tournament_director_name)
            .bind(&record.tournament_director_email)
            .bind(&record.official_ball)
            .bind(&record.tournament_key)
            .bind(&record.source_link)
            .bind(&record.notes)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored_from_row(&row)?)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<StoredTournament>, PersistenceError> {
        let rows = sqlx::query(&list_sql())
            .bind(limit.max(0))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(stored_from_row(row)?);
        }
        Ok(out)
    }
}

/// Process-local store with the same identity and ordering rules as Postgres.
#[derive(Debug, Default)]
pub struct MemoryTournamentStore {
    rows: Mutex<Vec<StoredTournament>>,
}

impl MemoryTournamentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

fn cmp_nulls_last(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[async_trait]
impl TournamentStore for MemoryTournamentStore {
    async fn upsert_by_identity(
        &self,
        record: &TournamentRecord,
    ) -> Result<StoredTournament, PersistenceError> {
        let mut rows = self.rows.lock().await;
        if let Some(existing) = rows
            .iter_mut()
            .find(|row| row.record.source_link == record.source_link)
        {
            existing.record = record.clone();
            return Ok(existing.clone());
        }
        let stored = StoredTournament {
            id: rows.len() as i64 + 1,
            record: record.clone(),
        };
        rows.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<StoredTournament>, PersistenceError> {
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by(|a, b| {
            cmp_nulls_last(a.record.start_date, b.record.start_date)
                .then_with(|| cmp_nulls_last(a.record.end_date, b.record.end_date))
                .then_with(|| a.record.name.cmp(&b.record.name))
        });
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &str = include_str!("../../../migrations/0001_create_tournaments.sql");

    #[test]
    fn scraped_text_columns_are_unbounded() {
        for line in SCHEMA.lines().map(str::trim) {
            if line.contains("VARCHAR") {
                assert!(line.starts_with("country_code"), "bounded column: {line}");
            }
        }
        for column in ["name ", "venue_address", "official_ball", "sign_in_main", "grade "] {
            let line = SCHEMA
                .lines()
                .map(str::trim)
                .find(|l| l.starts_with(column))
                .unwrap_or_else(|| panic!("missing column {column}"));
            assert!(line.contains("TEXT"), "{line}");
        }
    }

    fn record(name: &str, link: &str, start: Option<(i32, u32, u32)>) -> TournamentRecord {
        let mut record = TournamentRecord::minimal(name, link);
        record.start_date = start.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d));
        record
    }

    #[tokio::test]
    async fn upserting_same_link_twice_keeps_one_row_with_latest_fields() {
        let store = MemoryTournamentStore::new();
        let mut first = record("ITF J60 Antalya", "https://example.org/a", Some((2025, 6, 12)));
        first.city = Some("Antalya".to_string());
        let a = store.upsert_by_identity(&first).await.unwrap();

        let mut second = first.clone();
        second.name = "J60 Antalya Open".to_string();
        second.city = None;
        let b = store.upsert_by_identity(&second).await.unwrap();

        assert_eq!(a.id, b.id);
        assert_eq!(store.len().await, 1);
        let rows = store.list(10, 0).await.unwrap();
        assert_eq!(rows[0].record.name, "J60 Antalya Open");
        assert_eq!(rows[0].record.city, None);
    }

    #[tokio::test]
    async fn listing_orders_by_start_date_nulls_last_then_name() {
        let store = MemoryTournamentStore::new();
        for r in [
            record("Zeta", "https://example.org/z", None),
            record("Beta", "https://example.org/b", Some((2025, 7, 1))),
            record("Alpha", "https://example.org/a", None),
            record("Gamma", "https://example.org/g", Some((2025, 6, 1))),
        ] {
            store.upsert_by_identity(&r).await.unwrap();
        }
        let names: Vec<_> = store
            .list(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.record.name)
            .collect();
        assert_eq!(names, vec!["Gamma", "Beta", "Alpha", "Zeta"]);

        let page: Vec<_> = store
            .list(2, 1)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.record.name)
            .collect();
        assert_eq!(page, vec!["Beta", "Alpha"]);
    }

    #[test]
    fn upsert_sql_conflicts_on_source_link_and_updates_everything_else() {
        let sql = upsert_sql();
        assert!(sql.contains("ON CONFLICT (source_link) DO UPDATE SET"));
        assert!(sql.contains("name = EXCLUDED.name"));
        assert!(sql.contains("notes = EXCLUDED.notes"));
        assert!(!sql.contains("source_link = EXCLUDED.source_link"));
        assert!(sql.contains("$30"));
        assert!(!sql.contains("$31"));
    }

    #[test]
    fn list_sql_orders_nulls_last() {
        let sql = list_sql();
        assert!(sql.contains("ORDER BY start_date ASC NULLS LAST, end_date ASC NULLS LAST, name ASC"));
    }
}
