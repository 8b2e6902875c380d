use super::IEventRepo;
use chrono::{NaiveDate, NaiveTime};
use event_reminder_domain::{Event, ID};
use sqlx::{types::Uuid, FromRow, PgPool};

pub struct PostgresEventRepo {
    pool: PgPool,
}

impl PostgresEventRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EventRaw {
    event_uid: Uuid,
    title: String,
    date: NaiveDate,
    time: Option<NaiveTime>,
    location_name: Option<String>,
    cancelled: bool,
    hidden: bool,
}

impl From<EventRaw> for Event {
    fn from(e: EventRaw) -> Self {
        Self {
            id: e.event_uid.into(),
            title: e.title,
            date: e.date,
            time: e.time,
            location_name: e.location_name,
            cancelled: e.cancelled,
            hidden: e.hidden,
        }
    }
}

#[async_trait::async_trait]
impl IEventRepo for PostgresEventRepo {
    async fn insert(&self, e: &Event) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events
            (event_uid, title, date, time, location_name, cancelled, hidden)
            VALUES($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(e.id.inner_ref())
        .bind(&e.title)
        .bind(e.date)
        .bind(e.time)
        .bind(&e.location_name)
        .bind(e.cancelled)
        .bind(e.hidden)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save(&self, e: &Event) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE events SET
                title = $2,
                date = $3,
                time = $4,
                location_name = $5,
                cancelled = $6,
                hidden = $7
            WHERE event_uid = $1
            "#,
        )
        .bind(e.id.inner_ref())
        .bind(&e.title)
        .bind(e.date)
        .bind(e.time)
        .bind(&e.location_name)
        .bind(e.cancelled)
        .bind(e.hidden)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, event_id: &ID) -> anyhow::Result<Option<Event>> {
        let event = sqlx::query_as::<_, EventRaw>(
            r#"
            DELETE FROM events AS e
            WHERE e.event_uid = $1
            RETURNING *
            "#,
        )
        .bind(event_id.inner_ref())
        .fetch_optional(&self.pool)
        .await?;
        Ok(event.map(|e| e.into()))
    }

    async fn find_many(&self, event_ids: &[ID]) -> anyhow::Result<Vec<Event>> {
        let ids = event_ids.iter().map(|id| id.inner()).collect::<Vec<_>>();
        let events = sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events AS e
            WHERE e.event_uid = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(events.into_iter().map(|e| e.into()).collect())
    }

    async fn find_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<Event>> {
        let events = sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events AS e
            WHERE e.date BETWEEN $1 AND $2
            AND NOT e.cancelled
            AND NOT e.hidden
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(events.into_iter().map(|e| e.into()).collect())
    }
}
