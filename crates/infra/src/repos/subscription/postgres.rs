use super::ISubscriptionRepo;
use event_reminder_domain::{Subscription, SubscriptionSource, ID};
use sqlx::{types::Uuid, FromRow, PgPool};
use tracing::warn;

pub struct PostgresSubscriptionRepo {
    pool: PgPool,
}

impl PostgresSubscriptionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SubscriptionRaw {
    event_uid: Uuid,
    user_uid: Uuid,
    source: String,
}

#[async_trait::async_trait]
impl ISubscriptionRepo for PostgresSubscriptionRepo {
    async fn insert(&self, subscription: &Subscription) -> anyhow::Result<()> {
        let query = match subscription.source {
            SubscriptionSource::Favorite => {
                r#"
                INSERT INTO event_favorites
                (event_uid, user_uid)
                VALUES($1, $2)
                ON CONFLICT DO NOTHING
                "#
            }
            SubscriptionSource::RsvpGoing => {
                r#"
                INSERT INTO event_rsvps
                (event_uid, user_uid, status)
                VALUES($1, $2, 'going')
                ON CONFLICT (event_uid, user_uid) DO UPDATE SET status = 'going'
                "#
            }
        };
        sqlx::query(query)
            .bind(subscription.event_id.inner_ref())
            .bind(subscription.user_id.inner_ref())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRaw>(
            r#"
            SELECT f.event_uid, f.user_uid, 'favorite' AS source
            FROM event_favorites AS f
            WHERE f.event_uid = $1
            UNION ALL
            SELECT r.event_uid, r.user_uid, 'rsvp_going' AS source
            FROM event_rsvps AS r
            WHERE r.event_uid = $1 AND r.status = 'going'
            "#,
        )
        .bind(event_id.inner_ref())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match row.source.parse::<SubscriptionSource>() {
                Ok(source) => Some(Subscription {
                    event_id: row.event_uid.into(),
                    user_id: row.user_uid.into(),
                    source,
                }),
                Err(e) => {
                    warn!("Ignoring subscription row: {}", e);
                    None
                }
            })
            .collect())
    }
}
