use super::IPreferenceRepo;
use event_reminder_domain::{NotificationPreference, TierId, ID};
use serde_json::Value;
use sqlx::{types::Uuid, FromRow, PgPool};
use std::collections::HashMap;

pub struct PostgresPreferenceRepo {
    pool: PgPool,
}

impl PostgresPreferenceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PreferenceRaw {
    user_uid: Uuid,
    enabled: bool,
    event_reminders: bool,
    tier_flags: Value,
}

impl From<PreferenceRaw> for NotificationPreference {
    fn from(p: PreferenceRaw) -> Self {
        // Anything but an explicit `true` counts as opted out
        let tier_flags = match p.tier_flags {
            Value::Object(flags) => flags
                .into_iter()
                .map(|(tier, flag)| (TierId::new(tier), flag.as_bool().unwrap_or(false)))
                .collect(),
            _ => HashMap::new(),
        };
        Self {
            user_id: p.user_uid.into(),
            enabled: p.enabled,
            event_reminders: p.event_reminders,
            tier_flags,
        }
    }
}

fn to_tier_flags(preference: &NotificationPreference) -> Value {
    Value::Object(
        preference
            .tier_flags
            .iter()
            .map(|(tier, flag)| (tier.to_string(), Value::Bool(*flag)))
            .collect(),
    )
}

#[async_trait::async_trait]
impl IPreferenceRepo for PostgresPreferenceRepo {
    async fn save(&self, preference: &NotificationPreference) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_preferences
            (user_uid, enabled, event_reminders, tier_flags)
            VALUES($1, $2, $3, $4)
            ON CONFLICT (user_uid) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                event_reminders = EXCLUDED.event_reminders,
                tier_flags = EXCLUDED.tier_flags
            "#,
        )
        .bind(preference.user_id.inner_ref())
        .bind(preference.enabled)
        .bind(preference.event_reminders)
        .bind(to_tier_flags(preference))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_users(
        &self,
        user_ids: &[ID],
    ) -> anyhow::Result<Vec<NotificationPreference>> {
        let ids = user_ids.iter().map(|id| id.inner()).collect::<Vec<_>>();
        let preferences = sqlx::query_as::<_, PreferenceRaw>(
            r#"
            SELECT * FROM notification_preferences AS p
            WHERE p.user_uid = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(preferences.into_iter().map(|p| p.into()).collect())
    }
}
