use super::IEventRepo;
use crate::repos::shared::inmemory_repo::*;
use chrono::NaiveDate;
use event_reminder_domain::{Event, ID};
use std::sync::Mutex;

pub struct InMemoryEventRepo {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventRepo {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl IEventRepo for InMemoryEventRepo {
    async fn insert(&self, e: &Event) -> anyhow::Result<()> {
        insert(e, &self.events);
        Ok(())
    }

    async fn save(&self, e: &Event) -> anyhow::Result<()> {
        update_many(
            &self.events,
            |event| event.id == e.id,
            |event| {
                *event = e.clone();
                true
            },
        );
        Ok(())
    }

    async fn delete(&self, event_id: &ID) -> anyhow::Result<Option<Event>> {
        let deleted = find_by(&self.events, |event| event.id == *event_id);
        delete_by(&self.events, |event| event.id == *event_id);
        Ok(deleted.into_iter().next())
    }

    async fn find_many(&self, event_ids: &[ID]) -> anyhow::Result<Vec<Event>> {
        Ok(find_by(&self.events, |event| event_ids.contains(&event.id)))
    }

    async fn find_by_date_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<Event>> {
        Ok(find_by(&self.events, |event| {
            from <= event.date && event.date <= to
        }))
    }
}
