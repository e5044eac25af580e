use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::{row, text_column, timestamp_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::object_id;

/// One "subscribed" event per newsletter subscription, dated at the
/// member's signup.
#[derive(Debug, Default)]
pub struct MembersSubscribeEventsImporter {
    signups: HashMap<String, NaiveDateTime>,
    pending: Option<Row>,
}

#[async_trait]
impl ReferencedGenerator for MembersSubscribeEventsImporter {
    fn table(&self) -> &'static str {
        "members_subscribe_events"
    }

    fn reference_table(&self) -> &'static str {
        "members_newsletters"
    }

    fn default_quantity(&self) -> usize {
        1
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        for member in ctx.select("members").await? {
            let id = text_column(&member, "members", "id")?;
            let created_at = timestamp_column(&member, "members", "created_at")?;
            self.signups.insert(id, created_at);
        }
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        _rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let member_id = text_column(reference, "members_newsletters", "member_id")?;
        let newsletter_id = text_column(reference, "members_newsletters", "newsletter_id")?;
        let created_at = *self
            .signups
            .get(&member_id)
            .ok_or_else(|| GenerationError::missing_reference("members", "member_id", &member_id))?;

        self.pending = Some(row([
            ("member_id", Value::text(member_id)),
            ("newsletter_id", Value::text(newsletter_id)),
            ("subscribed", Value::Bool(true)),
            ("source", Value::text("member")),
            ("created_at", Value::from(created_at)),
        ]));
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(mut event) = self.pending.take() else {
            return Ok(None);
        };
        event.insert("id".to_string(), Value::text(object_id(rng)));
        Ok(Some(event))
    }
}
