use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{ids, optional_text, row, text_column, timestamp_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::{object_id, uuid};

/// Newsletter sends for published posts.
///
/// `email_count` is the number of distinct members subscribed to the post's
/// newsletter before it was published. Delivery and open counters are drawn
/// from realistic ranges and later realised row by row by the recipients
/// importer.
#[derive(Debug, Default)]
pub struct EmailsImporter {
    newsletters: HashSet<String>,
    /// Newsletter id → subscription instants, ascending.
    subscriptions: BTreeMap<String, Vec<(NaiveDateTime, String)>>,
    pending: Option<Row>,
}

impl EmailsImporter {
    fn audience(&self, newsletter_id: &str, before: NaiveDateTime) -> usize {
        let Some(events) = self.subscriptions.get(newsletter_id) else {
            return 0;
        };
        events
            .iter()
            .take_while(|(at, _)| *at < before)
            .map(|(_, member_id)| member_id)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[async_trait]
impl ReferencedGenerator for EmailsImporter {
    fn table(&self) -> &'static str {
        "emails"
    }

    fn reference_table(&self) -> &'static str {
        "posts"
    }

    fn default_quantity(&self) -> usize {
        1
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        self.newsletters = ids(&ctx.select("newsletters").await?, "newsletters")?
            .into_iter()
            .collect();
        self.subscriptions =
            subscriptions_by_newsletter(&ctx.select("members_subscribe_events").await?)?;
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        self.pending = None;
        let is_sent_post = optional_text(reference, "status").as_deref() == Some("published")
            && optional_text(reference, "type").as_deref() != Some("page");
        let Some(newsletter_id) = optional_text(reference, "newsletter_id") else {
            return Ok(());
        };
        if !is_sent_post {
            return Ok(());
        }
        if !self.newsletters.contains(&newsletter_id) {
            return Err(GenerationError::missing_reference(
                "newsletters",
                "newsletter_id",
                newsletter_id,
            ));
        }

        let post_id = text_column(reference, "posts", "id")?;
        let published_at = timestamp_column(reference, "posts", "published_at")?;
        let email_count = self.audience(&newsletter_id, published_at) as u64;
        if email_count == 0 {
            return Ok(());
        }

        let failed = (email_count as f64 * rng.random_range(0.0..=0.02)).round() as u64;
        let delivered = email_count - failed.min(email_count);
        let opened = (delivered as f64 * rng.random_range(0.3..=0.7)).round() as u64;
        let subject = optional_text(reference, "title").unwrap_or_default();

        self.pending = Some(row([
            ("post_id", Value::text(post_id)),
            ("newsletter_id", Value::text(newsletter_id)),
            ("status", Value::text("submitted")),
            ("recipient_filter", Value::text("all")),
            ("subject", Value::text(subject)),
            ("email_count", Value::Int(email_count as i64)),
            ("delivered_count", Value::Int(delivered as i64)),
            ("opened_count", Value::Int(opened as i64)),
            ("failed_count", Value::Int(failed as i64)),
            ("track_opens", Value::Bool(true)),
            ("submitted_at", Value::from(published_at)),
            ("created_at", Value::from(published_at)),
            ("updated_at", Value::from(published_at)),
        ]));
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(mut email) = self.pending.take() else {
            return Ok(None);
        };
        email.insert("id".to_string(), Value::text(object_id(rng)));
        email.insert("uuid".to_string(), Value::text(uuid(rng)));
        Ok(Some(email))
    }
}

/// Active subscriptions grouped by newsletter, ordered by `(created_at, id)`.
pub(crate) fn subscriptions_by_newsletter(
    events: &[Row],
) -> Result<BTreeMap<String, Vec<(NaiveDateTime, String)>>, GenerationError> {
    let table = "members_subscribe_events";
    let mut ordered = Vec::with_capacity(events.len());
    for event in events {
        if event.get("subscribed").and_then(Value::as_bool) != Some(true) {
            continue;
        }
        let Some(newsletter_id) = optional_text(event, "newsletter_id") else {
            continue;
        };
        ordered.push((
            timestamp_column(event, table, "created_at")?,
            text_column(event, table, "id")?,
            newsletter_id,
            text_column(event, table, "member_id")?,
        ));
    }
    ordered.sort();

    let mut grouped: BTreeMap<String, Vec<(NaiveDateTime, String)>> = BTreeMap::new();
    for (created_at, _, newsletter_id, member_id) in ordered {
        grouped
            .entry(newsletter_id)
            .or_default()
            .push((created_at, member_id));
    }
    Ok(grouped)
}
