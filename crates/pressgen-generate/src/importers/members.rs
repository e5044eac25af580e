use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use fake::Fake;
use rand::{Rng, RngCore};
use tracing::debug;

use pressgen_core::{Row, Value};

use super::{optional_text, row, slugify};
use crate::errors::GenerationError;
use crate::events::{EventQueue, EventSpec, Shape, Trend, generate_events};
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::{object_id, uuid};

const SIGNUP_WINDOW_DAYS: i64 = 730;
/// Open rates are only published once a member has received this many emails.
const MIN_EMAILS_FOR_OPEN_RATE: i64 = 5;

/// Members signing up at an accelerating pace over the last two years.
///
/// Email engagement columns are filled in by `finalise`, once recipients
/// have been generated.
#[derive(Debug, Default)]
pub struct MembersImporter {
    now: NaiveDateTime,
    signups: EventQueue,
}

#[async_trait]
impl DirectGenerator for MembersImporter {
    fn table(&self) -> &'static str {
        "members"
    }

    fn default_quantity(&self) -> usize {
        1000
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        quantity: usize,
    ) -> Result<(), GenerationError> {
        self.now = ctx.now;
        let spec = EventSpec {
            shape: Shape::EaseIn,
            trend: Trend::Positive,
            total: quantity,
            start: ctx.now - Duration::days(SIGNUP_WINDOW_DAYS),
            end: ctx.now,
        };
        self.signups = EventQueue::new(generate_events(&spec, &mut *ctx.rng));
        Ok(())
    }

    fn generate(
        &mut self,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let created_at = self.signups.pop_earliest().unwrap_or(self.now);
        let first: String = fake::faker::name::en::FirstName().fake_with_rng(rng);
        let last: String = fake::faker::name::en::LastName().fake_with_rng(rng);
        let email = format!("{}.{}@example.com", slugify(&format!("{first} {last}")), index);

        let roll: f64 = rng.random();
        let status = if roll < 0.75 {
            "free"
        } else if roll < 0.95 {
            "paid"
        } else {
            "comped"
        };

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("uuid", Value::text(uuid(rng))),
            ("name", Value::text(format!("{first} {last}"))),
            ("email", Value::text(email)),
            ("status", Value::text(status)),
            ("email_disabled", Value::Bool(false)),
            ("email_count", Value::Int(0)),
            ("email_opened_count", Value::Int(0)),
            ("email_open_rate", Value::Null),
            ("created_at", Value::from(created_at)),
            ("updated_at", Value::from(created_at)),
        ])))
    }

    async fn finalise(&mut self, ctx: &mut ImportContext<'_>) -> Result<u64, GenerationError> {
        let mut totals: BTreeMap<String, (i64, i64)> = BTreeMap::new();
        for recipient in ctx.select("email_recipients").await? {
            let Some(member_id) = optional_text(&recipient, "member_id") else {
                continue;
            };
            let entry = totals.entry(member_id).or_default();
            entry.0 += 1;
            if recipient.get("opened_at").is_some_and(|at| !at.is_null()) {
                entry.1 += 1;
            }
        }

        for (member_id, (count, opened)) in &totals {
            let changes = engagement(*count, *opened);
            ctx.tx
                .update("members", &Value::text(member_id.as_str()), &changes)
                .await?;
        }
        debug!(members = totals.len(), "member email engagement updated");
        Ok(totals.len() as u64)
    }
}

fn engagement(count: i64, opened: i64) -> Row {
    let rate = (count >= MIN_EMAILS_FOR_OPEN_RATE)
        .then(|| ((opened as f64 * 100.0) / count as f64).round() as i64);
    row([
        ("email_count", Value::Int(count)),
        ("email_opened_count", Value::Int(opened)),
        ("email_open_rate", Value::from(rate)),
    ])
}

#[cfg(test)]
mod tests {
    use super::engagement;
    use pressgen_core::Value;

    #[test]
    fn open_rate_needs_enough_emails() {
        let few = engagement(4, 4);
        assert_eq!(few.get("email_open_rate"), Some(&Value::Null));

        let enough = engagement(8, 3);
        assert_eq!(enough.get("email_count"), Some(&Value::Int(8)));
        assert_eq!(enough.get("email_opened_count"), Some(&Value::Int(3)));
        assert_eq!(enough.get("email_open_rate"), Some(&Value::Int(38)));
    }
}
