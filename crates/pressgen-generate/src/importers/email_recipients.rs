//! Per-recipient delivery rows for every email batch.
//!
//! Each email carries aggregate counters (failed, opened, delivered). The
//! recipients of a batch are drawn from the members subscribed to the
//! newsletter before the batch was processed, and every recipient consumes
//! one unit of the remaining counters in priority order: failed, then
//! opened, then delivered. Once all counters are spent the remaining
//! recipients are recorded as processed only.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use rand::{Rng, RngCore};
use tracing::debug;

use pressgen_core::{Row, Value};

use super::emails::subscriptions_by_newsletter;
use super::{optional_text, row, text_column, timestamp_column};
use crate::errors::GenerationError;
use crate::events::{EventQueue, EventSpec, Shape, Trend, generate_events};
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::{between, object_id};

/// Recipients per email batch.
pub const BATCH_SIZE: usize = 1000;
const ACTIVITY_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientStatus {
    Failed,
    Opened,
    Delivered,
    /// Processed without any delivery activity.
    Unreached,
}

/// Counters still to be realised for one email.
///
/// `delivered_count` holds deliveries that were not opened, so the three
/// counters partition the recipients that had any activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmailMeta {
    pub failed_count: u64,
    pub opened_count: u64,
    pub delivered_count: u64,
}

impl EmailMeta {
    /// From the email row's totals, where `delivered` includes `opened`.
    pub fn from_totals(delivered: u64, opened: u64, failed: u64) -> Self {
        Self {
            failed_count: failed,
            opened_count: opened,
            delivered_count: delivered.saturating_sub(opened),
        }
    }

    /// Remove what an already generated batch of `recipients` rows used up.
    pub fn consume(&mut self, recipients: u64) {
        let mut left = recipients;
        for counter in [
            &mut self.failed_count,
            &mut self.opened_count,
            &mut self.delivered_count,
        ] {
            let taken = (*counter).min(left);
            *counter -= taken;
            left -= taken;
        }
    }

    pub fn next_status(&mut self) -> RecipientStatus {
        if self.failed_count > 0 {
            self.failed_count -= 1;
            RecipientStatus::Failed
        } else if self.opened_count > 0 {
            self.opened_count -= 1;
            RecipientStatus::Opened
        } else if self.delivered_count > 0 {
            self.delivered_count -= 1;
            RecipientStatus::Delivered
        } else {
            RecipientStatus::Unreached
        }
    }
}

/// Members not yet assigned in the current batch.
#[derive(Debug, Default)]
pub struct MemberPool {
    members: Vec<String>,
}

impl MemberPool {
    pub fn new(members: Vec<String>) -> Self {
        Self { members }
    }

    pub fn take_random(&mut self, rng: &mut dyn RngCore) -> Option<String> {
        if self.members.is_empty() {
            return None;
        }
        let index = rng.random_range(0..self.members.len());
        Some(self.members.swap_remove(index))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone)]
struct EmailTotals {
    newsletter_id: Option<String>,
    delivered: u64,
    opened: u64,
    failed: u64,
}

#[derive(Debug, Clone)]
struct BatchInfo {
    id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Debug)]
struct MemberInfo {
    uuid: Value,
    email: Value,
    name: Value,
}

#[derive(Debug)]
struct BatchState {
    email_id: String,
    batch_id: String,
    processed_at: NaiveDateTime,
    meta: EmailMeta,
    events: EventQueue,
    pool: MemberPool,
}

#[derive(Debug, Default)]
pub struct EmailRecipientsImporter {
    now: NaiveDateTime,
    emails: HashMap<String, EmailTotals>,
    /// Email id → its batches in processing order.
    batches: HashMap<String, Vec<BatchInfo>>,
    subscriptions: BTreeMap<String, Vec<(NaiveDateTime, String)>>,
    members: HashMap<String, MemberInfo>,
    /// Email id → recipient rows written for its earlier batches.
    written: HashMap<String, u64>,
    current: Option<BatchState>,
}

impl EmailRecipientsImporter {
    /// Members eligible for batch number `position` processed at `cutoff`.
    fn eligible(
        &self,
        newsletter_id: Option<&str>,
        cutoff: NaiveDateTime,
        position: usize,
    ) -> Vec<String> {
        let Some(events) = newsletter_id.and_then(|id| self.subscriptions.get(id)) else {
            return Vec::new();
        };
        let skipped = position * BATCH_SIZE;
        let mut seen = HashSet::new();
        let mut eligible = Vec::new();
        for (at, member_id) in events {
            if *at >= cutoff || eligible.len() == BATCH_SIZE {
                break;
            }
            if seen.insert(member_id.as_str()) && seen.len() > skipped {
                eligible.push(member_id.clone());
            }
        }
        eligible
    }

    fn window_end(&self, start: NaiveDateTime) -> NaiveDateTime {
        (start + Duration::days(ACTIVITY_WINDOW_DAYS)).min(self.now).max(start)
    }
}

#[async_trait]
impl ReferencedGenerator for EmailRecipientsImporter {
    fn table(&self) -> &'static str {
        "email_recipients"
    }

    fn reference_table(&self) -> &'static str {
        "email_batches"
    }

    fn default_quantity(&self) -> usize {
        BATCH_SIZE
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        self.now = ctx.now;

        for email in ctx.select("emails").await? {
            let count = |column: &str| {
                email
                    .get(column)
                    .and_then(Value::as_i64)
                    .unwrap_or(0)
                    .max(0) as u64
            };
            let totals = EmailTotals {
                newsletter_id: optional_text(&email, "newsletter_id"),
                delivered: count("delivered_count"),
                opened: count("opened_count"),
                failed: count("failed_count"),
            };
            self.emails.insert(text_column(&email, "emails", "id")?, totals);
        }

        for batch in ctx.select("email_batches").await? {
            let email_id = text_column(&batch, "email_batches", "email_id")?;
            self.batches.entry(email_id).or_default().push(BatchInfo {
                id: text_column(&batch, "email_batches", "id")?,
                created_at: timestamp_column(&batch, "email_batches", "created_at")?,
                updated_at: timestamp_column(&batch, "email_batches", "updated_at")?,
            });
        }
        for batches in self.batches.values_mut() {
            batches.sort_by(|a, b| {
                (a.created_at, a.updated_at, &a.id).cmp(&(b.created_at, b.updated_at, &b.id))
            });
        }

        self.subscriptions =
            subscriptions_by_newsletter(&ctx.select("members_subscribe_events").await?)?;

        for member in ctx.select("members").await? {
            let info = MemberInfo {
                uuid: member.get("uuid").cloned().unwrap_or(Value::Null),
                email: member.get("email").cloned().unwrap_or(Value::Null),
                name: member.get("name").cloned().unwrap_or(Value::Null),
            };
            self.members.insert(text_column(&member, "members", "id")?, info);
        }
        Ok(())
    }

    fn order_references(&self, references: &mut Vec<Row>) {
        references.sort_by(|a, b| {
            let key = |row: &Row| {
                (
                    row.get("created_at").and_then(Value::as_timestamp),
                    row.get("updated_at").and_then(Value::as_timestamp),
                    optional_text(row, "id"),
                )
            };
            key(a).cmp(&key(b))
        });
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let batch_id = text_column(reference, "email_batches", "id")?;
        let email_id = text_column(reference, "email_batches", "email_id")?;
        let email = self
            .emails
            .get(&email_id)
            .ok_or_else(|| GenerationError::missing_reference("emails", "email_id", &email_id))?;
        let newsletter_id = email.newsletter_id.as_deref();
        let batches = self.batches.get(&email_id).map(Vec::as_slice).unwrap_or_default();
        let position = batches
            .iter()
            .position(|batch| batch.id == batch_id)
            .unwrap_or(batches.len());
        let processed_at = timestamp_column(reference, "email_batches", "updated_at")?;

        let mut meta = EmailMeta::from_totals(email.delivered, email.opened, email.failed);
        meta.consume(self.written.get(&email_id).copied().unwrap_or(0));

        let pool = self.eligible(newsletter_id, processed_at, position);
        let spec = EventSpec {
            shape: Shape::EaseOut,
            trend: Trend::Negative,
            total: pool.len(),
            start: processed_at,
            end: self.window_end(processed_at),
        };
        let events = EventQueue::new(generate_events(&spec, rng));

        debug!(
            email_id = %email_id,
            batch_id = %batch_id,
            position,
            recipients = pool.len(),
            failed = meta.failed_count,
            opened = meta.opened_count,
            delivered = meta.delivered_count,
            "email batch scoped"
        );

        self.current = Some(BatchState {
            email_id,
            batch_id,
            processed_at,
            meta,
            events,
            pool: MemberPool::new(pool),
        });
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(state) = self.current.as_mut() else {
            return Ok(None);
        };
        let Some(at) = state.events.pop_earliest() else {
            return Ok(None);
        };
        let Some(member_id) = state.pool.take_random(rng) else {
            return Ok(None);
        };
        let member = self
            .members
            .get(&member_id)
            .ok_or_else(|| GenerationError::missing_reference("members", "member_id", &member_id))?;

        let (delivered_at, opened_at, failed_at) = match state.meta.next_status() {
            RecipientStatus::Failed => (None, None, Some(at)),
            RecipientStatus::Opened => {
                let delivered_at = between(state.processed_at, at, rng);
                (Some(delivered_at), Some(at), None)
            }
            RecipientStatus::Delivered => (Some(at), None, None),
            RecipientStatus::Unreached => (None, None, None),
        };

        *self.written.entry(state.email_id.clone()).or_default() += 1;

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("email_id", Value::text(state.email_id.clone())),
            ("batch_id", Value::text(state.batch_id.clone())),
            ("member_id", Value::text(member_id)),
            ("member_uuid", member.uuid.clone()),
            ("member_email", member.email.clone()),
            ("member_name", member.name.clone()),
            ("processed_at", Value::from(state.processed_at)),
            ("delivered_at", Value::from(delivered_at)),
            ("opened_at", Value::from(opened_at)),
            ("failed_at", Value::from(failed_at)),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn delivered_counter_excludes_opens() {
        let meta = EmailMeta::from_totals(500, 120, 10);
        assert_eq!(
            meta,
            EmailMeta {
                failed_count: 10,
                opened_count: 120,
                delivered_count: 380,
            }
        );
    }

    #[test]
    fn statuses_follow_priority_then_run_out() {
        let mut meta = EmailMeta::from_totals(2, 1, 1);
        let statuses: Vec<_> = (0..4).map(|_| meta.next_status()).collect();
        assert_eq!(
            statuses,
            vec![
                RecipientStatus::Failed,
                RecipientStatus::Opened,
                RecipientStatus::Delivered,
                RecipientStatus::Unreached,
            ]
        );
    }

    #[test]
    fn earlier_batches_consume_in_priority_order() {
        let mut meta = EmailMeta::from_totals(1200, 700, 10);
        meta.consume(1000);
        assert_eq!(
            meta,
            EmailMeta {
                failed_count: 0,
                opened_count: 0,
                delivered_count: 210,
            }
        );
        meta.consume(1000);
        assert_eq!(meta, EmailMeta::default());
    }

    #[test]
    fn member_pool_hands_out_each_member_once() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut pool = MemberPool::new((0..50).map(|i| format!("m{i}")).collect());
        let mut drawn = HashSet::new();
        while let Some(member) = pool.take_random(&mut rng) {
            assert!(drawn.insert(member));
        }
        assert_eq!(drawn.len(), 50);
        assert!(pool.is_empty());
    }

    fn at(day: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 6, day)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .expect("date")
    }

    #[test]
    fn eligibility_is_sliced_per_batch_and_deduplicated() {
        let mut importer = EmailRecipientsImporter::default();
        let mut events: Vec<(NaiveDateTime, String)> = (0..1500)
            .map(|i| (at(1), format!("m{i:04}")))
            .collect();
        // Duplicate subscription and one that arrives too late.
        events.push((at(2), "m0000".to_string()));
        events.push((at(20), "late".to_string()));
        events.sort();
        importer.subscriptions.insert("n1".to_string(), events);

        let first = importer.eligible(Some("n1"), at(10), 0);
        let second = importer.eligible(Some("n1"), at(10), 1);
        assert_eq!(first.len(), 1000);
        assert_eq!(second.len(), 500);
        assert!(!second.contains(&"late".to_string()));
        assert!(importer.eligible(Some("n1"), at(1), 0).is_empty());
        assert!(importer.eligible(None, at(10), 0).is_empty());
    }

    #[test]
    fn activity_window_is_capped_by_the_clock() {
        let importer = EmailRecipientsImporter {
            now: at(3),
            ..Default::default()
        };
        assert_eq!(importer.window_end(at(1)), at(3));
        assert_eq!(importer.window_end(at(5)), at(5));
        let later = EmailRecipientsImporter {
            now: at(30),
            ..Default::default()
        };
        assert_eq!(later.window_end(at(1)), at(8));
    }
}
