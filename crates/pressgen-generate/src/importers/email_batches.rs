use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::email_recipients::BATCH_SIZE;
use super::{row, text_column, timestamp_column};
use crate::errors::GenerationError;
use crate::importer::ReferencedGenerator;
use crate::random::object_id;

/// Splits each email into provider batches of up to [`BATCH_SIZE`] recipients.
#[derive(Debug, Default)]
pub struct EmailBatchesImporter {
    email_id: String,
    submitted_at: Option<NaiveDateTime>,
    remaining: usize,
    index: i64,
}

#[async_trait]
impl ReferencedGenerator for EmailBatchesImporter {
    fn table(&self) -> &'static str {
        "email_batches"
    }

    fn reference_table(&self) -> &'static str {
        "emails"
    }

    fn default_quantity(&self) -> usize {
        100
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        _rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        self.email_id = text_column(reference, "emails", "id")?;
        self.submitted_at = Some(timestamp_column(reference, "emails", "submitted_at")?);
        let email_count = reference
            .get("email_count")
            .and_then(Value::as_i64)
            .unwrap_or(0)
            .max(0) as usize;
        self.remaining = email_count.div_ceil(BATCH_SIZE);
        self.index = 0;
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(submitted_at) = self.submitted_at else {
            return Ok(None);
        };
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        // Later batches are created later, which is the order recipients
        // are assigned in.
        let created_at = submitted_at + Duration::seconds(self.index);
        let updated_at = created_at + Duration::seconds(rng.random_range(1..=120));
        self.index += 1;

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("email_id", Value::text(self.email_id.clone())),
            ("provider_id", Value::text(format!("{}@mail.example.com", object_id(rng)))),
            ("status", Value::text("submitted")),
            ("member_segment", Value::Null),
            ("created_at", Value::from(created_at)),
            ("updated_at", Value::from(updated_at)),
        ])))
    }
}
