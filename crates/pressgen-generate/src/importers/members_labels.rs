use async_trait::async_trait;
use rand::seq::index::sample;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{ids, row, text_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::object_id;

const LABELLED_SHARE: f64 = 0.1;

/// About one member in ten carries one or two labels.
#[derive(Debug, Default)]
pub struct MembersLabelsImporter {
    labels: Vec<String>,
    member_id: String,
    pending: Vec<String>,
    sort_order: i64,
}

#[async_trait]
impl ReferencedGenerator for MembersLabelsImporter {
    fn table(&self) -> &'static str {
        "members_labels"
    }

    fn reference_table(&self) -> &'static str {
        "members"
    }

    fn default_quantity(&self) -> usize {
        2
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        self.labels = ids(&ctx.select("labels").await?, "labels")?;
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        self.member_id = text_column(reference, "members", "id")?;
        self.sort_order = 0;
        self.pending.clear();
        if self.labels.is_empty() || !rng.random_bool(LABELLED_SHARE) {
            return Ok(());
        }
        let count = rng.random_range(1..=2).min(self.labels.len());
        let mut drawn = sample(rng, self.labels.len(), count).into_vec();
        drawn.reverse();
        self.pending = drawn
            .into_iter()
            .map(|index| self.labels[index].clone())
            .collect();
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(label_id) = self.pending.pop() else {
            return Ok(None);
        };
        let sort_order = self.sort_order;
        self.sort_order += 1;
        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("member_id", Value::text(self.member_id.clone())),
            ("label_id", Value::text(label_id)),
            ("sort_order", Value::Int(sort_order)),
        ])))
    }
}
