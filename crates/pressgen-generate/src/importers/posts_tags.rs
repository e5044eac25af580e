use async_trait::async_trait;
use rand::seq::index::sample;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{ids, row, text_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::object_id;

const MAX_TAGS_PER_POST: usize = 3;

#[derive(Debug, Default)]
pub struct PostsTagsImporter {
    tags: Vec<String>,
    post_id: String,
    pending: Vec<String>,
    sort_order: i64,
}

#[async_trait]
impl ReferencedGenerator for PostsTagsImporter {
    fn table(&self) -> &'static str {
        "posts_tags"
    }

    fn reference_table(&self) -> &'static str {
        "posts"
    }

    fn default_quantity(&self) -> usize {
        MAX_TAGS_PER_POST
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        self.tags = ids(&ctx.select("tags").await?, "tags")?;
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        self.post_id = text_column(reference, "posts", "id")?;
        self.sort_order = 0;
        let count = rng.random_range(0..=MAX_TAGS_PER_POST).min(self.tags.len());
        let mut drawn = sample(rng, self.tags.len(), count).into_vec();
        // Popped from the back.
        drawn.reverse();
        self.pending = drawn
            .into_iter()
            .map(|index| self.tags[index].clone())
            .collect();
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(tag_id) = self.pending.pop() else {
            return Ok(None);
        };
        let sort_order = self.sort_order;
        self.sort_order += 1;
        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("post_id", Value::text(self.post_id.clone())),
            ("tag_id", Value::text(tag_id)),
            ("sort_order", Value::Int(sort_order)),
        ])))
    }
}
