use async_trait::async_trait;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::{ids, row, text_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::{object_id, pick};

/// Every post gets one randomly chosen staff user as its author.
#[derive(Debug, Default)]
pub struct PostsAuthorsImporter {
    users: Vec<String>,
    pending: Option<(String, String)>,
}

#[async_trait]
impl ReferencedGenerator for PostsAuthorsImporter {
    fn table(&self) -> &'static str {
        "posts_authors"
    }

    fn reference_table(&self) -> &'static str {
        "posts"
    }

    fn default_quantity(&self) -> usize {
        1
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        self.users = ids(&ctx.select("users").await?, "users")?;
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let post_id = text_column(reference, "posts", "id")?;
        let author_id = pick(&self.users, rng)
            .cloned()
            .ok_or_else(|| GenerationError::missing_reference("users", "author_id", "any"))?;
        self.pending = Some((post_id, author_id));
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some((post_id, author_id)) = self.pending.take() else {
            return Ok(None);
        };
        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("post_id", Value::text(post_id)),
            ("author_id", Value::text(author_id)),
            ("sort_order", Value::Int(0)),
        ])))
    }
}
