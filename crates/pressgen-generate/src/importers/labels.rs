use async_trait::async_trait;
use chrono::NaiveDateTime;
use fake::Fake;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::tags::title_case;
use super::{SlugSet, row};
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::object_id;

#[derive(Debug, Default)]
pub struct LabelsImporter {
    now: NaiveDateTime,
    slugs: SlugSet,
}

#[async_trait]
impl DirectGenerator for LabelsImporter {
    fn table(&self) -> &'static str {
        "labels"
    }

    fn default_quantity(&self) -> usize {
        10
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        self.slugs.extend_existing(&ctx.select("labels").await?);
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        _index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let buzzword: String = fake::faker::company::en::Buzzword().fake_with_rng(rng);
        let name = title_case(&buzzword);
        let now = Value::from(self.now);

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("slug", Value::text(self.slugs.claim(&name))),
            ("name", Value::text(name)),
            ("created_at", now.clone()),
            ("updated_at", now),
        ])))
    }
}
