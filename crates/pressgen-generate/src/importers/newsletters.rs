use async_trait::async_trait;
use chrono::NaiveDateTime;
use fake::Fake;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::{SlugSet, row};
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::{object_id, uuid};

const NAMES: &[&str] = &[
    "Weekly Dispatch",
    "Product Notes",
    "Field Reports",
    "Long Reads",
    "Community Digest",
];

/// The first newsletter is the one members are signed up to by default.
#[derive(Debug, Default)]
pub struct NewslettersImporter {
    now: NaiveDateTime,
    slugs: SlugSet,
}

#[async_trait]
impl DirectGenerator for NewslettersImporter {
    fn table(&self) -> &'static str {
        "newsletters"
    }

    fn default_quantity(&self) -> usize {
        2
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        self.slugs.extend_existing(&ctx.select("newsletters").await?);
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let name = NAMES
            .get(index)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Newsletter {}", index + 1));
        let description: String = fake::faker::lorem::en::Sentence(5..12).fake_with_rng(rng);
        let now = Value::from(self.now);

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("uuid", Value::text(uuid(rng))),
            ("slug", Value::text(self.slugs.claim(&name))),
            ("name", Value::text(name)),
            ("description", Value::text(description)),
            ("status", Value::text("active")),
            ("visibility", Value::text("members")),
            ("subscribe_on_signup", Value::Bool(index == 0)),
            ("sort_order", Value::Int(index as i64)),
            ("created_at", now.clone()),
            ("updated_at", now),
        ])))
    }
}
