use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use fake::Fake;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::{SlugSet, row};
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::{between, object_id};

/// Id of the site owner account. Never removed when clearing.
pub const OWNER_USER_ID: &str = "1";

#[derive(Debug, Default)]
pub struct UsersImporter {
    now: NaiveDateTime,
    owner_exists: bool,
    slugs: SlugSet,
}

#[async_trait]
impl DirectGenerator for UsersImporter {
    fn table(&self) -> &'static str {
        "users"
    }

    fn default_quantity(&self) -> usize {
        8
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        let existing = ctx.select("users").await?;
        self.owner_exists = existing
            .iter()
            .any(|user| user.get("id").is_some_and(|id| id.to_string() == OWNER_USER_ID));
        self.slugs.extend_existing(&existing);
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let id = if index == 0 && !self.owner_exists {
            OWNER_USER_ID.to_string()
        } else {
            object_id(rng)
        };
        let name: String = fake::faker::name::en::Name().fake_with_rng(rng);
        let slug = self.slugs.claim(&name);
        let bio: String = fake::faker::lorem::en::Sentence(6..14).fake_with_rng(rng);
        let created_at = between(self.now - Duration::days(365), self.now, rng);

        Ok(Some(row([
            ("id", Value::text(id)),
            ("name", Value::text(name)),
            ("email", Value::text(format!("{slug}@example.com"))),
            ("slug", Value::text(slug)),
            ("bio", Value::text(bio)),
            ("status", Value::text("active")),
            ("created_at", Value::from(created_at)),
            ("updated_at", Value::from(created_at)),
        ])))
    }
}
