use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use fake::Fake;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{SlugSet, ids, row};
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::{between, object_id, pick, uuid};

const PUBLISHED_SHARE: f64 = 0.9;
const PAGE_SHARE: f64 = 0.1;
const NEWSLETTER_SHARE: f64 = 0.5;

/// Posts and pages. Most posts are published over the last year and half of
/// the published posts were also sent to a newsletter.
#[derive(Debug, Default)]
pub struct PostsImporter {
    now: NaiveDateTime,
    newsletters: Vec<String>,
    slugs: SlugSet,
}

#[async_trait]
impl DirectGenerator for PostsImporter {
    fn table(&self) -> &'static str {
        "posts"
    }

    fn default_quantity(&self) -> usize {
        100
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        self.newsletters = ids(&ctx.select("newsletters").await?, "newsletters")?;
        self.slugs.extend_existing(&ctx.select("posts").await?);
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        _index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let sentence: String = fake::faker::lorem::en::Sentence(3..8).fake_with_rng(rng);
        let title = sentence.trim_end_matches('.').to_string();
        let paragraphs: Vec<String> = fake::faker::lorem::en::Paragraphs(2..5).fake_with_rng(rng);

        let kind = if rng.random_bool(PAGE_SHARE) { "page" } else { "post" };
        let published = rng.random_bool(PUBLISHED_SHARE);
        let year_ago = self.now - Duration::days(365);

        let (status, published_at, created_at) = if published {
            let published_at = between(year_ago, self.now, rng);
            let drafted = published_at - Duration::hours(rng.random_range(0..=72));
            ("published", Some(published_at), drafted)
        } else {
            ("draft", None, between(year_ago, self.now, rng))
        };

        let newsletter_id = if published && kind == "post" && rng.random_bool(NEWSLETTER_SHARE) {
            pick(&self.newsletters, rng).cloned()
        } else {
            None
        };
        let filter = if newsletter_id.is_some() { "all" } else { "none" };
        let featured = rng.random_bool(0.1);

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("uuid", Value::text(uuid(rng))),
            ("slug", Value::text(self.slugs.claim(&title))),
            ("title", Value::text(title)),
            ("plaintext", Value::text(paragraphs.join("\n\n"))),
            ("type", Value::text(kind)),
            ("status", Value::text(status)),
            ("visibility", Value::text("public")),
            ("featured", Value::Bool(featured)),
            ("newsletter_id", Value::from(newsletter_id)),
            ("email_recipient_filter", Value::text(filter)),
            ("published_at", Value::from(published_at)),
            ("created_at", Value::from(created_at)),
            ("updated_at", Value::from(published_at.unwrap_or(created_at))),
        ])))
    }
}
