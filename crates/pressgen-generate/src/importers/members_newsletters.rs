use async_trait::async_trait;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{row, text_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::object_id;

const DEFAULT_NEWSLETTER_SHARE: f64 = 0.9;
const OPTIONAL_NEWSLETTER_SHARE: f64 = 0.4;

/// Newsletter subscriptions per member. Most members keep the newsletters
/// they were signed up to by default; fewer opt into the others.
#[derive(Debug, Default)]
pub struct MembersNewslettersImporter {
    newsletters: Vec<(String, bool)>,
    member_id: String,
    pending: Vec<String>,
}

#[async_trait]
impl ReferencedGenerator for MembersNewslettersImporter {
    fn table(&self) -> &'static str {
        "members_newsletters"
    }

    fn reference_table(&self) -> &'static str {
        "members"
    }

    fn default_quantity(&self) -> usize {
        8
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        let mut newsletters = ctx.select("newsletters").await?;
        newsletters.sort_by_key(|newsletter| {
            newsletter
                .get("sort_order")
                .and_then(Value::as_i64)
                .unwrap_or(i64::MAX)
        });
        self.newsletters = newsletters
            .iter()
            .map(|newsletter| {
                let id = text_column(newsletter, "newsletters", "id")?;
                let on_signup = newsletter
                    .get("subscribe_on_signup")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok((id, on_signup))
            })
            .collect::<Result<_, GenerationError>>()?;
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        self.member_id = text_column(reference, "members", "id")?;
        let mut chosen: Vec<String> = self
            .newsletters
            .iter()
            .filter(|(_, on_signup)| {
                let share = if *on_signup {
                    DEFAULT_NEWSLETTER_SHARE
                } else {
                    OPTIONAL_NEWSLETTER_SHARE
                };
                rng.random_bool(share)
            })
            .map(|(id, _)| id.clone())
            .collect();
        chosen.reverse();
        self.pending = chosen;
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(newsletter_id) = self.pending.pop() else {
            return Ok(None);
        };
        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("member_id", Value::text(self.member_id.clone())),
            ("newsletter_id", Value::text(newsletter_id)),
        ])))
    }
}
