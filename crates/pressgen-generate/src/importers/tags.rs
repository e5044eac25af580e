use async_trait::async_trait;
use chrono::NaiveDateTime;
use fake::Fake;
use rand::{Rng, RngCore};

use pressgen_core::{Row, Value};

use super::{SlugSet, row};
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};
use crate::random::object_id;

#[derive(Debug, Default)]
pub struct TagsImporter {
    now: NaiveDateTime,
    slugs: SlugSet,
}

#[async_trait]
impl DirectGenerator for TagsImporter {
    fn table(&self) -> &'static str {
        "tags"
    }

    fn default_quantity(&self) -> usize {
        10
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        self.slugs.extend_existing(&ctx.select("tags").await?);
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        _index: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let words: Vec<String> = fake::faker::lorem::en::Words(1..3).fake_with_rng(rng);
        let name = title_case(&words.join(" "));
        let description: String = fake::faker::lorem::en::Sentence(4..10).fake_with_rng(rng);
        // Internal tags are hidden from readers and prefixed with '#'.
        let internal = rng.random_bool(0.1);
        let name = if internal { format!("#{name}") } else { name };
        let now = Value::from(self.now);

        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("slug", Value::text(self.slugs.claim(&name))),
            ("name", Value::text(name)),
            ("description", Value::text(description)),
            (
                "visibility",
                Value::text(if internal { "internal" } else { "public" }),
            ),
            ("created_at", now.clone()),
            ("updated_at", now),
        ])))
    }
}

pub(crate) fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::title_case;

    #[test]
    fn title_cases_each_word() {
        assert_eq!(title_case("quick brown fox"), "Quick Brown Fox");
    }
}
