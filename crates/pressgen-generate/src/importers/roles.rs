use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::row;
use crate::errors::GenerationError;
use crate::importer::{DirectGenerator, ImportContext};

pub const ADMINISTRATOR: &str = "Administrator";
pub const OWNER: &str = "Owner";

/// Staff roles with fixed ids: `(id, name, description)`.
pub const ROLES: &[(&str, &str, &str)] = &[
    ("000000000000000000000001", ADMINISTRATOR, "Administrators"),
    ("000000000000000000000002", "Editor", "Editors"),
    ("000000000000000000000003", "Author", "Authors"),
    ("000000000000000000000004", "Contributor", "Contributors"),
    ("000000000000000000000005", OWNER, "Site owner"),
];

#[derive(Debug, Default)]
pub struct RolesImporter {
    now: NaiveDateTime,
}

#[async_trait]
impl DirectGenerator for RolesImporter {
    fn table(&self) -> &'static str {
        "roles"
    }

    fn default_quantity(&self) -> usize {
        ROLES.len()
    }

    async fn load(
        &mut self,
        ctx: &mut ImportContext<'_>,
        _quantity: usize,
    ) -> Result<(), GenerationError> {
        self.now = ctx.now;
        Ok(())
    }

    fn generate(
        &mut self,
        index: usize,
        _rng: &mut dyn RngCore,
    ) -> Result<Option<Row>, GenerationError> {
        let Some((id, name, description)) = ROLES.get(index) else {
            return Ok(None);
        };
        let now = Value::from(self.now);
        Ok(Some(row([
            ("id", Value::text(*id)),
            ("name", Value::text(*name)),
            ("description", Value::text(*description)),
            ("created_at", now.clone()),
            ("updated_at", now),
        ])))
    }
}
