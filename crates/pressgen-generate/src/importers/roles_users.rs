use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use rand::RngCore;

use pressgen_core::{Row, Value};

use super::roles::{ADMINISTRATOR, OWNER};
use super::users::OWNER_USER_ID;
use super::{optional_text, row, text_column};
use crate::errors::GenerationError;
use crate::importer::{ImportContext, ReferencedGenerator};
use crate::random::{object_id, pick};

/// One role per user: the owner account is an administrator, everyone else
/// gets a random non-owner staff role. Users that already hold a role are
/// left alone.
#[derive(Debug, Default)]
pub struct RolesUsersImporter {
    roles: BTreeMap<String, String>,
    assigned: HashSet<String>,
    pending: Option<String>,
}

impl RolesUsersImporter {
    fn role_id(&self, name: &str) -> Result<&str, GenerationError> {
        self.roles
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| GenerationError::missing_reference("roles", "name", name))
    }
}

#[async_trait]
impl ReferencedGenerator for RolesUsersImporter {
    fn table(&self) -> &'static str {
        "roles_users"
    }

    fn reference_table(&self) -> &'static str {
        "users"
    }

    fn default_quantity(&self) -> usize {
        1
    }

    async fn load(&mut self, ctx: &mut ImportContext<'_>) -> Result<(), GenerationError> {
        for role in ctx.select("roles").await? {
            let id = text_column(&role, "roles", "id")?;
            if let Some(name) = optional_text(&role, "name") {
                self.roles.insert(name, id);
            }
        }
        self.assigned = ctx
            .select("roles_users")
            .await?
            .iter()
            .filter_map(|link| optional_text(link, "user_id"))
            .collect();
        Ok(())
    }

    fn set_referenced_model(
        &mut self,
        reference: &Row,
        _rng: &mut dyn RngCore,
    ) -> Result<(), GenerationError> {
        let user_id = text_column(reference, "users", "id")?;
        self.pending = (!self.assigned.contains(&user_id)).then_some(user_id);
        Ok(())
    }

    fn generate(&mut self, rng: &mut dyn RngCore) -> Result<Option<Row>, GenerationError> {
        let Some(user_id) = self.pending.take() else {
            return Ok(None);
        };

        let role_id = if user_id == OWNER_USER_ID {
            self.role_id(ADMINISTRATOR)?.to_string()
        } else {
            let staff: Vec<&String> = self
                .roles
                .iter()
                .filter(|(name, _)| name.as_str() != OWNER && name.as_str() != ADMINISTRATOR)
                .map(|(_, id)| id)
                .collect();
            match pick(&staff, rng) {
                Some(id) => id.to_string(),
                None => self.role_id(ADMINISTRATOR)?.to_string(),
            }
        };

        self.assigned.insert(user_id.clone());
        Ok(Some(row([
            ("id", Value::text(object_id(rng))),
            ("role_id", Value::text(role_id)),
            ("user_id", Value::text(user_id)),
        ])))
    }
}
