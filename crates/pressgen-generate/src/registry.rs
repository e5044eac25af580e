use pressgen_core::TableCatalog;

use crate::errors::GenerationError;
use crate::importer::{ByReference, Direct, TableImporter};
use crate::importers::{
    email_batches::EmailBatchesImporter, email_recipients::EmailRecipientsImporter,
    emails::EmailsImporter, labels::LabelsImporter, members::MembersImporter,
    members_labels::MembersLabelsImporter, members_newsletters::MembersNewslettersImporter,
    members_subscribe_events::MembersSubscribeEventsImporter, newsletters::NewslettersImporter,
    posts::PostsImporter, posts_authors::PostsAuthorsImporter, posts_tags::PostsTagsImporter,
    roles::RolesImporter, roles_users::RolesUsersImporter, tags::TagsImporter,
    users::UsersImporter,
};

/// A registered table: its name, the tables it must follow and how to build
/// its importer.
#[derive(Clone)]
pub struct ImporterSpec {
    pub table: &'static str,
    pub dependencies: &'static [&'static str],
    pub build: fn() -> Box<dyn TableImporter>,
}

impl std::fmt::Debug for ImporterSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImporterSpec")
            .field("table", &self.table)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Table name → importer. Iteration follows registration order.
#[derive(Debug, Clone, Default)]
pub struct ImporterRegistry {
    specs: Vec<ImporterSpec>,
}

impl ImporterRegistry {
    /// Registry with no importers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every built-in platform table.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        for spec in builtin_specs() {
            registry.register(spec);
        }
        registry
    }

    /// Add an importer, replacing any previous one for the same table.
    pub fn register(&mut self, spec: ImporterSpec) {
        match self.specs.iter_mut().find(|existing| existing.table == spec.table) {
            Some(existing) => *existing = spec,
            None => self.specs.push(spec),
        }
    }

    pub fn tables(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.table.to_string()).collect()
    }

    pub fn spec(&self, table: &str) -> Option<&ImporterSpec> {
        self.specs.iter().find(|spec| spec.table == table)
    }

    pub fn create(&self, table: &str) -> Result<Box<dyn TableImporter>, GenerationError> {
        self.spec(table)
            .map(|spec| (spec.build)())
            .ok_or_else(|| pressgen_core::Error::UnknownTable(table.to_string()).into())
    }
}

impl TableCatalog for ImporterRegistry {
    fn contains(&self, table: &str) -> bool {
        self.spec(table).is_some()
    }

    fn declared_dependencies(&self, table: &str) -> &[&'static str] {
        self.spec(table).map(|spec| spec.dependencies).unwrap_or(&[])
    }
}

fn builtin_specs() -> Vec<ImporterSpec> {
    vec![
        ImporterSpec {
            table: "roles",
            dependencies: &[],
            build: || Box::new(Direct(RolesImporter::default())),
        },
        ImporterSpec {
            table: "users",
            dependencies: &[],
            build: || Box::new(Direct(UsersImporter::default())),
        },
        ImporterSpec {
            table: "roles_users",
            dependencies: &["roles", "users"],
            build: || Box::new(ByReference(RolesUsersImporter::default())),
        },
        ImporterSpec {
            table: "newsletters",
            dependencies: &[],
            build: || Box::new(Direct(NewslettersImporter::default())),
        },
        ImporterSpec {
            table: "tags",
            dependencies: &[],
            build: || Box::new(Direct(TagsImporter::default())),
        },
        ImporterSpec {
            table: "labels",
            dependencies: &[],
            build: || Box::new(Direct(LabelsImporter::default())),
        },
        ImporterSpec {
            table: "posts",
            dependencies: &["newsletters"],
            build: || Box::new(Direct(PostsImporter::default())),
        },
        ImporterSpec {
            table: "posts_tags",
            dependencies: &["posts", "tags"],
            build: || Box::new(ByReference(PostsTagsImporter::default())),
        },
        ImporterSpec {
            table: "posts_authors",
            dependencies: &["posts", "users"],
            build: || Box::new(ByReference(PostsAuthorsImporter::default())),
        },
        ImporterSpec {
            table: "members",
            dependencies: &[],
            build: || Box::new(Direct(MembersImporter::default())),
        },
        ImporterSpec {
            table: "members_labels",
            dependencies: &["members", "labels"],
            build: || Box::new(ByReference(MembersLabelsImporter::default())),
        },
        ImporterSpec {
            table: "members_newsletters",
            dependencies: &["members", "newsletters"],
            build: || Box::new(ByReference(MembersNewslettersImporter::default())),
        },
        ImporterSpec {
            table: "members_subscribe_events",
            dependencies: &["members_newsletters", "members"],
            build: || Box::new(ByReference(MembersSubscribeEventsImporter::default())),
        },
        ImporterSpec {
            table: "emails",
            dependencies: &["posts", "members_subscribe_events"],
            build: || Box::new(ByReference(EmailsImporter::default())),
        },
        ImporterSpec {
            table: "email_batches",
            dependencies: &["emails"],
            build: || Box::new(ByReference(EmailBatchesImporter::default())),
        },
        ImporterSpec {
            table: "email_recipients",
            dependencies: &["email_batches", "members", "members_subscribe_events"],
            build: || Box::new(ByReference(EmailRecipientsImporter::default())),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pressgen_core::{ResolveOptions, SchemaMap, resolve_tables};

    #[test]
    fn every_builtin_table_has_a_schema() {
        let schema = SchemaMap::builtin().expect("schema");
        let registry = ImporterRegistry::new();
        for table in registry.tables() {
            assert!(schema.table(&table).is_some(), "{table} has no schema");
            let importer = registry.create(&table).expect("importer");
            assert_eq!(importer.table(), table);
        }
    }

    #[test]
    fn recipients_resolve_after_their_sources() {
        let schema = SchemaMap::builtin().expect("schema");
        let registry = ImporterRegistry::new();
        let order = resolve_tables(
            &["email_recipients".to_string()],
            &schema,
            &registry,
            &ResolveOptions::default(),
        )
        .expect("order");
        let position = |table: &str| order.iter().position(|t| t == table).expect(table);
        assert_eq!(order.last().map(String::as_str), Some("email_recipients"));
        assert!(position("posts") < position("emails"));
        assert!(position("members_subscribe_events") < position("emails"));
        assert!(position("emails") < position("email_batches"));
        assert!(position("newsletters") < position("posts"));
    }

    #[test]
    fn unknown_table_cannot_be_created() {
        let err = ImporterRegistry::new().create("ghosts").err().expect("error");
        assert!(matches!(
            err,
            GenerationError::Core(pressgen_core::Error::UnknownTable(_))
        ));
    }
}
