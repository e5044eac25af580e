use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use pressgen_core::parse_timestamp;
use pressgen_generate::GenerateOptions;

use crate::CliError;

/// `pressgen.toml`: defaults for `pressgen generate`. Flags win over the file.
///
/// ```toml
/// tables = ["posts", "members"]
/// seed = 42
/// database_url = "postgres://localhost/platform"
///
/// [quantities]
/// members = 5000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub tables: Vec<String>,
    pub clear: bool,
    pub base_pack: Option<PathBuf>,
    pub quantities: BTreeMap<String, usize>,
    pub seed: Option<u64>,
    pub now: Option<String>,
    pub database_url: Option<String>,
    pub schema: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<FileConfig, CliError> {
    let content = std::fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Values given on the command line, already parsed.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tables: Vec<String>,
    pub clear: bool,
    pub base_pack: Option<PathBuf>,
    pub quantities: Vec<(String, usize)>,
    pub seed: Option<u64>,
    pub now: Option<NaiveDateTime>,
    pub print_dependencies: bool,
    pub database_url: Option<String>,
    pub schema: Option<PathBuf>,
}

/// Everything `generate` needs after merging flags over the config file.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub options: GenerateOptions,
    pub database_url: Option<String>,
    pub schema: Option<PathBuf>,
}

pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<ResolvedConfig, CliError> {
    let file_now = file
        .now
        .as_deref()
        .map(|raw| {
            parse_timestamp(raw)
                .ok_or_else(|| CliError::Config(format!("invalid timestamp for now: {raw}")))
        })
        .transpose()?;

    let mut quantities = file.quantities;
    quantities.extend(overrides.quantities);

    let options = GenerateOptions {
        tables: if overrides.tables.is_empty() {
            file.tables
        } else {
            overrides.tables
        },
        clear_before_import: overrides.clear || file.clear,
        base_pack: overrides.base_pack.or(file.base_pack),
        quantities,
        seed: overrides.seed.or(file.seed),
        print_dependencies: overrides.print_dependencies,
        reference_time: overrides.now.or(file_now),
    };

    Ok(ResolvedConfig {
        options,
        database_url: overrides.database_url.or(file.database_url),
        schema: overrides.schema.or(file.schema),
    })
}

/// `table=count`, as given to `--quantity`.
pub fn parse_quantity(raw: &str) -> Result<(String, usize), String> {
    let (table, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=COUNT, got '{raw}'"))?;
    let table = table.trim();
    if table.is_empty() {
        return Err(format!("missing table name in '{raw}'"));
    }
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("invalid count in '{raw}': {err}"))?;
    Ok((table.to_string(), count))
}

pub fn parse_reference_time(raw: &str) -> Result<NaiveDateTime, String> {
    parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp '{raw}'"))
}

/// Mask the password of a connection URL before it is logged.
pub fn redact_database_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let authority_end = url[authority_start..]
        .find('/')
        .map(|idx| authority_start + idx)
        .unwrap_or(url.len());
    let Some(at_idx) = url[authority_start..authority_end].rfind('@') else {
        return url.to_string();
    };
    let auth = &url[authority_start..authority_start + at_idx];
    match auth.find(':') {
        Some(colon_idx) => {
            let mut redacted = url.to_string();
            redacted.replace_range(
                authority_start + colon_idx + 1..authority_start + at_idx,
                "***",
            );
            redacted
        }
        None => url.to_string(),
    }
}
