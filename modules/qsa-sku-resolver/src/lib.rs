#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod mappings;
#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use qsa_db::EngraveDb;
use qsa_interface::{Design, ErrorCode, Revision, WorkflowError, WorkflowResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use mappings::MappingUpsert;

/// Longest mapping pattern the store accepts.
pub const MAX_PATTERN_LEN: usize = 64;

static NATIVE_SKU: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{4}([a-z])?-[0-9]{5}$").expect("native SKU pattern compiles"));

/// How a mapping's pattern is applied to a SKU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Whole-string equality.
    Exact,
    /// SKU starts with the pattern.
    Prefix,
    /// SKU ends with the pattern.
    Suffix,
    /// Pattern is a regular expression.
    Regex,
}

impl MatchType {
    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Prefix => "prefix",
            MatchType::Suffix => "suffix",
            MatchType::Regex => "regex",
        }
    }
}

impl FromStr for MatchType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(MatchType::Exact),
            "prefix" => Ok(MatchType::Prefix),
            "suffix" => Ok(MatchType::Suffix),
            "regex" => Ok(MatchType::Regex),
            other => Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("unknown match type '{}'", other),
            )),
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored mapping rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuMapping {
    /// Primary key.
    pub id: i64,
    /// The pattern to match, stored verbatim.
    pub legacy_pattern: String,
    /// How the pattern applies.
    pub match_type: MatchType,
    /// Canonical 4-character design code the mapping resolves to.
    pub canonical_code: String,
    /// Revision the mapping pins, if any.
    pub revision: Option<Revision>,
    /// Precedence, lower wins.
    pub priority: u16,
    /// Inactive mappings are skipped without deletion.
    pub is_active: bool,
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSku {
    /// Canonical design code.
    pub design: Design,
    /// Revision, if the SKU or mapping pins one.
    pub revision: Option<Revision>,
    /// True when a mapping rule (not the native shape) resolved it.
    pub is_legacy: bool,
}

/// The SKU resolver, with its per-instance memo.
#[derive(Debug, Clone)]
pub struct SkuResolver {
    db: EngraveDb,
    cache: Arc<Mutex<HashMap<String, Option<ResolvedSku>>>>,
}

impl SkuResolver {
    /// Creates a resolver over `db`.
    pub fn new(db: EngraveDb) -> Self {
        Self {
            db,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves a SKU to its canonical (design, revision), or `None` when
    /// neither the native shape nor any mapping matches.
    pub fn resolve(&self, sku: &str) -> WorkflowResult<Option<ResolvedSku>> {
        let key = sku.to_ascii_lowercase();
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            return Ok(hit.clone());
        }

        let resolved = self.resolve_uncached(sku)?;
        self.cache.lock().unwrap().insert(key, resolved.clone());
        Ok(resolved)
    }

    fn resolve_uncached(&self, sku: &str) -> WorkflowResult<Option<ResolvedSku>> {
        if let Some(native) = parse_native(sku) {
            return Ok(Some(native));
        }

        let mappings = self.active_mappings()?;
        let lowered = sku.to_ascii_lowercase();

        for pass in [
            MatchType::Exact,
            MatchType::Prefix,
            MatchType::Suffix,
            MatchType::Regex,
        ] {
            let mut candidates: Vec<&SkuMapping> =
                mappings.iter().filter(|m| m.match_type == pass).collect();
            match pass {
                // Regex rules rank purely by priority.
                MatchType::Regex => {
                    candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)))
                }
                // Longer patterns outrank shorter ones; priority breaks
                // ties.
                _ => candidates.sort_by(|a, b| {
                    b.legacy_pattern
                        .len()
                        .cmp(&a.legacy_pattern.len())
                        .then(a.priority.cmp(&b.priority))
                        .then(a.id.cmp(&b.id))
                }),
            }

            for mapping in candidates {
                let pattern = mapping.legacy_pattern.to_ascii_lowercase();
                let matched = match pass {
                    MatchType::Exact => lowered == pattern,
                    MatchType::Prefix => lowered.starts_with(&pattern),
                    MatchType::Suffix => lowered.ends_with(&pattern),
                    MatchType::Regex => {
                        match Regex::new(&format!("(?i){}", mapping.legacy_pattern)) {
                            Ok(regex) => regex.is_match(sku),
                            Err(e) => {
                                tracing::warn!(
                                    mapping_id = mapping.id,
                                    pattern = %mapping.legacy_pattern,
                                    error = %e,
                                    "skipping invalid regex mapping"
                                );
                                false
                            }
                        }
                    }
                };
                if matched {
                    return Ok(Some(ResolvedSku {
                        design: Design::try_new(&mapping.canonical_code)?,
                        revision: mapping.revision,
                        is_legacy: true,
                    }));
                }
            }
        }
        Ok(None)
    }

    pub(crate) fn invalidate_cache(&self) {
        self.cache.lock().unwrap().clear();
    }
}

/// Structural resolution of the native `DSGN[r]-NNNNN` shape. Native SKUs
/// never consult the mapping table.
fn parse_native(sku: &str) -> Option<ResolvedSku> {
    let captures = NATIVE_SKU.captures(sku)?;
    let design = Design::try_new(&sku[..4]).ok()?;
    let revision = captures
        .get(1)
        .and_then(|m| m.as_str().chars().next())
        .and_then(|c| Revision::try_new(c).ok());
    Some(ResolvedSku {
        design,
        revision,
        is_legacy: false,
    })
}
