use qsa_db::SqlResultExt;
use qsa_interface::{ErrorCode, Revision, WorkflowError, WorkflowResult};
use regex::Regex;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::{MatchType, SkuMapping, SkuResolver, MAX_PATTERN_LEN};

/// Inputs for creating or replacing a mapping rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingUpsert {
    /// The pattern to match.
    pub legacy_pattern: String,
    /// How the pattern applies.
    pub match_type: MatchType,
    /// Canonical 4-character design code.
    pub canonical_code: String,
    /// Revision to pin, if any.
    pub revision: Option<Revision>,
    /// Precedence, lower wins.
    pub priority: u16,
    /// Whether the rule participates in resolution.
    pub is_active: bool,
}

impl SkuResolver {
    /// All mapping rules, active or not, in precedence order.
    pub fn list_mappings(&self) -> WorkflowResult<Vec<SkuMapping>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, legacy_pattern, match_type, canonical_code,
                            revision, priority, is_active
                     FROM sku_mappings ORDER BY priority, id",
                )
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map([], mapping_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Active mapping rules only, in precedence order.
    pub(crate) fn active_mappings(&self) -> WorkflowResult<Vec<SkuMapping>> {
        Ok(self
            .list_mappings()?
            .into_iter()
            .filter(|m| m.is_active)
            .collect())
    }

    /// Creates a mapping rule. Patterns are validated up front: length,
    /// regex compilability, and (pattern, match_type) uniqueness.
    pub fn create_mapping(&self, mapping: &MappingUpsert) -> WorkflowResult<i64> {
        validate_mapping(mapping)?;
        let id = self.db.with_tx(|tx| {
            let duplicate: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM sku_mappings
                     WHERE legacy_pattern = ?1 COLLATE NOCASE AND match_type = ?2",
                    params![mapping.legacy_pattern, mapping.match_type.as_str()],
                    |row| row.get(0),
                )
                .storage(ErrorCode::TransactionFailed)?;
            if duplicate > 0 {
                return Err(WorkflowError::new(
                    ErrorCode::DuplicatePattern,
                    format!(
                        "a {} mapping for '{}' already exists",
                        mapping.match_type, mapping.legacy_pattern
                    ),
                ));
            }
            tx.execute(
                "INSERT INTO sku_mappings
                     (legacy_pattern, match_type, canonical_code, revision, priority, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    mapping.legacy_pattern,
                    mapping.match_type.as_str(),
                    mapping.canonical_code.to_ascii_uppercase(),
                    mapping.revision.map(|r| r.letter().to_string()),
                    mapping.priority,
                    mapping.is_active,
                ],
            )
            .storage(ErrorCode::InsertFailed)?;
            Ok(tx.last_insert_rowid())
        })?;
        self.invalidate_cache();
        Ok(id)
    }

    /// Replaces an existing mapping rule in place.
    pub fn update_mapping(&self, id: i64, mapping: &MappingUpsert) -> WorkflowResult<()> {
        validate_mapping(mapping)?;
        let affected = self.db.with_tx(|tx| {
            tx.execute(
                "UPDATE sku_mappings SET
                     legacy_pattern = ?1, match_type = ?2, canonical_code = ?3,
                     revision = ?4, priority = ?5, is_active = ?6
                 WHERE id = ?7",
                params![
                    mapping.legacy_pattern,
                    mapping.match_type.as_str(),
                    mapping.canonical_code.to_ascii_uppercase(),
                    mapping.revision.map(|r| r.letter().to_string()),
                    mapping.priority,
                    mapping.is_active,
                    id,
                ],
            )
            .storage(ErrorCode::UpdateFailed)
        })?;
        if affected == 0 {
            return Err(WorkflowError::not_found(format!("mapping {} does not exist", id)));
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Deletes a mapping rule.
    pub fn delete_mapping(&self, id: i64) -> WorkflowResult<()> {
        let affected = self.db.with_tx(|tx| {
            tx.execute("DELETE FROM sku_mappings WHERE id = ?1", params![id])
                .storage(ErrorCode::DeleteFailed)
        })?;
        if affected == 0 {
            return Err(WorkflowError::not_found(format!("mapping {} does not exist", id)));
        }
        self.invalidate_cache();
        Ok(())
    }

    /// Dry-runs one pattern against a sample SKU, for the mapping editor.
    pub fn test_pattern(
        &self,
        pattern: &str,
        match_type: MatchType,
        sample: &str,
    ) -> WorkflowResult<bool> {
        if pattern.len() > MAX_PATTERN_LEN {
            return Err(WorkflowError::validation(
                ErrorCode::PatternTooLong,
                format!("pattern exceeds {} characters", MAX_PATTERN_LEN),
            ));
        }
        let lowered = sample.to_ascii_lowercase();
        let pattern_lowered = pattern.to_ascii_lowercase();
        Ok(match match_type {
            MatchType::Exact => lowered == pattern_lowered,
            MatchType::Prefix => lowered.starts_with(&pattern_lowered),
            MatchType::Suffix => lowered.ends_with(&pattern_lowered),
            MatchType::Regex => Regex::new(&format!("(?i){}", pattern))
                .map_err(|e| {
                    WorkflowError::validation(
                        ErrorCode::InvalidRegex,
                        format!("pattern does not compile: {}", e),
                    )
                })?
                .is_match(sample),
        })
    }
}

fn validate_mapping(mapping: &MappingUpsert) -> WorkflowResult<()> {
    if mapping.legacy_pattern.is_empty() {
        return Err(WorkflowError::validation(
            ErrorCode::InvalidParams,
            "mapping pattern must not be empty",
        ));
    }
    if mapping.legacy_pattern.len() > MAX_PATTERN_LEN {
        return Err(WorkflowError::validation(
            ErrorCode::PatternTooLong,
            format!("pattern exceeds {} characters", MAX_PATTERN_LEN),
        ));
    }
    let code = mapping.canonical_code.to_ascii_uppercase();
    if code.len() != 4 || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(WorkflowError::validation(
            ErrorCode::InvalidSkuFormat,
            format!("'{}' is not a 4-character canonical code", mapping.canonical_code),
        ));
    }
    if mapping.match_type == MatchType::Regex {
        Regex::new(&format!("(?i){}", mapping.legacy_pattern)).map_err(|e| {
            WorkflowError::validation(
                ErrorCode::InvalidRegex,
                format!("pattern does not compile: {}", e),
            )
        })?;
    }
    Ok(())
}

fn mapping_from_row(row: &Row<'_>) -> rusqlite::Result<SkuMapping> {
    let match_type = row
        .get::<_, String>(2)?
        .parse::<MatchType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let revision = row
        .get::<_, Option<String>>(4)?
        .map(|s| {
            Revision::parse_opt(&s)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))
        })
        .transpose()?
        .flatten();
    Ok(SkuMapping {
        id: row.get(0)?,
        legacy_pattern: row.get(1)?,
        match_type,
        canonical_code: row.get(3)?,
        revision,
        priority: row.get(5)?,
        is_active: row.get(6)?,
    })
}
