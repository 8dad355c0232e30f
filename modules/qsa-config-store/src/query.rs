use std::collections::BTreeMap;

use qsa_db::SqlResultExt;
use qsa_interface::{Design, ErrorCode, Revision, WorkflowError, WorkflowResult};
use rusqlite::types::Type;
use rusqlite::{params, Row};

use crate::csv_io::CsvElement;
use crate::{
    revision_column, ConfigStore, ConfigValidation, DesignConfig, ElementConfig, ElementType,
};

impl ConfigStore {
    /// Resolves the element configuration for (design, revision).
    ///
    /// Lookup order: the requested revision, then the design default,
    /// then any revision on file in declaration order. Serving a fallback
    /// logs a warning so silently-drifting test rigs get noticed.
    pub fn get_config(
        &self,
        design: &Design,
        revision: Option<Revision>,
    ) -> WorkflowResult<DesignConfig> {
        let requested = revision_column(revision);
        let mut used = requested.clone();
        let mut rows = self.stored_elements(design, &used)?;
        let mut fallback = false;

        if rows.is_empty() && revision.is_some() {
            used = String::new();
            rows = self.stored_elements(design, &used)?;
            fallback = true;
        }
        if rows.is_empty() {
            if let Some(first) = self.first_declared_revision(design, &requested)? {
                used = first;
                rows = self.stored_elements(design, &used)?;
                fallback = true;
            }
        }
        if rows.is_empty() {
            return Err(WorkflowError::new(
                ErrorCode::ConfigNotFound,
                format!(
                    "no element configuration for design {} revision {:?}",
                    design, revision
                ),
            ));
        }
        if fallback {
            tracing::warn!(
                design = %design,
                requested = %display_revision(&requested),
                used = %display_revision(&used),
                "config revision fallback"
            );
        }

        let mut elements: BTreeMap<u8, BTreeMap<ElementType, ElementConfig>> = BTreeMap::new();
        for row in rows {
            let config = ElementConfig {
                element_type: row.element_type,
                position: row.position,
                x: row.origin_x,
                y: self.svg_y(row.origin_y),
                rotation: row.rotation,
                text_height: row.text_height,
                element_size: row.element_size,
            };
            elements
                .entry(row.position)
                .or_default()
                .insert(row.element_type, config);
        }

        Ok(DesignConfig {
            design: design.as_str().to_string(),
            revision_used: Revision::parse_opt(&used)?,
            fallback,
            elements,
        })
    }

    /// All designs with configuration on file.
    pub fn designs(&self) -> WorkflowResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT DISTINCT design FROM config_elements ORDER BY design")
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Revisions on file for a design; the design default appears as `""`.
    pub fn revisions(&self, design: &Design) -> WorkflowResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT revision FROM config_elements
                     WHERE design = ?1 ORDER BY revision",
                )
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![design.as_str()], |row| row.get::<_, String>(0))
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// Checks that (design, revision) carries everything composition
    /// needs: the carrier QR code at position 0, and a Micro-ID plus a
    /// module-ID text on each of the first `positions` slots.
    pub fn validate_config(
        &self,
        design: &Design,
        revision: Option<Revision>,
        positions: u8,
    ) -> WorkflowResult<ConfigValidation> {
        let config = match self.get_config(design, revision) {
            Ok(config) => config,
            Err(e) if e.code == ErrorCode::ConfigNotFound => {
                return Ok(ConfigValidation {
                    valid: false,
                    missing: vec!["position 0: qr_code".to_string()],
                })
            }
            Err(e) => return Err(e),
        };

        let mut missing = Vec::new();
        if config.element(0, ElementType::QrCode).is_none() {
            missing.push("position 0: qr_code".to_string());
        }
        for position in 1..=positions {
            for required in [ElementType::MicroId, ElementType::ModuleId] {
                if config.element(position, required).is_none() {
                    missing.push(format!("position {}: {}", position, required));
                }
            }
        }
        Ok(ConfigValidation {
            valid: missing.is_empty(),
            missing,
        })
    }

    /// The stored rows for (design, revision column), CAD frame, used by
    /// the CSV export and the import delta.
    pub(crate) fn stored_elements(
        &self,
        design: &Design,
        revision_col: &str,
    ) -> WorkflowResult<Vec<CsvElement>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT position, element_type, origin_x, origin_y, rotation,
                            text_height, element_size
                     FROM config_elements
                     WHERE design = ?1 AND revision = ?2 AND is_active = 1
                     ORDER BY position, element_type",
                )
                .storage(ErrorCode::TransactionFailed)?;
            let rows = stmt
                .query_map(params![design.as_str(), revision_col], element_from_row)
                .storage(ErrorCode::TransactionFailed)?;
            rows.collect::<Result<Vec<_>, _>>()
                .storage(ErrorCode::TransactionFailed)
        })
    }

    /// The first revision ever declared for a design, skipping the one
    /// already tried.
    fn first_declared_revision(
        &self,
        design: &Design,
        skip: &str,
    ) -> WorkflowResult<Option<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT revision FROM config_elements
                     WHERE design = ?1 AND revision != ?2 AND is_active = 1
                     GROUP BY revision ORDER BY MIN(id) LIMIT 1",
                )
                .storage(ErrorCode::TransactionFailed)?;
            let mut rows = stmt
                .query_map(params![design.as_str(), skip], |row| row.get::<_, String>(0))
                .storage(ErrorCode::TransactionFailed)?;
            rows.next()
                .transpose()
                .storage(ErrorCode::TransactionFailed)
        })
    }
}

fn element_from_row(row: &Row<'_>) -> rusqlite::Result<CsvElement> {
    let element_type = row
        .get::<_, String>(1)?
        .parse::<ElementType>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(CsvElement {
        position: row.get(0)?,
        element_type,
        origin_x: row.get(2)?,
        origin_y: row.get(3)?,
        rotation: row.get(4)?,
        text_height: row.get(5)?,
        element_size: row.get(6)?,
    })
}

fn display_revision(col: &str) -> &str {
    if col.is_empty() {
        "(default)"
    } else {
        col
    }
}
