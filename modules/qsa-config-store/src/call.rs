use qsa_db::SqlResultExt;
use qsa_interface::{Design, ErrorCode, Revision, WorkflowError, WorkflowResult};
use rusqlite::params;

use crate::csv_io::{CsvElement, ImportDelta};
use crate::{revision_column, ConfigStore, ElementType};

/// Inputs for one element upsert, in the CAD frame.
#[derive(Debug, Clone, Copy)]
pub struct ElementUpsert {
    /// Carrier position: 0 for design-level, 1-8 for module slots.
    pub position: u8,
    /// What gets placed.
    pub element_type: ElementType,
    /// CAD origin X in millimeters.
    pub origin_x: f64,
    /// CAD origin Y in millimeters (bottom-left frame).
    pub origin_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Text height in millimeters.
    pub text_height: Option<f64>,
    /// Element size in millimeters.
    pub element_size: Option<f64>,
}

impl ConfigStore {
    /// Inserts or updates one element placement. Design-level elements
    /// must sit at position 0, module-level elements at 1-8.
    pub fn set_element(
        &self,
        design: &Design,
        revision: Option<Revision>,
        element: ElementUpsert,
    ) -> WorkflowResult<i64> {
        validate_position(element.element_type, element.position)?;
        self.db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO config_elements
                     (design, revision, position, element_type,
                      origin_x, origin_y, rotation, text_height, element_size, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
                 ON CONFLICT (design, revision, position, element_type) DO UPDATE SET
                     origin_x = excluded.origin_x,
                     origin_y = excluded.origin_y,
                     rotation = excluded.rotation,
                     text_height = excluded.text_height,
                     element_size = excluded.element_size,
                     is_active = 1",
                params![
                    design.as_str(),
                    revision_column(revision),
                    element.position,
                    element.element_type.as_str(),
                    element.origin_x,
                    element.origin_y,
                    element.rotation,
                    element.text_height,
                    element.element_size,
                ],
            )
            .storage(ErrorCode::InsertFailed)?;
            tx.query_row(
                "SELECT id FROM config_elements
                 WHERE design = ?1 AND revision = ?2 AND position = ?3 AND element_type = ?4",
                params![
                    design.as_str(),
                    revision_column(revision),
                    element.position,
                    element.element_type.as_str(),
                ],
                |row| row.get(0),
            )
            .storage(ErrorCode::InsertFailed)
        })
    }

    /// Removes one element placement.
    pub fn delete_element(
        &self,
        design: &Design,
        revision: Option<Revision>,
        position: u8,
        element_type: ElementType,
    ) -> WorkflowResult<()> {
        let affected = self.db.with_tx(|tx| {
            tx.execute(
                "DELETE FROM config_elements
                 WHERE design = ?1 AND revision = ?2 AND position = ?3 AND element_type = ?4",
                params![
                    design.as_str(),
                    revision_column(revision),
                    position,
                    element_type.as_str(),
                ],
            )
            .storage(ErrorCode::DeleteFailed)
        })?;
        if affected == 0 {
            return Err(WorkflowError::not_found(format!(
                "no {} element at position {} for {}",
                element_type, position, design
            )));
        }
        Ok(())
    }

    /// Applies a previewed import delta in one transaction: deletions,
    /// then upserts for additions and updates.
    pub fn apply_import(&self, delta: &ImportDelta) -> WorkflowResult<()> {
        let design = Design::try_new(&delta.design)?;
        let revision_col = revision_column(delta.revision);

        self.db.with_tx(|tx| {
            for (position, element_type) in &delta.deletions {
                tx.execute(
                    "DELETE FROM config_elements
                     WHERE design = ?1 AND revision = ?2 AND position = ?3 AND element_type = ?4",
                    params![design.as_str(), revision_col, position, element_type.as_str()],
                )
                .storage(ErrorCode::DeleteFailed)?;
            }
            for element in delta.additions.iter().chain(&delta.updates) {
                tx.execute(
                    "INSERT INTO config_elements
                         (design, revision, position, element_type,
                          origin_x, origin_y, rotation, text_height, element_size, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)
                     ON CONFLICT (design, revision, position, element_type) DO UPDATE SET
                         origin_x = excluded.origin_x,
                         origin_y = excluded.origin_y,
                         rotation = excluded.rotation,
                         text_height = excluded.text_height,
                         element_size = excluded.element_size,
                         is_active = 1",
                    params![
                        design.as_str(),
                        revision_col,
                        element.position,
                        element.element_type.as_str(),
                        element.origin_x,
                        element.origin_y,
                        element.rotation,
                        element.text_height,
                        element.element_size,
                    ],
                )
                .storage(ErrorCode::InsertFailed)?;
            }
            tracing::info!(
                design = %design,
                added = delta.additions.len(),
                updated = delta.updates.len(),
                deleted = delta.deletions.len(),
                "applied config import"
            );
            Ok(())
        })
    }
}

pub(crate) fn validate_position(element_type: ElementType, position: u8) -> WorkflowResult<()> {
    if element_type.is_design_level() {
        if position != 0 {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidPosition,
                format!("{} is design-level and must sit at position 0", element_type),
            ));
        }
    } else if !(1..=8).contains(&position) {
        return Err(WorkflowError::validation(
            ErrorCode::InvalidPosition,
            format!("{} must sit at a module position 1-8", element_type),
        ));
    }
    Ok(())
}
