use qsa_interface::{Design, ErrorCode, Revision, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};

use crate::call::validate_position;
use crate::{revision_column, ConfigStore, ElementType};

/// One element row as it appears in the CSV contract, CAD frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvElement {
    /// Carrier position.
    pub position: u8,
    /// Element type.
    pub element_type: ElementType,
    /// CAD origin X in millimeters.
    pub origin_x: f64,
    /// CAD origin Y in millimeters.
    pub origin_y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Text height in millimeters.
    pub text_height: Option<f64>,
    /// Element size in millimeters.
    pub element_size: Option<f64>,
}

impl CsvElement {
    fn key(&self) -> (u8, ElementType) {
        (self.position, self.element_type)
    }
}

/// The on-disk CSV record, including the per-file design and revision
/// columns.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRecord {
    qsa_design: String,
    revision: String,
    position: u8,
    element_type: String,
    origin_x: f64,
    origin_y: f64,
    rotation: f64,
    #[serde(default)]
    text_height: Option<f64>,
    #[serde(default)]
    element_size: Option<f64>,
}

/// A previewed import: the three-way difference between an uploaded CSV
/// and the stored configuration for its (design, revision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportDelta {
    /// Design the file configures.
    pub design: String,
    /// Revision the file configures (`None` = design default).
    pub revision: Option<Revision>,
    /// Incoming elements with no stored counterpart.
    pub additions: Vec<CsvElement>,
    /// Incoming elements whose stored counterpart differs.
    pub updates: Vec<CsvElement>,
    /// Stored (position, element_type) keys absent from the file.
    pub deletions: Vec<(u8, ElementType)>,
}

impl ImportDelta {
    /// True when applying the delta would change nothing.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.updates.is_empty() && self.deletions.is_empty()
    }
}

impl ConfigStore {
    /// Parses and validates an uploaded CSV, returning the delta that
    /// [`ConfigStore::apply_import`] would apply. Nothing is written.
    pub fn preview_import(&self, csv_text: &str) -> WorkflowResult<ImportDelta> {
        let (design, revision, incoming) = parse_csv(csv_text)?;
        let stored = self.stored_elements(&design, &revision_column(revision))?;

        let mut additions = Vec::new();
        let mut updates = Vec::new();
        for element in &incoming {
            match stored.iter().find(|s| s.key() == element.key()) {
                None => additions.push(element.clone()),
                Some(existing) if existing != element => updates.push(element.clone()),
                Some(_) => {}
            }
        }
        let deletions = stored
            .iter()
            .filter(|s| !incoming.iter().any(|e| e.key() == s.key()))
            .map(|s| s.key())
            .collect();

        Ok(ImportDelta {
            design: design.as_str().to_string(),
            revision,
            additions,
            updates,
            deletions,
        })
    }

    /// Exports the stored configuration for (design, revision) in the
    /// import column format, so `import(export(config))` is a no-op.
    pub fn export_csv(
        &self,
        design: &Design,
        revision: Option<Revision>,
    ) -> WorkflowResult<String> {
        let elements = self.stored_elements(design, &revision_column(revision))?;
        if elements.is_empty() {
            return Err(WorkflowError::new(
                ErrorCode::ConfigNotFound,
                format!("nothing to export for design {}", design),
            ));
        }

        let mut writer = csv::Writer::from_writer(Vec::new());
        for element in &elements {
            let record = CsvRecord {
                qsa_design: design.as_str().to_string(),
                revision: revision_column(revision),
                position: element.position,
                element_type: element.element_type.as_str().to_string(),
                origin_x: element.origin_x,
                origin_y: element.origin_y,
                rotation: element.rotation,
                text_height: element.text_height,
                element_size: element.element_size,
            };
            writer.serialize(record).map_err(csv_error)?;
        }
        let bytes = writer.into_inner().map_err(|e| csv_error(e.into_error().into()))?;
        String::from_utf8(bytes)
            .map_err(|_| WorkflowError::internal("csv export produced invalid utf-8"))
    }
}

/// Parses the CSV contract: required columns, one (design, revision) per
/// file, at least one position-0 QR code and one module-ID text.
fn parse_csv(csv_text: &str) -> WorkflowResult<(Design, Option<Revision>, Vec<CsvElement>)> {
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let mut design: Option<Design> = None;
    let mut revision: Option<Option<Revision>> = None;
    let mut elements: Vec<CsvElement> = Vec::new();

    for (index, record) in reader.deserialize::<CsvRecord>().enumerate() {
        let line = index + 2; // header is line 1
        let record = record.map_err(|e| {
            WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!("csv line {}: {}", line, e),
            )
        })?;

        let row_design = Design::try_new(&record.qsa_design)?;
        let row_revision = Revision::parse_opt(record.revision.trim())?;
        match (&design, &revision) {
            (None, _) => {
                design = Some(row_design);
                revision = Some(row_revision);
            }
            (Some(d), Some(r)) if *d != row_design || *r != row_revision => {
                return Err(WorkflowError::validation(
                    ErrorCode::InvalidParams,
                    format!(
                        "csv line {}: all rows must share one (design, revision)",
                        line
                    ),
                ));
            }
            _ => {}
        }

        let element_type: ElementType = record.element_type.parse()?;
        validate_position(element_type, record.position)?;
        let element = CsvElement {
            position: record.position,
            element_type,
            origin_x: record.origin_x,
            origin_y: record.origin_y,
            rotation: record.rotation,
            text_height: record.text_height,
            element_size: record.element_size,
        };
        if elements.iter().any(|e| e.key() == element.key()) {
            return Err(WorkflowError::validation(
                ErrorCode::InvalidParams,
                format!(
                    "csv line {}: duplicate element ({}, {})",
                    line, element.position, element.element_type
                ),
            ));
        }
        elements.push(element);
    }

    let design = design.ok_or_else(|| {
        WorkflowError::validation(ErrorCode::InvalidParams, "csv file contains no rows")
    })?;
    let revision = revision.unwrap_or(None);

    if !elements
        .iter()
        .any(|e| e.element_type == ElementType::QrCode && e.position == 0)
    {
        return Err(WorkflowError::validation(
            ErrorCode::MissingQrCode,
            "csv must define a qr_code element at position 0",
        ));
    }
    if !elements
        .iter()
        .any(|e| e.element_type == ElementType::ModuleId && (1..=8).contains(&e.position))
    {
        return Err(WorkflowError::validation(
            ErrorCode::MissingModuleId,
            "csv must define a module_id element on a module position",
        ));
    }

    Ok((design, revision, elements))
}

fn csv_error(e: csv::Error) -> WorkflowError {
    WorkflowError::internal(format!("csv write failed: {}", e))
}
