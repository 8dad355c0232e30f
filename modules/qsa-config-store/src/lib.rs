#![doc = include_str!("../README.md")]
#![deny(missing_docs)]

mod call;
mod csv_io;
mod element;
mod query;

use std::collections::BTreeMap;

use qsa_db::EngraveDb;
use qsa_interface::Revision;
use serde::{Deserialize, Serialize};

pub use call::ElementUpsert;
pub use csv_io::{CsvElement, ImportDelta};
pub use element::ElementType;

/// Default canvas height in millimeters, used for the CAD → SVG frame
/// conversion at the read boundary.
pub const DEFAULT_CANVAS_HEIGHT_MM: f64 = 113.7;

/// Number of module positions on a carrier the validator checks.
pub const DEFAULT_POSITIONS: u8 = 8;

/// One element's placement, in the SVG frame (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    /// What gets placed.
    pub element_type: ElementType,
    /// Carrier position: 0 for design-level, 1-8 for module slots.
    pub position: u8,
    /// Origin X in millimeters.
    pub x: f64,
    /// Origin Y in millimeters, already converted to the SVG frame.
    pub y: f64,
    /// Rotation in degrees.
    pub rotation: f64,
    /// Text height in millimeters, for text elements.
    pub text_height: Option<f64>,
    /// Element size in millimeters, for sized elements (the 2-D code).
    pub element_size: Option<f64>,
}

/// The resolved configuration for one (design, revision) pair:
/// `elements[position][element_type]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignConfig {
    /// The design the lookup was for.
    pub design: String,
    /// The revision whose rows were actually used (`None` = design
    /// default rows).
    pub revision_used: Option<Revision>,
    /// True when the requested revision was absent and a fallback served.
    pub fallback: bool,
    /// Placement per position per element type.
    pub elements: BTreeMap<u8, BTreeMap<ElementType, ElementConfig>>,
}

impl DesignConfig {
    /// The element at (position, type), if configured.
    pub fn element(&self, position: u8, element_type: ElementType) -> Option<&ElementConfig> {
        self.elements.get(&position)?.get(&element_type)
    }
}

/// Result of a configuration completeness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigValidation {
    /// No required element is missing.
    pub valid: bool,
    /// Human-readable descriptors of missing elements.
    pub missing: Vec<String>,
}

/// The element coordinate store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    db: EngraveDb,
    canvas_height_mm: f64,
}

impl ConfigStore {
    /// Creates a store over `db` with the default canvas height.
    pub fn new(db: EngraveDb) -> Self {
        Self::with_canvas_height(db, DEFAULT_CANVAS_HEIGHT_MM)
    }

    /// Creates a store with an explicit canvas height (test rigs use
    /// non-production carriers).
    pub fn with_canvas_height(db: EngraveDb, canvas_height_mm: f64) -> Self {
        Self {
            db,
            canvas_height_mm,
        }
    }

    /// The CAD → SVG conversion: CAD measures Y up from the bottom-left
    /// corner, SVG down from the top-left.
    pub(crate) fn svg_y(&self, cad_y: f64) -> f64 {
        self.canvas_height_mm - cad_y
    }
}

/// Database form of the revision column: the default revision is stored as
/// the empty string because SQLite's UNIQUE treats NULLs as distinct.
pub(crate) fn revision_column(revision: Option<Revision>) -> String {
    revision.map(|r| r.letter().to_string()).unwrap_or_default()
}
