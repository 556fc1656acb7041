//! Sheet pipeline glue.
//!
//! Wires the stages together and owns call order and coordinate frames:
//! perspective correction -> column segmentation -> per column
//! (detect -> group -> decide -> validate) -> merge.
//!
//! Algorithmic primitives live in `crate::geometry`, `crate::detector`,
//! `crate::grouping`, `crate::decision` and `crate::validate`.

mod region;
mod result;
mod sheet;

pub use region::{scan_region, RegionScan, RegionStats};
pub use result::ScanResult;
pub use sheet::{distribute_questions, scan_sheet, scan_sheet_with_canvas, ScanOutput};
