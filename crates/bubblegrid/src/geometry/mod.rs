//! Sheet geometry: perspective rectification and column segmentation.

pub(crate) mod columns;
pub(crate) mod homography;
pub(crate) mod perspective;
pub(crate) mod polygon;

pub use columns::{
    detect_column_count, segment_columns, ColumnRegion, ColumnSegmentConfig, ColumnSegmentation,
    SegmentMethod, MAX_VALLEY_CANDIDATES,
};
pub use perspective::{
    correct_perspective, PerspectiveConfig, PerspectiveOutcome, PerspectiveReport, QuadSource,
};
