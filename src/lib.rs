//! Turns annotated essay corpora (HTML text plus tagtog-style JSON annotations) into
//! one spreadsheet per document listing every tagged and untagged text span.

pub mod align;
pub mod annotation;
pub mod export;
pub mod html_text;
pub mod labels;
pub mod lookup;
pub mod normalize;
pub mod pipeline;

pub use align::{align, AlignError, SpanRecord};
pub use pipeline::{run_batch, BatchReport, PipelineConfig};
