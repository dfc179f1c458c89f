//! Page acquisition and extraction.
//!
//! - Remote browser fetch with challenge wait (`fetch`)
//! - Body text cleanup (`normalize`)
//! - Fixed-width segmentation (`chunk`)
//! - Per-segment model extraction (`orchestrate`)
//! - The [`Gleaner`] facade tying them together (`pipeline`)

pub mod chunk;
pub mod fetch;
pub mod normalize;
pub mod orchestrate;
pub mod pipeline;

pub use chunk::{Segment, split};
pub use fetch::{BrowserSession, RawDocument, SessionFactory, WebFetcher};
pub use normalize::{CleanedText, clean, extract_body, normalize};
pub use orchestrate::{ExtractionOrchestrator, ExtractionResult, PromptTemplate};
pub use pipeline::Gleaner;
