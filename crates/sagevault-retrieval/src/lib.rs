//! sagevault-retrieval
//!
//! Query-time half of the pipeline: a broadened nearest-neighbour retriever
//! with pinning and bounded boosts, an MMR re-ranker, and the orchestrator
//! that runs both through the security gate under a context budget.

pub mod attribution;
pub mod mmr;
pub mod pin;
pub mod pipeline;
pub mod retriever;

pub use attribution::{attribute_sources, attribution_headers, render_context};
pub use mmr::select_diverse;
pub use pin::{NoPin, OverviewPin};
pub use pipeline::{estimate_tokens, Diagnostics, IndexHandle, PipelineContext, RetrievalResult};
pub use retriever::{RetrieveContext, Retriever};
