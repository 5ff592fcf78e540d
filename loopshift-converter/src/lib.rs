//! Loop to pipeline conversion engine
//!
//! This crate decides whether an imperative loop can be rewritten, with the
//! same observable behavior, as a functional pipeline of map, filter and
//! terminal stages, and assembles that pipeline when it can. Anything it
//! cannot prove safe is left unchanged.

pub mod converter;
pub mod lambda;
pub mod merge;
pub mod normalize;
pub mod operation;
pub mod parser;
pub mod pipeline;
pub mod preconditions;
pub mod reducer;
pub mod side_effects;
pub mod site;
pub mod stats;

pub use converter::{
    Conversion, ConverterConfig, ForLoopRewriter, LoopConverter, LoopRewriter, StreamRewriter,
    TargetFormat, UnchangedReason, WhileLoopRewriter,
};
pub use lambda::LambdaGenerator;
pub use normalize::{LoopMetadata, LoopNormalizer, LoopShape};
pub use operation::{OperationKind, ProspectiveOperation};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use preconditions::{Eligibility, IneligibleReason, PreconditionsChecker};
pub use reducer::{ReducerClassifier, ReducerType};
pub use site::{ConversionUnit, LoopGroup, LoopSite};
pub use stats::ConversionStats;
