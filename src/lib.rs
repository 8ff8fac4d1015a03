//! A complex event processing engine: evaluates nested SEQ/AND pattern
//! queries with sliding time windows over a time-ordered event stream.
//!
//! The evaluation pipeline, bottom to top:
//! [`value`] and [`schema`] give every event a fixed, typed shape;
//! [`event`] is the immutable unit the engine ingests; [`partial_result`]
//! and [`operator`] are the algebra a match is built from; [`condition`]
//! filters candidate matches; [`graph`] is the per-query evaluation tree
//! that buffers and combines partial results; [`pattern`] and
//! [`initializer`] turn a declared query into a graph; [`model`] fans one
//! event stream out across every registered query; [`source`], [`sort`],
//! and [`sink`] are the I/O edges.

pub mod condition;
pub mod error;
pub mod event;
pub mod graph;
pub mod initializer;
pub mod memory;
pub mod model;
pub mod operator;
pub mod partial_result;
pub mod pattern;
pub mod schema;
pub mod sink;
pub mod sort;
pub mod source;
pub mod value;

pub use error::CepError;
pub use event::{Event, EventId, Timestamp};
pub use model::EvaluationModel;
pub use pattern::{OperatorTemplate, PatternExpr, Query};
pub use schema::EventSchema;
