//! Engine-wide error type.
//!
//! A single `thiserror`-derived enum covering the whole engine, kept flat
//! rather than split per-module since the error kinds here are few and cut
//! across graph construction and evaluation alike.

use thiserror::Error;

use crate::graph::Identifier;

#[derive(Debug, Error)]
pub enum CepError {
    /// Operator arity mismatch, identifier collision, a condition referencing an
    /// unknown identifier, or a SEQ order list that isn't a permutation of its
    /// operator's operand identifiers. Detected at graph build time; the
    /// offending query is rejected, the rest of the batch continues.
    #[error("malformed pattern: {0}")]
    MalformedPattern(String),

    /// A condition's `completely_unpack()` lookup found no event for one of its
    /// declared identifiers (should only happen for a condition attached above
    /// its identifiers' common subtree, which `validate_pattern` prevents).
    #[error("condition referenced unknown identifier {0}")]
    UnknownIdentifier(Identifier),

    /// A schema lookup requested an attribute name absent from the event schema.
    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    /// A predicate accessed an attribute expecting a numeric type but found a
    /// string (or vice versa). The reference event source leaves uncoercible
    /// tokens as strings, so this surfaces lazily at predicate evaluation.
    #[error("type mismatch evaluating predicate on identifier {identifier}: expected {expected}")]
    TypeMismatch { identifier: Identifier, expected: &'static str },

    /// A predicate raised its own evaluation failure. Isolated to the single
    /// offending partial result; other matches and other queries continue.
    #[error("predicate evaluation failed: {0}")]
    Predicate(String),

    /// An output sink failed to write.
    #[error("sink I/O error: {0}")]
    Sink(#[from] std::io::Error),
}
