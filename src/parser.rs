//! Parser collaborator interface.
//!
//! The textual parser is external: it turns raw characters into candidate sentences together
//! with their static effect on the parsing scope. The document drives it forward from the
//! parsed high-water mark during validation.

use std::fmt::Debug;

/// Kind of proof terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QedKind {
    /// The proof term is sealed; dependents only see the statement.
    Opaque,
    /// The proof term stays visible to dependents.
    Transparent,
    /// The proof is given up and the statement assumed.
    Admitted,
}

/// Dependency shape of a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Classification {
    /// Opens a proof block.
    StartProof,
    /// Ordinary effect on the global state.
    Sideff,
    /// Closes the innermost proof block.
    Qed(QedKind),
    /// Step inside a proof.
    ProofStep,
    /// Read-only command; never a dependency base.
    Query,
}

/// Effect of a sentence on section nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScopeChange {
    /// No effect.
    #[default]
    None,
    /// Opens a section.
    OpenSection,
    /// Closes the innermost section.
    CloseSection,
}

/// Parsed form of a sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedForm<A> {
    /// Backend specific syntax tree.
    pub ast: A,
    /// Dependency shape.
    pub classification: Classification,
    /// Effect on section nesting.
    pub scope_change: ScopeChange,
    /// Raw tokens. Two sentences with equal tokens are the same sentence for the reparse diff.
    pub tokens: Vec<String>,
}

/// A freshly parsed sentence that has no identity yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<A, S> {
    /// Start offset in the text.
    pub start: usize,
    /// Stop offset in the text.
    pub stop: usize,
    /// Parsed form.
    pub parsed: ParsedForm<A>,
    /// Parsing scope valid right after this sentence.
    pub scope: S,
}

/// Result of one parser call.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome<A, S> {
    /// Zero or more sentences were parsed.
    ///
    /// `terminates` is set at end of input or when the text asks to stop parsing; an empty
    /// `sentences` list without `terminates` is treated as end of input as well.
    Parsed {
        /// Parsed sentences in document order.
        sentences: Vec<Candidate<A, S>>,
        /// Whether parsing stops after these sentences.
        terminates: bool,
    },
    /// The span `[start, stop)` does not parse. Parsing resumes at `stop`.
    Failed {
        /// Start offset of the failing span.
        start: usize,
        /// Stop offset of the failing span.
        stop: usize,
        /// Parser message.
        message: String,
    },
}

/// The textual parser.
pub trait Parser {
    /// Syntax tree of a sentence.
    type Ast: Clone + Debug;
    /// Static scope threaded through parsing.
    type Scope: Clone + Debug;

    /// Parse the next sentence(s) of `text` starting at byte offset `position`, under `scope`.
    fn parse_next(
        &self,
        scope: &Self::Scope,
        text: &str,
        position: usize,
    ) -> ParseOutcome<Self::Ast, Self::Scope>;
}
