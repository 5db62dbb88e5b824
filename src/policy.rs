use crate::parser::QedKind;
use crate::scheduler::ProofBlock;

/// Context handed to a [`ProofBlockPolicy`] when a proof terminator closes a block.
#[derive(Debug, Clone, Copy)]
pub struct ClosingContext<'a> {
    /// The block being closed.
    pub block: &'a ProofBlock,
    /// Kind of the terminator.
    pub kind: QedKind,
    /// Number of sections open at the terminator.
    pub section_depth: usize,
    /// Number of proof blocks still open once this one is closed.
    pub enclosing_blocks: usize,
}

/// BlockClosing is the outcome of closing a proof block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockClosing {
    /// Append the block's sentences to the parent scope; the terminator is an ordinary task.
    #[default]
    Flatten,
    /// Replace the block by one opaque task that does not retain interior states.
    Delegate,
}

/// A trait deciding how a closed proof block is scheduled.
pub trait ProofBlockPolicy: Send + Sync {
    /// Decide how to close the block.
    fn close(&self, context: &ClosingContext<'_>) -> BlockClosing;
}

/// A policy that always flattens proof blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlwaysFlatten;

impl ProofBlockPolicy for AlwaysFlatten {
    fn close(&self, _: &ClosingContext<'_>) -> BlockClosing {
        BlockClosing::Flatten
    }
}

/// A policy that delegates self-contained opaque proofs.
///
/// A block is delegated when its terminator is [`QedKind::Opaque`], it holds no side effect and
/// no nested proof, and it sits at top level outside of any section. Anything else is flattened,
/// since its interior states may be observed by later sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DelegateOpaqueProofs;

impl ProofBlockPolicy for DelegateOpaqueProofs {
    fn close(&self, context: &ClosingContext<'_>) -> BlockClosing {
        let block = context.block;
        if context.kind == QedKind::Opaque
            && !block.has_side_effect
            && !block.has_nested_proof
            && context.section_depth == 0
            && context.enclosing_blocks == 0
        {
            BlockClosing::Delegate
        } else {
            BlockClosing::Flatten
        }
    }
}

/// ProofBlockMode selects one of the provided policies from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ProofBlockMode {
    /// [`AlwaysFlatten`].
    #[default]
    Flatten,
    /// [`DelegateOpaqueProofs`].
    DelegateOpaque,
}

impl ProofBlockMode {
    /// The policy selected by this mode.
    pub fn policy(self) -> std::sync::Arc<dyn ProofBlockPolicy> {
        match self {
            ProofBlockMode::Flatten => std::sync::Arc::new(AlwaysFlatten),
            ProofBlockMode::DelegateOpaque => std::sync::Arc::new(DelegateOpaqueProofs),
        }
    }
}
