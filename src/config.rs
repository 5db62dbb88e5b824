//! Settings shared by the document and the execution manager.
//!
//! A [`Config`] is plain data, usually deserialized from the editor's initialization options:
//!
//! ```
//! # #[cfg(feature = "serde")]
//! # {
//! # use proof_flow::{Config, DelegationMode, ProofBlockMode, Severity};
//! let config: Config = serde_json::from_str(
//!     r#"{ "delegation": "worker", "proof_blocks": "delegate_opaque" }"#,
//! )
//! .unwrap();
//! assert_eq!(config.delegation, DelegationMode::Worker);
//! assert_eq!(config.proof_blocks, ProofBlockMode::DelegateOpaque);
//! assert_eq!(config.diagnostics.min_severity, Severity::Warning);
//! # }
//! ```

use crate::execution::{DelegationMode, Severity};
use crate::policy::ProofBlockMode;

/// Settings of the incremental core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    /// How opaque proofs are executed.
    pub delegation: DelegationMode,
    /// How proof blocks are scheduled.
    pub proof_blocks: ProofBlockMode,
    /// What is reported as diagnostics.
    pub diagnostics: DiagnosticsConfig,
}

/// Settings of [`diagnostics`](crate::report::diagnostics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DiagnosticsConfig {
    /// Feedback below this severity is not reported. Execution errors always are.
    pub min_severity: Severity,
    /// Whether parse errors are reported.
    pub parse_errors: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            min_severity: Severity::Warning,
            parse_errors: true,
        }
    }
}
