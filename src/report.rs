//! Editor-facing views combining a document with its execution cache.

use crate::config::DiagnosticsConfig;
use crate::document::Document;
use crate::execution::{ExecStatus, ExecutionManager, Severity};
use crate::id::SentenceId;
use crate::parser::Parser;
use crate::text::{range_of_span, Range};

/// Text ranges by execution outcome. Adjacent sentences with the same outcome share a range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutedRanges {
    /// Sentences the backend accepted.
    pub checked: Vec<Range>,
    /// Sentences the backend rejected.
    pub errored: Vec<Range>,
    /// Steps of proofs still checked by a worker.
    pub pending: Vec<Range>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Checked,
    Errored,
    Pending,
}

/// Compute the executed ranges of a document.
pub fn executed_ranges<P, S>(
    document: &Document<P>,
    manager: &ExecutionManager<P::Ast, S>,
) -> ExecutedRanges
where
    P: Parser,
    S: Clone,
{
    let mut ranges = ExecutedRanges::default();
    let mut previous = None;
    for sentence in document.sentences() {
        let bucket = match manager.status(sentence.id) {
            _ if manager.is_delegated(sentence.id) => Some(Bucket::Pending),
            Some(ExecStatus::Success(_)) => Some(Bucket::Checked),
            Some(ExecStatus::Error(..)) => Some(Bucket::Errored),
            None => None,
        };
        let Some(bucket) = bucket else {
            previous = None;
            continue;
        };
        let range = range_of_span(document.text(), sentence.span());
        let list = match bucket {
            Bucket::Checked => &mut ranges.checked,
            Bucket::Errored => &mut ranges.errored,
            Bucket::Pending => &mut ranges.pending,
        };
        match list.last_mut() {
            Some(last) if previous == Some(bucket) => last.end = range.end,
            _ => list.push(range),
        }
        previous = Some(bucket);
    }
    ranges
}

/// A message to display in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Diagnostic {
    /// Where.
    pub range: Range,
    /// How bad.
    pub severity: Severity,
    /// What.
    pub message: String,
    /// The sentence it belongs to; `None` for parse errors.
    pub sentence: Option<SentenceId>,
}

/// Collect parse errors, execution errors and feedback of a document, in text order.
pub fn diagnostics<P, S>(
    document: &Document<P>,
    manager: &ExecutionManager<P::Ast, S>,
    config: &DiagnosticsConfig,
) -> Vec<Diagnostic>
where
    P: Parser,
    S: Clone,
{
    let text = document.text();
    let mut diagnostics = Vec::new();
    if config.parse_errors {
        diagnostics.extend(document.parse_errors().map(|error| Diagnostic {
            range: range_of_span(text, error.span()),
            severity: Severity::Error,
            message: error.message.clone(),
            sentence: None,
        }));
    }
    for sentence in document.sentences() {
        let Some(entry) = manager.entry(sentence.id) else {
            continue;
        };
        if let Some(error) = entry.status.error() {
            diagnostics.push(Diagnostic {
                range: range_of_span(text, error.location.unwrap_or(sentence.span())),
                severity: Severity::Error,
                message: error.message(),
                sentence: Some(sentence.id),
            });
        }
        for feedback in &entry.feedback {
            if feedback.severity < config.min_severity {
                continue;
            }
            diagnostics.push(Diagnostic {
                range: range_of_span(text, feedback.location.unwrap_or(sentence.span())),
                severity: feedback.severity,
                message: feedback.message.clone(),
                sentence: Some(sentence.id),
            });
        }
    }
    diagnostics.sort_by_key(|diagnostic| diagnostic.range.start);
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Feedback, Interrupt};
    use crate::text::Position;
    use crate::toy::{ToyAst, ToyBackend, ToyParser, ToyScope, ToyState};

    fn run_all(text: &str) -> (Document<ToyParser>, ExecutionManager<ToyAst, ToyState>) {
        let mut document = Document::new(ToyParser, ToyScope::default(), text);
        document.validate();
        let mut manager = ExecutionManager::new(ToyState::default());
        let last = document.sentence_ids().last().copied().unwrap();
        manager
            .run_to(
                &mut ToyBackend::default(),
                document.schedule(),
                last,
                &Interrupt::new(),
            )
            .unwrap();
        (document, manager)
    }

    #[test]
    fn test_adjacent_ranges_are_merged() {
        let (document, manager) = run_all("op a. fail. op b. op c.");
        let ranges = executed_ranges(&document, &manager);
        assert_eq!(
            ranges.checked,
            vec![
                Range::new(Position::new(0, 0), Position::new(0, 5)),
                Range::new(Position::new(0, 12), Position::new(0, 23)),
            ]
        );
        assert_eq!(
            ranges.errored,
            vec![Range::new(Position::new(0, 6), Position::new(0, 11))]
        );
        assert!(ranges.pending.is_empty());
    }

    #[test]
    fn test_diagnostics_filter_feedback_by_severity() {
        let (document, mut manager) = run_all("op a. fail. op (b.");
        let first = document.sentence_ids()[0];
        manager.handle_feedback(first, Feedback::new(Severity::Information, "a is declared"));
        manager.handle_feedback(first, Feedback::new(Severity::Warning, "a shadows a"));

        let found = diagnostics(&document, &manager, &DiagnosticsConfig::default());
        let messages: Vec<_> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], "a shadows a");
        assert_eq!(found[1].severity, Severity::Error);
        assert_eq!(found[2].sentence, None);

        let verbose = DiagnosticsConfig {
            min_severity: Severity::Hint,
            parse_errors: false,
        };
        assert_eq!(diagnostics(&document, &manager, &verbose).len(), 3);
    }
}
