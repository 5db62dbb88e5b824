//! A toy proof language, for tests and demos.
//!
//! Sentences end with a dot followed by whitespace or the end of the text. The first word
//! decides the shape of a sentence:
//!
//! | keyword                     | classification          |
//! |-----------------------------|-------------------------|
//! | `op`, `def`, `require`      | side effect             |
//! | `section`, `end`            | side effect, scope change |
//! | `lemma`, `theorem`          | proof opener            |
//! | `qed`, `defined`, `admitted`| proof terminator        |
//! | `check`, `print`            | query                   |
//! | `stop`                      | ends parsing            |
//! | anything else               | proof step              |
//!
//! A sentence with unbalanced parentheses does not parse. [`ToyBackend`] tracks declared names
//! and open proofs; `fail.` always fails and `check x.` fails when `x` is not declared.
//! `print x.` and the proof step `note x.` report feedback.

use std::collections::BTreeSet;

use crate::error::ExecError;
use crate::execution::{Backend, DelegatedJob, Feedback, MessageSender, Severity, Worker};
use crate::id::SentenceId;
use crate::parser::{
    Candidate, Classification, ParseOutcome, ParsedForm, Parser, QedKind, ScopeChange,
};
use crate::scheduler::ExecutableSentence;

/// Syntax tree of a toy sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToyAst {
    /// Lowercased first word.
    pub keyword: String,
    /// Remaining words, without the final dot.
    pub args: Vec<String>,
}

/// Open sections, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToyScope {
    /// Section names.
    pub sections: Vec<String>,
}

/// Parser of the toy language.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToyParser;

impl Parser for ToyParser {
    type Ast = ToyAst;
    type Scope = ToyScope;

    fn parse_next(
        &self,
        scope: &ToyScope,
        text: &str,
        position: usize,
    ) -> ParseOutcome<ToyAst, ToyScope> {
        let rest = &text[position..];
        let Some(skipped) = rest.find(|c: char| !c.is_whitespace()) else {
            return ParseOutcome::Parsed {
                sentences: Vec::new(),
                terminates: true,
            };
        };
        let start = position + skipped;
        let Some(stop) = sentence_end(text, start) else {
            return ParseOutcome::Failed {
                start,
                stop: text.len(),
                message: "missing terminating dot".into(),
            };
        };
        let source = &text[start..stop];
        if !balanced(source) {
            return ParseOutcome::Failed {
                start,
                stop,
                message: "unbalanced parentheses".into(),
            };
        }

        let tokens: Vec<String> = source.split_whitespace().map(str::to_owned).collect();
        let mut words: Vec<String> = tokens.clone();
        if let Some(last) = words.last_mut() {
            last.truncate(last.len() - 1);
        }
        words.retain(|word| !word.is_empty());
        let keyword = words
            .first()
            .map(|word| word.to_ascii_lowercase())
            .unwrap_or_default();
        let args = words.iter().skip(1).cloned().collect::<Vec<_>>();

        let mut next_scope = scope.clone();
        let (classification, scope_change) = match keyword.as_str() {
            "stop" => {
                return ParseOutcome::Parsed {
                    sentences: Vec::new(),
                    terminates: true,
                }
            }
            "op" | "def" | "require" => (Classification::Sideff, ScopeChange::None),
            "section" => {
                next_scope
                    .sections
                    .push(args.first().cloned().unwrap_or_default());
                (Classification::Sideff, ScopeChange::OpenSection)
            }
            "end" => {
                next_scope.sections.pop();
                (Classification::Sideff, ScopeChange::CloseSection)
            }
            "lemma" | "theorem" => (Classification::StartProof, ScopeChange::None),
            "qed" => (Classification::Qed(QedKind::Opaque), ScopeChange::None),
            "defined" => (Classification::Qed(QedKind::Transparent), ScopeChange::None),
            "admitted" => (Classification::Qed(QedKind::Admitted), ScopeChange::None),
            "check" | "print" => (Classification::Query, ScopeChange::None),
            _ => (Classification::ProofStep, ScopeChange::None),
        };

        ParseOutcome::Parsed {
            sentences: vec![Candidate {
                start,
                stop,
                parsed: ParsedForm {
                    ast: ToyAst { keyword, args },
                    classification,
                    scope_change,
                    tokens,
                },
                scope: next_scope,
            }],
            terminates: false,
        }
    }
}

/// Offset right after the first dot followed by whitespace or the end of the text.
fn sentence_end(text: &str, start: usize) -> Option<usize> {
    let mut chars = text[start..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '.' && chars.peek().map_or(true, |(_, next)| next.is_whitespace()) {
            return Some(start + i + 1);
        }
    }
    None
}

fn balanced(source: &str) -> bool {
    let mut depth = 0usize;
    for c in source.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// State of [`ToyBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToyState {
    /// Declared names.
    pub declared: BTreeSet<String>,
    /// Names of the open proofs, innermost last.
    pub open_proofs: Vec<String>,
}

/// Backend of the toy language.
///
/// Feedback is buffered for [`Backend::take_feedback`], or sent through a [`MessageSender`] when
/// created with [`ToyBackend::with_feedback`].
#[derive(Debug, Default)]
pub struct ToyBackend {
    /// Every sentence run so far, in order.
    pub runs: Vec<SentenceId>,
    sender: Option<MessageSender>,
    buffered: Vec<Feedback>,
}

impl ToyBackend {
    /// Create a backend sending feedback through `sender`.
    pub fn with_feedback(sender: MessageSender) -> Self {
        Self {
            sender: Some(sender),
            ..Default::default()
        }
    }

    fn report(&mut self, sentence: SentenceId, feedback: Feedback) {
        match &self.sender {
            Some(sender) => {
                sender.send_feedback(sentence, feedback);
            }
            None => self.buffered.push(feedback),
        }
    }

    fn close_proof(state: &ToyState, kind: &str) -> Result<ToyState, ExecError> {
        let mut next = state.clone();
        let Some(name) = next.open_proofs.pop() else {
            return Err(anyhow::anyhow!("{kind}: no proof to close").into());
        };
        next.declared.insert(name);
        Ok(next)
    }
}

impl Backend<ToyAst> for ToyBackend {
    type State = ToyState;

    fn run(
        &mut self,
        state: &ToyState,
        sentence: &ExecutableSentence<ToyAst>,
    ) -> Result<ToyState, ExecError> {
        self.runs.push(sentence.id);
        let ast = &sentence.ast;
        let name = ast.args.first();
        match ast.keyword.as_str() {
            "op" | "def" => {
                let name = name.ok_or_else(|| anyhow::anyhow!("{}: missing name", ast.keyword))?;
                let mut next = state.clone();
                next.declared.insert(name.clone());
                Ok(next)
            }
            "lemma" | "theorem" => {
                let name = name.ok_or_else(|| anyhow::anyhow!("{}: missing name", ast.keyword))?;
                let mut next = state.clone();
                next.open_proofs.push(name.clone());
                Ok(next)
            }
            "qed" | "defined" | "admitted" => Self::close_proof(state, &ast.keyword),
            "check" | "print" => {
                let name = name.ok_or_else(|| anyhow::anyhow!("{}: missing name", ast.keyword))?;
                if !state.declared.contains(name) {
                    return Err(anyhow::anyhow!("{name} is not declared").into());
                }
                if ast.keyword == "print" {
                    let message = format!("{name} is declared");
                    self.report(sentence.id, Feedback::new(Severity::Information, message));
                }
                Ok(state.clone())
            }
            "fail" => Err(anyhow::anyhow!("tactic failed").into()),
            "require" | "section" | "end" => Ok(state.clone()),
            _ if state.open_proofs.is_empty() => {
                Err(anyhow::anyhow!("{}: no proof to work on", ast.keyword).into())
            }
            "note" => {
                let message = ast.args.join(" ");
                self.report(sentence.id, Feedback::new(Severity::Warning, message));
                Ok(state.clone())
            }
            _ => Ok(state.clone()),
        }
    }

    fn admit(
        &mut self,
        state: &ToyState,
        terminator: &ExecutableSentence<ToyAst>,
    ) -> Result<ToyState, ExecError> {
        self.runs.push(terminator.id);
        Self::close_proof(state, "admit")
    }

    fn take_feedback(&mut self) -> Vec<Feedback> {
        std::mem::take(&mut self.buffered)
    }
}

/// Worker checking each delegated proof on its own thread with a fresh [`ToyBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ToyWorker;

impl Worker<ToyAst, ToyState> for ToyWorker {
    fn submit(&mut self, job: DelegatedJob<ToyAst, ToyState>) {
        std::thread::spawn(move || {
            let job_id = job.id;
            if !job.run(&mut ToyBackend::default()) {
                tracing::debug!(job = %job_id, "execution manager is gone");
            }
        });
    }
}
