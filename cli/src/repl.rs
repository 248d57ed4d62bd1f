use std::io::{self, BufRead, Write};

use docqa_ai::orchestrator::{Orchestrator, TurnOutcome};
use docqa_core::error::AppError;

pub const PROMPT: &str = "You: ";
pub const ANSWER_PREFIX: &str = "AI: ";
pub const FAILURE_LINE: &str = "Sorry, I could not answer that. Please try again.";

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

pub fn is_exit_sentinel(line: &str) -> bool {
    let t = line.trim();
    t == "끝" || EXIT_WORDS.iter().any(|w| t.eq_ignore_ascii_case(w))
}

/// One utterance in, one answer out, with text forwarded as it is produced.
pub trait TurnRunner {
    fn run_turn_with(
        &mut self,
        utterance: &str,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError>;
}

impl TurnRunner for Orchestrator<'_> {
    fn run_turn_with(
        &mut self,
        utterance: &str,
        on_fragment: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        Orchestrator::run_turn_with(self, utterance, on_fragment)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub turns: u32,
    pub failed: u32,
}

/// Read lines until a sentinel or end of input, answering each one.
///
/// A failed turn prints [`FAILURE_LINE`] and the loop carries on; only I/O
/// errors on `input` or `out` end it early.
pub fn run_loop<R, W>(runner: &mut dyn TurnRunner, input: R, out: &mut W) -> io::Result<SessionSummary>
where
    R: BufRead,
    W: Write,
{
    let mut summary = SessionSummary::default();
    let mut lines = input.lines();
    loop {
        write!(out, "{PROMPT}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if is_exit_sentinel(utterance) {
            break;
        }

        summary.turns += 1;
        write!(out, "{ANSWER_PREFIX}")?;
        let mut write_failure: Option<io::Error> = None;
        let result = runner.run_turn_with(utterance, &mut |fragment: &str| {
            if write_failure.is_none() {
                if let Err(e) = out.write_all(fragment.as_bytes()).and_then(|_| out.flush()) {
                    write_failure = Some(e);
                }
            }
        });
        if let Some(e) = write_failure {
            return Err(e);
        }

        match result {
            Ok(outcome) => {
                writeln!(out)?;
                tracing::debug!(path = ?outcome.path, "answered");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(code = %e.code, details = ?e.details, retryable = e.retryable, "{}", e.message);
                writeln!(out)?;
                writeln!(out, "{FAILURE_LINE}")?;
            }
        }
    }
    Ok(summary)
}
