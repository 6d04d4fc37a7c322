//! Task code scheme shared with CLI tools and client payloads.
//!
//! A task referring to paper 1, question 2 encodes as `q0001g2`: a `q`
//! marker, the zero-padded paper number, a `g` marker, and the question
//! index. The paper field is padded so codes sort lexicographically in paper
//! order up to [`PAPER_CODE_WIDTH`] digits; wider paper numbers are written
//! out in full rather than truncated.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Zero-padding width of the paper-number field in encoded codes.
pub const PAPER_CODE_WIDTH: usize = 4;

static TASK_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^q(\d+)g(\d+)$").expect("task code pattern is valid"));

/// A task code that does not decode to a (paper, question) identity.
///
/// The pattern is case-sensitive: `Q0001g2` and `q0001G2` are both rejected,
/// so two differently-cased strings can never alias the same task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCodeError {
    #[error("task code `{0}` does not match the form q<paper>g<question>")]
    Pattern(String),
    #[error("task code `{0}` has a numeric segment out of range")]
    OutOfRange(String),
}

/// Encode a (paper, question) identity as a task code.
pub fn encode_task_code(paper_number: i64, question_index: i64) -> String {
    format!(
        "q{paper_number:0width$}g{question_index}",
        width = PAPER_CODE_WIDTH
    )
}

/// Decode a task code back to its (paper, question) identity.
///
/// Leading zeros are tolerated on both segments. Paper number 0 is rejected:
/// it is outside the encoder's domain, so no valid code carries it.
pub fn decode_task_code(code: &str) -> Result<(i64, i64), MalformedCodeError> {
    let caps = TASK_CODE_RE
        .captures(code)
        .ok_or_else(|| MalformedCodeError::Pattern(code.to_string()))?;

    let paper_number: i64 = caps[1]
        .parse()
        .map_err(|_| MalformedCodeError::OutOfRange(code.to_string()))?;
    let question_index: i64 = caps[2]
        .parse()
        .map_err(|_| MalformedCodeError::OutOfRange(code.to_string()))?;

    if paper_number < 1 {
        return Err(MalformedCodeError::OutOfRange(code.to_string()));
    }

    Ok((paper_number, question_index))
}
