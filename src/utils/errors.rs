use std::error::Error;
use std::fmt;

/// Recoverable errors surfaced by the typing pipeline. Parse errors abort the
/// run before any graph is built; the per-read variants are collected by the
/// aggregator and reported at the end without stopping the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TypingError {
    /// Malformed alignment input, naming the allele and position under scrutiny.
    Parse {
        allele: String,
        position: i64,
        reason: String,
    },
    /// The k-mer index produced no anchor positions for a read.
    NoPositions,
    /// Every anchor position early-stopped for a read.
    AllStopped(usize),
    /// A record could not be converted into aligner input.
    Adapter {
        stage: &'static str,
        reason: String,
    },
    /// Graph-side failures surfaced through adjacency or index lookup.
    Other(String),
}

impl fmt::Display for TypingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypingError::Parse {
                allele,
                position,
                reason,
            } => write!(
                f,
                "parse error in allele {} at position {}: {}",
                allele, position, reason
            ),
            TypingError::NoPositions => write!(f, "index returned no anchor positions"),
            TypingError::AllStopped(n) => {
                write!(f, "all {} anchor positions stopped early", n)
            }
            TypingError::Adapter { stage, reason } => {
                write!(f, "adapter failure in {}: {}", stage, reason)
            }
            TypingError::Other(reason) => write!(f, "{}", reason),
        }
    }
}

impl Error for TypingError {}

impl TypingError {
    pub fn parse<A: Into<String>, R: Into<String>>(allele: A, position: i64, reason: R) -> Self {
        TypingError::Parse {
            allele: allele.into(),
            position,
            reason: reason.into(),
        }
    }
}
