use std::path::Path;

use bio::alphabets::dna;
use needletail::parse_fastx_file;

use crate::utils::errors::TypingError;
use crate::utils::math_utils::MathUtils;

/// One read in the aligner's input type: an identifier, validated residues
/// and, when a quality-aware statistic is selected, the per-base error
/// probabilities decoded from the record's Phred string.
#[derive(Debug, Clone)]
pub struct ReadInput {
    pub id: String,
    pub seq: Vec<u8>,
    pub error_probs: Option<Vec<f64>>,
}

impl ReadInput {
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

/// Read a FASTQ file into aligner input. Records that cannot be converted
/// are returned as per-record adapter errors alongside the good reads; a
/// stream that cannot be opened or parsed at all is fatal.
pub fn read_fastq<P: AsRef<Path>>(
    path: P,
    with_qualities: bool,
) -> Result<(Vec<ReadInput>, Vec<(String, TypingError)>), TypingError> {
    let mut reader = parse_fastx_file(path.as_ref()).map_err(|e| {
        TypingError::Other(format!(
            "unable to open fastq file {:?}: {}",
            path.as_ref(),
            e
        ))
    })?;

    let alphabet = dna::n_alphabet();
    let mut reads = Vec::new();
    let mut errors = Vec::new();

    while let Some(record) = reader.next() {
        let record = record
            .map_err(|e| TypingError::Other(format!("malformed fastq record: {}", e)))?;
        let id = String::from_utf8_lossy(record.id())
            .split_whitespace()
            .next()
            .unwrap_or("unnamed-read")
            .to_string();

        let seq: Vec<u8> = record
            .seq()
            .iter()
            .map(|b| b.to_ascii_uppercase())
            .collect();
        if !alphabet.is_word(&seq) {
            errors.push((
                id,
                TypingError::Adapter {
                    stage: "ToThread",
                    reason: "sequence contains residues outside the DNA alphabet".to_string(),
                },
            ));
            continue;
        }

        let error_probs = if with_qualities {
            match record.qual() {
                Some(qual) if qual.len() == seq.len() => Some(
                    qual.iter()
                        .map(|q| MathUtils::phred_to_error_prob(*q))
                        .collect::<Vec<f64>>(),
                ),
                Some(_) => {
                    errors.push((
                        id,
                        TypingError::Adapter {
                            stage: "ToThread",
                            reason: "quality string length disagrees with sequence".to_string(),
                        },
                    ));
                    continue;
                }
                None => {
                    errors.push((
                        id,
                        TypingError::Adapter {
                            stage: "ToThread",
                            reason: "record carries no quality string".to_string(),
                        },
                    ));
                    continue;
                }
            }
        } else {
            None
        };

        reads.push(ReadInput {
            id,
            seq,
            error_probs,
        });
    }

    Ok((reads, errors))
}
