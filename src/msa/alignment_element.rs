use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Alignment position on the shared reference axis defined by the numeric
/// block headers of an IMGT/HLA alignment file. Positions may be negative
/// (UTR columns sit before the numbering origin).
pub type Position = i64;

/// One element of an allele's parsed sequence, ordered by position. An
/// allele is a series of `Start .. End` data segments; unknown regions
/// between segments (cDNA-derived alleles inside genomic alignments) close
/// one segment and open the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignmentElement {
    /// Allele sequence begins at this position.
    Start(Position),
    /// Allele sequence ends strictly before this position.
    End(Position),
    /// The index-th segment marker (UTR/exon/intron delimiter) at pos.
    Boundary { index: usize, pos: Position },
    /// Contiguous residues beginning at start.
    Sequence { start: Position, seq: String },
    /// Gap of length reference positions beginning at start.
    Gap { start: Position, length: usize },
}

impl AlignmentElement {
    pub fn position(&self) -> Position {
        match self {
            AlignmentElement::Start(pos) => *pos,
            AlignmentElement::End(pos) => *pos,
            AlignmentElement::Boundary { pos, .. } => *pos,
            AlignmentElement::Sequence { start, .. } => *start,
            AlignmentElement::Gap { start, .. } => *start,
        }
    }

    /// Exclusive end of the span this element covers on the reference axis.
    pub fn end_position(&self) -> Position {
        match self {
            AlignmentElement::Start(pos) => *pos,
            AlignmentElement::End(pos) => *pos,
            AlignmentElement::Boundary { pos, .. } => pos + 1,
            AlignmentElement::Sequence { start, seq } => start + seq.len() as Position,
            AlignmentElement::Gap { start, length } => start + *length as Position,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, AlignmentElement::Start(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, AlignmentElement::End(_))
    }
}

impl fmt::Display for AlignmentElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentElement::Start(pos) => write!(f, "Start({})", pos),
            AlignmentElement::End(pos) => write!(f, "End({})", pos),
            AlignmentElement::Boundary { index, pos } => write!(f, "Boundary({},{})", index, pos),
            AlignmentElement::Sequence { start, seq } => write!(f, "Sequence({},{})", start, seq),
            AlignmentElement::Gap { start, length } => write!(f, "Gap({},{})", start, length),
        }
    }
}

/// Render an element list back into the residue stream the parser would
/// consume to reproduce it: residues verbatim, `.` for gap columns, `|` for
/// boundaries, `*` for unknown columns between segments.
pub fn reserialize(elements: &[AlignmentElement]) -> String {
    let mut out = String::new();
    let mut cursor = match elements.first() {
        Some(first) => first.position(),
        None => return out,
    };

    for element in elements {
        while cursor < element.position() {
            out.push('*');
            cursor += 1;
        }
        match element {
            AlignmentElement::Start(_) | AlignmentElement::End(_) => {}
            AlignmentElement::Boundary { .. } => {
                out.push('|');
                cursor += 1;
            }
            AlignmentElement::Sequence { seq, .. } => {
                out.push_str(seq);
                cursor += seq.len() as Position;
            }
            AlignmentElement::Gap { length, .. } => {
                for _ in 0..*length {
                    out.push('.');
                }
                cursor += *length as Position;
            }
        }
    }

    out
}

/// Element positions must be non-decreasing and every Sequence/Gap must sit
/// inside an open segment. Used by tests and debug assertions.
pub fn check_element_order(elements: &[AlignmentElement]) -> Result<(), String> {
    let mut last: Option<Position> = None;
    let mut open = false;
    for element in elements {
        if let Some(prev) = last {
            if element.position() < prev {
                return Err(format!(
                    "element {} starts before position {}",
                    element, prev
                ));
            }
        }
        match element {
            AlignmentElement::Start(_) => {
                if open {
                    return Err(format!("{} inside an open segment", element));
                }
                open = true;
            }
            AlignmentElement::End(_) => {
                if !open {
                    return Err(format!("{} without an open segment", element));
                }
                open = false;
            }
            AlignmentElement::Sequence { .. } | AlignmentElement::Gap { .. } => {
                if !open {
                    return Err(format!("{} outside any segment", element));
                }
            }
            AlignmentElement::Boundary { .. } => {}
        }
        last = Some(element.end_position());
    }
    if open {
        return Err("unterminated segment".to_string());
    }
    Ok(())
}
