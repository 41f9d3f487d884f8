use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use bio::alphabets::{dna, protein, Alphabet};

use crate::msa::alignment_element::{AlignmentElement, Position};
use crate::utils::errors::TypingError;

/// Residue alphabet of the alignment file, set by its first numeric header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Dna,
    Protein,
}

/// Parse output: the reference allele with its finalized element list, and
/// every alternate in file order. Alternates whose element lists came out
/// empty have already been dropped with a diagnostic.
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub file_kind: FileKind,
    pub reference: String,
    pub reference_elements: Vec<AlignmentElement>,
    pub alternates: Vec<(String, Vec<AlignmentElement>)>,
}

impl ParseResult {
    pub fn alternate(&self, name: &str) -> Option<&Vec<AlignmentElement>> {
        self.alternates
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, elements)| elements)
    }
}

#[derive(Debug)]
enum Line<'a> {
    Empty,
    Position { dna: bool, pos: Position },
    Dash,
    SeqData { allele: &'a str, residues: String },
    EndOfInput,
}

fn classify(line: &str) -> Result<Line<'_>, TypingError> {
    let stripped = line.trim();
    if stripped.is_empty() {
        return Ok(Line::Empty);
    }
    if stripped.starts_with('|') || stripped.starts_with("AA codon") {
        return Ok(Line::Dash);
    }
    if stripped.starts_with("Please") {
        return Ok(Line::EndOfInput);
    }

    let mut tokens = stripped.split_whitespace();
    let first = tokens.next().unwrap();
    if first == "gDNA" || first == "cDNA" || first == "Prot" {
        let pos = tokens
            .next()
            .and_then(|t| t.parse::<Position>().ok())
            .ok_or_else(|| {
                TypingError::Other(format!("malformed position header: {}", stripped))
            })?;
        return Ok(Line::Position {
            dna: first != "Prot",
            pos,
        });
    }

    let residues: String = tokens.collect::<Vec<&str>>().concat();
    Ok(Line::SeqData {
        allele: first,
        residues,
    })
}

/// Transient per-allele parse state. `cursor` holds the next column to fill;
/// boundaries and unknown columns advance it like residues do, which is why
/// it can drift from the file's printed counters near boundary runs.
struct AlleleParseState {
    name: String,
    cursor: Position,
    boundary_index: usize,
    elements: Vec<AlignmentElement>,
    in_data: bool,
}

impl AlleleParseState {
    fn new(name: &str, cursor: Position) -> AlleleParseState {
        AlleleParseState {
            name: name.to_string(),
            cursor,
            boundary_index: 0,
            elements: Vec::new(),
            in_data: false,
        }
    }

    fn open_data(&mut self) {
        if self.in_data {
            return;
        }
        self.in_data = true;
        // A boundary that was just consumed sits at cursor - 1; the Start
        // slips in before it so the boundary keeps its true position.
        match self.elements.last() {
            Some(AlignmentElement::Boundary { pos, .. }) if *pos == self.cursor - 1 => {
                let at = self.elements.len() - 1;
                let start_pos = *pos;
                self.elements.insert(at, AlignmentElement::Start(start_pos));
            }
            _ => self.elements.push(AlignmentElement::Start(self.cursor)),
        }
    }

    fn close_data(&mut self) {
        if self.in_data {
            self.elements.push(AlignmentElement::End(self.cursor));
            self.in_data = false;
        }
    }

    fn push_boundary(&mut self) {
        self.elements.push(AlignmentElement::Boundary {
            index: self.boundary_index,
            pos: self.cursor,
        });
        self.boundary_index += 1;
        self.cursor += 1;
    }

    fn push_gap(&mut self) {
        if self.in_data {
            match self.elements.last_mut() {
                Some(AlignmentElement::Gap { start, length })
                    if *start + *length as Position == self.cursor =>
                {
                    *length += 1;
                }
                _ => self.elements.push(AlignmentElement::Gap {
                    start: self.cursor,
                    length: 1,
                }),
            }
        }
        self.cursor += 1;
    }

    fn push_residue(&mut self, residue: char) {
        self.open_data();
        match self.elements.last_mut() {
            Some(AlignmentElement::Sequence { start, seq })
                if *start + seq.len() as Position == self.cursor =>
            {
                seq.push(residue);
            }
            _ => self.elements.push(AlignmentElement::Sequence {
                start: self.cursor,
                seq: residue.to_string(),
            }),
        }
        self.cursor += 1;
    }

    fn finish(mut self) -> (String, Vec<AlignmentElement>) {
        self.close_data();
        (self.name, self.elements)
    }
}

pub struct MsaParser {
    file_kind: FileKind,
    alphabet: Alphabet,
    block_start: Position,
    reference: Option<String>,
    states: Vec<AlleleParseState>,
    by_name: HashMap<String, usize>,
    reference_residues: HashMap<Position, char>,
    latest_reference_position: Position,
}

impl MsaParser {
    pub fn parse_path<P: AsRef<Path>>(path: P) -> Result<ParseResult, TypingError> {
        let file = File::open(path.as_ref()).map_err(|e| {
            TypingError::Other(format!(
                "unable to open alignment file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::parse(BufReader::new(file))
    }

    pub fn parse<R: BufRead>(reader: R) -> Result<ParseResult, TypingError> {
        let mut parser: Option<MsaParser> = None;

        for line in reader.lines() {
            let line =
                line.map_err(|e| TypingError::Other(format!("alignment read failed: {}", e)))?;
            match parser.as_mut() {
                None => {
                    // Everything before the first position header is file
                    // banner; only a header line can start the parse proper.
                    if let Line::Position { dna, pos } = classify(&line)? {
                        parser = Some(MsaParser::new(dna, pos));
                    }
                }
                Some(active) => {
                    if !active.consume_line(&line)? {
                        break;
                    }
                }
            }
        }

        match parser {
            Some(parser) => parser.finish(),
            None => Err(TypingError::Other(
                "alignment input ended before any position header".to_string(),
            )),
        }
    }

    fn new(dna: bool, pos: Position) -> MsaParser {
        let (file_kind, alphabet) = if dna {
            (FileKind::Dna, dna::alphabet())
        } else {
            (FileKind::Protein, protein::alphabet())
        };
        MsaParser {
            file_kind,
            alphabet,
            block_start: pos,
            reference: None,
            states: Vec::new(),
            by_name: HashMap::new(),
            reference_residues: HashMap::new(),
            latest_reference_position: pos,
        }
    }

    /// Returns false once the input's closing line has been reached.
    fn consume_line(&mut self, line: &str) -> Result<bool, TypingError> {
        match classify(line)? {
            Line::Empty | Line::Dash => Ok(true),
            Line::EndOfInput => Ok(false),
            Line::Position { pos, .. } => {
                self.block_start = pos;
                if self.reference.is_some() && self.latest_reference_position != pos {
                    // Boundaries consume internal positions while the file's
                    // printed counter skips them, so the two drift apart near
                    // boundary runs. Trust the internal counter.
                    warn!(
                        "position header {} disagrees with internal reference position {}",
                        pos, self.latest_reference_position
                    );
                }
                Ok(true)
            }
            Line::SeqData { allele, residues } => {
                if residues.is_empty() {
                    return Err(TypingError::parse(
                        allele,
                        self.block_start,
                        "empty data line",
                    ));
                }
                self.consume_residues(allele, &residues)?;
                Ok(true)
            }
        }
    }

    fn consume_residues(&mut self, allele: &str, residues: &str) -> Result<(), TypingError> {
        let is_reference = match &self.reference {
            None => {
                self.reference = Some(allele.to_string());
                true
            }
            Some(reference) => reference == allele,
        };

        let index = match self.by_name.get(allele) {
            Some(index) => *index,
            None => {
                self.states
                    .push(AlleleParseState::new(allele, self.block_start));
                self.by_name.insert(allele.to_string(), self.states.len() - 1);
                self.states.len() - 1
            }
        };

        for c in residues.chars() {
            let cursor = self.states[index].cursor;
            match c {
                '|' => self.states[index].push_boundary(),
                '*' => {
                    self.states[index].close_data();
                    self.states[index].cursor += 1;
                }
                'X' if self.file_kind == FileKind::Protein => {
                    self.states[index].close_data();
                    self.states[index].cursor += 1;
                }
                '.' => self.states[index].push_gap(),
                '-' => {
                    if is_reference {
                        return Err(TypingError::parse(
                            allele,
                            cursor,
                            "reference allele marked same-as-reference",
                        ));
                    }
                    match self.reference_residues.get(&cursor) {
                        Some(reference_residue) => {
                            let reference_residue = *reference_residue;
                            self.states[index].push_residue(reference_residue);
                        }
                        None => {
                            return Err(TypingError::parse(
                                allele,
                                cursor,
                                "no reference residue to copy at this position",
                            ));
                        }
                    }
                }
                c if c.is_ascii() && self.alphabet.is_word([c as u8]) => {
                    let residue = c.to_ascii_uppercase();
                    self.states[index].push_residue(residue);
                    if is_reference {
                        self.reference_residues.insert(cursor, residue);
                    }
                }
                c => {
                    return Err(TypingError::parse(
                        allele,
                        cursor,
                        format!("invalid residue character {:?}", c),
                    ));
                }
            }
        }

        if is_reference {
            self.latest_reference_position = self.states[index].cursor;
        }
        Ok(())
    }

    fn finish(self) -> Result<ParseResult, TypingError> {
        let file_kind = self.file_kind;
        let reference = self.reference.ok_or_else(|| {
            TypingError::Other("alignment input contained no sequence data".to_string())
        })?;

        let mut reference_elements = Vec::new();
        let mut alternates = Vec::new();
        for state in self.states {
            let (name, elements) = state.finish();
            if name == reference {
                reference_elements = elements;
            } else if elements.is_empty() {
                warn!("dropping allele {} with no alignment elements", name);
            } else {
                alternates.push((name, elements));
            }
        }

        if reference_elements.is_empty() {
            return Err(TypingError::parse(
                reference,
                0,
                "reference allele has no alignment elements".to_string(),
            ));
        }

        Ok(ParseResult {
            file_kind,
            reference,
            reference_elements,
            alternates,
        })
    }
}
