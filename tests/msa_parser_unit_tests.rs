extern crate pardalote_hla;

use std::io::Cursor;

use pardalote_hla::msa::alignment_element::{
    check_element_order, reserialize, AlignmentElement,
};
use pardalote_hla::msa::msa_parser::{FileKind, MsaParser, ParseResult};
use pardalote_hla::utils::errors::TypingError;

fn parse(input: &str) -> ParseResult {
    MsaParser::parse(Cursor::new(input.to_string())).expect("parse should succeed")
}

fn parse_err(input: &str) -> TypingError {
    MsaParser::parse(Cursor::new(input.to_string())).expect_err("parse should fail")
}

fn seq(start: i64, s: &str) -> AlignmentElement {
    AlignmentElement::Sequence {
        start,
        seq: s.to_string(),
    }
}

#[test]
fn protein_reference_and_alternate_with_unknown_region() {
    let result = parse("Prot -1\n\n A*01 A R C D\n A*02 - - X D\n");

    assert_eq!(result.file_kind, FileKind::Protein);
    assert_eq!(result.reference, "A*01");
    assert_eq!(
        result.reference_elements,
        vec![
            AlignmentElement::Start(-1),
            seq(-1, "ARCD"),
            AlignmentElement::End(3),
        ]
    );

    // The X column closes the first segment; D reopens a second one. The
    // same-as-reference dashes pick up the reference residues.
    assert_eq!(
        result.alternate("A*02").expect("A*02 parsed"),
        &vec![
            AlignmentElement::Start(-1),
            seq(-1, "AR"),
            AlignmentElement::End(1),
            AlignmentElement::Start(2),
            seq(2, "D"),
            AlignmentElement::End(3),
        ]
    );
}

#[test]
fn boundary_keeps_its_position_when_data_opens_after_it() {
    let result = parse("gDNA 0\n\n REF AC|GT\n ALT **|AT\n");

    assert_eq!(
        result.reference_elements,
        vec![
            AlignmentElement::Start(0),
            seq(0, "AC"),
            AlignmentElement::Boundary { index: 0, pos: 2 },
            seq(3, "GT"),
            AlignmentElement::End(5),
        ]
    );

    // ALT opens right after the boundary: Start slips in before it.
    assert_eq!(
        result.alternate("ALT").expect("ALT parsed"),
        &vec![
            AlignmentElement::Start(2),
            AlignmentElement::Boundary { index: 0, pos: 2 },
            seq(3, "AT"),
            AlignmentElement::End(5),
        ]
    );
}

#[test]
fn boundary_indices_agree_between_reference_and_alternates() {
    let result = parse("gDNA 0\n\n REF AC|GT|AA\n ALT -T|--|-C\n");

    let boundaries = |elements: &[AlignmentElement]| -> Vec<(usize, i64)> {
        elements
            .iter()
            .filter_map(|e| match e {
                AlignmentElement::Boundary { index, pos } => Some((*index, *pos)),
                _ => None,
            })
            .collect()
    };

    assert_eq!(
        boundaries(&result.reference_elements),
        boundaries(result.alternate("ALT").expect("ALT parsed"))
    );
}

#[test]
fn gaps_extend_and_split_sequences() {
    let result = parse("gDNA 1\n\n R1 ACGT\n A1 A..T\n");

    assert_eq!(
        result.alternate("A1").expect("A1 parsed"),
        &vec![
            AlignmentElement::Start(1),
            seq(1, "A"),
            AlignmentElement::Gap { start: 2, length: 2 },
            seq(4, "T"),
            AlignmentElement::End(5),
        ]
    );
}

#[test]
fn dashes_copy_reference_residues() {
    let result = parse("gDNA 1\n\n R1 ACGT\n A1 -C-T\n");

    assert_eq!(
        result.alternate("A1").expect("A1 parsed"),
        &vec![
            AlignmentElement::Start(1),
            seq(1, "ACGT"),
            AlignmentElement::End(5),
        ]
    );
}

#[test]
fn alleles_continue_across_blocks() {
    let result = parse("gDNA 1\n\n R1 AC\n A1 -C\n\ngDNA 3\n\n R1 GT\n A1 G-\n");

    assert_eq!(
        result.reference_elements,
        vec![
            AlignmentElement::Start(1),
            seq(1, "ACGT"),
            AlignmentElement::End(5),
        ]
    );
    assert_eq!(
        result.alternate("A1").expect("A1 parsed"),
        &result.reference_elements.clone()
    );
}

#[test]
fn reference_dash_is_a_parse_error() {
    let err = parse_err("gDNA 1\n\n R1 A-GT\n");
    match err {
        TypingError::Parse { allele, position, .. } => {
            assert_eq!(allele, "R1");
            assert_eq!(position, 2);
        }
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn invalid_residue_is_a_parse_error() {
    let err = parse_err("gDNA 1\n\n R1 AZGT\n");
    assert!(matches!(err, TypingError::Parse { .. }));
}

#[test]
fn input_without_position_header_is_rejected() {
    assert!(matches!(
        parse_err("just a banner line\n\nanother\n"),
        TypingError::Other(_)
    ));
}

#[test]
fn all_unknown_alternates_are_dropped() {
    let result = parse("gDNA 1\n\n R1 ACGT\n A1 ****\n");
    assert!(result.alternate("A1").is_none());
    assert_eq!(result.alternates.len(), 0);
}

#[test]
fn element_positions_are_monotone_and_segmented() {
    let result = parse("gDNA 0\n\n REF AC|GT|AA\n ALT *C|G.|-A\n");
    check_element_order(&result.reference_elements).expect("reference elements ordered");
    for (_, elements) in &result.alternates {
        check_element_order(elements).expect("alternate elements ordered");
    }
}

#[test]
fn reserialized_reference_reproduces_the_residue_stream() {
    let input = "gDNA 0\n\n REF AC|G.TA\n";
    let result = parse(input);
    assert_eq!(reserialize(&result.reference_elements), "AC|G.TA");

    // Reparsing the rendered stream yields the same elements.
    let reparsed = parse(&format!("gDNA 0\n\n REF {}\n", reserialize(&result.reference_elements)));
    assert_eq!(reparsed.reference_elements, result.reference_elements);
}
