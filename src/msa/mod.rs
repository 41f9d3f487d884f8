pub mod alignment_element;
pub mod msa_parser;
