pub mod allele_index;
pub mod allele_map;
pub mod allele_set;
