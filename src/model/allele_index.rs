use std::collections::HashMap;

use serde_derive::{Deserialize, Serialize};

/// Fixed enumeration of the alleles taking part in one typing run. Index 0 is
/// always the reference allele; alternates follow in selection order. The
/// enumeration is frozen before graph construction so that allele sets and
/// per-allele maps can use dense indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlleleIndex {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl AlleleIndex {
    pub fn new(names: Vec<String>) -> AlleleIndex {
        let positions = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect::<HashMap<String, usize>>();
        AlleleIndex { names, positions }
    }

    pub fn size(&self) -> usize {
        self.names.len()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn name_of(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}
