use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::graphs::kmer_index::KmerIndex;
use crate::graphs::AlleleGraph;

pub const DEFAULT_CACHE_ROOT: &str = ".cache";

/// Disk cache for prebuilt graphs and k-mer indices, keyed by a readable
/// fingerprint of the construction arguments. Load failures of any kind fall
/// back to reconstruction; store failures only warn.
pub struct DiskCache {
    graphs_dir: PathBuf,
    indices_dir: PathBuf,
}

impl DiskCache {
    pub fn new<P: AsRef<Path>>(root: P) -> DiskCache {
        DiskCache {
            graphs_dir: root.as_ref().join("graphs"),
            indices_dir: root.as_ref().join("indices"),
        }
    }

    pub fn load_graph(&self, key: &str) -> Option<AlleleGraph> {
        let path = self.graphs_dir.join(format!("{}.json", key));
        let file = File::open(&path).ok()?;
        match serde_json::from_reader::<_, AlleleGraph>(BufReader::new(file)) {
            Ok(mut graph) => {
                graph.build_seed_index();
                debug!("loaded cached graph from {:?}", path);
                Some(graph)
            }
            Err(e) => {
                warn!("discarding unreadable graph cache entry {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn store_graph(&self, key: &str, graph: &AlleleGraph) {
        self.store(&self.graphs_dir, key, graph);
    }

    pub fn load_index(&self, key: &str) -> Option<KmerIndex> {
        let path = self.indices_dir.join(format!("{}.json", key));
        let file = File::open(&path).ok()?;
        match serde_json::from_reader::<_, KmerIndex>(BufReader::new(file)) {
            Ok(index) => {
                debug!("loaded cached index from {:?}", path);
                Some(index)
            }
            Err(e) => {
                warn!("discarding unreadable index cache entry {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn store_index(&self, key: &str, index: &KmerIndex) {
        self.store(&self.indices_dir, key, index);
    }

    fn store<T: serde::Serialize>(&self, dir: &Path, key: &str, value: &T) {
        if let Err(e) = create_dir_all(dir) {
            warn!("unable to create cache directory {:?}: {}", dir, e);
            return;
        }
        let path = dir.join(format!("{}.json", key));
        match File::create(&path) {
            Ok(file) => {
                if let Err(e) = serde_json::to_writer(BufWriter::new(file), value) {
                    warn!("unable to write cache entry {:?}: {}", path, e);
                }
            }
            Err(e) => warn!("unable to create cache entry {:?}: {}", path, e),
        }
    }
}

/// Deterministic, human-readable fingerprint of graph construction
/// arguments. Inspectable keys beat opaque hashes for a local cache.
pub fn graph_fingerprint(
    alignment_file: &Path,
    selection_summary: &str,
    join_same_sequence: bool,
) -> String {
    let stem = alignment_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("alignment");
    sanitize(&format!(
        "{}_{}_{}",
        stem,
        selection_summary,
        if join_same_sequence { "joined" } else { "split" }
    ))
}

pub fn index_fingerprint(graph_key: &str, k: usize) -> String {
    sanitize(&format!("{}_k{}", graph_key, k))
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}
