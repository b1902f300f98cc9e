use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};

use crate::record::{Example, Run};

/// One recorded agent run paired with the dataset example it was run
/// against. This is the unit the benchmark runner feeds to the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchPair {
    pub id: String,
    pub run: Run,
    pub example: Example,
}

/// Load benchmark pairs from a YAML/JSON file or a directory of such files.
/// Each file holds a list of pairs; the combined set is sorted by id.
pub fn load_pairs(path: impl AsRef<Path>) -> Result<Vec<BenchPair>, io::Error> {
    let path = path.as_ref();
    let mut pairs = Vec::new();

    if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let p = entry.path();
            let ext = p.extension().and_then(|s| s.to_str()).unwrap_or("");
            if !matches!(ext, "yaml" | "yml" | "json") {
                continue;
            }
            pairs.extend(load_file(&p)?);
        }
    } else {
        pairs.extend(load_file(path)?);
    }

    pairs.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(pairs)
}

fn load_file(path: &Path) -> Result<Vec<BenchPair>, io::Error> {
    let bytes = fs::read(path)?;
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if ext == "json" {
        serde_json::from_slice(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    } else {
        serde_yaml::from_slice(&bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
