// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Reads multi-hop QA datasets from JSON files into memory.
//
// Every dataset is a single JSON array of records per split,
// stored under a common data root:
//
//   data/
//     2WikiMultihopQA/{train,dev,test}.json
//     Super-NaturalInstructions/HotPotQA/{train,dev,test}.json
//     CompositionalCelebrities/compositional_celebrities.json
//       └── { "data": [ ... ] }          ← one file, no splits
//     FinetuningData/{direct,self_ask}_{train,dev,test}.json
//     StrategyQA/{train,dev,test}.json
//
// The loaders never transform records. They parse, optionally
// keep the first N, and hand the list back as it was on disk.
//
// The data root is injected through DatasetPaths rather than
// baked in, so tests can point the loaders at a temp dir.

use serde::de::IgnoredAny;
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::domain::error::{DataError, DataResult};
use crate::domain::example::{Example, Split, Strategy};

/// Default location of the data root, relative to the working directory.
pub const DEFAULT_DATA_ROOT: &str = "data";

const COMPOSITIONAL_CELEBRITIES_FILE: &str = "compositional_celebrities.json";

// ─── DatasetKind ──────────────────────────────────────────────────────────────
/// The datasets this crate knows the on-disk layout of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    TwoWikiMultihopQA,
    HotPotQA,
    CompositionalCelebrities,
    /// Restructured 2WikiMultihopQA for fine-tuning, one file per strategy and split.
    Finetuning(Strategy),
    StrategyQA,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::TwoWikiMultihopQA        => f.write_str("2wiki"),
            DatasetKind::HotPotQA                 => f.write_str("hotpotqa"),
            DatasetKind::CompositionalCelebrities => f.write_str("compositional-celebrities"),
            DatasetKind::Finetuning(strategy)     => write!(f, "finetuning:{strategy}"),
            DatasetKind::StrategyQA               => f.write_str("strategyqa"),
        }
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    /// Accepts the names printed by `Display`; `finetuning` alone means
    /// the direct strategy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2wiki"                     => Ok(DatasetKind::TwoWikiMultihopQA),
            "hotpotqa"                  => Ok(DatasetKind::HotPotQA),
            "compositional-celebrities" => Ok(DatasetKind::CompositionalCelebrities),
            "strategyqa"                => Ok(DatasetKind::StrategyQA),
            "finetuning"                => Ok(DatasetKind::Finetuning(Strategy::Direct)),
            other => match other.strip_prefix("finetuning:") {
                Some(strategy) => Ok(DatasetKind::Finetuning(strategy.parse()?)),
                None => Err(format!(
                    "unknown dataset '{other}' (expected 2wiki, hotpotqa, \
                     compositional-celebrities, finetuning[:direct|:self_ask] or strategyqa)"
                )),
            },
        }
    }
}

// ─── DatasetPaths ─────────────────────────────────────────────────────────────
/// Resolves (dataset, split) to a file under a data root.
#[derive(Debug, Clone)]
pub struct DatasetPaths {
    root: PathBuf,
}

impl DatasetPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, kind: DatasetKind, split: Split) -> PathBuf {
        match kind {
            DatasetKind::TwoWikiMultihopQA => self
                .root
                .join("2WikiMultihopQA")
                .join(format!("{split}.json")),
            DatasetKind::HotPotQA => self
                .root
                .join("Super-NaturalInstructions")
                .join("HotPotQA")
                .join(format!("{split}.json")),
            // Only one file exists; the split is ignored.
            DatasetKind::CompositionalCelebrities => self
                .root
                .join("CompositionalCelebrities")
                .join(COMPOSITIONAL_CELEBRITIES_FILE),
            DatasetKind::Finetuning(strategy) => self
                .root
                .join("FinetuningData")
                .join(format!("{strategy}_{split}.json")),
            DatasetKind::StrategyQA => self
                .root
                .join("StrategyQA")
                .join(format!("{split}.json")),
        }
    }
}

impl Default for DatasetPaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}

// ─── DatasetLoader ────────────────────────────────────────────────────────────
/// Loads dataset splits through a `DatasetPaths` resolver.
///
/// `n_examples` follows one rule for every dataset: `Some(n)` with
/// `n > 0` keeps the first `n` records, anything else keeps all.
#[derive(Debug, Clone, Default)]
pub struct DatasetLoader {
    paths: DatasetPaths,
}

impl DatasetLoader {
    pub fn new(paths: DatasetPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &DatasetPaths {
        &self.paths
    }

    /// Load any known dataset split.
    pub fn load(
        &self,
        kind:       DatasetKind,
        split:      Split,
        n_examples: Option<usize>,
    ) -> DataResult<Vec<Example>> {
        let path = self.paths.resolve(kind, split);

        let examples = match kind {
            DatasetKind::CompositionalCelebrities => {
                tracing::warn!(
                    "There is only one CompositionalCelebrities file. \
                     The data has not been split yet; ignoring split '{}'",
                    split
                );
                read_examples_under_key(&path, "data")?
            }
            _ => read_examples(&path)?,
        };

        let examples = take_first(examples, n_examples);
        tracing::debug!("Loaded {} {} examples from '{}'", examples.len(), kind, path.display());
        Ok(examples)
    }

    /// Records have `_id`, `question`, `answer`, `supporting_facts`,
    /// `context`, `evidences`, `type` and `entity_ids`. The test split
    /// has no answers, supporting facts or evidences.
    pub fn load_2wiki_multihop_qa(&self, split: Split, n_examples: Option<usize>) -> DataResult<Vec<Example>> {
        self.load(DatasetKind::TwoWikiMultihopQA, split, n_examples)
    }

    /// Records have `_id`, `question`, `answer`, `supporting_facts`,
    /// `context`, `type` (comparison or bridge) and `level`.
    pub fn load_hotpot_qa(&self, split: Split, n_examples: Option<usize>) -> DataResult<Vec<Example>> {
        self.load(DatasetKind::HotPotQA, split, n_examples)
    }

    pub fn load_compositional_celebrities(&self, n_examples: Option<usize>) -> DataResult<Vec<Example>> {
        self.load(DatasetKind::CompositionalCelebrities, Split::Train, n_examples)
    }

    /// Records have `prompt`, `target`, `answer` and usually `num_prompt_tokens`.
    pub fn load_finetuning_data(
        &self,
        split:      Split,
        strategy:   Strategy,
        n_examples: Option<usize>,
    ) -> DataResult<Vec<Example>> {
        self.load(DatasetKind::Finetuning(strategy), split, n_examples)
    }

    /// Records have `qid`, `term`, `description`, `question`, boolean
    /// `answer`, `facts`, `decomposition` and `evidence`.
    pub fn load_strategy_qa(&self, split: Split, n_examples: Option<usize>) -> DataResult<Vec<Example>> {
        self.load(DatasetKind::StrategyQA, split, n_examples)
    }
}

/// Load externally generated evaluation data (`prompt`/`target`/`answer`
/// records) from an explicit path.
pub fn load_test_data(path: impl AsRef<Path>, n_examples: Option<usize>) -> DataResult<Vec<Example>> {
    Ok(take_first(read_examples(path.as_ref())?, n_examples))
}

// ─── File helpers ─────────────────────────────────────────────────────────────

/// Parse a file holding a JSON array of records.
pub fn read_examples(path: &Path) -> DataResult<Vec<Example>> {
    let value = read_json(path)?;
    into_examples(value, path)
}

/// Parse a file holding `{ key: [records...] }`.
fn read_examples_under_key(path: &Path, key: &str) -> DataResult<Vec<Example>> {
    match read_json(path)? {
        Value::Object(mut root) => match root.remove(key) {
            Some(inner) => into_examples(inner, path),
            None        => Err(DataError::NotAnArray(path.to_path_buf())),
        },
        _ => Err(DataError::NotAnArray(path.to_path_buf())),
    }
}

/// Count records in a JSON array file without keeping them.
/// The whole file is still parsed; only the record contents are discarded.
pub fn count_examples(path: &Path) -> DataResult<usize> {
    let file = File::open(path).map_err(|e| DataError::from_io(path, e))?;
    let records: Vec<IgnoredAny> = serde_json::from_reader(BufReader::new(file))
        .map_err(|source| DataError::Json { path: path.to_path_buf(), source })?;
    Ok(records.len())
}

/// Write records as a single JSON array, keys in their original order.
pub fn write_examples(path: &Path, examples: &[Example]) -> DataResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DataError::from_io(parent, e))?;
    }

    let file       = File::create(path).map_err(|e| DataError::from_io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, examples)
        .map_err(|source| DataError::Json { path: path.to_path_buf(), source })?;
    writer.flush().map_err(|e| DataError::from_io(path, e))?;
    Ok(())
}

fn read_json(path: &Path) -> DataResult<Value> {
    let file = File::open(path).map_err(|e| DataError::from_io(path, e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| DataError::Json { path: path.to_path_buf(), source })
}

fn into_examples(value: Value, path: &Path) -> DataResult<Vec<Example>> {
    let Value::Array(items) = value else {
        return Err(DataError::NotAnArray(path.to_path_buf()));
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(record) => Ok(record),
            _                     => Err(DataError::NotAnArray(path.to_path_buf())),
        })
        .collect()
}

/// Keep the first `n` records when `n > 0`.
fn take_first(mut examples: Vec<Example>, n_examples: Option<usize>) -> Vec<Example> {
    if let Some(n) = n_examples.filter(|&n| n > 0) {
        examples.truncate(n);
    }
    examples
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_json(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
    }

    fn numbered(n: usize) -> Value {
        Value::Array((0..n).map(|i| json!({"_id": i, "question": format!("q{i}")})).collect())
    }

    #[test]
    fn test_resolves_fixed_layout() {
        let paths = DatasetPaths::new("data");
        assert_eq!(
            paths.resolve(DatasetKind::TwoWikiMultihopQA, Split::Dev),
            Path::new("data/2WikiMultihopQA/dev.json")
        );
        assert_eq!(
            paths.resolve(DatasetKind::HotPotQA, Split::Train),
            Path::new("data/Super-NaturalInstructions/HotPotQA/train.json")
        );
        assert_eq!(
            paths.resolve(DatasetKind::Finetuning(Strategy::SelfAsk), Split::Test),
            Path::new("data/FinetuningData/self_ask_test.json")
        );
        assert_eq!(
            paths.resolve(DatasetKind::CompositionalCelebrities, Split::Dev),
            Path::new("data/CompositionalCelebrities/compositional_celebrities.json")
        );
    }

    #[test]
    fn test_cap_returns_min_of_n_and_total_in_order() {
        let dir    = TempDir::new().unwrap();
        let loader = DatasetLoader::new(DatasetPaths::new(dir.path()));
        write_json(&dir.path().join("2WikiMultihopQA/train.json"), &numbered(5));

        for (cap, expected) in [(Some(3), 3), (Some(5), 5), (Some(50), 5)] {
            let data = loader.load_2wiki_multihop_qa(Split::Train, cap).unwrap();
            assert_eq!(data.len(), expected);
            for (i, ex) in data.iter().enumerate() {
                assert_eq!(ex["_id"], json!(i));
            }
        }
    }

    #[test]
    fn test_no_cap_or_zero_keeps_everything() {
        let dir    = TempDir::new().unwrap();
        let loader = DatasetLoader::new(DatasetPaths::new(dir.path()));
        write_json(&dir.path().join("StrategyQA/dev.json"), &numbered(4));

        assert_eq!(loader.load_strategy_qa(Split::Dev, None).unwrap().len(), 4);
        assert_eq!(loader.load_strategy_qa(Split::Dev, Some(0)).unwrap().len(), 4);
    }

    #[test]
    fn test_missing_split_is_not_found() {
        let dir    = TempDir::new().unwrap();
        let loader = DatasetLoader::new(DatasetPaths::new(dir.path()));
        let err    = loader.load_hotpot_qa(Split::Test, None).unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("FinetuningData/direct_train.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[{\"prompt\": ").unwrap();

        let loader = DatasetLoader::new(DatasetPaths::new(dir.path()));
        let err    = loader.load_finetuning_data(Split::Train, Strategy::Direct, None).unwrap_err();
        assert!(matches!(err, DataError::Json { .. }));
    }

    #[test]
    fn test_compositional_celebrities_reads_data_key() {
        let dir = TempDir::new().unwrap();
        write_json(
            &dir.path().join("CompositionalCelebrities/compositional_celebrities.json"),
            &json!({"data": numbered(3)}),
        );

        let loader = DatasetLoader::new(DatasetPaths::new(dir.path()));
        assert_eq!(loader.load_compositional_celebrities(Some(2)).unwrap().len(), 2);
    }

    #[test]
    fn test_non_array_file_is_rejected() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("eval.json");
        write_json(&path, &json!({"prompt": "x"}));
        assert!(matches!(load_test_data(&path, None), Err(DataError::NotAnArray(_))));
    }

    #[test]
    fn test_count_examples_matches_load() {
        let dir  = TempDir::new().unwrap();
        let path = dir.path().join("eval.json");
        write_json(&path, &numbered(7));
        assert_eq!(count_examples(&path).unwrap(), 7);
        assert_eq!(load_test_data(&path, None).unwrap().len(), 7);
    }

    #[test]
    fn test_write_then_read_preserves_records() {
        let dir      = TempDir::new().unwrap();
        let path     = dir.path().join("out/records.json");
        let examples = into_examples(
            json!([{"target": "t", "prompt": "p", "answer": null}]),
            &path,
        ).unwrap();

        write_examples(&path, &examples).unwrap();
        let back = read_examples(&path).unwrap();
        assert_eq!(back, examples);
        // key order survives the round trip
        let keys: Vec<_> = back[0].keys().cloned().collect();
        assert_eq!(keys, vec!["target", "prompt", "answer"]);
    }

    #[test]
    fn test_dataset_kind_names() {
        assert_eq!("finetuning".parse::<DatasetKind>().unwrap(), DatasetKind::Finetuning(Strategy::Direct));
        assert_eq!(
            "finetuning:self_ask".parse::<DatasetKind>().unwrap(),
            DatasetKind::Finetuning(Strategy::SelfAsk)
        );
        assert_eq!("2wiki".parse::<DatasetKind>().unwrap().to_string(), "2wiki");
        assert!("squad".parse::<DatasetKind>().is_err());
    }
}
