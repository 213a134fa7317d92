// ============================================================
// Layer 4 — Post-processing Filters
// ============================================================
// Offline passes over generated fine-tuning files. Each filter
// reads a JSON array of records, keeps a subset, and writes it
// next to the input with a suffixed name:
//
//   self_ask_train.json
//     ├── self_ask_train_answer_verified.json   (verify_answer_in_prompt)
//     └── self_ask_train_256.json               (filter_token_size, 256)
//
// Kept records are written back untouched (same keys, same key
// order), so loading a filter output with the plain loader gives
// exactly the kept subset.
//
// Reference: regex crate documentation

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::data::loader::{read_examples, write_examples};
use crate::domain::error::DataResult;
use crate::domain::example::{count_field, text_field, Example, NUM_PROMPT_TOKENS, PROMPT, TARGET};

/// Suffix added by `verify_answer_in_prompt`.
pub const ANSWER_VERIFIED_SUFFIX: &str = "answer_verified";

/// Outcome of filtering one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub input:  PathBuf,
    pub output: PathBuf,
    pub kept:   usize,
    pub total:  usize,
}

impl FilterReport {
    pub fn dropped(&self) -> usize {
        self.total - self.kept
    }
}

// ─── Answer extraction ────────────────────────────────────────────────────────

fn answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Greedy up to the last period so "J.R.R. Tolkien." stays whole
    PATTERN.get_or_init(|| Regex::new(r"answer is (.*)\.").expect("answer pattern is valid"))
}

/// Pull `<text>` out of a target of the form `"... answer is <text>."`,
/// trimmed. Returns `None` when the target has no such phrase.
pub fn extract_answer_from_target(target: &str) -> Option<String> {
    answer_pattern()
        .captures(target)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

// ─── verify_answer_in_prompt ──────────────────────────────────────────────────

/// Keep records whose extracted target answer appears verbatim in the
/// prompt, for both files. Records without an extractable answer are
/// dropped.
pub fn verify_answer_in_prompt(
    train_file: impl AsRef<Path>,
    valid_file: impl AsRef<Path>,
) -> DataResult<[FilterReport; 2]> {
    Ok([
        verify_answer_file(train_file.as_ref())?,
        verify_answer_file(valid_file.as_ref())?,
    ])
}

/// Single-file form of [`verify_answer_in_prompt`].
pub fn verify_answer_file(path: &Path) -> DataResult<FilterReport> {
    let output = derived_path(path, ANSWER_VERIFIED_SUFFIX);
    filter_file(path, output, |example, index| {
        let prompt = text_field(example, index, PROMPT)?;
        let target = text_field(example, index, TARGET)?;
        Ok(extract_answer_from_target(&target).is_some_and(|answer| prompt.contains(&answer)))
    })
}

// ─── filter_token_size ────────────────────────────────────────────────────────

/// Keep records with `num_prompt_tokens <= token_size`, for both files.
pub fn filter_token_size(
    train_file: impl AsRef<Path>,
    valid_file: impl AsRef<Path>,
    token_size: u64,
) -> DataResult<[FilterReport; 2]> {
    Ok([
        filter_token_size_file(train_file.as_ref(), token_size)?,
        filter_token_size_file(valid_file.as_ref(), token_size)?,
    ])
}

/// Single-file form of [`filter_token_size`].
pub fn filter_token_size_file(path: &Path, token_size: u64) -> DataResult<FilterReport> {
    let output = derived_path(path, &token_size.to_string());
    filter_file(path, output, |example, index| {
        Ok(count_field(example, index, NUM_PROMPT_TOKENS)? <= token_size)
    })
}

// ─── Shared plumbing ──────────────────────────────────────────────────────────

/// `dir/name.json` + `suffix` → `dir/name_suffix.json`.
/// Built from the path itself, never from an open handle.
pub fn derived_path(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let name = match path.extension() {
        Some(ext) => format!("{stem}_{suffix}.{}", ext.to_string_lossy()),
        None      => format!("{stem}_{suffix}"),
    };
    path.with_file_name(name)
}

fn filter_file<F>(input: &Path, output: PathBuf, mut keep: F) -> DataResult<FilterReport>
where
    F: FnMut(&Example, usize) -> DataResult<bool>,
{
    let examples = read_examples(input)?;
    let total    = examples.len();

    let mut kept = Vec::with_capacity(total);
    for (index, example) in examples.into_iter().enumerate() {
        if keep(&example, index)? {
            kept.push(example);
        }
    }

    write_examples(&output, &kept)?;

    tracing::info!(
        "Kept {}/{} records from '{}' → '{}'",
        kept.len(),
        total,
        input.display(),
        output.display()
    );

    Ok(FilterReport {
        input: input.to_path_buf(),
        output,
        kept: kept.len(),
        total,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::load_test_data;
    use crate::domain::error::DataError;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_extracts_answer() {
        assert_eq!(extract_answer_from_target("The answer is Paris."), Some("Paris".to_string()));
        assert_eq!(
            extract_answer_from_target("Follow up: ... So the final answer is  Ann Smith ."),
            Some("Ann Smith".to_string())
        );
    }

    #[test]
    fn test_no_match_is_none() {
        assert_eq!(extract_answer_from_target("No answer here"), None);
        // the phrase needs its closing period
        assert_eq!(extract_answer_from_target("the answer is Paris"), None);
    }

    #[test]
    fn test_answer_with_inner_periods() {
        assert_eq!(
            extract_answer_from_target("So the answer is J.R.R. Tolkien."),
            Some("J.R.R. Tolkien".to_string())
        );
    }

    #[test]
    fn test_derived_path_inserts_suffix_before_extension() {
        assert_eq!(
            derived_path(Path::new("data/FinetuningData/self_ask_train.json"), "answer_verified"),
            Path::new("data/FinetuningData/self_ask_train_answer_verified.json")
        );
        assert_eq!(derived_path(Path::new("dev.json"), "100"), Path::new("dev_100.json"));
    }

    #[test]
    fn test_filter_token_size_keeps_records_under_threshold() {
        let dir   = TempDir::new().unwrap();
        let train = write(&dir, "train.json", json!([{"num_prompt_tokens": 10}, {"num_prompt_tokens": 999}]));
        let valid = write(&dir, "valid.json", json!([{"num_prompt_tokens": 100}]));

        let [t, v] = filter_token_size(&train, &valid, 100).unwrap();

        assert_eq!(t.output, dir.path().join("train_100.json"));
        assert_eq!((t.kept, t.total, t.dropped()), (1, 2, 1));
        // threshold is inclusive
        assert_eq!((v.kept, v.total), (1, 1));

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&t.output).unwrap()).unwrap();
        assert_eq!(written, json!([{"num_prompt_tokens": 10}]));
    }

    #[test]
    fn test_filter_token_size_missing_field_is_error() {
        let dir  = TempDir::new().unwrap();
        let path = write(&dir, "train.json", json!([{"prompt": "p"}]));
        assert!(matches!(
            filter_token_size_file(&path, 10),
            Err(DataError::MissingField { index: 0, .. })
        ));
    }

    #[test]
    fn test_verify_keeps_only_answers_found_in_prompt() {
        let dir = TempDir::new().unwrap();
        let records = json!([
            {"prompt": "Paris is in France. Where?", "target": "So the answer is Paris.", "answer": "Paris"},
            {"prompt": "Where?",                     "target": "So the answer is Rome.",  "answer": "Rome"},
            {"prompt": "Who?",                       "target": "I do not know",           "answer": "x"},
        ]);
        let train = write(&dir, "self_ask_train.json", records.clone());
        let valid = write(&dir, "self_ask_dev.json", records);

        let [t, v] = verify_answer_in_prompt(&train, &valid).unwrap();
        assert_eq!(t.output, dir.path().join("self_ask_train_answer_verified.json"));
        assert_eq!(v.output, dir.path().join("self_ask_dev_answer_verified.json"));
        assert_eq!((t.kept, t.total), (1, 3));

        let kept = load_test_data(&t.output, None).unwrap();
        assert_eq!(kept[0]["answer"], json!("Paris"));
    }

    #[test]
    fn test_filter_output_round_trips_through_loader() {
        let dir = TempDir::new().unwrap();
        let records = json!([
            {"target": "a", "prompt": "p0", "num_prompt_tokens": 5, "meta": {"hops": 2}},
            {"target": "b", "prompt": "p1", "num_prompt_tokens": 50},
            {"target": "c", "prompt": "p2", "num_prompt_tokens": 7, "meta": [1, 2.5, null]},
        ]);
        let train = write(&dir, "train.json", records);
        let valid = write(&dir, "valid.json", json!([]));

        let [t, _] = filter_token_size(&train, &valid, 10).unwrap();

        let original = load_test_data(&train, None).unwrap();
        let expected: Vec<_> = [&original[0], &original[2]].into_iter().cloned().collect();
        assert_eq!(load_test_data(&t.output, None).unwrap(), expected);
    }

    #[test]
    fn test_missing_input_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = verify_answer_file(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, DataError::NotFound(_)));
    }
}
