// ============================================================
// Layer 2 — DatasetUseCase
// ============================================================
// Dataset inspection and the offline post-processing filters:
//
//   show            load a dataset split and summarize it; for
//                   fine-tuning data, also preview the answers
//   verify_answers  keep records whose answer is in the prompt
//   filter_tokens   keep records with short enough prompts
//
// The filters write sibling files next to their inputs; see
// data::filters for the naming.

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::data::filters::{filter_token_size, verify_answer_in_prompt, FilterReport};
use crate::data::loader::{DatasetKind, DatasetLoader};
use crate::data::splitter::qa_split_with_answers;
use crate::domain::example::{Example, Split};

/// Answers previewed by `show` for fine-tuning data.
const ANSWER_PREVIEW: usize = 5;

/// What `show` found in one dataset split.
#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub kind:  DatasetKind,
    pub split: Split,
    pub path:  PathBuf,
    pub count: usize,
    /// Union of record keys, sorted.
    pub keys:  Vec<String>,
    pub first: Option<Example>,
    /// First few gold answers; only filled for fine-tuning data.
    pub answers: Vec<String>,
}

pub struct DatasetUseCase {
    loader: DatasetLoader,
}

impl DatasetUseCase {
    pub fn new(loader: DatasetLoader) -> Self {
        Self { loader }
    }

    pub fn show(&self, kind: DatasetKind, split: Split, n_examples: Option<usize>) -> Result<DatasetSummary> {
        let path   = self.loader.paths().resolve(kind, split);
        let loader = &self.loader;

        let examples = match kind {
            DatasetKind::TwoWikiMultihopQA        => loader.load_2wiki_multihop_qa(split, n_examples)?,
            DatasetKind::HotPotQA                 => loader.load_hotpot_qa(split, n_examples)?,
            DatasetKind::CompositionalCelebrities => loader.load_compositional_celebrities(n_examples)?,
            DatasetKind::Finetuning(strategy)     => loader.load_finetuning_data(split, strategy, n_examples)?,
            DatasetKind::StrategyQA               => loader.load_strategy_qa(split, n_examples)?,
        };

        // Fine-tuning records must be full (prompt, target, answer) triples.
        let answers = match kind {
            DatasetKind::Finetuning(_) => {
                let (_, _, answers) = qa_split_with_answers(&examples)?;
                answers.into_iter().take(ANSWER_PREVIEW).collect()
            }
            _ => Vec::new(),
        };

        let keys: BTreeSet<&String> = examples.iter().flat_map(|e| e.keys()).collect();

        Ok(DatasetSummary {
            kind,
            split,
            path,
            count: examples.len(),
            keys:  keys.into_iter().cloned().collect(),
            first: examples.into_iter().next(),
            answers,
        })
    }

    pub fn verify_answers(&self, train_file: &str, valid_file: &str) -> Result<[FilterReport; 2]> {
        Ok(verify_answer_in_prompt(train_file, valid_file)?)
    }

    pub fn filter_tokens(&self, train_file: &str, valid_file: &str, token_size: u64) -> Result<[FilterReport; 2]> {
        Ok(filter_token_size(train_file, valid_file, token_size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::DatasetPaths;
    use crate::domain::example::Strategy;
    use serde_json::json;
    use tempfile::TempDir;

    fn use_case(dir: &TempDir) -> DatasetUseCase {
        DatasetUseCase::new(DatasetLoader::new(DatasetPaths::new(dir.path())))
    }

    #[test]
    fn test_show_summarizes_finetuning_split() {
        let dir   = TempDir::new().unwrap();
        let cases = use_case(&dir);
        let kind  = DatasetKind::Finetuning(Strategy::SelfAsk);
        let path  = cases.loader.paths().resolve(kind, Split::Dev);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            json!([
                {"prompt": "p0", "target": "t0", "answer": "a0"},
                {"prompt": "p1", "target": "t1", "answer": "a1", "num_prompt_tokens": 4},
                {"prompt": "p2", "target": "t2", "answer": "a2"},
            ])
            .to_string(),
        )
        .unwrap();

        let summary = cases.show(kind, Split::Dev, Some(2)).unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.keys, vec!["answer", "num_prompt_tokens", "prompt", "target"]);
        assert_eq!(summary.first.unwrap()["prompt"], json!("p0"));
        assert_eq!(summary.answers, vec!["a0", "a1"]);
        assert_eq!(summary.path, path);
    }

    #[test]
    fn test_show_finetuning_requires_answers() {
        let dir   = TempDir::new().unwrap();
        let cases = use_case(&dir);
        let kind  = DatasetKind::Finetuning(Strategy::Direct);
        let path  = cases.loader.paths().resolve(kind, Split::Train);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, json!([{"prompt": "p0", "target": "t0"}]).to_string()).unwrap();

        let err = cases.show(kind, Split::Train, None).unwrap_err();
        assert!(err.to_string().contains("answer"), "{err}");
    }

    #[test]
    fn test_show_other_datasets_have_no_answer_preview() {
        let dir   = TempDir::new().unwrap();
        let cases = use_case(&dir);
        let path  = cases.loader.paths().resolve(DatasetKind::CompositionalCelebrities, Split::Test);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, json!({"data": [{"Question": "q", "Answer": "a"}]}).to_string()).unwrap();

        let summary = cases.show(DatasetKind::CompositionalCelebrities, Split::Test, None).unwrap();
        assert_eq!(summary.count, 1);
        assert!(summary.answers.is_empty());
    }

    #[test]
    fn test_show_missing_split_fails() {
        let dir = TempDir::new().unwrap();
        assert!(use_case(&dir).show(DatasetKind::HotPotQA, Split::Train, None).is_err());
    }

    #[test]
    fn test_filter_tokens_reports_both_files() {
        let dir   = TempDir::new().unwrap();
        let train = dir.path().join("train.json");
        let valid = dir.path().join("dev.json");
        std::fs::write(&train, json!([{"num_prompt_tokens": 3}, {"num_prompt_tokens": 30}]).to_string()).unwrap();
        std::fs::write(&valid, json!([{"num_prompt_tokens": 3}]).to_string()).unwrap();

        let [t, v] = use_case(&dir)
            .filter_tokens(train.to_str().unwrap(), valid.to_str().unwrap(), 10)
            .unwrap();
        assert_eq!((t.kept, v.kept), (1, 1));
    }
}
