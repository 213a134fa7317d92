// ============================================================
// Layer 3 — Example Record Domain Types
// ============================================================
// An example record is kept as the JSON object it was loaded
// from. Each dataset carries its own keys (question, answer,
// context, supporting_facts, ... or prompt/target/answer for
// fine-tuning data) and nothing downstream needs a schema for
// all of them, so records stay as ordered JSON maps. That also
// means a record written back by a filter is identical to the
// one that was read.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::{DataError, DataResult};

/// One example record, keys in file order.
pub type Example = Map<String, Value>;

/// Field names used by fine-tuning data.
pub const PROMPT: &str = "prompt";
pub const TARGET: &str = "target";
pub const ANSWER: &str = "answer";
pub const NUM_PROMPT_TOKENS: &str = "num_prompt_tokens";

/// A train/dev/test partition of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev   => "dev",
            Split::Test  => "test",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "dev"   => Ok(Split::Dev),
            "test"  => Ok(Split::Test),
            other   => Err(format!("unknown split '{other}' (expected train, dev or test)")),
        }
    }
}

/// Prompting strategy the fine-tuning data was generated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The model is prompted with the question directly.
    Direct,
    /// Prompt and target are augmented with a self-ask rationale.
    SelfAsk,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Direct  => "direct",
            Strategy::SelfAsk => "self_ask",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct"   => Ok(Strategy::Direct),
            "self_ask" => Ok(Strategy::SelfAsk),
            other      => Err(format!("unknown strategy '{other}' (expected direct or self_ask)")),
        }
    }
}

/// Render a JSON value as text the way a dataframe `astype(str)` would:
/// strings verbatim, everything else as its JSON form.
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other            => other.to_string(),
    }
}

/// Fetch `field` from the record at `index`, as text.
pub fn text_field(example: &Example, index: usize, field: &str) -> DataResult<String> {
    example
        .get(field)
        .map(value_as_text)
        .ok_or_else(|| DataError::MissingField { index, field: field.to_string() })
}

/// Fetch `field` from the record at `index` as a non-negative integer.
pub fn count_field(example: &Example, index: usize, field: &str) -> DataResult<u64> {
    let value = example
        .get(field)
        .ok_or_else(|| DataError::MissingField { index, field: field.to_string() })?;

    value.as_u64().ok_or_else(|| DataError::InvalidField {
        index,
        field:  field.to_string(),
        reason: format!("expected a non-negative integer, found {value}"),
    })
}
