//! Inverted index: for every word, the inputs that contain it.

use anyhow::Result;
use itertools::Itertools;

use common::{KeyValue, MapOutput};

pub fn map(input: &str, contents: &str) -> MapOutput {
    let pairs = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .unique()
        .map(|word| KeyValue::new(word, input))
        .collect();
    Ok(pairs)
}

/// `"{count} {input,input,...}"`, inputs sorted and deduplicated.
pub fn reduce(_key: &str, values: &[String]) -> Result<String> {
    let inputs = values.iter().sorted().dedup().collect::<Vec<_>>();
    Ok(format!("{} {}", inputs.len(), inputs.iter().join(",")))
}
