//! Word count: how many times each word appears across all inputs.
//!
//! A word is a maximal run of alphabetic characters.

use anyhow::Result;

use common::{KeyValue, MapOutput};

pub fn map(_input: &str, contents: &str) -> MapOutput {
    let pairs = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|word| !word.is_empty())
        .map(|word| KeyValue::new(word, "1"))
        .collect();
    Ok(pairs)
}

pub fn reduce(_key: &str, values: &[String]) -> Result<String> {
    let mut count = 0u64;
    for value in values {
        count += value.parse::<u64>()?;
    }
    Ok(count.to_string())
}
