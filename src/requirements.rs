use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::collections::BTreeMap;

const DELIMITERS: &str = r"[ =<>!~;\[]";

/// `pytest-json-report>=1.2` -> `pytest-json-report`
pub fn distribution_names(requirements: &[String]) -> Result<Vec<String>> {
    let re = Regex::new(DELIMITERS).with_context(|| "compiling requirement delimiters")?;
    Ok(requirements
        .iter()
        .filter_map(|r| re.splitn(r.trim(), 2).next())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

pub fn ensure_installed(
    requirements: &[String],
    installed: &BTreeMap<String, Option<String>>,
) -> Result<()> {
    let missing: Vec<String> = distribution_names(requirements)?
        .into_iter()
        .filter(|name| !matches!(installed.get(name), Some(Some(_))))
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(anyhow!(
        "not all test requirements are installed (missing: {}). \
         Install them before running the tests, e.g. with pip:\n\t$ pip install {}",
        missing.join(", "),
        requirements.join(" ")
    ))
}
