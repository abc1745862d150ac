use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectIn {
    pub package: String,
    pub distributions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvInfo {
    pub python_exe: String,
    pub python_version: String,
    #[serde(default)]
    pub package_version: Option<String>,
    #[serde(default)]
    pub package_dir: Option<String>,
    #[serde(default)]
    pub distributions: BTreeMap<String, Option<String>>,
    /// Runtime requirements declared by the package itself.
    #[serde(default)]
    pub requires: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub platform: BTreeMap<String, String>,
    #[serde(default)]
    pub error: Option<String>,
}
