use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub package: Package,
    #[serde(default)]
    pub runner: Runner,
    #[serde(default)]
    pub report: Report,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Package {
    pub name: String,
    pub python_exe: String,
    pub test_requires: Vec<String>,
    pub soft_dependencies: Vec<String>,
}
impl Default for Package {
    fn default() -> Self {
        Self {
            name: "obspy".into(),
            python_exe: "auto".into(),
            test_requires: vec![
                "packaging".into(),
                "pyproj".into(),
                "pytest".into(),
                "pytest-json-report".into(),
            ],
            soft_dependencies: vec![
                "cartopy".into(),
                "flake8".into(),
                "geographiclib".into(),
                "pyproj".into(),
                "shapefile".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Runner {
    pub work_dir: String,
    pub traceback: String,
    pub network_marker: String,
    pub timeout_seconds: u64,
}
impl Default for Runner {
    fn default() -> Self {
        Self {
            work_dir: ".runtests-work".into(),
            traceback: "native".into(),
            network_marker: "network".into(),
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Report {
    pub host: String,
    pub scheme: String,
    pub path: String,
    pub consent: ConsentDefault,
    pub timeout_seconds: u64,
    pub node_name_env: String,
}
impl Default for Report {
    fn default() -> Self {
        Self {
            host: "tests.obspy.org".into(),
            scheme: "https".into(),
            path: "/post/v2/".into(),
            consent: ConsentDefault::Ask,
            timeout_seconds: 0,
            node_name_env: "RUNTESTS_NODE_NAME".into(),
        }
    }
}

/// Used only when neither `--report` nor `--no-report` is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentDefault {
    #[default]
    Ask,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
