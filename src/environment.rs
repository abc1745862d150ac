use serde_json::{Map, Value};
use std::collections::BTreeMap;
use sysinfo::System;

pub const CI_VARS: [&str; 11] = [
    "ISSUE_NUMBER",
    "PR_URL",
    "CI_URL",
    "RUNNER_OS",
    "RUNNER_ARCH",
    "GITHUB_JOB",
    "GITHUB_WORKFLOW",
    "GITHUB_ACTION",
    "GITHUB_SHA",
    "GITHUB_EVENT_NAME",
    "GITHUB_ACTOR",
];

pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

pub fn platform_info(
    node_name_env: &str,
    python: &BTreeMap<String, String>,
    env: impl Fn(&str) -> Option<String>,
) -> Value {
    let mut info: Map<String, Value> = python
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    let fields = [
        ("system", System::name()),
        ("release", System::kernel_version()),
        ("version", System::os_version()),
        ("machine", Some(std::env::consts::ARCH.to_string())),
    ];
    for (key, value) in fields {
        info.insert(key.into(), Value::String(value.unwrap_or_default()));
    }
    let node = node_name(node_name_env, System::host_name(), &env);
    info.insert("node".into(), Value::String(node));
    Value::Object(info)
}

pub fn node_name(
    node_name_env: &str,
    host_name: Option<String>,
    env: &dyn Fn(&str) -> Option<String>,
) -> String {
    if env("GITHUB_ACTION").is_some() {
        return "Github_Actions".into();
    }
    if let Some(name) = env(node_name_env) {
        return name;
    }
    host_name
        .as_deref()
        .and_then(|h| h.split('.').next())
        .unwrap_or("")
        .to_string()
}

pub fn ci_info(env: impl Fn(&str) -> Option<String>) -> Value {
    let info: Map<String, Value> = CI_VARS
        .iter()
        .map(|name| {
            let value = env(name).map(Value::String).unwrap_or(Value::Null);
            (name.to_ascii_lowercase(), value)
        })
        .collect();
    Value::Object(info)
}
