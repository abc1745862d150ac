use crate::{
    config::Config,
    consent::{self, Consent, Prompt},
    engine::{EnvInfo, Engine, InspectIn},
    environment,
    report::Report,
    requirements,
    submit::{submit_report, Endpoint, SubmissionResult, Transport},
    util::{absolutize, ensure_dir, unix_timestamp},
};
use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const REPORT_FILE_FLAG: &str = "--json-report-file";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Local,
    Network,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub pytest_args: Vec<String>,
    pub selection: Selection,
    pub coverage: bool,
    pub consent: Consent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PytestInvocation {
    pub args: Vec<String>,
    pub report_file: Option<PathBuf>,
}

/// User arguments come first; an explicit `--json-report-file`, `--tb` or `-m`
/// suppresses the corresponding default.
pub fn build_pytest_args(
    cfg: &Config,
    opts: &RunOptions,
    package_dir: &Path,
    default_report: &Path,
) -> PytestInvocation {
    let user = &opts.pytest_args;
    let mut args = user.clone();

    args.push("--json-report".into());
    let report_file = match user_report_file(user) {
        Some(p) if p.eq_ignore_ascii_case("none") => None,
        // pytest resolves relative paths against its own cwd.
        Some(p) => Some(package_dir.join(p)),
        None => {
            args.push(format!("{REPORT_FILE_FLAG}={}", default_report.display()));
            Some(default_report.to_path_buf())
        }
    };
    args.push("--json-report-indent=2".into());

    if !has_flag(user, "--tb") {
        args.push(format!("--tb={}", cfg.runner.traceback));
    }

    if !has_flag(user, "-m") {
        let marker = &cfg.runner.network_marker;
        match opts.selection {
            Selection::Local => args.extend(["-m".into(), format!("not {marker}")]),
            Selection::Network => args.extend(["-m".into(), marker.clone()]),
            Selection::All => {}
        }
    }

    if opts.coverage {
        args.extend([
            format!("--cov={}", package_dir.display()),
            "--cov-report=term-missing".into(),
            "--cov-report=xml".into(),
            "--cov-append".into(),
        ]);
    }

    PytestInvocation { args, report_file }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|a| a == flag || a.starts_with(&format!("{flag}=")))
}

fn user_report_file(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(v) = arg.strip_prefix(&format!("{REPORT_FILE_FLAG}=")) {
            return Some(v.to_string());
        }
        if arg == REPORT_FILE_FLAG {
            return iter.next().cloned();
        }
    }
    None
}

pub fn dependency_info(package: &str, env: &EnvInfo) -> Value {
    let mut deps = Map::new();
    deps.insert(
        package.into(),
        Value::String(env.package_version.clone().unwrap_or_else(|| "---".into())),
    );
    for (name, version) in env.requires.iter().chain(&env.distributions) {
        let v = version.clone().unwrap_or_else(|| "---".into());
        deps.insert(name.clone(), Value::String(v));
    }
    Value::Object(deps)
}

pub struct Pipeline<E: Engine> {
    cfg: Config,
    engine: E,
}

impl<E: Engine> Pipeline<E> {
    pub fn new(cfg: &Config, engine: E) -> Self {
        Self {
            cfg: cfg.clone(),
            engine,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from_config(&self.cfg)
    }

    pub fn inspect(&self) -> Result<EnvInfo> {
        let mut distributions = requirements::distribution_names(&self.cfg.package.test_requires)?;
        for name in requirements::distribution_names(&self.cfg.package.soft_dependencies)? {
            if !distributions.contains(&name) {
                distributions.push(name);
            }
        }
        let req = InspectIn {
            package: self.cfg.package.name.clone(),
            distributions,
        };
        self.engine
            .inspect(&req)
            .with_context(|| "inspecting python environment")
    }

    pub fn run(
        &self,
        opts: &RunOptions,
        transport: &dyn Transport,
        prompt: &mut dyn Prompt,
        out: &mut dyn Write,
    ) -> Result<i32> {
        let env = self.inspect()?;
        requirements::ensure_installed(&self.cfg.package.test_requires, &env.distributions)?;
        let package_dir = env.package_dir.as_deref().map(PathBuf::from).ok_or_else(|| {
            anyhow!(
                "cannot locate package {}: {}",
                self.cfg.package.name,
                env.error.as_deref().unwrap_or("no package directory reported")
            )
        })?;
        info!(
            "package {} {} at {}",
            self.cfg.package.name,
            env.package_version.as_deref().unwrap_or("?"),
            package_dir.display()
        );

        let work_dir = absolutize(Path::new(&self.cfg.runner.work_dir))?;
        ensure_dir(&work_dir)?;
        let default_report = work_dir.join(format!(
            "report-{}-{}.json",
            unix_timestamp(),
            std::process::id()
        ));

        let invocation = build_pytest_args(&self.cfg, opts, &package_dir, &default_report);
        let status = self.engine.run_pytest(&package_dir, &invocation.args)?;
        info!("pytest exited with {status}");

        let Some(report_file) = invocation.report_file else {
            warn!("{REPORT_FILE_FLAG}=none given; no report to upload");
            return Ok(status);
        };
        if !report_file.exists() {
            warn!("pytest wrote no report at {}", report_file.display());
            return Ok(status);
        }
        info!("report saved at {}", report_file.display());

        let mut report = Report::load(&report_file)?;
        self.annotate(&mut report, &env, &opts.pytest_args);
        self.deliver(&mut report, opts.consent, transport, prompt, out)?;
        Ok(status)
    }

    fn annotate(&self, report: &mut Report, env: &EnvInfo, forwarded: &[String]) {
        let lookup = environment::env_lookup;
        report.annotate(
            "platform_info",
            environment::platform_info(&self.cfg.report.node_name_env, &env.platform, lookup),
        );
        report.annotate("ci_info", environment::ci_info(lookup));
        report.annotate("dependencies", dependency_info(&self.cfg.package.name, env));
        report.annotate("runtest_flags", Value::String(forwarded.join(" ")));
        report.annotate("log", Value::Null);
    }

    pub fn deliver(
        &self,
        report: &mut Report,
        explicit: Consent,
        transport: &dyn Transport,
        prompt: &mut dyn Prompt,
        out: &mut dyn Write,
    ) -> Result<Option<SubmissionResult>> {
        report.normalize();
        let endpoint = self.endpoint();
        let decision = explicit.or_default_from(self.cfg.report.consent);
        let yes = consent::resolve(decision, &endpoint.host, prompt);
        submit_report(yes, report, &endpoint, transport, out)
    }
}
