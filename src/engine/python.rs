use super::{types::*, Engine};
use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const INSPECT_SCRIPT: &str = include_str!("../../scripts/inspect_env.py");

pub struct PythonEngine {
    python_exe: PathBuf,
    timeout: Option<Duration>,
}

impl PythonEngine {
    pub fn new(cfg: &Config) -> Result<Self> {
        let python_exe = resolve_python_exe(&cfg.package.python_exe)?;
        let timeout = if cfg.runner.timeout_seconds > 0 {
            Some(Duration::from_secs(cfg.runner.timeout_seconds))
        } else {
            None
        };
        Ok(Self {
            python_exe,
            timeout,
        })
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        code: &str,
        input: &I,
    ) -> Result<O> {
        debug!("python -c <inline> exe={}", self.python_exe.display());
        let mut child = Command::new(&self.python_exe)
            .arg("-c")
            .arg(code)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning python: {}", self.python_exe.display()))?;

        {
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let bytes = serde_json::to_vec(input)?;
            stdin.write_all(&bytes)?;
            stdin.flush().ok();
        }

        let output = child
            .wait_with_output()
            .with_context(|| "waiting for python")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("python inspection failed\n{}", stderr));
        }

        let out: O = serde_json::from_slice(&output.stdout)
            .with_context(|| "parsing python JSON output")?;
        Ok(out)
    }
}

fn resolve_python_exe(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("auto") {
        if let Ok(env_val) = std::env::var("RUNTESTS_PYTHON") {
            let p = expand_tilde(&env_val);
            if p.exists() {
                return Ok(p);
            }
            warn!("RUNTESTS_PYTHON does not exist: {}", p.display());
        }
        return Ok(PathBuf::from("python3"));
    }
    Ok(expand_tilde(raw))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

impl Engine for PythonEngine {
    fn inspect(&self, req: &InspectIn) -> Result<EnvInfo> {
        self.run_json(INSPECT_SCRIPT, req)
    }

    fn run_pytest(&self, cwd: &Path, args: &[String]) -> Result<i32> {
        info!("pytest cwd={} args={:?}", cwd.display(), args);
        let mut child = Command::new(&self.python_exe)
            .args(["-m", "pytest"])
            .args(args)
            .current_dir(cwd)
            .spawn()
            .with_context(|| format!("spawning pytest in {}", cwd.display()))?;

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait().with_context(|| "waiting for pytest")?,
        };
        // Killed by a signal: report a generic failure.
        Ok(status.code().unwrap_or(1))
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            return Ok(status);
        }

        if start.elapsed() > timeout {
            warn!("pytest timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            return Err(anyhow!("pytest exceeded timeout ({:?})", timeout));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
