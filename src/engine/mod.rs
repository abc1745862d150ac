pub mod python;
pub mod types;

use anyhow::Result;
use std::path::Path;

pub use types::{EnvInfo, InspectIn};

pub trait Engine {
    fn inspect(&self, req: &InspectIn) -> Result<EnvInfo>;
    /// Run pytest with `cwd` as its working directory and return its exit code.
    fn run_pytest(&self, cwd: &Path, args: &[String]) -> Result<i32>;
}
