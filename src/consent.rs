use crate::config::ConsentDefault;
use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, Write};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consent {
    Yes,
    No,
    #[default]
    Unresolved,
}

impl Consent {
    pub fn from_flags(report: bool, no_report: bool) -> Self {
        match (report, no_report) {
            (true, _) => Consent::Yes,
            (_, true) => Consent::No,
            _ => Consent::Unresolved,
        }
    }

    /// Explicit flags win; the config default is consulted only when unresolved.
    pub fn or_default_from(self, configured: ConsentDefault) -> Consent {
        match self {
            Consent::Unresolved => Consent::from(configured),
            explicit => explicit,
        }
    }
}

impl From<ConsentDefault> for Consent {
    fn from(d: ConsentDefault) -> Self {
        match d {
            ConsentDefault::Ask => Consent::Unresolved,
            ConsentDefault::Always => Consent::Yes,
            ConsentDefault::Never => Consent::No,
        }
    }
}

pub trait Prompt {
    fn ask(&mut self, question: &str) -> Result<String>;
}

pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(question.as_bytes())?;
        stdout.flush()?;

        let mut line = String::new();
        let n = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .with_context(|| "reading answer from stdin")?;
        if n == 0 {
            return Err(anyhow!("stdin closed"));
        }
        Ok(line)
    }
}

pub fn question(host: &str) -> String {
    format!("Do you want to report this to {host} ? [n]: ")
}

/// Any answer containing a `y` counts as yes, so "why not" is accepted too.
pub fn is_affirmative(answer: &str) -> bool {
    answer.to_lowercase().contains('y')
}

pub fn resolve(consent: Consent, host: &str, prompt: &mut dyn Prompt) -> bool {
    match consent {
        Consent::Yes => true,
        Consent::No => false,
        Consent::Unresolved => match prompt.ask(&question(host)) {
            Ok(answer) => {
                let yes = is_affirmative(&answer);
                debug!("consent answer={:?} accepted={yes}", answer.trim());
                yes
            }
            Err(err) => {
                warn!("no answer to report prompt, not uploading: {err:#}");
                false
            }
        },
    }
}
