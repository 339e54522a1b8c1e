use std::io::{self, Write};

use serde::Serialize;

use crate::orchestrate::{MirrorPlan, RunSummary};

/// Machine-readable output for non-interactive callers.
pub struct JsonOutput;

impl JsonOutput {
    pub fn print_plan(plan: &MirrorPlan) -> io::Result<()> {
        Self::print_json(plan)
    }

    pub fn print_run(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
