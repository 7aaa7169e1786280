use crate::domain::{truncate, Notification};
use snafu::{ResultExt, Snafu};
use std::io::Write;

const SEPARATOR_WIDTH: usize = 60;
const TEXT_PREVIEW_CHARS: usize = 80;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Deleted,
    Failed,
    Skipped,
    DryRun,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub fetched: usize,
    pub matched: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub listed: usize,
}

impl Summary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::DryRun => self.listed += 1,
        }
    }
}

/// Human-facing progress written to stdout; diagnostics go through `tracing`.
#[derive(Debug)]
pub struct Reporter<W> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, line: impl AsRef<str>) -> Result<()> {
        writeln!(self.out, "{}", line.as_ref()).context(UnableToWriteSnafu)
    }

    pub fn fetching(&mut self) -> Result<()> {
        self.line("Fetching notifications...")
    }

    pub fn fetched(&mut self, count: usize) -> Result<()> {
        self.line(format!("Fetched {} notifications", count))
    }

    pub fn matched(&mut self, count: usize) -> Result<()> {
        self.line(format!("Found {} friend-request notifications", count))
    }

    pub fn nothing_to_remove(&mut self) -> Result<()> {
        self.line("Nothing to remove. Exiting.")
    }

    pub fn notification(&mut self, n: &Notification) -> Result<()> {
        let id = n.id().map(|id| id.0).unwrap_or_default();

        self.line("-".repeat(SEPARATOR_WIDTH))?;
        self.line(format!(
            "id={} type={} notifier={} text={}",
            id,
            n.kind(),
            n.notifier_name(),
            truncate(n.text(), TEXT_PREVIEW_CHARS),
        ))
    }

    pub fn outcome(&mut self, outcome: Outcome) -> Result<()> {
        self.line(match outcome {
            Outcome::Deleted => "  -> deleted",
            Outcome::Failed => "  -> failed to delete (see logs above)",
            Outcome::Skipped => "  -> skipping (no id)",
            Outcome::DryRun => "  -> dry run, not deleted",
        })
    }

    pub fn summary(&mut self, summary: &Summary) -> Result<()> {
        let Summary {
            fetched,
            matched,
            deleted,
            failed,
            skipped,
            listed,
        } = summary;

        self.line("")?;
        if *listed > 0 {
            self.line(format!(
                "Dry run: {} of {} fetched notifications would be removed",
                listed, fetched
            ))?;
        } else {
            self.line(format!(
                "{} matched, {} deleted, {} failed, {} skipped",
                matched, deleted, failed, skipped
            ))?;
        }
        self.line("Done.")
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Unable to write the report: {}", source))]
    UnableToWrite { source: std::io::Error },
}

type Result<T, E = Error> = std::result::Result<T, E>;
