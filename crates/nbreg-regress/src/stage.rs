use std::fmt;
use std::time::{Duration, Instant};

use tracing::debug;

/// Steps of one comparison, in the order they complete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    Init,
    Loaded,
    Executed,
    ExecFailed,
    PostProcessed,
    Diffed,
    Filtered,
    Decided,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Loaded => "loaded",
            Self::Executed => "executed",
            Self::ExecFailed => "exec-failed",
            Self::PostProcessed => "post-processed",
            Self::Diffed => "diffed",
            Self::Filtered => "filtered",
            Self::Decided => "decided",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed stage and the wall-clock time it took.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageRecord {
    pub stage: Stage,
    /// Short note, e.g. the number of diff entries produced.
    pub detail: Option<String>,
    pub elapsed: Duration,
}

/// Collects [`StageRecord`]s, timing each stage from the end of the previous one.
#[derive(Debug)]
pub(crate) struct StageTrace {
    records: Vec<StageRecord>,
    mark: Instant,
}

impl StageTrace {
    pub(crate) fn start() -> Self {
        Self {
            records: Vec::new(),
            mark: Instant::now(),
        }
    }

    pub(crate) fn record(&mut self, stage: Stage, detail: Option<String>) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.mark);
        self.mark = now;
        debug!(stage = %stage, ?elapsed, detail = detail.as_deref().unwrap_or(""), "stage complete");
        self.records.push(StageRecord {
            stage,
            detail,
            elapsed,
        });
    }

    pub(crate) fn finish(self) -> Vec<StageRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut trace = StageTrace::start();
        trace.record(Stage::Init, None);
        trace.record(Stage::Loaded, Some("2 cells".into()));
        let records = trace.finish();
        let stages: Vec<Stage> = records.iter().map(|r| r.stage).collect();
        assert_eq!(stages, vec![Stage::Init, Stage::Loaded]);
        assert_eq!(records[1].detail.as_deref(), Some("2 cells"));
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::ExecFailed.to_string(), "exec-failed");
        assert_eq!(Stage::PostProcessed.name(), "post-processed");
    }
}
