//! Run summary and exit status.

use crate::scheduler::{TaskError, TaskOutcome, TaskResult};

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Every task succeeded or was skipped.
    Success,
    /// Some tasks failed, some did not.
    Partial,
    /// Every task failed, or the run could not start.
    Failure,
}

impl ProcessExit {
    /// Numeric process exit code.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

/// Maps completed and failed task counts to the process exit outcome.
#[must_use]
pub fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// All task results of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per task, in submission order.
    pub results: Vec<TaskResult>,
}

impl RunReport {
    /// Wraps scheduler results.
    #[must_use]
    pub fn new(results: Vec<TaskResult>) -> Self {
        Self { results }
    }

    /// Number of tasks.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of artifacts written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Success { .. }))
    }

    /// Number of artifacts already present.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TaskOutcome::Skipped { .. }))
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TaskOutcome::is_failure)
    }

    /// True when any task was cancelled.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.count(|o| matches!(o, TaskOutcome::Failure(TaskError::Cancelled))) > 0
    }

    /// Failed tasks with their reasons.
    pub fn failures(&self) -> impl Iterator<Item = (&TaskResult, &TaskError)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            TaskOutcome::Failure(error) => Some((r, error)),
            _ => None,
        })
    }

    /// Exit outcome; skipped artifacts count as completed.
    #[must_use]
    pub fn exit_outcome(&self) -> ProcessExit {
        determine_exit_outcome(self.succeeded() + self.skipped(), self.failed())
    }

    fn count(&self, predicate: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.results.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    use crate::artifact::{ArtifactDescriptor, DownloadTask, ExtensionId, ExtensionRef, Version};

    fn result(outcome: TaskOutcome) -> TaskResult {
        TaskResult {
            task: DownloadTask {
                destination_path: vec!["x".to_string()],
                descriptor: ArtifactDescriptor::Extension(ExtensionRef {
                    extension_id: ExtensionId::parse("a.b").unwrap(),
                    version: Version::Latest,
                }),
            },
            outcome,
        }
    }

    fn success() -> TaskOutcome {
        TaskOutcome::Success {
            path: PathBuf::from("x/a.b-1.vsix"),
            version: "1".to_string(),
        }
    }

    fn skipped() -> TaskOutcome {
        TaskOutcome::Skipped {
            path: PathBuf::from("x/a.b-1.vsix"),
            version: "1".to_string(),
        }
    }

    #[test]
    fn test_exit_outcome_success_when_no_failures() {
        assert_eq!(determine_exit_outcome(3, 0), ProcessExit::Success);
        assert_eq!(determine_exit_outcome(0, 0), ProcessExit::Success);
    }

    #[test]
    fn test_exit_outcome_partial_when_mixed() {
        assert_eq!(determine_exit_outcome(2, 1), ProcessExit::Partial);
    }

    #[test]
    fn test_exit_outcome_failure_when_all_failed() {
        assert_eq!(determine_exit_outcome(0, 2), ProcessExit::Failure);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ProcessExit::Success.code(), 0);
        assert_eq!(ProcessExit::Failure.code(), 1);
        assert_eq!(ProcessExit::Partial.code(), 2);
    }

    #[test]
    fn test_report_counts_and_failures() {
        let report = RunReport::new(vec![
            result(success()),
            result(skipped()),
            result(TaskOutcome::Failure(TaskError::Cancelled)),
        ]);

        assert_eq!(report.total(), 3);
        assert_eq!((report.succeeded(), report.skipped(), report.failed()), (1, 1, 1));
        assert!(report.was_cancelled());
        assert_eq!(report.failures().count(), 1);
        assert_eq!(report.exit_outcome(), ProcessExit::Partial);
    }

    #[test]
    fn test_all_skipped_is_success() {
        let report = RunReport::new(vec![result(skipped()), result(skipped())]);
        assert_eq!(report.exit_outcome(), ProcessExit::Success);
    }
}
