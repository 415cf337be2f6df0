use std::collections::HashSet;
use std::path::{Path, PathBuf};

use orion_error::StructError;
use tokio_util::sync::CancellationToken;

use orc_plan::Task;

use crate::error::{RuntimeReason, RuntimeResult};
use crate::ports::CommandRunner;

// ---------------------------------------------------------------------------
// Isolation Auditor — compares actual diffed files against declared files.
// ---------------------------------------------------------------------------

/// Query the version-control system for files changed since `HEAD`, both
/// unstaged and staged, via the injected command runner (§6).
pub async fn changed_files(
    runner: &dyn CommandRunner,
    repo_root: &Path,
    cancel: &CancellationToken,
) -> HashSet<PathBuf> {
    let mut files = HashSet::new();
    for command in ["git diff --name-only HEAD", "git diff --name-only --cached"] {
        let outcome = runner.run(command, repo_root, cancel).await;
        for line in outcome.combined_output.lines() {
            let line = line.trim();
            if !line.is_empty() {
                files.insert(PathBuf::from(line));
            }
        }
    }
    files
}

/// Audit `task`'s declared files against the actual changed-file set.
/// A changed file is permitted if it equals a declared file or shares a
/// directory with one. Any remaining file is an undeclared change.
pub fn audit(task: &Task, changed: &HashSet<PathBuf>) -> RuntimeResult<()> {
    let declared_dirs: HashSet<&Path> = task
        .files
        .iter()
        .filter_map(|f| f.parent())
        .collect();
    let declared: HashSet<&PathBuf> = task.files.iter().collect();

    let undeclared: Vec<&PathBuf> = changed
        .iter()
        .filter(|f| !declared.contains(f))
        .filter(|f| !f.parent().is_some_and(|d| declared_dirs.contains(d)))
        .collect();

    if undeclared.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = undeclared.iter().map(|p| p.display().to_string()).collect();
    StructError::from(RuntimeReason::IsolationViolation)
        .with_detail(format!(
            "task {}: undeclared file changes: {} — declare these files or revert them",
            task.number,
            names.join(", ")
        ))
        .err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task(files: Vec<&str>) -> Task {
        Task {
            number: "1".to_string(),
            name: String::new(),
            prompt: String::new(),
            files: files.into_iter().map(PathBuf::from).collect(),
            depends_on: Vec::new(),
            task_type: Default::default(),
            success_criteria: Vec::new(),
            integration_criteria: Vec::new(),
            structured_criteria: Vec::new(),
            test_commands: Vec::new(),
            runtime_metadata: None,
            status: Default::default(),
            completed_at: None,
            agent: None,
            worktree_group: None,
            source_file: PathBuf::new(),
            estimated_time: None,
        }
    }

    fn set(files: &[&str]) -> HashSet<PathBuf> {
        files.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn exact_declared_file_passes() {
        let task = task(vec!["internal/executor/a.go"]);
        let changed = set(&["internal/executor/a.go"]);
        assert!(audit(&task, &changed).is_ok());
    }

    #[test]
    fn same_package_file_passes() {
        let task = task(vec!["internal/executor/a.go"]);
        let changed = set(&["internal/executor/b.go"]);
        assert!(audit(&task, &changed).is_ok());
    }

    #[test]
    fn unrelated_file_fails() {
        let task = task(vec!["internal/executor/a.go"]);
        let changed = set(&["internal/other/c.go"]);
        assert!(audit(&task, &changed).is_err());
    }

    #[test]
    fn no_changes_passes() {
        let task = task(vec!["internal/executor/a.go"]);
        assert!(audit(&task, &HashSet::new()).is_ok());
    }
}
