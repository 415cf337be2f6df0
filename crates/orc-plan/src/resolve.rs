use std::collections::{HashMap, HashSet};
use std::path::Path;

use orion_error::StructError;

use crate::error::{PlanReason, PlanResult};
use crate::normalize::{self, DepRef};
use crate::types::Task;

// ---------------------------------------------------------------------------
// Cross-File Resolver — validates every dependency reference after merge
// ---------------------------------------------------------------------------

/// Validate that every dependency on every task resolves to an existing
/// task, either locally or across files. Leaves dependency strings
/// unchanged — resolution here is validation-only.
pub fn resolve(tasks: &[Task]) -> PlanResult<()> {
    let numbers: HashSet<&str> = tasks.iter().map(|t| t.number.as_str()).collect();
    let files: HashSet<String> = tasks
        .iter()
        .filter_map(|t| file_stem(&t.source_file))
        .collect();

    // file name -> set of task numbers declared in that file, to support
    // `file:<name>:task:<id>` lookups against the *referenced* file.
    let mut by_file: HashMap<String, HashSet<&str>> = HashMap::new();
    for task in tasks {
        if let Some(stem) = file_stem(&task.source_file) {
            by_file.entry(stem).or_default().insert(task.number.as_str());
        }
    }

    for task in tasks {
        for dep in &task.depends_on {
            let Some(parsed) = normalize::parse(dep) else {
                continue;
            };
            match parsed {
                DepRef::Local(id) => {
                    if !numbers.contains(id.as_str()) {
                        return StructError::from(PlanReason::InvalidDependency)
                            .with_detail(format!(
                                "task {}: unresolved local dependency {dep:?}",
                                task.number
                            ))
                            .err();
                    }
                }
                DepRef::CrossFile { file, task: dep_task } => {
                    if !files.contains(&file) {
                        return StructError::from(PlanReason::InvalidDependency)
                            .with_detail(format!(
                                "task {}: unresolved cross-file dependency {dep:?} (unknown file {file:?})",
                                task.number
                            ))
                            .err();
                    }
                    let has_task = by_file
                        .get(&file)
                        .map(|set| set.contains(dep_task.as_str()))
                        .unwrap_or(false);
                    if !has_task {
                        return StructError::from(PlanReason::InvalidDependency)
                            .with_detail(format!(
                                "task {}: unresolved cross-file dependency {dep:?}",
                                task.number
                            ))
                            .err();
                    }
                }
            }
        }
    }

    Ok(())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;
    use std::path::PathBuf;

    fn task(number: &str, source_file: &str, depends_on: Vec<&str>) -> Task {
        Task {
            number: number.to_string(),
            name: String::new(),
            prompt: String::new(),
            files: Vec::new(),
            depends_on: depends_on.into_iter().map(String::from).collect(),
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
            source_file: PathBuf::from(source_file),
            estimated_time: None,
        }
    }

    #[test]
    fn local_dependency_resolves() {
        let tasks = vec![task("1", "a.yaml", vec![]), task("2", "a.yaml", vec!["1"])];
        assert!(resolve(&tasks).is_ok());
    }

    #[test]
    fn unresolved_local_dependency_fails() {
        let tasks = vec![task("2", "a.yaml", vec!["99"])];
        assert!(resolve(&tasks).is_err());
    }

    #[test]
    fn cross_file_dependency_resolves() {
        let tasks = vec![
            task("2", "A.yaml", vec![]),
            task("5", "B.yaml", vec!["file:A.yaml:task:2"]),
        ];
        assert!(resolve(&tasks).is_ok());
    }

    #[test]
    fn cross_file_dependency_renamed_task_fails() {
        let tasks = vec![
            task("99", "A.yaml", vec![]),
            task("5", "B.yaml", vec!["file:A.yaml:task:2"]),
        ];
        assert!(resolve(&tasks).is_err());
    }

    #[test]
    fn cross_file_dependency_unknown_file_fails() {
        let tasks = vec![
            task("2", "A.yaml", vec![]),
            task("5", "B.yaml", vec!["file:C.yaml:task:2"]),
        ];
        assert!(resolve(&tasks).is_err());
    }
}
