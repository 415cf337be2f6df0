use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use orion_error::StructError;

use orc_plan::normalize::{self, DepRef};
use orc_plan::{Task, Wave};

use crate::error::{CoreReason, CoreResult};

// ---------------------------------------------------------------------------
// Wave Scheduler — topological grouping with static package-conflict
// rejection.
// ---------------------------------------------------------------------------

/// Compute the wave partitioning of `tasks` via Kahn's algorithm.
///
/// Ties within a wave are broken by original plan index for determinism.
/// Fails with `CyclicDependency` if a cycle prevents full topological
/// emission, or `PackageConflict` if two tasks in the same wave declare
/// overlapping Go package paths.
pub fn schedule(tasks: &[Task]) -> CoreResult<Vec<Wave>> {
    let index_of: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.number.as_str(), i))
        .collect();

    // adjacency: predecessor -> successors, plus in-degree per task.
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = tasks.iter().map(|t| (t.number.as_str(), 0)).collect();

    for task in tasks {
        for dep in &task.depends_on {
            let Some(parsed) = normalize::parse(dep) else {
                continue;
            };
            let pred_number = match parsed {
                DepRef::Local(id) => id,
                DepRef::CrossFile { task: id, .. } => id,
            };
            if !index_of.contains_key(pred_number.as_str()) {
                // Unresolved references are caught by the Cross-File
                // Resolver before scheduling; ignore here.
                continue;
            }
            successors
                .entry(index_of_key(tasks, &pred_number))
                .or_default()
                .push(task.number.as_str());
            *in_degree.entry(task.number.as_str()).or_insert(0) += 1;
        }
    }

    let mut remaining: HashSet<&str> = tasks.iter().map(|t| t.number.as_str()).collect();
    let mut waves: Vec<Wave> = Vec::new();
    let mut wave_index = 0usize;

    while !remaining.is_empty() {
        let mut ready: Vec<&str> = remaining
            .iter()
            .copied()
            .filter(|n| in_degree.get(n).copied().unwrap_or(0) == 0)
            .collect();

        if ready.is_empty() {
            let mut residual: Vec<&str> = remaining.into_iter().collect();
            residual.sort_by_key(|n| index_of.get(n).copied().unwrap_or(usize::MAX));
            return StructError::from(CoreReason::CyclicDependency)
                .with_detail(format!(
                    "cyclic dependency among tasks: {}",
                    residual.join(", ")
                ))
                .err();
        }

        ready.sort_by_key(|n| index_of.get(n).copied().unwrap_or(usize::MAX));

        check_package_conflicts(tasks, &ready)?;

        for &number in &ready {
            remaining.remove(number);
            if let Some(succs) = successors.get(number) {
                for succ in succs {
                    if let Some(deg) = in_degree.get_mut(succ) {
                        *deg = deg.saturating_sub(1);
                    }
                }
            }
        }

        waves.push(Wave {
            index: wave_index,
            task_numbers: ready.into_iter().map(String::from).collect(),
        });
        wave_index += 1;
    }

    Ok(waves)
}

fn index_of_key<'a>(tasks: &'a [Task], number: &str) -> &'a str {
    tasks
        .iter()
        .find(|t| t.number == number)
        .map(|t| t.number.as_str())
        .unwrap_or(number)
}

fn check_package_conflicts(tasks: &[Task], wave_task_numbers: &[&str]) -> CoreResult<()> {
    let mut owner: HashMap<PathBuf, &str> = HashMap::new();
    for &number in wave_task_numbers {
        let Some(task) = tasks.iter().find(|t| t.number == number) else {
            continue;
        };
        for package in task.package_set() {
            if let Some(&other) = owner.get(&package) {
                return StructError::from(CoreReason::PackageConflict)
                    .with_detail(format!(
                        "package {:?} is declared by both task {other} and task {number} in the same wave; add a DependsOn edge to serialize them",
                        package
                    ))
                    .err();
            }
            owner.insert(package, number);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task(number: &str, depends_on: Vec<&str>, files: Vec<&str>) -> Task {
        Task {
            number: number.to_string(),
            name: String::new(),
            prompt: String::new(),
            files: files.into_iter().map(PathBuf::from).collect(),
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
            source_file: PathBuf::new(),
            estimated_time: None,
        }
    }

    fn wave_numbers(waves: &[Wave]) -> Vec<Vec<&str>> {
        waves
            .iter()
            .map(|w| w.task_numbers.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn linear_chain() {
        let tasks = vec![
            task("1", vec![], vec![]),
            task("2", vec!["1"], vec![]),
            task("3", vec!["2"], vec![]),
        ];
        let waves = schedule(&tasks).unwrap();
        assert_eq!(wave_numbers(&waves), vec![vec!["1"], vec!["2"], vec!["3"]]);
    }

    #[test]
    fn diamond() {
        let tasks = vec![
            task("1", vec![], vec![]),
            task("2", vec!["1"], vec![]),
            task("3", vec!["1"], vec![]),
            task("4", vec!["2", "3"], vec![]),
        ];
        let waves = schedule(&tasks).unwrap();
        assert_eq!(
            wave_numbers(&waves),
            vec![vec!["1"], vec!["2", "3"], vec!["4"]]
        );
    }

    #[test]
    fn cycle_fails() {
        let tasks = vec![task("1", vec!["2"], vec![]), task("2", vec!["1"], vec![])];
        assert!(schedule(&tasks).is_err());
    }

    #[test]
    fn package_conflict_without_serialization_fails() {
        let tasks = vec![
            task("1", vec![], vec!["internal/executor/a.go"]),
            task("2", vec![], vec!["internal/executor/b.go"]),
        ];
        assert!(schedule(&tasks).is_err());
    }

    #[test]
    fn package_conflict_with_serialization_succeeds() {
        let tasks = vec![
            task("1", vec![], vec!["internal/executor/a.go"]),
            task("2", vec!["1"], vec!["internal/executor/b.go"]),
        ];
        let waves = schedule(&tasks).unwrap();
        assert_eq!(wave_numbers(&waves), vec![vec!["1"], vec!["2"]]);
    }

    #[test]
    fn tasks_with_no_go_files_never_conflict() {
        let tasks = vec![
            task("1", vec![], vec!["README.md"]),
            task("2", vec![], vec!["docs/notes.md"]),
        ];
        let waves = schedule(&tasks).unwrap();
        assert_eq!(wave_numbers(&waves), vec![vec!["1", "2"]]);
    }

    #[test]
    fn cross_file_dependency_orders_waves() {
        let mut t2 = task("2", vec![], vec![]);
        t2.source_file = PathBuf::from("A.yaml");
        let mut t5 = task("5", vec!["file:A.yaml:task:2"], vec![]);
        t5.source_file = PathBuf::from("B.yaml");
        let waves = schedule(&[t2, t5]).unwrap();
        assert_eq!(wave_numbers(&waves), vec![vec!["2"], vec!["5"]]);
    }
}
