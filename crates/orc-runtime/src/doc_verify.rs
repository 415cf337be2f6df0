use std::path::Path;

use orc_plan::{DocumentationTarget, Task};

// ---------------------------------------------------------------------------
// Doc Target Verifier — checks declared documentation files contain
// declared sections.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub passed: bool,
    pub file_path: std::path::PathBuf,
    pub section: String,
    pub line_number: Option<usize>,
    pub content: Option<String>,
    pub error: Option<String>,
}

/// Verify every declared target, reading from disk relative to `repo_root`.
pub fn verify(task: &Task, repo_root: &Path) -> Vec<TargetOutcome> {
    let Some(metadata) = &task.runtime_metadata else {
        return Vec::new();
    };
    metadata
        .documentation_targets
        .iter()
        .map(|target| verify_one(repo_root, target))
        .collect()
}

fn verify_one(repo_root: &Path, target: &DocumentationTarget) -> TargetOutcome {
    let path = repo_root.join(&target.location);
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            return TargetOutcome {
                passed: false,
                file_path: target.location.clone(),
                section: target.section.clone(),
                line_number: None,
                content: None,
                error: Some(format!("documentation file {path:?} missing: {e}")),
            };
        }
    };

    let wanted = target.section.trim_end();
    let lines: Vec<&str> = contents.lines().collect();
    let Some((idx, section_level)) = lines.iter().enumerate().find_map(|(i, l)| {
        if l.trim_end() == wanted {
            Some((i, heading_level(l)))
        } else {
            None
        }
    }) else {
        return TargetOutcome {
            passed: false,
            file_path: target.location.clone(),
            section: target.section.clone(),
            line_number: None,
            content: None,
            error: Some(format!(
                "section {:?} not found in {:?}",
                target.section, target.location
            )),
        };
    };

    let end = match section_level {
        Some(level) => lines[idx + 1..]
            .iter()
            .position(|l| heading_level(l).is_some_and(|lvl| lvl <= level))
            .map(|offset| idx + 1 + offset)
            .unwrap_or(lines.len()),
        None => lines.len(),
    };

    TargetOutcome {
        passed: true,
        file_path: target.location.clone(),
        section: target.section.clone(),
        line_number: Some(idx + 1),
        content: Some(lines[idx..end].join("\n")),
        error: None,
    }
}

/// `Some(level)` if `line` is a markdown heading (`#`-prefix run length).
fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|&c| c == '#').count();
    if level > 0 && trimmed.as_bytes().get(level) == Some(&b' ') {
        Some(level)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_doc(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        std::path::PathBuf::from(name)
    }

    #[test]
    fn finds_section_and_slices_to_next_heading() {
        let dir = TempDir::new().unwrap();
        let rel = write_doc(
            &dir,
            "api.md",
            "# API\n\n## Run Command\n\nuse `cargo run`\n\n## Other\n\nmore\n",
        );
        let target = DocumentationTarget {
            location: rel,
            section: "## Run Command".to_string(),
        };
        let outcome = verify_one(dir.path(), &target);
        assert!(outcome.passed);
        assert_eq!(outcome.line_number, Some(3));
        assert!(outcome.content.unwrap().contains("cargo run"));
    }

    #[test]
    fn missing_section_fails() {
        let dir = TempDir::new().unwrap();
        let rel = write_doc(&dir, "api.md", "# API\n\n## Other\n");
        let target = DocumentationTarget {
            location: rel,
            section: "## Run Command".to_string(),
        };
        let outcome = verify_one(dir.path(), &target);
        assert!(!outcome.passed);
    }

    #[test]
    fn missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let target = DocumentationTarget {
            location: std::path::PathBuf::from("nope.md"),
            section: "## X".to_string(),
        };
        let outcome = verify_one(dir.path(), &target);
        assert!(!outcome.passed);
    }

}
