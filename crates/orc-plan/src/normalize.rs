// ---------------------------------------------------------------------------
// Dependency Normalizer — converts parser-supplied dependency tokens into
// the canonical form: a bare task number, or `file:<name>:task:<id>` for
// cross-file references.
// ---------------------------------------------------------------------------

/// A normalized dependency reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepRef {
    Local(String),
    CrossFile { file: String, task: String },
}

impl DepRef {
    /// Render back to the canonical string form.
    pub fn to_canonical(&self) -> String {
        match self {
            Self::Local(id) => id.clone(),
            Self::CrossFile { file, task } => format!("file:{file}:task:{task}"),
        }
    }
}

/// Normalize a raw dependency token into its canonical string form.
///
/// Cross-file tokens arrive as `file:NAME/task:ID` or `file:NAME:task:ID`,
/// with or without whitespace around separators; both are rewritten to
/// `file:<name>:task:<id>`. `Task N` is stripped to `N`. Unparseable tokens
/// fall back to the first numeric-like run found in the string; if none
/// exists, `None` is returned (the token is dropped).
pub fn normalize(raw: &str) -> Option<String> {
    parse(raw).map(|dep| dep.to_canonical())
}

/// Parse a raw dependency token into a [`DepRef`].
pub fn parse(raw: &str) -> Option<DepRef> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(cross) = parse_cross_file(trimmed) {
        return Some(cross);
    }

    if let Some(stripped) = strip_task_prefix(trimmed) {
        return Some(DepRef::Local(stripped));
    }

    // Bare alphanumeric id (no whitespace) passes through verbatim.
    if !trimmed.is_empty() && !trimmed.contains(char::is_whitespace) {
        return Some(DepRef::Local(trimmed.to_string()));
    }

    // Fallback: first numeric-like run.
    first_numeric_run(trimmed).map(DepRef::Local)
}

/// `true` iff the token begins with `file:` and matches the canonical
/// cross-file form after normalization.
pub fn is_cross_file(raw: &str) -> bool {
    matches!(parse(raw), Some(DepRef::CrossFile { .. }))
        && raw.trim().starts_with("file:")
}

fn parse_cross_file(s: &str) -> Option<DepRef> {
    let rest = s.strip_prefix("file:")?;
    // Accept `NAME/task:ID` or `NAME:task:ID`, with optional whitespace
    // around the `task` separator.
    let (name_part, task_part) = split_on_task_marker(rest)?;
    let name = name_part
        .trim()
        .trim_end_matches(['/', ':'])
        .trim();
    let task = task_part.trim();
    if name.is_empty() || task.is_empty() {
        return None;
    }
    Some(DepRef::CrossFile {
        file: name.to_string(),
        task: task.to_string(),
    })
}

/// Split `rest` (everything after `file:`) into `(name, task_id)` on the
/// `task:` marker, regardless of whether it was preceded by `/` or `:`.
fn split_on_task_marker(rest: &str) -> Option<(&str, &str)> {
    let idx = rest.find("task:")?;
    let name_part = &rest[..idx];
    let task_part = &rest[idx + "task:".len()..];
    Some((name_part, task_part))
}

/// Strip a leading `Task` (case-insensitive) plus whitespace, returning the
/// remainder, e.g. `"Task 7"` → `"7"`.
fn strip_task_prefix(s: &str) -> Option<String> {
    let lower = s.to_ascii_lowercase();
    if !lower.starts_with("task") {
        return None;
    }
    let after = &s[4..];
    if !after.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = after.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_string())
}

/// Extract the first maximal run of ASCII digits in `s`.
fn first_numeric_run(s: &str) -> Option<String> {
    let mut run = String::new();
    for ch in s.chars() {
        if ch.is_ascii_digit() {
            run.push(ch);
        } else if !run.is_empty() {
            break;
        }
    }
    if run.is_empty() { None } else { Some(run) }
}
