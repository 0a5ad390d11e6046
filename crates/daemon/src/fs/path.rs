//! Helpers for the absolute, `/`-separated paths used as record keys.

/// Normalize a path to a consistent format: leading slash, no trailing
/// slash, no empty components, `/` for the root.
pub fn normalize(path: &str) -> String {
    let components: Vec<&str> = path
        .trim()
        .split('/')
        .filter(|c| !c.is_empty())
        .collect();
    format!("/{}", components.join("/"))
}

/// Parent directory of `path`; the root is its own parent.
pub fn parent(path: &str) -> String {
    let normalized = normalize(path);
    if normalized == "/" {
        return normalized;
    }

    match normalized.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(pos) => normalized[..pos].to_string(),
    }
}

/// Last component of `path`, empty for the root.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Append one entry name to a directory path.
pub fn join(dir: &str, name: &str) -> String {
    let dir = normalize(dir);
    if dir == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// Whether `path` is `ancestor` itself or lives below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return true;
    }
    path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Resolve a link target written relative to `base_dir`, folding `.` and
/// `..` components. Absolute targets are resolved from the filesystem root.
pub fn resolve(base_dir: &str, target: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    if !target.starts_with('/') {
        parts.extend(base_dir.split('/').filter(|c| !c.is_empty()));
    }

    for component in target.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }

    format!("/{}", parts.join("/"))
}
