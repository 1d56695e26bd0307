//! Remote path utilities
//!
//! Remote paths always use `/` as separator, whatever the local OS.

/// Check if a remote path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join a remote directory and an entry name with exactly one `/` between
/// them.
///
/// ```
/// use execfs::remote_fs::path_utils::join_remote_path;
/// assert_eq!(join_remote_path("/home", "file.txt"), "/home/file.txt");
/// assert_eq!(join_remote_path("/home//", "file.txt"), "/home/file.txt");
/// assert_eq!(join_remote_path("/", "home"), "/home");
/// ```
pub fn join_remote_path(base: &str, component: &str) -> String {
    let component = component.trim_start_matches('/');
    if base.is_empty() {
        return component.to_string();
    }
    match base.trim_end_matches('/') {
        // base was the root
        "" => format!("/{}", component),
        trimmed => format!("{}/{}", trimmed, component),
    }
}

/// Collapse repeated separators and drop a trailing one (except on `/`).
pub fn normalize_remote_path(path: &str) -> String {
    let absolute = is_absolute_remote_path(path);
    let joined = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Parent directory of a remote path. The root is its own parent, and a bare
/// relative name has `.` as parent.
pub fn parent_remote_path(path: &str) -> String {
    let normalized = normalize_remote_path(path);
    match normalized.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => normalized[..idx].to_string(),
        None => ".".to_string(),
    }
}

/// Last component of a remote path.
pub fn remote_file_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
