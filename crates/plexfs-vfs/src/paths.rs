//! Virtual path normalization.
//!
//! Every path entering the VFS is an absolute, Unix-style, UTF-8 string.
//! Normalization resolves `.` and `..`, collapses duplicate slashes, and
//! strips trailing slashes (except for the root itself).

/// Normalize a virtual path to canonical form.
///
/// The result always begins with `/` and has no trailing slash unless it is
/// the root. `..` segments that would climb above the root are dropped.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            c => parts.push(c),
        }
    }
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

/// Final component of a normalized path (`/` for the root).
pub fn base_name(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((_, "")) | None => "/",
        Some((_, name)) => name,
    }
}
