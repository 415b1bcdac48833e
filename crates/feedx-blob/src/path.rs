//! Helpers for blob path inspection.

/// The final `/`-separated component of `path`.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Split `name` at its rightmost dot into `(stem, extension)`.
///
/// Returns `None` when there is no extension: no dot, a leading dot only
/// (`.profile`), or a trailing dot (`file.`).
pub fn split_extension(name: &str) -> Option<(&str, &str)> {
    let i = name.rfind('.')?;
    if i == 0 || i + 1 == name.len() {
        return None;
    }
    Some((&name[..i], &name[i + 1..]))
}
