/// Canonical form used for every policy comparison.
///
/// Collapses repeated separators, drops `.` segments, resolves `..` without
/// climbing above root and removes a trailing `/` (root stays `/`).
/// Percent-encoded dots (`%2e`) count as dots and a backslash counts as a separator.
pub fn normalize_path(raw: &str) -> String {
    let raw = raw.split(['?', '#']).next().unwrap_or("");
    let mut segs: Vec<&str> = Vec::new();
    for seg in raw.split(['/', '\\']) {
        match dot_segment(seg) {
            Some(0) => {}
            Some(_) => { segs.pop(); }
            None => segs.push(seg),
        }
    }
    if segs.is_empty() { return "/".to_string(); }
    let mut out = String::with_capacity(raw.len());
    for s in segs {
        out.push('/');
        out.push_str(s);
    }
    out
}

// Number of dots if the segment is empty, `.` or `..` once `%2e` is decoded.
fn dot_segment(seg: &str) -> Option<usize> {
    match seg.to_ascii_lowercase().replace("%2e", ".").as_str() {
        "" | "." => Some(0),
        ".." => Some(2),
        _ => None,
    }
}

/// Encoded separators (`%2f`, `%5c`) would be decoded again past the guard; such paths are refused.
pub fn has_encoded_separator(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.contains("%2f") || lower.contains("%5c")
}

/// Exact match or a `/`-separated descendant. `/admin2` does not match `/admin`.
pub fn matches_prefix(path: &str, prefix: &str) -> bool {
    if path == prefix { return true; }
    // Root prefix covers everything
    if prefix == "/" { return path.starts_with('/'); }
    path.len() > prefix.len() && path.starts_with(prefix) && path.as_bytes()[prefix.len()] == b'/'
}
