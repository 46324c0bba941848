//! Virtual path helpers.
//!
//! Every path stored in the project tree is canonical: absolute, `/`-separated,
//! without `.`/`..` segments, repeated slashes or a trailing slash. The root is
//! the single path `/`.

/// The root of the virtual tree.
pub const ROOT: &str = "/";

/// Normalize a path into canonical absolute form.
///
/// Relative input is treated as relative to the root. `..` never climbs above
/// the root.
///
/// ```rust
/// use sketchbox::path::normalize;
///
/// assert_eq!(normalize("components//Button.jsx"), "/components/Button.jsx");
/// assert_eq!(normalize("/a/./b/../c/"), "/a/c");
/// assert_eq!(normalize("/../.."), "/");
/// ```
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// Join a relative segment onto a base path and normalize the result.
///
/// An absolute `rel` replaces the base entirely.
pub fn join(base: &str, rel: &str) -> String {
    if rel.starts_with('/') {
        normalize(rel)
    } else {
        normalize(&format!("{base}/{rel}"))
    }
}

/// Parent directory of a canonical path, or `None` for the root.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => Some(ROOT),
    }
}

/// Final segment of a path, or `None` when there is none (root or empty).
pub fn file_name(path: &str) -> Option<&str> {
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Non-empty components of a path.
pub fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Every proper ancestor of a canonical path, root first.
pub fn ancestors(path: &str) -> Vec<String> {
    let mut out = vec![ROOT.to_string()];
    let mut current = String::new();
    let components: Vec<&str> = split(path).collect();
    for component in components.iter().take(components.len().saturating_sub(1)) {
        current.push('/');
        current.push_str(component);
        out.push(current.clone());
    }
    if path == ROOT {
        out.clear();
    }
    out
}

/// Whether `ancestor` is `path` itself or one of its ancestors.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == ROOT {
        return true;
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Re-root `path` from under `from` to under `to`.
///
/// Returns `None` when `path` is not within `from`.
pub fn rebase(path: &str, from: &str, to: &str) -> Option<String> {
    if !is_within(path, from) {
        return None;
    }
    let rest = &path[from.len()..];
    Some(normalize(&format!("{to}{rest}")))
}

/// Extension of the final segment including the leading dot, if any.
pub fn extension(path: &str) -> Option<&str> {
    let name = file_name(path)?;
    let idx = name.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(&name[idx..])
}

/// Label used when displaying a path to a user.
///
/// Takes the text after the last `/`; an absent or empty path yields
/// `placeholder`. A path ending in `/` also yields `placeholder`, never an
/// empty label. Never fails.
pub fn display_name<'a>(path: Option<&'a str>, placeholder: &'a str) -> &'a str {
    path.and_then(|p| p.rsplit('/').next())
        .filter(|name| !name.is_empty())
        .unwrap_or(placeholder)
}
