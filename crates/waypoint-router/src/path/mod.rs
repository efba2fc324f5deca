/// Path utilities for joining, trimming and resolving pathnames
///
/// All functions are **pure**: given same input, always produce same output with no side effects.
use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// How a trailing slash is treated when resolving and building paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingSlash {
    /// Always end non-root paths with `/`
    Always,
    /// Strip the trailing `/` from non-root paths
    #[default]
    Never,
    /// Keep whatever the destination declared
    Preserve,
}

/// Collapses repeated slashes
///
/// Returns `Cow::Borrowed` when the input has no `//` (zero allocations).
///
/// # Examples
///
/// ```
/// use waypoint_router::path::clean_path;
/// use std::borrow::Cow;
///
/// assert!(matches!(clean_path("/a/b"), Cow::Borrowed("/a/b")));
/// assert_eq!(clean_path("/a//b///c"), "/a/b/c");
/// ```
pub fn clean_path(path: &str) -> Cow<'_, str> {
    if !path.contains("//") {
        return Cow::Borrowed(path);
    }

    let mut cleaned = String::with_capacity(path.len());
    let mut previous_slash = false;
    for ch in path.chars() {
        if ch == '/' && previous_slash {
            continue;
        }
        previous_slash = ch == '/';
        cleaned.push(ch);
    }
    Cow::Owned(cleaned)
}

/// Joins path parts with `/` and collapses duplicate slashes
///
/// # Examples
///
/// ```
/// use waypoint_router::path::join_paths;
///
/// assert_eq!(join_paths(&["/", "posts", "$id"]), "/posts/$id");
/// assert_eq!(join_paths(&["/posts/", "/"]), "/posts/");
/// ```
pub fn join_paths<S: AsRef<str>>(parts: &[S]) -> String {
    let joined = parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join("/");
    clean_path(&joined).into_owned()
}

/// Trims leading slashes, preserving a lone `/`
pub fn trim_path_left(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_start_matches('/')
    }
}

/// Trims trailing slashes, preserving a lone `/`
pub fn trim_path_right(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_end_matches('/')
    }
}

/// Trims slashes on both ends, preserving a lone `/`
pub fn trim_path(path: &str) -> &str {
    trim_path_right(trim_path_left(path))
}

/// Removes one trailing slash unless the value is the root or the base path root
pub fn remove_trailing_slash<'a>(value: &'a str, base_path: &str) -> &'a str {
    let base_root = format!("{}/", trim_path_right(base_path));
    if value.ends_with('/') && value != "/" && value != base_root {
        &value[..value.len() - 1]
    } else {
        value
    }
}

/// Compares two pathnames ignoring a trailing slash
///
/// # Examples
///
/// ```
/// use waypoint_router::path::exact_path_test;
///
/// assert!(exact_path_test("/sample/path1", "/sample/path1/", "/"));
/// assert!(!exact_path_test("/sample/path1/some", "/sample/path1", "/"));
/// ```
pub fn exact_path_test(first: &str, second: &str, base_path: &str) -> bool {
    remove_trailing_slash(first, base_path) == remove_trailing_slash(second, base_path)
}

/// Resolves `to` against `base`
///
/// Relative paths are resolved as if `base` were a directory. `..` pops a
/// segment, `.` is ignored and a leading `/` restarts from the root. The
/// trailing slash of the result follows `trailing_slash`.
///
/// # Examples
///
/// ```
/// use waypoint_router::path::{resolve_path, TrailingSlash};
///
/// assert_eq!(resolve_path("/a/b/c", "./d", TrailingSlash::Never), "/a/b/c/d");
/// assert_eq!(resolve_path("/a/b/c", "../d", TrailingSlash::Never), "/a/b/d");
/// assert_eq!(resolve_path("/a/b/c", "/d/", TrailingSlash::Never), "/d");
/// assert_eq!(resolve_path("/a/b/c", "d/", TrailingSlash::Preserve), "/a/b/c/d/");
/// assert_eq!(resolve_path("/a/b/c", "d", TrailingSlash::Always), "/a/b/c/d/");
/// ```
pub fn resolve_path(base: &str, to: &str, trailing_slash: TrailingSlash) -> String {
    let mut segments: Vec<&str> = base.split('/').collect();
    if segments.len() > 1 && segments.last() == Some(&"") {
        segments.pop();
    }

    let to_segments: Vec<&str> = to.split('/').collect();
    let last = to_segments.len().saturating_sub(1);

    for (index, value) in to_segments.iter().enumerate() {
        match *value {
            // Leading slash: restart from the root
            "" if index == 0 && to.starts_with('/') => segments = vec![""],
            // Trailing slash
            "" if index == last && index > 0 => segments.push(""),
            "" => {}
            ".." => {
                if segments.len() > 1 {
                    segments.pop();
                }
            }
            "." => {}
            other => segments.push(other),
        }
    }

    if segments.len() > 1 {
        match (segments.last() == Some(&""), trailing_slash) {
            (true, TrailingSlash::Never) => {
                segments.pop();
            }
            (false, TrailingSlash::Always) => segments.push(""),
            _ => {}
        }
    }

    let joined = join_paths(&segments);
    if joined.is_empty() {
        "/".to_string()
    } else if joined.starts_with('/') {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Splits a pathname into its non-empty segments
pub fn split_segments(pathname: &str) -> Vec<&str> {
    pathname.split('/').filter(|s| !s.is_empty()).collect()
}
