//! Pathname matching and path interpolation
//!
//! [`match_pathname`] walks a compiled [`RoutePattern`] against a concrete
//! pathname left to right and extracts params. [`interpolate_path`] is its
//! inverse. A pattern that does not match is `None`, never an error, so the
//! resolver can move on to the next candidate.

use std::collections::BTreeMap;

use crate::encoding::{decode_uri, decode_uri_component, encode_uri, encode_uri_component};
use crate::error::PathError;
use crate::path::{join_paths, split_segments};
use crate::route::{RoutePattern, Segment, SegmentKind};

/// Extracted path params, keyed by param name
pub type Params = BTreeMap<String, String>;

/// Key under which a wildcard's capture is stored
pub const SPLAT_KEY: &str = "_splat";
/// Legacy alias for [`SPLAT_KEY`]
pub const LEGACY_SPLAT_KEY: &str = "*";
/// Key under which a fuzzy match stores the unconsumed pathname
pub const FUZZY_KEY: &str = "**";

/// Options for [`match_pathname`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare literals byte for byte instead of case-insensitively
    pub case_sensitive: bool,
    /// Accept a pathname longer than the pattern, storing the rest under `**`
    pub fuzzy: bool,
    /// Let a wildcard match an empty remainder
    pub allow_empty_splat: bool,
}

impl MatchOptions {
    pub fn case_sensitive(mut self, value: bool) -> Self {
        self.case_sensitive = value;
        self
    }

    pub fn fuzzy(mut self, value: bool) -> Self {
        self.fuzzy = value;
        self
    }

    pub fn allow_empty_splat(mut self, value: bool) -> Self {
        self.allow_empty_splat = value;
        self
    }
}

/// Matches a pathname against a compiled pattern
///
/// # Examples
///
/// ```
/// use waypoint_router::{match_pathname, MatchOptions, RoutePattern};
///
/// let pattern = RoutePattern::compile("/posts/{-$id}");
/// let params = match_pathname(&pattern, "/posts", MatchOptions::default()).unwrap();
/// assert_eq!(params.get("id"), None);
///
/// let params = match_pathname(&pattern, "/posts/5", MatchOptions::default()).unwrap();
/// assert_eq!(params.get("id").map(String::as_str), Some("5"));
/// ```
pub fn match_pathname(pattern: &RoutePattern, pathname: &str, options: MatchOptions) -> Option<Params> {
    let base = split_segments(pathname);
    let route = pattern.segments();
    let route_len = route.len() + usize::from(pattern.is_index());
    let mut params = Params::new();
    let (mut bi, mut ri) = (0, 0);

    loop {
        let Some(segment) = route.get(ri) else {
            if bi < base.len() {
                if options.fuzzy && !pattern.is_index() {
                    params.insert(FUZZY_KEY.to_string(), join_paths(&base[bi..]));
                    return Some(params);
                }
                return None;
            }
            return Some(params);
        };

        match segment.kind {
            SegmentKind::Wildcard => {
                let splat = capture_splat(segment, &base[bi..], options)?;
                params.insert(LEGACY_SPLAT_KEY.to_string(), splat.clone());
                params.insert(SPLAT_KEY.to_string(), splat);
                return Some(params);
            }
            SegmentKind::Literal => {
                let current = base.get(bi)?;
                if !literal_eq(&segment.value, current, options.case_sensitive) {
                    return None;
                }
                bi += 1;
            }
            SegmentKind::Param => {
                let current = base.get(bi)?;
                let raw = strip_affixes(segment, current)?;
                params.insert(segment.value.clone(), decode_uri_component(raw).into_owned());
                bi += 1;
            }
            SegmentKind::OptionalParam => {
                if let Some(current) = base.get(bi) {
                    let raw = if segment.has_affix() {
                        strip_affixes(segment, current)
                    } else if optional_takes(route, ri, current, base.len(), route_len, options) {
                        Some(*current)
                    } else {
                        None
                    };

                    if let Some(raw) = raw {
                        params.insert(segment.value.clone(), decode_uri_component(raw).into_owned());
                        bi += 1;
                    }
                }
            }
        }
        ri += 1;
    }
}

/// Decides whether a bare optional param consumes the current segment
///
/// It yields when the segment equals a later literal, or when a later
/// required param or wildcard still needs it.
fn optional_takes(
    route: &[Segment],
    ri: usize,
    current: &str,
    base_len: usize,
    route_len: usize,
    options: MatchOptions,
) -> bool {
    for future in &route[ri + 1..] {
        match future.kind {
            SegmentKind::Literal if literal_eq(&future.value, current, options.case_sensitive) => {
                return false
            }
            SegmentKind::Param | SegmentKind::Wildcard => return base_len >= route_len,
            _ => {}
        }
    }
    true
}

fn capture_splat(segment: &Segment, remaining: &[&str], options: MatchOptions) -> Option<String> {
    if segment.has_affix() {
        let first = remaining.first()?;
        let last = remaining.last()?;
        if !first.starts_with(segment.prefix_str()) || !last.ends_with(segment.suffix_str()) {
            return None;
        }
    }

    let joined = join_paths(remaining);
    let decoded = decode_uri(&joined);
    let decoded: &str = &decoded;
    let splat = decoded.strip_prefix(segment.prefix_str()).unwrap_or(decoded);
    let splat = splat.strip_suffix(segment.suffix_str()).unwrap_or(splat);

    if splat.is_empty() && !options.allow_empty_splat {
        return None;
    }
    Some(splat.to_string())
}

fn strip_affixes<'a>(segment: &Segment, value: &'a str) -> Option<&'a str> {
    value
        .strip_prefix(segment.prefix_str())?
        .strip_suffix(segment.suffix_str())
}

/// Compares a literal pattern segment with a pathname segment
///
/// Both sides are decoded once so encoded and raw unicode compare equal.
fn literal_eq(literal: &str, value: &str, case_sensitive: bool) -> bool {
    let literal = decode_uri_component(literal);
    let value = decode_uri_component(value);
    if case_sensitive {
        literal == value
    } else {
        literal.to_lowercase() == value.to_lowercase()
    }
}

/// Options for [`interpolate_path`]
#[derive(Debug, Clone, Default)]
pub struct InterpolateOptions {
    /// Keep wildcard placeholders (`$`, `{$}`) next to their values
    pub leave_wildcards: bool,
    /// Keep param placeholders (`$name`) next to their values
    pub leave_params: bool,
    /// Characters that stay unencoded in param values, e.g. `@`
    pub decode_chars: Vec<char>,
}

/// Result of a successful interpolation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpolated {
    pub path: String,
    pub used_params: Params,
}

/// Builds a pathname from a pattern and params
///
/// Required params must be present; optional params and the splat are
/// omitted (keeping any prefix/suffix literal) when absent.
///
/// # Examples
///
/// ```
/// use waypoint_router::{interpolate_path, InterpolateOptions, Params, RoutePattern};
///
/// let pattern = RoutePattern::compile("/params/single/$id");
/// let mut params = Params::new();
/// params.insert("id".into(), "100%25".into());
///
/// let built = interpolate_path(&pattern, &params, &InterpolateOptions::default()).unwrap();
/// assert_eq!(built.path, "/params/single/100%2525");
/// ```
pub fn interpolate_path(
    pattern: &RoutePattern,
    params: &Params,
    options: &InterpolateOptions,
) -> Result<Interpolated, PathError> {
    let mut used_params = Params::new();
    let mut parts: Vec<String> = vec![String::new()];

    for segment in pattern.segments() {
        let (prefix, suffix) = (segment.prefix_str(), segment.suffix_str());

        match segment.kind {
            SegmentKind::Literal => parts.push(segment.value.clone()),
            SegmentKind::Wildcard => {
                let splat = params
                    .get(SPLAT_KEY)
                    .or_else(|| params.get(LEGACY_SPLAT_KEY))
                    .filter(|v| !v.is_empty());

                match splat {
                    Some(value) => {
                        used_params.insert(SPLAT_KEY.to_string(), value.clone());
                        used_params.insert(LEGACY_SPLAT_KEY.to_string(), value.clone());
                        let marker = match (options.leave_wildcards, segment.has_affix()) {
                            (false, _) => "",
                            (true, true) => "{$}",
                            (true, false) => "$",
                        };
                        parts.push(format!("{prefix}{marker}{}{suffix}", encode_uri(value)));
                    }
                    None if segment.has_affix() => {
                        let marker = if options.leave_wildcards { "{$}" } else { "" };
                        parts.push(format!("{prefix}{marker}{suffix}"));
                    }
                    None => {}
                }
            }
            SegmentKind::Param => {
                let value = params.get(&segment.value).ok_or_else(|| PathError::MissingParam {
                    param: segment.value.clone(),
                    pattern: pattern.source().to_string(),
                })?;
                used_params.insert(segment.value.clone(), value.clone());
                let encoded = encode_param(value, &options.decode_chars);
                if options.leave_params {
                    parts.push(format!("{prefix}${}{encoded}{suffix}", segment.value));
                } else {
                    parts.push(format!("{prefix}{encoded}{suffix}"));
                }
            }
            SegmentKind::OptionalParam => match params.get(&segment.value) {
                Some(value) => {
                    used_params.insert(segment.value.clone(), value.clone());
                    let encoded = encode_param(value, &options.decode_chars);
                    if options.leave_params || options.leave_wildcards {
                        parts.push(format!("{prefix}{}{encoded}{suffix}", segment.value));
                    } else {
                        parts.push(format!("{prefix}{encoded}{suffix}"));
                    }
                }
                None if options.leave_wildcards => {
                    parts.push(format!("{prefix}{}{suffix}", segment.value));
                }
                None if segment.has_affix() => parts.push(format!("{prefix}{suffix}")),
                None => {}
            },
        }
    }

    if pattern.is_index() {
        parts.push(String::new());
    }

    let path = join_paths(&parts);
    let path = if path.is_empty() { "/".to_string() } else { path };

    Ok(Interpolated { path, used_params })
}

fn encode_param(value: &str, decode_chars: &[char]) -> String {
    let encoded = encode_uri_component(value);
    decode_chars.iter().fold(encoded, |acc, ch| {
        let mut buf = [0u8; 4];
        acc.replace(&encode_uri_component(ch.encode_utf8(&mut buf)), &ch.to_string())
    })
}
