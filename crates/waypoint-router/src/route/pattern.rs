/// Segment classification for route path patterns
///
/// Pure parsing of a single `/`-delimited token into a typed [`Segment`].
/// All functions are **pure**: same input → same output, no side effects.
use once_cell::sync::Lazy;
use regex::Regex;

static WILDCARD_BRACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(.*?)\{\$\}(.*)$").unwrap());

static OPTIONAL_BRACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\{-\$([a-zA-Z_$][a-zA-Z0-9_$]*)\}(.*)$").unwrap());

static PARAM_BRACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\{\$([a-zA-Z_$][a-zA-Z0-9_$]*)\}(.*)$").unwrap());

/// Kind of a compiled route segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// Literal text, compared against the pathname segment
    Literal,
    /// Required parameter: `$id` or `prefix{$id}suffix`
    Param,
    /// Optional parameter: `{-$id}` or `prefix{-$id}suffix`
    OptionalParam,
    /// Wildcard capturing the rest of the pathname: `$` or `prefix{$}suffix`
    Wildcard,
}

/// One compiled segment of a route pattern
///
/// For parameters `value` holds the bare parameter name (no `$`). For
/// wildcards it is always `$`. Literals keep their declared text verbatim,
/// including any percent-encoded characters.
///
/// # Examples
///
/// ```
/// use waypoint_router::route::pattern::{classify_segment, SegmentKind};
///
/// let seg = classify_segment("$postId");
/// assert_eq!(seg.kind, SegmentKind::Param);
/// assert_eq!(seg.value, "postId");
///
/// let seg = classify_segment("file{$name}.txt");
/// assert_eq!(seg.prefix.as_deref(), Some("file"));
/// assert_eq!(seg.suffix.as_deref(), Some(".txt"));
///
/// let seg = classify_segment("{-$lang}");
/// assert_eq!(seg.kind, SegmentKind::OptionalParam);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub kind: SegmentKind,
    pub value: String,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
}

impl Segment {
    /// Creates a literal segment
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            kind: SegmentKind::Literal,
            value: value.into(),
            prefix: None,
            suffix: None,
        }
    }

    fn dynamic(kind: SegmentKind, value: &str, prefix: &str, suffix: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            prefix: non_empty(prefix),
            suffix: non_empty(suffix),
        }
    }

    /// Returns true for params, optional params and wildcards
    pub fn is_dynamic(&self) -> bool {
        self.kind != SegmentKind::Literal
    }

    /// Returns true when the segment carries a prefix or suffix literal
    pub fn has_affix(&self) -> bool {
        self.prefix.is_some() || self.suffix.is_some()
    }

    /// Prefix literal, or the empty string
    pub fn prefix_str(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// Suffix literal, or the empty string
    pub fn suffix_str(&self) -> &str {
        self.suffix.as_deref().unwrap_or("")
    }

    /// Renders the segment back to route-path syntax
    pub fn to_pattern_string(&self) -> String {
        let (prefix, suffix) = (self.prefix_str(), self.suffix_str());
        match self.kind {
            SegmentKind::Literal => self.value.clone(),
            SegmentKind::Param if !self.has_affix() => format!("${}", self.value),
            SegmentKind::Param => format!("{prefix}{{${}}}{suffix}", self.value),
            SegmentKind::OptionalParam => format!("{prefix}{{-${}}}{suffix}", self.value),
            SegmentKind::Wildcard if !self.has_affix() => "$".to_string(),
            SegmentKind::Wildcard => format!("{prefix}{{$}}{suffix}"),
        }
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}

/// Classifies a segment into a typed pattern segment (pure function)
///
/// # Parsing Rules (evaluated in order)
///
/// 1. **Wildcard with affixes**: `prefix{$}suffix`
/// 2. **Optional param**: `prefix{-$name}suffix`
/// 3. **Param with affixes**: `prefix{$name}suffix`
/// 4. **Bare param**: `$name`
/// 5. **Bare wildcard**: `$`
/// 6. **Literal**: anything else
///
/// # Performance
///
/// - O(n) where n is segment length
/// - Literal segments without `$` or `{` skip all regex work
pub fn classify_segment(token: &str) -> Segment {
    if !token.contains('$') {
        return Segment::literal(token);
    }

    if let Some(caps) = WILDCARD_BRACES.captures(token) {
        return Segment::dynamic(SegmentKind::Wildcard, "$", &caps[1], &caps[2]);
    }

    if let Some(caps) = OPTIONAL_BRACES.captures(token) {
        return Segment::dynamic(SegmentKind::OptionalParam, &caps[2], &caps[1], &caps[3]);
    }

    if let Some(caps) = PARAM_BRACES.captures(token) {
        return Segment::dynamic(SegmentKind::Param, &caps[2], &caps[1], &caps[3]);
    }

    match token.strip_prefix('$') {
        Some("") => Segment::dynamic(SegmentKind::Wildcard, "$", "", ""),
        Some(name) => Segment::dynamic(SegmentKind::Param, name, "", ""),
        None => Segment::literal(token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_literal() {
        let seg = classify_segment("posts");
        assert_eq!(seg, Segment::literal("posts"));
        assert!(!seg.is_dynamic());
    }

    #[test]
    fn test_classify_literal_with_dollar_inside() {
        let seg = classify_segment("price$");
        assert_eq!(seg.kind, SegmentKind::Literal);
    }

    #[test]
    fn test_classify_required_param() {
        let seg = classify_segment("$id");
        assert_eq!(seg.kind, SegmentKind::Param);
        assert_eq!(seg.value, "id");
        assert!(!seg.has_affix());
    }

    #[test]
    fn test_classify_affixed_param() {
        let seg = classify_segment("user-{$id}.json");
        assert_eq!(seg.kind, SegmentKind::Param);
        assert_eq!(seg.value, "id");
        assert_eq!(seg.prefix.as_deref(), Some("user-"));
        assert_eq!(seg.suffix.as_deref(), Some(".json"));
    }

    #[test]
    fn test_classify_optional_param() {
        let seg = classify_segment("{-$lang}");
        assert_eq!(seg.kind, SegmentKind::OptionalParam);
        assert_eq!(seg.value, "lang");
        assert!(!seg.has_affix());

        let seg = classify_segment("v{-$version}");
        assert_eq!(seg.prefix.as_deref(), Some("v"));
    }

    #[test]
    fn test_classify_wildcards() {
        let seg = classify_segment("$");
        assert_eq!(seg.kind, SegmentKind::Wildcard);
        assert!(!seg.has_affix());

        let seg = classify_segment("files{$}.zip");
        assert_eq!(seg.kind, SegmentKind::Wildcard);
        assert_eq!(seg.prefix.as_deref(), Some("files"));
        assert_eq!(seg.suffix.as_deref(), Some(".zip"));
    }

    #[test]
    fn test_to_pattern_string_round_trips() {
        for token in ["posts", "$id", "a{$id}b", "{-$id}", "x{-$id}", "$", "p{$}"] {
            assert_eq!(classify_segment(token).to_pattern_string(), token);
        }
    }
}
