/// Route pattern compilation and specificity ranking
///
/// Pure functional parsers that turn a declared full path into a
/// [`RoutePattern`] and a [`RankKey`] used to order candidate routes.
use std::cmp::Ordering;
use std::fmt;

use super::pattern::{classify_segment, Segment, SegmentKind};
use crate::path::clean_path;

const SLASH_SCORE: f64 = 0.75;
const LITERAL_SCORE: f64 = 1.0;
const REQUIRED_PARAM_SCORE: f64 = 0.5;
const OPTIONAL_PARAM_SCORE: f64 = 0.4;
const WILDCARD_SCORE: f64 = 0.25;
const LITERAL_AFTER_PARAM_BONUS: f64 = 0.2;
const BOTH_AFFIX_BONUS: f64 = 0.05;
const PREFIX_BONUS: f64 = 0.02;
const SUFFIX_BONUS: f64 = 0.01;
const PREFIX_LENGTH_MULTIPLIER: f64 = 0.0002;
const SUFFIX_LENGTH_MULTIPLIER: f64 = 0.0001;

/// A compiled route path
///
/// Immutable once compiled. `index` is set when the declared path ends in
/// `/`, which is how index routes (`/posts/`) are told apart from their
/// layout (`/posts`).
///
/// # Examples
///
/// ```
/// use waypoint_router::route::RoutePattern;
///
/// let pattern = RoutePattern::compile("/posts/$postId/{-$tab}");
/// assert_eq!(pattern.segments().len(), 3);
/// assert_eq!(pattern.param_names(), vec!["postId", "tab"]);
/// assert!(!pattern.is_index());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePattern {
    source: String,
    segments: Vec<Segment>,
    index: bool,
}

/// Fold accumulator used while compiling a pattern
#[derive(Default)]
struct ParseState {
    segments: Vec<Segment>,
    wildcard_seen: bool,
}

impl ParseState {
    /// Adds one classified token. Tokens after a wildcard are unreachable
    /// and are dropped.
    fn with_token(mut self, token: &str) -> Self {
        if self.wildcard_seen {
            return self;
        }
        let segment = classify_segment(token);
        self.wildcard_seen = segment.kind == SegmentKind::Wildcard;
        self.segments.push(segment);
        self
    }
}

impl RoutePattern {
    /// Compiles a path string. Never fails: unknown syntax is a literal.
    pub fn compile(path: &str) -> Self {
        let cleaned = clean_path(path);
        let index = cleaned.ends_with('/');

        let state = cleaned
            .split('/')
            .filter(|token| !token.is_empty())
            .fold(ParseState::default(), ParseState::with_token);

        Self {
            source: cleaned.into_owned(),
            segments: state.segments,
            index,
        }
    }

    /// The cleaned source path
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True for index patterns (declared with a trailing `/`)
    pub fn is_index(&self) -> bool {
        self.index
    }

    /// Names of every param and optional param, in order
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter(|s| matches!(s.kind, SegmentKind::Param | SegmentKind::OptionalParam))
            .map(|s| s.value.as_str())
            .collect()
    }

    /// True when the pattern ends in a wildcard
    pub fn has_wildcard(&self) -> bool {
        self.segments
            .last()
            .is_some_and(|s| s.kind == SegmentKind::Wildcard)
    }

    /// Computes the specificity key used to order candidate routes
    pub fn rank_key(&self) -> RankKey {
        RankKey::from_pattern(self)
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Specificity key for a route pattern
///
/// One score per segment (plus one for an index route's trailing slash).
/// Compare keys with [`RankKey::compare`]; the lesser key is tried first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankKey {
    pub scores: Vec<f64>,
    pub values: Vec<String>,
    pub optional_params: usize,
    pub has_literal_after_param: bool,
}

impl RankKey {
    fn from_pattern(pattern: &RoutePattern) -> Self {
        let segments = pattern.segments();
        let mut optional_params = 0;
        let mut has_literal_after_param = false;
        let mut scores = Vec::with_capacity(segments.len() + 1);
        let mut values = Vec::with_capacity(segments.len() + 1);

        for (i, segment) in segments.iter().enumerate() {
            let base = match segment.kind {
                SegmentKind::Literal => {
                    scores.push(LITERAL_SCORE);
                    values.push(segment.value.clone());
                    continue;
                }
                SegmentKind::Param => REQUIRED_PARAM_SCORE,
                SegmentKind::OptionalParam => {
                    optional_params += 1;
                    OPTIONAL_PARAM_SCORE
                }
                SegmentKind::Wildcard => WILDCARD_SCORE,
            };

            let literal_after = segments[i + 1..]
                .iter()
                .any(|s| s.kind == SegmentKind::Literal);
            let base = if literal_after {
                has_literal_after_param = true;
                base + LITERAL_AFTER_PARAM_BONUS
            } else {
                base
            };

            scores.push(affix_score(segment, base));
            values.push(match segment.kind {
                SegmentKind::Wildcard => "$".to_string(),
                _ => format!("${}", segment.value),
            });
        }

        if pattern.is_index() {
            scores.push(SLASH_SCORE);
            values.push("/".to_string());
        }

        Self {
            scores,
            values,
            optional_params,
            has_literal_after_param,
        }
    }

    /// Orders two keys: `Less` means `self` is more specific
    ///
    /// 1. Segment scores over the common prefix, higher first
    /// 2. For different lengths: fewer optional params, then a literal
    ///    after a param, then the longer pattern
    /// 3. Segment values, lexicographically
    pub fn compare(&self, other: &Self) -> Ordering {
        let common = self.scores.len().min(other.scores.len());

        for i in 0..common {
            if self.scores[i] != other.scores[i] {
                return other.scores[i]
                    .partial_cmp(&self.scores[i])
                    .unwrap_or(Ordering::Equal);
            }
        }

        if self.scores.len() != other.scores.len() {
            if self.optional_params != other.optional_params {
                match (self.has_literal_after_param, other.has_literal_after_param) {
                    (a, b) if a == b => {
                        return self.optional_params.cmp(&other.optional_params)
                    }
                    (true, false) => return Ordering::Less,
                    _ => return Ordering::Greater,
                }
            }
            return other.scores.len().cmp(&self.scores.len());
        }

        self.values[..common].cmp(&other.values[..common])
    }
}

fn affix_score(segment: &Segment, base: f64) -> f64 {
    let prefix_len = segment.prefix_str().len() as f64;
    let suffix_len = segment.suffix_str().len() as f64;

    match (segment.prefix.is_some(), segment.suffix.is_some()) {
        (true, true) => {
            base + BOTH_AFFIX_BONUS
                + PREFIX_LENGTH_MULTIPLIER * prefix_len
                + SUFFIX_LENGTH_MULTIPLIER * suffix_len
        }
        (true, false) => base + PREFIX_BONUS + PREFIX_LENGTH_MULTIPLIER * prefix_len,
        (false, true) => base + SUFFIX_BONUS + SUFFIX_LENGTH_MULTIPLIER * suffix_len,
        (false, false) => base,
    }
}
