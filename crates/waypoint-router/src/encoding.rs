//! Percent-encoding helpers with browser URI semantics
//!
//! `urlencoding` escapes everything outside the unreserved set; these
//! wrappers add the few characters that component encoding leaves alone,
//! and a URI-level decoder that keeps reserved escapes intact.

use std::borrow::Cow;

/// Characters component encoding keeps verbatim on top of `A-Za-z0-9-_.~`
const COMPONENT_SAFE: [(&str, &str); 5] = [
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Reserved characters whose escapes survive URI decoding
const URI_RESERVED: &[u8] = b";/?:@&=+$,#";

/// Encodes a single path component
///
/// # Examples
///
/// ```
/// use waypoint_router::encoding::encode_uri_component;
///
/// assert_eq!(encode_uri_component("a b/c"), "a%20b%2Fc");
/// assert_eq!(encode_uri_component("100%25"), "100%2525");
/// assert_eq!(encode_uri_component("(x)!"), "(x)!");
/// ```
pub fn encode_uri_component(value: &str) -> String {
    let encoded = urlencoding::encode(value);
    if !encoded.contains('%') {
        return encoded.into_owned();
    }
    COMPONENT_SAFE
        .iter()
        .fold(encoded.into_owned(), |acc, (escape, ch)| acc.replace(escape, ch))
}

/// Encodes a multi-segment value, keeping `/` separators
pub fn encode_uri(value: &str) -> String {
    value
        .split('/')
        .map(encode_uri_component)
        .collect::<Vec<_>>()
        .join("/")
}

/// Decodes one level of percent-encoding
///
/// Malformed input (invalid UTF-8 after decoding) is returned unchanged.
pub fn decode_uri_component(value: &str) -> Cow<'_, str> {
    if !value.contains('%') {
        return Cow::Borrowed(value);
    }
    match urlencoding::decode(value) {
        Ok(decoded) => Cow::Owned(decoded.into_owned()),
        Err(_) => Cow::Borrowed(value),
    }
}

/// Decodes one level of percent-encoding except reserved escapes
///
/// `%2F` stays `%2F`, so a decoded splat never gains new separators.
/// `urlencoding::decode` has no reserved set, hence the byte scanner.
/// Input whose unescaped bytes are not valid UTF-8 is returned unchanged.
pub fn decode_uri(value: &str) -> Cow<'_, str> {
    if !value.contains('%') {
        return Cow::Borrowed(value);
    }

    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Some(byte) = hex_pair(bytes[i + 1], bytes[i + 2]) {
                if URI_RESERVED.contains(&byte) {
                    out.extend_from_slice(&bytes[i..i + 3]);
                } else {
                    out.push(byte);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    // Reserved escapes are copied verbatim: decoding them would add
    // delimiters (`/`, `?`, `#`) the captured value never had.
    match String::from_utf8(out) {
        Ok(decoded) => Cow::Owned(decoded),
        Err(_) => Cow::Borrowed(value),
    }
}

fn hex_pair(high: u8, low: u8) -> Option<u8> {
    let digit = |b: u8| (b as char).to_digit(16);
    Some((digit(high)? * 16 + digit(low)?) as u8)
}
