//! Low-level tokenizing for the two config transports: the `key=value` file
//! and the CGI query string.

/// Iterate `key=value` assignments in config-file text. `#` starts a
/// comment for the rest of the line; values may be wrapped in single or
/// double quotes; whitespace around key and value is insignificant.
pub(crate) fn file_assignments(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines().filter_map(|line| {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };
        let (key, value) = line.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key, trim_value(value)))
    })
}

/// Iterate `key=value` assignments in an already-sanitized query string
/// (segments separated by `&`).
pub(crate) fn query_assignments(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query.split('&').filter_map(|segment| {
        let (key, value) = segment.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some((key, trim_value(value)))
    })
}

fn trim_value(value: &str) -> &str {
    value.trim_matches(|c: char| c == ' ' || c == '\t' || c == '"' || c == '\'')
}

/// Decode percent-escapes and drop every byte outside the allowed CGI
/// character set. Invalid characters become spaces (which subsequently fail
/// any numeric parse) rather than being silently deleted, so an injection
/// attempt cannot splice two tokens together. Input is truncated to 2048
/// bytes before decoding.
pub fn sanitize_query_string(raw: &str) -> String {
    const ALLOWED: &str =
        "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789.-+&=_";
    let raw = &raw.as_bytes()[..raw.len().min(2048)];
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = if raw[i] == b'%' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3])
                .ok()
                .and_then(|h| u8::from_str_radix(h, 16).ok());
            match hex {
                Some(decoded) => {
                    i += 2;
                    decoded as char
                }
                None => '%',
            }
        } else {
            raw[i] as char
        };
        out.push(if ALLOWED.contains(c) { c } else { ' ' });
        i += 1;
    }
    out
}
