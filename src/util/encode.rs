//! RFC 3986 percent-encoding as S3 signs it: everything but the unreserved set is escaped,
//! with uppercase hex digits.

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Component {
    /// Query names and values, bucket names. `/` is escaped.
    Value,
    /// Request paths. `/` separates segments and stays literal.
    Path,
}

pub(crate) fn percent_encode(input: &str, component: Component) -> String {
    let mut out = String::with_capacity(input.len());
    for &byte in input.as_bytes() {
        let literal = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_' | b'.' | b'~')
            || (component == Component::Path && byte == b'/');
        if literal {
            out.push(char::from(byte));
        } else {
            out.push('%');
            out.push(char::from(HEX[usize::from(byte >> 4)]));
            out.push(char::from(HEX[usize::from(byte & 0x0f)]));
        }
    }
    out
}

/// Encodes each pair and sorts by name, then value. Valueless sub-resources come out as `name=`.
pub(crate) fn canonical_query(params: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .map(|(name, value)| {
            (
                percent_encode(name, Component::Value),
                percent_encode(value, Component::Value),
            )
        })
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}
