//! RFC 2047 encoded-word decoding for header text.

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    encoding_rs::Encoding,
};

/// Decode raw header bytes: lossy UTF-8, then any encoded-words.
#[must_use]
pub fn decode_header(raw: &[u8]) -> String {
    decode_words(&String::from_utf8_lossy(raw))
}

/// Replace every well-formed `=?charset?B|Q?text?=` token with its decoded
/// text. Whitespace between two adjacent encoded-words is dropped. Tokens
/// that fail to decode are left as they are.
#[must_use]
pub fn decode_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);
        match parse_word(candidate) {
            Some((decoded, consumed)) => {
                if !(after_word && before.trim().is_empty()) {
                    out.push_str(before);
                }
                out.push_str(&decoded);
                rest = &candidate[consumed..];
                after_word = true;
            },
            None => {
                out.push_str(before);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            },
        }
    }
    out.push_str(rest);
    out
}

/// Parse one encoded-word at the start of `s`. Returns the decoded text and
/// the number of bytes consumed.
fn parse_word(s: &str) -> Option<(String, usize)> {
    let body = s.strip_prefix("=?")?;
    let (charset, rest) = body.split_once('?')?;
    let (scheme, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let text = &rest[..end];
    if charset.is_empty() || charset.contains(char::is_whitespace) || text.contains(' ') {
        return None;
    }

    let bytes = match scheme {
        "B" | "b" => STANDARD.decode(text).ok()?,
        "Q" | "q" => decode_q(text)?,
        _ => return None,
    };
    // RFC 2231 language suffix: `utf-8*en`.
    let label = charset.split('*').next().unwrap_or(charset);
    let encoding = Encoding::for_label(label.trim().as_bytes())?;
    let (decoded, _, _) = encoding.decode(&bytes);

    let consumed = 2 + charset.len() + 1 + scheme.len() + 1 + end + 2;
    Some((decoded.into_owned(), consumed))
}

fn decode_q(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => out.push(b' '),
            b'=' => {
                let hex = text.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            },
            other => out.push(other),
        }
        i += 1;
    }
    Some(out)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("Plain subject", "Plain subject")]
    #[case("=?utf-8?B?SGVsbG8gV29ybGQ=?=", "Hello World")]
    #[case("=?UTF-8?Q?caf=C3=A9?=", "café")]
    #[case("=?ISO-8859-1?Q?Caf=E9_au_lait?=", "Café au lait")]
    #[case("Re: =?utf-8?Q?caf=C3=A9?= time", "Re: café time")]
    #[case("=?utf-8?Q?a?= =?utf-8?Q?b?=", "ab")]
    #[case("=?utf-8*en?Q?hi?=", "hi")]
    fn decodes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(decode_words(input), expected);
    }

    #[rstest]
    #[case("=?bogus?X?y?=")]
    #[case("=?x-not-a-charset?Q?a?=")]
    #[case("=?utf-8?Q?bad=Zescape?=")]
    #[case("price =? unknown")]
    fn leaves_malformed_tokens(#[case] input: &str) {
        assert_eq!(decode_words(input), input);
    }

    #[test]
    fn header_bytes_are_lossy() {
        assert_eq!(decode_header(b"Hi \xff there"), "Hi \u{fffd} there");
    }
}
