/// Strips markup and control characters from user-supplied chat text.
///
/// Tags are removed (`<` followed by a letter, `/`, `!` or `?`, up to and
/// including the next `>` when no other `<` comes first), as are control characters other than newline and
/// tab and the Unicode bidirectional overrides. A `<` that is never closed,
/// such as in `a < b` or `a<b`, is kept as text.
pub fn sanitize_message(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(c) = rest.chars().next() {
        let after = &rest[c.len_utf8()..];

        if c == '<' && opens_tag(after) {
            if let Some(close) = tag_end(after) {
                rest = &after[close + 1..];
                continue;
            }
        }

        if !is_stripped_char(c) {
            out.push(c);
        }
        rest = after;
    }

    out.trim().to_string()
}

fn opens_tag(after: &str) -> bool {
    after
        .chars()
        .next()
        .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'))
}

/// Offset of the `>` closing a tag body, unless another `<` comes first.
fn tag_end(after: &str) -> Option<usize> {
    after
        .find(['<', '>'])
        .filter(|&at| after.as_bytes()[at] == b'>')
}

fn is_stripped_char(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return false;
    }

    c.is_control()
        || matches!(
            c,
            '\u{200E}' | '\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
        )
}
