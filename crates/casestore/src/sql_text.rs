//! SQL text helpers: column qualification, minification and CTE fragments.

/// Qualify a column with a table alias: `alias.column`.
///
/// An empty alias leaves the column unqualified.
pub fn qualify(alias: &str, column: &str) -> String {
    if alias.is_empty() {
        return column.to_string();
    }
    let mut out = String::with_capacity(alias.len() + column.len() + 1);
    out.push_str(alias);
    out.push('.');
    out.push_str(column);
    out
}

/// Parenthesize a query as a named CTE fragment: `name AS (sql)`.
pub fn form_as_cte(name: &str, sql: &str) -> String {
    format!("{name} AS ({sql})")
}

/// Compact hand-written SQL.
///
/// Strips `--` and `/* */` comments and collapses whitespace runs into a single
/// space. String literals (`'...'`), quoted identifiers (`"..."`) and
/// dollar-quoted bodies (`$tag$...$tag$`) are copied verbatim.
pub fn minify(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        // Line comment
        if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            pending_space = true;
            continue;
        }

        // Block comment (Postgres allows nesting)
        if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let mut depth = 0usize;
            while i < bytes.len() {
                if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    depth += 1;
                    i += 2;
                } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    depth -= 1;
                    i += 2;
                    if depth == 0 {
                        break;
                    }
                } else {
                    i += 1;
                }
            }
            pending_space = true;
            continue;
        }

        if b.is_ascii_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }

        if pending_space {
            if !out.is_empty() && !ends_tight(&out) && !starts_tight(b) {
                out.push(' ');
            }
            pending_space = false;
        }

        match b {
            b'\'' | b'"' => {
                let end = quoted_end(bytes, i, b);
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'$' => match dollar_tag(bytes, i) {
                Some(tag_len) => {
                    let tag = &sql[i..i + tag_len];
                    let body_start = i + tag_len;
                    let end = sql[body_start..]
                        .find(tag)
                        .map(|pos| body_start + pos + tag_len)
                        .unwrap_or(bytes.len());
                    out.push_str(&sql[i..end]);
                    i = end;
                }
                None => {
                    out.push('$');
                    i += 1;
                }
            },
            _ => {
                // Copy one UTF-8 character.
                let ch_len = utf8_len(b);
                out.push_str(&sql[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    out
}

/// End of a quoted run starting at `start`, doubled quotes are escapes.
fn quoted_end(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Length of a `$tag$` opener at `start`, if any. Positional `$1` is not a tag.
fn dollar_tag(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'$' {
            return Some(i - start + 1);
        }
        let ok = if i == start + 1 {
            b == b'_' || b.is_ascii_alphabetic()
        } else {
            b == b'_' || b.is_ascii_alphanumeric()
        };
        if !ok {
            return None;
        }
        i += 1;
    }
    None
}

fn ends_tight(out: &str) -> bool {
    matches!(out.as_bytes().last(), Some(b'(') | Some(b','))
}

fn starts_tight(b: u8) -> bool {
    matches!(b, b')' | b',')
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        _ => 4,
    }
}
