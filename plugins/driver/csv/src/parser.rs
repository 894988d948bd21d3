use dbridge_api::{DriverError, Result};

// ═══════════════════════════════════════════════════════════════
//  RFC 4180 field parser
// ═══════════════════════════════════════════════════════════════

/// Split one record into fields.
///
/// With `quoting`, a field may be wrapped in double quotes; inside it the
/// delimiter and line breaks are literal and `""` stands for `"`.
pub(crate) fn parse_fields(line: &str, delimiter: char, quoting: bool) -> Vec<String> {
    if !quoting {
        return line.split(delimiter).map(str::to_string).collect();
    }

    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();
    let mut field = String::new();

    loop {
        let mut ended_on_delimiter = false;

        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                if c != '"' {
                    field.push(c);
                } else if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    break;
                }
            }
            // anything between the closing quote and the delimiter is dropped
            for c in chars.by_ref() {
                if c == delimiter {
                    ended_on_delimiter = true;
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == delimiter {
                    ended_on_delimiter = true;
                    break;
                }
                field.push(c);
            }
        }

        fields.push(std::mem::take(&mut field));

        if chars.peek().is_none() {
            if ended_on_delimiter {
                fields.push(String::new());
            }
            break;
        }
    }

    fields
}

/// `true` while `text` ends inside a quoted field, i.e. the record continues
/// on the next physical line.
///
/// Follows `parse_fields`: a quote opens a field only as its first character,
/// quotes anywhere else in an unquoted field are literal.
pub(crate) fn has_open_quote(text: &str, delimiter: char) -> bool {
    #[derive(Clone, Copy, PartialEq)]
    enum State {
        FieldStart,
        Unquoted,
        Quoted,
        AfterQuoted,
    }

    let mut state = State::FieldStart;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        state = match state {
            _ if c == delimiter && state != State::Quoted => State::FieldStart,
            State::FieldStart if c == '"' => State::Quoted,
            State::FieldStart | State::Unquoted => State::Unquoted,
            State::Quoted if c == '"' => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    State::Quoted
                } else {
                    State::AfterQuoted
                }
            }
            State::Quoted => State::Quoted,
            State::AfterQuoted => State::AfterQuoted,
        };
    }
    state == State::Quoted
}

pub(crate) fn parse_delimiter(s: &str) -> Result<char> {
    let mut chars = s.chars();
    match (s, chars.next(), chars.next()) {
        ("\\t", _, _) => Ok('\t'),
        (_, Some(c), None) if c != '"' && c != '\n' && c != '\r' => Ok(c),
        (other, _, _) => Err(DriverError::config(format!(
            "csv: delimiter must be a single character, got {other:?}"
        ))),
    }
}
