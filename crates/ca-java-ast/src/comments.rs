//! Comment stripping ahead of the regex fallback parser (§4.3). Tree-sitter
//! itself never needs this — it tokenizes comments as trivia — but the
//! fallback regexes scan raw text, so a `//` inside a string literal must
//! never be mistaken for the start of a line comment.
//!
//! Ported state machine from the original implementation: a small
//! character-by-character scanner tracking whether we're inside a string
//! literal, a line comment, or a block comment, with escape-sequence
//! awareness so `"\"quoted\""` doesn't end the string early.

pub fn strip_comments(source: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut result = String::with_capacity(source.len());
    let mut i = 0;
    let mut in_string = false;
    let mut string_char = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    while i < chars.len() {
        let c = chars[i];

        if !in_line_comment && !in_block_comment {
            let escaped = i > 0 && chars[i - 1] == '\\';
            if (c == '\'' || c == '"') && !escaped {
                if !in_string {
                    in_string = true;
                    string_char = Some(c);
                } else if Some(c) == string_char {
                    in_string = false;
                    string_char = None;
                }
            }
        }

        if !in_string {
            if i + 1 < chars.len() && chars[i] == '/' && chars[i + 1] == '*' {
                in_block_comment = true;
                i += 2;
                continue;
            }
            if in_block_comment && i + 1 < chars.len() && chars[i] == '*' && chars[i + 1] == '/' {
                in_block_comment = false;
                i += 2;
                continue;
            }
            if !in_block_comment && i + 1 < chars.len() && chars[i] == '/' && chars[i + 1] == '/' {
                in_line_comment = true;
                i += 2;
                continue;
            }
            if in_line_comment && c == '\n' {
                in_line_comment = false;
                result.push(c);
                i += 1;
                continue;
            }
        }

        if !in_line_comment && !in_block_comment {
            result.push(c);
        }
        i += 1;
    }

    result
}
