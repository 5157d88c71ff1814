//! Escaping for the argument of `input text "..."`.
//!
//! `input text` treats `%s` as a space, and the whole command line is
//! interpreted by the device shell inside double quotes.

/// Escapes `text` for use inside `input text "..."`.
///
/// Spaces become `%s`.  `&`, `"`, `\`, `$` and `` ` `` are backslash-escaped.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            ' ' => out.push_str("%s"),
            '&' | '"' | '\\' | '$' | '`' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_becomes_percent_s() {
        assert_eq!(escape_text("hello world"), "hello%sworld");
    }

    #[test]
    fn test_ampersand_is_escaped() {
        assert_eq!(escape_text("a&b"), r"a\&b");
    }

    #[test]
    fn test_shell_metacharacters_are_escaped() {
        assert_eq!(escape_text(r#"say "hi" $HOME `id` \"#), r#"say%s\"hi\"%s\$HOME%s\`id\`%s\\"#);
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        assert_eq!(escape_text("abc123"), "abc123");
        assert_eq!(escape_text(""), "");
    }
}
