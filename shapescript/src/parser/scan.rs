/// Tracks string literals while scanning source bytes left to right.
///
/// A literal opens at `"` or `'`, closes at the same quote character, and
/// is cut short by a newline. Inside a literal a backslash escapes the next
/// byte, so `"say \"hi\""` is one literal.
#[derive(Debug, Default)]
pub(crate) struct QuoteTracker {
    quote: Option<u8>,
    escaped: bool,
}

impl QuoteTracker {
    pub fn new() -> Self {
        QuoteTracker::default()
    }

    /// Feed the next byte. Returns `true` when the byte belongs to a string
    /// literal (its quotes included) and carries no structure. A newline
    /// ending an open literal is itself structural and returns `false`.
    pub fn consume(&mut self, b: u8) -> bool {
        match self.quote {
            Some(_) if b == b'\n' => {
                self.quote = None;
                self.escaped = false;
                false
            }
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == q {
                    self.quote = None;
                }
                true
            }
            None if b == b'"' || b == b'\'' => {
                self.quote = Some(b);
                true
            }
            None => false,
        }
    }
}

/// Copy of `text` with every string-literal byte replaced by a space, for
/// scans that have to walk backwards.
pub(crate) fn mask_strings(text: &str) -> Vec<u8> {
    let mut quotes = QuoteTracker::new();
    text.bytes()
        .map(|b| if quotes.consume(b) { b' ' } else { b })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escaped_quotes_stay_inside_the_literal() {
        let masked = mask_strings(r#"a = "x \" { y" {"#);
        let expected = format!("a = {} {{", " ".repeat(10));
        assert_eq!(String::from_utf8(masked).unwrap(), expected);
    }

    #[test]
    fn newline_ends_an_open_literal() {
        let mut quotes = QuoteTracker::new();
        assert!(quotes.consume(b'\''));
        assert!(quotes.consume(b'{'));
        assert!(!quotes.consume(b'\n'));
        assert!(!quotes.consume(b'{'));
    }
}
