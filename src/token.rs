//! Streaming `{{...}}` tokenizer.
//!
//! Macro text is literal characters with `{{BODY}}` directives mixed in. The
//! scanner is fed one character at a time and reports literal characters
//! as soon as it knows they are literal, and whole token bodies when a
//! closing `}}` arrives. File playback, BLE relay and live commands all share
//! this one scanner.
//!
//! Rules:
//! - `{{` opens a token, `}}` closes it
//! - a lone `{` followed by anything else is literal `{` plus that character
//! - a lone `}` inside a token is part of the body
//! - whatever is still open at end of input comes back as literal text

/// Result of feeding one character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// Nothing to emit yet
    Pending,
    /// One literal character
    Literal(char),
    /// Two literal characters (a stray `{` and the character after it)
    Literal2(char, char),
    /// A completed token body, without the braces
    Token(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum State {
    #[default]
    Text,
    /// Saw one `{`
    OpenBrace,
    /// Inside `{{`
    Body,
    /// Inside a body, saw one `}`
    CloseBrace,
}

#[derive(Debug, Default)]
pub struct TokenScanner {
    state: State,
    body: String,
}

impl TokenScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a token (or a possible token start) is open.
    pub fn in_token(&self) -> bool {
        self.state != State::Text
    }

    pub fn feed(&mut self, ch: char) -> Scan {
        match self.state {
            State::Text => {
                if ch == '{' {
                    self.state = State::OpenBrace;
                    Scan::Pending
                } else {
                    Scan::Literal(ch)
                }
            }
            State::OpenBrace => {
                if ch == '{' {
                    self.state = State::Body;
                    self.body.clear();
                    Scan::Pending
                } else {
                    self.state = State::Text;
                    Scan::Literal2('{', ch)
                }
            }
            State::Body => {
                if ch == '}' {
                    self.state = State::CloseBrace;
                } else {
                    self.body.push(ch);
                }
                Scan::Pending
            }
            State::CloseBrace => {
                if ch == '}' {
                    self.state = State::Text;
                    Scan::Token(std::mem::take(&mut self.body))
                } else {
                    self.body.push('}');
                    self.body.push(ch);
                    self.state = State::Body;
                    Scan::Pending
                }
            }
        }
    }

    /// End of input: return anything unfinished as literal text.
    pub fn finish(&mut self) -> Option<String> {
        let state = std::mem::take(&mut self.state);
        let body = std::mem::take(&mut self.body);
        match state {
            State::Text => None,
            State::OpenBrace => Some("{".to_string()),
            State::Body => Some(format!("{{{{{body}")),
            State::CloseBrace => Some(format!("{{{{{body}}}")),
        }
    }
}

/// Split a whole string into literal runs and token bodies.
pub fn scan_all(text: &str) -> Vec<Segment> {
    let mut scanner = TokenScanner::new();
    let mut out: Vec<Segment> = Vec::new();
    let push_literal = |out: &mut Vec<Segment>, ch: char| match out.last_mut() {
        Some(Segment::Literal(s)) => s.push(ch),
        _ => out.push(Segment::Literal(ch.to_string())),
    };
    for ch in text.chars() {
        match scanner.feed(ch) {
            Scan::Pending => {}
            Scan::Literal(c) => push_literal(&mut out, c),
            Scan::Literal2(a, b) => {
                push_literal(&mut out, a);
                push_literal(&mut out, b);
            }
            Scan::Token(body) => out.push(Segment::Token(body)),
        }
    }
    if let Some(rest) = scanner.finish() {
        for c in rest.chars() {
            push_literal(&mut out, c);
        }
    }
    out
}

/// A run of literal text or one token body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(s: &str) -> Segment {
        Segment::Literal(s.to_string())
    }

    fn tok(s: &str) -> Segment {
        Segment::Token(s.to_string())
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(scan_all("hello world"), vec![lit("hello world")]);
        assert!(scan_all("").is_empty());
    }

    #[test]
    fn test_token_between_text() {
        assert_eq!(
            scan_all("Hello{{KEY:enter}}World"),
            vec![lit("Hello"), tok("KEY:enter"), lit("World")]
        );
    }

    #[test]
    fn test_lone_brace_is_literal() {
        assert_eq!(scan_all("a{b}c"), vec![lit("a{b}c")]);
        assert_eq!(scan_all("{x}"), vec![lit("{x}")]);
    }

    #[test]
    fn test_single_close_brace_inside_body() {
        assert_eq!(scan_all("{{TEXT:a}b}}"), vec![tok("TEXT:a}b")]);
    }

    #[test]
    fn test_unterminated_flushes_literal() {
        assert_eq!(scan_all("abc{"), vec![lit("abc{")]);
        assert_eq!(scan_all("x{{DELAY:5"), vec![lit("x{{DELAY:5")]);
        assert_eq!(scan_all("{{KEY:a}"), vec![lit("{{KEY:a}")]);
    }

    #[test]
    fn test_feed_reports_stray_brace_pair() {
        let mut s = TokenScanner::new();
        assert_eq!(s.feed('{'), Scan::Pending);
        assert!(s.in_token());
        assert_eq!(s.feed('a'), Scan::Literal2('{', 'a'));
        assert!(!s.in_token());
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn test_triple_brace() {
        // third brace belongs to the body
        assert_eq!(scan_all("{{{KEY:a}}"), vec![tok("{KEY:a")]);
    }

    #[test]
    fn test_adjacent_tokens() {
        assert_eq!(
            scan_all("{{DELAY:1}}{{DELAY:2}}"),
            vec![tok("DELAY:1"), tok("DELAY:2")]
        );
    }
}
