//! Lexical script scanner
//!
//! Recovers string literals and comment bodies from script text without
//! parsing it. The only hard part is telling a regex literal from a division
//! operator, which is decided from the previous significant token.

/// Words after which a `/` starts a regex literal even though they look like
/// identifiers
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return",
    "typeof",
    "instanceof",
    "in",
    "of",
    "new",
    "delete",
    "void",
    "throw",
    "case",
    "do",
    "else",
    "yield",
    "await",
];

/// String literals and comments recovered from a script, in source order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutput {
    /// Decoded string literal contents (escapes resolved)
    pub strings: Vec<String>,
    /// Raw comment bodies without their delimiters
    pub comments: Vec<String>,
}

impl ScanOutput {
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.comments.is_empty()
    }
}

/// Lexer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexState {
    Begin,
    InString(char),
    InRegex,
    InRegexCharClass,
    InBlockComment,
    InBlockCommentStar,
    InLineComment,
    SawSlash,
}

/// Kind of the last significant token seen in `Begin` state
#[derive(Debug, Clone, PartialEq, Eq)]
enum PrevToken {
    Nothing,
    Word(String),
    Number,
    /// `)`, `]`, or a completed string/regex literal
    Value,
    Punct,
}

impl PrevToken {
    /// A slash after this token is a division operator
    fn ends_operand(&self) -> bool {
        match self {
            PrevToken::Word(word) => !REGEX_PRECEDING_KEYWORDS.contains(&word.as_str()),
            PrevToken::Number | PrevToken::Value => true,
            PrevToken::Nothing | PrevToken::Punct => false,
        }
    }
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    state: LexState,
    prev: PrevToken,
    /// Position of the quote or slash that opened the current token
    token_start: usize,
    buf: String,
    out: ScanOutput,
}

/// Scans script text for string literals and comments
///
/// Strings and regex literals never span lines: when one is still open at a
/// newline (or at the end of input) the scanner rewinds to just after its
/// opening character and continues as ordinary code.
///
/// # Examples
///
/// ```
/// use scoutline::extract::scan_script;
///
/// let out = scan_script(r#"var x = "http://example.com/a"; // see http://example.com/b"#);
/// assert_eq!(out.strings, vec!["http://example.com/a".to_string()]);
/// assert_eq!(out.comments, vec![" see http://example.com/b".to_string()]);
/// ```
pub fn scan_script(script: &str) -> ScanOutput {
    let mut scanner = Scanner {
        chars: script.chars().collect(),
        pos: 0,
        state: LexState::Begin,
        prev: PrevToken::Nothing,
        token_start: 0,
        buf: String::new(),
        out: ScanOutput::default(),
    };
    scanner.run();
    scanner.out
}

impl Scanner {
    fn run(&mut self) {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match self.state {
                LexState::Begin => self.begin(c),
                LexState::SawSlash => self.saw_slash(c),
                LexState::InString(quote) => self.in_string(c, quote),
                LexState::InRegex => self.in_regex(c),
                LexState::InRegexCharClass => self.in_regex_class(c),
                LexState::InBlockComment => {
                    if c == '*' {
                        self.state = LexState::InBlockCommentStar;
                    } else {
                        self.buf.push(c);
                    }
                    self.pos += 1;
                }
                LexState::InBlockCommentStar => {
                    match c {
                        '/' => self.finish_comment(),
                        '*' => self.buf.push('*'),
                        _ => {
                            self.buf.push('*');
                            self.buf.push(c);
                            self.state = LexState::InBlockComment;
                        }
                    }
                    self.pos += 1;
                }
                LexState::InLineComment => {
                    if c == '\n' || c == '\r' {
                        self.finish_comment();
                    } else {
                        self.buf.push(c);
                    }
                    self.pos += 1;
                }
            }
        }
        self.finish_input();
    }

    fn begin(&mut self, c: char) {
        match c {
            '"' | '\'' | '`' => {
                self.token_start = self.pos;
                self.buf.clear();
                self.state = LexState::InString(c);
                self.pos += 1;
            }
            '/' => {
                self.token_start = self.pos;
                self.state = LexState::SawSlash;
                self.pos += 1;
            }
            ')' | ']' => {
                self.prev = PrevToken::Value;
                self.pos += 1;
            }
            c if c.is_whitespace() => self.pos += 1,
            c if is_word_char(c) => {
                let start = self.pos;
                while self.pos < self.chars.len() && is_word_char(self.chars[self.pos]) {
                    self.pos += 1;
                }
                self.prev = if c.is_ascii_digit() {
                    PrevToken::Number
                } else {
                    PrevToken::Word(self.chars[start..self.pos].iter().collect())
                };
            }
            _ => {
                self.prev = PrevToken::Punct;
                self.pos += 1;
            }
        }
    }

    fn saw_slash(&mut self, c: char) {
        match c {
            '/' => {
                self.buf.clear();
                self.state = LexState::InLineComment;
                self.pos += 1;
            }
            '*' => {
                self.buf.clear();
                self.state = LexState::InBlockComment;
                self.pos += 1;
            }
            // Neither branch consumes `c`; it is re-read in the new state
            _ if self.prev.ends_operand() => {
                self.prev = PrevToken::Punct;
                self.state = LexState::Begin;
            }
            _ => self.state = LexState::InRegex,
        }
    }

    fn in_string(&mut self, c: char, quote: char) {
        if c == quote {
            let text = std::mem::take(&mut self.buf);
            self.out.strings.push(text);
            self.prev = PrevToken::Value;
            self.state = LexState::Begin;
            self.pos += 1;
        } else if c == '\n' || c == '\r' {
            self.rewind();
        } else if c == '\\' {
            self.pos += self.decode_escape();
        } else {
            self.buf.push(c);
            self.pos += 1;
        }
    }

    fn in_regex(&mut self, c: char) {
        match c {
            '\\' => self.pos += 2,
            '[' => {
                self.state = LexState::InRegexCharClass;
                self.pos += 1;
            }
            '/' => {
                self.pos += 1;
                // Flags
                while self.pos < self.chars.len() && is_word_char(self.chars[self.pos]) {
                    self.pos += 1;
                }
                self.prev = PrevToken::Value;
                self.state = LexState::Begin;
            }
            '\n' | '\r' => self.rewind(),
            _ => self.pos += 1,
        }
    }

    fn in_regex_class(&mut self, c: char) {
        match c {
            '\\' => self.pos += 2,
            ']' => {
                self.state = LexState::InRegex;
                self.pos += 1;
            }
            '\n' | '\r' => self.rewind(),
            _ => self.pos += 1,
        }
    }

    /// Abandons an unterminated string or regex literal
    fn rewind(&mut self) {
        self.pos = self.token_start + 1;
        self.buf.clear();
        self.prev = PrevToken::Punct;
        self.state = LexState::Begin;
    }

    fn finish_comment(&mut self) {
        let text = std::mem::take(&mut self.buf);
        self.out.comments.push(text);
        self.state = LexState::Begin;
    }

    fn finish_input(&mut self) {
        match self.state {
            LexState::InLineComment | LexState::InBlockComment => self.finish_comment(),
            LexState::InBlockCommentStar => {
                self.buf.push('*');
                self.finish_comment();
            }
            LexState::InString(_) | LexState::InRegex | LexState::InRegexCharClass => {
                // Unterminated at end of input: rescan what follows the opener
                self.rewind();
                self.run();
            }
            LexState::Begin | LexState::SawSlash => {}
        }
    }

    /// Decodes the escape sequence at `self.pos` into the buffer
    ///
    /// Returns the number of characters consumed, including the backslash.
    fn decode_escape(&mut self) -> usize {
        let next = match self.chars.get(self.pos + 1) {
            Some(c) => *c,
            // Lone backslash at end of input; the string stays unterminated
            None => return 1,
        };

        match next {
            'n' => self.buf.push('\n'),
            't' => self.buf.push('\t'),
            'r' => self.buf.push('\r'),
            'b' => self.buf.push('\u{8}'),
            'f' => self.buf.push('\u{c}'),
            'v' => self.buf.push('\u{b}'),
            'x' => {
                return match self.hex_value(self.pos + 2, 2) {
                    Some(value) => {
                        self.push_code_point(value);
                        4
                    }
                    None => {
                        self.buf.push('x');
                        2
                    }
                };
            }
            'u' => {
                if self.chars.get(self.pos + 2) == Some(&'{') {
                    let digits_start = self.pos + 3;
                    let mut end = digits_start;
                    while end < self.chars.len() && self.chars[end].is_ascii_hexdigit() {
                        end += 1;
                    }
                    if end > digits_start && self.chars.get(end) == Some(&'}') {
                        if let Some(value) = self.hex_value(digits_start, end - digits_start) {
                            self.push_code_point(value);
                            return end + 1 - self.pos;
                        }
                    }
                }
                return match self.hex_value(self.pos + 2, 4) {
                    Some(value) => {
                        self.push_code_point(value);
                        6
                    }
                    None => {
                        self.buf.push('u');
                        2
                    }
                };
            }
            '0'..='7' => {
                let mut value = 0u32;
                let mut len = 0;
                while len < 3 {
                    match self.chars.get(self.pos + 1 + len).copied() {
                        Some(d @ '0'..='7') => {
                            let candidate = value * 8 + d.to_digit(8).unwrap_or(0);
                            if candidate > 0o377 {
                                break;
                            }
                            value = candidate;
                            len += 1;
                        }
                        _ => break,
                    }
                }
                self.push_code_point(value);
                return 1 + len;
            }
            '\r' => {
                // Line continuation, \r\n counts as one line break
                if self.chars.get(self.pos + 2) == Some(&'\n') {
                    return 3;
                }
            }
            '\n' => {}
            other => self.buf.push(other),
        }
        2
    }

    fn hex_value(&self, start: usize, len: usize) -> Option<u32> {
        if start + len > self.chars.len() || len > 6 {
            return None;
        }
        let digits: String = self.chars[start..start + len].iter().collect();
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(&digits, 16).ok()
    }

    fn push_code_point(&mut self, value: u32) {
        self.buf
            .push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
