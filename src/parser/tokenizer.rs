//! Lexer for the brace-delimited interchange format.
//!
//! The tokenizer is deliberately forgiving: it never fails. Malformed input
//! simply yields a token stream that the structural parser will reject.

/// A single lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    BraceOpen,
    BraceClose,
    /// A quoted string with `\"` and `""` escapes resolved to literal quotes.
    /// Other escape sequences are preserved verbatim.
    Quoted(String),
    /// A bracketed array captured whole, including the delimiters. Nested
    /// brackets stay inside the same token; parsing is deferred to value
    /// coercion.
    Bracket(String),
    /// Any other run of non-whitespace characters (number or identifier).
    Atom(String),
}

impl Token {
    pub fn is_atom(&self, s: &str) -> bool {
        matches!(self, Token::Atom(a) if a == s)
    }
}

/// Lex a full document into an ordered token list.
///
/// Whitespace is insignificant; `%` starts a line comment consumed to
/// end-of-line.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '%' => {
                // Line comment
                for ch in chars.by_ref() {
                    if ch == '\n' {
                        break;
                    }
                }
            }
            '{' => {
                chars.next();
                tokens.push(Token::BraceOpen);
            }
            '}' => {
                chars.next();
                tokens.push(Token::BraceClose);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Quoted(read_quoted(&mut chars)));
            }
            '[' => {
                tokens.push(Token::Bracket(read_bracketed(&mut chars)));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut atom = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, '{' | '}' | '"' | '[' | '%') {
                        break;
                    }
                    atom.push(ch);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }

    tokens
}

/// Read a quoted string body; the opening quote is already consumed.
///
/// Two escape conventions occur in the wild and both are accepted: a
/// backslash-escaped quote (`\"`) and a doubled quote (`""`). Both resolve to
/// a single literal quote. Other backslash sequences pass through unchanged.
fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' {
                        out.push('"');
                        chars.next();
                    } else {
                        out.push('\\');
                    }
                } else {
                    out.push('\\');
                }
            }
            '"' => {
                if chars.peek() == Some(&'"') {
                    out.push('"');
                    chars.next();
                } else {
                    break;
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Capture a `[` ... `]` run as one token, tracking nested bracket depth so
/// embedded arrays stay whole. An unterminated bracket consumes to
/// end-of-input.
fn read_bracketed(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut out = String::new();
    let mut depth = 0usize;
    for ch in chars.by_ref() {
        out.push(ch);
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    out
}
