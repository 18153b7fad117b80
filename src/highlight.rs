//! Syntax highlighting for console queries.
//!
//! The highlighter is a pure function from the raw input text to an ordered
//! list of classified spans. It keeps no state between calls, so the console
//! re-runs it on every keystroke.
//!
//! # Classification
//!
//! The input is scanned for word runs (maximal runs of ASCII letters, digits
//! and `_`). Each word run is classified, first match wins:
//!
//! | Pattern                  | Kind       |
//! |--------------------------|------------|
//! | `[A-Z][A-Za-z0-9_]*`     | `Variable` |
//! | `[0-9]+`                 | `Number`   |
//! | `[a-z][a-z0-9_]*`        | `Atom`     |
//!
//! Everything else, including punctuation, whitespace and word runs that
//! match none of the patterns (`_x`, `fooBar`, `12ab`), is folded into
//! `Literal` spans. The spans never overlap and cover the input exactly.
//!
//! # Presentation
//!
//! ```text
//! classify ──► escape literal text ──► map kinds to markup / styles
//! ```
//!
//! Escaping happens after classification so that entity text such as
//! `&amp;` can never be mistaken for an atom.

use ratatui::style::{Color, Modifier, Style};

/// Lexical class of a highlighted span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifier starting with an uppercase letter.
    Variable,
    /// Run of decimal digits.
    Number,
    /// Identifier starting with a lowercase letter.
    Atom,
    /// Any text not covered by the other kinds.
    Literal,
}

impl TokenKind {
    /// Markup class name, `None` for plain literal text.
    pub fn class_name(&self) -> Option<&'static str> {
        match self {
            TokenKind::Variable => Some("variable"),
            TokenKind::Number => Some("number"),
            TokenKind::Atom => Some("atom"),
            TokenKind::Literal => None,
        }
    }

    /// Terminal style used by the console input view.
    pub fn style(&self) -> Style {
        match self {
            TokenKind::Variable => Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            TokenKind::Number => Style::default().fg(Color::Yellow),
            TokenKind::Atom => Style::default().fg(Color::Magenta),
            TokenKind::Literal => Style::default(),
        }
    }
}

/// A classified span of the input.
///
/// `start` and `end` are byte offsets into the classified string, `end`
/// exclusive, so `&input[token.start..token.end] == token.text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(kind: TokenKind, input: &str, start: usize, end: usize) -> Self {
        Self {
            kind,
            text: input[start..end].to_string(),
            start,
            end,
        }
    }
}

/// Word characters for the boundary rule (ASCII only).
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Classify a complete word run.
fn classify_word(word: &str) -> TokenKind {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return TokenKind::Literal;
    };

    if first.is_ascii_uppercase() {
        TokenKind::Variable
    } else if word.bytes().all(|b| b.is_ascii_digit()) {
        TokenKind::Number
    } else if first.is_ascii_lowercase()
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        TokenKind::Atom
    } else {
        TokenKind::Literal
    }
}

/// Split `input` into classified spans covering the whole string.
///
/// Total and deterministic: the same input always yields the same tokens,
/// and unmatched text becomes `Literal`. Adjacent literal text is merged
/// into a single span.
///
/// # Example
///
/// ```
/// use matriz_console::highlight::{classify, TokenKind};
///
/// let kinds: Vec<TokenKind> = classify("X is 5").iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     [
///         TokenKind::Variable,
///         TokenKind::Literal,
///         TokenKind::Atom,
///         TokenKind::Literal,
///         TokenKind::Number,
///     ]
/// );
/// ```
pub fn classify(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut literal_start: Option<usize> = None;
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if !is_word_char(c) {
            literal_start.get_or_insert(start);
            chars.next();
            continue;
        }

        // Consume the whole word run
        let mut end = start;
        while let Some(&(pos, c)) = chars.peek() {
            if !is_word_char(c) {
                break;
            }
            end = pos + c.len_utf8();
            chars.next();
        }

        match classify_word(&input[start..end]) {
            TokenKind::Literal => {
                literal_start.get_or_insert(start);
            }
            kind => {
                if let Some(lit) = literal_start.take() {
                    tokens.push(Token::new(TokenKind::Literal, input, lit, start));
                }
                tokens.push(Token::new(kind, input, start, end));
            }
        }
    }

    if let Some(lit) = literal_start {
        tokens.push(Token::new(TokenKind::Literal, input, lit, input.len()));
    }

    tokens
}

/// Neutralize characters with special meaning in markup.
///
/// Replaces `&`, `<`, `>` and `"` with their entity forms. Apply to literal
/// text only after [`classify`] has run.
pub fn escape_for_display(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render classified tokens as highlighted markup.
///
/// Classified spans become `<span class="…">` elements; literal text is
/// escaped and emitted as-is.
pub fn to_markup(tokens: &[Token]) -> String {
    let mut markup = String::new();
    for token in tokens {
        let text = escape_for_display(&token.text);
        match token.kind.class_name() {
            Some(class) => {
                markup.push_str(&format!("<span class=\"{}\">{}</span>", class, text));
            }
            None => markup.push_str(&text),
        }
    }
    markup
}
