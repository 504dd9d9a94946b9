//! Tokenizer and recursive-descent parser.
//!
//! Grammar:
//!
//! ```text
//! template    := node*
//! node        := text | placeholder | for | foreach | if
//! placeholder := "{{" ws expr ws "}}"
//! for         := "@for(" ident "in" "range(" int "," int ")" ")" template "@endfor"
//! foreach     := "@foreach(" ident "in" path ")" template "@endforeach"
//! if          := "@if(" condition ")" template ("@else" template)? "@endif"
//! ```
//!
//! Closing keywords that do not terminate an open block are literal text.

use mci_primitives::Namespace;

use crate::condition::Condition;
use crate::error::{TemplateError, TemplateResult};
use crate::resolve::Placeholder;

/// Which constructs the tokenizer recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Placeholders only.
    Basic,
    /// Placeholders and block directives.
    Advanced,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node<'t> {
    Text(&'t str),
    Placeholder(Placeholder<'t>),
    For {
        var: &'t str,
        start: i64,
        end: i64,
        body: Vec<Node<'t>>,
    },
    Foreach {
        var: &'t str,
        path: &'t str,
        body: Vec<Node<'t>>,
    },
    If {
        condition: Condition<'t>,
        then_branch: Vec<Node<'t>>,
        else_branch: Vec<Node<'t>>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token<'t> {
    Text(&'t str),
    Placeholder(&'t str),
    For {
        var: &'t str,
        start: i64,
        end: i64,
    },
    Foreach {
        var: &'t str,
        path: &'t str,
    },
    If(&'t str),
    Else(&'t str),
    EndFor(&'t str),
    EndForeach(&'t str),
    EndIf(&'t str),
}

/// Parses a template into a node tree.
pub(crate) fn parse(source: &str, mode: Mode) -> TemplateResult<Vec<Node<'_>>> {
    let tokens = tokenize(source, mode)?;
    let mut parser = Parser {
        tokens: tokens.into_iter(),
    };
    let (nodes, _) = parser.block(Until::Eof)?;
    Ok(nodes)
}

fn tokenize(source: &str, mode: Mode) -> TemplateResult<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < source.len() {
        let rest = &source[pos..];

        if rest.starts_with("{{") {
            let Some(close) = rest[2..].find("}}") else {
                // Unclosed braces are literal text.
                pos += 2;
                continue;
            };
            flush_text(&mut tokens, &source[text_start..pos]);
            tokens.push(Token::Placeholder(&rest[2..2 + close]));
            pos += close + 4;
            text_start = pos;
            continue;
        }

        if mode == Mode::Advanced && rest.starts_with('@') {
            if let Some((token, consumed)) = directive(rest)? {
                flush_text(&mut tokens, &source[text_start..pos]);
                tokens.push(token);
                pos += consumed;
                text_start = pos;
                continue;
            }
        }

        pos += rest.chars().next().map_or(1, char::len_utf8);
    }

    flush_text(&mut tokens, &source[text_start..]);
    Ok(tokens)
}

fn flush_text<'t>(tokens: &mut Vec<Token<'t>>, text: &'t str) {
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
}

/// Recognises a directive at the start of `rest`.
fn directive(rest: &str) -> TemplateResult<Option<(Token<'_>, usize)>> {
    // `@foreach(` must be tried before `@for(`; `@endforeach` before `@endfor`.
    if let Some(header) = opener(rest, "@foreach")? {
        let (var, path) = foreach_header(header)?;
        return Ok(Some((Token::Foreach { var, path }, "@foreach(".len() + header.len() + 1)));
    }
    if let Some(header) = opener(rest, "@for")? {
        let (var, start, end) = for_header(header)?;
        return Ok(Some((Token::For { var, start, end }, "@for(".len() + header.len() + 1)));
    }
    if let Some(header) = opener(rest, "@if")? {
        return Ok(Some((Token::If(header), "@if(".len() + header.len() + 1)));
    }

    if let Some(len) = closer(rest, "@endforeach") {
        return Ok(Some((Token::EndForeach(&rest[..len]), len)));
    }
    if let Some(len) = closer(rest, "@endfor") {
        return Ok(Some((Token::EndFor(&rest[..len]), len)));
    }
    if let Some(len) = closer(rest, "@endif") {
        return Ok(Some((Token::EndIf(&rest[..len]), len)));
    }
    if let Some(len) = closer(rest, "@else") {
        // Horizontal whitespace directly after `@else` belongs to the keyword.
        let padding = rest[len..]
            .bytes()
            .take_while(|byte| matches!(byte, b' ' | b'\t'))
            .count();
        return Ok(Some((Token::Else(&rest[..len + padding]), len + padding)));
    }

    Ok(None)
}

/// Returns the header between the parentheses of `keyword(...)`.
fn opener<'t>(rest: &'t str, keyword: &str) -> TemplateResult<Option<&'t str>> {
    let Some(after) = rest.strip_prefix(keyword) else {
        return Ok(None);
    };
    if !after.starts_with('(') {
        return Ok(None);
    }
    let close = matching_paren(after)
        .ok_or_else(|| TemplateError::syntax(format!("unterminated {keyword}( header")))?;
    Ok(Some(&after[1..close]))
}

/// Returns the keyword length when `rest` starts with a standalone keyword.
fn closer(rest: &str, keyword: &str) -> Option<usize> {
    let after = rest.strip_prefix(keyword)?;
    let continues_word = after
        .chars()
        .next()
        .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    (!continues_word).then_some(keyword.len())
}

/// Index of the parenthesis closing the one at index 0, ignoring quoted text.
fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0_usize;
    let mut quote = None;
    for (idx, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(open), _) if ch == open => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

fn for_header(header: &str) -> TemplateResult<(&str, i64, i64)> {
    let malformed = || {
        TemplateError::syntax(format!(
            "malformed @for header '{header}': expected `name in range(start, end)`"
        ))
    };

    let mut cursor = Cursor::new(header);
    let var = cursor.ident().ok_or_else(malformed)?;
    cursor.keyword("in").then_some(()).ok_or_else(malformed)?;
    cursor.punct("range").then_some(()).ok_or_else(malformed)?;
    cursor.punct("(").then_some(()).ok_or_else(malformed)?;
    let start = cursor.integer().ok_or_else(malformed)?;
    cursor.punct(",").then_some(()).ok_or_else(malformed)?;
    let end = cursor.integer().ok_or_else(malformed)?;
    cursor.punct(")").then_some(()).ok_or_else(malformed)?;
    if !cursor.at_end() {
        return Err(malformed());
    }

    check_loop_variable(var)?;
    Ok((var, start, end))
}

fn foreach_header(header: &str) -> TemplateResult<(&str, &str)> {
    let malformed = || {
        TemplateError::syntax(format!(
            "malformed @foreach header '{header}': expected `name in namespace.path`"
        ))
    };

    let mut cursor = Cursor::new(header);
    let var = cursor.ident().ok_or_else(malformed)?;
    cursor.keyword("in").then_some(()).ok_or_else(malformed)?;
    let path = cursor.remainder().trim();
    if path.is_empty() || path.contains(char::is_whitespace) {
        return Err(malformed());
    }

    check_loop_variable(var)?;
    Ok((var, path))
}

fn check_loop_variable(var: &str) -> TemplateResult<()> {
    if Namespace::from_segment(var).is_some() {
        return Err(TemplateError::syntax(format!(
            "loop variable '{var}' would shadow a namespace"
        )));
    }
    Ok(())
}

/// Minimal scanner over a directive header.
struct Cursor<'t> {
    text: &'t str,
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(text: &'t str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'t str {
        &self.text[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn ident(&mut self) -> Option<&'t str> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(idx, ch)| {
                !(ch.is_ascii_alphabetic() || *ch == '_' || (*idx > 0 && ch.is_ascii_digit()))
            })
            .map_or(rest.len(), |(idx, _)| idx);
        if len == 0 {
            return None;
        }
        self.pos += len;
        Some(&rest[..len])
    }

    /// Consumes a word that must be followed by whitespace.
    fn keyword(&mut self, word: &str) -> bool {
        self.skip_whitespace();
        let rest = self.rest();
        match rest.strip_prefix(word) {
            Some(after) if after.starts_with(char::is_whitespace) => {
                self.pos += word.len();
                true
            }
            _ => false,
        }
    }

    fn punct(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn integer(&mut self) -> Option<i64> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(idx, ch)| !(ch.is_ascii_digit() || (*idx == 0 && (*ch == '-' || *ch == '+'))))
            .map_or(rest.len(), |(idx, _)| idx);
        let value = rest[..len].parse().ok()?;
        self.pos += len;
        Some(value)
    }

    fn remainder(&mut self) -> &'t str {
        let rest = self.rest();
        self.pos = self.text.len();
        rest
    }

    fn at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos == self.text.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Until {
    Eof,
    EndFor,
    EndForeach,
    IfBranch,
    ElseBranch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Eof,
    Else,
    EndFor,
    EndForeach,
    EndIf,
}

struct Parser<'t> {
    tokens: std::vec::IntoIter<Token<'t>>,
}

impl<'t> Parser<'t> {
    fn block(&mut self, until: Until) -> TemplateResult<(Vec<Node<'t>>, Stop)> {
        let mut nodes = Vec::new();

        while let Some(token) = self.tokens.next() {
            match token {
                Token::Text(text) => nodes.push(Node::Text(text)),
                Token::Placeholder(inner) => {
                    nodes.push(Node::Placeholder(Placeholder::parse(inner)?));
                }
                Token::For { var, start, end } => {
                    let body = self.closed(Until::EndFor, "@for")?;
                    nodes.push(Node::For {
                        var,
                        start,
                        end,
                        body,
                    });
                }
                Token::Foreach { var, path } => {
                    let body = self.closed(Until::EndForeach, "@foreach")?;
                    nodes.push(Node::Foreach { var, path, body });
                }
                Token::If(source) => {
                    let condition = Condition::parse(source)?;
                    let (then_branch, stop) = self.block(Until::IfBranch)?;
                    let else_branch = match stop {
                        Stop::EndIf => Vec::new(),
                        Stop::Else => self.closed(Until::ElseBranch, "@if")?,
                        _ => return Err(TemplateError::syntax("unterminated @if block")),
                    };
                    nodes.push(Node::If {
                        condition,
                        then_branch,
                        else_branch,
                    });
                }
                Token::Else(source) => {
                    if until == Until::IfBranch {
                        return Ok((nodes, Stop::Else));
                    }
                    nodes.push(Node::Text(source));
                }
                Token::EndFor(source) => {
                    if until == Until::EndFor {
                        return Ok((nodes, Stop::EndFor));
                    }
                    nodes.push(Node::Text(source));
                }
                Token::EndForeach(source) => {
                    if until == Until::EndForeach {
                        return Ok((nodes, Stop::EndForeach));
                    }
                    nodes.push(Node::Text(source));
                }
                Token::EndIf(source) => {
                    if matches!(until, Until::IfBranch | Until::ElseBranch) {
                        return Ok((nodes, Stop::EndIf));
                    }
                    nodes.push(Node::Text(source));
                }
            }
        }

        Ok((nodes, Stop::Eof))
    }

    fn closed(&mut self, until: Until, name: &str) -> TemplateResult<Vec<Node<'t>>> {
        let (body, stop) = self.block(until)?;
        if stop == Stop::Eof {
            return Err(TemplateError::syntax(format!("unterminated {name} block")));
        }
        Ok(body)
    }
}
