//! Tokenizer and recursive-descent parser for rule expressions.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr  := or
//! or    := and ("or" and)*
//! and   := unary ("and" unary)*
//! unary := "not" unary | atom
//! atom  := "(" expr ")" | "@" | "!" | "role:" IDENT | "rule:" IDENT
//! ```
//!
//! The parser produces an [`Ast`] whose rule references are still names;
//! [`crate::Policy`] resolves them to indices once every rule is known.

use crate::Role;

/// Parenthesis/`not` nesting beyond this is rejected instead of recursing further.
const MAX_NESTING: usize = 64;

/// Parsed expression with unresolved rule references.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Ast {
    AllowAll,
    DenyAll,
    Role(Role),
    Rule(String),
    Not(Box<Ast>),
    And(Vec<Ast>),
    Or(Vec<Ast>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Not,
    Allow,
    Deny,
    Role(String),
    Rule(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::And => "'and'".to_string(),
            Token::Or => "'or'".to_string(),
            Token::Not => "'not'".to_string(),
            Token::Allow => "'@'".to_string(),
            Token::Deny => "'!'".to_string(),
            Token::Role(name) => format!("'role:{}'", name),
            Token::Rule(name) => format!("'rule:{}'", name),
        }
    }
}

/// Parse a single rule expression. An empty (or all-whitespace) expression
/// allows everyone, matching the convention of policy files.
pub(crate) fn parse(input: &str) -> Result<Ast, ParseError> {
    if input.trim().is_empty() {
        return Ok(Ast::AllowAll);
    }

    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        end: input.len(),
        depth: 0,
    };
    let ast = parser.parse_or()?;
    if let Some((offset, token)) = parser.peek() {
        return Err(ParseError::new(
            *offset,
            format!("unexpected {} after complete expression", token.describe()),
        ));
    }
    Ok(ast)
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' || c == ')' {
            chars.next();
            let token = if c == '(' {
                Token::LParen
            } else {
                Token::RParen
            };
            tokens.push((start, token));
            continue;
        }

        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_whitespace() || c == '(' || c == ')' {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }
        tokens.push((start, classify_word(&input[start..end], start)?));
    }

    Ok(tokens)
}

fn classify_word(word: &str, position: usize) -> Result<Token, ParseError> {
    if word.eq_ignore_ascii_case("and") {
        return Ok(Token::And);
    }
    if word.eq_ignore_ascii_case("or") {
        return Ok(Token::Or);
    }
    if word.eq_ignore_ascii_case("not") {
        return Ok(Token::Not);
    }
    match word {
        "@" => return Ok(Token::Allow),
        "!" => return Ok(Token::Deny),
        _ => {}
    }

    match word.split_once(':') {
        Some((kind, "")) => Err(ParseError::new(
            position,
            format!("missing value after '{}:'", kind),
        )),
        Some(("role", name)) => Ok(Token::Role(name.to_string())),
        Some(("rule", name)) => Ok(Token::Rule(name.to_string())),
        Some((kind, _)) => Err(ParseError::new(
            position,
            format!("unsupported check kind '{}'", kind),
        )),
        None => Err(ParseError::new(
            position,
            format!("unexpected token '{}'", word),
        )),
    }
}

struct Parser<'t> {
    tokens: &'t [(usize, Token)],
    pos: usize,
    end: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&(usize, Token)> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&(usize, Token)> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        match self.peek() {
            Some((_, token)) if token == expected => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> Result<Ast, ParseError> {
        let mut terms = vec![self.parse_and()?];
        while self.eat(&Token::Or) {
            terms.push(self.parse_and()?);
        }
        Ok(collapse(terms, Ast::Or))
    }

    fn parse_and(&mut self) -> Result<Ast, ParseError> {
        let mut terms = vec![self.parse_unary()?];
        while self.eat(&Token::And) {
            terms.push(self.parse_unary()?);
        }
        Ok(collapse(terms, Ast::And))
    }

    fn parse_unary(&mut self) -> Result<Ast, ParseError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            let offset = self.peek().map(|(o, _)| *o).unwrap_or(self.end);
            return Err(ParseError::new(offset, "expression nested too deeply"));
        }

        let ast = if self.eat(&Token::Not) {
            Ast::Not(Box::new(self.parse_unary()?))
        } else {
            self.parse_atom()?
        };

        self.depth -= 1;
        Ok(ast)
    }

    fn parse_atom(&mut self) -> Result<Ast, ParseError> {
        let end = self.end;
        let (offset, token) = match self.next() {
            Some((offset, token)) => (*offset, token.clone()),
            None => return Err(ParseError::new(end, "unexpected end of expression")),
        };

        match token {
            Token::LParen => {
                let inner = self.parse_or()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    let at = self.peek().map(|(o, _)| *o).unwrap_or(end);
                    Err(ParseError::new(
                        at,
                        format!("expected ')' to close '(' at offset {}", offset),
                    ))
                }
            }
            Token::Allow => Ok(Ast::AllowAll),
            Token::Deny => Ok(Ast::DenyAll),
            Token::Role(name) => Ok(Ast::Role(Role::new(name))),
            Token::Rule(name) => Ok(Ast::Rule(name)),
            other => Err(ParseError::new(
                offset,
                format!("expected a check, found {}", other.describe()),
            )),
        }
    }
}

fn collapse(mut terms: Vec<Ast>, combine: fn(Vec<Ast>) -> Ast) -> Ast {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        combine(terms)
    }
}
