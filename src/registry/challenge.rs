//! `WWW-Authenticate` challenge parsing
//!
//! Registries answer an unauthenticated `GET /v2/` with one or more
//! challenges such as
//! `Bearer realm="https://auth.example.com/token",service="registry.example.com"`.
//! A single header value may carry several comma-separated challenges, and
//! quoted parameter values may themselves contain commas.

use reqwest::header::{HeaderMap, WWW_AUTHENTICATE};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer,
    Other(String),
}

impl AuthScheme {
    fn from_token(token: &str) -> Self {
        match token.to_ascii_lowercase().as_str() {
            "basic" => AuthScheme::Basic,
            "bearer" => AuthScheme::Bearer,
            _ => AuthScheme::Other(token.to_string()),
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, AuthScheme::Other(_))
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Basic => write!(f, "Basic"),
            AuthScheme::Bearer => write!(f, "Bearer"),
            AuthScheme::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One parsed authentication challenge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub scheme: AuthScheme,
    /// Parameter names are lowercased
    pub parameters: HashMap<String, String>,
}

impl AuthChallenge {
    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }

    pub fn service(&self) -> Option<&str> {
        self.param("service")
    }

    pub fn scope(&self) -> Option<&str> {
        self.param("scope")
    }

    fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }
}

/// Parse every `WWW-Authenticate` header in `headers`
pub fn challenges_from_headers(headers: &HeaderMap) -> Vec<AuthChallenge> {
    headers
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(parse_challenges)
        .collect()
}

/// Parse a single header value into its challenges
pub fn parse_challenges(header: &str) -> Vec<AuthChallenge> {
    let mut parser = Parser::new(header);
    let mut challenges = Vec::new();

    loop {
        parser.skip_separators();
        let Some(scheme) = parser.token() else {
            break;
        };

        let mut challenge = AuthChallenge {
            scheme: AuthScheme::from_token(scheme),
            parameters: HashMap::new(),
        };

        loop {
            parser.skip_separators();
            let checkpoint = parser.pos;
            let Some(key) = parser.token() else {
                break;
            };
            parser.skip_whitespace();
            if !parser.eat('=') {
                // Not a parameter: this token starts the next challenge.
                parser.pos = checkpoint;
                break;
            }
            parser.skip_whitespace();
            let value = parser.value();
            challenge
                .parameters
                .insert(key.to_ascii_lowercase(), value);
        }

        challenges.push(challenge);
    }

    challenges
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace() || c == ',') {
            self.bump();
        }
    }

    fn token(&mut self) -> Option<&'a str> {
        let input = self.input;
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_token_char(c)) {
            self.bump();
        }
        let end = self.pos;
        (end > start).then(|| &input[start..end])
    }

    fn value(&mut self) -> String {
        if !self.eat('"') {
            return self.token().unwrap_or_default().to_string();
        }

        let mut value = String::new();
        while let Some(c) = self.bump() {
            match c {
                '"' => break,
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                c => value.push(c),
            }
        }
        value
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~/:".contains(c)
}
