/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use crate::errors::AssemblyError;
use crate::token::{Token, TokenKind};
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

// Derive the lexer from our grammar file.
#[derive(Parser)]
#[grammar = "./grammar.pest"]
pub struct Zx16Lexer;

/// Tokenize an entire source file. The returned stream always ends with a
/// single `Eof` token. Character literals are rewritten to their decimal code
/// point and string payloads are unescaped, so downstream passes never look at
/// quote or escape syntax again.
pub fn tokenize(source: &str) -> Result<Vec<Token>, AssemblyError> {
    let pairs = Zx16Lexer::parse(Rule::program, source)?;
    let mut tokens = Vec::new();
    let mut last_pos = (1, 1);

    for pair in pairs.flatten() {
        let (line, column) = pair.as_span().start_pos().line_col();
        last_pos = pair.as_span().end_pos().line_col();
        match pair.as_rule() {
            Rule::newline => tokens.push(Token::new(TokenKind::Newline, "\n", line, column)),
            Rule::comma => tokens.push(Token::new(TokenKind::Comma, ",", line, column)),
            Rule::lparen => tokens.push(Token::new(TokenKind::LParen, "(", line, column)),
            Rule::rparen => tokens.push(Token::new(TokenKind::RParen, ")", line, column)),
            Rule::operator => {
                tokens.push(Token::new(TokenKind::Operator, pair.as_str(), line, column))
            }
            Rule::label => {
                let name = pair.as_str().trim_end_matches(':');
                tokens.push(Token::new(TokenKind::Label, name, line, column));
            }
            Rule::directive => {
                tokens.push(Token::new(TokenKind::Directive, pair.as_str(), line, column))
            }
            Rule::register => {
                let text = pair.as_str().to_ascii_lowercase();
                tokens.push(Token::new(TokenKind::Register, text, line, column));
            }
            Rule::immediate => {
                tokens.push(Token::new(TokenKind::Immediate, pair.as_str(), line, column))
            }
            Rule::identifier => {
                tokens.push(Token::new(TokenKind::Identifier, pair.as_str(), line, column))
            }
            Rule::character => {
                tokens.push(build_character(&pair, line, column));
            }
            Rule::string => {
                tokens.push(build_string(&pair, line, column));
            }
            _ => {}
        }
    }

    tokens.push(Token::eof(last_pos.0, last_pos.1));
    Ok(tokens)
}

// A character token carries its code point in decimal, per the token-stream
// contract: immediate parsing then treats it like any other numeric literal.
fn build_character(pair: &Pair<Rule>, line: usize, column: usize) -> Token {
    let inner = inner_text(pair);
    let value = unescape(inner).chars().next().map(u32::from).unwrap_or(0);
    Token::new(TokenKind::Character, value.to_string(), line, column)
}

fn build_string(pair: &Pair<Rule>, line: usize, column: usize) -> Token {
    Token::new(TokenKind::String, unescape(inner_text(pair)), line, column)
}

// The payload between the quotes, via the grammar's inner rule.
fn inner_text<'a>(pair: &Pair<'a, Rule>) -> &'a str {
    pair.clone()
        .into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ------------- unit tests -------------
