//! Tokenizer for structured RPSL attribute values.
//!
//! Every supported attribute shares one lexer; what differs per attribute is
//! its [`Grammar`]: the keywords that open a new entry, the key used for
//! values that appear before any keyword, and whether call-style options such
//! as `asno(AS2)` become entries of their own.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use log::debug;

use crate::rpsl::object::{AttributeType, RpslAttribute};

/// One `(keyword, values)` entry of a tokenized attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub key: String,
    pub values: Vec<String>,
}

impl Token {
    pub fn new(key: &str, values: Vec<String>) -> Self {
        Token {
            key: key.to_string(),
            values,
        }
    }

    pub fn is(&self, key: &str) -> bool {
        self.key == key
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},[{}])", self.key, self.values.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    pub keywords: &'static [&'static str],
    pub opening_key: Option<&'static str>,
    pub calls_are_entries: bool,
}

lazy_static! {
    static ref GRAMMARS: HashMap<AttributeType, Grammar> = {
        let mut grammars = HashMap::new();
        grammars.insert(
            AttributeType::Export,
            Grammar {
                keywords: &["protocol", "into", "to", "at", "action", "announce", "except", "refine", "afi"],
                opening_key: None,
                calls_are_entries: false,
            },
        );
        grammars.insert(
            AttributeType::Import,
            Grammar {
                keywords: &["protocol", "into", "from", "at", "action", "accept", "except", "refine", "afi"],
                opening_key: None,
                calls_are_entries: false,
            },
        );
        grammars.insert(
            AttributeType::Default,
            Grammar {
                keywords: &["to", "at", "action", "networks"],
                opening_key: None,
                calls_are_entries: false,
            },
        );
        grammars.insert(
            AttributeType::Ifaddr,
            Grammar {
                keywords: &["masklen", "action"],
                opening_key: Some("ifaddr"),
                calls_are_entries: false,
            },
        );
        grammars.insert(
            AttributeType::Peer,
            Grammar {
                keywords: &[],
                opening_key: Some("peer"),
                calls_are_entries: true,
            },
        );
        grammars
    };
}

pub fn grammar_for(attribute_type: &AttributeType) -> Option<&'static Grammar> {
    GRAMMARS.get(attribute_type)
}

/// Tokenize an attribute using the grammar registered for its type.
/// Attributes without a grammar produce no tokens.
pub fn tokenize_attribute(attr: &RpslAttribute) -> Vec<Token> {
    match grammar_for(&attr.attribute_type) {
        Some(grammar) => tokenize(grammar, &attr.value),
        None => {
            debug!("no grammar registered for {} attributes", attr.attribute_type);
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    Word(String),
    Call(String, Vec<String>),
}

pub fn tokenize(grammar: &Grammar, text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let mut current: Option<Token> = None;

    for lexeme in lex(text) {
        match lexeme {
            Lexeme::Word(word) => {
                let lower = word.to_ascii_lowercase();
                if grammar.keywords.contains(&lower.as_str()) {
                    tokens.extend(current.replace(Token::new(&lower, Vec::new())));
                    continue;
                }
                match current.as_mut() {
                    Some(token) => token.values.push(word),
                    None => match grammar.opening_key {
                        Some(key) => current = Some(Token::new(key, vec![word])),
                        None => debug!("dropping leading value {:?} with no keyword", word),
                    },
                }
            }
            Lexeme::Call(name, args) => {
                if grammar.calls_are_entries {
                    tokens.extend(current.replace(Token::new(&name.to_ascii_lowercase(), args)));
                } else {
                    let word = format!("{}({})", name, args.join(","));
                    match current.as_mut() {
                        Some(token) => token.values.push(word),
                        None => debug!("dropping leading value {:?} with no keyword", word),
                    }
                }
            }
        }
    }
    tokens.extend(current);

    tokens.retain(|token| !token.values.is_empty());
    tokens
}

fn lex(text: &str) -> Vec<Lexeme> {
    let chars: Vec<char> = text.chars().collect();
    let mut lexemes = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ',' | ';' => i += 1,
            c if c.is_whitespace() => i += 1,
            '=' => {
                lexemes.push(Lexeme::Word("=".to_string()));
                i += 1;
            }
            '.' if chars.get(i + 1) == Some(&'=') => {
                lexemes.push(Lexeme::Word(".=".to_string()));
                i += 2;
            }
            '{' => {
                let start = i;
                let mut depth = 0;
                while i < chars.len() {
                    match chars[i] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                i += 1;
                                break;
                            }
                        }
                        _ => {}
                    }
                    i += 1;
                }
                // A range operator may follow the closing brace.
                while i < chars.len() && is_word_char(chars[i]) {
                    i += 1;
                }
                lexemes.push(Lexeme::Word(chars[start..i].iter().collect()));
            }
            _ => {
                let start = i;
                while i < chars.len() && is_word_char(chars[i]) && !is_assignment(&chars, i) {
                    i += 1;
                }
                if i == start {
                    // Stray punctuation such as an unmatched ')'.
                    i += 1;
                    continue;
                }
                let word: String = chars[start..i].iter().collect();

                if chars.get(i) == Some(&'(') {
                    let close = chars[i..].iter().position(|&c| c == ')').map(|p| i + p);
                    let end = close.unwrap_or(chars.len());
                    let inner: String = chars[i + 1..end].iter().collect();
                    let args = inner
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|a| !a.is_empty())
                        .map(str::to_string)
                        .collect();
                    lexemes.push(Lexeme::Call(word, args));
                    i = (end + 1).min(chars.len());
                } else {
                    lexemes.push(Lexeme::Word(word));
                }
            }
        }
    }

    lexemes
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ',' | ';' | '#' | '(' | ')' | '{' | '}' | '=')
}

fn is_assignment(chars: &[char], i: usize) -> bool {
    chars[i] == '.' && chars.get(i + 1) == Some(&'=')
}
