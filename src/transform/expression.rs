//! Single-pass `{column}` expression resolver with caching
//!
//! - Tokenizes an expression once and caches the result
//! - Uses Arc for zero-copy sharing of tokenized expressions
//! - An unterminated `{` or an empty `{}` stays literal text

use std::ops::Range;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::row::Row;

/// Token representing a parsed expression fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal text (stores range in original string)
    Literal(Range<usize>),
    /// Column reference: {column}
    Column(String),
}

/// Expression tokenizer with caching
pub struct ExpressionCache {
    cache: DashMap<String, Arc<Vec<Token>>>,
}

impl Default for ExpressionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionCache {
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Parse expression into tokens (with caching)
    pub fn tokenize(&self, expression: &str) -> Arc<Vec<Token>> {
        if let Some(cached) = self.cache.get(expression) {
            return Arc::clone(&cached);
        }

        let mut tokens = Vec::new();
        let mut literal_start = 0;
        let mut search_from = 0;

        while let Some(open) = expression[search_from..].find('{').map(|i| i + search_from) {
            let Some(close) = expression[open + 1..].find('}').map(|i| i + open + 1) else {
                break;
            };
            let name = &expression[open + 1..close];
            if name.is_empty() || name.contains('{') {
                // `{}` or `{{` never names a column
                search_from = open + 1;
                continue;
            }
            if open > literal_start {
                tokens.push(Token::Literal(literal_start..open));
            }
            tokens.push(Token::Column(name.to_string()));
            literal_start = close + 1;
            search_from = close + 1;
        }

        if literal_start < expression.len() {
            tokens.push(Token::Literal(literal_start..expression.len()));
        }

        let tokens = Arc::new(tokens);
        self.cache.insert(expression.to_string(), Arc::clone(&tokens));
        tokens
    }

    /// Substitute every `{column}` with the row's string value
    ///
    /// Null values and columns missing from the row render as empty text.
    pub fn resolve(&self, expression: &str, row: &Row) -> String {
        let tokens = self.tokenize(expression);
        let mut result = String::with_capacity(expression.len() * 2);

        for token in tokens.iter() {
            match token {
                Token::Literal(range) => result.push_str(&expression[range.clone()]),
                Token::Column(name) => {
                    if let Some(value) = row.get_by_name(name).and_then(|v| v.as_string()) {
                        result.push_str(&value);
                    }
                }
            }
        }

        result
    }
}

/// Global expression cache instance
pub static EXPRESSIONS: Lazy<ExpressionCache> = Lazy::new(ExpressionCache::new);

/// Column names referenced by an expression, in order of appearance
pub fn extract_columns(expression: &str) -> Vec<String> {
    EXPRESSIONS
        .tokenize(expression)
        .iter()
        .filter_map(|token| match token {
            Token::Column(name) => Some(name.clone()),
            Token::Literal(_) => None,
        })
        .collect()
}
