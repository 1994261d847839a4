/// Stochastic template tokenizer: splits text into literal and macro segments.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::expr::ExprError;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unterminated macro opened at byte {offset}")]
    UnterminatedMacro { offset: usize },
    #[error("failed to evaluate macro '{expression}': {cause}")]
    Evaluation {
        expression: String,
        #[source]
        cause: ExprError,
    },
}

/// A segment of a tokenized template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateToken {
    /// Literal text, emitted as-is.
    Literal(String),
    /// Expression text of a `!{ ... }` macro, without the delimiters.
    Macro(String),
}

/// A tokenized template: an ordered sequence of tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub tokens: Vec<TemplateToken>,
}

impl Template {
    /// Tokenize a template string.
    ///
    /// Syntax:
    /// - `!{expr}` → `Macro("expr")`; braces inside `expr` nest, so
    ///   `!{choice({1: 2})}` is a single macro
    /// - Everything else → `Literal`
    ///
    /// Empty literal segments are never emitted.
    pub fn parse(input: &str) -> Result<Template, TemplateError> {
        let mut tokens = Vec::new();
        let mut literal_buf = String::new();
        let mut chars = input.char_indices().peekable();

        while let Some((offset, c)) = chars.next() {
            let opens_macro = c == '!' && matches!(chars.peek(), Some((_, '{')));
            if !opens_macro {
                literal_buf.push(c);
                continue;
            }
            chars.next();

            if !literal_buf.is_empty() {
                tokens.push(TemplateToken::Literal(std::mem::take(&mut literal_buf)));
            }

            let mut expression = String::new();
            let mut depth = 1usize;
            loop {
                let Some((_, c)) = chars.next() else {
                    return Err(TemplateError::UnterminatedMacro { offset });
                };
                match c {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                expression.push(c);
            }
            tokens.push(TemplateToken::Macro(expression));
        }

        if !literal_buf.is_empty() {
            tokens.push(TemplateToken::Literal(literal_buf));
        }

        Ok(Template { tokens })
    }

    /// Returns true if the template contains at least one macro.
    pub fn has_macros(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| matches!(t, TemplateToken::Macro(_)))
    }
}

/// Tokenize `input` into an ordered token sequence.
pub fn tokenize(input: &str) -> Result<Vec<TemplateToken>, TemplateError> {
    Template::parse(input).map(|t| t.tokens)
}
