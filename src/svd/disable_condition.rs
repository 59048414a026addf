//! `disableCondition` lexer/parser/linker.
//!
//! `<disableCondition>` holds a small C-like boolean expression over other
//! peripheral fields (e.g. `DEVICE_SUPPORTS_FPU && !LOW_POWER_MODE`) that
//! gates header generation for the owning register/cluster/field. Per the
//! design notes this is re-emitted verbatim into the generated header
//! rather than evaluated at load time, so this module only lexes, parses,
//! and links identifiers to their peripheral-scoped targets — it never
//! computes a boolean result.

use crate::svd::model::{Device, NodeId};
use crate::util::DiagnosticContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Number(i64),
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

/// Stage 1: turn the raw expression text into a flat token list.
pub fn lex(text: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ne);
                    i += 2;
                } else {
                    tokens.push(Token::Not);
                    i += 1;
                }
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Le);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Ge);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
                    i64::from_str_radix(hex, 16).map_err(|_| format!("invalid numeric literal '{text}'"))?
                } else {
                    text.parse().map_err(|_| format!("invalid numeric literal '{text}'"))?
                };
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(tokens)
}

/// Stage 2: validate token structure (balanced parens). The result is still
/// the flat token list — there's no tree to build since the list is
/// re-emitted as-is rather than evaluated.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Token>, String> {
    let mut depth = 0i32;
    for token in &tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth < 0 {
                    return Err("unbalanced ')'".to_string());
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '('".to_string());
    }
    Ok(tokens)
}

/// A token with identifiers resolved against the owning node's enclosing
/// peripheral scope (`Device::resolve_path`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedToken {
    Ident { name: String, target: Option<NodeId> },
    Number(i64),
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

/// Stage 3 (post-parse linking): resolve every `Ident` token against
/// `scope`. An identifier that fails to resolve keeps `target: None` rather
/// than erroring — some names referenced here come from the toolchain
/// environment, not the device description.
fn link(device: &Device, scope: NodeId, tokens: Vec<Token>) -> Vec<LinkedToken> {
    tokens
        .into_iter()
        .map(|token| match token {
            Token::Ident(name) => {
                let target = device.resolve_path(scope, &name);
                LinkedToken::Ident { name, target }
            }
            Token::Number(n) => LinkedToken::Number(n),
            Token::And => LinkedToken::And,
            Token::Or => LinkedToken::Or,
            Token::Not => LinkedToken::Not,
            Token::Eq => LinkedToken::Eq,
            Token::Ne => LinkedToken::Ne,
            Token::Lt => LinkedToken::Lt,
            Token::Le => LinkedToken::Le,
            Token::Gt => LinkedToken::Gt,
            Token::Ge => LinkedToken::Ge,
            Token::LParen => LinkedToken::LParen,
            Token::RParen => LinkedToken::RParen,
        })
        .collect()
}

/// Run lex+parse+link over every node carrying a `disableCondition`,
/// storing the linked token list back onto the node. Scope for linking is
/// the node's parent (registers/clusters/fields all resolve names relative
/// to their enclosing peripheral or cluster).
pub fn link_all(device: &mut Device, diagnostics: &mut DiagnosticContext) {
    let ids: Vec<NodeId> = (0..device.nodes.len() as u32).map(NodeId).collect();
    for id in ids {
        let Some(text) = device.get(id).disable_condition.clone() else {
            continue;
        };
        let scope = device.get(id).parent;
        let location = device.get(id).location.clone();
        match lex(&text).and_then(parse) {
            Ok(tokens) => {
                let linked = link(device, scope, tokens);
                device.get_mut(id).disable_condition_tokens = Some(linked);
            }
            Err(detail) => {
                diagnostics.error(
                    "M290",
                    &[("name", &device.get(id).name), ("detail", &detail)],
                    location,
                );
            }
        }
    }
}
