//! Parser implementation using pest
//!
//! Converts expanded Cherri source into statements and a flat token stream.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use super::ast::{MenuItem, Program, Statement, Token, TokenKind, Value};

#[derive(Parser)]
#[grammar = "backend/grammar.pest"]
pub struct CherriParser;

/// Parse expanded source into a [`Program`] and the tokens it was built from.
///
/// # Errors
///
/// Returns the raw pest error when the input violates the grammar.
pub fn parse_program(input: &str) -> Result<(Program, Vec<Token>), Box<pest::error::Error<Rule>>> {
    let pairs = CherriParser::parse(Rule::program, input)?;

    let tokens = pairs.clone().flatten().filter_map(token).collect();

    let mut statements = Vec::new();
    for pair in pairs {
        if pair.as_rule() == Rule::program {
            statements.extend(pair.into_inner().filter_map(parse_statement));
        }
    }

    Ok((Program { statements }, tokens))
}

fn token(pair: Pair<'_, Rule>) -> Option<Token> {
    let kind = match pair.as_rule() {
        Rule::identifier => TokenKind::Identifier,
        Rule::variable => TokenKind::Variable,
        Rule::string => TokenKind::String,
        Rule::number => TokenKind::Number,
        Rule::define_value => TokenKind::DefineValue,
        _ => return None,
    };
    Some(Token {
        kind,
        text: pair.as_str().trim_end().to_string(),
        line: line_of(&pair),
    })
}

fn line_of(pair: &Pair<'_, Rule>) -> usize {
    pair.as_span().start_pos().line_col().0
}

fn parse_statement(pair: Pair<'_, Rule>) -> Option<Statement> {
    let line = line_of(&pair);
    match pair.as_rule() {
        Rule::define => {
            let mut inner = pair.into_inner();
            let key = inner.next()?.as_str().to_string();
            let value = inner.next()?.as_str().trim().to_string();
            Some(Statement::Define { key, value, line })
        }
        Rule::assignment => {
            let mut inner = pair.into_inner();
            let name = variable_name(inner.next()?.as_str());
            let value = parse_value(inner.next()?)?;
            Some(Statement::Assignment { name, value, line })
        }
        Rule::call => {
            let mut inner = pair.into_inner();
            let action = inner.next()?.as_str().to_string();
            let args = match inner.next() {
                Some(arguments) => arguments.into_inner().filter_map(parse_value).collect(),
                None => Vec::new(),
            };
            Some(Statement::Call { action, args, line })
        }
        Rule::menu => {
            let mut inner = pair.into_inner();
            let prompt = parse_value(inner.next()?)?;
            let items = inner.filter_map(parse_menu_item).collect();
            Some(Statement::Menu {
                prompt,
                items,
                line,
            })
        }
        _ => None,
    }
}

fn parse_menu_item(pair: Pair<'_, Rule>) -> Option<MenuItem> {
    let line = line_of(&pair);
    let mut inner = pair.into_inner();
    let label = parse_value(inner.next()?)?;
    let body = inner.filter_map(parse_statement).collect();
    Some(MenuItem { label, body, line })
}

fn parse_value(pair: Pair<'_, Rule>) -> Option<Value> {
    match pair.as_rule() {
        Rule::string => {
            let raw = pair.into_inner().next().map_or("", |p| p.as_str());
            Some(Value::Text(unescape(raw)))
        }
        Rule::number => Some(Value::Number(pair.as_str().to_string())),
        Rule::variable => Some(Value::Variable(variable_name(pair.as_str()))),
        _ => None,
    }
}

fn variable_name(raw: &str) -> String {
    raw.trim_start_matches('@').to_string()
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
