// ABOUTME: Reader module turning source text into values using nom combinators

use nom::{
    branch::alt,
    bytes::complete::take_while,
    character::complete::{char, one_of},
    combinator::recognize,
    IResult, Parser,
};

use crate::error::ScmError;
use crate::value::{SourceInfo, Value};
use std::sync::Arc;

/// Per-read state: the file name and the full input, kept so list forms can
/// be wrapped with their line/column for diagnostics.
struct Ctx<'a> {
    file: Arc<str>,
    full: &'a str,
}

impl Ctx<'_> {
    /// Line/column (1-based) of the position `rest_len` bytes before the end
    fn locate(&self, rest_len: usize) -> (u32, u32) {
        let offset = self.full.len() - rest_len;
        let consumed = &self.full.as_bytes()[..offset];
        let line = consumed.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let column = match consumed.iter().rposition(|&b| b == b'\n') {
            Some(p) => (offset - p) as u32,
            None => offset as u32 + 1,
        };
        (line, column)
    }
}

/// Skip whitespace and `;` line comments
fn ws(input: &str) -> IResult<&str, ()> {
    let mut rest = input;
    loop {
        let trimmed = rest.trim_start();
        match trimmed.strip_prefix(';') {
            Some(after) => {
                rest = match after.find('\n') {
                    Some(p) => &after[p + 1..],
                    None => "",
                };
            }
            None => return Ok((trimmed, ())),
        }
    }
}

/// A `-` or digit enters number mode, which then consumes digits and dots.
/// The text either parses as a finite double, is the bare symbol `-`, or
/// degrades to the symbol NaN.
fn parse_number(input: &str) -> IResult<&str, Value> {
    let (rest, text) = recognize((
        alt((recognize(char('-')), recognize(one_of("0123456789")))),
        take_while(|c: char| c.is_ascii_digit() || c == '.'),
    ))
    .parse(input)?;

    let value = match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Value::Number(n),
        _ if text == "-" => Value::symbol("-"),
        _ => Value::symbol("NaN"),
    };
    Ok((rest, value))
}

/// Double-quoted string with the escape set `\" \\ \n \r \t`.
/// An unknown escape keeps both characters.
fn parse_string(input: &str) -> IResult<&str, Value> {
    let (body, _) = char('"')(input)?;
    let mut out = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((&body[i + 1..], Value::string(out))),
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 'r')) => out.push('\r'),
                Some((_, 't')) => out.push('\t'),
                Some((_, '"')) => out.push('"'),
                Some((_, '\\')) => out.push('\\'),
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => break,
            },
            c => out.push(c),
        }
    }
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Symbols are runs of anything that is not whitespace or a parenthesis
fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let (rest, text) =
        nom::bytes::complete::take_while1(|c: char| !c.is_whitespace() && c != '(' && c != ')')(
            input,
        )?;
    Ok((rest, Value::symbol(text)))
}

/// List starting at `(`; when `quoted`, a `list` head is prepended so the
/// literal evaluates to its contents.
fn parse_list<'a>(ctx: &Ctx<'_>, input: &'a str, quoted: bool) -> IResult<&'a str, Value> {
    let (line, column) = ctx.locate(input.len());
    let (mut rest, _) = char('(')(input)?;
    let mut items = if quoted {
        vec![Value::symbol("list")]
    } else {
        Vec::new()
    };
    loop {
        let (after_ws, _) = ws(rest)?;
        if after_ws.is_empty() {
            // unbalanced parens
            return Err(nom::Err::Failure(nom::error::Error::new(
                after_ws,
                nom::error::ErrorKind::Char,
            )));
        }
        if let Some(after) = after_ws.strip_prefix(')') {
            let wrapped = Value::Sourced(Arc::new(SourceInfo {
                value: Value::List(items),
                file: ctx.file.clone(),
                line,
                column,
            }));
            return Ok((after, wrapped));
        }
        let (after, item) = parse_expr(ctx, after_ws)?;
        items.push(item);
        rest = after;
    }
}

fn parse_expr<'a>(ctx: &Ctx<'_>, input: &'a str) -> IResult<&'a str, Value> {
    let (input, _) = ws(input)?;

    if let Some(after_tick) = input.strip_prefix('\'') {
        // A tick is its own token only when a delimiter follows; it quotes
        // an immediately following list, and is the symbol ' elsewhere.
        // A tick glued to other symbol characters lexes as one symbol.
        let delimited = after_tick
            .chars()
            .next()
            .map(|c| c.is_whitespace() || c == '(' || c == ')')
            .unwrap_or(true);
        if delimited {
            let (after_ws, _) = ws(after_tick)?;
            if after_ws.starts_with('(') {
                return parse_list(ctx, after_ws, true);
            }
            return Ok((after_tick, Value::symbol("'")));
        }
        return parse_symbol(input);
    }

    if input.starts_with('(') {
        return parse_list(ctx, input, false);
    }
    if input.starts_with('"') {
        return parse_string(input);
    }
    if input
        .chars()
        .next()
        .map(|c| c == '-' || c.is_ascii_digit())
        .unwrap_or(false)
    {
        return parse_number(input);
    }
    parse_symbol(input)
}

fn malformed(input: &str) -> ScmError {
    let snippet: String = input.chars().take(24).collect();
    ScmError::MalformedInput(snippet)
}

/// Read the first form of the input (REPL convention)
pub fn read(input: &str) -> Result<Value, ScmError> {
    let ctx = Ctx {
        file: Arc::from("repl"),
        full: input,
    };
    let (_, _) = ws(input).map_err(|_| malformed(input))?;
    match parse_expr(&ctx, input) {
        Ok((_, value)) => Ok(value),
        Err(_) => Err(malformed(input)),
    }
}

/// Read every form of a source file
pub fn read_all(input: &str, file: &str) -> Result<Vec<Value>, ScmError> {
    let ctx = Ctx {
        file: Arc::from(file),
        full: input,
    };
    let mut forms = Vec::new();
    let mut rest = input;
    loop {
        let (after_ws, _) = ws(rest).map_err(|_| malformed(rest))?;
        if after_ws.is_empty() {
            return Ok(forms);
        }
        match parse_expr(&ctx, after_ws) {
            Ok((after, form)) => {
                forms.push(form);
                rest = after;
            }
            Err(_) => return Err(malformed(after_ws)),
        }
    }
}
