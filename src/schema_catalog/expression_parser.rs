/// Expression parser for computed-field SQL fragments
///
/// Parses the single-expression fragments a schema author attaches to a
/// computed field:
/// - Field chains: `event`, `person.properties.email`, `$session_id`
/// - Quoted identifiers: `"First Name"`, `` `User-ID` ``
/// - Function calls: `concat(first_name, ' ', last_name)`
/// - Math operations: `duration / 1000`, `price * quantity`
/// - Array indexing: `urls[1]`
/// - Comparisons: `click_count >= 10`
///
/// Every identifier becomes an unresolved [`SqlExpr::Chain`]; the resolver
/// binds it against the declaring table when the field is used.
///
/// Does NOT support (statements and constructs that need the full compiler):
/// - `SELECT ...`, `;`-separated statements
/// - Conditionals: `CASE WHEN`, lambdas
/// - Boolean connectives: `AND`, `OR`, `NOT`
use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_until},
    character::complete::{alphanumeric1, char, digit1, multispace0, one_of},
    combinator::{cut, map, opt, recognize, value},
    error::ErrorKind,
    multi::{many0, separated_list0, separated_list1},
    sequence::{delimited, preceded},
    IResult, Parser,
};

use super::errors::SchemaError;
use crate::sql_ast::{Literal, Operator, SqlExpr};

/// Parse a computed-field fragment (entry point).
///
/// The whole fragment must be consumed: trailing tokens mean the author wrote
/// more than one expression.
pub fn parse_field_expression(field: &str, fragment: &str) -> Result<SqlExpr, SchemaError> {
    let parse_error = |message: String| SchemaError::FieldExpressionParse {
        field: field.to_string(),
        fragment: fragment.to_string(),
        message,
    };

    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return Err(parse_error("empty expression".to_string()));
    }

    match parse_scalar_expr(trimmed) {
        Ok((remaining, expr)) => {
            let remaining = remaining.trim();
            if !remaining.is_empty() {
                return Err(parse_error(format!(
                    "unexpected trailing content: '{}'",
                    remaining
                )));
            }
            Ok(expr)
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            if e.input.trim().is_empty() {
                Err(parse_error("unexpected end of fragment".to_string()))
            } else {
                Err(parse_error(format!("cannot parse at '{}'", e.input)))
            }
        }
        Err(nom::Err::Incomplete(_)) => Err(parse_error("incomplete fragment".to_string())),
    }
}

/// Parse scalar expression
/// Precedence (low to high): comparison, additive, multiplicative, postfix, primary
fn parse_scalar_expr(input: &str) -> IResult<&str, SqlExpr> {
    parse_comparison_expr(input)
}

/// Parse comparison operations (<, >, <=, >=, =, !=)
fn parse_comparison_expr(input: &str) -> IResult<&str, SqlExpr> {
    let (input, left) = parse_additive_expr(input)?;
    let (mut input, _) = multispace0(input)?;

    // 2-char operators first
    let op_opt = if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>("<=")(input) {
        input = new_input;
        Some(Operator::LessThanEqual)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>(">=")(input) {
        input = new_input;
        Some(Operator::GreaterThanEqual)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>("!=")(input) {
        input = new_input;
        Some(Operator::NotEqual)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>("<>")(input) {
        input = new_input;
        Some(Operator::NotEqual)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>("<")(input) {
        input = new_input;
        Some(Operator::LessThan)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>(">")(input) {
        input = new_input;
        Some(Operator::GreaterThan)
    } else if let Ok((new_input, _)) = tag::<_, _, nom::error::Error<_>>("=")(input) {
        input = new_input;
        Some(Operator::Equal)
    } else {
        None
    };

    match op_opt {
        Some(op) => {
            let (input, _) = multispace0(input)?;
            let (input, right) = parse_additive_expr(input)?;
            Ok((input, SqlExpr::binary(op, left, right)))
        }
        None => Ok((input, left)),
    }
}

fn parse_additive_expr(input: &str) -> IResult<&str, SqlExpr> {
    let (mut current_input, mut current_left) = parse_multiplicative_expr(input)?;

    loop {
        let (new_input, _) = multispace0(current_input)?;

        let op_and_input =
            if let Ok((new_input, _)) = char::<_, nom::error::Error<_>>('+')(new_input) {
                Some((new_input, Operator::Addition))
            } else if let Ok((new_input, _)) = char::<_, nom::error::Error<_>>('-')(new_input) {
                Some((new_input, Operator::Subtraction))
            } else {
                None
            };

        let Some((new_input, op)) = op_and_input else {
            return Ok((current_input, current_left));
        };
        let (new_input, _) = multispace0(new_input)?;
        match parse_multiplicative_expr(new_input) {
            Ok((new_input, right)) => {
                current_left = SqlExpr::binary(op, current_left, right);
                current_input = new_input;
            }
            // Leave the dangling operator for the trailing-content check
            Err(nom::Err::Error(_)) => return Ok((current_input, current_left)),
            Err(e) => return Err(e),
        }
    }
}

fn parse_multiplicative_expr(input: &str) -> IResult<&str, SqlExpr> {
    let (mut current_input, mut current_left) = parse_postfix_expr(input)?;

    loop {
        let (new_input, _) = multispace0(current_input)?;

        let op_and_input =
            if let Ok((new_input, _)) = char::<_, nom::error::Error<_>>('*')(new_input) {
                Some((new_input, Operator::Multiplication))
            } else if let Ok((new_input, _)) = char::<_, nom::error::Error<_>>('/')(new_input) {
                Some((new_input, Operator::Division))
            } else if let Ok((new_input, _)) = char::<_, nom::error::Error<_>>('%')(new_input) {
                Some((new_input, Operator::ModuloDivision))
            } else {
                None
            };

        let Some((new_input, op)) = op_and_input else {
            return Ok((current_input, current_left));
        };
        let (new_input, _) = multispace0(new_input)?;
        match parse_postfix_expr(new_input) {
            Ok((new_input, right)) => {
                current_left = SqlExpr::binary(op, current_left, right);
                current_input = new_input;
            }
            Err(nom::Err::Error(_)) => return Ok((current_input, current_left)),
            Err(e) => return Err(e),
        }
    }
}

/// Parse postfix operations (array indexing)
fn parse_postfix_expr(input: &str) -> IResult<&str, SqlExpr> {
    let (input, mut expr) = parse_primary_expr(input)?;

    let mut current_input = input;
    loop {
        let (new_input, _) = multispace0(current_input)?;

        match char::<_, nom::error::Error<_>>('[')(new_input) {
            Ok((new_input, _)) => {
                let (new_input, _) = multispace0(new_input)?;
                let (new_input, index) = parse_scalar_expr(new_input)?;
                let (new_input, _) = multispace0(new_input)?;
                let (new_input, _) = char(']')(new_input)?;

                expr = SqlExpr::ArrayIndex {
                    array: Box::new(expr),
                    index: Box::new(index),
                };
                current_input = new_input;
            }
            Err(_) => break,
        }
    }

    Ok((current_input, expr))
}

/// Parse primary expressions (highest precedence)
fn parse_primary_expr(input: &str) -> IResult<&str, SqlExpr> {
    alt((
        parse_function_call_expr,
        parse_literal_expr, // literals before chains
        parse_chain_expr,
        delimited(
            char('('),
            delimited(multispace0, parse_scalar_expr, multispace0),
            char(')'),
        ),
    ))
    .parse(input)
}

/// Parse function call: concat(a, b)
///
/// Once `name(` is read the input can only be a call, so argument errors are
/// reported where they happen instead of backtracking to a bare chain.
fn parse_function_call_expr(input: &str) -> IResult<&str, SqlExpr> {
    let (input, name) = parse_identifier_str(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char('(')(input)?;
    let (input, args) = cut(parse_call_arguments).parse(input)?;

    Ok((input, SqlExpr::call(name, args)))
}

/// Arguments and the closing paren of a call
fn parse_call_arguments(input: &str) -> IResult<&str, Vec<SqlExpr>> {
    let (input, _) = multispace0(input)?;
    let (input, args) = separated_list0(
        delimited(multispace0, char(','), multispace0),
        parse_scalar_expr,
    )
    .parse(input)?;

    let (input, _) = multispace0(input)?;
    let (input, _) = char(')')(input)?;
    Ok((input, args))
}

/// Parse a dotted field chain; `true`, `false` and `null` are literals
fn parse_chain_expr(input: &str) -> IResult<&str, SqlExpr> {
    map(
        separated_list1(char('.'), parse_chain_segment),
        |segments: Vec<String>| {
            if segments.len() == 1 {
                match segments[0].to_ascii_lowercase().as_str() {
                    "true" => return SqlExpr::Literal(Literal::Boolean(true)),
                    "false" => return SqlExpr::Literal(Literal::Boolean(false)),
                    "null" => return SqlExpr::Literal(Literal::Null),
                    _ => {}
                }
            }
            SqlExpr::Chain(segments)
        },
    )
    .parse(input)
}

/// Chain segment: bare identifier, "double quoted" or `backticked`
fn parse_chain_segment(input: &str) -> IResult<&str, String> {
    alt((
        map(delimited(char('"'), take_until("\""), char('"')), |s: &str| {
            s.to_string()
        }),
        map(delimited(char('`'), take_until("`"), char('`')), |s: &str| {
            s.to_string()
        }),
        map(parse_identifier_str, |s: &str| s.to_string()),
    ))
    .parse(input)
}

fn parse_identifier_str(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((alphanumeric1, tag("_"), tag("$"))),
        many0(alt((alphanumeric1, tag("_"), tag("$")))),
    ))
    .parse(input)
}

/// Parse literal: 'string', 123, 45.67
fn parse_literal_expr(input: &str) -> IResult<&str, SqlExpr> {
    alt((
        map(parse_string_literal, |s| SqlExpr::Literal(Literal::String(s))),
        parse_number_literal,
    ))
    .parse(input)
}

/// Single-quoted string; `''` inside is one quote
fn parse_string_literal(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            many0(alt((is_not("'"), value("'", tag("''"))))),
            |parts: Vec<&str>| parts.concat(),
        ),
        char('\''),
    )
    .parse(input)
}

fn parse_number_literal(input: &str) -> IResult<&str, SqlExpr> {
    let (rest, text) = recognize_number(input)?;
    let literal = if text.contains('.') {
        text.parse::<f64>().map(Literal::Float).map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, ErrorKind::Float))
        })?
    } else {
        text.parse::<i64>().map(Literal::Integer).map_err(|_| {
            nom::Err::Error(nom::error::Error::new(input, ErrorKind::Digit))
        })?
    };
    Ok((rest, SqlExpr::Literal(literal)))
}

fn recognize_number(input: &str) -> IResult<&str, &str> {
    recognize((opt(one_of("+-")), digit1, opt(preceded(char('.'), digit1)))).parse(input)
}
