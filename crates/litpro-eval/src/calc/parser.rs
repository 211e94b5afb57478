//! Line parser for calc cells.
//!
//! Each line holds zero or more statements separated by `;`, optionally
//! followed by a `#` comment. Precedence, lowest first:
//!
//! ```text
//! or → and → not → comparison → + - → * / // % → unary - → x[i] → atom
//! ```

use litpro_core::Value;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, none_of, satisfy, space0},
    combinator::{all_consuming, map, not, opt, recognize, rest, value, verify},
    multi::{fold_many0, many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
};

use super::ast::{BinOp, Expr, Stmt};

const KEYWORDS: &[&str] = &["let", "and", "or", "not", "true", "false", "null"];

/// Parse one source line into its statements.
///
/// On failure, returns the 1-based column where parsing stopped.
pub fn parse_line(text: &str) -> Result<Vec<Stmt>, usize> {
    match all_consuming(line)(text) {
        Ok((_, stmts)) => Ok(stmts),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            Err(text.len() - e.input.len() + 1)
        }
        Err(nom::Err::Incomplete(_)) => Err(text.len() + 1),
    }
}

fn line(input: &str) -> IResult<&str, Vec<Stmt>> {
    let (input, stmts) = separated_list0(char(';'), terminated(opt(statement), space0))(input)?;
    let (input, _) = opt(preceded(char('#'), rest))(input)?;
    Ok((input, stmts.into_iter().flatten().collect()))
}

fn statement(input: &str) -> IResult<&str, Stmt> {
    alt((assignment, map(expr, Stmt::Expr)))(input)
}

fn assignment(input: &str) -> IResult<&str, Stmt> {
    let (input, _) = space0(input)?;
    let (input, _) = opt(pair(keyword("let"), space0))(input)?;
    let (input, name) = identifier(input)?;
    let (input, _) = tuple((space0, char('='), not(char('='))))(input)?;
    let (input, value) = expr(input)?;
    Ok((input, Stmt::Assign(name.to_string(), value)))
}

fn expr(input: &str) -> IResult<&str, Expr> {
    or_expr(input)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    fold_many0(
        preceded(ws(keyword("or")), and_expr),
        move || first.clone(),
        |acc, rhs| Expr::Or(Box::new(acc), Box::new(rhs)),
    )(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    fold_many0(
        preceded(ws(keyword("and")), not_expr),
        move || first.clone(),
        |acc, rhs| Expr::And(Box::new(acc), Box::new(rhs)),
    )(input)
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(keyword("not")), not_expr), |e| {
            Expr::Not(Box::new(e))
        }),
        comparison,
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, lhs) = additive(input)?;
    let (input, rhs) = opt(pair(
        ws(alt((
            value(BinOp::Eq, tag("==")),
            value(BinOp::Ne, tag("!=")),
            value(BinOp::Le, tag("<=")),
            value(BinOp::Ge, tag(">=")),
            value(BinOp::Lt, char('<')),
            value(BinOp::Gt, char('>')),
        ))),
        additive,
    ))(input)?;
    let expr = match rhs {
        Some((op, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        None => lhs,
    };
    Ok((input, expr))
}

fn additive(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(
            ws(alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))))),
            term,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::Binary(op, Box::new(acc), Box::new(rhs)),
    )(input)
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    fold_many0(
        pair(
            ws(alt((
                value(BinOp::FloorDiv, tag("//")),
                value(BinOp::Mul, char('*')),
                value(BinOp::Div, char('/')),
                value(BinOp::Mod, char('%')),
            ))),
            unary,
        ),
        move || first.clone(),
        |acc, (op, rhs)| Expr::Binary(op, Box::new(acc), Box::new(rhs)),
    )(input)
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), unary), |e| Expr::Neg(Box::new(e))),
        postfix,
    ))(input)
}

fn postfix(input: &str) -> IResult<&str, Expr> {
    let (input, first) = atom(input)?;
    fold_many0(
        delimited(ws(char('[')), expr, preceded(space0, char(']'))),
        move || first.clone(),
        |acc, index| Expr::Index(Box::new(acc), Box::new(index)),
    )(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    preceded(
        space0,
        alt((
            number,
            map(string, |s| Expr::Literal(Value::Str(s))),
            list,
            delimited(char('('), expr, preceded(space0, char(')'))),
            value(Expr::Literal(Value::Bool(true)), keyword("true")),
            value(Expr::Literal(Value::Bool(false)), keyword("false")),
            value(Expr::Literal(Value::Null), keyword("null")),
            name_or_call,
        )),
    )(input)
}

fn number(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize(pair(digit1, opt(pair(char('.'), digit1))))(input)?;
    if text.contains('.') {
        match text.parse::<f64>() {
            Ok(x) => Ok((rest, Expr::Literal(Value::Float(x)))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Float,
            ))),
        }
    } else {
        match text.parse::<i64>() {
            Ok(n) => Ok((rest, Expr::Literal(Value::Int(n)))),
            Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    }
}

// String literals with escape sequences, in either quote style
fn string(input: &str) -> IResult<&str, String> {
    alt((
        delimited(char('"'), string_body("\"\\"), char('"')),
        delimited(char('\''), string_body("'\\"), char('\'')),
    ))(input)
}

fn string_body<'a>(special: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, String> {
    map(
        opt(escaped_transform(
            none_of(special),
            '\\',
            alt((
                value('\n', char('n')),
                value('\t', char('t')),
                value('\\', char('\\')),
                value('"', char('"')),
                value('\'', char('\'')),
            )),
        )),
        Option::unwrap_or_default,
    )
}

fn list(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(
            char('['),
            terminated(
                separated_list0(ws(char(',')), expr),
                opt(ws(char(','))),
            ),
            preceded(space0, char(']')),
        ),
        Expr::List,
    )(input)
}

fn name_or_call(input: &str) -> IResult<&str, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(preceded(
        space0,
        delimited(
            char('('),
            separated_list0(ws(char(',')), expr),
            preceded(space0, char(')')),
        ),
    ))(input)?;
    let expr = match args {
        Some(args) => Expr::Call(name.to_string(), args),
        None => Expr::Name(name.to_string()),
    };
    Ok((input, expr))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    verify(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |name: &str| !KEYWORDS.contains(&name),
    )(input)
}

/// A keyword not followed by an identifier character.
fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(satisfy(|c: char| c.is_alphanumeric() || c == '_')),
    )
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(space0, inner, space0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(text: &str) -> Stmt {
        let mut stmts = parse_line(text).unwrap();
        assert_eq!(stmts.len(), 1, "expected one statement in {:?}", text);
        stmts.remove(0)
    }

    fn int(n: i64) -> Box<Expr> {
        Box::new(Expr::Literal(Value::Int(n)))
    }

    #[test]
    fn test_assignment_with_and_without_let() {
        assert_eq!(
            parse_one("let x = 1"),
            Stmt::Assign("x".to_string(), Expr::Literal(Value::Int(1)))
        );
        assert_eq!(parse_one("x=1"), parse_one("let x = 1"));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_one("1 + 2 * 3"),
            Stmt::Expr(Expr::Binary(
                BinOp::Add,
                int(1),
                Box::new(Expr::Binary(BinOp::Mul, int(2), int(3)))
            ))
        );
        assert_eq!(
            parse_one("(1 + 2) * 3"),
            Stmt::Expr(Expr::Binary(
                BinOp::Mul,
                Box::new(Expr::Binary(BinOp::Add, int(1), int(2))),
                int(3)
            ))
        );
    }

    #[test]
    fn test_left_associative() {
        assert_eq!(
            parse_one("10 - 4 - 3"),
            Stmt::Expr(Expr::Binary(
                BinOp::Sub,
                Box::new(Expr::Binary(BinOp::Sub, int(10), int(4))),
                int(3)
            ))
        );
    }

    #[test]
    fn test_equality_is_not_assignment() {
        assert_eq!(
            parse_one("x == 1"),
            Stmt::Expr(Expr::Binary(
                BinOp::Eq,
                Box::new(Expr::Name("x".to_string())),
                int(1)
            ))
        );
    }

    #[test]
    fn test_keywords_need_boundaries() {
        assert_eq!(parse_one("order"), Stmt::Expr(Expr::Name("order".to_string())));
        assert_eq!(
            parse_one("not done"),
            Stmt::Expr(Expr::Not(Box::new(Expr::Name("done".to_string()))))
        );
        assert_eq!(
            parse_one("letter = 2"),
            Stmt::Assign("letter".to_string(), Expr::Literal(Value::Int(2)))
        );
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            parse_one(r#""a\"b\n""#),
            Stmt::Expr(Expr::Literal(Value::Str("a\"b\n".to_string())))
        );
        assert_eq!(
            parse_one("''"),
            Stmt::Expr(Expr::Literal(Value::Str(String::new())))
        );
        assert_eq!(
            parse_one("'# not a comment'"),
            Stmt::Expr(Expr::Literal(Value::Str("# not a comment".to_string())))
        );
    }

    #[test]
    fn test_lists_calls_and_indexing() {
        assert_eq!(
            parse_one("max([1, 2,], 3)[0]"),
            Stmt::Expr(Expr::Index(
                Box::new(Expr::Call(
                    "max".to_string(),
                    vec![Expr::List(vec![Expr::Literal(Value::Int(1)), Expr::Literal(Value::Int(2))]), Expr::Literal(Value::Int(3))]
                )),
                int(0)
            ))
        );
    }

    #[test]
    fn test_separators_and_comments() {
        assert_eq!(parse_line("a = 1; b = 2  # two").unwrap().len(), 2);
        assert!(parse_line("   # only a comment").unwrap().is_empty());
        assert!(parse_line("").unwrap().is_empty());
        assert_eq!(parse_line("a = 1;").unwrap().len(), 1);
    }

    #[test]
    fn test_floats() {
        assert_eq!(
            parse_one("2.5"),
            Stmt::Expr(Expr::Literal(Value::Float(2.5)))
        );
    }

    #[test]
    fn test_syntax_error_column() {
        assert_eq!(parse_line("x = 1 +"), Err(7));
        assert!(parse_line("x = (1").is_err());
        assert!(parse_line("let = 3").is_err());
    }
}
