use crate::ast::{DeclType, Expr, Function, Module, Stmt};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};

/// Parse core-dialect text into a module. Lexes internally; the input is
/// expected to be normalized already.
pub fn parse(input: &str) -> Result<Module, CoreError> {
    let tokens = lex(input);
    let mut position = 0;
    parse_module(&tokens, &mut position)
}

fn parse_module(tokens: &[Token], position: &mut usize) -> Result<Module, CoreError> {
    expect(tokens, position, &TokenKind::KwModule, "module")?;
    let (name, _) = expect_ident(tokens, position, "module name")?;
    expect(tokens, position, &TokenKind::Colon, "':'")?;
    let main = parse_scope(tokens, position)?;
    // tokens after the closing `end` are ignored
    Ok(Module { name, main })
}

fn parse_scope(tokens: &[Token], position: &mut usize) -> Result<Function, CoreError> {
    expect(tokens, position, &TokenKind::KwScope, "scope")?;
    let (scope_name, line) = expect_ident(tokens, position, "scope name")?;
    if !scope_name.eq_ignore_ascii_case("main") {
        return Err(CoreError::Parse {
            line,
            message: format!("unsupported scope '{scope_name}', only 'main' is available"),
        });
    }
    expect(tokens, position, &TokenKind::KwRange, "range")?;
    expect_ident(tokens, position, "range name")?;
    expect(tokens, position, &TokenKind::Colon, "':'")?;

    let mut body = Vec::new();
    while !matches!(tokens[*position].kind, TokenKind::KwEnd | TokenKind::Eof) {
        body.push(parse_stmt(tokens, position)?);
    }
    expect(tokens, position, &TokenKind::KwEnd, "end")?;

    Ok(Function {
        name: "main".to_string(),
        line,
        body,
    })
}

fn parse_stmt(tokens: &[Token], position: &mut usize) -> Result<Stmt, CoreError> {
    let token = &tokens[*position];
    match token.kind {
        TokenKind::KwLet => {
            let line = token.line;
            *position += 1;
            let decl = if accept(tokens, position, &TokenKind::KwInt) {
                DeclType::Int
            } else if accept(tokens, position, &TokenKind::KwArr) {
                DeclType::Arr
            } else {
                DeclType::Implicit
            };
            let (name, _) = expect_ident(tokens, position, "name")?;
            expect(tokens, position, &TokenKind::Equals, "'='")?;
            let expr = parse_expr(tokens, position)?;
            Ok(Stmt::Let {
                name: name.to_ascii_lowercase(),
                decl,
                expr,
                line,
            })
        }
        TokenKind::KwReturn => {
            let line = token.line;
            *position += 1;
            let expr = parse_expr(tokens, position)?;
            Ok(Stmt::Return { expr, line })
        }
        TokenKind::KwIf => parse_if(tokens, position),
        _ => Err(CoreError::Parse {
            line: token.line,
            message: "expected a statement".to_string(),
        }),
    }
}

fn parse_if(tokens: &[Token], position: &mut usize) -> Result<Stmt, CoreError> {
    let line = tokens[*position].line;
    *position += 1;
    expect(tokens, position, &TokenKind::LParen, "'('")?;
    let cond = parse_expr(tokens, position)?;
    expect(tokens, position, &TokenKind::RParen, "')'")?;
    expect(tokens, position, &TokenKind::Colon, "':'")?;

    let mut then_body = Vec::new();
    while !matches!(
        tokens[*position].kind,
        TokenKind::KwElse | TokenKind::KwEnd | TokenKind::Eof
    ) {
        then_body.push(parse_stmt(tokens, position)?);
    }

    let mut else_body = Vec::new();
    if accept(tokens, position, &TokenKind::KwElse) {
        expect(tokens, position, &TokenKind::Colon, "':'")?;
        while !matches!(tokens[*position].kind, TokenKind::KwEnd | TokenKind::Eof) {
            else_body.push(parse_stmt(tokens, position)?);
        }
    }
    expect(tokens, position, &TokenKind::KwEnd, "end")?;

    Ok(Stmt::If {
        cond,
        then_body,
        else_body,
        line,
    })
}

fn parse_expr(tokens: &[Token], position: &mut usize) -> Result<Expr, CoreError> {
    let mut expr = parse_primary(tokens, position)?;
    while tokens[*position].kind == TokenKind::Plus {
        let line = tokens[*position].line;
        *position += 1;
        let rhs = parse_primary(tokens, position)?;
        expr = Expr::Add {
            lhs: Box::new(expr),
            rhs: Box::new(rhs),
            line,
        };
    }
    Ok(expr)
}

fn parse_primary(tokens: &[Token], position: &mut usize) -> Result<Expr, CoreError> {
    let token = &tokens[*position];
    match &token.kind {
        TokenKind::Number(value) => {
            *position += 1;
            Ok(Expr::Num {
                value: *value,
                line: token.line,
            })
        }
        TokenKind::Ident(name) => {
            let name = name.to_ascii_lowercase();
            let line = token.line;
            *position += 1;
            if !accept(tokens, position, &TokenKind::LParen) {
                return Ok(Expr::Var { name, line });
            }
            let mut args = Vec::new();
            if tokens[*position].kind != TokenKind::RParen {
                args.push(parse_expr(tokens, position)?);
                while accept(tokens, position, &TokenKind::Comma) {
                    args.push(parse_expr(tokens, position)?);
                }
            }
            expect(tokens, position, &TokenKind::RParen, "')'")?;
            Ok(Expr::Call { name, args, line })
        }
        TokenKind::LParen => {
            *position += 1;
            let expr = parse_expr(tokens, position)?;
            expect(tokens, position, &TokenKind::RParen, "')'")?;
            Ok(expr)
        }
        _ => Err(CoreError::Parse {
            line: token.line,
            message: "expected a number, a name, or '('".to_string(),
        }),
    }
}

fn accept(tokens: &[Token], position: &mut usize, kind: &TokenKind) -> bool {
    if tokens[*position].kind == *kind {
        *position += 1;
        true
    } else {
        false
    }
}

fn expect(
    tokens: &[Token],
    position: &mut usize,
    kind: &TokenKind,
    what: &str,
) -> Result<(), CoreError> {
    let token = &tokens[*position];
    if token.kind == *kind {
        *position += 1;
        Ok(())
    } else {
        Err(CoreError::Parse {
            line: token.line,
            message: format!("expected {what}"),
        })
    }
}

fn expect_ident(
    tokens: &[Token],
    position: &mut usize,
    what: &str,
) -> Result<(String, u32), CoreError> {
    let token = &tokens[*position];
    if let TokenKind::Ident(name) = &token.kind {
        *position += 1;
        Ok((name.clone(), token.line))
    } else {
        Err(CoreError::Parse {
            line: token.line,
            message: format!("expected {what}"),
        })
    }
}
