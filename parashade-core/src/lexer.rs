#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(u64),
    Colon,
    Equals,
    Plus,
    Comma,
    LParen,
    RParen,
    KwModule,
    KwScope,
    KwRange,
    KwLet,
    KwInt,
    KwArr,
    KwReturn,
    KwEnd,
    KwIf,
    KwElse,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

/// Tokenize core-dialect text. Lexing never fails: unknown characters are
/// skipped and number literals accumulate with wrapping arithmetic.
pub fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut line_no = 0u32;

    for line in input.lines() {
        line_no += 1;
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut iter = line.chars().peekable();

        while let Some(ch) = iter.next() {
            let kind = match ch {
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                ':' => TokenKind::Colon,
                '=' => TokenKind::Equals,
                '+' => TokenKind::Plus,
                c if c.is_whitespace() => continue,
                c if c.is_ascii_digit() => {
                    let mut value = (c as u8 - b'0') as u64;
                    if c == '0' && matches!(iter.peek(), Some(&('x' | 'X'))) {
                        iter.next();
                        value = 0;
                        while let Some(&next) = iter.peek() {
                            if next == '_' {
                                iter.next();
                            } else if let Some(digit) = next.to_digit(16) {
                                value = value.wrapping_mul(16).wrapping_add(digit as u64);
                                iter.next();
                            } else {
                                break;
                            }
                        }
                    } else {
                        while let Some(digit) = iter.peek().and_then(|next| next.to_digit(10)) {
                            value = value.wrapping_mul(10).wrapping_add(digit as u64);
                            iter.next();
                        }
                    }
                    TokenKind::Number(value)
                }
                c if is_ident_start(c) => {
                    let mut ident = String::new();
                    ident.push(c);
                    while let Some(&next) = iter.peek() {
                        if is_ident_continue(next) {
                            ident.push(next);
                            iter.next();
                        } else {
                            break;
                        }
                    }
                    keyword_or_ident(ident)
                }
                // anything else is silently skipped
                _ => continue,
            };
            tokens.push(Token {
                kind,
                line: line_no,
            });
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line: line_no,
    });
    tokens
}

fn keyword_or_ident(ident: String) -> TokenKind {
    match ident.to_ascii_lowercase().as_str() {
        "module" => TokenKind::KwModule,
        "scope" => TokenKind::KwScope,
        "range" => TokenKind::KwRange,
        "let" => TokenKind::KwLet,
        "int" => TokenKind::KwInt,
        "arr" => TokenKind::KwArr,
        "return" => TokenKind::KwReturn,
        "end" => TokenKind::KwEnd,
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        _ => TokenKind::Ident(ident),
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_punctuation_and_numbers() {
        let tokens = lex("let x = max(3, 0x2A)");
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwLet,
                TokenKind::Ident("x".to_string()),
                TokenKind::Equals,
                TokenKind::Ident("max".to_string()),
                TokenKind::LParen,
                TokenKind::Number(3),
                TokenKind::Comma,
                TokenKind::Number(42),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn matches_keywords_case_insensitively() {
        let tokens = lex("MODULE Scope RETURN End");
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KwModule,
                TokenKind::KwScope,
                TokenKind::KwReturn,
                TokenKind::KwEnd,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strips_underscores_in_hex_literals() {
        let tokens = lex("0xFF_FF");
        assert_eq!(tokens[0].kind, TokenKind::Number(0xFFFF));
    }

    #[test]
    fn skips_unknown_characters() {
        let tokens = lex("return @ 7 $");
        let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::KwReturn, TokenKind::Number(7), TokenKind::Eof]
        );
    }

    #[test]
    fn records_source_lines() {
        let tokens = lex("module d :\nreturn 1");
        assert_eq!(tokens[0].line, 1);
        assert_eq!(tokens[3].line, 2);
        assert_eq!(tokens.last().expect("eof sentinel").kind, TokenKind::Eof);
    }

    #[test]
    fn keeps_identifier_spelling() {
        let tokens = lex("Total");
        assert_eq!(tokens[0].kind, TokenKind::Ident("Total".to_string()));
    }
}
