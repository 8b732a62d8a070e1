//! Lexer for GoLite source files.
//!
//! Terminals are matched through a lex map with maximal munch; semicolons are
//! inserted automatically at line ends following the Go rule, so the parser
//! only ever sees explicit statement terminators.
mod lexmap;
mod token;
mod tokens;

pub use lexmap::*;
pub use token::*;
pub use tokens::*;

use once_cell::sync::Lazy;
use std::{error::Error, fmt::Display, iter::Peekable, str::Chars};

macro_rules! terminal {
    ($map:ident, $name:ident, $value:expr) => {
        $map.insert($value, Terminal::$name);
    };
}

static LEX_MAP: Lazy<LexMap> = Lazy::new(|| {
    let mut m = LexMap::default();

    terminal!(m, Package, "package");
    terminal!(m, Import, "import");
    terminal!(m, Func, "func");
    terminal!(m, Var, "var");
    terminal!(m, Const, "const");
    terminal!(m, Type, "type");
    terminal!(m, Struct, "struct");
    terminal!(m, Return, "return");
    terminal!(m, If, "if");
    terminal!(m, Else, "else");
    terminal!(m, For, "for");
    terminal!(m, Range, "range");
    terminal!(m, Break, "break");
    terminal!(m, Continue, "continue");
    terminal!(m, Goto, "goto");
    terminal!(m, Defer, "defer");
    terminal!(m, Nil, "nil");
    terminal!(m, True, "true");
    terminal!(m, False, "false");
    terminal!(m, Assign, "=");
    terminal!(m, ColonAssign, ":=");
    terminal!(m, Equal, "==");
    terminal!(m, NotEqual, "!=");
    terminal!(m, Less, "<");
    terminal!(m, LessEqual, "<=");
    terminal!(m, Greater, ">");
    terminal!(m, GreaterEqual, ">=");
    terminal!(m, AmpAmp, "&&");
    terminal!(m, PipePipe, "||");
    terminal!(m, Bang, "!");
    terminal!(m, Plus, "+");
    terminal!(m, Minus, "-");
    terminal!(m, Star, "*");
    terminal!(m, Slash, "/");
    terminal!(m, Percent, "%");
    terminal!(m, Amp, "&");
    terminal!(m, PlusAssign, "+=");
    terminal!(m, MinusAssign, "-=");
    terminal!(m, StarAssign, "*=");
    terminal!(m, SlashAssign, "/=");
    terminal!(m, PlusPlus, "++");
    terminal!(m, MinusMinus, "--");
    terminal!(m, LParen, "(");
    terminal!(m, RParen, ")");
    terminal!(m, LBracket, "[");
    terminal!(m, RBracket, "]");
    terminal!(m, LBrace, "{");
    terminal!(m, RBrace, "}");
    terminal!(m, Comma, ",");
    terminal!(m, Semicolon, ";");
    terminal!(m, Colon, ":");
    terminal!(m, Dot, ".");

    m
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub position: Position,
}

impl LexError {
    fn new(message: impl ToString, position: Position) -> Self {
        Self {
            message: message.to_string(),
            position,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (line, col) = self.position;
        write!(f, "{} ({line}:{col})", self.message)
    }
}

impl Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    tokens: Vec<Token>,
    iterator: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            tokens: vec![],
            iterator: input.chars().peekable(),
            line: 1,
            col: 1,
        }
    }

    fn peek(&mut self) -> Option<&char> {
        self.iterator.peek()
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.iterator.clone();
        lookahead.next();
        lookahead.next()
    }

    fn next(&mut self) -> Option<char> {
        self.iterator.next()
    }

    fn next_if(&mut self, func: impl FnOnce(&char) -> bool) -> Option<char> {
        self.iterator.next_if(func)
    }

    fn position(&self) -> Position {
        (self.line, self.col)
    }

    /// Push a semicolon if the previously lexed token can end a statement.
    fn insert_implicit_semicolon(&mut self) {
        if self
            .tokens
            .last()
            .map(Token::ends_statement)
            .unwrap_or(false)
        {
            let position = self.position();
            self.tokens.push(Token::Semicolon { position });
        }
    }

    fn newline(&mut self) {
        self.insert_implicit_semicolon();
        self.col = 1;
        self.line += 1;
    }

    fn eat_whitespace(&mut self) {
        while let Some(next) = self.next_if(|item| item.is_whitespace()) {
            match next {
                '\n' => self.newline(),
                _ => self.col += 1,
            }
        }
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_whitespace();

            let Some(next) = self.peek().copied() else {
                self.insert_implicit_semicolon();
                break;
            };

            match next {
                '/' if matches!(self.peek_second(), Some('/') | Some('*')) => self.lex_comment()?,
                'a'..='z' | 'A'..='Z' | '_' => self.lex_alphanumeric()?,
                '0'..='9' => self.lex_numeric()?,
                '"' => self.lex_string()?,
                _ => self.lex_special()?,
            }
        }

        Ok(self.tokens)
    }

    fn lex_comment(&mut self) -> LexResult<()> {
        let position = self.position();
        self.next();
        self.col += 1;
        match self.next() {
            Some('/') => {
                self.col += 1;
                while self.next_if(|item| *item != '\n').is_some() {
                    self.col += 1;
                }
            }
            Some('*') => {
                self.col += 1;
                let mut crossed_line = false;
                loop {
                    match self.next() {
                        Some('*') if self.peek() == Some(&'/') => {
                            self.next();
                            self.col += 2;
                            break;
                        }
                        Some('\n') => {
                            crossed_line = true;
                            self.col = 1;
                            self.line += 1;
                        }
                        Some(_) => self.col += 1,
                        None => return Err(LexError::new("unterminated block comment", position)),
                    }
                }
                // a comment spanning lines counts as a newline
                if crossed_line {
                    self.insert_implicit_semicolon();
                }
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    fn lex_special(&mut self) -> LexResult<()> {
        let mut stack = vec![];
        let position = self.position();

        while let Some(next) = self.next() {
            self.col += 1;
            stack.push(next);

            let read = stack.iter().collect::<String>();

            let can_read_next = self
                .peek()
                .map(|item| {
                    let mut attempt = stack.clone();
                    attempt.push(*item);
                    LEX_MAP.can_match(&attempt.iter().collect::<String>())
                })
                .unwrap_or(false);

            if can_read_next {
                continue;
            }

            let Some(current_match) = LEX_MAP.get(read.as_str()) else {
                return Err(LexError::new(format!("failed to lex '{read}'"), position));
            };

            self.tokens.push(current_match.to_token(position));
            break;
        }

        Ok(())
    }

    fn lex_alphanumeric(&mut self) -> LexResult<()> {
        let mut stack = vec![];
        let position = self.position();

        while let Some(next) = self.next_if(|item| item.is_alphanumeric() || *item == '_') {
            self.col += 1;
            stack.push(next);
        }

        let read = stack.iter().collect::<String>();

        if let Some(terminal) = LEX_MAP.get(read.as_str()) {
            self.tokens.push(terminal.to_token(position));
        } else {
            self.tokens.push(Token::Id {
                value: read,
                position,
            });
        }

        Ok(())
    }

    fn lex_numeric(&mut self) -> LexResult<()> {
        let position = self.position();

        // hex integers carry a 0x/0X prefix
        if self.peek() == Some(&'0') && matches!(self.peek_second(), Some('x') | Some('X')) {
            self.next();
            self.next();
            self.col += 2;

            let mut stack = vec![];
            while let Some(next) = self.next_if(|item| item.is_ascii_hexdigit()) {
                self.col += 1;
                stack.push(next);
            }
            let read = stack.iter().collect::<String>();
            let value = i64::from_str_radix(&read, 16).map_err(|_| {
                LexError::new(format!("failed to parse hex literal '0x{read}'"), position)
            })?;
            self.tokens.push(Token::Int { value, position });
            return Ok(());
        }

        let mut stack = vec![];
        while let Some(next) = self.next_if(|item| item.is_ascii_digit()) {
            self.col += 1;
            stack.push(next);
        }

        // a dot followed by a digit makes this a float literal
        if self.peek() == Some(&'.') && matches!(self.peek_second(), Some(c) if c.is_ascii_digit())
        {
            stack.push(self.next().unwrap());
            self.col += 1;
            while let Some(next) = self.next_if(|item| item.is_ascii_digit()) {
                self.col += 1;
                stack.push(next);
            }
            let read = stack.iter().collect::<String>();
            let value = read.parse::<f64>().map_err(|_| {
                LexError::new(format!("failed to parse float literal '{read}'"), position)
            })?;
            self.tokens.push(Token::Float { value, position });
            return Ok(());
        }

        let read = stack.iter().collect::<String>();
        let value = read.parse::<i64>().map_err(|_| {
            LexError::new(format!("failed to parse integer literal '{read}'"), position)
        })?;
        self.tokens.push(Token::Int { value, position });

        Ok(())
    }

    fn lex_string(&mut self) -> LexResult<()> {
        let position = self.position();
        self.next();
        self.col += 1;

        // escape sequences are kept verbatim; decoding happens at lowering
        let mut stack = vec![];
        loop {
            match self.next() {
                Some('"') => {
                    self.col += 1;
                    break;
                }
                Some('\\') => {
                    self.col += 1;
                    let Some(escaped) = self.next() else {
                        return Err(LexError::new("unterminated string literal", position));
                    };
                    self.col += 1;
                    stack.push('\\');
                    stack.push(escaped);
                }
                Some('\n') | None => {
                    return Err(LexError::new("unterminated string literal", position));
                }
                Some(other) => {
                    self.col += 1;
                    stack.push(other);
                }
            }
        }

        self.tokens.push(Token::Str {
            value: stack.iter().collect(),
            position,
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_identifier() {
        let lexer = Lexer::new("forge");

        assert_eq!(
            Ok(vec![
                Token::Id {
                    value: "forge".into(),
                    position: (1, 1)
                },
                Token::Semicolon { position: (1, 6) }
            ]),
            lexer.lex()
        );
    }

    #[test]
    fn test_lex_keywords_and_punctuation() {
        let lexer = Lexer::new("func main() {}");

        assert_eq!(
            Ok(vec![
                Token::Func { position: (0, 0) },
                Token::Id {
                    value: "main".into(),
                    position: (0, 0)
                },
                Token::LParen { position: (0, 0) },
                Token::RParen { position: (0, 0) },
                Token::LBrace { position: (0, 0) },
                Token::RBrace { position: (0, 0) },
                Token::Semicolon { position: (0, 0) },
            ]),
            lexer.lex()
        );
    }

    #[test]
    fn test_lex_maximal_munch() {
        let tokens = Lexer::new("a := b == c <= d").lex().unwrap();
        let kinds = tokens.iter().map(|t| format!("{t}")).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                "identifier 'a'",
                "':='",
                "identifier 'b'",
                "'=='",
                "identifier 'c'",
                "'<='",
                "identifier 'd'",
                "';'"
            ]
        );
    }

    #[test]
    fn test_lex_numeric_literals() {
        let tokens = Lexer::new("42 0x2A 3.5").lex().unwrap();
        assert_eq!(tokens[0], Token::Int { value: 42, position: (0, 0) });
        assert_eq!(tokens[1], Token::Int { value: 42, position: (0, 0) });
        assert_eq!(
            tokens[2],
            Token::Float {
                value: 3.5,
                position: (0, 0)
            }
        );
    }

    #[test]
    fn test_automatic_semicolon_insertion() {
        let tokens = Lexer::new("x = 1\ny = 2\n").lex().unwrap();
        let semis = tokens
            .iter()
            .filter(|t| matches!(t, Token::Semicolon { .. }))
            .count();
        assert_eq!(semis, 2);
    }

    #[test]
    fn test_no_semicolon_after_operator() {
        let tokens = Lexer::new("x = 1 +\n2\n").lex().unwrap();
        let semis = tokens
            .iter()
            .filter(|t| matches!(t, Token::Semicolon { .. }))
            .count();
        assert_eq!(semis, 1);
    }

    #[test]
    fn test_lex_comments() {
        let tokens = Lexer::new("x // trailing\n/* block */ y\n").lex().unwrap();
        let words = tokens
            .iter()
            .filter(|t| matches!(t, Token::Id { .. }))
            .count();
        assert_eq!(words, 2);
    }

    #[test]
    fn test_lex_string_keeps_escapes() {
        let tokens = Lexer::new(r#""a\n\"b""#).lex().unwrap();
        assert_eq!(
            tokens[0],
            Token::Str {
                value: "a\\n\\\"b".into(),
                position: (0, 0)
            }
        );
    }
}
