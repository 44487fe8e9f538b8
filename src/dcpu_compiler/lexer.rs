// DCPU Source Lexer
// Tokenizes source text into a stream of tokens

use crate::dcpu_compiler::ast::SourcePos;
use crate::dcpu_compiler::error::CompilerError;

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn pos(&self) -> SourcePos {
        SourcePos::new(self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntegerLiteral(u16),
    Identifier(String),

    // Keywords
    Function,
    Return,
    If,
    Else,
    While,
    For,
    AndKeyword, // and
    OrKeyword,  // or
    NotKeyword, // not

    // Symbols
    LeftBrace,    // {
    RightBrace,   // }
    LeftBracket,  // [
    RightBracket, // ]
    LeftParen,    // (
    RightParen,   // )
    Semicolon,    // ;

    // Operators
    Equal,        // =
    EqualEqual,   // ==
    NotEqual,     // !=
    Plus,         // +
    Minus,        // -
    Star,         // *
    StarStar,     // **
    Slash,        // /
    Percent,      // %
    Less,         // <
    LessEqual,    // <=
    LessLess,     // <<
    Greater,      // >
    GreaterEqual, // >=
    GreaterGreater, // >>
    Ampersand,    // &
    Pipe,         // |
    Caret,        // ^
    And,          // &&
    Or,           // ||
    Not,          // !

    EOF,
}

impl TokenKind {
    /// Short description used in "expected X, found Y" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::IntegerLiteral(value) => format!("number {}", value),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::EOF => "end of input".to_string(),
            other => format!("{:?}", other),
        }
    }
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    current_char: Option<char>,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let chars: Vec<char> = input.chars().collect();
        let current_char = chars.first().copied();

        Lexer {
            input: chars,
            position: 0,
            line: 1,
            column: 1,
            current_char,
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, CompilerError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::EOF;
            tokens.push(token);
            if done {
                break;
            }
        }

        log::debug!("lexed {} tokens", tokens.len());
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Token, CompilerError> {
        self.skip_whitespace_and_comments();

        let start_pos = self.position;
        let start_line = self.line;
        let start_column = self.column;
        let here = SourcePos::new(start_line, start_column);

        let token_kind = match self.current_char {
            None => TokenKind::EOF,
            Some(ch) => match ch {
                // Single character tokens
                '{' => self.single(TokenKind::LeftBrace),
                '}' => self.single(TokenKind::RightBrace),
                '[' => self.single(TokenKind::LeftBracket),
                ']' => self.single(TokenKind::RightBracket),
                '(' => self.single(TokenKind::LeftParen),
                ')' => self.single(TokenKind::RightParen),
                ';' => self.single(TokenKind::Semicolon),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '^' => self.single(TokenKind::Caret),

                // Multi-character operators
                '*' => self.pair('*', TokenKind::StarStar, TokenKind::Star),
                '=' => self.pair('=', TokenKind::EqualEqual, TokenKind::Equal),
                '!' => self.pair('=', TokenKind::NotEqual, TokenKind::Not),
                '&' => self.pair('&', TokenKind::And, TokenKind::Ampersand),
                '|' => self.pair('|', TokenKind::Or, TokenKind::Pipe),
                '<' => {
                    self.advance();
                    match self.current_char {
                        Some('=') => self.single(TokenKind::LessEqual),
                        Some('<') => self.single(TokenKind::LessLess),
                        _ => TokenKind::Less,
                    }
                }
                '>' => {
                    self.advance();
                    match self.current_char {
                        Some('=') => self.single(TokenKind::GreaterEqual),
                        Some('>') => self.single(TokenKind::GreaterGreater),
                        _ => TokenKind::Greater,
                    }
                }

                // Numbers
                ch if ch.is_ascii_digit() => TokenKind::IntegerLiteral(self.read_number(here)?),

                // Identifiers and keywords
                ch if ch.is_alphabetic() || ch == '_' => {
                    let identifier = self.read_identifier();
                    self.keyword_or_identifier(identifier)
                }

                // Unexpected character
                ch => {
                    return Err(CompilerError::UnexpectedCharacter(ch, here));
                }
            },
        };

        Ok(Token {
            kind: token_kind,
            position: start_pos,
            line: start_line,
            column: start_column,
        })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Two-character operator if the next char is `second`, otherwise the one-char form.
    fn pair(&mut self, second: char, double: TokenKind, lone: TokenKind) -> TokenKind {
        self.advance();
        if self.current_char == Some(second) {
            self.advance();
            double
        } else {
            lone
        }
    }

    fn advance(&mut self) {
        if let Some('\n') = self.current_char {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        self.position += 1;
        self.current_char = self.input.get(self.position).copied();
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' || (ch == '/' && self.peek_char() == Some('/')) {
                self.skip_line_comment();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current_char {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_number(&mut self, start: SourcePos) -> Result<u16, CompilerError> {
        let mut value = String::new();
        let mut radix = 10;

        if self.current_char == Some('0') && matches!(self.peek_char(), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            radix = 16;
        }

        while let Some(ch) = self.current_char {
            if ch.is_digit(radix) {
                value.push(ch);
                self.advance();
            } else if ch.is_alphanumeric() || ch == '_' {
                return Err(CompilerError::LexicalError(
                    format!("Invalid digit '{}' in number literal", ch),
                    start,
                ));
            } else {
                break;
            }
        }

        if value.is_empty() {
            return Err(CompilerError::LexicalError(
                "Hex literal has no digits".to_string(),
                start,
            ));
        }

        u16::from_str_radix(&value, radix).map_err(|_| {
            CompilerError::LexicalError("Number literal does not fit in 16 bits".to_string(), start)
        })
    }

    fn read_identifier(&mut self) -> String {
        let mut value = String::new();

        while let Some(ch) = self.current_char {
            if ch.is_alphanumeric() || ch == '_' {
                value.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        value
    }

    fn keyword_or_identifier(&self, identifier: String) -> TokenKind {
        match identifier.as_str() {
            "function" => TokenKind::Function,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "and" => TokenKind::AndKeyword,
            "or" => TokenKind::OrKeyword,
            "not" => TokenKind::NotKeyword,
            _ => TokenKind::Identifier(identifier),
        }
    }
}

#[cfg(test)]
#[path = "lexer_tests.rs"]
mod tests;
