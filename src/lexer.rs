use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::diag::ErrorHandler;
use crate::position::Position;
use crate::source;
use crate::token::{keyword_kind, Token, TokenKind};

/// Converts source bytes into a token stream terminated by `Eof`. The source
/// is treated as Latin-1 for scanning purposes; identifiers are ASCII
/// letters, digits and underscores. Scanning stops at the first error.
pub struct Lexer<'a> {
    source: Vec<u8>,
    index: usize,
    line: u32,
    line_index_offset: usize,
    path: Rc<PathBuf>,
    tokens: Vec<Token>,
    handler: &'a mut ErrorHandler,
}

fn is_digit(character: u8) -> bool {
    character.is_ascii_digit()
}

fn is_letter(character: u8) -> bool {
    character.is_ascii_alphabetic() || character == b'_'
}

fn is_alphanumeric(character: u8) -> bool {
    is_digit(character) || is_letter(character)
}

impl<'a> Lexer<'a> {
    pub fn new(handler: &'a mut ErrorHandler) -> Self {
        Self {
            source: Vec::new(),
            index: 0,
            line: 1,
            line_index_offset: 0,
            path: Rc::default(),
            tokens: Vec::new(),
            handler,
        }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    /// Tokenize a whole source file; returns whether there were no errors.
    pub fn analyze(&mut self, path: &Path) -> bool {
        let contents = match source::read_file(path) {
            Ok(contents) => contents,
            Err(_) => {
                self.handler
                    .report_error("No valid file specified.", Position::default());
                return false;
            }
        };
        self.analyze_source(path.to_path_buf(), contents)
    }

    /// Tokenize already-loaded source text.
    pub fn analyze_source(&mut self, path: PathBuf, contents: String) -> bool {
        self.source = contents.into_bytes();
        self.index = 0;
        self.line = 1;
        self.line_index_offset = 0;
        self.path = Rc::new(path);
        self.tokens.clear();

        while self.current() != b'\0' && !self.handler.has_errors() {
            let token = self.lex();
            let done = token.kind == TokenKind::Eof;
            self.tokens.push(token);
            if done {
                break;
            }
        }

        if !matches!(self.tokens.last(), Some(token) if token.kind == TokenKind::Eof) {
            self.tokens
                .push(Token::new(TokenKind::Eof, "EOF", self.position_here()));
        }

        !self.handler.has_errors()
    }

    // -- cursor --

    fn current(&self) -> u8 {
        self.source.get(self.index).copied().unwrap_or(b'\0')
    }

    fn peek(&self) -> u8 {
        self.source.get(self.index + 1).copied().unwrap_or(b'\0')
    }

    fn advance(&mut self) {
        self.index += 1;
    }

    /// Advance over the next character if it matches.
    fn eat(&mut self, character: u8) -> bool {
        if self.peek() == character {
            self.advance();
            return true;
        }
        false
    }

    fn position_here(&self) -> Position {
        Position {
            source_path: self.path.clone(),
            start_index: self.index,
            end_index: self.index,
            line_index_offset: self.line_index_offset,
            line: self.line,
        }
    }

    fn position_span(&self, start: Position) -> Position {
        Position {
            end_index: self.index.saturating_sub(1).max(start.start_index),
            ..start
        }
    }

    fn handle_newline(&mut self) {
        self.line += 1;
        self.line_index_offset = self.index + 1;
        self.advance();
    }

    // -- scanning --

    fn handle_whitespace(&mut self) {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' => self.advance(),
                b'\n' => self.handle_newline(),
                b'/' if self.peek() == b'/' => {
                    while self.current() != b'\n' && self.current() != b'\0' {
                        self.advance();
                    }
                    if self.current() == b'\0' {
                        return;
                    }
                    self.handle_newline();
                }
                b'/' if self.peek() == b'*' => loop {
                    match self.current() {
                        b'\0' => return,
                        b'*' if self.peek() == b'/' => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        b'\n' => self.handle_newline(),
                        _ => self.advance(),
                    }
                },
                _ => return,
            }
        }
    }

    fn lex(&mut self) -> Token {
        self.handle_whitespace();

        if is_digit(self.current()) {
            return self.make_number_token();
        }
        if is_letter(self.current()) {
            return self.make_name_token();
        }

        let position = self.position_here();

        // Position covering both characters of a two-character token.
        let mut next_position = position.clone();
        next_position.end_index += 1;

        macro_rules! single {
            ($kind:expr, $text:literal) => {{
                self.advance();
                Token::new($kind, $text, position)
            }};
        }
        macro_rules! double_or_single {
            ($single:expr, $text:literal, $double:expr, $double_text:literal) => {{
                let token = if self.eat(b'=') {
                    Token::new($double, $double_text, next_position)
                } else {
                    Token::new($single, $text, position)
                };
                self.advance();
                token
            }};
        }

        match self.current() {
            b'(' => single!(TokenKind::LeftParen, "("),
            b')' => single!(TokenKind::RightParen, ")"),
            b'{' => single!(TokenKind::LeftBrace, "{"),
            b'}' => single!(TokenKind::RightBrace, "}"),
            b'[' => single!(TokenKind::LeftBracket, "["),
            b']' => single!(TokenKind::RightBracket, "]"),
            b';' => single!(TokenKind::Semicolon, ";"),
            b',' => single!(TokenKind::Comma, ","),
            b'.' => single!(TokenKind::Dot, "."),
            b'^' => single!(TokenKind::Caret, "^"),
            b'&' => single!(TokenKind::Ampersand, "&"),
            b'~' => single!(TokenKind::Tilde, "~"),
            b'|' => single!(TokenKind::Pipe, "|"),
            b'%' => single!(TokenKind::Percent, "%"),
            b':' => single!(TokenKind::Colon, ":"),
            b'+' => double_or_single!(TokenKind::Plus, "+", TokenKind::PlusEqual, "+="),
            b'*' => double_or_single!(TokenKind::Star, "*", TokenKind::StarEqual, "*="),
            b'/' => double_or_single!(TokenKind::Slash, "/", TokenKind::SlashEqual, "/="),
            b'!' => double_or_single!(TokenKind::Bang, "!", TokenKind::BangEqual, "!="),
            b'<' => double_or_single!(TokenKind::Less, "<", TokenKind::LessEqual, "<="),
            b'>' => double_or_single!(TokenKind::Greater, ">", TokenKind::GreaterEqual, ">="),
            b'=' => {
                if self.eat(b'>') {
                    self.advance();
                    return Token::new(TokenKind::DoubleArrow, "=>", next_position);
                }
                double_or_single!(TokenKind::Equal, "=", TokenKind::EqualEqual, "==")
            }
            b'-' => {
                if self.eat(b'>') {
                    self.advance();
                    return Token::new(TokenKind::Arrow, "->", next_position);
                }
                double_or_single!(TokenKind::Minus, "-", TokenKind::MinusEqual, "-=")
            }
            b'\'' | b'"' => self.make_string_token(self.current()),
            b'\0' => Token::new(TokenKind::Eof, "EOF", position),
            unknown => {
                self.handler.report_error(
                    format!("Unknown Character '{}'", unknown as char),
                    position.clone(),
                );
                Token::new(TokenKind::Error, "", position)
            }
        }
    }

    fn make_number_token(&mut self) -> Token {
        let position = self.position_here();
        let mut value = String::new();
        let mut is_floating_point = false;

        while is_digit(self.current()) || self.current() == b'.' {
            if self.current() == b'.' {
                if is_floating_point {
                    let here = self.position_here();
                    self.handler.report_error("Unexpected '.'", here.clone());
                    return Token::new(TokenKind::Error, "Unexpected '.'", here);
                }
                is_floating_point = true;
            }
            value.push(self.current() as char);
            self.advance();
        }

        let position = self.position_span(position);
        let kind = if is_floating_point {
            TokenKind::Float
        } else {
            TokenKind::Integer
        };
        Token::new(kind, value, position)
    }

    fn make_name_token(&mut self) -> Token {
        let position = self.position_here();
        let mut name = String::new();

        while is_alphanumeric(self.current()) {
            name.push(self.current() as char);
            self.advance();
        }

        let position = self.position_span(position);
        match keyword_kind(&name) {
            Some(kind) => Token::new(kind, name, position),
            None => Token::new(TokenKind::Identifier, name, position),
        }
    }

    fn make_string_token(&mut self, quote: u8) -> Token {
        let position = self.position_here();
        let mut contents = String::new();

        let mut last_position = self.position_here();
        self.advance();
        while self.current() != quote && self.current() != b'\0' && self.current() != b'\n' {
            last_position = self.position_here();
            contents.push(self.current() as char);
            self.advance();
        }

        if self.current() != quote {
            self.handler
                .report_error("Unterminated string or character literal", last_position);
        }

        let mut position = position;
        position.end_index = self.index;
        self.advance();

        let kind = if quote == b'"' {
            TokenKind::StringLiteral
        } else {
            TokenKind::CharacterLiteral
        };
        Token::new(kind, contents, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> (Vec<Token>, bool) {
        let mut handler = ErrorHandler::new();
        let mut lexer = Lexer::new(&mut handler);
        let ok = lexer.analyze_source(PathBuf::from("test.frc"), String::from(source));
        (lexer.into_tokens(), ok)
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.iter().map(|token| token.kind).collect()
    }

    #[test]
    fn punctuation_and_compounds() {
        assert_eq!(
            kinds("+ += - -= -> = == => != <= >="),
            vec![
                TokenKind::Plus,
                TokenKind::PlusEqual,
                TokenKind::Minus,
                TokenKind::MinusEqual,
                TokenKind::Arrow,
                TokenKind::Equal,
                TokenKind::EqualEqual,
                TokenKind::DoubleArrow,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("fn main_2 let letter"),
            vec![
                TokenKind::Function,
                TokenKind::Identifier,
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexeme_matches_source_span() {
        let (tokens, ok) = lex("let answer = 42;");
        assert!(ok);

        let source = "let answer = 42;";
        for token in tokens.iter().filter(|token| token.kind != TokenKind::Eof) {
            let span = &source[token.position.start_index..=token.position.end_index];
            assert_eq!(span, token.lexeme, "span mismatch for {:?}", token.kind);
        }
    }

    #[test]
    fn numbers_integer_and_float() {
        let (tokens, ok) = lex("12 3.5");
        assert!(ok);
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[0].lexeme, "12");
        assert_eq!(tokens[1].kind, TokenKind::Float);
        assert_eq!(tokens[1].lexeme, "3.5");
    }

    #[test]
    fn two_dots_is_an_error() {
        let (tokens, ok) = lex("1.2.3");
        assert!(!ok);
        assert_eq!(tokens.last().map(|token| token.kind), Some(TokenKind::Eof));
        assert!(tokens.iter().any(|token| token.kind == TokenKind::Error));
    }

    #[test]
    fn comments_are_whitespace() {
        assert_eq!(
            kinds("1 // comment\n2 /* multi\nline */ 3"),
            vec![
                TokenKind::Integer,
                TokenKind::Integer,
                TokenKind::Integer,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_at_eof_terminates() {
        assert_eq!(kinds("1 // trailing"), vec![TokenKind::Integer, TokenKind::Eof]);
    }

    #[test]
    fn comment_lines_advance_line_counter() {
        let (tokens, _) = lex("/* a\nb */\nx");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].position.line, 3);
    }

    #[test]
    fn string_and_character_literals() {
        let (tokens, ok) = lex("\"hello\" 'c'");
        assert!(ok);
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].lexeme, "hello");
        assert_eq!(tokens[1].kind, TokenKind::CharacterLiteral);
        assert_eq!(tokens[1].lexeme, "c");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, ok) = lex("\"oops\nnext");
        assert!(!ok);
    }

    #[test]
    fn unknown_character_halts_scanning() {
        let (tokens, ok) = lex("1 @ 2");
        assert!(!ok);
        // first error stops the scan: the `2` never gets lexed
        assert!(!tokens
            .iter()
            .any(|token| token.kind == TokenKind::Integer && token.lexeme == "2"));
    }

    #[test]
    fn definition_region_markers() {
        assert_eq!(
            kinds("<define><!define>"),
            vec![
                TokenKind::Less,
                TokenKind::Identifier,
                TokenKind::Greater,
                TokenKind::Less,
                TokenKind::Bang,
                TokenKind::Identifier,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }
}
