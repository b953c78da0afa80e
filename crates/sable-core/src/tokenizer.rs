use phf::phf_map;

use crate::SourceMap;

#[derive(PartialEq, Clone, Debug, Copy)]
#[repr(u8)]
pub enum TokenType {
    LeftParen,     // (
    RightParen,    // )
    LeftBrace,     // {
    RightBrace,    // }
    Comma,         // ,
    Dot,           // .
    Minus,         // -
    Plus,          // +
    Semicolon,     // ;
    Slash,         // /
    Star,          // *
    Bang,          // !
    BangEquals,    // !=
    Equals,        // =
    EqualsEquals,  // ==
    Greater,       // >
    GreaterEquals, // >=
    Less,          // <
    LessEquals,    // <=
    Identifier,
    String,
    Number,
    And,    // and
    Class,  // class
    Else,   // else
    False,  // false
    For,    // for
    Fun,    // fun
    If,     // if
    Nil,    // nil
    Or,     // or
    Print,  // print
    Return, // return
    Super,  // super
    This,   // this
    True,   // true
    Var,    // var
    While,  // while
    Error,  // emitted when tokenization fails
    Eof,
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

impl TokenType {
    pub fn from_keyword(keyword: &str) -> TokenType {
        *KEYWORDS.get(keyword).unwrap_or(&TokenType::Identifier)
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Token {
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
    pub error_message: Option<String>,
}

impl Token {
    pub fn lexeme<'a>(&self, source_map: &'a SourceMap) -> &'a [char] {
        &source_map.get_source()[self.start..self.end]
    }
}

#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    source_map: &'a SourceMap,
    location: usize,
    is_eof: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source_map: &'a SourceMap) -> Self {
        Self {
            source_map,
            location: 0,
            is_eof: false,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace();

        if self.is_at_end() {
            if self.is_eof {
                return None;
            }
            self.is_eof = true;
            return Some(self.make_token(TokenType::Eof, self.location));
        }

        let start = self.location;
        let c = self.advance();

        let token = match c {
            '(' => self.make_token(TokenType::LeftParen, start),
            ')' => self.make_token(TokenType::RightParen, start),
            '{' => self.make_token(TokenType::LeftBrace, start),
            '}' => self.make_token(TokenType::RightBrace, start),
            ',' => self.make_token(TokenType::Comma, start),
            '.' => self.make_token(TokenType::Dot, start),
            ';' => self.make_token(TokenType::Semicolon, start),
            '+' => self.make_token(TokenType::Plus, start),
            '-' => self.make_token(TokenType::Minus, start),
            '*' => self.make_token(TokenType::Star, start),
            '/' => self.make_token(TokenType::Slash, start),
            '!' if self.match_char('=') => self.make_token(TokenType::BangEquals, start),
            '!' => self.make_token(TokenType::Bang, start),
            '=' if self.match_char('=') => self.make_token(TokenType::EqualsEquals, start),
            '=' => self.make_token(TokenType::Equals, start),
            '<' if self.match_char('=') => self.make_token(TokenType::LessEquals, start),
            '<' => self.make_token(TokenType::Less, start),
            '>' if self.match_char('=') => self.make_token(TokenType::GreaterEquals, start),
            '>' => self.make_token(TokenType::Greater, start),
            '"' => self.string(start),
            c if c.is_ascii_digit() => self.number(start),
            c if c.is_alphabetic() || c == '_' => self.identifier(start),
            c => self.make_error_token(format!("Unexpected character '{}'.", c), start),
        };

        Some(token)
    }

    fn string(&mut self, start: usize) -> Token {
        while !self.is_at_end() && self.peek_char() != '"' {
            self.advance();
        }

        if self.is_at_end() {
            return self.make_error_token("Unterminated string.".to_string(), start);
        }

        self.advance(); // closing quote
        self.make_token(TokenType::String, start)
    }

    fn number(&mut self, start: usize) -> Token {
        while !self.is_at_end() && self.peek_char().is_ascii_digit() {
            self.advance();
        }

        if !self.is_at_end()
            && self.peek_char() == '.'
            && self
                .peek_next_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            self.advance(); // consume '.'
            while !self.is_at_end() && self.peek_char().is_ascii_digit() {
                self.advance();
            }
        }

        self.make_token(TokenType::Number, start)
    }

    fn identifier(&mut self, start: usize) -> Token {
        while !self.is_at_end() && {
            let c = self.peek_char();
            c.is_alphanumeric() || c == '_'
        } {
            self.advance();
        }

        let lexeme: String = self.source_map.get_source()[start..self.location]
            .iter()
            .collect();
        self.make_token(TokenType::from_keyword(&lexeme), start)
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            match self.peek_char() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.advance();
                }
                '/' if self.peek_next_char() == Some('/') => {
                    while !self.is_at_end() && self.peek_char() != '\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, token_type: TokenType, start: usize) -> Token {
        Token {
            token_type,
            start,
            end: self.location,
            error_message: None,
        }
    }

    fn make_error_token(&self, message: String, start: usize) -> Token {
        Token {
            token_type: TokenType::Error,
            start,
            end: self.location,
            error_message: Some(message),
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source_map.get_source()[self.location];
        self.location += 1;
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek_char() != expected {
            return false;
        }
        self.location += 1;
        true
    }

    fn peek_char(&self) -> char {
        self.source_map.get_source()[self.location]
    }

    fn peek_next_char(&self) -> Option<char> {
        self.source_map.get_source().get(self.location + 1).copied()
    }

    fn is_at_end(&self) -> bool {
        self.location >= self.source_map.get_source().len()
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}
