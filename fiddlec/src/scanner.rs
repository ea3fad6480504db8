pub struct Scanner<'source> {
    source: &'source str,
    start: usize,
    current: usize,
    line: u32,
}

impl<'source> Scanner<'source> {
    pub fn new(source: &'source str) -> Self {
        Self {
            source,
            start: 0,
            current: 0,
            line: 1,
        }
    }

    pub fn scan_token(&mut self) -> Token<'source> {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenType::Eof);
        }

        let token = self.advance();
        match token {
            b'(' => self.make_token(TokenType::LeftParen),
            b')' => self.make_token(TokenType::RightParen),
            b'{' => self.make_token(TokenType::LeftBrace),
            b'}' => self.make_token(TokenType::RightBrace),
            b'[' => self.make_token(TokenType::LeftBracket),
            b']' => self.make_token(TokenType::RightBracket),
            b',' => self.make_token(TokenType::Comma),
            b';' => self.make_token(TokenType::Semicolon),
            b':' => self.make_token(TokenType::Colon),
            b'+' => self.make_token(TokenType::Plus),
            b'-' => self.make_token(TokenType::Minus),
            b'*' => self.make_token(TokenType::Star),
            b'/' => self.make_token(TokenType::Slash),
            b'<' => self.make_token(TokenType::Less),
            b'>' => self.make_token(TokenType::Greater),
            b'=' if self.match_advance(b'=') => self.make_token(TokenType::EqualEqual),
            b'=' => self.make_token(TokenType::Assign),
            b'!' if self.match_advance(b'=') => self.make_token(TokenType::BangEqual),
            b'!' => self.make_token(TokenType::Bang),
            b'"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.identifier(),
            _ => self.error_token("Unexpected character."),
        }
    }

    fn match_advance(&mut self, expected: u8) -> bool {
        if self.is_at_end() {
            return false;
        }
        if self.peek() != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn advance(&mut self) -> u8 {
        self.current += 1;
        self.source.as_bytes()[self.current - 1]
    }

    fn skip_whitespace(&mut self) {
        while !self.is_at_end() {
            let c = self.peek();
            match c {
                // Same line whitespace
                b' ' | b'\r' | b'\t' => {
                    self.advance();
                }
                // Newlines
                b'\n' => {
                    self.line += 1;
                    self.advance();
                }
                // Comments
                b'/' => {
                    if self.peek_next() == b'/' {
                        // A comment goes until the end of the line
                        while !self.is_at_end() && self.peek() != b'\n' {
                            self.advance();
                        }
                    } else {
                        // This slash is actually a token
                        return;
                    }
                }
                _ => {
                    return;
                }
            }
        }
    }

    fn string(&mut self) -> Token<'source> {
        while !self.is_at_end() && self.peek() != b'"' {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string.");
        }

        // The closing quote
        self.advance();
        self.make_token(TokenType::String)
    }

    fn number(&mut self) -> Token<'source> {
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            self.advance();
        }
        self.make_token(TokenType::Int)
    }

    fn identifier(&mut self) -> Token<'source> {
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_') {
            self.advance();
        }
        self.make_token(self.identifier_type())
    }

    fn char_n(&self, n: usize) -> u8 {
        self.source.as_bytes()[self.start + n]
    }

    fn len(&self) -> usize {
        self.current - self.start
    }

    fn identifier_type(&self) -> TokenType {
        match self.char_n(0) {
            b'e' => self.check_keyword(1, "lse", TokenType::Else),
            b'i' => self.check_keyword(1, "f", TokenType::If),
            b'l' => self.check_keyword(1, "et", TokenType::Let),
            b'r' => self.check_keyword(1, "eturn", TokenType::Return),
            b't' => self.check_keyword(1, "rue", TokenType::True),
            b'f' if self.len() > 1 => match self.char_n(1) {
                b'n' => self.check_keyword(2, "", TokenType::Fn),
                b'a' => self.check_keyword(2, "lse", TokenType::False),
                _ => TokenType::Identifier,
            },
            _ => TokenType::Identifier,
        }
    }

    fn check_keyword(&self, start: usize, rest: &str, token_type: TokenType) -> TokenType {
        // Same length
        if self.len() == start + rest.len() {
            let start_index = self.start + start;
            let end_index = start_index + rest.len();
            // Same bytes
            if &self.source.as_bytes()[start_index..end_index] == rest.as_bytes() {
                return token_type;
            }
        }
        TokenType::Identifier
    }

    fn peek(&self) -> u8 {
        self.source.as_bytes()[self.current]
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            b'\0'
        } else {
            self.source.as_bytes()[self.current + 1]
        }
    }

    fn is_at_end(&self) -> bool {
        self.current == self.source.len()
    }

    /// Use start+current pointers in source to create a token
    fn make_token(&self, token_type: TokenType) -> Token<'source> {
        Token {
            token_type,
            lexeme: &self.source[self.start..self.current],
            line: self.line,
        }
    }

    fn error_token(&self, message: &'static str) -> Token<'source> {
        Token {
            token_type: TokenType::Error,
            lexeme: message,
            line: self.line,
        }
    }
}

// Tokens are pretty small, so we'll pass them around by value
#[derive(Clone, Copy, Debug)]
pub struct Token<'source> {
    pub token_type: TokenType,
    pub lexeme: &'source str,
    pub line: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenType {
    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Less,
    Greater,
    EqualEqual,
    BangEqual,

    // Delimiters
    Comma,
    Semicolon,
    Colon,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Literals
    Identifier,
    Int,
    String,

    // Keywords
    Fn,
    Let,
    True,
    False,
    If,
    Else,
    Return,

    Error,
    Eof,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan_all(source: &str) -> Vec<(TokenType, &str)> {
        let mut scanner = Scanner::new(source);
        let mut tokens = vec![];
        loop {
            let token = scanner.scan_token();
            let done = token.token_type == TokenType::Eof;
            tokens.push((token.token_type, token.lexeme));
            if done {
                break;
            }
        }
        tokens
    }

    #[test]
    fn scans_a_representative_snippet() {
        let tokens = scan_all("let add = fn(x, y) { x + y; };");
        assert_eq!(
            tokens,
            vec![
                (TokenType::Let, "let"),
                (TokenType::Identifier, "add"),
                (TokenType::Assign, "="),
                (TokenType::Fn, "fn"),
                (TokenType::LeftParen, "("),
                (TokenType::Identifier, "x"),
                (TokenType::Comma, ","),
                (TokenType::Identifier, "y"),
                (TokenType::RightParen, ")"),
                (TokenType::LeftBrace, "{"),
                (TokenType::Identifier, "x"),
                (TokenType::Plus, "+"),
                (TokenType::Identifier, "y"),
                (TokenType::Semicolon, ";"),
                (TokenType::RightBrace, "}"),
                (TokenType::Semicolon, ";"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn scans_two_char_operators() {
        let tokens = scan_all("== != = !");
        assert_eq!(
            tokens,
            vec![
                (TokenType::EqualEqual, "=="),
                (TokenType::BangEqual, "!="),
                (TokenType::Assign, "="),
                (TokenType::Bang, "!"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn strings_keep_their_quotes_in_the_lexeme() {
        let tokens = scan_all(r#""hello world""#);
        assert_eq!(tokens[0], (TokenType::String, r#""hello world""#));
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        let tokens = scan_all(r#""oops"#);
        assert_eq!(tokens[0].0, TokenType::Error);
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let tokens = scan_all("1 // ignored\n2");
        assert_eq!(
            tokens,
            vec![
                (TokenType::Int, "1"),
                (TokenType::Int, "2"),
                (TokenType::Eof, ""),
            ]
        );
    }

    #[test]
    fn tracks_lines() {
        let mut scanner = Scanner::new("1\n2");
        assert_eq!(scanner.scan_token().line, 1);
        assert_eq!(scanner.scan_token().line, 2);
    }
}
