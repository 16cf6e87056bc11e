//! Shared lexer for every input syntax.
//!
//! Produces a flat token stream with byte offsets; each dialect parser
//! walks it through a [`Cursor`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, one_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{pair, tuple},
    IResult,
};

use crate::ast::Value;
use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword, possibly dotted (`m.title`, `db.movies`)
    Word(String),
    Number(String),
    /// Quoted literal, quotes removed and escapes resolved
    Str(String),
    Symbol(String),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) | Token::Number(w) | Token::Symbol(w) => write!(f, "{}", w),
            Token::Str(s) => write!(f, "'{}'", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Dialect switches for the lexer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexOptions {
    /// `->` and `<-` are single tokens
    pub arrows: bool,
    /// `$` may start a word (`$gt`, `$sum`)
    pub dollar_words: bool,
    /// `--` and `//` start a line comment
    pub comments: bool,
}

impl LexOptions {
    pub fn sql() -> Self {
        Self {
            comments: true,
            ..Self::default()
        }
    }

    pub fn pattern() -> Self {
        Self {
            arrows: true,
            ..Self::default()
        }
    }

    pub fn mongo() -> Self {
        Self {
            dollar_words: true,
            ..Self::default()
        }
    }
}

/// Collapse whitespace runs outside quoted literals into one blank.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut quote: Option<char> = None;
    let mut blank = false;
    for c in text.trim().chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                out.push(c);
            }
            None if c.is_whitespace() => blank = true,
            None => {
                if blank {
                    out.push(' ');
                    blank = false;
                }
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }
    out
}

fn ws_or_comment(comments: bool) -> impl Fn(&str) -> IResult<&str, ()> {
    move |input| {
        if comments {
            value(
                (),
                many0(alt((
                    value((), multispace1),
                    value((), pair(alt((tag("--"), tag("//"))), not_line_ending)),
                ))),
            )(input)
        } else {
            value((), many0(multispace1))(input)
        }
    }
}

fn ident(dollar: bool) -> impl Fn(&str) -> IResult<&str, &str> {
    move |input| {
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_' || (dollar && c == '$')),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        ))(input)
    }
}

/// `a`, `a.b`, `a.*`
fn word(dollar: bool) -> impl Fn(&str) -> IResult<&str, Token> {
    move |input| {
        map(
            recognize(pair(
                ident(dollar),
                many0(pair(char('.'), alt((ident(dollar), tag("*"))))),
            )),
            |w: &str| Token::Word(w.to_string()),
        )(input)
    }
}

fn number(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((digit1, opt(pair(char('.'), digit1))))),
        |n: &str| Token::Number(n.to_string()),
    )(input)
}

/// Quoted literal. A doubled quote or a backslash escapes the next char.
fn string(input: &str) -> IResult<&str, Token> {
    let (rest, quote) = one_of("'\"")(input)?;
    let mut text = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            if let Some((_, escaped)) = chars.next() {
                text.push(escaped);
            }
            continue;
        }
        if c == quote {
            if matches!(chars.peek(), Some((_, next)) if *next == quote) {
                chars.next();
                text.push(quote);
                continue;
            }
            return Ok((&rest[i + c.len_utf8()..], Token::Str(text)));
        }
        text.push(c);
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

fn arrow(input: &str) -> IResult<&str, &str> {
    alt((tag("->"), tag("<-")))(input)
}

fn pair_symbol(input: &str) -> IResult<&str, &str> {
    alt((
        tag("<="),
        tag(">="),
        tag("<>"),
        tag("!="),
        tag("=="),
        tag("||"),
    ))(input)
}

fn single_symbol(input: &str) -> IResult<&str, &str> {
    recognize(one_of("()[]{},;:=<>+-*/%?^!@$|.~"))(input)
}

fn symbol(arrows: bool) -> impl Fn(&str) -> IResult<&str, Token> {
    move |input| {
        let (rest, s) = if arrows {
            alt((arrow, pair_symbol, single_symbol))(input)?
        } else {
            alt((pair_symbol, single_symbol))(input)?
        };
        Ok((rest, Token::Symbol(s.to_string())))
    }
}

/// Split `text` into tokens. Offsets are byte positions in `text`.
pub fn tokenize(text: &str, options: LexOptions) -> QueryResult<Vec<Spanned>> {
    let skip = ws_or_comment(options.comments);
    let word = word(options.dollar_words);
    let symbol = symbol(options.arrows);
    let mut tokens = Vec::new();
    let mut input = text;
    loop {
        let (rest, _) = skip(input)
            .map_err(|_| QueryError::parse(text.len() - input.len(), "bad comment"))?;
        input = rest;
        if input.is_empty() {
            break;
        }
        let start = text.len() - input.len();
        let (rest, token) = alt((&word, number, string, &symbol))(input).map_err(|_| {
            let c = input.chars().next().unwrap_or(' ');
            QueryError::parse(start, format!("unexpected character '{}'", c))
        })?;
        input = rest;
        tokens.push(Spanned {
            token,
            start,
            end: text.len() - input.len(),
        });
    }
    tracing::trace!(count = tokens.len(), "tokenized");
    Ok(tokens)
}

/// Position-tracking walk over a token stream.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    source: &'a str,
    tokens: Vec<Spanned>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(source: &'a str, options: LexOptions) -> QueryResult<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source, options)?,
            pos: 0,
        })
    }

    pub fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    pub fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|s| &s.token)
    }

    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.is_keyword_at(0, keyword)
    }

    pub fn is_keyword_at(&self, ahead: usize, keyword: &str) -> bool {
        matches!(self.peek_at(ahead), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.pos += 1;
            return true;
        }
        false
    }

    /// Consume a multi-word keyword such as `GROUP BY`.
    pub fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        if keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.is_keyword_at(i, kw))
        {
            self.pos += keywords.len();
            return true;
        }
        false
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> QueryResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", keyword)))
        }
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.is_symbol_at(0, symbol)
    }

    pub fn is_symbol_at(&self, ahead: usize, symbol: &str) -> bool {
        matches!(self.peek_at(ahead), Some(Token::Symbol(s)) if s == symbol)
    }

    pub fn eat_symbol(&mut self, symbol: &str) -> bool {
        if self.is_symbol(symbol) {
            self.pos += 1;
            return true;
        }
        false
    }

    pub fn expect_symbol(&mut self, symbol: &str) -> QueryResult<()> {
        if self.eat_symbol(symbol) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", symbol)))
        }
    }

    pub fn expect_word(&mut self) -> QueryResult<String> {
        match self.peek() {
            Some(Token::Word(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    /// Literal at the cursor: string, optionally negative number,
    /// `NULL`, `TRUE` or `FALSE`.
    pub fn eat_literal(&mut self) -> Option<Value> {
        let negative = self.is_symbol("-") && matches!(self.peek_at(1), Some(Token::Number(_)));
        if negative {
            self.pos += 1;
        }
        let value = match self.peek()? {
            Token::Number(n) if negative => Value::infer(&format!("-{n}")),
            Token::Number(n) => Value::infer(n),
            Token::Str(s) => Value::String(s.clone()),
            Token::Word(w) if ["null", "true", "false"].contains(&w.to_ascii_lowercase().as_str()) => {
                Value::infer(w)
            }
            _ => return None,
        };
        self.pos += 1;
        Some(value)
    }

    pub fn mark(&self) -> usize {
        self.pos
    }

    pub fn reset(&mut self, mark: usize) {
        self.pos = mark;
    }

    /// Byte offset of the current token (end of input when done).
    pub fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |s| s.start)
    }

    /// Source text covered by tokens `from..self.mark()`.
    pub fn slice(&self, from: usize) -> &'a str {
        let start = self.tokens.get(from).map_or(self.source.len(), |s| s.start);
        let end = self
            .pos
            .checked_sub(1)
            .and_then(|last| self.tokens.get(last))
            .map_or(start, |s| s.end);
        self.source.get(start..end.max(start)).unwrap_or_default()
    }

    pub fn error(&self, message: impl Into<String>) -> QueryError {
        let message = message.into();
        match self.peek() {
            Some(token) => QueryError::parse(self.offset(), format!("{}, found '{}'", message, token)),
            None => QueryError::parse(self.offset(), format!("{}, found end of input", message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str, options: LexOptions) -> Vec<String> {
        tokenize(text, options)
            .unwrap()
            .into_iter()
            .map(|s| s.token.to_string())
            .collect()
    }

    #[test]
    fn test_sql_tokens() {
        assert_eq!(
            words("SELECT m.title, c.* FROM Movie m -- trailing\nWHERE m.year >= 2000", LexOptions::sql()),
            vec!["SELECT", "m.title", ",", "c.*", "FROM", "Movie", "m", "WHERE", "m.year", ">=", "2000"]
        );
    }

    #[test]
    fn test_string_escapes() {
        let tokens = tokenize("'O''Brien' \"say \\\"hi\\\"\"", LexOptions::sql()).unwrap();
        assert_eq!(tokens[0].token, Token::Str("O'Brien".into()));
        assert_eq!(tokens[1].token, Token::Str("say \"hi\"".into()));
    }

    #[test]
    fn test_arrows_only_when_enabled() {
        assert_eq!(
            words("(a)<-[c:Cast]->(m)-->(p)", LexOptions::pattern()),
            vec!["(", "a", ")", "<-", "[", "c", ":", "Cast", "]", "->", "(", "m", ")", "-", "->", "(", "p", ")"]
        );
        assert_eq!(words("a<-1", LexOptions::sql()), vec!["a", "<", "-", "1"]);
    }

    #[test]
    fn test_dollar_words() {
        assert_eq!(
            words("{age:{$gt:45}}", LexOptions::mongo()),
            vec!["{", "age", ":", "{", "$gt", ":", "45", "}", "}"]
        );
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("x = 'open", LexOptions::sql()).unwrap_err();
        assert!(matches!(err, QueryError::Parse { position: 4, .. }));
    }

    #[test]
    fn test_normalize_keeps_quoted_blanks() {
        assert_eq!(normalize("  a \n\t b  'x   y'  "), "a b 'x   y'");
    }

    #[test]
    fn test_cursor_slice() {
        let mut cursor = Cursor::new("CAST(x AS DOUBLE PRECISION)", LexOptions::sql()).unwrap();
        cursor.reset(4);
        let from = cursor.mark();
        cursor.next();
        cursor.next();
        assert_eq!(cursor.slice(from), "DOUBLE PRECISION");
        assert!(cursor.is_symbol(")"));
    }
}
