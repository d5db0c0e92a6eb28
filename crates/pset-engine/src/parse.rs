//! Wire-format parser
//!
//! Reads the canonical text produced by the serializer back into a
//! [`Process`] in state `Building`. `#` starts a comment that runs to the
//! end of the line.

use std::ops::Range;

use logos::Logos;

use crate::error::{ConfigError, Result};
use crate::node::{Node, Role};
use crate::path::{PathExpr, Schedule, Task};
use crate::process::Process;
use crate::pset::{Parameter, ParameterSet};
use crate::types::{Value, ValueKind};

/// Wire-format token
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Eq,
    #[token("*")]
    Star,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("~")]
    Tilde,

    /// Integer literal, kept as text until the declared width is known
    #[regex(r"-?[0-9]+", |lex| lex.slice().to_string())]
    Int(String),

    /// Float literal
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().to_string())]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().to_string())]
    Float(String),

    /// Quoted string, unescaped
    #[regex(r#""([^"\\]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),

    /// Identifier, keyword, type name or `@`-name such as `@class`
    #[regex(r"[A-Za-z_@][A-Za-z0-9_@]*", |lex| lex.slice().to_string())]
    Ident(String),
}

/// Strip quotes and resolve `\\ \" \n \t \r \u{..}`
fn unescape(quoted: &str) -> Option<String> {
    let inner = quoted.get(1..quoted.len().checked_sub(1)?)?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'u' => {
                if chars.next()? != '{' {
                    return None;
                }
                let mut hex = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        h => hex.push(h),
                    }
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Parse the canonical text form of a process
pub fn parse_process(text: &str) -> Result<Process> {
    let mut tokens = Vec::new();
    let mut lexer = Token::lexer(text);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => {
                let span = lexer.span();
                return Err(ConfigError::parse(
                    "process text",
                    lexer.slice(),
                    format!("line {}: unrecognized token", line_of(text, span.start)),
                ));
            }
        }
    }
    let mut parser = Parser {
        src: text,
        tokens,
        pos: 0,
    };
    parser.process()
}

fn line_of(text: &str, offset: usize) -> usize {
    text.get(..offset).map_or(1, |s| s.matches('\n').count() + 1)
}

struct Parser<'s> {
    src: &'s str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: impl Into<String>) -> ConfigError {
        let (input, line) = match self.tokens.get(self.pos) {
            Some((_, span)) => (
                self.src.get(span.clone()).unwrap_or("").to_string(),
                line_of(self.src, span.start),
            ),
            None => ("<end of input>".to_string(), line_of(self.src, self.src.len())),
        };
        ConfigError::parse("process text", input, format!("line {}: {}", line, reason.into()))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(name)) => Some(name),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(format!("expected {}", what))),
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        if self.peek_ident() == Some(keyword) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", keyword)))
        }
    }

    fn process(&mut self) -> Result<Process> {
        self.keyword("process")?;
        let name = self.ident("process name")?;
        let mut process = Process::bare(name, Default::default());
        self.expect(Token::LBrace, "'{'")?;

        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            let item = self.ident("a declaration or '}'")?;
            match item.as_str() {
                "eras" => {
                    self.expect(Token::Eq, "'='")?;
                    for era in self.string_list()? {
                        process.eras.insert(era);
                    }
                }
                "pset" => {
                    let tracked = self.track()?;
                    let name = self.ident("PSet name")?;
                    self.expect(Token::Eq, "'='")?;
                    let pset = self.pset()?;
                    let param = Parameter::tracked(pset).with_tracked(tracked);
                    process.set_pset(name, param)?;
                }
                "path" | "endpath" | "sequence" => {
                    let name = self.ident("path name")?;
                    self.expect(Token::Eq, "'='")?;
                    self.expect(Token::LBrace, "'{'")?;
                    let expr = if self.eat(&Token::RBrace) {
                        PathExpr::empty()
                    } else {
                        let expr = self.expr()?;
                        self.expect(Token::RBrace, "'}'")?;
                        expr
                    };
                    match item.as_str() {
                        "path" => process.add_path(name, expr)?,
                        "endpath" => process.add_end_path(name, expr)?,
                        _ => process.add_sequence(name, expr)?,
                    }
                }
                "task" => {
                    let name = self.ident("task name")?;
                    self.expect(Token::Eq, "'='")?;
                    let members = self.name_list(Token::LBrace, Token::RBrace)?;
                    process.add_task(name, Task::new(members))?;
                }
                "schedule" => {
                    self.expect(Token::Eq, "'='")?;
                    let paths = self.name_list(Token::LBracket, Token::RBracket)?;
                    let mut schedule = Schedule::new(paths);
                    if self.peek_ident() == Some("tasks") {
                        self.pos += 1;
                        self.expect(Token::Eq, "'='")?;
                        schedule = schedule.with_tasks(self.name_list(Token::LBracket, Token::RBracket)?);
                    }
                    process.set_schedule(schedule)?;
                }
                keyword => {
                    let role = Role::from_keyword(keyword).ok_or_else(|| {
                        self.error(format!("unknown declaration '{}'", keyword))
                    })?;
                    let name = self.ident("label")?;
                    self.expect(Token::Eq, "'='")?;
                    let pset = self.pset()?;
                    let node = Node::from_pset(role, pset)
                        .map_err(|e| e.prefixed(&name).prefixed("process"))?;
                    if role.is_keyed_by_class() && node.class() == name {
                        process.add_unlabeled(node)?;
                    } else {
                        process.add(name, node)?;
                    }
                }
            }
        }

        if self.pos < self.tokens.len() {
            return Err(self.error("unexpected input after process"));
        }
        Ok(process)
    }

    fn track(&mut self) -> Result<bool> {
        match self.peek_ident() {
            Some("T") => {
                self.pos += 1;
                Ok(true)
            }
            Some("U") => {
                self.pos += 1;
                Ok(false)
            }
            _ => Err(self.error("expected tracked marker 'T' or 'U'")),
        }
    }

    fn string_list(&mut self) -> Result<Vec<String>> {
        self.expect(Token::LBracket, "'['")?;
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(items);
        }
        loop {
            match self.advance() {
                Some(Token::Str(s)) => items.push(s),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected a string"));
                }
            }
            if self.eat(&Token::RBracket) {
                return Ok(items);
            }
            self.expect(Token::Comma, "',' or ']'")?;
        }
    }

    fn name_list(&mut self, open: Token, close: Token) -> Result<Vec<String>> {
        self.expect(open, "list")?;
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.ident("name")?);
            if self.eat(&close) {
                return Ok(items);
            }
            self.expect(Token::Comma, "',' or end of list")?;
        }
    }

    fn expr(&mut self) -> Result<PathExpr> {
        let mut acc = self.term()?;
        while self.eat(&Token::Plus) {
            acc = acc.group(self.term()?);
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<PathExpr> {
        let mut acc = self.factor()?;
        while self.eat(&Token::Star) {
            acc = acc.seq(self.factor()?);
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<PathExpr> {
        if self.eat(&Token::Tilde) {
            return Ok(self.factor()?.negate());
        }
        if self.eat(&Token::LParen) {
            let inner = self.expr()?;
            self.expect(Token::RParen, "')'")?;
            return Ok(inner);
        }
        Ok(PathExpr::Leaf(self.ident("module label")?))
    }

    fn pset(&mut self) -> Result<ParameterSet> {
        self.expect(Token::LBrace, "'{'")?;
        let mut pset = ParameterSet::new();
        while !self.eat(&Token::RBrace) {
            let tracked = self.track()?;
            let name = self.ident("parameter name")?;
            self.expect(Token::Colon, "':'")?;
            let type_name = self.ident("type name")?;
            let kind = ValueKind::from_type_name(&type_name)
                .ok_or_else(|| self.error(format!("unknown type '{}'", type_name)))?;
            self.expect(Token::Eq, "'='")?;
            let param = if self.peek_ident() == Some("@none") {
                self.pos += 1;
                Parameter::optional(kind, tracked)
            } else {
                let value = self.value(kind).map_err(|e| e.prefixed(&name))?;
                Parameter::tracked(value).with_tracked(tracked)
            };
            if pset.has(&name) {
                return Err(self.error(format!("duplicate parameter '{}'", name)));
            }
            pset.set(name, param);
        }
        Ok(pset)
    }

    fn value(&mut self, kind: ValueKind) -> Result<Value> {
        match kind {
            ValueKind::PSet => Ok(Value::PSet(self.pset()?)),
            ValueKind::VPSet => {
                self.expect(Token::LBracket, "'['")?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.pset()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma, "',' or ']'")?;
                    }
                }
                Ok(Value::VPSet(items))
            }
            vector if vector.is_vector() => {
                let element = vector
                    .element_kind()
                    .ok_or_else(|| self.error("expected a vector type"))?;
                self.expect(Token::LBracket, "'['")?;
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        let index = items.len();
                        let item = self
                            .leaf(element)
                            .map_err(|e| e.prefixed(&format!("[{}]", index)))?;
                        items.push(item);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma, "',' or ']'")?;
                    }
                }
                Value::from_elements(vector, items)
            }
            scalar => self.leaf(scalar),
        }
    }

    fn leaf(&mut self, kind: ValueKind) -> Result<Value> {
        let token = self
            .advance()
            .ok_or_else(|| self.error(format!("expected a {} value", kind)))?;
        let value = match (kind, token) {
            (ValueKind::Bool, Token::Ident(word)) if word == "true" => Value::Bool(true),
            (ValueKind::Bool, Token::Ident(word)) if word == "false" => Value::Bool(false),
            (k, Token::Int(text)) if k.is_integer() => integer(&text)?.coerce_to(k)?,
            (ValueKind::Double, Token::Int(text) | Token::Float(text)) => {
                Value::Double(text.parse::<f64>().map_err(|_| {
                    ConfigError::parse("double", text.as_str(), "not a number")
                })?)
            }
            (ValueKind::Double, sign @ (Token::Plus | Token::Minus)) => {
                let word = self.ident("inf or nan")?;
                match (sign, word.as_str()) {
                    (Token::Plus, "inf") => Value::Double(f64::INFINITY),
                    (Token::Minus, "inf") => Value::Double(f64::NEG_INFINITY),
                    (_, "nan") => Value::Double(f64::NAN),
                    _ => return Err(self.error("expected inf or nan")),
                }
            }
            (ValueKind::String, Token::Str(s)) => Value::String(s),
            (ValueKind::InputTag, Token::Str(s)) => Value::InputTag(s.parse()?),
            (ValueKind::EventId, Token::Str(s)) => Value::EventId(s.parse()?),
            (ValueKind::EventRange, Token::Str(s)) => Value::EventRange(s.parse()?),
            (ValueKind::FileInPath, Token::Str(s)) => Value::FileInPath(s.parse()?),
            _ => {
                self.pos -= 1;
                return Err(self.error(format!("expected a {} value", kind)));
            }
        };
        Ok(value)
    }
}

/// Integer literal as the narrowest signed or unsigned 64-bit value
fn integer(text: &str) -> Result<Value> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Value::Int64(n));
    }
    text.parse::<u64>().map(Value::UInt64).map_err(|_| ConfigError::Range {
        path: String::new(),
        value: text.to_string(),
        kind: "uint64".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputTag;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).filter_map(|result| result.ok()).collect()
    }

    #[test]
    fn test_lexer_tokens() {
        assert_eq!(
            lex(r#"T @class: string = "A\"b" # comment"#),
            vec![
                Token::Ident("T".to_string()),
                Token::Ident("@class".to_string()),
                Token::Colon,
                Token::Ident("string".to_string()),
                Token::Eq,
                Token::Str("A\"b".to_string()),
            ]
        );
        assert_eq!(
            lex("-1 1.5 -2e-3 -inf"),
            vec![
                Token::Int("-1".to_string()),
                Token::Float("1.5".to_string()),
                Token::Float("-2e-3".to_string()),
                Token::Minus,
                Token::Ident("inf".to_string()),
            ]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#""a\nb\u{1f600}""#).as_deref(), Some("a\nb\u{1f600}"));
        assert_eq!(unescape(r#""bad\q""#), None);
    }

    #[test]
    fn test_parse_minimal() {
        let text = r#"
            # a reader job
            process Reader {
              pset U maxEvents = { U input: int32 = -1 }
              source source = {
                T @class: string = "EmptySource"
                T firstRun: uint32 = 1   # first run
              }
              analyzer reader = { T @class: string = "SiStripQualityStatistics" }
              service MessageLogger = { T @class: string = "MessageLogger" }
              path p1 = { reader }
            }
        "#;
        let process = parse_process(text).unwrap();
        assert_eq!(process.name(), "Reader");
        assert_eq!(process.source().unwrap().class(), "EmptySource");
        assert_eq!(
            process.param("maxEvents.input").unwrap().value(),
            Some(&Value::Int32(-1))
        );
        assert_eq!(process.get("MessageLogger").unwrap().label(), None);
        assert_eq!(process.path("p1").unwrap().expr, PathExpr::Leaf("reader".to_string()));
        assert!(process.options().is_err());
    }

    #[test]
    fn test_parse_values() {
        let text = r#"process P {
          producer a = {
            T @class: string = "X"
            T d: double = 170
            T inf: vdouble = [+inf, -inf, +nan, 1e-7]
            T tags: vInputTag = ["a:b", "c::HLT"]
            U maybe: vstring = @none
            T big: uint64 = 18446744073709551615
          }
        }"#;
        let process = parse_process(text).unwrap();
        let node = process.get("a").unwrap();
        assert_eq!(node.value("d").unwrap(), &Value::Double(170.0));
        match node.value("inf").unwrap() {
            Value::VDouble(v) => {
                assert_eq!(v[0], f64::INFINITY);
                assert_eq!(v[1], f64::NEG_INFINITY);
                assert!(v[2].is_nan());
                assert_eq!(v[3], 1e-7);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            node.value("tags").unwrap(),
            &Value::VInputTag(vec![InputTag::new("a", "b", ""), InputTag::new("c", "", "HLT")])
        );
        assert!(!node.get("maybe").unwrap().is_present());
        assert_eq!(node.value("big").unwrap(), &Value::UInt64(u64::MAX));
    }

    #[test]
    fn test_parse_path_expressions() {
        let text = r#"process P {
          filter f = { T @class: string = "F" }
          producer a = { T @class: string = "A" }
          producer b = { T @class: string = "B" }
          path p = { ~f * a + b }
          path q = { f * (a + b) }
          endpath e = {}
          schedule = [p, q, e]
        }"#;
        let process = parse_process(text).unwrap();
        let p = &process.path("p").unwrap().expr;
        assert_eq!(p.to_string(), "~f * a + b");
        assert!(matches!(p, PathExpr::Group(items) if items.len() == 2));
        assert_eq!(process.path("q").unwrap().expr.to_string(), "f * (a + b)");
        assert!(process.path("e").unwrap().expr.is_empty());
        assert_eq!(process.effective_schedule(), vec!["p", "q", "e"]);
    }

    #[test]
    fn test_negated_empty_path_parses_back() {
        let mut process = Process::new("P");
        process.add("source", Node::source("EmptySource")).unwrap();
        process
            .add_path("p", PathExpr::Not(Box::new(PathExpr::empty())))
            .unwrap();
        process.add_end_path("e", !PathExpr::empty()).unwrap();
        let out = process.serialize().unwrap();
        assert!(out.text.contains("path p = {}"));
        assert!(out.text.contains("endpath e = {}"));

        let mut parsed = parse_process(&out.text).unwrap();
        assert!(parsed.path("p").unwrap().expr.is_empty());
        assert_eq!(parsed.serialize().unwrap().text, out.text);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_process("process P { producer a = { T x: int32 = 1 } }"),
            Err(ConfigError::NotFound { path }) if path == "process.a.@class"
        ));
        assert!(matches!(
            parse_process("process P { producer a = { T @class: string = \"A\" T x: int32 = 3000000000 } }"),
            Err(ConfigError::Range { path, .. }) if path == "x"
        ));
        assert!(matches!(
            parse_process("process P { widget a = {} }"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            parse_process("process P { producer a = { T x: nosuch = 1 } }"),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(parse_process("process P {"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse_process("process P {} extra"), Err(ConfigError::Parse { .. })));
        assert!(matches!(parse_process("process P { $ }"), Err(ConfigError::Parse { .. })));
    }
}
