//! # Response Filter
//!
//! JSONPath subset applied to fetched JSON bodies.
//!
//! | Syntax | Selects |
//! |--------|---------|
//! | `$` | root |
//! | `.name`, `['name']` | object member |
//! | `[i]` | array element, negative counts from the end |
//! | `[*]`, `.*` | every child |
//! | `..name`, `..*` | recursive descent |
//!
//! The result is the compact JSON array of selected values.
//!
//! Expressions come from request authors, so evaluation is bounded: at most
//! [`MAX_SELECTED`] values per step and a caller-supplied cap on the output
//! size. Exceeding either is a `FilterError`.

use crate::error::FetchError;
use serde_json::Value;
use std::io;

/// Deepest nesting followed by recursive descent.
const MAX_DEPTH: usize = 64;

/// Most values any single step may select.
pub const MAX_SELECTED: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Child(String),
    Index(i64),
    Wildcard,
    Descendant(String),
    DescendantWildcard,
}

/// Parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse an expression such as `$.data[0].price`.
    pub fn parse(expr: &str) -> Result<Self, FetchError> {
        let mut parser = Parser {
            chars: expr.trim().chars().collect(),
            pos: 0,
        };
        parser.expect('$')?;

        let mut segments = Vec::new();
        while let Some(c) = parser.peek() {
            match c {
                '.' => {
                    parser.pos += 1;
                    if parser.eat('.') {
                        segments.push(if parser.eat('*') {
                            Segment::DescendantWildcard
                        } else {
                            Segment::Descendant(parser.name()?)
                        });
                    } else if parser.eat('*') {
                        segments.push(Segment::Wildcard);
                    } else {
                        segments.push(Segment::Child(parser.name()?));
                    }
                }
                '[' => {
                    parser.pos += 1;
                    segments.push(parser.bracket()?);
                    parser.expect(']')?;
                }
                other => {
                    return Err(filter_error(format!(
                        "unexpected '{}' at {}",
                        other, parser.pos
                    )))
                }
            }
        }
        Ok(Self { segments })
    }

    /// Select matching values from `root`.
    ///
    /// Fails once a step selects more than `limit` values.
    pub fn select<'a>(
        &self,
        root: &'a Value,
        limit: usize,
    ) -> Result<Vec<&'a Value>, FetchError> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Selection {
                values: Vec::new(),
                limit,
            };
            for value in current {
                match segment {
                    Segment::Child(name) => {
                        if let Some(child) = value.get(name.as_str()) {
                            next.push(child)?;
                        }
                    }
                    Segment::Index(index) => {
                        if let Value::Array(items) = value {
                            let len = items.len() as i64;
                            let at = if *index < 0 { len + index } else { *index };
                            if (0..len).contains(&at) {
                                next.push(&items[at as usize])?;
                            }
                        }
                    }
                    Segment::Wildcard => {
                        for child in children(value) {
                            next.push(child)?;
                        }
                    }
                    Segment::Descendant(name) => descend(value, Some(name), 0, &mut next)?,
                    Segment::DescendantWildcard => descend(value, None, 0, &mut next)?,
                }
            }
            current = next.values;
        }
        Ok(current)
    }
}

/// Apply `expr` to a JSON body and return at most `max_output` filtered bytes.
pub fn apply(body: &[u8], expr: &str, max_output: usize) -> Result<Vec<u8>, FetchError> {
    let path = JsonPath::parse(expr)?;
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| filter_error(format!("body is not JSON: {}", e)))?;
    let selected = path.select(&root, MAX_SELECTED)?;

    let mut out = BoundedWriter {
        buf: Vec::new(),
        max: max_output,
    };
    serde_json::to_writer(&mut out, &selected).map_err(|e| filter_error(e.to_string()))?;
    Ok(out.buf)
}

fn filter_error(reason: String) -> FetchError {
    FetchError::FilterError(reason)
}

struct Selection<'a> {
    values: Vec<&'a Value>,
    limit: usize,
}

impl<'a> Selection<'a> {
    fn push(&mut self, value: &'a Value) -> Result<(), FetchError> {
        if self.values.len() >= self.limit {
            return Err(filter_error(format!(
                "expression selects more than {} values",
                self.limit
            )));
        }
        self.values.push(value);
        Ok(())
    }
}

/// Serialization sink that refuses to grow past `max` bytes.
struct BoundedWriter {
    buf: Vec<u8>,
    max: usize,
}

impl io::Write for BoundedWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.buf.len() + data.len() > self.max {
            return Err(io::Error::other(format!(
                "filtered result exceeds {} bytes",
                self.max
            )));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn children(value: &Value) -> Vec<&Value> {
    match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

fn descend<'a>(
    value: &'a Value,
    name: Option<&str>,
    depth: usize,
    out: &mut Selection<'a>,
) -> Result<(), FetchError> {
    if depth > MAX_DEPTH {
        return Ok(());
    }
    if let (Some(name), Value::Object(map)) = (name, value) {
        if let Some(found) = map.get(name) {
            out.push(found)?;
        }
    }
    for child in children(value) {
        if name.is_none() {
            out.push(child)?;
        }
        descend(child, name, depth + 1, out)?;
    }
    Ok(())
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), FetchError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(filter_error(format!("expected '{}' at {}", c, self.pos)))
        }
    }

    fn name(&mut self) -> Result<String, FetchError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '$' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(filter_error(format!("expected member name at {}", start)));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn bracket(&mut self) -> Result<Segment, FetchError> {
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(Segment::Wildcard)
            }
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                let name: String = self.chars[start..self.pos].iter().collect();
                self.expect(quote)?;
                Ok(Segment::Child(name))
            }
            _ => {
                let start = self.pos;
                self.eat('-');
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                digits
                    .parse()
                    .map(Segment::Index)
                    .map_err(|_| filter_error(format!("invalid index '{}' at {}", digits, start)))
            }
        }
    }
}
