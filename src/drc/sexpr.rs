//! S-expression reader for rule files
//!
//! Produces a position-tagged tree; interpretation of the tree into rules
//! lives in `rule`.

use super::error::ParseError;

/// A parsed s-expression node with the position of its first character
#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    Atom { text: String, line: usize, column: usize },
    Str { text: String, line: usize, column: usize },
    List { items: Vec<SExp>, line: usize, column: usize },
}

impl SExp {
    pub fn position(&self) -> (usize, usize) {
        match self {
            SExp::Atom { line, column, .. }
            | SExp::Str { line, column, .. }
            | SExp::List { line, column, .. } => (*line, *column),
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            SExp::Atom { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Atom or quoted string contents
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SExp::Atom { text, .. } | SExp::Str { text, .. } => Some(text),
            SExp::List { .. } => None,
        }
    }

    /// Head symbol of a list, e.g. `rule` for `(rule ...)`
    pub fn head(&self) -> Option<&str> {
        self.as_list().and_then(|l| l.first()).and_then(|s| s.as_atom())
    }

    pub fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.position();
        ParseError::new(line, column, message)
    }
}

struct Reader<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self { chars: text.chars().peekable(), line: 1, column: 1 }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                // Comment runs to end of line
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_node(&mut self) -> Result<SExp, ParseError> {
        self.skip_trivia();
        let (line, column) = (self.line, self.column);
        match self.peek() {
            None => Err(ParseError::new(line, column, "unexpected end of input")),
            Some('(') => {
                self.bump();
                let mut items = Vec::new();
                loop {
                    self.skip_trivia();
                    match self.peek() {
                        None => {
                            return Err(ParseError::new(line, column, "missing ')'"));
                        }
                        Some(')') => {
                            self.bump();
                            return Ok(SExp::List { items, line, column });
                        }
                        Some(_) => items.push(self.read_node()?),
                    }
                }
            }
            Some(')') => Err(ParseError::new(line, column, "unexpected ')'")),
            Some('"') => {
                self.bump();
                let mut text = String::new();
                loop {
                    match self.bump() {
                        None => {
                            return Err(ParseError::new(line, column, "unterminated string"));
                        }
                        Some('"') => return Ok(SExp::Str { text, line, column }),
                        Some('\\') => match self.bump() {
                            Some('n') => text.push('\n'),
                            Some(c) => text.push(c),
                            None => {
                                return Err(ParseError::new(line, column, "unterminated string"));
                            }
                        },
                        Some(c) => text.push(c),
                    }
                }
            }
            Some(_) => {
                let mut text = String::new();
                while let Some(c) = self.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' || c == '"' {
                        break;
                    }
                    text.push(c);
                    self.bump();
                }
                Ok(SExp::Atom { text, line, column })
            }
        }
    }
}

/// Parse every top-level expression in `text`
pub fn parse_sexprs(text: &str) -> Result<Vec<SExp>, ParseError> {
    let mut reader = Reader::new(text);
    let mut nodes = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.peek().is_none() {
            return Ok(nodes);
        }
        nodes.push(reader.read_node()?);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_lists_and_strings() {
        let nodes = parse_sexprs("(rule \"a b\" (constraint clearance (min 0.2mm)))").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].head(), Some("rule"));
        let items = nodes[0].as_list().unwrap();
        assert_eq!(items[1].as_text(), Some("a b"));
        assert_eq!(items[2].head(), Some("constraint"));
    }

    #[test]
    fn test_comments_and_positions() {
        let nodes = parse_sexprs("# header\n  (version 1)\n").unwrap();
        assert_eq!(nodes[0].position(), (2, 3));
    }

    #[test]
    fn test_unbalanced_input_reports_position() {
        let err = parse_sexprs("(rule \"x\"\n  (condition \"A.Type == 'Via'\")").unwrap_err();
        assert_eq!((err.line, err.column), (1, 1));
        assert!(err.message.contains("missing"));

        let err = parse_sexprs("(version 1))").unwrap_err();
        assert_eq!((err.line, err.column), (1, 12));
    }
}
