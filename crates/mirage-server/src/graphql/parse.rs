//! Minimal GraphQL document scanning: enough to find the executable
//! operation's type and name.

use super::OperationType;

/// Type and optional name of the first operation in `query`.
///
/// Fragment definitions are skipped. Returns `None` for documents with no
/// query or mutation (including subscriptions).
pub fn parse_operation(query: &str) -> Option<(OperationType, Option<String>)> {
    select_operation(query, None)
}

/// Type and name of the operation `name` selects, or of the first operation
/// when `name` is `None`.
///
/// Returns `None` when no operation carries that name, or when the selected
/// operation is a subscription.
pub fn select_operation(query: &str, name: Option<&str>) -> Option<(OperationType, Option<String>)> {
    let mut scanner = Scanner::new(query);
    loop {
        scanner.skip_ignored();
        let (keyword, operation_name) = match scanner.peek()? {
            '{' => ("query", None),
            c if is_name_start(c) => {
                let keyword = scanner.name();
                scanner.skip_ignored();
                let operation_name = scanner
                    .peek()
                    .filter(|c| is_name_start(*c))
                    .map(|_| scanner.name());
                (keyword, operation_name)
            }
            _ => return None,
        };

        let selected = match name {
            None => keyword != "fragment",
            Some(name) => keyword != "fragment" && operation_name == Some(name),
        };
        if selected {
            let operation_type = match keyword {
                "query" => OperationType::Query,
                "mutation" => OperationType::Mutation,
                _ => return None,
            };
            return Some((operation_type, operation_name.map(str::to_string)));
        }
        scanner.skip_definition()?;
    }
}

/// Collapse every run of whitespace and commas to one space, for comparing
/// raw query text.
pub fn normalize_query(query: &str) -> String {
    query
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_name_start(c: char) -> bool {
    c == '_' || c.is_ascii_alphabetic()
}

fn is_name_continue(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Whitespace, commas, the BOM and `#` comments.
    fn skip_ignored(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    while let Some(c) = self.bump() {
                        if c == '\n' || c == '\r' {
                            break;
                        }
                    }
                }
                c if c.is_whitespace() || c == ',' || c == '\u{feff}' => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn name(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_name_continue) {
            self.bump();
        }
        &self.source[start..self.pos]
    }

    fn skip_string(&mut self) -> Option<()> {
        if self.rest().starts_with("\"\"\"") {
            self.pos += 3;
            let end = self.rest().find("\"\"\"")?;
            self.pos += end + 3;
            return Some(());
        }
        self.bump();
        loop {
            match self.bump()? {
                '\\' => {
                    self.bump()?;
                }
                '"' => return Some(()),
                _ => {}
            }
        }
    }

    /// Skip past the selection set closing the current definition. Braces
    /// inside arguments and variable defaults do not count.
    fn skip_definition(&mut self) -> Option<()> {
        let mut depth = 0usize;
        let mut parens = 0usize;
        loop {
            match self.peek()? {
                '"' => {
                    self.skip_string()?;
                    continue;
                }
                '#' => {
                    self.skip_ignored();
                    continue;
                }
                '(' => parens += 1,
                ')' => parens = parens.checked_sub(1)?,
                '{' if parens == 0 => depth += 1,
                '}' if parens == 0 => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        self.bump();
                        return Some(());
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }
}
