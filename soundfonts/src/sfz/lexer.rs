use std::fmt;

use lazy_regex::{regex, Regex};

/// A position inside an SFZ source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileLocation {
    pub line_number: usize,
    pub position: usize,
}

impl FileLocation {
    pub fn start() -> Self {
        Self {
            line_number: 1,
            position: 1,
        }
    }

    pub fn advanced_by(mut self, text: &str) -> Self {
        let lines = text.chars().filter(|c| *c == '\n').count();
        self.line_number += lines;

        match text.rfind('\n') {
            Some(last_newline) => self.position = text[last_newline + 1..].chars().count() + 1,
            None => self.position += text.chars().count(),
        }

        self
    }
}

impl fmt::Display for FileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}:{}", self.line_number, self.position)
    }
}

/// A lexing failure: the source doesn't follow SFZ syntax at `location`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub location: FileLocation,
    pub message: &'static str,
}

#[derive(Debug, Clone)]
struct StringParser<'a> {
    input: &'a str,
    location: FileLocation,
}

impl<'a> StringParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            location: FileLocation::start(),
        }
    }

    fn advance(&mut self, len: usize) -> &'a str {
        let (result, remaining) = self.input.split_at(len);
        self.input = remaining;
        self.location = self.location.advanced_by(result);
        result
    }

    /// Try to match regex at the current position, advance the parser if it matches.
    /// Returns the capture groups, with unmatched groups left empty.
    fn parse_regex(&mut self, regex: &Regex) -> Option<Vec<String>> {
        let caps = regex.captures(self.input)?;
        let whole = caps.get(0)?;
        if whole.start() != 0 {
            return None;
        }
        let groups = caps
            .iter()
            .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
            .collect();
        self.advance(whole.end());
        Some(groups)
    }

    fn parse_until_line_end(&mut self) -> &'a str {
        let line_end = self.input.find(['\n', '\r']).unwrap_or(self.input.len());
        self.advance(line_end)
    }

    fn trim_start(&mut self) {
        let trimmed = self.input.len() - self.input.trim_start().len();
        self.advance(trimmed);
    }

    fn starts_with(&self, literal: &str) -> bool {
        self.input.starts_with(literal)
    }

    fn empty(&self) -> bool {
        self.input.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfzGroupType {
    Control,
    Global,
    Master,
    Group,
    Region,
    Other,
}

impl SfzGroupType {
    fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "control" => SfzGroupType::Control,
            "global" => SfzGroupType::Global,
            "master" => SfzGroupType::Master,
            "group" => SfzGroupType::Group,
            "region" => SfzGroupType::Region,
            _ => SfzGroupType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SfzToken {
    Group(SfzGroupType),
    Opcode {
        name: String,
        value: String,
        location: FileLocation,
    },
    Comment(String),
    Include {
        path: String,
        location: FileLocation,
    },
    Define(String, String),
}

fn parse_header(parser: &mut StringParser) -> Result<SfzToken, LexError> {
    let location = parser.location;
    let caps = parser
        .parse_regex(regex!(r"<[ \t]*(\w+)[ \t]*>"))
        .ok_or(LexError {
            location,
            message: "Malformed header",
        })?;
    Ok(SfzToken::Group(SfzGroupType::from_name(&caps[1])))
}

fn parse_directive(parser: &mut StringParser) -> Result<SfzToken, LexError> {
    let location = parser.location;

    if let Some(caps) = parser.parse_regex(regex!(r#"#include[ \t]*"([^"\r\n]+)""#)) {
        return Ok(SfzToken::Include {
            path: caps[1].replace('\\', "/"),
            location,
        });
    }

    if let Some(caps) = parser.parse_regex(regex!(r"#define[ \t]+(\$\w+)[ \t]+([^\r\n]*)")) {
        let value = caps[2].split("//").next().unwrap_or_default().trim();
        return Ok(SfzToken::Define(caps[1].clone(), value.to_owned()));
    }

    Err(LexError {
        location,
        message: "Malformed directive",
    })
}

fn parse_opcode(parser: &mut StringParser) -> Result<SfzToken, LexError> {
    let location = parser.location;
    let caps = parser
        .parse_regex(regex!(r"([\w$]+)[ \t]*=[ \t]*"))
        .ok_or(LexError {
            location,
            message: "Expected a header, opcode or comment",
        })?;
    let name = caps[1].clone();

    // A value runs to the end of the line, unless a comment or another token
    // starts on the same line. Values may contain spaces.
    let line_end = parser.input.find(['\n', '\r']).unwrap_or(parser.input.len());
    let line = &parser.input[..line_end];
    let value_end = if line.starts_with("//") || line.starts_with('<') {
        0
    } else {
        regex!(r"[ \t]+(//|[\w$]+[ \t]*=)|[ \t]*<")
            .find(line)
            .map(|m| m.start())
            .unwrap_or(line.len())
    };
    let value = parser.advance(value_end).trim().to_owned();

    Ok(SfzToken::Opcode {
        name,
        value,
        location,
    })
}

fn parse_next_token(parser: &mut StringParser) -> Result<SfzToken, LexError> {
    if parser.starts_with("//") {
        let comment = parser.parse_until_line_end();
        return Ok(SfzToken::Comment(comment[2..].trim().to_owned()));
    }

    if parser.starts_with("<") {
        return parse_header(parser);
    }

    if parser.starts_with("#") {
        return parse_directive(parser);
    }

    parse_opcode(parser)
}

/// Splits SFZ source text into tokens.
pub fn parse_all_tokens(input: &str) -> Result<Vec<SfzToken>, LexError> {
    let mut parser = StringParser::new(input);
    let mut tokens = Vec::new();

    loop {
        parser.trim_start();
        if parser.empty() {
            break;
        }
        tokens.push(parse_next_token(&mut parser)?);
    }

    Ok(tokens)
}
