use std::{
    collections::HashMap,
    fs::File,
    io::{BufReader, Read},
    ops::RangeInclusive,
    path::{Path, PathBuf},
};

use encoding_rs::UTF_8;
use encoding_rs_io::DecodeReaderBytesBuilder;
use thiserror::Error;
use tracing::debug;

use super::lexer::{parse_all_tokens, FileLocation, LexError, SfzGroupType, SfzToken};
use crate::{note::parse_key, LoopMode};

#[derive(Debug, Clone, PartialEq)]
pub enum SfzOpcode {
    Sample(String),
    DefaultPath(String),
    MasterLabel(String),
    Key(u8),
    Lokey(u8),
    Hikey(u8),
    PitchKeycenter(u8),
    Lovel(u8),
    Hivel(u8),
    Tune(i16),
    Volume(f32),
    Pan(f32),
    LoopMode(LoopMode),
    AmpegRelease(f32),
}

/// A token with directives applied: includes inlined, defines substituted.
#[derive(Debug, Clone, PartialEq)]
pub enum SfzResolvedToken {
    Group(SfzGroupType),
    Opcode(SfzOpcode),
    Comment(String),
}

/// Errors that can be generated when parsing an SFZ file.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SfzParseError {
    #[error("Failed to parse SFZ file: {message} at {location}")]
    GrammarError {
        location: FileLocation,
        message: &'static str,
    },

    #[error("Invalid value '{value}' for opcode '{opcode}' at {location}")]
    InvalidValue {
        location: FileLocation,
        opcode: String,
        value: String,
    },

    #[error("Failed to read file: {}", .0.display())]
    FailedToReadFile(PathBuf),

    #[error("Include cycle detected: {} includes itself", .0.display())]
    IncludeCycle(PathBuf),

    #[error("{}: {source}", .path.display())]
    InFile {
        path: PathBuf,
        source: Box<SfzParseError>,
    },
}

impl SfzParseError {
    /// Attaches a file path to errors that only carry a location.
    fn in_file(self, path: &Path) -> Self {
        match self {
            SfzParseError::GrammarError { .. } | SfzParseError::InvalidValue { .. } => {
                SfzParseError::InFile {
                    path: path.to_owned(),
                    source: Box::new(self),
                }
            }
            other => other,
        }
    }
}

impl From<LexError> for SfzParseError {
    fn from(err: LexError) -> Self {
        SfzParseError::GrammarError {
            location: err.location,
            message: err.message,
        }
    }
}

/// Accepted `ampeg_release` values, in seconds.
pub const AMPEG_RELEASE_RANGE: RangeInclusive<f32> = 0.0..=100.0;
/// Accepted `volume` values, in dB.
pub const VOLUME_RANGE: RangeInclusive<f32> = -144.0..=6.0;
pub const PAN_RANGE: RangeInclusive<f32> = -100.0..=100.0;
/// Accepted `tune` values, in cents.
pub const TUNE_RANGE: RangeInclusive<i16> = -100..=100;

fn parse_u8_in_range(val: &str, range: RangeInclusive<u8>) -> Option<u8> {
    val.parse().ok().filter(|val: &u8| range.contains(val))
}

fn parse_i16_in_range(val: &str, range: RangeInclusive<i16>) -> Option<i16> {
    val.parse()
        .ok()
        .map(|val: i16| val.clamp(*range.start(), *range.end()))
}

fn parse_float_in_range(val: &str, range: RangeInclusive<f32>) -> Option<f32> {
    val.parse()
        .ok()
        .filter(|val: &f32| val.is_finite())
        .map(|val: f32| val.clamp(*range.start(), *range.end()))
}

fn parse_loop_mode(val: &str) -> Option<LoopMode> {
    val.parse().ok()
}

/// Converts a raw opcode into a typed one. Unknown opcodes give `Ok(None)`,
/// known opcodes with a value that doesn't parse are an error.
fn parse_sfz_opcode(
    name: &str,
    val: &str,
    location: FileLocation,
) -> Result<Option<SfzOpcode>, SfzParseError> {
    use SfzOpcode::*;

    let parsed = match name {
        "sample" => Some(Sample(val.replace('\\', "/"))),
        "default_path" => Some(DefaultPath(val.replace('\\', "/"))),
        "master_label" => Some(MasterLabel(val.to_owned())),
        "key" => parse_key(val).map(Key),
        "lokey" => parse_key(val).map(Lokey),
        "hikey" => parse_key(val).map(Hikey),
        "pitch_keycenter" => parse_key(val).map(PitchKeycenter),
        "lovel" => parse_u8_in_range(val, 0..=127).map(Lovel),
        "hivel" => parse_u8_in_range(val, 0..=127).map(Hivel),
        "tune" => parse_i16_in_range(val, TUNE_RANGE).map(Tune),
        "volume" => parse_float_in_range(val, VOLUME_RANGE).map(Volume),
        "pan" => parse_float_in_range(val, PAN_RANGE).map(Pan),
        "loop_mode" | "loopmode" => parse_loop_mode(val).map(LoopMode),
        "ampeg_release" => parse_float_in_range(val, AMPEG_RELEASE_RANGE).map(AmpegRelease),
        _ => {
            debug!("Ignoring unsupported opcode '{name}' at {location}");
            return Ok(None);
        }
    };

    parsed.map(Some).ok_or_else(|| SfzParseError::InvalidValue {
        location,
        opcode: name.to_owned(),
        value: val.to_owned(),
    })
}

fn read_decoded(path: &Path) -> Result<String, SfzParseError> {
    let f = File::open(path).map_err(|_| SfzParseError::FailedToReadFile(path.to_owned()))?;

    let mut reader = BufReader::new(
        DecodeReaderBytesBuilder::new()
            .encoding(Some(UTF_8))
            .build(f),
    );
    let mut file = String::new();
    reader
        .read_to_string(&mut file)
        .map_err(|_| SfzParseError::FailedToReadFile(path.to_owned()))?;

    Ok(file)
}

struct TokenResolver<'a> {
    /// Directory that include paths are relative to.
    root_dir: &'a Path,
    defines: HashMap<String, String>,
    /// Files currently being read, outermost first.
    include_stack: Vec<PathBuf>,
}

impl<'a> TokenResolver<'a> {
    fn new(root_dir: &'a Path) -> Self {
        Self {
            root_dir,
            defines: HashMap::new(),
            include_stack: Vec::new(),
        }
    }

    fn substitute(&self, text: &str) -> String {
        if !text.contains('$') {
            return text.to_owned();
        }

        // Longest names first, so `$KEY` doesn't eat the start of `$KEYS`.
        let mut defines: Vec<(&String, &String)> = self.defines.iter().collect();
        defines.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        let mut text = text.to_owned();
        for (key, replace) in defines {
            if text.contains(key.as_str()) {
                text = text.replace(key.as_str(), replace);
            }
        }
        text
    }

    fn resolve_file(&mut self, file_path: &Path) -> Result<Vec<SfzResolvedToken>, SfzParseError> {
        let file_path = file_path
            .canonicalize()
            .map_err(|_| SfzParseError::FailedToReadFile(file_path.to_owned()))?;

        if self.include_stack.contains(&file_path) {
            return Err(SfzParseError::IncludeCycle(file_path));
        }

        let text = read_decoded(&file_path)?;

        self.include_stack.push(file_path.clone());
        let tokens = self
            .resolve_text(&text)
            .map_err(|err| err.in_file(&file_path));
        self.include_stack.pop();

        tokens
    }

    fn resolve_text(&mut self, text: &str) -> Result<Vec<SfzResolvedToken>, SfzParseError> {
        let mut tokens = Vec::new();

        for token in parse_all_tokens(text)? {
            match token {
                SfzToken::Group(group) => tokens.push(SfzResolvedToken::Group(group)),
                SfzToken::Comment(comment) => tokens.push(SfzResolvedToken::Comment(comment)),
                SfzToken::Opcode {
                    name,
                    value,
                    location,
                } => {
                    let name = self.substitute(&name);
                    let value = self.substitute(&value);
                    if let Some(opcode) = parse_sfz_opcode(&name, &value, location)? {
                        tokens.push(SfzResolvedToken::Opcode(opcode));
                    }
                }
                SfzToken::Define(variable, value) => {
                    self.defines.insert(variable, value);
                }
                SfzToken::Include { path, .. } => {
                    let full_path = self.root_dir.join(self.substitute(&path));
                    debug!("Including {}", full_path.display());
                    tokens.extend(self.resolve_file(&full_path)?);
                }
            }
        }

        Ok(tokens)
    }
}

/// Reads an SFZ file and everything it includes into a flat token list.
/// Includes are resolved relative to the directory of `file_path`.
pub fn parse_tokens_resolved(file_path: &Path) -> Result<Vec<SfzResolvedToken>, SfzParseError> {
    let root_dir = file_path.parent().unwrap_or(Path::new("."));
    TokenResolver::new(root_dir).resolve_file(file_path)
}

/// Same as [`parse_tokens_resolved`] for in-memory text, resolving includes
/// relative to `root_dir`.
pub fn parse_tokens_resolved_str(
    text: &str,
    root_dir: &Path,
) -> Result<Vec<SfzResolvedToken>, SfzParseError> {
    TokenResolver::new(root_dir).resolve_text(text)
}
