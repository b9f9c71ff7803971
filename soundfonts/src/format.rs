use std::{
    fmt,
    path::{Path, PathBuf},
};

use thiserror::Error;

/// File formats recognized from a path's extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatTag {
    Sfz,
    Sf2,
    Wav,
    Other(String),
}

impl FormatTag {
    /// Derives the format from the file extension, ignoring case.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_lowercase();
        Some(match extension.as_str() {
            "" => return None,
            "sfz" => FormatTag::Sfz,
            "sf2" => FormatTag::Sf2,
            "wav" => FormatTag::Wav,
            _ => FormatTag::Other(extension),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            FormatTag::Sfz => "sfz",
            FormatTag::Sf2 => "sf2",
            FormatTag::Wav => "wav",
            FormatTag::Other(extension) => extension,
        }
    }
}

impl fmt::Display for FormatTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors generated when a path doesn't carry the expected format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Cannot determine format from file name: {}. No file extension found, expected: {expected}", .path.display())]
    MissingExtension { path: PathBuf, expected: FormatTag },

    #[error("Unsupported file format '{found}' for {}. Expected: {expected}", .path.display())]
    Mismatch {
        path: PathBuf,
        expected: FormatTag,
        found: FormatTag,
    },
}

/// Checks that a path's extension names the expected format.
pub fn expect_format(path: impl AsRef<Path>, expected: FormatTag) -> Result<(), FormatError> {
    let path = path.as_ref();
    let Some(found) = FormatTag::from_path(path) else {
        return Err(FormatError::MissingExtension {
            path: path.into(),
            expected,
        });
    };

    if found != expected {
        return Err(FormatError::Mismatch {
            path: path.into(),
            expected,
            found,
        });
    }

    Ok(())
}
