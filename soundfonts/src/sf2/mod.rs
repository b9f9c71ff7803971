//! Writing sound banks as SF2 soundfonts.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::info;

use crate::bank::SoundBank;

mod sample;
mod sfbk;

pub use sfbk::GeneratorType;

/// Errors that can be generated when writing an SF2 file.
#[derive(Error, Debug)]
pub enum Sf2WriteError {
    #[error("Failed to write SF2 file: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read sample {}: {source}", .path.display())]
    FailedToReadSample {
        path: PathBuf,
        source: hound::Error,
    },

    #[error("Sample {} has {channels} channels, only mono and stereo samples are supported", .path.display())]
    UnsupportedChannels { path: PathBuf, channels: u16 },

    #[error("Too many {kind} records for an SF2 file: {count}")]
    TooManyRecords { kind: &'static str, count: usize },
}

/// Options for the SF2 writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sf2WriteOptions {
    /// MIDI bank of the generated presets.
    ///
    /// Default: `0`
    pub bank: u16,

    /// Preset number of the first instrument. Each following instrument
    /// takes the next number.
    ///
    /// Default: `0`
    pub first_preset: u16,
}

/// Writes a sound bank to an SF2 file.
///
/// Every sample the bank references is read before the output file is
/// created, so a missing sample leaves no partial output behind. Relative
/// sample paths are resolved against the bank's `base_path`.
pub fn write_sf2(
    bank: &SoundBank,
    path: impl AsRef<Path>,
    options: &Sf2WriteOptions,
) -> Result<(), Sf2WriteError> {
    let path = path.as_ref();
    info!(
        "Writing {} instruments with {} zones to SF2 file {}",
        bank.instruments.len(),
        bank.zone_count(),
        path.display()
    );

    let riff = sfbk::build_sfbk(bank, options)?;

    let mut writer = BufWriter::new(File::create(path)?);
    riff.write(&mut writer)?;
    writer.flush()?;

    Ok(())
}
