//! End to end conversions: SFZ to SF2, and loose samples to SFZ.

use std::{io, path::Path};

use thiserror::Error;
use tracing::{info, info_span};

use crate::{
    bank::{BankSettings, SoundBank},
    format::{expect_format, FormatError, FormatTag},
    pitch::PitchAssignment,
    sf2::{write_sf2, Sf2WriteError, Sf2WriteOptions},
    sfz::{read_sfz, write_sfz, SfzParseError},
    zones::partition,
};

/// Errors that can be generated by a conversion.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Sfz(#[from] SfzParseError),

    #[error(transparent)]
    Sf2(#[from] Sf2WriteError),

    #[error("Failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Converts an SFZ file into an SF2 soundfont.
///
/// Both paths are checked for the right extension before any file is touched.
pub fn sfz_to_sf2(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &Sf2WriteOptions,
) -> Result<(), ConvertError> {
    let (input, output) = (input.as_ref(), output.as_ref());
    let _span = info_span!("sfz_to_sf2", input = %input.display()).entered();

    expect_format(input, FormatTag::Sfz)?;
    expect_format(output, FormatTag::Sf2)?;

    let bank = read_sfz(input)?;
    write_sf2(&bank, output, options)?;

    info!("Wrote {}", output.display());
    Ok(())
}

/// Builds a sound bank from pitched samples and writes it as SFZ.
///
/// Samples whose pitch can't be determined from their file name are skipped
/// with a warning. When two samples map to the same note the later one wins.
/// Returns the bank that was written.
pub fn samples_to_sfz<I, S>(
    samples: I,
    output: impl AsRef<Path>,
    settings: &BankSettings,
) -> Result<SoundBank, ConvertError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let output = output.as_ref();
    let _span = info_span!("samples_to_sfz", output = %output.display()).entered();

    expect_format(output, FormatTag::Sfz)?;

    let assignment = PitchAssignment::from_samples(samples);
    let zones = partition(&assignment);
    let bank = SoundBank::assemble(settings, zones);
    write_sfz(&bank, output)?;

    info!("Wrote {} zones to {}", bank.zone_count(), output.display());
    Ok(bank)
}
