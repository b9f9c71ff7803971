use std::{
    fmt::{Display, Write as _},
    fs::File,
    io::{self, BufWriter, Write},
    ops::RangeInclusive,
    path::Path,
};

use lazy_regex::regex;
use tracing::info;

use super::parse::{AMPEG_RELEASE_RANGE, PAN_RANGE, TUNE_RANGE, VOLUME_RANGE};
use crate::bank::{SoundBank, Zone, DATE_FORMAT};

fn unwritable(field: &str, value: impl Display, reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("Cannot write {field} '{value}' to SFZ: {reason}"),
    )
}

/// Opcode values stop where another token starts on the same line, and are
/// trimmed when read.
fn check_text(field: &str, value: &str) -> io::Result<()> {
    let splits = value.contains(['\n', '\r', '<'])
        || value.starts_with("//")
        || regex!(r"[ \t](//|[\w$]+[ \t]*=)").is_match(value);
    if splits {
        return Err(unwritable(field, value, "it would be split when read back"));
    }
    if value.trim() != value {
        return Err(unwritable(field, value, "surrounding whitespace is not kept"));
    }
    Ok(())
}

fn check_range<T: PartialOrd + Display>(
    field: &str,
    value: T,
    range: &RangeInclusive<T>,
) -> io::Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        let reason = format!("expected {}..={}", range.start(), range.end());
        Err(unwritable(field, value, &reason))
    }
}

fn check_zone(zone: &Zone) -> io::Result<()> {
    check_text("sample", &zone.sample)?;
    if let Some(tune) = zone.tune {
        check_range("tune", tune, &TUNE_RANGE)?;
    }
    if let Some(volume) = zone.volume {
        check_range("volume", volume, &VOLUME_RANGE)?;
    }
    if let Some(pan) = zone.pan {
        check_range("pan", pan, &PAN_RANGE)?;
    }
    if let Some(release) = zone.ampeg_release {
        check_range("ampeg_release", release, &AMPEG_RELEASE_RANGE)?;
    }
    Ok(())
}

/// Checks that every value of the bank reads back unchanged from SFZ text.
fn check_bank(bank: &SoundBank) -> io::Result<()> {
    if bank.name.contains(['\n', '\r']) || bank.name.trim() != bank.name {
        return Err(unwritable(
            "bank name",
            &bank.name,
            "it must be a single line without surrounding whitespace",
        ));
    }

    for instrument in &bank.instruments {
        check_text("master_label", &instrument.name)?;
        check_range("ampeg_release", instrument.ampeg_release, &AMPEG_RELEASE_RANGE)?;
        for (_, zone) in instrument.zones() {
            check_zone(zone)?;
        }
    }
    Ok(())
}

fn write_zone(out: &mut String, zone: &Zone) -> std::fmt::Result {
    writeln!(out, "<region>")?;
    writeln!(out, "sample={}", zone.sample)?;
    writeln!(out, "pitch_keycenter={}", zone.pitch_keycenter)?;

    if let Some(lokey) = zone.lokey {
        writeln!(out, "lokey={lokey}")?;
    }
    if let Some(hikey) = zone.hikey {
        writeln!(out, "hikey={hikey}")?;
    }
    if let Some(lovel) = zone.lovel {
        writeln!(out, "lovel={lovel}")?;
    }
    if let Some(hivel) = zone.hivel {
        writeln!(out, "hivel={hivel}")?;
    }
    if let Some(tune) = zone.tune {
        writeln!(out, "tune={tune}")?;
    }
    if let Some(volume) = zone.volume {
        writeln!(out, "volume={volume}")?;
    }
    if let Some(pan) = zone.pan {
        writeln!(out, "pan={pan}")?;
    }
    if let Some(loop_mode) = zone.loop_mode {
        writeln!(out, "loop_mode={loop_mode}")?;
    }
    if let Some(release) = zone.ampeg_release {
        writeln!(out, "ampeg_release={release}")?;
    }

    writeln!(out)
}

fn write_bank(out: &mut String, bank: &SoundBank) -> std::fmt::Result {
    writeln!(out, "// Name: {}", bank.name)?;
    if let Some(date) = bank.date {
        writeln!(out, "// Date: {}", date.format(DATE_FORMAT))?;
    }
    writeln!(out)?;

    for instrument in &bank.instruments {
        writeln!(out, "<master>")?;
        writeln!(out, "master_label={}", instrument.name)?;
        writeln!(out, "ampeg_release={}", instrument.ampeg_release)?;
        writeln!(out)?;

        for group in &instrument.groups {
            writeln!(out, "<group>")?;
            writeln!(out, "loop_mode={}", group.loop_mode)?;
            writeln!(out)?;

            for zone in &group.zones {
                write_zone(out, zone)?;
            }
        }
    }

    Ok(())
}

/// Renders a sound bank as SFZ text. Values are written as they are,
/// [`write_sfz`] checks them first.
pub fn to_sfz_string(bank: &SoundBank) -> String {
    let mut out = String::new();
    // Writing into a String can't fail.
    let _ = write_bank(&mut out, bank);
    out
}

/// Writes a sound bank to an SFZ file, replacing it if it exists.
///
/// Fails with [`io::ErrorKind::InvalidInput`], before the file is created, when
/// a value wouldn't read back unchanged: names or sample paths the SFZ syntax
/// would split, and numbers outside the range the reader accepts.
pub fn write_sfz(bank: &SoundBank, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    check_bank(bank)?;
    info!(
        "Writing {} zones to SFZ file {}",
        bank.zone_count(),
        path.display()
    );

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(to_sfz_string(bank).as_bytes())?;
    writer.flush()
}
