pub mod bank;
pub mod convert;
pub mod format;
pub mod note;
pub mod pitch;
pub mod sf2;
pub mod sfz;
pub mod zones;

pub use bank::{BankSettings, Instrument, SoundBank, Zone, ZoneGroup};
pub use format::FormatTag;

use std::{fmt, str::FromStr};

/// How a zone's sample behaves once it reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play the sample once, stop on note off.
    #[default]
    NoLoop,
    /// Play the sample to its end regardless of note off.
    OneShot,
    /// Loop for as long as the voice lives, including the release.
    LoopContinuous,
    /// Loop until note off, then play on to the end.
    LoopSustain,
}

impl LoopMode {
    pub fn as_sfz_str(&self) -> &'static str {
        match self {
            LoopMode::NoLoop => "no_loop",
            LoopMode::OneShot => "one_shot",
            LoopMode::LoopContinuous => "loop_continuous",
            LoopMode::LoopSustain => "loop_sustain",
        }
    }

    /// Value of the SF2 `sampleModes` generator.
    pub fn sf2_sample_mode(&self) -> i16 {
        match self {
            LoopMode::NoLoop | LoopMode::OneShot => 0,
            LoopMode::LoopContinuous => 1,
            LoopMode::LoopSustain => 3,
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sfz_str())
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_loop" => Ok(LoopMode::NoLoop),
            "one_shot" => Ok(LoopMode::OneShot),
            "loop_continuous" => Ok(LoopMode::LoopContinuous),
            "loop_sustain" => Ok(LoopMode::LoopSustain),
            _ => Err(format!("Invalid loop mode: {s}")),
        }
    }
}
