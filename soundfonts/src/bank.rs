//! In-memory sound bank model shared by every reader and writer.

use std::{ops::RangeInclusive, path::PathBuf};

use chrono::{Local, NaiveDate};
use tracing::info;

use crate::LoopMode;

/// Format of the date stamp stored in a sound bank.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One key range of an instrument, playing a single sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub sample: String,
    /// The note at which the sample plays back at its recorded pitch.
    pub pitch_keycenter: u8,
    /// Lowest note of the range. `None` extends the zone to the bottom of the keyboard.
    pub lokey: Option<u8>,
    /// Highest note of the range. `None` extends the zone to the top of the keyboard.
    pub hikey: Option<u8>,
    pub lovel: Option<u8>,
    pub hivel: Option<u8>,
    /// Fine tuning in cents.
    pub tune: Option<i16>,
    /// Volume in dB.
    pub volume: Option<f32>,
    /// Pan position, -100 (left) to 100 (right).
    pub pan: Option<f32>,
    /// Overrides the loop mode of the zone's group.
    pub loop_mode: Option<LoopMode>,
    /// Overrides the release time of the zone's instrument.
    pub ampeg_release: Option<f32>,
}

impl Zone {
    pub fn new(sample: impl Into<String>, pitch_keycenter: u8) -> Self {
        Self {
            sample: sample.into(),
            pitch_keycenter,
            lokey: None,
            hikey: None,
            lovel: None,
            hivel: None,
            tune: None,
            volume: None,
            pan: None,
            loop_mode: None,
            ampeg_release: None,
        }
    }

    /// The notes this zone responds to, with open bounds resolved.
    pub fn keyrange(&self) -> RangeInclusive<u8> {
        self.lokey.unwrap_or(0)..=self.hikey.unwrap_or(127)
    }

    pub fn velrange(&self) -> RangeInclusive<u8> {
        self.lovel.unwrap_or(0)..=self.hivel.unwrap_or(127)
    }
}

/// Zones sharing a loop mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneGroup {
    pub loop_mode: LoopMode,
    pub zones: Vec<Zone>,
}

impl ZoneGroup {
    pub fn new(loop_mode: LoopMode) -> Self {
        Self {
            loop_mode,
            zones: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub name: String,
    /// Release time of the amplitude envelope, in seconds.
    pub ampeg_release: f32,
    pub groups: Vec<ZoneGroup>,
}

impl Instrument {
    pub fn new(name: impl Into<String>, ampeg_release: f32) -> Self {
        Self {
            name: name.into(),
            ampeg_release,
            groups: Vec::new(),
        }
    }

    /// Iterates over every zone of the instrument along with its group.
    pub fn zones(&self) -> impl Iterator<Item = (&ZoneGroup, &Zone)> {
        self.groups
            .iter()
            .flat_map(|group| group.zones.iter().map(move |zone| (group, zone)))
    }
}

/// The top level container handed between the assembler and the format adapters.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundBank {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub instruments: Vec<Instrument>,
    /// Directory that relative sample paths are resolved against. Not serialized.
    pub base_path: Option<PathBuf>,
}

impl SoundBank {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            date: None,
            instruments: Vec::new(),
            base_path: None,
        }
    }

    /// Wraps partitioned zones into a bank with one instrument holding one
    /// group. The date stamp is taken when this is called.
    pub fn assemble(settings: &BankSettings, zones: Vec<Zone>) -> Self {
        info!(
            "Assembling sound bank '{}' with {} zones",
            settings.name,
            zones.len()
        );

        let mut group = ZoneGroup::new(settings.loop_mode);
        group.zones = zones;

        let mut instrument = Instrument::new(settings.instrument.clone(), settings.ampeg_release);
        instrument.groups.push(group);

        Self {
            name: settings.name.clone(),
            date: Some(Local::now().date_naive()),
            instruments: vec![instrument],
            base_path: None,
        }
    }

    pub fn zone_count(&self) -> usize {
        self.instruments
            .iter()
            .map(|instrument| instrument.zones().count())
            .sum()
    }
}

/// Options for assembling a sound bank from loose samples.
#[derive(Debug, Clone, PartialEq)]
pub struct BankSettings {
    /// Name of the sound bank.
    ///
    /// Default: `Unnamed sound bank`
    pub name: String,

    /// Name of the single instrument in the bank.
    ///
    /// Default: `Unnamed instrument`
    pub instrument: String,

    /// Loop mode of the zone group.
    ///
    /// Default: `NoLoop`
    pub loop_mode: LoopMode,

    /// Release time of the instrument's amplitude envelope, in seconds.
    ///
    /// Default: `0.5`
    pub ampeg_release: f32,
}

impl Default for BankSettings {
    fn default() -> Self {
        Self {
            name: "Unnamed sound bank".to_owned(),
            instrument: "Unnamed instrument".to_owned(),
            loop_mode: LoopMode::NoLoop,
            ampeg_release: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_shape() {
        let settings = BankSettings {
            name: "Keys".to_owned(),
            loop_mode: LoopMode::LoopContinuous,
            ..Default::default()
        };
        let before = Local::now().date_naive();
        let bank = SoundBank::assemble(&settings, vec![Zone::new("C4.wav", 60)]);
        let after = Local::now().date_naive();

        assert_eq!(bank.name, "Keys");
        let date = bank.date.unwrap();
        assert!(date >= before && date <= after);
        assert_eq!(bank.instruments.len(), 1);

        let instrument = &bank.instruments[0];
        assert_eq!(instrument.name, "Unnamed instrument");
        assert_eq!(instrument.ampeg_release, 0.5);
        assert_eq!(instrument.groups.len(), 1);
        assert_eq!(instrument.groups[0].loop_mode, LoopMode::LoopContinuous);
        assert_eq!(instrument.groups[0].zones, vec![Zone::new("C4.wav", 60)]);
        assert_eq!(bank.zone_count(), 1);
    }

    #[test]
    fn test_assemble_empty() {
        let bank = SoundBank::assemble(&BankSettings::default(), Vec::new());
        assert_eq!(bank.instruments.len(), 1);
        assert_eq!(bank.instruments[0].groups.len(), 1);
        assert!(bank.instruments[0].groups[0].zones.is_empty());
        assert_eq!(bank.zone_count(), 0);
    }

    #[test]
    fn test_zone_ranges() {
        let mut zone = Zone::new("a.wav", 60);
        assert_eq!(zone.keyrange(), 0..=127);
        zone.lokey = Some(55);
        zone.hikey = Some(65);
        zone.hivel = Some(90);
        assert_eq!(zone.keyrange(), 55..=65);
        assert_eq!(zone.velrange(), 0..=90);
    }
}
