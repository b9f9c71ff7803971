//! Reading and writing SFZ instrument definitions.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use self::{
    lexer::SfzGroupType,
    parse::{parse_tokens_resolved, parse_tokens_resolved_str, SfzOpcode, SfzResolvedToken},
};
use crate::{
    bank::{BankSettings, Instrument, SoundBank, Zone, ZoneGroup, DATE_FORMAT},
    LoopMode,
};

mod lexer;
mod parse;
mod write;

pub use lexer::FileLocation;
pub use parse::{SfzParseError, AMPEG_RELEASE_RANGE};
pub use write::{to_sfz_string, write_sfz};

/// Release time used when neither the instrument nor the region sets one.
pub const DEFAULT_AMPEG_RELEASE: f32 = 0.001;

/// Key center used when a region sets neither `pitch_keycenter` nor `key`.
pub const DEFAULT_PITCH_KEYCENTER: u8 = 60;

#[derive(Debug, Clone, Default)]
struct RegionParamsBuilder {
    sample: Option<String>,
    default_path: Option<String>,
    master_label: Option<String>,
    key: Option<u8>,
    lokey: Option<u8>,
    hikey: Option<u8>,
    pitch_keycenter: Option<u8>,
    lovel: Option<u8>,
    hivel: Option<u8>,
    tune: Option<i16>,
    volume: Option<f32>,
    pan: Option<f32>,
    loop_mode: Option<LoopMode>,
    ampeg_release: Option<f32>,
}

impl RegionParamsBuilder {
    fn update_from_opcode(&mut self, opcode: SfzOpcode) {
        match opcode {
            SfzOpcode::Sample(val) => self.sample = Some(val),
            SfzOpcode::DefaultPath(val) => self.default_path = Some(val),
            SfzOpcode::MasterLabel(val) => self.master_label = Some(val),
            SfzOpcode::Key(val) => self.key = Some(val),
            SfzOpcode::Lokey(val) => self.lokey = Some(val),
            SfzOpcode::Hikey(val) => self.hikey = Some(val),
            SfzOpcode::PitchKeycenter(val) => self.pitch_keycenter = Some(val),
            SfzOpcode::Lovel(val) => self.lovel = Some(val),
            SfzOpcode::Hivel(val) => self.hivel = Some(val),
            SfzOpcode::Tune(val) => self.tune = Some(val),
            SfzOpcode::Volume(val) => self.volume = Some(val),
            SfzOpcode::Pan(val) => self.pan = Some(val),
            SfzOpcode::LoopMode(val) => self.loop_mode = Some(val),
            SfzOpcode::AmpegRelease(val) => self.ampeg_release = Some(val),
        }
    }

    /// Builds the zone of a region. Loop mode and release are only kept as
    /// overrides when they differ from what the group and instrument set.
    fn build(self, group_loop_mode: LoopMode, instrument_release: f32) -> Option<Zone> {
        let sample = self.sample?;
        let sample = match self.default_path {
            Some(default_path) if default_path.is_empty() || default_path.ends_with('/') => {
                format!("{default_path}{sample}")
            }
            Some(default_path) => format!("{default_path}/{sample}"),
            None => sample,
        };

        let pitch_keycenter = self
            .pitch_keycenter
            .or(self.key)
            .unwrap_or(DEFAULT_PITCH_KEYCENTER);

        Some(Zone {
            sample,
            pitch_keycenter,
            lokey: self.lokey.or(self.key),
            hikey: self.hikey.or(self.key),
            lovel: self.lovel,
            hivel: self.hivel,
            tune: self.tune,
            volume: self.volume,
            pan: self.pan,
            loop_mode: self.loop_mode.filter(|mode| *mode != group_loop_mode),
            ampeg_release: self
                .ampeg_release
                .filter(|release| *release != instrument_release),
        })
    }
}

fn get_group_level(group_type: SfzGroupType) -> Option<usize> {
    match group_type {
        SfzGroupType::Control => Some(1),
        SfzGroupType::Global => Some(2),
        SfzGroupType::Master => Some(3),
        SfzGroupType::Group => Some(4),
        SfzGroupType::Region => Some(5),
        SfzGroupType::Other => None,
    }
}

struct BankBuilder {
    bank: SoundBank,
    defaults: BankSettings,
    current_group: Option<SfzGroupType>,
    group_data_stack: VecDeque<RegionParamsBuilder>,
    seen_header: bool,
}

impl BankBuilder {
    fn new(name: String) -> Self {
        Self {
            bank: SoundBank::new(name),
            defaults: BankSettings::default(),
            current_group: None,
            group_data_stack: VecDeque::new(),
            seen_header: false,
        }
    }

    fn inherited(&self) -> RegionParamsBuilder {
        self.group_data_stack.back().cloned().unwrap_or_default()
    }

    fn current_instrument(&mut self) -> &mut Instrument {
        if self.bank.instruments.is_empty() {
            let release = self
                .inherited()
                .ampeg_release
                .unwrap_or(DEFAULT_AMPEG_RELEASE);
            let name = self.defaults.instrument.clone();
            self.bank.instruments.push(Instrument::new(name, release));
        }
        let last = self.bank.instruments.len() - 1;
        &mut self.bank.instruments[last]
    }

    fn current_zone_group(&mut self) -> &mut ZoneGroup {
        let loop_mode = self.inherited().loop_mode.unwrap_or_default();
        let instrument = self.current_instrument();
        if instrument.groups.is_empty() {
            instrument.groups.push(ZoneGroup::new(loop_mode));
        }
        let last = instrument.groups.len() - 1;
        &mut instrument.groups[last]
    }

    fn parse_comment(&mut self, comment: &str) {
        if self.seen_header {
            return;
        }

        if let Some(name) = comment.strip_prefix("Name:") {
            self.bank.name = name.trim().to_owned();
        } else if let Some(date) = comment.strip_prefix("Date:") {
            match NaiveDate::parse_from_str(date.trim(), DATE_FORMAT) {
                Ok(date) => self.bank.date = Some(date),
                Err(err) => debug!("Ignoring malformed date '{}': {err}", date.trim()),
            }
        }
    }

    /// Applies whatever the section that just ended declared.
    fn close_section(&mut self) {
        match self.current_group {
            Some(SfzGroupType::Region) => {
                // Step outside of the current region
                let Some(region) = self.group_data_stack.pop_back() else {
                    return;
                };
                let instrument_release = self.current_instrument().ampeg_release;
                let group = self.current_zone_group();
                match region.build(group.loop_mode, instrument_release) {
                    Some(zone) => group.zones.push(zone),
                    None => warn!("Skipping region without a sample"),
                }
            }
            Some(SfzGroupType::Master) => {
                let master = self.inherited();
                let name = master
                    .master_label
                    .unwrap_or_else(|| self.defaults.instrument.clone());
                let instrument = self.current_instrument();
                instrument.name = name;
                instrument.ampeg_release = master.ampeg_release.unwrap_or(DEFAULT_AMPEG_RELEASE);
            }
            Some(SfzGroupType::Group) => {
                let loop_mode = self.inherited().loop_mode.unwrap_or_default();
                self.current_zone_group().loop_mode = loop_mode;
            }
            _ => {}
        }
    }

    fn parse_header(&mut self, group: SfzGroupType) {
        self.seen_header = true;
        self.close_section();

        let Some(group_level) = get_group_level(group) else {
            self.current_group = None;
            return;
        };
        self.current_group = Some(group);

        // Step outside, then into a fresh copy of the parent
        while self.group_data_stack.len() >= group_level {
            self.group_data_stack.pop_back();
        }
        while self.group_data_stack.len() < group_level {
            let parent_group = self.inherited();
            self.group_data_stack.push_back(parent_group);
        }

        match group {
            SfzGroupType::Master => {
                let release = self
                    .inherited()
                    .ampeg_release
                    .unwrap_or(DEFAULT_AMPEG_RELEASE);
                let name = self.defaults.instrument.clone();
                self.bank.instruments.push(Instrument::new(name, release));
            }
            SfzGroupType::Group => {
                let loop_mode = self.inherited().loop_mode.unwrap_or_default();
                self.current_instrument()
                    .groups
                    .push(ZoneGroup::new(loop_mode));
            }
            SfzGroupType::Region => {
                self.current_zone_group();
            }
            _ => {}
        }
    }

    fn parse_opcode(&mut self, opcode: SfzOpcode) {
        if self.current_group.is_none() {
            return;
        }
        if let Some(group_data) = self.group_data_stack.back_mut() {
            group_data.update_from_opcode(opcode);
        }
    }

    fn build(mut self, tokens: impl IntoIterator<Item = SfzResolvedToken>) -> SoundBank {
        for token in tokens {
            match token {
                SfzResolvedToken::Group(group) => self.parse_header(group),
                SfzResolvedToken::Opcode(opcode) => self.parse_opcode(opcode),
                SfzResolvedToken::Comment(comment) => self.parse_comment(&comment),
            }
        }
        self.close_section();

        self.bank
    }
}

/// Reads an SFZ file into a sound bank.
///
/// Relative sample paths are kept as written; the bank's `base_path` is set
/// to the directory of the file so they can be resolved later.
pub fn read_sfz(path: impl AsRef<Path>) -> Result<SoundBank, SfzParseError> {
    let path = path.as_ref();
    info!("Reading SFZ file {}", path.display());

    let tokens = parse_tokens_resolved(path)?;

    let name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_owned)
        .unwrap_or_else(|| BankSettings::default().name);
    let mut bank = BankBuilder::new(name).build(tokens);
    bank.base_path = Some(
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    );

    debug!(
        "Read {} instruments with {} zones from {}",
        bank.instruments.len(),
        bank.zone_count(),
        path.display()
    );
    Ok(bank)
}

/// Parses SFZ text into a sound bank. Includes are resolved against the
/// current directory.
pub fn parse_sfz_str(text: &str) -> Result<SoundBank, SfzParseError> {
    let tokens = parse_tokens_resolved_str(text, Path::new("."))?;
    Ok(BankBuilder::new(BankSettings::default().name).build(tokens))
}
