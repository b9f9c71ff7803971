//! Preset, instrument and sample header records of the `pdta` list.

use crate::bank::Zone;
use crate::LoopMode;

pub const MOD_SIZE: usize = 10;
pub const GEN_SIZE: usize = 4;

/// The generators written by this crate, with their SF2 operator numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum GeneratorType {
    Pan = 17,
    ReleaseVolEnv = 38,
    Instrument = 41,
    KeyRange = 43,
    VelRange = 44,
    InitialAttenuation = 48,
    FineTune = 52,
    SampleID = 53,
    SampleModes = 54,
    OverridingRootKey = 58,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generator {
    pub ty: GeneratorType,
    pub amount: [u8; 2],
}

impl Generator {
    pub fn range(ty: GeneratorType, lo: u8, hi: u8) -> Self {
        Self { ty, amount: [lo, hi] }
    }

    pub fn signed(ty: GeneratorType, amount: i16) -> Self {
        Self {
            ty,
            amount: amount.to_le_bytes(),
        }
    }

    pub fn unsigned(ty: GeneratorType, amount: u16) -> Self {
        Self {
            ty,
            amount: amount.to_le_bytes(),
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&(self.ty as u16).to_le_bytes());
        out.extend_from_slice(&self.amount);
    }

    pub fn terminal(out: &mut Vec<u8>) {
        out.extend_from_slice(&[0; GEN_SIZE]);
    }
}

/// Seconds to SF2 timecents, limited to the range SF2 allows for envelope times.
pub fn seconds_to_timecents(seconds: f32) -> i16 {
    let seconds = seconds.max(0.001);
    (1200.0 * seconds.log2()).round().clamp(-12000.0, 8000.0) as i16
}

/// Volume in dB to attenuation in centibels. Gain above 0 dB can't be expressed.
pub fn volume_to_centibels(volume: f32) -> i16 {
    (-volume * 10.0).round().clamp(0.0, 1440.0) as i16
}

/// SFZ pan (-100..100) to SF2 pan in tenths of a percent (-500..500).
pub fn pan_to_sf2(pan: f32) -> i16 {
    (pan * 5.0).round().clamp(-500.0, 500.0) as i16
}

/// The stereo side of an instrument zone, if its sample is one half of a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StereoSide {
    Left,
    Right,
}

/// Generators of one instrument zone, in the order SF2 requires: key range
/// first, velocity range second, sample ID last.
pub fn zone_generators(
    zone: &Zone,
    loop_mode: LoopMode,
    ampeg_release: f32,
    sample_id: u16,
    side: Option<StereoSide>,
) -> Vec<Generator> {
    use GeneratorType::*;

    let mut gens = Vec::with_capacity(10);

    let keyrange = zone.keyrange();
    gens.push(Generator::range(KeyRange, *keyrange.start(), *keyrange.end()));

    if zone.lovel.is_some() || zone.hivel.is_some() {
        let velrange = zone.velrange();
        gens.push(Generator::range(VelRange, *velrange.start(), *velrange.end()));
    }

    if let Some(volume) = zone.volume.filter(|volume| *volume < 0.0) {
        gens.push(Generator::signed(
            InitialAttenuation,
            volume_to_centibels(volume),
        ));
    }

    let pan = match side {
        Some(StereoSide::Left) => Some(-500),
        Some(StereoSide::Right) => Some(500),
        None => zone.pan.map(pan_to_sf2),
    };
    if let Some(pan) = pan {
        gens.push(Generator::signed(Pan, pan));
    }

    if let Some(tune) = zone.tune {
        gens.push(Generator::signed(FineTune, tune.clamp(-99, 99)));
    }

    let release = zone.ampeg_release.unwrap_or(ampeg_release);
    gens.push(Generator::signed(
        ReleaseVolEnv,
        seconds_to_timecents(release),
    ));

    let loop_mode = zone.loop_mode.unwrap_or(loop_mode);
    gens.push(Generator::signed(SampleModes, loop_mode.sf2_sample_mode()));

    gens.push(Generator::unsigned(
        OverridingRootKey,
        zone.pitch_keycenter as u16,
    ));

    gens.push(Generator::unsigned(SampleID, sample_id));

    gens
}

/// Writes `name` as a 20 byte field. Non-ASCII characters are replaced and the
/// name is cut so the field always ends with a NUL.
pub fn write_name(out: &mut Vec<u8>, name: &str) {
    let mut field = [0u8; 20];
    for (byte, c) in field.iter_mut().zip(name.chars().take(19)) {
        *byte = if c.is_ascii() && !c.is_ascii_control() {
            c as u8
        } else {
            b'_'
        };
    }
    out.extend_from_slice(&field);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetHeader {
    pub name: String,
    pub preset: u16,
    pub bank: u16,
    pub bag_index: u16,
}

impl PresetHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_name(out, &self.name);
        out.extend_from_slice(&self.preset.to_le_bytes());
        out.extend_from_slice(&self.bank.to_le_bytes());
        out.extend_from_slice(&self.bag_index.to_le_bytes());
        // library, genre, morphology
        out.extend_from_slice(&[0; 12]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

impl InstrumentHeader {
    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_name(out, &self.name);
        out.extend_from_slice(&self.bag_index.to_le_bytes());
    }
}

pub fn write_bag(out: &mut Vec<u8>, gen_index: u16, mod_index: u16) {
    out.extend_from_slice(&gen_index.to_le_bytes());
    out.extend_from_slice(&mod_index.to_le_bytes());
}

pub const SAMPLE_TYPE_MONO: u16 = 1;
pub const SAMPLE_TYPE_RIGHT: u16 = 2;
pub const SAMPLE_TYPE_LEFT: u16 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub start_loop: u32,
    pub end_loop: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_link: u16,
    pub sample_type: u16,
}

impl SampleHeader {
    pub fn terminal() -> Self {
        Self {
            name: "EOS".to_owned(),
            start: 0,
            end: 0,
            start_loop: 0,
            end_loop: 0,
            sample_rate: 0,
            original_pitch: 0,
            pitch_correction: 0,
            sample_link: 0,
            sample_type: 0,
        }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        write_name(out, &self.name);
        out.extend_from_slice(&self.start.to_le_bytes());
        out.extend_from_slice(&self.end.to_le_bytes());
        out.extend_from_slice(&self.start_loop.to_le_bytes());
        out.extend_from_slice(&self.end_loop.to_le_bytes());
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.push(self.original_pitch);
        out.extend_from_slice(&self.pitch_correction.to_le_bytes());
        out.extend_from_slice(&self.sample_link.to_le_bytes());
        out.extend_from_slice(&self.sample_type.to_le_bytes());
    }
}
