use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::debug;

use super::pdta::{SampleHeader, SAMPLE_TYPE_LEFT, SAMPLE_TYPE_MONO, SAMPLE_TYPE_RIGHT};
use crate::sf2::{sample::load_wav, Sf2WriteError};

/// Zero points written after every sample, as the SF2 format requires.
pub const SAMPLE_PADDING: usize = 46;

/// Sample header indices of a loaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PooledSample {
    Mono(u16),
    Stereo { left: u16, right: u16 },
}

/// Sample data of every distinct file referenced by a bank, in the order the
/// files were first referenced.
#[derive(Debug, Default)]
pub struct SamplePool {
    base_path: Option<PathBuf>,
    by_path: HashMap<PathBuf, PooledSample>,
    smpl: Vec<i16>,
    headers: Vec<SampleHeader>,
}

fn sample_name(path: &Path, suffix: &str) -> String {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    let keep = 19 - suffix.len();
    let stem: String = stem.chars().take(keep).collect();
    format!("{stem}{suffix}")
}

impl SamplePool {
    pub fn new(base_path: Option<&Path>) -> Self {
        Self {
            base_path: base_path.map(Path::to_path_buf),
            ..Default::default()
        }
    }

    fn resolve(&self, sample: &str) -> PathBuf {
        let path = Path::new(sample);
        match &self.base_path {
            Some(base_path) if path.is_relative() => base_path.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn push_channel(
        &mut self,
        name: String,
        points: &[i16],
        sample_rate: u32,
        original_pitch: u8,
        sample_type: u16,
    ) -> Result<u16, Sf2WriteError> {
        let index = u16::try_from(self.headers.len())
            .ok()
            .filter(|index| *index < u16::MAX)
            .ok_or(Sf2WriteError::TooManyRecords {
                kind: "sample",
                count: self.headers.len() + 1,
            })?;

        let too_long = || Sf2WriteError::TooManyRecords {
            kind: "sample point",
            count: self.smpl.len() + points.len(),
        };
        let start = u32::try_from(self.smpl.len()).map_err(|_| too_long())?;
        let end = u32::try_from(self.smpl.len() + points.len()).map_err(|_| too_long())?;

        self.smpl.extend_from_slice(points);
        self.smpl.extend_from_slice(&[0; SAMPLE_PADDING]);

        self.headers.push(SampleHeader {
            name,
            start,
            end,
            start_loop: start,
            end_loop: end,
            sample_rate,
            original_pitch,
            pitch_correction: 0,
            sample_link: 0,
            sample_type,
        });

        Ok(index)
    }

    /// Returns the sample headers of a file, loading it on first use.
    /// `original_pitch` is only used when the file is loaded.
    pub fn get_or_load(
        &mut self,
        sample: &str,
        original_pitch: u8,
    ) -> Result<PooledSample, Sf2WriteError> {
        let path = self.resolve(sample);
        if let Some(pooled) = self.by_path.get(&path) {
            return Ok(*pooled);
        }

        let wav = load_wav(&path)?;
        debug!(
            "Loaded {} ({} channels, {} Hz)",
            path.display(),
            wav.channels.len(),
            wav.sample_rate
        );

        let pooled = match wav.channels.as_slice() {
            [left, right] => {
                let left_index = self.push_channel(
                    sample_name(&path, "_L"),
                    left,
                    wav.sample_rate,
                    original_pitch,
                    SAMPLE_TYPE_LEFT,
                )?;
                let right_index = self.push_channel(
                    sample_name(&path, "_R"),
                    right,
                    wav.sample_rate,
                    original_pitch,
                    SAMPLE_TYPE_RIGHT,
                )?;
                self.headers[left_index as usize].sample_link = right_index;
                self.headers[right_index as usize].sample_link = left_index;
                PooledSample::Stereo {
                    left: left_index,
                    right: right_index,
                }
            }
            [mono] => PooledSample::Mono(self.push_channel(
                sample_name(&path, ""),
                mono,
                wav.sample_rate,
                original_pitch,
                SAMPLE_TYPE_MONO,
            )?),
            channels => {
                return Err(Sf2WriteError::UnsupportedChannels {
                    path,
                    channels: channels.len() as u16,
                })
            }
        };

        self.by_path.insert(path, pooled);
        Ok(pooled)
    }

    /// The `smpl` chunk contents and the sample headers, without the terminal header.
    pub fn into_parts(self) -> (Vec<u8>, Vec<SampleHeader>) {
        let smpl = self
            .smpl
            .iter()
            .flat_map(|point| point.to_le_bytes())
            .collect();
        (smpl, self.headers)
    }
}
