use riff::{ChunkContents, ChunkId, LIST_ID, RIFF_ID};

use super::{Sf2WriteError, Sf2WriteOptions};
use crate::bank::{SoundBank, DATE_FORMAT};

mod pdta;
mod sdta;

pub use pdta::GeneratorType;
use pdta::{
    write_bag, zone_generators, Generator, InstrumentHeader, PresetHeader, SampleHeader,
    StereoSide, MOD_SIZE,
};
use sdta::{PooledSample, SamplePool};

const SOFTWARE: &str = "sfkit";

fn id(value: &[u8; 4]) -> ChunkId {
    ChunkId { value: *value }
}

/// A NUL terminated string padded to an even length.
fn zstr(text: &str, max_len: usize) -> Vec<u8> {
    let mut bytes: Vec<u8> = text.bytes().take(max_len - 1).collect();
    bytes.push(0);
    if bytes.len() % 2 == 1 {
        bytes.push(0);
    }
    bytes
}

fn record_index(kind: &'static str, count: usize) -> Result<u16, Sf2WriteError> {
    u16::try_from(count).map_err(|_| Sf2WriteError::TooManyRecords { kind, count })
}

fn info_list(bank: &SoundBank) -> ChunkContents {
    let mut ifil = Vec::with_capacity(4);
    ifil.extend_from_slice(&2u16.to_le_bytes());
    ifil.extend_from_slice(&1u16.to_le_bytes());

    let mut chunks = vec![
        ChunkContents::Data(id(b"ifil"), ifil),
        ChunkContents::Data(id(b"isng"), zstr("EMU8000", 256)),
        ChunkContents::Data(id(b"INAM"), zstr(&bank.name, 256)),
    ];
    if let Some(date) = bank.date {
        let date = date.format(DATE_FORMAT).to_string();
        chunks.push(ChunkContents::Data(id(b"ICRD"), zstr(&date, 256)));
    }
    chunks.push(ChunkContents::Data(id(b"ISFT"), zstr(SOFTWARE, 256)));

    ChunkContents::Children(LIST_ID, id(b"INFO"), chunks)
}

#[derive(Default)]
struct Hydra {
    phdr: Vec<u8>,
    pbag: Vec<u8>,
    pgen: Vec<u8>,
    inst: Vec<u8>,
    ibag: Vec<u8>,
    igen: Vec<u8>,
    pbag_count: usize,
    ibag_count: usize,
    igen_count: usize,
}

impl Hydra {
    fn push_instrument_zone(&mut self, gens: &[Generator]) -> Result<(), Sf2WriteError> {
        write_bag(
            &mut self.ibag,
            record_index("instrument generator", self.igen_count)?,
            0,
        );
        self.ibag_count += 1;

        for gen in gens {
            gen.write_to(&mut self.igen);
        }
        self.igen_count += gens.len();
        Ok(())
    }
}

/// Builds the whole `sfbk` RIFF tree, loading every referenced sample.
pub fn build_sfbk(
    bank: &SoundBank,
    options: &Sf2WriteOptions,
) -> Result<ChunkContents, Sf2WriteError> {
    let mut pool = SamplePool::new(bank.base_path.as_deref());
    let mut hydra = Hydra::default();

    for (index, instrument) in bank.instruments.iter().enumerate() {
        let instrument_index = record_index("instrument", index)?;
        let preset = options
            .first_preset
            .checked_add(instrument_index)
            .ok_or(Sf2WriteError::TooManyRecords {
                kind: "preset",
                count: options.first_preset as usize + index,
            })?;

        // One preset per instrument, with a single zone pointing at it
        PresetHeader {
            name: instrument.name.clone(),
            preset,
            bank: options.bank,
            bag_index: record_index("preset bag", hydra.pbag_count)?,
        }
        .write_to(&mut hydra.phdr);
        write_bag(&mut hydra.pbag, record_index("preset generator", index)?, 0);
        hydra.pbag_count += 1;
        Generator::unsigned(GeneratorType::Instrument, instrument_index).write_to(&mut hydra.pgen);

        InstrumentHeader {
            name: instrument.name.clone(),
            bag_index: record_index("instrument bag", hydra.ibag_count)?,
        }
        .write_to(&mut hydra.inst);

        for (group, zone) in instrument.zones() {
            let release = instrument.ampeg_release;
            match pool.get_or_load(&zone.sample, zone.pitch_keycenter)? {
                PooledSample::Mono(sample_id) => {
                    let gens = zone_generators(zone, group.loop_mode, release, sample_id, None);
                    hydra.push_instrument_zone(&gens)?;
                }
                PooledSample::Stereo { left, right } => {
                    let gens = zone_generators(
                        zone,
                        group.loop_mode,
                        release,
                        left,
                        Some(StereoSide::Left),
                    );
                    hydra.push_instrument_zone(&gens)?;
                    let gens = zone_generators(
                        zone,
                        group.loop_mode,
                        release,
                        right,
                        Some(StereoSide::Right),
                    );
                    hydra.push_instrument_zone(&gens)?;
                }
            }
        }
    }

    // Terminal records
    PresetHeader {
        name: "EOP".to_owned(),
        preset: 0,
        bank: 0,
        bag_index: record_index("preset bag", hydra.pbag_count)?,
    }
    .write_to(&mut hydra.phdr);
    write_bag(
        &mut hydra.pbag,
        record_index("preset generator", bank.instruments.len())?,
        0,
    );
    Generator::terminal(&mut hydra.pgen);
    InstrumentHeader {
        name: "EOI".to_owned(),
        bag_index: record_index("instrument bag", hydra.ibag_count)?,
    }
    .write_to(&mut hydra.inst);
    write_bag(
        &mut hydra.ibag,
        record_index("instrument generator", hydra.igen_count)?,
        0,
    );
    Generator::terminal(&mut hydra.igen);

    let (smpl, headers) = pool.into_parts();
    let terminal = SampleHeader::terminal();
    let mut shdr = Vec::new();
    for header in headers.iter().chain([&terminal]) {
        header.write_to(&mut shdr);
    }

    let sdta = ChunkContents::Children(
        LIST_ID,
        id(b"sdta"),
        vec![ChunkContents::Data(id(b"smpl"), smpl)],
    );

    let pdta = ChunkContents::Children(
        LIST_ID,
        id(b"pdta"),
        vec![
            ChunkContents::Data(id(b"phdr"), hydra.phdr),
            ChunkContents::Data(id(b"pbag"), hydra.pbag),
            ChunkContents::Data(id(b"pmod"), vec![0; MOD_SIZE]),
            ChunkContents::Data(id(b"pgen"), hydra.pgen),
            ChunkContents::Data(id(b"inst"), hydra.inst),
            ChunkContents::Data(id(b"ibag"), hydra.ibag),
            ChunkContents::Data(id(b"imod"), vec![0; MOD_SIZE]),
            ChunkContents::Data(id(b"igen"), hydra.igen),
            ChunkContents::Data(id(b"shdr"), shdr),
        ],
    );

    Ok(ChunkContents::Children(
        RIFF_ID,
        id(b"sfbk"),
        vec![info_list(bank), sdta, pdta],
    ))
}
