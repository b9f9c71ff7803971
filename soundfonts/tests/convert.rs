use std::{
    fs::{self, File},
    io,
    path::Path,
    sync::{Arc, Mutex},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use riff::Chunk;
use sfkit_soundfonts::{
    convert::{samples_to_sfz, sfz_to_sf2, ConvertError},
    format::FormatError,
    sf2::{Sf2WriteError, Sf2WriteOptions},
    sfz::{parse_sfz_str, read_sfz, to_sfz_string},
    BankSettings, FormatTag, LoopMode, SoundBank,
};
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber that records every event, returning the log text.
fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

fn write_wav(path: &Path, channels: u16, frames: usize) {
    let spec = WavSpec {
        channels,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for i in 0..frames * channels as usize {
        writer.write_sample((i as i16).wrapping_mul(97)).unwrap();
    }
    writer.finalize().unwrap();
}

fn zone_bounds(bank: &SoundBank) -> Vec<(Option<u8>, u8, Option<u8>)> {
    bank.instruments[0]
        .zones()
        .map(|(_, zone)| (zone.lokey, zone.pitch_keycenter, zone.hikey))
        .collect()
}

fn zone_samples(bank: &SoundBank) -> Vec<String> {
    bank.instruments[0]
        .zones()
        .map(|(_, zone)| zone.sample.clone())
        .collect()
}

#[test]
fn note_names_at_octave_spacing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bank.sfz");

    let bank = samples_to_sfz(
        ["C5.wav", "C3.wav", "C4.wav"],
        &output,
        &BankSettings::default(),
    )
    .unwrap();

    assert_eq!(
        zone_bounds(&bank),
        vec![
            (None, 48, Some(53)),
            (Some(54), 60, Some(65)),
            (Some(66), 72, None),
        ]
    );
    assert_eq!(zone_samples(&bank), vec!["C3.wav", "C4.wav", "C5.wav"]);
    assert_eq!(read_sfz(&output).unwrap().instruments, bank.instruments);
}

#[test]
fn numeric_names() {
    let dir = tempfile::tempdir().unwrap();
    let bank = samples_to_sfz(
        ["samples/060.wav", "samples/072.wav"],
        dir.path().join("bank.sfz"),
        &BankSettings::default(),
    )
    .unwrap();

    assert_eq!(
        zone_bounds(&bank),
        vec![(None, 60, Some(65)), (Some(66), 72, None)]
    );
}

#[test]
fn unrecognized_names_are_skipped_with_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bank.sfz");

    let (bank, logs) = with_captured_logs(|| {
        samples_to_sfz(
            ["drumhit.wav", "C4.wav", "notes.txt"],
            &output,
            &BankSettings::default(),
        )
    });
    let bank = bank.unwrap();

    assert_eq!(zone_samples(&bank), vec!["C4.wav"]);
    assert!(logs.contains("WARN"));
    assert!(logs.contains("Skipping file 'drumhit.wav'"));
    assert!(logs.contains("Skipping file 'notes.txt'"));
    assert!(!logs.contains("Skipping file 'C4.wav'"));
}

#[test]
fn later_sample_wins_a_collision() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bank.sfz");

    let (bank, logs) = with_captured_logs(|| {
        samples_to_sfz(["a/E4.wav", "b/064.wav"], &output, &BankSettings::default())
    });
    let bank = bank.unwrap();

    assert_eq!(zone_samples(&bank), vec!["b/064.wav"]);
    assert_eq!(zone_bounds(&bank), vec![(None, 64, None)]);
    // Collisions are not warnings.
    assert!(!logs.contains("WARN"));
    assert!(logs.contains("already mapped to 'a/E4.wav'"));
}

#[test]
fn empty_sample_list() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("empty.sfz");

    let bank = samples_to_sfz(Vec::<String>::new(), &output, &BankSettings::default()).unwrap();
    assert_eq!(bank.instruments.len(), 1);
    assert_eq!(bank.instruments[0].groups.len(), 1);
    assert_eq!(bank.zone_count(), 0);

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.contains("<master>"));
    assert!(text.contains("<group>"));
    assert!(!text.contains("<region>"));
}

#[test]
fn wrong_input_extension_fails_before_reading() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.sf2");

    // The input doesn't exist, so anything but a format error means it was read.
    let err = sfz_to_sf2(dir.path().join("bank.txt"), &output, &Sf2WriteOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Format(FormatError::Mismatch { ref found, .. }) if found.as_str() == "txt"
    ));
    assert!(!output.exists());

    let err = sfz_to_sf2(dir.path().join("bank"), &output, &Sf2WriteOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Format(FormatError::MissingExtension {
            expected: FormatTag::Sfz,
            ..
        })
    ));
}

#[test]
fn wrong_output_extension_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bank.sfz");
    fs::write(&input, "<region> sample=missing.wav").unwrap();

    let output = dir.path().join("bank.wav");
    let err = sfz_to_sf2(&input, &output, &Sf2WriteOptions::default()).unwrap_err();
    assert!(matches!(err, ConvertError::Format(_)));
    assert!(!output.exists());

    let output = dir.path().join("bank.sf2.txt");
    let err = samples_to_sfz(["C4.wav"], &output, &BankSettings::default()).unwrap_err();
    assert!(matches!(err, ConvertError::Format(_)));
    assert!(!output.exists());
}

#[test]
fn settings_flow_into_the_written_bank() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("strings.sfz");
    let settings = BankSettings {
        name: "Strings".to_owned(),
        instrument: "Violins".to_owned(),
        loop_mode: LoopMode::LoopContinuous,
        ampeg_release: 1.5,
    };

    let bank = samples_to_sfz(["G3.wav", "D4.wav"], &output, &settings).unwrap();

    let text = fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("// Name: Strings\n// Date: "));
    assert!(text.contains("master_label=Violins\nampeg_release=1.5\n"));
    assert!(text.contains("loop_mode=loop_continuous\n"));

    let read_back = read_sfz(&output).unwrap();
    assert_eq!(read_back.name, "Strings");
    assert_eq!(read_back.date, bank.date);
    assert_eq!(read_back.instruments, bank.instruments);
}

#[test]
fn sfz_text_round_trip_is_stable() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bank.sfz");
    samples_to_sfz(
        ["Piano_C#4v2_3.wav", "piano-048vL.wav", "Bb5.wav"],
        &output,
        &BankSettings::default(),
    )
    .unwrap();

    let first = fs::read_to_string(&output).unwrap();
    let second = to_sfz_string(&parse_sfz_str(&first).unwrap());
    assert_eq!(first, second);
}

#[test]
fn settings_that_would_not_read_back_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("bank.sfz");

    let refused = |samples: &[&str], settings: &BankSettings| {
        let err = samples_to_sfz(samples, &output, settings).unwrap_err();
        assert!(!output.exists());
        match err {
            ConvertError::Io(err) => {
                assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
                err.to_string()
            }
            other => panic!("unexpected error {other:?}"),
        }
    };

    let settings = BankSettings {
        instrument: "Piano <soft>".to_owned(),
        ..BankSettings::default()
    };
    assert!(refused(&["C4.wav"], &settings).contains("master_label"));

    assert!(refused(&["my take=2_C4.wav"], &BankSettings::default()).contains("sample"));

    for ampeg_release in [f32::NAN, 250.0, -1.0] {
        let settings = BankSettings {
            ampeg_release,
            ..BankSettings::default()
        };
        assert!(refused(&["C4.wav"], &settings).contains("ampeg_release"));
    }

    // Limits of the accepted range read back unchanged.
    for ampeg_release in [0.0, 100.0] {
        let settings = BankSettings {
            ampeg_release,
            ..BankSettings::default()
        };
        let bank = samples_to_sfz(["C4.wav"], &output, &settings).unwrap();
        assert_eq!(read_sfz(&output).unwrap().instruments, bank.instruments);
    }
}

struct Sf2Contents {
    info: Vec<(String, Vec<u8>)>,
    smpl: Vec<u8>,
    pdta: Vec<(String, Vec<u8>)>,
}

fn read_list(file: &mut File, list: &Chunk) -> Vec<(String, Vec<u8>)> {
    let chunks: Vec<Chunk> = list.iter(file).map(|c| c.unwrap()).collect();
    chunks
        .iter()
        .map(|chunk| {
            (
                chunk.id().as_str().to_owned(),
                chunk.read_contents(file).unwrap(),
            )
        })
        .collect()
}

fn read_sf2(path: &Path) -> Sf2Contents {
    let mut file = File::open(path).unwrap();
    let riff = Chunk::read(&mut file, 0).unwrap();
    assert_eq!(riff.id().as_str(), "RIFF");
    assert_eq!(riff.read_type(&mut file).unwrap().as_str(), "sfbk");

    let lists: Vec<Chunk> = riff.iter(&mut file).map(|c| c.unwrap()).collect();
    let types: Vec<String> = lists
        .iter()
        .map(|list| {
            assert_eq!(list.id().as_str(), "LIST");
            list.read_type(&mut file).unwrap().as_str().to_owned()
        })
        .collect();
    assert_eq!(types, vec!["INFO", "sdta", "pdta"]);

    let info = read_list(&mut file, &lists[0]);
    let sdta = read_list(&mut file, &lists[1]);
    let pdta = read_list(&mut file, &lists[2]);
    assert_eq!(sdta.len(), 1);
    assert_eq!(sdta[0].0, "smpl");

    Sf2Contents {
        info,
        smpl: sdta[0].1.clone(),
        pdta,
    }
}

fn u16_at(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn u32_at(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[test]
fn sfz_to_sf2_structure() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("samples")).unwrap();
    write_wav(&dir.path().join("samples/C3.wav"), 1, 100);
    write_wav(&dir.path().join("samples/C4.wav"), 1, 50);

    let input = dir.path().join("piano.sfz");
    fs::write(
        &input,
        "// Name: Piano\n// Date: 2025-02-03\n\
         <master> master_label=Grand ampeg_release=0.5\n\
         <group> loop_mode=no_loop\n\
         <region> sample=samples/C3.wav pitch_keycenter=48 hikey=53\n\
         <region> sample=samples/C4.wav pitch_keycenter=60 lokey=54 hikey=65\n\
         <region> sample=samples/C4.wav pitch_keycenter=72 lokey=66 loop_mode=loop_sustain\n",
    )
    .unwrap();
    let output = dir.path().join("piano.sf2");

    let options = Sf2WriteOptions {
        bank: 1,
        first_preset: 5,
    };
    sfz_to_sf2(&input, &output, &options).unwrap();

    let sf2 = read_sf2(&output);

    let info_ids: Vec<&str> = sf2.info.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(info_ids, vec!["ifil", "isng", "INAM", "ICRD", "ISFT"]);
    assert_eq!(sf2.info[0].1, vec![2, 0, 1, 0]);
    assert_eq!(sf2.info[2].1, b"Piano\0".to_vec());
    assert_eq!(sf2.info[3].1, b"2025-02-03\0\0".to_vec());

    // Two distinct files, each followed by 46 zero points
    assert_eq!(sf2.smpl.len(), (100 + 46 + 50 + 46) * 2);

    let ids: Vec<&str> = sf2.pdta.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["phdr", "pbag", "pmod", "pgen", "inst", "ibag", "imod", "igen", "shdr"]
    );
    let sizes: Vec<usize> = sf2.pdta.iter().map(|(_, data)| data.len()).collect();
    assert_eq!(
        sizes,
        vec![
            2 * 38,
            2 * 4,
            10,
            2 * 4,
            2 * 22,
            4 * 4,
            10,
            // 3 zones of 5 generators, plus the terminal generator
            (3 * 5 + 1) * 4,
            3 * 46,
        ]
    );

    let phdr = &sf2.pdta[0].1;
    assert_eq!(&phdr[..6], b"Grand\0");
    assert_eq!(u16_at(phdr, 20), 5);
    assert_eq!(u16_at(phdr, 22), 1);
    assert_eq!(&phdr[38..42], b"EOP\0");

    let inst = &sf2.pdta[4].1;
    assert_eq!(&inst[..6], b"Grand\0");
    assert_eq!(&inst[22..26], b"EOI\0");
    assert_eq!(u16_at(inst, 42), 3);

    // Third zone: key range 66-127, sampleModes 3, root key 72, sample 1
    let igen = &sf2.pdta[7].1;
    let third = &igen[2 * 5 * 4..3 * 5 * 4];
    assert_eq!(u16_at(third, 0), 43);
    assert_eq!(&third[2..4], &[66, 127]);
    assert_eq!(u16_at(third, 8), 54);
    assert_eq!(u16_at(third, 10), 3);
    assert_eq!(u16_at(third, 12), 58);
    assert_eq!(u16_at(third, 14), 72);
    assert_eq!(u16_at(third, 16), 53);
    assert_eq!(u16_at(third, 18), 1);

    let shdr = &sf2.pdta[8].1;
    assert_eq!(&shdr[..3], b"C3\0");
    assert_eq!(u32_at(shdr, 20), 0);
    assert_eq!(u32_at(shdr, 24), 100);
    assert_eq!(u32_at(shdr, 28), 0);
    assert_eq!(u32_at(shdr, 32), 100);
    assert_eq!(u32_at(shdr, 36), 44100);
    assert_eq!(shdr[40], 48);
    assert_eq!(u32_at(shdr, 46 + 20), 146);
    assert_eq!(u32_at(shdr, 46 + 24), 196);
    assert_eq!(&shdr[92..96], b"EOS\0");
}

#[test]
fn stereo_samples_are_linked() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("pad.wav"), 2, 64);
    let input = dir.path().join("pad.sfz");
    fs::write(&input, "<region> sample=pad.wav key=60").unwrap();
    let output = dir.path().join("pad.sf2");

    sfz_to_sf2(&input, &output, &Sf2WriteOptions::default()).unwrap();
    let sf2 = read_sf2(&output);

    assert_eq!(sf2.smpl.len(), 2 * (64 + 46) * 2);

    let shdr = &sf2.pdta[8].1;
    assert_eq!(shdr.len(), 3 * 46);
    assert_eq!(&shdr[..6], b"pad_L\0");
    assert_eq!(&shdr[46..52], b"pad_R\0");
    // sampleLink, sampleType
    assert_eq!((u16_at(shdr, 42), u16_at(shdr, 44)), (1, 4));
    assert_eq!((u16_at(shdr, 46 + 42), u16_at(shdr, 46 + 44)), (0, 2));

    // One instrument zone per side, panned hard
    let ibag = &sf2.pdta[5].1;
    assert_eq!(ibag.len(), 3 * 4);
    let igen = &sf2.pdta[7].1;
    let pans: Vec<i16> = igen
        .chunks(4)
        .filter(|gen| u16_at(gen, 0) == 17)
        .map(|gen| i16::from_le_bytes([gen[2], gen[3]]))
        .collect();
    assert_eq!(pans, vec![-500, 500]);
}

#[test]
fn missing_sample_fails_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bank.sfz");
    fs::write(&input, "<region> sample=gone.wav").unwrap();
    let output = dir.path().join("bank.sf2");

    let err = sfz_to_sf2(&input, &output, &Sf2WriteOptions::default()).unwrap_err();
    match err {
        ConvertError::Sf2(Sf2WriteError::FailedToReadSample { path, .. }) => {
            assert!(path.ends_with("gone.wav"))
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!output.exists());
}

#[test]
fn malformed_sfz_reports_location() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bank.sfz");
    fs::write(&input, "<region> sample=a.wav\n<region> lokey=nope\n").unwrap();

    let err = sfz_to_sf2(&input, dir.path().join("bank.sf2"), &Sf2WriteOptions::default())
        .unwrap_err();
    assert!(matches!(err, ConvertError::Sfz(_)));
    let message = err.to_string();
    assert!(message.contains("bank.sfz"));
    assert!(message.contains("line 2:10"));
}
