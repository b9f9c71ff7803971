use std::{error::Error, path::PathBuf, process::ExitCode};

use clap::{crate_version, ArgAction, Parser};
use sfkit_soundfonts::{
    convert::{samples_to_sfz, sfz_to_sf2},
    format::FormatTag,
    sf2::Sf2WriteOptions,
    sfz::AMPEG_RELEASE_RANGE,
    BankSettings, LoopMode,
};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(
    version = crate_version!(),
    about = "Builds SFZ and SF2 sound banks from pitched samples.",
    long_about = "Builds SFZ and SF2 sound banks from pitched samples.\n\n\
        With a .sfz output, the inputs are sample files named after their pitch \
        (C4.wav, Piano_F#3v2.wav, 060.wav) and are mapped across the keyboard. \
        With a .sf2 output, the single input is an SFZ file to convert."
)]
struct Cli {
    /// The file to write. Its extension selects the conversion.
    #[arg(short, long)]
    output: PathBuf,

    /// Sample files, or a single SFZ file when writing SF2.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// The sound bank name.
    #[arg(short, long, default_value = "Unnamed sound bank")]
    name: String,

    /// The instrument name.
    #[arg(short, long, default_value = "Unnamed instrument")]
    instrument: String,

    /// The loop mode: no_loop, one_shot, loop_continuous or loop_sustain.
    #[arg(short, long, default_value = "no_loop")]
    loop_mode: LoopMode,

    /// The release time of the amplitude envelope, in seconds (0 to 100).
    #[arg(short, long, default_value_t = 0.5, value_parser = parse_release)]
    release: f32,

    /// The SF2 bank number.
    #[arg(long, default_value_t = 0)]
    bank: u16,

    /// The SF2 preset number of the first instrument.
    #[arg(long, default_value_t = 0)]
    preset: u16,

    /// Log more. Can be repeated. RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Converting to SF2 takes exactly one .sfz input, got {0}")]
    InputCount(usize),

    #[error("Unsupported output format '{0}'. Expected: sfz or sf2")]
    UnsupportedOutput(FormatTag),

    #[error("Cannot determine format from file name: {}. Expected: sfz or sf2", .0.display())]
    MissingOutputExtension(PathBuf),
}

fn parse_release(value: &str) -> Result<f32, String> {
    let release: f32 = value.parse().map_err(|err| format!("invalid number: {err}"))?;
    if AMPEG_RELEASE_RANGE.contains(&release) {
        Ok(release)
    } else {
        Err(format!(
            "release must be between {} and {} seconds",
            AMPEG_RELEASE_RANGE.start(),
            AMPEG_RELEASE_RANGE.end()
        ))
    }
}

impl Cli {
    fn bank_settings(&self) -> BankSettings {
        BankSettings {
            name: self.name.clone(),
            instrument: self.instrument.clone(),
            loop_mode: self.loop_mode,
            ampeg_release: self.release,
        }
    }

    fn sf2_options(&self) -> Sf2WriteOptions {
        Sf2WriteOptions {
            bank: self.bank,
            first_preset: self.preset,
        }
    }

    fn log_filter(&self) -> EnvFilter {
        let level = match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    match FormatTag::from_path(&cli.output) {
        Some(FormatTag::Sf2) => {
            let [input] = cli.inputs.as_slice() else {
                return Err(CliError::InputCount(cli.inputs.len()).into());
            };
            sfz_to_sf2(input, &cli.output, &cli.sf2_options())?;
        }
        Some(FormatTag::Sfz) => {
            let bank = samples_to_sfz(&cli.inputs, &cli.output, &cli.bank_settings())?;
            info!(
                "Mapped {} of {} samples",
                bank.zone_count(),
                cli.inputs.len()
            );
        }
        Some(other) => return Err(CliError::UnsupportedOutput(other).into()),
        None => return Err(CliError::MissingOutputExtension(cli.output.clone()).into()),
    }

    Ok(())
}

/// Runs the conversion, logging a failure once instead of returning it.
fn run_reported(cli: &Cli) -> ExitCode {
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || run_reported(&cli))
}
