use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wav2score::{report_run, Config, WavToScore};

/// Monophonic WAV to MIDI and MusicXML transcription
#[derive(Parser)]
#[command(name = "wav2score")]
#[command(about = "Transcribe a monophonic recording into MIDI and a MusicXML score")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a WAV file to MIDI and MusicXML
    Convert {
        /// Input audio file (WAV)
        input: Option<PathBuf>,

        /// MIDI output path
        #[arg(short, long)]
        midi: Option<PathBuf>,

        /// MusicXML output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Custom configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Length of every note in seconds
        #[arg(long)]
        note_duration: Option<f64>,

        /// Merge consecutive identical pitches into one note
        #[arg(long)]
        merge_repeated: bool,

        /// Write a JSON analysis report
        #[arg(long)]
        report: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,

        /// Quiet output
        #[arg(short, long)]
        quiet: bool,
    },
    /// Validate configuration file
    ValidateConfig {
        /// Configuration file to validate
        config: PathBuf,
    },
    /// Show default configuration
    ShowConfig,
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Run the pipeline, reporting failures on the console only
fn convert(config: Config) {
    let processor = WavToScore::new(config);
    let score_path = processor.config().score_output_path.clone();
    let outcome = report_run(&processor.run(), &score_path);
    log::debug!("Run finished: {:?}", outcome);
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            init_logging(false, false);
            convert(Config::default());
        }
        Some(Commands::Convert {
            input,
            midi,
            output,
            config,
            note_duration,
            merge_repeated,
            report,
            verbose,
            quiet,
        }) => {
            if verbose && quiet {
                anyhow::bail!("Cannot specify both --verbose and --quiet");
            }
            init_logging(verbose, quiet);

            // Load configuration
            let mut config = if let Some(config_path) = config {
                wav2score::config::load_config(config_path)?
            } else {
                Config::default()
            };

            if let Some(input) = input {
                config.input_path = input;
            }
            if let Some(midi) = midi {
                config.midi_output_path = midi;
            }
            if let Some(output) = output {
                config.score_output_path = output;
            }
            if let Some(duration) = note_duration {
                config.note_duration = duration;
            }
            if merge_repeated {
                config.quantize.merge_repeated = true;
            }
            if report.is_some() {
                config.report_path = report;
            }
            wav2score::config::validate_config(&config)?;

            convert(config);
        }
        Some(Commands::ValidateConfig { config }) => {
            let config = wav2score::config::load_config(config)?;
            println!("Configuration is valid");
            if let Ok(json) = serde_json::to_string_pretty(&config) {
                println!("{}", json);
            }
        }
        Some(Commands::ShowConfig) => {
            let config = Config::default();
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
    }

    Ok(())
}
