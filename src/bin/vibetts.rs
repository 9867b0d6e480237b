//! vibetts CLI — dialogue text to speech, stdin/file in, WAV out.
//!
//! ```text
//! echo "Speaker 1: Hello there." | vibetts --voices-dir voices > out.wav
//! vibetts --file dialogue.txt --voices-dir voices --output dialogue.wav
//! vibetts --text "Hi!" --speaker Bob --output hi.wav --voices-dir voices
//! ```
//!
//! Status output goes to stderr; stdout carries WAV bytes when `--output -`.

use std::io::{IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use vibetts::audio::{self, AudioClip, WavEncoding};
use vibetts::{download, parse_script, Cast, GenerateRequest, TtsError, VoicePresets};

#[derive(Debug, Parser)]
#[command(name = "vibetts")]
#[command(about = "VibeVoice dialogue TTS (stdin -> stdout WAV)")]
struct Cli {
    /// HuggingFace model repository
    #[arg(long, env = "VIBEVOICE_MODEL", default_value = "microsoft/VibeVoice-1.5B")]
    model: String,

    /// Default speaker name (voice preset for script speaker 1)
    #[arg(long, env = "VIBEVOICE_SPEAKER", default_value = "Alice")]
    speaker: String,

    /// Read text from the command line instead of stdin
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    /// Read text from a file instead of stdin
    #[arg(long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Output path; `-` writes the WAV to stdout
    #[arg(long, default_value = "-")]
    output: String,

    /// Directory of reference voice samples (*.wav)
    #[arg(long, default_value = "voices")]
    voices_dir: PathBuf,

    /// Output WAV sample encoding (falls back to pcm16 on encoder failure)
    #[arg(long, value_enum, default_value_t = WavEncoding::Float32)]
    encoding: WavEncoding,

    /// List available voice presets and exit
    #[arg(long)]
    list_voices: bool,
}

fn read_input(cli: &Cli) -> Result<String, TtsError> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }
    if let Some(path) = &cli.file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("failed reading text file {}", path.display()))
            .map_err(TtsError::from);
    }
    if std::io::stdin().is_terminal() {
        return Err(TtsError::Input(
            "no input provided; use --text, --file, or pipe stdin".into(),
        ));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("failed reading stdin")?;
    Ok(buf)
}

fn write_output(dest: &str, bytes: &[u8]) -> Result<(), TtsError> {
    if dest == "-" {
        let stdout = std::io::stdout();
        let mut stdout = stdout.lock();
        stdout.write_all(bytes).context("failed writing WAV to stdout")?;
        stdout.flush().context("failed flushing stdout")?;
    } else {
        std::fs::write(dest, bytes)
            .with_context(|| format!("failed writing WAV to {dest}"))?;
        info!("wrote {} bytes to {dest}", bytes.len());
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), TtsError> {
    if cli.list_voices {
        let presets = VoicePresets::scan(&cli.voices_dir);
        if presets.is_empty() {
            eprintln!("no voice presets in {}", cli.voices_dir.display());
        }
        for name in presets.names() {
            println!("{name}");
        }
        return Ok(());
    }

    // ── Input validation, parsing, and voice resolution come first; the
    //    model is only constructed once the request is known to be sound. ──
    let raw = read_input(cli)?;
    let text = raw.trim();
    if text.is_empty() {
        return Err(TtsError::Input("empty text after trimming".into()));
    }

    let utterances = parse_script(text)?;
    info!("parsed {} utterance(s)", utterances.len());

    let presets = VoicePresets::scan(&cli.voices_dir);
    let cast = Cast::assemble(&utterances, &cli.speaker, &presets)?;
    for member in &cast.members {
        info!(
            "speaker {} -> voice '{}' ({})",
            member.speaker_id,
            member.preset,
            member.voice_path.display()
        );
    }

    // ── Model load (download cached by hf-hub) ──────────────────────────────
    let model = download::load_from_hub(&cli.model)?;

    let voice_clips: Vec<AudioClip> = cast
        .members
        .iter()
        .map(|m| audio::read_wav_mono(&m.voice_path).map(|c| c.resampled(model.sample_rate())))
        .collect::<Result<_, _>>()?;

    let request = GenerateRequest {
        texts: utterances.iter().map(|u| u.text.clone()).collect(),
        speaker_names: cast
            .turn_members
            .iter()
            .map(|&i| vec![cast.members[i].display_name.clone()])
            .collect(),
        voice_clips,
        speaker_index: cast.turn_members.clone(),
    };

    let synthesis = model.generate(&request)?;
    info!(
        "synthesised {:.1}s of audio at {} Hz",
        synthesis.samples.len() as f32 / synthesis.sample_rate as f32,
        synthesis.sample_rate
    );

    let bytes =
        audio::encode_wav_with_fallback(&synthesis.samples, synthesis.sample_rate, cli.encoding)?;
    write_output(&cli.output, &bytes)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}
