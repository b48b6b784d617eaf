//! Omnicast CLI
//! Generate podcast scripts and turn them into multi-voice audio from a terminal

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use omnicast::background_mixer::mime_type_for_path;
use omnicast::export::script_file_name;
use omnicast::script_generation::{Audience, EpisodeLength, ScriptFormat, Tone};
use omnicast::voices::{is_known_voice, PREVIEW_TEXT};
use omnicast::{
    format_time, AudioCodec, AudioMixer, BatchSynthesizer, CastConfig, CastSession,
    CredentialStore, Exporter, GenerationOptions, HandleRegistry, HostStyle,
    PollinationsScriptClient, ScriptGenerator, SessionEvent, SpeechClient, SymphoniaCodec,
    Synthesizer, ToneSynthesizer, VoiceConfiguration, AVAILABLE_VOICES,
};

/// Omnicast podcast production CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a script from a topic
    Script(ScriptCommand),

    /// Synthesize a script into segment clips and a merged track
    Produce(ProduceCommand),

    /// Manage the stored script endpoint token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// List available voices
    Voices,

    /// Synthesize a short sample line with one voice
    Preview {
        /// Voice id
        voice: String,

        /// Output directory (defaults to the download directory)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Parser, Debug)]
struct ScriptCommand {
    /// Podcast topic
    #[arg(short, long)]
    topic: String,

    #[arg(long, default_value_t = ScriptFormat::default())]
    format: ScriptFormat,

    #[arg(long, default_value_t = EpisodeLength::default())]
    duration: EpisodeLength,

    #[arg(long, default_value_t = Tone::default())]
    tone: Tone,

    #[arg(long, default_value_t = Audience::default())]
    audience: Audience,

    /// single or multiple
    #[arg(long, default_value = "single")]
    style: HostStyle,

    /// 1 (simple) to 5 (expert)
    #[arg(long, default_value_t = 3)]
    complexity: u8,

    /// Script element to include (repeatable)
    #[arg(long = "element")]
    elements: Vec<String>,

    /// Also save the script as a text file in this directory
    #[arg(long)]
    save: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProduceCommand {
    /// Script text file
    #[arg(short, long)]
    script: PathBuf,

    /// single or multiple
    #[arg(long, default_value = "single")]
    style: HostStyle,

    /// Default voice
    #[arg(long, default_value = "alloy")]
    voice: String,

    /// Guest voice for multi-host scripts
    #[arg(long)]
    guest: Option<String>,

    /// Speech rate (0.5 - 2.0)
    #[arg(long, default_value_t = 1.0)]
    speed: f32,

    /// Render placeholder tones instead of calling the speech endpoint
    #[arg(long)]
    offline: bool,

    /// Also write every segment clip
    #[arg(long)]
    segments: bool,

    /// Background music file (mp3 or wav) to check and attach for playback
    #[arg(long)]
    background: Option<PathBuf>,

    /// Background volume (0 - 100)
    #[arg(long, default_value_t = 30)]
    background_volume: u8,

    /// Output directory (defaults to the download directory)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum TokenAction {
    /// Store a token (an empty value clears it)
    Set { value: String },
    /// Remove the stored token
    Clear,
    /// Show whether a token is stored
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = CastConfig::load();

    match cli.command {
        Commands::Script(cmd) => generate_script(cmd, &config).await,
        Commands::Produce(cmd) => produce(cmd, &config).await,
        Commands::Token { action } => manage_token(action),
        Commands::Voices => {
            for voice in AVAILABLE_VOICES.iter() {
                println!("{:<10} {:<10} {}", voice.id, voice.name, voice.description);
            }
            Ok(())
        }
        Commands::Preview { voice, out } => preview(&voice, out, &config).await,
    }
}

async fn generate_script(cmd: ScriptCommand, config: &CastConfig) -> Result<()> {
    let defaults = GenerationOptions::default();
    let options = GenerationOptions {
        format: cmd.format,
        duration: cmd.duration,
        tone: cmd.tone,
        host_style: cmd.style,
        audience: cmd.audience,
        complexity: defaults.complexity,
        elements: if cmd.elements.is_empty() {
            defaults.elements
        } else {
            cmd.elements
        },
    }
    .with_complexity(cmd.complexity);

    let token = CredentialStore::load()
        .map(|store| store.token().map(str::to_string))
        .unwrap_or_else(|e| {
            warn!("Credential store unavailable: {}", e);
            None
        });

    let client = PollinationsScriptClient::new(config)?.with_token(token);
    let script = client
        .generate(&cmd.topic, &options)
        .await
        .context("script generation failed")?;

    println!("{}", script.content);

    if let Some(dir) = cmd.save {
        let path = Exporter::new(dir)
            .download_script(&script.topic, &script.content)
            .await?;
        info!("Script saved as {}", path.display());
    } else {
        info!("Suggested file name: {}", script_file_name(&script.topic));
    }
    Ok(())
}

async fn produce(cmd: ProduceCommand, config: &CastConfig) -> Result<()> {
    for voice in std::iter::once(&cmd.voice).chain(cmd.guest.iter()) {
        if !is_known_voice(voice) {
            bail!("unknown voice '{}' (run `omnicast voices`)", voice);
        }
    }

    let script = tokio::fs::read_to_string(&cmd.script)
        .await
        .with_context(|| format!("failed to read {}", cmd.script.display()))?;

    let mut voice_config = VoiceConfiguration::new(cmd.voice.clone()).with_speed(cmd.speed);
    if let Some(guest) = &cmd.guest {
        voice_config = voice_config.with_guest(guest.clone());
    }
    if let Some(path) = &cmd.background {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?
            .len();
        let mime_type = mime_type_for_path(path).unwrap_or("application/octet-stream");
        voice_config.attach_background(path.clone(), mime_type, size)?;
        voice_config.set_background_volume(cmd.background_volume);
        info!(
            "Background music {} attached at {}%; it plays alongside the merged track and is not part of exports",
            path.display(),
            voice_config.background_volume()
        );
    }

    let codec: Arc<dyn AudioCodec> = Arc::new(SymphoniaCodec::new());
    let (synthesizer, pacing): (Arc<dyn Synthesizer>, Duration) = if cmd.offline {
        (Arc::new(ToneSynthesizer::new()), Duration::ZERO)
    } else {
        (
            Arc::new(SpeechClient::from_config(config, Arc::clone(&codec))?),
            config.pacing(),
        )
    };

    let batch = BatchSynthesizer::new(synthesizer, HandleRegistry::new()).with_pacing(pacing);
    let session = CastSession::spawn(batch);
    session.load_script(script, voice_config, cmd.style)?;
    session.generate_all()?;

    {
        let idle = session.wait_idle();
        tokio::pin!(idle);
        loop {
            tokio::select! {
                result = &mut idle => {
                    result?;
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(200)) => {
                    report_events(session.poll_events());
                }
            }
        }
    }
    report_events(session.poll_events());

    let segments = session.snapshot().segments;
    session.shutdown().await;

    let exporter = Exporter::new(cmd.out.unwrap_or_else(|| config.resolved_download_dir()))
        .with_stagger(config.download_stagger());

    match AudioMixer::new(codec).merge_segments(&segments).await {
        Ok(track) => {
            let path = exporter.download_merged(&track).await?;
            println!(
                "Merged {} segments ({}) -> {}",
                track.segment_count,
                track.duration_seconds.map(format_time).unwrap_or_else(|| "?".into()),
                path.display()
            );
            if cmd.segments {
                exporter.download_all(&segments).await?;
            }
        }
        Err(e) => {
            warn!("{}", e);
            if segments.iter().any(|s| s.has_audio()) {
                println!("Merge failed; saving individual segments instead");
                exporter.download_all(&segments).await?;
            } else {
                bail!("no segment produced audio");
            }
        }
    }
    Ok(())
}

async fn preview(voice: &str, out: Option<PathBuf>, config: &CastConfig) -> Result<()> {
    if !is_known_voice(voice) {
        bail!("unknown voice '{}' (run `omnicast voices`)", voice);
    }
    let client = SpeechClient::from_config(config, Arc::new(SymphoniaCodec::new()))?;
    let clip = client.synthesize(PREVIEW_TEXT, voice, 1.0).await?;

    let exporter = Exporter::new(out.unwrap_or_else(|| config.resolved_download_dir()));
    let path = exporter
        .download(&clip.bytes, &format!("voice-preview-{}.mp3", voice))
        .await?;
    println!("{} ({}) -> {}", voice, format_time(clip.duration_seconds), path.display());
    Ok(())
}

fn manage_token(action: TokenAction) -> Result<()> {
    let mut store = CredentialStore::load()?;
    match action {
        TokenAction::Set { value } => {
            store.set_token(&value)?;
            if store.token().is_some() {
                println!("Token saved");
            } else {
                println!("Token cleared");
            }
        }
        TokenAction::Clear => {
            store.clear()?;
            println!("Token cleared");
        }
        TokenAction::Show => match store.token() {
            Some(token) => {
                let visible: String = token.chars().take(4).collect();
                println!("Token stored: {}…", visible);
            }
            None => println!("No token stored"),
        },
    }
    Ok(())
}

fn report_events(events: Vec<SessionEvent>) {
    for event in events {
        match event {
            SessionEvent::SegmentsLoaded { count } => println!("{} segments", count),
            SessionEvent::SegmentStarted { id, index } => {
                println!("[{}] generating {}", index + 1, id)
            }
            SessionEvent::SegmentReady { id, duration_seconds } => {
                println!("  ✓ {} ({})", id, format_time(duration_seconds))
            }
            SessionEvent::SegmentFailed { id, message } => println!("  ✗ {}: {}", id, message),
            SessionEvent::BatchFinished(report) => println!(
                "Generated {}/{} segments in {:.1}s",
                report.succeeded,
                report.total,
                report.elapsed.as_secs_f64()
            ),
            SessionEvent::Notice { message } => println!("{}", message),
            SessionEvent::BatchStarted { .. } => {}
        }
    }
}
