//! Application entry point — talknotes.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Parse CLI arguments and load [`AppConfig`] (defaults on first run).
//! 3. Resolve the session template and the Whisper model for its locale.
//! 4. Create the session output directory and file persistence.
//! 5. Build the LLM client from config.
//! 6. Spawn the capture pipeline thread (source picked by audio mode).
//! 7. Spawn the stdin command reader thread.
//! 8. Run the session controller on the tokio runtime until the session
//!    ends, then join the pipeline thread.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use talknotes::{
    audio::{AudioSource, LoopbackSource, MicSource, MixedSource},
    config::{AppConfig, AppPaths, AudioMode},
    display::DisplaySink,
    llm::{ApiClient, LlmClient},
    persist::{FilePersistence, PersistenceSink},
    pipeline::{spawn_pipeline, PipelineControl, PipelineEvent, SourceFactory},
    session::{SessionCommand, SessionController, SessionEvent, SessionStatus},
    stt::{Transcriber, WhisperEngine},
    template::SessionTemplate,
};

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

/// Live transcription with periodic LLM digests.
#[derive(Debug, Parser)]
#[command(name = "talknotes", version, about)]
struct Args {
    /// Session template name or path to a .toml file
    #[arg(short, long)]
    template: Option<String>,

    /// Path to an alternative settings.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio mode override: mic | system | mix
    #[arg(short, long)]
    audio: Option<String>,

    /// Output directory override
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Free-text session context bound into every prompt
    #[arg(long)]
    context: Option<String>,
}

fn parse_audio_mode(s: &str) -> anyhow::Result<AudioMode> {
    match s {
        "mic" | "mic_only" => Ok(AudioMode::MicOnly),
        "system" | "system_only" => Ok(AudioMode::SystemOnly),
        "mix" => Ok(AudioMode::Mix),
        other => anyhow::bail!("unknown audio mode {other:?} (mic | system | mix)"),
    }
}

// ---------------------------------------------------------------------------
// Console display sink
// ---------------------------------------------------------------------------

struct ConsoleSink;

impl DisplaySink for ConsoleSink {
    fn publish(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Status(status) => {
                let text = match status {
                    SessionStatus::Idle => "idle",
                    SessionStatus::Recording => "recording",
                    SessionStatus::Paused => "paused",
                    SessionStatus::Stopped => "stopped",
                };
                println!("● {text}");
            }
            SessionEvent::Transcript(lines) => {
                for line in lines {
                    println!("{line}");
                }
            }
            SessionEvent::Level { .. } => {} // too noisy for a console
            SessionEvent::DigestStarted => println!("… digest running"),
            SessionEvent::DigestReady { number, markdown } => {
                println!("\n──── digest #{number} ────\n{markdown}\n────────────────────\n");
            }
            SessionEvent::DigestFailed {
                consecutive_failures,
                error,
            } => {
                eprintln!("✗ digest failed ({consecutive_failures} in a row): {error}");
            }
            SessionEvent::QueryStarted { label } => println!("… {label}"),
            SessionEvent::QueryResult { label, content } => {
                println!("\n──── {label} ────\n{content}\n");
            }
            SessionEvent::QueryFailed { label, error } => {
                eprintln!("✗ {label}: {error}");
            }
            SessionEvent::Fatal(message) => eprintln!("✗ fatal: {message}"),
        }
    }
}

// ---------------------------------------------------------------------------
// stdin command reader
// ---------------------------------------------------------------------------

/// Map console input to commands until stop is requested or stdin closes.
///
/// `p` pause · `r` resume · `q` stop · `1..9` quick actions ·
/// `c <text>` set session context
fn read_commands(tx: tokio::sync::mpsc::Sender<SessionCommand>) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        line.clear();
        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => return, // stdin closed
            Ok(_) => {}
        }
        let input = line.trim();
        let command = match input {
            "" => continue,
            "p" => SessionCommand::Pause,
            "r" => SessionCommand::Resume,
            "q" | "stop" => SessionCommand::Stop,
            _ => {
                if let Ok(n) = input.parse::<usize>() {
                    SessionCommand::QuickAction(n)
                } else if let Some(context) = input.strip_prefix("c ") {
                    SessionCommand::SetContext(context.to_string())
                } else {
                    eprintln!("? commands: p (pause), r (resume), q (stop), 1..9, c <text>");
                    continue;
                }
            }
        };
        let stop = command == SessionCommand::Stop;
        if tx.blocking_send(command).is_err() || stop {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("talknotes starting up");

    // 2. CLI + configuration
    let args = Args::parse();
    let paths = AppPaths::new();
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("cannot load config {}", path.display()))?,
        None => AppConfig::load().context("cannot load config")?,
    };
    config
        .transcription
        .validate()
        .context("invalid transcription settings")?;

    let audio_mode = match &args.audio {
        Some(s) => parse_audio_mode(s)?,
        None => config.audio.mode,
    };

    // 3. Template + Whisper model
    let template_name = args.template.as_deref().unwrap_or(&config.template);
    let template = SessionTemplate::resolve(template_name, &paths.templates_dir)
        .with_context(|| format!("cannot load template {template_name:?}"))?;
    log::info!(
        "template: {} ({} quick actions)",
        template.metadata.name,
        template.quick_actions.len()
    );

    let model_name = config.transcription.model_for_locale(&template.metadata.locale);
    let model_path = paths.models_dir.join(format!("{model_name}.bin"));
    let transcriber: Arc<dyn Transcriber> = Arc::new(
        WhisperEngine::load(&model_path, &template.metadata.locale).with_context(|| {
            format!(
                "cannot load Whisper model {} — download a GGML model into {}",
                model_path.display(),
                paths.models_dir.display()
            )
        })?,
    );
    log::info!("Whisper model loaded: {}", model_path.display());

    // 4. Session output
    let output_dir = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.directory));
    let persistence = FilePersistence::create(&output_dir)
        .with_context(|| format!("cannot create session dir under {}", output_dir.display()))?;
    let wav_path = config
        .output
        .save_audio
        .then(|| persistence.session_dir().join("recording.wav"));
    let persistence: Arc<dyn PersistenceSink> = Arc::new(persistence);

    // 5. LLM client
    let llm: Arc<dyn LlmClient> = Arc::new(ApiClient::from_config(&config.llm));

    // 6. Capture pipeline
    let (event_tx, event_rx) = tokio::sync::mpsc::channel::<PipelineEvent>(64);
    let (command_tx, command_rx) = tokio::sync::mpsc::channel::<SessionCommand>(16);
    let control = Arc::new(PipelineControl::new());

    let recovery = (config.audio.silence_recovery_secs, config.audio.max_restarts);
    let factory: SourceFactory = match audio_mode {
        AudioMode::MicOnly => {
            Box::new(move || Box::new(MicSource::new(recovery.0, recovery.1)) as Box<dyn AudioSource>)
        }
        AudioMode::SystemOnly => Box::new(move || {
            Box::new(LoopbackSource::new(recovery.0, recovery.1)) as Box<dyn AudioSource>
        }),
        AudioMode::Mix => Box::new(move || {
            Box::new(MixedSource::new(
                Box::new(MicSource::new(recovery.0, recovery.1)),
                Box::new(LoopbackSource::new(recovery.0, recovery.1)),
            )) as Box<dyn AudioSource>
        }),
    };

    let pipeline_handle = spawn_pipeline(
        factory,
        config.transcription.clone(),
        template.recognition_hints.clone(),
        transcriber,
        Arc::clone(&control),
        event_tx,
        wav_path,
    );

    // 7. stdin commands + ctrl-c
    println!("commands: p pause · r resume · q stop · c <text> set context");
    for (i, action) in template.quick_actions.iter().enumerate() {
        println!("  {} — {}", i + 1, action.label);
    }
    {
        let tx = command_tx.clone();
        std::thread::Builder::new()
            .name("stdin-commands".into())
            .spawn(move || read_commands(tx))
            .expect("failed to spawn stdin thread");
    }
    if let Some(context) = args.context {
        let _ = command_tx.blocking_send(SessionCommand::SetContext(context));
    }

    // 8. Session controller
    let controller = SessionController::new(
        config.digest.clone(),
        config.digest.compact_token_threshold,
        config.interactive.model.clone(),
        template,
        llm,
        persistence,
        Arc::new(ConsoleSink),
        Arc::clone(&control),
    );

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.spawn({
        let tx = command_tx.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(SessionCommand::Stop).await;
            }
        }
    });

    rt.block_on(controller.run(event_rx, command_rx));

    if pipeline_handle.join().is_err() {
        log::error!("pipeline thread panicked");
    }
    log::info!("goodbye");
    Ok(())
}
