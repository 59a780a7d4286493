use clap::Parser;
use jarvis_client::render::render_turn;
use jarvis_client::{ChatSession, FileStore, SessionEvent};
use jarvis_common::Settings;
use jarvis_link::client::connect_native;
use jarvis_link::traits::{KeyValueStore, MemoryStore};
use jarvis_link::{ClientConfig, HostSignal, SendOptions, SendOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_FILTER: &str = "jarvis_client=debug,jarvis_link=debug,info";

#[derive(Parser)]
#[command(name = "jarvis")]
#[command(about = "Terminal chat with the Jarvis assistant")]
struct Cli {
    /// Backend WebSocket URL
    #[arg(long)]
    url: Option<String>,
    /// Chat model (deepseek, gemini, ...)
    #[arg(long)]
    model: Option<String>,
    /// Speech recognition model (tiny, base, small, medium, large)
    #[arg(long)]
    whisper: Option<String>,
    /// Text-to-speech voice, or "none"
    #[arg(long)]
    voice: Option<String>,
    /// Data directory for state and logs
    #[arg(long)]
    root: Option<PathBuf>,
    /// Write the effective settings back to the config file
    #[arg(long)]
    save: bool,
}

impl Cli {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(url) = self.url {
            settings.server_url = url;
        }
        if let Some(model) = self.model {
            settings.model = model;
        }
        if let Some(whisper) = self.whisper {
            settings.whisper_model = whisper;
        }
        if let Some(voice) = self.voice {
            settings.tts_voice = voice;
        }
        if let Some(root) = self.root {
            settings.data_root = Some(root);
        }
        settings
    }
}

fn init_tracing(logs: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(logs, "jarvis.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    guard
}

fn open_store(root: &Path) -> Arc<dyn KeyValueStore> {
    let path = jarvis_common::state_path(root);
    match FileStore::open(&path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!("[Store] {:?} unavailable, state will not persist: {}", path, e);
            Arc::new(MemoryStore::new())
        }
    }
}

fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::TurnAppended { turn, .. }) if !turn.is_user => {
                    println!("{}", render_turn(&turn));
                }
                Ok(SessionEvent::TurnAppended { .. }) => {}
                Ok(SessionEvent::Connectivity(true)) => println!("*** connected ***"),
                Ok(SessionEvent::Connectivity(false)) => {
                    println!("*** offline: messages will be sent when the connection returns ***")
                }
                Ok(SessionEvent::BackendError(error)) => println!("!!! backend error: {}", error),
                Ok(SessionEvent::Cleared { session_id }) => {
                    println!("--- new conversation ({}) ---", session_id)
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("[Chat] Terminal missed {} events", n)
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let save = cli.save;
    let settings = cli.apply(Settings::load());

    let root = jarvis_common::init_structure(&settings.root())?;
    let _guard = init_tracing(&jarvis_common::logs_dir(&root));
    info!("=== Jarvis client ===");
    info!("Backend: {}", settings.server_url);
    if save {
        match settings.save() {
            Ok(()) => info!("Settings saved"),
            Err(e) => warn!("Failed to save settings: {}", e),
        }
    }

    let options = SendOptions::default()
        .with_model(settings.model.as_str())
        .with_whisper_model(settings.whisper_model.as_str())
        .with_tts_voice(settings.tts_voice.as_str());

    let store = open_store(&root);
    let config = ClientConfig::default().with_server_url(settings.server_url.clone());
    let link = connect_native(config, store.clone())?;

    let (signals, signal_rx) = broadcast::channel(8);
    link.listen_host_signals(signal_rx);

    let session = ChatSession::new(link, store);
    print_events(session.subscribe());
    for turn in session.turns() {
        println!("{}", render_turn(&turn));
    }
    println!("Commands: /new, /status, /clear, /reconnect, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => break,
            "/new" => {
                session.new_conversation();
            }
            "/status" => println!(
                "state: {:?}, session: {}, queued: {}",
                session.link().state(),
                session.session_id(),
                session.link().pending_count()
            ),
            "/clear" => {
                let dropped = session.link().pending_count();
                session.link().clear_pending();
                println!("(dropped {} queued messages)", dropped);
            }
            "/reconnect" => {
                let _ = signals.send(HostSignal::Online);
            }
            _ => match session.send(&line, &options) {
                Some(SendOutcome::Queued) => println!("(queued)"),
                Some(SendOutcome::Sent) | None => {}
            },
        }
    }

    session.link().disconnect();
    info!("Bye");
    Ok(())
}
