//! Chatter application binary - composition root.
//!
//! Ties the Chatter crates into a terminal chat:
//! 1. Parse CLI arguments and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the chat controller over the simulated camera and microphone
//! 4. Read commands from stdin and render the conversation as it grows

mod cli;
mod commands;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use chatter_capture::{BmpEncoder, MockDeviceProvider};
use chatter_chat::{
    CameraSurface, ChatController, ChatError, ImageFile, NotificationCenter, Notifier,
    RecorderSurface,
};
use chatter_core::config::ChatterConfig;
use chatter_core::types::{Message, NotificationKind, Role};

use crate::cli::CliArgs;
use crate::commands::{mime_type_for, Command, HELP};

/// Interval between chunks from the simulated microphone.
const MIC_CHUNK_INTERVAL: Duration = Duration::from_millis(200);
/// Bytes per simulated microphone chunk (8-bit PCM silence).
const MIC_CHUNK_LEN: usize = 1600;

/// Records notifications and echoes them to the terminal.
struct TerminalNotifier {
    center: NotificationCenter,
}

impl Notifier for TerminalNotifier {
    fn notify(&self, kind: NotificationKind, text: &str) {
        self.center.notify(kind, text);
        println!("  ({}) {}", kind, text);
    }
}

/// Log observer that prints each message as it is appended.
fn render(message: &Message) {
    let who = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let time = message
        .timestamp
        .with_timezone(&chrono::Local)
        .format("%H:%M");
    match (message.media_type(), message.media_url()) {
        (Some(kind), Some(url)) => {
            println!("[{}] {}: {} <{} {}>", time, who, message.content, kind, url)
        }
        _ => println!("[{}] {}: {}", time, who, message.content),
    }
}

/// Feed silence into the open microphone until the recording ends.
fn spawn_microphone_feed(provider: MockDeviceProvider) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(MIC_CHUNK_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if !provider.push_chunk(vec![0x80; MIC_CHUNK_LEN]) {
                break;
            }
        }
        tracing::debug!("Microphone feed ended");
    });
}

/// Terminal front end state.
struct App {
    controller: ChatController<MockDeviceProvider, BmpEncoder>,
    provider: MockDeviceProvider,
    notifications: NotificationCenter,
    camera: Option<CameraSurface<BmpEncoder>>,
    recorder: Option<RecorderSurface>,
}

impl App {
    fn new(config: &ChatterConfig) -> Self {
        let provider = MockDeviceProvider::new()
            .with_resolution(config.capture.video_width, config.capture.video_height);
        let notifications = NotificationCenter::from_config(&config.notifications);
        let notifier = Arc::new(TerminalNotifier {
            center: notifications.clone(),
        });
        let controller = ChatController::new(provider.clone(), BmpEncoder, notifier, config);
        controller.log().subscribe(render);

        Self {
            controller,
            provider,
            notifications,
            camera: None,
            recorder: None,
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Say(text) => match self.controller.send_text(&text) {
                Ok(_) | Err(ChatError::EmptyInput) => {}
                Err(e) => tracing::warn!(error = %e, "Send failed"),
            },
            Command::Upload(path) => self.upload(&path).await,
            Command::Camera => self.open_camera(),
            Command::Snap => match self.camera.take() {
                Some(camera) => {
                    if let Err(e) = camera.take_photo().await {
                        tracing::debug!(error = %e, "Photo capture failed");
                    }
                }
                None => println!("no camera open, use /camera"),
            },
            Command::Cancel => {
                if let Some(camera) = self.camera.take() {
                    camera.cancel();
                    println!("camera closed");
                } else if let Some(recorder) = self.recorder.take() {
                    recorder.cancel();
                    println!("recording discarded");
                } else {
                    println!("nothing to cancel");
                }
            }
            Command::Record => self.start_recording().await,
            Command::Stop => match self.recorder.take() {
                Some(recorder) => {
                    if let Err(e) = recorder.stop().await {
                        tracing::debug!(error = %e, "Recording failed");
                    }
                }
                None => println!("not recording"),
            },
            Command::Notifications => {
                let list = self.notifications.list();
                if list.is_empty() {
                    println!("no notifications");
                }
                for n in list {
                    println!(
                        "{} [{}] {} ({})",
                        n.id,
                        n.kind,
                        n.title,
                        n.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S")
                    );
                }
            }
            Command::Ack(id) => {
                if self.notifications.acknowledge(id) {
                    println!("dismissed");
                } else {
                    println!("no such notification");
                }
            }
            Command::Clear => {
                let removed = self.notifications.clear_all();
                println!("dismissed {} notifications", removed);
            }
            Command::History => match serde_json::to_string_pretty(&self.controller.messages()) {
                Ok(json) => println!("{}", json),
                Err(e) => tracing::warn!(error = %e, "Failed to serialize history"),
            },
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
    }

    async fn upload(&self, path: &Path) {
        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) => {
                println!("cannot read {}: {}", path.display(), e);
                return;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file = ImageFile::new(name, mime_type_for(path), data);
        if let Err(e) = self.controller.upload_image(file) {
            tracing::debug!(error = %e, path = %path.display(), "Upload rejected");
        }
    }

    /// The device is acquired in the background. `/cancel` dismisses a
    /// pending request.
    fn open_camera(&mut self) {
        if let Some(camera) = &self.camera {
            if !camera.session().state().is_terminal() {
                println!("camera is already open, use /snap or /cancel");
                return;
            }
        }
        println!("waiting for camera permission, /cancel to dismiss");
        let camera = self.controller.camera_surface();
        let session = camera.session().clone();
        let controller = self.controller.clone();
        tokio::spawn(async move {
            match controller.acquire_camera(&session).await {
                Ok(()) => {
                    if let Some(res) = session.resolution() {
                        println!(
                            "camera open ({}x{}), /snap to take a photo",
                            res.width, res.height
                        );
                    }
                }
                Err(e) => tracing::debug!(error = %e, "Camera unavailable"),
            }
        });
        self.camera = Some(camera);
    }

    async fn start_recording(&mut self) {
        if self.recorder.is_some() {
            println!("already recording, use /stop or /cancel");
            return;
        }
        match self.controller.start_recording().await {
            Ok(recorder) => {
                spawn_microphone_feed(self.provider.clone());
                self.recorder = Some(recorder);
            }
            Err(e) => tracing::debug!(error = %e, "Microphone unavailable"),
        }
    }

    fn shutdown(&mut self) {
        if let Some(camera) = self.camera.take() {
            camera.cancel();
        }
        if let Some(recorder) = self.recorder.take() {
            recorder.cancel();
        }
        self.controller.shutdown();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();
    let config = ChatterConfig::load_or_default(&config_file);

    // Tracing. RUST_LOG wins over --log-level and the config file.
    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Chatter v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    let mut app = App::new(&config);
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => app.handle(command).await,
            Err(usage) => println!("{}", usage),
        }
    }

    app.shutdown();
    tracing::info!("Chatter stopped");
    Ok(())
}
