//! Input line parsing for the terminal front end.

use std::path::{Path, PathBuf};

use uuid::Uuid;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send.
    Say(String),
    Upload(PathBuf),
    Camera,
    Snap,
    Cancel,
    Record,
    Stop,
    Notifications,
    Ack(Uuid),
    Clear,
    History,
    Help,
    Quit,
}

impl Command {
    /// Parse an input line. Lines not starting with `/` are chat text.
    pub fn parse(line: &str) -> Result<Self, String> {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name {
            "upload" if arg.is_empty() => Err("usage: /upload <path>".to_string()),
            "upload" => Ok(Command::Upload(PathBuf::from(arg))),
            "camera" => Ok(Command::Camera),
            "snap" => Ok(Command::Snap),
            "cancel" => Ok(Command::Cancel),
            "record" => Ok(Command::Record),
            "stop" => Ok(Command::Stop),
            "notifications" => Ok(Command::Notifications),
            "ack" => Uuid::parse_str(arg)
                .map(Command::Ack)
                .map_err(|_| "usage: /ack <notification-id>".to_string()),
            "clear" => Ok(Command::Clear),
            "history" => Ok(Command::History),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: /{}", other)),
        }
    }
}

pub const HELP: &str = "\
Commands:
  <text>              send a message
  /upload <path>      send an image file
  /camera             open the camera
  /snap               take a photo with the open camera
  /cancel             close the camera or discard a recording
  /record             start a voice recording
  /stop               finish the recording and send it
  /notifications      list notifications
  /ack <id>           dismiss a notification
  /clear              dismiss all notifications
  /history            print the conversation as JSON
  /quit               exit";

/// Guess a MIME type from a file extension.
pub fn mime_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
