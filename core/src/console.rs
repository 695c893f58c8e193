/// Terminal front end: prints host events, reads outgoing commands
use crate::host::HostEvent;
use colored::*;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A line typed by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `d <screen_name> <text>`
    Direct { to: String, text: String },
    /// Anything else is posted as a status
    Post { text: String },
}

/// Parse one input line; blank lines yield nothing
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix("d ") {
        let mut parts = rest.trim_start().splitn(2, ' ');
        let to = parts.next().unwrap_or("").trim();
        let text = parts.next().unwrap_or("").trim();
        if !to.is_empty() && !text.is_empty() {
            return Some(Command::Direct {
                to: to.to_string(),
                text: text.to_string(),
            });
        }
    }

    Some(Command::Post {
        text: line.to_string(),
    })
}

/// Render one event as a terminal line
pub fn render_event(event: &HostEvent) -> String {
    match event {
        HostEvent::BuddyAdded { handle } => format!("{} {}", "+".green().bold(), handle.cyan()),
        HostEvent::BuddyOnline { handle } => format!("{} {} is online", "•".green(), handle),
        HostEvent::ConversationCreated { title, .. } => {
            format!("{} joined {}", "⚡".bright_cyan(), title.bright_white().bold())
        }
        HostEvent::ParticipantAdded { handle, .. } => format!("{} {} joined", "→".dimmed(), handle),
        HostEvent::GroupMessage { from, text, sent_at, .. } => {
            let when = sent_at
                .map(|t| t.format("%H:%M ").to_string())
                .unwrap_or_default();
            format!("{}<{}> {}", when.dimmed(), from.cyan().bold(), text)
        }
        HostEvent::DirectMessage { from, text, sent_at } => {
            let when = sent_at
                .map(|t| t.format("%H:%M ").to_string())
                .unwrap_or_default();
            format!("{}[{}] {}", when.dimmed(), from.yellow().bold(), text)
        }
        HostEvent::Error { message } => format!("{} {}", "✗".red().bold(), message.red()),
    }
}

/// Print every event from `rx` until the channel closes
pub fn spawn_printer(mut rx: broadcast::Receiver<HostEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => println!("{}", render_event(&event)),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Console lagged {} events", n);
                    continue;
                }
                Err(_) => break, // channel closed
            }
        }
    })
}
