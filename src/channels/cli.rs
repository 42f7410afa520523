//! CLI channel — stdin/stdout REPL for local testing.
//!
//! Lines map to events: `/cmd` is a command, `#key` presses a button,
//! `!photo uid:ref:size ...` uploads an image in several resolutions and
//! anything else is plain text.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::channels::{Channel, EventStream, InboundEvent};
use crate::error::ChannelError;
use crate::form::{Command, Event, ImageVariant, Keyboard, Reply, Response};

const PARTICIPANT: &str = "local-user";

/// A simple CLI channel that reads from stdin and writes to stdout.
pub struct CliChannel;

impl CliChannel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Map one input line to an event.
pub fn parse_line(line: &str) -> Result<Event, ChannelError> {
    let line = line.trim();

    if let Some(key) = line.strip_prefix('#') {
        return Ok(Event::choice(key.trim()));
    }

    if let Some(rest) = line
        .strip_prefix("!photo")
        .filter(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    {
        let images = rest
            .split_whitespace()
            .map(parse_variant)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Event::images(images));
    }

    if line.starts_with('/') {
        if let Some(command) = Command::parse_slash(line) {
            return Ok(Event::command(command));
        }
    }

    Ok(Event::text(line))
}

fn parse_variant(spec: &str) -> Result<ImageVariant, ChannelError> {
    let mut parts = spec.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(unique_id), Some(retrieval_id), Some(size))
            if !unique_id.is_empty() && !retrieval_id.is_empty() =>
        {
            let size = size
                .parse::<u64>()
                .map_err(|_| ChannelError::InvalidMessage(format!("bad image size in '{spec}'")))?;
            Ok(ImageVariant {
                unique_id: unique_id.to_string(),
                retrieval_id: retrieval_id.to_string(),
                size,
            })
        }
        _ => Err(ChannelError::InvalidMessage(format!(
            "expected uid:ref:size, got '{spec}'"
        ))),
    }
}

/// Render a response for the terminal.
pub fn render(response: &Response) -> String {
    match response {
        Response::TextReply { text, .. } => text.clone(),
        Response::PromptWithChoices { text, keyboard, .. } => {
            let mut out = text.clone();
            push_keyboard(&mut out, keyboard);
            out
        }
        Response::EditPreviousPrompt { text, keyboard, .. } => {
            let mut out = format!("(edited) {text}");
            if let Some(kb) = keyboard {
                push_keyboard(&mut out, kb);
            }
            out
        }
        Response::RecordReply {
            image_retrieval_id,
            caption,
            ..
        } => format!("[photo {image_retrieval_id}]\n{caption}"),
    }
}

/// One line per button row; a button shows the key to type after `#`.
fn push_keyboard(out: &mut String, keyboard: &Keyboard) {
    for row in &keyboard.rows {
        out.push('\n');
        let buttons: Vec<String> = row
            .iter()
            .map(|c| format!("[{}] #{}", c.label, c.key))
            .collect();
        out.push_str(&buttons.join("  "));
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            // Print prompt
            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        let event = match parse_line(&line) {
                            Ok(event) => event,
                            Err(e) => {
                                eprintln!("{e}");
                                eprint!("> ");
                                continue;
                            }
                        };
                        if tx.send(InboundEvent::new("cli", PARTICIPANT, event)).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(&self, _event: &InboundEvent, reply: &Reply) -> Result<(), ChannelError> {
        for response in reply.responses() {
            println!("\n{}\n", render(response));
        }
        eprint!("> ");
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
