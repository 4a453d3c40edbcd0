//! CLI channel: a stdin/stdout REPL.
//!
//! Lines are read one at a time and each is handled to completion before
//! the next prompt is printed, so input is effectively disabled while a
//! completion request is in flight.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::conversation::{Assistant, ConnectReport, Submission, SubmissionParser, TurnReply};

const HELP: &str = "\
Commands:
  /connect <path>  read a knowledge folder
  /status          show onboarding progress and knowledge stats
  /reset           forget everything and start over
  /help            show this help
  /quit            exit";

pub struct CliChannel {
    assistant: Arc<Mutex<Assistant>>,
}

impl CliChannel {
    pub fn new(assistant: Arc<Mutex<Assistant>>) -> Self {
        Self { assistant }
    }

    /// Run against the process's stdin and stdout until EOF or `/quit`.
    pub async fn run(&self) -> std::io::Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        self.run_with(stdin, &mut stdout).await
    }

    pub async fn run_with<R, W>(&self, reader: R, out: &mut W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        {
            let mut assistant = self.assistant.lock().await;
            let greeting = assistant.start().await.map(|m| m.content.clone());
            let opening = greeting.or_else(|| assistant.last_reply().map(|m| m.content.clone()));
            if let Some(text) = opening {
                write_block(out, &text).await?;
            }
        }

        let mut lines = reader.lines();
        loop {
            out.write_all(b"> ").await?;
            out.flush().await?;

            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            };

            let mut assistant = self.assistant.lock().await;
            match SubmissionParser::parse(&line) {
                Submission::Empty => {}
                Submission::Quit => break,
                Submission::Help => write_block(out, HELP).await?,
                Submission::Status => {
                    let status = assistant.status();
                    let text = format!(
                        "Mode: {:?}\nStep: {} ({})\nDocuments: {}\nMessages: {}\nModel: {}",
                        status.mode,
                        status.step_index,
                        status.step_id.as_deref().unwrap_or("-"),
                        status.documents,
                        status.messages,
                        status.model,
                    );
                    write_block(out, &text).await?;
                }
                Submission::Reset => {
                    assistant.reset().await;
                    write_block(out, "Everything has been cleared.").await?;
                    let opening = assistant.start().await.map(|m| m.content.clone());
                    if let Some(text) = opening {
                        write_block(out, &text).await?;
                    }
                }
                Submission::ConnectFolder { path } => {
                    let report = assistant.connect_folder(path.as_deref()).await;
                    write_block(out, &describe_connect(&report)).await?;
                }
                Submission::UserInput { content } => {
                    let reply = assistant.submit(&content).await;
                    write_reply(out, &reply).await?;
                }
            }
        }
        Ok(())
    }
}

async fn write_reply<W: AsyncWrite + Unpin>(out: &mut W, reply: &TurnReply) -> std::io::Result<()> {
    if let Some(ref text) = reply.response {
        write_block(out, text).await?;
    }
    if let Some(ref report) = reply.connected {
        write_block(out, &describe_connect(report)).await?;
    }
    Ok(())
}

async fn write_block<W: AsyncWrite + Unpin>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(format!("\n{text}\n\n").as_bytes()).await
}

pub fn describe_connect(report: &ConnectReport) -> String {
    match report {
        ConnectReport::Connected { documents, skipped } if *skipped > 0 => {
            format!("Connected! Loaded {documents} documents ({skipped} unreadable files skipped).")
        }
        ConnectReport::Connected { documents, .. } => {
            format!("Connected! Loaded {documents} documents.")
        }
        ConnectReport::Cancelled => "No folder selected.".to_string(),
        ConnectReport::Failed { notice } => format!("Could not read that folder: {notice}"),
    }
}
