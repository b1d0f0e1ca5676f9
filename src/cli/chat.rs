use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_stream::StreamExt;

use crate::chat::{ChatRelay, SessionStore, StreamEvent};
use crate::core::AppConfig;
use crate::openai::OpenAiClient;

pub async fn run(session: Option<String>, stream: bool, config: AppConfig) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let client = Arc::new(OpenAiClient::from_config(&config));
    let relay = ChatRelay::new(client, SessionStore::new(1), &config.system_message);
    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    println!("Session {}", session_id);

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if stream {
                    print_stream(&relay, &session_id, line).await?;
                } else {
                    match relay.reply(Some(&session_id), Some(line)).await {
                        Ok(reply) => println!("{}", reply),
                        Err(e) => println!("Error: {}", e),
                    }
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

async fn print_stream(relay: &ChatRelay, session_id: &str, line: &str) -> Result<()> {
    let mut events = match relay.reply_stream(Some(session_id), Some(line)).await {
        Ok(events) => events,
        Err(e) => {
            println!("Error: {}", e);
            return Ok(());
        }
    };

    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Fragment(fragment) => {
                write!(stdout, "{}", fragment)?;
                stdout.flush()?;
            }
            StreamEvent::Done => break,
            StreamEvent::Error(message) => {
                write!(stdout, "\nError: {}", message)?;
                break;
            }
        }
    }
    writeln!(stdout)?;

    Ok(())
}
