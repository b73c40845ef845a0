use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::APP_NAME;
use crate::providers::CompletionTransport;
use crate::services::export::{default_export_path, write_export};
use crate::services::{
    AppSettings, ChatError, ChatSession, CompletionStreamReader, ConversationStore, KeyValueStore,
    RequestOptions,
};
use crate::ui::TerminalView;

const HELP: &str = "Commands:
  /new            start a new conversation
  /clear          delete saved history and start over
  /export [path]  write the conversation to a text file
  /usage          show how much of the context budget is used
  /help           show this help
  /quit           exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Send(String),
    NewChat,
    Clear,
    Export(Option<PathBuf>),
    Usage,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Command::Send(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "new" => Command::NewChat,
            "clear" => Command::Clear,
            "export" if arg.is_empty() => Command::Export(None),
            "export" => Command::Export(Some(PathBuf::from(arg))),
            "usage" => Command::Usage,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

/// Application context: everything one chat window needs, built once in `main`.
pub struct App {
    session: ChatSession,
    view: TerminalView<Stdout>,
}

impl App {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        settings: &AppSettings,
        transport: Arc<dyn CompletionTransport>,
    ) -> Self {
        let store = ConversationStore::new(
            storage,
            settings.welcome_message.clone(),
            settings.max_context_chars,
        );
        let reader = CompletionStreamReader::new(transport, RequestOptions::from(settings));
        Self {
            session: ChatSession::new(store, reader),
            view: TerminalView::new(io::stdout()),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        self.session.load();
        self.view.show_info(&format!("{} (type /help for commands)", APP_NAME))?;
        self.view.show_history(self.session.messages())?;
        self.view.show_usage(&self.session.usage())?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            self.view.prompt()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };

            match Command::parse(&line) {
                Command::Send(text) => self.send(&text).await?,
                Command::NewChat => {
                    self.session.new_chat();
                    self.view.show_history(self.session.messages())?;
                    self.view.show_usage(&self.session.usage())?;
                }
                Command::Clear => {
                    self.session.clear_history();
                    self.view.show_history(self.session.messages())?;
                    self.view.show_usage(&self.session.usage())?;
                }
                Command::Export(path) => {
                    let path = path.unwrap_or_else(|| default_export_path(Local::now()));
                    match write_export(self.session.messages(), &path) {
                        Ok(()) => self.view.show_info(&format!("Exported to {}", path.display()))?,
                        Err(e) => self.view.show_error(&format!("{:#}", e))?,
                    }
                }
                Command::Usage => self.view.show_usage(&self.session.usage())?,
                Command::Help => self.view.show_info(HELP)?,
                Command::Quit => break,
                Command::Empty => self.view.show_info("Please enter a message.")?,
                Command::Unknown(name) => {
                    self.view.show_error(&format!("Unknown command: /{}", name))?
                }
            }
        }

        tracing::info!("Exiting");
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let view = &mut self.view;
        let result = self
            .session
            .send_message(text, |event| {
                if let Err(e) = view.on_stream(&event) {
                    tracing::warn!("Failed to write to terminal: {}", e);
                }
            })
            .await;

        // Provider errors were already rendered through the stream callback
        if let Err(ChatError::Busy) = result {
            self.view
                .show_error("Please wait for the current reply to finish.")?;
        }
        self.view.show_usage(&self.session.usage())?;
        Ok(())
    }
}
