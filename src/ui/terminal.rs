use std::io::{self, Write};

use chrono::Local;

use crate::models::{Message, Role};
use crate::services::conversation::{Usage, UsageLevel};
use crate::services::export::format_time;
use crate::services::StreamResult;

/// Plain-text presentation of the conversation on any writer.
pub struct TerminalView<W: Write> {
    out: W,
    streaming: Option<StreamBuffer>,
}

struct StreamBuffer {
    printed: usize,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streaming: None,
        }
    }

    pub fn show_message(&mut self, message: &Message) -> io::Result<()> {
        let time = format_time(message.created_at, Local::now());
        writeln!(
            self.out,
            "[{}] {}: {}",
            time,
            message.role.display_name(),
            message.content
        )?;
        self.out.flush()
    }

    pub fn show_history(&mut self, messages: &[Message]) -> io::Result<()> {
        for message in messages {
            self.show_message(message)?;
        }
        Ok(())
    }

    /// Render one step of a reply. Only the newly arrived suffix is written.
    pub fn on_stream(&mut self, event: &StreamResult) -> io::Result<()> {
        match event {
            StreamResult::Fragment { accumulated } => {
                let printed = self.begin_reply()?;
                let fresh = accumulated.get(printed..).unwrap_or(accumulated);
                write!(self.out, "{}", fresh)?;
                if let Some(buf) = self.streaming.as_mut() {
                    buf.printed = accumulated.len();
                }
            }
            StreamResult::Done { full_content } => {
                // Nothing streamed in non-streaming mode
                if self.begin_reply()? == 0 {
                    write!(self.out, "{}", full_content)?;
                }
                writeln!(self.out)?;
                self.streaming = None;
            }
            StreamResult::Error { error, partial } => {
                if self.begin_reply()? > 0 || !partial.is_empty() {
                    writeln!(self.out)?;
                }
                writeln!(self.out, "Error: {}", error)?;
                self.streaming = None;
            }
        }
        self.out.flush()
    }

    pub fn show_usage(&mut self, usage: &Usage) -> io::Result<()> {
        let marker = match usage.level {
            UsageLevel::Normal => "",
            UsageLevel::Warning => " (getting long)",
            UsageLevel::Critical => " (oldest messages will be dropped)",
        };
        writeln!(
            self.out,
            "Length: {} / {} ({}%){}",
            usage.chars,
            usage.ceiling,
            usage.percent.round() as u32,
            marker
        )?;
        self.out.flush()
    }

    pub fn show_info(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.out.flush()
    }

    pub fn show_error(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "Error: {}", text)?;
        self.out.flush()
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "> ")?;
        self.out.flush()
    }

    fn begin_reply(&mut self) -> io::Result<usize> {
        if let Some(buf) = &self.streaming {
            return Ok(buf.printed);
        }
        write!(self.out, "{}: ", Role::Assistant.display_name())?;
        self.streaming = Some(StreamBuffer { printed: 0 });
        Ok(0)
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}
