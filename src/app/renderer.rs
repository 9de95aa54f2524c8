//! Output side of the terminal front end
//!
//! The loop only talks to a [`Renderer`], so the same flow can write to a
//! terminal or into a buffer under test.

use crate::session::{Message, Notice, NoticeLevel, Role};
use anyhow::Result;
use std::io::Write;

/// A row of the `/threads` listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadEntry {
    pub index: usize,
    pub title: String,
    pub current: bool,
}

/// Trait that front ends implement
pub trait Renderer {
    /// Free-form informational text
    fn line(&mut self, text: &str) -> Result<()>;

    fn notice(&mut self, notice: &Notice) -> Result<()>;

    /// A complete stored message, e.g. when a thread is opened
    fn message(&mut self, message: &Message) -> Result<()>;

    /// Start of an assistant reply revealed in chunks
    fn reply_start(&mut self) -> Result<()>;

    fn reply_chunk(&mut self, chunk: &str) -> Result<()>;

    fn reply_end(&mut self) -> Result<()>;

    fn threads(&mut self, entries: &[ThreadEntry]) -> Result<()>;

    fn documents(&mut self, names: &[String]) -> Result<()>;

    /// Input prompt, annotated with the current user and cooldown
    fn prompt(&mut self, user: Option<&str>, cooldown_secs: Option<u64>) -> Result<()>;
}

/// Plain-text renderer over any writer
pub struct TextRenderer<W: Write> {
    out: W,
}

impl TextRenderer<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn level_tag(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "error",
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn line(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text)?;
        Ok(())
    }

    fn notice(&mut self, notice: &Notice) -> Result<()> {
        writeln!(
            self.out,
            "[{} {}] {}",
            notice.timestamp.format("%H:%M:%S"),
            level_tag(notice.level),
            notice.message
        )?;
        Ok(())
    }

    fn message(&mut self, message: &Message) -> Result<()> {
        let speaker = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        writeln!(self.out, "{}> {}", speaker, message.content)?;
        Ok(())
    }

    fn reply_start(&mut self) -> Result<()> {
        write!(self.out, "assistant> ")?;
        self.out.flush()?;
        Ok(())
    }

    fn reply_chunk(&mut self, chunk: &str) -> Result<()> {
        write!(self.out, "{}", chunk)?;
        self.out.flush()?;
        Ok(())
    }

    fn reply_end(&mut self) -> Result<()> {
        writeln!(self.out)?;
        Ok(())
    }

    fn threads(&mut self, entries: &[ThreadEntry]) -> Result<()> {
        if entries.is_empty() {
            writeln!(self.out, "No previous conversations")?;
            return Ok(());
        }
        for entry in entries {
            let marker = if entry.current { "*" } else { " " };
            writeln!(self.out, "{} {:>2}. {}", marker, entry.index, entry.title)?;
        }
        Ok(())
    }

    fn documents(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            writeln!(self.out, "No documents yet")?;
            return Ok(());
        }
        writeln!(self.out, "{} document(s):", names.len())?;
        for name in names {
            writeln!(self.out, "  - {}", name)?;
        }
        Ok(())
    }

    fn prompt(&mut self, user: Option<&str>, cooldown_secs: Option<u64>) -> Result<()> {
        let who = user.unwrap_or("guest");
        match cooldown_secs {
            Some(secs) => write!(self.out, "{} (cooldown {}s)> ", who, secs)?,
            None => write!(self.out, "{}> ", who)?,
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: impl FnOnce(&mut TextRenderer<Vec<u8>>) -> Result<()>) -> String {
        let mut renderer = TextRenderer::new(Vec::new());
        f(&mut renderer).unwrap();
        String::from_utf8(renderer.into_inner()).unwrap()
    }

    #[test]
    fn test_thread_listing_marks_current() {
        let out = rendered(|r| {
            r.threads(&[
                ThreadEntry {
                    index: 1,
                    title: "Refund Policy".into(),
                    current: true,
                },
                ThreadEntry {
                    index: 2,
                    title: "Chat abc123".into(),
                    current: false,
                },
            ])
        });
        assert_eq!(out, "*  1. Refund Policy\n   2. Chat abc123\n");
    }

    #[test]
    fn test_empty_listings() {
        assert_eq!(rendered(|r| r.threads(&[])), "No previous conversations\n");
        assert_eq!(rendered(|r| r.documents(&[])), "No documents yet\n");
    }

    #[test]
    fn test_reply_reveal_and_prompt() {
        let out = rendered(|r| {
            r.reply_start()?;
            r.reply_chunk("Hello ")?;
            r.reply_chunk("there ")?;
            r.reply_end()?;
            r.prompt(Some("ada"), Some(12))
        });
        assert_eq!(out, "assistant> Hello there \nada (cooldown 12s)> ");
    }
}
