//! Write-only clipboard boundary.
//!
//! The library only ever writes plain text. [`SystemClipboard`] talks to the
//! OS clipboard (behind the `clipboard` feature); tests and headless hosts
//! supply their own [`Clipboard`] implementation.

use crate::error::McqError;

/// Destination for copied text.
pub trait Clipboard {
    /// Replace the clipboard contents with `text`.
    fn set_text(&mut self, text: &str) -> Result<(), McqError>;
}

/// In-memory clipboard that keeps the last written text.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), McqError> {
        self.contents = Some(text.to_string());
        Ok(())
    }
}

/// The operating-system clipboard.
#[cfg(feature = "clipboard")]
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

#[cfg(feature = "clipboard")]
impl SystemClipboard {
    /// Connect to the system clipboard. Fails on headless hosts.
    pub fn new() -> Result<Self, McqError> {
        let inner = arboard::Clipboard::new().map_err(|e| McqError::ClipboardError {
            detail: e.to_string(),
        })?;
        Ok(Self { inner })
    }
}

#[cfg(feature = "clipboard")]
impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), McqError> {
        self.inner
            .set_text(text.to_string())
            .map_err(|e| McqError::ClipboardError {
                detail: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_clipboard_keeps_last_write() {
        let mut cb = MemoryClipboard::new();
        assert_eq!(cb.contents(), None);
        cb.set_text("one").unwrap();
        cb.set_text("two").unwrap();
        assert_eq!(cb.contents(), Some("two"));
    }

    #[cfg(feature = "clipboard")]
    #[test]
    #[ignore = "Requires display server"]
    fn system_clipboard_roundtrip() {
        let mut cb = SystemClipboard::new().unwrap();
        cb.set_text("mcq-extract test").unwrap();
    }
}
