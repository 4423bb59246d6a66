//! Vendor stream to chat text conversion
//!
//! Decodes server-sent events and folds vendor chunks into the markdown
//! text shown to the user, with model reasoning rendered as a quote block
//! ahead of the reply.

use crate::core::constants::stream;

/// A decoded piece of vendor output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkChunk {
    pub is_thinking: bool,
    pub content: String,
}

impl ThinkChunk {
    pub fn reply(content: impl Into<String>) -> Self {
        Self {
            is_thinking: false,
            content: content.into(),
        }
    }

    pub fn thought(content: impl Into<String>) -> Self {
        Self {
            is_thinking: true,
            content: content.into(),
        }
    }
}

/// What a vendor parser extracted from one SSE data payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedItem {
    Content(ThinkChunk),
    Topic(String),
    Error(String),
}

/// Per-call parser turning raw SSE data into chunks.
///
/// Implementations may keep state across frames, so a fresh parser is
/// built for every chat call.
pub trait SseChunkParser: Send {
    fn parse(&mut self, data: &str) -> Vec<ParsedItem>;
}

/// Line-oriented SSE decoder.
///
/// Feed it lines without their terminator; it returns the joined `data`
/// of an event when the blank line closing that event arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) -> Option<String> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
        None
    }

    /// Dispatch whatever is pending, used at end of stream
    pub fn flush(&mut self) -> Option<String> {
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}

/// Folds thinking and reply chunks into one markdown message
#[derive(Debug, Default)]
pub struct ThinkingAssembler {
    text: String,
    last_is_thinking: bool,
    in_thinking: bool,
    tagged: bool,
}

impl ThinkingAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Append a chunk and return the piece of markdown it produced
    pub fn push(&mut self, mut chunk: ThinkChunk) -> Option<String> {
        if chunk.content.is_empty() {
            return None;
        }

        // Some models inline their reasoning between <think> tags
        if !chunk.is_thinking {
            if let Some(rest) = chunk.content.strip_prefix(stream::THINK_OPEN) {
                chunk.is_thinking = true;
                chunk.content = rest.trim().to_string();
                self.tagged = true;
            } else if let Some(rest) = chunk.content.strip_suffix(stream::THINK_CLOSE) {
                chunk.content = rest.trim().to_string();
                self.tagged = false;
            } else if self.tagged {
                chunk.is_thinking = true;
            }
        }

        let changed = self.last_is_thinking != chunk.is_thinking;
        self.last_is_thinking = chunk.is_thinking;

        let mut piece = String::with_capacity(chunk.content.len() + 4);
        if chunk.is_thinking {
            if !self.in_thinking || changed {
                self.in_thinking = true;
                if !self.text.is_empty() {
                    piece.push('\n');
                }
                piece.push_str("> ");
                piece.push_str(&chunk.content);
            } else {
                piece.push_str(&chunk.content.replace("\n\n", "\n\n> "));
            }
        } else if self.in_thinking || changed {
            self.in_thinking = false;
            piece.push_str("\n\n");
            piece.push_str(&chunk.content);
        } else {
            piece.push_str(&chunk.content);
        }

        self.text.push_str(&piece);
        Some(piece)
    }
}

/// Drop quoted reasoning and blank lines from an assistant message
pub fn strip_thinking(text: &str) -> String {
    text.lines()
        .filter(|line| !line.starts_with('>') && !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Clean a vendor-suggested session title of quotes and trailing punctuation
pub fn trim_topic(topic: &str) -> String {
    const WRAPPING: &[char] = &['"', '“', '”', '*'];
    const TRAILING: &[char] = &[
        '，', '。', '！', '？', '”', '“', '"', '、', ',', '.', '!', '?', '*',
    ];
    topic
        .trim_matches(WRAPPING)
        .trim_end_matches(TRAILING)
        .to_string()
}
