//! Option structs for loading, parsing and painting.

use crate::rendering::graphics_state::Color;

/// Content interpretation options.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    /// Maximum nesting of form XObjects invoked through `Do`
    pub max_form_depth: usize,
    /// Emit text runs; when off, show operators only move the text matrix
    pub record_text: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_form_depth: 12,
            record_text: true,
        }
    }
}

/// Object store options.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryOptions {
    /// Number of decoded streams kept in the LRU cache
    pub stream_cache_capacity: usize,
}

impl Default for LibraryOptions {
    fn default() -> Self {
        LibraryOptions {
            stream_cache_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderTarget {
    #[default]
    Screen,
    Print,
}

/// Per-call painting hints.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderHints {
    pub target: RenderTarget,
    /// Page background painted under the content, if any
    pub background: Option<Color>,
    /// Paint annotation appearance streams
    pub annotations: bool,
}

impl RenderHints {
    pub fn screen() -> Self {
        RenderHints {
            target: RenderTarget::Screen,
            background: Some(Color::white()),
            annotations: true,
        }
    }

    pub fn print() -> Self {
        RenderHints {
            target: RenderTarget::Print,
            background: None,
            annotations: true,
        }
    }
}

impl Default for RenderHints {
    fn default() -> Self {
        Self::screen()
    }
}
