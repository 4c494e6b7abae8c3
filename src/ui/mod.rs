pub mod markdown;
pub mod scheduler;
pub mod terminal;
pub mod width;

pub use markdown::{AnsiMarkdownRenderer, MarkdownRenderer, PlainTextRenderer};
pub use scheduler::{RenderScheduler, DEFAULT_RENDER_DEBOUNCE};
pub use terminal::TerminalSurface;
