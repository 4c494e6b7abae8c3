pub mod api;
pub mod config;
pub mod error;
pub mod runtime;
pub mod state;
pub mod tool_preview;
pub mod types;
pub mod ui;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
