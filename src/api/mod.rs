pub mod client;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use client::{ByteStream, ChatClient, ChatTransport};
pub use mock_client::{MockResponse, MockTail, MockTransport};
pub use stream::StreamParser;
