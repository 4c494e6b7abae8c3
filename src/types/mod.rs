mod event;
mod wire;

pub use event::TurnEvent;
pub use wire::{
    normalize_frame, ChatRequest, ChunkPayload, ErrorPayload, SessionPayload, WireFunction,
    WireToolCall,
};
