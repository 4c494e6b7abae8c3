use super::segment::{Segment, SegmentHandle};
use super::tool_calls::ToolCallEntry;
use super::turn::TurnStatus;
use tokio::sync::mpsc;

/// Change notifications published to the rendering surface while a turn streams.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    SessionBound {
        session_id: String,
    },
    SegmentOpened {
        handle: SegmentHandle,
        segment: Segment,
    },
    /// Full accumulated text of a text segment. Replaces whatever is shown.
    TextRender {
        handle: SegmentHandle,
        content: String,
    },
    ToolCallArgs {
        handle: SegmentHandle,
        fragment: String,
        /// Card detail derived from the arguments received so far.
        detail: Option<String>,
    },
    ToolCallSettled {
        handle: SegmentHandle,
        entry: ToolCallEntry,
    },
    SegmentSealed {
        handle: SegmentHandle,
        empty_eligible: bool,
    },
    Finished {
        status: TurnStatus,
        diagnostic: Option<String>,
    },
}

pub type TurnUpdateSender = mpsc::UnboundedSender<TurnUpdate>;

pub(super) fn emit_turn_update(updates: Option<&TurnUpdateSender>, update: TurnUpdate) {
    if let Some(tx) = updates {
        let _ = tx.send(update);
    }
}
