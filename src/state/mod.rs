mod demux;
mod segment;
mod tool_calls;
mod turn;
mod update;


pub use demux::StreamDemultiplexer;
pub use segment::{Segment, SegmentHandle, SegmentStore, TextSegment, ToolCallSegment};
pub use tool_calls::{parse_arguments, ToolCallEntry, ToolCallStatus, ToolCallTracker};
pub use turn::{Turn, TurnId, TurnStatus};
pub use update::{TurnUpdate, TurnUpdateSender};
