use crate::api::{ChatTransport, StreamParser};
use crate::state::StreamDemultiplexer;
use crate::types::{ChatRequest, TurnEvent};
use futures::StreamExt;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Run one turn to completion: open the stream, feed every decoded event to
/// the demultiplexer in arrival order, and fire debounced renders between
/// reads.
///
/// Returns the finished demultiplexer with its update sender still attached;
/// the update feed closes only when the caller drops it.
pub async fn drive_turn<T>(
    transport: &T,
    request: ChatRequest,
    mut demux: StreamDemultiplexer,
    cancel: CancellationToken,
) -> StreamDemultiplexer
where
    T: ChatTransport + ?Sized,
{
    let turn_id = demux.turn().id();
    tracing::debug!(turn = %turn_id, "opening chat stream");

    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            demux.cancel();
            return demux;
        }
        opened = transport.open(&request) => match opened {
            Ok(stream) => stream,
            Err(error) => {
                demux.fail_transport(&error);
                return demux;
            }
        },
    };

    let mut parser = StreamParser::new();
    while !demux.is_finished() {
        let deadline = demux.next_render_deadline();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(turn = %turn_id, "turn cancelled");
                demux.cancel();
            }
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                demux.poll_render(Instant::now());
            }
            chunk = stream.next() => {
                let now = Instant::now();
                match chunk {
                    Some(Ok(bytes)) => {
                        for event in parser.process(&bytes) {
                            demux.apply(event, now);
                        }
                    }
                    Some(Err(error)) => demux.fail_transport(&error),
                    None => {
                        for event in parser.finish() {
                            demux.apply(event, now);
                        }
                        demux.apply(TurnEvent::StreamEnd, now);
                    }
                }
            }
        }
    }

    // Dropping the stream closes the response body.
    drop(stream);
    demux
}
