use super::markdown::MarkdownRenderer;
use super::width::clamp_to_char_boundary_left;
use crate::state::{Segment, SegmentHandle, ToolCallStatus, TurnStatus, TurnUpdate};
use crate::tool_preview::{card_header, format_final_arguments, tool_card_header, tool_meta};
use crossterm::{
    cursor::MoveToColumn,
    queue,
    style::{Print, Stylize},
    terminal::{Clear, ClearType},
};
use std::collections::HashMap;
use std::io::{self, Write};

const CARD_BODY_INDENT: &str = "    ";
const CARD_BODY_MAX_LINES: usize = 12;

pub fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| usize::from(cols))
        .unwrap_or(80)
        .max(20)
}

#[derive(Debug, Default)]
struct TextProgress {
    printed: usize,
    partial_line: String,
}

#[derive(Debug)]
struct CardProgress {
    tool_name: String,
    detail: Option<String>,
}

/// Line-oriented rendering of turn updates onto a terminal stream.
///
/// Text is printed a line at a time through the markdown renderer; the
/// trailing partial line is flushed when its segment seals. With `live`
/// enabled the running tool card's header is redrawn in place as its
/// arguments stream.
pub struct TerminalSurface<W: Write> {
    out: W,
    renderer: Box<dyn MarkdownRenderer>,
    width: usize,
    live: bool,
    texts: HashMap<SegmentHandle, TextProgress>,
    cards: HashMap<SegmentHandle, CardProgress>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, renderer: Box<dyn MarkdownRenderer>, width: usize, live: bool) -> Self {
        Self {
            out,
            renderer,
            width: width.max(1),
            live,
            texts: HashMap::new(),
            cards: HashMap::new(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn apply(&mut self, update: &TurnUpdate) -> io::Result<()> {
        match update {
            TurnUpdate::SessionBound { session_id } => {
                tracing::debug!(%session_id, "session bound");
            }
            TurnUpdate::SegmentOpened { handle, segment } => match segment {
                Segment::Text(_) => {
                    self.texts.insert(*handle, TextProgress::default());
                }
                Segment::ToolCall(call) => {
                    let detail = tool_meta(&call.tool_name).static_detail.map(str::to_string);
                    self.cards.insert(
                        *handle,
                        CardProgress {
                            tool_name: call.tool_name.clone(),
                            detail,
                        },
                    );
                    self.draw_running_card(*handle)?;
                }
            },
            TurnUpdate::TextRender { handle, content } => self.render_text(*handle, content)?,
            TurnUpdate::ToolCallArgs { handle, detail, .. } => {
                let changed = match self.cards.get_mut(handle) {
                    Some(card) if detail.is_some() && card.detail != *detail => {
                        card.detail = detail.clone();
                        true
                    }
                    _ => false,
                };
                if changed {
                    self.draw_running_card(*handle)?;
                }
            }
            TurnUpdate::ToolCallSettled { handle, entry } => {
                self.cards.remove(handle);
                let header = tool_card_header(entry, self.width);
                let styled = match entry.status {
                    ToolCallStatus::Done => header.green().to_string(),
                    ToolCallStatus::Error => header.red().to_string(),
                    ToolCallStatus::Running => header,
                };
                self.clear_live_line()?;
                queue!(self.out, Print(styled), Print("\n"))?;
                if let Some(body) = format_final_arguments(entry, CARD_BODY_INDENT, CARD_BODY_MAX_LINES) {
                    queue!(self.out, Print(body.dark_grey()))?;
                }
            }
            TurnUpdate::SegmentSealed { handle, .. } => {
                if let Some(progress) = self.texts.remove(handle) {
                    if !progress.partial_line.is_empty() {
                        let line = self.renderer.render_line(&progress.partial_line);
                        queue!(self.out, Print(line), Print("\n"))?;
                    }
                }
            }
            TurnUpdate::Finished { status, diagnostic } => {
                match status {
                    TurnStatus::Error => {
                        let message = diagnostic.as_deref().unwrap_or("Chat failed");
                        queue!(self.out, Print(format!("Error: {message}").red()), Print("\n"))?;
                    }
                    TurnStatus::Cancelled => {
                        queue!(self.out, Print("(cancelled)".dark_grey()), Print("\n"))?;
                    }
                    TurnStatus::Complete | TurnStatus::Streaming => {}
                }
                self.texts.clear();
                self.cards.clear();
            }
        }
        self.out.flush()
    }

    fn render_text(&mut self, handle: SegmentHandle, content: &str) -> io::Result<()> {
        let Some(progress) = self.texts.get_mut(&handle) else {
            return Ok(());
        };
        // Renders carry the full accumulated text; only the unseen suffix is new.
        let start = clamp_to_char_boundary_left(content, progress.printed);
        if start < progress.printed {
            tracing::debug!(segment = handle.position(), "render shorter than printed text");
            return Ok(());
        }
        progress.partial_line.push_str(&content[start..]);
        progress.printed = content.len();

        while let Some(newline) = progress.partial_line.find('\n') {
            let line: String = progress.partial_line.drain(..=newline).collect();
            let rendered = self.renderer.render_line(line.trim_end_matches(['\n', '\r']));
            queue!(self.out, Print(rendered), Print("\n"))?;
        }
        Ok(())
    }

    fn draw_running_card(&mut self, handle: SegmentHandle) -> io::Result<()> {
        if !self.live {
            return Ok(());
        }
        let Some(card) = self.cards.get(&handle) else {
            return Ok(());
        };
        let header = card_header(
            &card.tool_name,
            ToolCallStatus::Running,
            card.detail.as_deref(),
            self.width,
        );
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(header.yellow())
        )
    }

    fn clear_live_line(&mut self) -> io::Result<()> {
        if self.live {
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StreamDemultiplexer;
    use crate::state::TurnId;
    use crate::types::TurnEvent;
    use crate::ui::markdown::PlainTextRenderer;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    fn render(events: Vec<TurnEvent>) -> String {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut demux = StreamDemultiplexer::new(TurnId(1), Duration::from_millis(50), Some(tx));
        let now = Instant::now();
        for event in events {
            demux.apply(event, now);
        }
        demux.cancel();

        let mut surface = TerminalSurface::new(Vec::new(), Box::new(PlainTextRenderer), 80, false);
        while let Ok(update) = rx.try_recv() {
            surface.apply(&update).unwrap();
        }
        strip_ansi(&String::from_utf8(surface.into_inner()).unwrap())
    }

    fn strip_ansi(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(ch) = chars.next() {
            if ch == '\u{1b}' {
                for next in chars.by_ref() {
                    if next.is_ascii_alphabetic() {
                        break;
                    }
                }
                continue;
            }
            out.push(ch);
        }
        out
    }

    #[test]
    fn test_text_and_tool_card_render_in_order() {
        let output = render(vec![
            TurnEvent::text("Let me check.\nOne moment"),
            TurnEvent::tool_start("t1", "read_file", ""),
            TurnEvent::tool_args("t1", "{\"path\":\"a.md\"}"),
            TurnEvent::tool_end("t1"),
            TurnEvent::text("Done."),
            TurnEvent::StreamEnd,
        ]);

        assert_eq!(
            output,
            "Let me check.\nOne moment\n✓ Read file  a.md\n    {\n      \"path\": \"a.md\"\n    }\nDone.\n"
        );
    }

    #[test]
    fn test_error_diagnostic_follows_content() {
        let output = render(vec![
            TurnEvent::text("partial"),
            TurnEvent::Error {
                message: "rate limited".to_string(),
            },
        ]);
        assert_eq!(output, "partial\nError: rate limited\n");
    }

    #[test]
    fn test_cancel_marks_output() {
        let output = render(vec![TurnEvent::tool_start("t1", "build", "")]);
        assert_eq!(output, "✗ Build site  Building site...\n(cancelled)\n");
    }

    #[test]
    fn test_empty_segments_print_nothing() {
        let output = render(vec![
            TurnEvent::tool_start("t1", "get_config", ""),
            TurnEvent::tool_end("t1"),
            TurnEvent::tool_start("t2", "build", ""),
            TurnEvent::tool_end("t2"),
            TurnEvent::StreamEnd,
        ]);
        assert_eq!(
            output,
            "✓ Read config  Reading opendoc.yml\n✓ Build site  Building site...\n"
        );
    }

    #[test]
    fn test_live_mode_redraws_running_card() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut demux = StreamDemultiplexer::new(TurnId(1), Duration::from_millis(50), Some(tx));
        let now = Instant::now();
        demux.apply(TurnEvent::tool_start("t1", "write_file", ""), now);
        demux.apply(TurnEvent::tool_args("t1", "{\"path\":\"new.md\"}"), now);

        let mut surface = TerminalSurface::new(Vec::new(), Box::new(PlainTextRenderer), 80, true);
        while let Ok(update) = rx.try_recv() {
            surface.apply(&update).unwrap();
        }
        let output = strip_ansi(&String::from_utf8(surface.into_inner()).unwrap());
        assert!(output.contains("… Write file"));
        assert!(output.ends_with("… Write file  new.md"));
    }
}
