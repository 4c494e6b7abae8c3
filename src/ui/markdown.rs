use crossterm::style::Stylize;

/// Turns completed lines of assistant text into terminal output.
///
/// The surface feeds lines in order, so implementations may carry state
/// across calls (fenced code blocks).
pub trait MarkdownRenderer: Send {
    fn render_line(&mut self, line: &str) -> String;
}

/// Passes text through untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl MarkdownRenderer for PlainTextRenderer {
    fn render_line(&mut self, line: &str) -> String {
        line.to_string()
    }
}

/// Light ANSI styling for the subset of markdown the assistant actually emits:
/// headings, bullets, inline code and fenced code blocks.
#[derive(Debug, Default, Clone)]
pub struct AnsiMarkdownRenderer {
    in_code_block: bool,
}

impl AnsiMarkdownRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkdownRenderer for AnsiMarkdownRenderer {
    fn render_line(&mut self, line: &str) -> String {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            self.in_code_block = !self.in_code_block;
            return line.dark_grey().to_string();
        }
        if self.in_code_block {
            return line.cyan().to_string();
        }

        if let Some(heading) = heading_text(trimmed) {
            return heading.bold().to_string();
        }
        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            let indent = &line[..line.len() - trimmed.len()];
            return format!("{indent}• {}", style_inline_code(item));
        }
        style_inline_code(line)
    }
}

fn heading_text(line: &str) -> Option<&str> {
    let hashes = line.chars().take_while(|ch| *ch == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    line[hashes..].strip_prefix(' ')
}

fn style_inline_code(line: &str) -> String {
    let mut out = String::new();
    let mut parts = line.split('`');
    if let Some(first) = parts.next() {
        out.push_str(first);
    }
    let rest: Vec<&str> = parts.collect();
    // An odd number of backticks leaves the last span unterminated; keep it literal.
    let closed = rest.len() - rest.len() % 2;
    for (index, part) in rest.iter().enumerate() {
        if index >= closed {
            out.push('`');
            out.push_str(part);
        } else if index % 2 == 0 {
            out.push_str(&(*part).cyan().to_string());
        } else {
            out.push_str(part);
        }
    }
    out
}
