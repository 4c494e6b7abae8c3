use crate::state::{ToolCallEntry, ToolCallStatus};
use crate::ui::width::truncate_to_display_width;
use serde_json::Value;

/// Display metadata for a tool card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolMeta<'a> {
    pub label: &'a str,
    /// Argument whose value is shown next to the label.
    pub detail_key: Option<&'static str>,
    /// Detail shown for tools that take no identifying argument.
    pub static_detail: Option<&'static str>,
}

const KNOWN_TOOLS: &[(&str, ToolMeta<'static>)] = &[
    ("read_file", keyed("Read file")),
    ("write_file", keyed("Write file")),
    ("edit_file", keyed("Edit file")),
    ("list_files", keyed("List files")),
    ("build", fixed("Build site", "Building site...")),
    ("get_config", fixed("Read config", "Reading opendoc.yml")),
    ("update_nav", fixed("Update navigation", "Updating navigation")),
];

const fn keyed(label: &'static str) -> ToolMeta<'static> {
    ToolMeta {
        label,
        detail_key: Some("path"),
        static_detail: None,
    }
}

const fn fixed(label: &'static str, detail: &'static str) -> ToolMeta<'static> {
    ToolMeta {
        label,
        detail_key: None,
        static_detail: Some(detail),
    }
}

/// Unknown tools are labelled with their own name and carry no detail.
pub fn tool_meta(tool_name: &str) -> ToolMeta<'_> {
    match KNOWN_TOOLS.iter().find(|(name, _)| *name == tool_name) {
        Some((_, meta)) => *meta,
        None => ToolMeta {
            label: tool_name,
            detail_key: None,
            static_detail: None,
        },
    }
}

/// Card detail for a tracked call. Keyed tools only yield a detail once the
/// arguments received so far parse.
pub fn extract_detail(entry: &ToolCallEntry) -> Option<String> {
    let meta = tool_meta(&entry.name);
    let Some(key) = meta.detail_key else {
        return meta.static_detail.map(str::to_string);
    };

    entry
        .current_arguments()?
        .get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn content_stats(content: &str) -> (usize, usize) {
    (
        content.chars().count(),
        content
            .lines()
            .count()
            .max(usize::from(!content.is_empty())),
    )
}

pub fn status_marker(status: ToolCallStatus) -> &'static str {
    match status {
        ToolCallStatus::Running => "…",
        ToolCallStatus::Done => "✓",
        ToolCallStatus::Error => "✗",
    }
}

/// One-line card header: status marker, label and detail, clipped to `max_width` columns.
pub fn card_header(
    tool_name: &str,
    status: ToolCallStatus,
    detail: Option<&str>,
    max_width: usize,
) -> String {
    let meta = tool_meta(tool_name);
    let mut header = format!("{} {}", status_marker(status), meta.label);
    if let Some(detail) = detail.filter(|detail| !detail.is_empty()) {
        header.push_str("  ");
        header.push_str(detail);
    }
    truncate_to_display_width(&header, max_width)
}

pub fn tool_card_header(entry: &ToolCallEntry, max_width: usize) -> String {
    let detail = extract_detail(entry);
    card_header(&entry.name, entry.status, detail.as_deref(), max_width)
}

pub fn preview_lines(text: &str, max_lines: usize, indent: &str) -> String {
    if text.is_empty() {
        return format!("{indent}<empty>\n");
    }

    let mut out = String::new();
    let lines: Vec<&str> = text.lines().collect();
    for line in lines.iter().take(max_lines) {
        out.push_str(&format!("{indent}{line}\n"));
    }
    if lines.len() > max_lines {
        out.push_str(&format!(
            "{indent}... ({} more lines)\n",
            lines.len() - max_lines
        ));
    }
    out
}

fn preview_write_file(args: &Value, indent: &str, max_lines: usize) -> String {
    let path = args.get("path").and_then(Value::as_str).unwrap_or("<missing>");
    let content = args.get("content").and_then(Value::as_str).unwrap_or("");
    let (chars, lines) = content_stats(content);

    let mut out = String::new();
    out.push_str(&format!("{indent}path: {path}\n"));
    out.push_str(&format!("{indent}content: {chars} chars, {lines} lines\n"));
    out.push_str(&preview_lines(content, max_lines, &format!("{indent}+ ")));
    out
}

fn preview_edit_file(args: &Value, indent: &str, max_lines: usize) -> String {
    let path = args.get("path").and_then(Value::as_str).unwrap_or("<missing>");
    let search = args.get("search").and_then(Value::as_str).unwrap_or("");
    let replace = args.get("replace").and_then(Value::as_str).unwrap_or("");
    let (old_chars, old_lines) = content_stats(search);
    let (new_chars, new_lines) = content_stats(replace);

    let mut out = String::new();
    out.push_str(&format!("{indent}path: {path}\n"));
    out.push_str(&format!(
        "{indent}change: {old_chars} chars/{old_lines} lines -> {new_chars} chars/{new_lines} lines\n"
    ));
    out.push_str(&preview_lines(search, max_lines, &format!("{indent}- ")));
    out.push_str(&preview_lines(replace, max_lines, &format!("{indent}+ ")));
    out
}

/// Body shown under a settled card. `None` when the call had no arguments.
///
/// Parsed arguments are pretty-printed; unparseable arguments are shown as the
/// raw text that arrived.
pub fn format_final_arguments(entry: &ToolCallEntry, indent: &str, max_lines: usize) -> Option<String> {
    if entry.arguments_raw.trim().is_empty() {
        return None;
    }
    let Some(args) = entry.arguments_final.as_ref() else {
        return Some(preview_lines(&entry.arguments_raw, max_lines, indent));
    };
    if args.as_object().is_some_and(|obj| obj.is_empty()) {
        return None;
    }

    let body = match entry.name.as_str() {
        "write_file" if args.is_object() => preview_write_file(args, indent, max_lines),
        "edit_file" if args.is_object() => preview_edit_file(args, indent, max_lines),
        _ => {
            let pretty = serde_json::to_string_pretty(args).unwrap_or_else(|_| args.to_string());
            preview_lines(&pretty, max_lines, indent)
        }
    };
    Some(body)
}
