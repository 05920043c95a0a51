//! Text rendering of a session and parsing of user input.
//!
//! Every `render_*` function is a pure function of a [`SessionState`]
//! snapshot. [`render`] stitches them together in screen order.

use crate::image::ImageAsset;
use crate::session::{SessionState, Status};
use std::path::PathBuf;

/// Product name shown in the header.
pub const APP_TITLE: &str = "ClearView AI";

const RULE: &str = "────────────────────────────────────────────────────────────";

/// Renders the whole screen.
pub fn render(state: &SessionState) -> String {
    let mut sections = vec![render_header()];
    sections.extend(render_intro(state));
    sections.extend(render_error(state));
    match state.asset() {
        None => sections.push(render_upload_prompt(state)),
        Some(asset) => {
            sections.push(render_comparison(state, asset));
            sections.push(render_prompt_editor(state));
            sections.push(render_actions(state));
        }
    }
    sections.push(render_footer());
    sections.join("\n\n")
}

/// Title bar.
pub fn render_header() -> String {
    format!("{APP_TITLE} · remove filters, overlays and artifacts\n{RULE}")
}

/// Introductory copy, shown only before an image is loaded.
pub fn render_intro(state: &SessionState) -> Option<String> {
    if state.asset().is_some() {
        return None;
    }
    Some(
        [
            "Restore your photos to perfection.",
            "Upload an image with unwanted filters, overlays, or artifacts.",
            "",
            "  • Smart Detection: identifies artificial layers automatically.",
            "  • Detail Preservation: keeps faces and objects sharp.",
            "  • Instant Removal: removes lens flares, blurs, and filters.",
        ]
        .join("\n"),
    )
}

/// Error alert, if the session is in the error state.
pub fn render_error(state: &SessionState) -> Option<String> {
    state
        .error()
        .map(|message| format!("⚠ Processing Failed\n  {message}"))
}

/// File picker prompt.
pub fn render_upload_prompt(state: &SessionState) -> String {
    if state.status() == Status::Uploading {
        return "Reading image...".to_string();
    }
    "Select an image with `open <path>` (PNG, JPG, WEBP up to 10MB).".to_string()
}

/// Side-by-side original and result.
pub fn render_comparison(state: &SessionState, asset: &ImageAsset) -> String {
    let original = format!(
        "Original   {} ({}, {}) [{}]",
        asset.name(),
        asset.mime_type(),
        format_size(asset.size()),
        asset.preview().url()
    );

    let result = match (state.status(), state.displayed_result()) {
        (Status::Processing, _) => "Result     Processing... removing effects".to_string(),
        (_, Some(result)) => format!(
            "Result     {} (image/png, {} base64 chars)",
            abbreviate(result.data_uri(), 40),
            result.base64_payload().len()
        ),
        _ => "Result     Ready to process".to_string(),
    };

    format!("{original}\n{result}")
}

/// Instruction editor.
pub fn render_prompt_editor(state: &SessionState) -> String {
    let lock = if state.can_edit_instruction() {
        ""
    } else {
        " (locked while processing)"
    };
    format!("Instructions{lock}\n  {}", state.instruction())
}

/// Action bar. Disabled actions are shown in parentheses.
pub fn render_actions(state: &SessionState) -> String {
    let submit_label = if state.displayed_result().is_some() {
        "Regenerate"
    } else {
        "Remove Effects"
    };

    let mut actions = vec![
        button("reset", true),
        button(
            if state.status() == Status::Processing {
                "Processing..."
            } else {
                submit_label
            },
            state.can_process(),
        ),
    ];
    if state.result().is_some() {
        actions.push(button("save", true));
    }
    actions.join("  ")
}

/// Privacy note.
pub fn render_footer() -> String {
    format!("{RULE}\nPrivacy Note: Images are processed in memory and not permanently stored.")
}

/// Help text for the interactive prompt.
pub fn render_help() -> String {
    [
        "Commands:",
        "  open <path>      select an image",
        "  prompt <text>    change the instruction",
        "  process          remove effects (alias: regenerate)",
        "  save [path]      save the result",
        "  reset            start over",
        "  status           redraw the screen",
        "  help             show this help",
        "  quit             exit",
    ]
    .join("\n")
}

fn button(label: &str, enabled: bool) -> String {
    if enabled {
        format!("[{label}]")
    } else {
        format!("({label})")
    }
}

fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.1} MB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

fn abbreviate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{head}…")
}

/// A user action typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Select a file.
    Open(PathBuf),
    /// Replace the instruction.
    Prompt(String),
    /// Run the edit.
    Process,
    /// Save the result, optionally to a path.
    Save(Option<PathBuf>),
    /// Start over.
    Reset,
    /// Redraw.
    Status,
    /// Show help.
    Help,
    /// Exit.
    Quit,
    /// Anything we could not parse, with a hint.
    Invalid(String),
}

/// Parses a line of input. Blank lines yield `None`.
pub fn parse_intent(line: &str) -> Option<Intent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let intent = match command.to_lowercase().as_str() {
        "open" | "o" => {
            if rest.is_empty() {
                Intent::Invalid("usage: open <path>".into())
            } else {
                Intent::Open(user_path(rest))
            }
        }
        "prompt" | "p" => {
            if rest.is_empty() {
                Intent::Invalid("usage: prompt <text>".into())
            } else {
                Intent::Prompt(rest.to_string())
            }
        }
        "process" | "regenerate" | "run" => Intent::Process,
        "save" | "download" => Intent::Save((!rest.is_empty()).then(|| user_path(rest))),
        "reset" => Intent::Reset,
        "status" | "ls" => Intent::Status,
        "help" | "?" => Intent::Help,
        "quit" | "exit" | "q" => Intent::Quit,
        other => Intent::Invalid(format!("unknown command `{other}`, type `help`")),
    };
    Some(intent)
}

fn user_path(raw: &str) -> PathBuf {
    expand_home(raw, std::env::var("HOME").ok().as_deref())
}

/// Expands a leading `~` to `home`. Other paths pass through.
fn expand_home(raw: &str, home: Option<&str>) -> PathBuf {
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => PathBuf::from(home),
        (Some(rest), Some(home)) if rest.starts_with('/') => {
            PathBuf::from(format!("{home}{rest}"))
        }
        _ => PathBuf::from(raw),
    }
}
