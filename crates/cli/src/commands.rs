//! Line commands for the interactive terminal front end.

use inspecta_core::photo::PhotoKey;

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Empty,
    Quit,
    Next,
    Back,
    ContinueAnyway,
    /// Retake the named photo, or the one the current step refers to.
    Retake(Option<PhotoKey>),
    Finalize,
    Download,
    NewInspection,
    Note(String),
    /// Free text: a name and document, a plate or a photo path
    /// depending on the step.
    Text(String),
}

/// Parse a line of input.
///
/// Keywords are matched case-insensitively; everything unrecognised is
/// passed through as [`Command::Text`].
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match (head.to_ascii_lowercase().as_str(), rest) {
        ("q" | "quit" | "exit", "") => Command::Quit,
        ("n" | "next", "") => Command::Next,
        ("b" | "back", "") => Command::Back,
        ("c" | "continue", "") => Command::ContinueAnyway,
        ("r" | "retake", "") => Command::Retake(None),
        ("r" | "retake", key) => match PhotoKey::parse(key) {
            Ok(key) => Command::Retake(Some(key)),
            Err(_) => Command::Text(line.to_string()),
        },
        ("f" | "finalize", "") => Command::Finalize,
        ("d" | "download", "") => Command::Download,
        ("new", "") => Command::NewInspection,
        ("note", text) if !text.is_empty() => Command::Note(text.to_string()),
        _ => Command::Text(line.to_string()),
    }
}

/// Split `name, document` input from the identity step.
pub fn split_identity(text: &str) -> Option<(&str, &str)> {
    let (name, document) = text.rsplit_once(',')?;
    Some((name.trim(), document.trim()))
}
