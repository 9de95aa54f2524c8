//! Slash command parsing for the terminal front end
//!
//! Lines starting with `/` are commands; everything else is a chat message.

use std::path::PathBuf;
use thiserror::Error;

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text to send to the assistant
    Chat(String),
    Login {
        username: String,
        password: String,
    },
    Register {
        username: String,
        email: String,
        password: String,
        confirm_password: String,
    },
    Logout,
    NewChat,
    Threads,
    /// Open the n-th listed thread (1-based)
    Open(usize),
    Upload(PathBuf),
    Documents,
    RemoveDocument(String),
    ClearDocuments,
    Help,
    Quit,
}

impl Command {
    /// Commands that only make sense with a signed-in session
    pub fn requires_auth(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Register { .. } | Command::Help | Command::Quit
        )
    }

    /// Knowledge-base commands, locked while a rate-limit cooldown runs
    pub fn touches_knowledge_base(&self) -> bool {
        matches!(
            self,
            Command::Documents | Command::RemoveDocument(_) | Command::ClearDocuments
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command: /{0}. Type /help for a list of commands")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  /login <username> <password>                     Sign in
  /register <username> <email> <password> <confirm> Create an account
  /logout                                          Sign out
  /new                                             Start a new chat
  /threads                                         List conversations
  /open <n>                                        Open conversation n from /threads
  /upload <path>                                   Add a PDF or text file to the knowledge base
  /docs                                            List uploaded documents
  /rm <name>                                       Delete a document
  /clear-docs                                      Delete every document
  /help                                            Show this help
  /quit                                            Exit
Anything else is sent to the assistant.";

/// Split a command line into name and argument string
///
/// Returns `None` when the line is not a command.
fn split(input: &str) -> Option<(&str, &str)> {
    let without_slash = input.strip_prefix('/')?;
    if without_slash.is_empty() {
        return None;
    }
    match without_slash.find(char::is_whitespace) {
        Some(idx) => Some((&without_slash[..idx], without_slash[idx..].trim_start())),
        None => Some((without_slash, "")),
    }
}

fn resolve_alias(name: &str) -> &str {
    match name {
        "q" | "exit" => "quit",
        "h" | "?" => "help",
        "n" => "new",
        "t" | "ls" => "threads",
        "documents" => "docs",
        "delete" => "rm",
        other => other,
    }
}

/// Parse one input line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let input = line.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let Some((name, args)) = split(input) else {
        return Ok(Some(Command::Chat(input.to_string())));
    };
    let words: Vec<&str> = args.split_whitespace().collect();

    let command = match resolve_alias(name) {
        "login" => match words.as_slice() {
            [username, password] => Command::Login {
                username: username.to_string(),
                password: password.to_string(),
            },
            _ => return Err(CommandError::Usage("/login <username> <password>")),
        },
        "register" => match words.as_slice() {
            [username, email, password, confirm] => Command::Register {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                confirm_password: confirm.to_string(),
            },
            _ => {
                return Err(CommandError::Usage(
                    "/register <username> <email> <password> <confirm>",
                ))
            }
        },
        "logout" => Command::Logout,
        "new" => Command::NewChat,
        "threads" => Command::Threads,
        "open" => match args.parse::<usize>() {
            Ok(n) if n > 0 => Command::Open(n),
            _ => return Err(CommandError::Usage("/open <n>")),
        },
        "upload" if !args.is_empty() => Command::Upload(PathBuf::from(args)),
        "upload" => return Err(CommandError::Usage("/upload <path>")),
        "docs" => Command::Documents,
        "rm" if !args.is_empty() => Command::RemoveDocument(args.to_string()),
        "rm" => return Err(CommandError::Usage("/rm <name>")),
        "clear-docs" => Command::ClearDocuments,
        "help" => Command::Help,
        "quit" => Command::Quit,
        _ => return Err(CommandError::Unknown(name.to_string())),
    };
    Ok(Some(command))
}
