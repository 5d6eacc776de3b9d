//! Protocol command tokenizing.

/// One recognized inbound command. Commands carrying arguments keep
/// their raw tokens; the session interprets them against its state.
#[derive(Debug, Clone)]
pub enum UciCommand {
    Uci,
    IsReady,
    SetOption(Vec<String>),
    UciNewGame,
    Position(Vec<String>),
    Go(Vec<String>),
    Stop,
    PonderHit,
    Quit,
    Unknown(String),
}

/// Split a line into a command. Blank lines produce nothing.
#[must_use]
pub fn parse_uci_command(line: &str) -> Option<UciCommand> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let first = parts.first()?;

    let owned = || parts.iter().map(|p| (*p).to_string()).collect::<Vec<String>>();

    let cmd = match *first {
        "uci" => UciCommand::Uci,
        "isready" => UciCommand::IsReady,
        "setoption" => UciCommand::SetOption(owned()),
        "ucinewgame" => UciCommand::UciNewGame,
        "position" => UciCommand::Position(owned()),
        "go" => UciCommand::Go(owned()),
        "stop" => UciCommand::Stop,
        "ponderhit" => UciCommand::PonderHit,
        "quit" => UciCommand::Quit,
        _ => UciCommand::Unknown(line.trim().to_string()),
    };
    Some(cmd)
}

/// Split `setoption` tokens into a lower-cased (name, value) pair.
/// Multi-token names and values are joined with single spaces; a
/// missing value yields an empty string.
#[must_use]
pub fn parse_setoption(parts: &[String]) -> Option<(String, String)> {
    let mut name_parts: Vec<&str> = Vec::new();
    let mut value_parts: Vec<&str> = Vec::new();
    let mut mode = "";

    for part in parts.iter().skip(1) {
        match part.as_str() {
            "name" if mode.is_empty() => mode = "name",
            "value" if mode == "name" => mode = "value",
            other => match mode {
                "name" => name_parts.push(other),
                "value" => value_parts.push(other),
                _ => return None,
            },
        }
    }

    if name_parts.is_empty() {
        return None;
    }
    Some((
        name_parts.join(" ").to_ascii_lowercase(),
        value_parts.join(" ").to_ascii_lowercase(),
    ))
}
