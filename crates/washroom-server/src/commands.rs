//! Operator command parsing.

use std::path::PathBuf;

use washroom_core::{PeerId, Result, WashroomError};

/// One-line summary printed for unrecognized input
pub const SUMMARY: &str = "available commands: list, select, alias, shell, dl, up, sysinfo, help, exit";

/// Help text, one line per command
pub const HELP: &str = "\
list                 show connected peers
select <id>          choose the peer later commands act on
alias <id> <name>    give a peer a display name
shell                open a remote shell on the selected peer
dl <file>            download a file from the selected peer
up <file>            upload a local file to the selected peer
sysinfo              show host information of the selected peer
help                 show this help
exit                 leave the console
";

/// Parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Select(PeerId),
    Alias { id: PeerId, name: String },
    Shell,
    Download(String),
    Upload(PathBuf),
    Sysinfo,
    Help,
    Exit,
    /// Unrecognized command word
    Unknown(String),
}

impl Command {
    /// Parse one input line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let words = tokenize(line)?;
        let Some((name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match name.as_str() {
            "list" => Command::List,
            "select" => match args {
                [id] => Command::Select(parse_id(id)?),
                _ => return Err(WashroomError::invalid_command("usage: select <id>")),
            },
            "alias" => match args {
                [id, name] => Command::Alias {
                    id: parse_id(id)?,
                    name: name.clone(),
                },
                _ => return Err(WashroomError::invalid_command("usage: alias <id> <name>")),
            },
            "shell" => Command::Shell,
            "dl" => match args {
                [file] => Command::Download(file.clone()),
                _ => return Err(WashroomError::invalid_command("usage: dl <file>")),
            },
            "up" => match args {
                [file] => Command::Upload(PathBuf::from(file)),
                _ => return Err(WashroomError::invalid_command("usage: up <file>")),
            },
            "sysinfo" => Command::Sysinfo,
            "help" => Command::Help,
            "exit" => Command::Exit,
            other => Command::Unknown(other.to_string()),
        };
        Ok(Some(command))
    }

    /// Check if the command talks to the selected peer
    pub fn requires_selection(&self) -> bool {
        matches!(
            self,
            Command::Shell | Command::Download(_) | Command::Upload(_) | Command::Sysinfo
        )
    }
}

fn parse_id(text: &str) -> Result<PeerId> {
    text.parse()
        .map_err(|_| WashroomError::invalid_command(format!("invalid peer id {:?}", text)))
}

/// Split a line on whitespace, honouring double quotes and backslash escapes
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| WashroomError::invalid_command("trailing backslash"))?;
                current.push(escaped);
                in_word = true;
            }
            '"' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(WashroomError::invalid_command("unterminated quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  list  ").unwrap(), vec!["list"]);
        assert_eq!(
            tokenize(r#"alias 0 "build box""#).unwrap(),
            vec!["alias", "0", "build box"]
        );
        assert_eq!(tokenize(r"up my\ notes.txt").unwrap(), vec!["up", "my notes.txt"]);
        assert_eq!(tokenize(r#"alias 1 """#).unwrap(), vec!["alias", "1", ""]);
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize(r#"alias 0 "open"#).is_err());
        assert!(tokenize("up file\\").is_err());
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("list").unwrap(), Some(Command::List));
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(
            Command::parse("select 3").unwrap(),
            Some(Command::Select(PeerId::new(3)))
        );
        assert_eq!(
            Command::parse(r#"alias 0 "web 1""#).unwrap(),
            Some(Command::Alias {
                id: PeerId::new(0),
                name: "web 1".into()
            })
        );
        assert_eq!(
            Command::parse("up /tmp/a.bin").unwrap(),
            Some(Command::Upload(PathBuf::from("/tmp/a.bin")))
        );
        assert_eq!(
            Command::parse("dl report.pdf").unwrap(),
            Some(Command::Download("report.pdf".into()))
        );
        assert_eq!(
            Command::parse("frobnicate now").unwrap(),
            Some(Command::Unknown("frobnicate".into()))
        );
    }

    #[test]
    fn test_argument_validation() {
        let err = Command::parse("alias 0").unwrap_err();
        assert!(matches!(err, WashroomError::InvalidCommand(_)));

        let err = Command::parse("alias zero name").unwrap_err();
        assert!(err.to_string().contains("invalid peer id"));

        assert!(Command::parse("select").is_err());
        assert!(Command::parse("select -1").is_err());
        assert!(Command::parse("select 1 2").is_err());
        assert!(Command::parse("dl").is_err());
        assert!(Command::parse("up a b").is_err());
    }

    #[test]
    fn test_requires_selection() {
        assert!(Command::Sysinfo.requires_selection());
        assert!(Command::Shell.requires_selection());
        assert!(Command::Download("x".into()).requires_selection());
        assert!(!Command::List.requires_selection());
        assert!(!Command::Exit.requires_selection());
        assert!(!Command::Select(PeerId::new(0)).requires_selection());
    }
}
