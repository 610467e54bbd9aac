//! Slash-command parsing for the interactive chat loop.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text for the assistant
    Say(String),
    New,
    Sessions,
    /// 1-based position in the displayed session list
    Load(usize),
    Think,
    Image {
        style: Option<String>,
        ratio: Option<String>,
        prompt: String,
    },
    Reply {
        target_id: String,
        text: String,
    },
    Analyze {
        path: PathBuf,
        question: String,
    },
    Speak(String),
    Plan,
    Activate(String),
    History,
    Help,
    Quit,
}

pub const HELP: &str = "\
Commands:
  /new                                      start a fresh chat
  /sessions                                 list saved chats
  /load <n>                                 open chat <n> from /sessions
  /think                                    toggle thinking mode
  /image [--style s] [--ratio r] <prompt>   generate images
  /reply <id> <text>                        reply to an assistant message
  /analyze <path> <question>                ask about an image file
  /speak <id>                               speak an assistant message
  /history                                  show this chat with message ids
  /plan                                     show plan and usage
  /activate <code>                          redeem an activation code
  /quit                                     exit";

/// Parse one input line. `Ok(None)` for blank input.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(Command::Say(line.to_string())));
    };

    let (name, args) = split_word(rest);
    let command = match name {
        "new" => Command::New,
        "sessions" => Command::Sessions,
        "load" => {
            let n = args
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or("Usage: /load <n>")?;
            Command::Load(n)
        }
        "think" => Command::Think,
        "image" => parse_image(args)?,
        "reply" => {
            let (target_id, text) = split_word(args);
            if target_id.is_empty() || text.is_empty() {
                return Err("Usage: /reply <id> <text>".to_string());
            }
            Command::Reply {
                target_id: target_id.to_string(),
                text: text.to_string(),
            }
        }
        "analyze" => {
            let (path, question) = split_word(args);
            if path.is_empty() || question.is_empty() {
                return Err("Usage: /analyze <path> <question>".to_string());
            }
            Command::Analyze {
                path: PathBuf::from(path),
                question: question.to_string(),
            }
        }
        "speak" if !args.is_empty() => Command::Speak(args.to_string()),
        "speak" => return Err("Usage: /speak <id>".to_string()),
        "plan" => Command::Plan,
        "activate" if !args.is_empty() => Command::Activate(args.to_string()),
        "activate" => return Err("Usage: /activate <code>".to_string()),
        "history" => Command::History,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("Unknown command: /{other} (try /help)")),
    };
    Ok(Some(command))
}

fn parse_image(mut args: &str) -> Result<Command, String> {
    let mut style = None;
    let mut ratio = None;
    loop {
        let (word, rest) = split_word(args);
        let slot = match word {
            "--style" => &mut style,
            "--ratio" => &mut ratio,
            _ => break,
        };
        let (value, rest) = split_word(rest);
        if value.is_empty() {
            return Err(format!("{word} needs a value"));
        }
        *slot = Some(value.to_string());
        args = rest;
    }
    if args.is_empty() {
        return Err("Usage: /image [--style s] [--ratio r] <prompt>".to_string());
    }
    Ok(Command::Image {
        style,
        ratio,
        prompt: args.to_string(),
    })
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            parse("  hello there ").unwrap(),
            Some(Command::Say("hello there".to_string()))
        );
        assert_eq!(parse("   ").unwrap(), None);
    }

    #[test]
    fn image_flags_come_before_the_prompt() {
        let cmd = parse("/image --ratio 16:9 --style ghibli a fox in --style snow").unwrap();
        assert_eq!(
            cmd,
            Some(Command::Image {
                style: Some("ghibli".to_string()),
                ratio: Some("16:9".to_string()),
                prompt: "a fox in --style snow".to_string(),
            })
        );
        assert!(parse("/image --style").is_err());
        assert!(parse("/image --style real").is_err());
    }

    #[test]
    fn reply_and_analyze_split_on_first_word() {
        assert_eq!(
            parse("/reply msg-1 why is that?").unwrap(),
            Some(Command::Reply {
                target_id: "msg-1".to_string(),
                text: "why is that?".to_string()
            })
        );
        assert_eq!(
            parse("/analyze cat.png what breed?").unwrap(),
            Some(Command::Analyze {
                path: PathBuf::from("cat.png"),
                question: "what breed?".to_string()
            })
        );
        assert!(parse("/reply msg-1").is_err());
    }

    #[test]
    fn load_is_one_based() {
        assert_eq!(parse("/load 2").unwrap(), Some(Command::Load(2)));
        assert!(parse("/load 0").is_err());
        assert!(parse("/load two").is_err());
    }

    #[test]
    fn unknown_commands_are_reported() {
        let err = parse("/dance").unwrap_err();
        assert!(err.contains("/dance"));
        assert_eq!(parse("/exit").unwrap(), Some(Command::Quit));
    }
}
