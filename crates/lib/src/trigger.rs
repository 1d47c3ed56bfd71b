//! Trigger matching: decide whether a mesh message is a command for this
//! bridge and strip the trigger down to the prompt.

use crate::config::TriggerConfig;
use regex::Regex;

/// One configured trigger, in match order.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Literal prefix such as `!ask` or `@claw`. Case-sensitive.
    Prefix(String),
    /// Regex tried against the start of the message. Capture group 1 (when
    /// present) is the prompt, otherwise the text after the match.
    Pattern(Regex),
}

/// A matched command: which trigger fired and the remaining prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub trigger: String,
    pub prompt: String,
}

/// Build the ordered trigger list from config. The pattern, when set, is
/// tried after all prefixes. Assumes the config was validated.
pub fn triggers_from_config(config: &TriggerConfig) -> Vec<Trigger> {
    let mut out: Vec<Trigger> = config
        .prefixes
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| Trigger::Prefix(p.to_string()))
        .collect();
    if let Some(ref pattern) = config.pattern {
        if let Ok(re) = Regex::new(pattern) {
            out.push(Trigger::Pattern(re));
        }
    }
    out
}

/// Match `raw` against the ordered trigger list; first match wins.
///
/// The trigger and surrounding whitespace are stripped, plus one leading `:`
/// or `-` separator ("@claw: hi" and "@claw- hi" both work). An empty prompt
/// after stripping is no match; there is nothing to send.
pub fn parse(raw: &str, triggers: &[Trigger]) -> Option<ParsedCommand> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for trigger in triggers {
        let (name, rest) = match trigger {
            Trigger::Prefix(prefix) => match raw.strip_prefix(prefix.as_str()) {
                Some(rest) => (prefix.clone(), rest),
                None => continue,
            },
            Trigger::Pattern(re) => {
                let caps = match re.captures(raw) {
                    Some(caps) => caps,
                    None => continue,
                };
                let whole = match caps.get(0) {
                    Some(m) if m.start() == 0 => m,
                    _ => continue,
                };
                match caps.get(1) {
                    Some(group) => (re.as_str().to_string(), group.as_str()),
                    None => (re.as_str().to_string(), &raw[whole.end()..]),
                }
            }
        };
        let prompt = strip_separator(rest);
        if prompt.is_empty() {
            return None;
        }
        return Some(ParsedCommand {
            trigger: name,
            prompt: prompt.to_string(),
        });
    }
    None
}

/// Drop leading whitespace, at most one `:`/`-`, then whitespace again.
fn strip_separator(rest: &str) -> &str {
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('-'))
        .unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<Trigger> {
        triggers_from_config(&crate::config::TriggerConfig::default())
    }

    #[test]
    fn prefix_match_strips_trigger() {
        let cmd = parse("!ask What is 5x5?", &defaults()).expect("match");
        assert_eq!(cmd.trigger, "!ask");
        assert_eq!(cmd.prompt, "What is 5x5?");
    }

    #[test]
    fn separator_punctuation_is_stripped() {
        assert_eq!(parse("@claw: hi", &defaults()).expect("match").prompt, "hi");
        assert_eq!(parse("@claw- hi", &defaults()).expect("match").prompt, "hi");
        assert_eq!(parse("@claw -hi", &defaults()).expect("match").prompt, "hi");
    }

    #[test]
    fn no_trigger_no_match() {
        assert!(parse("hello there", &defaults()).is_none());
        assert!(parse("", &defaults()).is_none());
    }

    #[test]
    fn matching_is_case_sensitive() {
        assert!(parse("!ASK hello", &defaults()).is_none());
    }

    #[test]
    fn empty_prompt_is_no_match() {
        assert!(parse("!ask", &defaults()).is_none());
        assert!(parse("!ask   ", &defaults()).is_none());
        assert!(parse("@claw:", &defaults()).is_none());
    }

    #[test]
    fn first_match_wins() {
        let triggers = vec![
            Trigger::Prefix("!a".to_string()),
            Trigger::Prefix("!ask".to_string()),
        ];
        let cmd = parse("!ask hi", &triggers).expect("match");
        // "!a" is a prefix of "!ask hi", so it fires first.
        assert_eq!(cmd.trigger, "!a");
        assert_eq!(cmd.prompt, "sk hi");
    }

    #[test]
    fn pattern_trigger_with_capture_group() {
        let config = crate::config::TriggerConfig {
            prefixes: vec![],
            pattern: Some(r"^(?:hey )?bot[,:]?\s+(.*)".to_string()),
        };
        let triggers = triggers_from_config(&config);
        let cmd = parse("hey bot, what's up", &triggers).expect("match");
        assert_eq!(cmd.prompt, "what's up");
        assert!(parse("robot greetings", &triggers).is_none());
    }

    #[test]
    fn pattern_without_group_uses_suffix() {
        let config = crate::config::TriggerConfig {
            prefixes: vec![],
            pattern: Some(r"^!llm\b".to_string()),
        };
        let triggers = triggers_from_config(&config);
        let cmd = parse("!llm tell me", &triggers).expect("match");
        assert_eq!(cmd.prompt, "tell me");
    }
}
