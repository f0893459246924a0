//! Slash-command shortcuts that run a tool directly, bypassing the model.
//!
//! `/search <query>`, `/scrape <url>` and `/time` map onto the `web_search`,
//! `scrape_page` and `get_current_time` tools.

use serde_json::json;

use crate::types::ToolCall;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCommand {
    Search(String),
    Scrape(String),
    Time,
}

impl ToolCommand {
    /// Recognize a slash command. Anything else is an ordinary prompt.
    pub fn parse(prompt: &str) -> Option<Self> {
        if let Some(query) = prompt.strip_prefix("/search ") {
            let query = query.trim();
            return (!query.is_empty()).then(|| Self::Search(query.to_string()));
        }
        if let Some(url) = prompt.strip_prefix("/scrape ") {
            let url = url.trim();
            return reqwest::Url::parse(url)
                .ok()
                .map(|_| Self::Scrape(url.to_string()));
        }
        if prompt.trim() == "/time" {
            return Some(Self::Time);
        }
        None
    }

    /// The equivalent tool call, with a generated id.
    pub fn to_tool_call(&self) -> ToolCall {
        let (name, arguments) = match self {
            Self::Search(query) => ("web_search", json!({ "query": query })),
            Self::Scrape(url) => ("scrape_page", json!({ "url": url })),
            Self::Time => ("get_current_time", json!({})),
        };
        ToolCall::with_generated_id(name, arguments.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(
            ToolCommand::parse("/search rust ownership"),
            Some(ToolCommand::Search("rust ownership".into()))
        );
        assert_eq!(
            ToolCommand::parse("/scrape https://example.com/a"),
            Some(ToolCommand::Scrape("https://example.com/a".into()))
        );
        assert_eq!(ToolCommand::parse("  /time \n"), Some(ToolCommand::Time));
    }

    #[test]
    fn ordinary_prompts_and_bad_arguments_are_not_commands() {
        assert_eq!(ToolCommand::parse("what time is it?"), None);
        assert_eq!(ToolCommand::parse("/search   "), None);
        assert_eq!(ToolCommand::parse("/scrape not a url"), None);
        assert_eq!(ToolCommand::parse("/timezone"), None);
    }

    #[test]
    fn maps_to_tool_calls() {
        let call = ToolCommand::Search("tokio".into()).to_tool_call();
        assert_eq!(call.name(), "web_search");
        assert_eq!(call.arguments(), r#"{"query":"tokio"}"#);
        assert_eq!(ToolCommand::Time.to_tool_call().name(), "get_current_time");
    }
}
