//! System prompt assembly
//!
//! The prompt carries the user's stored context, the tool-usage rules the
//! model keeps getting wrong without examples, and a personality suffix.

use std::fmt;
use std::str::FromStr;

/// Assistant speaking style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Personality {
    /// Warm and conversational
    #[default]
    Friendly,
    /// Efficient and precise
    Professional,
    /// Clever, still helpful
    Witty,
    /// Brief and to the point
    Minimalist,
}

impl Personality {
    /// Stable identifier, used for persistence
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::Witty => "witty",
            Self::Minimalist => "minimalist",
        }
    }

    const fn prompt_suffix(self) -> &'static str {
        match self {
            Self::Friendly => {
                "Personality: be warm, helpful, and conversational, like a close friend."
            }
            Self::Professional => "Personality: be efficient, precise, and professional.",
            Self::Witty => "Personality: be clever and fun, but still helpful.",
            Self::Minimalist => "Personality: be brief and to the point.",
        }
    }
}

impl FromStr for Personality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "friendly" => Ok(Self::Friendly),
            "professional" => Ok(Self::Professional),
            "witty" => Ok(Self::Witty),
            "minimalist" => Ok(Self::Minimalist),
            other => Err(format!(
                "unknown personality '{other}' (friendly, professional, witty, minimalist)"
            )),
        }
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the system prompt for one session
#[must_use]
pub fn build_system_prompt(
    user_name: &str,
    personality: Personality,
    context_summary: &str,
    tool_descriptions: &str,
) -> String {
    let current_date = chrono::Local::now().format("%B %d, %Y");

    format!(
        r#"You are an intelligent voice assistant talking to {user_name}. You have memory and can remember things across conversations.

CURRENT DATE: {current_date}

CURRENT CONTEXT:
{context_summary}

RULES FOR TOOL USAGE:
1. To use a tool, write exactly: TOOL: tool_name("arg1", "arg2")
2. Never include parameter names in the call.
   Wrong: TOOL: create_file("test.txt", content="hello")
   Right: TOOL: create_file("test.txt", "hello")
3. For multi-line content, keep it on one line using \n:
   TOOL: create_file("note.txt", "Line 1\nLine 2")
4. Before creating or editing files, check what exists first with list_files.
5. Quote every argument.

Available tools:
{tool_descriptions}
Keep responses concise and conversational; this is spoken aloud, so two or
three sentences is usually right. Address the user as {user_name}.

{suffix}"#,
        suffix = personality.prompt_suffix(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personality_parses_case_insensitively() {
        assert_eq!(
            "Friendly".parse::<Personality>().unwrap(),
            Personality::Friendly
        );
        assert_eq!(
            "WITTY".parse::<Personality>().unwrap(),
            Personality::Witty
        );
        assert!("sarcastic".parse::<Personality>().is_err());
    }

    #[test]
    fn prompt_includes_context_and_tools() {
        let prompt = build_system_prompt(
            "Ada",
            Personality::Professional,
            "User's name: Ada",
            "- read_file: read a file\n",
        );
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("read_file"));
        assert!(prompt.contains("efficient"));
        assert!(prompt.contains("TOOL:"));
    }
}
