/// Which instruction template a completion is requested with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptMode {
    Feedback,
    Query,
    Summarize,
    Help,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feedback => "feedback",
            Self::Query => "query",
            Self::Summarize => "summarize",
            Self::Help => "help",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            Self::Feedback => FEEDBACK_PROMPT,
            Self::Query => QUERY_PROMPT,
            Self::Summarize => SUMMARIZE_PROMPT,
            Self::Help => HELP_PROMPT,
        }
    }

    /// Summaries read better a little cooler than the configured default. Help answers
    /// stay deterministic.
    pub fn temperature_override(&self) -> Option<f32> {
        match self {
            Self::Summarize => Some(0.4),
            Self::Help => Some(0.0),
            Self::Feedback | Self::Query => None,
        }
    }
}

pub const FEEDBACK_PROMPT: &str = r#"You are a senior product manager's assistant who distills raw user feedback.

Reply with ONLY a JSON object that has exactly these fields:

{
  "summary": "one-sentence summary of the issue or request",
  "tag": "Bug" | "Feature" | "UX" | "Other",
  "urgency": "Low" | "Medium" | "High",
  "nextStep": "a short suggested next step for the team"
}

Rules:
- Use "Bug" when the message mentions a crash, an error, something broken, or similar
- Use "High" urgency when the feedback sounds emotionally urgent (for example "I can't continue")
- Return the JSON object only: no markdown, no preamble, no explanation"#;

pub const QUERY_PROMPT: &str = r#"You convert a natural-language question about collected feedback into filters.

Reply with ONLY a JSON object that may contain these keys:
- "tag": one of "Bug", "Feature", "UX", "Other"
- "urgency": one of "Low", "Medium", "High"
- "flagged": true or false
- "date_range": { "from": "YYYY-MM-DD", "to": "YYYY-MM-DD" }

Rules:
- Always answer with the singular tag: "bugs" becomes "Bug"
- Never use synonyms such as "Issue" for a tag
- Dates are ISO calendar dates (YYYY-MM-DD)
- Only include the filters the question actually mentions"#;

pub const SUMMARIZE_PROMPT: &str =
    "You are a helpful assistant that summarizes Slack conversations into a short product digest.";

pub const HELP_PROMPT: &str = r#"You are a helpful assistant for the Pumi Slack bot.

The user message holds a Context section followed by a Question. Answer the question using only the context. If the answer cannot be found in the context, reply exactly: "I'm not sure, but we'll get back to you."

Keep the answer short and use Slack mrkdwn."#;

/// Packs the knowledge-base text and the question into one help request.
pub fn help_input(context: &str, question: &str) -> String {
    format!("Context:\n{context}\n\nQuestion: {question}")
}
