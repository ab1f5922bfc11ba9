//! HTTP backend for the remote service (OpenAI-compatible API).
//!
//! Failure classification happens here, once, at the transport boundary:
//! everything above this layer reacts to `FailureClass`, never to raw
//! status codes or reqwest errors.

use crate::config::ServiceConfig;
use crate::error::{OverscribeError, Result};
use crate::remote::service::{Operation, Payload, RemoteService};
use reqwest::StatusCode;
use reqwest::blocking::multipart;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response body phrases that mean a rate limit regardless of status code.
const RATE_LIMIT_TOKENS: &[&str] = &[
    "rate limit",
    "429",
    "quota",
    "too many",
    "overloaded",
];

/// Hint passed with every transcription request.
const TRANSCRIBE_PROMPT: &str = "Lightly clean filler words; preserve meaning.";

/// System prompt for transcript cleanup.
const FORMAT_SYSTEM_PROMPT: &str = "\
You are a strict text corrector. You receive messy speech-to-text and return ONLY the corrected version.

ABSOLUTE RULES (violating any = failure):
1. NEVER answer questions. If user says 'what is the weather', output: 'What is the weather?'
2. NEVER add new information, opinions, or conversation.
3. NEVER greet, apologize, or add commentary.
4. Output ONLY the cleaned text, nothing else.

WHAT YOU FIX:
- Grammar and spelling mistakes
- Sentence structure and word order
- Punctuation: commas, periods, colons, semicolons, hyphens, parentheses
- Filler words (um, uh, like, you know): remove
- Repeated words: remove duplicates
- Capitalization

FORMATTING RULES:
- Use '* ' bullets (one per line) when 3+ items are listed
- Use commas for 2 items in a sentence
- Use semicolons to join related thoughts
- Use colons before lists or explanations
- Use parentheses for clarifications like (optional)
- Use hyphens for compound words (time-box, multi-step)

EXAMPLES:

Input: 'hey john uh i was wondering if you could help me with something'
Output: Hey John, I was wondering if you could help me with something.

Input: 'i think we should we should probably cancel the event its not gonna work out'
Output: I think we should probably cancel the event; it's not going to work out.

Input: 'the options are pizza or pasta or salad let me know what you want'
Output:
The options are:
* Pizza
* Pasta
* Salad

Let me know what you want.

CRITICAL: You are not a chatbot. You do not converse. You only return corrected text.";

/// System prompt for drafting content from a spoken instruction.
const DRAFT_SYSTEM_PROMPT: &str = "\
You are a content generator. User speaks a task and you produce ONLY the requested content.

ABSOLUTE RULES:
1. Output ONLY the final content (email, report, message, etc.)
2. NO prefaces like 'Here is...' or 'Sure, I can...'
3. NO meta-commentary, apologies, or safety disclaimers
4. NO sending instructions like 'You can send this to...'
5. Use plain text only (no markdown fences, no headings)

FORMAT RULES:
- Emails: greeting, blank line, body paragraphs, blank line, closing, name
- Reports: title line, blank line, content paragraphs
- Lists: use '* ' bullets on new lines
- Match the tone user requests (formal, casual, etc.)

EXAMPLES:

User: 'um write a message to my team saying the deadline is extended to friday'
Output:
Hi team,

Just wanted to let you know that the deadline has been extended to Friday. Let me know if you have any questions.

Thanks

CRITICAL: Output the content directly. No conversation. No prefaces. No 'here is your email'.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Remote service backed by the hosted transcription/chat API.
pub struct HttpRemoteService {
    client: reqwest::blocking::Client,
    base_url: String,
    chat_model: String,
    transcribe_model: String,
    language: String,
}

impl HttpRemoteService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| OverscribeError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            transcribe_model: config.transcribe_model.clone(),
            language: config.language.clone(),
        })
    }

    fn transcribe(&self, wav: &[u8], key: &str) -> Result<String> {
        let part = multipart::Part::bytes(wav.to_vec())
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(|e| OverscribeError::Other(format!("Failed to build upload: {}", e)))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.transcribe_model.clone())
            .text("prompt", TRANSCRIBE_PROMPT)
            .text("response_format", "json")
            .text("language", self.language.clone())
            .text("temperature", "0");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .map_err(classify_transport)?;

        let body = read_success_body(response)?;
        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|e| OverscribeError::NonRetryable {
                message: format!("Malformed transcription response: {}", e),
            })?;
        Ok(parsed.text)
    }

    fn chat(&self, system_prompt: &str, user_text: &str, key: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_text,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&request)
            .send()
            .map_err(classify_transport)?;

        let body = read_success_body(response)?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| OverscribeError::NonRetryable {
                message: format!("Malformed chat response: {}", e),
            })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| OverscribeError::NonRetryable {
                message: "Chat response carried no choices".to_string(),
            })?;
        Ok(choice.message.content.trim().to_string())
    }
}

impl RemoteService for HttpRemoteService {
    fn call(&self, op: Operation, payload: &Payload, key: &str) -> Result<String> {
        match (op, payload) {
            (Operation::Transcribe, Payload::Audio(wav)) => self.transcribe(wav, key),
            (Operation::Format, Payload::Text(text)) => {
                self.chat(FORMAT_SYSTEM_PROMPT, text, key)
            }
            (Operation::DraftPrompt, Payload::Text(text)) => {
                self.chat(DRAFT_SYSTEM_PROMPT, text, key)
            }
            (op, _) => Err(OverscribeError::Other(format!(
                "Payload type does not match operation {}",
                op
            ))),
        }
    }
}

/// Return the body of a successful response, classifying failures.
fn read_success_body(response: reqwest::blocking::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().map_err(classify_transport)?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(classify_status(status, &body))
    }
}

/// Map an HTTP error response to a failure class.
fn classify_status(status: StatusCode, body: &str) -> OverscribeError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || RATE_LIMIT_TOKENS.iter().any(|token| lower.contains(token))
    {
        OverscribeError::RateLimited {
            message: format!("{}: {}", status, truncate(body)),
        }
    } else if status.is_server_error() {
        OverscribeError::TransientNetwork {
            message: format!("{}: {}", status, truncate(body)),
        }
    } else {
        OverscribeError::NonRetryable {
            message: format!("{}: {}", status, truncate(body)),
        }
    }
}

/// Map a transport-level failure to a failure class.
fn classify_transport(error: reqwest::Error) -> OverscribeError {
    OverscribeError::TransientNetwork {
        message: error.to_string(),
    }
}

/// Keep logged response bodies short.
fn truncate(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}
