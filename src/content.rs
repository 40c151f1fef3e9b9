use serde_json::{Map, Value};

use crate::models::{DailyContent, StudyPlan, StudyTopic, TechConcept, WordOfTheDay};
#[cfg(feature = "app")]
use crate::models::Settings;

/// The one message users see for any failed fetch.
pub const FETCH_ERROR_MESSAGE: &str = "Failed to fetch daily content. Please try again later.";

const INSTRUCTION: &str = "Generate today's content for a productivity hub: a high-end business/tech word of the day, a motivational thought, one O-level math topic and one O-level science topic (for each, provide a short 2-minute read explanation), and a 5-minute read on a fundamental concept from one of the following fields: Basics of Computers, IT Networks, Robotics, or AI.";

#[derive(Debug)]
pub enum ContentError {
    MissingApiKey,
    Transport(String),
    Http { status: u16, body: String },
    EmptyResponse,
    InvalidJson(String),
    MissingField(&'static str),
}

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentError::MissingApiKey => write!(f, "missing gemini api key"),
            ContentError::Transport(err) => write!(f, "gemini request failed: {err}"),
            ContentError::Http { status, body } => write!(f, "gemini http {status}: {body}"),
            ContentError::EmptyResponse => write!(f, "no text content returned from gemini"),
            ContentError::InvalidJson(err) => write!(f, "invalid content json: {err}"),
            ContentError::MissingField(path) => write!(f, "malformed content: missing {path}"),
        }
    }
}

impl std::error::Error for ContentError {}

fn string_schema(description: &str) -> Value {
    serde_json::json!({ "type": "STRING", "description": description })
}

fn topic_schema(topic: &str, explanation: &str) -> Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "topic": string_schema(topic),
            "explanation": string_schema(explanation),
        },
        "required": ["topic", "explanation"]
    })
}

/// JSON-schema constraint handed to the model alongside the instruction.
pub fn response_schema() -> Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "wordOfTheDay": {
                "type": "OBJECT",
                "properties": {
                    "word": string_schema("A high-end, single business or tech-related word."),
                    "definition": string_schema("A concise definition of the word."),
                },
                "required": ["word", "definition"]
            },
            "thoughtOfTheDay": string_schema("A short, powerful motivational quote or thought."),
            "studyPlan": {
                "type": "OBJECT",
                "properties": {
                    "mathTopic": topic_schema(
                        "A specific O-level mathematics topic for today's study.",
                        "A concise, 2-minute read explanation of the math topic. Use newlines for paragraphs.",
                    ),
                    "scienceTopic": topic_schema(
                        "A specific O-level science (Physics, Chemistry, or Biology) topic for today's study.",
                        "A concise, 2-minute read explanation of the science topic. Use newlines for paragraphs.",
                    ),
                },
                "required": ["mathTopic", "scienceTopic"]
            },
            "techConcept": topic_schema(
                "The name of the tech concept field (e.g., 'Robotics', 'AI Concepts').",
                "A detailed but concise explanation of a fundamental concept from the topic, suitable for a 5-minute read. Use newlines for paragraphs.",
            ),
        },
        "required": ["wordOfTheDay", "thoughtOfTheDay", "studyPlan", "techConcept"]
    })
}

pub fn build_request_payload() -> Value {
    serde_json::json!({
        "contents": [
            { "parts": [ { "text": INSTRUCTION } ] }
        ],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": response_schema(),
        }
    })
}

pub fn generate_content_url(api_base: &str, model: &str) -> String {
    format!(
        "{}/models/{}:generateContent",
        api_base.trim().trim_end_matches('/'),
        model.trim()
    )
}

/// Concatenates the text parts of the first candidate.
pub fn extract_candidate_text(response: &Value) -> Result<String, ContentError> {
    let parts = response["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or(ContentError::EmptyResponse)?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect();
    if text.trim().is_empty() {
        return Err(ContentError::EmptyResponse);
    }
    Ok(text)
}

pub fn parse_content_from_text(text: &str) -> Result<DailyContent, ContentError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ContentError::EmptyResponse);
    }

    // If the model wraps JSON in fenced blocks, extract the inner payload.
    let mut candidate = trimmed;
    if let Some(stripped) = strip_fenced_code_block(candidate) {
        candidate = stripped;
    }

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(first_err) => {
            // Fallback: the first {...} region.
            let extracted = extract_first_json_object(candidate)
                .ok_or_else(|| ContentError::InvalidJson(first_err.to_string()))?;
            serde_json::from_str::<Value>(extracted)
                .map_err(|err| ContentError::InvalidJson(err.to_string()))?
        }
    };

    content_from_value(&value)
}

/// Checks every required field and builds the typed payload; nothing partial escapes.
pub fn content_from_value(value: &Value) -> Result<DailyContent, ContentError> {
    let obj = value
        .as_object()
        .ok_or_else(|| ContentError::InvalidJson("content json must be an object".to_string()))?;

    let word = object_field(obj, "wordOfTheDay", "wordOfTheDay")?;
    let word_of_the_day = WordOfTheDay {
        word: required_str(word, "word", "wordOfTheDay.word")?,
        definition: required_str(word, "definition", "wordOfTheDay.definition")?,
    };

    let thought_of_the_day = required_str(obj, "thoughtOfTheDay", "thoughtOfTheDay")?;

    let plan = object_field(obj, "studyPlan", "studyPlan")?;
    let math = object_field(plan, "mathTopic", "studyPlan.mathTopic")?;
    let science = object_field(plan, "scienceTopic", "studyPlan.scienceTopic")?;
    let study_plan = StudyPlan {
        math_topic: StudyTopic {
            topic: optional_str(math, "topic"),
            explanation: required_str(math, "explanation", "studyPlan.mathTopic.explanation")?,
        },
        science_topic: StudyTopic {
            topic: optional_str(science, "topic"),
            explanation: required_str(
                science,
                "explanation",
                "studyPlan.scienceTopic.explanation",
            )?,
        },
    };

    let tech = object_field(obj, "techConcept", "techConcept")?;
    let tech_concept = TechConcept {
        topic: required_str(tech, "topic", "techConcept.topic")?,
        explanation: required_str(tech, "explanation", "techConcept.explanation")?,
    };

    Ok(DailyContent {
        word_of_the_day,
        thought_of_the_day,
        study_plan,
        tech_concept,
    })
}

fn object_field<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<&'a Map<String, Value>, ContentError> {
    obj.get(key)
        .and_then(|v| v.as_object())
        .ok_or(ContentError::MissingField(path))
}

fn required_str(
    obj: &Map<String, Value>,
    key: &str,
    path: &'static str,
) -> Result<String, ContentError> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .ok_or(ContentError::MissingField(path))
}

fn optional_str(obj: &Map<String, Value>, key: &str) -> String {
    obj.get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn strip_fenced_code_block(text: &str) -> Option<&str> {
    let mut s = text.trim();
    if !s.starts_with("```") {
        return None;
    }
    // Trim opening fence line.
    if let Some(pos) = s.find('\n') {
        s = &s[pos + 1..];
    } else {
        return None;
    }
    // Trim trailing fence.
    if let Some(end) = s.rfind("```") {
        return Some(s[..end].trim());
    }
    None
}

fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(text[start..=end].trim())
}

#[cfg(feature = "app")]
pub async fn fetch_daily_content(settings: &Settings) -> Result<DailyContent, ContentError> {
    use std::time::Duration;

    let api_key = settings.gemini_api_key.trim();
    if api_key.is_empty() {
        return Err(ContentError::MissingApiKey);
    }

    let url = generate_content_url(&settings.api_base, &settings.model);
    log::info!("fetching daily content model={}", settings.model);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
        .build()
        .map_err(|err| ContentError::Transport(format!("failed to build http client: {err}")))?;

    let resp = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(&build_request_payload())
        .send()
        .await
        .map_err(|err| ContentError::Transport(err.to_string()))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|err| ContentError::Transport(format!("failed to read response: {err}")))?;

    if !status.is_success() {
        return Err(ContentError::Http {
            status: status.as_u16(),
            body: text,
        });
    }

    let value: Value =
        serde_json::from_str(&text).map_err(|err| ContentError::InvalidJson(err.to_string()))?;
    let generated = extract_candidate_text(&value)?;
    let content = parse_content_from_text(&generated)?;
    log::debug!(
        "daily content received word={}",
        content.word_of_the_day.word
    );
    Ok(content)
}


#[cfg(all(test, feature = "app"))]
mod fetch_tests {
    use super::*;
    use crate::commands;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn settings_for(base: String) -> Settings {
        Settings {
            gemini_api_key: "test-key".to_string(),
            api_base: base,
            request_timeout_secs: 5,
            ..Settings::default()
        }
    }

    /// Answers one request with `status` and `body`; resolves to the raw request head.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let head_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < head_end + length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            head
        });
        (base, handle)
    }

    #[tokio::test]
    async fn empty_key_fails_before_any_request() {
        let settings = Settings {
            gemini_api_key: "   ".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        let result = fetch_daily_content(&settings).await;
        assert!(matches!(result, Err(ContentError::MissingApiKey)));

        let result = commands::fetch_daily_content(&settings).await;
        assert_eq!(result.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn server_error_maps_to_http_status() {
        let body = r#"{"error":"boom"}"#.to_string();
        let (base, server) = serve_once("500 Internal Server Error", body).await;
        let result = fetch_daily_content(&settings_for(base)).await;
        match result {
            Err(ContentError::Http { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("expected http error, got {other:?}"),
        }

        let head = server.await.unwrap();
        assert!(head.starts_with("POST /v1beta/models/gemini-2.5-flash:generateContent"));
        assert!(head.to_lowercase().contains("x-goog-api-key: test-key"));
    }

    #[tokio::test]
    async fn server_error_surfaces_only_the_generic_message() {
        let (base, server) = serve_once("500 Internal Server Error", "{}".to_string()).await;
        let result = commands::fetch_daily_content(&settings_for(base)).await;
        assert!(!result.ok);
        assert_eq!(result.data, None);
        assert_eq!(result.error.as_deref(), Some(FETCH_ERROR_MESSAGE));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn candidate_text_is_parsed_into_content() {
        let content = serde_json::json!({
            "wordOfTheDay": { "word": "Cadence", "definition": "A rhythm." },
            "thoughtOfTheDay": "One thing at a time.",
            "studyPlan": {
                "mathTopic": { "topic": "Limits", "explanation": "Approach a value." },
                "scienceTopic": { "topic": "Osmosis", "explanation": "Water moves." }
            },
            "techConcept": { "topic": "Caching", "explanation": "Keep hot data close." }
        });
        let reply = serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": content.to_string() }] } }]
        });
        let (base, server) = serve_once("200 OK", reply.to_string()).await;

        let fetched = fetch_daily_content(&settings_for(base)).await.unwrap();
        assert_eq!(fetched.word_of_the_day.word, "Cadence");
        assert_eq!(fetched.tech_concept.topic, "Caching");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/v1beta", listener.local_addr().unwrap());
        drop(listener);

        let result = fetch_daily_content(&settings_for(base)).await;
        assert!(matches!(result, Err(ContentError::Transport(_))));
    }
}
