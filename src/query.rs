//! # Query Parser
//! Turns a buyer's free text into a `ParsedQuery` via one chat completion.
//! Any failure degrades to `ParsedQuery::fallback`; parsing never aborts a
//! search.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm::{strip_code_fences, ChatMessage, ChatOptions, DynChatClient, LlmError};
use crate::model::{ParsedQuery, QueryType};

const PARSE_INSTRUCTION: &str = "You extract sourcing intent from a buyer's search for Chinese manufacturers. \
Respond with ONLY a JSON object of the form \
{\"product\": string, \"location\": string[], \"type\": \"manufacturer\" | \"product\", \"specifications\": {string: string}}. \
`product` is the product or category being sourced, `location` lists any Chinese cities or provinces mentioned, \
`type` is \"product\" when the buyer describes a specific item and \"manufacturer\" otherwise.";

const IMAGE_INSTRUCTION: &str = "Identify the product shown in the image. Reply with a short product search phrase \
(at most 8 words) a buyer would use to find its manufacturer. No punctuation, no explanation.";

const PARSE_OPTS: ChatOptions = ChatOptions {
    temperature: 0.1,
    max_tokens: 300,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("malformed intent json: {0}")]
    Json(String),
    #[error("intent has no product")]
    MissingProduct,
}

/// Loosely-typed model output; every field is optional.
#[derive(Debug, Deserialize)]
struct RawIntent {
    #[serde(default)]
    product: Option<String>,
    #[serde(default)]
    location: Value,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    specifications: Value,
}

pub struct QueryParser {
    chat: DynChatClient,
}

impl QueryParser {
    pub fn new(chat: DynChatClient) -> Self {
        Self { chat }
    }

    /// Parse, falling back to the raw query. The flag reports the fallback.
    pub async fn parse(&self, raw_query: &str) -> (ParsedQuery, bool) {
        match self.try_parse(raw_query).await {
            Ok(p) => (p, false),
            Err(e) => {
                tracing::warn!(target: "pipeline", error = %e, "query parse failed, using raw query");
                (ParsedQuery::fallback(raw_query), true)
            }
        }
    }

    pub async fn try_parse(&self, raw_query: &str) -> Result<ParsedQuery, ParseError> {
        let messages = [
            ChatMessage::system(PARSE_INSTRUCTION),
            ChatMessage::user(raw_query),
        ];
        let reply = self.chat.chat(&messages, PARSE_OPTS).await?;
        parse_intent(&reply.content)
    }

    /// Ask the model for a search phrase describing the pictured product.
    pub async fn describe_image(&self, image_url: &str) -> Result<String, ParseError> {
        let messages = [ChatMessage::user(IMAGE_INSTRUCTION).with_image(image_url)];
        let reply = self
            .chat
            .chat(
                &messages,
                ChatOptions {
                    temperature: 0.2,
                    max_tokens: 40,
                },
            )
            .await?;
        let phrase = strip_code_fences(&reply.content)
            .trim_matches(|c: char| c == '"' || c == '\'' || c.is_whitespace())
            .to_string();
        if phrase.is_empty() {
            return Err(ParseError::MissingProduct);
        }
        Ok(phrase)
    }
}

/// Parse the model's reply into a `ParsedQuery`.
pub fn parse_intent(content: &str) -> Result<ParsedQuery, ParseError> {
    let body = strip_code_fences(content);
    let raw: RawIntent = serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))?;

    let product = raw
        .product
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or(ParseError::MissingProduct)?;

    // `location` may arrive as a list or a single string.
    let locations = match raw.location {
        Value::String(s) => s
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    let query_type = match raw.kind.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("product") => QueryType::Product,
        _ => QueryType::Manufacturer,
    };

    let specifications = match raw.specifications {
        Value::Object(o) => o
            .into_iter()
            .filter_map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s,
                    Value::Null => return None,
                    other => other.to_string(),
                };
                (!v.trim().is_empty()).then(|| (k, v.trim().to_string()))
            })
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(ParsedQuery {
        product,
        locations,
        query_type,
        specifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatClient, ChatReply, DisabledChat};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Canned(&'static str);

    #[async_trait]
    impl ChatClient for Canned {
        async fn chat(&self, _m: &[ChatMessage], _o: ChatOptions) -> Result<ChatReply, LlmError> {
            Ok(ChatReply {
                content: self.0.to_string(),
            })
        }
        fn name(&self) -> &'static str {
            "canned"
        }
    }

    #[test]
    fn parses_fenced_json() {
        let s = "```json\n{\"product\":\"LED strip\",\"location\":[\"Shenzhen\"],\"type\":\"product\",\"specifications\":{\"voltage\":\"12V\",\"ip\":65}}\n```";
        let p = parse_intent(s).unwrap();
        assert_eq!(p.product, "LED strip");
        assert_eq!(p.locations, vec!["Shenzhen"]);
        assert_eq!(p.query_type, QueryType::Product);
        assert_eq!(p.specifications.get("voltage").map(String::as_str), Some("12V"));
        assert_eq!(p.specifications.get("ip").map(String::as_str), Some("65"));
    }

    #[test]
    fn location_string_is_split() {
        let p = parse_intent(r#"{"product":"valves","location":"Wenzhou, Zhejiang"}"#).unwrap();
        assert_eq!(p.locations, vec!["Wenzhou", "Zhejiang"]);
        assert_eq!(p.query_type, QueryType::Manufacturer);
    }

    #[test]
    fn missing_product_is_an_error() {
        assert!(matches!(
            parse_intent(r#"{"product":"  "}"#),
            Err(ParseError::MissingProduct)
        ));
        assert!(matches!(parse_intent("not json"), Err(ParseError::Json(_))));
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_raw_query() {
        let parser = QueryParser::new(Arc::new(DisabledChat));
        let (p, fell_back) = parser.parse("bamboo toothbrush factory").await;
        assert!(fell_back);
        assert_eq!(p, ParsedQuery::fallback("bamboo toothbrush factory"));
    }

    #[tokio::test]
    async fn garbage_reply_degrades_to_raw_query() {
        let parser = QueryParser::new(Arc::new(Canned("Sure! Here you go: product=toothbrush")));
        let (p, fell_back) = parser.parse("toothbrush").await;
        assert!(fell_back);
        assert_eq!(p.product, "toothbrush");
    }

    #[tokio::test]
    async fn image_description_is_trimmed() {
        let parser = QueryParser::new(Arc::new(Canned("\"stainless steel water bottle\"\n")));
        let q = parser.describe_image("https://img.test/x.jpg").await.unwrap();
        assert_eq!(q, "stainless steel water bottle");
    }
}
