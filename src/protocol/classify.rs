//! Backend response classification.
//!
//! The backend is an independently evolving service, so classification is a
//! validating parse: a payload becomes a [`ConversationResponse::PendingToolCall`]
//! only when every field of the tool-call shape checks out. Anything else is
//! treated as a plain reply, and text extraction falls back to
//! [`NO_RESPONSE_CONTENT`] instead of failing.

use serde_json::{Map, Value};

use super::types::{
    ConversationResponse, NO_RESPONSE_CONTENT, ToolCall, ToolCallProposal, ToolHit,
    TranscriptMessage,
};

/// Why a payload was not accepted as a tool-call proposal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("response is not a JSON object")]
    NotAnObject,
    #[error("verification_required is not true")]
    VerificationNotRequired,
    #[error("tool_call is missing or not an object")]
    MissingToolCall,
    #[error("tool_call.{0} must be a non-empty string")]
    InvalidToolCallField(&'static str),
    #[error("tool_call.arguments must be an object")]
    ArgumentsNotObject,
    #[error("message is missing or not an array")]
    MissingTranscript,
    #[error("message[{0}] matches neither the basic nor the extended shape")]
    InvalidTranscriptEntry(usize),
}

/// Classify a raw backend payload.
pub fn classify(raw: &Value) -> ConversationResponse {
    match parse_tool_call_response(raw) {
        Ok(proposal) => ConversationResponse::PendingToolCall(proposal),
        Err(reason) => {
            if !matches!(
                reason,
                ShapeError::NotAnObject | ShapeError::VerificationNotRequired
            ) {
                tracing::warn!(
                    %reason,
                    "verification requested but tool call payload is malformed"
                );
            }
            ConversationResponse::Plain {
                text: extract_text(raw),
            }
        }
    }
}

/// Parse the tool-call-pending shape, reporting the first violated rule.
pub fn parse_tool_call_response(raw: &Value) -> Result<ToolCallProposal, ShapeError> {
    let obj = raw.as_object().ok_or(ShapeError::NotAnObject)?;

    if obj.get("verification_required") != Some(&Value::Bool(true)) {
        return Err(ShapeError::VerificationNotRequired);
    }

    let tool_call = parse_tool_call(obj.get("tool_call"))?;

    let entries = obj
        .get("message")
        .and_then(Value::as_array)
        .ok_or(ShapeError::MissingTranscript)?;
    let messages = entries
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            parse_transcript_message(entry).ok_or(ShapeError::InvalidTranscriptEntry(idx))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tool_hit: ToolHit = obj
        .get("tool_hit")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    Ok(ToolCallProposal {
        tool_call,
        tool_hit,
        messages,
    })
}

fn parse_tool_call(value: Option<&Value>) -> Result<ToolCall, ShapeError> {
    let call = value
        .and_then(Value::as_object)
        .ok_or(ShapeError::MissingToolCall)?;

    let id = non_empty_str(call, "id")?;
    let tool_name = non_empty_str(call, "tool_name")?;
    let arguments = call
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .ok_or(ShapeError::ArgumentsNotObject)?;
    let api_name = call
        .get("api_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);

    Ok(ToolCall {
        id,
        tool_name,
        arguments,
        api_name,
    })
}

fn non_empty_str(obj: &Map<String, Value>, key: &'static str) -> Result<String, ShapeError> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or(ShapeError::InvalidToolCallField(key))
}

const EXTENDED_KEYS: [&str; 6] = [
    "content",
    "role",
    "refusal",
    "audio",
    "function_call",
    "tool_calls",
];

fn parse_transcript_message(value: &Value) -> Option<TranscriptMessage> {
    let obj = value.as_object()?;
    let role = obj.get("role")?.as_str()?.to_owned();

    if let Some(Value::String(content)) = obj.get("content") {
        let extra = without_keys(obj, &["content", "role"]);
        return Some(TranscriptMessage::Basic {
            content: content.clone(),
            role,
            extra,
        });
    }

    let content = match obj.get("content")? {
        Value::Null => None,
        _ => return None,
    };
    let refusal = obj.get("refusal")?.clone();
    let audio = obj.get("audio")?.clone();
    let function_call = obj.get("function_call")?.clone();
    let tool_calls = match obj.get("tool_calls") {
        None => None,
        Some(Value::Array(calls)) => Some(calls.clone()),
        Some(_) => return None,
    };

    Some(TranscriptMessage::Extended {
        content,
        role,
        refusal,
        audio,
        function_call,
        tool_calls,
        extra: without_keys(obj, &EXTENDED_KEYS),
    })
}

fn without_keys(obj: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !keys.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Pull `choices[0].message.content` out of a chat completion payload.
pub fn extract_text(raw: &Value) -> String {
    raw.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map_or_else(|| NO_RESPONSE_CONTENT.to_owned(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_call_payload() -> Value {
        json!({
            "verification_required": true,
            "tool_call": {
                "id": "call_abc",
                "tool_name": "book_flight",
                "arguments": {"destination": {"city": "Paris"}}
            },
            "tool_hit": {"tool": "flights", "score": 0.92},
            "message": [
                {"content": "book a flight", "role": "user"},
                {
                    "content": null,
                    "role": "assistant",
                    "refusal": null,
                    "audio": null,
                    "function_call": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "book_flight", "arguments": "{}"}
                    }]
                }
            ]
        })
    }

    #[test]
    fn well_formed_payload_is_pending_tool_call() {
        let raw = tool_call_payload();
        match classify(&raw) {
            ConversationResponse::PendingToolCall(proposal) => {
                assert_eq!(proposal.tool_call.id, "call_abc");
                assert_eq!(proposal.tool_call.tool_name, "book_flight");
                assert_eq!(
                    Value::Object(proposal.tool_call.arguments.clone()),
                    raw["tool_call"]["arguments"]
                );
                assert_eq!(proposal.messages.len(), 2);
                assert_eq!(proposal.tool_hit.get("tool"), Some(&json!("flights")));
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn missing_or_false_flag_is_plain() {
        let mut raw = tool_call_payload();
        raw["verification_required"] = json!(false);
        assert!(matches!(classify(&raw), ConversationResponse::Plain { .. }));

        if let Some(obj) = raw.as_object_mut() {
            obj.remove("verification_required");
        }
        assert!(matches!(classify(&raw), ConversationResponse::Plain { .. }));

        raw["verification_required"] = json!("true");
        assert_eq!(
            parse_tool_call_response(&raw),
            Err(ShapeError::VerificationNotRequired)
        );
    }

    #[test]
    fn empty_identifier_or_name_is_rejected() {
        let mut raw = tool_call_payload();
        raw["tool_call"]["id"] = json!("");
        assert_eq!(
            parse_tool_call_response(&raw),
            Err(ShapeError::InvalidToolCallField("id"))
        );

        let mut raw = tool_call_payload();
        raw["tool_call"]["tool_name"] = json!(42);
        assert_eq!(
            parse_tool_call_response(&raw),
            Err(ShapeError::InvalidToolCallField("tool_name"))
        );
    }

    #[test]
    fn array_or_scalar_arguments_are_rejected() {
        for bad in [json!([1, 2]), json!("x"), json!(null)] {
            let mut raw = tool_call_payload();
            raw["tool_call"]["arguments"] = bad;
            assert_eq!(
                parse_tool_call_response(&raw),
                Err(ShapeError::ArgumentsNotObject)
            );
        }
    }

    #[test]
    fn one_bad_transcript_entry_rejects_the_whole_payload() {
        let mut raw = tool_call_payload();
        raw["message"] = json!([
            {"content": "hi", "role": "user"},
            {"content": null, "role": "assistant", "refusal": null}
        ]);
        assert_eq!(
            parse_tool_call_response(&raw),
            Err(ShapeError::InvalidTranscriptEntry(1))
        );
        assert!(matches!(classify(&raw), ConversationResponse::Plain { .. }));
    }

    #[test]
    fn extended_message_without_tool_calls_is_accepted() {
        let mut raw = tool_call_payload();
        raw["message"] = json!([{
            "content": null,
            "role": "assistant",
            "refusal": null,
            "audio": null,
            "function_call": null
        }]);
        let proposal = parse_tool_call_response(&raw).expect("extended shape");
        assert!(matches!(
            proposal.messages[0],
            TranscriptMessage::Extended { tool_calls: None, .. }
        ));
    }

    #[test]
    fn non_array_tool_calls_is_rejected() {
        let mut raw = tool_call_payload();
        raw["message"][1]["tool_calls"] = json!("oops");
        assert_eq!(
            parse_tool_call_response(&raw),
            Err(ShapeError::InvalidTranscriptEntry(1))
        );
    }

    #[test]
    fn transcript_round_trips_verbatim() {
        let raw = tool_call_payload();
        let proposal = parse_tool_call_response(&raw).expect("valid payload");
        let echoed = serde_json::to_value(&proposal.messages).expect("serialize");
        assert_eq!(echoed, raw["message"]);
    }

    #[test]
    fn missing_tool_hit_defaults_to_empty_object() {
        let mut raw = tool_call_payload();
        if let Some(obj) = raw.as_object_mut() {
            obj.remove("tool_hit");
        }
        let proposal = parse_tool_call_response(&raw).expect("valid payload");
        assert!(proposal.tool_hit.is_empty());
    }

    #[test]
    fn plain_text_is_extracted_with_fallback() {
        let raw = json!({"choices": [{"message": {"content": "Done."}}]});
        assert_eq!(
            classify(&raw),
            ConversationResponse::Plain {
                text: "Done.".into()
            }
        );

        for odd in [json!({}), json!([]), json!(null), json!({"choices": []})] {
            assert_eq!(
                classify(&odd),
                ConversationResponse::Plain {
                    text: NO_RESPONSE_CONTENT.into()
                }
            );
        }
    }
}
