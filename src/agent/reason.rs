//! Reasoning stage: chat completion with the `control_led` tool.
//!
//! Calls any OpenAI-compatible `/v1/chat/completions` endpoint (Ollama,
//! llama.cpp server, vLLM, OpenAI, Gemini's OpenAI layer).  When the model
//! answers with tool calls they are executed through the [`ActuatorClient`]
//! and their results are sent back, up to `max_tool_rounds` times.  The
//! first answer without tool calls ends the stage.
//!
//! The conversation is remembered across turns.  A failed turn leaves the
//! remembered conversation untouched.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::actuator::ActuatorClient;
use crate::config::AgentConfig;

use super::{Message, PipelineError, Role, Stage, TurnContext};

pub const CONTROL_LED: &str = "control_led";

// ---------------------------------------------------------------------------
// ToolCall
// ---------------------------------------------------------------------------

/// One function call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Decoded arguments object.
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct LedArgs {
    color: String,
    status: String,
}

/// JSON schema of the tools offered to the model.
pub fn tool_schema() -> Value {
    json!([{
        "type": "function",
        "function": {
            "name": CONTROL_LED,
            "description": "Controls the state (on/off) and color of a physical LED.",
            "parameters": {
                "type": "object",
                "properties": {
                    "color":  { "type": "string", "enum": ["red", "blue"] },
                    "status": { "type": "string", "enum": ["high", "low"] }
                },
                "required": ["color", "status"]
            }
        }
    }])
}

/// Read `tool_calls` from an assistant message.
///
/// `arguments` may be a JSON-encoded string (OpenAI) or an object (Ollama).
pub fn parse_tool_calls(message: &Value) -> Result<Vec<ToolCall>, PipelineError> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    calls
        .iter()
        .enumerate()
        .map(|(i, call)| {
            let function = &call["function"];
            let name = function["name"]
                .as_str()
                .ok_or_else(|| PipelineError::Reasoning("tool call without a name".into()))?
                .to_string();
            let arguments = match &function["arguments"] {
                Value::String(raw) if raw.trim().is_empty() => json!({}),
                Value::String(raw) => serde_json::from_str(raw).map_err(|e| {
                    PipelineError::Reasoning(format!("bad arguments for {name}: {e}"))
                })?,
                Value::Null => json!({}),
                other => other.clone(),
            };
            let id = call["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{i}"));
            Ok(ToolCall {
                id,
                name,
                arguments,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// ReasonStage
// ---------------------------------------------------------------------------

pub struct ReasonStage {
    client: reqwest::blocking::Client,
    config: AgentConfig,
    actuator: Arc<ActuatorClient>,
    /// Prior turns in wire format, without the system prompt.
    history: Mutex<Vec<Value>>,
}

impl ReasonStage {
    pub fn from_config(config: &AgentConfig, actuator: Arc<ActuatorClient>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            config: config.clone(),
            actuator,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Number of remembered wire messages.
    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn complete(&self, conversation: &[Value]) -> Result<Value, PipelineError> {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(json!({ "role": "system", "content": self.config.system_prompt }));
        messages.extend_from_slice(conversation);

        let body = json!({
            "model":       self.config.model,
            "messages":    messages,
            "tools":       tool_schema(),
            "stream":      false,
            "temperature": self.config.temperature,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let response = req.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(PipelineError::Reasoning(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text.trim()
            )));
        }

        let json: Value =
            serde_json::from_str(&text).map_err(|e| PipelineError::Reasoning(e.to_string()))?;
        let message = json["choices"][0]["message"].clone();
        if message.is_null() {
            return Err(PipelineError::Reasoning("response has no choices".into()));
        }
        Ok(message)
    }

    /// Run one tool call and return its result text for the model.
    ///
    /// Malformed calls are answered with error text so the model can retry.
    /// A failed actuator request ends the turn.
    pub fn execute_tool(&self, call: &ToolCall) -> Result<String, PipelineError> {
        match call.name.as_str() {
            CONTROL_LED => match serde_json::from_value::<LedArgs>(call.arguments.clone()) {
                Ok(args) => self
                    .actuator
                    .control_led(&args.color, &args.status)
                    .map_err(PipelineError::Actuator),
                Err(e) => Ok(format!("ERROR: invalid arguments for {CONTROL_LED}: {e}")),
            },
            other => Ok(format!("ERROR: unknown tool {other:?}")),
        }
    }
}

impl Stage for ReasonStage {
    fn name(&self) -> &'static str {
        "reason"
    }

    fn apply(&self, mut ctx: TurnContext) -> Result<TurnContext, PipelineError> {
        let mut conversation = self
            .history
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        conversation.extend(
            ctx.messages
                .iter()
                .filter(|m| m.role == Role::User)
                .map(|m| json!({ "role": "user", "content": m.content })),
        );

        for round in 0..=self.config.max_tool_rounds {
            let reply = self.complete(&conversation)?;
            let calls = parse_tool_calls(&reply)?;
            let text = reply["content"].as_str().unwrap_or("").trim().to_string();

            if calls.is_empty() {
                log::info!("reason: assistant said {text:?}");
                conversation.push(json!({ "role": "assistant", "content": text }));
                ctx.messages.push(Message::assistant(text));
                *self.history.lock().unwrap_or_else(|p| p.into_inner()) = conversation;
                return Ok(ctx);
            }

            if round == self.config.max_tool_rounds {
                break;
            }

            conversation.push(reply.clone());
            if !text.is_empty() {
                ctx.messages.push(Message::assistant(text));
            }
            for call in &calls {
                log::info!("reason: tool call {}({})", call.name, call.arguments);
                let result = self.execute_tool(call)?;
                conversation.push(json!({
                    "role": "tool",
                    "tool_call_id": call.id,
                    "name": call.name,
                    "content": result,
                }));
                ctx.messages.push(Message::tool(result));
            }
        }

        Err(PipelineError::ToolRounds(self.config.max_tool_rounds))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
