use futures::future;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;

use crate::agents::{AgentError, AgentEvent};
use crate::relay::envelope::Envelope;

const UNKNOWN_TOOL: &str = "unknown";

/// Maps one raw agent event to at most one envelope.
pub fn translate(event: Option<AgentEvent>) -> Option<Envelope> {
    match event? {
        AgentEvent::ModelChunk { data } => {
            let text = data.chunk.map(|c| c.content.normalize()).unwrap_or_default();
            if text.is_empty() {
                None
            } else {
                Some(Envelope::Token { token: text })
            }
        }

        AgentEvent::ToolStart { name, data } => {
            let tool = name.filter(|n| !n.is_empty())?;
            let input = data.input.filter(|v| !v.is_null())?;
            Some(Envelope::ToolStart { tool, input })
        }

        AgentEvent::ToolEnd { name, data } => {
            let output = data.output.filter(|v| !v.is_null())?;
            let tool = resolve_tool_name(name, &output);
            Some(Envelope::ToolEnd { tool, output })
        }

        AgentEvent::Unrecognized => None,
    }
}

fn resolve_tool_name(name: Option<String>, output: &Value) -> String {
    name.filter(|n| !n.is_empty())
        .or_else(|| {
            output
                .get("name")
                .and_then(Value::as_str)
                .filter(|n| !n.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNKNOWN_TOOL.to_string())
}

/// Order-preserving projection of the raw agent stream onto envelopes.
/// Upstream errors are passed through untouched.
pub fn translate_stream<S>(events: S) -> impl Stream<Item = Result<Envelope, AgentError>>
where
    S: Stream<Item = Result<Option<AgentEvent>, AgentError>>,
{
    events.filter_map(|item| {
        future::ready(match item {
            Ok(event) => translate(event).map(Ok),
            Err(e) => Some(Err(e)),
        })
    })
}
