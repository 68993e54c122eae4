use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::session::Message;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);

        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(anyhow!("failed to list models: {}", response.status()));
        }

        let models: ModelsResponse = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Start a streaming completion over `messages`. Returns the stream of
    /// content deltas, in arrival order, ending when the server sends its
    /// `[DONE]` marker or closes the connection.
    pub async fn stream_chat(
        &self,
        model: &str,
        temperature: f64,
        messages: &[Message],
    ) -> Result<BoxStream<'static, Result<String>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model,
            messages,
            temperature,
            stream: true,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chat request failed with status: {}",
                response.status()
            ));
        }

        Ok(deltas_from_sse(response.bytes_stream().boxed()).boxed())
    }
}

struct SseState<B> {
    body: B,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    error: Option<anyhow::Error>,
    done: bool,
}

/// Turn a server-sent-event response body into a stream of content deltas.
/// Each `data:` line carries one JSON chunk; `data: [DONE]` ends the stream.
fn deltas_from_sse<B, C, E>(body: B) -> impl Stream<Item = Result<String>> + Send
where
    B: Stream<Item = std::result::Result<C, E>> + Send + Unpin + 'static,
    C: AsRef<[u8]>,
    E: Into<anyhow::Error>,
{
    let state = SseState {
        body,
        buffer: Vec::new(),
        ready: VecDeque::new(),
        error: None,
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            // Deltas parsed before a failure are still delivered in order.
            if let Some(delta) = st.ready.pop_front() {
                return Some((Ok(delta), st));
            }
            if let Some(err) = st.error.take() {
                return Some((Err(err), st));
            }
            if st.done {
                return None;
            }

            match st.body.next().await {
                Some(Ok(chunk)) => {
                    st.buffer.extend_from_slice(chunk.as_ref());
                    if let Err(err) = drain_lines(&mut st) {
                        st.error = Some(err);
                        st.done = true;
                    }
                }
                Some(Err(err)) => {
                    st.error = Some(err.into());
                    st.done = true;
                }
                None => {
                    st.done = true;
                }
            }
        }
    })
}

/// Parse every complete line currently buffered, queueing extracted deltas.
fn drain_lines<B>(st: &mut SseState<B>) -> Result<()> {
    while let Some(pos) = st.buffer.iter().position(|&b| b == b'\n') {
        let line: Vec<u8> = st.buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let line = line.trim();

        let Some(payload) = line.strip_prefix("data:") else {
            continue;
        };
        let payload = payload.trim();
        if payload == "[DONE]" {
            st.done = true;
            break;
        }

        let chunk: StreamChunk = serde_json::from_str(payload)
            .map_err(|err| anyhow!("malformed stream chunk: {}", err))?;
        if let Some(text) = chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
        {
            if !text.is_empty() {
                st.ready.push_back(text);
            }
        }
    }
    Ok(())
}
