use serde::{Deserialize, Serialize};

/// Message in a Langbase conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Pipe instructions.
    System,
    /// User input.
    User,
    /// Model output.
    Assistant,
}

/// Request to run a Langbase pipe
#[derive(Debug, Clone, Serialize)]
pub struct PipeRequest {
    /// Pipe name (required by Langbase API)
    pub name: String,
    /// Conversation sent to the pipe.
    pub messages: Vec<Message>,
    /// Ask for a server-sent event stream instead of a single JSON body
    #[serde(default)]
    pub stream: bool,
}

/// Response from a Langbase pipe
#[derive(Debug, Clone, Deserialize)]
pub struct PipeResponse {
    /// Whether the run succeeded.
    pub success: bool,
    /// Generated text.
    pub completion: String,
    /// Langbase thread identifier.
    #[serde(rename = "threadId")]
    pub thread_id: Option<String>,
    /// Underlying model response.
    pub raw: Option<RawResponse>,
}

/// Raw model response details
#[derive(Debug, Clone, Deserialize)]
pub struct RawResponse {
    /// Model that produced the response.
    pub model: Option<String>,
    /// Token accounting.
    pub usage: Option<Usage>,
}

/// Token usage information
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Input tokens.
    pub prompt_tokens: Option<u32>,
    /// Output tokens.
    pub completion_tokens: Option<u32>,
    /// Input plus output tokens.
    pub total_tokens: Option<u32>,
}

/// One `data:` payload of a streamed pipe run (OpenAI chunk format)
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChunk {
    /// Choices in this chunk; the first one is used.
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// A choice inside a streamed chunk
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    /// Incremental content.
    #[serde(default)]
    pub delta: StreamDelta,
}

/// Incremental content of a streamed choice
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    /// Text added by this chunk.
    pub content: Option<String>,
}

impl StreamChunk {
    /// Text carried by the first choice, if any.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.delta.content.as_deref())
            .filter(|s| !s.is_empty())
    }
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

impl PipeRequest {
    /// Create a new pipe request with name and messages
    pub fn new(name: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            name: name.into(),
            messages,
            stream: false,
        }
    }

    /// Request a streamed response
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Request to create a new Langbase pipe
#[derive(Debug, Clone, Serialize)]
pub struct CreatePipeRequest {
    /// Pipe name.
    pub name: String,
    /// Pipe description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Model identifier, e.g. `anthropic:claude-sonnet-4-20250514`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Update the pipe if it already exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsert: Option<bool>,
    /// Stream output by default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// JSON output mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
    /// Keep completions on the Langbase side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<bool>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Completion token limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Prompt messages stored with the pipe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// Response from creating a pipe
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePipeResponse {
    /// Pipe name.
    pub name: String,
    /// Pipe description.
    pub description: Option<String>,
    /// Visibility, e.g. `private`.
    pub status: String,
    /// Pipe URL.
    pub url: String,
    /// Pipe type, e.g. `chat`.
    #[serde(rename = "type")]
    pub pipe_type: String,
}

impl CreatePipeRequest {
    /// Create a new pipe request with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            model: None,
            upsert: None,
            stream: None,
            json: None,
            store: None,
            temperature: None,
            max_tokens: None,
            messages: None,
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set model (e.g., "anthropic:claude-sonnet-4-20250514")
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Enable upsert (update if exists)
    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = Some(upsert);
        self
    }

    /// Enable streamed output
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    /// Enable JSON output mode
    pub fn with_json_output(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// Do not keep completions on the Langbase side
    pub fn with_store(mut self, store: bool) -> Self {
        self.store = Some(store);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set system/user messages
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }
}
