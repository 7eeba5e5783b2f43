use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::stream::{spawn_sse_reader, FragmentStream, FRAGMENT_BUFFER};
use super::types::{CreatePipeRequest, CreatePipeResponse, Message, PipeRequest, PipeResponse};
use super::ReasoningEngine;
use crate::config::{LangbaseConfig, PipeConfig, RequestConfig};
use crate::error::{LangbaseError, LangbaseResult};
use crate::prompts::{COMPLETION_CHECK_PROMPT, INTERVIEWER_PROMPT, SYNTHESIS_PROMPT};

/// Client for interacting with Langbase Pipes API
#[derive(Clone)]
pub struct LangbaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl LangbaseClient {
    /// Create a new Langbase client
    pub fn new(config: &LangbaseConfig, request_config: RequestConfig) -> LangbaseResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LangbaseError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Call a Langbase pipe and wait for the whole completion.
    ///
    /// Failures are returned as-is; there is no retry.
    pub async fn call_pipe(&self, request: PipeRequest) -> LangbaseResult<PipeResponse> {
        let pipe_name = request.name.clone();
        let start = Instant::now();

        let result = async {
            let response = self.send_run(&request).await?;
            response
                .json::<PipeResponse>()
                .await
                .map_err(|e| LangbaseError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })
        }
        .await;

        let latency = start.elapsed();
        match &result {
            Ok(_) => info!(
                pipe = %pipe_name,
                latency_ms = latency.as_millis(),
                "Langbase pipe call succeeded"
            ),
            Err(e) => error!(
                pipe = %pipe_name,
                error = %e,
                latency_ms = latency.as_millis(),
                "Langbase pipe call failed"
            ),
        }

        result
    }

    /// Run a pipe in streaming mode.
    ///
    /// Returns once the response headers arrive; the body is decoded on a
    /// background task and delivered through the returned stream.
    pub async fn stream_pipe(&self, request: PipeRequest) -> LangbaseResult<FragmentStream> {
        let request = request.streaming();
        let response = self.send_run(&request).await.map_err(|e| {
            error!(pipe = %request.name, error = %e, "Langbase stream request failed");
            e
        })?;

        debug!(pipe = %request.name, "Langbase stream opened");
        Ok(spawn_sse_reader(response, FRAGMENT_BUFFER))
    }

    /// POST a run request and check the status code
    async fn send_run(&self, request: &PipeRequest) -> LangbaseResult<reqwest::Response> {
        let url = format!("{}/v1/pipes/run", self.base_url);

        debug!(
            pipe = %request.name,
            messages = request.messages.len(),
            stream = request.stream,
            "Calling Langbase pipe"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LangbaseError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    LangbaseError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        Ok(response)
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a new pipe
    pub async fn create_pipe(
        &self,
        request: CreatePipeRequest,
    ) -> LangbaseResult<CreatePipeResponse> {
        let url = format!("{}/v1/pipes", self.base_url);

        info!(pipe = %request.name, "Creating Langbase pipe");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(LangbaseError::Http)?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LangbaseError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let pipe_response: CreatePipeResponse =
            response
                .json()
                .await
                .map_err(|e| LangbaseError::InvalidResponse {
                    message: format!("Failed to parse create pipe response: {}", e),
                })?;

        info!(
            pipe = %pipe_response.name,
            url = %pipe_response.url,
            "Pipe created successfully"
        );

        Ok(pipe_response)
    }

    /// Ensure a pipe exists, treating "already exists" as success
    pub async fn ensure_pipe(&self, request: CreatePipeRequest) -> LangbaseResult<()> {
        let pipe_name = request.name.clone();
        match self.create_pipe(request).await {
            Ok(_) => {
                info!(pipe = %pipe_name, "Pipe ready");
                Ok(())
            }
            Err(LangbaseError::Api { status: 409, .. }) => {
                info!(pipe = %pipe_name, "Pipe already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Provision the dialogue, completion and synthesis pipes
    pub async fn ensure_interview_pipes(&self, pipes: &PipeConfig) -> LangbaseResult<()> {
        self.ensure_pipe(
            CreatePipeRequest::new(&pipes.dialogue)
                .with_description("EthicsNavi interview questions")
                .with_model(&pipes.model)
                .with_upsert(true)
                .with_stream(true)
                .with_store(false)
                .with_temperature(0.7)
                .with_max_tokens(2048)
                .with_messages(vec![Message::system(INTERVIEWER_PROMPT)]),
        )
        .await?;

        self.ensure_pipe(
            CreatePipeRequest::new(&pipes.completion)
                .with_description("EthicsNavi topic completion check")
                .with_model(&pipes.model)
                .with_upsert(true)
                .with_json_output(true)
                .with_store(false)
                .with_temperature(0.0)
                .with_max_tokens(1024)
                .with_messages(vec![Message::system(COMPLETION_CHECK_PROMPT)]),
        )
        .await?;

        self.ensure_pipe(
            CreatePipeRequest::new(&pipes.synthesis)
                .with_description("EthicsNavi four-box synthesis")
                .with_model(&pipes.model)
                .with_upsert(true)
                .with_json_output(true)
                .with_store(false)
                .with_temperature(0.0)
                .with_max_tokens(4096)
                .with_messages(vec![Message::system(SYNTHESIS_PROMPT)]),
        )
        .await
    }
}

#[async_trait]
impl ReasoningEngine for LangbaseClient {
    async fn complete(&self, pipe: &str, messages: Vec<Message>) -> LangbaseResult<String> {
        let response = self.call_pipe(PipeRequest::new(pipe, messages)).await?;
        Ok(response.completion)
    }

    async fn stream(&self, pipe: &str, messages: Vec<Message>) -> LangbaseResult<FragmentStream> {
        self.stream_pipe(PipeRequest::new(pipe, messages)).await
    }
}
