//! Provider detection and endpoint shape.
//!
//! Every supported provider speaks the Chat Completions protocol; they differ
//! only in where the endpoint lives and how the API key is presented.

/// Supported LLM providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `OpenAI` (api.openai.com)
    OpenAI,
    /// Azure `OpenAI` Service
    AzureOpenAI {
        /// Deployment name (required for Azure)
        deployment_name: String,
        /// API version (e.g., "2024-08-01-preview")
        api_version: String,
    },
    /// `OpenRouter` (openrouter.ai)
    OpenRouter,
    /// Groq (groq.com)
    Groq,
    /// Any other OpenAI-compatible server (vLLM, Ollama, llama.cpp, ...)
    Generic,
}

/// Default Azure REST API version.
pub const AZURE_DEFAULT_API_VERSION: &str = "2024-08-01-preview";

/// How the API key travels with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `api-key: <key>`
    ApiKeyHeader,
}

impl Provider {
    /// Detect provider from base URL.
    ///
    /// Azure detection yields an empty deployment name; callers fill it in
    /// with [`Provider::with_azure_deployment`].
    #[must_use]
    pub fn detect_from_url(base_url: &str) -> Self {
        let host = base_url.to_lowercase();

        if host.contains("azure.com") {
            Self::AzureOpenAI {
                deployment_name: String::new(),
                api_version: AZURE_DEFAULT_API_VERSION.to_string(),
            }
        } else if host.contains("openrouter.ai") {
            Self::OpenRouter
        } else if host.contains("groq.com") {
            Self::Groq
        } else if host.contains("openai.com") {
            Self::OpenAI
        } else {
            Self::Generic
        }
    }

    /// Apply Azure deployment details. Non-Azure providers are returned unchanged.
    #[must_use]
    pub fn with_azure_deployment(self, deployment: Option<String>, version: Option<String>) -> Self {
        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => Self::AzureOpenAI {
                deployment_name: deployment.unwrap_or(deployment_name),
                api_version: version.unwrap_or(api_version),
            },
            other => other,
        }
    }

    /// Header scheme used for the API key.
    #[must_use]
    pub fn auth_scheme(&self) -> AuthScheme {
        match self {
            Self::AzureOpenAI { .. } => AuthScheme::ApiKeyHeader,
            _ => AuthScheme::Bearer,
        }
    }

    /// Build the chat completions URL for this provider.
    ///
    /// `model` is unused for Azure, which routes by deployment name.
    #[must_use]
    pub fn build_chat_url(&self, base_url: &str, _model: &str) -> String {
        let base = base_url.trim_end_matches('/');

        match self {
            Self::AzureOpenAI {
                deployment_name,
                api_version,
            } => format!(
                "{base}/openai/deployments/{deployment_name}/chat/completions?api-version={api_version}"
            ),
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}
