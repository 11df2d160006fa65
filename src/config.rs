use crate::llm::{LlmSettings, Provider};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Environment prefix for layered settings, e.g. `SKINAI_SERVER__PORT`.
const ENV_PREFIX: &str = "SKINAI";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// Directory holding the persisted conversation
    #[arg(long, env = "STORAGE_DIR")]
    pub storage_dir: Option<String>,

    /// Persist the conversation between runs
    #[arg(long, env = "STORAGE_ENABLED")]
    pub storage_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub assistant: AssistantConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

/// Where the conversation snapshot lives.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// When false the session is memory-only.
    pub enabled: bool,
    pub dir: String,
    /// Key (file stem) of the snapshot document.
    pub key: String,
}

/// Identity strings shown in the page and used in the system prompt.
#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    pub name: String,
    pub owner_name: String,
    pub clear_chat_text: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        // 1. Defaults
        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("storage.enabled", true)?
            .set_default("storage.dir", ".skinai")?
            .set_default("storage.key", "chat-messages")?
            .set_default("assistant.name", "Hiesvi SkinAI")?
            .set_default("assistant.owner_name", "Hiesvi Sharma")?
            .set_default("assistant.clear_chat_text", "New Chat")?;

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Prefixed environment, e.g. SKINAI_STORAGE__DIR=/var/lib/skinai
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (and their plain env aliases) win
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(dir) = cli.storage_dir {
            builder = builder.set_override("storage.dir", dir)?;
        }
        if let Some(enabled) = cli.storage_enabled {
            builder = builder.set_override("storage.enabled", enabled)?;
        }

        builder.build()?.try_deserialize()
    }
}

pub fn load_llm_settings() -> Result<LlmSettings, String> {
    let base_url = std::env::var("LLM_BASE_URL")
        .map_err(|_| "Missing required env var: LLM_BASE_URL".to_string())?;
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = std::env::var("LLM_MODEL")
        .map_err(|_| "Missing required env var: LLM_MODEL".to_string())?;
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = std::env::var("LLM_API_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());

    let provider = Provider::detect_from_url(&base_url).with_azure_deployment(
        std::env::var("AZURE_DEPLOYMENT_NAME").ok(),
        std::env::var("AZURE_API_VERSION").ok(),
    );
    if let Provider::AzureOpenAI {
        deployment_name, ..
    } = &provider
        && deployment_name.is_empty()
    {
        return Err("AZURE_DEPLOYMENT_NAME is required for Azure OpenAI".to_string());
    }

    Ok(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
    })
}
