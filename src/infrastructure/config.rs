use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub vector_store: VectorStoreConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_results: usize,
    pub max_history: usize,
    pub course_match_threshold: f32,
    pub docs_dir: PathBuf,
    pub reindex_on_startup: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Local,
    Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: VectorBackend,
    pub path: PathBuf,
    pub qdrant_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub frontend_dir: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, falling back to
    /// defaults for everything but the API keys.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let defaults = Self::default();

        let embedding_base_url = env.string("EMBEDDING_BASE_URL");
        let embedding_api_key = match (env.string("OPENAI_API_KEY"), &embedding_base_url) {
            (Some(key), _) => key,
            // Self-hosted OpenAI-compatible servers usually ignore the key.
            (None, Some(_)) => "local".to_string(),
            (None, None) => return Err(ConfigError::Missing("OPENAI_API_KEY")),
        };

        let config = Self {
            llm: LlmConfig {
                api_key: env
                    .string("ANTHROPIC_API_KEY")
                    .ok_or(ConfigError::Missing("ANTHROPIC_API_KEY"))?,
                model: env.string("ANTHROPIC_MODEL").unwrap_or(defaults.llm.model),
                timeout_seconds: env
                    .parse("LLM_TIMEOUT_SECONDS")?
                    .unwrap_or(defaults.llm.timeout_seconds),
                base_url: env.string("ANTHROPIC_BASE_URL"),
            },
            embedding: EmbeddingConfig {
                api_key: embedding_api_key,
                model: env
                    .string("EMBEDDING_MODEL")
                    .unwrap_or(defaults.embedding.model),
                dimension: env
                    .parse("EMBEDDING_DIMENSION")?
                    .unwrap_or(defaults.embedding.dimension),
                base_url: embedding_base_url,
            },
            rag: RagConfig {
                chunk_size: env.parse("CHUNK_SIZE")?.unwrap_or(defaults.rag.chunk_size),
                chunk_overlap: env
                    .parse("CHUNK_OVERLAP")?
                    .unwrap_or(defaults.rag.chunk_overlap),
                max_results: env
                    .parse("MAX_RESULTS")?
                    .unwrap_or(defaults.rag.max_results),
                max_history: env
                    .parse("MAX_HISTORY")?
                    .unwrap_or(defaults.rag.max_history),
                course_match_threshold: env
                    .parse("COURSE_MATCH_THRESHOLD")?
                    .unwrap_or(defaults.rag.course_match_threshold),
                docs_dir: env
                    .string("DOCS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.rag.docs_dir),
                reindex_on_startup: env
                    .parse("REINDEX_ON_STARTUP")?
                    .unwrap_or(defaults.rag.reindex_on_startup),
            },
            vector_store: VectorStoreConfig {
                backend: match env.string("VECTOR_STORE").as_deref() {
                    None | Some("local") => VectorBackend::Local,
                    Some("qdrant") => VectorBackend::Qdrant,
                    Some(other) => {
                        return Err(ConfigError::Invalid {
                            key: "VECTOR_STORE",
                            message: format!("expected 'local' or 'qdrant', got '{other}'"),
                        })
                    }
                },
                path: env
                    .string("VECTOR_STORE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.vector_store.path),
                qdrant_url: env
                    .string("QDRANT_URL")
                    .unwrap_or(defaults.vector_store.qdrant_url),
            },
            server: ServerConfig {
                host: env.string("SERVER_HOST").unwrap_or(defaults.server.host),
                port: env.parse("SERVER_PORT")?.unwrap_or(defaults.server.port),
                cors_allowed_origins: env
                    .string("CORS_ALLOWED_ORIGINS")
                    .map(|s| {
                        s.split(',')
                            .map(|o| o.trim().to_string())
                            .filter(|o| !o.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.server.cors_allowed_origins),
                frontend_dir: env
                    .string("FRONTEND_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.server.frontend_dir),
                log_format: match env.string("LOG_FORMAT").as_deref() {
                    Some("json") => LogFormat::Json,
                    _ => LogFormat::Pretty,
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: "CHUNK_SIZE",
                message: "must be greater than zero".into(),
            });
        }
        if self.rag.chunk_overlap >= self.rag.chunk_size {
            return Err(ConfigError::Invalid {
                key: "CHUNK_OVERLAP",
                message: format!("must be smaller than CHUNK_SIZE ({})", self.rag.chunk_size),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: String::new(),
                model: "claude-sonnet-4-20250514".to_string(),
                timeout_seconds: 60,
                base_url: None,
            },
            embedding: EmbeddingConfig {
                api_key: String::new(),
                model: "text-embedding-3-small".to_string(),
                dimension: 1536,
                base_url: None,
            },
            rag: RagConfig {
                chunk_size: 800,
                chunk_overlap: 100,
                max_results: 5,
                max_history: 5,
                course_match_threshold: 0.35,
                docs_dir: PathBuf::from("../docs"),
                reindex_on_startup: false,
            },
            vector_store: VectorStoreConfig {
                backend: VectorBackend::Local,
                path: PathBuf::from("./vector_db"),
                qdrant_url: "http://localhost:6334".to_string(),
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_allowed_origins: vec!["*".to_string()],
                frontend_dir: PathBuf::from("../frontend"),
                log_format: LogFormat::Pretty,
            },
        }
    }
}

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.string(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|e| ConfigError::Invalid {
                    key,
                    message: format!("'{raw}': {e}"),
                })
            })
            .transpose()
    }
}
