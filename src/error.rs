use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cant read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cant parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("API key not found in the config file")]
    MissingApiKey,

    #[error("temperature must be between 0.0 and 2.0, got {0}")]
    InvalidTemperature(f32),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("error in getting input: input stream closed")]
    Closed,

    #[error("error in getting input: {0}")]
    Io(std::io::Error),
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("error marshalling JSON payload")]
    Encoding(#[source] serde_json::Error),

    #[error("error making HTTP request")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code: {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("error unmarshaling JSON")]
    Decoding(#[source] serde_json::Error),

    #[error("response contained no choices")]
    NoChoices,
}

impl CompletionError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("error writing output")]
    Output(#[source] std::io::Error),
}
