use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("decision payload could not be encoded: {0}")]
    Encode(String),
    #[error("decision payload is malformed: {0}")]
    Decode(String),
    #[error("decision payload is {len} characters but button values are limited to {max}")]
    TooLong { len: usize, max: usize },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("unauthorized: {message}")]
    Unauthorized { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn unauthorized(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::Unauthorized { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "The request payload could not be understood.",
            Self::Unauthorized { .. } => "The request signature could not be verified.",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::Unauthorized { .. } => 401,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Unauthorized { correlation_id, .. } => correlation_id,
        }
    }
}
