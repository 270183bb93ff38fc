use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrrigationError {
    /// A weather record is missing a required field or has the wrong shape.
    #[error("Malformed weather data: {0}")]
    DataFormat(String),

    /// The weather provider could not be reached or timed out.
    #[error("Weather provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// A caller passed an argument outside its accepted range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IrrigationError {
    pub(crate) fn data_format(msg: impl Into<String>) -> Self {
        Self::DataFormat(msg.into())
    }
}

impl From<serde_json::Error> for IrrigationError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IrrigationError>;
