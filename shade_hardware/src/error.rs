use shade_traits::{AttributeId, CoverCommand};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("bus timeout")]
    Timeout,
    #[error("command {0} rejected by device")]
    CommandRejected(CoverCommand),
    #[error("write of attribute {0} rejected by device")]
    WriteRejected(AttributeId),
    #[error("transport: {0}")]
    Transport(String),
}
