use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unsupported version")]
    UnsupportedVersion,
    #[error("buffer too short")]
    ShortBuffer,
    #[error("invalid valid_till")]
    InvalidValidTill,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid transaction framing")]
    InvalidTxFraming,
    #[error("invalid block framing")]
    InvalidBlockFraming,
    #[error("invalid stream")]
    InvalidStream,
    #[error("not the previous block")]
    NotPrevious,
}
