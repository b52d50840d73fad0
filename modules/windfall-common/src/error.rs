use thiserror::Error;

#[derive(Error, Debug)]
pub enum WindfallError {
    #[error("Validation error: {0}")]
    Validation(String),
}
