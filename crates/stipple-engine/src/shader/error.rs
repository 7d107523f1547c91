use thiserror::Error;

use super::types::Stage;

/// Shader compilation and strict-lookup failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShaderError {
    /// GLSL source did not parse
    #[error("{stage} shader failed to parse:\n{message}")]
    Parse { stage: Stage, message: String },

    /// Parsed module rejected by the validator
    #[error("{stage} shader failed validation:\n{message}")]
    Validation { stage: Stage, message: String },

    /// Stage interfaces do not agree
    #[error("program link failed: {0}")]
    Link(String),

    /// Operation requires a compiled program
    #[error("shader is not compiled")]
    NotCompiled,

    #[error("unknown uniform `{0}`")]
    UnknownUniform(String),

    #[error("unknown uniform block `{0}`")]
    UnknownBlock(String),

    /// A uniform buffer's layout does not match the block it is bound to
    #[error("uniform block `{block}` does not match buffer: {detail}")]
    BlockMismatch { block: String, detail: String },
}
