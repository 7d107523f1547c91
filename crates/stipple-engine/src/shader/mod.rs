//! Shader programs: compilation, introspection and uniform staging.
//!
//! Sources are Vulkan-flavoured GLSL 450 (explicit `set`/`binding` and
//! separate `texture2D`/`sampler` objects). `naga` parses and validates both
//! stages; the resulting modules feed the wgpu backend directly.

mod binding;
mod error;
mod introspect;
mod program;
mod source;
mod std140;
mod types;
mod uniform_buffer;

pub use binding::{bound_program, ShaderId};
pub use error::ShaderError;
pub use program::{CompiledStages, NameOrIndex, Shader};
pub use source::preprocess_source;
pub use std140::{std140_stride, Std140};
pub use types::{
    AttributeInfo, BlockInfo, SamplerInfo, SamplerKind, ScalarKind, ShaderType, Stage, Stages,
    UniformInfo,
};
pub use uniform_buffer::{UniformBuffer, UNIFORM_ALIGNMENT};
