//! Introspection records produced by [`Shader::compile`](super::Shader::compile).

use std::fmt;

/// Pipeline stage of a GLSL source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl Stage {
    pub(crate) fn to_naga(self) -> naga::ShaderStage {
        match self {
            Stage::Vertex => naga::ShaderStage::Vertex,
            Stage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Stages a resource is declared in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Stages {
    pub vertex: bool,
    pub fragment: bool,
}

impl Stages {
    pub(crate) fn with(mut self, stage: Stage) -> Self {
        match stage {
            Stage::Vertex => self.vertex = true,
            Stage::Fragment => self.fragment = true,
        }
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Float,
    Sint,
    Uint,
    Bool,
}

/// GLSL-level type of an attribute or uniform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderType {
    Scalar(ScalarKind),
    Vector { kind: ScalarKind, size: u8 },
    Matrix { columns: u8, rows: u8 },
    Struct,
    Opaque,
}

impl ShaderType {
    pub(crate) fn from_naga(module: &naga::Module, inner: &naga::TypeInner) -> Self {
        match *inner {
            naga::TypeInner::Scalar(scalar) => ShaderType::Scalar(kind_of(scalar)),
            naga::TypeInner::Vector { size, scalar } => ShaderType::Vector {
                kind: kind_of(scalar),
                size: size as u8,
            },
            naga::TypeInner::Matrix { columns, rows, .. } => ShaderType::Matrix {
                columns: columns as u8,
                rows: rows as u8,
            },
            naga::TypeInner::Array { base, .. } => {
                ShaderType::from_naga(module, &module.types[base].inner)
            }
            naga::TypeInner::Struct { .. } => ShaderType::Struct,
            _ => ShaderType::Opaque,
        }
    }
}

fn kind_of(scalar: naga::Scalar) -> ScalarKind {
    match scalar.kind {
        naga::ScalarKind::Sint => ScalarKind::Sint,
        naga::ScalarKind::Uint => ScalarKind::Uint,
        naga::ScalarKind::Bool => ScalarKind::Bool,
        _ => ScalarKind::Float,
    }
}

/// Vertex input.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    pub ty: ShaderType,
    pub size: u32,
}

/// Member of a uniform block.
///
/// `location` is the uniform's index in [`Shader::uniforms`](super::Shader::uniforms);
/// `count` is the array length (1 for non-arrays).
#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    pub name: String,
    pub location: usize,
    pub ty: ShaderType,
    pub count: u32,
    pub size: u32,
    pub offset: u32,
    pub block: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SamplerKind {
    Texture2D,
    Texture,
    Filter,
    Comparison,
}

/// Texture or sampler global.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerInfo {
    pub name: String,
    pub kind: SamplerKind,
    pub group: u32,
    pub binding: u32,
    pub stages: Stages,
}

impl SamplerInfo {
    #[inline]
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, SamplerKind::Texture2D | SamplerKind::Texture)
    }
}

/// Uniform block; `members` lists uniform locations in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockInfo {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: Vec<usize>,
    pub stages: Stages,
}
