//! GLSL front end: parse, validate, link and reflect a vertex/fragment pair.

use std::collections::HashMap;

use super::error::ShaderError;
use super::types::{
    AttributeInfo, BlockInfo, SamplerInfo, SamplerKind, ShaderType, Stage, Stages, UniformInfo,
};

/// Parses one stage as Vulkan-flavoured GLSL 450.
pub(crate) fn parse_stage(stage: Stage, source: &str) -> Result<naga::Module, ShaderError> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    frontend
        .parse(&options, source)
        .map_err(|errors| ShaderError::Parse {
            stage,
            message: errors.emit_to_string(source),
        })
}

pub(crate) fn validate_stage(
    stage: Stage,
    source: &str,
    module: &naga::Module,
) -> Result<(), ShaderError> {
    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(module)
        .map(|_| ())
        .map_err(|err| ShaderError::Validation {
            stage,
            message: err.emit_to_string(source),
        })
}

fn entry_point(module: &naga::Module, stage: Stage) -> Option<&naga::EntryPoint> {
    let want = stage.to_naga();
    module.entry_points.iter().find(|ep| ep.stage == want)
}

fn type_size(module: &naga::Module, ty: naga::Handle<naga::Type>) -> u32 {
    module.types[ty].inner.size(module.to_ctx())
}

/// Location-bound values flowing out of the vertex entry point.
fn vertex_outputs(module: &naga::Module) -> HashMap<u32, ShaderType> {
    let mut out = HashMap::new();
    let Some(ep) = entry_point(module, Stage::Vertex) else { return out };
    let Some(result) = ep.function.result.as_ref() else { return out };

    if let Some(naga::Binding::Location { location, .. }) = result.binding {
        out.insert(location, ShaderType::from_naga(module, &module.types[result.ty].inner));
        return out;
    }
    if let naga::TypeInner::Struct { ref members, .. } = module.types[result.ty].inner {
        for member in members {
            if let Some(naga::Binding::Location { location, .. }) = member.binding {
                out.insert(location, ShaderType::from_naga(module, &module.types[member.ty].inner));
            }
        }
    }
    out
}

/// Names of the globals the entry point copies its arguments into.
///
/// The GLSL front end passes stage inputs as arguments and stores each one
/// into the global the source declared.
fn argument_globals(module: &naga::Module, ep: &naga::EntryPoint) -> HashMap<u32, String> {
    let mut names = HashMap::new();
    let function = &ep.function;
    for statement in function.body.iter() {
        let naga::Statement::Store { pointer, value } = *statement else { continue };
        let (naga::Expression::GlobalVariable(global), naga::Expression::FunctionArgument(index)) =
            (&function.expressions[pointer], &function.expressions[value])
        else {
            continue;
        };
        if let Some(name) = module.global_variables[*global].name.clone() {
            names.insert(*index, name);
        }
    }
    names
}

/// Location-bound arguments of an entry point, sorted by location.
fn inputs(module: &naga::Module, stage: Stage) -> Vec<AttributeInfo> {
    let Some(ep) = entry_point(module, stage) else { return Vec::new() };
    let globals = argument_globals(module, ep);
    let mut attrs: Vec<AttributeInfo> = ep
        .function
        .arguments
        .iter()
        .enumerate()
        .filter_map(|(index, arg)| {
            let Some(naga::Binding::Location { location, .. }) = arg.binding else { return None };
            let name = globals
                .get(&(index as u32))
                .cloned()
                .or_else(|| arg.name.clone())
                .unwrap_or_else(|| format!("location{location}"));
            Some(AttributeInfo {
                name,
                location,
                ty: ShaderType::from_naga(module, &module.types[arg.ty].inner),
                size: type_size(module, arg.ty),
            })
        })
        .collect();
    attrs.sort_by_key(|a| a.location);
    attrs
}

struct RawBlock<'m> {
    name: String,
    group: u32,
    binding: u32,
    size: u32,
    members: &'m [naga::StructMember],
}

fn blocks(module: &naga::Module) -> Vec<RawBlock<'_>> {
    let mut out = Vec::new();
    for (_, global) in module.global_variables.iter() {
        if global.space != naga::AddressSpace::Uniform {
            continue;
        }
        let Some(ref rb) = global.binding else { continue };
        let ty = &module.types[global.ty];
        let naga::TypeInner::Struct { ref members, .. } = ty.inner else { continue };
        let name = ty
            .name
            .clone()
            .or_else(|| global.name.clone())
            .unwrap_or_else(|| format!("block{}_{}", rb.group, rb.binding));
        out.push(RawBlock {
            name,
            group: rb.group,
            binding: rb.binding,
            size: type_size(module, global.ty),
            members,
        });
    }
    out
}

/// Checks that the fragment stage only reads what the vertex stage writes,
/// and that shared uniform blocks agree.
pub(crate) fn link(vertex: &naga::Module, fragment: &naga::Module) -> Result<(), ShaderError> {
    let outputs = vertex_outputs(vertex);
    for input in inputs(fragment, Stage::Fragment) {
        match outputs.get(&input.location) {
            None => {
                return Err(ShaderError::Link(format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                )));
            }
            Some(ty) if *ty != input.ty => {
                return Err(ShaderError::Link(format!(
                    "fragment input `{}` at location {} is {:?} but the vertex stage writes {:?}",
                    input.name, input.location, input.ty, ty
                )));
            }
            Some(_) => {}
        }
    }

    let vertex_blocks = blocks(vertex);
    for fb in blocks(fragment) {
        let Some(vb) = vertex_blocks
            .iter()
            .find(|vb| vb.group == fb.group && vb.binding == fb.binding)
        else {
            continue;
        };
        if vb.name != fb.name || vb.size != fb.size {
            return Err(ShaderError::Link(format!(
                "uniform block at set {} binding {} is `{}` ({} bytes) in the vertex stage but `{}` ({} bytes) in the fragment stage",
                fb.group, fb.binding, vb.name, vb.size, fb.name, fb.size
            )));
        }
    }
    Ok(())
}

/// Everything [`Shader`](super::Shader) caches after a successful compile.
#[derive(Debug, Default)]
pub(crate) struct Reflection {
    pub attributes: Vec<AttributeInfo>,
    pub uniforms: Vec<UniformInfo>,
    pub samplers: Vec<SamplerInfo>,
    pub blocks: Vec<BlockInfo>,
}

pub(crate) fn reflect(vertex: &naga::Module, fragment: &naga::Module) -> Reflection {
    let mut r = Reflection {
        attributes: inputs(vertex, Stage::Vertex),
        ..Reflection::default()
    };

    for (stage, module) in [(Stage::Vertex, vertex), (Stage::Fragment, fragment)] {
        for raw in blocks(module) {
            if let Some(existing) = r
                .blocks
                .iter_mut()
                .find(|b| b.group == raw.group && b.binding == raw.binding)
            {
                existing.stages = existing.stages.with(stage);
                continue;
            }

            let block = r.blocks.len();
            let mut members = Vec::with_capacity(raw.members.len());
            for member in raw.members {
                let location = r.uniforms.len();
                let inner = &module.types[member.ty].inner;
                let count = match *inner {
                    naga::TypeInner::Array { size: naga::ArraySize::Constant(n), .. } => n.get(),
                    _ => 1,
                };
                r.uniforms.push(UniformInfo {
                    name: member
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("{}[{}]", raw.name, members.len())),
                    location,
                    ty: ShaderType::from_naga(module, inner),
                    count,
                    size: type_size(module, member.ty),
                    offset: member.offset,
                    block,
                });
                members.push(location);
            }
            r.blocks.push(BlockInfo {
                name: raw.name,
                group: raw.group,
                binding: raw.binding,
                size: raw.size,
                members,
                stages: Stages::default().with(stage),
            });
        }

        for (_, global) in module.global_variables.iter() {
            if global.space != naga::AddressSpace::Handle {
                continue;
            }
            let Some(ref rb) = global.binding else { continue };
            let kind = match module.types[global.ty].inner {
                naga::TypeInner::Image { dim: naga::ImageDimension::D2, arrayed: false, .. } => {
                    SamplerKind::Texture2D
                }
                naga::TypeInner::Image { .. } => SamplerKind::Texture,
                naga::TypeInner::Sampler { comparison: true } => SamplerKind::Comparison,
                naga::TypeInner::Sampler { comparison: false } => SamplerKind::Filter,
                _ => continue,
            };
            if let Some(existing) = r
                .samplers
                .iter_mut()
                .find(|s| s.group == rb.group && s.binding == rb.binding)
            {
                existing.stages = existing.stages.with(stage);
                continue;
            }
            r.samplers.push(SamplerInfo {
                name: global
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("texture{}_{}", rb.group, rb.binding)),
                kind,
                group: rb.group,
                binding: rb.binding,
                stages: Stages::default().with(stage),
            });
        }
    }

    r
}
