/// Source/destination blend factor.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstColor,
    OneMinusDstColor,
    DstAlpha,
    OneMinusDstAlpha,
    SrcAlphaSaturated,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

/// Full blend configuration; RGB and alpha are set separately.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Blend {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub equation_rgb: BlendEquation,
    pub equation_alpha: BlendEquation,
}

impl Default for Blend {
    fn default() -> Self {
        BlendMode::Alpha.blend()
    }
}

impl Blend {
    pub const fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
            equation_rgb: BlendEquation::Add,
            equation_alpha: BlendEquation::Add,
        }
    }
}

/// Common blend presets.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Straight alpha over.
    #[default]
    Alpha,
    /// Premultiplied alpha over.
    Premultiplied,
    Additive,
    Multiply,
    /// Source replaces destination.
    Solid,
}

impl BlendMode {
    pub const fn blend(self) -> Blend {
        use BlendFactor::*;
        match self {
            BlendMode::Alpha => Blend {
                src_rgb: SrcAlpha,
                dst_rgb: OneMinusSrcAlpha,
                src_alpha: One,
                dst_alpha: OneMinusSrcAlpha,
                equation_rgb: BlendEquation::Add,
                equation_alpha: BlendEquation::Add,
            },
            BlendMode::Premultiplied => Blend::new(One, OneMinusSrcAlpha),
            BlendMode::Additive => Blend {
                src_rgb: SrcAlpha,
                dst_rgb: One,
                src_alpha: One,
                dst_alpha: One,
                equation_rgb: BlendEquation::Add,
                equation_alpha: BlendEquation::Add,
            },
            BlendMode::Multiply => Blend {
                src_rgb: DstColor,
                dst_rgb: OneMinusSrcAlpha,
                src_alpha: DstAlpha,
                dst_alpha: OneMinusSrcAlpha,
                equation_rgb: BlendEquation::Add,
                equation_alpha: BlendEquation::Add,
            },
            BlendMode::Solid => Blend::new(One, Zero),
        }
    }
}
