//! Two-half stencil compositing.
//!
//! The 8-bit stencil buffer holds two independent regions: the lower half
//! (bits `0x0F`) and the upper half (bits `0xF0`). A half is either fully
//! set or clear. Every [`StencilEffect`] combines per-half behaviours into a
//! [`StencilRule`], which resolves to a backend-neutral [`StencilState`].

/// Bits owned by the lower region.
pub const LOWER_HALF: u8 = 0x0F;
/// Bits owned by the upper region.
pub const UPPER_HALF: u8 = 0xF0;
pub const BOTH_HALVES: u8 = 0xFF;

/// Region a stencil test refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilRead {
    None,
    Lower,
    Upper,
    Union,
    Intersect,
    LowerMinusUpper,
    UpperMinusLower,
}

/// Whether fragments inside or outside the read region pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilTest {
    Inside,
    Outside,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilWrite {
    None,
    Lower,
    Upper,
    Both,
}

impl StencilWrite {
    #[inline]
    pub fn mask(self) -> u8 {
        match self {
            StencilWrite::None => 0,
            StencilWrite::Lower => LOWER_HALF,
            StencilWrite::Upper => UPPER_HALF,
            StencilWrite::Both => BOTH_HALVES,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilOp {
    None,
    Set,
    Clear,
}

// ── behaviours ────────────────────────────────────────────────────────────

/// What one half does under an effect.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Behaviour {
    /// Draw inside the region.
    Clip,
    /// Draw outside the region.
    Mask,
    /// Draw inside the region and erase it there.
    Fill,
    /// Erase the region under the shape without drawing.
    Wipe,
    /// Add the shape to the region without drawing.
    Stamp,
    /// Draw and add the shape to the region.
    Carve,
    /// Draw outside the region and add the shape to it.
    Clamp,
}

impl Behaviour {
    fn test(self) -> Option<StencilTest> {
        match self {
            Behaviour::Clip | Behaviour::Fill => Some(StencilTest::Inside),
            Behaviour::Mask | Behaviour::Clamp => Some(StencilTest::Outside),
            Behaviour::Wipe | Behaviour::Stamp | Behaviour::Carve => None,
        }
    }

    fn op(self) -> StencilOp {
        match self {
            Behaviour::Fill | Behaviour::Wipe => StencilOp::Clear,
            Behaviour::Stamp | Behaviour::Carve | Behaviour::Clamp => StencilOp::Set,
            Behaviour::Clip | Behaviour::Mask => StencilOp::None,
        }
    }

    fn draws(self) -> bool {
        !matches!(self, Behaviour::Wipe | Behaviour::Stamp)
    }
}

/// How a unified effect combines the two halves when testing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Combine {
    Join,
    Meet,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Layout {
    Native,
    Off,
    Unified(Behaviour, Combine),
    Halves {
        lower: Option<Behaviour>,
        upper: Option<Behaviour>,
    },
}

// ── effects ───────────────────────────────────────────────────────────────

/// Named stencil effects.
///
/// Naming: a bare name applies the behaviour to both halves (testing their
/// union), except `Clamp`, which clamps the lower half like `ClampNone`;
/// `X_NONE` / `NONE_X` restrict it to the lower / upper half; `X_Y` gives the
/// lower half behaviour `X` and the upper half behaviour `Y`; `_JOIN` /
/// `_MEET` test the union / intersection of both halves, and `StampBoth`
/// stamps both.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum StencilEffect {
    /// Leave whatever stencil state the caller configured.
    Native,
    /// Stencil test off.
    #[default]
    None,

    Clip,
    Mask,
    Fill,
    Wipe,
    Stamp,
    Carve,
    Clamp,

    ClipNone,
    MaskNone,
    FillNone,
    WipeNone,
    StampNone,
    CarveNone,
    ClampNone,

    NoneClip,
    NoneMask,
    NoneFill,
    NoneWipe,
    NoneStamp,
    NoneCarve,
    NoneClamp,

    ClipMask,
    MaskClip,

    ClipJoin,
    ClipMeet,
    MaskJoin,
    MaskMeet,
    FillJoin,
    FillMeet,
    ClampMeet,
    StampBoth,

    FillClip,
    FillMask,
    WipeClip,
    WipeMask,
    StampClip,
    StampMask,
    CarveClip,
    CarveMask,
    ClampClip,
    ClampMask,

    ClipFill,
    ClipWipe,
    ClipStamp,
    ClipCarve,
    ClipClamp,
    MaskFill,
    MaskWipe,
    MaskStamp,
    MaskCarve,
    MaskClamp,
}

impl StencilEffect {
    pub const ALL: [StencilEffect; 53] = {
        use StencilEffect::*;
        [
            Native, None, Clip, Mask, Fill, Wipe, Stamp, Carve, Clamp, ClipNone, MaskNone,
            FillNone, WipeNone, StampNone, CarveNone, ClampNone, NoneClip, NoneMask, NoneFill,
            NoneWipe, NoneStamp, NoneCarve, NoneClamp, ClipMask, MaskClip, ClipJoin, ClipMeet,
            MaskJoin, MaskMeet, FillJoin, FillMeet, ClampMeet, StampBoth, FillClip, FillMask,
            WipeClip, WipeMask, StampClip, StampMask, CarveClip, CarveMask, ClampClip, ClampMask,
            ClipFill, ClipWipe, ClipStamp, ClipCarve, ClipClamp, MaskFill, MaskWipe, MaskStamp,
            MaskCarve, MaskClamp,
        ]
    };

    fn layout(self) -> Layout {
        use Behaviour as B;
        use StencilEffect as E;

        let unified = |b, c| Layout::Unified(b, c);
        let lower = |b| Layout::Halves { lower: Some(b), upper: Option::None };
        let upper = |b| Layout::Halves { lower: Option::None, upper: Some(b) };
        let pair = |l, u| Layout::Halves { lower: Some(l), upper: Some(u) };

        match self {
            E::Native => Layout::Native,
            E::None => Layout::Off,

            E::Clip | E::ClipJoin => unified(B::Clip, Combine::Join),
            E::Mask | E::MaskJoin => unified(B::Mask, Combine::Join),
            E::Fill | E::FillJoin => unified(B::Fill, Combine::Join),
            E::Wipe => unified(B::Wipe, Combine::Join),
            E::Stamp | E::StampBoth => unified(B::Stamp, Combine::Join),
            E::Carve => unified(B::Carve, Combine::Join),
            E::ClipMeet => unified(B::Clip, Combine::Meet),
            E::MaskMeet => unified(B::Mask, Combine::Meet),
            E::FillMeet => unified(B::Fill, Combine::Meet),
            E::ClampMeet => unified(B::Clamp, Combine::Meet),

            E::ClipNone => lower(B::Clip),
            E::MaskNone => lower(B::Mask),
            E::FillNone => lower(B::Fill),
            E::WipeNone => lower(B::Wipe),
            E::StampNone => lower(B::Stamp),
            E::CarveNone => lower(B::Carve),
            E::Clamp | E::ClampNone => lower(B::Clamp),

            E::NoneClip => upper(B::Clip),
            E::NoneMask => upper(B::Mask),
            E::NoneFill => upper(B::Fill),
            E::NoneWipe => upper(B::Wipe),
            E::NoneStamp => upper(B::Stamp),
            E::NoneCarve => upper(B::Carve),
            E::NoneClamp => upper(B::Clamp),

            E::ClipMask => pair(B::Clip, B::Mask),
            E::MaskClip => pair(B::Mask, B::Clip),

            E::FillClip => pair(B::Fill, B::Clip),
            E::FillMask => pair(B::Fill, B::Mask),
            E::WipeClip => pair(B::Wipe, B::Clip),
            E::WipeMask => pair(B::Wipe, B::Mask),
            E::StampClip => pair(B::Stamp, B::Clip),
            E::StampMask => pair(B::Stamp, B::Mask),
            E::CarveClip => pair(B::Carve, B::Clip),
            E::CarveMask => pair(B::Carve, B::Mask),
            E::ClampClip => pair(B::Clamp, B::Clip),
            E::ClampMask => pair(B::Clamp, B::Mask),

            E::ClipFill => pair(B::Clip, B::Fill),
            E::ClipWipe => pair(B::Clip, B::Wipe),
            E::ClipStamp => pair(B::Clip, B::Stamp),
            E::ClipCarve => pair(B::Clip, B::Carve),
            E::ClipClamp => pair(B::Clip, B::Clamp),
            E::MaskFill => pair(B::Mask, B::Fill),
            E::MaskWipe => pair(B::Mask, B::Wipe),
            E::MaskStamp => pair(B::Mask, B::Stamp),
            E::MaskCarve => pair(B::Mask, B::Carve),
            E::MaskClamp => pair(B::Mask, B::Clamp),
        }
    }

    /// The read/test/write rule this effect applies.
    pub fn rule(self) -> StencilRule {
        match self.layout() {
            Layout::Native | Layout::Off => StencilRule::PASSTHROUGH,
            Layout::Unified(b, combine) => {
                let op = b.op();
                let (read, test) = match b.test() {
                    Option::None => (StencilRead::None, StencilTest::Inside),
                    Some(test) => match combine {
                        Combine::Join => (StencilRead::Union, test),
                        Combine::Meet => (StencilRead::Intersect, test),
                    },
                };
                StencilRule {
                    read,
                    test,
                    write: if op == StencilOp::None { StencilWrite::None } else { StencilWrite::Both },
                    op,
                    draws_color: b.draws(),
                }
            }
            Layout::Halves { lower, upper } => {
                let (read, test) = match (lower.and_then(Behaviour::test), upper.and_then(Behaviour::test)) {
                    (Some(StencilTest::Inside), Some(StencilTest::Inside)) => {
                        (StencilRead::Intersect, StencilTest::Inside)
                    }
                    (Some(StencilTest::Inside), Some(StencilTest::Outside)) => {
                        (StencilRead::LowerMinusUpper, StencilTest::Inside)
                    }
                    (Some(StencilTest::Outside), Some(StencilTest::Inside)) => {
                        (StencilRead::UpperMinusLower, StencilTest::Inside)
                    }
                    (Some(StencilTest::Outside), Some(StencilTest::Outside)) => {
                        (StencilRead::Union, StencilTest::Outside)
                    }
                    (Some(test), Option::None) => (StencilRead::Lower, test),
                    (Option::None, Some(test)) => (StencilRead::Upper, test),
                    (Option::None, Option::None) => (StencilRead::None, StencilTest::Inside),
                };

                let lower_op = lower.map_or(StencilOp::None, Behaviour::op);
                let upper_op = upper.map_or(StencilOp::None, Behaviour::op);
                // Named pairs never write both halves.
                debug_assert!(lower_op == StencilOp::None || upper_op == StencilOp::None);
                let (write, op) = match (lower_op, upper_op) {
                    (StencilOp::None, StencilOp::None) => (StencilWrite::None, StencilOp::None),
                    (StencilOp::None, op) => (StencilWrite::Upper, op),
                    (op, _) => (StencilWrite::Lower, op),
                };

                StencilRule {
                    read,
                    test,
                    write,
                    op,
                    draws_color: lower.is_none_or(Behaviour::draws) && upper.is_none_or(Behaviour::draws),
                }
            }
        }
    }

    /// Resolved state; `Native` yields [`StencilState::native`].
    pub fn state(self) -> StencilState {
        match self {
            StencilEffect::Native => StencilState::native(),
            _ => self.rule().resolve(),
        }
    }
}

// ── rules ─────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilRule {
    pub read: StencilRead,
    pub test: StencilTest,
    pub write: StencilWrite,
    pub op: StencilOp,
    pub draws_color: bool,
}

impl StencilRule {
    /// No test, no write, color on.
    pub const PASSTHROUGH: StencilRule = StencilRule {
        read: StencilRead::None,
        test: StencilTest::Inside,
        write: StencilWrite::None,
        op: StencilOp::None,
        draws_color: true,
    };

    /// `(read, write, op, draws_color)`.
    #[inline]
    pub fn tuple(&self) -> (StencilRead, StencilWrite, StencilOp, bool) {
        (self.read, self.write, self.op, self.draws_color)
    }

    /// Comparison, read mask and region reference for the test.
    fn comparison(&self) -> (StencilCompare, u8, u8) {
        use StencilCompare::{Equal, NotEqual};
        let (inside, outside) = (self.test == StencilTest::Inside, self.test == StencilTest::Outside);
        let pick = |when_inside, when_outside| if inside { when_inside } else { when_outside };

        match self.read {
            StencilRead::None => (StencilCompare::Always, 0, 0),
            StencilRead::Lower => (pick(Equal, NotEqual), LOWER_HALF, LOWER_HALF),
            StencilRead::Upper => (pick(Equal, NotEqual), UPPER_HALF, UPPER_HALF),
            // Inside the union: anything but both halves clear.
            StencilRead::Union => (if outside { Equal } else { NotEqual }, BOTH_HALVES, 0),
            StencilRead::Intersect => (pick(Equal, NotEqual), BOTH_HALVES, BOTH_HALVES),
            StencilRead::LowerMinusUpper => (pick(Equal, NotEqual), BOTH_HALVES, LOWER_HALF),
            StencilRead::UpperMinusLower => (pick(Equal, NotEqual), BOTH_HALVES, UPPER_HALF),
        }
    }

    /// Pass operation for a `Set`: replace when the reference carries the
    /// written bits, invert when the test pins them to zero.
    fn set_operation(compare: StencilCompare, read_mask: u8, write_mask: u8, reference: u8) -> Option<StencilPassOp> {
        if reference & write_mask == write_mask {
            Some(StencilPassOp::Replace)
        } else if compare == StencilCompare::Equal
            && read_mask & write_mask == write_mask
            && reference & write_mask == 0
        {
            Some(StencilPassOp::Invert)
        } else {
            Option::None
        }
    }

    /// Backend-neutral GPU state for this rule.
    pub fn resolve(&self) -> StencilState {
        if self.read == StencilRead::None && self.write == StencilWrite::None {
            return StencilState {
                color_writes: self.draws_color,
                ..StencilState::disabled()
            };
        }

        let (compare, read_mask, mut reference) = self.comparison();
        let write_mask = self.write.mask();
        // Bits outside the read mask do not affect the test.
        reference |= write_mask & !read_mask;

        let pass_op = match self.op {
            StencilOp::None => StencilPassOp::Keep,
            StencilOp::Clear => StencilPassOp::Zero,
            StencilOp::Set => Self::set_operation(compare, read_mask, write_mask, reference)
                .unwrap_or_else(|| {
                    log::warn!("stencil rule {self:?} cannot set its halves exactly; replacing");
                    StencilPassOp::Replace
                }),
        };

        StencilState {
            mode: StencilMode::Test,
            compare,
            read_mask,
            write_mask,
            reference,
            pass_op,
            color_writes: self.draws_color,
        }
    }
}

// ── resolved state ────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilCompare {
    Always,
    Equal,
    NotEqual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilPassOp {
    Keep,
    Replace,
    Invert,
    Zero,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StencilMode {
    /// Caller-managed state; backends keep whatever they were given.
    Native,
    Disabled,
    Test,
}

/// Stencil configuration handed to a backend.
///
/// Failing fragments and depth failures always keep the stored value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StencilState {
    pub mode: StencilMode,
    pub compare: StencilCompare,
    pub read_mask: u8,
    pub write_mask: u8,
    pub reference: u8,
    pub pass_op: StencilPassOp,
    pub color_writes: bool,
}

impl StencilState {
    pub const fn disabled() -> Self {
        Self {
            mode: StencilMode::Disabled,
            compare: StencilCompare::Always,
            read_mask: 0,
            write_mask: 0,
            reference: 0,
            pass_op: StencilPassOp::Keep,
            color_writes: true,
        }
    }

    pub const fn native() -> Self {
        Self {
            mode: StencilMode::Native,
            ..Self::disabled()
        }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.mode == StencilMode::Test
    }

    /// CPU model of the state: the new stencil value, or `None` when the
    /// fragment fails the test.
    pub fn apply(&self, stored: u8) -> Option<u8> {
        if !self.enabled() {
            return Some(stored);
        }
        let lhs = self.reference & self.read_mask;
        let rhs = stored & self.read_mask;
        let pass = match self.compare {
            StencilCompare::Always => true,
            StencilCompare::Equal => lhs == rhs,
            StencilCompare::NotEqual => lhs != rhs,
        };
        if !pass {
            return Option::None;
        }
        let written = match self.pass_op {
            StencilPassOp::Keep => stored,
            StencilPassOp::Replace => self.reference,
            StencilPassOp::Invert => !stored,
            StencilPassOp::Zero => 0,
        };
        Some((stored & !self.write_mask) | (written & self.write_mask))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use StencilOp as Op;
    use StencilRead as R;
    use StencilWrite as W;

    // ── tuple mapping ─────────────────────────────────────────────────────

    #[test]
    fn passthrough_effects() {
        assert_eq!(StencilEffect::Native.rule().tuple(), (R::None, W::None, Op::None, true));
        assert_eq!(StencilEffect::None.rule().tuple(), (R::None, W::None, Op::None, true));
        assert_eq!(StencilEffect::Native.state().mode, StencilMode::Native);
        assert_eq!(StencilEffect::None.state(), StencilState::disabled());
    }

    #[test]
    fn unified_effects() {
        assert_eq!(StencilEffect::Clip.rule().tuple(), (R::Union, W::None, Op::None, true));
        assert_eq!(StencilEffect::Mask.rule().tuple(), (R::Union, W::None, Op::None, true));
        assert_eq!(StencilEffect::Stamp.rule().tuple(), (R::None, W::Both, Op::Set, false));
        assert_eq!(StencilEffect::Wipe.rule().tuple(), (R::None, W::Both, Op::Clear, false));
        assert_eq!(StencilEffect::StampBoth.rule().tuple(), (R::None, W::Both, Op::Set, false));
        assert_eq!(StencilEffect::Clamp.rule().tuple(), (R::Lower, W::Lower, Op::Set, true));
        assert_eq!(StencilEffect::Clamp.rule(), StencilEffect::ClampNone.rule());
        assert_eq!(StencilEffect::Clip.rule().test, StencilTest::Inside);
        assert_eq!(StencilEffect::Mask.rule().test, StencilTest::Outside);
    }

    #[test]
    fn bare_names_equal_their_both_halves_form() {
        for (bare, join) in [
            (StencilEffect::Clip, StencilEffect::ClipJoin),
            (StencilEffect::Mask, StencilEffect::MaskJoin),
            (StencilEffect::Fill, StencilEffect::FillJoin),
            (StencilEffect::Stamp, StencilEffect::StampBoth),
        ] {
            assert_eq!(bare.rule(), join.rule());
        }
        assert_eq!(StencilEffect::ClipMeet.rule().read, R::Intersect);
    }

    #[test]
    fn half_restricted_and_paired_effects() {
        assert_eq!(StencilEffect::ClipMask.rule().tuple(), (R::LowerMinusUpper, W::None, Op::None, true));
        assert_eq!(StencilEffect::MaskClip.rule().tuple(), (R::UpperMinusLower, W::None, Op::None, true));
        assert_eq!(StencilEffect::NoneStamp.rule().tuple(), (R::None, W::Upper, Op::Set, false));
        assert_eq!(StencilEffect::ClampNone.rule().tuple(), (R::Lower, W::Lower, Op::Set, true));
        assert_eq!(StencilEffect::FillClip.rule().tuple(), (R::Intersect, W::Lower, Op::Clear, true));
        assert_eq!(StencilEffect::ClipStamp.rule().tuple(), (R::Lower, W::Upper, Op::Set, false));
    }

    #[test]
    fn there_are_fifty_three_distinct_effects() {
        let mut seen = std::collections::HashSet::new();
        for effect in StencilEffect::ALL {
            assert!(seen.insert(effect));
        }
        assert_eq!(seen.len(), 53);
    }

    // ── resolution ────────────────────────────────────────────────────────

    #[test]
    fn every_set_rule_resolves_exactly() {
        for effect in StencilEffect::ALL {
            let rule = effect.rule();
            if rule.op != Op::Set {
                continue;
            }
            let (compare, read_mask, reference) = rule.comparison();
            let write_mask = rule.write.mask();
            let reference = reference | (write_mask & !read_mask);
            assert!(
                StencilRule::set_operation(compare, read_mask, write_mask, reference).is_some(),
                "{effect:?}"
            );
        }
    }

    /// Stored values where each half is fully set or clear.
    const STATES: [u8; 4] = [0x00, LOWER_HALF, UPPER_HALF, BOTH_HALVES];

    fn in_lower(s: u8) -> bool {
        s & LOWER_HALF == LOWER_HALF
    }

    fn in_upper(s: u8) -> bool {
        s & UPPER_HALF == UPPER_HALF
    }

    fn region(read: R, s: u8) -> bool {
        match read {
            R::None => true,
            R::Lower => in_lower(s),
            R::Upper => in_upper(s),
            R::Union => in_lower(s) || in_upper(s),
            R::Intersect => in_lower(s) && in_upper(s),
            R::LowerMinusUpper => in_lower(s) && !in_upper(s),
            R::UpperMinusLower => in_upper(s) && !in_lower(s),
        }
    }

    #[test]
    fn resolved_state_matches_rule_for_all_effects() {
        for effect in StencilEffect::ALL {
            let rule = effect.rule();
            let state = effect.state();
            if effect == StencilEffect::Native {
                assert_eq!(state.mode, StencilMode::Native);
                continue;
            }
            assert_eq!(state.color_writes, rule.draws_color, "{effect:?}");
            assert_eq!(state.write_mask, rule.write.mask(), "{effect:?}");

            for stored in STATES {
                let expect_pass = match rule.test {
                    _ if rule.read == R::None => true,
                    StencilTest::Inside => region(rule.read, stored),
                    StencilTest::Outside => !region(rule.read, stored),
                };
                let result = state.apply(stored);
                assert_eq!(result.is_some(), expect_pass, "{effect:?} on {stored:#04x}");

                let Some(after) = result else { continue };
                let mask = rule.write.mask();
                let expected = match rule.op {
                    Op::None => stored,
                    Op::Set => stored | mask,
                    Op::Clear => stored & !mask,
                };
                assert_eq!(after, expected, "{effect:?} on {stored:#04x}");
            }
        }
    }

    #[test]
    fn stamp_then_clip_only_passes_inside() {
        let stamped = StencilEffect::Stamp.state().apply(0).unwrap();
        assert_eq!(stamped, BOTH_HALVES);
        let clip = StencilEffect::Clip.state();
        assert!(clip.apply(stamped).is_some());
        assert!(clip.apply(0).is_none());
    }
}
