// Musical shapes
// Physical shapes are the classifier output classes; logical shapes are derived by checks

use serde::{Deserialize, Serialize};
use std::fmt;

/// Musical symbol shapes
///
/// Variants up to and including `Clutter` are physical shapes, in the exact
/// order of classifier outputs. Variants after it are never produced by a
/// classifier directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Shape {
    // Markers and pauses
    DalSegno,
    DaCapo,
    Segno,
    Coda,
    BreathMark,
    Caesura,
    FermataArc,
    FermataArcBelow,

    // Clefs
    GClef,
    GClefSmall,
    GClef8va,
    GClef8vb,
    CClef,
    FClef,
    FClefSmall,
    PercussionClef,

    // Accidentals
    Flat,
    Natural,
    Sharp,
    DoubleSharp,
    DoubleFlat,

    // Time signatures
    TimeTwo,
    TimeThree,
    TimeFour,
    TimeSix,
    TimeEight,
    CommonTime,
    CutTime,

    // Rests
    LongRest,
    BreveRest,
    /// Half or whole rest, told apart only by pitch position
    HwRestSet,
    QuarterRest,
    EighthRest,
    OneSixteenthRest,
    OneThirtySecondRest,

    // Flags
    Flag1,
    Flag1Up,
    Flag2,
    Flag2Up,

    // Dynamics
    DynamicsP,
    DynamicsF,
    DynamicsMf,

    // Articulations and ornaments
    Accent,
    StrongAccent,
    Tenuto,
    Turn,
    Mordent,
    Trill,

    // Heads
    NoteheadBlack,
    NoteheadVoid,
    WholeNote,

    AugmentationDot,

    /// Pure clutter, recognized as garbage
    Clutter,

    // Logical shapes
    /// Too small to be anything
    Noise,
    HalfRest,
    WholeRest,
}

/// Number of physical shapes, i.e. classifier output size
pub const SHAPE_COUNT: usize = Shape::Clutter as usize + 1;

impl Shape {
    /// All shapes in ordinal order
    pub const ALL: &'static [Shape] = &[
        Shape::DalSegno,
        Shape::DaCapo,
        Shape::Segno,
        Shape::Coda,
        Shape::BreathMark,
        Shape::Caesura,
        Shape::FermataArc,
        Shape::FermataArcBelow,
        Shape::GClef,
        Shape::GClefSmall,
        Shape::GClef8va,
        Shape::GClef8vb,
        Shape::CClef,
        Shape::FClef,
        Shape::FClefSmall,
        Shape::PercussionClef,
        Shape::Flat,
        Shape::Natural,
        Shape::Sharp,
        Shape::DoubleSharp,
        Shape::DoubleFlat,
        Shape::TimeTwo,
        Shape::TimeThree,
        Shape::TimeFour,
        Shape::TimeSix,
        Shape::TimeEight,
        Shape::CommonTime,
        Shape::CutTime,
        Shape::LongRest,
        Shape::BreveRest,
        Shape::HwRestSet,
        Shape::QuarterRest,
        Shape::EighthRest,
        Shape::OneSixteenthRest,
        Shape::OneThirtySecondRest,
        Shape::Flag1,
        Shape::Flag1Up,
        Shape::Flag2,
        Shape::Flag2Up,
        Shape::DynamicsP,
        Shape::DynamicsF,
        Shape::DynamicsMf,
        Shape::Accent,
        Shape::StrongAccent,
        Shape::Tenuto,
        Shape::Turn,
        Shape::Mordent,
        Shape::Trill,
        Shape::NoteheadBlack,
        Shape::NoteheadVoid,
        Shape::WholeNote,
        Shape::AugmentationDot,
        Shape::Clutter,
        Shape::Noise,
        Shape::HalfRest,
        Shape::WholeRest,
    ];

    /// Physical shapes, indexed by classifier output
    pub fn physical_shapes() -> &'static [Shape] {
        &Self::ALL[..SHAPE_COUNT]
    }

    /// Names of physical shapes, used as persisted output labels
    pub fn physical_names() -> Vec<&'static str> {
        Self::physical_shapes().iter().map(|s| s.name()).collect()
    }

    pub fn ordinal(&self) -> usize {
        *self as usize
    }

    pub fn is_physical(&self) -> bool {
        self.ordinal() < SHAPE_COUNT
    }

    /// Shape to use for training, None for shapes never trained
    pub fn physical_shape(&self) -> Option<Shape> {
        match self {
            Shape::HalfRest | Shape::WholeRest => Some(Shape::HwRestSet),
            Shape::Noise => None,
            s => Some(*s),
        }
    }

    pub fn is_clef(&self) -> bool {
        matches!(
            self,
            Shape::GClef
                | Shape::GClefSmall
                | Shape::GClef8va
                | Shape::GClef8vb
                | Shape::CClef
                | Shape::FClef
                | Shape::FClefSmall
                | Shape::PercussionClef
        )
    }

    /// Parse a persisted shape name
    pub fn from_name(name: &str) -> Option<Shape> {
        Self::ALL.iter().copied().find(|s| s.name() == name)
    }

    /// Stable upper-case name
    pub fn name(&self) -> &'static str {
        match self {
            Shape::DalSegno => "DAL_SEGNO",
            Shape::DaCapo => "DA_CAPO",
            Shape::Segno => "SEGNO",
            Shape::Coda => "CODA",
            Shape::BreathMark => "BREATH_MARK",
            Shape::Caesura => "CAESURA",
            Shape::FermataArc => "FERMATA_ARC",
            Shape::FermataArcBelow => "FERMATA_ARC_BELOW",
            Shape::GClef => "G_CLEF",
            Shape::GClefSmall => "G_CLEF_SMALL",
            Shape::GClef8va => "G_CLEF_8VA",
            Shape::GClef8vb => "G_CLEF_8VB",
            Shape::CClef => "C_CLEF",
            Shape::FClef => "F_CLEF",
            Shape::FClefSmall => "F_CLEF_SMALL",
            Shape::PercussionClef => "PERCUSSION_CLEF",
            Shape::Flat => "FLAT",
            Shape::Natural => "NATURAL",
            Shape::Sharp => "SHARP",
            Shape::DoubleSharp => "DOUBLE_SHARP",
            Shape::DoubleFlat => "DOUBLE_FLAT",
            Shape::TimeTwo => "TIME_TWO",
            Shape::TimeThree => "TIME_THREE",
            Shape::TimeFour => "TIME_FOUR",
            Shape::TimeSix => "TIME_SIX",
            Shape::TimeEight => "TIME_EIGHT",
            Shape::CommonTime => "COMMON_TIME",
            Shape::CutTime => "CUT_TIME",
            Shape::LongRest => "LONG_REST",
            Shape::BreveRest => "BREVE_REST",
            Shape::HwRestSet => "HW_REST_SET",
            Shape::QuarterRest => "QUARTER_REST",
            Shape::EighthRest => "EIGHTH_REST",
            Shape::OneSixteenthRest => "ONE_16TH_REST",
            Shape::OneThirtySecondRest => "ONE_32ND_REST",
            Shape::Flag1 => "FLAG_1",
            Shape::Flag1Up => "FLAG_1_UP",
            Shape::Flag2 => "FLAG_2",
            Shape::Flag2Up => "FLAG_2_UP",
            Shape::DynamicsP => "DYNAMICS_P",
            Shape::DynamicsF => "DYNAMICS_F",
            Shape::DynamicsMf => "DYNAMICS_MF",
            Shape::Accent => "ACCENT",
            Shape::StrongAccent => "STRONG_ACCENT",
            Shape::Tenuto => "TENUTO",
            Shape::Turn => "TURN",
            Shape::Mordent => "MORDENT",
            Shape::Trill => "TR",
            Shape::NoteheadBlack => "NOTEHEAD_BLACK",
            Shape::NoteheadVoid => "NOTEHEAD_VOID",
            Shape::WholeNote => "WHOLE_NOTE",
            Shape::AugmentationDot => "AUGMENTATION_DOT",
            Shape::Clutter => "CLUTTER",
            Shape::Noise => "NOISE",
            Shape::HalfRest => "HALF_REST",
            Shape::WholeRest => "WHOLE_REST",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
