// Shape checker
// Rule-based plausibility checks on a candidate shape, using the glyph position in its staff

use super::shape::Shape;
use super::types::Glyph;
use std::fmt;

/// Where a glyph sits relative to its staff and system
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StaffContext {
    /// Estimated pitch position of the glyph center, 0 on the middle line
    pub pitch_position: f64,

    /// Abscissa range of the containing system
    pub system_left: i32,
    pub system_right: i32,
}

/// Why a rule rejected a candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub rule: &'static str,
    pub reason: Option<&'static str>,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            Some(reason) => write!(f, "{}:{}", self.rule, reason),
            None => f.write_str(self.rule),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    NotWithinWidth,
    MeasureRest,
    NotWithinStaffHeight,
    WithinStaffHeight,
    LongRest,
    BreveRest,
    WholeTimeSig,
    PartialTimeSig,
}

/// Pitch margin of a time signature around its expected position
const TIME_PITCH_MARGIN: f64 = 1.0;

/// Height of a whole time signature, in interlines
const MAX_TIME_HEIGHT: f64 = 4.5;

impl Rule {
    const ALL: [Rule; 8] = [
        Rule::NotWithinWidth,
        Rule::MeasureRest,
        Rule::NotWithinStaffHeight,
        Rule::WithinStaffHeight,
        Rule::LongRest,
        Rule::BreveRest,
        Rule::WholeTimeSig,
        Rule::PartialTimeSig,
    ];

    fn name(&self) -> &'static str {
        match self {
            Rule::NotWithinWidth => "NotWithinWidth",
            Rule::MeasureRest => "MeasureRest",
            Rule::NotWithinStaffHeight => "NotWithinStaffHeight",
            Rule::WithinStaffHeight => "WithinStaffHeight",
            Rule::LongRest => "LongRest",
            Rule::BreveRest => "BreveRest",
            Rule::WholeTimeSig => "WholeTimeSig",
            Rule::PartialTimeSig => "PartialTimeSig",
        }
    }

    fn applies_to(&self, shape: Shape) -> bool {
        match self {
            Rule::NotWithinWidth => shape.is_physical(),
            Rule::MeasureRest => shape == Shape::HwRestSet,
            Rule::NotWithinStaffHeight => shape.is_clef(),
            Rule::WithinStaffHeight => matches!(
                shape,
                Shape::DynamicsP
                    | Shape::DynamicsF
                    | Shape::DynamicsMf
                    | Shape::FermataArc
                    | Shape::FermataArcBelow
            ),
            Rule::LongRest => shape == Shape::LongRest,
            Rule::BreveRest => shape == Shape::BreveRest,
            Rule::WholeTimeSig => matches!(shape, Shape::CommonTime | Shape::CutTime),
            Rule::PartialTimeSig => matches!(
                shape,
                Shape::TimeTwo
                    | Shape::TimeThree
                    | Shape::TimeFour
                    | Shape::TimeSix
                    | Shape::TimeEight
            ),
        }
    }

    /// Run the rule, possibly refining the shape
    fn check(
        &self,
        shape: &mut Shape,
        glyph: &Glyph,
        context: &StaffContext,
    ) -> Result<(), Option<&'static str>> {
        let pitch = context.pitch_position;

        match self {
            Rule::NotWithinWidth => {
                let Some(bounds) = glyph.bounds() else {
                    return Err(None);
                };
                if bounds.right() < context.system_left || bounds.left > context.system_right {
                    return Err(None);
                }
                Ok(())
            }
            Rule::MeasureRest => {
                // Whole rests hang from a line above, half rests sit on a line below
                match (2.0 * pitch).round_ties_even() as i64 {
                    -9 | -5 | -1 | 3 | 7 | 11 => {
                        *shape = Shape::HalfRest;
                        Ok(())
                    }
                    -11 | -7 | -3 | 1 | 5 | 9 => {
                        *shape = Shape::WholeRest;
                        Ok(())
                    }
                    _ => Err(Some("pitch")),
                }
            }
            Rule::NotWithinStaffHeight => {
                let limit = if *shape == Shape::PercussionClef { 2.0 } else { 4.0 };
                if pitch.abs() < limit {
                    Ok(())
                } else {
                    Err(None)
                }
            }
            Rule::WithinStaffHeight => {
                if pitch.abs() > 4.0 {
                    Ok(())
                } else {
                    Err(None)
                }
            }
            Rule::LongRest => {
                if pitch.abs() > 0.5 {
                    Err(Some("pitch"))
                } else {
                    Ok(())
                }
            }
            Rule::BreveRest => {
                if (pitch + 1.0).abs() > 0.5 {
                    Err(Some("pitch"))
                } else {
                    Ok(())
                }
            }
            Rule::WholeTimeSig => {
                // Centered on the middle line, at most the staff height
                if pitch.abs() > TIME_PITCH_MARGIN {
                    return Err(Some("pitch"));
                }
                let height = glyph.bounds().map_or(0, |b| b.height) as f64;
                if height / glyph.interline() as f64 > MAX_TIME_HEIGHT {
                    return Err(Some("tooHigh"));
                }
                Ok(())
            }
            Rule::PartialTimeSig => {
                // Numerator or denominator, on position -2 or +2
                if (pitch.abs() - 2.0).abs() > TIME_PITCH_MARGIN {
                    Err(Some("pitch"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Applies every rule relevant to a candidate shape
#[derive(Debug, Clone, Default)]
pub struct ShapeChecker;

impl ShapeChecker {
    pub fn new() -> Self {
        ShapeChecker
    }

    /// Check a candidate shape for a glyph
    ///
    /// Returns the possibly refined shape (e.g. `HwRestSet` becomes
    /// `HalfRest` or `WholeRest`), or the first failing rule.
    pub fn check(
        &self,
        shape: Shape,
        glyph: &Glyph,
        context: &StaffContext,
    ) -> Result<Shape, CheckFailure> {
        let mut current = shape;

        for rule in Rule::ALL.iter().filter(|r| r.applies_to(shape)) {
            if let Err(reason) = rule.check(&mut current, glyph, context) {
                log::debug!("{} rejected by {}", shape, rule.name());
                return Err(CheckFailure {
                    rule: rule.name(),
                    reason,
                });
            }
        }

        Ok(current)
    }
}
