//! Dice rolling.
//!
//! Rolls are drawn through a [`DiceSource`], so production code uses a
//! uniform random source while tests replay scripted values. Supports plain
//! `count x sides` rolls, standard notation (`2d6+3`, `4d6kh3`) and d20 rolls
//! with advantage or disadvantage.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice spec: {count}d{sides} (need 1 to 1000 dice with 2 to 10000 sides)")]
    InvalidDiceSpec { count: u32, sides: u32 },
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
    #[error("Cannot keep {keep} dice when only rolling {count} (in {notation})")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        notation: String,
    },
}

/// Something that can produce a single die face in `[1, sides]`.
pub trait DiceSource {
    fn roll_die(&mut self, sides: u32) -> u32;
}

impl<S: DiceSource + ?Sized> DiceSource for &mut S {
    fn roll_die(&mut self, sides: u32) -> u32 {
        (**self).roll_die(sides)
    }
}

/// Uniform random dice backed by any [`Rng`].
#[derive(Debug, Clone)]
pub struct RandomDice<R = StdRng> {
    rng: R,
}

impl RandomDice<StdRng> {
    /// Non-deterministic source for live play.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible source for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomDice<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng> DiceSource for RandomDice<R> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Advantage state for d20 rolls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Advantage {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

impl Advantage {
    /// Combine two advantage states (advantage + disadvantage = normal).
    pub fn combine(self, other: Advantage) -> Advantage {
        match (self, other) {
            (Advantage::Normal, x) | (x, Advantage::Normal) => x,
            (Advantage::Advantage, Advantage::Disadvantage) => Advantage::Normal,
            (Advantage::Disadvantage, Advantage::Advantage) => Advantage::Normal,
            (Advantage::Advantage, Advantage::Advantage) => Advantage::Advantage,
            (Advantage::Disadvantage, Advantage::Disadvantage) => Advantage::Disadvantage,
        }
    }
}

/// Most dice a single spec or notation component may roll.
pub const MAX_DICE: u32 = 1_000;

/// Largest die size accepted.
pub const MAX_SIDES: u32 = 10_000;

/// A validated `count x sides` pair, e.g. the `1d4` of a dice-bonus effect.
///
/// Deserialization goes through [`DiceSpec::new`], so stored specs are
/// validated too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDiceSpec")]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
}

impl DiceSpec {
    /// At least one die with at least two sides, within [`MAX_DICE`] and
    /// [`MAX_SIDES`], so every total fits in an `i32`.
    pub fn new(count: u32, sides: u32) -> Result<Self, DiceError> {
        if !(1..=MAX_DICE).contains(&count) || !(2..=MAX_SIDES).contains(&sides) {
            return Err(DiceError::InvalidDiceSpec { count, sides });
        }
        Ok(Self { count, sides })
    }
}

#[derive(Deserialize)]
struct RawDiceSpec {
    count: u32,
    sides: u32,
}

impl TryFrom<RawDiceSpec> for DiceSpec {
    type Error = DiceError;

    fn try_from(raw: RawDiceSpec) -> Result<Self, Self::Error> {
        DiceSpec::new(raw.count, raw.sides)
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

/// Outcome of rolling `count` dice of one size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub spec: DiceSpec,
    pub rolls: Vec<u32>,
    pub total: u32,
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let faces: Vec<String> = self.rolls.iter().map(|r| r.to_string()).collect();
        write!(f, "{} [{}] = {}", self.spec, faces.join(", "), self.total)
    }
}

/// A single d20 draw, possibly rolled twice for advantage or disadvantage.
///
/// `rolls` keeps every die that was thrown, in the order thrown, so the
/// discarded face is still available for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct D20Roll {
    pub advantage: Advantage,
    pub rolls: Vec<u32>,
    pub kept: u32,
}

impl D20Roll {
    pub fn normal(roll: u32) -> Self {
        Self {
            advantage: Advantage::Normal,
            rolls: vec![roll],
            kept: roll,
        }
    }

    /// Resolve a pair of d20s under the given advantage state.
    ///
    /// `Normal` keeps only the first die and drops the second from `rolls`.
    pub fn from_pair(advantage: Advantage, first: u32, second: u32) -> Self {
        let kept = match advantage {
            Advantage::Normal => return Self::normal(first),
            Advantage::Advantage => first.max(second),
            Advantage::Disadvantage => first.min(second),
        };
        Self {
            advantage,
            rolls: vec![first, second],
            kept,
        }
    }

    /// The die that was rolled but not used, if two were thrown.
    pub fn discarded(&self) -> Option<u32> {
        match self.rolls.as_slice() {
            [first, second] => Some(if *first == self.kept { *second } else { *first }),
            _ => None,
        }
    }

    pub fn is_natural_20(&self) -> bool {
        self.kept == 20
    }

    pub fn is_natural_1(&self) -> bool {
        self.kept == 1
    }
}

impl fmt::Display for D20Roll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.discarded() {
            Some(dropped) => {
                let (a, b) = if self.rolls[0] == self.kept {
                    (self.kept.to_string(), format!("({dropped})"))
                } else {
                    (format!("({dropped})"), self.kept.to_string())
                };
                write!(f, "[{a}, {b}]")
            }
            None => write!(f, "[{}]", self.kept),
        }
    }
}

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub sides: u32,
    pub keep_highest: Option<u32>,
    pub keep_lowest: Option<u32>,
}

/// A complete dice expression (e.g., 2d6+3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let notation = notation.trim().to_lowercase();
        if notation.is_empty() {
            return Err(DiceError::NoDice);
        }

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in notation.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            original: notation,
        })
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        let Some(d_pos) = s.find('d') else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier = modifier
                .checked_add(sign * value)
                .ok_or_else(|| DiceError::InvalidNotation(s.to_string()))?;
            return Ok(());
        };

        // Subtracted dice have no meaning for any roll we make
        if sign < 0 {
            return Err(DiceError::InvalidNotation(format!("-{s}")));
        }

        let count_str = &s[..d_pos];
        let rest = &s[d_pos + 1..];

        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
        };

        let (sides_str, keep_highest, keep_lowest) = if let Some(kh_pos) = rest.find("kh") {
            let keep: u32 = rest[kh_pos + 2..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            (&rest[..kh_pos], Some(keep), None)
        } else if let Some(kl_pos) = rest.find("kl") {
            let keep: u32 = rest[kl_pos + 2..]
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            (&rest[..kl_pos], None, Some(keep))
        } else {
            (rest, None, None)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;

        if !(2..=MAX_SIDES).contains(&sides) {
            return Err(DiceError::InvalidDieSize(sides));
        }
        if !(1..=MAX_DICE).contains(&count) {
            return Err(DiceError::InvalidDiceSpec { count, sides });
        }

        if let Some(keep) = keep_highest.or(keep_lowest) {
            if keep > count {
                return Err(DiceError::InvalidKeepCount {
                    keep,
                    count,
                    notation: s.to_string(),
                });
            }
        }

        components.push(DiceComponent {
            count,
            sides,
            keep_highest,
            keep_lowest,
        });
        Ok(())
    }

    fn is_single_d20(&self) -> bool {
        self.components.len() == 1
            && self.components[0].count == 1
            && self.components[0].sides == 20
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

impl From<DiceSpec> for DiceExpression {
    fn from(spec: DiceSpec) -> Self {
        DiceExpression {
            components: vec![DiceComponent {
                count: spec.count,
                sides: spec.sides,
                keep_highest: None,
                keep_lowest: None,
            }],
            modifier: 0,
            original: spec.to_string(),
        }
    }
}

/// Result of rolling a single dice component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentResult {
    pub sides: u32,
    pub rolls: Vec<u32>,
    pub kept: Vec<u32>,
    pub subtotal: u32,
}

/// Complete result of rolling a [`DiceExpression`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollResult {
    pub expression: DiceExpression,
    pub component_results: Vec<ComponentResult>,
    pub modifier: i32,
    pub total: i32,
    pub natural_20: bool,
    pub natural_1: bool,
}

impl RollResult {
    /// Format the individual dice results for display, dropped dice in parentheses.
    pub fn dice_display(&self) -> String {
        let dice_parts: Vec<String> = self
            .component_results
            .iter()
            .map(|c| {
                let mut kept_used = vec![false; c.kept.len()];
                let shown: Vec<String> = c
                    .rolls
                    .iter()
                    .map(|&roll| {
                        let slot = c
                            .kept
                            .iter()
                            .enumerate()
                            .position(|(i, &k)| k == roll && !kept_used[i]);
                        match slot {
                            Some(i) => {
                                kept_used[i] = true;
                                roll.to_string()
                            }
                            None => format!("({roll})"),
                        }
                    })
                    .collect();
                format!("[{}]", shown.join(", "))
            })
            .collect();

        let dice_str = dice_parts.join(" + ");
        match self.modifier {
            0 => dice_str,
            m if m > 0 => format!("{dice_str} + {m}"),
            m => format!("{dice_str} - {}", m.abs()),
        }
    }

    /// Check if the roll meets or exceeds a DC.
    pub fn meets_dc(&self, dc: i32) -> bool {
        self.total >= dc
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.dice_display(), self.total)
    }
}

/// Rolls dice through a [`DiceSource`].
#[derive(Debug, Clone)]
pub struct DiceRoller<S = RandomDice> {
    source: S,
}

impl DiceRoller {
    /// A roller backed by a non-deterministic uniform source.
    pub fn new() -> Self {
        Self::with_source(RandomDice::from_entropy())
    }

    /// A roller backed by a seeded source.
    pub fn seeded(seed: u64) -> Self {
        Self::with_source(RandomDice::seeded(seed))
    }
}

impl Default for DiceRoller {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DiceSource> DiceRoller<S> {
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Roll `count` dice with `sides` faces each.
    pub fn roll(&mut self, count: u32, sides: u32) -> Result<DiceRoll, DiceError> {
        let spec = DiceSpec::new(count, sides)?;
        Ok(self.roll_spec(spec))
    }

    /// Roll an already validated spec.
    pub fn roll_spec(&mut self, spec: DiceSpec) -> DiceRoll {
        let rolls: Vec<u32> = (0..spec.count)
            .map(|_| self.source.roll_die(spec.sides))
            .collect();
        let total = saturating_sum(&rolls);
        DiceRoll { spec, rolls, total }
    }

    /// Roll a d20, twice under advantage or disadvantage.
    pub fn roll_d20(&mut self, advantage: Advantage) -> D20Roll {
        let first = self.source.roll_die(20);
        match advantage {
            Advantage::Normal => D20Roll::normal(first),
            Advantage::Advantage | Advantage::Disadvantage => {
                let second = self.source.roll_die(20);
                D20Roll::from_pair(advantage, first, second)
            }
        }
    }

    /// Roll a parsed expression.
    pub fn roll_expression(&mut self, expression: &DiceExpression) -> RollResult {
        let mut component_results = Vec::with_capacity(expression.components.len());

        for component in &expression.components {
            let rolls: Vec<u32> = (0..component.count)
                .map(|_| self.source.roll_die(component.sides))
                .collect();

            let mut kept = rolls.clone();
            if let Some(keep) = component.keep_highest {
                kept.sort_by(|a, b| b.cmp(a));
                kept.truncate(keep as usize);
            } else if let Some(keep) = component.keep_lowest {
                kept.sort();
                kept.truncate(keep as usize);
            }

            let subtotal = saturating_sum(&kept);
            component_results.push(ComponentResult {
                sides: component.sides,
                rolls,
                kept,
                subtotal,
            });
        }

        let dice_total = component_results
            .iter()
            .map(|c| i32::try_from(c.subtotal).unwrap_or(i32::MAX))
            .fold(0i32, i32::saturating_add);

        let d20_roll = if expression.is_single_d20() {
            component_results.first().and_then(|c| c.rolls.first().copied())
        } else {
            None
        };

        RollResult {
            expression: expression.clone(),
            component_results,
            modifier: expression.modifier,
            total: dice_total.saturating_add(expression.modifier),
            natural_20: d20_roll == Some(20),
            natural_1: d20_roll == Some(1),
        }
    }

    /// Parse and roll a notation string.
    pub fn roll_notation(&mut self, notation: &str) -> Result<RollResult, DiceError> {
        let expression = DiceExpression::parse(notation)?;
        Ok(self.roll_expression(&expression))
    }
}

fn saturating_sum(faces: &[u32]) -> u32 {
    faces.iter().fold(0u32, |acc, &face| acc.saturating_add(face))
}

impl<S: DiceSource> DiceSource for DiceRoller<S> {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.source.roll_die(sides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedDice;

    #[test]
    fn test_roll_rejects_bad_specs() {
        let mut roller = DiceRoller::seeded(1);
        assert_eq!(
            roller.roll(0, 6),
            Err(DiceError::InvalidDiceSpec { count: 0, sides: 6 })
        );
        assert_eq!(
            roller.roll(1, 1),
            Err(DiceError::InvalidDiceSpec { count: 1, sides: 1 })
        );
        assert!(roller.roll(1, 2).is_ok());
    }

    #[test]
    fn test_oversized_dice_rejected() {
        let mut roller = DiceRoller::seeded(1);
        assert_eq!(
            roller.roll(8, u32::MAX),
            Err(DiceError::InvalidDiceSpec { count: 8, sides: u32::MAX })
        );
        assert!(matches!(
            roller.roll(MAX_DICE + 1, 6),
            Err(DiceError::InvalidDiceSpec { .. })
        ));
        assert_eq!(
            DiceExpression::parse("2d4294967295"),
            Err(DiceError::InvalidDieSize(u32::MAX))
        );

        assert!(matches!(
            DiceExpression::parse("2147483647+1"),
            Err(DiceError::InvalidNotation(_))
        ));

        let largest = roller.roll(MAX_DICE, MAX_SIDES).unwrap();
        assert_eq!(largest.total, largest.rolls.iter().map(|&r| r as u64).sum::<u64>() as u32);
        assert!(largest.total <= MAX_DICE * MAX_SIDES);
    }

    #[test]
    fn test_unchecked_spec_total_saturates() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([u32::MAX, u32::MAX]));
        let roll = roller.roll_spec(DiceSpec { count: 2, sides: u32::MAX });
        assert_eq!(roll.total, u32::MAX);
    }

    #[test]
    fn test_deserialize_validates_spec() {
        let spec: DiceSpec = serde_json::from_str(r#"{"count":2,"sides":6}"#).unwrap();
        assert_eq!(spec, DiceSpec::new(2, 6).unwrap());
        assert!(serde_json::from_str::<DiceSpec>(r#"{"count":0,"sides":6}"#).is_err());
        assert!(serde_json::from_str::<DiceSpec>(r#"{"count":1,"sides":0}"#).is_err());
    }

    #[test]
    fn test_roll_range() {
        let mut roller = DiceRoller::seeded(42);
        for _ in 0..200 {
            let result = roller.roll(3, 6).unwrap();
            assert_eq!(result.rolls.len(), 3);
            assert!(result.rolls.iter().all(|r| (1..=6).contains(r)));
            assert_eq!(result.total, result.rolls.iter().sum::<u32>());
        }
    }

    #[test]
    fn test_seeded_rolls_are_reproducible() {
        let mut a = DiceRoller::seeded(7);
        let mut b = DiceRoller::seeded(7);
        for _ in 0..20 {
            assert_eq!(a.roll(2, 20).unwrap(), b.roll(2, 20).unwrap());
        }
    }

    #[test]
    fn test_advantage_keeps_higher_and_retains_discard() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([5, 17]));
        let roll = roller.roll_d20(Advantage::Advantage);
        assert_eq!(roll.kept, 17);
        assert_eq!(roll.discarded(), Some(5));
        assert_eq!(roll.rolls, vec![5, 17]);
        assert_eq!(roll.to_string(), "[(5), 17]");
    }

    #[test]
    fn test_disadvantage_keeps_lower_and_retains_discard() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([5, 17]));
        let roll = roller.roll_d20(Advantage::Disadvantage);
        assert_eq!(roll.kept, 5);
        assert_eq!(roll.discarded(), Some(17));
        assert_eq!(roll.rolls, vec![5, 17]);
    }

    #[test]
    fn test_normal_d20_draws_one_die() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([12, 3]));
        let roll = roller.roll_d20(Advantage::Normal);
        assert_eq!(roll.rolls, vec![12]);
        assert_eq!(roll.discarded(), None);
        // The second scripted value is still unused
        assert_eq!(roller.roll_d20(Advantage::Normal).kept, 3);
    }

    #[test]
    fn test_parse_simple() {
        let expr = DiceExpression::parse("1d20").unwrap();
        assert_eq!(expr.components.len(), 1);
        assert_eq!(expr.components[0].count, 1);
        assert_eq!(expr.components[0].sides, 20);
        assert_eq!(expr.modifier, 0);

        let expr = DiceExpression::parse("d8").unwrap();
        assert_eq!(expr.components[0].count, 1);
    }

    #[test]
    fn test_parse_with_modifier() {
        assert_eq!(DiceExpression::parse("1d20+5").unwrap().modifier, 5);
        assert_eq!(DiceExpression::parse("2d6-2").unwrap().modifier, -2);
        assert_eq!(DiceExpression::parse("2d6+1d4+3").unwrap().components.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(DiceExpression::parse("   "), Err(DiceError::NoDice));
        assert_eq!(DiceExpression::parse("1d1"), Err(DiceError::InvalidDieSize(1)));
        assert!(matches!(
            DiceExpression::parse("0d6"),
            Err(DiceError::InvalidDiceSpec { count: 0, sides: 6 })
        ));
        assert!(matches!(
            DiceExpression::parse("1d8-1d4"),
            Err(DiceError::InvalidNotation(_))
        ));
        assert!(matches!(
            DiceExpression::parse("4d6kh5"),
            Err(DiceError::InvalidKeepCount { keep: 5, count: 4, .. })
        ));
        assert!(DiceExpression::parse("4d6kh4").is_ok());
    }

    #[test]
    fn test_keep_highest_display() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([3, 6, 1, 5]));
        let result = roller.roll_notation("4d6kh3+1").unwrap();
        assert_eq!(result.total, 6 + 5 + 3 + 1);
        assert_eq!(result.dice_display(), "[3, 6, (1), 5] + 1");
        assert_eq!(result.to_string(), "[3, 6, (1), 5] + 1 = 15");
    }

    #[test]
    fn test_expression_natural_detection() {
        let mut roller = DiceRoller::with_source(ScriptedDice::new([20, 1]));
        let crit = roller.roll_notation("1d20+4").unwrap();
        assert!(crit.natural_20);
        assert!(crit.meets_dc(24));
        let fumble = roller.roll_notation("1d20+4").unwrap();
        assert!(fumble.natural_1);
        assert!(!fumble.meets_dc(6));
    }

    #[test]
    fn test_advantage_combine() {
        assert_eq!(
            Advantage::Normal.combine(Advantage::Advantage),
            Advantage::Advantage
        );
        assert_eq!(
            Advantage::Advantage.combine(Advantage::Disadvantage),
            Advantage::Normal
        );
        assert_eq!(
            Advantage::Disadvantage.combine(Advantage::Disadvantage),
            Advantage::Disadvantage
        );
    }
}
