use std::time::Duration;

use serde::{
    Deserialize,
    Serialize,
};

use crate::morse::Symbol;

pub const DEFAULT_UNIT: Duration = Duration::from_millis(100);
pub const DEFAULT_WORD_GAP: Duration = Duration::from_millis(1500);
pub const DEFAULT_LOOP_GAP: Duration = Duration::from_millis(2000);

/// Playback timing.
///
/// Dashes and the gaps inside a word derive from the base unit. Word gaps
/// and the pause between repetitions are configured on their own, so a
/// beacon can be keyed fast but still leave long, readable pauses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Duration of a dot.
    #[serde(rename = "unit_ms", with = "millis")]
    pub unit: Duration,

    #[serde(rename = "word_gap_ms", with = "millis")]
    pub word_gap: Duration,

    /// Pause after the last symbol before the message repeats.
    #[serde(rename = "loop_gap_ms", with = "millis")]
    pub loop_gap: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            unit: DEFAULT_UNIT,
            word_gap: DEFAULT_WORD_GAP,
            loop_gap: DEFAULT_LOOP_GAP,
        }
    }
}

impl Timing {
    pub const fn new(unit: Duration, word_gap: Duration, loop_gap: Duration) -> Self {
        Self {
            unit,
            word_gap,
            loop_gap,
        }
    }

    /// Timing for the given speed using PARIS timing (dot = 1.2 s / wpm).
    /// Word gap is the standard 7 units, loop gap keeps the default.
    pub fn from_wpm(wpm: u32) -> Self {
        let unit = Duration::from_micros(1_200_000 / u64::from(wpm.max(1)));
        Self {
            unit,
            word_gap: unit * 7,
            loop_gap: DEFAULT_LOOP_GAP,
        }
    }

    pub fn with_word_gap(mut self, word_gap: Duration) -> Self {
        self.word_gap = word_gap;
        self
    }

    pub fn with_loop_gap(mut self, loop_gap: Duration) -> Self {
        self.loop_gap = loop_gap;
        self
    }

    /// Speed in words per minute according to PARIS timing.
    pub fn wpm(&self) -> f32 {
        1.2 / self.unit.as_secs_f32()
    }

    #[inline]
    pub fn dot(&self) -> Duration {
        self.unit
    }

    #[inline]
    pub fn dash(&self) -> Duration {
        self.unit * 3
    }

    #[inline]
    pub fn element_gap(&self) -> Duration {
        self.unit
    }

    #[inline]
    pub fn letter_gap(&self) -> Duration {
        self.unit * 3
    }

    /// How long the outputs are keyed for a symbol and how long to wait
    /// afterwards.
    pub fn durations(&self, symbol: Symbol) -> SymbolTiming {
        let (on, gap) = match symbol {
            Symbol::Dot => (self.dot(), self.element_gap()),
            Symbol::Dash => (self.dash(), self.element_gap()),
            Symbol::ElementGap => (Duration::ZERO, self.element_gap()),
            Symbol::LetterGap => (Duration::ZERO, self.letter_gap()),
            Symbol::WordGap => (Duration::ZERO, self.word_gap),
            Symbol::LoopGap => (Duration::ZERO, self.loop_gap),
        };
        SymbolTiming { on, gap }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolTiming {
    pub on: Duration,
    pub gap: Duration,
}

impl SymbolTiming {
    /// Delay from the start of this symbol to the start of the next one.
    #[inline]
    pub fn total(&self) -> Duration {
        self.on + self.gap
    }
}

mod millis {
    use std::time::Duration;

    use serde::{
        Deserialize,
        Deserializer,
        Serializer,
    };

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
