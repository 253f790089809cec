use std::{
    fmt::{
        Debug,
        Display,
    },
    ops::Index,
    time::Duration,
};

use crate::timing::Timing;

/// A keyed element of a character pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Element {
    Dot,
    Dash,
}

/// One step of a playback sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    Dot,
    Dash,
    ElementGap,
    LetterGap,
    WordGap,
    LoopGap,
}

impl Symbol {
    /// Whether the outputs are keyed for this symbol.
    #[inline]
    pub fn is_mark(&self) -> bool {
        matches!(self, Self::Dot | Self::Dash)
    }
}

impl From<Element> for Symbol {
    #[inline]
    fn from(value: Element) -> Self {
        match value {
            Element::Dot => Self::Dot,
            Element::Dash => Self::Dash,
        }
    }
}

/// Looks up the dot/dash pattern of a character. Letters are matched
/// case-insensitively.
pub fn pattern(character: char) -> Option<&'static [Element]> {
    use Element::{
        Dash,
        Dot,
    };

    let pattern: &'static [Element] = match character.to_ascii_uppercase() {
        'A' => &[Dot, Dash],
        'B' => &[Dash, Dot, Dot, Dot],
        'C' => &[Dash, Dot, Dash, Dot],
        'D' => &[Dash, Dot, Dot],
        'E' => &[Dot],
        'F' => &[Dot, Dot, Dash, Dot],
        'G' => &[Dash, Dash, Dot],
        'H' => &[Dot, Dot, Dot, Dot],
        'I' => &[Dot, Dot],
        'J' => &[Dot, Dash, Dash, Dash],
        'K' => &[Dash, Dot, Dash],
        'L' => &[Dot, Dash, Dot, Dot],
        'M' => &[Dash, Dash],
        'N' => &[Dash, Dot],
        'O' => &[Dash, Dash, Dash],
        'P' => &[Dot, Dash, Dash, Dot],
        'Q' => &[Dash, Dash, Dot, Dash],
        'R' => &[Dot, Dash, Dot],
        'S' => &[Dot, Dot, Dot],
        'T' => &[Dash],
        'U' => &[Dot, Dot, Dash],
        'V' => &[Dot, Dot, Dot, Dash],
        'W' => &[Dot, Dash, Dash],
        'X' => &[Dash, Dot, Dot, Dash],
        'Y' => &[Dash, Dot, Dash, Dash],
        'Z' => &[Dash, Dash, Dot, Dot],
        '0' => &[Dash, Dash, Dash, Dash, Dash],
        '1' => &[Dot, Dash, Dash, Dash, Dash],
        '2' => &[Dot, Dot, Dash, Dash, Dash],
        '3' => &[Dot, Dot, Dot, Dash, Dash],
        '4' => &[Dot, Dot, Dot, Dot, Dash],
        '5' => &[Dot, Dot, Dot, Dot, Dot],
        '6' => &[Dash, Dot, Dot, Dot, Dot],
        '7' => &[Dash, Dash, Dot, Dot, Dot],
        '8' => &[Dash, Dash, Dash, Dot, Dot],
        '9' => &[Dash, Dash, Dash, Dash, Dot],
        '.' => &[Dot, Dash, Dot, Dash, Dot, Dash],
        ',' => &[Dash, Dash, Dot, Dot, Dash, Dash],
        '?' => &[Dot, Dot, Dash, Dash, Dot, Dot],
        '/' => &[Dash, Dot, Dot, Dash, Dot],
        '-' => &[Dash, Dot, Dot, Dot, Dot, Dash],
        '(' => &[Dash, Dot, Dash, Dash, Dot],
        ')' => &[Dash, Dot, Dash, Dash, Dot, Dash],
        '@' => &[Dot, Dash, Dash, Dot, Dash, Dot],
        _ => return None,
    };

    Some(pattern)
}

/// A character that has no Morse representation and was left out of the
/// sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unsupported character {character:?} at position {position}")]
pub struct EncodingWarning {
    pub character: char,
    /// Index of the character (not the byte) in the input text.
    pub position: usize,
}

/// Timed playback sequence for a message. Always ends with a single
/// [`Symbol::LoopGap`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SymbolSequence {
    symbols: Vec<Symbol>,
}

impl SymbolSequence {
    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Symbol> {
        self.symbols.get(index).copied()
    }

    #[inline]
    pub fn as_slice(&self) -> &[Symbol] {
        &self.symbols
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.symbols.iter().copied()
    }

    /// Whether there is anything to key, i.e. at least one dot or dash.
    pub fn has_signal(&self) -> bool {
        self.symbols.iter().any(Symbol::is_mark)
    }

    /// Time one pass through the sequence takes, loop gap included.
    pub fn cycle_duration(&self, timing: &Timing) -> Duration {
        self.iter()
            .map(|symbol| timing.durations(symbol).total())
            .sum()
    }
}

impl Index<usize> for SymbolSequence {
    type Output = Symbol;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.symbols[index]
    }
}

impl<'a> IntoIterator for &'a SymbolSequence {
    type Item = Symbol;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Symbol>>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter().copied()
    }
}

impl Debug for SymbolSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.symbols).finish()
    }
}

impl Display for SymbolSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for symbol in self {
            match symbol {
                Symbol::Dot => write!(f, ".")?,
                Symbol::Dash => write!(f, "-")?,
                Symbol::ElementGap | Symbol::LoopGap => {}
                Symbol::LetterGap => write!(f, " ")?,
                Symbol::WordGap => write!(f, " / ")?,
            }
        }
        Ok(())
    }
}

/// Encodes text into a playback sequence, logging every skipped character.
pub fn encode(text: &str) -> SymbolSequence {
    encode_with(text, |warning| {
        tracing::warn!(%warning, "skipping character");
    })
}

/// Encodes text into a playback sequence, handing every skipped character to
/// `on_warning`.
///
/// Whitespace separates words. Runs of whitespace collapse into a single word
/// gap and leading or trailing whitespace produces no gap at all.
pub fn encode_with(text: &str, mut on_warning: impl FnMut(EncodingWarning)) -> SymbolSequence {
    let mut symbols = Vec::with_capacity(text.len() * 8 + 1);

    // gap owed before the next encodable character. `None` while we're at the
    // start of the message.
    let mut separator = None;

    for (position, character) in text.chars().enumerate() {
        if character.is_whitespace() {
            if separator.is_some() {
                separator = Some(Symbol::WordGap);
            }
            continue;
        }

        let Some(pattern) = pattern(character)
        else {
            on_warning(EncodingWarning {
                character,
                position,
            });
            continue;
        };

        if let Some(separator) = separator {
            symbols.push(separator);
        }

        for (i, element) in pattern.iter().enumerate() {
            if i > 0 {
                symbols.push(Symbol::ElementGap);
            }
            symbols.push((*element).into());
        }

        separator = Some(Symbol::LetterGap);
    }

    symbols.push(Symbol::LoopGap);

    SymbolSequence { symbols }
}
