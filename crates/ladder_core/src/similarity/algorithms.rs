//! String similarity algorithms normalized to `[0, 1]`.
//!
//! # Invariants
//! - Every algorithm scores identical inputs (including two empty strings)
//!   at exactly `1.0`.
//! - Scores never leave `[0, 1]`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Available similarity measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Levenshtein,
    DamerauLevenshtein,
    JaroWinkler,
    /// Sørensen-Dice coefficient over character bigrams.
    PairDistance,
    LongestSubsequence,
    LongestSubstring,
    /// Phonetic comparison of per-word Soundex codes.
    Soundex,
}

impl Algorithm {
    pub const ALL: [Algorithm; 7] = [
        Self::Levenshtein,
        Self::DamerauLevenshtein,
        Self::JaroWinkler,
        Self::PairDistance,
        Self::LongestSubsequence,
        Self::LongestSubstring,
        Self::Soundex,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Levenshtein => "levenshtein",
            Self::DamerauLevenshtein => "damerau_levenshtein",
            Self::JaroWinkler => "jaro_winkler",
            Self::PairDistance => "pair_distance",
            Self::LongestSubsequence => "longest_subsequence",
            Self::LongestSubstring => "longest_substring",
            Self::Soundex => "soundex",
        }
    }

    pub fn score(self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let score = match self {
            Self::Levenshtein => strsim::normalized_levenshtein(a, b),
            Self::DamerauLevenshtein => strsim::normalized_damerau_levenshtein(a, b),
            Self::JaroWinkler => strsim::jaro_winkler(a, b),
            Self::PairDistance => strsim::sorensen_dice(a, b),
            Self::LongestSubsequence => longest_subsequence(a, b),
            Self::LongestSubstring => longest_substring(a, b),
            Self::Soundex => soundex_similarity(a, b),
        };
        score.clamp(0.0, 1.0)
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAlgorithm(pub String);

impl Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown similarity algorithm: `{}`", self.0)
    }
}

impl Error for UnknownAlgorithm {}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|algorithm| algorithm.name() == value)
            .ok_or(UnknownAlgorithm(value))
    }
}

/// Longest common subsequence, scaled by combined length.
fn longest_subsequence(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];
    for left in &a {
        for (j, right) in b.iter().enumerate() {
            current[j + 1] = if left == right {
                previous[j] + 1
            } else {
                previous[j + 1].max(current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (2 * previous[b.len()]) as f64 / total as f64
}

/// Longest common contiguous substring, scaled by combined length.
fn longest_substring(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let mut longest = 0usize;
    let mut previous = vec![0usize; b.len() + 1];
    for left in &a {
        let mut current = vec![0usize; b.len() + 1];
        for (j, right) in b.iter().enumerate() {
            if left == right {
                current[j + 1] = previous[j] + 1;
                longest = longest.max(current[j + 1]);
            }
        }
        previous = current;
    }

    (2 * longest) as f64 / total as f64
}

/// Four-character American Soundex code of one word; `None` without letters.
pub fn soundex(word: &str) -> Option<String> {
    let letters: Vec<char> = word
        .chars()
        .filter(char::is_ascii_alphabetic)
        .map(|ch| ch.to_ascii_uppercase())
        .collect();
    let first = *letters.first()?;

    let mut code = String::with_capacity(4);
    code.push(first);
    let mut last = soundex_digit(first);
    for ch in letters.iter().skip(1) {
        let digit = soundex_digit(*ch);
        match digit {
            Some(d) if last != Some(d) => {
                code.push(d);
                if code.len() == 4 {
                    break;
                }
            }
            _ => {}
        }
        // H and W do not separate letters with the same code.
        if !matches!(ch, 'H' | 'W') {
            last = digit;
        }
    }
    while code.len() < 4 {
        code.push('0');
    }
    Some(code)
}

fn soundex_digit(ch: char) -> Option<char> {
    match ch {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        _ => None,
    }
}

/// Share of word positions whose Soundex codes agree.
fn soundex_similarity(a: &str, b: &str) -> f64 {
    let left: Vec<String> = a.split_whitespace().filter_map(soundex).collect();
    let right: Vec<String> = b.split_whitespace().filter_map(soundex).collect();
    let longest = left.len().max(right.len());
    if longest == 0 {
        return 1.0;
    }
    let matching = left
        .iter()
        .zip(right.iter())
        .filter(|(l, r)| l == r)
        .count();
    matching as f64 / longest as f64
}
