//! Optical color model of the supported sequencing chemistries.
//!
//! Every base read during an index cycle lights up zero, one or several
//! detection channels depending on the chemistry. A group of indexes read in
//! the same lane can only be demultiplexed if, at every cycle, the bases
//! present across the group produce the signals the chemistry needs to
//! register clusters:
//!
//! * four-channel: A and C image red, G and T image green; every cycle must
//!   show both red and green.
//! * two-channel: A images orange, C red, T green and G is dark; every cycle
//!   must show at least one lit base. Indexes starting with `GG` are never
//!   readable and are excluded up front.
//! * one-channel: A, C and T produce signal, G is dark; every cycle must show
//!   at least one signal.
//!
//! Adding members to a group can only add signal, so a compatible group stays
//! compatible under any extension. The lane assembler relies on this.

use std::fmt;
use std::str::FromStr;

use crate::error::DesignError;

/// Bit set of the colors a column emits
pub type ColorMask = u8;

pub const DARK: ColorMask = 0;
pub const RED: ColorMask = 1;
pub const GREEN: ColorMask = 1 << 1;
pub const ORANGE: ColorMask = 1 << 2;
pub const SIGNAL: ColorMask = 1 << 3;

/// Prefix that two-channel instruments cannot read
const TWO_CHANNEL_DARK_PREFIX: &str = "GG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chemistry {
    OneChannel,
    TwoChannel,
    FourChannel,
}

impl Chemistry {
    /// Colors emitted by a single base
    pub fn base_colors(self, base: u8) -> ColorMask {
        match (self, base.to_ascii_uppercase()) {
            (Chemistry::FourChannel, b'A' | b'C') => RED,
            (Chemistry::FourChannel, b'G' | b'T') => GREEN,
            (Chemistry::TwoChannel, b'A') => ORANGE,
            (Chemistry::TwoChannel, b'C') => RED,
            (Chemistry::TwoChannel, b'T') => GREEN,
            (Chemistry::OneChannel, b'A' | b'C' | b'T') => SIGNAL,
            _ => DARK,
        }
    }

    /// Whether the union of colors seen at one cycle is enough to call bases
    pub fn column_ok(self, mask: ColorMask) -> bool {
        match self {
            Chemistry::FourChannel => mask & (RED | GREEN) == RED | GREEN,
            Chemistry::TwoChannel | Chemistry::OneChannel => mask != DARK,
        }
    }

    /// Whether a single index may take part in any lane at all
    pub fn is_usable(self, sequence: &str) -> bool {
        match self {
            Chemistry::TwoChannel => !sequence
                .get(..TWO_CHANNEL_DARK_PREFIX.len())
                .is_some_and(|p| p.eq_ignore_ascii_case(TWO_CHANNEL_DARK_PREFIX)),
            Chemistry::OneChannel | Chemistry::FourChannel => true,
        }
    }

    pub fn profile(self, sequence: &str) -> Vec<ColorMask> {
        sequence.bytes().map(|b| self.base_colors(b)).collect()
    }

    /// Render a sequence in this chemistry's color alphabet
    pub fn color_string(self, sequence: &str) -> String {
        sequence
            .bytes()
            .map(|b| match self.base_colors(b) {
                RED => 'R',
                GREEN => 'G',
                ORANGE => 'O',
                SIGNAL => 'S',
                _ => '-',
            })
            .collect()
    }

    /// Fold one color profile into a running per-cycle union
    pub fn accumulate(acc: &mut [ColorMask], profile: &[ColorMask]) {
        for (slot, &mask) in acc.iter_mut().zip(profile) {
            *slot |= mask;
        }
    }

    pub fn columns_ok(self, acc: &[ColorMask]) -> bool {
        acc.iter().all(|&mask| self.column_ok(mask))
    }

    /// Check a group of precomputed, equal-length color profiles
    pub fn profiles_compatible<'a, I>(self, profiles: I) -> bool
    where
        I: IntoIterator<Item = &'a [ColorMask]>,
    {
        let mut profiles = profiles.into_iter();
        let Some(first) = profiles.next() else {
            return false;
        };
        let mut acc = first.to_vec();
        for profile in profiles {
            if profile.len() != acc.len() {
                return false;
            }
            Self::accumulate(&mut acc, profile);
        }
        self.columns_ok(&acc)
    }

    /// Decide whether a set of index sequences can be decoded together.
    ///
    /// Runs in time linear in the total number of bases. Sequences of
    /// different lengths are never compatible.
    pub fn is_compatible<S: AsRef<str>>(self, sequences: &[S]) -> bool {
        let Some(first) = sequences.first() else {
            return false;
        };
        let len = first.as_ref().len();
        if sequences.iter().any(|s| s.as_ref().len() != len) {
            return false;
        }
        if !sequences.iter().all(|s| self.is_usable(s.as_ref())) {
            return false;
        }
        let mut acc = vec![DARK; len];
        for seq in sequences {
            for (slot, b) in acc.iter_mut().zip(seq.as_ref().bytes()) {
                *slot |= self.base_colors(b);
            }
        }
        self.columns_ok(&acc)
    }
}

impl FromStr for Chemistry {
    type Err = DesignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "one" | "one-channel" => Ok(Chemistry::OneChannel),
            "2" | "two" | "two-channel" => Ok(Chemistry::TwoChannel),
            "4" | "four" | "four-channel" => Ok(Chemistry::FourChannel),
            other => Err(DesignError::invalid_input(format!(
                "Unknown chemistry '{other}'. Use 1, 2 or 4"
            ))),
        }
    }
}

impl TryFrom<u8> for Chemistry {
    type Error = DesignError;

    fn try_from(channels: u8) -> Result<Self, Self::Error> {
        match channels {
            1 => Ok(Chemistry::OneChannel),
            2 => Ok(Chemistry::TwoChannel),
            4 => Ok(Chemistry::FourChannel),
            n => Err(DesignError::invalid_input(format!(
                "Unknown chemistry with {n} channels. Use 1, 2 or 4"
            ))),
        }
    }
}

impl fmt::Display for Chemistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chemistry::OneChannel => write!(f, "one-channel"),
            Chemistry::TwoChannel => write!(f, "two-channel"),
            Chemistry::FourChannel => write!(f, "four-channel"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_channel_needs_red_and_green() {
        let chem = Chemistry::FourChannel;
        // A/C are red, G/T green: AC vs GT complements every cycle
        assert!(chem.is_compatible(&["ACAC", "GTGT"]));
        // Both red at cycle 0
        assert!(!chem.is_compatible(&["ACGT", "CAGT"]));
        assert!(!chem.is_compatible(&["AAAA"]));
    }

    #[test]
    fn test_two_channel_dark_column() {
        let chem = Chemistry::TwoChannel;
        // Cycle 1 is G in every member
        assert!(!chem.is_compatible(&["AGTC", "CGAT", "TGGA"]));
        assert!(chem.is_compatible(&["AGTC", "CTAT"]));
        assert!(chem.is_compatible(&["ACTA"]));
    }

    #[test]
    fn test_two_channel_gg_prefix() {
        let chem = Chemistry::TwoChannel;
        assert!(!chem.is_usable("GGACTA"));
        assert!(!chem.is_usable("ggacta"));
        assert!(chem.is_usable("GAGACT"));
        assert!(Chemistry::FourChannel.is_usable("GGACTA"));
        // Companions cannot rescue a GG index
        assert!(!chem.is_compatible(&["GGACTA", "ACACAC", "TTTTTT"]));
    }

    #[test]
    fn test_one_channel() {
        let chem = Chemistry::OneChannel;
        assert!(chem.is_compatible(&["GGAT", "CTGG"]));
        assert!(!chem.is_compatible(&["GGAT", "GTGG"]));
    }

    #[test]
    fn test_empty_set_is_not_compatible() {
        let empty: [&str; 0] = [];
        assert!(!Chemistry::OneChannel.is_compatible(&empty));
    }

    #[test]
    fn test_unequal_lengths_are_not_compatible() {
        let chem = Chemistry::FourChannel;
        // the shared prefix ACGT/GTAC would pass on its own
        assert!(chem.is_compatible(&["ACGT", "GTAC"]));
        assert!(!chem.is_compatible(&["ACGT", "GTACAC"]));
        assert!(!chem.is_compatible(&["ACGTAC", "GTAC"]));

        let a = chem.profile("ACGT");
        let b = chem.profile("GTACAC");
        assert!(!chem.profiles_compatible([a.as_slice(), b.as_slice()]));
    }

    #[test]
    fn test_profiles_match_sequences() {
        let chem = Chemistry::FourChannel;
        let a = chem.profile("ACGT");
        let b = chem.profile("GTAC");
        assert!(chem.profiles_compatible([a.as_slice(), b.as_slice()]));
        assert!(!chem.profiles_compatible([a.as_slice()]));
    }

    #[test]
    fn test_color_string() {
        assert_eq!(Chemistry::FourChannel.color_string("ACGT"), "RRGG");
        assert_eq!(Chemistry::TwoChannel.color_string("ACGT"), "OR-G");
        assert_eq!(Chemistry::OneChannel.color_string("ACGT"), "SS-S");
    }

    #[test]
    fn test_parse_chemistry() {
        assert_eq!("4".parse::<Chemistry>().unwrap(), Chemistry::FourChannel);
        assert_eq!("two".parse::<Chemistry>().unwrap(), Chemistry::TwoChannel);
        assert_eq!(Chemistry::try_from(1).unwrap(), Chemistry::OneChannel);
        assert!("3".parse::<Chemistry>().is_err());
        assert!(Chemistry::try_from(8).is_err());
    }
}
