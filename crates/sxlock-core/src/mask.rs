//! Obfuscated credential indicator

use crate::credential::CREDENTIAL_CAPACITY;

/// Default obfuscation character
pub const DEFAULT_PASSCHARS: &str = "*";

/// The configured obfuscation characters repeated to the buffer capacity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordMask {
    chars: Vec<char>,
    text: String,
    hide_length: bool,
}

impl PasswordMask {
    /// Builds the mask; an empty `passchars` falls back to the default
    pub fn new(passchars: &str, hide_length: bool) -> Self {
        let pattern = if passchars.is_empty() {
            DEFAULT_PASSCHARS
        } else {
            passchars
        };
        let chars: Vec<char> = pattern.chars().cycle().take(CREDENTIAL_CAPACITY).collect();
        let text = chars.iter().collect();

        Self {
            chars,
            text,
            hide_length,
        }
    }

    /// Whether the displayed length is perturbed
    pub fn hides_length(&self) -> bool {
        self.hide_length
    }

    /// Number of mask characters shown for a credential of `len` bytes.
    ///
    /// With length hiding on, a deterministic offset in `0..5` derived from
    /// the mask pattern is added, so the indicator does not reveal the exact
    /// length at a glance.
    pub fn displayed_len(&self, len: usize) -> usize {
        let mut shown = len;
        if self.hide_length && len > 0 {
            let pattern = self.chars.get(len).map_or(0, |c| *c as usize);
            shown += (pattern * len) % 5;
        }
        shown % CREDENTIAL_CAPACITY
    }

    /// The indicator text for a credential of `len` bytes
    pub fn display(&self, len: usize) -> &str {
        let count = self.displayed_len(len);
        let end = self
            .text
            .char_indices()
            .nth(count)
            .map_or(self.text.len(), |(offset, _)| offset);
        &self.text[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_mask_matches_length() {
        let mask = PasswordMask::new("*", false);
        assert_eq!(mask.display(0), "");
        assert_eq!(mask.display(6), "******");
        assert_eq!(mask.displayed_len(255), 255);
    }

    #[test]
    fn test_pattern_repeats() {
        let mask = PasswordMask::new("ab", false);
        assert_eq!(mask.display(5), "ababa");
    }

    #[test]
    fn test_multibyte_characters() {
        let mask = PasswordMask::new("●", false);
        assert_eq!(mask.display(3), "●●●");
        assert_eq!(mask.display(3).chars().count(), 3);
    }

    #[test]
    fn test_empty_passchars_fall_back() {
        let mask = PasswordMask::new("", false);
        assert_eq!(mask.display(2), "**");
    }

    #[test]
    fn test_hidden_length_is_deterministic() {
        let mask = PasswordMask::new("*", true);
        // '*' is 42: offset = (42 * len) % 5
        assert_eq!(mask.displayed_len(1), 1 + 2);
        assert_eq!(mask.displayed_len(2), 2 + 4);
        assert_eq!(mask.displayed_len(5), 5);
        assert_eq!(mask.displayed_len(0), 0);
        assert_eq!(mask.displayed_len(3), mask.displayed_len(3));
    }

    #[test]
    fn test_hidden_length_stays_in_bounds() {
        let mask = PasswordMask::new("#%", true);
        for len in 0..CREDENTIAL_CAPACITY {
            assert!(mask.displayed_len(len) < CREDENTIAL_CAPACITY);
            assert!(mask.display(len).chars().count() < CREDENTIAL_CAPACITY);
        }
    }
}
