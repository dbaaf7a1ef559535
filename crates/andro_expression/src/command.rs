//! Command interpreter
//!
//! Keyword matching over lowercased free text from voice, typed input, the
//! controls surface or a remote dashboard. The table is ordered and the first
//! match wins, so "sleep" beats "night" in "sleep, it's night".

use andro_core::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Wake,
    Sleep,
    SetMode(Mode),
    BatteryStatus,
    Feed,
    Mute,
}

const KEYWORDS: &[(&[&str], Intent)] = &[
    (&["hey emo", "wake"], Intent::Wake),
    (&["sleep"], Intent::Sleep),
    (&["chill"], Intent::SetMode(Mode::Chill)),
    (&["focus"], Intent::SetMode(Mode::Focus)),
    (&["night"], Intent::SetMode(Mode::Night)),
    (&["battery"], Intent::BatteryStatus),
    (&["feed"], Intent::Feed),
    (&["mute"], Intent::Mute),
];

/// Trimmed, lowercased command text.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Map already-normalized text to an intent.
pub fn interpret(cmd: &str) -> Option<Intent> {
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| cmd.contains(w)))
        .map(|(_, intent)| *intent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_keywords() {
        assert_eq!(interpret("hey emo"), Some(Intent::Wake));
        assert_eq!(interpret("wake up please"), Some(Intent::Wake));
        assert_eq!(interpret("go to sleep"), Some(Intent::Sleep));
        assert_eq!(interpret("night"), Some(Intent::SetMode(Mode::Night)));
        assert_eq!(interpret("how is your battery"), Some(Intent::BatteryStatus));
        assert_eq!(interpret("feed"), Some(Intent::Feed));
        assert_eq!(interpret("mute"), Some(Intent::Mute));
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(interpret("sleep, it's night"), Some(Intent::Sleep));
        assert_eq!(interpret("wake and focus"), Some(Intent::Wake));
        assert_eq!(interpret("chill focus"), Some(Intent::SetMode(Mode::Chill)));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(interpret("tell me a joke"), None);
        assert_eq!(interpret(""), None);
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Hey EMO  "), "hey emo");
        assert_eq!(interpret(&normalize("FOCUS")), Some(Intent::SetMode(Mode::Focus)));
    }
}
