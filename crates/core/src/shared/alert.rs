use std::fmt;

/// User-facing alert derived from the most recent detection count.
///
/// Recomputed from scratch on every completed inference; never accumulated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertState {
    /// Exactly one face: nothing to report.
    #[default]
    Clear,
    NoFace,
    MultipleFaces(usize),
}

impl AlertState {
    pub fn from_count(count: usize) -> Self {
        match count {
            0 => AlertState::NoFace,
            1 => AlertState::Clear,
            n => AlertState::MultipleFaces(n),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, AlertState::Clear)
    }

    /// The alert line as shown to the user; empty when there is no alert.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::Clear => Ok(()),
            AlertState::NoFace => write!(f, "no face detected"),
            AlertState::MultipleFaces(n) => write!(f, "multiple faces detected: {n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::none(0, "no face detected")]
    #[case::one(1, "")]
    #[case::two(2, "multiple faces detected: 2")]
    #[case::three(3, "multiple faces detected: 3")]
    #[case::many(250, "multiple faces detected: 250")]
    fn test_message_for_count(#[case] count: usize, #[case] expected: &str) {
        assert_eq!(AlertState::from_count(count).message(), expected);
    }

    #[test]
    fn test_buckets_hold_for_every_count_up_to_a_thousand() {
        for n in 0..1000usize {
            let alert = AlertState::from_count(n);
            match n {
                0 => assert_eq!(alert, AlertState::NoFace),
                1 => assert_eq!(alert, AlertState::Clear),
                _ => assert_eq!(alert.message(), format!("multiple faces detected: {n}")),
            }
        }
    }

    #[test]
    fn test_is_active() {
        assert!(!AlertState::Clear.is_active());
        assert!(AlertState::NoFace.is_active());
        assert!(AlertState::MultipleFaces(2).is_active());
    }

    #[test]
    fn test_default_is_clear() {
        assert_eq!(AlertState::default(), AlertState::Clear);
    }
}
