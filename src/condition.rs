// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Severity of write stalling.
///
/// Conditions form a total order (`Normal` < `Delayed` < `Stopped`),
/// which is used to reduce multiple causes to a single aggregate
/// condition per scope (the most severe one wins).
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum WriteStallCondition {
    /// Writes are admitted normally
    #[default]
    Normal,

    /// Writes are throttled, but still admitted
    Delayed,

    /// Writes are blocked until background work has caught up
    Stopped,
}

impl WriteStallCondition {
    /// Returns the stable hyphenated token for this condition.
    ///
    /// `Normal` has no token of its own (it never appears in a stats key)
    /// and maps to `"invalid"`.
    #[must_use]
    pub fn as_hyphen_str(self) -> &'static str {
        match self {
            Self::Delayed => "delays",
            Self::Stopped => "stops",
            Self::Normal => crate::stat_name::INVALID,
        }
    }

    pub(crate) fn from_u8(n: u8) -> Self {
        match n {
            1 => Self::Delayed,
            2 => Self::Stopped,
            _ => Self::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn condition_severity_order() {
        assert!(WriteStallCondition::Normal < WriteStallCondition::Delayed);
        assert!(WriteStallCondition::Delayed < WriteStallCondition::Stopped);

        assert_eq!(
            WriteStallCondition::Stopped,
            WriteStallCondition::Delayed.max(WriteStallCondition::Stopped),
        );
        assert_eq!(
            WriteStallCondition::Delayed,
            WriteStallCondition::Normal.max(WriteStallCondition::Delayed),
        );
    }

    #[test]
    fn condition_labels() {
        assert_eq!("delays", WriteStallCondition::Delayed.as_hyphen_str());
        assert_eq!("stops", WriteStallCondition::Stopped.as_hyphen_str());
        assert_eq!("invalid", WriteStallCondition::Normal.as_hyphen_str());
    }

    #[test]
    fn condition_from_u8() {
        assert_eq!(
            WriteStallCondition::Normal,
            WriteStallCondition::from_u8(0)
        );
        assert_eq!(
            WriteStallCondition::Delayed,
            WriteStallCondition::from_u8(1)
        );
        assert_eq!(
            WriteStallCondition::Stopped,
            WriteStallCondition::from_u8(2)
        );
    }
}
