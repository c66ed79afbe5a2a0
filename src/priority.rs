use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling priority for workflows in production and in the approval queue.
/// Higher variants sort first in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low = 1,
    #[serde(alias = "MEDIUM")]
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Get the numeric priority value
    pub fn value(self) -> u32 {
        self as u32
    }

    /// Weight used when estimating backlog pressure
    pub fn weight(self) -> u32 {
        match self {
            Priority::Critical => 1000,
            Priority::High => 100,
            Priority::Normal => 10,
            Priority::Low => 1,
        }
    }

    /// Parse a user supplied label, accepting MEDIUM as a synonym for NORMAL
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Priority::Critical),
            "HIGH" => Some(Priority::High),
            "NORMAL" | "MEDIUM" => Some(Priority::Normal),
            "LOW" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Critical => "CRITICAL",
            Priority::High => "HIGH",
            Priority::Normal => "NORMAL",
            Priority::Low => "LOW",
        };
        write!(f, "{}", label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_from_label() {
        assert_eq!(Priority::from_label("critical"), Some(Priority::Critical));
        assert_eq!(Priority::from_label("HIGH"), Some(Priority::High));
        assert_eq!(Priority::from_label("medium"), Some(Priority::Normal));
        assert_eq!(Priority::from_label(" normal "), Some(Priority::Normal));
        assert_eq!(Priority::from_label("low"), Some(Priority::Low));
        assert_eq!(Priority::from_label("urgent"), None);
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_priority_weights() {
        assert_eq!(Priority::Critical.weight(), 1000);
        assert_eq!(Priority::High.weight(), 100);
        assert_eq!(Priority::Normal.weight(), 10);
        assert_eq!(Priority::Low.weight(), 1);
    }

    #[test]
    fn test_priority_serde_accepts_medium() {
        let parsed: Priority = serde_json::from_str("\"MEDIUM\"").unwrap();
        assert_eq!(parsed, Priority::Normal);
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"HIGH\"");
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::Critical.to_string(), "CRITICAL");
        assert_eq!(Priority::Normal.to_string(), "NORMAL");
    }
}
