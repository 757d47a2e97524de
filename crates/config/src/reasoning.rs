//! Rendering style for upstream reasoning content.

use std::fmt;
use std::str::FromStr;

/// How upstream "thinking" content is rendered into the reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReasoningMode {
    /// Strip upstream markup and prepend a thinking marker.
    #[default]
    Think,
    /// Strip upstream markup and render each line as a quote.
    Pure,
    /// Pass the buffer through wrapped in a `<details>` block.
    Raw,
}

impl FromStr for ReasoningMode {
    type Err = InvalidReasoningMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "think" => Ok(Self::Think),
            "pure" => Ok(Self::Pure),
            "raw" => Ok(Self::Raw),
            other => Err(InvalidReasoningMode(other.to_string())),
        }
    }
}

impl fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Think => f.write_str("think"),
            Self::Pure => f.write_str("pure"),
            Self::Raw => f.write_str("raw"),
        }
    }
}

/// Error returned when a reasoning mode string is not recognized.
#[derive(Debug)]
pub struct InvalidReasoningMode(String);

impl fmt::Display for InvalidReasoningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reasoning mode '{}': expected think, pure or raw", self.0)
    }
}

impl std::error::Error for InvalidReasoningMode {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_modes_case_insensitively() {
        assert_eq!("think".parse::<ReasoningMode>().unwrap(), ReasoningMode::Think);
        assert_eq!("PURE".parse::<ReasoningMode>().unwrap(), ReasoningMode::Pure);
        assert_eq!("Raw".parse::<ReasoningMode>().unwrap(), ReasoningMode::Raw);
        assert!("fancy".parse::<ReasoningMode>().is_err());
    }
}
