//! Positional parameter syntax.

use crate::StoreError;
use std::fmt;
use std::str::FromStr;

/// The positional-parameter syntax a database expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceholderStyle {
    /// Detect from the driver name.
    #[default]
    Auto,
    /// `?` for every parameter (SQLite, MySQL).
    Question,
    /// `$1`, `$2`, ... (Postgres).
    Dollar,
}

impl PlaceholderStyle {
    /// Best-effort guess from a driver name. Unknown drivers get `Question`.
    pub fn detect(driver_name: &str) -> Self {
        let name = driver_name.to_ascii_lowercase();
        if name.contains("postgres") || name.contains("pg") {
            Self::Dollar
        } else {
            Self::Question
        }
    }

    /// Replace `Auto` with the style detected for `driver_name`.
    pub fn resolve(self, driver_name: &str) -> Self {
        match self {
            Self::Auto => Self::detect(driver_name),
            explicit => explicit,
        }
    }

    /// Comma-separated placeholder list for `n` parameters.
    pub fn placeholders(self, n: usize) -> String {
        let parts: Vec<String> = match self {
            Self::Dollar => (1..=n).map(|i| format!("${}", i)).collect(),
            Self::Question | Self::Auto => vec!["?".to_string(); n],
        };
        parts.join(", ")
    }
}

impl FromStr for PlaceholderStyle {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "question" | "?" => Ok(Self::Question),
            "dollar" | "$" => Ok(Self::Dollar),
            other => Err(StoreError::UnknownPlaceholder(other.to_string())),
        }
    }
}

impl fmt::Display for PlaceholderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Auto => "auto",
            Self::Question => "question",
            Self::Dollar => "dollar",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(PlaceholderStyle::Dollar.placeholders(3), "$1, $2, $3");
        assert_eq!(PlaceholderStyle::Question.placeholders(3), "?, ?, ?");
        assert_eq!(PlaceholderStyle::Question.placeholders(0), "");
    }

    #[test]
    fn test_detect() {
        assert_eq!(PlaceholderStyle::detect("postgres"), PlaceholderStyle::Dollar);
        assert_eq!(PlaceholderStyle::detect("PgConnection"), PlaceholderStyle::Dollar);
        assert_eq!(PlaceholderStyle::detect("sqlite"), PlaceholderStyle::Question);
        assert_eq!(PlaceholderStyle::detect("mysql"), PlaceholderStyle::Question);
    }

    #[test]
    fn test_explicit_style_wins_over_detection() {
        assert_eq!(
            PlaceholderStyle::Question.resolve("postgres"),
            PlaceholderStyle::Question
        );
        assert_eq!(PlaceholderStyle::Auto.resolve("postgres"), PlaceholderStyle::Dollar);
    }

    #[test]
    fn test_parse() {
        assert_eq!("".parse::<PlaceholderStyle>().unwrap(), PlaceholderStyle::Auto);
        assert_eq!("Dollar".parse::<PlaceholderStyle>().unwrap(), PlaceholderStyle::Dollar);
        assert_eq!("?".parse::<PlaceholderStyle>().unwrap(), PlaceholderStyle::Question);
        assert!("colon".parse::<PlaceholderStyle>().is_err());
    }
}
