use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use qvrag_core::Error;

/// Strategy used to divide a document into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitType {
    #[default]
    Plain,
    Markdown,
    Html,
    Json,
}

impl SplitType {
    /// Strategy for a file extension. Unknown extensions fall back to `Plain`.
    pub fn from_extension(ext: &str) -> Self {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "md" => Self::Markdown,
            "html" | "htm" => Self::Html,
            "json" => Self::Json,
            _ => Self::Plain,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Json => "json",
        }
    }
}

impl FromStr for SplitType {
    type Err = Error;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "text" | "plain" => Ok(Self::Plain),
            "markdown" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(Error::UnsupportedSplitType(other.to_string())),
        }
    }
}

impl fmt::Display for SplitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(SplitType::from_extension("txt"), SplitType::Plain);
        assert_eq!(SplitType::from_extension("md"), SplitType::Markdown);
        assert_eq!(SplitType::from_extension("html"), SplitType::Html);
        assert_eq!(SplitType::from_extension("htm"), SplitType::Html);
        assert_eq!(SplitType::from_extension("json"), SplitType::Json);
        assert_eq!(SplitType::from_extension("rst"), SplitType::Plain);
        assert_eq!(SplitType::from_extension(""), SplitType::Plain);
        assert_eq!(SplitType::from_extension(".MD"), SplitType::Markdown);
    }

    #[test]
    fn tags_parse_and_reject() {
        assert_eq!("text".parse::<SplitType>().ok(), Some(SplitType::Plain));
        assert_eq!("markdown".parse::<SplitType>().ok(), Some(SplitType::Markdown));
        assert!(matches!("xml".parse::<SplitType>(), Err(Error::UnsupportedSplitType(t)) if t == "xml"));
    }
}
