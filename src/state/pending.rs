//! Secondary work kinds attached to stored responses and renderer output

use std::fmt;

/// Kind of analysis still owed to a stored response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingKind {
    /// Mine the response body for links and forms
    Spider,

    /// Hand the response to the renderer for dynamic analysis
    Render,
}

impl PendingKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Spider => "spider",
            Self::Render => "render",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "spider" => Some(Self::Spider),
            "render" => Some(Self::Render),
            _ => None,
        }
    }
}

impl fmt::Display for PendingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Status of a pending response row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingStatus {
    Pending,
    Complete,
}

impl PendingStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }
}

/// Kind of deferred renderer discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalysisKind {
    /// A single absolute link
    Url,

    /// An HTML fragment that still needs extraction
    Html,

    /// The id of a response the renderer captured into the response store
    ResponseRef,
}

impl AnalysisKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Html => "html",
            Self::ResponseRef => "response_ref",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "url" => Some(Self::Url),
            "html" => Some(Self::Html),
            "response_ref" => Some(Self::ResponseRef),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
