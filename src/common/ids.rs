//! Identifier types for conversations, folders and tags.
//!
//! Conversation ids arrive from URL paths and name files on disk, so they are
//! validated on construction. Folder and tag ids are opaque strings minted as
//! UUID v4 by the server.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Errors returned when parsing/validating a [`ConversationId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIdError {
    /// Empty (or whitespace-only) identifier.
    Empty,
    /// Exceeds the maximum accepted length.
    TooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length received.
        got: usize,
    },
    /// Contains a disallowed character.
    InvalidChar {
        /// The invalid character.
        ch: char,
        /// The index where it was found.
        index: usize,
    },
    /// Starts with a dot (hidden file or relative path component).
    LeadingDot,
}

impl fmt::Display for ConversationIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "conversation id must not be empty"),
            Self::TooLong { max, got } => {
                write!(f, "conversation id too long: got {got}, max {max}")
            }
            Self::InvalidChar { ch, index } => write!(
                f,
                "conversation id contains invalid character {ch:?} at index {index}"
            ),
            Self::LeadingDot => write!(f, "conversation id must not start with '.'"),
        }
    }
}

impl std::error::Error for ConversationIdError {}

/// Identifier of a conversation; also the stem of its JSON file.
///
/// Rules:
/// - Non-empty after trimming.
/// - At most [`ConversationId::MAX_LEN`] bytes.
/// - ASCII `[A-Za-z0-9._-]`, not starting with `.`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ConversationId(String);

impl ConversationId {
    /// Hard ceiling to keep file names sane.
    pub const MAX_LEN: usize = 128;

    /// Build a validated `ConversationId`.
    ///
    /// # Errors
    /// Returns `ConversationIdError` if the input is empty, too long, starts with
    /// a dot, or contains characters outside the accepted set.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ConversationIdError> {
        let s = raw.as_ref().trim();

        if s.is_empty() {
            return Err(ConversationIdError::Empty);
        }
        if s.len() > Self::MAX_LEN {
            return Err(ConversationIdError::TooLong {
                max: Self::MAX_LEN,
                got: s.len(),
            });
        }
        if s.starts_with('.') {
            return Err(ConversationIdError::LeadingDot);
        }

        for (i, ch) in s.chars().enumerate() {
            let ok = ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-');
            if !ok {
                return Err(ConversationIdError::InvalidChar { ch, index: i });
            }
        }

        Ok(Self(s.to_owned()))
    }

    /// Mint a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow as `&str`.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationId {
    type Err = ConversationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ConversationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ConversationId> for String {
    fn from(value: ConversationId) -> Self {
        value.0
    }
}

impl TryFrom<String> for ConversationId {
    type Error = ConversationIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Declare an opaque string id minted as UUID v4.
macro_rules! define_opaque_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[repr(transparent)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            /// Borrow as `&str`.
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }
    };
}

define_opaque_id!(
    /// Identifier of a conversation folder.
    FolderId
);

define_opaque_id!(
    /// Identifier of a conversation tag.
    TagId
);

impl FolderId {
    /// Fixed id of the folder created at startup.
    pub const DEFAULT: &'static str = "default";

    /// The id of the default folder.
    #[must_use]
    pub fn default_folder() -> Self {
        Self(Self::DEFAULT.to_owned())
    }
}
