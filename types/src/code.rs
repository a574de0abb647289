//! Product and strip identifiers.
//!
//! Both factors of a package carry a short alphanumeric code. Codes arrive from
//! the image decoder as raw strings; they are trimmed, upper-cased and checked
//! against a [`CodeFormat`] before they are allowed anywhere near the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CodeFormatError;

/// Longest code accepted in [`CodeFormat::Permissive`] mode.
pub const MAX_CODE_LEN: usize = 64;

/// Length of a PAN-layout code (`AAAA12345Z`).
pub const PAN_CODE_LEN: usize = 10;

/// Which identifier shapes the ledger accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeFormat {
    /// 1 to 64 ASCII alphanumerics, `-` or `_`.
    #[default]
    Permissive,
    /// Exactly 4 letters, 5 digits and 1 letter, the layout used by the
    /// manufacturer's code generator.
    Pan,
}

impl CodeFormat {
    /// Normalise and validate a raw decoded string.
    pub fn normalize(self, raw: &str) -> Result<String, CodeFormatError> {
        let code = raw.trim();
        if code.is_empty() {
            return Err(CodeFormatError::Empty);
        }
        if code.contains('?') {
            return Err(CodeFormatError::Undecoded);
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(CodeFormatError::InvalidCharacter(bad));
        }
        let code = code.to_ascii_uppercase();

        match self {
            Self::Permissive => {
                if code.len() > MAX_CODE_LEN {
                    return Err(CodeFormatError::TooLong {
                        len: code.len(),
                        max: MAX_CODE_LEN,
                    });
                }
            }
            Self::Pan => {
                if !is_pan_layout(&code) {
                    return Err(CodeFormatError::Layout(code));
                }
            }
        }
        Ok(code)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Permissive => "permissive",
            Self::Pan => "pan",
        }
    }
}

impl std::str::FromStr for CodeFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "pan" => Ok(Self::Pan),
            other => Err(format!("unknown code format '{other}', expected permissive or pan")),
        }
    }
}

fn is_pan_layout(code: &str) -> bool {
    let b = code.as_bytes();
    b.len() == PAN_CODE_LEN
        && b[..4].iter().all(u8::is_ascii_uppercase)
        && b[4..9].iter().all(u8::is_ascii_digit)
        && b[9].is_ascii_uppercase()
}

/// The identifier printed in the outer QR code.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(String);

/// The identifier hidden inside the package, bound to exactly one [`ProductId`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StripCode(String);

macro_rules! code_newtype {
    ($name:ident) => {
        impl $name {
            /// Parse a raw decoded string under the given format.
            pub fn parse(raw: &str, format: CodeFormat) -> Result<Self, CodeFormatError> {
                format.normalize(raw).map(Self)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn as_bytes(&self) -> &[u8] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

code_newtype!(ProductId);
code_newtype!(StripCode);
