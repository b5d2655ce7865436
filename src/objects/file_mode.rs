//! File modes carried by blobs and tree entries
//!
//! Matches git's entry modes. The string form is the octal git rendering
//! and participates in canonical hashing via the property map, so it must
//! never change for an existing variant.

use crate::error::{Error, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FileMode {
    Empty,
    Dir,
    #[default]
    Regular,
    Executable,
    Symlink,
    Submodule,
}

impl FileMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Empty => "0",
            FileMode::Dir => "40000",
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
            FileMode::Submodule => "160000",
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            FileMode::Empty => 0,
            FileMode::Dir => 0o40000,
            FileMode::Regular => 0o100644,
            FileMode::Executable => 0o100755,
            FileMode::Symlink => 0o120000,
            FileMode::Submodule => 0o160000,
        }
    }

    /// True for the modes a leaf blob may carry.
    pub fn is_file(&self) -> bool {
        matches!(
            self,
            FileMode::Regular | FileMode::Executable | FileMode::Symlink
        )
    }
}

impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FileMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" => Ok(FileMode::Empty),
            "40000" => Ok(FileMode::Dir),
            "100644" => Ok(FileMode::Regular),
            "100755" => Ok(FileMode::Executable),
            "120000" => Ok(FileMode::Symlink),
            "160000" => Ok(FileMode::Submodule),
            _ => Err(Error::Invalid(format!("file mode: {s}"))),
        }
    }
}

// Wire form is the octal string, the same rendering the canonical hash uses.
impl Serialize for FileMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FileMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
