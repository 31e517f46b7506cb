//! Volume names and the mapping from names to mountpoints.
//!
//! A volume name has the form `bucket[/subpath]`. The bucket is the unit of
//! physical mounting: every name that shares a bucket shares one mount, and the
//! subpath is just a directory nested inside it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A validated volume name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VolumeName(String);

impl VolumeName {
    pub fn parse(name: &str) -> Result<Self, VolumeNameError> {
        if name.is_empty() {
            return Err(VolumeNameError::Empty);
        }

        for (i, component) in name.split('/').enumerate() {
            match component {
                "" if i == 0 => return Err(VolumeNameError::EmptyBucket(name.to_string())),
                bucket if i == 0 && bucket.starts_with('-') => {
                    return Err(VolumeNameError::OptionLikeBucket(name.to_string()))
                }
                "" | "." | ".." => {
                    return Err(VolumeNameError::InvalidComponent {
                        name: name.to_string(),
                        component: component.to_string(),
                    })
                }
                _ => {}
            }
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bucket this volume is backed by.
    pub fn bucket(&self) -> &str {
        match self.0.split_once('/') {
            Some((bucket, _)) => bucket,
            None => &self.0,
        }
    }

    /// Path inside the bucket, if the name has one.
    pub fn subpath(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, sub)| sub)
    }
}

impl fmt::Display for VolumeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VolumeName {
    type Err = VolumeNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VolumeName {
    type Error = VolumeNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VolumeName> for String {
    fn from(name: VolumeName) -> Self {
        name.0
    }
}

impl AsRef<str> for VolumeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Maps volume names and buckets to paths under the plugin root.
///
/// Paths are never stored; every caller recomputes them from the name, so
/// `Path`, `Mount` and `Get` always agree.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mountpoint reported for a volume, including its subpath.
    pub fn mountpoint(&self, name: &VolumeName) -> PathBuf {
        self.root.join(name.as_str())
    }

    /// Directory the bucket itself is mounted on.
    pub fn bucket_mountpoint(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VolumeNameError {
    #[error("volume name is empty")]
    Empty,

    #[error("volume name {0:?} has an empty bucket")]
    EmptyBucket(String),

    #[error("volume name {name:?} contains invalid component {component:?}")]
    InvalidComponent { name: String, component: String },

    /// The bucket would be read as a flag by the mount binary.
    #[error("volume name {0:?} has a bucket starting with '-'")]
    OptionLikeBucket(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_only() {
        let name = VolumeName::parse("photos").unwrap();
        assert_eq!(name.bucket(), "photos");
        assert_eq!(name.subpath(), None);
    }

    #[test]
    fn test_bucket_with_subpath() {
        let name = VolumeName::parse("photos/2024/summer").unwrap();
        assert_eq!(name.bucket(), "photos");
        assert_eq!(name.subpath(), Some("2024/summer"));
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(VolumeName::parse(""), Err(VolumeNameError::Empty));
    }

    #[test]
    fn test_rejects_leading_slash() {
        assert!(matches!(
            VolumeName::parse("/photos"),
            Err(VolumeNameError::EmptyBucket(_))
        ));
    }

    #[test]
    fn test_rejects_traversal_and_empty_components() {
        for bad in ["..", "photos/../etc", "photos/./x", "photos//x", "photos/"] {
            assert!(
                matches!(
                    VolumeName::parse(bad),
                    Err(VolumeNameError::InvalidComponent { .. })
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_bucket_starting_with_dash() {
        for bad in ["--endpoint=http:", "-o", "--help", "-x/photos"] {
            assert!(
                matches!(
                    VolumeName::parse(bad),
                    Err(VolumeNameError::OptionLikeBucket(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }

        // only the bucket is passed to the mount binary
        let name = VolumeName::parse("photos-2024/-raw").unwrap();
        assert_eq!(name.bucket(), "photos-2024");
    }

    #[test]
    fn test_mountpoints() {
        let resolver = PathResolver::new("/var/lib/bucketvol");
        let name = VolumeName::parse("photos/2024").unwrap();

        assert_eq!(
            resolver.mountpoint(&name),
            PathBuf::from("/var/lib/bucketvol/photos/2024")
        );
        assert_eq!(
            resolver.bucket_mountpoint(name.bucket()),
            PathBuf::from("/var/lib/bucketvol/photos")
        );
    }

    #[test]
    fn test_serde_validates() {
        let name: VolumeName = serde_json::from_str("\"photos/2024\"").unwrap();
        assert_eq!(name.as_str(), "photos/2024");
        assert!(serde_json::from_str::<VolumeName>("\"../x\"").is_err());
    }
}
