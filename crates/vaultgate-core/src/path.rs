//! Canonicalised virtual paths exposed by the gateway.
//!
//! `VaultPath` is the only path type the proxy, metadata store and share
//! codec operate on. Construction normalises away the quirks clients send:
//! leading slashes, `.` components, empty components from repeated
//! separators.

use relative_path::{RelativePath, RelativePathBuf};
use std::fmt;

/// A canonicalised, absolute virtual path within a vault.
///
/// Internally backed by [`RelativePathBuf`], which already collapses `.`
/// components and repeated separators; `VaultPath` adds the always-absolute
/// display form and the vault-specific operations (prefix-aware rename
/// matching, ancestor walks) the rest of the crate needs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VaultPath(RelativePathBuf);

impl VaultPath {
    /// The root path.
    #[inline]
    pub fn root() -> Self {
        VaultPath(RelativePathBuf::new())
    }

    /// Canonicalise and construct a path from a client-supplied string.
    pub fn new(path: impl AsRef<str>) -> Self {
        let s = path.as_ref().trim_start_matches('/');
        VaultPath(RelativePathBuf::from(s))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.as_str().is_empty()
    }

    /// Canonical form without the leading slash, e.g. `"a/b.txt"`.
    #[inline]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[inline]
    pub fn as_relative_path(&self) -> &RelativePath {
        &self.0
    }

    pub fn join(&self, component: impl AsRef<str>) -> Self {
        VaultPath(self.0.join(component.as_ref()))
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<VaultPath> {
        self.0.parent().map(|p| VaultPath(p.to_relative_path_buf()))
    }

    /// Final path component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.components().map(|c| c.as_str())
    }

    /// All strict-prefix ancestor directories, root-to-leaf, excluding `self`.
    pub fn ancestors(&self) -> Vec<VaultPath> {
        let mut out = Vec::new();
        let mut cur = self.parent();
        while let Some(p) = cur {
            cur = p.parent();
            out.push(p);
        }
        out.reverse();
        out
    }

    /// Whether `self` is `other`, or lies under `other` as a subtree member
    /// (`other == self` or `self` starts with `other + "/"`).
    ///
    /// Boundary-aware: `/foo` is not considered an ancestor of `/foobar`.
    pub fn is_or_is_under(&self, other: &VaultPath) -> bool {
        if self == other {
            return true;
        }
        if other.is_root() {
            return !self.is_root();
        }
        let prefix = other.as_str();
        self.as_str()
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Rewrite the `old` prefix of `self` to `new`, assuming
    /// `self.is_or_is_under(old)`.
    pub fn substitute_prefix(&self, old: &VaultPath, new: &VaultPath) -> VaultPath {
        if self == old {
            return new.clone();
        }
        let rest = self.as_str().strip_prefix(old.as_str()).unwrap_or(self.as_str());
        let rest = rest.trim_start_matches('/');
        new.join(rest)
    }
}

impl AsRef<str> for VaultPath {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for VaultPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0)
        }
    }
}

impl From<&str> for VaultPath {
    fn from(s: &str) -> Self {
        VaultPath::new(s)
    }
}

impl From<String> for VaultPath {
    fn from(s: String) -> Self {
        VaultPath::new(s)
    }
}

impl From<VaultPath> for String {
    fn from(p: VaultPath) -> String {
        p.to_string()
    }
}
