//! Pack identification - WHICH pack (vendor + name + version).
//!
//! A PackId uniquely identifies one installed pack version. It is interned
//! for cheap comparison and cloning, the same way package identity is
//! interned in dependency-resolution tooling.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::InternedString;

static PACK_INTERNER: LazyLock<RwLock<HashMap<PackIdInner, &'static PackIdInner>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// A unique identifier for a pack version (interned).
#[derive(Clone, Copy)]
pub struct PackId {
    inner: &'static PackIdInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PackIdInner {
    vendor: InternedString,
    name: InternedString,
    version: Version,
}

impl PackId {
    /// Create a new pack ID.
    pub fn new(
        vendor: impl Into<InternedString>,
        name: impl Into<InternedString>,
        version: Version,
    ) -> Self {
        let inner = PackIdInner {
            vendor: vendor.into(),
            name: name.into(),
            version,
        };
        Self::intern(inner)
    }

    fn intern(inner: PackIdInner) -> Self {
        {
            let interner = PACK_INTERNER.read().unwrap();
            if let Some(&interned) = interner.get(&inner) {
                return PackId { inner: interned };
            }
        }

        let mut interner = PACK_INTERNER.write().unwrap();
        if let Some(&interned) = interner.get(&inner) {
            return PackId { inner: interned };
        }

        let leaked: &'static PackIdInner = Box::leak(Box::new(inner.clone()));
        interner.insert(inner, leaked);
        PackId { inner: leaked }
    }

    pub fn vendor(&self) -> InternedString {
        self.inner.vendor
    }

    pub fn name(&self) -> InternedString {
        self.inner.name
    }

    pub fn version(&self) -> &Version {
        &self.inner.version
    }

    /// `Vendor::Name` without a version, as used in component-selector text.
    pub fn family(&self) -> String {
        format!("{}::{}", self.inner.vendor, self.inner.name)
    }

    /// Directory-style identity, e.g. `ARM/CMSIS/5.9.0`.
    pub fn as_path_segment(&self) -> String {
        format!("{}/{}/{}", self.inner.vendor, self.inner.name, self.inner.version)
    }
}

impl PartialEq for PackId {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for PackId {}

impl Hash for PackId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl PartialOrd for PackId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner
            .vendor
            .cmp(&other.inner.vendor)
            .then_with(|| self.inner.name.cmp(&other.inner.name))
            .then_with(|| self.inner.version.cmp(&other.inner.version))
    }
}

impl fmt::Debug for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackId")
            .field("vendor", &self.inner.vendor.as_str())
            .field("name", &self.inner.name.as_str())
            .field("version", &self.inner.version)
            .finish()
    }
}

impl fmt::Display for PackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}@{}",
            self.inner.vendor, self.inner.name, self.inner.version
        )
    }
}

impl Serialize for PackId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(Serialize)]
        struct PackIdData<'a> {
            vendor: &'a str,
            name: &'a str,
            version: String,
        }

        let data = PackIdData {
            vendor: self.inner.vendor.as_str(),
            name: self.inner.name.as_str(),
            version: self.inner.version.to_string(),
        };
        data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PackId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct PackIdData {
            vendor: String,
            name: String,
            version: String,
        }

        let data = PackIdData::deserialize(deserializer)?;
        let version = data.version.parse().map_err(serde::de::Error::custom)?;
        Ok(PackId::new(data.vendor, data.name, version))
    }
}
