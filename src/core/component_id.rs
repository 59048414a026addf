//! Component identification - the 7-attribute Cvendor/Cclass/Cbundle/Cgroup/
//! Csub/Cvariant/Cversion tuple that names one catalog entry.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::util::InternedString;

static COMPONENT_INTERNER: LazyLock<RwLock<HashMap<ComponentIdInner, &'static ComponentIdInner>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// The 7-attribute identity of a component catalog entry.
///
/// `Cbundle`/`Csub`/`Cvariant` are optional per the component model; an
/// absent attribute participates in equality/ordering as the empty string,
/// matching how an omitted attribute matches "don't care" during selector
/// resolution (handled one level up, in `components::solver`).
#[derive(Clone, Copy)]
pub struct ComponentId {
    inner: &'static ComponentIdInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ComponentIdInner {
    cvendor: InternedString,
    cclass: InternedString,
    cbundle: InternedString,
    cgroup: InternedString,
    csub: InternedString,
    cvariant: InternedString,
    cversion: Version,
}

/// Builder-style attributes, mirroring the YAML component-selector keys.
#[derive(Debug, Clone, Default)]
pub struct ComponentAttributes {
    pub cvendor: Option<String>,
    pub cclass: String,
    pub cbundle: Option<String>,
    pub cgroup: String,
    pub csub: Option<String>,
    pub cvariant: Option<String>,
    pub cversion: Version,
}

impl ComponentId {
    pub fn new(attrs: ComponentAttributes) -> Self {
        let inner = ComponentIdInner {
            cvendor: attrs.cvendor.unwrap_or_default().into(),
            cclass: attrs.cclass.into(),
            cbundle: attrs.cbundle.unwrap_or_default().into(),
            cgroup: attrs.cgroup.into(),
            csub: attrs.csub.unwrap_or_default().into(),
            cvariant: attrs.cvariant.unwrap_or_default().into(),
            cversion: attrs.cversion,
        };
        Self::intern(inner)
    }

    fn intern(inner: ComponentIdInner) -> Self {
        {
            let interner = COMPONENT_INTERNER.read().unwrap();
            if let Some(&interned) = interner.get(&inner) {
                return ComponentId { inner: interned };
            }
        }
        let mut interner = COMPONENT_INTERNER.write().unwrap();
        if let Some(&interned) = interner.get(&inner) {
            return ComponentId { inner: interned };
        }
        let leaked: &'static ComponentIdInner = Box::leak(Box::new(inner.clone()));
        interner.insert(inner, leaked);
        ComponentId { inner: leaked }
    }

    pub fn cvendor(&self) -> InternedString {
        self.inner.cvendor
    }
    pub fn cclass(&self) -> InternedString {
        self.inner.cclass
    }
    pub fn cbundle(&self) -> InternedString {
        self.inner.cbundle
    }
    pub fn cgroup(&self) -> InternedString {
        self.inner.cgroup
    }
    pub fn csub(&self) -> InternedString {
        self.inner.csub
    }
    pub fn cvariant(&self) -> InternedString {
        self.inner.cvariant
    }
    pub fn cversion(&self) -> &Version {
        &self.inner.cversion
    }

    /// The bundle scope key: `(Cclass, Cbundle)`. Two components share a
    /// bundle constraint only when both fields match exactly.
    pub fn bundle_key(&self) -> (InternedString, InternedString) {
        (self.inner.cclass, self.inner.cbundle)
    }
}

impl PartialEq for ComponentId {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}
impl Eq for ComponentId {}

impl Hash for ComponentId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentId")
            .field("cvendor", &self.inner.cvendor.as_str())
            .field("cclass", &self.inner.cclass.as_str())
            .field("cbundle", &self.inner.cbundle.as_str())
            .field("cgroup", &self.inner.cgroup.as_str())
            .field("csub", &self.inner.csub.as_str())
            .field("cvariant", &self.inner.cvariant.as_str())
            .field("cversion", &self.inner.cversion)
            .finish()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cvendor::Cclass&Cbundle:Cgroup:Csub&Cvariant@Cversion, omitting
        // optional attributes, matching the selector string syntax.
        if !self.inner.cvendor.is_empty() {
            write!(f, "{}::", self.inner.cvendor)?;
        }
        write!(f, "{}", self.inner.cclass)?;
        if !self.inner.cbundle.is_empty() {
            write!(f, "&{}", self.inner.cbundle)?;
        }
        write!(f, ":{}", self.inner.cgroup)?;
        if !self.inner.csub.is_empty() {
            write!(f, ":{}", self.inner.csub)?;
        }
        if !self.inner.cvariant.is_empty() {
            write!(f, "&{}", self.inner.cvariant)?;
        }
        write!(f, "@{}", self.inner.cversion)
    }
}

impl Serialize for ComponentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ComponentId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Lock-file round trip only needs Display/Debug fidelity for
        // human readability; structured (de)serialization goes through
        // `ComponentAttributes` at the loader boundary instead.
        let s = String::deserialize(deserializer)?;
        Err(serde::de::Error::custom(format!(
            "ComponentId cannot be parsed back from its display form: {s}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> ComponentAttributes {
        ComponentAttributes {
            cvendor: Some("ARM".into()),
            cclass: "CMSIS".into(),
            cbundle: None,
            cgroup: "CORE".into(),
            csub: None,
            cvariant: None,
            cversion: Version::new(5, 6, 0),
        }
    }

    #[test]
    fn interning_gives_pointer_equal_ids() {
        let a = ComponentId::new(attrs());
        let b = ComponentId::new(attrs());
        assert_eq!(a, b);
    }

    #[test]
    fn display_omits_absent_optional_attributes() {
        let id = ComponentId::new(attrs());
        assert_eq!(id.to_string(), "ARM::CMSIS:CORE@5.6.0");
    }

    #[test]
    fn bundle_key_is_class_and_bundle_only() {
        let mut a = attrs();
        a.cbundle = Some("Keil RTX5".into());
        let id = ComponentId::new(a);
        let (class, bundle) = id.bundle_key();
        assert_eq!(class.as_str(), "CMSIS");
        assert_eq!(bundle.as_str(), "Keil RTX5");
    }
}
