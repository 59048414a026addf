//! Context identity: `<project>.<build-type>+<target-type>`.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::util::InternedString;

static CONTEXT_INTERNER: LazyLock<RwLock<HashMap<ContextNameInner, &'static ContextNameInner>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

#[derive(Clone, Copy)]
pub struct ContextName {
    inner: &'static ContextNameInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextNameInner {
    project: InternedString,
    build_type: InternedString,
    target_type: InternedString,
}

impl ContextName {
    pub fn new(
        project: impl Into<InternedString>,
        build_type: impl Into<InternedString>,
        target_type: impl Into<InternedString>,
    ) -> Self {
        let inner = ContextNameInner {
            project: project.into(),
            build_type: build_type.into(),
            target_type: target_type.into(),
        };
        Self::intern(inner)
    }

    fn intern(inner: ContextNameInner) -> Self {
        {
            let interner = CONTEXT_INTERNER.read().unwrap();
            if let Some(&interned) = interner.get(&inner) {
                return ContextName { inner: interned };
            }
        }
        let mut interner = CONTEXT_INTERNER.write().unwrap();
        if let Some(&interned) = interner.get(&inner) {
            return ContextName { inner: interned };
        }
        let leaked: &'static ContextNameInner = Box::leak(Box::new(inner.clone()));
        interner.insert(inner, leaked);
        ContextName { inner: leaked }
    }

    pub fn project(&self) -> InternedString {
        self.inner.project
    }
    pub fn build_type(&self) -> InternedString {
        self.inner.build_type
    }
    pub fn target_type(&self) -> InternedString {
        self.inner.target_type
    }

    /// Parse `project.build+target`, `project.build`, `project+target`,
    /// or a bare `project` back into parts (missing segments are empty).
    pub fn parse(s: &str) -> Self {
        let (project_and_build, target_type) = match s.split_once('+') {
            Some((p, t)) => (p, t),
            None => (s, ""),
        };
        let (project, build_type) = match project_and_build.split_once('.') {
            Some((p, b)) => (p, b),
            None => (project_and_build, ""),
        };
        ContextName::new(project, build_type, target_type)
    }
}

impl PartialEq for ContextName {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}
impl Eq for ContextName {}

impl Hash for ContextName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl Ord for ContextName {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner
            .project
            .cmp(&other.inner.project)
            .then_with(|| self.inner.build_type.cmp(&other.inner.build_type))
            .then_with(|| self.inner.target_type.cmp(&other.inner.target_type))
    }
}
impl PartialOrd for ContextName {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContextName({})", self)
    }
}

impl fmt::Display for ContextName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.project)?;
        if !self.inner.build_type.is_empty() {
            write!(f, ".{}", self.inner.build_type)?;
        }
        if !self.inner.target_type.is_empty() {
            write!(f, "+{}", self.inner.target_type)?;
        }
        Ok(())
    }
}

impl Serialize for ContextName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ContextName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ContextName::parse(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_full_name() {
        let ctx = ContextName::parse("blinky.Debug+Board");
        assert_eq!(ctx.project().as_str(), "blinky");
        assert_eq!(ctx.build_type().as_str(), "Debug");
        assert_eq!(ctx.target_type().as_str(), "Board");
        assert_eq!(ctx.to_string(), "blinky.Debug+Board");
    }

    #[test]
    fn parse_handles_missing_segments() {
        let ctx = ContextName::parse("blinky");
        assert_eq!(ctx.to_string(), "blinky");

        let ctx = ContextName::parse("blinky+Board");
        assert_eq!(ctx.build_type().as_str(), "");
        assert_eq!(ctx.target_type().as_str(), "Board");
    }

    #[test]
    fn interning_gives_pointer_equal_names() {
        let a = ContextName::new("blinky", "Debug", "Board");
        let b = ContextName::new("blinky", "Debug", "Board");
        assert_eq!(a, b);
    }
}
