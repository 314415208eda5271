//! Interned identifiers backed by a global symbol pool.
use std::cmp::Ordering;
use std::fmt;
use symbol_table::GlobalSymbol;

/// A globally interned symbol.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct GSym(GlobalSymbol);

impl GSym {
    /// Intern a string into the global symbol table.
    pub fn new(s: impl AsRef<str>) -> Self {
        GSym(GlobalSymbol::from(s.as_ref()))
    }

    /// The interned string.
    pub fn as_str(&self) -> &'static str {
        self.0.as_str()
    }
}

// Symbols order by their text so that sorted collections are stable
// across runs.
impl PartialOrd for GSym {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GSym {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for GSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for GSym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.as_str(), f)
    }
}

/// Represents an identifier in a gear program: variables, interfaces,
/// gears, helper functions and generated names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id {
    pub id: GSym,
}

impl Id {
    pub fn new<S: ToString>(id: S) -> Self {
        Self {
            id: GSym::new(id.to_string()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.id.as_str()
    }

    /// Names starting with an underscore are reserved for the compiler.
    pub fn is_generated(&self) -> bool {
        self.as_str().starts_with('_')
    }

    /// Return a new identifier `<self><suffix>`.
    pub fn suffixed(&self, suffix: &str) -> Id {
        Id::new(format!("{}{}", self.as_str(), suffix))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.id, f)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.id.as_str()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Id::new(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Id::new(s)
    }
}

impl PartialEq<str> for Id {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Id {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for Id {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A trait representing something in the IR that has a name.
pub trait GetName {
    /// Return a reference to the object's name
    fn name(&self) -> Id;
}

#[cfg(test)]
mod tests {
    use super::Id;

    #[test]
    fn interned_ids_compare_by_text() {
        let a = Id::from("acc");
        let b = Id::new(String::from("acc"));
        assert_eq!(a, b);
        assert!(Id::from("a") < Id::from("b"));
        assert_eq!(a.suffixed("_next"), "acc_next");
        assert!(Id::from("_state").is_generated());
        assert!(!a.is_generated());
    }
}
