use std::fmt;
use std::slice;

/// Dot-separated names of definitions, e.g. `checkify.model.step`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Path(Vec<PathComponent>);

// only [a-zA-Z0-9_]
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PathComponent(String);

pub fn path(components: Vec<&str>) -> Result<Path, InvalidPathComponent> {
    components.try_into()
}

/// True when `s` is a valid [`PathComponent`]. Usable in const context, see [`crate::path!`].
pub const fn is_valid_component(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return false;
    }
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if !(c.is_ascii_alphanumeric() || c == b'_') {
            return false;
        }
        i += 1;
    }
    true
}

impl Path {
    pub fn empty() -> Path {
        Path(vec![])
    }

    /// Build a path from components already validated by [`crate::path!`].
    #[doc(hidden)]
    pub fn from_static(components: &[&'static str]) -> Path {
        Path(
            components
                .iter()
                .map(|c| PathComponent(c.to_string()))
                .collect(),
        )
    }

    pub fn iter(&self) -> slice::Iter<'_, PathComponent> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn concat(&self, other: &Path) -> Path {
        let mut components = self.0.clone();
        components.extend(other.0.clone());
        Path(components)
    }

    pub fn push(&self, component: &str) -> Option<Path> {
        let mut components = self.0.clone();
        components.push(component.to_string().try_into().ok()?);
        Some(Path(components))
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Display/TryFrom instances

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid path component `{0}`: only alphanumerics and underscores are allowed")]
pub struct InvalidPathComponent(pub String);

impl TryFrom<String> for PathComponent {
    type Error = InvalidPathComponent;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if is_valid_component(&value) {
            Ok(PathComponent(value))
        } else {
            Err(InvalidPathComponent(value))
        }
    }
}

impl TryFrom<Vec<&str>> for Path {
    type Error = InvalidPathComponent;

    fn try_from(value: Vec<&str>) -> Result<Self, Self::Error> {
        let components: Result<Vec<PathComponent>, InvalidPathComponent> = value
            .into_iter()
            .map(|s| s.to_string().try_into())
            .collect();
        Ok(Path(components?))
    }
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", components.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_display_and_concat() {
        let p = path(vec!["model", "step"]).unwrap();
        assert_eq!(p.to_string(), "model.step");

        let q = crate::path!["checkify"].concat(&p);
        assert_eq!(q.to_string(), "checkify.model.step");
        assert!(q.starts_with(&crate::path!["checkify"]));
        assert!(!p.starts_with(&crate::path!["checkify"]));
    }

    #[test]
    fn test_invalid_component() {
        assert_eq!(
            path(vec!["a", "b.c"]),
            Err(InvalidPathComponent("b.c".to_string()))
        );
        assert!(path(vec![""]).is_err());
        assert!(!is_valid_component("x-y"));
        assert!(is_valid_component("x_1"));
    }
}
