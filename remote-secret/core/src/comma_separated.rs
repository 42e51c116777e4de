//! An ordered set of values stored as a single comma-separated string, as
//! used for annotation values.

use std::{convert::Infallible, fmt, str::FromStr};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommaSeparated(Vec<String>);

impl CommaSeparated {
    /// Parses a comma-separated value. Empty segments are dropped.
    pub fn parse(value: &str) -> Self {
        let mut values = Self::default();
        for v in value.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            values.add(v);
        }
        values
    }

    /// Appends `value` if it is not already present.
    pub fn add(&mut self, value: &str) -> bool {
        if self.contains(value) {
            return false;
        }
        self.0.push(value.to_string());
        true
    }

    /// Removes `value`, preserving the order of the others.
    pub fn remove(&mut self, value: &str) -> bool {
        let len = self.0.len();
        self.0.retain(|v| v != value);
        self.0.len() != len
    }

    pub fn contains(&self, value: &str) -> bool {
        self.0.iter().any(|v| v == value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for CommaSeparated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl FromStr for CommaSeparated {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl<'a> FromIterator<&'a str> for CommaSeparated {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut values = Self::default();
        for v in iter {
            values.add(v);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_appends_once() {
        let mut values = CommaSeparated::parse("");
        assert!(values.add("o1"));
        assert!(values.add("o2"));
        assert!(!values.add("o1"));
        assert!(values.add("o3"));
        assert_eq!(values.to_string(), "o1,o2,o3");
    }

    #[test]
    fn parse_preserves_order_and_drops_duplicates() {
        let values = CommaSeparated::parse("b, a,,b,c");
        assert_eq!(values.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn remove_only_removes_one_value() {
        let mut values = CommaSeparated::parse("o1,o2,o3");
        assert!(values.remove("o2"));
        assert!(!values.remove("o2"));
        assert_eq!(values.to_string(), "o1,o3");
        assert!(values.contains("o1"));
        assert!(!values.contains("o2"));
    }

    #[test]
    fn empty() {
        let mut values = "o1".parse::<CommaSeparated>().unwrap();
        assert!(values.remove("o1"));
        assert!(values.is_empty());
        assert_eq!(values.to_string(), "");
    }
}
