//! Ordered header fields shared by requests and responses.
//!
//! # Design Decisions
//! - Values are stored exactly as they appeared after the colon, leading
//!   whitespace included, so a parsed head encodes back byte-for-byte
//! - Every parsed line is kept in order, repeated names included
//!   (`Set-Cookie`, `Vary`, `Link`)
//! - Name lookup is ASCII case-insensitive; [`Headers::insert`] replaces the
//!   first field with that name in place and drops any repeats

/// Header fields as `(name, raw value)` pairs, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one header line, splitting on the first colon, and append it.
    ///
    /// Lines without a colon produce no field and return `false`.
    pub(crate) fn insert_line(&mut self, line: &str) -> bool {
        match line.split_once(':') {
            Some((name, value)) => {
                self.append(name, value);
                true
            }
            None => false,
        }
    }

    /// Add a field after the existing ones, even if the name is already present.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Set a header to a single value.
    ///
    /// The first field with this name keeps its position and spelling and
    /// takes the new value; later fields with the same name are removed.
    /// The value is stored verbatim; callers that want the conventional
    /// `Name: value` spacing include the leading space themselves.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(index) => {
                self.fields[index].1 = value;
                let mut seen = 0;
                self.fields.retain(|(key, _)| {
                    if !key.eq_ignore_ascii_case(&name) {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.fields.push((name, value)),
        }
    }

    /// Raw value of the first field named `name`, leading whitespace included.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|index| self.fields[index].1.as_str())
    }

    /// Raw values of every field named `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Remove every field named `name`, returning the first value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.position(name)?;
        let (_, first) = self.fields.remove(index);
        self.fields.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        Some(first)
    }

    /// Number of fields, repeats counted.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate `(name, raw value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}
