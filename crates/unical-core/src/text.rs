//! Case-insensitive keyword matching shared by the store and search engine.

/// A lowercased keyword ready to be matched against many fields.
///
/// An empty keyword matches everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword(String);

impl Keyword {
    /// Prepares `raw` for matching. Surrounding whitespace is ignored.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Returns true if the keyword is empty and therefore matches anything.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if `haystack` contains the keyword, ignoring case.
    pub fn matches(&self, haystack: &str) -> bool {
        self.is_empty() || haystack.to_lowercase().contains(&self.0)
    }

    /// Returns true if any of `fields` contains the keyword.
    pub fn matches_any<'a, I>(&self, fields: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.is_empty() || fields.into_iter().any(|field| self.matches(field))
    }
}
