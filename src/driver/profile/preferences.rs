//! `user.js` preference lines.
//!
//! Firefox reads `user.js` on startup; each line is a call of the form
//! `user_pref("name", value);`.
//!
//! ```
//! use deck_capture::driver::Preference;
//!
//! let pref = Preference::new("browser.startup.page", 0).note("Blank start page");
//! assert_eq!(pref.line(), "// Blank start page\nuser_pref(\"browser.startup.page\", 0);");
//! ```

// ============================================================================
// PrefValue
// ============================================================================

/// A preference value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrefValue {
    Bool(bool),
    Int(i32),
    String(String),
}

impl PrefValue {
    /// Renders the value as a JavaScript literal.
    #[must_use]
    pub fn literal(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::String(s) => serde_json::Value::String(s.clone()).to_string(),
        }
    }
}

impl From<bool> for PrefValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for PrefValue {
    #[inline]
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PrefValue {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PrefValue {
    #[inline]
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

// ============================================================================
// Preference
// ============================================================================

/// One `user_pref` entry, optionally preceded by a comment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preference {
    pub key: String,
    pub value: PrefValue,
    pub comment: Option<String>,
}

impl Preference {
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<PrefValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            comment: None,
        }
    }

    /// Attaches a comment line.
    #[must_use]
    pub fn note(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Renders the entry as it appears in `user.js`.
    #[must_use]
    pub fn line(&self) -> String {
        let call = format!(
            "user_pref({}, {});",
            serde_json::Value::String(self.key.clone()),
            self.value.literal()
        );
        match &self.comment {
            Some(comment) => format!("// {comment}\n{call}"),
            None => call,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(PrefValue::Bool(false).literal(), "false");
        assert_eq!(PrefValue::Int(-1).literal(), "-1");
        assert_eq!(PrefValue::from("a\"b\\c").literal(), r#""a\"b\\c""#);
        assert_eq!(PrefValue::from(String::new()).literal(), "\"\"");
    }

    #[test]
    fn test_line_without_comment() {
        let pref = Preference::new("xpinstall.signatures.required", false);
        assert_eq!(pref.line(), "user_pref(\"xpinstall.signatures.required\", false);");
    }

    #[test]
    fn test_line_with_comment() {
        let pref = Preference::new("browser.download.folderList", 1).note("Downloads folder");
        let line = pref.line();
        assert!(line.starts_with("// Downloads folder\n"));
        assert!(line.ends_with("user_pref(\"browser.download.folderList\", 1);"));
    }
}
