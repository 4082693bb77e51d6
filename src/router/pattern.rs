//! Route template compilation.
//!
//! A template is literal text with `{name}` placeholders, e.g.
//! `/register/{id}`. Compilation produces an anchored [`Regex`] in which every
//! placeholder captures one or more non-`/` characters and every literal
//! character is escaped, so `/v1.0/files` only matches a literal dot.

use std::sync::LazyLock;

use regex::Regex;

// `[A-Za-z_][A-Za-z0-9_-]*` inside braces.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_-]*)\}").expect("placeholder regex is valid")
});

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    placeholders: Vec<String>,
}

impl Pattern {
    /// Compile `template` into an anchored pattern.
    ///
    /// # Errors
    ///
    /// Returns the [`regex::Error`] if the generated expression is rejected,
    /// which in practice only happens for templates exceeding the regex size limit.
    ///
    /// # Examples
    ///
    /// ```
    /// use signpost::router::Pattern;
    ///
    /// let pattern = Pattern::compile("/users/{id}/posts/{post_id}").unwrap();
    /// assert_eq!(pattern.as_str(), "^/users/([^/]+)/posts/([^/]+)$");
    /// assert_eq!(pattern.placeholders(), ["id", "post_id"]);
    /// ```
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(template.len() + 16);
        let mut placeholders = Vec::new();
        let mut last = 0;

        source.push('^');
        for caps in PLACEHOLDER.captures_iter(template) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            source.push_str(&regex::escape(&template[last..token.start()]));
            source.push_str("([^/]+)");
            placeholders.push(name.as_str().to_owned());
            last = token.end();
        }
        source.push_str(&regex::escape(&template[last..]));
        source.push('$');

        Ok(Self {
            regex: Regex::new(&source)?,
            placeholders,
        })
    }

    /// The generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Placeholder names in order of appearance.
    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    /// Match the whole of `path`, returning the raw capture for each
    /// placeholder in order. Missing captures come back as empty strings.
    pub fn captures<'p>(&self, path: &'p str) -> Option<Vec<&'p str>> {
        let caps = self.regex.captures(path)?;
        Some(
            (1..=self.placeholders.len())
                .map(|i| caps.get(i).map_or("", |m| m.as_str()))
                .collect(),
        )
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}
