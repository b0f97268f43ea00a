//! Localized prompt templates.
//!
//! Templates are compiled in as a static registry of
//! `(language, group) -> [(key, template)]`. A [`TemplateEngine`] holds the
//! selected language for one request and resolves keys with a per-group
//! fallback: when the selected language lacks a group entirely, the group
//! is taken from the default language instead.
//!
//! Placeholders use `$name` / `${name}` syntax; `$$` is a literal dollar.

mod locales;

use tracing::debug;

use crate::error::{RagError, Result};

/// Every template of one group in one language.
#[derive(Debug)]
pub struct LocaleGroup {
    pub language: &'static str,
    pub group: &'static str,
    pub templates: &'static [(&'static str, &'static str)],
}

/// Templates shipped with ragline (`en`, `ar`).
pub static BUILTIN: &[LocaleGroup] = &[locales::en::RAG, locales::ar::RAG];

/// Instance-scoped template resolver.
///
/// Cloning is cheap; use [`with_language`](TemplateEngine::with_language)
/// to derive a per-request engine without touching a shared one.
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    registry: &'static [LocaleGroup],
    language: String,
    default_language: String,
}

impl TemplateEngine {
    /// Engine over the built-in registry.
    pub fn new(language: Option<&str>, default_language: &str) -> Self {
        Self::with_registry(BUILTIN, language, default_language)
    }

    pub fn with_registry(
        registry: &'static [LocaleGroup],
        language: Option<&str>,
        default_language: &str,
    ) -> Self {
        let mut engine = Self {
            registry,
            language: default_language.to_string(),
            default_language: default_language.to_string(),
        };
        engine.select_language(language);
        engine
    }

    /// Currently selected language.
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    /// Select `language`, falling back silently to the default language
    /// when it is absent, empty, or unknown to the registry.
    pub fn select_language(&mut self, language: Option<&str>) {
        self.language = match language.map(str::trim) {
            Some(lang) if !lang.is_empty() && self.has_language(lang) => lang.to_string(),
            requested => {
                if let Some(lang) = requested.filter(|l| !l.is_empty()) {
                    debug!(
                        requested = lang,
                        fallback = %self.default_language,
                        "template language not available, using default"
                    );
                }
                self.default_language.clone()
            }
        };
    }

    /// A copy of this engine with `language` selected.
    pub fn with_language(&self, language: Option<&str>) -> Self {
        let mut engine = self.clone();
        engine.select_language(language);
        engine
    }

    /// Resolve `group.key` and substitute `vars`.
    ///
    /// Fails with `RagError::Lookup` when the group or key is undefined in
    /// both the selected and the default language, or when the template
    /// references a variable missing from `vars`.
    pub fn get(&self, group: &str, key: &str, vars: &[(&str, &str)]) -> Result<String> {
        let locale = self
            .find_group(&self.language, group)
            .or_else(|| {
                debug!(
                    group,
                    language = %self.language,
                    "template group missing, using default language"
                );
                self.find_group(&self.default_language, group)
            })
            .ok_or_else(|| RagError::Lookup(format!("template group '{}'", group)))?;

        let template = locale
            .templates
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, t)| *t)
            .ok_or_else(|| {
                RagError::Lookup(format!(
                    "template '{}.{}' ({})",
                    group, key, locale.language
                ))
            })?;

        substitute(template, vars)
    }

    fn has_language(&self, language: &str) -> bool {
        self.registry.iter().any(|g| g.language == language)
    }

    fn find_group(&self, language: &str, group: &str) -> Option<&'static LocaleGroup> {
        self.registry
            .iter()
            .find(|g| g.language == language && g.group == group)
    }
}

/// Substitute `$name`, `${name}` and `$$` in `template`.
pub fn substitute(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let lookup = |name: &str| {
        vars.iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| RagError::Lookup(format!("template variable '{}'", name)))
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            out.push('$');
            rest = stripped;
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| {
                RagError::Lookup("unterminated '${' placeholder".to_string())
            })?;
            let name = &braced[..end];
            if !is_identifier(name) {
                return Err(RagError::Lookup(format!("invalid placeholder '${{{}}}'", name)));
            }
            out.push_str(lookup(name)?);
            rest = &braced[end + 1..];
        } else {
            let len = identifier_len(after);
            if len == 0 {
                return Err(RagError::Lookup(format!(
                    "invalid placeholder at byte {}",
                    template.len() - rest.len() + pos
                )));
            }
            out.push_str(lookup(&after[..len])?);
            rest = &after[len..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit());
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && identifier_len(s) == s.len()
}
