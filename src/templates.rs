//! Instruction templates keyed by request type.
//!
//! The template text is the operator's proprietary payload: it is prepended
//! as the system role on every upstream call and never appears in a
//! tenant-facing response. Unknown request types fall back to a designated
//! default template.

use std::collections::BTreeMap;

const DEFAULT_KEY: &str = "general";

const DEFAULT_TEMPLATE: &str = "You are an assistant producing clear, professionally \
formatted reports from the notes provided. Answer in the language of the input.";

/// Request-type keyed store of opaque system instruction text.
#[derive(Clone, Debug)]
pub struct InstructionTemplates {
    templates: BTreeMap<String, String>,
    default_key: String,
}

impl Default for InstructionTemplates {
    fn default() -> Self {
        let mut templates = BTreeMap::new();
        templates.insert(DEFAULT_KEY.to_string(), DEFAULT_TEMPLATE.to_string());
        Self {
            templates,
            default_key: DEFAULT_KEY.to_string(),
        }
    }
}

impl InstructionTemplates {
    /// Register (or replace) the template for a request type.
    pub fn with_template(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.templates.insert(key.into(), text.into());
        self
    }

    /// Designate the fallback template for unknown request types.
    ///
    /// The key must already be registered; unknown keys leave the current
    /// default in place.
    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if self.templates.contains_key(&key) {
            self.default_key = key;
        }
        self
    }

    /// Instruction text for a request type, falling back to the default.
    pub fn resolve(&self, request_type: &str) -> &str {
        self.templates
            .get(request_type)
            .or_else(|| self.templates.get(&self.default_key))
            .map(String::as_str)
            .unwrap_or(DEFAULT_TEMPLATE)
    }

    /// Registered request-type identifiers, for the tenant status view.
    pub fn keys(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    /// Assemble the full system instruction for one request.
    ///
    /// The optional addendum is free text the tenant appends to the
    /// instruction; it extends the template, it never replaces it.
    pub fn system_for(&self, request_type: &str, addendum: Option<&str>) -> String {
        let base = self.resolve(request_type);
        match addendum.map(str::trim).filter(|a| !a.is_empty()) {
            Some(extra) => format!("{base}\n\nAdditional operator instruction: {extra}"),
            None => base.to_string(),
        }
    }
}
