//! Template catalog
//!
//! The orchestrator consults the catalog for template existence, declared
//! dependencies and configuration schema validation. [`InMemoryTemplateCatalog`]
//! holds template definitions with a per-field schema.

use crate::error::CatalogError;
use async_trait::async_trait;
use provisioning_types::{Configuration, TemplateId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Outcome of validating a configuration against a template schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Template catalog collaborator
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn template_exists(&self, template_id: &TemplateId) -> Result<bool, CatalogError>;

    /// Declared dependency names, in order
    async fn get_dependencies(&self, template_id: &TemplateId)
        -> Result<Vec<String>, CatalogError>;

    async fn validate_configuration(
        &self,
        template_id: &TemplateId,
        configuration: &Configuration,
    ) -> Result<ValidationReport, CatalogError>;

    /// Expected pipeline duration, if the template declares one
    async fn estimated_duration(
        &self,
        _template_id: &TemplateId,
    ) -> Result<Option<Duration>, CatalogError> {
        Ok(None)
    }
}

// ── Schema ───────────────────────────────────────────────────────────

/// Value type of a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
}

/// Constraints for one configuration field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Regex a string value must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Allowed values for string fields; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            pattern: None,
            min: None,
            max: None,
            min_length: None,
            max_length: None,
            allowed: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn with_allowed(mut self, allowed: &[&str]) -> Self {
        self.allowed = allowed.iter().map(|s| s.to_string()).collect();
        self
    }

    fn check(&self, value: Option<&Value>, pattern: Option<&Regex>, errors: &mut Vec<String>) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(format!("Field '{}' is required", self.name));
                }
                return;
            }
            Some(v) => v,
        };

        match self.field_type {
            FieldType::String => {
                let Some(s) = value.as_str() else {
                    errors.push(format!("Field '{}' must be a string", self.name));
                    return;
                };
                let len = s.chars().count();
                if let Some(min) = self.min_length {
                    if len < min {
                        errors.push(format!(
                            "Field '{}' must be at least {} characters",
                            self.name, min
                        ));
                    }
                }
                if let Some(max) = self.max_length {
                    if len > max {
                        errors.push(format!(
                            "Field '{}' must be at most {} characters",
                            self.name, max
                        ));
                    }
                }
                if let Some(regex) = pattern {
                    if !regex.is_match(s) {
                        errors.push(format!(
                            "Field '{}' does not match pattern {}",
                            self.name,
                            regex.as_str()
                        ));
                    }
                }
                if !self.allowed.is_empty() && !self.allowed.iter().any(|a| a == s) {
                    errors.push(format!(
                        "Field '{}' must be one of: {}",
                        self.name,
                        self.allowed.join(", ")
                    ));
                }
            }
            FieldType::Number | FieldType::Integer => {
                let number = match (self.field_type, value) {
                    (FieldType::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => n.as_f64(),
                    (FieldType::Number, Value::Number(n)) => n.as_f64(),
                    _ => None,
                };
                let Some(number) = number else {
                    let expected = if self.field_type == FieldType::Integer {
                        "an integer"
                    } else {
                        "a number"
                    };
                    errors.push(format!("Field '{}' must be {}", self.name, expected));
                    return;
                };
                if let Some(min) = self.min {
                    if number < min {
                        errors.push(format!("Field '{}' must be >= {}", self.name, min));
                    }
                }
                if let Some(max) = self.max {
                    if number > max {
                        errors.push(format!("Field '{}' must be <= {}", self.name, max));
                    }
                }
            }
            FieldType::Boolean => {
                if !value.is_boolean() {
                    errors.push(format!("Field '{}' must be a boolean", self.name));
                }
            }
        }
    }
}

/// A provisioning template as held by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub id: TemplateId,
    #[serde(default)]
    pub name: String,
    /// Dependency names; one job step is created per entry
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_secs: Option<u64>,
}

impl TemplateDefinition {
    pub fn new(id: impl Into<TemplateId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dependencies: Vec::new(),
            fields: Vec::new(),
            estimated_duration_secs: None,
        }
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_estimated_duration(mut self, secs: u64) -> Self {
        self.estimated_duration_secs = Some(secs);
        self
    }
}

// ── In-memory catalog ────────────────────────────────────────────────

#[derive(Debug)]
struct CompiledTemplate {
    definition: TemplateDefinition,
    patterns: HashMap<String, Regex>,
}

impl CompiledTemplate {
    fn compile(definition: TemplateDefinition) -> Result<Self, CatalogError> {
        let mut patterns = HashMap::new();
        for field in &definition.fields {
            if let Some(pattern) = &field.pattern {
                let regex = Regex::new(pattern).map_err(|e| CatalogError::InvalidTemplate {
                    template_id: definition.id.clone(),
                    reason: format!("field '{}' has invalid pattern: {}", field.name, e),
                })?;
                patterns.insert(field.name.clone(), regex);
            }
        }
        Ok(Self {
            definition,
            patterns,
        })
    }

    fn validate(&self, configuration: &Configuration) -> ValidationReport {
        let mut errors = Vec::new();
        for field in &self.definition.fields {
            field.check(
                configuration.get(&field.name),
                self.patterns.get(&field.name),
                &mut errors,
            );
        }
        ValidationReport::from_errors(errors)
    }
}

/// Catalog holding template definitions in memory
#[derive(Debug, Default)]
pub struct InMemoryTemplateCatalog {
    templates: RwLock<HashMap<TemplateId, CompiledTemplate>>,
}

impl InMemoryTemplateCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from definitions, rejecting invalid patterns
    pub fn with_templates(
        definitions: impl IntoIterator<Item = TemplateDefinition>,
    ) -> Result<Self, CatalogError> {
        let catalog = Self::new();
        for definition in definitions {
            catalog.register(definition)?;
        }
        Ok(catalog)
    }

    /// Register or replace a template
    pub fn register(&self, definition: TemplateDefinition) -> Result<(), CatalogError> {
        let compiled = CompiledTemplate::compile(definition)?;
        let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
        templates.insert(compiled.definition.id.clone(), compiled);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.templates.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_template<T>(
        &self,
        template_id: &TemplateId,
        f: impl FnOnce(&CompiledTemplate) -> T,
    ) -> Option<T> {
        let templates = self.templates.read().unwrap_or_else(|e| e.into_inner());
        templates.get(template_id).map(f)
    }
}

#[async_trait]
impl TemplateCatalog for InMemoryTemplateCatalog {
    async fn template_exists(&self, template_id: &TemplateId) -> Result<bool, CatalogError> {
        Ok(self.with_template(template_id, |_| ()).is_some())
    }

    async fn get_dependencies(
        &self,
        template_id: &TemplateId,
    ) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .with_template(template_id, |t| t.definition.dependencies.clone())
            .unwrap_or_default())
    }

    async fn validate_configuration(
        &self,
        template_id: &TemplateId,
        configuration: &Configuration,
    ) -> Result<ValidationReport, CatalogError> {
        Ok(self
            .with_template(template_id, |t| t.validate(configuration))
            .unwrap_or_else(|| {
                ValidationReport::from_errors(vec![format!(
                    "Template '{}' not found",
                    template_id
                )])
            }))
    }

    async fn estimated_duration(
        &self,
        template_id: &TemplateId,
    ) -> Result<Option<Duration>, CatalogError> {
        Ok(self
            .with_template(template_id, |t| t.definition.estimated_duration_secs)
            .flatten()
            .map(Duration::from_secs))
    }
}
