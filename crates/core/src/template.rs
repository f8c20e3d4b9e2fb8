use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    format: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("destination format is empty")]
    Empty,
    #[error("unsupported or incomplete format code in {0:?}")]
    Invalid(String),
}

impl DestinationTemplate {
    pub fn as_str(&self) -> &str {
        &self.format
    }
}

pub fn validate_template(input: &str) -> Result<(), TemplateError> {
    parse_template(input).map(|_| ())
}

// Any strftime code chrono knows is accepted, so `%F`, `%k` or `%-m` work too.
pub fn parse_template(input: &str) -> Result<DestinationTemplate, TemplateError> {
    if input.is_empty() {
        return Err(TemplateError::Empty);
    }
    if StrftimeItems::new(input).any(|item| matches!(item, Item::Error)) {
        return Err(TemplateError::Invalid(input.to_string()));
    }
    Ok(DestinationTemplate {
        format: input.to_string(),
    })
}

pub fn render_template(template: &DestinationTemplate, time: &DateTime<Local>) -> String {
    time.format_with_items(StrftimeItems::new(&template.format))
        .to_string()
}
