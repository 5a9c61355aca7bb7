//! HTML login form scraping

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AudiClientError, Result};

/// Input types whose values are submitted with the form
const SUBMITTED_INPUT_TYPES: &[&str] = &["hidden", "text", "email", "password"];

/// A scraped HTML form ready to be re-submitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Absolute submission URL
    pub action: Url,
    /// Form fields in document order
    pub fields: Vec<(String, String)>,
}

impl LoginForm {
    /// Scrape the first form that contains an input named after any of
    /// `markers`.
    ///
    /// The `action` attribute is resolved against `page_url`; a missing
    /// action submits to the page itself.
    pub fn scrape(html: &str, page_url: &Url, markers: &[&str]) -> Result<Self> {
        let document = Html::parse_document(html);
        let form_selector = selector("form")?;
        let input_selector = selector("input[name]")?;

        let form = document
            .select(&form_selector)
            .find(|form| {
                form.select(&input_selector)
                    .filter_map(|input| input.value().attr("name"))
                    .any(|name| markers.contains(&name))
            })
            .ok_or_else(|| {
                AudiClientError::login(format!(
                    "No login form with field {:?} on {}",
                    markers, page_url
                ))
            })?;

        let action = match form.value().attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => page_url.join(action)?,
            _ => page_url.clone(),
        };

        let fields = form
            .select(&input_selector)
            .filter(is_submitted)
            .filter_map(|input| {
                let name = input.value().attr("name")?;
                let value = input.value().attr("value").unwrap_or_default();
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Ok(Self { action, fields })
    }

    /// Value of a field, if present
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, appending it if the form does not have it yet
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Overwrite a field the form already has; returns `false` otherwise
    pub fn replace(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => {
                *v = value.into();
                true
            }
            None => false,
        }
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| AudiClientError::ParseError(format!("{:?}", e)))
}

fn is_submitted(input: &ElementRef<'_>) -> bool {
    let input_type = input
        .value()
        .attr("type")
        .unwrap_or("text")
        .to_ascii_lowercase();
    SUBMITTED_INPUT_TYPES.contains(&input_type.as_str())
}
