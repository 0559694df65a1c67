//! `{{name}}` templates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Values substituted into a template.
pub type TemplateVars = HashMap<String, String>;

/// A subject/body pair with `{{name}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub subject: String,
    pub html: String,
}

/// A fully rendered email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailTemplate {
    pub fn new(subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            html: html.into(),
        }
    }

    /// Renders for one recipient.
    pub fn render(&self, to: impl Into<String>, vars: &TemplateVars) -> RenderedEmail {
        RenderedEmail {
            to: to.into(),
            subject: render(&self.subject, vars),
            html: render(&self.html, vars),
        }
    }

    /// Confirmation sent to the customer after checkout.
    pub fn order_confirmation() -> Self {
        Self::new(
            "Your order {{orderCode}} has been placed",
            "<p>Hi {{customerName}},</p>\
             <p>Thank you for your order <strong>{{orderCode}}</strong>.</p>\
             <p>Total: {{total}}<br>Payment: {{paymentMethod}}</p>\
             <p>{{storeName}}</p>",
        )
    }

    /// Alert sent to merchants and admins for a new order.
    pub fn new_order_alert() -> Self {
        Self::new(
            "New order {{orderCode}}",
            "<p>A new order <strong>{{orderCode}}</strong> was placed by {{customerName}} ({{customerPhone}}).</p>\
             <p>Items: {{itemCount}}<br>Total: {{total}}</p>",
        )
    }
}

/// Replaces every `{{name}}` with its value; unknown names render empty.
///
/// Whitespace inside the braces is ignored. An unterminated `{{` is kept
/// literally.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                if let Some(value) = vars.get(name) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
