use std::fmt::Write as _;

use super::OutgoingMail;
use crate::api::models::{Attachment, QuoteForm};

const EMPTY_PLACEHOLDER: &str = "—";

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn nl2br(text: &str) -> String {
    text.replace('\n', "<br/>")
}

fn or_placeholder(value: &str) -> &str {
    if value.trim().is_empty() {
        EMPTY_PLACEHOLDER
    } else {
        value
    }
}

/// Notification for one stored quote request
///
/// Every user-supplied value is HTML-escaped before it reaches the HTML body.
pub fn compose_quote_notification(
    form: &QuoteForm,
    attachment: Option<&Attachment>,
    record_id: &str,
    brand: &str,
    contact_address: Option<&str>,
) -> OutgoingMail {
    let name = escape_html(&form.name);
    let email = escape_html(&form.email);

    let rows = [
        ("Name", name.clone()),
        ("Email", format!("<a href=\"mailto:{email}\">{email}</a>")),
        ("Company", escape_html(or_placeholder(&form.company))),
        ("Service", escape_html(&form.service)),
        ("Budget", escape_html(&form.budget)),
    ];

    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html>\n<html>\n<head><meta charset=\"utf-8\" /><title>New Quote Request</title></head>\n\
         <body style=\"font-family:system-ui,sans-serif;color:#111827;\">\n\
         <span style=\"display:none;\">New quote request from {name}</span>\n\
         <h1>New Quote Request</h1>\n<p>From <strong>{name}</strong></p>\n<table>\n"
    );
    for (label, value) in &rows {
        let _ = writeln!(html, "<tr><td><strong>{label}</strong></td><td>{value}</td></tr>");
    }
    let _ = write!(
        html,
        "</table>\n<h3>Project Brief</h3>\n<div style=\"white-space:pre-wrap;\">{}</div>\n",
        nl2br(&escape_html(&form.message))
    );

    if let Some(file) = attachment {
        let _ = writeln!(
            html,
            "<div><strong>Attachment:</strong> {} &middot; {} &middot; {} bytes</div>",
            escape_html(&file.filename),
            escape_html(or_placeholder(&file.content_type)),
            file.size()
        );
    }

    if let Some(address) = contact_address {
        let _ = writeln!(
            html,
            "<p><a href=\"mailto:{}\">Reply / Contact</a></p>",
            escape_html(address)
        );
    }

    let _ = write!(
        html,
        "<p>Saved to DB: <code>{}</code></p>\n\
         <p>By submitting this form, the sender agreed to be contacted about their project. &bull; {}</p>\n\
         </body>\n</html>\n",
        escape_html(record_id),
        escape_html(brand)
    );

    let mut text_parts = vec![
        format!("New Quote Request from {}", form.name),
        format!("Email: {}", form.email),
        format!("Company: {}", or_placeholder(&form.company)),
        format!("Service: {}", form.service),
        format!("Budget: {}", form.budget),
        format!("Message:\n{}", form.message),
    ];
    if let Some(file) = attachment {
        text_parts.push(format!("Attachment: {} ({} bytes)", file.filename, file.size()));
    }
    text_parts.push(format!("Saved to DB: {record_id}"));

    OutgoingMail {
        subject: format!("New Quote Request from {}", form.name),
        html,
        text: text_parts.join("\n\n"),
        reply_to: Some(form.email.clone()),
        attachment: attachment.cloned(),
    }
}
