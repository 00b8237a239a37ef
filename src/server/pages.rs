//! HTML rendering for the browser-facing routes.

use std::fmt::Write;

use crate::auth::{AuthError, TokenRecord};
use crate::inspect::DecodedJwt;
use crate::status::Summary;

pub(crate) fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\
         <body>{body}</body></html>",
        escape(title)
    )
}

pub(crate) fn status_page(summary: &Summary) -> String {
    match summary {
        Summary::NeedsAuthorization { authorization_url } => layout(
            "Authorization required",
            &format!(
                "<h1>Authorization required</h1>\
                 <p><a href=\"{}\" target=\"_blank\">Authorize with the identity provider</a></p>\
                 <p>Return to this page once authorization completes.</p>",
                escape(authorization_url.as_deref().unwrap_or("/login"))
            ),
        ),
        Summary::Authorized {
            access_token,
            refresh_token_present,
            expires_at,
            token_type,
            scope,
        } => {
            let mut body = String::from("<h1>Authorized</h1><table>");
            let rows = [
                ("Access token", access_token.clone()),
                ("Token type", token_type.clone()),
                ("Scope", scope.clone()),
                (
                    "Refresh token",
                    if *refresh_token_present { "present" } else { "not issued" }.to_string(),
                ),
                ("Expires at", expires_at.to_string()),
            ];
            for (label, value) in rows {
                let _ = write!(
                    body,
                    "<tr><th>{label}</th><td><code>{}</code></td></tr>",
                    escape(&value)
                );
            }
            body.push_str(
                "</table><p><a href=\"/inspect\">Inspect token</a></p>\
                 <form method=\"post\" action=\"/clear\"><button>Clear tokens</button></form>",
            );
            layout("Authorized", &body)
        }
    }
}

pub(crate) fn callback_success_page(record: &TokenRecord) -> String {
    layout(
        "Authorization complete",
        &format!(
            "<h1>Success!</h1><p>Authorization complete ({} token stored). \
             You can close this tab.</p><p><a href=\"/\">Back to status</a></p>",
            escape(&record.token_type)
        ),
    )
}

pub(crate) fn failure_page(title: &str, err: &AuthError) -> String {
    layout(
        title,
        &format!(
            "<h1>{}</h1><p>{}</p><p><a href=\"/\">Back to status</a></p>",
            escape(title),
            escape(&err.user_message())
        ),
    )
}

pub(crate) fn inspect_page(decoded: &DecodedJwt) -> String {
    let pretty = |value: &serde_json::Map<String, serde_json::Value>| {
        serde_json::to_string_pretty(value).unwrap_or_default()
    };
    let claims = decoded.claims();
    let dash = || "-".to_string();
    layout(
        "Token inspection",
        &format!(
            "<h1>Token inspection</h1>\
             <p>Decoded without signature verification.</p>\
             <ul><li>iss: {}</li><li>aud: {}</li><li>exp: {}</li><li>sub: {}</li></ul>\
             <h2>Header</h2><pre>{}</pre><h2>Payload</h2><pre>{}</pre>\
             <p><a href=\"/\">Back to status</a></p>",
            escape(&claims.iss.unwrap_or_else(dash)),
            escape(&claims.aud.map(|a| a.to_string()).unwrap_or_else(dash)),
            escape(&claims.exp.map(|t| t.to_rfc3339()).unwrap_or_else(dash)),
            escape(&claims.sub.unwrap_or_else(dash)),
            escape(&pretty(&decoded.header)),
            escape(&pretty(&decoded.payload)),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_neutralizes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x&y")</script>"#),
            "&lt;script&gt;alert(&quot;x&amp;y&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn authorize_link_is_escaped() {
        let page = status_page(&Summary::NeedsAuthorization {
            authorization_url: Some("https://idp.example.com/authorize?a=1&state=s".to_string()),
        });
        assert!(page.contains("href=\"https://idp.example.com/authorize?a=1&amp;state=s\""));
    }

    #[test]
    fn status_page_without_link_points_at_login_route() {
        let page = status_page(&Summary::NeedsAuthorization {
            authorization_url: None,
        });
        assert!(page.contains("href=\"/login\""));
    }

    #[test]
    fn failure_page_does_not_echo_endpoint_body() {
        let err = AuthError::TokenEndpointError {
            status: 400,
            body: "<b>internal detail</b>".to_string(),
        };
        let page = failure_page("Authorization failed", &err);
        assert!(!page.contains("internal detail"));
    }
}
