use serde::Deserialize;

use crate::errors::{AuditError, Result};

const DEFAULT_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Outbound SMS delivery. `Ok(())` maps exactly to the gateway's created
/// response; every failure variant ends the whole notify call.
pub trait GatewayClient: Send + Sync {
    /// Delivers one already form-encoded message body.
    fn deliver(&self, form_body: &str) -> Result<()>;
}

/// Gateway client speaking the messages REST API with basic auth.
pub struct HttpSmsGateway {
    http: reqwest::blocking::Client,
    api_base: String,
    sid: String,
    token: String,
}

impl HttpSmsGateway {
    pub fn new(
        http: reqwest::blocking::Client,
        sid: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self::with_api_base(http, sid, token, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        http: reqwest::blocking::Client,
        sid: impl Into<String>,
        token: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            sid: sid.into(),
            token: token.into(),
        }
    }
}

impl GatewayClient for HttpSmsGateway {
    fn deliver(&self, form_body: &str) -> Result<()> {
        let endpoint = format!("{}/Accounts/{}/Messages", self.api_base, self.sid);
        let response = self
            .http
            .post(endpoint)
            .basic_auth(&self.sid, Some(&self.token))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form_body.to_string())
            .send()
            .map_err(|err| {
                tracing::error!(error = %err, "failed to make gateway request");
                AuditError::Gateway
            })?;

        match response.status().as_u16() {
            201 => {
                tracing::debug!("sent SMS successfully");
                Ok(())
            }
            401 => Err(AuditError::GatewayAuth),
            400 => {
                let body = response.text().unwrap_or_default();
                Err(bad_request_error(&body))
            }
            status => {
                tracing::error!(status, "gateway responded with failure");
                Err(AuditError::Gateway)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    #[serde(rename = "RestException")]
    rest_exception: RestException,
}

#[derive(Debug, Deserialize)]
struct RestException {
    #[serde(rename = "Message")]
    message: String,
}

/// Extracts the human-readable message from a 400 body; an unparseable body
/// still fails the call, just without the gateway's own words.
fn bad_request_error(body: &str) -> AuditError {
    match quick_xml::de::from_str::<GatewayErrorBody>(body) {
        Ok(parsed) => AuditError::GatewayBadRequest(parsed.rest_exception.message),
        Err(err) => {
            tracing::error!(error = %err, "failed to read gateway error response");
            AuditError::GatewayBadRequest("failed to read response".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_error_message_is_surfaced() {
        let body = r#"<?xml version='1.0' encoding='UTF-8'?>
<TwilioResponse><RestException><Code>21211</Code><Message>The 'To' number is not a valid phone number.</Message><MoreInfo>https://www.twilio.com/docs/errors/21211</MoreInfo><Status>400</Status></RestException></TwilioResponse>"#;
        match bad_request_error(body) {
            AuditError::GatewayBadRequest(message) => {
                assert_eq!(message, "The 'To' number is not a valid phone number.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unparseable_body_yields_generic_error() {
        match bad_request_error("not xml at all") {
            AuditError::GatewayBadRequest(message) => {
                assert_eq!(message, "failed to read response")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
