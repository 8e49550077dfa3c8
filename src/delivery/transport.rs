//! HTTP transports.

use std::sync::Arc;

use native_tls::TlsConnector;
use ureq::{Agent, AgentBuilder, Proxy};

use super::{DeliveryError, TransportOptions};

/// Content type of `sendMessage` bodies.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Issues one form POST and reports the response status.
///
/// Implementations return `Ok` for any HTTP response, whatever its status,
/// and `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    fn post_form(
        &self,
        url: &str,
        body: &str,
        options: &TransportOptions,
    ) -> Result<u16, DeliveryError>;
}

/// Blocking transport backed by `ureq` and `native-tls`.
///
/// No connection is reused: every attempt builds its own agent from the
/// task's options.
#[derive(Clone, Copy, Debug, Default)]
pub struct UreqTransport;

impl UreqTransport {
    fn agent(options: &TransportOptions) -> Result<Agent, DeliveryError> {
        let mut tls = TlsConnector::builder();
        if options.accept_invalid_certs {
            tls.danger_accept_invalid_certs(true);
            tls.danger_accept_invalid_hostnames(true);
        }
        let tls = tls
            .build()
            .map_err(|err| DeliveryError::Tls(err.to_string()))?;

        let mut builder = AgentBuilder::new()
            .timeout(options.timeout)
            .tls_connector(Arc::new(tls));
        if let Some(proxy) = &options.proxy {
            let proxy = Proxy::new(proxy).map_err(|err| DeliveryError::Proxy(err.to_string()))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder.build())
    }
}

impl Transport for UreqTransport {
    fn post_form(
        &self,
        url: &str,
        body: &str,
        options: &TransportOptions,
    ) -> Result<u16, DeliveryError> {
        let agent = Self::agent(options)?;
        match agent
            .post(url)
            .set("Content-Type", FORM_CONTENT_TYPE)
            .send_string(body)
        {
            Ok(response) => Ok(response.status()),
            Err(ureq::Error::Status(code, _)) => Ok(code),
            Err(ureq::Error::Transport(err)) => Err(DeliveryError::Transport(err.to_string())),
        }
    }
}
