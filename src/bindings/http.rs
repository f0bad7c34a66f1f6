//! # HTTP Binding
//!
//! Outbound HTTP for scripts: `http.execute(...)` returns a response handle,
//! `http.body(response)` drains it exactly once.
//!
//! Requests carry a deadline derived from the run's timeout so an in-flight
//! transfer cannot outlive the wall-clock supervisor. TLS certificate
//! verification follows [`HttpConfig::verify_tls`], which defaults to off;
//! see the configuration docs before pointing this at anything sensitive.

use std::sync::{Arc, Mutex};

use rhai::{Blob, Dynamic, Engine, EvalAltResult, Map, Scope};

use crate::config::HttpConfig;
use crate::engine::Deadline;
use crate::errors::ScriptError;

use super::throw;

/// The `http` top-level object.
#[derive(Clone)]
pub struct Http {
    config: HttpConfig,
    deadline: Deadline,
}

/// Handle for one in-flight response. The body can be consumed once.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    status: u16,
    inner: Arc<Mutex<Option<reqwest::blocking::Response>>>,
}

impl Http {
    fn execute(
        &self,
        method: &str,
        url: &str,
        username: &str,
        password: &str,
        headers: Map,
        body: Blob,
    ) -> Result<HttpResponse, ScriptError> {
        let timeout = match self.deadline.remaining() {
            Some(remaining) => remaining.min(self.config.timeout),
            None => self.config.timeout,
        };

        let mut builder = reqwest::blocking::Client::builder().timeout(timeout);
        if !self.config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let client = builder.build().map_err(http_err)?;

        let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ScriptError::Http(format!("invalid HTTP method: {method}")))?;

        let mut request = client.request(method, url);
        for (name, value) in &headers {
            for item in header_values(value) {
                request = request.header(name.as_str(), item);
            }
        }
        if !(username.is_empty() && password.is_empty()) {
            request = request.basic_auth(username, Some(password));
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().map_err(http_err)?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            inner: Arc::new(Mutex::new(Some(response))),
        })
    }
}

impl HttpResponse {
    /// Fully read the body, closing the response. Second call fails.
    fn body(&self) -> Result<Blob, ScriptError> {
        let response = self
            .inner
            .lock()
            .unwrap()
            .take()
            .ok_or(ScriptError::ResponseConsumed)?;
        let bytes = response.bytes().map_err(http_err)?;
        Ok(bytes.to_vec())
    }
}

/// Header values may be a single printable value or an array of them.
fn header_values(value: &Dynamic) -> Vec<String> {
    let value = value.clone().flatten();
    if value.is_array() {
        value
            .try_cast::<rhai::Array>()
            .unwrap_or_default()
            .iter()
            .map(|v| v.to_string())
            .collect()
    } else {
        vec![value.to_string()]
    }
}

fn http_err(err: reqwest::Error) -> ScriptError {
    ScriptError::Http(err.to_string())
}

/// Register the `http` binding.
pub fn register(
    engine: &mut Engine,
    scope: &mut Scope<'static>,
    config: &HttpConfig,
    deadline: &Deadline,
) {
    engine.register_type_with_name::<Http>("Http");
    engine.register_type_with_name::<HttpResponse>("HttpResponse");

    engine.register_fn(
        "execute",
        |h: &mut Http,
         method: &str,
         url: &str,
         username: &str,
         password: &str,
         headers: Map,
         body: Blob|
         -> Result<HttpResponse, Box<EvalAltResult>> {
            h.execute(method, url, username, password, headers, body)
                .map_err(throw)
        },
    );

    engine.register_fn(
        "body",
        |_: &mut Http, response: HttpResponse| -> Result<Blob, Box<EvalAltResult>> {
            response.body().map_err(throw)
        },
    );

    engine.register_fn("status", |response: &mut HttpResponse| {
        response.status as i64
    });

    scope.push(
        "http",
        Http {
            config: config.clone(),
            deadline: deadline.clone(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumed_response_errors() {
        let response = HttpResponse {
            status: 200,
            inner: Arc::new(Mutex::new(None)),
        };
        let err = response.body().unwrap_err();
        assert!(matches!(err, ScriptError::ResponseConsumed));
    }

    #[test]
    fn header_values_accept_scalar_and_array() {
        assert_eq!(
            header_values(&Dynamic::from("gzip".to_string())),
            vec!["gzip".to_string()]
        );
        let array: rhai::Array = vec![
            Dynamic::from("a".to_string()),
            Dynamic::from("b".to_string()),
        ];
        assert_eq!(
            header_values(&Dynamic::from_array(array)),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[test]
    fn invalid_method_is_reported() {
        let http = Http {
            config: HttpConfig::default(),
            deadline: Deadline::default(),
        };
        let err = http
            .execute("NOT A METHOD", "http://localhost", "", "", Map::new(), Blob::new())
            .unwrap_err();
        assert!(err.to_string().contains("invalid HTTP method"));
    }
}
