// Session credential returned by a successful login.
//
// The HTTP client is built without a cookie store; whatever the login
// response sets is captured here once and attached explicitly to every
// later request. Nothing refreshes it: an expired session makes the
// following requests fail.

use reqwest::blocking::{RequestBuilder, Response};
use reqwest::header::COOKIE;
use std::fmt;

/// Opaque transport credentials plus the facility id (sessions API only).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    cookies: Vec<(String, String)>,
    facility_id: Option<String>,
}

impl Session {
    pub fn new(cookies: Vec<(String, String)>, facility_id: Option<String>) -> Self {
        Session {
            cookies,
            facility_id,
        }
    }

    /// Collect the cookies set by a login response.
    pub fn from_response(res: &Response) -> Self {
        let cookies = res
            .cookies()
            .map(|c| (c.name().to_string(), c.value().to_string()))
            .collect();
        Session::new(cookies, None)
    }

    pub fn with_facility_id(mut self, facility_id: String) -> Self {
        self.facility_id = Some(facility_id);
        self
    }

    /// True when the login response set no cookies at all.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn facility_id(&self) -> Option<&str> {
        self.facility_id.as_deref()
    }

    /// The `Cookie` header value, e.g. `a=1; b=2`.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        Some(pairs.join("; "))
    }

    /// Attach the session to an outgoing request.
    pub fn attach(&self, req: RequestBuilder) -> RequestBuilder {
        match self.cookie_header() {
            Some(header) => req.header(COOKIE, header),
            None => req,
        }
    }
}

// Cookie values are bearer credentials; only names are printed.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.cookies.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("Session")
            .field("cookies", &names)
            .field("facility_id", &self.facility_id)
            .finish()
    }
}
