use http::HeaderMap;
use http::HeaderValue;
use http::Response;
use http::StatusCode;
use http::header::CONTENT_TYPE;

/// The fixed response returned for every denied request.
#[derive(Debug, Clone)]
pub struct FailedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

impl FailedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// `429 Too Many Requests` with a plain-text body.
    pub fn too_many_requests() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Self::new(StatusCode::TOO_MANY_REQUESTS, headers, "Too Many Requests")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn to_response<B>(&self) -> Response<B>
    where
        B: From<String>,
    {
        let mut response = Response::new(B::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

impl Default for FailedResponse {
    fn default() -> Self {
        Self::too_many_requests()
    }
}
