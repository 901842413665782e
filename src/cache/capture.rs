//! Response capture shim.
//!
//! Lets the coordinator observe the status code and body the wrapped handler
//! produced without altering what the original caller receives: the captured
//! view borrows from the response, and the response itself flows back
//! unchanged (tee semantics, not substitution).

use bytes::Bytes;

use crate::Response;

use super::envelope::Envelope;

/// A read-only view over a downstream response, for cache-commit decisions.
pub struct CapturedResponse<'a> {
    response: &'a Response,
}

impl<'a> CapturedResponse<'a> {
    pub fn from_response(response: &'a Response) -> Self {
        Self { response }
    }

    /// Returns `true` when the handler returned HTTP 200 with a non-empty
    /// body — the precondition for any cache write.
    pub fn is_ok_with_body(&self) -> bool {
        self.response.status() == crate::StatusCode::Ok
            && !self.response.body_bytes().is_empty()
    }

    /// Parses the captured body as the application envelope. `None` means the
    /// body is not a valid envelope and nothing may be committed.
    pub fn parse_envelope(&self) -> Option<Envelope> {
        serde_json::from_slice(self.response.body_bytes()).ok()
    }

    /// Owned copy of the body, for committing to the store.
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.response.body_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;
    use serde_json::json;

    #[test]
    fn ok_with_body() {
        let response = Response::json(StatusCode::Ok, &Envelope::success(json!(1)));
        let captured = CapturedResponse::from_response(&response);
        assert!(captured.is_ok_with_body());
        assert!(captured.parse_envelope().is_some());
    }

    #[test]
    fn non_200_is_rejected() {
        let response = Response::new(StatusCode::InternalServerError).body("boom");
        let captured = CapturedResponse::from_response(&response);
        assert!(!captured.is_ok_with_body());
    }

    #[test]
    fn empty_body_is_rejected() {
        let response = Response::new(StatusCode::Ok);
        let captured = CapturedResponse::from_response(&response);
        assert!(!captured.is_ok_with_body());
    }

    #[test]
    fn non_envelope_body_parses_to_none() {
        let response = Response::new(StatusCode::Ok).body("<html>hi</html>");
        let captured = CapturedResponse::from_response(&response);
        assert!(captured.is_ok_with_body());
        assert!(captured.parse_envelope().is_none());
    }
}
