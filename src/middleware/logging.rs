//! Request identification for log correlation
//!
//! Every inbound request gets an `x-request-id` header (generated if absent)
//! that is propagated to the response via tower-http's request-id layers.

use http::{HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

#[derive(Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_parseable_request_ids() {
        let mut maker = UuidRequestId;
        let request = Request::builder().body(()).expect("request should build");
        let id = maker.make_request_id(&request).expect("id should be made");
        let value = id.header_value().to_str().expect("ascii header");
        assert!(Uuid::parse_str(value).is_ok());
    }
}
