use hyper::Request;
use tower_http::trace::MakeSpan;
use tracing::Span;

#[derive(Clone)]
pub struct ProxyRequestSpan {
    env: String,
    instance_id: String,
}

impl ProxyRequestSpan {
    pub fn new(env: &str, instance_id: &str) -> Self {
        Self {
            env: env.to_string(),
            instance_id: instance_id.to_string(),
        }
    }
}

impl<B> MakeSpan<B> for ProxyRequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "request",
            env = %self.env,
            instance_id = %self.instance_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}
