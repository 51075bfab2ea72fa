use std::sync::Arc;

use common::{
    error::{AppError, Res},
    exchange::{RawResponse, RequestConfig},
};

/// Sees every request before it is dispatched.
pub trait RequestInterceptor: Send + Sync {
    fn on_request(&self, config: RequestConfig) -> Res<RequestConfig>;
}

/// Sees every completed exchange, successful or not.
///
/// Exactly one of the two hooks runs per exchange, depending on what the
/// previous stage of the chain produced.
pub trait ResponseInterceptor: Send + Sync {
    fn on_response(&self, response: RawResponse) -> Res<RawResponse>;

    fn on_error(&self, error: AppError) -> Res<RawResponse> {
        Err(error)
    }
}

#[derive(Clone, Default)]
pub struct Interceptors {
    request: Vec<Arc<dyn RequestInterceptor>>,
    response: Vec<Arc<dyn ResponseInterceptor>>,
}

impl Interceptors {
    pub fn use_request(&mut self, interceptor: Arc<dyn RequestInterceptor>) {
        self.request.push(interceptor);
    }

    pub fn use_response(&mut self, interceptor: Arc<dyn ResponseInterceptor>) {
        self.response.push(interceptor);
    }

    pub fn request_len(&self) -> usize {
        self.request.len()
    }

    pub fn response_len(&self) -> usize {
        self.response.len()
    }

    /// Runs request interceptors, most recently registered first.
    pub fn run_request(&self, config: RequestConfig) -> Res<RequestConfig> {
        self.request
            .iter()
            .rev()
            .try_fold(config, |config, interceptor| interceptor.on_request(config))
    }

    /// Runs response interceptors in registration order.
    pub fn run_response(&self, result: Res<RawResponse>) -> Res<RawResponse> {
        self.response
            .iter()
            .fold(result, |result, interceptor| match result {
                Ok(response) => interceptor.on_response(response),
                Err(error) => interceptor.on_error(error),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::exchange::{ExchangeError, SentRequest};
    use serde_json::Value;

    struct Mark(&'static str);

    impl RequestInterceptor for Mark {
        fn on_request(&self, mut config: RequestConfig) -> Res<RequestConfig> {
            config.url.push_str(self.0);
            Ok(config)
        }
    }

    struct Recover;

    impl ResponseInterceptor for Recover {
        fn on_response(&self, response: RawResponse) -> Res<RawResponse> {
            Ok(response)
        }

        fn on_error(&self, error: AppError) -> Res<RawResponse> {
            let error = error.into_exchange()?;
            error
                .response
                .ok_or_else(|| AppError::Internal("no response".to_string()))
        }
    }

    struct Reject;

    impl ResponseInterceptor for Reject {
        fn on_response(&self, response: RawResponse) -> Res<RawResponse> {
            Err(AppError::Internal(format!("rejected {}", response.status)))
        }
    }

    fn response(status: u16) -> RawResponse {
        RawResponse {
            status,
            status_text: None,
            headers: Default::default(),
            data: Some(Value::Null),
            config: RequestConfig::get("http://example.com"),
            request: SentRequest::default(),
        }
    }

    #[test]
    fn request_interceptors_run_last_registered_first() {
        let mut interceptors = Interceptors::default();
        interceptors.use_request(Arc::new(Mark("a")));
        interceptors.use_request(Arc::new(Mark("b")));

        let config = interceptors.run_request(RequestConfig::get("/")).unwrap();
        assert_eq!(config.url, "/ba");
    }

    #[test]
    fn error_flows_to_next_error_hook() {
        let mut interceptors = Interceptors::default();
        interceptors.use_response(Arc::new(Recover));

        let error = ExchangeError {
            message: "Request failed with status code 500".to_string(),
            config: RequestConfig::get("http://example.com"),
            request: None,
            response: Some(response(500)),
        };
        let recovered = interceptors.run_response(Err(error.into())).unwrap();
        assert_eq!(recovered.status, 500);
    }

    #[test]
    fn failing_success_hook_reaches_later_error_hooks_only() {
        let mut interceptors = Interceptors::default();
        interceptors.use_response(Arc::new(Reject));
        interceptors.use_response(Arc::new(Recover));

        let result = interceptors.run_response(Ok(response(200)));
        assert!(matches!(result, Err(AppError::Internal(message)) if message == "rejected 200"));
    }

    #[test]
    fn empty_chain_passes_result_through() {
        let interceptors = Interceptors::default();
        assert_eq!(interceptors.run_response(Ok(response(204))).unwrap(), response(204));
        assert_eq!(interceptors.request_len(), 0);
        assert_eq!(interceptors.response_len(), 0);
    }
}
