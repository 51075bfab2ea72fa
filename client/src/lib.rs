pub mod http;
pub mod interceptor;

pub use http::{ClientDefaults, DeriveHook, HttpClient};
pub use interceptor::{Interceptors, RequestInterceptor, ResponseInterceptor};
