use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use serde_json::json;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::debug;

/// Headers set on every response unless the handler already chose a value.
const SECURITY_HEADERS: [(&str, &str); 7] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("referrer-policy", "no-referrer"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("x-dns-prefetch-control", "off"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
];

pub fn security_headers(router: Router) -> Router {
    SECURITY_HEADERS.iter().fold(router, |router, &(name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for ApiLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Per-IP request budget for the HTTP API: a burst of `max_requests`,
/// refilled evenly over `window`.
pub struct ApiLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ApiLimiter {
    pub fn new(config: ApiLimitConfig) -> Self {
        let burst = NonZeroU32::new(config.max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);
        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        let allowed = self.limiter.check_key(&ip).is_ok();
        if !allowed {
            debug!(%ip, "api rate limit exceeded");
        }
        allowed
    }

    /// Forgets addresses whose budget has fully refilled.
    pub fn purge(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

impl Default for ApiLimiter {
    fn default() -> Self {
        Self::new(ApiLimitConfig::default())
    }
}

pub async fn limit_api(State(limiter): State<Arc<ApiLimiter>>, req: Request, next: Next) -> Response {
    // no peer address when served without connect info (tests, unix sockets)
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if limiter.check(ip) {
        next.run(req).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "too many requests, try again later" })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32) -> ApiLimiter {
        ApiLimiter::new(ApiLimitConfig {
            max_requests,
            window: Duration::from_secs(900),
        })
    }

    #[test]
    fn hundred_and_first_request_is_refused() {
        let limiter = ApiLimiter::default();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        for i in 0..100 {
            assert!(limiter.check(ip), "request {} refused", i + 1);
        }
        assert!(!limiter.check(ip));
    }

    #[test]
    fn addresses_have_separate_budgets() {
        let limiter = limiter(2);
        let a: IpAddr = "203.0.113.1".parse().unwrap();
        let b: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(limiter.check(a));
        assert!(limiter.check(a));
        assert!(!limiter.check(a));
        assert!(limiter.check(b));
        assert_eq!(limiter.len(), 2);
    }
}
