use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
};
use crate::error::AppError;
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

type KeyedLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>;

/// Rate limiter keyed by caller IP address.
///
/// Only peers listed as trusted proxies may name the caller through
/// `x-forwarded-for`; everyone else is keyed on the socket address.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
    trusted_proxies: Arc<[IpAddr]>,
}

impl IpRateLimiter {
    /// Take one unit of `ip`'s budget, or return how long until the next one.
    pub fn check_key(&self, ip: &IpAddr) -> Result<(), Duration> {
        self.limiter
            .check_key(ip)
            .map_err(|negative| negative.wait_time_from(DefaultClock::default().now()))
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }

    pub fn caller_ip(&self, request: &Request) -> Option<IpAddr> {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        client_ip(peer, request.headers(), &self.trusted_proxies)
    }
}

/// Create a keyed rate limiter (by IP).
///
/// `attempts` requests are allowed back to back; the budget refills evenly
/// over `window_seconds`.
pub fn create_ip_rate_limiter(
    attempts: u32,
    window_seconds: u64,
    trusted_proxies: &[IpAddr],
) -> IpRateLimiter {
    let attempts = NonZeroU32::new(attempts.max(1)).unwrap_or(NonZeroU32::MIN);
    let period = Duration::from_millis((window_seconds.max(1) * 1000) / attempts.get() as u64);
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(attempts))
        .allow_burst(attempts);

    IpRateLimiter {
        limiter: Arc::new(RateLimiter::dashmap(quota)),
        trusted_proxies: trusted_proxies.into(),
    }
}

/// Address of the client behind `peer`.
///
/// An untrusted peer is the client. A trusted peer forwards the client in
/// `x-forwarded-for`; hops are read right to left and the first one that is
/// not itself a trusted proxy wins. An unreadable hop stops the walk at the
/// last trusted address.
pub fn client_ip(
    peer: Option<IpAddr>,
    headers: &HeaderMap,
    trusted_proxies: &[IpAddr],
) -> Option<IpAddr> {
    let peer = peer?;
    if !trusted_proxies.contains(&peer) {
        return Some(peer);
    }

    let Some(forwarded) = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return Some(peer);
    };

    let mut nearest = peer;
    for hop in forwarded.rsplit(',') {
        match hop.trim().parse::<IpAddr>() {
            Ok(ip) if trusted_proxies.contains(&ip) => nearest = ip,
            Ok(ip) => return Some(ip),
            Err(_) => break,
        }
    }
    Some(nearest)
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(limiter): State<IpRateLimiter>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match limiter.caller_ip(&request) {
        Some(ip) => match limiter.check_key(&ip) {
            Ok(()) => Ok(next.run(request).await),
            Err(wait_time) => {
                tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests from this IP. Please try again later.".to_string(),
                    Some(wait_time.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
