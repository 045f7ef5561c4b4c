pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use services::{AncillaryApi, IdentityProvider, RoleDirectory, RoleResolver, SessionBootstrapper};
use std::net::IpAddr;
use std::sync::Arc;

/// Shared application state containing the upstream clients.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub roles: Arc<dyn RoleDirectory>,
    pub ancillary: Arc<dyn AncillaryApi>,
    pub bootstrapper: SessionBootstrapper,
    /// Proxies allowed to name the visitor; empty trusts none.
    pub trusted_proxies: Arc<[IpAddr]>,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        roles: Arc<dyn RoleDirectory>,
        ancillary: Arc<dyn AncillaryApi>,
    ) -> Self {
        let resolver = RoleResolver::new(roles.clone(), ancillary.clone());
        let bootstrapper = SessionBootstrapper::new(identity.clone(), resolver);
        Self {
            identity,
            roles,
            ancillary,
            bootstrapper,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    pub fn with_trusted_proxies(mut self, proxies: &[IpAddr]) -> Self {
        self.trusted_proxies = proxies.into();
        self
    }
}
