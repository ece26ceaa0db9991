//! Activation Policy
//!
//! Decides once, at facade construction, whether caching is in effect for
//! the current caller. The inputs are supplied by the embedding application;
//! nothing here inspects the process environment.

use std::net::IpAddr;

use super::config::CacheConfig;

/// Caller context read by the activation policy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationContext {
    /// Caller is an admin / elevated user
    pub is_admin: bool,
    /// Forces the outcome, bypassing every other input (tests)
    pub test_override: Option<bool>,
    /// Running from an interactive shell rather than serving a request
    pub interactive: bool,
    /// Address the request came from
    pub remote_addr: Option<IpAddr>,
    /// Address the request was served on
    pub server_addr: Option<IpAddr>,
}

impl ActivationContext {
    /// Request source equals the serving address
    pub fn is_same_host(&self) -> bool {
        matches!((self.remote_addr, self.server_addr), (Some(remote), Some(server)) if remote == server)
    }

    /// Caller is a developer or local operator: interactive, on loopback, or
    /// on the serving host itself
    pub fn is_developer(&self) -> bool {
        self.interactive
            || self.remote_addr.map_or(false, |addr| addr.is_loopback())
            || self.is_same_host()
    }
}

/// Compute whether caching is active
pub fn is_active(config: &CacheConfig, ctx: &ActivationContext) -> bool {
    if let Some(forced) = ctx.test_override {
        return forced;
    }
    if !config.enabled {
        return false;
    }
    if config.disable_for_admins && ctx.is_admin {
        return false;
    }
    if config.disable_for_developers && ctx.is_developer() {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn remote(addr: IpAddr) -> ActivationContext {
        ActivationContext {
            remote_addr: Some(addr),
            ..Default::default()
        }
    }

    #[test]
    fn test_enabled_by_default() {
        assert!(is_active(&CacheConfig::default(), &ActivationContext::default()));
    }

    #[test]
    fn test_master_switch() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(!is_active(&config, &ActivationContext::default()));
    }

    #[test]
    fn test_test_override_wins() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let ctx = ActivationContext {
            test_override: Some(true),
            ..Default::default()
        };
        assert!(is_active(&config, &ctx));

        let ctx = ActivationContext {
            test_override: Some(false),
            ..Default::default()
        };
        assert!(!is_active(&CacheConfig::default(), &ctx));
    }

    #[test]
    fn test_developer_detection() {
        assert!(remote(IpAddr::V4(Ipv4Addr::LOCALHOST)).is_developer());
        assert!(remote(IpAddr::V6(Ipv6Addr::LOCALHOST)).is_developer());
        assert!(!remote(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))).is_developer());

        let same_host = ActivationContext {
            remote_addr: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            server_addr: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))),
            ..Default::default()
        };
        assert!(same_host.is_same_host());
        assert!(same_host.is_developer());

        let interactive = ActivationContext {
            interactive: true,
            ..Default::default()
        };
        assert!(interactive.is_developer());
    }

    #[test]
    fn test_disabled_for_developers_only() {
        let config = CacheConfig {
            disable_for_developers: true,
            ..Default::default()
        };
        assert!(!is_active(&config, &remote(IpAddr::V4(Ipv4Addr::LOCALHOST))));
        assert!(is_active(
            &config,
            &remote(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 1)))
        ));
    }

    #[test]
    fn test_disabled_for_admins_only() {
        let config = CacheConfig {
            disable_for_admins: true,
            ..Default::default()
        };
        let admin = ActivationContext {
            is_admin: true,
            ..Default::default()
        };
        assert!(!is_active(&config, &admin));
        assert!(is_active(&config, &ActivationContext::default()));
    }
}
