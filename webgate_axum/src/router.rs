use axum::Router;

use webgate::RoutePrefixes;

use crate::pipeline::PipelineError;
use crate::terminator::not_found;

/// A router and the prefix it is mounted at.
pub struct RouteGroup {
    prefix: String,
    router: Router,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>, router: Router) -> Self {
        Self {
            prefix: prefix.into(),
            router,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Route groups in registration order.
#[derive(Default)]
pub struct RouteGroups {
    groups: Vec<RouteGroup>,
}

impl RouteGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, prefix: impl Into<String>, router: Router) -> Self {
        self.groups.push(RouteGroup::new(prefix, router));
        self
    }

    /// General and local-auth routes at the root, then the two identity
    /// providers under their configured prefixes.
    pub fn standard(
        prefixes: &RoutePrefixes,
        general: Router,
        local_auth: Router,
        provider_a: Router,
        provider_b: Router,
    ) -> Self {
        Self::new()
            .group("/", general)
            .group("/", local_auth)
            .group(prefixes.provider_a.clone(), provider_a)
            .group(prefixes.provider_b.clone(), provider_b)
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(RouteGroup::prefix)
    }
}

fn validate_prefix(prefix: &str) -> Result<(), PipelineError> {
    let valid = prefix == "/" || (prefix.starts_with('/') && !prefix.ends_with('/'));
    if valid {
        Ok(())
    } else {
        Err(PipelineError::InvalidPrefix(prefix.to_string()))
    }
}

/// Mount every group. Unmatched paths and unmatched methods on known paths
/// both end in the 404.
pub(crate) fn build_router(groups: RouteGroups) -> Result<Router, PipelineError> {
    let mut router = Router::new();

    for group in groups.groups {
        validate_prefix(&group.prefix)?;
        tracing::debug!("Mounting route group at {}", group.prefix);
        router = if group.prefix == "/" {
            router.merge(group.router)
        } else {
            router.nest(&group.prefix, group.router)
        };
    }

    Ok(router
        .method_not_allowed_fallback(not_found)
        .fallback(not_found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_prefix() {
        assert!(validate_prefix("/").is_ok());
        assert!(validate_prefix("/google").is_ok());
        assert!(validate_prefix("/auth/google").is_ok());

        assert_eq!(
            validate_prefix("google"),
            Err(PipelineError::InvalidPrefix("google".to_string()))
        );
        assert!(validate_prefix("/google/").is_err());
        assert!(validate_prefix("").is_err());
    }

    #[test]
    fn test_standard_groups_order() {
        let prefixes = RoutePrefixes {
            provider_a: "/google".to_string(),
            provider_b: "/facebook".to_string(),
        };
        let groups = RouteGroups::standard(
            &prefixes,
            Router::new(),
            Router::new(),
            Router::new(),
            Router::new(),
        );

        let mounted: Vec<_> = groups.prefixes().collect();
        assert_eq!(mounted, vec!["/", "/", "/google", "/facebook"]);
    }

    #[test]
    fn test_build_router_rejects_bad_prefix() {
        let groups = RouteGroups::new().group("/google/", Router::new());
        assert!(matches!(
            build_router(groups),
            Err(PipelineError::InvalidPrefix(_))
        ));
    }
}
