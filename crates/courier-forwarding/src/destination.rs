//! Destination URL construction for routing targets.
//!
//! Addresses in the routing table are stored loosely: with or without a
//! scheme, sometimes with a trailing slash, with the port in its own column.

use crate::error::{ForwardingError, Result};

const HTTP_SCHEME: &str = "http://";
const HTTPS_SCHEME: &str = "https://";

/// Builds the destination URL for a routing target.
///
/// Adds `http://` when the address has no scheme, appends the port unless it
/// is absent, zero or the scheme default (80 for http, 443 for https), then
/// appends `path`.
///
/// # Errors
///
/// Returns `ForwardingError::Configuration` when the address is blank or the
/// port is outside `1..=65535`.
///
/// # Example
///
/// ```
/// use courier_forwarding::destination::destination_url;
///
/// let url = destination_url("shop.example.com", Some(8080), "/api/fuma/customer/upsert").unwrap();
/// assert_eq!(url, "http://shop.example.com:8080/api/fuma/customer/upsert");
/// ```
pub fn destination_url(address: &str, port: Option<i32>, path: &str) -> Result<String> {
    let address = address.trim().trim_end_matches('/');
    if address.is_empty() {
        return Err(ForwardingError::configuration("routing target has no address"));
    }

    let base = if address.starts_with(HTTP_SCHEME) || address.starts_with(HTTPS_SCHEME) {
        address.to_string()
    } else {
        format!("{HTTP_SCHEME}{address}")
    };

    let port = match port {
        None | Some(0) => None,
        Some(port) => Some(u16::try_from(port).map_err(|_| {
            ForwardingError::configuration(format!("routing target port {port} is out of range"))
        })?),
    };

    let is_default_port = match port {
        Some(443) => base.starts_with(HTTPS_SCHEME),
        Some(80) => base.starts_with(HTTP_SCHEME),
        _ => false,
    };

    match port {
        Some(port) if !is_default_port => Ok(format!("{base}:{port}{path}")),
        _ => Ok(format!("{base}{path}")),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const PATH: &str = "/api/fuma/customer/upsert";

    #[test]
    fn scheme_defaults_to_http() {
        assert_eq!(destination_url("10.0.0.5", None, PATH).unwrap(), format!("http://10.0.0.5{PATH}"));
    }

    #[test]
    fn explicit_scheme_is_kept() {
        assert_eq!(
            destination_url("https://shop.example.com", Some(8443), PATH).unwrap(),
            format!("https://shop.example.com:8443{PATH}")
        );
    }

    #[test]
    fn default_ports_are_omitted() {
        assert_eq!(
            destination_url("https://shop.example.com", Some(443), PATH).unwrap(),
            format!("https://shop.example.com{PATH}")
        );
        assert_eq!(
            destination_url("shop.example.com", Some(80), PATH).unwrap(),
            format!("http://shop.example.com{PATH}")
        );
        assert_eq!(
            destination_url("shop.example.com", Some(0), PATH).unwrap(),
            format!("http://shop.example.com{PATH}")
        );
    }

    #[test]
    fn cross_scheme_default_port_is_kept() {
        assert_eq!(
            destination_url("shop.example.com", Some(443), PATH).unwrap(),
            format!("http://shop.example.com:443{PATH}")
        );
        assert_eq!(
            destination_url("https://shop.example.com", Some(80), PATH).unwrap(),
            format!("https://shop.example.com:80{PATH}")
        );
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        assert_eq!(
            destination_url("http://shop.example.com//", Some(9000), PATH).unwrap(),
            format!("http://shop.example.com:9000{PATH}")
        );
    }

    #[test]
    fn invalid_targets_are_configuration_errors() {
        assert!(matches!(
            destination_url("  ", None, PATH),
            Err(ForwardingError::Configuration { .. })
        ));
        assert!(matches!(
            destination_url("shop.example.com", Some(70_000), PATH),
            Err(ForwardingError::Configuration { .. })
        ));
        assert!(matches!(
            destination_url("shop.example.com", Some(-1), PATH),
            Err(ForwardingError::Configuration { .. })
        ));
    }

    proptest! {
        #[test]
        fn url_is_well_formed(
            host in "[a-z]{1,12}(\\.[a-z]{2,6}){0,2}",
            https in any::<bool>(),
            port in proptest::option::of(0i32..=65535),
        ) {
            let address = if https { format!("https://{host}") } else { host.clone() };
            let url = destination_url(&address, port, PATH).unwrap();

            prop_assert!(url.starts_with("http://") || url.starts_with("https://"));
            prop_assert!(url.ends_with(PATH));

            let default_port = if https { 443 } else { 80 };
            match port {
                Some(p) if p != 0 && p != default_port => {
                    let expected = format!(":{p}{PATH}");
                    prop_assert!(url.ends_with(&expected));
                },
                _ => {
                    let authority = url.split("://").nth(1).unwrap_or_default();
                    prop_assert!(!authority.contains(':'));
                },
            }
        }
    }
}
