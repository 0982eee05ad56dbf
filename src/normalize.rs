//! Hostname to ASCII (Punycode) conversion for internationalized domains.

use crate::errors::ProxyError;
use tracing::debug;

/// UTS #46 processing for lookup: transitional mapping, STD3 rules and
/// hyphen checks. Label and name lengths are not limited here.
fn idna_config() -> idna::Config {
    idna::Config::default()
        .use_std3_ascii_rules(true)
        .transitional_processing(true)
        .check_hyphens(true)
        .verify_dns_length(false)
}

/// Convert `host` to its ASCII form, e.g. `окна.рф` to `xn--80atjc.xn--p1ai`.
pub fn to_ascii(host: &str) -> Result<String, ProxyError> {
    idna_config().to_ascii(host).map_err(|e| {
        debug!(host, error = ?e, "idna conversion failed");
        ProxyError::Normalization(host.to_string())
    })
}

/// Render the operator's error template for a rejected hostname. Every `%s`
/// in the template is replaced by the hostname.
pub fn render_error_message(template: &str, host: &str) -> String {
    template.replace("%s", host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_ascii() {
        let cases = [
            ("example.com", "example.com"),
            ("test.example.com", "test.example.com"),
            ("test.test.example.com", "test.test.example.com"),
            ("окна.рф", "xn--80atjc.xn--p1ai"),
            ("a.bc", "a.bc"),
            ("xn--kxae4bafwg.xn--pxaix.gr", "xn--kxae4bafwg.xn--pxaix.gr"),
            (
                "subdomain.subdomainsubdomainsuèdomainsubdomainsubdomainsubdomainsubdomain.net",
                "subdomain.xn--subdomainsubdomainsudomainsubdomainsubdomainsubdomainsubdomain-1mf.net",
            ),
        ];

        for (input, expected) in cases {
            assert_eq!(to_ascii(input).unwrap(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_to_ascii_maps_for_lookup() {
        assert_eq!(to_ascii("EXAMPLE.COM").unwrap(), "example.com");
        assert_eq!(to_ascii("straße.de").unwrap(), "strasse.de");
    }

    #[test]
    fn test_to_ascii_rejects_invalid_names() {
        for input in ["exa_mple.com", "ex ample.com", "-example.com", "example-.com"] {
            assert!(
                matches!(to_ascii(input), Err(ProxyError::Normalization(ref h)) if h == input),
                "input {}",
                input
            );
        }
    }

    #[test]
    fn test_render_error_message() {
        assert_eq!(
            render_error_message("%s: invalid domain name", "exa_mple.com"),
            "exa_mple.com: invalid domain name"
        );
        assert_eq!(render_error_message("no such domain", "x"), "no such domain");
    }
}
