//! Identifier classification
//!
//! Classifies the raw identifier an administrator supplies into one of the
//! supported kinds. Precedence is first-match-wins, evaluated in a fixed
//! order so a numeric-looking domain is never mis-read as an address and a
//! short name is never mis-read as a domain label:
//!
//! 1. Account-name grammar (`^[A-Za-z0-9_]{2,16}$`)
//! 2. IPv4 dotted quad
//! 3. Full (non-abbreviated) IPv6
//! 4. Configured secondary-platform prefix
//! 5. Domain-label grammar
//! 6. Invalid
//!
//! Classification is pure and total over input strings; resolver
//! availability for secondary-platform names is checked by the engine, not
//! here.

use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;

static ACCOUNT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{2,16}$").expect("valid regex"));

static IPV4: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").expect("valid regex"));

static IPV6: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}$").expect("valid regex")
});

// Labels separated by dots, each 1-63 chars, no leading/trailing hyphen,
// alphabetic TLD of at least 2 chars.
static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z]{2,63}$")
        .expect("valid regex")
});

/// Maximum total length of a domain name
const MAX_DOMAIN_LEN: usize = 253;

/// A classified identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// A username on the primary platform, requires external resolution
    AccountName(String),
    /// Literal IPv4 address
    AddressV4(String),
    /// Literal, non-abbreviated IPv6 address
    AddressV6(String),
    /// A prefixed secondary-platform name, requires the secondary resolver
    SecondaryName {
        /// The raw identifier including the prefix
        raw: String,
        /// The name with the prefix stripped, as the secondary resolver wants it
        name: String,
    },
    /// A domain name, kept as the literal string
    Domain(String),
    /// Matches no supported grammar
    Invalid,
}

/// Classify a raw identifier
///
/// `secondary_prefix` is the configured secondary-platform name prefix, or
/// `None` when that platform is not configured (prefixed input then falls
/// through to the remaining grammars).
pub fn classify(raw: &str, secondary_prefix: Option<&str>) -> Identifier {
    if ACCOUNT_NAME.is_match(raw) {
        return Identifier::AccountName(raw.to_string());
    }

    if IPV4.is_match(raw) {
        // The quad grammar alone admits octets above 255; require a strict
        // parse so an impossible address never becomes a list key.
        return match raw.parse::<Ipv4Addr>() {
            Ok(_) => Identifier::AddressV4(raw.to_string()),
            Err(_) => Identifier::Invalid,
        };
    }

    if IPV6.is_match(raw) {
        return Identifier::AddressV6(raw.to_string());
    }

    if let Some(prefix) = secondary_prefix
        && !prefix.is_empty()
        && let Some(name) = raw.strip_prefix(prefix)
        && !name.is_empty()
    {
        return Identifier::SecondaryName {
            raw: raw.to_string(),
            name: name.to_string(),
        };
    }

    if raw.len() <= MAX_DOMAIN_LEN && DOMAIN.is_match(raw) {
        return Identifier::Domain(raw.to_string());
    }

    Identifier::Invalid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Stevie")]
    #[case("ab")]
    #[case("Player_123")]
    #[case("0123456789abcdef")]
    fn account_name_grammar_wins(#[case] raw: &str) {
        assert_eq!(
            classify(raw, None),
            Identifier::AccountName(raw.to_string())
        );
    }

    #[rstest]
    #[case("192.168.1.5")]
    #[case("8.8.8.8")]
    #[case("255.255.255.255")]
    fn valid_ipv4(#[case] raw: &str) {
        assert_eq!(classify(raw, None), Identifier::AddressV4(raw.to_string()));
    }

    #[test]
    fn overflowing_quad_is_invalid() {
        // matches the dotted-quad grammar but is not a real address
        assert_eq!(classify("300.1.1.1", None), Identifier::Invalid);
    }

    #[test]
    fn full_ipv6() {
        let raw = "2001:0db8:85a3:0000:0000:8a2e:0370:7334";
        assert_eq!(classify(raw, None), Identifier::AddressV6(raw.to_string()));
        // abbreviated forms are not accepted
        assert_eq!(classify("::1", None), Identifier::Invalid);
    }

    #[test]
    fn secondary_prefix() {
        let id = classify(".BedrockKid", Some("."));
        assert_eq!(
            id,
            Identifier::SecondaryName {
                raw: ".BedrockKid".to_string(),
                name: "BedrockKid".to_string(),
            }
        );

        // without a configured prefix the same input is invalid
        assert_eq!(classify(".BedrockKid", None), Identifier::Invalid);

        // a bare prefix carries no name
        assert_eq!(classify(".", Some(".")), Identifier::Invalid);
    }

    #[rstest]
    #[case("example.com")]
    #[case("play.example-server.net")]
    #[case("a.b.c.example.org")]
    fn valid_domain(#[case] raw: &str) {
        assert_eq!(classify(raw, None), Identifier::Domain(raw.to_string()));
    }

    #[test]
    fn precedence_name_before_domain() {
        // a bare name that would also be a valid label never becomes a domain
        assert_eq!(
            classify("example", None),
            Identifier::AccountName("example".to_string())
        );
    }

    #[test]
    fn precedence_ipv4_before_domain() {
        // numeric-looking input is an address, never a domain
        assert_eq!(
            classify("192.168.1.5", None),
            Identifier::AddressV4("192.168.1.5".to_string())
        );
    }

    #[rstest]
    #[case("")]
    #[case("a")]
    #[case("way_too_long_for_an_account_name")]
    #[case("has space.com ")]
    #[case("-leadinghyphen.com")]
    #[case("trailinghyphen-.com")]
    #[case("example.c0m")]
    #[case("not a name")]
    fn invalid_inputs(#[case] raw: &str) {
        assert_eq!(classify(raw, None), Identifier::Invalid);
    }

    #[test]
    fn domain_length_cap() {
        let label = "a".repeat(60);
        let long = format!("{label}.{label}.{label}.{label}.com");
        assert!(long.len() > 253);
        assert_eq!(classify(&long, None), Identifier::Invalid);
    }
}
