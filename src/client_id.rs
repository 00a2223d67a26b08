//! Client identity from a connection's remote address.
//!
//! The split is deliberately naive: the identifier is whatever precedes a trailing
//! `:` and 1-5 digit port. Bracketed IPv6 literals keep their brackets
//! (`"[::1]:8080"` -> `"[::1]"`) and a bare `"::1"` yields `":"`. Changing this would
//! move clients between buckets, so it is kept as is.

/// Address portion of an `address:port` string, or `""` if `remote_addr` does not end
/// in a port.
///
/// Every address without a recognisable port maps to `""`, so those clients share one
/// bucket.
///
/// ```
/// use turnstile::client_id;
///
/// assert_eq!(client_id("192.168.1.7:52114"), "192.168.1.7");
/// assert_eq!(client_id("[2001:db8::1]:443"), "[2001:db8::1]");
/// assert_eq!(client_id("unix-socket"), "");
/// ```
pub fn client_id(remote_addr: &str) -> &str {
    match remote_addr.rsplit_once(':') {
        Some((host, port)) if is_port(port) && !host.contains('\n') => host,
        _ => "",
    }
}

fn is_port(s: &str) -> bool {
    (1..=5).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}
