//! Subprotocol negotiation.
//!
//! Pure functions mapping the server's configured protocol list and the
//! client's requested list to an accept/reject outcome. When the server list
//! is non-empty, the tie-break is client-preference order: the first entry
//! of the client's list that the server also supports wins.

/// Outcome of subprotocol negotiation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Negotiation {
    /// Proceed with the upgrade, speaking the given subprotocol (if any).
    Accept(Option<String>),
    /// Refuse the upgrade.
    Reject,
}

impl Negotiation {
    /// Whether the outcome is an accept.
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

/// Negotiate a subprotocol.
///
/// With an empty `supported` list the connection is accepted (with no
/// subprotocol) only when the client requested none. With a non-empty list,
/// `requested` is scanned in client order and the first entry also present
/// in `supported` is accepted; no match rejects.
pub fn negotiate(supported: &[String], requested: &[String]) -> Negotiation {
    if supported.is_empty() {
        return if requested.is_empty() {
            Negotiation::Accept(None)
        } else {
            Negotiation::Reject
        };
    }

    requested
        .iter()
        .find(|r| supported.contains(*r))
        .map_or(Negotiation::Reject, |p| {
            Negotiation::Accept(Some(p.clone()))
        })
}

/// Parse `Sec-WebSocket-Protocol` header values into an ordered token list.
///
/// Accepts any number of header occurrences, each possibly carrying a
/// comma-separated list. Entries are trimmed and empty entries discarded;
/// order is preserved across occurrences.
pub fn parse_protocol_header<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Whether `s` is a valid token per RFC 2616 §2.2.
///
/// Tokens are non-empty sequences of visible ASCII characters excluding
/// separators. This is the grammar subprotocol names must satisfy
/// (RFC 6455 §4.3 delegates to it).
pub fn is_valid_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(is_token_byte)
}

fn is_token_byte(b: u8) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={} \t";
    b > 0x1f && b < 0x7f && !SEPARATORS.contains(&b)
}
