//! The `graffiti:` object URL grammar (§4.E, §6): `graffiti:<enc-actor>:<enc-content-address>`.

use crate::error::ProtocolError;
use graffiti_crypto::address::Address;
use graffiti_types::actor::ActorId;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

const SCHEME: &str = "graffiti:";

/// `enc` leaves `!` and `~` unencoded since the grammar uses them as
/// placeholders for the substituted `:` and `/`.
const ENC_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'!').remove(b'~');

/// Applies the `enc` transform: substitutes `:`→`!` and `/`→`~`, then
/// percent-encodes everything else outside `[A-Za-z0-9!~]`.
fn enc(s: &str) -> String {
    let substituted = s.replace(':', "!").replace('/', "~");
    utf8_percent_encode(&substituted, ENC_SET).to_string()
}

/// Inverts `enc`: percent-decodes, then substitutes `!`→`:` and `~`→`/`.
fn dec(s: &str) -> Result<String, ProtocolError> {
    let decoded = percent_decode_str(s)
        .decode_utf8()
        .map_err(|e| ProtocolError::MalformedUrl(e.to_string()))?;
    Ok(decoded.replace('!', ":").replace('~', "/"))
}

/// Builds the object URL for `actor` and its content `address`.
pub fn encode_url(actor: &str, address: &Address) -> String {
    let encoded_address = graffiti_crypto::codec::encode(address.as_bytes());
    format!("{SCHEME}{}:{}", enc(actor), enc(&encoded_address))
}

/// Parses an object URL back into its actor and content address.
pub fn decode_url(url: &str) -> Result<(ActorId, Address), ProtocolError> {
    let rest = url
        .strip_prefix(SCHEME)
        .ok_or_else(|| ProtocolError::MalformedUrl(format!("missing '{SCHEME}' scheme")))?;
    let (enc_actor, enc_address) = rest
        .split_once(':')
        .ok_or_else(|| ProtocolError::MalformedUrl("missing actor/address separator".into()))?;
    let actor = dec(enc_actor)?;
    let address_str = dec(enc_address)?;
    let address_bytes = graffiti_crypto::codec::decode(&address_str)
        .map_err(|e| ProtocolError::MalformedUrl(e.to_string()))?;
    let address = Address::from_bytes(&address_bytes)
        .map_err(|e| ProtocolError::MalformedUrl(e.to_string()))?;
    Ok((actor, address))
}
