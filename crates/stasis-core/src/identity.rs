//! Citizen ids derived from peer network identities.
//!
//! A citizen id is the last eight characters of the peer id, rotated through
//! the alphanumeric alphabet by a repeating key derived from a shared
//! secret. Anyone holding the secret can reverse it. This hides peer ids
//! from casual inspection only and offers no protection against a
//! participant who knows the secret.

use stasis_types::CitizenId;

/// Number of trailing peer-id characters that make up a citizen id.
pub const CITIZEN_ID_LEN: usize = 8;

const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Errors from citizen id derivation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// The shared secret is empty.
    #[error("identity secret must not be empty")]
    EmptySecret,

    /// The peer id is empty.
    #[error("peer id must not be empty")]
    EmptyPeerId,
}

/// Derive the citizen id of the peer identified by `peer_id`.
///
/// # Errors
///
/// Returns [`IdentityError`] if either input is empty.
pub fn citizen_id(secret: &str, peer_id: &str) -> Result<CitizenId, IdentityError> {
    if peer_id.is_empty() {
        return Err(IdentityError::EmptyPeerId);
    }
    let tail: String = {
        let chars: Vec<char> = peer_id.chars().collect();
        let skip = chars.len().saturating_sub(CITIZEN_ID_LEN);
        chars.into_iter().skip(skip).collect()
    };
    encode(secret, &tail).map(CitizenId)
}

/// Rotate every alphanumeric character of `plain` forward by the key.
///
/// # Errors
///
/// Returns [`IdentityError::EmptySecret`] if `secret` is empty.
pub fn encode(secret: &str, plain: &str) -> Result<String, IdentityError> {
    rotate(secret, plain, Direction::Forward)
}

/// Reverse [`encode`].
///
/// # Errors
///
/// Returns [`IdentityError::EmptySecret`] if `secret` is empty.
pub fn decode(secret: &str, encoded: &str) -> Result<String, IdentityError> {
    rotate(secret, encoded, Direction::Backward)
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

fn rotate(secret: &str, input: &str, direction: Direction) -> Result<String, IdentityError> {
    let key = secret.as_bytes();
    if key.is_empty() {
        return Err(IdentityError::EmptySecret);
    }
    let len = ALPHABET.len();
    let out = input
        .chars()
        .zip(key.iter().cycle())
        .map(|(c, &k)| {
            let Some(pos) = u8::try_from(c)
                .ok()
                .and_then(|b| ALPHABET.iter().position(|&a| a == b))
            else {
                return c;
            };
            let shift = usize::from(k).checked_rem(len).unwrap_or(0);
            let next = match direction {
                Direction::Forward => pos.wrapping_add(shift),
                Direction::Backward => pos.wrapping_add(len).wrapping_sub(shift),
            }
            .checked_rem(len)
            .unwrap_or(pos);
            ALPHABET.get(next).map_or(c, |&b| char::from(b))
        })
        .collect();
    Ok(out)
}
