use rand::{Rng, rngs::OsRng};

/// Uppercase letters and digits without the easily confused `I`, `O`, `0` and `1`.
const TICKET_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const TICKET_PREFIX: &str = "EVT-";
const TICKET_SUFFIX_LEN: usize = 6;

/// Draw a candidate ticket id such as `EVT-K7M2QX`. Uniqueness is checked by
/// the caller against the store.
#[must_use]
pub fn generate_ticket_id() -> String {
    let mut rng = OsRng;
    let suffix: String = (0..TICKET_SUFFIX_LEN)
        .map(|_| char::from(TICKET_ALPHABET[rng.gen_range(0..TICKET_ALPHABET.len())]))
        .collect();
    format!("{TICKET_PREFIX}{suffix}")
}
