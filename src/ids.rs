//! Pseudo-random identifiers used to seed a session and to synthesize
//! booking references when a handoff needs them.
//!
//! Every generator takes the RNG explicitly so tests can pin a seed.

use rand::Rng;

const CONFIRMATION_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CONFIRMATION_LEN: usize = 6;

/// An 8-digit account number in `10000000..=99999999`.
pub fn account_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(10_000_000u32..=99_999_999).to_string()
}

/// A flight identifier of the form `FLT-NNN` with `NNN` in `100..=999`.
pub fn flight_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("FLT-{}", rng.gen_range(100u16..=999))
}

/// A 6-character confirmation code drawn from `A-Z0-9`.
pub fn confirmation_number<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CONFIRMATION_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..CONFIRMATION_ALPHABET.len());
            CONFIRMATION_ALPHABET[idx] as char
        })
        .collect()
}

/// Account number for a new session, drawn from the thread-local RNG.
pub fn account_number_now() -> String {
    account_number(&mut rand::thread_rng())
}
