// Helpers for generating record and token identifiers.
//
// PostgreSQL does not natively support UUIDv7 for auto-generation.
// For tables where time-ordering matters (chat messages, transaction
// records), we generate UUIDv7 app-side. Token identifiers are not
// UUIDs at all: they need more entropy than a v4 provides, so they are
// drawn as 64 alphanumeric characters (~380 bits).

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use uuid::Uuid;

/// Length of a refresh token identifier in characters.
const TOKEN_ID_LEN: usize = 64;

/// Generate a new UUIDv7 (timestamp-sortable).
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a cryptographically random token identifier.
pub fn random_token_id() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_ID_LEN)
        .map(char::from)
        .collect()
}
