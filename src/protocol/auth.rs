//! Native 4.1 authentication scramble (spec §4.3 "Scramble").
//!
//! Grounded on `mason-mariadb`'s handshake-response construction and
//! `sqlx-mysql`'s dependency on `sha1` for the same computation.

use sha1::{Digest, Sha1};

/// `token = SHA1(password) XOR SHA1(salt || SHA1(SHA1(password)))`.
///
/// An empty password yields an empty token (no auth attempted), matching
/// MySQL's own client behavior.
pub fn scramble(password: &[u8], salt: &[u8; 20]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = sha1_digest(password);
    let stage2 = sha1_digest(&stage1);

    let mut hasher = Sha1::new();
    hasher.update(salt);
    hasher.update(stage2);
    let salted = hasher.finalize();

    stage1
        .iter()
        .zip(salted.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

fn sha1_digest(input: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(input);
    hasher.finalize().into()
}
