use rand::Rng;

pub const TOKEN_LEN: usize = 6;

/// Generate a 6-digit handover code, zero-padded.
///
/// The code gates transfer of a physical asset, so it comes from the
/// thread-local CSPRNG rather than a cheap PRNG. Leading zeros are
/// significant: the code is compared as an exact string.
pub fn generate_token() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Exact string comparison, no normalization.
pub fn token_matches(expected: &str, entered: &str) -> bool {
    expected == entered
}
