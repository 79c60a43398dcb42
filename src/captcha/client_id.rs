//! CAPTCHA client identifiers.

use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the request fingerprint, 128 random bits and the
/// nanosecond clock. Always 64 lowercase hex characters.
pub fn generate_client_id(user_agent: &str, host: &str, app_id: i64, client_ip: IpAddr) -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(user_agent.as_bytes());
    hasher.update(host.as_bytes());
    hasher.update(app_id.to_be_bytes());
    hasher.update(client_ip.to_string().as_bytes());
    hasher.update(nonce);
    hasher.update(nanos.to_be_bytes());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}
