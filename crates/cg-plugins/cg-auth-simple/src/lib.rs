//! # cg-auth-simple
//!
//! Static-account implementation of `AuthProvider`: staff sign in with a
//! username or email plus password, and get an opaque bearer token held in
//! an in-process session table.
//!
//! Password hashes come in two shapes: Argon2 PHC strings for native
//! accounts, and WordPress "portable" phpass hashes (`$P$...`) carried
//! over from the legacy staff import so old accounts work without a reset.

use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use async_trait::async_trait;
use cg_core::models::{Session, StaffIdentity, StaffRole};
use cg_core::traits::AuthProvider;
use dashmap::DashMap;
use serde::Deserialize;
use uuid::Uuid;

/// One configured staff account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffAccount {
    pub username: String,
    pub email: String,
    pub role: StaffRole,
    pub password_hash: String,
}

pub struct SimpleAuthProvider {
    accounts: Vec<StaffAccount>,
    sessions: DashMap<String, StaffIdentity>,
}

impl SimpleAuthProvider {
    pub fn new(accounts: Vec<StaffAccount>) -> Self {
        Self {
            accounts,
            sessions: DashMap::new(),
        }
    }

    /// Loads the account list from its JSON form (the `STAFF_ACCOUNTS`
    /// file the binary points at).
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let accounts: Vec<StaffAccount> = serde_json::from_str(raw)?;
        Ok(Self::new(accounts))
    }

    fn verify_password(&self, password: &str, stored: &str) -> bool {
        if stored.starts_with(phpass::PREFIX) {
            return phpass::verify(password, stored);
        }
        let parsed = match PasswordHash::new(stored) {
            Ok(p) => p,
            Err(_) => return false,
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

#[async_trait]
impl AuthProvider for SimpleAuthProvider {
    /// Accepts the account's username or email, case-insensitively, the
    /// way the legacy login did.
    async fn login(&self, identifier: &str, password: &str) -> anyhow::Result<Option<Session>> {
        let identifier = identifier.trim();
        let account = self.accounts.iter().find(|a| {
            a.username.eq_ignore_ascii_case(identifier) || a.email.eq_ignore_ascii_case(identifier)
        });
        let Some(account) = account else {
            return Ok(None);
        };
        if !self.verify_password(password, &account.password_hash) {
            return Ok(None);
        }

        let identity = StaffIdentity {
            email: account.email.clone(),
            role: account.role,
        };
        let token = Uuid::new_v4().to_string();
        self.sessions.insert(token.clone(), identity.clone());
        Ok(Some(Session { token, identity }))
    }

    async fn resolve(&self, token: &str) -> Option<StaffIdentity> {
        self.sessions.get(token).map(|entry| entry.value().clone())
    }

    async fn logout(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }
}

/// WordPress "portable" phpass verification (salted, iterated MD5).
mod phpass {
    use md5::{Digest, Md5};

    pub const PREFIX: &str = "$P$";

    const ITOA64: &[u8; 64] =
        b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

    fn encode64(input: &[u8], count: usize) -> String {
        let mut output = String::with_capacity(count / 3 * 4 + 4);
        let mut i = 0;
        while i < count {
            let mut value = input[i] as u32;
            i += 1;
            output.push(ITOA64[(value & 0x3f) as usize] as char);
            if i < count {
                value |= (input[i] as u32) << 8;
            }
            output.push(ITOA64[((value >> 6) & 0x3f) as usize] as char);
            i += 1;
            if i >= count {
                break;
            }
            value |= (input[i] as u32) << 16;
            output.push(ITOA64[((value >> 12) & 0x3f) as usize] as char);
            i += 1;
            if i >= count {
                break;
            }
            output.push(ITOA64[((value >> 18) & 0x3f) as usize] as char);
        }
        output
    }

    fn md5(parts: &[&[u8]]) -> Vec<u8> {
        let mut hasher = Md5::new();
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_vec()
    }

    pub fn verify(password: &str, hash: &str) -> bool {
        let bytes = hash.as_bytes();
        if !hash.is_ascii() || !hash.starts_with(PREFIX) || bytes.len() != 34 {
            return false;
        }
        let Some(count_log2) = ITOA64.iter().position(|&b| b == bytes[3]) else {
            return false;
        };
        // Anything past 2^30 iterations is not a legitimate phpass hash.
        if !(7..=30).contains(&count_log2) {
            return false;
        }
        let count = 1u32 << count_log2;
        let salt = &hash[4..12];

        let mut digest = md5(&[salt.as_bytes(), password.as_bytes()]);
        for _ in 0..count {
            digest = md5(&[&digest, password.as_bytes()]);
        }

        let rebuilt = format!("{PREFIX}{}{salt}{}", bytes[3] as char, encode64(&digest, 16));
        rebuilt == hash
    }

}
