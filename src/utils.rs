use argon2::password_hash::{
    self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use rand::Rng;
use uuid::Uuid;

/// Argon2id with default parameters, stored as a PHC string
/// (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let mut salt = [0u8; 16];
    rand::rng().fill(&mut salt);
    let salt = SaltString::encode_b64(&salt)?;

    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(hash) = PasswordHash::new(stored) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &hash)
        .is_ok()
}

/// Six digit one-time code.
pub fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000u32))
}

pub fn generate_referral_code() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

pub fn generate_session_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

pub fn new_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

/// `alice@example.com` becomes `al***@example.com`.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if local.chars().count() >= 2 => {
            let prefix: String = local.chars().take(2).collect();
            format!("{}***@{}", prefix, domain)
        }
        _ => email.to_string(),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter22").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
    }

    #[test]
    fn password_hashes_are_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn malformed_hashes_never_verify() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$1$salt$digest"));
        assert!(!verify_password("x", "$argon2id$v=19$m=19456,t=2,p=1$bad"));
    }

    #[test]
    fn otp_is_six_digits() {
        for _ in 0..32 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn referral_codes_are_uppercase() {
        let code = generate_referral_code();

        assert_eq!(code.len(), 8);
        assert_eq!(code, code.to_uppercase());
    }

    #[test]
    fn masks_email_local_part() {
        assert_eq!(mask_email("alice@example.com"), "al***@example.com");
        assert_eq!(mask_email("al@example.com"), "al***@example.com");
        assert_eq!(mask_email("a@example.com"), "a@example.com");
        assert_eq!(mask_email("not-an-email"), "not-an-email");
    }

    #[test]
    fn normalizes_email() {
        assert_eq!(normalize_email("  Bob@Example.COM "), "bob@example.com");
    }
}
