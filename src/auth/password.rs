use bcrypt::{hash, verify};
use crate::errors::{AppError, Result};

pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str, cost: u32) -> Result<String> {
        hash(password, cost)
            .map_err(|e| AppError::Auth(format!("Failed to hash password: {}", e)))
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Auth(format!("Failed to verify password: {}", e)))
    }

    pub fn validate_password_strength(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(AppError::Validation("Password must be at least 8 characters long".to_string()));
        }

        if password.len() > 72 {
            // bcrypt silently truncates past 72 bytes
            return Err(AppError::Validation("Password must be at most 72 bytes long".to_string()));
        }

        Ok(())
    }

    /// Usernames double as blob namespace directory names.
    pub fn validate_username(username: &str) -> Result<()> {
        if username.len() < 3 || username.len() > 32 {
            return Err(AppError::Validation("Username must be between 3 and 32 characters".to_string()));
        }

        let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.');
        if !username.chars().all(allowed) || username.starts_with('.') {
            return Err(AppError::Validation(
                "Username may only contain letters, digits, '_', '-' and '.', and must not start with '.'".to_string(),
            ));
        }

        Ok(())
    }
}
