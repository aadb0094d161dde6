//! Identité de l'utilisateur courant
//!
//! L'identité est résolue une seule fois par requête puis passée
//! explicitement. Seule la partie locale de l'email sert de clé de dossier.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Malformed token: expected three dot-separated segments")]
    MalformedToken,

    #[error("Invalid token payload: {0}")]
    InvalidPayload(String),

    #[error("Token payload has neither 'email' nor 'sub' claim")]
    MissingClaim,

    #[error("Invalid identity '{0}'")]
    InvalidIdentity(String),
}

/// Identité (email ou sujet du jeton)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Result<Self, IdentityError> {
        let email = email.into().trim().to_string();
        let identity = Self { email };

        let key = identity.folder_key();
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        {
            return Err(IdentityError::InvalidIdentity(identity.email));
        }
        Ok(identity)
    }

    /// Lit l'identité dans la charge utile d'un jeton JWT (sans vérifier la signature)
    pub fn from_token(token: &str) -> Result<Self, IdentityError> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token).trim();

        let segments: Vec<&str> = token.split('.').collect();
        let [_, payload, _] = segments.as_slice() else {
            return Err(IdentityError::MalformedToken);
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| IdentityError::InvalidPayload(e.to_string()))?;
        let claims: Value = serde_json::from_slice(&bytes)
            .map_err(|e| IdentityError::InvalidPayload(e.to_string()))?;

        let claim = |name: &str| {
            claims
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
        };

        let email = claim("email")
            .or_else(|| claim("sub"))
            .ok_or(IdentityError::MissingClaim)?;
        Self::new(email)
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Partie locale de l'email ("jean.dupont@mairie.fr" -> "jean.dupont")
    pub fn folder_key(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload);
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_email_claim() {
        let token = token_with(r#"{"email":"jean.dupont@mairie.fr","sub":"42"}"#);
        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity.email(), "jean.dupont@mairie.fr");
        assert_eq!(identity.folder_key(), "jean.dupont");
    }

    #[test]
    fn test_sub_fallback_and_bearer_prefix() {
        let token = format!("Bearer {}", token_with(r#"{"sub":"agent@ville.fr"}"#));
        let identity = Identity::from_token(&token).unwrap();
        assert_eq!(identity.folder_key(), "agent");
    }

    #[test]
    fn test_padded_payload() {
        let header = URL_SAFE_NO_PAD.encode("{}");
        let body = format!("{}==", URL_SAFE_NO_PAD.encode(r#"{"email":"a@b.c"}"#));
        let identity = Identity::from_token(&format!("{header}.{body}.sig")).unwrap();
        assert_eq!(identity.folder_key(), "a");
    }

    #[test]
    fn test_token_errors() {
        assert_eq!(
            Identity::from_token("not-a-token").unwrap_err(),
            IdentityError::MalformedToken
        );
        assert!(matches!(
            Identity::from_token("a.!!!.c").unwrap_err(),
            IdentityError::InvalidPayload(_)
        ));
        assert_eq!(
            Identity::from_token(&token_with(r#"{"name":"x"}"#)).unwrap_err(),
            IdentityError::MissingClaim
        );
    }

    #[test]
    fn test_rejects_unsafe_folder_key() {
        assert!(Identity::new("").is_err());
        assert!(Identity::new("../etc@x.fr").is_err());
        assert!(Identity::new("..@x.fr").is_err());
        assert!(Identity::new("@x.fr").is_err());
        assert!(Identity::new("plain-user").is_ok());
    }
}
