//! Token claims and identity fields
//!
//! The backend signs the token; this client never holds the key, so decoding
//! only checks structure (three segments, base64url JSON) and never the
//! signature. Nothing decoded here may be treated as a security boundary.

use actfijo_core::{validation_error, ActFijoError, ActFijoResult, ErrorContext};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Claims carried by the bearer token, using the backend's wire names
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub nombre_completo: Option<String>,
    #[serde(default)]
    pub empresa_id: Option<String>,
    #[serde(default)]
    pub empresa_nombre: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_admin: bool,
    #[serde(default)]
    pub empleado_id: Option<String>,
    #[serde(default)]
    pub theme_preference: Option<String>,
    #[serde(default)]
    pub theme_custom_color: Option<String>,
    #[serde(default)]
    pub theme_glow_enabled: Option<bool>,
    /// Expiration time (unix seconds)
    #[serde(default)]
    pub exp: Option<i64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl TokenClaims {
    /// Decode the payload of a raw token without verifying its signature
    pub fn decode(raw_token: &str) -> ActFijoResult<Self> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(raw_token.trim(), &DecodingKey::from_secret(&[]), &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("Token decoding failed: {}", e);
                ActFijoError::InvalidToken {
                    message: e.to_string(),
                    context: ErrorContext::new("session_store")
                        .with_operation("decode_token")
                        .with_suggestion("Log in again to obtain a fresh token"),
                }
            })
    }

    /// Whether `exp` is missing or not strictly after `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.exp {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    /// Identity fields exposed to the rest of the application
    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.nombre_completo.clone(),
            company_id: self.empresa_id.clone(),
            company_name: self.empresa_nombre.clone(),
            employee_id: self.empleado_id.clone(),
            theme: ThemePrefs {
                theme_preference: self
                    .theme_preference
                    .as_deref()
                    .and_then(ThemePreference::parse_lenient),
                theme_custom_color: self.theme_custom_color.clone(),
                theme_glow_enabled: self.theme_glow_enabled,
            },
        }
    }

    pub fn role_set(&self) -> HashSet<String> {
        self.roles.iter().cloned().collect()
    }
}

/// Identity claims of the current session (read-only outside the store)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub employee_id: Option<String>,
    pub theme: ThemePrefs,
}

/// Theme mode stored per employee
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    Light,
    Dark,
    Custom,
}

impl ThemePreference {
    /// Unknown or empty values map to `None` instead of failing the session
    pub fn parse_lenient(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl std::fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThemePreference::Light => write!(f, "light"),
            ThemePreference::Dark => write!(f, "dark"),
            ThemePreference::Custom => write!(f, "custom"),
        }
    }
}

impl std::str::FromStr for ThemePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(ThemePreference::Light),
            "dark" => Ok(ThemePreference::Dark),
            "custom" => Ok(ThemePreference::Custom),
            other => Err(format!("Unknown theme preference: {}", other)),
        }
    }
}

/// Change to the stored theme mode; `Reset` goes over the wire as `""`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceUpdate {
    Set(ThemePreference),
    Reset,
}

impl PreferenceUpdate {
    pub fn resolve(self) -> Option<ThemePreference> {
        match self {
            PreferenceUpdate::Set(preference) => Some(preference),
            PreferenceUpdate::Reset => None,
        }
    }
}

impl From<ThemePreference> for PreferenceUpdate {
    fn from(preference: ThemePreference) -> Self {
        PreferenceUpdate::Set(preference)
    }
}

impl std::str::FromStr for PreferenceUpdate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "reset" => Ok(PreferenceUpdate::Reset),
            other => other.parse().map(PreferenceUpdate::Set),
        }
    }
}

impl Serialize for PreferenceUpdate {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PreferenceUpdate::Set(preference) => preference.serialize(serializer),
            PreferenceUpdate::Reset => serializer.serialize_str(""),
        }
    }
}

impl<'de> Deserialize<'de> for PreferenceUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(PreferenceUpdate::Reset),
            Some(raw) => raw.parse().map_err(serde::de::Error::custom),
        }
    }
}

fn lenient_preference<'de, D>(deserializer: D) -> Result<Option<ThemePreference>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ThemePreference::parse_lenient))
}

/// Theme-related identity fields
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemePrefs {
    #[serde(default, deserialize_with = "lenient_preference")]
    pub theme_preference: Option<ThemePreference>,
    #[serde(default)]
    pub theme_custom_color: Option<String>,
    #[serde(default)]
    pub theme_glow_enabled: Option<bool>,
}

/// Partial theme update; absent fields are left untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ThemePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_preference: Option<PreferenceUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_custom_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_glow_enabled: Option<bool>,
}

impl ThemePatch {
    pub fn is_empty(&self) -> bool {
        self.theme_preference.is_none()
            && self.theme_custom_color.is_none()
            && self.theme_glow_enabled.is_none()
    }

    /// Same rules the backend applies: `#RGB` or `#RRGGBB`, or empty to reset
    pub fn validate(&self) -> ActFijoResult<()> {
        if let Some(color) = &self.theme_custom_color {
            let well_formed = color.starts_with('#') && matches!(color.len(), 4 | 7);
            if !color.is_empty() && !well_formed {
                return Err(validation_error!(
                    format!("Invalid color format '{}'", color),
                    "theme_custom_color",
                    "session_store"
                ));
            }
        }
        Ok(())
    }

    /// Shallow merge onto existing prefs
    pub fn apply_to(&self, prefs: &mut ThemePrefs) {
        if let Some(update) = self.theme_preference {
            prefs.theme_preference = update.resolve();
        }
        if let Some(color) = &self.theme_custom_color {
            prefs.theme_custom_color = Some(color.clone());
        }
        if let Some(glow) = self.theme_glow_enabled {
            prefs.theme_glow_enabled = Some(glow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn mint(payload: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &payload,
            &EncodingKey::from_secret(b"backend-only-secret"),
        )
        .unwrap()
    }

    #[test]
    fn decodes_backend_claims_without_the_signing_key() {
        let token = mint(json!({
            "username": "mrojas",
            "email": "mrojas@empresa.bo",
            "nombre_completo": "Maria Rojas",
            "empresa_nombre": "Empresa Demo",
            "roles": ["Empleado", "Jefe"],
            "is_admin": false,
            "empleado_id": "9b2e",
            "theme_preference": "custom",
            "theme_custom_color": "#6366F1",
            "theme_glow_enabled": true,
            "exp": 4_102_444_800i64,
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert_eq!(claims.username.as_deref(), Some("mrojas"));
        assert_eq!(claims.roles, vec!["Empleado", "Jefe"]);
        assert!(!claims.is_admin);

        let identity = claims.identity();
        assert_eq!(identity.full_name.as_deref(), Some("Maria Rojas"));
        assert_eq!(identity.company_name.as_deref(), Some("Empresa Demo"));
        assert_eq!(identity.theme.theme_preference, Some(ThemePreference::Custom));
        assert_eq!(identity.theme.theme_glow_enabled, Some(true));
    }

    #[test]
    fn null_roles_and_admin_flag_default() {
        let token = mint(json!({
            "username": "root",
            "roles": null,
            "is_admin": null,
            "theme_preference": null,
            "exp": 4_102_444_800i64,
        }));

        let claims = TokenClaims::decode(&token).unwrap();
        assert!(claims.roles.is_empty());
        assert!(!claims.is_admin);
        assert_eq!(claims.identity().theme.theme_preference, None);
    }

    #[test]
    fn malformed_tokens_are_invalid() {
        for raw in ["", "not-a-token", "a.b", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.bm9wZQ.sig"] {
            let error = TokenClaims::decode(raw).unwrap_err();
            assert!(
                matches!(error, ActFijoError::InvalidToken { .. }),
                "{raw:?} should be invalid, got {error:?}"
            );
        }
    }

    #[test]
    fn expiry_is_inclusive_and_missing_exp_counts_as_expired() {
        let claims = TokenClaims {
            exp: Some(1_000),
            ..TokenClaims::default()
        };
        assert!(claims.is_expired_at(1_000));
        assert!(claims.is_expired_at(1_001));
        assert!(!claims.is_expired_at(999));

        assert!(TokenClaims::default().is_expired_at(0));
    }

    #[test]
    fn theme_patch_validation_mirrors_the_backend() {
        let ok = ThemePatch {
            theme_custom_color: Some("#fff".to_string()),
            ..ThemePatch::default()
        };
        assert!(ok.validate().is_ok());

        let reset = ThemePatch {
            theme_custom_color: Some(String::new()),
            ..ThemePatch::default()
        };
        assert!(reset.validate().is_ok());

        let bad = ThemePatch {
            theme_custom_color: Some("6366F1".to_string()),
            ..ThemePatch::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(ActFijoError::Validation { .. })
        ));
    }

    #[test]
    fn patch_only_overwrites_present_fields() {
        let mut prefs = ThemePrefs {
            theme_preference: Some(ThemePreference::Dark),
            theme_custom_color: Some("#6366F1".to_string()),
            theme_glow_enabled: Some(false),
        };

        ThemePatch {
            theme_glow_enabled: Some(true),
            ..ThemePatch::default()
        }
        .apply_to(&mut prefs);

        assert_eq!(prefs.theme_preference, Some(ThemePreference::Dark));
        assert_eq!(prefs.theme_custom_color.as_deref(), Some("#6366F1"));
        assert_eq!(prefs.theme_glow_enabled, Some(true));
    }

    #[test]
    fn preference_reset_clears_the_mode_and_serializes_empty() {
        let patch = ThemePatch {
            theme_preference: Some(PreferenceUpdate::Reset),
            ..ThemePatch::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"theme_preference": ""})
        );

        let mut prefs = ThemePrefs {
            theme_preference: Some(ThemePreference::Custom),
            ..ThemePrefs::default()
        };
        patch.apply_to(&mut prefs);
        assert_eq!(prefs.theme_preference, None);

        assert_eq!(
            "reset".parse::<PreferenceUpdate>(),
            Ok(PreferenceUpdate::Reset)
        );
        assert_eq!(
            "dark".parse::<PreferenceUpdate>(),
            Ok(PreferenceUpdate::Set(ThemePreference::Dark))
        );
        assert!("sepia".parse::<PreferenceUpdate>().is_err());
    }

    #[test]
    fn server_prefs_accept_empty_preference() {
        let prefs: ThemePrefs = serde_json::from_value(json!({
            "theme_preference": "",
            "theme_custom_color": null,
            "theme_glow_enabled": false,
        }))
        .unwrap();
        assert_eq!(prefs.theme_preference, None);
        assert_eq!(prefs.theme_glow_enabled, Some(false));
    }
}
