//! Security PIN (S-PIN) authorization for privileged vehicle actions

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::error::{AudiClientError, Result};

/// Response of `security-pin-auth-requested`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAuthInfoResponse {
    pub security_pin_auth_info: PinAuthInfo,
}

/// Challenge issued for one service operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAuthInfo {
    pub security_token: String,
    pub security_pin_transmission_details: SecurityPinTransmission,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPinTransmission {
    pub challenge: String,
    #[serde(default)]
    pub hash_procedure_version: u32,
    #[serde(default)]
    pub user_challenge: Option<String>,
}

/// Body of `security-pin-auth-completed`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAuthCompleteRequest {
    pub security_pin_authentication: PinAuthentication,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAuthentication {
    pub security_pin: SecurityPin,
    pub security_token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityPin {
    pub challenge: String,
    pub security_pin_hash: String,
}

/// Response of `security-pin-auth-completed`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinAuthCompleteResponse {
    pub security_token: String,
}

impl PinAuthCompleteRequest {
    /// Answer a challenge with the user's PIN
    pub fn answer(info: &PinAuthInfo, pin: &str) -> Result<Self> {
        let challenge = info.security_pin_transmission_details.challenge.clone();
        let security_pin_hash = security_pin_hash(pin, &challenge)?;
        Ok(Self {
            security_pin_authentication: PinAuthentication {
                security_pin: SecurityPin {
                    challenge,
                    security_pin_hash,
                },
                security_token: info.security_token.clone(),
            },
        })
    }
}

/// `SHA-512(pin ++ challenge)` over the hex-decoded bytes, upper-case hex
pub fn security_pin_hash(pin: &str, challenge: &str) -> Result<String> {
    let pin = hex::decode(pin)
        .map_err(|e| AudiClientError::ParseError(format!("S-PIN must be hex digits: {}", e)))?;
    let challenge = hex::decode(challenge)
        .map_err(|e| AudiClientError::ParseError(format!("Invalid PIN challenge: {}", e)))?;

    let mut hasher = Sha512::new();
    hasher.update(&pin);
    hasher.update(&challenge);
    Ok(hex::encode_upper(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_hash_matches_concatenated_digest() {
        let hash = security_pin_hash("1234", "ABCDEF").unwrap();

        let expected = hex::encode_upper(Sha512::digest([0x12, 0x34, 0xAB, 0xCD, 0xEF]));
        assert_eq!(hash, expected);
        assert_eq!(hash.len(), 128);
        assert!(hash.chars().all(|c| !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_pin_hash_rejects_odd_pin() {
        assert!(security_pin_hash("123", "AB").is_err());
    }

    #[test]
    fn test_answer_challenge() {
        let info: PinAuthInfoResponse = serde_json::from_str(
            r#"{"securityPinAuthInfo":{"securityToken":"sec-1","securityPinTransmissionDetails":{"challenge":"00FF","hashProcedureVersion":1,"userChallenge":"abc"}}}"#,
        )
        .unwrap();

        let request = PinAuthCompleteRequest::answer(&info.security_pin_auth_info, "1234").unwrap();
        let body = serde_json::to_value(&request).unwrap();
        let auth = &body["securityPinAuthentication"];
        assert_eq!(auth["securityToken"], "sec-1");
        assert_eq!(auth["securityPin"]["challenge"], "00FF");
        assert_eq!(
            auth["securityPin"]["securityPinHash"],
            security_pin_hash("1234", "00FF").unwrap()
        );
    }
}
