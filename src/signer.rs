use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const PAYLOAD_HEADER: &str = "X-Payload";
pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Submission metadata covered by the signature. Field order is the wire order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub name: String,
    pub email: String,
    pub job_title: String,
    pub timestamp: String,
    pub ip: String,
}

/// Serialized metadata plus its signature, ready to be sent as headers.
#[derive(Debug, Clone)]
pub struct SignedPayload {
    pub payload: String,
    pub signature: String,
    pub timestamp: String,
}

#[derive(Clone)]
pub struct SubmissionSigner {
    secret: Vec<u8>,
}

impl SubmissionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    /// Lowercase hex HMAC-SHA256 of `payload`
    pub fn sign_bytes(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign(&self, metadata: &SubmissionMetadata) -> Result<SignedPayload, serde_json::Error> {
        let payload = serde_json::to_string(metadata)?;
        let signature = self.sign_bytes(payload.as_bytes());

        Ok(SignedPayload {
            payload,
            signature,
            timestamp: metadata.timestamp.clone(),
        })
    }

    /// Recompute the signature for `payload` and compare in constant time.
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(expected) = hex::decode(signature_hex) else {
            return false;
        };
        let mut mac = self.mac();
        mac.update(payload);
        let computed = mac.finalize().into_bytes();

        expected.len() == computed.len() && constant_time_eq(&computed, &expected)
    }
}
