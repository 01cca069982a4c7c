use std::fmt;

use base64::{
    alphabet,
    engine::{general_purpose::URL_SAFE, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use ring::hmac;

use crate::{GeoApiError, RequestDescriptor, Result};

// Secrets are issued URL-safe and usually padded; accept either form.
const SECRET_DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Credentials attached to every request issued by one context.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Plain API key, sent as the `key` parameter.
    ApiKey(String),
    /// Client ID plus a signing secret, sent as `client` + `signature`.
    Signed {
        client_id: String,
        /// Decoded signing key bytes.
        key: Vec<u8>,
        channel: Option<String>,
    },
}

impl Credentials {
    /// Credentials for API-key mode.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }

    /// Credentials for signed mode.
    ///
    /// `secret` is the URL-safe base64 signing secret; it is decoded here so a
    /// malformed secret fails at construction rather than on first request.
    pub fn signed(client_id: impl Into<String>, secret: &str) -> Result<Self> {
        let key = SECRET_DECODER
            .decode(secret.trim())
            .map_err(|err| GeoApiError::Config(format!("invalid signing secret: {err}")))?;
        if key.is_empty() {
            return Err(GeoApiError::Config("signing secret is empty".to_owned()));
        }
        Ok(Self::Signed {
            client_id: client_id.into(),
            key,
            channel: None,
        })
    }

    /// Sets the enterprise channel. Ignored in API-key mode.
    pub fn with_channel(mut self, value: impl Into<String>) -> Self {
        if let Self::Signed { channel, .. } = &mut self {
            *channel = Some(value.into());
        }
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.debug_tuple("ApiKey").field(&"<redacted>").finish(),
            Self::Signed {
                client_id, channel, ..
            } => f
                .debug_struct("Signed")
                .field("client_id", client_id)
                .field("key", &"<redacted>")
                .field("channel", channel)
                .finish(),
        }
    }
}

/// Attaches credentials to outgoing request descriptors.
#[derive(Clone, Debug)]
pub struct RequestSigner {
    credentials: Credentials,
}

impl RequestSigner {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns `descriptor` augmented with credential parameters.
    ///
    /// In signed mode the signature covers `path?query` including `client`
    /// and `channel`, and is appended last.
    pub fn sign(&self, descriptor: RequestDescriptor) -> Result<RequestDescriptor> {
        match &self.credentials {
            Credentials::ApiKey(key) => Ok(descriptor.param("key", key.as_str())),
            Credentials::Signed {
                client_id,
                key,
                channel,
            } => {
                let mut descriptor = descriptor.param("client", client_id.as_str());
                if let Some(channel) = channel {
                    descriptor = descriptor.param("channel", channel.as_str());
                }
                let signature = url_signature(key, &descriptor.path_and_query());
                Ok(descriptor.param("signature", signature))
            }
        }
    }
}

// The wire format fixes SHA-1.
fn url_signature(key: &[u8], path_and_query: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, key);
    URL_SAFE.encode(hmac::sign(&key, path_and_query.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{url_signature, Credentials, RequestSigner};
    use crate::{GeoApiError, RequestDescriptor};

    // Published URL-signing example for the geocoding endpoint.
    const EXAMPLE_SECRET: &str = "vNIXE0xscrmjlyV-12Nj_BvUPaw=";

    #[test]
    fn signature_matches_published_example() {
        let Credentials::Signed { key, .. } =
            Credentials::signed("clientID", EXAMPLE_SECRET).expect("secret must decode")
        else {
            panic!("expected signed credentials");
        };
        let signature = url_signature(
            &key,
            "/maps/api/geocode/json?address=New+York&client=clientID",
        );
        assert_eq!(signature, "chaRF2hTJKOScPr-RQCEhZbSzIE=");
    }

    #[test]
    fn signed_mode_appends_client_then_signature() {
        let signer = RequestSigner::new(
            Credentials::signed("clientID", EXAMPLE_SECRET).expect("secret must decode"),
        );
        let signed = signer
            .sign(RequestDescriptor::new("/maps/api/geocode/json").param("address", "New York"))
            .expect("must sign");
        assert_eq!(
            signed.query_string(),
            "address=New+York&client=clientID&signature=chaRF2hTJKOScPr-RQCEhZbSzIE%3D"
        );
    }

    #[test]
    fn channel_is_signed_with_client() {
        let signer = RequestSigner::new(
            Credentials::signed("clientID", EXAMPLE_SECRET)
                .expect("secret must decode")
                .with_channel("mobile"),
        );
        let signed = signer
            .sign(RequestDescriptor::new("/x"))
            .expect("must sign");
        let names: Vec<&str> = signed
            .query_pairs()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(names, ["client", "channel", "signature"]);
    }

    #[test]
    fn api_key_mode_appends_key() {
        let signer = RequestSigner::new(Credentials::api_key("AIza-test"));
        let signed = signer
            .sign(RequestDescriptor::new("/").param("k", "v"))
            .expect("must sign");
        assert_eq!(signed.query_string(), "k=v&key=AIza-test");
    }

    #[test]
    fn malformed_secret_is_config_error() {
        let err = Credentials::signed("clientID", "not*base64").expect_err("must fail");
        assert!(matches!(err, GeoApiError::Config(_)));
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::api_key("secret-key"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }
}
