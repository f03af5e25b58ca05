use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::ObjectStorageSettings;

type HmacSha256 = Hmac<Sha256>;

const AWS_URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Загрузка файлов (PDF, картинки вопросов) в публичный S3-совместимый бакет
#[derive(Clone, Debug)]
pub struct ObjectStorageClient {
    http: Client,
    bucket: String,
    region: String,
    endpoint: Url,
    access_key: String,
    secret_key: String,
    public_base_url: Option<String>,
    prefix: String,
}

impl ObjectStorageClient {
    pub fn new(settings: ObjectStorageSettings) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", settings.region));

        let endpoint = Url::parse(&endpoint).context("Invalid object storage endpoint URL")?;
        if endpoint.host_str().is_none() {
            bail!("Object storage endpoint must include a host");
        }

        match endpoint.scheme() {
            "https" => {}
            "http" => {
                let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "prod".to_string());
                if app_env == "prod" {
                    bail!("Object storage endpoint must use HTTPS in production mode");
                }
            }
            other => bail!("Invalid endpoint scheme: {}. Must be http or https.", other),
        }

        Ok(Self {
            http: Client::new(),
            bucket: settings.bucket,
            region: settings.region,
            access_key: settings.access_key,
            secret_key: settings.secret_key,
            endpoint,
            public_base_url: settings
                .public_base_url
                .map(|url| url.trim_end_matches('/').to_string()),
            prefix: sanitize_prefix(&settings.prefix),
        })
    }

    /// `{class}/{topic_node}/{millis}-{filename}`
    pub fn build_upload_key(&self, class_id: &str, topic_node_id: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}-{}",
            class_id,
            topic_node_id,
            Utc::now().timestamp_millis(),
            sanitize_filename(filename)
        )
    }

    /// Uploads the object and returns its public URL
    pub async fn upload_public(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let object_key = self.full_key(key);
        let encoded_key = encode_key(&object_key);

        let payload_hash = hex::encode(Sha256::digest(&bytes));
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| anyhow!("Object storage endpoint missing host"))?
            .to_lowercase();
        let host = match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        };

        let canonical_headers = format!(
            "host:{}\nx-amz-acl:public-read\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-acl;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "PUT\n/{}/{}\n\n{}\n{}\n{}",
            self.bucket, encoded_key, canonical_headers, signed_headers, payload_hash
        );
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );

        let signing_key = derive_signing_key(&self.secret_key, &date_stamp, &self.region, "s3")?;
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes())?);
        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        );

        let mut upload_url = self.endpoint.clone();
        upload_url.set_path(&format!("{}/{}", self.bucket, encoded_key));

        self.http
            .put(upload_url)
            .header("Authorization", authorization)
            .header("x-amz-acl", "public-read")
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await
            .with_context(|| format!("Failed to upload object {}", object_key))?
            .error_for_status()
            .context("Object storage upload returned error status")?;

        tracing::info!(key = %object_key, "Object uploaded");
        Ok(self.public_url(&object_key))
    }

    pub fn public_url(&self, object_key: &str) -> String {
        let encoded = encode_key(object_key);
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base, encoded),
            None => {
                let mut url = self.endpoint.clone();
                url.set_path(&format!("{}/{}", self.bucket, encoded));
                url.to_string()
            }
        }
    }

    fn full_key(&self, key: &str) -> String {
        let cleaned = key.trim_matches('/');
        if self.prefix.is_empty() {
            cleaned.to_string()
        } else {
            format!("{}/{}", self.prefix, cleaned)
        }
    }
}

fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, AWS_URI_ENCODE_SET).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Keeps the base name only and replaces characters unsafe for object keys
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let key = hmac_sign(format!("AWS4{}", secret).as_bytes(), date)?;
    let key = hmac_sign(&key, region)?;
    let key = hmac_sign(&key, service)?;
    hmac_sign(&key, b"aws4_request")
}

fn hmac_sign(key: &[u8], message: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(message.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> ObjectStorageSettings {
        ObjectStorageSettings {
            bucket: "pdf-uploads".into(),
            region: "us-east-1".into(),
            endpoint: Some(endpoint.into()),
            access_key: "key".into(),
            secret_key: "secret".into(),
            public_base_url: None,
            prefix: String::new(),
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_https_required_in_prod() {
        std::env::set_var("APP_ENV", "prod");

        let err = ObjectStorageClient::new(settings("http://insecure.com")).unwrap_err();
        assert!(err.to_string().contains("HTTPS"));

        std::env::remove_var("APP_ENV");
    }

    #[test]
    #[serial_test::serial]
    fn test_http_allowed_in_dev() {
        std::env::set_var("APP_ENV", "dev");

        assert!(ObjectStorageClient::new(settings("http://localhost:9000")).is_ok());

        std::env::remove_var("APP_ENV");
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        assert!(ObjectStorageClient::new(settings("ftp://example.com")).is_err());
    }

    #[test]
    fn test_upload_key_layout() {
        let client = ObjectStorageClient::new(settings("https://s3.example.com")).unwrap();
        let key = client.build_upload_key("class-1", "node-7", "../Lecture 1 (final).pdf");

        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "class-1");
        assert_eq!(parts[1], "node-7");
        let (millis, name) = parts[2].split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(name, "Lecture_1__final_.pdf");
    }

    #[test]
    fn test_public_url_prefers_configured_base() {
        let client = ObjectStorageClient::new(settings("https://s3.example.com")).unwrap();
        assert_eq!(
            client.public_url("c1/n1/1-a b.pdf"),
            "https://s3.example.com/pdf-uploads/c1/n1/1-a%20b.pdf"
        );

        let mut with_base = settings("https://s3.example.com");
        with_base.public_base_url = Some("https://cdn.example.com/files/".into());
        with_base.prefix = "/materials/".into();
        let client = ObjectStorageClient::new(with_base).unwrap();
        assert_eq!(client.full_key("c1/x.pdf"), "materials/c1/x.pdf");
        assert_eq!(
            client.public_url("materials/c1/x.pdf"),
            "https://cdn.example.com/files/materials/c1/x.pdf"
        );
    }

    #[test]
    fn test_signing_key_matches_reference_vector() {
        let key = derive_signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20120215",
            "us-east-1",
            "iam",
        )
        .unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }
}
