use aws_sdk_s3::{
    config::{Credentials, Region},
    primitives::ByteStream,
    Client,
};
use anyhow::Result;
use uuid::Uuid;

/// Employee reference photos in an S3-compatible bucket.
///
/// The bucket is expected to allow anonymous reads so the URLs returned by
/// [`MinioService::upload_photo`] stay valid for matching.
#[derive(Clone)]
pub struct MinioService {
    client: Client,
    bucket_name: String,
    public_base_url: String,
}

impl MinioService {
    pub async fn new(
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
        bucket_name: &str,
        public_base_url: Option<&str>,
    ) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/');

        log::info!("Initializing MinIO service with endpoint: {}, bucket: {}", endpoint, bucket_name);

        let config = aws_sdk_s3::config::Builder::new()
            .endpoint_url(endpoint)
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "minio",
            ))
            .force_path_style(true)
            .behavior_version_latest()
            .build();

        let client = Client::from_conf(config);

        match client.head_bucket().bucket(bucket_name).send().await {
            Ok(_) => log::info!("MinIO bucket {} reachable", bucket_name),
            Err(e) => log::warn!("MinIO bucket check failed: {:?}", e),
        }

        let public_base_url = public_base_url
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("{}/{}", endpoint, bucket_name));

        Ok(Self {
            client,
            bucket_name: bucket_name.to_string(),
            public_base_url,
        })
    }

    pub fn public_url(&self, object_key: &str) -> String {
        format!("{}/{}", self.public_base_url, object_key)
    }

    /// Object key of a URL produced by [`MinioService::public_url`].
    pub fn object_key(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/').to_string())
            .filter(|key| !key.is_empty())
    }

    pub async fn upload_photo(&self, content: Vec<u8>, content_type: &str) -> Result<String> {
        let extension = match content_type {
            "image/png" => "png",
            _ => "jpg",
        };
        let object_key = format!("employees/{}.{}", Uuid::new_v4(), extension);

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&object_key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await?;

        let url = self.public_url(&object_key);
        log::info!("Uploaded employee photo: {}", url);

        Ok(url)
    }

    pub async fn delete_photo(&self, url: &str) -> Result<()> {
        let object_key = self
            .object_key(url)
            .ok_or_else(|| anyhow::anyhow!("Photo URL is not in bucket {}: {}", self.bucket_name, url))?;

        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&object_key)
            .send()
            .await?;

        Ok(())
    }
}

/// Content type of a JPEG or PNG by its magic bytes.
pub fn sniff_image_type(content: &[u8]) -> Option<&'static str> {
    if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if content.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else {
        None
    }
}
