//! Fake B2 S3 endpoint on a mockito server, shared by storage and handler tests.

use mockito::{Matcher, Mock, Server, ServerGuard};

use crate::config::StorageConfig;

pub struct FakeB2 {
    pub server: ServerGuard,
    pub list: Mock,
}

impl FakeB2 {
    pub const E_TAG: &'static str = "\"900150983cd24fb0d6963f7d28e17f72\"";

    /// Answers bucket listings for `bucket_name` with an empty bucket.
    pub async fn start(bucket_name: &str) -> Self {
        let mut server = Server::new_async().await;

        let list = server
            .mock("GET", Matcher::Regex(format!(r"^/{bucket_name}/?(\?.*)?$")))
            .with_status(200)
            .with_header("content-type", "application/xml")
            .with_body(Self::empty_listing(bucket_name))
            .create_async()
            .await;

        Self { server, list }
    }

    pub fn config(&self, bucket_name: &str) -> StorageConfig {
        Self::config_for(&self.server.url(), bucket_name)
    }

    pub fn config_for(endpoint: &str, bucket_name: &str) -> StorageConfig {
        StorageConfig {
            account_id: "acct".to_string(),
            application_key: "key".to_string(),
            bucket_name: bucket_name.to_string(),
            endpoint: endpoint.to_string(),
            region: "us-east-005".to_string(),
            public_url_base: "https://s3.us-east-005.backblazeb2.com".to_string(),
        }
    }

    /// Accepts a PUT of `key` into `bucket_name`.
    pub async fn upload_ok(&mut self, bucket_name: &str, key: &str) -> Mock {
        self.server
            .mock("PUT", format!("/{bucket_name}/{key}").as_str())
            .with_status(200)
            .with_header("ETag", Self::E_TAG)
            .create_async()
            .await
    }

    fn empty_listing(bucket_name: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>{bucket_name}</Name><Prefix></Prefix><KeyCount>0</KeyCount><MaxKeys>1000</MaxKeys><Delimiter>/</Delimiter><IsTruncated>false</IsTruncated></ListBucketResult>"#
        )
    }
}
