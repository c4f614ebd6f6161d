mod fetcher;
mod key;
mod shared_key;

pub use fetcher::BlobFetcher;
pub use key::StorageKey;
pub use shared_key::STORAGE_API_VERSION;

pub const BLOB_DOMAIN: &str = "blob.core.windows.net";

/// `https://{account}.blob.core.windows.net/{container}/{folder}`
pub fn container_uri(account: &str, container: &str, folder: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        format!("https://{}.{}/{}", account, BLOB_DOMAIN, container)
    } else {
        format!("https://{}.{}/{}/{}", account, BLOB_DOMAIN, container, folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_uri() {
        assert_eq!(
            container_uri("acct", "cont", "folder"),
            "https://acct.blob.core.windows.net/cont/folder"
        );
        assert_eq!(
            container_uri("acct", "cont", "/a/b/"),
            "https://acct.blob.core.windows.net/cont/a/b"
        );
        assert_eq!(
            container_uri("acct", "cont", ""),
            "https://acct.blob.core.windows.net/cont"
        );
    }
}
