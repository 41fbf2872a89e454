use common::{Error, Result};
use url::Url;

/// A storage root: either `s3://bucket/prefix/` or a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    url: Url,
}

impl StorageLocation {
    pub fn parse(root: &str) -> Result<Self> {
        let root = root.trim();
        if root.is_empty() {
            return Err(Error::InvalidUri("storage root must not be empty".to_string()));
        }

        let url = if root.contains("://") {
            let mut url = Url::parse(root)?;
            match url.scheme() {
                "s3" | "file" => {}
                // Hadoop-style scheme used by Spark jobs reading the same buckets
                "s3a" => url = Url::parse(&format!("s3{}", &root["s3a".len()..]))?,
                other => {
                    return Err(Error::InvalidUri(format!(
                        "unsupported scheme '{}' in '{}': expected s3:// or a local path",
                        other, root
                    )));
                }
            }
            if url.scheme() == "s3" && url.host_str().is_none_or(str::is_empty) {
                return Err(Error::InvalidUri(format!("'{}' has no bucket", root)));
            }
            url
        } else {
            let absolute = std::path::absolute(root)?;
            Url::from_directory_path(&absolute).map_err(|_| {
                Error::InvalidUri(format!("'{}' is not a valid directory path", absolute.display()))
            })?
        };

        Ok(Self { url: with_trailing_slash(url) })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_s3(&self) -> bool {
        self.url.scheme() == "s3"
    }

    pub fn bucket(&self) -> Option<&str> {
        if self.is_s3() { self.url.host_str() } else { None }
    }

    /// Directory URI for `relative` below this root, always ending in `/`.
    pub fn directory(&self, relative: &str) -> Result<String> {
        let relative = relative.trim_matches('/');
        if relative.is_empty() {
            return Ok(self.url.to_string());
        }
        let joined = self.url.join(&format!("{}/", relative))?;
        Ok(joined.to_string())
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_root() {
        let location = StorageLocation::parse("s3://udacity-dend").unwrap();
        assert!(location.is_s3());
        assert_eq!(location.bucket(), Some("udacity-dend"));
        assert_eq!(location.url().as_str(), "s3://udacity-dend/");
        assert_eq!(location.directory("song_data").unwrap(), "s3://udacity-dend/song_data/");
    }

    #[test]
    fn test_parse_s3a_root_with_prefix() {
        let location = StorageLocation::parse("s3a://analytics/sparkify/out").unwrap();
        assert_eq!(location.bucket(), Some("analytics"));
        assert_eq!(location.directory("/songs/").unwrap(), "s3://analytics/sparkify/out/songs/");
    }

    #[test]
    fn test_parse_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let location = StorageLocation::parse(dir.path().to_str().unwrap()).unwrap();
        assert!(!location.is_s3());
        assert_eq!(location.bucket(), None);
        assert_eq!(location.url().scheme(), "file");
        let songs = location.directory("songs").unwrap();
        assert!(songs.starts_with("file://"));
        assert!(songs.ends_with("/songs/"));
    }

    #[test]
    fn test_reject_unsupported_roots() {
        assert!(StorageLocation::parse("").is_err());
        assert!(StorageLocation::parse("gs://bucket/").is_err());
        assert!(StorageLocation::parse("s3:///no-bucket").is_err());
    }
}
