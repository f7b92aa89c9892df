use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<T> {
    Hit(T),
    Miss,
}

/// Content hash of everything a cached stage output depends on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `frames` is a [`digest_frames`] result, `salt` identifies anything else the
    /// result depends on (e.g. the detector)
    pub fn new(frames: &str, config: &Config, salt: &str) -> Result<Self, Error> {
        let mut hasher = Sha256::new();
        hasher.update(frames.as_bytes());
        hasher.update(serde_json::to_vec(config)?);
        hasher.update(salt.as_bytes());

        Ok(CacheKey(format!("{:x}", hasher.finalize())))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 over frame dimensions and pixels
pub fn digest_frames(frames: &[RgbImage]) -> String {
    let mut hasher = Sha256::new();

    for frame in frames {
        let (w, h) = frame.dimensions();
        hasher.update(w.to_le_bytes());
        hasher.update(h.to_le_bytes());
        hasher.update(frame.as_raw());
    }

    format!("{:x}", hasher.finalize())
}

/// Stage outputs stored as `<dir>/<kind>-<key>.json`
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Result<Self, Error> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    #[inline]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, kind: &str, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}-{}.json", kind, key))
    }

    pub fn load<T: DeserializeOwned>(
        &self,
        kind: &str,
        key: &CacheKey,
    ) -> Result<CacheLookup<T>, Error> {
        let path = self.path(kind, key);

        if !path.exists() {
            debug!(kind, %key, "cache miss");
            return Ok(CacheLookup::Miss);
        }

        let file = std::fs::File::open(&path)?;
        let value = serde_json::from_reader(std::io::BufReader::new(file))?;

        info!(kind, path = %path.display(), "cache hit");

        Ok(CacheLookup::Hit(value))
    }

    pub fn store<T: Serialize>(&self, kind: &str, key: &CacheKey, value: &T) -> Result<(), Error> {
        let path = self.path(kind, key);
        let file = std::fs::File::create(&path)?;

        serde_json::to_writer(std::io::BufWriter::new(file), value)?;
        debug!(kind, path = %path.display(), "cache stored");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_cache(name: &str) -> Cache {
        let dir = std::env::temp_dir()
            .join(format!("pitchtrack-cache-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);

        Cache::new(dir).unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = temp_cache("hit");
        let frames = vec![RgbImage::new(4, 4)];
        let key = CacheKey::new(&digest_frames(&frames), &Config::default(), "dets").unwrap();

        let lookup: CacheLookup<Vec<u32>> = cache.load("tracks", &key).unwrap();
        assert_eq!(lookup, CacheLookup::Miss);

        cache.store("tracks", &key, &vec![1u32, 2, 3]).unwrap();

        let lookup: CacheLookup<Vec<u32>> = cache.load("tracks", &key).unwrap();
        assert_eq!(lookup, CacheLookup::Hit(vec![1, 2, 3]));

        // Same key, other kind
        let lookup: CacheLookup<Vec<u32>> = cache.load("camera", &key).unwrap();
        assert_eq!(lookup, CacheLookup::Miss);

        let _ = std::fs::remove_dir_all(cache.dir());
    }

    #[test]
    fn test_key_changes() {
        let frames = vec![RgbImage::new(4, 4)];
        let digest = digest_frames(&frames);
        let base = CacheKey::new(&digest, &Config::default(), "dets").unwrap();

        let mut config = Config::default();
        config.camera.min_displacement = 2.0;
        assert_ne!(base, CacheKey::new(&digest, &config, "dets").unwrap());

        assert_ne!(base, CacheKey::new(&digest, &Config::default(), "other").unwrap());

        let mut changed = frames.clone();
        changed[0].put_pixel(1, 1, image::Rgb([1, 0, 0]));
        assert_ne!(digest, digest_frames(&changed));

        // Same pixel count, different shape
        assert_ne!(digest_frames(&[RgbImage::new(2, 8)]), digest);
    }
}
