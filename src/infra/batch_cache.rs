// ============================================================
// Layer 6 — Batch & Sample Cache
// ============================================================
// Persists expensive intermediate results as bincode blobs in
// `vars_dir`, so later runs skip feature loading and batching:
//
//   data/vars/
//     samples_resnet{2+1}d_18_train.bin          ← loaded samples
//     samples_resnet{2+1}d_18_train_100.bin      ← fixed-length variant
//     batches_resnet{2+1}d_18_train_f0_b32.bin   ← batch lists
//     batches_resnet{2+1}d_18_train_f0_b32_l100.bin ← fixed-length batches
//     clips_train_b32.bin                         ← clip frame lists
//
// A present file short-circuits the work and is returned verbatim.
// There is no invalidation: after changing the encoding, target
// format or batch size, delete the stale file by hand.
// Concurrent writers are not coordinated; populate a cache from
// one process at a time.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::{BufReader, BufWriter},
    path::PathBuf,
};

pub struct BatchCache {
    dir: PathBuf,
}

impl BatchCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<kind>_<part>_<part>...bin`
    pub fn key(kind: &str, parts: &[&str]) -> String {
        let mut name = kind.to_string();
        for p in parts {
            name.push('_');
            name.push_str(p);
        }
        name.push_str(".bin");
        name
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    /// The cached value, or `None` when nothing is stored under `key`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let file = fs::File::open(&path)
            .with_context(|| format!("Cannot open cache '{}'", path.display()))?;
        let value = bincode::deserialize_from(BufReader::new(file))
            .with_context(|| format!("Corrupt cache '{}'; delete it to rebuild", path.display()))?;

        tracing::info!("Cache hit: '{}'", path.display());
        Ok(Some(value))
    }

    pub fn store<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create cache dir '{}'", self.dir.display()))?;

        let path = self.path(key);
        let file = fs::File::create(&path)
            .with_context(|| format!("Cannot create cache '{}'", path.display()))?;
        bincode::serialize_into(BufWriter::new(file), value)
            .with_context(|| format!("Cannot write cache '{}'", path.display()))?;

        tracing::info!("Cached '{}'", path.display());
        Ok(())
    }

    /// Return the cached value under `key`, or build, store and return it.
    pub fn get_or_build<T, F>(&self, key: &str, enabled: bool, build: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        if enabled {
            if let Some(v) = self.load(key)? {
                return Ok(v);
            }
        }

        let value = build()?;
        if enabled {
            self.store(key, &value)?;
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_key_format() {
        assert_eq!(
            BatchCache::key("batches", &["m", "train", "f0"]),
            "batches_m_train_f0.bin"
        );
    }

    #[test]
    fn test_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BatchCache::new(dir.path());
        assert!(cache.load::<Vec<u32>>("nothing.bin").unwrap().is_none());
    }

    #[test]
    fn test_stored_arrays_reload_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BatchCache::new(dir.path().join("vars"));
        let value = vec![Array2::from_shape_fn((3, 2), |(r, c)| (r * 2 + c) as f32)];

        cache.store("x.bin", &value).unwrap();
        let back: Vec<Array2<f32>> = cache.load("x.bin").unwrap().unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_get_or_build_builds_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BatchCache::new(dir.path());
        let mut calls = 0;

        let a: Vec<usize> = cache
            .get_or_build("k.bin", true, || {
                calls += 1;
                Ok(vec![1, 2])
            })
            .unwrap();
        let b: Vec<usize> = cache
            .get_or_build("k.bin", true, || {
                calls += 1;
                Ok(vec![9])
            })
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_disabled_cache_always_builds() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BatchCache::new(dir.path());
        let v: u8 = cache.get_or_build("k.bin", false, || Ok(3)).unwrap();
        assert_eq!(v, 3);
        assert!(!cache.path("k.bin").exists());
    }

    #[test]
    fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BatchCache::new(dir.path());
        fs::write(cache.path("bad.bin"), b"\x01").unwrap();
        assert!(cache.load::<Vec<String>>("bad.bin").is_err());
    }
}
