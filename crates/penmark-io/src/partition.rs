//! Dataset directory scanning and seeded enrollment/probe partitioning.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{SampleFile, SampleKind, SignerId};

/// Sub-directory holding genuine samples named `{signer}_{nn}.HWR`.
pub const GENUINE_DIR: &str = "genuine";

/// Sub-directory holding forgeries named `{forger}_{signer}_{nn}.HWR`.
pub const FORGERY_DIR: &str = "forgery";

/// One enrollment/probe split of a signer's genuine samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Samples used to build templates.
    pub enrollment: Vec<SampleFile>,
    /// Held-out genuine samples.
    pub probes: Vec<SampleFile>,
}

/// Every sample file in a dataset, grouped by claimed signer.
#[derive(Debug, Clone, Default)]
pub struct DatasetIndex {
    genuine: BTreeMap<SignerId, Vec<SampleFile>>,
    forgeries: BTreeMap<SignerId, Vec<SampleFile>>,
}

impl DatasetIndex {
    /// Scan `root/genuine` and `root/forgery`.
    ///
    /// Files whose names do not follow the naming scheme are skipped. A
    /// missing forgery directory yields no forgeries.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ReadDir`] if the genuine directory, or an existing
    /// forgery directory, cannot be listed.
    #[instrument(fields(root = %root.display()))]
    pub fn scan(root: &Path) -> Result<Self, IoError> {
        let mut index = Self::default();

        for path in list_dir(&root.join(GENUINE_DIR))? {
            match parse_name(&path) {
                Some((None, signer)) => index.push(path, signer, SampleKind::Genuine),
                _ => debug!(path = %path.display(), "skipping unrecognized genuine file"),
            }
        }

        let forgery_dir = root.join(FORGERY_DIR);
        if forgery_dir.is_dir() {
            for path in list_dir(&forgery_dir)? {
                match parse_name(&path) {
                    Some((Some(_forger), signer)) => {
                        index.push(path, signer, SampleKind::Forgery);
                    }
                    _ => debug!(path = %path.display(), "skipping unrecognized forgery file"),
                }
            }
        }

        info!(
            signers = index.genuine.len(),
            genuine = index.genuine.values().map(Vec::len).sum::<usize>(),
            forgeries = index.forgeries.values().map(Vec::len).sum::<usize>(),
            "dataset indexed"
        );
        Ok(index)
    }

    fn push(&mut self, path: PathBuf, signer: String, kind: SampleKind) {
        let signer = SignerId::new(signer);
        let map = match kind {
            SampleKind::Genuine => &mut self.genuine,
            SampleKind::Forgery => &mut self.forgeries,
        };
        map.entry(signer.clone())
            .or_default()
            .push(SampleFile::new(path, signer, kind));
    }

    /// Signers with at least one genuine sample, ascending.
    pub fn signers(&self) -> impl Iterator<Item = &SignerId> {
        self.genuine.keys()
    }

    /// Genuine samples of `signer`, sorted by path.
    #[must_use]
    pub fn genuine(&self, signer: &SignerId) -> &[SampleFile] {
        self.genuine.get(signer).map_or(&[], Vec::as_slice)
    }

    /// Forgeries of `signer`, sorted by path.
    #[must_use]
    pub fn forgeries(&self, signer: &SignerId) -> &[SampleFile] {
        self.forgeries.get(signer).map_or(&[], Vec::as_slice)
    }

    /// Split `signer`'s genuine samples into folds of `test_size` probes.
    ///
    /// The samples are shuffled once with a generator seeded by
    /// `seed + signer position`, then cut into `n / test_size` contiguous
    /// probe blocks. Each fold enrolls every sample outside its block.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::UnknownSigner`] | `signer` has no genuine samples |
    /// | [`IoError::InvalidTestSize`] | `test_size` is 0 or leaves no enrollment sample |
    pub fn folds(
        &self,
        signer: &SignerId,
        test_size: usize,
        seed: u64,
    ) -> Result<Vec<Fold>, IoError> {
        let position = self
            .genuine
            .keys()
            .position(|s| s == signer)
            .ok_or_else(|| IoError::UnknownSigner {
                signer: signer.to_string(),
            })?;
        let samples = self.genuine(signer);
        if test_size == 0 || test_size >= samples.len() {
            return Err(IoError::InvalidTestSize {
                test_size,
                available: samples.len(),
            });
        }

        let mut order: Vec<usize> = (0..samples.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(position as u64));
        order.shuffle(&mut rng);

        let folds: Vec<Fold> = (0..samples.len() / test_size)
            .map(|f| {
                let block = f * test_size..(f + 1) * test_size;
                let (mut enrollment, mut probes) = (Vec::new(), Vec::new());
                for (slot, &i) in order.iter().enumerate() {
                    if block.contains(&slot) {
                        probes.push(samples[i].clone());
                    } else {
                        enrollment.push(samples[i].clone());
                    }
                }
                Fold { enrollment, probes }
            })
            .collect();
        debug!(signer = %signer, folds = folds.len(), test_size, "partitioned");
        Ok(folds)
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, IoError> {
    let entries = fs::read_dir(dir).map_err(|e| IoError::ReadDir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| IoError::ReadDir {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Split `{signer}_{nn}.HWR` or `{forger}_{signer}_{nn}.HWR` into
/// `(forger, signer)`.
fn parse_name(path: &Path) -> Option<(Option<String>, String)> {
    let ext = path.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case("hwr") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split('_').collect();
    let (number, rest) = parts.split_last()?;
    if number.is_empty() || !number.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if rest.iter().any(|p| p.is_empty()) {
        return None;
    }
    match rest {
        [signer] => Some((None, (*signer).to_string())),
        [forger, signer] => Some((Some((*forger).to_string()), (*signer).to_string())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), "0 0 1 0 0 0\n").unwrap();
    }

    fn dataset() -> TempDir {
        let root = TempDir::new().unwrap();
        let genuine = root.path().join(GENUINE_DIR);
        let forgery = root.path().join(FORGERY_DIR);
        for n in 1..=6 {
            touch(&genuine, &format!("001_{n:02}.HWR"));
        }
        for n in 1..=3 {
            touch(&genuine, &format!("002_{n:02}.HWR"));
        }
        touch(&genuine, "notes.txt");
        touch(&forgery, "007_001_01.HWR");
        touch(&forgery, "008_001_01.HWR");
        touch(&forgery, "007_002_01.HWR");
        root
    }

    #[test]
    fn parse_name_recognizes_both_schemes() {
        assert_eq!(
            parse_name(Path::new("a/012_03.HWR")),
            Some((None, String::from("012")))
        );
        assert_eq!(
            parse_name(Path::new("a/005_012_03.HWR")),
            Some((Some(String::from("005")), String::from("012")))
        );
        assert_eq!(parse_name(Path::new("a/012_xx.HWR")), None);
        assert_eq!(parse_name(Path::new("a/012_03.txt")), None);
        assert_eq!(parse_name(Path::new("a/1_2_3_4.HWR")), None);
    }

    #[test]
    fn scan_groups_by_signer() {
        let root = dataset();
        let index = DatasetIndex::scan(root.path()).unwrap();
        let signers: Vec<&str> = index.signers().map(SignerId::as_str).collect();
        assert_eq!(signers, vec!["001", "002"]);

        let s1 = SignerId::new("001".into());
        assert_eq!(index.genuine(&s1).len(), 6);
        assert_eq!(index.forgeries(&s1).len(), 2);
        assert!(index.forgeries(&s1).iter().all(|f| f.kind() == SampleKind::Forgery));
        assert_eq!(index.genuine(&s1)[0].name(), "001_01.HWR");
    }

    #[test]
    fn missing_genuine_dir_is_an_error() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            DatasetIndex::scan(root.path()),
            Err(IoError::ReadDir { .. })
        ));
    }

    #[test]
    fn folds_cover_each_sample_once_as_probe() {
        let root = dataset();
        let index = DatasetIndex::scan(root.path()).unwrap();
        let s1 = SignerId::new("001".into());
        let folds = index.folds(&s1, 2, 42).unwrap();
        assert_eq!(folds.len(), 3);

        let mut probed: Vec<String> = folds
            .iter()
            .flat_map(|f| f.probes.iter().map(SampleFile::name))
            .collect();
        probed.sort();
        probed.dedup();
        assert_eq!(probed.len(), 6);

        for fold in &folds {
            assert_eq!(fold.probes.len(), 2);
            assert_eq!(fold.enrollment.len(), 4);
            assert!(fold.probes.iter().all(|p| !fold.enrollment.contains(p)));
        }
    }

    #[test]
    fn folds_are_reproducible_and_seeded() {
        let root = dataset();
        let index = DatasetIndex::scan(root.path()).unwrap();
        let s1 = SignerId::new("001".into());
        assert_eq!(index.folds(&s1, 1, 7).unwrap(), index.folds(&s1, 1, 7).unwrap());
    }

    #[test]
    fn remainder_always_enrolls() {
        let root = dataset();
        let index = DatasetIndex::scan(root.path()).unwrap();
        let s1 = SignerId::new("001".into());
        let folds = index.folds(&s1, 4, 1).unwrap();
        assert_eq!(folds.len(), 1);
        assert_eq!(folds[0].probes.len(), 4);
        assert_eq!(folds[0].enrollment.len(), 2);
    }

    #[test]
    fn invalid_partitions_are_rejected() {
        let root = dataset();
        let index = DatasetIndex::scan(root.path()).unwrap();
        let s2 = SignerId::new("002".into());
        assert!(matches!(
            index.folds(&s2, 3, 1),
            Err(IoError::InvalidTestSize { test_size: 3, available: 3 })
        ));
        assert!(matches!(
            index.folds(&s2, 0, 1),
            Err(IoError::InvalidTestSize { .. })
        ));
        assert!(matches!(
            index.folds(&SignerId::new("999".into()), 1, 1),
            Err(IoError::UnknownSigner { .. })
        ));
    }
}
