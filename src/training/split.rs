//! Seeded, label-stratified hold-out splits and cross-validation folds.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::common::error::{CoreError, CoreResult};

/// Row indices of a hold-out split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HoldoutSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn indices_by_class(labels: &[u8]) -> (Vec<usize>, Vec<usize>) {
    let mut class0 = Vec::new();
    let mut class1 = Vec::new();
    for (i, &l) in labels.iter().enumerate() {
        if l == 1 {
            class1.push(i);
        } else {
            class0.push(i);
        }
    }
    (class0, class1)
}

/// Split rows so each class contributes `test_size` of its members to the
/// test side. Same labels and seed give the same split.
pub fn stratified_split(labels: &[u8], test_size: f64, seed: u64) -> CoreResult<HoldoutSplit> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(CoreError::config(format!(
            "test_size must be in (0, 1), got {test_size}"
        )));
    }

    let (mut class0, mut class1) = indices_by_class(labels);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    class0.shuffle(&mut rng);
    class1.shuffle(&mut rng);

    let test0 = (class0.len() as f64 * test_size).round() as usize;
    let test1 = (class1.len() as f64 * test_size).round() as usize;

    let mut test: Vec<usize> = class0[..test0]
        .iter()
        .chain(class1[..test1].iter())
        .copied()
        .collect();
    let mut train: Vec<usize> = class0[test0..]
        .iter()
        .chain(class1[test1..].iter())
        .copied()
        .collect();
    test.sort_unstable();
    train.sort_unstable();

    Ok(HoldoutSplit { train, test })
}

/// Assign `rows` to `k` folds, dealing each class round-robin after a
/// seeded shuffle. Returns the held-out rows of every fold.
///
/// Every class present in `rows` needs at least `k` members.
pub fn stratified_folds(
    rows: &[usize],
    labels: &[u8],
    k: usize,
    seed: u64,
) -> CoreResult<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(CoreError::config("cv_folds must be at least 2"));
    }

    let mut class0: Vec<usize> = rows.iter().copied().filter(|&r| labels[r] != 1).collect();
    let mut class1: Vec<usize> = rows.iter().copied().filter(|&r| labels[r] == 1).collect();
    for (name, members) in [("negative", &class0), ("positive", &class1)] {
        if !members.is_empty() && members.len() < k {
            return Err(CoreError::config(format!(
                "{name} class has {} rows, fewer than cv_folds={k}",
                members.len()
            )));
        }
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    class0.shuffle(&mut rng);
    class1.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); k];
    for (i, &row) in class0.iter().enumerate() {
        folds[i % k].push(row);
    }
    // Continue the rotation so small positive counts spread across folds.
    let offset = class0.len() % k;
    for (i, &row) in class1.iter().enumerate() {
        folds[(offset + i) % k].push(row);
    }
    for fold in &mut folds {
        fold.sort_unstable();
    }
    Ok(folds)
}

/// Number of distinct labels among `rows`.
pub fn class_count(rows: &[usize], labels: &[u8]) -> usize {
    let has_pos = rows.iter().any(|&r| labels[r] == 1);
    let has_neg = rows.iter().any(|&r| labels[r] != 1);
    usize::from(has_pos) + usize::from(has_neg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<u8> {
        (0..100).map(|i| u8::from(i % 10 == 0)).collect()
    }

    #[test]
    fn split_preserves_class_ratio() {
        let labels = labels();
        let split = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 2);
    }

    #[test]
    fn split_is_seeded() {
        let labels = labels();
        assert_eq!(
            stratified_split(&labels, 0.2, 7).unwrap(),
            stratified_split(&labels, 0.2, 7).unwrap()
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 7).unwrap(),
            stratified_split(&labels, 0.2, 8).unwrap()
        );
    }

    #[test]
    fn split_sides_are_disjoint_and_complete() {
        let labels = labels();
        let split = stratified_split(&labels, 0.3, 1).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn folds_cover_rows_once_and_hold_both_classes() {
        let labels = labels();
        let rows: Vec<usize> = (0..100).collect();
        let folds = stratified_folds(&rows, &labels, 3, 42).unwrap();
        assert_eq!(folds.len(), 3);
        let total: usize = folds.iter().map(Vec::len).sum();
        assert_eq!(total, 100);
        for fold in &folds {
            assert_eq!(class_count(fold, &labels), 2);
        }
    }

    #[test]
    fn too_few_positives_for_folds_is_config_error() {
        let labels: Vec<u8> = vec![1, 0, 0, 0, 0, 0];
        let rows: Vec<usize> = (0..6).collect();
        assert!(stratified_folds(&rows, &labels, 3, 0).is_err());
    }
}
