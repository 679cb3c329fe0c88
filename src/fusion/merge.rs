use std::path::{Path, PathBuf};

/// Partitions a raster stack into keyword families. Keywords are evaluated
/// in the given order against the files still unclaimed, so an earlier,
/// longer keyword (`VEL_STDEV`) claims its files before a shorter one
/// (`VEL`) can absorb them. Files matching no keyword are left out.
pub fn assign_families(keywords: &[String], files: &[PathBuf]) -> Vec<(String, Vec<PathBuf>)> {
    let mut remaining: Vec<PathBuf> = files.to_vec();
    let mut families = Vec::with_capacity(keywords.len());

    for keyword in keywords {
        let (claimed, rest): (Vec<PathBuf>, Vec<PathBuf>) = remaining
            .into_iter()
            .partition(|path| file_name(path).contains(keyword.as_str()));
        families.push((keyword.clone(), claimed));
        remaining = rest;
    }

    families
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Element-wise maximum over sampled series, ignoring NaN. A row is NaN only
/// when every series is NaN there; an empty family merges to all-NaN.
pub fn merge_max(rows: usize, series: &[Vec<f64>]) -> Vec<f64> {
    let mut merged = vec![f64::NAN; rows];
    for values in series {
        for (out, &v) in merged.iter_mut().zip(values) {
            if v.is_nan() {
                continue;
            }
            if out.is_nan() || v > *out {
                *out = v;
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_longer_keyword_claims_before_shorter() {
        let files = paths(&[
            "ts/site_VEL.tif",
            "ts/site_VEL_STDEV.tif",
            "ts/site_COHER.tif",
        ]);
        let keywords = vec!["VEL_STDEV".to_string(), "VEL".to_string()];

        let families = assign_families(&keywords, &files);

        assert_eq!(families.len(), 2);
        assert_eq!(families[0].0, "VEL_STDEV");
        assert_eq!(families[0].1, paths(&["ts/site_VEL_STDEV.tif"]));
        assert_eq!(families[1].0, "VEL");
        assert_eq!(families[1].1, paths(&["ts/site_VEL.tif"]));
    }

    #[test]
    fn test_reversed_keyword_order_changes_assignment() {
        let files = paths(&["ts/site_VEL.tif", "ts/site_VEL_STDEV.tif"]);
        let keywords = vec!["VEL".to_string(), "VEL_STDEV".to_string()];

        let families = assign_families(&keywords, &files);

        // VEL first swallows both files, leaving VEL_STDEV empty
        assert_eq!(families[0].1.len(), 2);
        assert!(families[1].1.is_empty());
    }

    #[test]
    fn test_unmatched_keyword_keeps_an_empty_family() {
        let files = paths(&["ts/site_VEL.tif"]);
        let keywords = vec!["COHER".to_string(), "VEL".to_string()];

        let families = assign_families(&keywords, &files);

        assert_eq!(families[0].0, "COHER");
        assert!(families[0].1.is_empty());
        assert_eq!(families[1].1.len(), 1);
    }

    #[test]
    fn test_merge_max_ignores_nan() {
        let merged = merge_max(
            3,
            &[
                vec![1.0, f64::NAN, f64::NAN],
                vec![3.0, 2.0, f64::NAN],
                vec![2.0, f64::NAN, f64::NAN],
            ],
        );

        assert_eq!(merged[0], 3.0);
        assert_eq!(merged[1], 2.0);
        assert!(merged[2].is_nan());
    }

    #[test]
    fn test_merge_max_with_negative_values() {
        let merged = merge_max(2, &[vec![-5.0, -1.0], vec![-2.0, -3.0]]);
        assert_eq!(merged, vec![-2.0, -1.0]);
    }

    #[test]
    fn test_empty_family_merges_to_all_nan() {
        let merged = merge_max(2, &[]);
        assert!(merged.iter().all(|v| v.is_nan()));
    }
}
