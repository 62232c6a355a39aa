//! Archive comparison
//!
//! Diffs two archives into a structured [`CompareResult`]: relocations,
//! duplicate-count changes, unmatched extras and overwrite conflicts.
//! Comparison is a pure function over two read-only snapshots; it performs
//! no mutation and holds no state.
//!
//! Content identity is the SHA-256 digest, not the path. Two archives agree
//! on a piece of content when the same checksum exists on both sides; they
//! disagree on its *placement* when the path sets holding that checksum
//! differ, which is reported as a [`Relocation`] rather than as an
//! add/delete pair.
//!
//! All output lists are deterministically sorted so repeated comparisons
//! and snapshot-style tests are reproducible.

use std::collections::HashMap;
use tracing::debug;

use crate::archive::ArchiveReader;
use crate::error::{Result, ResultExt};
use crate::index::build_index;
use crate::logger::ProgressLogger;

/// Content present in one archive whose checksum does not exist in the other
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraGroup {
    /// Checksum of the content
    pub checksum: String,
    /// Paths holding that content, sorted
    pub filenames: Vec<String>,
}

/// A detected change in which paths hold one checksum's content
///
/// `original_file_names` are the paths in the target archive,
/// `new_file_names` the paths in the base archive. The `extra_*`/`missing_*`
/// fields are the symmetric multiset difference of the two lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    /// Paths currently holding the content in the other archive
    pub original_file_names: Vec<String>,
    /// Paths holding the content in the base archive
    pub new_file_names: Vec<String>,
    /// Paths present only on the original side
    pub extra_original_file_names: Vec<String>,
    /// Paths present only on the new side
    pub missing_new_file_names: Vec<String>,
}

impl Relocation {
    fn new(from: Vec<String>, to: Vec<String>) -> Self {
        debug_assert!(!to.is_empty(), "relocation must have at least one destination");

        let extra_original_file_names = multiset_diff(&from, &to);
        let missing_new_file_names = multiset_diff(&to, &from);

        Relocation {
            original_file_names: from,
            new_file_names: to,
            extra_original_file_names,
            missing_new_file_names,
        }
    }

    /// Applying this relocation adds duplicate copies of the content
    pub fn is_increasing_duplicates(&self) -> bool {
        self.missing_new_file_names.len() > self.extra_original_file_names.len()
    }

    /// Applying this relocation removes duplicate copies of the content
    pub fn is_decreasing_duplicates(&self) -> bool {
        self.missing_new_file_names.len() < self.extra_original_file_names.len()
    }
}

/// Multiset difference `a - b`, preserving `a`'s order
fn multiset_diff(a: &[String], b: &[String]) -> Vec<String> {
    let mut available: HashMap<&str, usize> = HashMap::new();
    for s in b {
        *available.entry(s.as_str()).or_default() += 1;
    }

    let mut result = Vec::new();
    for s in a {
        match available.get_mut(s.as_str()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => result.push(s.clone()),
        }
    }
    result
}

/// Aggregate outcome of comparing two archives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompareResult {
    /// All paths of the base archive, sorted
    pub all_base_files: Vec<String>,
    /// All paths of the other archive, sorted
    pub all_other_files: Vec<String>,

    /// Contents whose path sets differ between the archives
    pub relocations: Vec<Relocation>,

    /// Paths that will receive different content once pending moves complete
    pub new_content_after_move: Vec<String>,

    /// Paths where copying same-checksum-absent content would silently
    /// replace different existing content
    pub new_content_to_overwrite: Vec<String>,

    /// Content present only in the base archive
    pub unmatched_base_extras: Vec<ExtraGroup>,
    /// Content present only in the other archive
    pub unmatched_other_extras: Vec<ExtraGroup>,
}

impl CompareResult {
    /// Whether the two archives fully agree on content and placement
    pub fn is_in_sync(&self) -> bool {
        self.relocations.is_empty()
            && self.unmatched_base_extras.is_empty()
            && self.unmatched_other_extras.is_empty()
    }

    /// Print the full comparison report
    pub fn print_all(&self, out: &dyn ProgressLogger, base_name: &str, other_name: &str) {
        self.print_unmatched_base_extras(out, base_name);
        self.print_unmatched_other_extras(out, other_name);
        self.print_relocations(out);
        self.print_stats(out, base_name, other_name);
    }

    /// Print content present only in the base archive
    pub fn print_unmatched_base_extras(&self, out: &dyn ProgressLogger, base_name: &str) {
        if !self.unmatched_base_extras.is_empty() {
            out.log(&format!("Extra files in {base_name} archive:"));
            for extra in &self.unmatched_base_extras {
                out.log(&format!("\t{}", filenames_print(&extra.filenames)));
            }
        }
    }

    /// Print content present only in the other archive
    pub fn print_unmatched_other_extras(&self, out: &dyn ProgressLogger, other_name: &str) {
        if !self.unmatched_other_extras.is_empty() {
            out.log(&format!("Extra files in {other_name} archive:"));
            for extra in &self.unmatched_other_extras {
                out.log(&format!("\t{}", filenames_print(&extra.filenames)));
            }
        }
    }

    /// Print detected relocations
    pub fn print_relocations(&self, out: &dyn ProgressLogger) {
        if !self.relocations.is_empty() {
            out.log("Files to be moved:");
            for relocation in &self.relocations {
                out.log(&format!(
                    "\t{} -> {}",
                    filenames_print(&relocation.original_file_names),
                    filenames_print(&relocation.new_file_names),
                ));
            }
        }
    }

    /// Print summary counts
    pub fn print_stats(&self, out: &dyn ProgressLogger, base_name: &str, other_name: &str) {
        out.log(&format!(
            "Extra files in {base_name} archive: {}",
            self.unmatched_base_extras.len()
        ));
        out.log(&format!(
            "Extra files in {other_name} archive: {}",
            self.unmatched_other_extras.len()
        ));
        out.log(&format!(
            "Total files present in both archives: {}",
            self.all_base_files.len() - self.unmatched_base_extras.len()
        ));
    }
}

fn filenames_print(filenames: &[String]) -> String {
    if filenames.len() == 1 {
        filenames[0].clone()
    } else {
        format!("{{{}}}", filenames.join(", "))
    }
}

/// Compare two archives by content
///
/// `base` is the side whose layout is considered authoritative; a sync would
/// reshape `other` to match it. The result's lists are sorted so that two
/// runs over the same snapshots produce identical output regardless of
/// driver enumeration order.
pub fn compare(base: &dyn ArchiveReader, other: &dyn ArchiveReader) -> Result<CompareResult> {
    let base_index = build_index(base).context("index base archive")?;
    let other_index = build_index(other).context("index other archive")?;

    let mut result = CompareResult {
        all_base_files: base_index.all_files,
        all_other_files: other_index.all_files,
        ..CompareResult::default()
    };

    for (checksum, base_instances) in &base_index.files_by_checksum {
        match other_index.files_by_checksum.get(checksum) {
            None => {
                result.unmatched_base_extras.push(ExtraGroup {
                    checksum: checksum.clone(),
                    filenames: base_instances.clone(),
                });
            }
            Some(other_instances) if other_instances != base_instances => {
                result.relocations.push(Relocation::new(
                    other_instances.clone(),
                    base_instances.clone(),
                ));
            }
            Some(_) => {}
        }
    }

    for (checksum, other_instances) in &other_index.files_by_checksum {
        let present_in_base = base_index.files_by_checksum.contains_key(checksum);

        if !present_in_base {
            result.unmatched_other_extras.push(ExtraGroup {
                checksum: checksum.clone(),
                filenames: other_instances.clone(),
            });
        }

        // A path whose content differs between the archives is either about
        // to be overwritten by unrelated new content, or about to receive
        // new content once a pending move vacates it.
        for other_instance in other_instances {
            match base_index.file_checksum.get(other_instance) {
                Some(base_checksum) if base_checksum != checksum => {
                    if present_in_base {
                        result.new_content_after_move.push(other_instance.clone());
                    } else {
                        result.new_content_to_overwrite.push(other_instance.clone());
                    }
                }
                _ => {}
            }
        }
    }

    result.new_content_after_move.sort();
    result.new_content_to_overwrite.sort();
    result
        .relocations
        .sort_by(|a, b| a.original_file_names[0].cmp(&b.original_file_names[0]));
    result
        .unmatched_base_extras
        .sort_by(|a, b| a.filenames[0].cmp(&b.filenames[0]));
    result
        .unmatched_other_extras
        .sort_by(|a, b| a.filenames[0].cmp(&b.filenames[0]));

    debug!(
        relocations = result.relocations.len(),
        base_extras = result.unmatched_base_extras.len(),
        other_extras = result.unmatched_other_extras.len(),
        "compared archives"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryArchive;
    use proptest::prelude::*;

    fn archive_with(contents: &[(&str, &str)]) -> MemoryArchive {
        let archive = MemoryArchive::new();
        for (path, content) in contents {
            archive.add(path, content.as_bytes()).unwrap();
        }
        archive
    }

    fn group(filenames: &[&str]) -> Vec<String> {
        filenames.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_compare_full_scenario() {
        let latest_version = archive_with(&[
            ("file to be extra in source", "file to be extra in source"),
            ("file to duplicate", "file to duplicate: old"),
            ("file to duplicate 02", "file to duplicate: old"),
            ("file to modify with backup", "file to modify with backup: new"),
            ("file to move and duplicate/01", "file to move and duplicate: old"),
            ("file to move and duplicate/02", "file to move and duplicate: old"),
            ("file to overwrite", "file to overwrite: new"),
            ("file to be left untouched", "file to be left untouched: untouched"),
            ("moved/file to move", "file to move: old"),
            ("old/file to modify backup", "file to modify with backup: old"),
        ]);
        let outdated_archive = archive_with(&[
            ("file to be extra in target", "file to be extra in target"),
            ("file to duplicate", "file to duplicate: old"),
            ("file to move", "file to move: old"),
            ("file to move and duplicate", "file to move and duplicate: old"),
            ("file to modify with backup", "file to modify with backup: old"),
            ("file to overwrite", "file to overwrite: old"),
            ("file to be left untouched", "file to be left untouched: untouched"),
        ]);

        let result = compare(&latest_version, &outdated_archive).unwrap();

        assert_eq!(
            result.relocations,
            vec![
                Relocation {
                    original_file_names: group(&["file to duplicate"]),
                    new_file_names: group(&["file to duplicate", "file to duplicate 02"]),
                    extra_original_file_names: vec![],
                    missing_new_file_names: group(&["file to duplicate 02"]),
                },
                Relocation {
                    original_file_names: group(&["file to modify with backup"]),
                    new_file_names: group(&["old/file to modify backup"]),
                    extra_original_file_names: group(&["file to modify with backup"]),
                    missing_new_file_names: group(&["old/file to modify backup"]),
                },
                Relocation {
                    original_file_names: group(&["file to move"]),
                    new_file_names: group(&["moved/file to move"]),
                    extra_original_file_names: group(&["file to move"]),
                    missing_new_file_names: group(&["moved/file to move"]),
                },
                Relocation {
                    original_file_names: group(&["file to move and duplicate"]),
                    new_file_names: group(&[
                        "file to move and duplicate/01",
                        "file to move and duplicate/02",
                    ]),
                    extra_original_file_names: group(&["file to move and duplicate"]),
                    missing_new_file_names: group(&[
                        "file to move and duplicate/01",
                        "file to move and duplicate/02",
                    ]),
                },
            ]
        );

        assert_eq!(
            result.new_content_after_move,
            group(&["file to modify with backup"])
        );
        assert_eq!(result.new_content_to_overwrite, group(&["file to overwrite"]));

        let base_extra_names: Vec<_> = result
            .unmatched_base_extras
            .iter()
            .map(|g| g.filenames.clone())
            .collect();
        assert_eq!(
            base_extra_names,
            vec![
                group(&["file to be extra in source"]),
                group(&["file to modify with backup"]),
                group(&["file to overwrite"]),
            ]
        );

        let other_extra_names: Vec<_> = result
            .unmatched_other_extras
            .iter()
            .map(|g| g.filenames.clone())
            .collect();
        assert_eq!(
            other_extra_names,
            vec![
                group(&["file to be extra in target"]),
                group(&["file to overwrite"]),
            ]
        );
    }

    #[test]
    fn test_duplication_detected_as_relocation() {
        let base = archive_with(&[
            ("file to duplicate", "content X"),
            ("file to duplicate 02", "content X"),
        ]);
        let other = archive_with(&[("file to duplicate", "content X")]);

        let result = compare(&base, &other).unwrap();

        assert_eq!(
            result.relocations,
            vec![Relocation {
                original_file_names: group(&["file to duplicate"]),
                new_file_names: group(&["file to duplicate", "file to duplicate 02"]),
                extra_original_file_names: vec![],
                missing_new_file_names: group(&["file to duplicate 02"]),
            }]
        );
        assert!(result.relocations[0].is_increasing_duplicates());
        assert!(result.unmatched_base_extras.is_empty());
        assert!(result.unmatched_other_extras.is_empty());
    }

    #[test]
    fn test_extras_are_exactly_one_sided_checksums() {
        let base = archive_with(&[("only in base", "base content"), ("shared", "shared")]);
        let other = archive_with(&[("only in other", "other content"), ("shared", "shared")]);

        let result = compare(&base, &other).unwrap();

        assert_eq!(result.unmatched_base_extras.len(), 1);
        assert_eq!(result.unmatched_base_extras[0].filenames, group(&["only in base"]));
        assert_eq!(result.unmatched_other_extras.len(), 1);
        assert_eq!(
            result.unmatched_other_extras[0].filenames,
            group(&["only in other"])
        );
        assert!(result.relocations.is_empty());
    }

    #[test]
    fn test_identical_archives_are_in_sync() {
        let contents: &[(&str, &str)] = &[("a", "1"), ("b", "2"), ("c/d", "3")];
        let base = archive_with(contents);
        let other = archive_with(contents);

        let result = compare(&base, &other).unwrap();
        assert!(result.is_in_sync());
    }

    #[test]
    fn test_listing_order_does_not_affect_result() {
        let forward = archive_with(&[("dup/a", "same"), ("dup/b", "same"), ("solo", "x")]);
        let reversed = archive_with(&[("solo", "x"), ("dup/b", "same"), ("dup/a", "same")]);
        let other = archive_with(&[("dup/a", "same"), ("elsewhere", "x")]);

        let first = compare(&forward, &other).unwrap();
        let second = compare(&reversed, &other).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_report_printing() {
        let base = archive_with(&[("kept", "same"), ("fresh", "new stuff")]);
        let other = archive_with(&[("kept", "same"), ("stale", "old stuff")]);

        let result = compare(&base, &other).unwrap();

        let out = crate::logger::BufferLogger::new();
        result.print_all(&out, "source", "target");

        assert_eq!(
            out.lines(),
            vec![
                "Extra files in source archive:",
                "\tfresh",
                "Extra files in target archive:",
                "\tstale",
                "Extra files in source archive: 1",
                "Extra files in target archive: 1",
                "Total files present in both archives: 1",
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_relocation_conserves_kept_paths(
            from in proptest::collection::vec("[a-d]{1,2}", 1..6),
            to in proptest::collection::vec("[a-d]{1,2}", 1..6),
        ) {
            let relocation = Relocation::new(from.clone(), to.clone());

            // Kept path count is conserved on both sides.
            prop_assert_eq!(
                relocation.new_file_names.len() - relocation.missing_new_file_names.len(),
                relocation.original_file_names.len() - relocation.extra_original_file_names.len(),
            );

            // The duplicate-change predicates match the length inequality
            // and are mutually exclusive.
            prop_assert_eq!(
                relocation.is_increasing_duplicates(),
                relocation.missing_new_file_names.len() > relocation.extra_original_file_names.len(),
            );
            prop_assert_eq!(
                relocation.is_decreasing_duplicates(),
                relocation.missing_new_file_names.len() < relocation.extra_original_file_names.len(),
            );
            prop_assert!(
                !(relocation.is_increasing_duplicates() && relocation.is_decreasing_duplicates())
            );
        }
    }
}
