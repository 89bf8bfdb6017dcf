use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::debug;

use super::{FeedParser, StoreAParser, StoreBParser, StoreCParser};
use crate::domain::Grocer;
use crate::error::ImportError;

/// One pattern per grocer: its tag as a whole token of the lowercased file
/// name. A token boundary is the start or end of the name or any character
/// that is not a lowercase letter or digit, so `store_a` never matches inside
/// `store_ab` and no tag can match inside another.
static FILE_NAME_PATTERNS: Lazy<Vec<(Grocer, Regex)>> = Lazy::new(|| {
    Grocer::ALL
        .into_iter()
        .map(|grocer| {
            let pattern = format!(
                r"(?:^|[^a-z0-9]){}(?:$|[^a-z0-9])",
                regex::escape(grocer.tag())
            );
            let regex = Regex::new(&pattern).expect("grocer tag patterns are valid regexes");
            (grocer, regex)
        })
        .collect()
});

/// Picks the single parser responsible for a feed.
pub struct ParserSelector;

impl ParserSelector {
    /// The parser implementing `grocer`'s feed format
    pub fn parser_for(grocer: Grocer) -> Box<dyn FeedParser> {
        match grocer {
            Grocer::StoreA => Box::new(StoreAParser),
            Grocer::StoreB => Box::new(StoreBParser),
            Grocer::StoreC => Box::new(StoreCParser),
        }
    }

    /// Grocers whose pattern matches `file_name`. More than one entry means the
    /// name is ambiguous and selects nothing.
    pub fn matching_grocers(file_name: &str) -> Vec<Grocer> {
        let lowered = file_name.to_lowercase();
        FILE_NAME_PATTERNS
            .iter()
            .filter(|(_, pattern)| pattern.is_match(&lowered))
            .map(|(grocer, _)| *grocer)
            .collect()
    }

    /// Select by the file name of `path`. Only the final path component is
    /// inspected so directory names cannot influence the choice.
    pub fn for_path(path: &Path) -> Result<Box<dyn FeedParser>, ImportError> {
        let signal = path.display().to_string();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ImportError::UnsupportedFormat {
                signal: signal.clone(),
                reason: "path has no file name".to_string(),
            })?;

        match Self::matching_grocers(&file_name).as_slice() {
            [grocer] => {
                debug!(file = %file_name, grocer = %grocer, "selected parser from file name");
                Ok(Self::parser_for(*grocer))
            }
            [] => Err(ImportError::UnsupportedFormat {
                signal,
                reason: format!(
                    "file name does not contain any known format tag ({})",
                    tag_list()
                ),
            }),
            many => Err(ImportError::UnsupportedFormat {
                signal,
                reason: format!(
                    "file name matches several formats ({})",
                    many.iter().map(|g| g.tag()).collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }

    /// Select by an explicit format tag, e.g. from `--format`.
    pub fn for_tag(tag: &str) -> Result<Box<dyn FeedParser>, ImportError> {
        let grocer = Grocer::from_tag(&tag.trim().to_lowercase()).ok_or_else(|| {
            ImportError::UnsupportedFormat {
                signal: tag.to_string(),
                reason: format!("unknown format tag (expected one of: {})", tag_list()),
            }
        })?;
        Ok(Self::parser_for(grocer))
    }
}

fn tag_list() -> String {
    crate::constants::supported_grocer_tags().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selects_each_format_by_file_name() {
        let cases = [
            ("store_a.json", Grocer::StoreA),
            ("feeds/2024-05-01_store_b.json", Grocer::StoreB),
            ("STORE_C-weekly.JSON", Grocer::StoreC),
            ("export.store_a.v2.json", Grocer::StoreA),
        ];
        for (path, expected) in cases {
            let parser = ParserSelector::for_path(Path::new(path)).unwrap();
            assert_eq!(parser.grocer(), expected, "path {}", path);
        }
    }

    #[test]
    fn test_unknown_file_name_is_unsupported() {
        let err = ParserSelector::for_path(Path::new("inventory.json")).err().unwrap();
        match err {
            ImportError::UnsupportedFormat { signal, .. } => assert_eq!(signal, "inventory.json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_tag_must_be_a_whole_token() {
        assert!(ParserSelector::matching_grocers("store_ab.json").is_empty());
        assert!(ParserSelector::matching_grocers("mystore_a.json").is_empty());
        assert!(ParserSelector::matching_grocers("store_a1.json").is_empty());
    }

    #[test]
    fn test_ambiguous_file_name_is_rejected() {
        let name = "store_a_vs_store_b.json";
        assert_eq!(
            ParserSelector::matching_grocers(name),
            vec![Grocer::StoreA, Grocer::StoreB]
        );
        assert!(matches!(
            ParserSelector::for_path(Path::new(name)),
            Err(ImportError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_directory_names_are_ignored() {
        assert!(ParserSelector::for_path(Path::new("store_a/feed.json")).is_err());
        let parser = ParserSelector::for_path(Path::new("store_a/store_c.json")).unwrap();
        assert_eq!(parser.grocer(), Grocer::StoreC);
    }

    #[test]
    fn test_patterns_are_disjoint() {
        // Each tag, used as a file name, must select exactly its own grocer.
        for grocer in Grocer::ALL {
            let name = format!("{}.json", grocer.tag());
            assert_eq!(ParserSelector::matching_grocers(&name), vec![grocer]);
        }
    }

    #[test]
    fn test_select_by_tag() {
        assert_eq!(ParserSelector::for_tag("store_b").unwrap().grocer(), Grocer::StoreB);
        assert_eq!(ParserSelector::for_tag(" Store_C ").unwrap().grocer(), Grocer::StoreC);
        assert!(ParserSelector::for_tag("store").is_err());
    }
}
