//! Path resolver (C4) — maps a sync item + computer-id to a local absolute
//! path, and a sync item name to its rendezvous subpath.

use std::path::{Path, PathBuf};

use crate::types::SyncItem;

/// Syntactic mapping of an item name to its rendezvous subpath component.
///
/// Replaces ASCII space and `/` with `-`; no other normalization. Two items
/// with different names must slug to different strings — enforced by the
/// caller via [`crate::validate::validate_item_name`] plus a registry-wide
/// uniqueness check at `add` time, not by this function.
pub fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' || c == '/' { '-' } else { c })
        .collect()
}

/// `{cloud_sync_dir}/configs/{slug(item.name)}`.
pub fn cloud_item_path(cloud_sync_dir: &Path, item_name: &str) -> PathBuf {
    cloud_sync_dir.join("configs").join(slug(item_name))
}

/// Expand a leading `~/` and `$VAR`-style environment references in a raw
/// path string. Only a leading `~` is treated specially (no `~user` forms).
pub fn expand_path(raw: &str) -> PathBuf {
    let mut result = String::new();
    let mut chars = raw.chars().peekable();

    if raw.starts_with("~/") || raw == "~" {
        if let Some(home) = dirs::home_dir() {
            result.push_str(&home.to_string_lossy());
        }
        chars.next(); // consume '~'
    }

    while let Some(c) = chars.next() {
        if c == '$' {
            let mut var = String::new();
            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    var.push(next);
                    chars.next();
                } else {
                    break;
                }
            }
            if var.is_empty() {
                result.push('$');
            } else {
                result.push_str(&std::env::var(&var).unwrap_or_default());
            }
        } else {
            result.push(c);
        }
    }

    PathBuf::from(result)
}

/// Resolve the local absolute path for `item` on `computer`, expanding `~/`
/// and `$VAR` references.
pub fn local_path(item: &SyncItem, computer: &str) -> Option<PathBuf> {
    item.path_for(computer)
        .map(|p| expand_path(&p.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::types::{ItemKind, ItemName};

    #[test]
    fn slug_replaces_space_and_slash() {
        assert_eq!(slug("My Item/Name"), "My-Item-Name");
        assert_eq!(slug("plain"), "plain");
    }

    #[test]
    fn slug_leaves_other_punctuation_alone() {
        assert_eq!(slug("my.item_v2-final"), "my.item_v2-final");
    }

    #[test]
    fn cloud_item_path_joins_configs_and_slug() {
        let root = Path::new("/cloud");
        assert_eq!(
            cloud_item_path(root, "My Item"),
            PathBuf::from("/cloud/configs/My-Item")
        );
    }

    #[test]
    fn expand_path_substitutes_env_var() {
        std::env::set_var("SYNCSTATION_TEST_VAR", "/abc");
        let expanded = expand_path("$SYNCSTATION_TEST_VAR/file.txt");
        assert_eq!(expanded, PathBuf::from("/abc/file.txt"));
        std::env::remove_var("SYNCSTATION_TEST_VAR");
    }

    #[test]
    fn expand_path_leaves_plain_paths_untouched() {
        assert_eq!(expand_path("/abs/path"), PathBuf::from("/abs/path"));
    }

    #[test]
    fn local_path_looks_up_computer_entry() {
        let mut paths = HashMap::new();
        paths.insert("laptop".to_string(), PathBuf::from("/home/me/.vimrc"));
        let item = SyncItem {
            name: ItemName::from("Vim"),
            kind: ItemKind::File,
            paths,
            exclude_patterns: vec![],
        };
        assert_eq!(
            local_path(&item, "laptop"),
            Some(PathBuf::from("/home/me/.vimrc"))
        );
        assert_eq!(local_path(&item, "desktop"), None);
    }
}
