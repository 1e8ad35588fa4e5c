//! Collision Resolver.
//!
//! Candidates are replayed in plan order against a per-folder occupancy count of
//! lower-cased names. At step `i` a folder holds the names of everything not renamed
//! yet plus the destinations of steps `0..i`, which is exactly what the executor will
//! find on disk. A name is only handed out when it is free at that moment, so no rename
//! ever lands on an existing node.

use crate::entry::FileEntry;
use crate::error::IssueKind;
use crate::planner::{PlanIssue, RenameOp};
use crate::sanitize::split_extension;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Highest `(n)` tried before giving up on an entry.
pub const MAX_DISAMBIGUATION: usize = 9_999;

#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: FileEntry,
    pub name: String,
}

/// Names present in each folder when the plan was built, keyed by folder path.
pub type FolderListing = HashMap<PathBuf, Vec<String>>;

#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub ops: Vec<RenameOp>,
    pub unchanged: Vec<FileEntry>,
    pub issues: Vec<PlanIssue>,
}

#[derive(Debug, Default)]
struct Occupancy {
    folders: HashMap<PathBuf, HashMap<String, usize>>,
}

impl Occupancy {
    fn seed(listing: &FolderListing, candidates: &[Candidate]) -> Self {
        let mut folders = HashMap::<PathBuf, HashMap<String, usize>>::new();
        for (dir, names) in listing {
            let counts = folders.entry(dir.clone()).or_default();
            for name in names {
                *counts.entry(fold(name)).or_default() += 1;
            }
        }
        // Entries whose folder was not listed still occupy their own name.
        for candidate in candidates {
            let dir = candidate.entry.parent();
            if !listing.contains_key(dir) {
                *folders
                    .entry(dir.to_path_buf())
                    .or_default()
                    .entry(fold(&candidate.entry.name))
                    .or_default() += 1;
            }
        }
        Self { folders }
    }

    fn is_free(&self, dir: &Path, name: &str) -> bool {
        self.folders
            .get(dir)
            .and_then(|counts| counts.get(&fold(name)))
            .map_or(true, |n| *n == 0)
    }

    fn take(&mut self, dir: &Path, name: &str) {
        *self
            .folders
            .entry(dir.to_path_buf())
            .or_default()
            .entry(fold(name))
            .or_default() += 1;
    }

    fn release(&mut self, dir: &Path, name: &str) {
        if let Some(n) = self
            .folders
            .get_mut(dir)
            .and_then(|counts| counts.get_mut(&fold(name)))
        {
            *n = n.saturating_sub(1);
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

pub fn resolve(candidates: Vec<Candidate>, listing: &FolderListing) -> Resolution {
    let mut occupancy = Occupancy::seed(listing, &candidates);
    let mut resolution = Resolution::default();

    for Candidate { entry, name } in candidates {
        if name == entry.name {
            resolution.unchanged.push(entry);
            continue;
        }

        let dir = entry.parent().to_path_buf();
        occupancy.release(&dir, &entry.name);

        let chosen = disambiguate(&name, entry.is_dir(), |probe| {
            occupancy.is_free(&dir, probe)
        });

        match chosen {
            Some(final_name) if final_name == entry.name => {
                occupancy.take(&dir, &entry.name);
                resolution.unchanged.push(entry);
            }
            Some(final_name) => {
                occupancy.take(&dir, &final_name);
                log::debug!("planned {} -> {}", entry.path.display(), final_name);
                resolution.ops.push(RenameOp::new(entry, final_name));
            }
            None => {
                occupancy.take(&dir, &entry.name);
                log::warn!("no free name for {} (wanted {name})", entry.path.display());
                resolution.issues.push(PlanIssue {
                    path: entry.path.clone(),
                    kind: IssueKind::CollisionUnresolvable,
                    message: format!(
                        "no free name for {name:?} after {MAX_DISAMBIGUATION} attempts"
                    ),
                });
            }
        }
    }

    resolution
}

/// Tries `name`, then `name (2)`, `name (3)`, ... with the suffix before the extension.
fn disambiguate(name: &str, is_dir: bool, is_free: impl Fn(&str) -> bool) -> Option<String> {
    if is_free(name) {
        return Some(name.to_string());
    }

    let (base, ext) = if is_dir {
        (name, "")
    } else {
        split_extension(name)
    };

    (2..=MAX_DISAMBIGUATION)
        .map(|n| format!("{base} ({n}){ext}"))
        .find(|probe| is_free(probe))
}
