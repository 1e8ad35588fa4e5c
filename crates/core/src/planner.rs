use crate::entry::{EntryKind, FileEntry};
use crate::error::{EngineError, IssueKind};
use crate::resolver::{resolve, Candidate, FolderListing};
use crate::rule::RenameRule;
use crate::sanitize::{human_readable_size, is_valid_file_name};
use crate::transform::{transform, NamingPolicy, TransformContext};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanOptions {
    pub recursive: bool,
    pub include_files: bool,
    pub include_directories: bool,
    pub include_hidden: bool,
    /// Case-insensitive, dot optional. Empty means every file. Never filters folders.
    pub extensions: Vec<String>,
    pub naming: NamingPolicy,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            include_files: true,
            include_directories: false,
            include_hidden: false,
            extensions: Vec::new(),
            naming: NamingPolicy::default(),
        }
    }
}

/// One planned rename plus the fields a preview table shows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenameOp {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: EntryKind,
    pub original_name: String,
    pub new_name: String,
    pub depth: usize,
    pub size: Option<u64>,
    pub modified: Option<DateTime<Local>>,
}

impl RenameOp {
    pub(crate) fn new(entry: FileEntry, new_name: String) -> Self {
        let destination = entry.parent().join(&new_name);
        Self {
            source: entry.path,
            destination,
            kind: entry.kind,
            original_name: entry.name,
            new_name,
            depth: entry.depth,
            size: entry.size,
            modified: entry.modified,
        }
    }

    pub fn size_label(&self) -> String {
        self.size.map(human_readable_size).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanIssue {
    pub path: PathBuf,
    pub kind: IssueKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RenameStats {
    pub scanned: usize,
    pub eligible: usize,
    pub skipped_filtered: usize,
    pub skipped_hidden: usize,
    pub planned: usize,
    pub unchanged: usize,
    pub issues: usize,
}

/// Ordered, deepest-first list of renames. Built once, consumed once by the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenamePlan {
    root: PathBuf,
    rule: RenameRule,
    options: PlanOptions,
    ops: Vec<RenameOp>,
    unchanged: Vec<PathBuf>,
    issues: Vec<PlanIssue>,
    stats: RenameStats,
    built_at: DateTime<Local>,
}

impl RenamePlan {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rule(&self) -> &RenameRule {
        &self.rule
    }

    pub fn options(&self) -> &PlanOptions {
        &self.options
    }

    pub fn ops(&self) -> &[RenameOp] {
        &self.ops
    }

    pub fn unchanged(&self) -> &[PathBuf] {
        &self.unchanged
    }

    pub fn issues(&self) -> &[PlanIssue] {
        &self.issues
    }

    pub fn stats(&self) -> &RenameStats {
        &self.stats
    }

    pub fn built_at(&self) -> DateTime<Local> {
        self.built_at
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> (RenameRule, PathBuf, Vec<RenameOp>) {
        (self.rule, self.root, self.ops)
    }
}

pub fn build_plan(root: &Path, rule: &RenameRule, options: &PlanOptions) -> Result<RenamePlan> {
    let compiled = rule.compile().map_err(EngineError::Validation)?;
    options.naming.validate().map_err(EngineError::Validation)?;
    check_root(root)?;

    let mut stats = RenameStats::default();
    let mut issues = Vec::new();

    let discovered = discover(root, options, &mut stats, &mut issues);

    let read_capture = rule.needs_capture_date();
    let snapshots: Vec<(PathBuf, io::Result<FileEntry>)> = discovered
        .into_par_iter()
        .map(|(path, depth)| {
            let entry = FileEntry::snapshot(&path, depth, read_capture);
            (path, entry)
        })
        .collect();

    let mut entries = Vec::with_capacity(snapshots.len());
    for (path, snapshot) in snapshots {
        match snapshot {
            Ok(entry) => entries.push(entry),
            Err(err) => issues.push(io_issue(path, &err)),
        }
    }

    entries.sort_by(|a, b| b.depth.cmp(&a.depth).then_with(|| a.path.cmp(&b.path)));
    stats.eligible = entries.len();

    let listing = list_folders(&entries, &mut issues);

    let naming = &options.naming;
    let mut candidates = Vec::with_capacity(entries.len());
    for (sequence, entry) in entries.into_iter().enumerate() {
        let name = transform(
            &entry,
            &compiled,
            &TransformContext {
                sequence: sequence as u64,
                naming,
            },
        );
        if !is_valid_file_name(&name) {
            log::warn!("rule produced an invalid name for {}", entry.path.display());
            issues.push(PlanIssue {
                path: entry.path.clone(),
                kind: IssueKind::InvalidName,
                message: format!("rule produced an invalid name: {name:?}"),
            });
            continue;
        }
        candidates.push(Candidate { entry, name });
    }

    let resolution = resolve(candidates, &listing);
    issues.extend(resolution.issues);

    stats.planned = resolution.ops.len();
    stats.unchanged = resolution.unchanged.len();
    stats.issues = issues.len();

    log::info!(
        "planned {} rename(s) under {} ({} unchanged, {} issue(s))",
        stats.planned,
        root.display(),
        stats.unchanged,
        stats.issues
    );

    Ok(RenamePlan {
        root: root.to_path_buf(),
        rule: rule.clone(),
        options: options.clone(),
        ops: resolution.ops,
        unchanged: resolution.unchanged.into_iter().map(|e| e.path).collect(),
        issues,
        stats,
        built_at: Local::now(),
    })
}

fn check_root(root: &Path) -> Result<()> {
    let meta = fs::metadata(root).map_err(|err| root_error(root, err))?;
    if !meta.is_dir() {
        return Err(EngineError::RootNotDirectory(root.to_path_buf()).into());
    }
    fs::read_dir(root)
        .map(|_| ())
        .map_err(|err| root_error(root, err))
}

fn root_error(root: &Path, err: io::Error) -> anyhow::Error {
    match err.kind() {
        io::ErrorKind::NotFound => EngineError::RootNotFound(root.to_path_buf()).into(),
        io::ErrorKind::PermissionDenied => EngineError::RootPermission(root.to_path_buf()).into(),
        _ => anyhow::Error::from(err).context(format!("cannot read folder: {}", root.display())),
    }
}

/// Pre-order walk, sorted by name so discovery is reproducible.
fn discover(
    root: &Path,
    options: &PlanOptions,
    stats: &mut RenameStats,
    issues: &mut Vec<PlanIssue>,
) -> Vec<(PathBuf, usize)> {
    let extensions = normalize_extensions(&options.extensions);
    let max_depth = if options.recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();

    let mut walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter();

    while let Some(item) = walker.next() {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                let kind = err
                    .io_error()
                    .map(IssueKind::from_io)
                    .unwrap_or(IssueKind::Io);
                log::warn!("skipping {}: {err}", path.display());
                issues.push(PlanIssue {
                    path,
                    kind,
                    message: err.to_string(),
                });
                continue;
            }
        };
        stats.scanned += 1;

        let is_dir = entry.file_type().is_dir();
        if !options.include_hidden && is_hidden(&entry) {
            stats.skipped_hidden += 1;
            if is_dir {
                walker.skip_current_dir();
            }
            continue;
        }

        let wanted = if is_dir {
            options.include_directories
        } else {
            options.include_files && matches_extension(entry.path(), &extensions)
        };
        if !wanted {
            stats.skipped_filtered += 1;
            continue;
        }

        found.push((entry.path().to_path_buf(), entry.depth()));
    }

    found
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}

fn matches_extension(path: &Path, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            allowed.iter().any(|a| *a == ext)
        })
        .unwrap_or(false)
}

fn list_folders(entries: &[FileEntry], issues: &mut Vec<PlanIssue>) -> FolderListing {
    let folders: BTreeSet<&Path> = entries.iter().map(FileEntry::parent).collect();
    let mut listing = FolderListing::new();

    for folder in folders {
        let read = fs::read_dir(folder).and_then(|rd| {
            rd.map(|item| item.map(|e| e.file_name().to_string_lossy().into_owned()))
                .collect::<io::Result<Vec<_>>>()
        });
        match read {
            Ok(names) => {
                listing.insert(folder.to_path_buf(), names);
            }
            Err(err) => issues.push(io_issue(folder.to_path_buf(), &err)),
        }
    }

    listing
}

fn io_issue(path: PathBuf, err: &io::Error) -> PlanIssue {
    let kind = if err.kind() == io::ErrorKind::InvalidData {
        IssueKind::InvalidName
    } else {
        IssueKind::from_io(err)
    };
    log::warn!("skipping {}: {err}", path.display());
    PlanIssue {
        path,
        kind,
        message: err.to_string(),
    }
}

/// `path` relative to the plan root, for display.
pub fn relative_to_root<'a>(plan: &'a RenamePlan, path: &'a Path) -> &'a Path {
    path.strip_prefix(plan.root()).unwrap_or(path)
}

pub fn save_plan(plan: &RenamePlan, path: &Path) -> Result<()> {
    let body = serde_json::to_string_pretty(plan).context("cannot serialize plan")?;
    fs::write(path, body).with_context(|| format!("cannot write plan file: {}", path.display()))
}

/// Reads a plan saved by [`save_plan`] and rejects anything the planner would never
/// have produced.
pub fn load_plan(path: &Path) -> Result<RenamePlan> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read plan file: {}", path.display()))?;
    let plan = serde_json::from_str::<RenamePlan>(&raw)
        .with_context(|| format!("plan file is corrupt: {}", path.display()))?;
    validate_plan(&plan)?;
    Ok(plan)
}

fn validate_plan(plan: &RenamePlan) -> Result<()> {
    plan.rule
        .compile()
        .map_err(EngineError::Validation)?;
    plan.options
        .naming
        .validate()
        .map_err(EngineError::Validation)?;

    let mut seen_sources = HashSet::<PathBuf>::new();
    let mut seen_destinations = HashSet::<PathBuf>::new();
    for op in &plan.ops {
        let Ok(relative) = op.source.strip_prefix(&plan.root) else {
            bail!("plan renames outside its root: {}", op.source.display());
        };
        if relative.components().count() != op.depth {
            bail!("plan has a wrong depth for {}", op.source.display());
        }
        if op.source.parent() != op.destination.parent() {
            bail!("plan moves an entry to another folder: {}", op.source.display());
        }
        let name_matches = op.destination.file_name().and_then(|n| n.to_str())
            == Some(op.new_name.as_str());
        if !name_matches || !is_valid_file_name(&op.new_name) {
            bail!("plan has an invalid destination: {}", op.destination.display());
        }
        if !seen_sources.insert(op.source.clone()) {
            bail!("plan renames the same entry twice: {}", op.source.display());
        }
        let folded = op
            .destination
            .with_file_name(op.new_name.to_lowercase());
        if !seen_destinations.insert(folded) {
            bail!("plan has duplicate destinations: {}", op.destination.display());
        }
    }
    // A folder must never be renamed before the entries inside it.
    if let Some(pair) = plan.ops.windows(2).find(|w| w[0].depth < w[1].depth) {
        bail!(
            "plan renames {} before the deeper {}",
            pair[0].source.display(),
            pair[1].source.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"x").expect("write file");
    }

    fn sequential(prefix: &str, start: u64, padding: usize) -> RenameRule {
        RenameRule::Sequential {
            prefix: prefix.to_string(),
            start,
            padding,
        }
    }

    fn strip(bad: &str) -> RenameRule {
        RenameRule::StripReplace {
            bad_chars: bad.to_string(),
            replacement: None,
            collapse_whitespace: false,
        }
    }

    fn names(plan: &RenamePlan) -> Vec<(String, String)> {
        plan.ops()
            .iter()
            .map(|op| (op.original_name.clone(), op.new_name.clone()))
            .collect()
    }

    #[test]
    fn sequential_numbers_follow_sorted_order() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("b.txt"));
        touch(&temp.path().join("a.txt"));

        let plan = build_plan(temp.path(), &sequential("img", 1, 3), &PlanOptions::default())
            .expect("plan");
        assert_eq!(
            names(&plan),
            vec![
                ("a.txt".to_string(), "img001.txt".to_string()),
                ("b.txt".to_string(), "img002.txt".to_string()),
            ]
        );
    }

    #[test]
    fn plan_is_deepest_first_and_folders_follow_their_contents() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("top#.txt"));
        touch(&temp.path().join("sub#").join("mid#.txt"));
        touch(&temp.path().join("sub#").join("deep#").join("leaf#.txt"));

        let options = PlanOptions {
            recursive: true,
            include_directories: true,
            ..PlanOptions::default()
        };
        let plan = build_plan(temp.path(), &strip("#"), &options).expect("plan");

        let order: Vec<&str> = plan.ops().iter().map(|op| op.original_name.as_str()).collect();
        assert_eq!(order, vec!["leaf#.txt", "deep#", "mid#.txt", "sub#", "top#.txt"]);

        let depths: Vec<usize> = plan.ops().iter().map(|op| op.depth).collect();
        assert!(depths.windows(2).all(|w| w[0] >= w[1]));

        // Destinations are computed against the original parent path.
        let leaf = &plan.ops()[0];
        assert_eq!(
            leaf.destination,
            temp.path().join("sub#").join("deep#").join("leaf.txt")
        );
    }

    #[test]
    fn non_recursive_plan_ignores_nested_entries() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("a#.txt"));
        touch(&temp.path().join("nested").join("b#.txt"));

        let plan = build_plan(temp.path(), &strip("#"), &PlanOptions::default()).expect("plan");
        assert_eq!(names(&plan), vec![("a#.txt".to_string(), "a.txt".to_string())]);
    }

    #[test]
    fn extension_filter_is_case_insensitive_and_dot_optional() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("a#.JPG"));
        touch(&temp.path().join("b#.png"));
        touch(&temp.path().join("c#.txt"));

        let options = PlanOptions {
            extensions: vec![".jpg".to_string(), "PNG".to_string()],
            ..PlanOptions::default()
        };
        let plan = build_plan(temp.path(), &strip("#"), &options).expect("plan");
        let originals: Vec<String> = names(&plan).into_iter().map(|(o, _)| o).collect();
        assert_eq!(originals, vec!["a#.JPG", "b#.png"]);
        assert_eq!(plan.stats().skipped_filtered, 1);
    }

    #[test]
    fn hidden_entries_are_skipped_by_default() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join(".secret#"));
        touch(&temp.path().join("shown#"));

        let plan = build_plan(temp.path(), &strip("#"), &PlanOptions::default()).expect("plan");
        assert_eq!(names(&plan), vec![("shown#".to_string(), "shown".to_string())]);
        assert_eq!(plan.stats().skipped_hidden, 1);

        let options = PlanOptions {
            include_hidden: true,
            ..PlanOptions::default()
        };
        let plan = build_plan(temp.path(), &strip("#"), &options).expect("plan");
        assert_eq!(plan.ops().len(), 2);
    }

    #[test]
    fn folders_only_plan_skips_files() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("dir#").join("f#.txt"));

        let options = PlanOptions {
            include_files: false,
            include_directories: true,
            ..PlanOptions::default()
        };
        let plan = build_plan(temp.path(), &strip("#"), &options).expect("plan");
        assert_eq!(names(&plan), vec![("dir#".to_string(), "dir".to_string())]);
    }

    #[test]
    fn collisions_are_resolved_against_untouched_siblings() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("file.txt"));
        touch(&temp.path().join("file#.txt"));

        let plan = build_plan(temp.path(), &strip("#"), &PlanOptions::default()).expect("plan");
        assert_eq!(
            names(&plan),
            vec![("file#.txt".to_string(), "file (2).txt".to_string())]
        );
        assert_eq!(plan.unchanged(), &[temp.path().join("file.txt")]);
    }

    #[test]
    fn filtered_out_files_still_block_names() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("keep.png"));
        touch(&temp.path().join("notes.txt"));

        let rule = RenameRule::Regex {
            pattern: "notes".to_string(),
            replacement: "keep".to_string(),
            whole_name: true,
        };
        let options = PlanOptions {
            extensions: vec!["txt".to_string()],
            ..PlanOptions::default()
        };
        let plan = build_plan(temp.path(), &rule, &options).expect("plan");
        assert_eq!(names(&plan), vec![("notes.txt".to_string(), "keep.txt".to_string())]);

        let rule = RenameRule::Regex {
            pattern: r"notes\.txt".to_string(),
            replacement: "keep.png".to_string(),
            whole_name: true,
        };
        let plan = build_plan(temp.path(), &rule, &options).expect("plan");
        assert_eq!(
            names(&plan),
            vec![("notes.txt".to_string(), "keep (2).png".to_string())]
        );
    }

    #[test]
    fn invalid_names_become_issues() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("a-b.txt"));

        let rule = RenameRule::Regex {
            pattern: "-".to_string(),
            replacement: "/".to_string(),
            whole_name: false,
        };
        let plan = build_plan(temp.path(), &rule, &PlanOptions::default()).expect("plan");
        assert!(plan.is_empty());
        assert_eq!(plan.issues().len(), 1);
        assert_eq!(plan.issues()[0].kind, IssueKind::InvalidName);
    }

    #[test]
    fn missing_root_is_a_typed_error() {
        let temp = tempdir().expect("tempdir");
        let err = build_plan(
            &temp.path().join("nope"),
            &strip("#"),
            &PlanOptions::default(),
        )
        .expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::RootNotFound(_))
        ));
    }

    #[test]
    fn file_root_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("f.txt");
        touch(&file);
        let err = build_plan(&file, &strip("#"), &PlanOptions::default()).expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::RootNotDirectory(_))
        ));
    }

    #[test]
    fn invalid_rule_fails_before_touching_the_root() {
        let err = build_plan(
            Path::new("/definitely/not/here"),
            &RenameRule::Regex {
                pattern: "[".to_string(),
                replacement: String::new(),
                whole_name: false,
            },
            &PlanOptions::default(),
        )
        .expect_err("must fail");
        assert!(matches!(
            err.downcast_ref::<EngineError>(),
            Some(EngineError::Validation(RuleError::Compile(_)))
        ));
    }

    #[test]
    fn planning_twice_is_reproducible() {
        let temp = tempdir().expect("tempdir");
        for name in ["c.txt", "a.txt", "b.md"] {
            touch(&temp.path().join("x").join(name));
            touch(&temp.path().join(name));
        }
        let options = PlanOptions {
            recursive: true,
            include_directories: true,
            ..PlanOptions::default()
        };
        let rule = sequential("n", 1, 2);
        let first = build_plan(temp.path(), &rule, &options).expect("plan");
        let second = build_plan(temp.path(), &rule, &options).expect("plan");
        assert_eq!(first.ops(), second.ops());
    }

    #[test]
    fn saved_plan_loads_back() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        touch(&root.join("a#.txt"));
        let plan = build_plan(&root, &strip("#"), &PlanOptions::default()).expect("plan");

        let file = temp.path().join("plan.json");
        save_plan(&plan, &file).expect("save");
        let loaded = load_plan(&file).expect("load");
        assert_eq!(loaded.ops(), plan.ops());
        assert_eq!(loaded.rule(), plan.rule());
    }

    #[test]
    fn tampered_plan_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        touch(&root.join("a#.txt"));
        let mut plan = build_plan(&root, &strip("#"), &PlanOptions::default()).expect("plan");
        plan.ops[0].destination = temp.path().join("a.txt");

        let file = temp.path().join("plan.json");
        save_plan(&plan, &file).expect("save");
        let err = load_plan(&file).expect_err("must fail");
        assert!(err.to_string().contains("another folder"));
    }

    #[test]
    fn reordered_plan_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        touch(&root.join("d#").join("f#.txt"));
        let options = PlanOptions {
            recursive: true,
            include_directories: true,
            ..PlanOptions::default()
        };
        let mut plan = build_plan(&root, &strip("#"), &options).expect("plan");
        assert_eq!(plan.ops.len(), 2);
        plan.ops.reverse();

        let file = temp.path().join("plan.json");
        save_plan(&plan, &file).expect("save");
        let err = load_plan(&file).expect_err("must fail");
        assert!(err.to_string().contains("before the deeper"));
    }

    #[test]
    fn plan_with_edited_depth_is_rejected() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("root");
        touch(&root.join("d#").join("f#.txt"));
        let options = PlanOptions {
            recursive: true,
            include_directories: true,
            ..PlanOptions::default()
        };
        let mut plan = build_plan(&root, &strip("#"), &options).expect("plan");
        plan.ops.reverse();
        plan.ops[0].depth = 2;
        plan.ops[1].depth = 1;

        let file = temp.path().join("plan.json");
        save_plan(&plan, &file).expect("save");
        let err = load_plan(&file).expect_err("must fail");
        assert!(err.to_string().contains("wrong depth"));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn ops_never_precede_a_descendant(layout in proptest::collection::vec("[ab]{1,2}(/[ab]{1,2}){0,2}", 1..6)) {
            let temp = tempdir().expect("tempdir");
            for rel in &layout {
                touch(&temp.path().join(format!("{rel}.f")));
            }
            let options = PlanOptions {
                recursive: true,
                include_directories: true,
                ..PlanOptions::default()
            };
            let plan = build_plan(temp.path(), &sequential("z", 1, 0), &options).expect("plan");
            let ops = plan.ops();
            for (i, op) in ops.iter().enumerate() {
                for later in &ops[i + 1..] {
                    prop_assert!(later.depth <= op.depth);
                    prop_assert!(!op.source.starts_with(&later.destination) || later.destination == op.source);
                }
            }
        }
    }
}
