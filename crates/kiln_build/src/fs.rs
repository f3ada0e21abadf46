//! A source resolver over the local filesystem.

use crate::collab::{SourceContainers, SourceResolver};
use crate::error::ResolveError;
use kiln_cache::{file_modified_millis, CacheError, ContainerKind, SourceHasher, SourceRecord};
use kiln_common::QName;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves containers by walking directories.
///
/// Qualified names come from a file's path relative to the root it was found
/// under: directories form the dotted namespace and the file stem is the
/// local name. Files outside every root get a bare local name.
#[derive(Debug, Clone)]
pub struct FsSourceResolver {
    extensions: Vec<String>,
    bundle_extension: String,
}

impl Default for FsSourceResolver {
    fn default() -> Self {
        Self {
            extensions: vec!["as".to_string(), "mxml".to_string()],
            bundle_extension: "properties".to_string(),
        }
    }
}

struct Candidate {
    path: PathBuf,
    root: Option<PathBuf>,
    owner: ContainerKind,
    name: QName,
}

fn unreadable(path: &Path, err: CacheError) -> ResolveError {
    let source = match err {
        CacheError::Io { source, .. } | CacheError::Stream(source) => source,
        other => io::Error::new(io::ErrorKind::InvalidData, other.to_string()),
    };
    ResolveError::Unreadable {
        path: path.to_path_buf(),
        source,
    }
}

impl FsSourceResolver {
    /// Creates a resolver for `.as` and `.mxml` sources and `.properties`
    /// bundles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the source file extensions.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Replaces the resource bundle extension.
    pub fn with_bundle_extension(mut self, extension: impl Into<String>) -> Self {
        self.bundle_extension = extension.into();
        self
    }

    fn is_source(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x == e))
    }

    fn walk_dir(
        &self,
        dir: &Path,
        accept: &dyn Fn(&Path) -> bool,
        files: &mut Vec<PathBuf>,
    ) -> Result<(), ResolveError> {
        let io_err = |source| ResolveError::Unreadable {
            path: dir.to_path_buf(),
            source,
        };
        let mut entries = std::fs::read_dir(dir)
            .map_err(io_err)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?;
        entries.sort();
        for path in entries {
            if path.is_dir() {
                self.walk_dir(&path, accept, files)?;
            } else if accept(&path) {
                files.push(path);
            }
        }
        Ok(())
    }

    fn file_candidate(&self, path: &Path, roots: &[PathBuf], owner: ContainerKind) -> Candidate {
        let root = roots.iter().find(|r| path.starts_with(r)).cloned();
        let name = match &root {
            Some(root) => qualified_name(path, root),
            None => QName::local(file_stem(path)),
        };
        Candidate {
            path: path.to_path_buf(),
            root,
            owner,
            name,
        }
    }

    fn candidates(&self, containers: &SourceContainers) -> Result<Vec<Candidate>, ResolveError> {
        let roots = &containers.source_path;
        for root in roots {
            if !root.is_dir() {
                return Err(ResolveError::MissingRoot(root.clone()));
            }
        }

        let mut candidates = Vec::new();
        for target in &containers.file_specs {
            if !target.is_file() {
                return Err(ResolveError::MissingSource(target.clone()));
            }
            candidates.push(self.file_candidate(target, roots, ContainerKind::FileSpec));
        }

        let is_source = |p: &Path| self.is_source(p);
        for listed in &containers.source_list {
            if listed.is_dir() {
                let mut files = Vec::new();
                self.walk_dir(listed, &is_source, &mut files)?;
                for file in files {
                    candidates.push(Candidate {
                        name: qualified_name(&file, listed),
                        path: file,
                        root: Some(listed.clone()),
                        owner: ContainerKind::SourceList,
                    });
                }
            } else if listed.is_file() {
                candidates.push(self.file_candidate(listed, roots, ContainerKind::SourceList));
            } else {
                return Err(ResolveError::MissingSource(listed.clone()));
            }
        }

        for root in roots {
            let mut files = Vec::new();
            self.walk_dir(root, &is_source, &mut files)?;
            for file in files {
                candidates.push(Candidate {
                    name: qualified_name(&file, root),
                    path: file,
                    root: Some(root.clone()),
                    owner: ContainerKind::SourcePath,
                });
            }
        }

        for bundle in &containers.bundles {
            let wanted = format!("{bundle}.{}", self.bundle_extension);
            let is_bundle =
                |p: &Path| p.file_name().and_then(|n| n.to_str()) == Some(wanted.as_str());
            let mut found = None;
            for root in roots {
                let mut files = Vec::new();
                self.walk_dir(root, &is_bundle, &mut files)?;
                if let Some(file) = files.into_iter().next() {
                    found = Some((file, root.clone()));
                    break;
                }
            }
            let Some((path, root)) = found else {
                return Err(ResolveError::MissingBundle(bundle.clone()));
            };
            candidates.push(Candidate {
                path,
                root: Some(root),
                owner: ContainerKind::Resources,
                name: QName::local(bundle.clone()),
            });
        }

        let mut seen = BTreeSet::new();
        candidates.retain(|c| seen.insert(c.path.clone()));
        Ok(candidates)
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directories between `root` and the file form the namespace.
fn qualified_name(path: &Path, root: &Path) -> QName {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let namespace = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    QName::new(namespace, file_stem(path))
}

impl SourceResolver for FsSourceResolver {
    fn resolve(&self, containers: &SourceContainers) -> Result<Vec<SourceRecord>, ResolveError> {
        self.candidates(containers)?
            .into_par_iter()
            .map(|candidate| {
                let modified = file_modified_millis(&candidate.path)
                    .map_err(|e| unreadable(&candidate.path, e))?;
                let hash = SourceHasher::hash_file(&candidate.path)
                    .map_err(|e| unreadable(&candidate.path, e))?;
                let record = SourceRecord::new(
                    candidate.name,
                    candidate.path,
                    candidate.owner,
                    modified,
                    hash,
                );
                Ok(match candidate.root {
                    Some(root) => record.with_root(root),
                    None => record,
                })
            })
            .collect()
    }
}
