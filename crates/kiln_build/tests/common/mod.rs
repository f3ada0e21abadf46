//! In-memory toolchain shared by the integration tests.
//!
//! Sources are short scripts, one directive per line:
//! `inherits X`, `uses X` and `type X` add references; `placeholder` yields a
//! unit without type info; `error` fails compilation.

#![allow(dead_code)]

use kiln_build::{
    ApplicationBuild, CompileError, CompileRequest, Compiler, EncodeError, Encoder, LibraryLoader,
    LinkError, LinkRequest, LinkedArtifact, Linker, LoadError, ResolveError, SourceContainers,
    SourceResolver, Toolchain,
};
use kiln_cache::{
    CompilerContext, ContainerKind, Relation, ResolvedLibrary, SourceRecord, TranslationUnit,
};
use kiln_common::{ContentHash, QName};
use kiln_config::BuildOptions;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn q(s: &str) -> QName {
    s.parse().unwrap()
}

#[derive(Clone)]
struct File {
    name: QName,
    content: String,
    modified: u64,
}

#[derive(Default)]
pub struct Files {
    files: Mutex<BTreeMap<PathBuf, File>>,
    clock: AtomicUsize,
}

impl Files {
    /// Adds or replaces a source, bumping its modification time.
    pub fn set(&self, name: &str, content: &str) {
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) as u64 + 1;
        let path = path_of(name);
        self.files.lock().unwrap().insert(
            path,
            File {
                name: q(name),
                content: content.to_string(),
                modified,
            },
        );
    }

    pub fn remove(&self, name: &str) {
        self.files.lock().unwrap().remove(&path_of(name));
    }

    fn content(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| f.content.clone())
    }
}

/// `app:Main` lives at `src/app/Main.as`.
pub fn path_of(name: &str) -> PathBuf {
    let name = q(name);
    let mut path = PathBuf::from("src");
    for part in name.namespace().split('.').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.push(format!("{}.as", name.local_name()));
    path
}

pub struct MemoryResolver {
    files: Arc<Files>,
}

impl SourceResolver for MemoryResolver {
    fn resolve(&self, containers: &SourceContainers) -> Result<Vec<SourceRecord>, ResolveError> {
        let files = self.files.files.lock().unwrap();
        for target in &containers.file_specs {
            if !files.contains_key(target) {
                return Err(ResolveError::MissingSource(target.clone()));
            }
        }
        Ok(files
            .iter()
            .map(|(path, file)| {
                let owner = if containers.file_specs.contains(path) {
                    ContainerKind::FileSpec
                } else {
                    ContainerKind::SourcePath
                };
                SourceRecord::new(
                    file.name.clone(),
                    path.clone(),
                    owner,
                    file.modified,
                    ContentHash::from_bytes(file.content.as_bytes()),
                )
                .with_root("src")
            })
            .collect())
    }
}

type Hook = Box<dyn Fn(&QName) + Send + Sync>;

pub struct MockCompiler {
    files: Arc<Files>,
    pub compiled: Mutex<Vec<QName>>,
    hook: Mutex<Option<Hook>>,
}

impl MockCompiler {
    pub fn count(&self) -> usize {
        self.compiled.lock().unwrap().len()
    }

    pub fn take_compiled(&self) -> Vec<QName> {
        std::mem::take(&mut *self.compiled.lock().unwrap())
    }

    /// Runs `hook` before each unit compiles.
    pub fn on_compile(&self, hook: impl Fn(&QName) + Send + Sync + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }
}

impl Compiler for MockCompiler {
    fn compile(
        &self,
        request: &CompileRequest<'_>,
        context: &mut CompilerContext,
    ) -> Result<TranslationUnit, CompileError> {
        let name = request.source.name.clone();
        if let Some(hook) = self.hook.lock().unwrap().as_ref() {
            hook(&name);
        }
        self.compiled.lock().unwrap().push(name.clone());
        context.note_compile();

        let content = self
            .files
            .content(&request.source.path)
            .ok_or_else(|| CompileError::new(name.clone(), "source vanished"))?;
        let mut unit = TranslationUnit::new([name.clone()]).with_code(content.as_bytes());
        for line in content.lines().map(str::trim) {
            match line.split_once(' ') {
                Some(("inherits", target)) => {
                    unit = unit.with_reference(Relation::Inheritance, q(target))
                }
                Some(("uses", target)) => unit = unit.with_reference(Relation::Expression, q(target)),
                Some(("type", target)) => unit = unit.with_reference(Relation::Type, q(target)),
                _ if line == "placeholder" => unit.has_type_info = false,
                _ if line == "error" => {
                    return Err(CompileError::new(name, "syntax error"));
                }
                _ => {}
            }
        }
        context.record_definition(name);
        Ok(unit)
    }
}

#[derive(Default)]
pub struct MockLoader {
    libraries: Mutex<BTreeMap<PathBuf, ResolvedLibrary>>,
    pub loads: AtomicUsize,
}

impl MockLoader {
    pub fn set(&self, location: &str, modified: u64, definitions: &[(&str, u64)]) {
        let library = ResolvedLibrary {
            location: PathBuf::from(location),
            identity: format!("{location}@{modified}"),
            last_modified: modified,
            definitions: definitions.iter().map(|(n, s)| (q(n), *s)).collect(),
        };
        self.libraries
            .lock()
            .unwrap()
            .insert(PathBuf::from(location), library);
    }
}

impl LibraryLoader for MockLoader {
    fn last_modified(&self, location: &Path) -> Result<u64, LoadError> {
        self.libraries
            .lock()
            .unwrap()
            .get(location)
            .map(|l| l.last_modified)
            .ok_or_else(|| LoadError {
                location: location.to_path_buf(),
                reason: "no such library".to_string(),
            })
    }

    fn load(&self, location: &Path) -> Result<ResolvedLibrary, LoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.libraries
            .lock()
            .unwrap()
            .get(location)
            .cloned()
            .ok_or_else(|| LoadError {
                location: location.to_path_buf(),
                reason: "no such library".to_string(),
            })
    }
}

#[derive(Default)]
pub struct MockLinker {
    pub fail: AtomicBool,
    pub links: AtomicUsize,
}

impl Linker for MockLinker {
    fn link(&self, request: &LinkRequest<'_>) -> Result<LinkedArtifact, LinkError> {
        self.links.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(LinkError::Other("linker exploded".to_string()));
        }
        let mut payload = Vec::new();
        for root in &request.roots {
            payload.extend_from_slice(format!("root {root}\n").as_bytes());
        }
        let mut definitions = Vec::new();
        for (name, unit) in &request.units {
            payload.extend_from_slice(format!("unit {name}\n").as_bytes());
            payload.extend_from_slice(&unit.code);
            payload.push(b'\n');
            definitions.extend(unit.top_level_definitions.iter().cloned());
        }
        if request.options.optimize {
            payload.extend_from_slice(b"optimized\n");
        }
        Ok(LinkedArtifact {
            kind: request.kind,
            definitions,
            payload,
        })
    }
}

#[derive(Default)]
pub struct MockEncoder {
    pub reject: AtomicBool,
}

impl Encoder for MockEncoder {
    fn encode(&self, artifact: &LinkedArtifact, output: &mut dyn Write) -> Result<u64, EncodeError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(EncodeError::Format("unsupported artifact".to_string()));
        }
        output.write_all(b"KILNOUT\n")?;
        output.write_all(&artifact.payload)?;
        Ok(8 + artifact.payload.len() as u64)
    }
}

/// One set of mock collaborators.
pub struct Mock {
    pub files: Arc<Files>,
    pub resolver: Arc<MemoryResolver>,
    pub compiler: Arc<MockCompiler>,
    pub loader: Arc<MockLoader>,
    pub linker: Arc<MockLinker>,
    pub encoder: Arc<MockEncoder>,
}

impl Mock {
    pub fn new() -> Self {
        let files = Arc::new(Files::default());
        Self {
            resolver: Arc::new(MemoryResolver {
                files: files.clone(),
            }),
            compiler: Arc::new(MockCompiler {
                files: files.clone(),
                compiled: Mutex::new(Vec::new()),
                hook: Mutex::new(None),
            }),
            loader: Arc::new(MockLoader::default()),
            linker: Arc::new(MockLinker::default()),
            encoder: Arc::new(MockEncoder::default()),
            files,
        }
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(
            self.resolver.clone(),
            self.compiler.clone(),
            self.loader.clone(),
            self.linker.clone(),
            self.encoder.clone(),
        )
        .with_version("test-1")
    }

    pub fn links(&self) -> usize {
        self.linker.links.load(Ordering::SeqCst)
    }

    /// An application whose main target is `app:Main`.
    pub fn app(&self, name: &str, options: BuildOptions) -> ApplicationBuild {
        ApplicationBuild::new(name, vec![path_of("app:Main")], options, self.toolchain())
    }
}

/// `app:Main` uses `app:Helper`; `app:Other` stands alone.
pub fn seed(mock: &Mock) {
    mock.files.set("app:Main", "uses app:Helper");
    mock.files.set("app:Helper", "type app:Base");
    mock.files.set("app:Other", "");
}

pub fn build(app: &mut ApplicationBuild) -> (u64, Vec<u8>) {
    let mut out = Vec::new();
    let n = app.build_to(&mut out, true).unwrap();
    (n, out)
}
