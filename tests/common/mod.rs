//! Shared fakes for integration tests.
#![allow(dead_code)]

use kodegen_bundler_create::bundler::{
    AppConfig, BundleLayout, HostEnvironment, PipelineEnv, PipelineOptions, ToolCache,
    builder::{ActionRecord, Reporter, RunSummary, Tool, ToolProvider},
    error::{Error, Result},
    permissions::PermissionRules,
    platform::OutputFormat,
    utils::{CommandOutput, Downloader, Subprocess},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use url::Url;

pub const REGISTRY: &str = "https://registry.example/";

/// Serves canned archives keyed by the last URL path segment
/// (`support`, `stub`, or a custom package file name).
#[derive(Default)]
pub struct FakeDownloader {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<Url>>,
}

impl FakeDownloader {
    pub fn serve(&self, endpoint: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(endpoint.to_string(), body);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<Url> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Downloader for FakeDownloader {
    async fn download(&self, url: &Url, dest: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.clone());
        let endpoint = url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .unwrap_or_default()
            .to_string();
        let body = self.bodies.lock().unwrap().get(&endpoint).cloned();
        let body = body.ok_or_else(|| Error::Fetch {
            url: url.to_string(),
            reason: "404 Not Found".into(),
        })?;
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, body).unwrap();
        Ok(())
    }
}

/// Records every command and answers with exit code 0 unless told otherwise.
#[derive(Default)]
pub struct FakeSubprocess {
    commands: Mutex<Vec<(String, Vec<String>)>>,
    failing: Mutex<Vec<String>>,
}

impl FakeSubprocess {
    pub fn fail(&self, program: &str) {
        self.failing.lock().unwrap().push(program.to_string());
    }

    pub fn commands(&self) -> Vec<(String, Vec<String>)> {
        self.commands.lock().unwrap().clone()
    }

    pub fn commands_for(&self, program: &str) -> Vec<Vec<String>> {
        self.commands()
            .into_iter()
            .filter(|(p, _)| p == program)
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait::async_trait]
impl Subprocess for FakeSubprocess {
    async fn run(&self, program: &str, args: &[String], _cwd: Option<&Path>) -> Result<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        let failed = self.failing.lock().unwrap().iter().any(|p| p == program);
        Ok(CommandOutput {
            exit_code: Some(if failed { 1 } else { 0 }),
            stdout: String::new(),
            stderr: if failed { "scripted failure".into() } else { String::new() },
        })
    }
}

/// Tool provider with fixed availability and versions; counts probes.
#[derive(Default)]
pub struct FakeTools {
    versions: HashMap<String, String>,
    probes: Arc<AtomicUsize>,
}

impl FakeTools {
    pub fn with(mut self, name: &str, version: &str) -> Self {
        self.versions.insert(name.to_string(), version.to_string());
        self
    }

    pub fn probes(&self) -> Arc<AtomicUsize> {
        self.probes.clone()
    }
}

struct FakeTool {
    name: String,
    version: Option<String>,
    probes: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Tool for FakeTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.version.is_some()
    }

    async fn version(&self) -> Option<String> {
        self.version.clone()
    }
}

impl ToolProvider for FakeTools {
    fn tool(&self, name: &str) -> Box<dyn Tool> {
        Box::new(FakeTool {
            name: name.to_string(),
            version: self.versions.get(name).cloned(),
            probes: self.probes.clone(),
        })
    }
}

/// Reporter that keeps every record.
#[derive(Default)]
pub struct RecordingReporter {
    pub records: Mutex<Vec<ActionRecord>>,
    pub finished: AtomicUsize,
}

impl Reporter for RecordingReporter {
    fn action(&self, record: &ActionRecord) {
        self.records.lock().unwrap().push(record.clone());
    }

    fn finished(&self, _summary: &RunSummary) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Permission spelling used by [`DummyFormat`].
pub struct DummyRules;

impl PermissionRules for DummyRules {
    fn permission_key(&self, permission: &str) -> Option<String> {
        Some(format!("DUMMY_{}", permission.to_uppercase()))
    }

    fn implied_requests(&self, permission: &str) -> Vec<(String, Value)> {
        match permission {
            "camera" => vec![("good.lighting".into(), json!(true))],
            _ => Vec::new(),
        }
    }
}

/// Minimal output format that runs on any host.
pub struct DummyFormat {
    pub stub: bool,
    pub support_revision: Option<u64>,
}

impl Default for DummyFormat {
    fn default() -> Self {
        Self {
            stub: false,
            support_revision: Some(37),
        }
    }
}

#[async_trait::async_trait]
impl OutputFormat for DummyFormat {
    fn platform(&self) -> &str {
        "Tester"
    }

    fn output_format(&self) -> &str {
        "Dummy"
    }

    fn supported_host_os(&self) -> &[&str] {
        &["Linux", "Darwin", "Windows"]
    }

    fn bundle_layout(&self, _app: &AppConfig) -> BundleLayout {
        BundleLayout {
            app_path: "path/to/app".into(),
            app_packages_path: Some("path/to/app_packages".into()),
            support_path: Some("path/to/support".into()),
        }
    }

    fn binary_path(&self, app: &AppConfig, bundle_dir: &Path, _host: &HostEnvironment) -> PathBuf {
        bundle_dir.join(format!("{}.bin", app.formal_name()))
    }

    fn permission_rules(&self) -> Option<&dyn PermissionRules> {
        Some(&DummyRules)
    }

    fn support_revision(&self) -> Option<u64> {
        self.support_revision
    }

    fn uses_stub_binary(&self) -> bool {
        self.stub
    }

    fn stub_binary_revision(&self) -> Option<u64> {
        self.stub.then_some(2)
    }
}

/// Test project with fake collaborators.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub downloader: Arc<FakeDownloader>,
    pub subprocess: Arc<FakeSubprocess>,
}

impl Project {
    /// Creates a project with a local template supporting the `Dummy` format
    /// and an app source tree for each name.
    pub fn new(apps: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(root, "template/template.toml", "formats = [\"dummy\"]\n");
        write(
            root,
            "template/content/bundle-index.toml",
            "# Written by the template\n[paths]\napp_path = \"path/to/app\"\napp_packages_path = \"path/to/app_packages\"\nsupport_path = \"path/to/support\"\n",
        );
        write(
            root,
            "template/content/{{formal_name}}.txt",
            "{{formal_name}} {{version}}\n{{#each permissions}}{{@key}}={{this}}\n{{/each}}",
        );

        for app in apps {
            let module = app.replace('-', "_");
            write(root, &format!("src/{module}/__init__.py"), "");
            write(root, &format!("src/{module}/app.py"), &format!("# {app}\n"));
            write(root, &format!("tests/{module}.py"), "# tests\n");
        }

        let downloader = Arc::new(FakeDownloader::default());
        downloader.serve("support", tar_gz(&[("runtime/VERSION", b"3.12")]));
        Self {
            dir,
            downloader,
            subprocess: Arc::new(FakeSubprocess::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// App configuration using the local template.
    pub fn app(&self, name: &str) -> AppConfig {
        let module = name.replace('-', "_");
        toml::from_str(&format!(
            r#"
            app_name = "{name}"
            formal_name = "{name} app"
            bundle = "com.example"
            version = "0.0.1"
            description = "The {name} app"
            sources = ["src/{module}"]
            test_sources = ["tests"]
            template = "template"
            "#
        ))
        .unwrap()
    }

    pub fn env(&self, options: impl FnOnce(&mut PipelineOptions)) -> PipelineEnv {
        self.env_with_tools(FakeTools::default().with("python3", "Python 3.12.1"), options)
    }

    pub fn env_with_tools(
        &self,
        tools: FakeTools,
        options: impl FnOnce(&mut PipelineOptions),
    ) -> PipelineEnv {
        let mut opts = PipelineOptions::new(Url::parse(REGISTRY).unwrap());
        options(&mut opts);
        PipelineEnv {
            host: HostEnvironment::new("Linux", "x86_64", ["Linux", "Darwin", "Windows"]),
            base_path: self.root().to_path_buf(),
            data_path: self.root().join(".data"),
            tools: ToolCache::new(Arc::new(tools)),
            subprocess: self.subprocess.clone(),
            downloader: self.downloader.clone(),
            options: opts,
        }
    }

    pub fn bundle_dir(&self, app: &str) -> PathBuf {
        self.root().join("build").join(app).join("tester").join("dummy")
    }
}

pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// Builds a `.tar.gz` archive in memory.
pub fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Builds a `.zip` archive in memory.
pub fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default().unix_permissions(0o755);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Bytes of a real executable for stub archives.
pub fn executable_bytes() -> Vec<u8> {
    std::fs::read(std::env::current_exe().unwrap()).unwrap()
}
