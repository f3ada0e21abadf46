mod common;

use common::{build, q, seed, Mock};
use kiln_build::{Builder, BuildSnapshot, Decision, Extension, Phase};
use kiln_config::BuildOptions;
use kiln_diagnostics::{DiagnosticSink, Severity};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

#[test]
fn second_build_without_changes_skips() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());

    let (first, first_out) = build(&mut app);
    assert!(first > 0);
    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    assert_eq!(mock.compiler.count(), 3);
    assert_eq!(mock.links(), 1);

    let (second, second_out) = build(&mut app);
    assert_eq!(app.last_decision(), Some(Decision::Skip));
    assert_eq!(second, first);
    assert_eq!(second_out, first_out);
    assert_eq!(mock.compiler.count(), 3);
    assert_eq!(mock.links(), 1);
    assert_eq!(app.phase(), Phase::Idle);
}

#[test]
fn link_only_option_change_relinks() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);

    let mut options = app.options().clone();
    options.link.optimize = !options.link.optimize;
    app.set_options(options);
    let (n, _) = build(&mut app);

    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::RelinkOnly));
    assert_eq!(mock.compiler.count(), 3);
    assert_eq!(mock.links(), 2);

    build(&mut app);
    assert_eq!(app.last_decision(), Some(Decision::Skip));
    assert_eq!(mock.links(), 2);
}

#[test]
fn load_bearing_option_change_recompiles_everything() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);

    let mut options = app.options().clone();
    options.compiler.debug = true;
    app.set_options(options);
    build(&mut app);

    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    assert_eq!(mock.compiler.count(), 6);
}

#[test]
fn token_change_rebuilds_from_the_cache() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);

    let mut options = app.options().clone();
    options.compiler.tokens.insert("version".into(), "2".into());
    app.set_options(options);
    let (n, _) = build(&mut app);

    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    assert_eq!(mock.compiler.count(), 3);
    let state = app.state().unwrap();
    assert!(state.sources.values().all(|r| r.reused));
}

#[test]
fn modification_recompiles_unit_and_dependents() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);
    mock.compiler.take_compiled();

    mock.files.set("app:Helper", "type app:Base\ntype app:Extra");
    let (n, out) = build(&mut app);

    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::IncrementalRecompile));
    let mut compiled = mock.compiler.take_compiled();
    compiled.sort();
    assert_eq!(compiled, vec![q("app:Helper"), q("app:Main")]);
    assert!(String::from_utf8_lossy(&out).contains("type app:Extra"));
}

#[test]
fn removed_source_relinks_without_compiling() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    let (before, _) = build(&mut app);
    mock.compiler.take_compiled();

    mock.files.remove("app:Other");
    let (after, out) = build(&mut app);

    assert_eq!(app.last_decision(), Some(Decision::IncrementalRecompile));
    assert!(mock.compiler.take_compiled().is_empty());
    assert_eq!(mock.links(), 2);
    assert!(after < before);
    assert!(!String::from_utf8_lossy(&out).contains("app:Other"));
    assert_eq!(app.unit_count(), 2);
}

#[test]
fn new_source_is_compiled_alone() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);
    mock.compiler.take_compiled();

    mock.files.set("app:Extra", "");
    build(&mut app);

    assert_eq!(app.last_decision(), Some(Decision::IncrementalRecompile));
    assert_eq!(mock.compiler.take_compiled(), vec![q("app:Extra")]);
    assert_eq!(app.unit_count(), 4);
}

fn with_library() -> (Mock, BuildOptions) {
    let mock = Mock::new();
    mock.files.set("app:Main", "inherits ui:Button");
    mock.files.set("app:Helper", "");
    mock.loader.set("libs/ui.lib", 1, &[("ui:Button", 7), ("ui:List", 8)]);
    let mut options = BuildOptions::default();
    options.compiler.library_path = vec![PathBuf::from("libs/ui.lib")];
    (mock, options)
}

#[test]
fn library_timestamp_change_recompiles_referrers() {
    let (mock, options) = with_library();
    let mut app = mock.app("app", options);
    build(&mut app);
    mock.compiler.take_compiled();

    mock.loader.set("libs/ui.lib", 2, &[("ui:Button", 7), ("ui:List", 8)]);
    let (n, _) = build(&mut app);

    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::IncrementalRecompile));
    assert_eq!(mock.compiler.take_compiled(), vec![q("app:Main")]);
}

#[test]
fn library_signature_change_recompiles_everything() {
    let (mock, options) = with_library();
    let mut app = mock.app("app", options);
    build(&mut app);
    mock.compiler.take_compiled();

    mock.loader.set("libs/ui.lib", 2, &[("ui:Button", 9), ("ui:List", 8)]);
    build(&mut app);

    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    let mut compiled = mock.compiler.take_compiled();
    compiled.sort();
    assert_eq!(compiled, vec![q("app:Helper"), q("app:Main")]);
}

#[test]
fn unchanged_library_is_not_reloaded() {
    let (mock, options) = with_library();
    let mut app = mock.app("app", options);
    build(&mut app);
    build(&mut app);
    assert_eq!(mock.loader.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn missing_library_fails_the_build() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut options = BuildOptions::default();
    options.compiler.library_path = vec![PathBuf::from("libs/missing.lib")];
    let mut app = mock.app("app", options);
    app.set_logger(sink.clone());

    let (n, _) = build(&mut app);
    assert_eq!(n, 0);
    assert_eq!(app.last_decision(), Some(Decision::Fail));
    assert_eq!(app.phase(), Phase::Failed);
    assert!(sink.diagnostics().iter().any(|d| d.code.to_string() == "R002"));
}

#[test]
fn compile_error_keeps_previous_state() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());
    build(&mut app);
    let before = app.state().cloned().unwrap();

    mock.files.set("app:Helper", "error");
    let (n, _) = build(&mut app);

    assert_eq!(n, 0);
    assert_eq!(app.phase(), Phase::Failed);
    assert_eq!(app.state(), Some(&before));
    let errors: Vec<_> = sink
        .diagnostics()
        .into_iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code.to_string(), "C001");
    assert_eq!(errors[0].artifact.as_deref(), Some("app"));
    assert_eq!(errors[0].phase.as_deref(), Some("compiling"));

    mock.files.set("app:Helper", "type app:Base");
    let (n, _) = build(&mut app);
    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::IncrementalRecompile));
}

#[test]
fn link_after_failed_compile_writes_nothing() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    let (first, _) = build(&mut app);
    assert!(first > 0);

    mock.files.set("app:Helper", "error");
    assert_eq!(app.compile(true), Decision::Fail);
    let mut out = Vec::new();
    assert_eq!(app.link(&mut out).unwrap(), 0);
    assert!(out.is_empty());
    assert_eq!(mock.links(), 1);

    mock.files.set("app:Helper", "type app:Base");
    assert_eq!(app.compile(true), Decision::IncrementalRecompile);
    assert!(app.link(&mut out).unwrap() > 0);
    assert_eq!(mock.links(), 2);
}

#[test]
fn link_failure_allows_relink_without_recompiling() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());

    mock.linker.fail.store(true, Ordering::SeqCst);
    let (n, _) = build(&mut app);
    assert_eq!(n, 0);
    assert_eq!(app.phase(), Phase::Failed);
    assert_eq!(app.unit_count(), 3);
    assert!(sink.diagnostics().iter().any(|d| d.code.to_string() == "L001"));

    mock.linker.fail.store(false, Ordering::SeqCst);
    let (n, _) = build(&mut app);
    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::Skip));
    assert_eq!(mock.compiler.count(), 3);
    assert_eq!(mock.links(), 2);
}

#[test]
fn encode_format_failure_returns_zero() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());
    mock.encoder.reject.store(true, Ordering::SeqCst);

    let (n, out) = build(&mut app);
    assert_eq!(n, 0);
    assert!(out.is_empty());
    assert!(sink.diagnostics().iter().any(|d| d.code.to_string() == "L002"));
}

#[test]
fn missing_target_fails_resolution() {
    let mock = Mock::new();
    mock.files.set("app:Helper", "");
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());

    let (n, _) = build(&mut app);
    assert_eq!(n, 0);
    assert_eq!(app.last_decision(), Some(Decision::Fail));
    let diagnostics = sink.diagnostics();
    assert!(diagnostics.iter().any(|d| d.code.to_string() == "R001"));
    assert_eq!(mock.compiler.count(), 0);
}

#[test]
fn invalid_override_fails_configuration() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());
    app.set_overrides(Some(
        "[compiler]\ntarget_runtime = \"next\"".parse::<toml::Table>().unwrap(),
    ));

    let (n, _) = build(&mut app);
    assert_eq!(n, 0);
    assert_eq!(app.last_decision(), Some(Decision::Fail));
    assert!(sink.diagnostics().iter().any(|d| d.code.to_string() == "F001"));
}

#[test]
fn non_incremental_build_recompiles() {
    let mock = Mock::new();
    seed(&mock);
    let mut app = mock.app("app", BuildOptions::default());
    build(&mut app);

    let mut out = Vec::new();
    let n = app.build_to(&mut out, false).unwrap();
    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    assert_eq!(mock.compiler.count(), 6);
    assert!(app.state().unwrap().sources.values().all(|r| !r.reused));
    assert_eq!(mock.links(), 2);
}

#[test]
fn non_incremental_build_sees_library_signature_change() {
    let (mock, options) = with_library();
    let mut app = mock.app("app", options);
    build(&mut app);
    mock.compiler.take_compiled();

    mock.loader.set("libs/ui.lib", 2, &[("ui:Button", 9), ("ui:List", 8)]);
    let mut out = Vec::new();
    let n = app.build_to(&mut out, false).unwrap();

    assert!(n > 0);
    assert_eq!(app.last_decision(), Some(Decision::FullRebuild));
    let mut compiled = mock.compiler.take_compiled();
    compiled.sort();
    assert_eq!(compiled, vec![q("app:Helper"), q("app:Main")]);
    let main = &app.state().unwrap().sources[&q("app:Main")];
    assert_eq!(main.unit.as_ref().unwrap().library_signatures[&q("ui:Button")], 9);
}

#[derive(Default)]
struct Recorder(Mutex<Vec<BuildSnapshot>>);

impl Extension for Recorder {
    fn on_build(&self, snapshot: &BuildSnapshot) {
        self.0.lock().unwrap().push(snapshot.clone());
    }
}

#[test]
fn extensions_see_successful_builds() {
    let mock = Mock::new();
    seed(&mock);
    let recorder = Arc::new(Recorder::default());
    let mut app = mock.app("app", BuildOptions::default());
    app.add_extension(recorder.clone());

    let (n, _) = build(&mut app);
    mock.linker.fail.store(true, Ordering::SeqCst);
    mock.files.set("app:Other", "uses app:Main");
    build(&mut app);

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].artifact, "app");
    assert_eq!(seen[0].decision, Decision::FullRebuild);
    assert_eq!(seen[0].bytes, n);
    assert_eq!(seen[0].unit_count, 3);
}

#[test]
fn decision_summary_is_logged() {
    let mock = Mock::new();
    seed(&mock);
    let sink = Arc::new(DiagnosticSink::new());
    let mut app = mock.app("app", BuildOptions::default());
    app.set_logger(sink.clone());
    build(&mut app);

    let summary = sink
        .diagnostics()
        .into_iter()
        .find(|d| d.code.to_string() == "K003")
        .unwrap();
    assert_eq!(summary.severity, Severity::Info);
    assert!(summary.message.starts_with("full rebuild"));
    assert!(!sink.has_errors());
}
