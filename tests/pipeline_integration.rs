//! End-to-end tests for the dist and publish pipelines
//!
//! These tests drive the full flow: configuration, resolution against the
//! registries, dist into a temporary project root, and publish with both the
//! built-in local publisher and purpose-built recording publishers.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::TempDir;

use shipkit::dister::DisterRegistry;
use shipkit::pipeline::publish::{PublishError, PublishFailureKind};
use shipkit::pipeline::{dist, publish};
use shipkit::publisher::{FlagValue, LocalPublisher, Publisher, PublisherFlag, PublisherRegistry};
use shipkit::{
    OsArch, ProductDistId, ProductId, ProductTaskOutputInfo, ProjectConfig, ProjectInfo,
    ProjectParam,
};

/// Build script used by test products: writes "<product>-<version>" into the
/// build output. Quotes are escaped for embedding in a TOML basic string.
const BUILD_SCRIPT: &str =
    "printf '%s-%s' \\\"$PRODUCT\\\" \\\"$VERSION\\\" > \\\"$OUTPUT\\\"";

fn resolve(root: &TempDir, doc: &str) -> (ProjectParam, ProjectInfo) {
    let config: ProjectConfig = toml::from_str(doc).unwrap();
    let param = config
        .resolve(
            root.path(),
            "0.1.0",
            &DisterRegistry::builtin(),
            &PublisherRegistry::builtin(),
        )
        .unwrap();
    let info = ProjectInfo::new(root.path(), "0.1.0").unwrap();
    (param, info)
}

fn single_product_doc() -> String {
    format!("[products.foo.build]\nscript = \"{}\"\n", BUILD_SCRIPT)
}

fn pid(s: &str) -> ProductId {
    s.parse().unwrap()
}

fn selector(s: &str) -> ProductDistId {
    s.parse().unwrap()
}

/// Publisher that records every invocation it receives
#[derive(Debug, Default)]
struct RecordingPublisher {
    invocations: Mutex<Vec<ProductTaskOutputInfo>>,
}

impl RecordingPublisher {
    fn invocations(&self) -> Vec<ProductTaskOutputInfo> {
        self.invocations.lock().unwrap().clone()
    }
}

impl Publisher for RecordingPublisher {
    fn type_name(&self) -> &'static str {
        "recording"
    }

    fn flags(&self) -> Vec<PublisherFlag> {
        vec![]
    }

    fn run(
        &self,
        output_info: &ProductTaskOutputInfo,
        _config: Option<&toml::Value>,
        _flag_vals: &HashMap<String, FlagValue>,
        _dry_run: bool,
        out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        writeln!(
            out,
            "Publish the following dist outputs for product {}:",
            output_info.product
        )?;
        for dist_id in output_info.sorted_dist_ids() {
            writeln!(out, "{}: {:?}", dist_id, output_info.artifacts_for(dist_id))?;
        }
        self.invocations.lock().unwrap().push(output_info.clone());
        Ok(())
    }
}

/// Publisher that fails for one configured product and succeeds for others
#[derive(Debug)]
struct FailingFor {
    product: ProductId,
    attempted: Mutex<Vec<ProductId>>,
}

impl Publisher for FailingFor {
    fn type_name(&self) -> &'static str {
        "failing"
    }

    fn flags(&self) -> Vec<PublisherFlag> {
        vec![]
    }

    fn run(
        &self,
        output_info: &ProductTaskOutputInfo,
        _config: Option<&toml::Value>,
        _flag_vals: &HashMap<String, FlagValue>,
        _dry_run: bool,
        _out: &mut dyn Write,
    ) -> anyhow::Result<()> {
        self.attempted.lock().unwrap().push(output_info.product.clone());
        if output_info.product == self.product {
            anyhow::bail!("credential rejected");
        }
        Ok(())
    }
}

// =============================================================================
// Dist Tests
// =============================================================================

#[test]
fn dist_produces_artifact_at_template_path() {
    let root = TempDir::new().unwrap();
    let (param, info) = resolve(&root, &single_product_doc());

    let mut out = Vec::new();
    let outputs = dist::products(&info, &param, &[], false, &mut out).unwrap();

    let host = OsArch::current();
    let expected = root
        .path()
        .join("out/dist/foo/0.1.0/os-arch-bin")
        .join(format!("foo-0.1.0-{}.tgz", host));
    assert!(expected.is_file());

    let foo = &outputs[&pid("foo")];
    assert_eq!(foo.version, "0.1.0");
    assert_eq!(
        foo.artifacts_for(&"os-arch-bin".parse().unwrap()),
        &[expected.clone()]
    );

    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("Creating distribution for foo (os-arch-bin,"));
    assert!(stdout.contains(&format!("Finished creating {}", expected.display())));
}

#[test]
fn dist_rerun_recomputes_artifacts() {
    let root = TempDir::new().unwrap();
    let (param, info) = resolve(&root, &single_product_doc());

    let mut out = Vec::new();
    let first = dist::products(&info, &param, &[], false, &mut out).unwrap();
    // Second run must recompute and return the full artifact list even
    // though the artifacts already exist on disk
    let second = dist::products(&info, &param, &[], false, &mut out).unwrap();

    assert_eq!(first, second);
    let foo = &second[&pid("foo")];
    assert!(foo.artifacts_for(&"os-arch-bin".parse().unwrap())[0].is_file());
}

#[test]
fn dist_of_product_does_not_dist_unselected_dependency() {
    let root = TempDir::new().unwrap();
    let doc = format!(
        "[product_defaults.build]\nscript = \"{}\"\n\
         [products.foo]\ndependencies = [\"bar\"]\n\
         [products.bar]\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    let mut out = Vec::new();
    let outputs = dist::products(&info, &param, &[selector("foo")], false, &mut out).unwrap();

    assert!(outputs.contains_key(&pid("foo")));
    assert!(!outputs.contains_key(&pid("bar")));
    assert!(!root.path().join("out/dist/bar").exists());
}

#[test]
fn dist_fails_fast_across_products() {
    let root = TempDir::new().unwrap();
    // Product "aaa" sorts (and therefore runs) first and its dist script
    // fails; "zzz" must not be attempted
    let doc = format!(
        "[products.aaa.dist.disters.broken]\ntype = \"manual\"\n\
         [products.aaa.dist.disters.broken.config]\nextension = \"txt\"\nscript = \"false\"\n\
         [products.zzz.build]\nscript = \"{}\"\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    let mut out = Vec::new();
    let err = dist::products(&info, &param, &[], false, &mut out).unwrap_err();
    match err {
        dist::DistError::Execution {
            product,
            dist_id,
            ..
        } => {
            assert_eq!(product, pid("aaa"));
            assert_eq!(dist_id, "broken".parse().unwrap());
        }
        other => panic!("expected Execution error, got {other}"),
    }
    assert!(!root.path().join("out/dist/zzz").exists());
}

#[test]
fn manual_dister_script_produces_configured_artifact() {
    let root = TempDir::new().unwrap();
    let doc = "[products.foo.dist.disters.notes]\ntype = \"manual\"\n\
               [products.foo.dist.disters.notes.config]\n\
               extension = \"txt\"\n\
               script = \"printf 'release notes' > \\\"$DIST_PATH\\\"\"\n";
    let (param, info) = resolve(&root, doc);

    let mut out = Vec::new();
    let outputs = dist::products(&info, &param, &[], false, &mut out).unwrap();

    let host = OsArch::current();
    let expected = root
        .path()
        .join("out/dist/foo/0.1.0/notes")
        .join(format!("foo-0.1.0-{}.txt", host));
    assert!(expected.is_file());
    assert_eq!(std::fs::read_to_string(&expected).unwrap(), "release notes");
    assert_eq!(
        outputs[&pid("foo")].artifacts_for(&"notes".parse().unwrap()),
        &[expected]
    );
}

#[test]
fn unregistered_dister_fails_before_any_side_effect() {
    let root = TempDir::new().unwrap();
    let config: ProjectConfig = toml::from_str(
        "[products.foo.dist.disters.mystery]\ntype = \"not-a-dister\"\n",
    )
    .unwrap();

    let result = config.resolve(
        root.path(),
        "0.1.0",
        &DisterRegistry::builtin(),
        &PublisherRegistry::builtin(),
    );
    assert!(result.is_err());
    assert!(!root.path().join("out").exists());
}

// =============================================================================
// Publish Tests
// =============================================================================

#[test]
fn publish_passes_only_own_artifacts_to_publisher() {
    let root = TempDir::new().unwrap();
    let doc = format!(
        "[product_defaults.build]\nscript = \"{}\"\n\
         [products.foo]\ndependencies = [\"bar\"]\n\
         [products.bar]\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    // bar must be dist'ed for foo's build graph, but publish of foo alone
    // must never see bar's artifacts
    let mut out = Vec::new();
    dist::products(&info, &param, &[], false, &mut out).unwrap();

    let publisher = RecordingPublisher::default();
    let mut out = Vec::new();
    publish::products(
        &info,
        &param,
        &[selector("foo")],
        &publisher,
        &HashMap::new(),
        true,
        &mut out,
    )
    .unwrap();

    let invocations = publisher.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].product, pid("foo"));
    for paths in invocations[0].dist_artifacts.values() {
        for path in paths {
            assert!(path.to_str().unwrap().contains("/foo/"));
            assert!(!path.to_str().unwrap().contains("/bar/"));
        }
    }

    let stdout = String::from_utf8(out).unwrap();
    assert!(stdout.contains("Publishing foo (version 0.1.0)"));
    assert!(!stdout.contains("Publishing bar"));
}

#[test]
fn publish_missing_artifact_is_per_product_failure() {
    let root = TempDir::new().unwrap();
    let doc = format!(
        "[product_defaults.build]\nscript = \"{}\"\n\
         [products.foo]\n[products.bar]\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    // Only foo is dist'ed; publishing everything must still publish foo and
    // report bar's missing artifacts
    let mut out = Vec::new();
    dist::products(&info, &param, &[selector("foo")], false, &mut out).unwrap();

    let publisher = RecordingPublisher::default();
    let mut out = Vec::new();
    let err = publish::products(
        &info,
        &param,
        &[],
        &publisher,
        &HashMap::new(),
        true,
        &mut out,
    )
    .unwrap_err();

    let invocations = publisher.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].product, pid("foo"));

    match err {
        PublishError::Failures(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].product, pid("bar"));
            assert!(matches!(
                failures[0].kind,
                PublishFailureKind::MissingArtifact { .. }
            ));
        }
        other => panic!("expected Failures, got {other}"),
    }
}

#[test]
fn publisher_failure_does_not_abort_siblings() {
    let root = TempDir::new().unwrap();
    let doc = format!(
        "[product_defaults.build]\nscript = \"{}\"\n\
         [products.foo]\n[products.bar]\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    let mut out = Vec::new();
    dist::products(&info, &param, &[], false, &mut out).unwrap();

    let publisher = FailingFor {
        product: pid("bar"),
        attempted: Mutex::new(Vec::new()),
    };
    let mut out = Vec::new();
    let err = publish::products(
        &info,
        &param,
        &[],
        &publisher,
        &HashMap::new(),
        false,
        &mut out,
    )
    .unwrap_err();

    // Both products were attempted despite bar's failure
    let attempted = publisher.attempted.lock().unwrap().clone();
    assert!(attempted.contains(&pid("foo")));
    assert!(attempted.contains(&pid("bar")));

    match err {
        PublishError::Failures(failures) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].product, pid("bar"));
            assert!(matches!(
                failures[0].kind,
                PublishFailureKind::Publisher { .. }
            ));
        }
        other => panic!("expected Failures, got {other}"),
    }
}

#[test]
fn publish_block_lists_artifacts_sorted_by_dist_id() {
    let root = TempDir::new().unwrap();
    let doc = format!(
        "[products.foo.build]\nscript = \"{}\"\n\
         [products.foo.dist.disters.os-arch-bin]\n\
         [products.foo.dist.disters.notes]\ntype = \"manual\"\n\
         [products.foo.dist.disters.notes.config]\n\
         extension = \"txt\"\n\
         script = \"printf 'notes' > \\\"$DIST_PATH\\\"\"\n",
        BUILD_SCRIPT
    );
    let (param, info) = resolve(&root, &doc);

    let mut out = Vec::new();
    dist::products(&info, &param, &[], false, &mut out).unwrap();

    let publisher = RecordingPublisher::default();
    let mut out = Vec::new();
    publish::products(&info, &param, &[], &publisher, &HashMap::new(), true, &mut out).unwrap();

    let stdout = String::from_utf8(out).unwrap();
    let notes_pos = stdout.find("  notes:").unwrap();
    let bin_pos = stdout.find("  os-arch-bin:").unwrap();
    assert!(notes_pos < bin_pos);
}

#[test]
fn local_publisher_end_to_end_with_dry_run() {
    let root = TempDir::new().unwrap();
    let (param, info) = resolve(&root, &single_product_doc());

    let mut out = Vec::new();
    dist::products(&info, &param, &[], false, &mut out).unwrap();

    let destination = root.path().join("releases");
    let publisher = LocalPublisher::from_config(None).unwrap();
    let mut flag_vals = HashMap::new();
    flag_vals.insert(
        "destination".to_string(),
        FlagValue::String(destination.to_str().unwrap().to_string()),
    );

    // Dry run: report only, no side effect
    let mut out = Vec::new();
    publish::products(&info, &param, &[], &publisher, &flag_vals, true, &mut out).unwrap();
    assert!(!destination.exists());
    assert!(String::from_utf8(out).unwrap().contains("[DRY RUN]"));

    // Real run: artifact and checksum land in the destination
    let mut out = Vec::new();
    publish::products(&info, &param, &[], &publisher, &flag_vals, false, &mut out).unwrap();
    let host = OsArch::current();
    let copied = destination.join(format!("foo-0.1.0-{}.tgz", host));
    assert!(copied.is_file());
    assert!(destination
        .join(format!("foo-0.1.0-{}.tgz.sha256", host))
        .is_file());
}

// =============================================================================
// Configuration Loading
// =============================================================================

#[test]
fn load_config_from_project_root() {
    let root = TempDir::new().unwrap();
    let config_path = root.path().join("dist.toml");
    std::fs::write(
        &config_path,
        format!(
            "exclude = [\"vendor\"]\n\n[products.foo.build]\nscript = \"{}\"\n",
            BUILD_SCRIPT
        ),
    )
    .unwrap();

    let config = ProjectConfig::load(&config_path).unwrap();
    let param = config
        .resolve(
            root.path(),
            "1.0.0",
            &DisterRegistry::builtin(),
            &PublisherRegistry::builtin(),
        )
        .unwrap();

    assert_eq!(param.exclude(), &["vendor".to_string()]);
    assert!(param.product(&pid("foo")).is_some());
}

#[test]
fn output_info_is_the_image_pipeline_handoff() {
    let root = TempDir::new().unwrap();
    let (param, info) = resolve(&root, &single_product_doc());

    let mut out = Vec::new();
    let outputs = dist::products(&info, &param, &[], false, &mut out).unwrap();

    // The DistId -> artifact-path mapping serializes as opaque file inputs
    let json = serde_json::to_value(&outputs[&pid("foo")]).unwrap();
    let artifacts = json["dist_artifacts"]["os-arch-bin"].as_array().unwrap();
    assert_eq!(artifacts.len(), 1);
    assert!(PathBuf::from(artifacts[0].as_str().unwrap()).is_file());
}
