use std::path::Path;

use super::*;

const LOCK_DOCUMENT: &str = r#"{
 "graph_lock": {
  "nodes": {
   "0": {
    "options": "pkg_a:fPIC=True\npkg_a:shared=False",
    "requires": ["1"],
    "path": "../../conanfile.py",
    "context": "host"
   },
   "1": {
    "ref": "pkg_a/1.0#f3367e0e7d170aa12abccb175fee5f97",
    "options": "fPIC=True\nshared=False\n",
    "package_id": "6af9cc7cb931c5ad942174fd7838eb655717c709",
    "prev": "0f31b0d4b4b3c0bb5ed16cf0d0f2a4e3",
    "context": "host",
    "modified": false
   }
  },
  "revisions_enabled": true
 },
 "version": "0.4",
 "profile_host": "[settings]\narch=x86_64\nbuild_type=Release\ncompiler=gcc\ncompiler.version=8\n[options]\n[build_requires]\n[conf]\ntools.build:skip_test\n[env]\n"
}"#;

const QUERY_RESPONSE: &str = "[settings]
    arch=x86_64
    build_type=Release

[requires]
    pkg_a/1.0#f3367e0e7d170aa12abccb175fee5f97:6af9cc7cb931c5ad942174fd7838eb655717c709

[options]
    with_tests=False
    pkg_b:header_only=True

[full_settings]
    arch=x86_64
    build_type=Release

[full_requires]
    pkg_a/1.0:6af9cc7cb931c5ad942174fd7838eb655717c709

[full_options]
    with_tests=False
    pkg_a:fPIC=True
    pkg_a:shared=False

[recipe_hash]
    1f8f2a4b

[env]

";

#[test]
fn identity_renders_only_known_parts() {
    let mut identity = PackageIdentity::new("pkg_a", "1.0");
    assert_eq!(identity.reference(), "pkg_a/1.0");
    assert_eq!(identity.full_reference(), "pkg_a/1.0");

    identity.revision = Some("rev1".to_string());
    assert_eq!(identity.revisioned_reference(), "pkg_a/1.0#rev1");
    assert_eq!(identity.full_reference(), "pkg_a/1.0#rev1");

    identity.package_id = Some("pid1".to_string());
    identity.package_revision = Some("prev1".to_string());
    assert_eq!(identity.full_reference(), "pkg_a/1.0#rev1:pid1");
    assert_eq!(identity.full_package_reference(), "pkg_a/1.0#rev1:pid1#prev1");
    assert_eq!(identity.to_string(), "pkg_a/1.0#rev1:pid1#prev1");
}

#[test]
fn identity_skips_empty_revision() {
    let mut identity = PackageIdentity::new("pkg_a", "1.0");
    identity.revision = Some(String::new());
    identity.package_id = Some("pid1".to_string());

    let rendered = identity.render(ReferenceParts {
        revision: true,
        package_id: true,
        package_revision: false,
    });
    assert_eq!(rendered, "pkg_a/1.0:pid1");
    assert_eq!(identity.reference(), "pkg_a/1.0");
}

#[test]
fn identities_with_same_key_may_differ() {
    let mut first = PackageIdentity::new("pkg_b", "1.0").with_options(["pkg_a:shared=True"]);
    let second = first.clone();
    assert_eq!(first, second);

    first.revision = Some("r1".to_string());
    assert_ne!(first, second);
    assert_eq!(first.name(), second.name());
    assert_eq!(first.version(), second.version());
    assert_eq!(first.options, vec!["pkg_a:shared=True"]);
}

#[test]
fn ini_parses_sections_bare_keys_and_case() {
    let document = IniDocument::parse(
        "# profile\n[settings]\nArch=x86_64\ncompiler.version = 8\n\n[conf]\ntools.build:skip_test\n",
    )
    .expect("ini should parse");

    let settings = document.section("settings").expect("settings section");
    assert_eq!(settings.get("Arch"), Some(&Some("x86_64".to_string())));
    assert_eq!(settings.get("arch"), None);
    assert_eq!(settings.get("compiler.version"), Some(&Some("8".to_string())));
    assert_eq!(
        document.entries("conf"),
        &[("tools.build:skip_test".to_string(), None)]
    );
    assert!(document.entries("missing").is_empty());
}

#[test]
fn ini_joins_indented_continuation_lines() {
    let document =
        IniDocument::parse("[env]\nPATH=/usr/bin\n    /opt/bin\nCC=gcc\n").expect("ini should parse");
    let env = document.section("env").expect("env section");
    assert_eq!(env.get("PATH"), Some(&Some("/usr/bin\n/opt/bin".to_string())));
    assert_eq!(env.get("CC"), Some(&Some("gcc".to_string())));
}

#[test]
fn ini_indented_keys_at_same_depth_are_separate_entries() {
    let document = IniDocument::parse("[settings]\n    arch=x86_64\n    os=Linux\n")
        .expect("ini should parse");
    let keys: Vec<&str> = document
        .section("settings")
        .expect("settings section")
        .keys()
        .collect();
    assert_eq!(keys, vec!["arch", "os"]);
}

#[test]
fn ini_rejects_duplicates_and_orphan_entries() {
    let err = IniDocument::parse("[a]\nx=1\n[a]\n").expect_err("duplicate section");
    assert!(err.to_string().contains("duplicate section"));

    let err = IniDocument::parse("[a]\nx=1\nx=2\n").expect_err("duplicate key");
    assert!(err.to_string().contains("duplicate key 'x'"));

    let err = IniDocument::parse("x=1\n[a]\n").expect_err("entry before header");
    assert!(err.to_string().contains("before any section header"));

    let err = IniDocument::parse("[a\nx=1\n").expect_err("unterminated header");
    assert!(err.to_string().contains("unterminated section header"));
}

#[test]
fn lock_document_parses_nodes_and_profile() {
    let location = Path::new("/work/_/lockfiles/pkg_a/1.0/lock-1/conan.lock");
    let lock = LockDocument::parse(LOCK_DOCUMENT, Some(location)).expect("lock should parse");

    assert_eq!(lock.version(), Some("0.4"));
    assert!(lock.revisions_enabled());
    assert_eq!(lock.nodes().len(), 2);

    let root = lock.root_node().expect("root node");
    assert_eq!(root.reference, None);
    assert_eq!(root.revision, None);
    assert_eq!(root.package_id, None);
    assert_eq!(root.requires, vec!["1"]);
    assert_eq!(root.options.get("pkg_a:shared"), Some(&"False".to_string()));

    let first = lock.first_node().expect("first node");
    assert_eq!(first.reference.as_deref(), Some("pkg_a/1.0"));
    assert_eq!(first.name(), Some("pkg_a"));
    assert_eq!(first.version(), Some("1.0"));
    assert_eq!(
        first.revision.as_deref(),
        Some("f3367e0e7d170aa12abccb175fee5f97")
    );
    assert_eq!(
        first.package_id.as_deref(),
        Some("6af9cc7cb931c5ad942174fd7838eb655717c709")
    );
    assert_eq!(
        first.package_revision.as_deref(),
        Some("0f31b0d4b4b3c0bb5ed16cf0d0f2a4e3")
    );
    assert_eq!(first.options.len(), 2);
    assert_eq!(first.options.get("fPIC"), Some(&"True".to_string()));
    assert!(first.requires.is_empty());
    assert!(first.build_requires.is_empty());
    assert_eq!(first.path, None);

    assert_eq!(
        lock.recipe_path(),
        Some(Path::new("/work/_/lockfiles/pkg_a/conanfile.py"))
    );

    let profile = lock.profile_host();
    assert_eq!(
        profile.get("settings", &["arch", "compiler"]),
        vec![
            ("arch".to_string(), Some("x86_64".to_string())),
            ("compiler".to_string(), Some("gcc".to_string())),
        ]
    );
    assert_eq!(profile.section("conf").len(), 1);
    assert!(profile.section("options").is_empty());
}

#[test]
fn lock_node_reference_without_revision_is_rejected() {
    let content = r#"{
 "graph_lock": {"nodes": {"1": {"ref": "pkg_a/1.0", "options": ""}}},
 "profile_host": "[settings]\n"
}"#;
    let err = LockDocument::parse(content, None).expect_err("must reject bare reference");
    assert!(matches!(err, ParseError::MissingRevisionSeparator { .. }));
    assert!(err.to_string().contains("pkg_a/1.0"));
}

#[test]
fn lock_node_option_without_separator_is_rejected() {
    let content = r#"{
 "graph_lock": {"nodes": {"1": {"ref": "pkg_a/1.0#r", "options": "shared=True\nfPIC"}}},
 "profile_host": "[settings]\n"
}"#;
    let err = LockDocument::parse(content, None).expect_err("must reject malformed option");
    assert!(err.to_string().contains("'fPIC' is missing '='"));
}

#[test]
fn lock_node_missing_fields_resolve_to_none() {
    let content = r#"{
 "graph_lock": {"nodes": {"0": {}}},
 "profile_host": ""
}"#;
    let lock = LockDocument::parse(content, None).expect("lock should parse");
    let root = lock.root_node().expect("root node");
    assert_eq!(root, &LockNode::default());
    assert!(lock.first_node().is_none());
    assert!(lock.recipe_path().is_none());
    assert_eq!(lock.version(), None);
}

#[test]
fn lock_document_requires_graph_and_profile() {
    let err = LockDocument::parse(r#"{"profile_host": ""}"#, None).expect_err("no graph");
    assert!(err.to_string().contains("graph_lock"));

    let err = LockDocument::parse(r#"{"graph_lock": {"nodes": {}}}"#, None)
        .expect_err("no profile");
    assert!(err.to_string().contains("profile_host"));

    let err = LockDocument::parse("not json", None).expect_err("invalid json");
    assert!(matches!(err, ParseError::InvalidJson(_)));
}

#[test]
fn option_lines_split_on_first_separator() {
    let options = parse_option_lines(&["", "define=A=1", "shared=True"]).expect("must parse");
    assert_eq!(options.get("define"), Some(&"A=1".to_string()));
    assert_eq!(options.get("shared"), Some(&"True".to_string()));
}

#[test]
fn query_result_exposes_normalized_views() {
    let result = CliQueryResult::parse("pkg_b/1.0", QUERY_RESPONSE).expect("response should parse");

    assert_eq!(result.reference(), "pkg_b/1.0");
    assert_eq!(
        result.requires(),
        vec![
            "pkg_a/1.0#f3367e0e7d170aa12abccb175fee5f97:6af9cc7cb931c5ad942174fd7838eb655717c709"
        ]
    );
    assert_eq!(
        result.full_requires(),
        &[(
            "pkg_a/1.0".to_string(),
            "6af9cc7cb931c5ad942174fd7838eb655717c709".to_string()
        )]
    );
    assert_eq!(
        result.build_options(),
        vec![
            ("pkg_b:with_tests".to_string(), Some("False".to_string())),
            ("pkg_b:header_only".to_string(), Some("True".to_string())),
        ]
    );
    assert_eq!(
        result.full_options(),
        vec![
            ("pkg_b:with_tests".to_string(), Some("False".to_string())),
            ("pkg_a:fPIC".to_string(), Some("True".to_string())),
            ("pkg_a:shared".to_string(), Some("False".to_string())),
        ]
    );
    assert_eq!(result.full_settings().len(), 2);
}

#[test]
fn query_result_of_leaf_package_has_empty_requires() {
    let response = "[settings]\n    os=Linux\n\n[requires]\n\n[options]\n    shared=False\n\n[full_requires]\n\n[full_options]\n    shared=False\n";
    let result = CliQueryResult::parse("pkg_a/1.0", response).expect("response should parse");
    assert!(result.requires().is_empty());
    assert!(result.full_requires().is_empty());
    assert!(result.full_settings().is_empty());
    assert_eq!(
        result.full_options(),
        vec![("pkg_a:shared".to_string(), Some("False".to_string()))]
    );
}

#[test]
fn query_result_rejects_full_require_without_package_id() {
    let response = "[full_requires]\n    pkg_a/1.0\n";
    let err = CliQueryResult::parse("pkg_b/1.0", response).expect_err("must reject entry");
    assert!(matches!(err, ParseError::MalformedFullRequire { .. }));
}
