use super::*;
use crate::assertions::{AssertionFailure, Checks, Relation};
use crate::harness::ScenarioReport;
use crate::render::{error_category, format_report_lines, render_status_line, OutputStyle, Status};
use crate::scenarios::{catalog, select};
use clap::error::ErrorKind;
use lockprobe_core::{PackageIdentity, ParseError};
use lockprobe_runner::{BuildFailure, BuiltPackages, CommandFailedError, UpdateMode};
use std::time::Duration;

#[test]
fn config_defaults_apply_to_empty_file() {
    let config = HarnessConfig::parse("").expect("empty config should parse");
    assert_eq!(config, HarnessConfig::default());
    assert_eq!(config.conan, "conan");
    assert_eq!(config.patch, "patch");
    assert_eq!(config.profile, "gcc82");
    assert_eq!(config.recipes_dir, PathBuf::from("fixtures/recipes"));
    assert_eq!(config.work_root, PathBuf::from("test_cases"));
    assert!(!config.keep_artifacts);
}

#[test]
fn config_overrides_selected_fields() {
    let config = HarnessConfig::parse(
        "conan = \"/opt/conan/bin/conan\"\nprofile = \"clang14\"\ntemplate_home = \"/srv/conan-home\"\njobs = 3\n",
    )
    .expect("config should parse");
    assert_eq!(config.conan, "/opt/conan/bin/conan");
    assert_eq!(config.profile, "clang14");
    assert_eq!(config.template_home, Some(PathBuf::from("/srv/conan-home")));
    assert_eq!(config.jobs, Some(3));
    assert_eq!(config.patch, "patch");
}

#[test]
fn config_rejects_unknown_fields() {
    let err = HarnessConfig::parse("conann = \"typo\"\n").expect_err("unknown field must fail");
    assert!(format!("{err:#}").contains("unknown field"));
}

#[test]
fn explicit_config_path_must_exist() {
    let err = HarnessConfig::discover(Some(Path::new("/nonexistent/lockprobe.toml")))
        .expect_err("missing explicit config must fail");
    assert!(err.to_string().contains("failed reading config"));
}

#[test]
fn effective_jobs_never_exceeds_scenario_count() {
    let mut config = HarnessConfig {
        jobs: Some(8),
        ..HarnessConfig::default()
    };
    assert_eq!(config.effective_jobs(3), 3);
    config.jobs = Some(0);
    assert_eq!(config.effective_jobs(3), 1);
    config.jobs = None;
    assert_eq!(config.effective_jobs(0), 1);
    assert!(config.effective_jobs(7) >= 1);
}

#[test]
fn cli_flags_override_config_values() {
    let cli = Cli::try_parse_from([
        "lockprobe",
        "--profile",
        "clang14",
        "--keep-artifacts",
        "--jobs",
        "2",
        "header_only_recipe_upgrade_bad",
    ])
    .expect("arguments should parse");
    assert_eq!(cli.scenarios, vec!["header_only_recipe_upgrade_bad"]);
    assert_eq!(cli.log_level, "warn");

    let config = apply_overrides(HarnessConfig::default(), &cli);
    assert_eq!(config.profile, "clang14");
    assert!(config.keep_artifacts);
    assert_eq!(config.jobs, Some(2));

    let cli = Cli::try_parse_from(["lockprobe", "--sequential"]).expect("arguments should parse");
    let config = apply_overrides(
        HarnessConfig {
            jobs: Some(6),
            ..HarnessConfig::default()
        },
        &cli,
    );
    assert_eq!(config.jobs, Some(1));
    assert_eq!(config.profile, "gcc82");
}

#[test]
fn cli_rejects_sequential_with_jobs() {
    let err = Cli::try_parse_from(["lockprobe", "--sequential", "--jobs", "2"])
        .expect_err("conflicting flags must fail");
    assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
}

#[test]
fn absolute_keeps_absolute_paths() {
    let base = Path::new("/work");
    assert_eq!(absolute(base, Path::new("test_cases")), PathBuf::from("/work/test_cases"));
    assert_eq!(absolute(base, Path::new("/tmp/cases")), PathBuf::from("/tmp/cases"));
}

#[test]
fn catalog_lists_seven_uniquely_named_scenarios() {
    let scenarios = catalog();
    let mut names: Vec<&str> = scenarios.iter().map(|scenario| scenario.name).collect();
    assert_eq!(names.len(), 7);
    names.sort_unstable();
    names.dedup();
    assert_eq!(names.len(), 7);

    let good_modes: Vec<UpdateMode> = scenarios
        .iter()
        .filter(|scenario| scenario.name.ends_with("_good"))
        .map(|scenario| scenario.mode)
        .collect();
    assert!(good_modes.iter().all(|mode| *mode == UpdateMode::ALL));
    assert!(scenarios
        .iter()
        .filter(|scenario| scenario.name.ends_with("_bad"))
        .all(|scenario| scenario.mode.is_none()));
}

#[test]
fn catalog_plans_reference_shipped_fixtures() {
    let recipes = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/recipes");
    for scenario in catalog() {
        let plan = scenario.plan().expect("plan should build");
        let mut seen: Vec<&str> = Vec::new();
        for (name, spec) in plan.iter() {
            for dependency in &spec.dependencies {
                assert!(
                    seen.contains(&dependency.as_str()),
                    "{}: {name} depends on {dependency} before it is built",
                    scenario.name
                );
            }
            assert!(recipes
                .join(spec.package.name())
                .join("conanfile.py")
                .is_file());
            if let Some(patch) = &spec.patch_file {
                assert!(recipes.join(patch).is_file(), "missing patch {}", patch.display());
            }
            seen.push(name);
        }
    }
}

#[test]
fn select_keeps_catalog_order_and_rejects_unknown_names() {
    let selected = select(
        catalog(),
        &[
            "build_requirement_options_upgrade".to_string(),
            "header_only_recipe_upgrade_good".to_string(),
        ],
    )
    .expect("known names should select");
    let names: Vec<&str> = selected.iter().map(|scenario| scenario.name).collect();
    assert_eq!(
        names,
        vec!["header_only_recipe_upgrade_good", "build_requirement_options_upgrade"]
    );

    let err = select(catalog(), &["no_such_scenario".to_string()]).expect_err("must reject");
    assert!(err.to_string().contains("unknown scenario 'no_such_scenario'"));

    assert_eq!(select(catalog(), &[]).expect("empty selects all").len(), 7);
}

#[test]
fn header_only_upgrade_bad_passes_on_expected_identities() {
    let built = header_only_upgrade_bad_records();
    let scenario = scenario("header_only_recipe_upgrade_bad");
    assert_eq!(scenario.verify(&built).expect("expectations should hold"), 15);
}

#[test]
fn header_only_upgrade_bad_reports_every_mismatch_with_literals() {
    let mut built_records = header_only_upgrade_bad_entries();
    built_records[4].1.revision = Some("rb-changed".to_string());
    built_records[5].1.requires.clear();
    let built: BuiltPackages = built_records.into_iter().collect();

    let err = scenario("header_only_recipe_upgrade_bad")
        .verify(&built)
        .expect_err("mismatches must fail");
    let failure = err
        .downcast_ref::<AssertionFailure>()
        .expect("error should be an assertion failure");
    assert_eq!(failure.evaluated, 15);
    assert_eq!(failure.failures.len(), 2);
    assert_eq!(failure.failures[0].label, "pkg_b1.revision vs pkg_b2.revision");
    assert_eq!(failure.failures[0].relation, Relation::Equal);
    assert_eq!(failure.failures[0].right, "Some(\"rb-changed\")");
    assert_eq!(failure.failures[1].label, "pkg_c2.requires");
    assert_eq!(failure.failures[1].left, "[]");

    let rendered = err.to_string();
    assert!(rendered.contains("2 of 15 expectations failed in header_only_recipe_upgrade_bad"));
    assert!(rendered.contains("left = Some(\"rb\"), right = Some(\"rb-changed\")"));
}

#[test]
fn verification_requires_every_planned_record() {
    let built: BuiltPackages = header_only_upgrade_bad_entries()
        .into_iter()
        .filter(|(name, _)| name != "pkg_c2")
        .collect();
    let err = scenario("header_only_recipe_upgrade_bad")
        .verify(&built)
        .expect_err("missing record must fail");
    assert!(err.to_string().contains("no built record named 'pkg_c2'"));
}

#[test]
fn build_requirement_options_upgrade_expects_unchanged_consumer() {
    let e = identity("pkg_e", "re", "pe", "xe", &[]);
    let built: BuiltPackages = [
        ("pkg_d1".to_string(), identity("pkg_d", "rd", "pd1", "xd1", &[])),
        ("pkg_e1".to_string(), e.clone()),
        ("pkg_d2".to_string(), identity("pkg_d", "rd", "pd2", "xd2", &[])),
        ("pkg_e2".to_string(), e),
    ]
    .into_iter()
    .collect();
    assert_eq!(
        scenario("build_requirement_options_upgrade")
            .verify(&built)
            .expect("expectations should hold"),
        10
    );

    let err = scenario("build_requirement_recipe_upgrade_good")
        .verify(&built)
        .expect_err("unchanged recipe must fail the upgrade expectations");
    assert!(err.to_string().contains("pkg_d1.revision vs pkg_d2.revision"));
}

#[test]
fn checks_count_and_collect_results() {
    let mut checks = Checks::default();
    checks.equal("same", &1, &1);
    checks.not_equal("different", "a", "a");
    checks.equal("slices", ["x"].as_slice(), ["x"].as_slice());
    let failure = checks.finish("demo").expect_err("one check failed");
    assert_eq!(failure.evaluated, 3);
    assert_eq!(failure.failures.len(), 1);
    assert_eq!(
        failure.failures[0].to_string(),
        "different: expected not equal, left = \"a\", right = \"a\""
    );
}

#[test]
fn status_line_plain_and_rich() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, Status::Pass, "scenario_a"),
        "PASS scenario_a"
    );
    let rich = render_status_line(OutputStyle::Rich, Status::Fail, "scenario_a");
    assert!(rich.contains("[FAIL]"));
    assert!(rich.ends_with(" scenario_a"));
    assert_eq!(resolve_output_style(false), OutputStyle::Plain);
    assert_eq!(resolve_output_style(true), OutputStyle::Rich);
}

#[test]
fn error_category_finds_typed_errors_in_chain() {
    let command = CommandFailedError {
        command_line: "conan export recipes/pkg_a 1.0@".to_string(),
        status: Some(1),
        stderr: "ERROR: boom".to_string(),
    };
    let failure = BuildFailure {
        package: "pkg_a1".to_string(),
        built: BuiltPackages::default(),
        error: anyhow::Error::new(command),
    };
    assert_eq!(error_category(&anyhow::Error::new(failure)), "command failed");

    let parse = anyhow::Error::new(ParseError::MissingField {
        field: "profile_host",
    })
    .context("failed parsing lock file");
    assert_eq!(error_category(&parse), "parse error");

    let assertion = anyhow::Error::new(AssertionFailure {
        scenario: "demo".to_string(),
        evaluated: 1,
        failures: Vec::new(),
    });
    assert_eq!(error_category(&assertion), "assertion failed");

    assert_eq!(error_category(&anyhow::anyhow!("plain")), "error");
}

#[test]
fn report_lines_show_category_and_details() {
    let report = ScenarioReport {
        name: "header_only_recipe_upgrade_bad".to_string(),
        outcome: Err(anyhow::anyhow!("lock file has no node").context("building failed")),
        elapsed: Duration::from_millis(1500),
        artifacts: Some(PathBuf::from("/work/test_cases/header_only_recipe_upgrade_bad")),
    };
    let lines = format_report_lines(&report, OutputStyle::Plain);
    assert_eq!(
        lines[0],
        "FAIL header_only_recipe_upgrade_bad (1.500s): error"
    );
    assert_eq!(lines[1], "    building failed: lock file has no node");
    assert_eq!(
        lines[2],
        "    artifacts kept in /work/test_cases/header_only_recipe_upgrade_bad"
    );
}

#[test]
fn summary_counts_skipped_as_unsuccessful() {
    let passed = ScenarioReport {
        name: "a".to_string(),
        outcome: Ok(3),
        elapsed: Duration::ZERO,
        artifacts: None,
    };
    let failed = ScenarioReport {
        name: "b".to_string(),
        outcome: Err(anyhow::anyhow!("boom")),
        elapsed: Duration::ZERO,
        artifacts: None,
    };
    let outcomes = vec![
        TaskOutcome::Finished(passed),
        TaskOutcome::Finished(failed),
        TaskOutcome::Skipped,
    ];
    let summary = Summary::from_outcomes(&outcomes);
    assert_eq!(
        summary,
        Summary {
            passed: 1,
            failed: 1,
            skipped: 1
        }
    );
    assert!(!summary.succeeded());
    assert_eq!(
        summary.render(OutputStyle::Plain),
        "3 scenarios: 1 passed, 1 failed, 1 skipped"
    );

    let clean = Summary {
        passed: 2,
        ..Summary::default()
    };
    assert!(clean.succeeded());
}

fn scenario(name: &str) -> scenarios::Scenario {
    catalog()
        .into_iter()
        .find(|scenario| scenario.name == name)
        .unwrap_or_else(|| panic!("unknown scenario {name}"))
}

fn identity(
    name: &str,
    revision: &str,
    package_id: &str,
    package_revision: &str,
    requires: &[&PackageIdentity],
) -> PackageIdentity {
    let mut package = PackageIdentity::new(name, "1.0");
    package.revision = Some(revision.to_string());
    package.package_id = Some(package_id.to_string());
    package.package_revision = Some(package_revision.to_string());
    package.requires = requires
        .iter()
        .map(|dependency| dependency.full_reference())
        .collect();
    package
}

fn header_only_upgrade_bad_entries() -> Vec<(String, PackageIdentity)> {
    let a1 = identity("pkg_a", "ra1", "pa", "xa1", &[]);
    let a2 = identity("pkg_a", "ra2", "pa", "xa2", &[]);
    let b1 = identity("pkg_b", "rb", "pb", "xb", &[]);
    let b2 = b1.clone();
    let c1 = identity("pkg_c", "rc", "pc1", "xc1", &[&a1, &b1]);
    let c2 = identity("pkg_c", "rc", "pc2", "xc2", &[&a2, &b2]);
    vec![
        ("pkg_a1".to_string(), a1),
        ("pkg_b1".to_string(), b1),
        ("pkg_c1".to_string(), c1),
        ("pkg_a2".to_string(), a2),
        ("pkg_b2".to_string(), b2),
        ("pkg_c2".to_string(), c2),
    ]
}

fn header_only_upgrade_bad_records() -> BuiltPackages {
    header_only_upgrade_bad_entries().into_iter().collect()
}
