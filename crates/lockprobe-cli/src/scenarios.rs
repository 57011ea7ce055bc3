use anyhow::{Context, Result};
use lockprobe_core::PackageIdentity;
use lockprobe_runner::{BuildPlan, BuildSpec, BuiltPackages, UpdateMode};

use crate::assertions::Checks;

const PKG_A_PATCH: &str = "patches/pkg_a_add_defines.patch";
const PKG_D_PATCH: &str = "patches/pkg_d_recipe_upgrade.patch";

type PlanFn = fn() -> Result<BuildPlan>;
type VerifyFn = fn(&BuiltPackages, &mut Checks) -> Result<()>;

/// A build plan, the recipe update mode it runs under and the identity
/// relations expected between its records.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub mode: UpdateMode,
    plan: PlanFn,
    verify: VerifyFn,
}

impl Scenario {
    pub fn plan(&self) -> Result<BuildPlan> {
        (self.plan)().with_context(|| format!("invalid build plan for {}", self.name))
    }

    /// Number of expectations checked when all of them hold.
    pub fn verify(&self, built: &BuiltPackages) -> Result<usize> {
        let mut checks = Checks::default();
        (self.verify)(built, &mut checks)?;
        Ok(checks.finish(self.name)?)
    }
}

pub fn catalog() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "header_only_recipe_upgrade_bad",
            mode: UpdateMode::NONE,
            plan: header_only_upgrade_plan,
            verify: header_only_recipe_upgrade_bad,
        },
        Scenario {
            name: "header_only_recipe_upgrade_good",
            mode: UpdateMode::ALL,
            plan: header_only_upgrade_plan,
            verify: header_only_recipe_upgrade_good,
        },
        Scenario {
            name: "header_only_configuration_change_bad",
            mode: UpdateMode::NONE,
            plan: header_only_configuration_plan,
            verify: header_only_configuration_change_bad,
        },
        Scenario {
            name: "header_only_configuration_change_good",
            mode: UpdateMode::ALL,
            plan: header_only_configuration_plan,
            verify: header_only_configuration_change_good,
        },
        Scenario {
            name: "build_requirement_recipe_upgrade_bad",
            mode: UpdateMode::NONE,
            plan: build_requirement_upgrade_plan,
            verify: build_requirement_recipe_upgrade_bad,
        },
        Scenario {
            name: "build_requirement_recipe_upgrade_good",
            mode: UpdateMode::ALL,
            plan: build_requirement_upgrade_plan,
            verify: build_requirement_recipe_upgrade_good,
        },
        Scenario {
            name: "build_requirement_options_upgrade",
            mode: UpdateMode::ALL,
            plan: build_requirement_options_plan,
            verify: build_requirement_options_upgrade,
        },
    ]
}

/// Keeps the scenarios named in `names`, in catalog order. No names selects
/// everything.
pub fn select(catalog: Vec<Scenario>, names: &[String]) -> Result<Vec<Scenario>> {
    if names.is_empty() {
        return Ok(catalog);
    }
    for name in names {
        if !catalog.iter().any(|scenario| scenario.name == name) {
            let known: Vec<&str> = catalog.iter().map(|scenario| scenario.name).collect();
            anyhow::bail!("unknown scenario '{name}' (known: {})", known.join(", "));
        }
    }
    Ok(catalog
        .into_iter()
        .filter(|scenario| names.iter().any(|name| name == scenario.name))
        .collect())
}

fn pkg_a(shared: bool) -> PackageIdentity {
    let package = PackageIdentity::new("pkg_a", "1.0");
    if shared {
        package.with_options(["pkg_a:shared=True"])
    } else {
        package
    }
}

fn pkg_b() -> PackageIdentity {
    PackageIdentity::new("pkg_b", "1.0")
}

fn pkg_c() -> PackageIdentity {
    PackageIdentity::new("pkg_c", "1.0")
}

fn pkg_d(with_optimization: bool) -> PackageIdentity {
    let package = PackageIdentity::new("pkg_d", "1.0");
    if with_optimization {
        package.with_options(["pkg_d:with_optimization=True"])
    } else {
        package
    }
}

fn pkg_e() -> PackageIdentity {
    PackageIdentity::new("pkg_e", "1.0")
}

fn header_only_upgrade_plan() -> Result<BuildPlan> {
    let mut plan = BuildPlan::new();
    plan.insert("pkg_a1", BuildSpec::new(pkg_a(false)))?;
    plan.insert("pkg_b1", BuildSpec::new(pkg_b()).depends_on(["pkg_a1"]))?;
    plan.insert("pkg_c1", BuildSpec::new(pkg_c()).depends_on(["pkg_b1"]))?;
    plan.insert("pkg_a2", BuildSpec::new(pkg_a(false)).with_patch(PKG_A_PATCH))?;
    plan.insert("pkg_b2", BuildSpec::new(pkg_b()).depends_on(["pkg_a2"]))?;
    plan.insert("pkg_c2", BuildSpec::new(pkg_c()).depends_on(["pkg_b2"]))?;
    Ok(plan)
}

fn header_only_configuration_plan() -> Result<BuildPlan> {
    let mut plan = BuildPlan::new();
    plan.insert("pkg_a1", BuildSpec::new(pkg_a(false)))?;
    plan.insert("pkg_b1", BuildSpec::new(pkg_b()).depends_on(["pkg_a1"]))?;
    plan.insert("pkg_c1", BuildSpec::new(pkg_c()).depends_on(["pkg_b1"]))?;
    plan.insert("pkg_a2", BuildSpec::new(pkg_a(true)))?;
    plan.insert("pkg_b2", BuildSpec::new(pkg_b()).depends_on(["pkg_a2"]))?;
    plan.insert(
        "pkg_c2",
        BuildSpec::new(pkg_c()).depends_on(["pkg_a2", "pkg_b2"]),
    )?;
    Ok(plan)
}

fn build_requirement_upgrade_plan() -> Result<BuildPlan> {
    let mut plan = BuildPlan::new();
    plan.insert("pkg_d1", BuildSpec::new(pkg_d(false)))?;
    plan.insert("pkg_e1", BuildSpec::new(pkg_e()).depends_on(["pkg_d1"]))?;
    plan.insert("pkg_d2", BuildSpec::new(pkg_d(false)).with_patch(PKG_D_PATCH))?;
    plan.insert("pkg_e2", BuildSpec::new(pkg_e()).depends_on(["pkg_d2"]))?;
    Ok(plan)
}

fn build_requirement_options_plan() -> Result<BuildPlan> {
    let mut plan = BuildPlan::new();
    plan.insert("pkg_d1", BuildSpec::new(pkg_d(false)))?;
    plan.insert("pkg_e1", BuildSpec::new(pkg_e()).depends_on(["pkg_d1"]))?;
    plan.insert("pkg_d2", BuildSpec::new(pkg_d(true)))?;
    plan.insert("pkg_e2", BuildSpec::new(pkg_e()).depends_on(["pkg_d2"]))?;
    Ok(plan)
}

#[derive(Clone, Copy)]
enum Expect {
    Same,
    Differs,
}

use Expect::{Differs, Same};

#[derive(Clone, Copy)]
struct Record<'a> {
    name: &'static str,
    package: &'a PackageIdentity,
}

fn records<'a, const N: usize>(
    built: &'a BuiltPackages,
    names: [&'static str; N],
) -> Result<[Record<'a>; N]> {
    let mut found = Vec::with_capacity(N);
    for name in names {
        let package = built
            .get(name)
            .with_context(|| format!("no built record named '{name}'"))?;
        found.push(Record { name, package });
    }
    found
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected {N} built records"))
}

fn expect<T>(checks: &mut Checks, label: String, left: &T, right: &T, relation: Expect)
where
    T: PartialEq + std::fmt::Debug + ?Sized,
{
    match relation {
        Same => checks.equal(label, left, right),
        Differs => checks.not_equal(label, left, right),
    }
}

/// Compares revision, package id and package revision of two builds of the
/// same package.
fn compare(
    checks: &mut Checks,
    first: Record<'_>,
    second: Record<'_>,
    revision: Expect,
    package_id: Expect,
    package_revision: Expect,
) {
    let label = |field: &str| format!("{}.{field} vs {}.{field}", first.name, second.name);
    expect(
        checks,
        label("revision"),
        &first.package.revision,
        &second.package.revision,
        revision,
    );
    expect(
        checks,
        label("package_id"),
        &first.package.package_id,
        &second.package.package_id,
        package_id,
    );
    expect(
        checks,
        label("package_revision"),
        &first.package.package_revision,
        &second.package.package_revision,
        package_revision,
    );
}

fn requires(checks: &mut Checks, record: Record<'_>, dependencies: &[Record<'_>]) {
    let expected: Vec<String> = dependencies
        .iter()
        .map(|dependency| dependency.package.full_reference())
        .collect();
    checks.equal(
        format!("{}.requires", record.name),
        record.package.requires.as_slice(),
        expected.as_slice(),
    );
}

fn no_requires(checks: &mut Checks, records: &[Record<'_>]) {
    for record in records {
        requires(checks, *record, &[]);
    }
}

fn header_only_recipe_upgrade_bad(built: &BuiltPackages, checks: &mut Checks) -> Result<()> {
    let [a1, a2, b1, b2, c1, c2] = records(
        built,
        ["pkg_a1", "pkg_a2", "pkg_b1", "pkg_b2", "pkg_c1", "pkg_c2"],
    )?;
    compare(checks, a1, a2, Differs, Same, Differs);
    no_requires(checks, &[a1, a2]);

    // The header-only hook drops dependency information, so both builds of
    // pkg_b collapse into one identity.
    compare(checks, b1, b2, Same, Same, Same);
    no_requires(checks, &[b1, b2]);

    compare(checks, c1, c2, Same, Differs, Differs);
    requires(checks, c1, &[a1, b1]);
    requires(checks, c2, &[a2, b2]);
    Ok(())
}

fn header_only_recipe_upgrade_good(built: &BuiltPackages, checks: &mut Checks) -> Result<()> {
    let [a1, a2, b1, b2, c1, c2] = records(
        built,
        ["pkg_a1", "pkg_a2", "pkg_b1", "pkg_b2", "pkg_c1", "pkg_c2"],
    )?;
    compare(checks, a1, a2, Differs, Same, Differs);
    no_requires(checks, &[a1, a2]);

    compare(checks, b1, b2, Differs, Differs, Differs);
    requires(checks, b1, &[a1]);
    requires(checks, b2, &[a2]);

    compare(checks, c1, c2, Differs, Differs, Differs);
    requires(checks, c1, &[a1, b1]);
    requires(checks, c2, &[a2, b2]);
    Ok(())
}

fn header_only_configuration_change_bad(built: &BuiltPackages, checks: &mut Checks) -> Result<()> {
    let [a1, a2, b1, b2, c1, c2] = records(
        built,
        ["pkg_a1", "pkg_a2", "pkg_b1", "pkg_b2", "pkg_c1", "pkg_c2"],
    )?;
    compare(checks, a1, a2, Same, Differs, Differs);
    no_requires(checks, &[a1, a2]);

    // Only the package revision tells the two pkg_b builds apart.
    compare(checks, b1, b2, Same, Same, Differs);
    no_requires(checks, &[b1, b2]);

    compare(checks, c1, c2, Same, Differs, Differs);
    requires(checks, c1, &[a1, b1]);
    requires(checks, c2, &[a2, b2]);
    Ok(())
}

fn header_only_configuration_change_good(
    built: &BuiltPackages,
    checks: &mut Checks,
) -> Result<()> {
    let [a1, a2, b1, b2, c1, c2] = records(
        built,
        ["pkg_a1", "pkg_a2", "pkg_b1", "pkg_b2", "pkg_c1", "pkg_c2"],
    )?;
    compare(checks, a1, a2, Same, Differs, Differs);
    no_requires(checks, &[a1, a2]);

    compare(checks, b1, b2, Same, Differs, Differs);
    requires(checks, b1, &[a1]);
    requires(checks, b2, &[a2]);

    compare(checks, c1, c2, Same, Differs, Differs);
    requires(checks, c1, &[a1, b1]);
    requires(checks, c2, &[a2, b2]);
    Ok(())
}

fn build_requirement_recipe_upgrade_bad(built: &BuiltPackages, checks: &mut Checks) -> Result<()> {
    let [d1, d2, e1, e2] = records(built, ["pkg_d1", "pkg_d2", "pkg_e1", "pkg_e2"])?;
    compare(checks, d1, d2, Differs, Same, Differs);
    no_requires(checks, &[d1, d2]);

    // A new build requirement recipe leaves no trace in the consumer.
    compare(checks, e1, e2, Same, Same, Same);
    no_requires(checks, &[e1, e2]);
    Ok(())
}

fn build_requirement_recipe_upgrade_good(
    built: &BuiltPackages,
    checks: &mut Checks,
) -> Result<()> {
    let [d1, d2, e1, e2] = records(built, ["pkg_d1", "pkg_d2", "pkg_e1", "pkg_e2"])?;
    compare(checks, d1, d2, Differs, Same, Differs);
    no_requires(checks, &[d1, d2]);

    compare(checks, e1, e2, Differs, Same, Differs);
    no_requires(checks, &[e1, e2]);
    Ok(())
}

fn build_requirement_options_upgrade(built: &BuiltPackages, checks: &mut Checks) -> Result<()> {
    let [d1, d2, e1, e2] = records(built, ["pkg_d1", "pkg_d2", "pkg_e1", "pkg_e2"])?;
    compare(checks, d1, d2, Same, Differs, Differs);
    no_requires(checks, &[d1, d2]);

    // Build requirement options are expected to be pinned by the profile.
    compare(checks, e1, e2, Same, Same, Same);
    no_requires(checks, &[e1, e2]);
    Ok(())
}
