//! End-to-end test suite for depaudit-core.

use crate::*;
use crate::testutil::{class_entry, create_temp_dir, write_jar, ClassBuilder, FieldDef, Insn, MethodDef};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn c(s: &str) -> Coordinate {
    s.parse().unwrap()
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn jar(dir: &Path, name: &str, classes: Vec<ClassBuilder>) -> PathBuf {
    let path = dir.join(format!("{}.jar", name));
    let entries: Vec<_> = classes.into_iter().map(class_entry).collect();
    write_jar(&path, &entries);
    path
}

/// Class without a superclass, so the only references are the ones added.
fn bare(name: &str) -> ClassBuilder {
    ClassBuilder::new(name).super_class(None)
}

fn using(name: &str, used: &str) -> ClassBuilder {
    bare(name).method(
        MethodDef::new("run", "()V").code(vec![Insn::invokestatic(used, "call", "()V")]),
    )
}

fn resolve(provider: InMemoryProvider, root: &str) -> Resolver {
    Resolver::new(provider).from_coordinate(&c(root)).unwrap()
}

// Scenario 1: Single artifact without dependencies
#[test]
fn test_single_artifact_without_dependencies() {
    let dir = create_temp_dir("e2e_single");
    let provider = InMemoryProvider::new().with(
        c("g:a:1"),
        jar(&dir, "a", vec![ClassBuilder::new("a/A")]),
        vec![],
    );

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert_eq!(a.defined_classes(), &names(&["a/A"]));
    assert_eq!(a.mappings().as_map(), &BTreeMap::from([("**".to_string(), BTreeSet::new())]));
    assert!(a.unused_dependencies().is_empty());
    assert!(a.undeclared_dependencies().is_empty());
    assert!(!resolver.has_issues());
}

// Scenario 2: Used declared dependency
#[test]
fn test_reference_into_declared_dependency() {
    let dir = create_temp_dir("e2e_used");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![using("a/A", "p/q/X")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("p/q/X")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert_eq!(a.mappings().lookup("p.q.X"), Some(&names(&["g:b"])));
    assert_eq!(a.mappings().len(), 1);
    assert!(a.unused_dependencies().is_empty());
    assert!(a.undeclared_dependencies().is_empty());
}

// Scenario 3: Declared dependency never referenced
#[test]
fn test_unreferenced_dependency_is_unused() {
    let dir = create_temp_dir("e2e_unused");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![ClassBuilder::new("a/A")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![ClassBuilder::new("b/B")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert_eq!(a.unused_dependencies().coordinates(), vec![&c("g:b:1")]);
    assert!(a.undeclared_dependencies().is_empty());
    assert!(resolver.has_issues());
}

// Scenario 4: Class used only from a transitive dependency
#[test]
fn test_transitive_use_is_undeclared() {
    let dir = create_temp_dir("e2e_undeclared");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![using("a/A", "c/C")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("b/B")]), vec![c("g:c:1")])
        .with(c("g:c:1"), jar(&dir, "c", vec![bare("c/C")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert_eq!(a.unused_dependencies().coordinates(), vec![&c("g:b:1")]);
    assert_eq!(a.undeclared_dependencies().coordinates(), vec![&c("g:c:1")]);
    assert_eq!(a.mappings().lookup("c.C"), Some(&names(&["g:c"])));
    assert_eq!(a.flattened_dependencies().len(), 2);
}

// Scenario 5: Cycles through one or more intermediates
#[test]
fn test_cycle_path_lists_every_coordinate() {
    let dir = create_temp_dir("e2e_cycle");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![bare("a/A")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("b/B")]), vec![c("g:c:1")])
        .with(c("g:c:1"), jar(&dir, "c", vec![bare("c/C")]), vec![c("g:a:1")]);

    let err = Resolver::new(provider).from_coordinate(&c("g:a:1")).unwrap_err();
    assert!(matches!(err, DepauditError::CyclicalDependency { .. }));
    // Offender first, then one entry per unwinding frame back to the root.
    assert_eq!(
        err.cycle_path(),
        Some(&[c("g:a:1"), c("g:c:1"), c("g:b:1"), c("g:a:1")][..])
    );
    assert!(err.to_string().contains("g:b:jar:1"));
}

#[test]
fn test_cycle_below_root_ends_at_root() {
    let dir = create_temp_dir("e2e_cycle_below_root");
    let provider = InMemoryProvider::new()
        .with(c("g:r:1"), jar(&dir, "r", vec![bare("r/R")]), vec![c("g:a:1")])
        .with(c("g:a:1"), jar(&dir, "a", vec![bare("a/A")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("b/B")]), vec![c("g:a:1")]);

    let mut resolver = Resolver::new(provider);
    let err = resolver.resolve(&c("g:r:1")).unwrap_err();
    assert_eq!(
        err.cycle_path(),
        Some(&[c("g:a:1"), c("g:b:1"), c("g:a:1"), c("g:r:1")][..])
    );
    assert!(resolver.all_artifacts().is_empty());
}

#[test]
fn test_self_dependency_is_a_cycle() {
    let dir = create_temp_dir("e2e_self_cycle");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![bare("a/A")]), vec![c("g:a:1")]);

    let err = Resolver::new(provider).from_coordinate(&c("g:a:1")).unwrap_err();
    assert_eq!(err.cycle_path(), Some(&[c("g:a:1"), c("g:a:1")][..]));
}

// Scenario 6: Same class shipped by two dependencies
#[test]
fn test_duplicate_class_has_both_origins() {
    let dir = create_temp_dir("e2e_duplicate");
    let provider = InMemoryProvider::new()
        .with(
            c("g:a:1"),
            jar(&dir, "a", vec![using("a/A", "dup/X")]),
            vec![c("g:b:1"), c("g:c:1")],
        )
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("dup/X")]), vec![])
        .with(c("g:c:1"), jar(&dir, "c", vec![bare("dup/X")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert_eq!(a.mappings().lookup("dup.X"), Some(&names(&["g:b", "g:c"])));
    assert!(a.unused_dependencies().is_empty());
    assert!(a.undeclared_dependencies().is_empty());
}

// Self-defined classes never count as references
#[test]
fn test_self_definition_shadows_dependency() {
    let dir = create_temp_dir("e2e_shadow");
    let provider = InMemoryProvider::new()
        .with(
            c("g:a:1"),
            jar(&dir, "a", vec![using("a/A", "shared/S"), bare("shared/S")]),
            vec![c("g:b:1")],
        )
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("shared/S")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let a = &resolver.roots()[0];
    assert!(a.mappings().is_empty());
    assert_eq!(a.unused_dependencies().coordinates(), vec![&c("g:b:1")]);
}

fn internal_name(key: &str) -> String {
    key.replace('.', "/")
}

/// Whether `summary` defines the class a mapping key names, or any class
/// under a wildcard key.
fn defines_under(summary: &ArtifactSummary, key: &str) -> bool {
    let classes = summary.defined_classes();
    if key == "**" {
        return !classes.is_empty();
    }
    if let Some(package) = key.strip_suffix(".**") {
        let prefix = format!("{}/", internal_name(package));
        return classes.iter().any(|class| class.starts_with(&prefix));
    }
    if let Some(package) = key.strip_suffix(".*") {
        let prefix = format!("{}/", internal_name(package));
        return classes
            .iter()
            .any(|class| class.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')));
    }
    classes.contains(&internal_name(key))
}

// Every summary satisfies the set relations between its fields
#[test]
fn test_summary_invariants() {
    let dir = create_temp_dir("e2e_invariants");
    let provider = InMemoryProvider::new()
        .with(
            c("g:app:1"),
            jar(
                &dir,
                "app",
                vec![using("app/Main", "core/Api")
                    .field(FieldDef::new("helper", "Lutil/Helper;"))
                    .interface("java/io/Serializable")],
            ),
            vec![c("g:core:1"), c("g:unused:1")],
        )
        .with(c("g:core:1"), jar(&dir, "core", vec![using("core/Api", "util/Helper")]), vec![c("g:util:1")])
        .with(c("g:util:1"), jar(&dir, "util", vec![bare("util/Helper")]), vec![])
        .with(c("g:unused:1"), jar(&dir, "unused", vec![bare("u/U")]), vec![c("g:util:1")]);

    let resolver = resolve(provider, "g:app:1");
    for summary in resolver.all_artifacts().values() {
        let declared = summary.declared_dependencies();
        let flattened = summary.flattened_dependencies();
        for d in declared {
            assert!(flattened.contains(d.coordinate()));
        }
        for d in summary.unused_dependencies() {
            assert!(declared.contains(d.coordinate()));
        }
        for d in summary.undeclared_dependencies() {
            assert!(flattened.contains(d.coordinate()));
            assert!(!declared.contains(d.coordinate()));
        }
        for (key, origins) in summary.mappings().iter() {
            for origin in origins {
                let suppliers: Vec<_> = flattened
                    .iter()
                    .filter(|d| &d.artifact_name() == origin)
                    .collect();
                assert!(!suppliers.is_empty(), "{} is not a dependency", origin);
                assert!(
                    suppliers.iter().any(|d| defines_under(d, key)),
                    "{} does not define {}",
                    origin,
                    key
                );
            }
            assert!(!summary.defined_classes().iter().any(|class| internal_name(key) == *class));
        }
        assert!(!flattened.contains(summary.coordinate()));
    }

    let app = resolver.get(&c("g:app:1")).unwrap();
    assert_eq!(app.unused_dependencies().coordinates(), vec![&c("g:unused:1")]);
    assert_eq!(app.undeclared_dependencies().coordinates(), vec![&c("g:util:1")]);
    assert_eq!(app.mappings().lookup("java.io.Serializable"), Some(&BTreeSet::new()));
}

// Cache Test 1: Second run is served from the cache
#[test]
fn test_second_run_reads_cache() {
    let dir = create_temp_dir("e2e_cache_hit");
    let cache = ArtifactCache::new(dir.join("cache"));
    let provider = || {
        InMemoryProvider::new()
            .with(c("g:a:1"), dir.join("a.jar"), vec![c("g:b:1")])
            .with(c("g:b:1"), dir.join("b.jar"), vec![c("g:c:1")])
            .with(c("g:c:1"), dir.join("c.jar"), vec![])
    };
    jar(&dir, "a", vec![using("a/A", "c/C")]);
    jar(&dir, "b", vec![bare("b/B")]);
    jar(&dir, "c", vec![bare("c/C")]);

    let first = Resolver::new(provider())
        .with_cache(Some(cache.clone()))
        .from_coordinate(&c("g:a:1"))
        .unwrap();
    for coordinate in ["g:a:1", "g:b:1", "g:c:1"] {
        assert!(cache.entry_path(&c(coordinate)).is_file());
    }

    // Without the jars only the cache can answer.
    for name in ["a", "b", "c"] {
        fs::remove_file(dir.join(format!("{}.jar", name))).unwrap();
    }
    let second = Resolver::new(provider())
        .with_cache(Some(cache.clone()))
        .from_coordinate(&c("g:a:1"))
        .unwrap();

    let before = &first.roots()[0];
    let after = &second.roots()[0];
    assert_eq!(before.defined_classes(), after.defined_classes());
    assert_eq!(before.mappings(), after.mappings());
    assert_eq!(before.declared_dependencies(), after.declared_dependencies());
    assert_eq!(before.flattened_dependencies(), after.flattened_dependencies());
    assert_eq!(before.unused_dependencies(), after.unused_dependencies());
    assert_eq!(before.undeclared_dependencies(), after.undeclared_dependencies());

    let b = after.declared_dependencies().get(&c("g:b:1")).unwrap();
    assert!(Arc::ptr_eq(b, &second.get(&c("g:b:1")).unwrap()));
}

// Cache Test 2: Unreadable entries are recomputed and replaced
#[test]
fn test_corrupt_cache_entry_is_recomputed() {
    let dir = create_temp_dir("e2e_cache_corrupt");
    let cache = ArtifactCache::new(dir.join("cache"));
    fs::create_dir_all(cache.dir()).unwrap();
    fs::write(cache.entry_path(&c("g:a:1")), b"not gzip").unwrap();

    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![ClassBuilder::new("a/A")]), vec![]);
    let resolver = Resolver::new(provider)
        .with_cache(Some(cache.clone()))
        .from_coordinate(&c("g:a:1"))
        .unwrap();

    assert_eq!(resolver.roots()[0].defined_classes(), &names(&["a/A"]));
    let reloaded = cache.load(&c("g:a:1")).unwrap().unwrap();
    assert_eq!(reloaded.coordinate(), &c("g:a:1"));
}

// Cache Test 3: Local project modules bypass the cache
#[test]
fn test_local_modules_are_not_cached() {
    let dir = create_temp_dir("e2e_cache_local");
    let cache = ArtifactCache::new(dir.join("cache"));
    let mut resolver = Resolver::new(InMemoryProvider::new()).with_cache(Some(cache.clone()));
    resolver.add_local(c("g:m:1"), jar(&dir, "m", vec![bare("m/M")]), vec![]);
    resolver.add_root(&c("g:m:1")).unwrap();

    assert!(!cache.entry_path(&c("g:m:1")).exists());
}

// Builder Test: Project with sibling modules
#[test]
fn test_project_modules_see_each_other() {
    let dir = create_temp_dir("e2e_project");
    let write = |path: &str, text: &str| {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    };
    write(
        "pom.xml",
        "<project><groupId>com.acme</groupId><artifactId>root</artifactId><version>1.0</version>\
         <packaging>pom</packaging><modules><module>core</module><module>app</module></modules></project>",
    );
    let parent = "<parent><groupId>com.acme</groupId><artifactId>root</artifactId><version>1.0</version></parent>";
    write("core/pom.xml", &format!("<project>{}<artifactId>core</artifactId></project>", parent));
    write(
        "app/pom.xml",
        &format!(
            "<project>{}<artifactId>app</artifactId><dependencies>\
             <dependency><groupId>com.acme</groupId><artifactId>core</artifactId><version>1.0</version></dependency>\
             </dependencies></project>",
            parent
        ),
    );
    let core_classes = dir.join("core/target/classes/core");
    fs::create_dir_all(&core_classes).unwrap();
    fs::write(core_classes.join("Api.class"), bare("core/Api").build()).unwrap();
    let app_classes = dir.join("app/target/classes/app");
    fs::create_dir_all(&app_classes).unwrap();
    fs::write(app_classes.join("Main.class"), using("app/Main", "core/Api").build()).unwrap();

    let resolver = DepAudit::new()
        .with_repository(dir.join("repo"))
        .with_cache(false)
        .from_project(&dir)
        .unwrap();

    let roots: Vec<_> = resolver.roots().iter().map(|r| r.coordinate().artifact_id().to_string()).collect();
    assert_eq!(roots, vec!["core", "app", "root"]);
    let app = resolver.get(&Coordinate::new("com.acme", "app", "1.0")).unwrap();
    assert_eq!(app.mappings().lookup("core.Api"), Some(&names(&["com.acme:core"])));
    assert!(!app.has_issues());
}

// Report Test: Plain report of an unused dependency
#[test]
fn test_plain_report() {
    let dir = create_temp_dir("e2e_report");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![ClassBuilder::new("a/A")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![ClassBuilder::new("b/B")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let text = render_plain(&resolver);
    assert!(text.contains("  1: g:a:jar:1"));
    assert!(text.contains("  2:   g:b:jar:1"));
    assert!(text.contains("Unused: g:b:jar:1"));
    assert!(text.contains("(Provided by runtime) for classes [**]"));
    assert!(text.contains("g:a:jar:1 declares unused [g:b:jar:1]"));

    let json = json_report(&resolver);
    assert_eq!(json["issues"], true);
    assert_eq!(json["roots"][0], "g:a:jar:1");
}

#[cfg(feature = "graph")]
#[test]
fn test_dot_export_of_resolution() {
    let dir = create_temp_dir("e2e_dot");
    let provider = InMemoryProvider::new()
        .with(c("g:a:1"), jar(&dir, "a", vec![using("a/A", "b/B")]), vec![c("g:b:1")])
        .with(c("g:b:1"), jar(&dir, "b", vec![bare("b/B")]), vec![]);

    let resolver = resolve(provider, "g:a:1");
    let dot = generate_dot(&resolver.all_artifacts());
    assert!(dot.contains("\"g:a:jar:1\" -> \"g:b:jar:1\" [style=solid];"));
    assert!(!dot.contains("lightcoral"));
}

// Config Test: depaudit.toml drives the builder
#[test]
fn test_config_drives_builder() {
    let dir = create_temp_dir("e2e_config");
    fs::write(
        dir.join(CONFIG_FILE),
        format!("repository = {:?}\n[cache]\nenabled = false\n", dir.join("repo").display().to_string()),
    )
    .unwrap();

    let config = load_config(&dir).unwrap().unwrap();
    let resolver = DepAudit::from_config(&config).resolver().unwrap();
    assert!(resolver.cache().is_none());
}
