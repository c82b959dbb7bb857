use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use component_core::{
    config::ScanOrder,
    defaults::ManifestDefaults,
    BlockDeriver, CancelSignal, CollectingSink, ComponentDiscovery, ConfiguredHost, Config,
    DiagnosticKind, DiscoveryError, DiscoveryOptions, ExtensionKind, FnAlter, Registry,
};
use component_manifest::CachePolicy;
use serde_json::json;
use tempfile::TempDir;

struct Site {
    tmp: TempDir,
}

impl Site {
    fn new() -> Self {
        Self {
            tmp: tempfile::tempdir().unwrap(),
        }
    }

    fn base(&self, rel: &str) -> PathBuf {
        self.tmp.path().join(rel)
    }

    fn write(&self, rel: &str, body: &str) -> PathBuf {
        let path = self.tmp.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        path
    }
}

fn discovery(host: ConfiguredHost, sink: Arc<CollectingSink>) -> ComponentDiscovery {
    ComponentDiscovery::new(Arc::new(host), DiscoveryOptions::default())
        .unwrap()
        .with_sink(sink)
}

fn theme(site: &Site, name: &str) -> ConfiguredHost {
    ConfiguredHost::default().with_extension(
        name,
        ExtensionKind::Theme,
        site.base(&format!("themes/{name}")),
    )
}

#[test]
fn discovers_a_block_with_defaults() {
    let site = Site::new();
    site.write(
        "themes/demo/components/hero.component.yml",
        "name: Hero\ndescription: Hero banner\ntype: block\n",
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();

    let hero = registry.get("block", "hero").expect("hero registered");
    assert_eq!(hero.machine_name, "hero");
    assert_eq!(hero.name, "Hero");
    assert_eq!(hero.template, "index.htm");
    assert_eq!(hero.cache, CachePolicy::uncacheable());
    assert_eq!(hero.path, site.base("themes/demo/components"));
    assert_eq!(hero.subpath, "");
    assert!(hero.js.is_empty() && hero.css.is_empty() && hero.dependencies.is_empty());
    assert_eq!(hero.form_configuration, json!({}));
    assert_eq!(hero.static_configuration, json!({}));
    assert_eq!(registry.len(), 1);
    assert!(sink.is_empty());
}

#[test]
fn manifest_missing_description_is_excluded_and_reported() {
    let site = Site::new();
    let path = site.write(
        "themes/demo/components/hero.component.yml",
        "name: Hero\ntype: block\n",
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();

    assert!(registry.find("hero").is_none());
    let reported = sink.of_kind(DiagnosticKind::MissingRequired);
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].context["keys"], "description");
    assert_eq!(reported[0].path.as_deref(), Some(path.as_path()));
}

#[test]
fn later_root_wins_on_duplicate_machine_name() {
    let site = Site::new();
    site.write(
        "modules/alpha/components/hero/hero.component.yml",
        "name: Hero A\ndescription: first\n",
    );
    site.write(
        "themes/demo/components/hero/hero.component.yml",
        "name: Hero B\ndescription: second\n",
    );
    let host = ConfiguredHost::default()
        .with_extension("alpha", ExtensionKind::Module, site.base("modules/alpha"))
        .with_extension("demo", ExtensionKind::Theme, site.base("themes/demo"));
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(host, sink.clone()).discover().unwrap();

    assert_eq!(registry.get("block", "hero").unwrap().name, "Hero B");
    let collisions = sink.of_kind(DiagnosticKind::Collision);
    assert_eq!(collisions.len(), 1);
    assert_eq!(collisions[0].context["machine_name"], "hero");
}

#[test]
fn top_level_root_overrides_every_extension() {
    let site = Site::new();
    for (rel, name) in [
        ("modules/alpha/components/hero.component.yml", "Alpha"),
        ("themes/demo/components/hero.component.yml", "Demo"),
        ("web/components/hero.component.yml", "Site"),
    ] {
        site.write(rel, &format!("name: {name}\ndescription: d\n"));
    }
    let host = ConfiguredHost::default()
        .with_extension("alpha", ExtensionKind::Module, site.base("modules/alpha"))
        .with_extension("demo", ExtensionKind::Theme, site.base("themes/demo"));
    let options = DiscoveryOptions {
        top_level_root: Some(site.base("web")),
        report_collisions: false,
        ..DiscoveryOptions::default()
    };
    let sink = Arc::new(CollectingSink::new());
    let registry = ComponentDiscovery::new(Arc::new(host), options)
        .unwrap()
        .with_sink(sink.clone())
        .discover()
        .unwrap();

    assert_eq!(registry.get("block", "hero").unwrap().name, "Site");
    assert!(sink.of_kind(DiagnosticKind::Collision).is_empty());
}

#[test]
fn lexical_scan_order_is_configurable() {
    let site = Site::new();
    site.write("ext/zeta/components/hero.component.yml", "name: Zeta\ndescription: d\n");
    site.write("ext/alpha/components/hero.component.yml", "name: Alpha\ndescription: d\n");
    let host = ConfiguredHost::default()
        .with_extension("zeta", ExtensionKind::Module, site.base("ext/zeta"))
        .with_extension("alpha", ExtensionKind::Module, site.base("ext/alpha"));

    let declared = ComponentDiscovery::new(Arc::new(host.clone()), DiscoveryOptions::default())
        .unwrap()
        .with_sink(Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();
    assert_eq!(declared.get("block", "hero").unwrap().name, "Alpha");

    let options = DiscoveryOptions {
        scan_order: ScanOrder::Lexical,
        ..DiscoveryOptions::default()
    };
    let lexical = ComponentDiscovery::new(Arc::new(host), options)
        .unwrap()
        .with_sink(Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();
    assert_eq!(lexical.get("block", "hero").unwrap().name, "Zeta");
}

#[test]
fn entity_context_reaches_derived_block() {
    let site = Site::new();
    site.write(
        "themes/demo/components/teaser/teaser.component.yml",
        "name: Teaser\ndescription: Node teaser\ncontexts:\n  entity: node\ncache:\n  max-age: 300\n",
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();
    let blocks = BlockDeriver::new(sink.clone()).derive(&registry);

    let teaser = &blocks["teaser"];
    assert_eq!(teaser.id, "component:teaser");
    assert_eq!(teaser.admin_label, "Teaser");
    assert_eq!(teaser.cache_policy.max_age, 300);
    assert_eq!(teaser.context_requirements["entity"].data_type, "entity:node");
    assert_eq!(teaser.info.subpath, "teaser");
    assert!(sink.is_empty());
}

#[test]
fn ignored_directories_hide_decoy_manifests() {
    let site = Site::new();
    site.write(
        "themes/demo/components/node_modules/decoy/decoy.component.yml",
        "name: Decoy\ndescription: must not be found\n",
    );
    site.write(
        "themes/demo/components/real/real.component.yml",
        "name: Real\ndescription: d\n",
    );
    let host = theme(&site, "demo").with_ignored(["node_modules"]);
    let registry = discovery(host, Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();

    assert!(registry.get("block", "real").is_some());
    assert!(registry.find("decoy").is_none());
}

#[test]
fn non_conforming_file_names_are_skipped_silently() {
    let site = Site::new();
    for rel in [
        "themes/demo/components/2col.component.yml",
        "themes/demo/components/hero-banner.component.yml",
        "themes/demo/components/ok.component.yml",
    ] {
        site.write(rel, "name: X\ndescription: d\n");
    }
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();

    let names: Vec<_> = registry.iter().map(|m| m.machine_name.as_str()).collect();
    assert_eq!(names, vec!["ok"]);
    assert!(sink.is_empty());
}

#[test]
fn broken_manifests_do_not_stop_discovery() {
    let site = Site::new();
    site.write("themes/demo/components/bad.component.yml", "name: [oops\n");
    site.write("themes/demo/components/list.component.yml", "- a\n- b\n");
    site.write(
        "themes/demo/components/wrong.component.yml",
        "name: Wrong\ndescription: d\njs: not-a-list\n",
    );
    site.write("themes/demo/components/good.component.yml", "name: Good\ndescription: d\n");
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert!(registry.get("block", "good").is_some());
    assert_eq!(sink.of_kind(DiagnosticKind::DecodeFailed).len(), 2);
    assert_eq!(sink.of_kind(DiagnosticKind::InvalidField).len(), 1);
}

#[test]
fn authored_values_survive_merge_and_merge_is_idempotent() {
    let site = Site::new();
    site.write(
        "themes/demo/components/gallery.component.yml",
        concat!(
            "name: Gallery\n",
            "description: Image gallery\n",
            "template: gallery.htm\n",
            "js: [gallery.js]\n",
            "css: [gallery.css]\n",
            "dependencies: [hero]\n",
            "form_configuration:\n  columns:\n    type: number\n",
            "staticConfiguration:\n  mode: grid\n",
            "framework: react\n",
        ),
    );
    let registry = discovery(theme(&site, "demo"), Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();
    let gallery = registry.get("block", "gallery").unwrap();

    assert_eq!(gallery.template, "gallery.htm");
    assert_eq!(gallery.js, vec!["gallery.js"]);
    assert_eq!(gallery.css, vec!["gallery.css"]);
    assert!(gallery.depends_on("hero"));
    assert_eq!(gallery.form_configuration["columns"]["type"], json!("number"));
    assert_eq!(gallery.static_configuration, json!({ "mode": "grid" }));
    assert_eq!(gallery.extra["framework"], json!("react"));

    let serde_json::Value::Object(merged) = serde_json::to_value(gallery).unwrap() else {
        panic!("manifest serializes to a mapping");
    };
    let remerged = ManifestDefaults::default().apply(merged.clone());
    assert_eq!(remerged, merged);
}

#[test]
fn unknown_types_are_stored_but_not_derived() {
    let site = Site::new();
    site.write(
        "themes/demo/components/grid.component.yml",
        "name: Grid\ndescription: d\ntype: layout\n",
    );
    let registry = discovery(theme(&site, "demo"), Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();

    assert!(registry.get("layout", "grid").is_some());
    assert!(BlockDeriver::new(Arc::new(CollectingSink::new()))
        .derive(&registry)
        .is_empty());
}

#[test]
fn components_requiring_disabled_modules_are_dropped() {
    let site = Site::new();
    site.write(
        "themes/demo/components/needs_media.component.yml",
        "name: Media\ndescription: d\nmodule: media\n",
    );
    site.write(
        "themes/demo/components/needs_demo.component.yml",
        "name: Demo\ndescription: d\nmodule: helper\n",
    );
    let host = theme(&site, "demo").with_extension(
        "helper",
        ExtensionKind::Module,
        site.base("modules/helper"),
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(host, sink.clone()).discover().unwrap();

    assert!(registry.get("block", "needs_demo").is_some());
    assert!(registry.get("block", "needs_media").is_none());
    let unmet = sink.of_kind(DiagnosticKind::UnmetModule);
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].context["module"], "media");
}

#[test]
fn alter_pipeline_runs_after_assembly() {
    let site = Site::new();
    site.write("themes/demo/components/hero.component.yml", "name: Hero\ndescription: d\n");
    site.write("themes/demo/components/draft.component.yml", "name: Draft\ndescription: d\n");
    let registry = discovery(theme(&site, "demo"), Arc::new(CollectingSink::new()))
        .with_alter(FnAlter::new("drop-drafts", |registry: &mut Registry| {
            registry.retain(|m| m.machine_name != "draft");
        }))
        .with_alter(FnAlter::new("brand", |registry: &mut Registry| {
            for m in registry.iter_mut() {
                m.package = "Brand".into();
            }
        }))
        .discover()
        .unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.get("block", "hero").unwrap().package, "Brand");
}

#[test]
fn registry_reflects_filesystem_changes_between_runs() {
    let site = Site::new();
    let discovery = discovery(theme(&site, "demo"), Arc::new(CollectingSink::new()));
    assert!(discovery.discover().unwrap().is_empty());

    let path = site.write("themes/demo/components/hero.component.yml", "name: Hero\ndescription: d\n");
    assert_eq!(discovery.discover().unwrap().len(), 1);

    fs::remove_file(path).unwrap();
    assert!(discovery.discover().unwrap().is_empty());
}

#[test]
fn cancelled_scan_returns_cancelled() {
    let site = Site::new();
    site.write("themes/demo/components/hero.component.yml", "name: Hero\ndescription: d\n");
    let (handle, signal) = CancelSignal::pair();
    handle.cancel();
    let result = discovery(theme(&site, "demo"), Arc::new(CollectingSink::new()))
        .discover_with(&signal);
    assert!(matches!(result, Err(DiscoveryError::Cancelled)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scan_keeps_root_order() {
    let site = Site::new();
    let mut host = ConfiguredHost::default();
    for index in 0..8 {
        let base = format!("modules/m{index}");
        for extra in 0..5 {
            site.write(
                &format!("{base}/components/c{extra}/own_{index}_{extra}.component.yml"),
                "name: Own\ndescription: d\n",
            );
        }
        site.write(
            &format!("{base}/components/shared.component.yml"),
            &format!("name: Shared {index}\ndescription: d\n"),
        );
        host = host.with_extension(format!("m{index}"), ExtensionKind::Module, site.base(&base));
    }

    let discovery = Arc::new(discovery(host, Arc::new(CollectingSink::new())));
    let sequential = discovery.discover().unwrap();
    let concurrent = discovery
        .discover_concurrent(CancelSignal::never())
        .await
        .unwrap();

    assert_eq!(concurrent.get("block", "shared").unwrap().name, "Shared 7");
    assert_eq!(concurrent.len(), 41);
    assert_eq!(concurrent, sequential);
}

#[test]
fn discovery_from_config_uses_overlays_and_disabled_flags() {
    let site = Site::new();
    site.write("themes/demo/components/hero.component.yml", "name: Hero\ndescription: d\n");
    site.write("modules/off/components/ghost.component.yml", "name: Ghost\ndescription: d\n");
    let raw = format!(
        r#"
        [[extensions]]
        name = "demo"
        kind = "theme"
        path = "{demo}"

        [[extensions]]
        name = "off"
        path = "{off}"
        enabled = false

        [defaults.block]
        template = "block.htm"
        "#,
        demo = escape(&site.base("themes/demo")),
        off = escape(&site.base("modules/off")),
    );
    let config: Config = toml::from_str(&raw).unwrap();
    config.validate().unwrap();

    let registry = ComponentDiscovery::from_config(&config)
        .unwrap()
        .with_sink(Arc::new(CollectingSink::new()))
        .discover()
        .unwrap();

    assert_eq!(registry.get("block", "hero").unwrap().template, "block.htm");
    assert!(registry.find("ghost").is_none());
}

fn escape(path: &Path) -> String {
    path.display().to_string().replace('\\', "\\\\")
}

#[test]
fn later_root_replaces_earlier_component_of_another_type() {
    let site = Site::new();
    site.write(
        "modules/alpha/components/hero.component.yml",
        "name: Block hero\ndescription: d\n",
    );
    site.write(
        "themes/demo/components/hero.component.yml",
        "name: Layout hero\ndescription: d\ntype: layout\n",
    );
    let host = ConfiguredHost::default()
        .with_extension("alpha", ExtensionKind::Module, site.base("modules/alpha"))
        .with_extension("demo", ExtensionKind::Theme, site.base("themes/demo"));
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(host, sink.clone()).discover().unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(registry.find("hero").unwrap().name, "Layout hero");
    assert!(registry.get("block", "hero").is_none());
    assert!(BlockDeriver::new(sink.clone()).derive(&registry).is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::Collision).len(), 1);
}

#[test]
fn loosely_typed_optional_fields_do_not_reject_manifest() {
    let site = Site::new();
    site.write(
        "themes/demo/components/hero.component.yml",
        "name: Hero\ndescription: d\nversion: 1.0\ncontexts: node\n",
    );
    let sink = Arc::new(CollectingSink::new());
    let registry = discovery(theme(&site, "demo"), sink.clone())
        .discover()
        .unwrap();

    let hero = registry.get("block", "hero").expect("hero registered");
    assert_eq!(hero.version, Some(json!(1.0)));
    assert!(sink.is_empty());

    let blocks = BlockDeriver::new(sink.clone()).derive(&registry);
    assert!(blocks["hero"].context_requirements.is_empty());
    assert_eq!(sink.of_kind(DiagnosticKind::InvalidContext).len(), 1);
}
