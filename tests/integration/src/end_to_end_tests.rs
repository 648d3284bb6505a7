//! End-to-end discovery: settings file -> resource files -> named singletons.

use pretty_assertions::assert_eq;
use rstest::rstest;
use spi_core::{Error, LoaderDirectory, SourceConfig};
use spi_test_utils::ResourceTree;
use std::ffi::OsString;
use std::sync::Arc;

pub trait Formatter: Send + Sync {
    fn format(&self, value: i64) -> String;
}

spi_core::extension_point!(dyn Formatter, "org.acme.Formatter", default = "decimal");

#[derive(Default)]
struct Decimal;

impl Formatter for Decimal {
    fn format(&self, value: i64) -> String {
        value.to_string()
    }
}

#[derive(Default)]
struct Hex;

impl Formatter for Hex {
    fn format(&self, value: i64) -> String {
        format!("{value:#x}")
    }
}

spi_core::implementation!("fmt.Decimal", Decimal => [dyn Formatter]);
spi_core::implementation!("fmt.Hex", Hex => [dyn Formatter]);

const PLUGIN_DIR: &str = "plugins/ext";

fn settings_file(tree: &ResourceTree, name: &str, roots: &[&ResourceTree]) -> std::path::PathBuf {
    let paths: Vec<String> = roots
        .iter()
        .map(|r| format!("{:?}", r.root().display().to_string()))
        .collect();
    let content = match name.rsplit('.').next() {
        Some("toml") => format!(
            "search_paths = [{}]\nresource_dir = \"{PLUGIN_DIR}\"\n",
            paths.join(", ")
        ),
        Some("json") => format!(
            "{{\"search_paths\": [{}], \"resource_dir\": \"{PLUGIN_DIR}\"}}",
            paths.join(", ")
        ),
        _ => format!(
            "search_paths: [{}]\nresource_dir: {PLUGIN_DIR}\n",
            paths.join(", ")
        ),
    };
    tree.write_file(name, &content);
    tree.root().join(name)
}

#[rstest]
#[case("spi.toml")]
#[case("spi.json")]
#[case("spi.yaml")]
fn test_settings_file_drives_discovery(#[case] file_name: &str) {
    let _ = spi_core::logging::init();

    let settings = ResourceTree::new();
    let vendor = ResourceTree::new();
    vendor.write_file(
        &format!("{PLUGIN_DIR}/org.acme.Formatter"),
        "decimal=fmt.Decimal\nhex=fmt.Hex\nbroken line\n",
    );
    let overrides = ResourceTree::new();
    overrides.write_file(
        &format!("{PLUGIN_DIR}/org.acme.Formatter"),
        "decimal=fmt.Hex\nmissing=fmt.Octal\n",
    );

    let file = settings_file(&settings, file_name, &[&overrides, &vendor]);
    let config = SourceConfig::from_vars(|key| {
        (key == "SPI_CONFIG").then(|| OsString::from(file.as_os_str()))
    })
    .unwrap();
    assert_eq!(config.resource_dir, PLUGIN_DIR);
    assert_eq!(config.search_paths.len(), 2);

    let dir = LoaderDirectory::from_config(&config);
    let formatters = dir.for_type::<dyn Formatter>().unwrap();

    assert_eq!(formatters.supported_extensions(), vec!["decimal", "hex"]);
    assert_eq!(formatters.get_default().unwrap().format(255), "0xff");
    assert_eq!(formatters.get("hex").unwrap().format(16), "0x10");
    assert!(Arc::ptr_eq(
        &formatters.get("hex").unwrap(),
        &formatters.get_default().unwrap()
    ));
    assert!(matches!(
        formatters.get("missing"),
        Err(Error::UnknownExtension { .. })
    ));
    assert_eq!(dir.instance_count(), 1);
}

#[test]
fn test_environment_overrides_settings_file() {
    let settings = ResourceTree::new();
    let ignored = ResourceTree::new();
    let used = ResourceTree::new().with_resource("org.acme.Formatter", "decimal=fmt.Decimal");
    let file = settings_file(&settings, "spi.toml", &[&ignored]);

    let config = SourceConfig::from_vars(|key| match key {
        "SPI_CONFIG" => Some(OsString::from(file.as_os_str())),
        "SPI_SEARCH_PATH" => Some(used.root().as_os_str().to_owned()),
        "SPI_RESOURCE_DIR" => Some(OsString::from("META-INF/ext")),
        _ => None,
    })
    .unwrap();

    let dir = LoaderDirectory::from_config(&config);
    let formatters = dir.for_type::<dyn Formatter>().unwrap();
    assert_eq!(formatters.get_default().unwrap().format(7), "7");
}

#[test]
fn test_invalid_settings_file_is_reported() {
    let settings = ResourceTree::new();
    settings.write_file("spi.toml", "search_paths = not-a-list");
    let file = settings.root().join("spi.toml");

    let result = SourceConfig::from_vars(|key| {
        (key == "SPI_CONFIG").then(|| OsString::from(file.as_os_str()))
    });
    assert!(matches!(result, Err(spi_fs::Error::ConfigParse { .. })));
}
