use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use stitch::{
    config::Config,
    linker::{check_dir, run_build},
    verify::verify_script,
};
use tempfile::TempDir;

const DOM: &str = "function o(n){const s=document.createElement(\"style\");s.textContent=n,document.head.appendChild(s)}export{o as i};\n";
const CALENDAR: &str = "import{i as t}from\"../dom.js\";const e=window;e.$!=null&&t(\".x{}\");\n";
const CONTACT: &str = "import { i as injectCSS } from \"../dom\";\ninjectCSS(\".contact{}\");\n";

fn write(root: &Path, file_name: &str, code: &str) {
    let path = root.join(file_name);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, code).unwrap();
}

/// A bundler output directory with two content scripts sharing `dom.js`
fn extension_dist(temp: &TempDir) -> Config {
    let dist = temp.path().join("dist");
    write(&dist, "dom.js", DOM);
    write(&dist, "content/calendar.js", CALENDAR);
    write(&dist, "content/contact.js", CONTACT);
    write(&dist, "vendor.js", "console.log('unused');\n");
    write(&dist, "manifest.json", "{}");

    Config {
        input_dir: dist,
        entries: vec!["content/calendar.js".to_owned(), "content/contact.js".to_owned()],
        ..Default::default()
    }
}

#[test]
fn test_in_place_build_leaves_only_entries() {
    let temp = TempDir::new().unwrap();
    let config = extension_dist(&temp);
    let dist = config.input_dir.clone();

    let output = run_build(&config).unwrap();

    assert_eq!(output.report.consumed, vec!["dom.js"]);
    assert_eq!(output.report.unused, vec!["vendor.js"]);
    assert_eq!(output.written.len(), 2);
    assert!(!dist.join("dom.js").exists());
    assert!(!dist.join("vendor.js").exists());
    assert!(dist.join("manifest.json").exists(), "non-script files are left alone");

    for entry in ["content/calendar.js", "content/contact.js"] {
        let content = fs::read_to_string(dist.join(entry)).unwrap();
        assert_eq!(verify_script(&content), vec![], "{entry}:\n{content}");
        assert!(content.contains("document.head.appendChild"), "{content}");
    }
    assert_eq!(check_dir(&dist, &[]).unwrap(), 2);
}

#[test]
fn test_linked_calendar_script() {
    let temp = TempDir::new().unwrap();
    let config = extension_dist(&temp);

    run_build(&config).unwrap();

    let calendar = fs::read_to_string(config.input_dir.join("content/calendar.js")).unwrap();
    insta::assert_snapshot!(calendar, @r#"
    (function() {
    function o(n){const s=document.createElement("style");s.textContent=n,document.head.appendChild(s)};
    const t = o;const e=window;e.$!=null&&t(".x{}");
    })();
    "#);
}

#[test]
fn test_separate_output_dir_keeps_input() {
    let temp = TempDir::new().unwrap();
    let mut config = extension_dist(&temp);
    let out = temp.path().join("extension");
    config.output_dir = Some(out.clone());

    let output = run_build(&config).unwrap();

    assert!(output.deleted.is_empty());
    assert_eq!(
        fs::read_to_string(config.input_dir.join("dom.js")).unwrap(),
        DOM
    );
    assert!(out.join("content/contact.js").exists());
    assert!(!out.join("dom.js").exists());

    let contact = fs::read_to_string(out.join("content/contact.js")).unwrap();
    assert!(contact.contains("const injectCSS = o;"), "{contact}");
}

#[test]
fn test_missing_entry_is_fatal() {
    let temp = TempDir::new().unwrap();
    let mut config = extension_dist(&temp);
    config.entries.push("content/options.js".to_owned());

    let err = run_build(&config).unwrap_err();
    assert!(
        err.to_string().contains("'content/options.js' was not found"),
        "{err}"
    );
    assert!(config.input_dir.join("dom.js").exists());
}

#[test]
fn test_strict_aliases_leave_files_untouched() {
    let temp = TempDir::new().unwrap();
    let mut config = extension_dist(&temp);
    write(
        &config.input_dir,
        "content/contact.js",
        "import { missing as m } from '../dom.js';\nm();\n",
    );
    config.strict_aliases = true;

    let err = run_build(&config).unwrap_err();
    assert!(format!("{err:#}").contains("does not export it"), "{err:#}");
    assert_eq!(
        fs::read_to_string(config.input_dir.join("content/calendar.js")).unwrap(),
        CALENDAR
    );
}

#[test]
fn test_check_reports_unlinked_scripts() {
    let temp = TempDir::new().unwrap();
    let config = extension_dist(&temp);

    let err = check_dir(&config.input_dir, &config.entries).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("content/contact.js: line 1: import statement"), "{message}");
    assert!(message.contains("does not start with a closure prologue"), "{message}");
    assert!(!message.contains("dom.js:"), "{message}");
}

#[test]
fn test_config_file_drives_build() {
    let temp = TempDir::new().unwrap();
    let config = extension_dist(&temp);
    fs::write(
        temp.path().join("stitch.toml"),
        "input_dir = \"dist\"\noutput_dir = \"out\"\nentries = [\"content/calendar.js\", \"content/contact.js\"]\n",
    )
    .unwrap();

    let loaded = Config::discover(temp.path()).unwrap();
    assert_eq!(loaded.input_dir, config.input_dir);

    run_build(&loaded).unwrap();
    assert!(temp.path().join("out/content/calendar.js").exists());
}
