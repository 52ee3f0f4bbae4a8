use pxd_gen::cmds::translate::{TranslateArgs, load_catalog, load_header, run};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const HEADER_YAML: &str = r#"
path: widget.h
declarations:
  - name: WIDGET_MAX
    kind:
      constant:
        value: { integer-literal: { base: decimal, raw: "16" } }
        is-macro: true
  - name: Widget
    location: { file: include/widget.h, line: 4 }
    kind:
      struct:
        fields:
          - name: id
            ty: { named: { name: uint32_t } }
          - name: next
            ty:
              pointer:
                pointee: { named: { name: struct Widget } }
"#;

const HEADER_JSON: &str = r#"{
  "path": "flags.h",
  "declarations": [
    {
      "name": "Flags",
      "kind": {
        "enum": {
          "values": [
            { "name": "FLAG_A", "value": { "integer-literal": { "base": "hex", "raw": "0x1" } } },
            { "name": "FLAG_B" }
          ]
        }
      }
    }
  ]
}"#;

fn args(file: PathBuf, output: PathBuf) -> TranslateArgs {
    TranslateArgs {
        file,
        output: Some(output),
        whitelist: Vec::new(),
        catalog: None,
        annotate: true,
        quiet: true,
        verbose: false,
    }
}

#[test]
fn test_translate_yaml_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("widget.yaml");
    let output = dir.path().join("widget.pxd");
    fs::write(&input, HEADER_YAML).unwrap();

    run(args(input, output.clone())).unwrap();

    let document = fs::read_to_string(&output).unwrap();
    assert_eq!(
        document,
        "from libc.stdint cimport uint32_t\n\
         \n\
         cdef extern from \"widget.h\":\n\
         \n\
         \x20   int WIDGET_MAX\n\
         \n\
         \x20   cdef struct Widget:\n\
         \x20       uint32_t id\n\
         \x20       Widget* next\n"
    );
}

#[test]
fn test_translate_json_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("flags.json");
    let output = dir.path().join("flags.pxd");
    fs::write(&input, HEADER_JSON).unwrap();

    run(args(input, output.clone())).unwrap();

    let document = fs::read_to_string(&output).unwrap();
    assert!(document.contains("    cpdef enum Flags:\n        FLAG_A = 0x1\n        FLAG_B = 2\n"));
}

#[test]
fn test_unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("widget.txt");
    fs::write(&input, HEADER_YAML).unwrap();

    let err = load_header(&input).unwrap_err();
    assert!(err.to_string().contains("unsupported header IR format"));
}

#[test]
fn test_malformed_input_reports_file() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.yaml");
    fs::write(&input, "path: [unterminated").unwrap();

    let err = load_header(&input).unwrap_err();
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn test_fatal_error_writes_no_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("cycle.yaml");
    let output = dir.path().join("cycle.pxd");
    fs::write(
        &input,
        r#"
path: cycle.h
declarations:
  - name: A
    kind:
      struct:
        fields:
          - name: b
            ty: { named: { name: struct B } }
  - name: B
    kind:
      struct:
        fields:
          - name: a
            ty: { named: { name: struct A } }
"#,
    )
    .unwrap();

    let err = run(args(input, output.clone())).unwrap_err();
    assert!(format!("{:#}", err).contains("structural cycle"));
    assert!(!output.exists());
}

#[test]
fn test_catalog_file_extends_builtin_tables() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.yaml");
    fs::write(
        &path,
        r#"
stubs:
  - module: vendor.stubs
    types: [vendor_handle_t]
"#,
    )
    .unwrap();

    let catalog = load_catalog(Some(&path)).unwrap();
    assert_eq!(catalog.lookup("vendor_handle_t", false), Some("vendor.stubs"));
    assert_eq!(catalog.lookup("uint32_t", false), Some("libc.stdint"));
}

#[test]
fn test_whitelist_from_command_line() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("widget.yaml");
    let output = dir.path().join("widget.pxd");
    fs::write(&input, HEADER_YAML).unwrap();

    let mut translate_args = args(input, output.clone());
    translate_args.whitelist = vec!["other/*.h".to_string()];
    run(translate_args).unwrap();

    /* The location-less macro is kept; the struct from include/ is not */
    let document = fs::read_to_string(&output).unwrap();
    assert!(document.contains("int WIDGET_MAX"));
    assert!(!document.contains("Widget:"));
}
