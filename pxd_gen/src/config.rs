//! Generator configuration: the external-name import table and run options.

use anyhow::Context;
use serde_derive::{Deserialize, Serialize};
use std::path::Path;

/// Package that bundles declarations Cython itself does not ship.
pub const STUB_PACKAGE: &str = "pxd_stubs";

/* Cython `libc`, `posix` and `cpython` declarations, in lookup order */
const STDLIB_MODULES: &[(&str, &[&str])] = &[
    ("libc.stddef", &["ptrdiff_t", "wchar_t"]),
    (
        "libc.stdint",
        &[
            "int8_t", "int16_t", "int32_t", "int64_t", "uint8_t", "uint16_t", "uint32_t",
            "uint64_t", "intptr_t", "uintptr_t", "intmax_t", "uintmax_t",
        ],
    ),
    ("libc.stdio", &["FILE", "fpos_t"]),
    ("libc.stdlib", &["div_t", "ldiv_t", "lldiv_t"]),
    ("libc.time", &["time_t", "tm", "clock_t", "timespec"]),
    ("libc.signal", &["sig_atomic_t", "sigset_t"]),
    ("libc.setjmp", &["jmp_buf"]),
    ("libc.locale", &["lconv"]),
    ("posix.unistd", &["pid_t", "uid_t", "gid_t", "off_t"]),
    ("posix.stat", &["stat", "mode_t"]),
    (
        "posix.types",
        &["pid_t", "uid_t", "gid_t", "off_t", "mode_t", "dev_t", "ino_t", "nlink_t"],
    ),
    ("cpython", &["PyObject", "PyTypeObject", "Py_ssize_t"]),
];

/* Stub modules, relative to STUB_PACKAGE */
const STUB_MODULES: &[(&str, &[&str])] = &[
    ("stdarg", &["va_list"]),
    ("dirent", &["DIR", "dirent"]),
    ("sys_socket", &["sockaddr", "socklen_t", "sa_family_t"]),
    (
        "netinet_in",
        &["sockaddr_in", "sockaddr_in6", "in_addr", "in6_addr", "in_port_t", "in_addr_t"],
    ),
    ("sys_statvfs", &["statvfs"]),
    ("sys_select", &["fd_set", "timeval"]),
];

/* Cython `libcpp` declarations, only consulted for `std::` names and templates */
const LIBCPP_MODULES: &[(&str, &[&str])] = &[
    ("libcpp.vector", &["vector"]),
    ("libcpp.string", &["string"]),
    ("libcpp.map", &["map"]),
    ("libcpp.set", &["set"]),
    ("libcpp.unordered_map", &["unordered_map"]),
    ("libcpp.unordered_set", &["unordered_set"]),
    ("libcpp.memory", &["shared_ptr", "unique_ptr", "weak_ptr", "allocator"]),
    ("libcpp.list", &["list"]),
    ("libcpp.deque", &["deque"]),
    ("libcpp.queue", &["queue", "priority_queue"]),
    ("libcpp.stack", &["stack"]),
    ("libcpp.utility", &["pair", "move"]),
    ("libcpp.functional", &["function", "reference_wrapper"]),
    ("libcpp.complex", &["complex"]),
    ("libcpp.limits", &["numeric_limits"]),
    ("libcpp.typeinfo", &["type_info"]),
    ("libcpp.optional", &["optional", "nullopt_t"]),
    ("libcpp.variant", &["variant"]),
    ("libcpp.any", &["any"]),
];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct ModuleTypes {
    pub module: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl ModuleTypes {
    fn from_table(module: String, types: &[&str]) -> Self {
        Self {
            module,
            types: types.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Maps well-known external type names to the module to `cimport` them from.
///
/// Lookups scan `stdlib`, then `stubs`, then `libcpp`; the first module that
/// lists a name wins.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct Catalog {
    #[serde(default)]
    pub stdlib: Vec<ModuleTypes>,
    #[serde(default)]
    pub stubs: Vec<ModuleTypes>,
    #[serde(default)]
    pub libcpp: Vec<ModuleTypes>,
}

/// On-disk catalog override.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct CatalogFile {
    /* Replace the built-in tables instead of extending them */
    #[serde(default)]
    pub replace: bool,
    #[serde(flatten)]
    pub catalog: Catalog,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            stdlib: STDLIB_MODULES
                .iter()
                .map(|(module, types)| ModuleTypes::from_table(module.to_string(), types))
                .collect(),
            stubs: STUB_MODULES
                .iter()
                .map(|(module, types)| {
                    ModuleTypes::from_table(format!("{}.{}", STUB_PACKAGE, module), types)
                })
                .collect(),
            libcpp: LIBCPP_MODULES
                .iter()
                .map(|(module, types)| ModuleTypes::from_table(module.to_string(), types))
                .collect(),
        }
    }

    /// Load an override file and apply it on top of the built-in tables.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let file: CatalogFile = serde_yml::from_str(&content)
            .with_context(|| format!("failed to parse catalog {}", path.display()))?;
        if file.replace {
            return Ok(file.catalog);
        }
        let mut catalog = Self::builtin();
        catalog.extend(file.catalog);
        Ok(catalog)
    }

    /// Merge `other` in front of the current tables so its entries take precedence.
    pub fn extend(&mut self, other: Catalog) {
        fn prepend(into: &mut Vec<ModuleTypes>, mut front: Vec<ModuleTypes>) {
            front.append(into);
            *into = front;
        }
        prepend(&mut self.stdlib, other.stdlib);
        prepend(&mut self.stubs, other.stubs);
        prepend(&mut self.libcpp, other.libcpp);
    }

    /// Module that provides `name`, if any. `cpp_scoped` enables the `libcpp` table.
    pub fn lookup(&self, name: &str, cpp_scoped: bool) -> Option<&str> {
        fn find<'a>(table: &'a [ModuleTypes], name: &str) -> Option<&'a str> {
            table
                .iter()
                .find(|entry| entry.types.iter().any(|t| t == name))
                .map(|entry| entry.module.as_str())
        }

        find(&self.stdlib, name)
            .or_else(|| find(&self.stubs, name))
            .or_else(|| if cpp_scoped { find(&self.libcpp, name) } else { None })
    }
}

/// Per-run options.
#[derive(Debug, Clone)]
pub struct GenOptions {
    /* Origin-file globs; empty keeps every declaration */
    pub whitelist: Vec<String>,
    /* Emit `# NOTE:` lines for unsupported constructs */
    pub annotate: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            whitelist: Vec::new(),
            annotate: true,
        }
    }
}
