use crate::dependency::item_dependencies;
use crate::errors::{GenError, GenResult};
use crate::unit::{ItemId, Unit};
use regex::Regex;
use std::collections::BTreeSet;
use tracing::debug;

/// Origin-file filter built from fnmatch-style globs.
///
/// `*` matches any run of characters (including `/`), `?` one character and
/// `[...]` / `[!...]` a character class. A pattern matches either the whole
/// normalized path or its final component.
#[derive(Debug)]
pub struct Whitelist {
    patterns: Vec<(String, Regex)>,
}

impl Whitelist {
    pub fn new(patterns: &[String]) -> GenResult<Self> {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let regex = glob_to_regex(pattern)?;
            compiled.push((pattern.clone(), regex));
        }
        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = normalize(path);
        let file_name = path.rsplit('/').next().unwrap_or(&path);
        self.patterns
            .iter()
            .any(|(_, regex)| regex.is_match(&path) || regex.is_match(file_name))
    }
}

fn normalize(path: &str) -> String {
    let mut path = path.replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    path
}

fn glob_to_regex(pattern: &str) -> GenResult<Regex> {
    let invalid = |reason: &str| GenError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let normalized = normalize(pattern);
    let mut out = String::from("^");
    let mut chars = normalized.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                let mut class = String::new();
                let mut closed = false;
                if matches!(chars.peek(), Some('!') | Some('^')) {
                    chars.next();
                    class.push('^');
                }
                /* A leading `]` is part of the class */
                if chars.peek() == Some(&']') {
                    chars.next();
                    class.push_str("\\]");
                }
                for c in chars.by_ref() {
                    match c {
                        ']' => {
                            closed = true;
                            break;
                        }
                        '\\' | '[' | '&' | '~' => {
                            class.push('\\');
                            class.push(c);
                        }
                        _ => class.push(c),
                    }
                }
                if !closed {
                    return Err(invalid("unterminated character class"));
                }
                out.push('[');
                out.push_str(&class);
                out.push(']');
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|e| invalid(&e.to_string()))
}

/// Items kept by the whitelist: every item from a matching file, plus
/// everything those items reference (transitively). Items without a known
/// origin are kept.
pub fn filter(unit: &Unit, whitelist: &Whitelist) -> Vec<ItemId> {
    if whitelist.is_empty() {
        return unit.ids().collect();
    }

    let mut retained: BTreeSet<ItemId> = BTreeSet::new();
    let mut pending: Vec<ItemId> = unit
        .items
        .iter()
        .filter(|item| match &item.location {
            Some(location) => whitelist.matches(&location.file),
            None => true,
        })
        .map(|item| item.id)
        .collect();
    let seeds = pending.len();

    while let Some(id) = pending.pop() {
        if !retained.insert(id) {
            continue;
        }
        for dep in item_dependencies(unit, id) {
            if !retained.contains(&dep.to) {
                pending.push(dep.to);
            }
        }
    }

    debug!(
        "whitelist kept {} of {} items ({} matched directly)",
        retained.len(),
        unit.items.len(),
        seeds
    );
    retained.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::collect;
    use pxd_ir::{CType, Declaration, Field, Header};

    fn whitelist(patterns: &[&str]) -> Whitelist {
        let patterns: Vec<String> = patterns.iter().map(|p| p.to_string()).collect();
        Whitelist::new(&patterns).unwrap()
    }

    #[test]
    fn test_glob_matching() {
        let list = whitelist(&["include/*.h", "config?.h", "[ab]_*.h"]);
        assert!(list.matches("include/api.h"));
        assert!(list.matches("./include/nested/api.h"));
        assert!(list.matches("src/config1.h"));
        assert!(list.matches("a_types.h"));
        assert!(!list.matches("include/api.hpp"));
        assert!(!list.matches("c_types.h"));
        assert!(!list.matches("/usr/include/stdio.h"));
    }

    #[test]
    fn test_negated_class() {
        let list = whitelist(&["[!x]*.h"]);
        assert!(list.matches("api.h"));
        assert!(!list.matches("xapi.h"));
    }

    #[test]
    fn test_windows_separators() {
        let list = whitelist(&["include/*.h"]);
        assert!(list.matches("include\\api.h"));
    }

    #[test]
    fn test_unterminated_class_is_rejected() {
        let result = Whitelist::new(&["[abc.h".to_string()]);
        assert!(matches!(result, Err(GenError::InvalidPattern { .. })));
    }

    #[test]
    fn test_referenced_declarations_are_retained() {
        let header = Header::new(
            "api.h",
            vec![
                Declaration::structure("timeval", vec![Field::new("sec", CType::named("long"))])
                    .at("/usr/include/sys/time.h", 10),
                Declaration::structure("unused", vec![Field::new("x", CType::named("int"))])
                    .at("/usr/include/other.h", 3),
                Declaration::structure(
                    "Event",
                    vec![Field::new("when", CType::pointer(CType::named("struct timeval")))],
                )
                .at("api.h", 4),
            ],
        );
        let (unit, _) = collect(&header).unwrap();

        let kept = filter(&unit, &whitelist(&["api.h"]));
        let names: Vec<&str> = kept
            .iter()
            .filter_map(|&id| unit.item(id).name.as_deref())
            .collect();
        assert_eq!(names, vec!["timeval", "Event"]);
    }

    #[test]
    fn test_empty_whitelist_keeps_everything() {
        let header = Header::new(
            "api.h",
            vec![
                Declaration::structure("A", vec![]).at("a.h", 1),
                Declaration::structure("B", vec![]).at("b.h", 1),
            ],
        );
        let (unit, _) = collect(&header).unwrap();
        assert_eq!(filter(&unit, &whitelist(&[])).len(), 2);
    }
}
