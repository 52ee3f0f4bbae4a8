use assert_matches::assert_matches;
use pxd_gen::codegen::pxd_gen::parse_field_decl;
use pxd_gen::{Catalog, GenError, GenOptions, Stage, Translation, WarningKind, translate};
use pxd_ir::{
    BinaryOperator, CType, ClassDecl, ClassMember, ConstantDecl, DeclKind, Declaration, EnumValue,
    Expression, Field, Header, Method, Parameter,
};

fn run(decls: Vec<Declaration>) -> Translation {
    run_with(decls, &GenOptions::default()).unwrap()
}

fn run_with(decls: Vec<Declaration>, options: &GenOptions) -> Result<Translation, GenError> {
    translate(&Header::new("api.h", decls), &Catalog::builtin(), options)
}

/* Declaration lines of the document, without indentation or blank lines */
fn body(document: &str) -> Vec<String> {
    document
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.trim().to_string())
        .collect()
}

#[test]
fn test_enum_auto_increment_continues_from_previous_value() {
    let translation = run(vec![Declaration::enumeration(
        Some("Codes"),
        vec![
            EnumValue::new("C1", Some(Expression::int("10"))),
            EnumValue::new("C2", Some(Expression::int("20"))),
            EnumValue::new("C3", None),
        ],
    )]);
    assert_eq!(
        translation.document,
        "cdef extern from \"api.h\":\n\n    cpdef enum Codes:\n        C1 = 10\n        C2 = 20\n        C3 = 21\n"
    );
    assert!(translation.warnings.is_empty());
}

#[test]
fn test_const_pointer_member() {
    let translation = run(vec![Declaration::structure(
        "S",
        vec![Field::new("a", CType::pointer(CType::named("const int")))],
    )]);
    assert_eq!(
        body(&translation.document),
        vec!["cdef extern from \"api.h\":", "cdef struct S:", "const int* a"]
    );
}

#[test]
fn test_callback_typedef_cycle_is_broken_by_forward_declaration() {
    let translation = run(vec![
        Declaration::typedef(
            "event_cb",
            CType::function_pointer(
                CType::named("void"),
                vec![
                    Parameter::new("loop", CType::pointer(CType::named("struct Loop"))),
                    Parameter::new("events", CType::named("int")),
                ],
                false,
            ),
        ),
        Declaration::structure(
            "Loop",
            vec![
                Field::new("cb", CType::named("event_cb")),
                Field::new("fd", CType::named("int")),
            ],
        ),
    ]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "cdef struct Loop",
            "ctypedef void (*event_cb)(Loop* loop, int events)",
            "cdef struct Loop:",
            "event_cb cb",
            "int fd",
        ]
    );
}

#[test]
fn test_macro_constant_types_are_inferred() {
    let translation = run(vec![
        Declaration::function("reset", CType::named("void"), vec![]),
        Declaration::macro_constant("SIZE", Expression::int("100")),
        Declaration::macro_constant("MASK", Expression::int("0xFF")),
        Declaration::macro_constant("PI", Expression::FloatLiteral("3.14".to_string())),
        Declaration::macro_constant("NAME", Expression::StringLiteral("\"pxd\"".to_string())),
    ]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "int SIZE",
            "int MASK",
            "double PI",
            "const char* NAME",
            "void reset()",
        ]
    );
}

#[test]
fn test_array_size_substitutes_enum_constant() {
    let translation = run(vec![
        Declaration::enumeration(
            Some("E"),
            vec![
                EnumValue::new("A", Some(Expression::int("1"))),
                EnumValue::new(
                    "B",
                    Some(Expression::binary(
                        BinaryOperator::Add,
                        Expression::ident("A"),
                        Expression::int("1"),
                    )),
                ),
            ],
        ),
        Declaration::structure(
            "Table",
            vec![Field::new("arr", CType::array(CType::named("int"), Expression::ident("B")))],
        ),
    ]);
    let lines = body(&translation.document);
    assert!(lines.contains(&"int arr[(1) + 1]".to_string()), "{:?}", lines);
    assert!(lines.contains(&"B = (1) + 1".to_string()), "{:?}", lines);
}

#[test]
fn test_anonymous_members_get_distinct_names() {
    let anonymous = || {
        CType::inline(Declaration::anonymous_struct(vec![Field::new(
            "value",
            CType::named("int"),
        )]))
    };
    let translation = run(vec![Declaration::structure(
        "xnvme_opts",
        vec![Field::new("css", anonymous()), Field::new("be", anonymous())],
    )]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "cdef struct _xnvme_opts_css_s:",
            "int value",
            "cdef struct _xnvme_opts_be_s:",
            "int value",
            "cdef struct xnvme_opts:",
            "_xnvme_opts_css_s css",
            "_xnvme_opts_be_s be",
        ]
    );
}

#[test]
fn test_rendered_fields_parse_back_to_their_types() {
    let fields = vec![
        Field::new("count", CType::named("unsigned int")),
        Field::new("name", CType::pointer(CType::named("char"))),
        Field::new("grid", CType::array(CType::array(CType::named("double"), Expression::int("4")), Expression::int("4"))),
        Field::new("end", CType::const_pointer(CType::named("void"))),
    ];
    let translation = run(vec![Declaration::structure("Record", fields.clone())]);
    let lines = body(&translation.document);
    let members = &lines[2..];
    assert_eq!(members.len(), fields.len());
    for (line, field) in members.iter().zip(&fields) {
        let (name, ty) = parse_field_decl(line).unwrap();
        assert_eq!(Some(name), field.name.clone());
        assert_eq!(ty, field.ty);
    }
}

#[test]
fn test_mutual_value_containment_is_fatal() {
    let result = run_with(
        vec![
            Declaration::structure("A", vec![Field::new("b", CType::named("struct B"))]),
            Declaration::structure("B", vec![Field::new("a", CType::named("struct A"))]),
        ],
        &GenOptions::default(),
    );
    assert_matches!(result, Err(GenError::StructuralCycle { stage: Stage::Ordering, path }) => {
        assert_eq!(path, vec!["A", "B", "A"]);
    });
}

#[test]
fn test_identifier_collision_is_fatal() {
    let result = run_with(
        vec![
            Declaration::function("print", CType::named("void"), vec![]),
            Declaration::variable("print_", CType::named("int")),
        ],
        &GenOptions::default(),
    );
    assert_matches!(result, Err(GenError::NameCollision { stage: Stage::Resolving, identifier, .. }) => {
        assert_eq!(identifier, "print_");
    });
}

#[test]
fn test_invalid_whitelist_pattern_is_fatal() {
    let options = GenOptions {
        whitelist: vec!["include/[abc".to_string()],
        ..GenOptions::default()
    };
    let result = run_with(vec![], &options);
    assert_matches!(result, Err(GenError::InvalidPattern { .. }));
    assert_eq!(result.unwrap_err().stage(), Stage::Filtering);
}

#[test]
fn test_whitelist_keeps_referenced_declarations() {
    let options = GenOptions {
        whitelist: vec!["*/mylib/*.h".to_string()],
        ..GenOptions::default()
    };
    let translation = run_with(
        vec![
            Declaration::structure("sockaddr_in", vec![Field::new("port", CType::named("int"))])
                .at("/usr/include/netinet/in.h", 20),
            Declaration::function("socket_helper", CType::named("int"), vec![])
                .at("/usr/include/sys/socket.h", 40),
            Declaration::function(
                "bind_to",
                CType::named("int"),
                vec![Parameter::new("addr", CType::pointer(CType::named("const struct sockaddr_in")))],
            )
            .at("src/mylib/net.h", 7),
        ],
        &options,
    )
    .unwrap();
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "cdef struct sockaddr_in:",
            "int port",
            "int bind_to(const sockaddr_in* addr)",
        ]
    );
}

#[test]
fn test_imports_precede_extern_block() {
    let translation = run(vec![Declaration::function(
        "read_block",
        CType::named("ssize_t"),
        vec![
            Parameter::new("fd", CType::named("int")),
            Parameter::new("buf", CType::pointer(CType::named("uint8_t"))),
            Parameter::new("len", CType::named("size_t")),
        ],
    )]);
    assert!(
        translation
            .document
            .starts_with("from libc.stdint cimport uint8_t\n\ncdef extern from \"api.h\":\n"),
        "{}",
        translation.document
    );
}

#[test]
fn test_unresolved_identifier_passes_through_with_warning() {
    let translation = run(vec![Declaration::variable(
        "buffer",
        CType::array(CType::named("char"), Expression::ident("BUF_LEN")),
    )]);
    assert!(body(&translation.document).contains(&"char buffer[BUF_LEN]".to_string()));
    assert_eq!(translation.warnings.len(), 1);
    assert_eq!(translation.warnings[0].kind, WarningKind::UnresolvedExpression);
    assert!(translation.warnings[0].declaration.contains("buffer"));
}

#[test]
fn test_rejected_operator_is_annotated() {
    let class = ClassDecl {
        members: Some(vec![
            ClassMember::Method(Method::new("size", CType::named("int"), vec![])),
            ClassMember::Method(Method::new(
                "operator,",
                CType::named("void"),
                vec![Parameter::new("rhs", CType::named("int"))],
            )),
        ]),
        ..Default::default()
    };
    let translation = run(vec![Declaration::class("Seq", class.clone())]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "# NOTE: overloaded operator with no Cython form skipped",
            "cdef cppclass Seq:",
            "int size()",
        ]
    );
    assert_eq!(translation.warnings.len(), 1);
    assert_eq!(translation.warnings[0].kind, WarningKind::UnsupportedConstruct);

    let quiet = run_with(
        vec![Declaration::class("Seq", class)],
        &GenOptions {
            annotate: false,
            ..GenOptions::default()
        },
    )
    .unwrap();
    assert!(!quiet.document.contains("# NOTE"));
    assert_eq!(quiet.warnings.len(), 1);
}

#[test]
fn test_namespaced_declarations_get_their_own_block() {
    let translation = run(vec![
        Declaration::structure("Config", vec![Field::new("level", CType::named("int"))]),
        Declaration::namespace(
            "net",
            vec![
                Declaration::structure("Config", vec![Field::new("port", CType::named("int"))]),
                Declaration::function(
                    "connect",
                    CType::named("int"),
                    vec![Parameter::new("cfg", CType::pointer(CType::named("Config")))],
                ),
            ],
        ),
    ]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "cdef struct Config:",
            "int level",
            "cdef extern from \"api.h\" namespace \"net\":",
            "cdef struct net_Config \"Config\":",
            "int port",
            "int connect(net_Config* cfg)",
        ]
    );
}

/* Index of the first document line equal to `line` */
fn line_of(lines: &[String], line: &str) -> usize {
    lines
        .iter()
        .position(|l| l == line)
        .unwrap_or_else(|| panic!("missing line {:?} in {:?}", line, lines))
}

#[test]
fn test_namespace_block_precedes_global_user() {
    let translation = run(vec![
        Declaration::namespace(
            "ns",
            vec![Declaration::structure("Inner", vec![Field::new("x", CType::named("int"))])],
        ),
        Declaration::structure("Outer", vec![Field::new("inner", CType::named("ns::Inner"))]),
    ]);
    let lines = body(&translation.document);
    assert!(line_of(&lines, "cdef struct Inner:") < line_of(&lines, "cdef struct Outer:"));
    let headers: Vec<&String> = lines.iter().filter(|l| l.starts_with("cdef extern")).collect();
    assert_eq!(
        headers,
        vec![
            "cdef extern from \"api.h\" namespace \"ns\":",
            "cdef extern from \"api.h\":",
        ]
    );
}

#[test]
fn test_global_blocks_reopen_around_namespace() {
    let translation = run(vec![
        Declaration::structure("Base", vec![Field::new("id", CType::named("int"))]),
        Declaration::namespace(
            "geo",
            vec![Declaration::structure("Point", vec![Field::new("base", CType::named("Base"))])],
        ),
        Declaration::structure("Shape", vec![Field::new("origin", CType::named("geo::Point"))]),
    ]);
    assert_eq!(
        body(&translation.document),
        vec![
            "cdef extern from \"api.h\":",
            "cdef struct Base:",
            "int id",
            "cdef extern from \"api.h\" namespace \"geo\":",
            "cdef struct Point:",
            "Base base",
            "cdef extern from \"api.h\":",
            "cdef struct Shape:",
            "Point origin",
        ]
    );
}

#[test]
fn test_typed_constant_follows_forward_declaration() {
    let default_b = Declaration::new(
        Some("DEFAULT_B"),
        DeclKind::Constant(ConstantDecl {
            ty: Some(CType::pointer(CType::named("const struct B"))),
            ..ConstantDecl::default()
        }),
    );
    let translation = run(vec![
        Declaration::structure("A", vec![Field::new("b", CType::pointer(CType::named("struct B")))]),
        Declaration::structure("B", vec![Field::new("a", CType::pointer(CType::named("struct A")))]),
        default_b,
    ]);
    let lines = body(&translation.document);
    let forward = line_of(&lines, "cdef struct B");
    let constant = lines
        .iter()
        .position(|l| l.ends_with("DEFAULT_B"))
        .unwrap();
    assert!(forward < constant);
    assert_eq!(lines[constant], "const B* DEFAULT_B");
    assert!(constant < line_of(&lines, "cdef struct A:"));
}

#[test]
fn test_excluded_enum_raises_no_warnings() {
    let options = GenOptions {
        whitelist: vec!["include/api.h".to_string()],
        ..GenOptions::default()
    };
    let translation = run_with(
        vec![
            Declaration::enumeration(
                Some("Sys"),
                vec![EnumValue::new("S1", Some(Expression::ident("SYS_BASE")))],
            )
            .at("/usr/include/sys.h", 3),
            Declaration::function("api_call", CType::named("int"), vec![]).at("include/api.h", 5),
        ],
        &options,
    )
    .unwrap();
    assert!(translation.warnings.is_empty());
    assert!(!translation.document.contains("Sys"));
    assert!(translation.document.contains("int api_call()"));
}

#[test]
fn test_output_is_deterministic() {
    let decls = || {
        vec![
            Declaration::structure(
                "Parent",
                vec![Field::new("child", CType::pointer(CType::named("struct Child")))],
            ),
            Declaration::structure(
                "Child",
                vec![Field::new("parent", CType::pointer(CType::named("struct Parent")))],
            ),
            Declaration::macro_constant("LIMIT", Expression::int("8")),
        ]
    };
    assert_eq!(run(decls()).document, run(decls()).document);
}
