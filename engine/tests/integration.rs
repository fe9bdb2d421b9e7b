use engine::{
    Binding, BindingContext, DiagnosticKind, Diagnostics, RenderOptions, Rendered, Value, render,
    validate,
};
use skeleton::Document;
use skeleton::document::{Block, Paragraph, ParagraphStyle, Run};
use skeleton::parser::Parser;
use skeleton::template::Path;

fn load(source: &str) -> Document {
    Parser::new(source.to_string(), 0)
        .parse()
        .expect("parse failed")
}

fn data(json: &str) -> Value {
    serde_json::from_str(json).expect("invalid test data")
}

fn render_with(source: &str, json: &str, options: RenderOptions) -> Rendered {
    render(load(source), &data(json), &options).expect("render aborted")
}

fn render_md(source: &str, json: &str) -> String {
    render_with(source, json, RenderOptions::default())
        .document
        .to_string()
}

fn body_texts(document: &Document) -> Vec<String> {
    document.body.iter().map(Block::text).collect()
}

fn kinds(rendered: &Rendered) -> Vec<DiagnosticKind> {
    rendered.diagnostics.iter().map(|d| d.kind).collect()
}

#[test]
fn scalar_substitution() {
    assert_eq!(render_md("Hello {{name}}!", r#"{"name": "World"}"#), "Hello World!\n");
    assert_eq!(
        render_md("# {{title}}\n\n> {{ quote }}", r#"{"title": "Report", "quote": "ok"}"#),
        "# Report\n\n> ok\n"
    );
}

#[test]
fn loop_repeats_region_per_element() {
    let rendered = render_with(
        "{{LOOP:item}}\n\n- {{name}}\n",
        r#"{"item": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["A", "B", "C"]);
    assert!(rendered.document.body.iter().all(|b| matches!(
        b,
        Block::Paragraph(p) if p.style == ParagraphStyle::ListBullet
    )));
    assert_eq!(rendered.document.to_string(), "- A\n\n- B\n\n- C\n");
    assert!(rendered.diagnostics.is_empty());
}

#[test]
fn empty_sequence_removes_region() {
    let rendered = render_with(
        "Before\n\n{{LOOP:item}}\n\n- {{name}}\n\n{{ENDLOOP}}\n\nAfter",
        r#"{"item": []}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["Before", "After"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::EmptySequence]);
    assert_eq!(rendered.diagnostics[0].location.to_string(), "body/1");
}

#[test]
fn missing_placeholder_left_verbatim() {
    let rendered = render_with("Dear {{missing}},", "{}", RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["Dear {{missing}},"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::Unresolved]);
    assert_eq!(rendered.diagnostics[0].location.to_string(), "body/0");
    assert!(rendered.diagnostics[0].message.contains("missing"));
}

#[test]
fn missing_field_inside_loop_reports_trail() {
    let rendered = render_with(
        "{{LOOP:item}}\n\n{{label}}",
        r#"{"item": [{}, {}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["{{label}}", "{{label}}"]);
    assert_eq!(rendered.diagnostics.len(), 2);
    assert!(rendered.diagnostics[0].message.ends_with("(in item[0])"));
    assert!(rendered.diagnostics[1].message.ends_with("(in item[1])"));
    // Locations name the template block, not the emitted copy.
    assert_eq!(rendered.diagnostics[1].location.to_string(), "body/1");
}

#[test]
fn strict_fail_fast_aborts_on_type_mismatch() {
    let error = render(
        load("{{LOOP:item}}\n\n{{x}}"),
        &data(r#"{"item": "not a list", "x": "v"}"#),
        &RenderOptions::strict().with_fail_fast(),
    )
    .unwrap_err();
    assert_eq!(error.reason.kind, DiagnosticKind::TypeMismatch);
    assert_eq!(error.reason.location.to_string(), "body/0");
    assert_eq!(error.diagnostics.len(), 1);
    assert!(error.to_string().starts_with("render aborted: type_mismatch"));
}

#[test]
fn tolerant_type_mismatch_treated_as_empty() {
    let rendered = render_with(
        "{{LOOP:item}}\n\n{{x}}",
        r#"{"item": "not a list", "x": "v"}"#,
        RenderOptions::default(),
    );
    assert!(rendered.document.body.is_empty());
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::TypeMismatch]);

    // fail_fast alone does not escalate type mismatches.
    let rendered = render_with(
        "{{LOOP:item}}\n\n{{x}}",
        r#"{"item": {"a": 1}}"#,
        RenderOptions::default().with_fail_fast(),
    );
    assert!(rendered.document.body.is_empty());
}

#[test]
fn absent_loop_binding_is_type_mismatch() {
    let rendered = render_with("{{LOOP:nothing}}\n\nX", "{}", RenderOptions::default());
    assert!(rendered.document.body.is_empty());
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::TypeMismatch]);
    assert!(rendered.diagnostics[0].message.contains("found nothing"));
}

#[test]
fn round_trip_preserves_run_style() {
    let rendered = render_with("**{{x}}** and *{{y}}*", r#"{"x": "V", "y": "W"}"#, RenderOptions::default());
    let Block::Paragraph(paragraph) = &rendered.document.body[0] else {
        panic!("expected a paragraph");
    };
    assert_eq!(paragraph.runs[0].text(), "V");
    assert!(paragraph.runs[0].style.bold);
    assert_eq!(paragraph.runs[1].text(), " and ");
    assert_eq!(paragraph.runs[2].text(), "W");
    assert!(paragraph.runs[2].style.italic);
    assert_eq!(rendered.document.to_string(), "**V** and *W*\n");
}

#[test]
fn rendering_output_again_is_a_no_op() {
    let skeleton = "{{LOOP:orders}}\n\n# Order {{id}}\n\n- **{{total}}** due\n\n| a | b |\n|---|---|\n| {{id}} | x |\n";
    let first = render_md(
        skeleton,
        r#"{"orders": [{"id": 1, "total": 9.5}, {"id": 2, "total": 3}]}"#,
    );

    let reparsed = load(&first);
    let again = render(reparsed.clone(), &data(r#"{"id": "other"}"#), &RenderOptions::strict())
        .expect("render aborted");
    assert_eq!(again.document, reparsed);
    assert!(again.diagnostics.is_empty());
    assert_eq!(again.document.to_string(), first);
}

#[test]
fn nested_loops_with_explicit_close() {
    let source = "{{LOOP:orders}}\n\n# Order {{id}}\n\n{{LOOP:lines}}\n\n- {{sku}} for {{customer}}\n\n{{ENDLOOP}}\n\n{{ENDLOOP}}\n\nTotal";
    let rendered = render_with(
        source,
        r#"{"orders": [
            {"id": 1, "customer": "Ann", "lines": [{"sku": "a"}, {"sku": "b"}]},
            {"id": 2, "customer": "Bob", "lines": [{"sku": "c"}]}
        ]}"#,
        RenderOptions::default(),
    );
    assert_eq!(
        body_texts(&rendered.document),
        vec!["Order 1", "a for Ann", "b for Ann", "Order 2", "c for Bob", "Total"]
    );
    assert!(rendered.diagnostics.is_empty());
}

#[test]
fn inner_fields_shadow_outer_ones() {
    let rendered = render_with(
        "{{LOOP:item}}\n\n{{name}} / {{title}}",
        r#"{"name": "root", "title": "T", "item": [{"name": "inner"}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["inner / T"]);
}

#[test]
fn sibling_loops_close_implicitly() {
    let rendered = render_with(
        "{{LOOP:a}}\n\n- {{v}}\n\n{{LOOP:b}}\n\n- {{w}}",
        r#"{"a": [{"v": 1}, {"v": 2}], "b": [{"w": "x"}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["1", "2", "x"]);
}

#[test]
fn loop_over_nested_path() {
    let rendered = render_with(
        "{{LOOP:order.lines}}\n\n{{sku}}",
        r#"{"order": {"lines": [{"sku": "p"}, {"sku": "q"}]}}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["p", "q"]);
}

#[test]
fn stray_endloop_is_malformed() {
    let rendered = render_with("A\n\n{{ENDLOOP}}\n\nB", "{}", RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["A", "B"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::MalformedLoop]);
    assert_eq!(rendered.diagnostics[0].location.to_string(), "body/1");

    let error = render(
        load("A\n\n{{ENDLOOP}}\n\nB"),
        &Value::default(),
        &RenderOptions::default().with_fail_fast(),
    )
    .unwrap_err();
    assert_eq!(error.reason.kind, DiagnosticKind::MalformedLoop);
}

#[test]
fn marker_errors_interleave_in_document_order() {
    let rendered = render_with("{{a}}\n\n{{ENDLOOP}}\n\n{{b}}", "{}", RenderOptions::default());
    let found: Vec<(DiagnosticKind, String)> = rendered
        .diagnostics
        .iter()
        .map(|d| (d.kind, d.location.to_string()))
        .collect();
    assert_eq!(
        found,
        vec![
            (DiagnosticKind::Unresolved, "body/0".to_string()),
            (DiagnosticKind::MalformedLoop, "body/1".to_string()),
            (DiagnosticKind::Unresolved, "body/2".to_string()),
        ]
    );
}

#[test]
fn marker_errors_inside_a_loop_precede_its_expansion() {
    let rendered = render_with(
        "{{x}}\n\n{{LOOP:item}}\n\n{{LOOP:1x}}\n\n{{name}}\n\n{{ENDLOOP}}\n\n{{y}}",
        r#"{"item": [{"name": "n"}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(
        kinds(&rendered),
        vec![
            DiagnosticKind::Unresolved,
            DiagnosticKind::MalformedLoop,
            DiagnosticKind::Unresolved,
        ]
    );
    assert_eq!(body_texts(&rendered.document), vec!["{{x}}", "n", "{{y}}"]);
}

#[test]
fn invalid_loop_name_is_dropped() {
    let rendered = render_with("{{LOOP:1x}}\n\nkept", "{}", RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["kept"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::MalformedLoop]);
}

#[test]
fn inline_directive_stays_verbatim() {
    let rendered = render_with("See {{LOOP:x}} here", "{}", RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["See {{LOOP:x}} here"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::MalformedLoop]);
}

#[test]
fn row_loops_multiply_table_rows() {
    let source = "\
| Item | Qty |
|---|---|
| {{LOOP:lines}} | |
| {{name}} | {{qty}} |
| {{ENDLOOP}} | |
| Total | {{total}} |
";
    let output = render_md(
        source,
        r#"{"total": 5, "lines": [{"name": "a", "qty": 2}, {"name": "b", "qty": 3}]}"#,
    );
    assert_eq!(
        output,
        "| Item | Qty |\n|---|---|\n| a | 2 |\n| b | 3 |\n| Total | 5 |\n"
    );
}

#[test]
fn row_loop_diagnostics_locate_cells() {
    let rendered = render_with(
        "| H |\n|---|\n| {{LOOP:lines}} |\n| {{missing}} |\n",
        r#"{"lines": [{}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::Unresolved]);
    assert_eq!(rendered.diagnostics[0].location.to_string(), "body/0/r2/c0/0");
}

#[test]
fn headers_and_footers_are_filled() {
    let source = "<!-- header -->\n\n{{company}} letterhead\n\n<!-- body -->\n\nBody {{x}}\n\n<!-- footer -->\n\nPage of {{company}}\n";
    let rendered = render_with(source, r#"{"company": "ACME", "x": 1}"#, RenderOptions::default());
    assert_eq!(rendered.document.headers[0][0].text(), "ACME letterhead");
    assert_eq!(body_texts(&rendered.document), vec!["Body 1"]);
    assert_eq!(rendered.document.footers[0][0].text(), "Page of ACME");

    let rendered = render_with(source, "{}", RenderOptions::default());
    let locations: Vec<String> = rendered
        .diagnostics
        .iter()
        .map(|d| d.location.to_string())
        .collect();
    assert_eq!(locations, vec!["body/0", "header0/0", "footer0/0"]);
}

#[test]
fn dynamic_table_from_sequence_of_mappings() {
    let rendered = render_with(
        "Items:\n\n{{TABLE:rows}}\n\nEnd",
        r#"{"rows": [{"unit_price": 2.5, "name": "x"}, {"name": "y"}]}"#,
        RenderOptions::default(),
    );
    let Block::Table(table) = &rendered.document.body[1] else {
        panic!("expected a generated table");
    };
    assert_eq!(table.style.as_deref(), Some("Table Grid"));
    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|r| r.cells.iter().map(|c| c.text()).collect())
        .collect();
    assert_eq!(
        cells,
        vec![
            vec!["UNIT PRICE", "NAME"],
            vec!["2.5", "x"],
            vec!["", "y"],
        ]
    );
    assert!(table.rows[0].header);
    assert_eq!(body_texts(&rendered.document)[2], "End");
    assert!(rendered.diagnostics.is_empty());
}

#[test]
fn empty_dynamic_table_removes_paragraph() {
    let rendered = render_with("{{TABLE:rows}}\n\nEnd", r#"{"rows": []}"#, RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["End"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::EmptySequence]);

    let rendered = render_with("{{TABLE:rows}}", r#"{"rows": [1, 2]}"#, RenderOptions::default());
    assert!(rendered.document.body.is_empty());
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn bracket_index_selects_element() {
    let rendered = render_with(
        "First: {{items[0].name}}, sixth: {{items[5].name}}",
        r#"{"items": [{"name": "a"}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(
        body_texts(&rendered.document),
        vec!["First: a, sixth: {{items[5].name}}"]
    );
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::Unresolved]);
}

#[test]
fn split_placeholder_is_reported() {
    let rendered = render_with("{{na**me**}}", r#"{"name": "Ann"}"#, RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["{{name}}"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::SplitPlaceholder]);
}

#[test]
fn normalize_runs_merges_split_placeholders() {
    let skeleton = Document::new(vec![Block::Paragraph(Paragraph::new(
        ParagraphStyle::Normal,
        vec![Run::plain("Hi {{na"), Run::plain("me}}")],
    ))]);
    let value = data(r#"{"name": "Ann"}"#);

    let rendered = render(skeleton.clone(), &value, &RenderOptions::default()).expect("render aborted");
    assert_eq!(body_texts(&rendered.document), vec!["Hi {{name}}"]);
    assert_eq!(rendered.diagnostics.len(), 1);

    let options = RenderOptions {
        normalize_runs: true,
        ..RenderOptions::default()
    };
    let rendered = render(skeleton, &value, &options).expect("render aborted");
    assert_eq!(body_texts(&rendered.document), vec!["Hi Ann"]);
    assert!(rendered.diagnostics.is_empty());
}

#[test]
fn scalar_formatting() {
    assert_eq!(
        render_md(
            "{{f}} {{i}} {{b}} {{g}} {{n}}",
            r#"{"f": 3.0, "i": 42, "b": true, "g": 0.25, "n": -7}"#
        ),
        "3 42 true 0.25 -7\n"
    );
}

#[test]
fn data_text_cannot_change_output_structure() {
    let rendered = render_with(
        "| Name |\n|---|\n| {{n}} |\n\n{{p}}\n\n{{h}}",
        r##"{"n": "a | b\nc", "p": "*hi* <!-- footer -->", "h": "# 1. [x](y) & `z`"}"##,
        RenderOptions::default(),
    );
    let written = rendered.document.to_string();
    let reparsed = load(&written);

    assert!(reparsed.footers.is_empty());
    assert_eq!(body_texts(&reparsed), body_texts(&rendered.document));
    let Block::Table(table) = &reparsed.body[0] else {
        panic!("expected a table");
    };
    assert_eq!(table.rows[1].cells.len(), 1);
    assert_eq!(table.rows[1].cells[0].text(), "a | b\nc");
    for block in &reparsed.body[1..] {
        let paragraph = block.as_paragraph().expect("expected a paragraph");
        assert_eq!(paragraph.style, ParagraphStyle::Normal);
        assert_eq!(paragraph.runs.len(), 1);
    }
    assert_eq!(reparsed.to_string(), written);
}

#[test]
fn null_is_absent() {
    let rendered = render_with("{{x}}", r#"{"x": null}"#, RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["{{x}}"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::Unresolved]);
}

#[test]
fn composite_in_scalar_context() {
    let rendered = render_with("{{tags}}", r#"{"tags": ["a", "b"]}"#, RenderOptions::default());
    assert_eq!(body_texts(&rendered.document), vec!["a, b"]);
    assert!(rendered.diagnostics.is_empty());

    let rendered = render_with(
        "{{meta}} {{rows}}",
        r#"{"meta": {"k": 1}, "rows": [{"a": 1}]}"#,
        RenderOptions::default(),
    );
    assert_eq!(body_texts(&rendered.document), vec!["{{meta}} {{rows}}"]);
    assert_eq!(
        kinds(&rendered),
        vec![DiagnosticKind::TypeMismatch, DiagnosticKind::TypeMismatch]
    );
    assert!(rendered.diagnostics[0].message.contains("mapping"));
    assert!(rendered.diagnostics[1].message.contains("sequence"));

    let rendered = render_with("{{tags}}", r#"{"tags": ["a", "b"]}"#, RenderOptions::strict());
    assert_eq!(body_texts(&rendered.document), vec!["{{tags}}"]);
    assert_eq!(kinds(&rendered), vec![DiagnosticKind::TypeMismatch]);
}

#[test]
fn toml_data_deserializes() {
    let value: Value = toml::from_str(
        "title = \"Q3\"\n\n[[item]]\nname = \"x\"\n\n[[item]]\nname = \"y\"\n",
    )
    .expect("invalid toml");
    let rendered = render(
        load("{{title}}\n\n{{LOOP:item}}\n\n- {{name}}"),
        &value,
        &RenderOptions::default(),
    )
    .expect("render aborted");
    assert_eq!(body_texts(&rendered.document), vec!["Q3", "x", "y"]);
}

#[test]
fn options_deserialize_with_defaults() {
    let options: RenderOptions = toml::from_str("strict = true").expect("invalid toml");
    assert_eq!(options, RenderOptions::strict());
    let options: RenderOptions = serde_json::from_str("{}").expect("invalid json");
    assert_eq!(options, RenderOptions::default());
}

#[test]
fn escalation_follows_options() {
    let options = RenderOptions::strict();
    assert!(!options.escalates(DiagnosticKind::TypeMismatch));
    assert!(!options.escalates(DiagnosticKind::MalformedLoop));
    let options = options.with_fail_fast();
    assert!(options.escalates(DiagnosticKind::TypeMismatch));
    assert!(options.escalates(DiagnosticKind::MalformedLoop));
    assert!(!options.escalates(DiagnosticKind::Unresolved));
    assert!(!options.escalates(DiagnosticKind::EmptySequence));
}

#[test]
fn collector_reports_fatal_under_active_options() {
    let rendered = render_with("{{LOOP:x}}\n\n{{y}}", r#"{"x": 1}"#, RenderOptions::default());
    let mut tolerant = Diagnostics::new(RenderOptions::default());
    let mut strict = Diagnostics::new(RenderOptions::strict().with_fail_fast());
    for diagnostic in rendered.diagnostics {
        tolerant.record(diagnostic.clone());
        strict.record(diagnostic);
    }
    assert_eq!(tolerant.all().len(), 1);
    assert!(!tolerant.has_fatal());
    assert!(strict.has_fatal());
}

#[test]
fn validate_reports_structure_without_data() {
    let skeleton = load("{{ENDLOOP}}\n\nSee {{TABLE:x}} inline\n\n{{1x}} and {{ok}}\n\n{{LOOP:item}}\n\n{{name}}");
    let diagnostics = validate(&skeleton);
    let found: Vec<(DiagnosticKind, String)> = diagnostics
        .iter()
        .map(|d| (d.kind, d.location.to_string()))
        .collect();
    assert_eq!(
        found,
        vec![
            (DiagnosticKind::MalformedLoop, "body/0".to_string()),
            (DiagnosticKind::MalformedLoop, "body/1".to_string()),
            (DiagnosticKind::Unresolved, "body/2".to_string()),
        ]
    );
}

#[test]
fn validate_descends_into_tables() {
    let skeleton = load("| {{ENDLOOP}} |\n|---|\n| {{a.}} |\n");
    let kinds: Vec<DiagnosticKind> = validate(&skeleton).iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::MalformedLoop, DiagnosticKind::Unresolved]);
}

#[test]
fn binding_context_resolves_innermost_first() {
    let path = |text: &str| Path::parse(text).expect("invalid path");
    let root = data(r#"{"a": 1, "b": {"c": [10, 20]}}"#);
    let element = data(r#"{"a": "inner"}"#);

    let mut ctx = BindingContext::new(&root);
    assert_eq!(ctx.resolve(&path("b.c[1]")), Binding::Scalar("20".to_string()));
    assert_eq!(ctx.resolve(&path("b.c[2]")), Binding::Absent);
    assert!(matches!(ctx.resolve(&path("b")), Binding::Mapping(_)));

    ctx.push("item[0]".to_string(), &element);
    assert_eq!(ctx.depth(), 1);
    assert_eq!(ctx.resolve(&path("a")), Binding::Scalar("inner".to_string()));
    assert_eq!(ctx.trail().as_deref(), Some("item[0]"));

    ctx.pop();
    ctx.pop();
    assert_eq!(ctx.depth(), 0);
    assert_eq!(ctx.resolve(&path("a")), Binding::Scalar("1".to_string()));
    assert_eq!(ctx.trail(), None);
}
