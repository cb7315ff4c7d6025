use super::Diagnostics;

#[test]
fn multiple_messages_join_with_blank_separation() {
    let mut d = Diagnostics::new();
    d.error("a.sql", 1, "first").emit();
    d.warning("a.sql", 2, "second").emit();
    let rendered = d.printer().render_plain();
    let lines: Vec<&str> = rendered.split('\n').collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("error"));
    assert!(lines[1].contains("warning"));
}
