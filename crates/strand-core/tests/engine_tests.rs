use strand_core::*;
use strand_testing::{StepDeadline, SurfaceOp, TestHost};

fn attrs<const N: usize>(entries: [(&str, AttrValue); N]) -> Attributes {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_owned(), value))
        .collect()
}

fn sample_tree() -> Element {
    Element::host(
        "div",
        attrs([("id", "foo".into())]),
        vec![
            Element::host("a", Attributes::default(), vec![Element::text("bar")]),
            Element::host("b", Attributes::default(), vec![]),
        ],
    )
}

#[test]
fn render_materializes_document_order() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");
    host.pump().expect("pump");

    let container_children = host.surface().children(host.container()).to_vec();
    assert_eq!(container_children.len(), 1);
    let div = container_children[0];
    assert_eq!(host.surface().tag(div), Some("div"));
    assert_eq!(
        host.surface().property(div, "id"),
        Some(&AttrValue::Text("foo".to_owned()))
    );

    let div_children = host.surface().children(div).to_vec();
    assert_eq!(div_children.len(), 2);
    assert_eq!(host.surface().tag(div_children[0]), Some("a"));
    assert_eq!(host.surface().tag(div_children[1]), Some("b"));

    let a_children = host.surface().children(div_children[0]).to_vec();
    assert_eq!(a_children.len(), 1);
    assert_eq!(host.surface().text(a_children[0]), Some("bar"));

    // div, a, b, the text node, and the pre-existing container.
    assert_eq!(host.surface().len(), 5);
}

#[test]
fn rerender_with_removed_child_deletes_one_node() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");
    host.pump().expect("pump");
    host.surface_mut().take_ops();

    let without_b = Element::host(
        "div",
        attrs([("id", "foo".into())]),
        vec![Element::host(
            "a",
            Attributes::default(),
            vec![Element::text("bar")],
        )],
    );
    host.render(without_b).expect("rerender");
    host.pump().expect("pump");

    let ops = host.surface_mut().take_ops();
    assert_eq!(ops.len(), 1, "expected a single mutation, got {ops:?}");
    assert!(matches!(ops[0], SurfaceOp::RemoveChild { .. }));

    let div = host.surface().children(host.container())[0];
    let div_children = host.surface().children(div).to_vec();
    assert_eq!(div_children.len(), 1);
    assert_eq!(host.surface().tag(div_children[0]), Some("a"));
}

#[test]
fn attribute_change_touches_single_property() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");
    host.pump().expect("pump");
    let div = host.surface().children(host.container())[0];
    let children_before = host.surface().children(div).to_vec();
    host.surface_mut().take_ops();

    let renamed = Element::host(
        "div",
        attrs([("id", "quux".into())]),
        vec![
            Element::host("a", Attributes::default(), vec![Element::text("bar")]),
            Element::host("b", Attributes::default(), vec![]),
        ],
    );
    host.render(renamed).expect("rerender");
    host.pump().expect("pump");

    let ops = host.surface_mut().take_ops();
    assert_eq!(
        ops,
        vec![SurfaceOp::SetProperty {
            node: div,
            name: "id".to_owned(),
        }]
    );
    // No child was recreated or reordered.
    assert_eq!(host.surface().children(div), children_before.as_slice());
}

#[test]
fn identical_rerender_is_mutation_free() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");
    host.pump().expect("pump");
    host.surface_mut().take_ops();

    host.render(sample_tree()).expect("rerender");
    host.pump().expect("pump");

    assert!(host.surface_mut().take_ops().is_empty());
}

#[test]
fn position_diff_replaces_mismatch_and_truncates_tail() {
    let mut host = TestHost::new();
    let three = Element::host(
        "div",
        Attributes::default(),
        vec![
            Element::host("a", Attributes::default(), vec![]),
            Element::host("b", Attributes::default(), vec![]),
            Element::host("c", Attributes::default(), vec![]),
        ],
    );
    host.render(three).expect("render");
    host.pump().expect("pump");
    let div = host.surface().children(host.container())[0];
    let old_children = host.surface().children(div).to_vec();
    host.surface_mut().take_ops();

    let two = Element::host(
        "div",
        Attributes::default(),
        vec![
            Element::host("a", Attributes::default(), vec![]),
            Element::host("c", Attributes::default(), vec![]),
        ],
    );
    host.render(two).expect("rerender");
    host.pump().expect("pump");

    // Position matching sees b->c as a replacement and the trailing old c
    // as a deletion, so the surviving c is a brand-new node.
    let new_children = host.surface().children(div).to_vec();
    assert_eq!(new_children.len(), 2);
    assert_eq!(new_children[0], old_children[0]);
    assert_eq!(host.surface().tag(new_children[1]), Some("c"));
    assert_ne!(new_children[1], old_children[2]);

    let ops = host.surface_mut().take_ops();
    let removals: Vec<_> = ops
        .iter()
        .filter(|op| matches!(op, SurfaceOp::RemoveChild { .. }))
        .collect();
    assert_eq!(removals.len(), 2);
    let remove_positions: Vec<_> = ops
        .iter()
        .enumerate()
        .filter_map(|(i, op)| matches!(op, SurfaceOp::RemoveChild { .. }).then_some(i))
        .collect();
    let append_position = ops
        .iter()
        .position(|op| matches!(op, SurfaceOp::AppendChild { .. }))
        .expect("placement for the new c node");
    // Deletions are processed before the tree walk attaches anything.
    assert!(remove_positions.iter().all(|i| *i < append_position));
}

fn panel(_: &Attributes) -> Element {
    Element::host("div", Attributes::default(), vec![Element::text("inner")])
}

#[test]
fn deleting_component_removes_host_descendants() {
    let mut host = TestHost::new();
    let with_panel = Element::host(
        "section",
        Attributes::default(),
        vec![Element::component(panel, Attributes::default())],
    );
    host.render(with_panel).expect("render");
    host.pump().expect("pump");
    let section = host.surface().children(host.container())[0];
    assert_eq!(host.surface().children(section).len(), 1);
    host.surface_mut().take_ops();

    let empty = Element::host("section", Attributes::default(), vec![]);
    host.render(empty).expect("rerender");
    host.pump().expect("pump");

    // The component fiber had no surface node of its own, yet its host
    // descendant came off the surface.
    assert!(host.surface().children(section).is_empty());
    let ops = host.surface_mut().take_ops();
    assert_eq!(ops.len(), 1);
    assert!(matches!(
        ops[0],
        SurfaceOp::RemoveChild {
            parent,
            ..
        } if parent == section
    ));
}

#[test]
fn yielding_defers_attachment_until_commit() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");

    let deadline = StepDeadline::new(0);
    let mut slices = 0;
    while host.engine().has_pending_work() {
        // The surface must not observe a partially applied generation.
        assert!(host.surface().children(host.container()).is_empty());
        host.run_slice(&deadline).expect("slice");
        slices += 1;
        assert!(slices < 100, "work loop failed to finish");
    }

    assert!(slices >= 2, "expected the pass to span several slices");
    assert_eq!(host.surface().children(host.container()).len(), 1);
}

#[test]
fn new_render_supersedes_inflight_pass() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");

    // Walk part of the first pass, then abandon it with a new request.
    let deadline = StepDeadline::new(0);
    host.run_slice(&deadline).expect("slice");
    host.run_slice(&deadline).expect("slice");

    let replacement = Element::host(
        "span",
        Attributes::default(),
        vec![Element::text("fresh")],
    );
    host.render(replacement).expect("rerender");
    host.pump().expect("pump");

    let children = host.surface().children(host.container()).to_vec();
    assert_eq!(children.len(), 1);
    assert_eq!(host.surface().tag(children[0]), Some("span"));
    // Abandoned fibers were freed: root + span + text remain.
    assert_eq!(host.engine().live_fiber_count(), 3);
}

#[test]
fn arena_does_not_grow_across_generations() {
    let mut host = TestHost::new();
    host.render(sample_tree()).expect("render");
    host.pump().expect("pump");
    let baseline = host.engine().live_fiber_count();

    for _ in 0..3 {
        host.render(sample_tree()).expect("rerender");
        host.pump().expect("pump");
        assert_eq!(host.engine().live_fiber_count(), baseline);
    }
}

#[test]
fn independent_engines_do_not_share_state() {
    let mut first = TestHost::new();
    let mut second = TestHost::new();

    first
        .render(Element::host("div", Attributes::default(), vec![]))
        .expect("render");
    second
        .render(Element::host("span", Attributes::default(), vec![]))
        .expect("render");
    first.pump().expect("pump");
    second.pump().expect("pump");

    let first_child = first.surface().children(first.container())[0];
    let second_child = second.surface().children(second.container())[0];
    assert_eq!(first.surface().tag(first_child), Some("div"));
    assert_eq!(second.surface().tag(second_child), Some("span"));
}
