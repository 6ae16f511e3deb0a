//! End-to-end loop: a component whose click handler drives state updates
//! through the scheduler, the way an application shell would.

use std::cell::RefCell;

use strand_core::{use_state, Attributes, AttrValue, Element, EventHandler, SurfaceId};
use strand_testing::TestHost;

thread_local! {
    static RENDERS: RefCell<usize> = const { RefCell::new(0) };
}

fn counter(_: &Attributes) -> Element {
    RENDERS.with(|count| *count.borrow_mut() += 1);
    let (count, set_count) = use_state(1i64);
    let on_click = EventHandler::new(move || set_count.update(|c| c + 1));

    let mut attrs = Attributes::default();
    attrs.insert("onClick".to_owned(), AttrValue::Handler(on_click));
    Element::host(
        "h1",
        attrs,
        vec![Element::text(format!("Count: {count}"))],
    )
}

fn heading(host: &TestHost) -> SurfaceId {
    host.surface().children(host.container())[0]
}

fn heading_text(host: &TestHost) -> String {
    let text = host.surface().children(heading(host))[0];
    host.surface().text(text).expect("heading text").to_owned()
}

#[test]
fn click_handler_drives_incremental_updates() {
    let mut host = TestHost::new();
    host.render(Element::component(counter, Attributes::default()))
        .expect("render");
    host.pump().expect("pump");

    assert_eq!(heading_text(&host), "Count: 1");
    assert!(host.surface().has_listener(heading(&host), "click"));

    assert!(host.fire(heading(&host), "click"));
    host.pump().expect("pump");
    assert_eq!(heading_text(&host), "Count: 2");

    // Two clicks between frames fold into a single re-render.
    let renders_before = RENDERS.with(|count| *count.borrow());
    assert!(host.fire(heading(&host), "click"));
    assert!(host.fire(heading(&host), "click"));
    host.pump().expect("pump");
    assert_eq!(heading_text(&host), "Count: 4");
    assert_eq!(RENDERS.with(|count| *count.borrow()), renders_before + 1);

    // The heading node itself was updated in place, never recreated.
    let heading_before = heading(&host);
    assert!(host.fire(heading(&host), "click"));
    host.pump().expect("pump");
    assert_eq!(heading(&host), heading_before);
    assert_eq!(heading_text(&host), "Count: 5");
}

#[test]
fn listener_swap_detaches_the_old_handler() {
    let mut host = TestHost::new();
    host.render(Element::component(counter, Attributes::default()))
        .expect("render");
    host.pump().expect("pump");
    host.surface_mut().take_ops();

    assert!(host.fire(heading(&host), "click"));
    host.pump().expect("pump");

    // Each render builds a fresh closure, so the commit re-registers the
    // listener: one removal, one addition, in that order.
    let ops = host.surface_mut().take_ops();
    let listener_ops: Vec<_> = ops
        .iter()
        .filter(|op| {
            matches!(
                op,
                strand_testing::SurfaceOp::AddListener { .. }
                    | strand_testing::SurfaceOp::RemoveListener { .. }
            )
        })
        .collect();
    assert_eq!(listener_ops.len(), 2);
    assert!(matches!(
        listener_ops[0],
        strand_testing::SurfaceOp::RemoveListener { .. }
    ));
    assert!(matches!(
        listener_ops[1],
        strand_testing::SurfaceOp::AddListener { .. }
    ));
}
