//! Anchored panel behaviour driven end to end through the headless host.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use smartdrop::host::{Event, Host, Key, NodeId};
use smartdrop::layout_math::{Position, Rect, TransformOrigin, Viewport, limit_width};
use smartdrop::presence::PresencePhase;
use smartdrop::{
    ContentConfig, Dropdown, DropdownOptions, HeadlessHost, Item, MenuEntry, OverlayView,
    ViewportClass,
};
use smartdrop_core::Config;

struct Fixture {
    host: Rc<HeadlessHost>,
    dropdown: Rc<Dropdown>,
    trigger: NodeId,
    page: NodeId,
}

fn fixture(trigger_rect: Rect, entries: Vec<MenuEntry>) -> Fixture {
    let host = HeadlessHost::new(Viewport::new(1280.0, 800.0));
    let page = host.add_element(Rect::new(0.0, 0.0, 1280.0, 800.0));
    let trigger = host.add_element(trigger_rect);
    let dropdown = Dropdown::new(host.clone(), &Config::default(), DropdownOptions::default());
    dropdown.bind_trigger(trigger).unwrap();
    dropdown.render_content(ContentConfig::new(), entries);
    Fixture {
        host,
        dropdown,
        trigger,
        page,
    }
}

fn items(labels: &[&str]) -> Vec<MenuEntry> {
    labels.iter().map(|label| Item::new(*label).into()).collect()
}

fn open(f: &Fixture) {
    f.host.click(f.trigger);
    f.host.flush_frames();
}

fn desktop_view(dropdown: &Dropdown) -> smartdrop::widgets::AnchoredView {
    match dropdown.view() {
        Some(OverlayView::Desktop(view)) => view,
        other => panic!("expected desktop view, got {:?}", other),
    }
}

fn row_labels(f: &Fixture) -> Vec<String> {
    f.dropdown
        .nodes()
        .unwrap()
        .rows
        .iter()
        .filter_map(|node| f.host.attribute(*node, "data-label"))
        .collect()
}

// ===== Placement =====

#[test]
fn test_panel_below_trigger_when_space_allows() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One", "Two"]));
    open(&f);

    let view = desktop_view(&f.dropdown);
    let position = view.position.unwrap();
    assert!(!position.flipped);
    assert_eq!(position.top, 140.0);
    assert_eq!(position.left, 100.0);
    assert_eq!(view.transform_origin, Some(TransformOrigin::Top));
    assert!(view.visible);
    assert!(view.tracking);
}

#[test]
fn test_panel_flips_above_near_bottom_edge() {
    let f = fixture(Rect::new(100.0, 650.0, 120.0, 50.0), items(&["One", "Two"]));
    open(&f);

    let position = desktop_view(&f.dropdown).position.unwrap();
    assert!(position.flipped);
    // 650 - 4 - 280
    assert_eq!(position.top, 366.0);

    let panel = f.dropdown.nodes().unwrap().surface;
    assert_eq!(f.host.attribute(panel, "data-side").as_deref(), Some("top"));
    assert_eq!(
        desktop_view(&f.dropdown).transform_origin,
        Some(TransformOrigin::Bottom)
    );
}

#[test]
fn test_panel_clamped_inside_viewport() {
    let f = fixture(Rect::new(1200.0, 100.0, 60.0, 36.0), items(&["One"]));
    open(&f);

    let position = desktop_view(&f.dropdown).position.unwrap();
    // 1280 - 220 - 8
    assert_eq!(position.left, 1052.0);
    assert!(position.left >= 8.0);
    assert!(position.left + 220.0 <= 1280.0 - 8.0);
}

/// Open a dropdown, report `panel` as the measured surface rect and return
/// the resulting placement.
fn place(config: &Config, viewport: Viewport, trigger: Rect, panel: Rect) -> Position {
    let host = HeadlessHost::new(viewport);
    let trigger_node = host.add_element(trigger);
    let dropdown = Dropdown::new(host.clone(), config, DropdownOptions::default());
    dropdown.bind_trigger(trigger_node).unwrap();
    dropdown.render_content(ContentConfig::new(), items(&["One", "Two"]));
    dropdown.open();
    host.flush_frames();

    let surface = dropdown.nodes().unwrap().surface;
    host.set_rect(surface, panel);
    host.dispatch(Event::Scroll { target: None });
    desktop_view(&dropdown).position.unwrap()
}

#[test]
fn test_titled_search_panel_flips_on_full_height() {
    let f = fixture(Rect::new(100.0, 420.0, 120.0, 40.0), items(&["One", "Two"]));
    f.dropdown.render_content(
        ContentConfig::new().title("Move to").searchable(None),
        items(&["One", "Two"]),
    );
    open(&f);

    // Title and search input on top of the 280px list
    let surface = f.dropdown.nodes().unwrap().surface;
    f.host.set_rect(surface, Rect::new(0.0, 0.0, 220.0, 340.0));
    f.host.dispatch(Event::Scroll { target: None });

    let position = desktop_view(&f.dropdown).position.unwrap();
    assert!(position.flipped);
    assert_eq!(position.top, 76.0);
    assert!(position.top + 340.0 <= 800.0 - 8.0);
}

#[test]
fn test_flip_rule_and_containment_across_sizes() {
    let config = Config::default();
    let margin = config.desktop.edge_margin_px;
    let offset = config.desktop.offset_px;
    let (vw, vh) = (1280.0, 800.0);

    let triggers = [
        Rect::new(8.0, 8.0, 120.0, 36.0),
        Rect::new(1150.0, 8.0, 120.0, 36.0),
        Rect::new(8.0, 750.0, 120.0, 40.0),
        Rect::new(1150.0, 740.0, 120.0, 40.0),
        Rect::new(600.0, 380.0, 120.0, 40.0),
        Rect::new(600.0, 420.0, 120.0, 40.0),
    ];
    let panels = [
        (220.0, 280.0),
        (220.0, 340.0),
        (320.0, 520.0),
        (200.0, 96.0),
        (2000.0, 200.0),
    ];

    for trigger in triggers {
        for (w, h) in panels {
            let panel = Rect::new(0.0, 0.0, w, h);
            let position = place(&config, Viewport::new(vw, vh), trigger, panel);
            let width = limit_width(w, config.desktop.min_width_px, config.desktop.max_width_px);
            let below = vh - trigger.bottom() - offset;
            let above = trigger.top() - offset;
            let case = format!("trigger {:?}, panel {}x{}", trigger, w, h);

            assert_eq!(position.flipped, below < h && above > below, "{}", case);
            assert!(position.top >= margin, "{}", case);
            assert!(position.top + h <= vh - margin, "{}", case);
            assert!(position.left >= margin, "{}", case);
            assert!(position.left + width <= vw - margin, "{}", case);
        }
    }
}

#[test]
fn test_panel_wider_than_viewport_pins_to_margin() {
    let mut config = Config::default();
    config.desktop.max_width_px = 1000.0;

    let position = place(
        &config,
        Viewport::new(700.0, 600.0),
        Rect::new(300.0, 100.0, 120.0, 36.0),
        Rect::new(0.0, 0.0, 900.0, 200.0),
    );
    assert_eq!(position.left, 8.0);
    assert!(!position.flipped);
    assert_eq!(position.top, 140.0);
}

#[test]
fn test_panel_follows_trigger_on_scroll() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);

    f.host.set_rect(f.trigger, Rect::new(100.0, 300.0, 120.0, 36.0));
    f.host.dispatch(Event::Scroll { target: Some(f.page) });

    assert_eq!(desktop_view(&f.dropdown).position.unwrap().top, 340.0);
}

#[test]
fn test_tracking_stops_while_closing() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);
    f.dropdown.close();

    let view = desktop_view(&f.dropdown);
    assert!(!view.tracking);
    assert!(!view.visible);

    let before = view.position;
    f.host.set_rect(f.trigger, Rect::new(100.0, 300.0, 120.0, 36.0));
    f.host.dispatch(Event::Scroll { target: None });
    assert_eq!(desktop_view(&f.dropdown).position, before);
}

// ===== Presence =====

#[test]
fn test_rapid_open_close_open_keeps_one_mount() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));

    f.dropdown.open();
    let surface = f.dropdown.nodes().unwrap().surface;
    f.dropdown.close();
    f.dropdown.open();

    assert_eq!(f.dropdown.phase(), PresencePhase::Opening);
    f.host.flush_frames();
    assert_eq!(f.dropdown.phase(), PresencePhase::Open);
    assert_eq!(f.dropdown.nodes().unwrap().surface, surface);

    // The cancelled unmount never fires
    f.host.advance_ms(1_000);
    assert_eq!(f.dropdown.phase(), PresencePhase::Open);
    assert!(f.host.is_attached(surface));
}

#[test]
fn test_close_then_unmount_after_exit_duration() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);

    f.dropdown.close();
    f.host.advance_ms(149);
    assert_eq!(f.dropdown.phase(), PresencePhase::Closing);
    assert!(f.dropdown.presence().mounted);
    assert!(!f.dropdown.presence().visible);

    f.host.advance_ms(1);
    assert_eq!(f.dropdown.phase(), PresencePhase::Closed);
    assert!(f.dropdown.view().is_none());
}

#[test]
fn test_no_leaks_after_unmount_and_drop() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One", "Two"]));
    let baseline_nodes = f.host.node_count();
    let baseline_listeners = f.host.listener_count();

    for _ in 0..3 {
        open(&f);
        f.host.advance_ms(50);
        f.host.dispatch(Event::KeyDown {
            key: Key::Escape,
        });
        f.host.advance_ms(150);
    }

    assert_eq!(f.host.node_count(), baseline_nodes);
    assert_eq!(f.host.listener_count(), baseline_listeners);
    assert_eq!(f.host.pending_timers(), 0);

    let Fixture { host, dropdown, .. } = f;
    dropdown.open();
    drop(dropdown);
    assert_eq!(host.listener_count(), 0);
    assert_eq!(host.pending_timers(), 0);
}

// ===== Trigger =====

#[test]
fn test_trigger_aria_mirrors_state() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    let attr = |name: &str| f.host.attribute(f.trigger, name);

    assert_eq!(attr("aria-haspopup").as_deref(), Some("menu"));
    assert_eq!(attr("aria-controls").as_deref(), Some(f.dropdown.content_id()));
    assert_eq!(attr("aria-expanded").as_deref(), Some("false"));
    assert_eq!(attr("data-chevron-rotation").as_deref(), Some("0"));

    open(&f);
    assert_eq!(attr("aria-expanded").as_deref(), Some("true"));
    assert_eq!(attr("data-state").as_deref(), Some("open"));
    assert_eq!(attr("data-chevron-rotation").as_deref(), Some("180"));

    let panel = f.dropdown.nodes().unwrap().surface;
    assert_eq!(
        f.host.attribute(panel, "id").as_deref(),
        Some(f.dropdown.content_id())
    );
}

#[test]
fn test_trigger_click_toggles_closed() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);

    // The pointer-down on the trigger is not an outside click, so the click
    // toggles once instead of closing and reopening
    f.host.click(f.trigger);
    assert!(!f.dropdown.is_open());
}

// ===== Dismissal =====

#[test]
fn test_outside_click_closes() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);

    f.host.click(f.page);
    assert!(!f.dropdown.is_open());
}

#[test]
fn test_click_inside_panel_keeps_open() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);

    let panel = f.dropdown.nodes().unwrap().surface;
    f.host.click(panel);
    assert!(f.dropdown.is_open());
}

#[test]
fn test_escape_closes_and_returns_focus() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);
    f.host.advance_ms(50);
    assert_ne!(f.host.focused(), Some(f.trigger));

    f.host.dispatch(Event::KeyDown {
        key: Key::Escape,
    });
    assert!(!f.dropdown.is_open());
    assert_eq!(f.host.focused(), Some(f.trigger));
}

#[test]
fn test_opening_another_dropdown_closes_the_first() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    let other_trigger = f.host.add_element(Rect::new(400.0, 100.0, 120.0, 36.0));
    let other = Dropdown::new(f.host.clone(), &Config::default(), DropdownOptions::default());
    other.bind_trigger(other_trigger).unwrap();
    other.render_content(ContentConfig::new(), items(&["Two"]));

    open(&f);
    f.host.click(other_trigger);
    f.host.flush_frames();

    assert!(!f.dropdown.is_open());
    assert!(other.is_open());
    assert_ne!(f.dropdown.content_id(), other.content_id());
}

// ===== Focus =====

#[test]
fn test_initial_focus_after_delay() {
    let f = fixture(
        Rect::new(100.0, 100.0, 120.0, 36.0),
        vec![
            MenuEntry::label("Notebooks"),
            Item::new("Archive").disabled(true).into(),
            Item::new("Work").into(),
        ],
    );
    open(&f);
    assert_eq!(f.dropdown.focused_entry(), None);

    f.host.advance_ms(50);
    assert_eq!(f.dropdown.focused_entry(), Some(2));
    let rows = f.dropdown.nodes().unwrap().rows;
    assert_eq!(f.host.focused(), Some(rows[1]));
}

#[test]
fn test_arrow_keys_wrap_and_skip_disabled() {
    let f = fixture(
        Rect::new(100.0, 100.0, 120.0, 36.0),
        vec![
            Item::new("A").into(),
            Item::new("B").disabled(true).into(),
            Item::new("C").into(),
        ],
    );
    open(&f);
    f.host.advance_ms(50);
    assert_eq!(f.dropdown.focused_entry(), Some(0));

    let press = |key: Key| f.host.dispatch(Event::KeyDown { key });

    press(Key::ArrowDown);
    assert_eq!(f.dropdown.focused_entry(), Some(2));
    press(Key::ArrowDown);
    assert_eq!(f.dropdown.focused_entry(), Some(0));
    press(Key::ArrowUp);
    assert_eq!(f.dropdown.focused_entry(), Some(2));
    press(Key::Home);
    assert_eq!(f.dropdown.focused_entry(), Some(0));
    press(Key::End);
    assert_eq!(f.dropdown.focused_entry(), Some(2));
}

#[test]
fn test_arrow_before_delay_cancels_initial_focus() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["A", "B", "C"]));
    open(&f);

    f.host.dispatch(Event::KeyDown {
        key: Key::ArrowUp,
    });
    assert_eq!(f.dropdown.focused_entry(), Some(2));

    f.host.advance_ms(100);
    assert_eq!(f.dropdown.focused_entry(), Some(2));
}

#[test]
fn test_enter_selects_focused_item() {
    let picked = Rc::new(RefCell::new(Vec::new()));
    let entries: Vec<MenuEntry> = ["A", "B"]
        .into_iter()
        .map(|label: &'static str| {
            let sink = picked.clone();
            Item::new(label)
                .on_select(move || sink.borrow_mut().push(label.to_string()))
                .into()
        })
        .collect();
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), entries);
    open(&f);
    f.host.advance_ms(50);

    f.host.dispatch(Event::KeyDown {
        key: Key::ArrowDown,
    });
    f.host.dispatch(Event::KeyDown { key: Key::Enter });

    assert_eq!(*picked.borrow(), vec!["B".to_string()]);
    assert!(!f.dropdown.is_open());
}

// ===== Selection =====

#[test]
fn test_disabled_item_click_is_ignored() {
    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    let f = fixture(
        Rect::new(100.0, 100.0, 120.0, 36.0),
        vec![Item::new("Locked")
            .disabled(true)
            .on_select(move || flag.set(true))
            .into()],
    );
    open(&f);

    let row = f.dropdown.nodes().unwrap().rows[0];
    f.host.click(row);
    assert!(!called.get());
    assert!(f.dropdown.is_open());
}

#[test]
fn test_keep_open_item_stays_open() {
    let count = Rc::new(Cell::new(0));
    let counter = count.clone();
    let f = fixture(
        Rect::new(100.0, 100.0, 120.0, 36.0),
        vec![Item::new("Toggle")
            .keep_open(true)
            .on_select(move || counter.set(counter.get() + 1))
            .into()],
    );
    open(&f);

    let row = f.dropdown.nodes().unwrap().rows[0];
    f.host.click(row);
    f.host.click(row);
    assert_eq!(count.get(), 2);
    assert!(f.dropdown.is_open());
}

// ===== Search =====

fn searchable(labels: &'static [&'static str]) -> Fixture {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(labels));
    let weak = Rc::downgrade(&f.dropdown);
    f.dropdown.render_content(
        ContentConfig::new().searchable(Some("Find...")).on_search(move |query| {
            if let Some(dropdown) = weak.upgrade() {
                let filtered = labels
                    .iter()
                    .filter(|label| smartdrop::interaction::matches(label, query))
                    .map(|label| Item::new(*label).into())
                    .collect();
                dropdown.set_entries(filtered);
            }
        }),
        items(labels),
    );
    f
}

#[test]
fn test_search_filters_case_insensitively() {
    let f = searchable(&["Abacus", "Cab", "Dog"]);
    open(&f);

    let input = f.dropdown.nodes().unwrap().search_input.unwrap();
    assert_eq!(f.host.attribute(input, "placeholder").as_deref(), Some("Find..."));

    f.host.dispatch(Event::Input {
        target: input,
        value: "AB".to_string(),
    });
    assert_eq!(f.dropdown.search_query(), "AB");
    assert_eq!(row_labels(&f), vec!["Abacus", "Cab"]);
    // Search input survives the row rebuild
    assert_eq!(f.dropdown.nodes().unwrap().search_input, Some(input));
}

#[test]
fn test_search_resets_on_close() {
    let f = searchable(&["Abacus", "Cab", "Dog"]);
    open(&f);
    f.dropdown.search("dog");
    assert_eq!(row_labels(&f), vec!["Dog"]);

    f.host.click(f.page);
    assert_eq!(f.dropdown.search_query(), "");
    f.host.advance_ms(150);

    open(&f);
    assert_eq!(row_labels(&f), vec!["Abacus", "Cab", "Dog"]);
    let input = f.dropdown.nodes().unwrap().search_input.unwrap();
    assert_eq!(f.host.attribute(input, "value").as_deref(), Some(""));
}

// ===== Viewport class =====

#[test]
fn test_resize_to_mobile_while_open_swaps_surface() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    open(&f);
    let panel = f.dropdown.nodes().unwrap().surface;

    f.host.resize(390.0, 844.0);

    assert_eq!(f.dropdown.viewport_class(), ViewportClass::Mobile);
    assert_eq!(f.dropdown.phase(), PresencePhase::Open);
    assert!(!f.host.is_attached(panel));
    match f.dropdown.view() {
        Some(OverlayView::Mobile(view)) => {
            assert!(view.visible);
            assert!(!view.offscreen);
        }
        other => panic!("expected mobile view, got {:?}", other),
    }
    assert_eq!(f.host.root_style("overflow").as_deref(), Some("hidden"));

    f.host.resize(1280.0, 800.0);
    assert!(matches!(f.dropdown.view(), Some(OverlayView::Desktop(_))));
    assert_eq!(f.host.root_style("overflow"), None);
}

#[test]
fn test_resize_while_closed_only_reclassifies() {
    let f = fixture(Rect::new(100.0, 100.0, 120.0, 36.0), items(&["One"]));
    let nodes = f.host.node_count();

    f.host.resize(390.0, 844.0);
    assert_eq!(f.dropdown.viewport_class(), ViewportClass::Mobile);
    assert_eq!(f.host.node_count(), nodes);
    assert_eq!(f.host.root_style("overflow"), None);
}
