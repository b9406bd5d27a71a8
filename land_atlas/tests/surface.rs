use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use land_atlas::{
    config::{AtlasConfig, BaseMapStyle, RetryPolicy},
    geometry::{Bounds, Coordinate, Ring},
    gis::Feature,
    notice::Severity,
    parcel::ParcelId,
    store::{FocusHandoff, FocusRequest, MemoryStore, StoredLayer},
    styles::LayerStyle,
    surface::{EngineOp, FeatureEvent, HeadlessEngine, PointerEvent},
    MapView,
};
use serde_json::json;
use spin_on::spin_on;

fn square(lon: f64, lat: f64) -> Ring {
    Ring::close(vec![
        Coordinate::new(lon, lat),
        Coordinate::new(lon, lat + 0.001),
        Coordinate::new(lon + 0.001, lat + 0.001),
        Coordinate::new(lon + 0.001, lat),
    ])
    .unwrap()
}

fn store() -> MemoryStore {
    let mut a = Feature::new(square(78.0, 20.0));
    a.class = Some("a".into());
    a.attributes.insert("name".into(), json!("Plot A"));
    let mut b = Feature::new(square(78.01, 20.0));
    b.class = Some("b".into());
    MemoryStore::new(vec![StoredLayer::from_features(
        "uploaded",
        "Uploaded",
        LayerStyle::default(),
        &[a, b],
    )])
}

fn loaded_view() -> MapView<HeadlessEngine> {
    let mut view = MapView::mount(HeadlessEngine::new(800, 600), AtlasConfig::default());
    spin_on(view.reload_layers(&store()));
    view
}

fn last_op<F, T>(view: &MapView<HeadlessEngine>, pick: F) -> Option<T>
where
    F: Fn(&EngineOp) -> Option<T>,
{
    view.surface().engine().ops().iter().rev().find_map(pick)
}

#[test]
fn engine_receives_lat_lng_paths() {
    let view = loaded_view();
    let handle = view.surface().handle_for(&ParcelId::from("a")).unwrap();
    let polygon = view.surface().engine().polygon(handle).unwrap();
    assert_eq!(polygon.path[0], [20.0, 78.0]);
    assert_eq!(polygon.path.len(), 5);
    assert_eq!(view.surface().cursor_readout([20.5, 78.25]), "Lon: 78.250000, Lat: 20.500000");
}

#[test]
fn hover_and_click_fire_callbacks() {
    let mut view = loaded_view();
    let hovered = Rc::new(RefCell::new(Vec::new()));
    let clicked = Rc::new(RefCell::new(Vec::new()));
    let h = Rc::clone(&hovered);
    view.on_hover(Box::new(move |e: &FeatureEvent| h.borrow_mut().push(e.parcel_id.clone())));
    let c = Rc::clone(&clicked);
    view.on_click(Box::new(move |e: &FeatureEvent| c.borrow_mut().push(e.parcel_id.clone())));

    let handle = view.surface().handle_for(&ParcelId::from("a")).unwrap();
    view.handle_pointer(PointerEvent::Hover(handle));
    let tooltip = last_op(&view, |op| match op {
        EngineOp::Tooltip { text, .. } => Some(text.clone()),
        _ => None,
    });
    assert_eq!(tooltip.as_deref().map(|t| t.lines().next()), Some(Some("Plot A")));

    view.handle_pointer(PointerEvent::Click(handle));
    let popup = last_op(&view, |op| match op {
        EngineOp::Popup { text, .. } => Some(text.clone()),
        _ => None,
    })
    .unwrap();
    assert!(popup.starts_with("Plot A"));
    assert_eq!(view.surface().engine().topmost(), Some(handle));
    assert_eq!(view.surface().focused(), Some(&ParcelId::from("a")));

    assert_eq!(hovered.borrow().as_slice(), &[ParcelId::from("a")]);
    assert_eq!(clicked.borrow().as_slice(), &[ParcelId::from("a")]);
}

#[test]
fn focus_frames_with_padding() {
    let mut view = loaded_view();
    view.focus_parcel(&ParcelId::from("b")).unwrap();
    let (sw, ne, padding) = last_op(&view, |op| match op {
        EngineOp::FitBounds {
            south_west,
            north_east,
            padding,
        } => Some((*south_west, *north_east, *padding)),
        _ => None,
    })
    .unwrap();
    assert_eq!(padding, 20);
    assert_eq!(sw, [20.0, 78.01]);
    assert!((ne[0] - 20.001).abs() < 1e-12);
}

#[test]
fn fit_layer_frames_all_parcels() {
    let mut view = loaded_view();
    view.focus_parcel(&ParcelId::from("b")).unwrap();
    view.fit_layer("uploaded").unwrap();
    let (sw, ne) = last_op(&view, |op| match op {
        EngineOp::FitBounds {
            south_west,
            north_east,
            ..
        } => Some((*south_west, *north_east)),
        _ => None,
    })
    .unwrap();
    assert_eq!(sw, [20.0, 78.0]);
    assert!((ne[1] - 78.011).abs() < 1e-9);

    assert!(view.fit_layer("missing").is_err());
    assert!(view.notices().latest().unwrap().message.contains("missing"));
}

#[test]
fn unknown_parcel_focus_is_reported() {
    let mut view = loaded_view();
    assert!(view.focus_parcel(&ParcelId::from("nope")).is_err());
    assert_eq!(view.notices().latest().unwrap().severity, Severity::Warning);
}

#[test]
fn degenerate_bounds_fall_back_to_default_view() {
    let mut view = loaded_view();
    let point = Bounds::point(Coordinate::new(78.0, 20.0));
    view.surface_mut().fit_bounds(Some(point));
    let view_op = view.surface().engine().ops().last().cloned();
    assert_eq!(
        view_op,
        Some(EngineOp::SetView {
            center: [20.5937, 78.9629],
            zoom: 5
        })
    );
}

#[test]
fn mount_retries_then_warns() {
    let config = AtlasConfig {
        surface_retry: RetryPolicy {
            attempts: 3,
            delay_ms: 10,
        },
        ..AtlasConfig::default()
    };
    let mut slept = Vec::new();
    let mut view = MapView::mount_with(HeadlessEngine::unmounted(800, 600, 100), config, |d| {
        slept.push(d)
    });
    assert_eq!(slept, vec![Duration::from_millis(10), Duration::from_millis(20)]);
    assert!(!view.surface().is_mounted());
    let warning = view.notices().latest().unwrap().clone();
    assert!(warning.persistent);
    assert!(warning.message.contains("not ready"));

    view.surface_mut().engine_mut().resize(800, 600);
    view.layout_changed();
    assert!(view.surface().is_mounted());
    assert!(view.notices().iter().all(|n| n.id != warning.id));
}

#[test]
fn delayed_surface_mounts_within_budget() {
    let view = MapView::mount_with(
        HeadlessEngine::unmounted(800, 600, 2),
        AtlasConfig::default(),
        |_| {},
    );
    assert!(view.surface().is_mounted());
    assert!(view.notices().is_empty());
}

#[test]
fn base_style_switch_swaps_tiles() {
    let mut view = loaded_view();
    assert_eq!(view.surface().engine().tile_count(), 2);
    view.set_base_style(BaseMapStyle::Osm);
    assert_eq!(view.surface().engine().tile_count(), 1);
    assert!(view.surface().engine().tile_urls()[0].contains("openstreetmap"));
    assert_eq!(view.surface().rendered_count(), 2);
    view.set_base_style(BaseMapStyle::Satellite);
    assert_eq!(view.surface().engine().tile_count(), 2);
}

#[test]
fn rapid_toggles_do_not_leak_handles() {
    let mut view = loaded_view();
    for _ in 0..25 {
        view.toggle_layer("uploaded");
    }
    assert_eq!(view.surface().rendered_count(), 0);
    assert_eq!(view.surface().engine().polygon_count(), 0);
    view.toggle_layer("uploaded");
    assert_eq!(view.surface().rendered_count(), 2);
    assert_eq!(view.surface().engine().polygon_count(), 2);
}

#[test]
fn unchanged_registry_skips_rebuild() {
    let mut view = loaded_view();
    assert!(!view.render());
    view.toggle_layer("uploaded");
    assert!(!view.render());
}

#[test]
fn focus_handoff_spotlights_one_record() {
    let mut view = loaded_view();
    let mut handoff = FocusHandoff::new();
    let mut owner = land_atlas::gis::Attributes::new();
    owner.insert("claimantName".into(), json!("Sita Devi"));
    handoff.stash(FocusRequest::new(square(79.0, 21.0), Some(owner), false));

    let id = view.apply_focus_handoff(&mut handoff).unwrap().unwrap();
    assert!(handoff.peek().is_none());
    assert_eq!(view.surface().focused(), Some(&id));
    let focus = view.registry().persistent_focus().unwrap();
    assert_eq!(focus.name, "Sita Devi");

    handoff.stash(FocusRequest::new(square(80.0, 21.0), None, true));
    view.apply_focus_handoff(&mut handoff).unwrap();
    assert!(handoff.peek().is_some());
    assert_eq!(
        view.registry()
            .filter(|l| l.kind == land_atlas::layers::LayerKind::PersistentFocus)
            .len(),
        1
    );
    view.clear_focus();
    assert!(view.registry().persistent_focus().is_none());
    assert_eq!(view.surface().rendered_count(), 2);
}

#[test]
fn dispose_clears_the_engine() {
    let view = loaded_view();
    let engine = view.dispose();
    assert_eq!(engine.polygon_count(), 0);
    assert_eq!(engine.tile_count(), 0);
}
