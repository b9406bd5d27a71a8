use land_atlas::{
    config::AtlasConfig,
    draw::DrawState,
    error::AtlasError,
    gis::Attributes,
    layers::LayerKind,
    notice::Severity,
    surface::HeadlessEngine,
    MapView,
};
use serde_json::json;

// engine order: [lat, lng]
const SQUARE: [[f64; 2]; 4] = [[0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001]];

fn view() -> MapView<HeadlessEngine> {
    MapView::mount(HeadlessEngine::new(800, 600), AtlasConfig::default())
}

fn drawn_count(view: &MapView<HeadlessEngine>) -> usize {
    view.registry()
        .drawn_items()
        .map(|l| l.feature_count())
        .unwrap_or_default()
}

#[test]
fn discard_leaves_no_trace() {
    let mut view = view();
    let layers_before = view.registry().len();
    view.start_drawing().unwrap();
    let pending = view.ring_closed(&SQUARE).unwrap();
    assert!(pending.hectares() > 1.0);
    assert_eq!(view.draw_state(), DrawState::Captured);
    assert_eq!(drawn_count(&view), 1);
    assert_eq!(view.surface().rendered_count(), 1);

    view.discard_drawing().unwrap();
    assert_eq!(view.draw_state(), DrawState::Idle);
    assert_eq!(drawn_count(&view), 0);
    assert_eq!(view.registry().len(), layers_before);
    assert_eq!(view.surface().rendered_count(), 0);
}

#[test]
fn saves_get_sequential_names() {
    let mut view = view();
    for expected in ["Plot 1", "Plot 2"] {
        view.start_drawing().unwrap();
        view.ring_closed(&SQUARE).unwrap();
        let handle = view.confirm_save(Attributes::new()).unwrap();
        let layer = view.registry().layer(handle.id.as_str()).unwrap();
        assert_eq!(layer.name, expected);
        assert_eq!(layer.kind, LayerKind::Digitized);
        let attrs = layer.parcels()[0].attributes();
        assert_eq!(attrs.get("name"), Some(&json!(expected)));
        assert_eq!(attrs.get("status"), Some(&json!("active")));
        assert!(attrs.contains_key("created"));
        assert_eq!(view.draw_state(), DrawState::Idle);
        assert_eq!(drawn_count(&view), 0);
    }
    assert_eq!(view.registry().filter(|l| l.kind == LayerKind::Digitized).len(), 2);
    assert_eq!(view.surface().rendered_count(), 2);
    let latest = view.notices().latest().unwrap();
    assert_eq!(latest.severity, Severity::Info);
    assert!(latest.message.starts_with("Plot 2 saved"));
}

#[test]
fn user_supplied_name_is_kept() {
    let mut view = view();
    view.start_drawing().unwrap();
    view.ring_closed(&SQUARE).unwrap();
    let mut attrs = Attributes::new();
    attrs.insert("Name".into(), json!("North field"));
    let handle = view.confirm_save(attrs).unwrap();
    assert_eq!(view.registry().layer(handle.id.as_str()).unwrap().name, "North field");
}

#[test]
fn invalid_ring_keeps_drawing() {
    let mut view = view();
    view.start_drawing().unwrap();
    let err = view.ring_closed(&[[0.0, 0.0], [0.0, 1.0]]).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidGeometry(_)));
    assert_eq!(view.draw_state(), DrawState::Drawing);
    assert_eq!(drawn_count(&view), 0);
    let notice = view.notices().latest().unwrap();
    assert_eq!(notice.severity, Severity::Warning);
    assert!(notice.message.contains("Invalid geometry"));

    // the user can try again
    view.ring_closed(&SQUARE).unwrap();
    assert_eq!(view.draw_state(), DrawState::Captured);
}

#[test]
fn second_session_is_rejected() {
    let mut view = view();
    view.start_drawing().unwrap();
    assert!(matches!(view.start_drawing(), Err(AtlasError::SessionAlreadyActive)));
    view.cancel_drawing().unwrap();
    assert_eq!(view.draw_state(), DrawState::Idle);
    assert!(view.start_drawing().is_ok());
}

#[test]
fn confirm_without_capture_fails() {
    let mut view = view();
    let err = view.confirm_save(Attributes::new()).unwrap_err();
    assert!(matches!(err, AtlasError::InvalidSessionState { .. }));
    assert!(view.registry().filter(|l| l.kind == LayerKind::Digitized).is_empty());
}

#[test]
fn large_parcels_warn_about_accuracy() {
    let mut view = view();
    view.start_drawing().unwrap();
    view.ring_closed(&[[45.0, 10.0], [45.5, 10.0], [45.5, 10.5], [45.0, 10.5]])
        .unwrap();
    let messages: Vec<&str> = view.notices().iter().map(|n| n.message.as_str()).collect();
    assert!(messages.iter().any(|m| m.contains("high latitude")));
    assert!(messages.iter().any(|m| m.contains("large")));
}
